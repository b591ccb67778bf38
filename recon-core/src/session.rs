//! Interactive exploit sessions.
//!
//! Sessions outlive the request that opened them and accept follow-up
//! commands, so they are tracked apart from one-shot jobs. The tracker owns
//! every [`Session`]; callers receive clones or summaries. The actual exploit
//! plumbing sits behind [`ExploitHandler`].

use std::{
    collections::BTreeMap,
    fmt,
    str::FromStr,
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ReconError, Result};

/// Tracker-assigned session number, stable for the session's lifetime.
#[derive(
    Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct SessionId(pub u32);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = ReconError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(ReconError::invalid("session_id must be numeric"));
        }
        trimmed
            .parse::<u32>()
            .map(SessionId)
            .map_err(|_| ReconError::invalid("session_id is out of range"))
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Opening,
    Active,
    Closed,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Opening => write!(f, "opening"),
            SessionStatus::Active => write!(f, "active"),
            SessionStatus::Closed => write!(f, "closed"),
        }
    }
}

/// Exploit module options besides the target.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExploitOptions {
    pub rport: u16,
    pub payload: String,
}

impl Default for ExploitOptions {
    fn default() -> Self {
        Self {
            rport: 21,
            payload: "cmd/unix/interact".to_string(),
        }
    }
}

/// Everything a handler needs to launch an exploit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExploitRequest {
    pub target: String,
    pub exploit_module: String,
    pub options: ExploitOptions,
}

/// What the handler reports after a launch attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExploitOutcome {
    /// Handler-side session identifier; `None` means no session came up.
    pub remote_handle: Option<String>,
    pub output: String,
}

/// Seam between the tracker and whatever actually drives the exploit.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExploitHandler: Send + Sync {
    async fn launch(&self, request: &ExploitRequest) -> Result<ExploitOutcome>;

    async fn execute(&self, remote_handle: &str, command: &str)
    -> Result<String>;

    async fn terminate(&self, remote_handle: &str) -> Result<()>;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRecord {
    pub command: String,
    pub output: String,
    pub executed_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub target: String,
    pub exploit_module: String,
    pub options: ExploitOptions,
    pub status: SessionStatus,
    pub remote_handle: Option<String>,
    pub history: Vec<CommandRecord>,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id,
            target: self.target.clone(),
            exploit_module: self.exploit_module.clone(),
            status: self.status,
            remote_handle: self.remote_handle.clone(),
            command_count: self.history.len(),
            opened_at: self.opened_at,
            closed_at: self.closed_at,
        }
    }
}

/// Dashboard view of a session without its history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: SessionId,
    pub target: String,
    pub exploit_module: String,
    pub status: SessionStatus,
    pub remote_handle: Option<String>,
    pub command_count: usize,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

struct SessionEntry {
    session: Session,
    /// Serializes commands so history order matches execution order.
    gate: Arc<tokio::sync::Mutex<()>>,
}

pub struct SessionTracker {
    handler: Arc<dyn ExploitHandler>,
    sessions: Mutex<BTreeMap<SessionId, SessionEntry>>,
    next_id: AtomicU32,
}

impl fmt::Debug for SessionTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionTracker")
            .field("sessions", &self.sessions.lock().len())
            .finish_non_exhaustive()
    }
}

impl SessionTracker {
    pub fn new(handler: Arc<dyn ExploitHandler>) -> Self {
        Self {
            handler,
            sessions: Mutex::new(BTreeMap::new()),
            next_id: AtomicU32::new(1),
        }
    }

    /// Launch an exploit and track the resulting session. The session is
    /// `opening` while the handler works and becomes `active` only once the
    /// handler reports a live remote session.
    pub async fn open(
        &self,
        target: impl Into<String>,
        exploit_module: impl Into<String>,
        options: ExploitOptions,
    ) -> Result<SessionId> {
        let id = SessionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let request = ExploitRequest {
            target: target.into(),
            exploit_module: exploit_module.into(),
            options,
        };

        self.sessions.lock().insert(
            id,
            SessionEntry {
                session: Session {
                    id,
                    target: request.target.clone(),
                    exploit_module: request.exploit_module.clone(),
                    options: request.options.clone(),
                    status: SessionStatus::Opening,
                    remote_handle: None,
                    history: Vec::new(),
                    opened_at: Utc::now(),
                    closed_at: None,
                },
                gate: Arc::new(tokio::sync::Mutex::new(())),
            },
        );
        info!(
            session = %id,
            target = %request.target,
            module = %request.exploit_module,
            "opening exploit session"
        );

        let launched = self.handler.launch(&request).await;

        let failure = {
            let mut sessions = self.sessions.lock();
            let Some(entry) = sessions.get_mut(&id) else {
                return Err(ReconError::Internal(format!(
                    "session {id} vanished while opening"
                )));
            };
            let closed_meanwhile =
                entry.session.status == SessionStatus::Closed;

            match launched {
                Ok(ExploitOutcome {
                    remote_handle: Some(handle),
                    ..
                }) if !closed_meanwhile => {
                    entry.session.status = SessionStatus::Active;
                    entry.session.remote_handle = Some(handle);
                    None
                }
                Ok(ExploitOutcome {
                    remote_handle: Some(handle),
                    ..
                }) => Some((
                    "session was closed before the exploit completed"
                        .to_string(),
                    Some(handle),
                )),
                Ok(ExploitOutcome {
                    remote_handle: None,
                    output,
                }) => Some((no_session_reason(&output), None)),
                Err(err) => Some((err.to_string(), None)),
            }
            .inspect(|_| {
                entry.session.status = SessionStatus::Closed;
                entry.session.closed_at.get_or_insert_with(Utc::now);
            })
        };

        match failure {
            None => {
                info!(session = %id, "exploit session active");
                Ok(id)
            }
            Some((reason, stray_handle)) => {
                warn!(session = %id, reason = %reason, "exploit failed");
                if let Some(handle) = stray_handle {
                    self.terminate_quietly(id, &handle).await;
                }
                Err(ReconError::ExploitFailed(reason))
            }
        }
    }

    /// Run a command in an active session and record it in the history.
    pub async fn send_command(
        &self,
        id: SessionId,
        command: &str,
    ) -> Result<String> {
        let gate = {
            let sessions = self.sessions.lock();
            let entry = Self::entry(&sessions, id)?;
            if entry.session.status != SessionStatus::Active {
                return Err(ReconError::SessionNotActive(id));
            }
            Arc::clone(&entry.gate)
        };

        let _turn = gate.lock().await;

        let handle = {
            let sessions = self.sessions.lock();
            let entry = Self::entry(&sessions, id)?;
            match (&entry.session.status, &entry.session.remote_handle) {
                (SessionStatus::Active, Some(handle)) => handle.clone(),
                _ => return Err(ReconError::SessionNotActive(id)),
            }
        };

        let output = self.handler.execute(&handle, command).await?;

        if let Some(entry) = self.sessions.lock().get_mut(&id) {
            entry.session.history.push(CommandRecord {
                command: command.to_string(),
                output: output.clone(),
                executed_at: Utc::now(),
            });
        }

        Ok(output)
    }

    pub fn list(&self) -> Vec<SessionSummary> {
        self.sessions
            .lock()
            .values()
            .map(|entry| entry.session.summary())
            .collect()
    }

    pub fn get(&self, id: SessionId) -> Result<Session> {
        let sessions = self.sessions.lock();
        Self::entry(&sessions, id).map(|entry| entry.session.clone())
    }

    /// Close a session. Closing twice is a no-op. The remote side is asked to
    /// terminate but a failure there does not keep the session open.
    pub async fn close(&self, id: SessionId) -> Result<SessionSummary> {
        let (handle, summary) = {
            let mut sessions = self.sessions.lock();
            let Some(entry) = sessions.get_mut(&id) else {
                return Err(ReconError::not_found(format!("session {id}")));
            };
            if entry.session.status == SessionStatus::Closed {
                return Ok(entry.session.summary());
            }
            entry.session.status = SessionStatus::Closed;
            entry.session.closed_at = Some(Utc::now());
            (entry.session.remote_handle.clone(), entry.session.summary())
        };

        info!(session = %id, "exploit session closed");
        if let Some(handle) = handle {
            self.terminate_quietly(id, &handle).await;
        }
        Ok(summary)
    }

    async fn terminate_quietly(&self, id: SessionId, handle: &str) {
        if let Err(err) = self.handler.terminate(handle).await {
            warn!(
                session = %id,
                remote = handle,
                error = %err,
                "failed to terminate remote session"
            );
        }
    }

    fn entry(
        sessions: &BTreeMap<SessionId, SessionEntry>,
        id: SessionId,
    ) -> Result<&SessionEntry> {
        sessions
            .get(&id)
            .ok_or_else(|| ReconError::not_found(format!("session {id}")))
    }
}

fn no_session_reason(output: &str) -> String {
    match output.lines().rev().map(str::trim).find(|l| !l.is_empty()) {
        Some(last) => format!("no session was created: {last}"),
        None => "no session was created".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opened(handle: &'static str) -> MockExploitHandler {
        let mut handler = MockExploitHandler::new();
        handler.expect_launch().returning(move |_| {
            Ok(ExploitOutcome {
                remote_handle: Some(handle.to_string()),
                output: format!("Command shell session {handle} opened"),
            })
        });
        handler
    }

    #[tokio::test]
    async fn commands_are_recorded_in_order() {
        let mut handler = opened("1");
        handler
            .expect_execute()
            .returning(|_, command| Ok(format!("ran {command}")));
        let tracker = SessionTracker::new(Arc::new(handler));

        let id = tracker
            .open(
                "10.0.0.7",
                "exploit/unix/ftp/vsftpd_234_backdoor",
                ExploitOptions::default(),
            )
            .await
            .expect("session opens");
        assert_eq!(
            tracker.get(id).expect("tracked").status,
            SessionStatus::Active
        );

        assert_eq!(tracker.send_command(id, "id").await.expect("id"), "ran id");
        tracker.send_command(id, "uname -a").await.expect("uname");

        let session = tracker.get(id).expect("tracked");
        let commands: Vec<&str> =
            session.history.iter().map(|r| r.command.as_str()).collect();
        assert_eq!(commands, vec!["id", "uname -a"]);
        assert_eq!(tracker.list()[0].command_count, 2);
    }

    #[tokio::test]
    async fn failed_launch_leaves_closed_session_without_history() {
        let mut handler = MockExploitHandler::new();
        handler.expect_launch().returning(|_| {
            Ok(ExploitOutcome {
                remote_handle: None,
                output: "[*] Exploit completed, but no session was created.\n"
                    .into(),
            })
        });
        handler.expect_execute().never();
        let tracker = SessionTracker::new(Arc::new(handler));

        let err = tracker
            .open(
                "10.0.0.7",
                "exploit/unix/ftp/vsftpd_234_backdoor",
                ExploitOptions::default(),
            )
            .await
            .expect_err("launch should fail");
        assert!(matches!(err, ReconError::ExploitFailed(_)));

        let summary = &tracker.list()[0];
        assert_eq!(summary.status, SessionStatus::Closed);
        assert_eq!(summary.command_count, 0);

        let rejected = tracker.send_command(summary.id, "id").await;
        assert!(matches!(rejected, Err(ReconError::SessionNotActive(_))));
    }

    #[tokio::test]
    async fn close_is_idempotent_and_terminates_once() {
        let mut handler = opened("4");
        handler.expect_terminate().times(1).returning(|_| Ok(()));
        let tracker = SessionTracker::new(Arc::new(handler));

        let id = tracker
            .open(
                "10.0.0.7",
                "exploit/unix/ftp/vsftpd_234_backdoor",
                ExploitOptions::default(),
            )
            .await
            .expect("session opens");

        let first = tracker.close(id).await.expect("first close");
        let second = tracker.close(id).await.expect("second close");
        assert_eq!(first.status, SessionStatus::Closed);
        assert_eq!(second.closed_at, first.closed_at);

        let rejected = tracker.send_command(id, "id").await;
        assert!(matches!(rejected, Err(ReconError::SessionNotActive(_))));
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let tracker = SessionTracker::new(Arc::new(MockExploitHandler::new()));
        assert!(matches!(
            tracker.send_command(SessionId(99), "id").await,
            Err(ReconError::NotFound(_))
        ));
        assert!(matches!(
            tracker.close(SessionId(99)).await,
            Err(ReconError::NotFound(_))
        ));
    }

    #[test]
    fn session_id_must_be_numeric() {
        assert_eq!("12".parse::<SessionId>().ok(), Some(SessionId(12)));
        assert!("1;id".parse::<SessionId>().is_err());
        assert!("".parse::<SessionId>().is_err());
    }
}
