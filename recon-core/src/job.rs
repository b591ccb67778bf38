//! Job records and the job state machine.

use std::{fmt, path::PathBuf, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::ReconError,
    parser::{CrackReport, DiscoveryReport, PortScanReport},
};

/// Unique identifier for one job record.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The fixed set of asynchronous operations.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobKind {
    Discovery,
    PortScan,
    HashCrack,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Discovery => "discovery",
            JobKind::PortScan => "port-scan",
            JobKind::HashCrack => "hash-crack",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a job. Transitions only move forward:
/// `pending -> running -> completed | failed`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }

    pub fn valid_transitions(&self) -> &'static [JobState] {
        match self {
            JobState::Pending => &[JobState::Running],
            JobState::Running => &[JobState::Completed, JobState::Failed],
            JobState::Completed | JobState::Failed => &[],
        }
    }

    pub fn can_transition_to(&self, next: JobState) -> bool {
        self.valid_transitions().contains(&next)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Pending => write!(f, "pending"),
            JobState::Running => write!(f, "running"),
            JobState::Completed => write!(f, "completed"),
            JobState::Failed => write!(f, "failed"),
        }
    }
}

/// nmap scan technique.
#[derive(
    Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ScanType {
    #[default]
    Syn,
    Tcp,
    Udp,
}

impl ScanType {
    pub fn nmap_flag(&self) -> &'static str {
        match self {
            ScanType::Syn => "-sS",
            ScanType::Tcp => "-sT",
            ScanType::Udp => "-sU",
        }
    }
}

impl fmt::Display for ScanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanType::Syn => write!(f, "syn"),
            ScanType::Tcp => write!(f, "tcp"),
            ScanType::Udp => write!(f, "udp"),
        }
    }
}

impl FromStr for ScanType {
    type Err = ReconError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "syn" => Ok(ScanType::Syn),
            "tcp" => Ok(ScanType::Tcp),
            "udp" => Ok(ScanType::Udp),
            other => Err(ReconError::invalid(format!(
                "scan_type must be one of syn, tcp, udp (got '{other}')"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryParams {
    pub range: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortScanParams {
    pub target: String,
    pub ports: String,
    pub scan_type: ScanType,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashCrackParams {
    pub hash_file: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wordlist: Option<PathBuf>,
    /// john `--format`; the configured default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

/// Validated launch parameters, one variant per [`JobKind`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "params", rename_all = "kebab-case")]
pub enum JobParameters {
    Discovery(DiscoveryParams),
    PortScan(PortScanParams),
    HashCrack(HashCrackParams),
}

impl JobParameters {
    pub fn kind(&self) -> JobKind {
        match self {
            JobParameters::Discovery(_) => JobKind::Discovery,
            JobParameters::PortScan(_) => JobKind::PortScan,
            JobParameters::HashCrack(_) => JobKind::HashCrack,
        }
    }

    /// Identity of the logical operation. Two submissions with the same key
    /// while one is active share a job.
    pub fn job_key(&self) -> String {
        match self {
            JobParameters::Discovery(p) => match &p.interface {
                Some(iface) => format!("discovery:{}@{}", p.range, iface),
                None => format!("discovery:{}", p.range),
            },
            JobParameters::PortScan(p) => format!(
                "port-scan:{}:{}:{}",
                p.target, p.scan_type, p.ports
            ),
            JobParameters::HashCrack(p) => {
                hash_crack_key(&p.hash_file.to_string_lossy())
            }
        }
    }
}

pub fn hash_crack_key(hash_file: &str) -> String {
    format!("hash-crack:{}", hash_file)
}

/// Kind-specific output of a completed job.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "kebab-case")]
pub enum JobResult {
    Discovery(DiscoveryReport),
    PortScan(PortScanReport),
    HashCrack(CrackReport),
}

impl JobResult {
    pub fn kind(&self) -> JobKind {
        match self {
            JobResult::Discovery(_) => JobKind::Discovery,
            JobResult::PortScan(_) => JobKind::PortScan,
            JobResult::HashCrack(_) => JobKind::HashCrack,
        }
    }
}

/// One asynchronous unit of work as stored by the registry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub key: String,
    pub kind: JobKind,
    pub state: JobState,
    pub parameters: JobParameters,
    pub result: Option<JobResult>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(key: impl Into<String>, parameters: JobParameters) -> Self {
        Self {
            id: JobId::new(),
            key: key.into(),
            kind: parameters.kind(),
            state: JobState::Pending,
            parameters,
            result: None,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    /// Milliseconds spent running, up to now for jobs still in flight.
    pub fn elapsed_ms(&self) -> Option<i64> {
        let started = self.started_at?;
        let end = self.finished_at.unwrap_or_else(Utc::now);
        Some((end - started).num_milliseconds())
    }

    pub fn summary(&self) -> JobSummary {
        JobSummary {
            id: self.id,
            key: self.key.clone(),
            kind: self.kind,
            state: self.state,
            created_at: self.created_at,
            finished_at: self.finished_at,
        }
    }
}

/// Listing view without parameters or results.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSummary {
    pub id: JobId,
    pub key: String,
    pub kind: JobKind,
    pub state: JobState,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_have_no_exits() {
        for state in [JobState::Completed, JobState::Failed] {
            assert!(state.is_terminal());
            for next in [
                JobState::Pending,
                JobState::Running,
                JobState::Completed,
                JobState::Failed,
            ] {
                assert!(!state.can_transition_to(next));
            }
        }
    }

    #[test]
    fn pending_must_run_before_finishing() {
        assert!(JobState::Pending.can_transition_to(JobState::Running));
        assert!(!JobState::Pending.can_transition_to(JobState::Completed));
        assert!(!JobState::Pending.can_transition_to(JobState::Failed));
        assert!(JobState::Running.can_transition_to(JobState::Failed));
    }

    #[test]
    fn keys_identify_the_logical_operation() {
        let scan = JobParameters::PortScan(PortScanParams {
            target: "10.0.0.7".into(),
            ports: "21,22".into(),
            scan_type: ScanType::Syn,
        });
        assert_eq!(scan.job_key(), "port-scan:10.0.0.7:syn:21,22");

        let crack = JobParameters::HashCrack(HashCrackParams {
            hash_file: PathBuf::from("/tmp/hashes.txt"),
            wordlist: None,
            format: None,
        });
        assert_eq!(crack.job_key(), "hash-crack:/tmp/hashes.txt");
        assert_eq!(crack.kind(), JobKind::HashCrack);
    }

    #[test]
    fn scan_type_parses_case_insensitively() {
        assert_eq!("UDP".parse::<ScanType>().ok(), Some(ScanType::Udp));
        assert!("xmas".parse::<ScanType>().is_err());
    }
}
