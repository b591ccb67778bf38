//! The service the HTTP layer talks to.
//!
//! [`Orchestrator::submit`] validates a request, registers the job and hands
//! the tool run to a background task. It never waits for the tool; clients
//! poll [`Orchestrator::status`] instead. Exploit sessions and the few
//! synchronous tool calls (interfaces, module search) live here as well so
//! every subprocess shares one concurrency limit.

use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::{
    error::{ReconError, Result},
    exploit::MsfConsoleHandler,
    job::{
        DiscoveryParams, HashCrackParams, Job, JobParameters, JobResult,
        JobState, JobSummary, PortScanParams, hash_crack_key,
    },
    parser::{
        CrackReport, DiscoveryReport, ExploitModule, NetworkInterface,
        PortScanReport, RemoteSession, ShadowEntry, merge_credentials,
        parse_crack_output, parse_discovery, parse_hash_file,
        parse_interfaces, parse_nmap_run, parse_shadow,
    },
    registry::JobRegistry,
    runner::{BoundedRunner, CommandSpec, ProcessRunner, RunResult},
    session::{
        ExploitHandler, ExploitOptions, ExploitRequest, Session, SessionId,
        SessionSummary, SessionTracker,
    },
    tools::{DEFAULT_HASH_FORMAT, ToolPaths, john_format_for},
    validation,
};

/// Limits and defaults for tool runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Upper bound on concurrently running subprocesses. Zero is treated
    /// as one.
    pub max_concurrent_processes: usize,
    pub discovery_timeout: Duration,
    pub scan_timeout: Duration,
    pub crack_timeout: Duration,
    /// Synchronous calls and msfconsole runs.
    pub command_timeout: Duration,
    /// Used for crack jobs that name no wordlist, when the file exists.
    pub default_wordlist: Option<PathBuf>,
    pub hash_format: String,
    /// Where extracted hash files are written.
    pub workspace_dir: PathBuf,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_processes: 4,
            discovery_timeout: Duration::from_secs(5 * 60),
            scan_timeout: Duration::from_secs(10 * 60),
            crack_timeout: Duration::from_secs(60 * 60),
            command_timeout: Duration::from_secs(30),
            default_wordlist: Some(PathBuf::from(
                "/usr/share/wordlists/rockyou.txt",
            )),
            hash_format: DEFAULT_HASH_FORMAT.to_string(),
            workspace_dir: PathBuf::from("workspace"),
        }
    }
}

/// Answer to a submission: the job now responsible for the key and
/// whether this call created it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Submission {
    pub job: Job,
    pub created: bool,
}

/// Passwords recovered so far for a hash file. `state` is absent when no
/// crack job was submitted for the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrackStatus {
    pub key: String,
    pub state: Option<JobState>,
    #[serde(flatten)]
    pub report: CrackReport,
    pub error: Option<String>,
}

/// Hashes pulled out of a session and where they were stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HashExtraction {
    pub hashes: Vec<ShadowEntry>,
    pub count: usize,
    pub file: PathBuf,
    pub job: Option<Submission>,
}

#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    registry: JobRegistry,
    sessions: SessionTracker,
    msf: MsfConsoleHandler,
    /// Unbounded; job tasks hold a permit for their whole run.
    runner: Arc<dyn ProcessRunner>,
    /// Takes a permit per call.
    bounded: Arc<dyn ProcessRunner>,
    permits: Arc<Semaphore>,
    tools: ToolPaths,
    config: OrchestratorConfig,
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("registry", &self.inner.registry)
            .field("sessions", &self.inner.sessions)
            .field("tools", &self.inner.tools)
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Orchestrator whose exploit sessions are driven by `msfconsole`.
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        tools: ToolPaths,
        config: OrchestratorConfig,
    ) -> Self {
        Self::build(runner, tools, config, None)
    }

    /// Same as [`Orchestrator::new`] with a different session backend.
    pub fn with_exploit_handler(
        runner: Arc<dyn ProcessRunner>,
        tools: ToolPaths,
        config: OrchestratorConfig,
        handler: Arc<dyn ExploitHandler>,
    ) -> Self {
        Self::build(runner, tools, config, Some(handler))
    }

    fn build(
        runner: Arc<dyn ProcessRunner>,
        tools: ToolPaths,
        config: OrchestratorConfig,
        handler: Option<Arc<dyn ExploitHandler>>,
    ) -> Self {
        let permits =
            Arc::new(Semaphore::new(config.max_concurrent_processes.max(1)));
        let bounded: Arc<dyn ProcessRunner> = Arc::new(BoundedRunner::new(
            Arc::clone(&runner),
            Arc::clone(&permits),
        ));
        let msf = MsfConsoleHandler::new(
            Arc::clone(&bounded),
            tools.clone(),
            config.command_timeout,
        );
        let handler = handler.unwrap_or_else(|| Arc::new(msf.clone()));

        Self {
            inner: Arc::new(Inner {
                registry: JobRegistry::new(),
                sessions: SessionTracker::new(handler),
                msf,
                runner,
                bounded,
                permits,
                tools,
                config,
            }),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.inner.config
    }

    /// Validate and register a job. A new job is started on its own task;
    /// an identical request while one is still active returns that job.
    pub fn submit(&self, parameters: JobParameters) -> Result<Submission> {
        let parameters = self.inner.validate(parameters)?;
        let key = parameters.job_key();
        let (job, created) = self.inner.registry.create_or_get(
            &key,
            parameters.kind(),
            parameters.clone(),
        )?;

        if created {
            info!(
                key = %key,
                job_id = %job.id,
                kind = %job.kind,
                "job accepted"
            );
            let inner = Arc::clone(&self.inner);
            tokio::spawn(async move {
                inner.run_job(key, parameters).await;
            });
        } else {
            debug!(key = %key, state = %job.state, "returning active job");
        }

        Ok(Submission { job, created })
    }

    pub fn status(&self, key: &str) -> Result<Job> {
        self.inner.registry.get(key)
    }

    /// Cracked credentials for a hash file.
    ///
    /// A completed job answers from its stored report. Any other job, and a
    /// file that was never submitted, gets a live `john --show` so passwords
    /// recovered so far are visible. Paths taken from a URL lose their
    /// leading slash, so an absolute variant is tried as well.
    pub async fn crack_status(&self, hash_file: &str) -> Result<CrackStatus> {
        let job = match self.inner.registry.get(&hash_crack_key(hash_file)) {
            Err(ReconError::NotFound(_)) if !hash_file.starts_with('/') => {
                self.inner
                    .registry
                    .get(&hash_crack_key(&format!("/{hash_file}")))
            }
            other => other,
        };
        let job = match job {
            Ok(job) => Some(job),
            Err(ReconError::NotFound(_)) => None,
            Err(err) => return Err(err),
        };

        let Some(job) = job else {
            let path = locate_hash_file(hash_file)?;
            let report = self
                .inner
                .show_cracked(
                    &*self.inner.bounded,
                    &path,
                    &self.inner.config.hash_format,
                )
                .await?;
            return Ok(CrackStatus {
                key: hash_crack_key(&path.to_string_lossy()),
                state: None,
                report,
                error: None,
            });
        };

        let live = match (&job.result, &job.parameters) {
            (Some(JobResult::HashCrack(report)), _) => Ok(report.clone()),
            (_, JobParameters::HashCrack(params)) => {
                let format = params
                    .format
                    .as_deref()
                    .unwrap_or(&self.inner.config.hash_format);
                let runner = &*self.inner.bounded;
                self.inner
                    .show_cracked(runner, &params.hash_file, format)
                    .await
            }
            _ => Err(ReconError::Internal(format!(
                "job {} is not a crack job",
                job.key
            ))),
        };
        let report = live.unwrap_or_else(|err| {
            warn!(
                key = %job.key,
                error = %err,
                "cracked passwords unavailable"
            );
            CrackReport::new(Vec::new())
        });

        Ok(CrackStatus {
            key: job.key,
            state: Some(job.state),
            report,
            error: job.error,
        })
    }

    pub fn jobs(&self) -> Vec<JobSummary> {
        self.inner.registry.list()
    }

    pub async fn interfaces(&self) -> Result<Vec<NetworkInterface>> {
        let spec = self.inner.tools.interfaces();
        let limit = self.inner.config.command_timeout;
        let stdout = self
            .inner
            .run_checked(&*self.inner.bounded, "ifconfig", &spec, limit)
            .await?;
        Ok(parse_interfaces(&stdout).records)
    }

    pub async fn search_exploits(
        &self,
        query: &str,
    ) -> Result<Vec<ExploitModule>> {
        self.inner.msf.search(query).await
    }

    pub async fn remote_sessions(&self) -> Result<Vec<RemoteSession>> {
        self.inner.msf.remote_sessions().await
    }

    /// Launch an exploit and return the session it opened.
    pub async fn execute_exploit(
        &self,
        request: ExploitRequest,
    ) -> Result<SessionSummary> {
        let target = validation::host(&request.target, "rhosts")?;
        let module =
            validation::module_name(&request.exploit_module, "exploit_name")?;
        let options = ExploitOptions {
            rport: request.options.rport,
            payload: validation::module_name(
                &request.options.payload,
                "payload",
            )?,
        };
        if options.rport == 0 {
            return Err(ReconError::invalid(
                "rport must be between 1 and 65535",
            ));
        }

        let id = self.inner.sessions.open(target, module, options).await?;
        self.inner.sessions.get(id).map(|session| session.summary())
    }

    pub async fn command(
        &self,
        id: SessionId,
        command: &str,
    ) -> Result<String> {
        let command = validation::command(command)?;
        self.inner.sessions.send_command(id, &command).await
    }

    pub fn sessions(&self) -> Vec<SessionSummary> {
        self.inner.sessions.list()
    }

    pub fn session(&self, id: SessionId) -> Result<Session> {
        self.inner.sessions.get(id)
    }

    pub async fn close_session(&self, id: SessionId) -> Result<SessionSummary> {
        self.inner.sessions.close(id).await
    }

    /// Read a shadow file through an active session, store its crypt hashes
    /// as `user:hash` lines in the workspace and optionally queue a crack job
    /// for them.
    pub async fn extract_hashes(
        &self,
        id: SessionId,
        shadow_path: &str,
        crack: bool,
    ) -> Result<HashExtraction> {
        let shadow_path = validation::path(shadow_path, "shadow_path")?;
        let output = self
            .inner
            .sessions
            .send_command(id, &format!("cat {shadow_path}"))
            .await?;
        let parsed = parse_shadow(&output);
        if parsed.skipped > 0 {
            debug!(
                session = %id,
                skipped = parsed.skipped,
                "shadow entries without crypt hashes"
            );
        }

        let workspace = &self.inner.config.workspace_dir;
        tokio::fs::create_dir_all(workspace).await?;
        let file = workspace.join(format!("hashes-session-{id}.txt"));
        let contents: String = parsed
            .records
            .iter()
            .map(|entry| format!("{}:{}\n", entry.username, entry.hash))
            .collect();
        tokio::fs::write(&file, contents).await?;
        info!(
            session = %id,
            count = parsed.len(),
            file = %file.display(),
            "hashes extracted"
        );

        let job = if crack && !parsed.is_empty() {
            Some(self.submit(JobParameters::HashCrack(HashCrackParams {
                hash_file: file.clone(),
                wordlist: None,
                format: shared_format(&parsed.records),
            }))?)
        } else {
            None
        };

        Ok(HashExtraction {
            count: parsed.len(),
            hashes: parsed.records,
            file,
            job,
        })
    }
}

impl Inner {
    fn validate(&self, parameters: JobParameters) -> Result<JobParameters> {
        Ok(match parameters {
            JobParameters::Discovery(p) => {
                JobParameters::Discovery(DiscoveryParams {
                    range: validation::discovery_range(&p.range)?,
                    interface: p
                        .interface
                        .as_deref()
                        .map(str::trim)
                        .filter(|iface| !iface.is_empty())
                        .map(validation::interface)
                        .transpose()?,
                })
            }
            JobParameters::PortScan(p) => {
                JobParameters::PortScan(PortScanParams {
                    target: validation::host(&p.target, "target")?,
                    ports: validation::port_spec(&p.ports)?,
                    scan_type: p.scan_type,
                })
            }
            JobParameters::HashCrack(p) => {
                let hash_file = PathBuf::from(validation::path(
                    &p.hash_file.to_string_lossy(),
                    "hash_file",
                )?);
                if !hash_file.is_file() {
                    return Err(ReconError::invalid(format!(
                        "hash file not found: {}",
                        hash_file.display()
                    )));
                }
                let wordlist = match p.wordlist {
                    Some(wordlist) => {
                        let wordlist = PathBuf::from(validation::path(
                            &wordlist.to_string_lossy(),
                            "wordlist",
                        )?);
                        if !wordlist.is_file() {
                            return Err(ReconError::invalid(format!(
                                "wordlist not found: {}",
                                wordlist.display()
                            )));
                        }
                        Some(wordlist)
                    }
                    None => self
                        .config
                        .default_wordlist
                        .clone()
                        .filter(|path| path.is_file()),
                };
                let format = p
                    .format
                    .as_deref()
                    .map(str::trim)
                    .filter(|format| !format.is_empty())
                    .map(validation::hash_format)
                    .transpose()?;
                JobParameters::HashCrack(HashCrackParams {
                    hash_file,
                    wordlist,
                    format,
                })
            }
        })
    }

    async fn run_job(&self, key: String, parameters: JobParameters) {
        let _permit = match self.permits.acquire().await {
            Ok(permit) => permit,
            Err(_) => {
                error!(key = %key, "process permits closed; job cannot run");
                return;
            }
        };

        if let Err(err) = self.registry.mark_running(&key) {
            error!(key = %key, error = %err, "job could not be started");
            return;
        }
        debug!(key = %key, "job running");

        let outcome = match &parameters {
            JobParameters::Discovery(p) => {
                self.discover(p).await.map(JobResult::Discovery)
            }
            JobParameters::PortScan(p) => {
                self.port_scan(p).await.map(JobResult::PortScan)
            }
            JobParameters::HashCrack(p) => {
                self.crack(p).await.map(JobResult::HashCrack)
            }
        };

        let recorded = match outcome {
            Ok(result) => {
                info!(key = %key, "job completed");
                self.registry.mark_completed(&key, result)
            }
            Err(err) => {
                warn!(key = %key, error = %err, "job failed");
                self.registry.mark_failed(&key, err.to_string())
            }
        };
        if let Err(err) = recorded {
            error!(key = %key, error = %err, "job outcome was not recorded");
        }
    }

    async fn discover(
        &self,
        params: &DiscoveryParams,
    ) -> Result<DiscoveryReport> {
        let spec = self.tools.discovery(params);
        let limit = self.config.discovery_timeout;
        let stdout = self
            .run_checked(&*self.runner, "netdiscover", &spec, limit)
            .await?;

        let parsed = parse_discovery(&stdout);
        if parsed.skipped > 0 {
            debug!(
                range = %params.range,
                skipped = parsed.skipped,
                "unparsed discovery lines"
            );
        }
        Ok(DiscoveryReport::new(&params.range, parsed.records))
    }

    async fn port_scan(
        &self,
        params: &PortScanParams,
    ) -> Result<PortScanReport> {
        let spec = self.tools.port_scan(params);
        let stdout = self
            .run_checked(&*self.runner, "nmap", &spec, self.config.scan_timeout)
            .await?;

        let run = parse_nmap_run(&stdout);
        if run.ports.skipped > 0 {
            debug!(
                target = %params.target,
                skipped = run.ports.skipped,
                "unparsed port records"
            );
        }
        Ok(PortScanReport::new(&params.target, run))
    }

    async fn crack(&self, params: &HashCrackParams) -> Result<CrackReport> {
        let format = params
            .format
            .as_deref()
            .unwrap_or(&self.config.hash_format);
        let spec = self.tools.crack(
            &params.hash_file,
            params.wordlist.as_deref(),
            format,
        );
        let limit = self.config.crack_timeout;
        self.run_checked(&*self.runner, "john", &spec, limit).await?;

        self.show_cracked(&*self.runner, &params.hash_file, format)
            .await
    }

    /// Every account of `hash_file`, with the passwords john has recovered
    /// for it so far.
    async fn show_cracked(
        &self,
        runner: &dyn ProcessRunner,
        hash_file: &Path,
        format: &str,
    ) -> Result<CrackReport> {
        let spec = self.tools.crack_status(hash_file, format);
        let limit = self.config.command_timeout;
        let shown = self
            .run_checked(runner, "john --show", &spec, limit)
            .await?;

        let accounts = read_hash_file(hash_file).await?;
        let cracked = parse_crack_output(&shown);
        Ok(CrackReport::new(merge_credentials(
            &accounts,
            &cracked.records,
        )))
    }

    async fn run_checked(
        &self,
        runner: &dyn ProcessRunner,
        tool: &str,
        spec: &CommandSpec,
        limit: Duration,
    ) -> Result<String> {
        let result: RunResult = runner.run(spec, limit).await?;
        if result.success() {
            Ok(result.stdout)
        } else {
            Err(ReconError::ToolExecutionFailed(
                result.failure_reason(tool, limit),
            ))
        }
    }
}

/// The john format every entry agrees on. john loads one format per run, so
/// mixed files fall back to the configured default.
fn shared_format(entries: &[ShadowEntry]) -> Option<String> {
    let mut formats = entries.iter().map(|entry| john_format_for(&entry.hash));
    let first = formats.next()??;
    formats
        .all(|format| format == Some(first))
        .then(|| first.to_string())
}

/// A hash file named by a status lookup with no job behind it.
fn locate_hash_file(hash_file: &str) -> Result<PathBuf> {
    let given = PathBuf::from(validation::path(hash_file, "hash_file")?);
    let absolute = PathBuf::from(format!("/{}", given.display()));
    [given, absolute]
        .into_iter()
        .find(|path| path.is_file())
        .ok_or_else(|| {
            ReconError::not_found(format!(
                "no crack job or hash file for {hash_file}"
            ))
        })
}

async fn read_hash_file(path: &Path) -> Result<Vec<ShadowEntry>> {
    let raw = tokio::fs::read_to_string(path).await?;
    Ok(parse_hash_file(&raw).records)
}
