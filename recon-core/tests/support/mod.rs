#![allow(dead_code)]

use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use parking_lot::Mutex;
use recon_core::{
    Orchestrator, OrchestratorConfig, ReconError, Result,
    job::{Job, JobState},
    runner::{CommandSpec, ProcessRunner, RunResult},
    session::{ExploitHandler, ExploitOutcome, ExploitRequest},
    tools::ToolPaths,
};

#[derive(Debug, Clone)]
struct Scripted {
    result: RunResult,
    delay: Duration,
}

/// Replays canned tool output keyed by program name.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    responses: Mutex<HashMap<String, VecDeque<Scripted>>>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl ScriptedRunner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn push(&self, program: &str, result: RunResult, delay: Duration) {
        self.responses
            .lock()
            .entry(program.to_string())
            .or_default()
            .push_back(Scripted { result, delay });
    }

    pub fn succeed(&self, program: &str, stdout: &str) {
        self.succeed_after(program, stdout, Duration::ZERO);
    }

    pub fn succeed_after(&self, program: &str, stdout: &str, delay: Duration) {
        self.push(
            program,
            RunResult {
                exit_code: Some(0),
                stdout: stdout.to_string(),
                ..RunResult::default()
            },
            delay,
        );
    }

    pub fn fail(&self, program: &str, code: i32, stderr: &str) {
        self.push(
            program,
            RunResult {
                exit_code: Some(code),
                stderr: stderr.to_string(),
                ..RunResult::default()
            },
            Duration::ZERO,
        );
    }

    pub fn time_out(&self, program: &str) {
        self.push(
            program,
            RunResult {
                timed_out: true,
                ..RunResult::default()
            },
            Duration::ZERO,
        );
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn run(
        &self,
        spec: &CommandSpec,
        _limit: Duration,
    ) -> Result<RunResult> {
        self.calls.lock().push(spec.clone());
        let next = self
            .responses
            .lock()
            .get_mut(&spec.program)
            .and_then(VecDeque::pop_front);

        match next {
            Some(scripted) => {
                if !scripted.delay.is_zero() {
                    tokio::time::sleep(scripted.delay).await;
                }
                Ok(scripted.result)
            }
            None => Err(ReconError::ToolExecutionFailed(format!(
                "no scripted response for {}",
                spec.program
            ))),
        }
    }
}

/// Exploit backend that always opens a session and echoes commands.
#[derive(Debug, Default)]
pub struct EchoHandler {
    pub terminated: Mutex<Vec<String>>,
    pub shadow: Mutex<Option<String>>,
}

#[async_trait]
impl ExploitHandler for EchoHandler {
    async fn launch(&self, request: &ExploitRequest) -> Result<ExploitOutcome> {
        if request.target == "10.0.0.99" {
            return Ok(ExploitOutcome {
                remote_handle: None,
                output: "[*] Exploit completed, but no session was created."
                    .into(),
            });
        }
        Ok(ExploitOutcome {
            remote_handle: Some("1".into()),
            output: "[*] Command shell session 1 opened".into(),
        })
    }

    async fn execute(
        &self,
        _remote_handle: &str,
        command: &str,
    ) -> Result<String> {
        if command.starts_with("cat ")
            && let Some(shadow) = self.shadow.lock().clone()
        {
            return Ok(shadow);
        }
        Ok(format!("$ {command}\n"))
    }

    async fn terminate(&self, remote_handle: &str) -> Result<()> {
        self.terminated.lock().push(remote_handle.to_string());
        Ok(())
    }
}

pub fn test_config(workspace: &std::path::Path) -> OrchestratorConfig {
    OrchestratorConfig {
        default_wordlist: None,
        workspace_dir: workspace.to_path_buf(),
        ..OrchestratorConfig::default()
    }
}

pub fn orchestrator(
    runner: Arc<ScriptedRunner>,
    handler: Arc<EchoHandler>,
    workspace: &std::path::Path,
) -> Orchestrator {
    Orchestrator::with_exploit_handler(
        runner,
        ToolPaths::default(),
        test_config(workspace),
        handler,
    )
}

/// Poll until the job reaches a terminal state.
pub async fn wait_for_terminal(orchestrator: &Orchestrator, key: &str) -> Job {
    for _ in 0..200 {
        let job = orchestrator.status(key).expect("job should exist");
        if job.state.is_terminal() {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {key} did not finish");
}

/// Poll until the job is in `state`.
pub async fn wait_for_state(
    orchestrator: &Orchestrator,
    key: &str,
    state: JobState,
) {
    for _ in 0..200 {
        let job = orchestrator.status(key).expect("job should exist");
        if job.state == state {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {key} never reached {state}");
}
