#![allow(dead_code)]

use std::{
    collections::{HashMap, VecDeque},
    path::Path,
    sync::Arc,
    time::Duration,
};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use axum_test::TestServer;
use parking_lot::Mutex;
use recon_config::{EnvConfig, compose_config};
use recon_core::{
    Orchestrator, OrchestratorConfig, ReconError,
    runner::{CommandSpec, ProcessRunner, RunResult},
    session::{ExploitHandler, ExploitOutcome, ExploitRequest},
};
use recon_server::{AppState, create_app};
use serde_json::Value;

/// Canned tool output keyed by program name.
#[derive(Debug, Default)]
pub struct CannedRunner {
    responses: Mutex<HashMap<String, VecDeque<RunResult>>>,
}

impl CannedRunner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn succeed(&self, program: &str, stdout: &str) {
        self.responses
            .lock()
            .entry(program.to_string())
            .or_default()
            .push_back(RunResult {
                exit_code: Some(0),
                stdout: stdout.to_string(),
                ..RunResult::default()
            });
    }

    pub fn fail(&self, program: &str, code: i32, stderr: &str) {
        self.responses
            .lock()
            .entry(program.to_string())
            .or_default()
            .push_back(RunResult {
                exit_code: Some(code),
                stderr: stderr.to_string(),
                ..RunResult::default()
            });
    }
}

#[async_trait]
impl ProcessRunner for CannedRunner {
    async fn run(
        &self,
        spec: &CommandSpec,
        _limit: Duration,
    ) -> recon_core::Result<RunResult> {
        self.responses
            .lock()
            .get_mut(&spec.program)
            .and_then(VecDeque::pop_front)
            .ok_or_else(|| {
                ReconError::ToolExecutionFailed(format!(
                    "no canned response for {}",
                    spec.program
                ))
            })
    }
}

/// Opens a session for every target except `10.0.0.99` and echoes commands.
#[derive(Debug, Default)]
pub struct ShellDouble {
    pub shadow: Mutex<Option<String>>,
}

#[async_trait]
impl ExploitHandler for ShellDouble {
    async fn launch(
        &self,
        request: &ExploitRequest,
    ) -> recon_core::Result<ExploitOutcome> {
        let remote_handle =
            (request.target != "10.0.0.99").then(|| "1".to_string());
        Ok(ExploitOutcome {
            remote_handle,
            output: "[*] Exploit completed".into(),
        })
    }

    async fn execute(
        &self,
        _remote_handle: &str,
        command: &str,
    ) -> recon_core::Result<String> {
        if command.starts_with("cat ")
            && let Some(shadow) = self.shadow.lock().clone()
        {
            return Ok(shadow);
        }
        Ok(format!("$ {command}\n"))
    }

    async fn terminate(&self, _remote_handle: &str) -> recon_core::Result<()> {
        Ok(())
    }
}

pub struct TestApp {
    pub server: TestServer,
    pub state: AppState,
}

pub fn build_test_app(
    runner: Arc<CannedRunner>,
    handler: Arc<ShellDouble>,
    workspace: &Path,
) -> Result<TestApp> {
    let (mut config, _warnings) = compose_config(
        None,
        EnvConfig::default(),
        None,
        false,
    )?;
    config.dev_mode = true;
    config.orchestrator = OrchestratorConfig {
        default_wordlist: None,
        workspace_dir: workspace.to_path_buf(),
        ..OrchestratorConfig::default()
    };

    let orchestrator = Orchestrator::with_exploit_handler(
        runner,
        config.tools.clone(),
        config.orchestrator.clone(),
        handler,
    );
    let state = AppState::new(orchestrator, Arc::new(config));
    let server = TestServer::new(create_app(state.clone()))
        .map_err(|err| anyhow!(err.to_string()))?;

    Ok(TestApp { server, state })
}

/// Poll `/api/jobs/{key}` until the job leaves pending/running.
pub async fn wait_for_job(server: &TestServer, key: &str) -> Value {
    for _ in 0..200 {
        let body: Value = server.get(&format!("/api/jobs/{key}")).await.json();
        if matches!(body["state"].as_str(), Some("completed" | "failed")) {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {key} did not finish");
}
