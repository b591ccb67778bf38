//! [`ExploitHandler`] backed by `msfconsole`.
//!
//! Each call is a separate console run. Exploits and session commands are
//! written to a resource file so operator input never reaches a shell.

use std::{fmt, io::Write, sync::Arc, time::Duration};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::{
    error::{ReconError, Result},
    parser::{
        ExploitModule, RemoteSession, extract_session_id, parse_search,
        parse_sessions,
    },
    runner::{ProcessRunner, RunResult},
    session::{ExploitHandler, ExploitOutcome, ExploitRequest},
    tools::ToolPaths,
    validation,
};

#[derive(Clone)]
pub struct MsfConsoleHandler {
    runner: Arc<dyn ProcessRunner>,
    tools: ToolPaths,
    timeout: Duration,
}

impl fmt::Debug for MsfConsoleHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MsfConsoleHandler")
            .field("msfconsole", &self.tools.msfconsole)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl MsfConsoleHandler {
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        tools: ToolPaths,
        timeout: Duration,
    ) -> Self {
        Self {
            runner,
            tools,
            timeout,
        }
    }

    /// Modules matching `query`, deduplicated by name.
    pub async fn search(&self, query: &str) -> Result<Vec<ExploitModule>> {
        let query = validation::search_query(query)?;
        let spec = self.tools.msf_inline(&format!("search {query}"));
        let result = self.runner.run(&spec, self.timeout).await?;
        let stdout = self.require_success("msfconsole search", result)?;

        let parsed = parse_search(&stdout);
        if parsed.skipped > 0 {
            debug!(
                query = %query,
                skipped = parsed.skipped,
                "unparsed search rows"
            );
        }
        Ok(parsed.records)
    }

    /// Sessions msfconsole itself knows about.
    pub async fn remote_sessions(&self) -> Result<Vec<RemoteSession>> {
        let spec = self.tools.msf_inline("sessions -l");
        let result = self.runner.run(&spec, self.timeout).await?;
        let stdout = self.require_success("msfconsole sessions", result)?;
        Ok(parse_sessions(&stdout).records)
    }

    async fn run_resource(&self, script: &str) -> Result<RunResult> {
        let mut resource = tempfile::Builder::new()
            .prefix("recon-")
            .suffix(".rc")
            .tempfile()?;
        resource.write_all(script.as_bytes())?;
        resource.flush()?;

        let spec = self.tools.msf_resource(resource.path());
        // `resource` must outlive the run; it is removed on drop.
        self.runner.run(&spec, self.timeout).await
    }

    fn require_success(&self, tool: &str, result: RunResult) -> Result<String> {
        if result.success() {
            Ok(result.stdout)
        } else {
            Err(ReconError::ToolExecutionFailed(
                result.failure_reason(tool, self.timeout),
            ))
        }
    }
}

fn resource_script(request: &ExploitRequest) -> Result<String> {
    let module =
        validation::module_name(&request.exploit_module, "exploit_name")?;
    let target = validation::host(&request.target, "rhosts")?;
    let payload =
        validation::module_name(&request.options.payload, "payload")?;

    Ok(format!(
        "use {module}\n\
         set RHOSTS {target}\n\
         set RPORT {rport}\n\
         set PAYLOAD {payload}\n\
         exploit -z\n",
        rport = request.options.rport,
    ))
}

#[async_trait]
impl ExploitHandler for MsfConsoleHandler {
    async fn launch(&self, request: &ExploitRequest) -> Result<ExploitOutcome> {
        let script = resource_script(request)?;
        info!(
            target = %request.target,
            module = %request.exploit_module,
            "launching exploit"
        );

        // The console keeps running after `exploit -z`, so hitting the
        // timeout is expected; whatever it printed is still inspected.
        let result = self.run_resource(&script).await?;
        let remote_handle =
            extract_session_id(&result.stdout).map(|id| id.to_string());
        debug!(
            remote = ?remote_handle,
            timed_out = result.timed_out,
            "exploit run finished"
        );

        Ok(ExploitOutcome {
            remote_handle,
            output: result.stdout,
        })
    }

    async fn execute(
        &self,
        remote_handle: &str,
        command: &str,
    ) -> Result<String> {
        let handle = validation::session_id(remote_handle)?;
        let command = validation::command(command)?;
        let script = format!("sessions -i {handle} -c \"{command}\"\nexit\n");

        let result = self.run_resource(&script).await?;
        self.require_success("msfconsole session command", result)
    }

    async fn terminate(&self, remote_handle: &str) -> Result<()> {
        let handle = validation::session_id(remote_handle)?;
        let result = self
            .run_resource(&format!("sessions -k {handle}\nexit\n"))
            .await?;
        self.require_success("msfconsole session kill", result)
            .map(|_| ())
    }
}
