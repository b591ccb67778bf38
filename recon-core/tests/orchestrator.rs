mod support;

use std::{
    path::PathBuf,
    sync::Arc,
    time::{Duration, Instant},
};

use recon_core::{
    Orchestrator, OrchestratorConfig, ReconError,
    job::{
        DiscoveryParams, HashCrackParams, JobParameters, JobResult, JobState,
        PortScanParams, ScanType,
    },
    session::{ExploitOptions, ExploitRequest, SessionId, SessionStatus},
};
use recon_core::tools::ToolPaths;
use support::{
    EchoHandler, ScriptedRunner, orchestrator, test_config, wait_for_state,
    wait_for_terminal,
};

const NETDISCOVER: &str = "
 Currently scanning: Finished!   |   Screen View: Unique Hosts

 2 Captured ARP Req/Rep packets, from 2 hosts.   Total size: 120
 _____________________________________________________________________________
   IP            At MAC Address     Count     Len  MAC Vendor / Hostname
 -----------------------------------------------------------------------------
 10.0.0.2        08:00:27:aa:bb:02      1      60  PCS Systemtechnik GmbH
 10.0.0.1        52:54:00:12:35:00      1      60  Unknown vendor
";

const NMAP_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<nmaprun scanner="nmap">
<host><status state="up" reason="arp-response"/>
<address addr="10.0.0.7" addrtype="ipv4"/>
<ports>
<port protocol="tcp" portid="22"><state state="closed" reason="reset"/><service name="ssh" method="table" conf="3"/></port>
<port protocol="tcp" portid="80"><state state="open" reason="syn-ack"/><service name="ftp" product="vsftpd" version="2.3.4" method="probed"/></port>
</ports>
</host>
</nmaprun>"#;

fn discovery(range: &str) -> JobParameters {
    JobParameters::Discovery(DiscoveryParams {
        range: range.into(),
        interface: None,
    })
}

#[tokio::test]
async fn discovery_starts_pending_and_completes_sorted() -> anyhow::Result<()> {
    let workspace = tempfile::tempdir()?;
    let runner = ScriptedRunner::new();
    runner.succeed("netdiscover", NETDISCOVER);
    let orchestrator =
        orchestrator(runner.clone(), Arc::default(), workspace.path());

    let submission = orchestrator.submit(discovery("10.0.0.0/30"))?;
    assert!(submission.created);
    assert_eq!(submission.job.key, "discovery:10.0.0.0/30");

    let immediate = orchestrator.status(&submission.job.key)?;
    assert!(matches!(immediate.state, JobState::Pending | JobState::Running));

    let job = wait_for_terminal(&orchestrator, &submission.job.key).await;
    assert_eq!(job.state, JobState::Completed);
    let Some(JobResult::Discovery(report)) = job.result else {
        panic!("expected a discovery result, got {:?}", job.result);
    };
    let ips: Vec<String> =
        report.hosts.iter().map(|h| h.ip.to_string()).collect();
    assert_eq!(ips, vec!["10.0.0.1", "10.0.0.2"]);
    assert_eq!(report.count, 2);

    assert_eq!(
        runner.calls()[0].args,
        ["-r", "10.0.0.0/30", "-P"]
    );
    Ok(())
}

#[tokio::test]
async fn identical_submissions_share_the_active_job() -> anyhow::Result<()> {
    let workspace = tempfile::tempdir()?;
    let runner = ScriptedRunner::new();
    runner.succeed_after("netdiscover", NETDISCOVER, Duration::from_millis(50));
    let orchestrator =
        orchestrator(runner.clone(), Arc::default(), workspace.path());

    let first = orchestrator.submit(discovery("10.0.0.0/30"))?;
    let second = orchestrator.submit(discovery(" 10.0.0.0/30 "))?;
    assert!(first.created);
    assert!(!second.created);
    assert_eq!(first.job.id, second.job.id);

    wait_for_terminal(&orchestrator, &first.job.key).await;
    assert_eq!(runner.calls().len(), 1);
    assert_eq!(orchestrator.jobs().len(), 1);
    Ok(())
}

#[tokio::test]
async fn finished_key_can_be_resubmitted() -> anyhow::Result<()> {
    let workspace = tempfile::tempdir()?;
    let runner = ScriptedRunner::new();
    runner.succeed("netdiscover", NETDISCOVER);
    runner.fail("netdiscover", 1, "pcap: permission denied");
    let orchestrator = orchestrator(runner, Arc::default(), workspace.path());

    let first = orchestrator.submit(discovery("10.0.0.0/30"))?;
    let done = wait_for_terminal(&orchestrator, &first.job.key).await;
    assert_eq!(done.state, JobState::Completed);

    let again = orchestrator.submit(discovery("10.0.0.0/30"))?;
    assert!(again.created);
    assert_ne!(again.job.id, first.job.id);

    let failed = wait_for_terminal(&orchestrator, &again.job.key).await;
    assert_eq!(failed.state, JobState::Failed);
    assert!(failed.result.is_none());
    assert!(
        failed
            .error
            .as_deref()
            .is_some_and(|e| e.contains("pcap: permission denied"))
    );
    Ok(())
}

#[tokio::test]
async fn port_scan_reports_open_ports_and_vsftpd() -> anyhow::Result<()> {
    let workspace = tempfile::tempdir()?;
    let runner = ScriptedRunner::new();
    runner.succeed("nmap", NMAP_XML);
    let orchestrator = orchestrator(runner, Arc::default(), workspace.path());

    let submission = orchestrator.submit(scan("10.0.0.7"))?;
    assert_eq!(submission.job.key, "port-scan:10.0.0.7:syn:22,80");

    let job = wait_for_terminal(&orchestrator, &submission.job.key).await;
    let Some(JobResult::PortScan(report)) = job.result else {
        panic!("expected a port scan result, got {:?}", job.result);
    };
    assert_eq!(report.open_ports_count, 1);
    assert!(report.vsftpd_detected);
    assert_eq!(report.host_state, "up");
    Ok(())
}

#[tokio::test]
async fn timed_out_scan_fails_the_job() -> anyhow::Result<()> {
    let workspace = tempfile::tempdir()?;
    let runner = ScriptedRunner::new();
    runner.time_out("nmap");
    let orchestrator = orchestrator(runner, Arc::default(), workspace.path());

    let submission =
        orchestrator.submit(JobParameters::PortScan(PortScanParams {
            target: "10.0.0.7".into(),
            ports: "1-1024".into(),
            scan_type: ScanType::Tcp,
        }))?;
    let job = wait_for_terminal(&orchestrator, &submission.job.key).await;
    assert_eq!(job.state, JobState::Failed);
    assert!(job.error.as_deref().is_some_and(|e| e.contains("timed out")));
    Ok(())
}

#[tokio::test]
async fn invalid_requests_never_create_jobs() -> anyhow::Result<()> {
    let workspace = tempfile::tempdir()?;
    let orchestrator = orchestrator(
        ScriptedRunner::new(),
        Arc::default(),
        workspace.path(),
    );

    let bad_ports = orchestrator.submit(JobParameters::PortScan(PortScanParams {
        target: "10.0.0.7".into(),
        ports: "80-21".into(),
        scan_type: ScanType::Syn,
    }));
    assert!(matches!(bad_ports, Err(ReconError::InvalidRequest(_))));

    let bad_target =
        orchestrator.submit(JobParameters::PortScan(PortScanParams {
            target: "-oN /tmp/x".into(),
            ports: "80".into(),
            scan_type: ScanType::Syn,
        }));
    assert!(matches!(bad_target, Err(ReconError::InvalidRequest(_))));

    let missing_file =
        orchestrator.submit(JobParameters::HashCrack(HashCrackParams {
            hash_file: PathBuf::from("/nonexistent/hashes.txt"),
            wordlist: None,
            format: None,
        }));
    assert!(matches!(missing_file, Err(ReconError::InvalidRequest(_))));

    let hash_file = workspace.path().join("hashes.txt");
    std::fs::write(&hash_file, "root:$1$salt$hash\n")?;
    let bad_format =
        orchestrator.submit(JobParameters::HashCrack(HashCrackParams {
            hash_file,
            wordlist: None,
            format: Some("--show".into()),
        }));
    assert!(matches!(bad_format, Err(ReconError::InvalidRequest(_))));

    assert!(orchestrator.jobs().is_empty());
    Ok(())
}

#[tokio::test]
async fn crack_lists_every_account_with_recovered_passwords()
-> anyhow::Result<()> {
    let workspace = tempfile::tempdir()?;
    let hash_file = workspace.path().join("hashes.txt");
    std::fs::write(
        &hash_file,
        "root:$6$abc$rootHash\n\
         msfadmin:$6$def$adminHash\n\
         user:$6$ghi$userHash\n",
    )?;

    let runner = ScriptedRunner::new();
    runner.succeed("john", "Loaded 3 password hashes\n");
    runner.succeed(
        "john",
        "msfadmin:msfadmin\n\n1 password hash cracked, 2 left\n",
    );
    let orchestrator =
        orchestrator(runner.clone(), Arc::default(), workspace.path());

    let submission =
        orchestrator.submit(JobParameters::HashCrack(HashCrackParams {
            hash_file: hash_file.clone(),
            wordlist: None,
            format: None,
        }))?;
    let hash_file = hash_file.to_string_lossy().into_owned();
    assert_eq!(submission.job.key, format!("hash-crack:{hash_file}"));

    wait_for_terminal(&orchestrator, &submission.job.key).await;
    let status = orchestrator
        .crack_status(hash_file.trim_start_matches('/'))
        .await?;
    assert_eq!(status.state, Some(JobState::Completed));
    let report = status.report;
    assert_eq!(report.total, 3);
    assert_eq!(report.cracked_count, 1);
    let users: Vec<(&str, Option<&str>)> = report
        .credentials
        .iter()
        .map(|c| (c.username.as_str(), c.password.as_deref()))
        .collect();
    assert_eq!(
        users,
        vec![("root", None), ("msfadmin", Some("msfadmin")), ("user", None)]
    );

    let calls = runner.calls();
    assert_eq!(calls[0].args[0], "--format=sha512crypt");
    assert_eq!(calls[1].args[0], "--show");
    Ok(())
}

#[tokio::test]
async fn exploit_session_lifecycle() -> anyhow::Result<()> {
    let workspace = tempfile::tempdir()?;
    let handler = Arc::new(EchoHandler::default());
    let orchestrator = orchestrator(
        ScriptedRunner::new(),
        handler.clone(),
        workspace.path(),
    );

    let session = orchestrator
        .execute_exploit(ExploitRequest {
            target: "10.0.0.7".into(),
            exploit_module: "exploit/unix/ftp/vsftpd_234_backdoor".into(),
            options: ExploitOptions::default(),
        })
        .await?;
    assert_eq!(session.status, SessionStatus::Active);

    let output = orchestrator.command(session.id, "whoami").await?;
    assert_eq!(output, "$ whoami\n");

    orchestrator.close_session(session.id).await?;
    orchestrator.close_session(session.id).await?;
    assert_eq!(handler.terminated.lock().as_slice(), ["1".to_string()]);

    let rejected = orchestrator.command(session.id, "id").await;
    assert!(matches!(rejected, Err(ReconError::SessionNotActive(_))));
    assert_eq!(orchestrator.session(session.id)?.history.len(), 1);
    Ok(())
}

#[tokio::test]
async fn failed_exploit_is_reported_and_tracked_closed() -> anyhow::Result<()> {
    let workspace = tempfile::tempdir()?;
    let orchestrator = orchestrator(
        ScriptedRunner::new(),
        Arc::default(),
        workspace.path(),
    );

    let result = orchestrator
        .execute_exploit(ExploitRequest {
            target: "10.0.0.99".into(),
            exploit_module: "exploit/unix/ftp/vsftpd_234_backdoor".into(),
            options: ExploitOptions::default(),
        })
        .await;
    assert!(matches!(result, Err(ReconError::ExploitFailed(_))));

    let sessions = orchestrator.sessions();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].status, SessionStatus::Closed);
    assert!(matches!(
        orchestrator.session(SessionId(42)),
        Err(ReconError::NotFound(_))
    ));
    Ok(())
}

#[tokio::test]
async fn extracted_hashes_are_written_and_queued_for_cracking()
-> anyhow::Result<()> {
    let workspace = tempfile::tempdir()?;
    let handler = Arc::new(EchoHandler::default());
    *handler.shadow.lock() = Some(
        "root:$1$avpfBJ1$x0z8w5UF9Iv./DR9E9Lid.:14747:0:99999:7:::\n\
         daemon:*:14684:0:99999:7:::\n"
            .to_string(),
    );
    let runner = ScriptedRunner::new();
    runner.succeed_after("john", "", Duration::from_millis(50));
    runner.succeed("john", "0 password hashes cracked, 1 left\n");
    let orchestrator = orchestrator(runner.clone(), handler, workspace.path());

    let session = orchestrator
        .execute_exploit(ExploitRequest {
            target: "10.0.0.7".into(),
            exploit_module: "exploit/unix/ftp/vsftpd_234_backdoor".into(),
            options: ExploitOptions::default(),
        })
        .await?;

    let extraction = orchestrator
        .extract_hashes(session.id, "/etc/shadow", true)
        .await?;
    assert_eq!(extraction.count, 1);
    assert_eq!(extraction.hashes[0].username, "root");
    assert_eq!(
        std::fs::read_to_string(&extraction.file)?,
        "root:$1$avpfBJ1$x0z8w5UF9Iv./DR9E9Lid.\n"
    );

    let job = extraction.job.expect("crack job should be queued");
    assert!(job.created);
    let finished = wait_for_terminal(&orchestrator, &job.job.key).await;
    assert_eq!(finished.state, JobState::Completed);
    let JobParameters::HashCrack(params) = &finished.parameters else {
        panic!("expected crack parameters, got {:?}", finished.parameters);
    };
    assert_eq!(params.format.as_deref(), Some("md5crypt"));

    let calls = runner.calls();
    assert_eq!(calls[0].args[0], "--format=md5crypt");
    assert_eq!(calls[1].args[..2], ["--show", "--format=md5crypt"]);
    Ok(())
}

fn scan(target: &str) -> JobParameters {
    JobParameters::PortScan(PortScanParams {
        target: target.into(),
        ports: "22,80".into(),
        scan_type: ScanType::Syn,
    })
}

/// Orchestrator that runs one subprocess at a time.
fn single_slot(
    runner: Arc<ScriptedRunner>,
    config: OrchestratorConfig,
) -> Orchestrator {
    Orchestrator::with_exploit_handler(
        runner,
        ToolPaths::default(),
        OrchestratorConfig {
            max_concurrent_processes: 1,
            ..config
        },
        Arc::new(EchoHandler::default()),
    )
}

#[tokio::test]
async fn jobs_beyond_the_process_limit_wait_pending() -> anyhow::Result<()> {
    let workspace = tempfile::tempdir()?;
    let runner = ScriptedRunner::new();
    runner.succeed_after("nmap", NMAP_XML, Duration::from_millis(200));
    runner.succeed_after("nmap", NMAP_XML, Duration::from_millis(200));
    let orchestrator =
        single_slot(runner.clone(), test_config(workspace.path()));

    let started = Instant::now();
    let first = orchestrator.submit(scan("10.0.0.7"))?;
    let second = orchestrator.submit(scan("10.0.0.8"))?;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut states = vec![
        orchestrator.status(&first.job.key)?.state,
        orchestrator.status(&second.job.key)?.state,
    ];
    states.sort_by_key(|state| state.to_string());
    assert_eq!(states, [JobState::Pending, JobState::Running]);
    assert_eq!(runner.calls().len(), 1);

    let first = wait_for_terminal(&orchestrator, &first.job.key).await;
    let second = wait_for_terminal(&orchestrator, &second.job.key).await;
    assert_eq!(first.state, JobState::Completed);
    assert_eq!(second.state, JobState::Completed);
    assert!(started.elapsed() >= Duration::from_millis(400));
    Ok(())
}

#[tokio::test]
async fn synchronous_calls_give_up_when_jobs_hold_every_slot()
-> anyhow::Result<()> {
    let workspace = tempfile::tempdir()?;
    let runner = ScriptedRunner::new();
    runner.succeed_after("nmap", NMAP_XML, Duration::from_secs(1));
    runner.succeed("ifconfig", "");
    let orchestrator = single_slot(
        runner.clone(),
        OrchestratorConfig {
            command_timeout: Duration::from_millis(100),
            ..test_config(workspace.path())
        },
    );

    let job = orchestrator.submit(scan("10.0.0.7"))?;
    wait_for_state(&orchestrator, &job.job.key, JobState::Running).await;

    let started = Instant::now();
    let interfaces = orchestrator.interfaces().await;
    assert!(matches!(
        interfaces,
        Err(ReconError::ToolExecutionFailed(ref message))
            if message.contains("no process slot free")
    ));
    assert!(started.elapsed() < Duration::from_millis(900));
    assert!(runner.calls().iter().all(|call| call.program != "ifconfig"));
    Ok(())
}

#[tokio::test]
async fn crack_status_shows_passwords_while_the_job_runs()
-> anyhow::Result<()> {
    let workspace = tempfile::tempdir()?;
    let hash_file = workspace.path().join("hashes.txt");
    std::fs::write(
        &hash_file,
        "root:$1$abc$rootHash\nuser:$1$def$userHash\n",
    )?;

    let runner = ScriptedRunner::new();
    runner.succeed_after("john", "", Duration::from_millis(300));
    let shown = "root:toor\n\n1 password hash cracked, 1 left\n";
    runner.succeed("john", shown);
    runner.succeed("john", shown);
    let orchestrator =
        orchestrator(runner.clone(), Arc::default(), workspace.path());

    let submission =
        orchestrator.submit(JobParameters::HashCrack(HashCrackParams {
            hash_file: hash_file.clone(),
            wordlist: None,
            format: Some("md5crypt".into()),
        }))?;
    wait_for_state(&orchestrator, &submission.job.key, JobState::Running)
        .await;
    while runner.calls().is_empty() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let status = orchestrator
        .crack_status(&hash_file.to_string_lossy())
        .await?;
    assert_eq!(status.key, submission.job.key);
    assert_eq!(status.state, Some(JobState::Running));
    assert_eq!(status.report.total, 2);
    assert_eq!(status.report.cracked_count, 1);
    assert_eq!(
        runner.calls()[1].args[..2],
        ["--show", "--format=md5crypt"]
    );

    let finished =
        wait_for_terminal(&orchestrator, &submission.job.key).await;
    assert_eq!(finished.state, JobState::Completed);
    Ok(())
}

#[tokio::test]
async fn crack_status_reads_files_that_were_never_submitted()
-> anyhow::Result<()> {
    let workspace = tempfile::tempdir()?;
    let hash_file = workspace.path().join("hashes.txt");
    std::fs::write(&hash_file, "admin:$6$abc$adminHash\n")?;

    let runner = ScriptedRunner::new();
    runner.succeed(
        "john",
        "admin:admin\n\n1 password hash cracked, 0 left\n",
    );
    let orchestrator =
        orchestrator(runner.clone(), Arc::default(), workspace.path());

    let hash_file = hash_file.to_string_lossy().into_owned();
    let status = orchestrator
        .crack_status(hash_file.trim_start_matches('/'))
        .await?;
    assert_eq!(status.key, format!("hash-crack:{hash_file}"));
    assert_eq!(status.state, None);
    assert_eq!(status.report.cracked_count, 1);
    assert_eq!(
        status.report.credentials[0].password.as_deref(),
        Some("admin")
    );
    assert_eq!(runner.calls()[0].args[1], "--format=sha512crypt");
    assert!(orchestrator.jobs().is_empty());

    let missing = orchestrator.crack_status("nonexistent/hashes.txt").await;
    assert!(matches!(missing, Err(ReconError::NotFound(_))));
    assert_eq!(runner.calls().len(), 1);
    Ok(())
}
