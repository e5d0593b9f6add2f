//! 플릿 실행 통합 테스트.
//!
//! 실제 docker/adb 어댑터 + 스크립트 명령 실행기 + mockito 오라클로
//! 계정 로드 → 컨테이너 → 연결 → 루프 → 정리 전체 흐름을 검증한다.

use mockito::{Matcher, Server};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::watch;

use twinfarm_automation::controller::SessionController;
use twinfarm_automation::fleet::FleetOrchestrator;
use twinfarm_core::account_store::AccountStore;
use twinfarm_core::config::FarmConfig;
use twinfarm_core::error::FailureKind;
use twinfarm_core::models::account::{AccountConfig, ProxyConfig};
use twinfarm_core::models::frame::PNG_SIGNATURE;
use twinfarm_core::models::session::{AccountOutcome, SessionState};
use twinfarm_core::ports::command_runner::ExternalCommand;
use twinfarm_device::adb::AdbTransport;
use twinfarm_device::docker::DockerContainerManager;
use twinfarm_device::scripted::{failed_output, ok_output, ScriptedCommandRunner};
use twinfarm_network::oracle_client::HttpDecisionClient;

fn account(id: &str) -> AccountConfig {
    AccountConfig {
        account_id: id.to_string(),
        mac_address: "02:00:00:00:00:01".to_string(),
        device_model: "Pixel 7".to_string(),
        timezone: "Asia/Seoul".to_string(),
        proxy: ProxyConfig {
            ip: "198.51.100.4".to_string(),
            port: 3128,
            user: "user".to_string(),
            pass: "pass".to_string(),
        },
    }
}

/// 1초 세션, 짧은 대기
fn fast_config(configs_root: &std::path::Path, oracle_url: Option<String>) -> FarmConfig {
    let mut config = FarmConfig::default_config();
    config.session.duration_secs = 1;
    config.session.min_pause_ms = 10;
    config.session.max_pause_ms = 20;
    config.session.recovery_delay_ms = 50;
    config.transport.poll_interval_ms = 20;
    config.fleet.inter_session_pause_secs = 0;
    config.fleet.configs_root = configs_root.to_path_buf();
    config.container.data_root = configs_root.to_path_buf();
    config.oracle.base_url = oracle_url;
    config.oracle.timeout_secs = 2;
    config
}

/// 부팅이 끝난 디바이스처럼 응답하는 실행기
fn healthy_runner() -> Arc<ScriptedCommandRunner> {
    let runner = Arc::new(ScriptedCommandRunner::new());
    runner.respond_when_arg("run", ok_output("3f9c2a7b1d\n"));
    runner.respond_when_arg(
        "devices",
        ok_output("List of devices attached\nlocalhost:5555\tdevice\n"),
    );
    runner.respond_when_arg("sys.boot_completed", ok_output("1\n"));
    let mut png = PNG_SIGNATURE.to_vec();
    png.extend_from_slice(&[0u8; 32]);
    runner.respond_when_arg("screencap", ok_output(png));
    runner
}

fn orchestrator(config: &FarmConfig, runner: Arc<ScriptedCommandRunner>) -> FleetOrchestrator {
    let runtime = Arc::new(DockerContainerManager::new(
        config.container.clone(),
        runner.clone(),
    ));
    let transport = Arc::new(AdbTransport::new(config.transport.clone(), runner));
    let oracle = Arc::new(HttpDecisionClient::new(&config.oracle).unwrap());
    let controller = Arc::new(SessionController::new(runtime, transport, oracle, config));
    let store = AccountStore::new(&config.fleet.configs_root);
    FleetOrchestrator::new(store, controller, &config.fleet).unwrap()
}

fn is_docker(cmd: &ExternalCommand) -> bool {
    cmd.program == "docker"
}

fn mentions(cmd: &ExternalCommand, needle: &str) -> bool {
    cmd.args.iter().any(|a| a.contains(needle))
}

#[tokio::test]
async fn fleet_runs_configured_account_and_skips_missing_one() {
    let dir = TempDir::new().unwrap();
    let store = AccountStore::new(dir.path());
    store.save(&account("01")).unwrap();

    let mut server = Server::new_async().await;
    let oracle_mock = server
        .mock("POST", "/analyze")
        .match_body(Matcher::Regex("\"prompt\"".to_string()))
        .with_status(200)
        .with_body(
            "<answer>{\"action\": \"click\", \"bbox_2d\": [100, 200, 300, 400], \"watch_duration\": 0.05}</answer>",
        )
        .expect_at_least(1)
        .create_async()
        .await;

    let config = fast_config(dir.path(), Some(server.url()));
    let runner = healthy_runner();
    let fleet = orchestrator(&config, runner.clone());
    let (_tx, rx) = watch::channel(false);

    let report = fleet
        .run(&["01".to_string(), "02".to_string()], rx)
        .await;

    oracle_mock.assert_async().await;
    assert!(!report.interrupted);
    assert_eq!(report.outcomes.len(), 2);

    let AccountOutcome::Completed(session) = &report.outcomes[0] else {
        panic!("01은 세션을 실행해야 함: {:?}", report.outcomes[0]);
    };
    assert_eq!(session.final_state, SessionState::Done);
    assert!(session.teardown_ran);
    assert!(session.counters.iterations >= 1);
    assert!(session.counters.decided_actions >= 1);
    assert_eq!(session.counters.oracle_failures, 0);

    assert!(matches!(
        report.outcomes[1],
        AccountOutcome::Skipped {
            reason: FailureKind::ConfigMissing,
            ..
        }
    ));

    let calls = runner.calls();
    // 설정 없는 계정은 컨테이너 명령이 전혀 없다
    assert!(!calls.iter().any(|c| mentions(c, "android_02")));

    // docker: rm -f → run → stop → rm -f
    let docker: Vec<&str> = calls
        .iter()
        .filter(|c| is_docker(c))
        .map(|c| c.args[0].as_str())
        .collect();
    assert_eq!(docker, vec!["rm", "run", "stop", "rm"]);

    // 위장 설정과 bbox 중심 근처 탭
    assert!(calls
        .iter()
        .any(|c| mentions(c, "persist.sys.timezone") && mentions(c, "Asia/Seoul")));
    let tap = calls
        .iter()
        .find(|c| c.args.iter().any(|a| a == "tap"))
        .expect("탭 명령이 있어야 함");
    let n = tap.args.len();
    let x: i32 = tap.args[n - 2].parse().unwrap();
    let y: i32 = tap.args[n - 1].parse().unwrap();
    assert!((195..=205).contains(&x));
    assert!((295..=305).contains(&y));

    assert_eq!(runner.count_with_arg("disconnect"), 1);
}

#[tokio::test]
async fn oracle_outage_falls_back_to_swipes() {
    let dir = TempDir::new().unwrap();
    AccountStore::new(dir.path()).save(&account("01")).unwrap();

    let mut server = Server::new_async().await;
    server
        .mock("POST", "/analyze")
        .with_status(503)
        .with_body("model loading")
        .create_async()
        .await;

    let config = fast_config(dir.path(), Some(server.url()));
    let runner = healthy_runner();
    let (_tx, rx) = watch::channel(false);

    let report = orchestrator(&config, runner.clone())
        .run(&["01".to_string()], rx)
        .await;

    let AccountOutcome::Completed(session) = &report.outcomes[0] else {
        panic!("세션이 실행되어야 함");
    };
    assert_eq!(session.final_state, SessionState::Done);
    assert!(session.counters.oracle_failures >= 1);
    assert_eq!(
        session.counters.fallback_actions,
        session.counters.oracle_failures
    );
    assert!(runner.count_with_arg("swipe") >= 1);
    assert_eq!(runner.count_with_arg("tap"), 0);
}

#[tokio::test]
async fn fallback_only_mode_never_calls_network() {
    let dir = TempDir::new().unwrap();
    AccountStore::new(dir.path()).save(&account("01")).unwrap();

    let config = fast_config(dir.path(), None);
    let runner = healthy_runner();
    let (_tx, rx) = watch::channel(false);

    let report = orchestrator(&config, runner.clone())
        .run(&["01".to_string()], rx)
        .await;

    let AccountOutcome::Completed(session) = &report.outcomes[0] else {
        panic!("세션이 실행되어야 함");
    };
    assert_eq!(session.final_state, SessionState::Done);
    assert_eq!(session.counters.decided_actions, 0);
    assert!(session.counters.fallback_actions >= 1);
}

#[tokio::test]
async fn launch_failure_aborts_with_single_cleanup() {
    let dir = TempDir::new().unwrap();
    AccountStore::new(dir.path()).save(&account("01")).unwrap();

    let config = fast_config(dir.path(), None);
    let runner = healthy_runner();
    runner.respond_when_arg("run", failed_output(125, "port is already allocated"));
    let (_tx, rx) = watch::channel(false);

    let report = orchestrator(&config, runner.clone())
        .run(&["01".to_string()], rx)
        .await;

    let AccountOutcome::Completed(session) = &report.outcomes[0] else {
        panic!("세션 리포트가 있어야 함");
    };
    assert_eq!(session.final_state, SessionState::Aborted);
    assert_eq!(session.abort_reason, Some(FailureKind::Launch));
    assert!(session.teardown_ran);

    assert_eq!(runner.count_with_arg("stop"), 1);
    assert_eq!(runner.count_with_arg("connect"), 0);
    assert_eq!(runner.count_with_arg("disconnect"), 0);
}

#[tokio::test]
async fn unreachable_device_aborts_after_connect_timeout() {
    let dir = TempDir::new().unwrap();
    AccountStore::new(dir.path()).save(&account("01")).unwrap();

    let mut config = fast_config(dir.path(), None);
    config.transport.connect_timeout_secs = 1;
    let runner = healthy_runner();
    runner.respond_when_arg("devices", ok_output("List of devices attached\n"));
    let (_tx, rx) = watch::channel(false);

    let report = orchestrator(&config, runner.clone())
        .run(&["01".to_string()], rx)
        .await;

    let AccountOutcome::Completed(session) = &report.outcomes[0] else {
        panic!("세션 리포트가 있어야 함");
    };
    assert_eq!(session.final_state, SessionState::Aborted);
    assert_eq!(session.abort_reason, Some(FailureKind::ConnectTimeout));
    assert_eq!(runner.count_with_arg("stop"), 1);
    assert_eq!(runner.count_with_arg("disconnect"), 1);
    assert_eq!(runner.count_with_arg("screencap"), 0);
}
