//! # twinfarm-app
//!
//! TWINFARM 바이너리 진입점.
//! CLI 파싱, 로깅 초기화, 설정 로드, 어댑터 DI, 라이프사이클 관리.

mod lifecycle;
mod login;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use twinfarm_automation::controller::SessionController;
use twinfarm_automation::fleet::FleetOrchestrator;
use twinfarm_core::account_store::AccountStore;
use twinfarm_core::config::FarmConfig;
use twinfarm_core::config_manager::ConfigManager;
use twinfarm_core::models::account::parse_account_selector;
use twinfarm_core::models::session::{AccountOutcome, FleetReport};
use twinfarm_core::ports::command_runner::CommandRunner;
use twinfarm_core::ports::container::ContainerRuntime;
use twinfarm_device::adb::AdbTransport;
use twinfarm_device::docker::DockerContainerManager;
use twinfarm_device::process::TokioCommandRunner;
use twinfarm_network::oracle_client::HttpDecisionClient;

use crate::lifecycle::LifecycleManager;

/// 오라클 URL 환경 변수
const ORACLE_URL_ENV: &str = "TWINFARM_ORACLE_URL";

/// 로그 필터를 적용할 워크스페이스 크레이트
const WORKSPACE_CRATES: [&str; 6] = [
    "twinfarm",
    "twinfarm_app",
    "twinfarm_core",
    "twinfarm_device",
    "twinfarm_network",
    "twinfarm_automation",
];

/// TWINFARM: 컨테이너 디바이스 기반 디지털 트윈 세션 실행기
#[derive(Parser, Debug)]
#[command(name = "twinfarm")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// 설정 파일 경로 (기본: 플랫폼 설정 디렉토리의 config.json)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, short = 'l', default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 계정 목록에 대해 세션 실행
    Run(RunArgs),
    /// 계정 1개의 컨테이너를 기동하고 수동 로그인 절차 출력
    Login {
        /// 계정 ID (예: 01, 7)
        account: String,
    },
}

#[derive(Args, Debug, Default)]
struct RunArgs {
    /// 계정 선택 (예: "01-20", "01,03,07")
    #[arg(long, short = 'a')]
    accounts: Option<String>,

    /// 동시 실행 세션 수
    #[arg(long, short = 'n')]
    concurrency: Option<usize>,

    /// 세션 지속 시간 (분)
    #[arg(long)]
    session_minutes: Option<u64>,

    /// 결정 오라클 베이스 URL
    #[arg(long)]
    oracle_url: Option<String>,

    /// 계정 설정 루트 디렉토리
    #[arg(long)]
    configs_root: Option<PathBuf>,

    /// 플릿 결과(JSON) 저장 경로
    #[arg(long)]
    report: Option<PathBuf>,
}

/// 로그 필터 문자열: 워크스페이스 크레이트마다 같은 레벨
fn log_filter(level: &str) -> String {
    WORKSPACE_CRATES
        .iter()
        .map(|krate| format!("{krate}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// CLI 인자와 환경 변수를 설정에 반영 (파일에는 저장하지 않음).
///
/// 오라클 URL 우선순위: CLI > 설정 파일 > 환경 변수.
fn apply_overrides(
    config: &mut FarmConfig,
    args: &RunArgs,
    env_oracle_url: Option<String>,
) -> Result<()> {
    if let Some(selector) = &args.accounts {
        config.fleet.accounts = parse_account_selector(selector)?;
    }
    if let Some(slots) = args.concurrency {
        config.fleet.slots = slots;
    }
    if let Some(minutes) = args.session_minutes {
        config.session.duration_secs = minutes * 60;
    }
    if let Some(root) = &args.configs_root {
        config.fleet.configs_root = root.clone();
    }

    if let Some(url) = &args.oracle_url {
        config.oracle.base_url = Some(url.clone());
    } else if config.oracle.effective_base_url().is_none() {
        if let Some(url) = env_oracle_url {
            config.oracle.base_url = Some(url);
        }
    }

    config.validate()?;
    Ok(())
}

fn load_config(path: Option<PathBuf>) -> Result<ConfigManager> {
    let manager = match path {
        Some(path) => ConfigManager::with_path(path)?,
        None => ConfigManager::new()?,
    };
    info!("설정 파일: {}", manager.config_path().display());
    Ok(manager)
}

fn container_runtime(config: &FarmConfig, runner: Arc<dyn CommandRunner>) -> Arc<dyn ContainerRuntime> {
    Arc::new(DockerContainerManager::new(config.container.clone(), runner))
}

/// 플릿 실행 명령
async fn run_fleet(config: FarmConfig, report_path: Option<PathBuf>) -> Result<()> {
    let runner: Arc<dyn CommandRunner> = Arc::new(TokioCommandRunner::new());
    let runtime = container_runtime(&config, runner.clone());
    let transport = Arc::new(AdbTransport::new(config.transport.clone(), runner));
    let oracle = Arc::new(HttpDecisionClient::new(&config.oracle)?);

    match runtime.image_present().await {
        Ok(true) => {}
        Ok(false) => warn!(image = %config.container.image, "디바이스 이미지가 로컬에 없음, 컨테이너 기동이 실패할 수 있음"),
        Err(e) => warn!("이미지 사전 점검 실패: {}", e),
    }

    let controller = Arc::new(SessionController::new(runtime, transport, oracle, &config));
    let store = AccountStore::new(&config.fleet.configs_root);
    let orchestrator = FleetOrchestrator::new(store, controller, &config.fleet)?;

    let lifecycle = Arc::new(LifecycleManager::new());
    let shutdown_rx = lifecycle.subscribe();
    let signal_lifecycle = lifecycle.clone();
    tokio::spawn(async move {
        if let Err(e) = signal_lifecycle.wait_for_signal().await {
            warn!("시그널 핸들러 등록 실패: {}", e);
        }
    });

    let report = orchestrator.run(&config.fleet.accounts, shutdown_rx).await;
    print_summary(&report);

    if let Some(path) = report_path {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(&path, json)
            .with_context(|| format!("리포트 저장 실패: {}", path.display()))?;
        info!("플릿 리포트 저장: {}", path.display());
    }
    Ok(())
}

fn print_summary(report: &FleetReport) {
    println!();
    println!("{:<10} {:<10} {:>10} {:>10}  사유", "계정", "결과", "반복", "폴백");
    for outcome in &report.outcomes {
        match outcome {
            AccountOutcome::Completed(session) => println!(
                "{:<10} {:<10} {:>10} {:>10}  {}",
                session.account_id,
                session.final_state.to_string(),
                session.counters.iterations,
                session.counters.fallback_actions,
                session.abort_message.as_deref().unwrap_or("-"),
            ),
            AccountOutcome::Skipped {
                account_id,
                message,
                ..
            } => println!(
                "{:<10} {:<10} {:>10} {:>10}  {}",
                account_id, "skipped", "-", "-", message
            ),
        }
    }
    println!(
        "\n완료 {} / 중단 {} / 건너뜀 {}{}",
        report.completed_count(),
        report.aborted_count(),
        report.skipped_count(),
        if report.interrupted { " (중단 요청으로 조기 종료)" } else { "" }
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(log_filter(&cli.log_level))),
        )
        .init();

    let manager = load_config(cli.config)?;
    let mut config = manager.get();

    match cli.command {
        Command::Run(args) => {
            apply_overrides(&mut config, &args, std::env::var(ORACLE_URL_ENV).ok())?;
            info!(
                accounts = config.fleet.accounts.len(),
                slots = config.fleet.slots,
                duration_secs = config.session.duration_secs,
                oracle = config.oracle.effective_base_url().unwrap_or("(폴백 전용)"),
                "플릿 실행 준비"
            );
            run_fleet(config, args.report).await
        }
        Command::Login { account } => {
            config.validate()?;
            let runner: Arc<dyn CommandRunner> = Arc::new(TokioCommandRunner::new());
            let runtime = container_runtime(&config, runner);
            let store = AccountStore::new(&config.fleet.configs_root);
            login::run_login(&config, &store, runtime, &account).await
        }
    }
}
