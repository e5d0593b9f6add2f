//! 수동 로그인 보조 명령.
//!
//! 계정 1개의 컨테이너를 깨끗하게 기동하고 수동 접속 절차를 출력한다. 행동 루프는 돌리지 않는다.

use anyhow::{bail, Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use twinfarm_core::account_store::AccountStore;
use twinfarm_core::config::FarmConfig;
use twinfarm_core::ports::container::ContainerRuntime;

/// 한 자리 숫자 계정 ID는 두 자리로 맞춘다 ("7" → "07")
pub fn normalize_account_id(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.len() == 1 && trimmed.chars().all(|c| c.is_ascii_digit()) {
        format!("0{trimmed}")
    } else {
        trimmed.to_string()
    }
}

/// 로그인용 컨테이너 기동
pub async fn run_login(
    config: &FarmConfig,
    store: &AccountStore,
    runtime: Arc<dyn ContainerRuntime>,
    raw_account_id: &str,
) -> Result<()> {
    let account_id = normalize_account_id(raw_account_id);
    let account = store.load(&account_id).with_context(|| {
        format!(
            "계정 설정을 불러올 수 없습니다: {} (프로비저닝 도구를 먼저 실행하세요)",
            store.path_for(&account_id).display()
        )
    })?;
    account.validate()?;

    println!("[*] 계정 {account_id} 로그인 세션 준비 중...");

    match runtime.image_present().await {
        Ok(true) => info!(image = %config.container.image, "이미지 확인"),
        Ok(false) => bail!(
            "디바이스 이미지 '{}'가 로컬에 없습니다. 먼저 이미지를 빌드하거나 받아 오세요.",
            config.container.image
        ),
        Err(e) => warn!("이미지 사전 점검 실패 (계속 진행): {}", e),
    }

    let host_port = config.fleet.base_port;
    let handle = runtime
        .start(&account, host_port)
        .await
        .context("컨테이너 기동 실패")?;

    let docker = if config.container.use_sudo {
        format!("sudo {}", config.container.docker_path)
    } else {
        config.container.docker_path.clone()
    };

    println!();
    println!("✅ 컨테이너 '{}' 기동 완료 (호스트 포트 {})", handle.name, handle.host_port);
    println!("{}", "-".repeat(50));
    println!("다음 단계 (수동 로그인):");
    println!("1. 필요하면 127.0.0.1:{} 로 TCP 터널을 엽니다.", handle.host_port);
    println!("2. 로컬 PC에서 접속:");
    println!("     adb connect <터널 주소 또는 localhost:{}>", handle.host_port);
    println!("     scrcpy -s <터널 주소 또는 localhost:{}>", handle.host_port);
    println!("3. 앱에 수동으로 로그인합니다.");
    println!("4. 완료 후 컨테이너 정지: {docker} stop {}", handle.name);
    println!("{}", "-".repeat(50));
    Ok(())
}
