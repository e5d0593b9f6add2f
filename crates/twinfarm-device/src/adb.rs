//! adb 기반 디바이스 전송 채널.
//!
//! `DeviceTransport`의 각 메서드는 adb 명령 1회(부팅 대기는 예외)에 대응한다.
//! 연결 재시도 정책은 `twinfarm-automation::connector`가 담당한다.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use twinfarm_core::config::TransportConfig;
use twinfarm_core::error::CoreError;
use twinfarm_core::models::device::{DeviceState, TransportEndpoint};
use twinfarm_core::models::frame::PNG_SIGNATURE;
use twinfarm_core::ports::command_runner::{CommandOutput, CommandRunner, ExternalCommand};
use twinfarm_core::ports::transport::DeviceTransport;

/// 부팅 완료 속성 폴링 간격
const BOOT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// adb CLI 기반 `DeviceTransport` 구현
pub struct AdbTransport {
    config: TransportConfig,
    runner: Arc<dyn CommandRunner>,
}

impl AdbTransport {
    pub fn new(config: TransportConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self { config, runner }
    }

    fn command(&self) -> ExternalCommand {
        ExternalCommand::new(&self.config.adb_path).with_timeout(self.config.command_timeout())
    }

    /// `-s <ep>` 대상 지정 명령
    fn targeted(&self, endpoint: &TransportEndpoint) -> ExternalCommand {
        self.command().arg("-s").arg(endpoint.to_string())
    }

    async fn run_checked(&self, command: ExternalCommand) -> Result<CommandOutput, CoreError> {
        let output = self.runner.run(&command).await?;
        if !output.success() {
            return Err(CoreError::Command {
                program: self.config.adb_path.clone(),
                message: format!(
                    "{} (종료 코드 {:?}): {}",
                    command, output.exit_code, output.stderr
                ),
            });
        }
        Ok(output)
    }

    async fn boot_completed(&self, endpoint: &TransportEndpoint) -> Result<bool, CoreError> {
        let command = self
            .targeted(endpoint)
            .args(["shell", "getprop", "sys.boot_completed"]);
        let output = self.run_checked(command).await?;
        Ok(output.stdout_text() == "1")
    }
}

/// `adb devices` 출력에서 엔드포인트 상태를 찾는다.
///
/// 첫 줄("List of devices attached")과 데몬 로그(`*`로 시작)는 무시한다.
pub fn parse_device_listing(output: &str, endpoint: &TransportEndpoint) -> DeviceState {
    let target = endpoint.to_string();
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('*') && !line.starts_with("List of"))
        .find_map(|line| {
            let mut parts = line.split_whitespace();
            let serial = parts.next()?;
            let state = parts.next()?;
            (serial == target).then(|| DeviceState::from_token(state))
        })
        .unwrap_or(DeviceState::Absent)
}

#[async_trait]
impl DeviceTransport for AdbTransport {
    async fn request_connect(&self, endpoint: &TransportEndpoint) -> Result<(), CoreError> {
        let command = self.command().arg("connect").arg(endpoint.to_string());
        let output = self.run_checked(command).await?;

        // adb connect는 실패해도 종료 코드 0을 반환하는 경우가 있다
        let text = output.stdout_text().to_ascii_lowercase();
        if text.contains("failed") || text.contains("cannot") || text.contains("unable") {
            return Err(CoreError::Command {
                program: self.config.adb_path.clone(),
                message: format!("connect {endpoint}: {}", output.stdout_text()),
            });
        }
        debug!(endpoint = %endpoint, "adb connect 요청: {}", output.stdout_text());
        Ok(())
    }

    async fn device_state(&self, endpoint: &TransportEndpoint) -> Result<DeviceState, CoreError> {
        let output = self.run_checked(self.command().arg("devices")).await?;
        Ok(parse_device_listing(
            &String::from_utf8_lossy(&output.stdout),
            endpoint,
        ))
    }

    async fn wait_for_boot(&self, endpoint: &TransportEndpoint) -> Result<(), CoreError> {
        let limit = self.config.boot_timeout();
        let deadline = Instant::now() + limit;

        let wait = self
            .targeted(endpoint)
            .arg("wait-for-device")
            .with_timeout(limit);
        self.run_checked(wait).await?;

        loop {
            match self.boot_completed(endpoint).await {
                Ok(true) => {
                    info!(endpoint = %endpoint, "디바이스 부팅 완료");
                    return Ok(());
                }
                Ok(false) => debug!(endpoint = %endpoint, "부팅 진행 중"),
                Err(e) => debug!(endpoint = %endpoint, "부팅 상태 조회 실패: {}", e),
            }

            if Instant::now() + BOOT_POLL_INTERVAL > deadline {
                warn!(endpoint = %endpoint, "부팅 대기 타임아웃");
                return Err(CoreError::ExecutionTimeout {
                    timeout_ms: limit.as_millis() as u64,
                });
            }
            tokio::time::sleep(BOOT_POLL_INTERVAL).await;
        }
    }

    async fn capture_screen(&self, endpoint: &TransportEndpoint) -> Result<Vec<u8>, CoreError> {
        let command = self.targeted(endpoint).args(["exec-out", "screencap", "-p"]);
        let output = self
            .run_checked(command)
            .await
            .map_err(|e| CoreError::Capture(e.to_string()))?;

        if !output.stdout.starts_with(&PNG_SIGNATURE) {
            return Err(CoreError::Capture(format!(
                "PNG 아님 ({} 바이트)",
                output.stdout.len()
            )));
        }
        Ok(output.stdout)
    }

    async fn shell(
        &self,
        endpoint: &TransportEndpoint,
        args: &[String],
    ) -> Result<String, CoreError> {
        let command = self.targeted(endpoint).arg("shell").args(args.iter().cloned());
        let output = self.run_checked(command).await?;
        Ok(output.stdout_text())
    }

    async fn disconnect(&self, endpoint: &TransportEndpoint) -> Result<(), CoreError> {
        let command = self.command().arg("disconnect").arg(endpoint.to_string());
        self.run_checked(command).await?;
        debug!(endpoint = %endpoint, "adb 연결 해제");
        Ok(())
    }
}
