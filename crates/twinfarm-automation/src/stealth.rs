//! 디바이스 환경 위장 설정.
//!
//! 계정 시간대와 무작위 배터리 상태를 주입한다. 각 단계의 실패는 기록만 하고 세션은 계속된다.
//! 중단 요청이 들어오면 남은 단계를 건너뛰고 부분 결과를 돌려준다.

use rand::Rng;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

use twinfarm_core::error::CoreError;
use twinfarm_core::models::account::AccountConfig;
use twinfarm_core::models::device::TransportEndpoint;
use twinfarm_core::ports::transport::DeviceTransport;

use crate::wait::{bounded, Bounded};

/// 배터리 잔량 최소값 (%)
pub const BATTERY_LEVEL_MIN: u8 = 40;
/// 배터리 잔량 최대값 (%)
pub const BATTERY_LEVEL_MAX: u8 = 90;
/// 배터리 상태 코드: 방전 중
pub const BATTERY_STATUS_DISCHARGING: u8 = 3;

/// 위장 설정 결과
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StealthReport {
    /// 시간대 설정 성공
    pub timezone_applied: bool,
    /// 설정된 배터리 잔량 (실패 시 None)
    pub battery_level: Option<u8>,
    /// 배터리 상태 설정 성공
    pub battery_status_applied: bool,
}

impl StealthReport {
    pub fn fully_applied(&self) -> bool {
        self.timezone_applied && self.battery_level.is_some() && self.battery_status_applied
    }
}

fn shell_args(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

/// 환경 위장 설정기
pub struct StealthConfigurator {
    transport: Arc<dyn DeviceTransport>,
}

impl StealthConfigurator {
    pub fn new(transport: Arc<dyn DeviceTransport>) -> Self {
        Self { transport }
    }

    /// 시간대 + 배터리 위장 적용 (모든 실패는 비치명적)
    pub async fn apply(
        &self,
        endpoint: &TransportEndpoint,
        account: &AccountConfig,
        shutdown: &mut watch::Receiver<bool>,
    ) -> StealthReport {
        let mut report = StealthReport::default();

        let timezone = shell_args(&["setprop", "persist.sys.timezone", &account.timezone]);
        match self.step(endpoint, &timezone, shutdown).await {
            Some(Ok(_)) => report.timezone_applied = true,
            Some(Err(e)) => warn!(endpoint = %endpoint, timezone = %account.timezone, "시간대 설정 실패: {}", e),
            None => return interrupted(endpoint, report),
        }

        let level = rand::rng().random_range(BATTERY_LEVEL_MIN..=BATTERY_LEVEL_MAX);
        let level_arg = level.to_string();
        let battery_level = shell_args(&["dumpsys", "battery", "set", "level", &level_arg]);
        match self.step(endpoint, &battery_level, shutdown).await {
            Some(Ok(_)) => report.battery_level = Some(level),
            Some(Err(e)) => warn!(endpoint = %endpoint, level, "배터리 잔량 설정 실패: {}", e),
            None => return interrupted(endpoint, report),
        }

        let status_arg = BATTERY_STATUS_DISCHARGING.to_string();
        let battery_status = shell_args(&["dumpsys", "battery", "set", "status", &status_arg]);
        match self.step(endpoint, &battery_status, shutdown).await {
            Some(Ok(_)) => report.battery_status_applied = true,
            Some(Err(e)) => warn!(endpoint = %endpoint, "배터리 상태 설정 실패: {}", e),
            None => return interrupted(endpoint, report),
        }

        info!(
            endpoint = %endpoint,
            account_id = %account.account_id,
            timezone_applied = report.timezone_applied,
            battery_level = ?report.battery_level,
            "환경 위장 설정 완료"
        );
        report
    }

    /// 런처 인텐트로 앱 실행
    pub async fn launch_app(
        &self,
        endpoint: &TransportEndpoint,
        package: &str,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<(), CoreError> {
        let args = shell_args(&[
            "monkey",
            "-p",
            package,
            "-c",
            "android.intent.category.LAUNCHER",
            "1",
        ]);
        match self.step(endpoint, &args, shutdown).await {
            Some(result) => {
                result?;
            }
            None => return Err(CoreError::Interrupted),
        }
        info!(endpoint = %endpoint, package, "앱 실행");
        Ok(())
    }

    /// 셸 명령 1회. 중단 요청 시 None
    async fn step(
        &self,
        endpoint: &TransportEndpoint,
        args: &[String],
        shutdown: &mut watch::Receiver<bool>,
    ) -> Option<Result<String, CoreError>> {
        match bounded(self.transport.shell(endpoint, args), None, shutdown).await {
            Bounded::Completed(result) => Some(result),
            Bounded::DeadlineReached | Bounded::Interrupted => None,
        }
    }
}

fn interrupted(endpoint: &TransportEndpoint, report: StealthReport) -> StealthReport {
    info!(endpoint = %endpoint, "중단 요청, 환경 위장 설정 중단");
    report
}
