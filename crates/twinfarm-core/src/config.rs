//! 애플리케이션 설정 구조체.
//!
//! 컨테이너 환경 프로필, 전송 채널 타임아웃, 오라클 주소, 세션 루프 주기,
//! 플릿 실행 설정을 정의한다. `ConfigManager`를 통해 JSON 파일에서 로드.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::CoreError;

/// 오라클 URL 자리표시자: 이 값이면 오라클 비활성
pub const ORACLE_URL_PLACEHOLDER: &str = "PLACEHOLDER_URL";

/// 최상위 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FarmConfig {
    /// 컨테이너 환경 프로필
    #[serde(default)]
    pub container: ContainerProfile,
    /// 전송 채널 설정
    #[serde(default)]
    pub transport: TransportConfig,
    /// 결정 오라클 설정
    #[serde(default)]
    pub oracle: OracleConfig,
    /// 세션 루프 설정
    #[serde(default)]
    pub session: SessionConfig,
    /// 플릿 실행 설정
    #[serde(default)]
    pub fleet: FleetConfig,
}

// ============================================================
// 컨테이너 프로필
// ============================================================

/// 컨테이너 환경 프로필: 실행 환경마다 다른 값을 한곳에 모은다
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerProfile {
    /// 디바이스 이미지 태그
    #[serde(default = "default_image")]
    pub image: String,
    /// 계정 데이터 루트 (`<data_root>/data_<acct>`가 `/data`로 마운트됨)
    #[serde(default = "default_data_root")]
    pub data_root: PathBuf,
    /// docker 명령 앞에 sudo를 붙일지
    #[serde(default)]
    pub use_sudo: bool,
    /// 컨테이너 이름 접두사
    #[serde(default = "default_name_prefix")]
    pub name_prefix: String,
    /// docker 실행 파일
    #[serde(default = "default_docker_path")]
    pub docker_path: String,
    /// 컨테이너 내부 전송 포트
    #[serde(default = "default_device_port")]
    pub device_port: u16,
    /// docker 명령 타임아웃 (초)
    #[serde(default = "default_docker_timeout_secs")]
    pub command_timeout_secs: u64,
}

impl Default for ContainerProfile {
    fn default() -> Self {
        Self {
            image: default_image(),
            data_root: default_data_root(),
            use_sudo: false,
            name_prefix: default_name_prefix(),
            docker_path: default_docker_path(),
            device_port: default_device_port(),
            command_timeout_secs: default_docker_timeout_secs(),
        }
    }
}

impl ContainerProfile {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

// ============================================================
// 전송 채널 설정
// ============================================================

/// 전송 채널 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// adb 실행 파일
    #[serde(default = "default_adb_path")]
    pub adb_path: String,
    /// 엔드포인트 호스트
    #[serde(default = "default_host")]
    pub host: String,
    /// 연결 타임아웃 (초)
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// 연결 폴링 간격 (밀리초)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// 부팅 완료 대기 타임아웃 (초)
    #[serde(default = "default_boot_timeout_secs")]
    pub boot_timeout_secs: u64,
    /// 개별 adb 명령 타임아웃 (초)
    #[serde(default = "default_adb_timeout_secs")]
    pub command_timeout_secs: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            adb_path: default_adb_path(),
            host: default_host(),
            connect_timeout_secs: default_connect_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            boot_timeout_secs: default_boot_timeout_secs(),
            command_timeout_secs: default_adb_timeout_secs(),
        }
    }
}

impl TransportConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn boot_timeout(&self) -> Duration {
        Duration::from_secs(self.boot_timeout_secs)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

// ============================================================
// 오라클 설정
// ============================================================

/// 결정 오라클 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    /// 오라클 베이스 URL (None 또는 자리표시자면 폴백 전용)
    #[serde(default)]
    pub base_url: Option<String>,
    /// 요청 타임아웃 (초)
    #[serde(default = "default_oracle_timeout_secs")]
    pub timeout_secs: u64,
    /// 프레임과 함께 보낼 지시문
    #[serde(default = "default_instruction")]
    pub instruction: String,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: default_oracle_timeout_secs(),
            instruction: default_instruction(),
        }
    }
}

impl OracleConfig {
    /// 실제로 호출 가능한 베이스 URL (공백/자리표시자 제외, 끝 `/` 제거)
    pub fn effective_base_url(&self) -> Option<&str> {
        self.base_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty() && *url != ORACLE_URL_PLACEHOLDER)
            .map(|url| url.trim_end_matches('/'))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ============================================================
// 세션 루프 설정
// ============================================================

/// 세션 루프 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Running 루프 지속 시간 (초)
    #[serde(default = "default_session_duration_secs")]
    pub duration_secs: u64,
    /// 반복 사이 최소 대기 (밀리초)
    #[serde(default = "default_min_pause_ms")]
    pub min_pause_ms: u64,
    /// 반복 사이 최대 대기 (밀리초)
    #[serde(default = "default_max_pause_ms")]
    pub max_pause_ms: u64,
    /// 반복 실패 후 복구 대기 (밀리초)
    #[serde(default = "default_recovery_delay_ms")]
    pub recovery_delay_ms: u64,
    /// watch_duration 상한 (초)
    #[serde(default = "default_max_watch_secs")]
    pub max_watch_secs: u64,
    /// 위장 설정 후 실행할 앱 패키지 (없으면 생략)
    #[serde(default)]
    pub target_package: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            duration_secs: default_session_duration_secs(),
            min_pause_ms: default_min_pause_ms(),
            max_pause_ms: default_max_pause_ms(),
            recovery_delay_ms: default_recovery_delay_ms(),
            max_watch_secs: default_max_watch_secs(),
            target_package: None,
        }
    }
}

impl SessionConfig {
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }

    pub fn recovery_delay(&self) -> Duration {
        Duration::from_millis(self.recovery_delay_ms)
    }

    pub fn max_watch(&self) -> Duration {
        Duration::from_secs(self.max_watch_secs)
    }
}

// ============================================================
// 플릿 설정
// ============================================================

/// 플릿 실행 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetConfig {
    /// 실행할 계정 ID (순서 유지)
    #[serde(default = "default_accounts")]
    pub accounts: Vec<String>,
    /// 세션 시작 간 간격 (초)
    #[serde(default = "default_inter_session_pause_secs")]
    pub inter_session_pause_secs: u64,
    /// 첫 슬롯의 호스트 포트
    #[serde(default = "default_base_port")]
    pub base_port: u16,
    /// 동시 실행 슬롯 수 (1 = 순차 실행)
    #[serde(default = "default_slots")]
    pub slots: usize,
    /// 계정 설정 루트 (`<configs_root>/data_<acct>/config.json`)
    #[serde(default = "default_configs_root")]
    pub configs_root: PathBuf,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            accounts: default_accounts(),
            inter_session_pause_secs: default_inter_session_pause_secs(),
            base_port: default_base_port(),
            slots: default_slots(),
            configs_root: default_configs_root(),
        }
    }
}

impl FleetConfig {
    pub fn inter_session_pause(&self) -> Duration {
        Duration::from_secs(self.inter_session_pause_secs)
    }
}

// ============================================================
// FarmConfig
// ============================================================

impl FarmConfig {
    /// 기본 설정 생성
    pub fn default_config() -> Self {
        Self::default()
    }

    /// 설정값 상호 검증
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.session.min_pause_ms > self.session.max_pause_ms {
            return Err(CoreError::validation(
                "session.min_pause_ms",
                "max_pause_ms보다 클 수 없음",
            ));
        }
        if self.fleet.slots == 0 {
            return Err(CoreError::validation("fleet.slots", "1 이상이어야 함"));
        }
        let last_port = u32::from(self.fleet.base_port) + self.fleet.slots as u32 - 1;
        if last_port > u32::from(u16::MAX) {
            return Err(CoreError::validation(
                "fleet.base_port",
                format!("슬롯 {}개가 포트 범위를 넘음", self.fleet.slots),
            ));
        }
        if self.transport.poll_interval_ms == 0 {
            return Err(CoreError::validation(
                "transport.poll_interval_ms",
                "0일 수 없음",
            ));
        }
        if self.container.image.trim().is_empty() {
            return Err(CoreError::validation("container.image", "비어 있음"));
        }
        if let Some(package) = &self.session.target_package {
            let valid = !package.is_empty()
                && package
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_');
            if !valid {
                return Err(CoreError::validation(
                    "session.target_package",
                    format!("잘못된 패키지 이름: {package}"),
                ));
            }
        }
        Ok(())
    }
}

// ============================================================
// 기본값 함수
// ============================================================

fn default_image() -> String {
    "redroid/redroid:11.0.0-native-bridge-magisk".to_string()
}

fn default_data_root() -> PathBuf {
    PathBuf::from("twin_data")
}

fn default_name_prefix() -> String {
    "android_".to_string()
}

fn default_docker_path() -> String {
    "docker".to_string()
}

fn default_device_port() -> u16 {
    5555
}

fn default_docker_timeout_secs() -> u64 {
    120
}

fn default_adb_path() -> String {
    "adb".to_string()
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_poll_interval_ms() -> u64 {
    1_000
}

fn default_boot_timeout_secs() -> u64 {
    120
}

fn default_adb_timeout_secs() -> u64 {
    20
}

fn default_oracle_timeout_secs() -> u64 {
    10
}

fn default_instruction() -> String {
    "You are a mobile app user. If the screen shows an ad, swipe up. \
     If the content is interesting, watch it for a while, then swipe up. \
     Reply with <answer>{\"action\": \"swipe_up\"|\"click\", \"bbox_2d\": [x1, y1, x2, y2], \
     \"watch_duration\": seconds}</answer>."
        .to_string()
}

fn default_session_duration_secs() -> u64 {
    20 * 60
}

fn default_min_pause_ms() -> u64 {
    3_000
}

fn default_max_pause_ms() -> u64 {
    7_000
}

fn default_recovery_delay_ms() -> u64 {
    2_000
}

fn default_max_watch_secs() -> u64 {
    60
}

fn default_accounts() -> Vec<String> {
    (1..=20).map(|i| format!("{i:02}")).collect()
}

fn default_inter_session_pause_secs() -> u64 {
    5
}

fn default_base_port() -> u16 {
    5555
}

fn default_slots() -> usize {
    1
}

fn default_configs_root() -> PathBuf {
    PathBuf::from("configs")
}
