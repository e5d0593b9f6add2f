//! 디바이스/컨테이너 모델.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 전송 엔드포인트 (host:port)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransportEndpoint {
    pub host: String,
    pub port: u16,
}

impl TransportEndpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for TransportEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// 디바이스 목록 조회 결과 상태
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceState {
    /// 명령 수신 가능
    Ready,
    /// 연결되었으나 응답 없음
    Offline,
    /// 인증 대기
    Unauthorized,
    /// 목록에 없음
    Absent,
    /// 기타 상태 문자열 (예: "connecting", "authorizing")
    Other(String),
}

impl DeviceState {
    /// 디바이스 목록의 상태 토큰을 해석
    pub fn from_token(token: &str) -> Self {
        match token {
            "device" => DeviceState::Ready,
            "offline" => DeviceState::Offline,
            "unauthorized" => DeviceState::Unauthorized,
            other => DeviceState::Other(other.to_string()),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, DeviceState::Ready)
    }
}

/// 기동된 컨테이너 핸들
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerHandle {
    /// 컨테이너 이름 (예: "android_01")
    pub name: String,
    /// 호스트에 매핑된 전송 포트
    pub host_port: u16,
    /// 기동 명령이 반환한 컨테이너 ID (있는 경우)
    pub container_id: Option<String>,
}
