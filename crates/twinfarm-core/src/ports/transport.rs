//! 디바이스 전송 포트.
//!
//! 실행 중인 디바이스 인스턴스에 대한 명령 채널의 기본 연산을 정의한다.
//! 재시도/폴링 정책은 상위(`TransportConnector`)가 담당하며,
//! 이 포트의 각 메서드는 명령 1회에 대응한다.
//!
//! 구현: `twinfarm-device::adb::AdbTransport`

use async_trait::async_trait;

use crate::error::CoreError;
use crate::models::device::{DeviceState, TransportEndpoint};

/// 디바이스 명령 채널
#[async_trait]
pub trait DeviceTransport: Send + Sync {
    /// 연결 요청 1회 (결과 확인은 `device_state`로)
    async fn request_connect(&self, endpoint: &TransportEndpoint) -> Result<(), CoreError>;

    /// 디바이스 목록에서 엔드포인트 상태 조회
    async fn device_state(&self, endpoint: &TransportEndpoint) -> Result<DeviceState, CoreError>;

    /// 부팅 완료까지 대기 (구현체 내부 타임아웃 적용)
    async fn wait_for_boot(&self, endpoint: &TransportEndpoint) -> Result<(), CoreError>;

    /// 원시 스크린샷 캡처 (PNG 바이트)
    async fn capture_screen(&self, endpoint: &TransportEndpoint) -> Result<Vec<u8>, CoreError>;

    /// 디바이스 셸 명령 실행 (인자 리스트), 표준 출력 반환
    async fn shell(&self, endpoint: &TransportEndpoint, args: &[String])
        -> Result<String, CoreError>;

    /// 연결 해제
    async fn disconnect(&self, endpoint: &TransportEndpoint) -> Result<(), CoreError>;
}
