//! 컨테이너 런타임 포트.
//!
//! 구현: `twinfarm-device::docker::DockerContainerManager`

use async_trait::async_trait;

use crate::error::CoreError;
use crate::models::account::AccountConfig;
use crate::models::device::ContainerHandle;

/// 격리 디바이스 컨테이너 관리자
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// 계정의 컨테이너 이름 (예: "android_01")
    fn container_name(&self, account_id: &str) -> String;

    /// 동일 이름의 기존 컨테이너를 제거한 뒤 새 컨테이너 기동.
    ///
    /// 기동 명령이 실패하면 `CoreError::Launch`.
    async fn start(
        &self,
        account: &AccountConfig,
        host_port: u16,
    ) -> Result<ContainerHandle, CoreError>;

    /// 컨테이너 정지 및 제거. 이미 없는 컨테이너는 no-op 성공.
    async fn stop(&self, handle: &ContainerHandle) -> Result<(), CoreError>;

    /// 설정된 이미지가 로컬에 있는지 (사전 점검)
    async fn image_present(&self) -> Result<bool, CoreError>;
}
