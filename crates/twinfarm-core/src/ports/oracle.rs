//! 결정 오라클 포트.
//!
//! 인지 프레임(스크린샷 + 지시문)을 받아 다음 액션을 결정하는 외부 서비스.
//! 구현: `twinfarm-network::oracle_client::HttpDecisionClient`

use async_trait::async_trait;

use crate::error::CoreError;
use crate::models::decision::Decision;
use crate::models::frame::PerceptionFrame;

/// 결정 오라클
#[async_trait]
pub trait DecisionOracle: Send + Sync {
    /// 프레임 1개에 대한 결정 요청.
    ///
    /// 실패는 모두 `CoreError::Oracle`로 반환되며 호출자는 폴백 액션을 적용한다.
    async fn decide(&self, frame: &PerceptionFrame) -> Result<Decision, CoreError>;

    /// 네트워크 호출이 활성화되어 있는지 (URL 미설정 시 false)
    fn is_enabled(&self) -> bool;

    /// 오라클 이름 (로깅용)
    fn name(&self) -> &str;
}
