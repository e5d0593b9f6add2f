//! 제스처 실행기.
//!
//! 실행 계획(`PlannedAction`)에 사람 손과 비슷한 무작위 지터를 더해
//! 디바이스 입력 명령(`input swipe` / `input tap`)으로 전송한다.

use rand::Rng;
use std::sync::Arc;
use tracing::debug;

use twinfarm_core::error::CoreError;
use twinfarm_core::models::decision::{PlannedAction, ScreenPoint};
use twinfarm_core::models::device::TransportEndpoint;
use twinfarm_core::ports::transport::DeviceTransport;

/// 스와이프 좌표 지터 (±px)
pub const SWIPE_JITTER_PX: i32 = 10;
/// 탭 좌표 지터 (±px)
pub const TAP_JITTER_PX: i32 = 5;
/// 스와이프 최소 지속 시간 (밀리초)
pub const SWIPE_MIN_MS: u32 = 200;
/// 스와이프 최대 지속 시간 (밀리초)
pub const SWIPE_MAX_MS: u32 = 500;

/// 지터가 적용된 실제 입력
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gesture {
    Swipe {
        from: ScreenPoint,
        to: ScreenPoint,
        duration_ms: u32,
    },
    Tap(ScreenPoint),
}

impl Gesture {
    /// 디바이스 셸 인자 (`input swipe x1 y1 x2 y2 ms` / `input tap x y`)
    pub fn shell_args(&self) -> Vec<String> {
        match *self {
            Gesture::Swipe {
                from,
                to,
                duration_ms,
            } => vec![
                "input".to_string(),
                "swipe".to_string(),
                from.x.to_string(),
                from.y.to_string(),
                to.x.to_string(),
                to.y.to_string(),
                duration_ms.to_string(),
            ],
            Gesture::Tap(at) => vec![
                "input".to_string(),
                "tap".to_string(),
                at.x.to_string(),
                at.y.to_string(),
            ],
        }
    }
}

/// 좌표 하나에 ±`radius` 지터 적용 (음수 좌표는 0으로 고정)
fn jitter_point<R: Rng>(rng: &mut R, point: ScreenPoint, radius: i32) -> ScreenPoint {
    ScreenPoint {
        x: (point.x + rng.random_range(-radius..=radius)).max(0),
        y: (point.y + rng.random_range(-radius..=radius)).max(0),
    }
}

/// 스와이프 계획: 네 좌표에 독립 지터, 지속 시간 [200, 500]ms
pub fn plan_swipe<R: Rng>(rng: &mut R, from: ScreenPoint, to: ScreenPoint) -> Gesture {
    Gesture::Swipe {
        from: jitter_point(rng, from, SWIPE_JITTER_PX),
        to: jitter_point(rng, to, SWIPE_JITTER_PX),
        duration_ms: rng.random_range(SWIPE_MIN_MS..=SWIPE_MAX_MS),
    }
}

/// 탭 계획: 좌표에 ±5 지터
pub fn plan_tap<R: Rng>(rng: &mut R, at: ScreenPoint) -> Gesture {
    Gesture::Tap(jitter_point(rng, at, TAP_JITTER_PX))
}

/// 실행 계획 → 지터 적용된 제스처
pub fn plan_gesture<R: Rng>(rng: &mut R, action: PlannedAction) -> Gesture {
    match action {
        PlannedAction::Swipe { from, to } => plan_swipe(rng, from, to),
        PlannedAction::Tap(at) => plan_tap(rng, at),
    }
}

/// 디바이스 입력 실행기
pub struct ActionExecutor {
    transport: Arc<dyn DeviceTransport>,
}

impl ActionExecutor {
    pub fn new(transport: Arc<dyn DeviceTransport>) -> Self {
        Self { transport }
    }

    /// 지터 적용 후 전송.
    ///
    /// 전송 실패는 `CoreError::ActionDispatch`로 반환되며, 루프는 이를 집계만 하고 계속한다.
    pub async fn perform(
        &self,
        endpoint: &TransportEndpoint,
        action: PlannedAction,
    ) -> Result<Gesture, CoreError> {
        let gesture = plan_gesture(&mut rand::rng(), action);
        self.dispatch(endpoint, gesture).await?;
        Ok(gesture)
    }

    /// 직선 스와이프
    pub async fn swipe(
        &self,
        endpoint: &TransportEndpoint,
        from: ScreenPoint,
        to: ScreenPoint,
    ) -> Result<Gesture, CoreError> {
        self.perform(endpoint, PlannedAction::Swipe { from, to })
            .await
    }

    /// 탭
    pub async fn click(
        &self,
        endpoint: &TransportEndpoint,
        at: ScreenPoint,
    ) -> Result<Gesture, CoreError> {
        self.perform(endpoint, PlannedAction::Tap(at)).await
    }

    async fn dispatch(&self, endpoint: &TransportEndpoint, gesture: Gesture) -> Result<(), CoreError> {
        debug!(endpoint = %endpoint, ?gesture, "제스처 전송");
        self.transport
            .shell(endpoint, &gesture.shell_args())
            .await
            .map(|_| ())
            .map_err(|e| CoreError::ActionDispatch(format!("{gesture:?}: {e}")))
    }
}
