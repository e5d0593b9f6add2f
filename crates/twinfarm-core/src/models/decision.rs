//! 결정 모델.
//!
//! 오라클이 반환한 결정(`Decision`)과, 이를 화면 좌표로 변환한 실행 계획(`PlannedAction`).
//!
//! ## bbox 좌표 규약
//!
//! `bbox_2d = [x1, y1, x2, y2]`: 최소 모서리(좌상단) 다음 최대 모서리(우하단),
//! 디바이스 화면 픽셀 단위 (x = 열, y = 행). `[ymin, xmin, ymax, xmax]` 순서는 지원하지 않는다.

use serde::{Deserialize, Serialize};

/// 폴백 스와이프 시작점 (지터 적용 전)
pub const FALLBACK_SWIPE_FROM: ScreenPoint = ScreenPoint { x: 360, y: 1000 };
/// 폴백 스와이프 끝점 (지터 적용 전)
pub const FALLBACK_SWIPE_TO: ScreenPoint = ScreenPoint { x: 360, y: 400 };

/// 오라클이 지시한 액션 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionAction {
    /// 다음 콘텐츠로 위로 스와이프
    SwipeUp,
    /// bbox 중심 탭
    Click,
    /// 인식할 수 없는 액션 (폴백 대상)
    #[serde(other)]
    Unknown,
}

/// UI 요소 위치: `[x1, y1, x2, y2]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl From<[f64; 4]> for BoundingBox {
    fn from([x1, y1, x2, y2]: [f64; 4]) -> Self {
        Self { x1, y1, x2, y2 }
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.x1, b.y1, b.x2, b.y2]
    }
}

impl BoundingBox {
    /// 중심점: `((x1+x2)/2, (y1+y2)/2)`, 내림(floor) 나눗셈
    pub fn center(&self) -> ScreenPoint {
        ScreenPoint {
            x: ((self.x1 + self.x2) / 2.0).floor() as i32,
            y: ((self.y1 + self.y2) / 2.0).floor() as i32,
        }
    }

    /// 네 값이 모두 유한한 수인지
    pub fn is_finite(&self) -> bool {
        [self.x1, self.y1, self.x2, self.y2]
            .iter()
            .all(|v| v.is_finite())
    }
}

/// 오라클 결정 (루프 1회당 생성 후 즉시 소비)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// 액션 종류
    pub action: DecisionAction,
    /// 탭 대상 위치
    #[serde(rename = "bbox_2d", default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BoundingBox>,
    /// 시청 시간 (초)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watch_duration: Option<f64>,
}

impl Decision {
    /// 결정을 실행 계획으로 변환.
    ///
    /// 결정할 수 없는 경우(`Unknown`, bbox 없는 `Click`) `None`: 호출자가 폴백을 적용한다.
    pub fn planned_action(&self) -> Option<PlannedAction> {
        match self.action {
            DecisionAction::SwipeUp => Some(PlannedAction::fallback()),
            DecisionAction::Click => self
                .bbox
                .filter(BoundingBox::is_finite)
                .map(|bbox| PlannedAction::Tap(bbox.center())),
            DecisionAction::Unknown => None,
        }
    }
}

/// 화면 좌표 (픽셀)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: i32,
    pub y: i32,
}

/// 지터 적용 전 실행 계획
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlannedAction {
    /// 직선 스와이프
    Swipe { from: ScreenPoint, to: ScreenPoint },
    /// 탭
    Tap(ScreenPoint),
}

impl PlannedAction {
    /// 기본 위로 스와이프 (360,1000) → (360,400)
    pub fn fallback() -> Self {
        PlannedAction::Swipe {
            from: FALLBACK_SWIPE_FROM,
            to: FALLBACK_SWIPE_TO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn click_center_uses_floor_division() {
        let bbox = BoundingBox::from([100.0, 200.0, 300.0, 400.0]);
        assert_eq!(bbox.center(), ScreenPoint { x: 200, y: 300 });

        let odd = BoundingBox::from([101.0, 200.0, 302.0, 401.0]);
        assert_eq!(odd.center(), ScreenPoint { x: 201, y: 300 });
    }

    #[test]
    fn click_decision_maps_to_tap() {
        let decision: Decision =
            serde_json::from_str(r#"{"action": "click", "bbox_2d": [100, 200, 300, 400]}"#)
                .unwrap();
        assert_eq!(
            decision.planned_action(),
            Some(PlannedAction::Tap(ScreenPoint { x: 200, y: 300 }))
        );
    }

    #[test]
    fn click_without_bbox_needs_fallback() {
        let decision: Decision = serde_json::from_str(r#"{"action": "click"}"#).unwrap();
        assert_eq!(decision.planned_action(), None);
    }

    #[test]
    fn swipe_up_uses_base_coordinates() {
        let decision: Decision =
            serde_json::from_str(r#"{"action": "swipe_up", "watch_duration": 4.5}"#).unwrap();
        assert_eq!(decision.watch_duration, Some(4.5));
        assert_eq!(
            decision.planned_action(),
            Some(PlannedAction::Swipe {
                from: ScreenPoint { x: 360, y: 1000 },
                to: ScreenPoint { x: 360, y: 400 },
            })
        );
    }

    #[test]
    fn unrecognized_action_is_unknown() {
        let decision: Decision = serde_json::from_str(r#"{"action": "like"}"#).unwrap();
        assert_eq!(decision.action, DecisionAction::Unknown);
        assert_eq!(decision.planned_action(), None);
    }

    #[test]
    fn bbox_must_have_four_numbers() {
        let result = serde_json::from_str::<Decision>(r#"{"action": "click", "bbox_2d": [1, 2, 3]}"#);
        assert!(result.is_err());
    }
}
