//! 세션 모델.
//!
//! 계정 1개의 디지털 트윈 세션 상태와, 종료 후 호출자에게 반환되는 리포트.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::time::Instant;

use crate::error::{CoreError, FailureKind};
use crate::models::device::TransportEndpoint;

/// 세션 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    /// 컨테이너 기동 중
    Provisioning,
    /// 전송 채널 연결 중
    Connecting,
    /// 환경 위장 설정 중
    Configuring,
    /// 인지-결정-실행 루프 실행 중
    Running,
    /// 정리 중
    TearingDown,
    /// 정상 종료
    Done,
    /// 중도 중단
    Aborted,
}

impl SessionState {
    /// 허용된 상태 전이인지
    ///
    /// Provisioning/Connecting 실패 시 Configuring/Running을 건너뛰고 바로 TearingDown으로 간다.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Provisioning, Connecting)
                | (Provisioning, TearingDown)
                | (Connecting, Configuring)
                | (Connecting, TearingDown)
                | (Configuring, Running)
                | (Configuring, TearingDown)
                | (Running, TearingDown)
                | (TearingDown, Done)
                | (TearingDown, Aborted)
        )
    }

    /// 종료 상태인지
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Done | SessionState::Aborted)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Provisioning => "provisioning",
            SessionState::Connecting => "connecting",
            SessionState::Configuring => "configuring",
            SessionState::Running => "running",
            SessionState::TearingDown => "tearing_down",
            SessionState::Done => "done",
            SessionState::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// 실행 중인 세션: SessionController만 변경한다
#[derive(Debug, Clone)]
pub struct Session {
    /// 세션 고유 ID
    pub session_id: String,
    /// 계정 ID
    pub account_id: String,
    /// 컨테이너 이름
    pub container_name: String,
    /// 전송 엔드포인트
    pub endpoint: TransportEndpoint,
    /// 현재 상태
    pub state: SessionState,
    /// Running 루프 마감 시각 (Running 진입 시 설정)
    pub deadline: Option<Instant>,
}

impl Session {
    /// Provisioning 상태의 새 세션
    pub fn new(
        session_id: impl Into<String>,
        account_id: impl Into<String>,
        container_name: impl Into<String>,
        endpoint: TransportEndpoint,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            account_id: account_id.into(),
            container_name: container_name.into(),
            endpoint,
            state: SessionState::Provisioning,
            deadline: None,
        }
    }

    /// 상태 전이: 허용되지 않은 전이는 내부 에러
    pub fn advance(&mut self, next: SessionState) -> Result<(), CoreError> {
        if !self.state.can_transition_to(next) {
            return Err(CoreError::Internal(format!(
                "잘못된 세션 상태 전이: {} → {}",
                self.state, next
            )));
        }
        tracing::debug!(
            account_id = %self.account_id,
            from = %self.state,
            to = %next,
            "세션 상태 전이"
        );
        self.state = next;
        Ok(())
    }
}

/// Running 루프 카운터
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCounters {
    /// 실행한 반복 수
    pub iterations: u64,
    /// 오라클 결정대로 실행한 액션 수
    pub decided_actions: u64,
    /// 폴백 스와이프 수
    pub fallback_actions: u64,
    /// 캡처 실패 수
    pub capture_failures: u64,
    /// 오라클 실패 수
    pub oracle_failures: u64,
    /// 액션 전송 실패 수
    pub dispatch_failures: u64,
}

/// 세션 종료 리포트
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    pub session_id: String,
    pub account_id: String,
    /// 최종 상태 (Done 또는 Aborted)
    pub final_state: SessionState,
    /// 중단 사유 (Aborted일 때)
    pub abort_reason: Option<FailureKind>,
    /// 중단 상세 메시지
    pub abort_message: Option<String>,
    /// 루프 카운터
    pub counters: SessionCounters,
    /// 정리 단계 실행 여부
    pub teardown_ran: bool,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

impl SessionReport {
    pub fn is_done(&self) -> bool {
        self.final_state == SessionState::Done
    }
}

/// 플릿 내 계정 1개의 결과
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AccountOutcome {
    /// 세션을 실행함 (Done/Aborted 여부는 리포트 참조)
    Completed(SessionReport),
    /// 세션 없이 건너뜀 (컨테이너 조작 없음)
    Skipped {
        account_id: String,
        reason: FailureKind,
        message: String,
    },
}

impl AccountOutcome {
    pub fn account_id(&self) -> &str {
        match self {
            AccountOutcome::Completed(report) => &report.account_id,
            AccountOutcome::Skipped { account_id, .. } => account_id,
        }
    }
}

/// 플릿 실행 결과
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FleetReport {
    /// 계정 순서대로 정렬된 결과
    pub outcomes: Vec<AccountOutcome>,
    /// 중단 요청으로 조기 종료했는지
    pub interrupted: bool,
}

impl FleetReport {
    /// Done으로 끝난 세션 수
    pub fn completed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, AccountOutcome::Completed(r) if r.is_done()))
            .count()
    }

    /// 건너뛴 계정 수
    pub fn skipped_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, AccountOutcome::Skipped { .. }))
            .count()
    }

    /// Aborted로 끝난 세션 수
    pub fn aborted_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, AccountOutcome::Completed(r) if !r.is_done()))
            .count()
    }
}
