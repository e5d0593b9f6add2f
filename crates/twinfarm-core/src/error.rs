//! TWINFARM 핵심 에러 타입.
//!
//! 모든 어댑터 crate는 이 `CoreError`를 그대로 반환한다.
//! 세션/플릿 리포트에는 `FailureKind`로 축약된 분류만 기록된다.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 코어 레이어 에러.
#[derive(Debug, Error)]
pub enum CoreError {
    /// JSON 직렬화/역직렬화 실패
    #[error("직렬화 에러: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 설정값 오류
    #[error("설정 에러: {0}")]
    Config(String),

    /// 계정 설정 파일 없음: 해당 계정은 건너뛴다
    #[error("계정 설정 미발견: {account_id}")]
    ConfigMissing {
        /// 계정 ID
        account_id: String,
    },

    /// 필드 유효성 검증 실패
    #[error("유효성 검증 실패 ({field}): {message}")]
    Validation {
        /// 검증 실패한 필드명
        field: String,
        /// 실패 사유
        message: String,
    },

    /// 컨테이너 기동 실패
    #[error("컨테이너 기동 실패 ({container}): {message}")]
    Launch {
        /// 컨테이너 이름
        container: String,
        /// 실패 사유
        message: String,
    },

    /// 전송 채널 연결 타임아웃
    #[error("전송 채널 연결 타임아웃: {endpoint} ({timeout_ms}ms 초과)")]
    ConnectTimeout {
        /// 대상 엔드포인트 (host:port)
        endpoint: String,
        /// 초과된 타임아웃 (밀리초)
        timeout_ms: u64,
    },

    /// 화면 캡처 실패
    #[error("화면 캡처 실패: {0}")]
    Capture(String),

    /// 결정 오라클 실패 (네트워크, 타임아웃, 페이로드 오류 모두 포함)
    #[error("결정 오라클 에러: {0}")]
    Oracle(#[from] OracleFailure),

    /// 입력 제스처 전송 실패
    #[error("액션 전송 실패: {0}")]
    ActionDispatch(String),

    /// 외부 프로그램 실행 실패 (spawn 실패, 비정상 종료)
    #[error("외부 명령 실패 ({program}): {message}")]
    Command {
        /// 실행 파일 이름
        program: String,
        /// 실패 사유
        message: String,
    },

    /// 실행 타임아웃
    #[error("실행 타임아웃: {timeout_ms}ms 초과")]
    ExecutionTimeout {
        /// 초과된 타임아웃 시간 (밀리초)
        timeout_ms: u64,
    },

    /// 외부 중단 요청 (SIGINT/SIGTERM 등)
    #[error("중단 요청 수신")]
    Interrupted,

    /// I/O 에러
    #[error("I/O 에러: {0}")]
    Io(#[from] std::io::Error),

    /// 내부 에러 (예상치 못한 상황)
    #[error("내부 에러: {0}")]
    Internal(String),
}

/// 결정 오라클 실패 종류.
///
/// 호출자는 모든 종류를 동일하게 취급(폴백 액션)하지만,
/// 테스트와 리포트에서는 구분할 수 있도록 유지한다.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OracleFailure {
    /// 오라클 URL 미설정: 네트워크 호출 없이 폴백
    #[error("오라클 URL 미설정 (폴백 전용 모드)")]
    Disabled,

    /// 연결 실패 등 네트워크 에러
    #[error("네트워크 에러: {0}")]
    Network(String),

    /// 응답 타임아웃
    #[error("응답 타임아웃: {timeout_ms}ms 초과")]
    Timeout {
        /// 적용된 타임아웃 (밀리초)
        timeout_ms: u64,
    },

    /// 200 이외의 상태 코드
    #[error("비정상 응답 ({status}): {body}")]
    Status {
        /// HTTP 상태 코드
        status: u16,
        /// 응답 본문 (앞부분)
        body: String,
    },

    /// `<answer>` 구분자 없음
    #[error("응답에 <answer> 구분자 없음")]
    MissingDelimiter,

    /// 구분자 내부 JSON 파싱 실패
    #[error("결정 페이로드 파싱 실패: {0}")]
    MalformedPayload(String),
}

/// 리포트용 실패 분류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    ConfigMissing,
    InvalidConfig,
    Launch,
    ConnectTimeout,
    Capture,
    Oracle,
    ActionDispatch,
    Interrupted,
    Internal,
}

impl CoreError {
    /// 에러를 리포트용 분류로 축약
    pub fn kind(&self) -> FailureKind {
        match self {
            CoreError::ConfigMissing { .. } => FailureKind::ConfigMissing,
            CoreError::Validation { .. } | CoreError::Config(_) => FailureKind::InvalidConfig,
            CoreError::Launch { .. } => FailureKind::Launch,
            CoreError::ConnectTimeout { .. } => FailureKind::ConnectTimeout,
            CoreError::Capture(_) => FailureKind::Capture,
            CoreError::Oracle(_) => FailureKind::Oracle,
            CoreError::ActionDispatch(_) => FailureKind::ActionDispatch,
            CoreError::Interrupted => FailureKind::Interrupted,
            CoreError::Serialization(_)
            | CoreError::Command { .. }
            | CoreError::ExecutionTimeout { .. }
            | CoreError::Io(_)
            | CoreError::Internal(_) => FailureKind::Internal,
        }
    }

    /// 유효성 검증 에러 생성 헬퍼
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        CoreError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oracle_failure_converts_into_core_error() {
        let err: CoreError = OracleFailure::MissingDelimiter.into();
        assert_eq!(err.kind(), FailureKind::Oracle);
        assert!(format!("{err}").contains("<answer>"));
    }

    #[test]
    fn kinds_follow_taxonomy() {
        let missing = CoreError::ConfigMissing {
            account_id: "07".to_string(),
        };
        assert_eq!(missing.kind(), FailureKind::ConfigMissing);

        let timeout = CoreError::ConnectTimeout {
            endpoint: "127.0.0.1:5555".to_string(),
            timeout_ms: 30_000,
        };
        assert_eq!(timeout.kind(), FailureKind::ConnectTimeout);
        assert!(format!("{timeout}").contains("30000ms"));

        assert_eq!(
            CoreError::validation("timezone", "bad").kind(),
            FailureKind::InvalidConfig
        );
        assert_eq!(CoreError::Interrupted.kind(), FailureKind::Interrupted);
    }

    #[test]
    fn failure_kind_serde() {
        let json = serde_json::to_string(&FailureKind::ConnectTimeout).unwrap();
        assert_eq!(json, "\"connect_timeout\"");
    }
}
