//! HTTP 결정 오라클 클라이언트.
//!
//! `POST <base>/analyze` 에 `{"image": <base64 PNG>, "prompt": <지시문>}`을 보내고
//! 응답 본문에서 `<answer>` 페이로드를 파싱한다.
//! 베이스 URL이 없거나 자리표시자면 네트워크 호출 없이 `OracleFailure::Disabled`.

use async_trait::async_trait;
use base64::Engine;
use std::time::Duration;
use tracing::{debug, warn};

use twinfarm_core::config::OracleConfig;
use twinfarm_core::error::{CoreError, OracleFailure};
use twinfarm_core::models::decision::Decision;
use twinfarm_core::models::frame::PerceptionFrame;
use twinfarm_core::ports::oracle::DecisionOracle;

use crate::answer::{normalize_body, parse_decision};

/// 에러 메시지에 남길 응답 본문 최대 길이
const ERROR_BODY_CHARS: usize = 200;

/// 분석 요청 본문
#[derive(Debug, serde::Serialize)]
struct AnalyzeRequest<'a> {
    image: String,
    prompt: &'a str,
}

/// reqwest 기반 `DecisionOracle` 구현
#[derive(Debug)]
pub struct HttpDecisionClient {
    /// HTTP 클라이언트
    http_client: reqwest::Client,
    /// `<base>/analyze` (비활성 시 None)
    analyze_url: Option<String>,
    /// 요청 타임아웃
    timeout: Duration,
}

impl HttpDecisionClient {
    /// 설정에서 클라이언트 생성
    pub fn new(config: &OracleConfig) -> Result<Self, CoreError> {
        let timeout = config.timeout();
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CoreError::Config(format!("HTTP 클라이언트 생성 실패: {}", e)))?;

        let analyze_url = config
            .effective_base_url()
            .map(|base| format!("{base}/analyze"));

        match &analyze_url {
            Some(url) => debug!(url = %url, timeout_ms = timeout.as_millis() as u64, "HttpDecisionClient 초기화"),
            None => warn!("오라클 URL 미설정, 폴백 전용 모드"),
        }

        Ok(Self {
            http_client,
            analyze_url,
            timeout,
        })
    }

    fn map_send_error(&self, err: reqwest::Error) -> OracleFailure {
        if err.is_timeout() {
            OracleFailure::Timeout {
                timeout_ms: self.timeout.as_millis() as u64,
            }
        } else {
            OracleFailure::Network(err.to_string())
        }
    }

    async fn request(&self, url: &str, frame: &PerceptionFrame) -> Result<Decision, OracleFailure> {
        let body = AnalyzeRequest {
            image: base64::engine::general_purpose::STANDARD.encode(&frame.image),
            prompt: &frame.instruction,
        };

        let response = self
            .http_client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| self.map_send_error(e))?;

        if status != reqwest::StatusCode::OK {
            return Err(OracleFailure::Status {
                status: status.as_u16(),
                body: text.chars().take(ERROR_BODY_CHARS).collect(),
            });
        }

        parse_decision(&normalize_body(&text))
    }
}

#[async_trait]
impl DecisionOracle for HttpDecisionClient {
    async fn decide(&self, frame: &PerceptionFrame) -> Result<Decision, CoreError> {
        let Some(url) = self.analyze_url.as_deref() else {
            return Err(OracleFailure::Disabled.into());
        };

        debug!(url = %url, image_bytes = frame.image.len(), "오라클 결정 요청");
        let decision = self.request(url, frame).await?;
        debug!(?decision, "오라클 결정 수신");
        Ok(decision)
    }

    fn is_enabled(&self) -> bool {
        self.analyze_url.is_some()
    }

    fn name(&self) -> &str {
        "http"
    }
}
