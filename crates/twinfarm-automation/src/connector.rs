//! 전송 채널 연결기.
//!
//! 폴링 상태 머신 `Disconnected → ConnectAttempted → Verified`.
//! 매 주기마다 연결을 요청하고, 디바이스 목록이 Ready를 확인해야만 Verified로 간다.
//! 타임아웃을 넘기면 `CoreError::ConnectTimeout`, 중단 요청 시 `CoreError::Interrupted`.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use twinfarm_core::config::TransportConfig;
use twinfarm_core::error::CoreError;
use twinfarm_core::models::device::{DeviceState, TransportEndpoint};
use twinfarm_core::ports::transport::DeviceTransport;

use crate::wait::{bounded, sleep_bounded, Bounded};

/// 연결 단계
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    Disconnected,
    ConnectAttempted,
    Verified,
}

/// 폴링 기반 전송 채널 연결기
pub struct TransportConnector {
    transport: Arc<dyn DeviceTransport>,
    timeout: Duration,
    poll_interval: Duration,
}

impl TransportConnector {
    pub fn new(transport: Arc<dyn DeviceTransport>, config: &TransportConfig) -> Self {
        Self {
            transport,
            timeout: config.connect_timeout(),
            poll_interval: config.poll_interval(),
        }
    }

    /// 연결 확인 후 부팅 완료까지 대기
    pub async fn connect(
        &self,
        endpoint: &TransportEndpoint,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<(), CoreError> {
        self.verify(endpoint, shutdown).await?;

        match bounded(self.transport.wait_for_boot(endpoint), None, shutdown).await {
            Bounded::Completed(result) => result,
            Bounded::Interrupted => Err(CoreError::Interrupted),
            Bounded::DeadlineReached => Err(CoreError::Internal(
                "부팅 대기에 마감 시각 없음".to_string(),
            )),
        }
    }

    /// Verified 상태에 도달할 때까지 폴링.
    ///
    /// 개별 연결 요청/상태 조회도 `started + timeout` 마감에 묶인다.
    pub async fn verify(
        &self,
        endpoint: &TransportEndpoint,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<(), CoreError> {
        let started = Instant::now();
        let deadline = started + self.timeout;
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            match bounded(self.attempt(endpoint, attempts), Some(deadline), shutdown).await {
                Bounded::Completed(ConnectionPhase::Verified) => {
                    info!(
                        endpoint = %endpoint,
                        attempts,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "전송 채널 연결 확인"
                    );
                    return Ok(());
                }
                Bounded::Completed(_) => {}
                Bounded::DeadlineReached => return Err(self.timed_out(endpoint, attempts)),
                Bounded::Interrupted => return Err(CoreError::Interrupted),
            }

            match sleep_bounded(self.poll_interval, Some(deadline), shutdown).await {
                Bounded::Completed(()) if Instant::now() < deadline => {}
                Bounded::Interrupted => return Err(CoreError::Interrupted),
                _ => return Err(self.timed_out(endpoint, attempts)),
            }
        }
    }

    /// 연결 요청 1회 + 디바이스 상태 확인
    async fn attempt(&self, endpoint: &TransportEndpoint, attempts: u32) -> ConnectionPhase {
        let mut phase = ConnectionPhase::Disconnected;
        match self.transport.request_connect(endpoint).await {
            Ok(()) => phase = ConnectionPhase::ConnectAttempted,
            Err(e) => debug!(endpoint = %endpoint, attempts, "연결 요청 실패: {}", e),
        }

        if phase == ConnectionPhase::ConnectAttempted {
            match self.transport.device_state(endpoint).await {
                Ok(DeviceState::Ready) => phase = ConnectionPhase::Verified,
                Ok(state) => debug!(endpoint = %endpoint, ?state, "디바이스 준비 안 됨"),
                Err(e) => debug!(endpoint = %endpoint, "디바이스 목록 조회 실패: {}", e),
            }
        }
        phase
    }

    fn timed_out(&self, endpoint: &TransportEndpoint, attempts: u32) -> CoreError {
        warn!(endpoint = %endpoint, attempts, "전송 채널 연결 타임아웃");
        CoreError::ConnectTimeout {
            endpoint: endpoint.to_string(),
            timeout_ms: self.timeout.as_millis() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeTransport;

    fn config(timeout_secs: u64) -> TransportConfig {
        TransportConfig {
            connect_timeout_secs: timeout_secs,
            poll_interval_ms: 1_000,
            ..TransportConfig::default()
        }
    }

    fn endpoint() -> TransportEndpoint {
        TransportEndpoint::new("localhost", 5555)
    }

    #[tokio::test(start_paused = true)]
    async fn never_ready_times_out_within_bound() {
        let transport = Arc::new(FakeTransport::never_ready());
        let connector = TransportConnector::new(transport.clone(), &config(5));
        let (_tx, mut rx) = watch::channel(false);

        let start = Instant::now();
        let err = connector.connect(&endpoint(), &mut rx).await.unwrap_err();
        let elapsed = start.elapsed();

        assert!(matches!(err, CoreError::ConnectTimeout { timeout_ms: 5000, .. }));
        assert!(elapsed >= Duration::from_secs(5));
        assert!(elapsed <= Duration::from_secs(6));
        assert_eq!(transport.connect_requests(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn verified_after_few_polls() {
        let transport = Arc::new(FakeTransport::ready_after(2));
        let connector = TransportConnector::new(transport.clone(), &config(30));
        let (_tx, mut rx) = watch::channel(false);

        let start = Instant::now();
        connector.connect(&endpoint(), &mut rx).await.unwrap();
        assert_eq!(transport.connect_requests(), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn interrupt_during_polling() {
        let transport = Arc::new(FakeTransport::never_ready());
        let connector = TransportConnector::new(transport, &config(30));
        let (tx, mut rx) = watch::channel(false);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(2_500)).await;
            let _ = tx.send(true);
        });

        let start = Instant::now();
        let err = connector.connect(&endpoint(), &mut rx).await.unwrap_err();
        assert!(matches!(err, CoreError::Interrupted));
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn hung_connect_request_is_cut_at_timeout() {
        let transport =
            Arc::new(FakeTransport::never_ready().with_connect_latency(Duration::from_secs(20)));
        let connector = TransportConnector::new(transport.clone(), &config(5));
        let (_tx, mut rx) = watch::channel(false);

        let start = Instant::now();
        let err = connector.connect(&endpoint(), &mut rx).await.unwrap_err();

        assert!(matches!(err, CoreError::ConnectTimeout { timeout_ms: 5000, .. }));
        assert!(start.elapsed() <= Duration::from_secs(6));
        assert_eq!(transport.connect_requests(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn interrupt_during_hung_connect_request() {
        let transport =
            Arc::new(FakeTransport::never_ready().with_connect_latency(Duration::from_secs(20)));
        let connector = TransportConnector::new(transport, &config(30));
        let (tx, mut rx) = watch::channel(false);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            let _ = tx.send(true);
        });

        let start = Instant::now();
        let err = connector.connect(&endpoint(), &mut rx).await.unwrap_err();
        assert!(matches!(err, CoreError::Interrupted));
        assert!(start.elapsed() <= Duration::from_secs(3));
    }
}
