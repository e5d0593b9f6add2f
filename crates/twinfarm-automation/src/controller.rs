//! 세션 제어기.
//!
//! 계정 1개의 세션 생명주기를 구동한다.
//!
//! ```text
//! Provisioning → Connecting → Configuring → Running → TearingDown → Done
//!        └──────────┴── 실패/중단 ────────────────→ TearingDown → Aborted
//! ```
//!
//! Running 루프는 마감 시각 또는 중단 요청으로만 끝나며,
//! 정리(컨테이너 정지 + 전송 채널 해제)는 어떤 경로로 끝나든 정확히 한 번 실행된다.

use chrono::Utc;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use twinfarm_core::config::{FarmConfig, SessionConfig};
use twinfarm_core::error::CoreError;
use twinfarm_core::models::account::AccountConfig;
use twinfarm_core::models::decision::PlannedAction;
use twinfarm_core::models::device::{ContainerHandle, TransportEndpoint};
use twinfarm_core::models::frame::PerceptionFrame;
use twinfarm_core::models::session::{Session, SessionCounters, SessionReport, SessionState};
use twinfarm_core::ports::container::ContainerRuntime;
use twinfarm_core::ports::oracle::DecisionOracle;
use twinfarm_core::ports::transport::DeviceTransport;

use crate::connector::TransportConnector;
use crate::gesture::ActionExecutor;
use crate::stealth::StealthConfigurator;
use crate::wait::{bounded, is_shutdown, sleep_bounded, Bounded};

/// 정리 단계에서 해제해야 할 자원
#[derive(Debug, Default)]
struct Acquired {
    /// 컨테이너 기동을 시도했는지 (실패했더라도 정리 대상)
    launch_attempted: bool,
    /// 기동된 컨테이너
    container: Option<ContainerHandle>,
    /// 전송 채널 연결을 시도했는지
    connect_attempted: bool,
}

/// 반복 1회의 종료 방식
#[derive(Debug, PartialEq, Eq)]
enum IterationEnd {
    /// 다음 반복으로
    Continue,
    /// 마감 시각 도달
    Deadline,
    /// 중단 요청
    Interrupted,
}

impl<T> From<Bounded<T>> for IterationEnd {
    fn from(outcome: Bounded<T>) -> Self {
        match outcome {
            Bounded::Completed(_) => IterationEnd::Continue,
            Bounded::DeadlineReached => IterationEnd::Deadline,
            Bounded::Interrupted => IterationEnd::Interrupted,
        }
    }
}

// ============================================================
// SessionController
// ============================================================

/// 세션 제어기: 계정 1개당 `run` 1회
pub struct SessionController {
    runtime: Arc<dyn ContainerRuntime>,
    transport: Arc<dyn DeviceTransport>,
    oracle: Arc<dyn DecisionOracle>,
    connector: TransportConnector,
    stealth: StealthConfigurator,
    executor: ActionExecutor,
    session_config: SessionConfig,
    instruction: String,
    host: String,
}

impl SessionController {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        transport: Arc<dyn DeviceTransport>,
        oracle: Arc<dyn DecisionOracle>,
        config: &FarmConfig,
    ) -> Self {
        info!(
            oracle = oracle.name(),
            oracle_enabled = oracle.is_enabled(),
            duration_secs = config.session.duration_secs,
            "세션 제어기 초기화"
        );
        Self {
            connector: TransportConnector::new(transport.clone(), &config.transport),
            stealth: StealthConfigurator::new(transport.clone()),
            executor: ActionExecutor::new(transport.clone()),
            runtime,
            transport,
            oracle,
            session_config: config.session.clone(),
            instruction: config.oracle.instruction.clone(),
            host: config.transport.host.clone(),
        }
    }

    /// 세션 1회 실행. 어떤 경로로 끝나든 리포트를 반환한다.
    pub async fn run(
        &self,
        account: &AccountConfig,
        host_port: u16,
        mut shutdown: watch::Receiver<bool>,
    ) -> SessionReport {
        let started_at = Utc::now();
        let endpoint = TransportEndpoint::new(&self.host, host_port);
        let mut session = Session::new(
            uuid::Uuid::new_v4().to_string(),
            &account.account_id,
            self.runtime.container_name(&account.account_id),
            endpoint,
        );
        let mut acquired = Acquired::default();
        let mut counters = SessionCounters::default();

        info!(
            account_id = %session.account_id,
            session_id = %session.session_id,
            endpoint = %session.endpoint,
            "세션 시작"
        );

        let outcome = if is_shutdown(&shutdown) {
            Err(CoreError::Interrupted)
        } else {
            self.drive(&mut session, account, &mut acquired, &mut counters, &mut shutdown)
                .await
        };

        if let Err(e) = &outcome {
            warn!(
                account_id = %session.account_id,
                state = %session.state,
                "세션 중단: {}",
                e
            );
        }

        transition(&mut session, SessionState::TearingDown);
        self.teardown(&session, &acquired).await;

        let final_state = if outcome.is_ok() {
            SessionState::Done
        } else {
            SessionState::Aborted
        };
        transition(&mut session, final_state);

        info!(
            account_id = %session.account_id,
            state = %final_state,
            iterations = counters.iterations,
            fallbacks = counters.fallback_actions,
            "세션 종료"
        );

        SessionReport {
            session_id: session.session_id,
            account_id: session.account_id,
            final_state,
            abort_reason: outcome.as_ref().err().map(CoreError::kind),
            abort_message: outcome.as_ref().err().map(ToString::to_string),
            counters,
            teardown_ran: true,
            started_at,
            ended_at: Utc::now(),
        }
    }

    /// Provisioning → Running 루프 종료까지
    async fn drive(
        &self,
        session: &mut Session,
        account: &AccountConfig,
        acquired: &mut Acquired,
        counters: &mut SessionCounters,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<(), CoreError> {
        // 1. Provisioning
        acquired.launch_attempted = true;
        let handle = self
            .runtime
            .start(account, session.endpoint.port)
            .await?;
        acquired.container = Some(handle);

        // 2. Connecting
        session.advance(SessionState::Connecting)?;
        acquired.connect_attempted = true;
        self.connector.connect(&session.endpoint, shutdown).await?;

        // 3. Configuring
        session.advance(SessionState::Configuring)?;
        if is_shutdown(shutdown) {
            return Err(CoreError::Interrupted);
        }
        self.stealth.apply(&session.endpoint, account, shutdown).await;
        if let Some(package) = &self.session_config.target_package {
            match self.stealth.launch_app(&session.endpoint, package, shutdown).await {
                Ok(()) => {}
                Err(CoreError::Interrupted) => return Err(CoreError::Interrupted),
                Err(e) => {
                    warn!(account_id = %session.account_id, package = %package, "앱 실행 실패: {}", e);
                }
            }
        }
        if is_shutdown(shutdown) {
            return Err(CoreError::Interrupted);
        }

        // 4. Running
        session.advance(SessionState::Running)?;
        let deadline = Instant::now() + self.session_config.duration();
        session.deadline = Some(deadline);
        self.run_loop(session, deadline, counters, shutdown).await;
        Ok(())
    }

    /// 인지 → 결정 → 실행 루프. 마감 또는 중단으로만 끝난다.
    async fn run_loop(
        &self,
        session: &Session,
        deadline: Instant,
        counters: &mut SessionCounters,
        shutdown: &mut watch::Receiver<bool>,
    ) {
        info!(account_id = %session.account_id, "Running 루프 진입");
        loop {
            if is_shutdown(shutdown) {
                info!(account_id = %session.account_id, "중단 요청, 루프 종료");
                return;
            }
            if Instant::now() >= deadline {
                info!(account_id = %session.account_id, "마감 시각 도달, 루프 종료");
                return;
            }

            counters.iterations += 1;
            match self.iterate(session, deadline, counters, shutdown).await {
                IterationEnd::Continue => {}
                IterationEnd::Deadline => {
                    info!(account_id = %session.account_id, "마감 시각 도달, 루프 종료");
                    return;
                }
                IterationEnd::Interrupted => {
                    info!(account_id = %session.account_id, "중단 요청, 루프 종료");
                    return;
                }
            }
        }
    }

    /// 반복 1회: 캡처 → 결정 → 실행 → 시청 → 대기
    async fn iterate(
        &self,
        session: &Session,
        deadline: Instant,
        counters: &mut SessionCounters,
        shutdown: &mut watch::Receiver<bool>,
    ) -> IterationEnd {
        let endpoint = &session.endpoint;
        let mut recovering = false;
        let mut watch_for = None;

        let capture = match bounded(self.transport.capture_screen(endpoint), Some(deadline), shutdown).await {
            Bounded::Completed(result) => result,
            other => return other.into(),
        };

        match capture {
            Err(e) => {
                counters.capture_failures += 1;
                warn!(account_id = %session.account_id, "화면 캡처 실패: {}", e);
                recovering = true;
            }
            Ok(image) => {
                let frame = PerceptionFrame::new(image, self.instruction.as_str());
                let decided = match bounded(self.oracle.decide(&frame), Some(deadline), shutdown).await {
                    Bounded::Completed(result) => result,
                    other => return other.into(),
                };

                let action = match decided {
                    Ok(decision) => {
                        debug!(account_id = %session.account_id, ?decision, "오라클 결정");
                        watch_for = decision.watch_duration;
                        match decision.planned_action() {
                            Some(action) => {
                                counters.decided_actions += 1;
                                action
                            }
                            None => {
                                counters.fallback_actions += 1;
                                PlannedAction::fallback()
                            }
                        }
                    }
                    Err(e) => {
                        counters.oracle_failures += 1;
                        counters.fallback_actions += 1;
                        if self.oracle.is_enabled() {
                            warn!(account_id = %session.account_id, "오라클 실패, 폴백 스와이프: {}", e);
                            recovering = true;
                        } else {
                            debug!(account_id = %session.account_id, "오라클 비활성, 폴백 스와이프");
                        }
                        PlannedAction::fallback()
                    }
                };

                match bounded(self.executor.perform(endpoint, action), Some(deadline), shutdown).await {
                    Bounded::Completed(Ok(_)) => {}
                    Bounded::Completed(Err(e)) => {
                        counters.dispatch_failures += 1;
                        warn!(account_id = %session.account_id, "액션 전송 실패: {}", e);
                    }
                    other => return other.into(),
                }
            }
        }

        if let Some(seconds) = watch_for {
            let watch = clamp_watch(seconds, self.session_config.max_watch());
            if !watch.is_zero() {
                debug!(account_id = %session.account_id, watch_ms = watch.as_millis() as u64, "시청 대기");
                let end = IterationEnd::from(sleep_bounded(watch, Some(deadline), shutdown).await);
                if end != IterationEnd::Continue {
                    return end;
                }
            }
        }

        let pause = if recovering {
            self.session_config.recovery_delay()
        } else {
            self.random_pause()
        };
        sleep_bounded(pause, Some(deadline), shutdown).await.into()
    }

    /// 반복 사이 무작위 대기 [min_pause_ms, max_pause_ms]
    fn random_pause(&self) -> Duration {
        let min = self.session_config.min_pause_ms;
        let max = self.session_config.max_pause_ms.max(min);
        Duration::from_millis(rand::rng().random_range(min..=max))
    }

    /// 정리: 컨테이너 정지 → 전송 채널 해제 (모두 best-effort)
    async fn teardown(&self, session: &Session, acquired: &Acquired) {
        info!(account_id = %session.account_id, "세션 정리");

        if acquired.launch_attempted {
            let handle = acquired.container.clone().unwrap_or_else(|| ContainerHandle {
                name: session.container_name.clone(),
                host_port: session.endpoint.port,
                container_id: None,
            });
            if let Err(e) = self.runtime.stop(&handle).await {
                warn!(container = %handle.name, "컨테이너 정지 실패: {}", e);
            }
        }

        if acquired.connect_attempted {
            if let Err(e) = self.transport.disconnect(&session.endpoint).await {
                warn!(endpoint = %session.endpoint, "전송 채널 해제 실패: {}", e);
            }
        }
    }
}

/// 상태 전이 (허용되지 않은 전이는 로그만 남기고 무시)
fn transition(session: &mut Session, next: SessionState) {
    if let Err(e) = session.advance(next) {
        error!(account_id = %session.account_id, "{}", e);
    }
}

/// watch_duration(초) → [0, max] 범위의 대기 시간 (NaN/음수는 0)
pub fn clamp_watch(seconds: f64, max: Duration) -> Duration {
    if !seconds.is_finite() || seconds <= 0.0 {
        return Duration::ZERO;
    }
    Duration::from_secs_f64(seconds.min(max.as_secs_f64()))
}
