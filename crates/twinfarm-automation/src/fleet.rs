//! 플릿 오케스트레이터.
//!
//! 계정 ID 목록을 순서대로 처리한다. 설정이 없거나 잘못된 계정은 컨테이너 조작 없이 건너뛰고,
//! 나머지는 슬롯 풀이 허락하는 만큼 동시에 세션을 실행한다. 세션 기동 사이에는 고정 간격을 둔다.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use twinfarm_core::account_store::AccountStore;
use twinfarm_core::config::FleetConfig;
use twinfarm_core::error::{CoreError, FailureKind};
use twinfarm_core::models::account::AccountConfig;
use twinfarm_core::models::session::{AccountOutcome, FleetReport, SessionReport};

use crate::controller::SessionController;
use crate::slot_pool::SlotPool;
use crate::wait::{bounded, is_shutdown, sleep_bounded, Bounded};

/// 플릿 오케스트레이터
pub struct FleetOrchestrator {
    store: AccountStore,
    controller: Arc<SessionController>,
    slots: SlotPool,
    inter_session_pause: Duration,
}

impl FleetOrchestrator {
    pub fn new(
        store: AccountStore,
        controller: Arc<SessionController>,
        config: &FleetConfig,
    ) -> Result<Self, CoreError> {
        Ok(Self {
            store,
            controller,
            slots: SlotPool::new(config.base_port, config.slots)?,
            inter_session_pause: config.inter_session_pause(),
        })
    }

    /// 계정 설정 로드 + 검증
    fn load_account(&self, account_id: &str) -> Result<AccountConfig, CoreError> {
        let account = self.store.load(account_id)?;
        account.validate()?;
        Ok(account)
    }

    /// 계정 목록 실행. 결과는 입력 순서대로 정렬된다.
    pub async fn run(&self, accounts: &[String], mut shutdown: watch::Receiver<bool>) -> FleetReport {
        info!(
            accounts = accounts.len(),
            slots = self.slots.available(),
            "플릿 실행 시작"
        );

        let mut outcomes: Vec<Option<AccountOutcome>> = vec![None; accounts.len()];
        let mut sessions: JoinSet<(usize, SessionReport)> = JoinSet::new();
        let mut launched_any = false;
        let mut interrupted = false;

        for (index, account_id) in accounts.iter().enumerate() {
            if is_shutdown(&shutdown) {
                interrupted = true;
                break;
            }

            let account = match self.load_account(account_id) {
                Ok(account) => account,
                Err(e) => {
                    warn!(account_id = %account_id, "계정 건너뜀: {}", e);
                    outcomes[index] = Some(AccountOutcome::Skipped {
                        account_id: account_id.clone(),
                        reason: e.kind(),
                        message: e.to_string(),
                    });
                    continue;
                }
            };

            let lease = match bounded(self.slots.acquire(), None, &mut shutdown).await {
                Bounded::Completed(Ok(lease)) => lease,
                Bounded::Completed(Err(e)) => {
                    error!(account_id = %account_id, "슬롯 임대 실패: {}", e);
                    outcomes[index] = Some(AccountOutcome::Skipped {
                        account_id: account_id.clone(),
                        reason: e.kind(),
                        message: e.to_string(),
                    });
                    continue;
                }
                _ => {
                    interrupted = true;
                    break;
                }
            };

            if launched_any {
                let paused = sleep_bounded(self.inter_session_pause, None, &mut shutdown).await;
                if paused == Bounded::Interrupted {
                    interrupted = true;
                    break;
                }
            }
            launched_any = true;

            info!(account_id = %account_id, port = lease.port(), "세션 기동");
            let controller = self.controller.clone();
            let session_shutdown = shutdown.clone();
            sessions.spawn(async move {
                let report = controller.run(&account, lease.port(), session_shutdown).await;
                drop(lease);
                (index, report)
            });

            // 완료된 세션 결과를 미리 회수
            while let Some(joined) = sessions.try_join_next() {
                record_joined(&mut outcomes, joined);
            }
        }

        if interrupted {
            warn!("중단 요청, 새 세션 기동 중지, 실행 중인 세션 정리 대기");
        }

        while let Some(joined) = sessions.join_next().await {
            record_joined(&mut outcomes, joined);
        }

        let outcomes = accounts
            .iter()
            .zip(outcomes)
            .filter_map(|(account_id, outcome)| match outcome {
                Some(outcome) => Some(outcome),
                None if interrupted => None,
                None => Some(AccountOutcome::Skipped {
                    account_id: account_id.clone(),
                    reason: FailureKind::Internal,
                    message: "세션 태스크 비정상 종료".to_string(),
                }),
            })
            .collect();

        let report = FleetReport {
            outcomes,
            interrupted,
        };
        info!(
            completed = report.completed_count(),
            aborted = report.aborted_count(),
            skipped = report.skipped_count(),
            interrupted,
            "플릿 실행 종료"
        );
        report
    }
}

fn record_joined(
    outcomes: &mut [Option<AccountOutcome>],
    joined: Result<(usize, SessionReport), tokio::task::JoinError>,
) {
    match joined {
        Ok((index, report)) => outcomes[index] = Some(AccountOutcome::Completed(report)),
        Err(e) => error!("세션 태스크 패닉: {}", e),
    }
}
