//! 세션 슬롯 풀.
//!
//! 슬롯 1개 = 호스트 전송 포트 1개. 동시에 같은 포트를 두 세션이 쓰지 않도록
//! 세마포어로 동시 실행 수를 제한하고, 임대(`SlotLease`)가 drop되면 포트를 반납한다.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::trace;

use twinfarm_core::error::CoreError;

/// 고정 크기 포트 풀
#[derive(Clone)]
pub struct SlotPool {
    permits: Arc<Semaphore>,
    free_ports: Arc<Mutex<Vec<u16>>>,
}

impl SlotPool {
    /// `base_port`부터 연속된 `slots`개 포트로 풀 생성
    pub fn new(base_port: u16, slots: usize) -> Result<Self, CoreError> {
        if slots == 0 {
            return Err(CoreError::validation("fleet.slots", "1 이상이어야 함"));
        }
        let ports = (0..slots)
            .map(|offset| {
                u16::try_from(usize::from(base_port) + offset).map_err(|_| {
                    CoreError::validation("fleet.base_port", "슬롯 포트가 범위를 넘음")
                })
            })
            .rev()
            .collect::<Result<Vec<u16>, CoreError>>()?;

        Ok(Self {
            permits: Arc::new(Semaphore::new(slots)),
            free_ports: Arc::new(Mutex::new(ports)),
        })
    }

    /// 슬롯 임대 (빈 슬롯이 없으면 대기)
    pub async fn acquire(&self) -> Result<SlotLease, CoreError> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| CoreError::Internal("슬롯 풀 닫힘".to_string()))?;

        let port = self
            .free_ports
            .lock()
            .pop()
            .ok_or_else(|| CoreError::Internal("허가는 있으나 빈 포트 없음".to_string()))?;
        trace!(port, "슬롯 임대");

        Ok(SlotLease {
            port,
            free_ports: self.free_ports.clone(),
            _permit: permit,
        })
    }

    /// 현재 빈 슬롯 수
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

/// 임대된 슬롯: drop 시 포트 반납 후 허가 해제
pub struct SlotLease {
    port: u16,
    free_ports: Arc<Mutex<Vec<u16>>>,
    _permit: OwnedSemaphorePermit,
}

impl SlotLease {
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl Drop for SlotLease {
    fn drop(&mut self) {
        self.free_ports.lock().push(self.port);
        trace!(port = self.port, "슬롯 반납");
    }
}
