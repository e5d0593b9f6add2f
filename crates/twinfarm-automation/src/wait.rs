//! 중단 신호 및 마감 시각을 존중하는 대기 헬퍼.
//!
//! 중단 신호는 `watch::Receiver<bool>` (true = 중단 요청)로 전달된다.
//! 송신자가 사라진 경우 더 이상 중단 요청은 오지 않는 것으로 본다.

use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// 경쟁 대기 결과
#[derive(Debug, PartialEq, Eq)]
pub enum Bounded<T> {
    /// 대상 작업 완료
    Completed(T),
    /// 마감 시각 도달
    DeadlineReached,
    /// 중단 요청
    Interrupted,
}

/// 현재 중단 요청 상태
pub fn is_shutdown(shutdown: &watch::Receiver<bool>) -> bool {
    *shutdown.borrow()
}

/// 중단 요청이 들어올 때까지 대기
pub async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// 작업을 마감 시각 및 중단 신호와 경쟁시킨다
pub async fn bounded<F>(
    work: F,
    deadline: Option<Instant>,
    shutdown: &mut watch::Receiver<bool>,
) -> Bounded<F::Output>
where
    F: Future,
{
    if is_shutdown(shutdown) {
        return Bounded::Interrupted;
    }

    let deadline_reached = async {
        match deadline {
            Some(at) => tokio::time::sleep_until(at).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        biased;
        _ = shutdown_requested(shutdown) => Bounded::Interrupted,
        _ = deadline_reached => Bounded::DeadlineReached,
        output = work => Bounded::Completed(output),
    }
}

/// 지정 시간 대기 (마감/중단 시 조기 반환)
pub async fn sleep_bounded(
    duration: Duration,
    deadline: Option<Instant>,
    shutdown: &mut watch::Receiver<bool>,
) -> Bounded<()> {
    bounded(tokio::time::sleep(duration), deadline, shutdown).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn sleep_completes_before_deadline() {
        let (_tx, mut rx) = watch::channel(false);
        let deadline = Instant::now() + Duration::from_secs(10);
        let outcome = sleep_bounded(Duration::from_secs(1), Some(deadline), &mut rx).await;
        assert_eq!(outcome, Bounded::Completed(()));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_cuts_sleep_short() {
        let (_tx, mut rx) = watch::channel(false);
        let start = Instant::now();
        let deadline = start + Duration::from_secs(2);
        let outcome = sleep_bounded(Duration::from_secs(60), Some(deadline), &mut rx).await;
        assert_eq!(outcome, Bounded::DeadlineReached);
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_interrupts_sleep() {
        let (tx, mut rx) = watch::channel(false);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(3)).await;
            let _ = tx.send(true);
        });
        let start = Instant::now();
        let outcome = sleep_bounded(Duration::from_secs(60), None, &mut rx).await;
        assert_eq!(outcome, Bounded::Interrupted);
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_sender_never_interrupts() {
        let (tx, mut rx) = watch::channel(false);
        drop(tx);
        let outcome = sleep_bounded(Duration::from_secs(5), None, &mut rx).await;
        assert_eq!(outcome, Bounded::Completed(()));
    }

    #[tokio::test]
    async fn already_shutdown_skips_work() {
        let (_tx, mut rx) = watch::channel(true);
        let outcome = bounded(async { 42 }, None, &mut rx).await;
        assert_eq!(outcome, Bounded::Interrupted);
    }
}
