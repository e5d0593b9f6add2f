//! # twinfarm-automation
//!
//! 세션 로직 크레이트.
//! 컨테이너 기동부터 인지-결정-실행 루프, 정리까지 계정 1개의 세션을 구동하고,
//! 여러 계정을 슬롯 풀 위에서 순차/병렬로 실행한다.
//!
//! - [`controller`]: 세션 상태 머신 (`SessionController`)
//! - [`fleet`]: 계정 목록 실행 (`FleetOrchestrator`)
//! - [`connector`]: 전송 채널 연결 폴링
//! - [`stealth`]: 환경 위장 설정
//! - [`gesture`]: 지터 적용 입력 실행
//! - [`slot_pool`]: 포트 슬롯 임대
//! - [`wait`]: 마감/중단 인지 대기

pub mod connector;
pub mod controller;
pub mod fleet;
pub mod gesture;
pub mod slot_pool;
pub mod stealth;
pub mod wait;

#[cfg(test)]
mod test_support;
