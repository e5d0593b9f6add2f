//! TWINFARM 도메인 모델.
//!
//! 계정 설정, 세션 상태, 오라클 결정, 인지 프레임, 디바이스 식별자를 정의한다.

pub mod account;
pub mod decision;
pub mod device;
pub mod frame;
pub mod session;
