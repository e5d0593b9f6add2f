//! # twinfarm-device
//!
//! 디바이스 어댑터. 외부 프로그램(docker, adb)을 인자 리스트로 실행해
//! `twinfarm-core`의 포트를 구현한다.
//!
//! - [`process`]: `CommandRunner` 구현 (tokio 프로세스)
//! - `scripted`: 기록 전용 `CommandRunner` (테스트, `test-support` 기능)
//! - [`docker`]: `ContainerRuntime` 구현
//! - [`adb`]: `DeviceTransport` 구현

pub mod adb;
pub mod docker;
pub mod process;

#[cfg(any(test, feature = "test-support"))]
pub mod scripted;
