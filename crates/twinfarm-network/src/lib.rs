//! # twinfarm-network
//!
//! 결정 오라클 HTTP 어댑터.
//!
//! ## 사용 예시
//!
//! ```rust,ignore
//! use twinfarm_network::oracle_client::HttpDecisionClient;
//!
//! let oracle = Arc::new(HttpDecisionClient::new(&config.oracle)?);
//! ```

pub mod answer;
pub mod oracle_client;
