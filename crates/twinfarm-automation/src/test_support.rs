//! 테스트용 포트 구현 (컨테이너, 전송 채널, 오라클).

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use twinfarm_core::error::{CoreError, OracleFailure};
use twinfarm_core::models::account::{AccountConfig, ProxyConfig};
use twinfarm_core::models::decision::Decision;
use twinfarm_core::models::device::{ContainerHandle, DeviceState, TransportEndpoint};
use twinfarm_core::models::frame::{PerceptionFrame, PNG_SIGNATURE};
use twinfarm_core::ports::container::ContainerRuntime;
use twinfarm_core::ports::oracle::DecisionOracle;
use twinfarm_core::ports::transport::DeviceTransport;

pub fn account(id: &str) -> AccountConfig {
    AccountConfig {
        account_id: id.to_string(),
        mac_address: "02:1a:2b:3c:4d:5e".to_string(),
        device_model: "Pixel 7".to_string(),
        timezone: "America/New_York".to_string(),
        proxy: ProxyConfig {
            ip: "203.0.113.7".to_string(),
            port: 8080,
            user: "user".to_string(),
            pass: "pass".to_string(),
        },
    }
}

// ============================================================
// FakeRuntime
// ============================================================

#[derive(Default)]
pub struct FakeRuntime {
    pub fail_start: bool,
    starts: Mutex<Vec<(String, u16)>>,
    stops: Mutex<Vec<String>>,
}

impl FakeRuntime {
    pub fn failing() -> Self {
        Self {
            fail_start: true,
            ..Self::default()
        }
    }

    pub fn starts(&self) -> Vec<(String, u16)> {
        self.starts.lock().clone()
    }

    pub fn stops(&self) -> Vec<String> {
        self.stops.lock().clone()
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    fn container_name(&self, account_id: &str) -> String {
        format!("android_{account_id}")
    }

    async fn start(
        &self,
        account: &AccountConfig,
        host_port: u16,
    ) -> Result<ContainerHandle, CoreError> {
        let name = self.container_name(&account.account_id);
        self.starts.lock().push((account.account_id.clone(), host_port));
        if self.fail_start {
            return Err(CoreError::Launch {
                container: name,
                message: "exit 125".to_string(),
            });
        }
        Ok(ContainerHandle {
            name,
            host_port,
            container_id: Some("cid".to_string()),
        })
    }

    async fn stop(&self, handle: &ContainerHandle) -> Result<(), CoreError> {
        self.stops.lock().push(handle.name.clone());
        Ok(())
    }

    async fn image_present(&self) -> Result<bool, CoreError> {
        Ok(true)
    }
}

// ============================================================
// FakeTransport
// ============================================================

pub struct FakeTransport {
    /// 몇 번째 상태 조회부터 Ready인지 (None = 영원히 offline)
    ready_after: Option<usize>,
    state_queries: AtomicUsize,
    connect_requests: AtomicUsize,
    disconnects: AtomicUsize,
    captures: AtomicUsize,
    capture_fails: Mutex<bool>,
    failing_shell_prefix: Mutex<Option<String>>,
    slow_shell: Mutex<Option<(String, Duration)>>,
    connect_latency: Option<Duration>,
    shell_calls: Mutex<Vec<Vec<String>>>,
}

impl FakeTransport {
    pub fn ready() -> Self {
        Self::ready_after(0)
    }

    pub fn ready_after(queries: usize) -> Self {
        Self::with_readiness(Some(queries))
    }

    pub fn never_ready() -> Self {
        Self::with_readiness(None)
    }

    fn with_readiness(ready_after: Option<usize>) -> Self {
        Self {
            ready_after,
            state_queries: AtomicUsize::new(0),
            connect_requests: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
            captures: AtomicUsize::new(0),
            capture_fails: Mutex::new(false),
            failing_shell_prefix: Mutex::new(None),
            slow_shell: Mutex::new(None),
            connect_latency: None,
            shell_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_captures(&self) {
        *self.capture_fails.lock() = true;
    }

    pub fn fail_shell(&self, first_arg: &str) {
        *self.failing_shell_prefix.lock() = Some(first_arg.to_string());
    }

    /// 연결 요청마다 지연 (응답 없는 adb connect)
    pub fn with_connect_latency(mut self, latency: Duration) -> Self {
        self.connect_latency = Some(latency);
        self
    }

    /// 첫 인자가 `first_arg`인 셸 명령마다 지연
    pub fn slow_shell(&self, first_arg: &str, latency: Duration) {
        *self.slow_shell.lock() = Some((first_arg.to_string(), latency));
    }

    pub fn shell_calls(&self) -> Vec<Vec<String>> {
        self.shell_calls.lock().clone()
    }

    /// `input swipe|tap` 호출만
    pub fn gestures(&self) -> Vec<Vec<String>> {
        self.shell_calls()
            .into_iter()
            .filter(|args| args.first().map(String::as_str) == Some("input"))
            .collect()
    }

    pub fn connect_requests(&self) -> usize {
        self.connect_requests.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    pub fn captures(&self) -> usize {
        self.captures.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeviceTransport for FakeTransport {
    async fn request_connect(&self, _endpoint: &TransportEndpoint) -> Result<(), CoreError> {
        self.connect_requests.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.connect_latency {
            tokio::time::sleep(latency).await;
        }
        Ok(())
    }

    async fn device_state(&self, _endpoint: &TransportEndpoint) -> Result<DeviceState, CoreError> {
        let seen = self.state_queries.fetch_add(1, Ordering::SeqCst);
        Ok(match self.ready_after {
            Some(after) if seen >= after => DeviceState::Ready,
            _ => DeviceState::Offline,
        })
    }

    async fn wait_for_boot(&self, _endpoint: &TransportEndpoint) -> Result<(), CoreError> {
        Ok(())
    }

    async fn capture_screen(&self, _endpoint: &TransportEndpoint) -> Result<Vec<u8>, CoreError> {
        self.captures.fetch_add(1, Ordering::SeqCst);
        if *self.capture_fails.lock() {
            return Err(CoreError::Capture("device offline".to_string()));
        }
        Ok(PNG_SIGNATURE.to_vec())
    }

    async fn shell(
        &self,
        _endpoint: &TransportEndpoint,
        args: &[String],
    ) -> Result<String, CoreError> {
        self.shell_calls.lock().push(args.to_vec());
        let slow = self.slow_shell.lock().clone();
        if let Some((prefix, latency)) = slow {
            if args.first() == Some(&prefix) {
                tokio::time::sleep(latency).await;
            }
        }
        let failing = self.failing_shell_prefix.lock().clone();
        if let Some(prefix) = failing {
            if args.first() == Some(&prefix) {
                return Err(CoreError::Command {
                    program: "adb".to_string(),
                    message: "closed".to_string(),
                });
            }
        }
        Ok(String::new())
    }

    async fn disconnect(&self, _endpoint: &TransportEndpoint) -> Result<(), CoreError> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================
// FakeOracle
// ============================================================

pub struct FakeOracle {
    response: Result<Decision, OracleFailure>,
    latency: Option<Duration>,
    calls: AtomicUsize,
}

impl FakeOracle {
    pub fn answering(decision: Decision) -> Self {
        Self {
            response: Ok(decision),
            latency: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(failure: OracleFailure) -> Self {
        Self {
            response: Err(failure),
            latency: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DecisionOracle for FakeOracle {
    async fn decide(&self, _frame: &PerceptionFrame) -> Result<Decision, CoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.response.clone().map_err(CoreError::from)
    }

    fn is_enabled(&self) -> bool {
        !matches!(self.response, Err(OracleFailure::Disabled))
    }

    fn name(&self) -> &str {
        "fake"
    }
}
