//! Docker 기반 디바이스 컨테이너 관리.
//!
//! 모든 docker 호출은 `ExternalCommand` 인자 리스트로 구성되며,
//! 계정 설정 필드는 명령에 들어가기 전에 `AccountConfig::validate()`로 검증된다.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use twinfarm_core::config::ContainerProfile;
use twinfarm_core::error::CoreError;
use twinfarm_core::models::account::AccountConfig;
use twinfarm_core::models::device::ContainerHandle;
use twinfarm_core::ports::command_runner::{CommandOutput, CommandRunner, ExternalCommand};
use twinfarm_core::ports::container::ContainerRuntime;

/// 디바이스 이미지에 전달하는 고정 부팅 속성
const FIXED_BOOT_PROPS: [&str; 2] = [
    "androidboot.redroid_native_bridge=1",
    "androidboot.redroid_gpu_mode=guest",
];

/// docker CLI 기반 `ContainerRuntime` 구현
pub struct DockerContainerManager {
    profile: ContainerProfile,
    runner: Arc<dyn CommandRunner>,
}

impl DockerContainerManager {
    pub fn new(profile: ContainerProfile, runner: Arc<dyn CommandRunner>) -> Self {
        Self { profile, runner }
    }

    pub fn profile(&self) -> &ContainerProfile {
        &self.profile
    }

    /// 계정 데이터 디렉토리 (`<data_root>/data_<acct>`)
    pub fn data_dir(&self, account_id: &str) -> PathBuf {
        self.profile.data_root.join(format!("data_{account_id}"))
    }

    /// 프로필에 따라 `sudo docker` 또는 `docker`로 시작하는 명령
    fn base_command(&self) -> ExternalCommand {
        let cmd = if self.profile.use_sudo {
            ExternalCommand::new("sudo").arg(&self.profile.docker_path)
        } else {
            ExternalCommand::new(&self.profile.docker_path)
        };
        cmd.with_timeout(self.profile.command_timeout())
    }

    /// 컨테이너 기동 명령 구성
    pub fn launch_command(&self, account: &AccountConfig, host_port: u16) -> ExternalCommand {
        let name = self.container_name(&account.account_id);
        let volume = format!("{}:/data", self.data_dir(&account.account_id).display());

        self.base_command()
            .args(["run", "-d", "--rm", "--privileged"])
            .arg("-p")
            .arg(format!("{host_port}:{}", self.profile.device_port))
            .arg("-v")
            .arg(volume)
            .arg("--name")
            .arg(name)
            .arg(&self.profile.image)
            .arg(format!(
                "androidboot.redroid_mac_address={}",
                account.mac_address
            ))
            .arg(format!("androidboot.redroid_model={}", account.device_model))
            .args(FIXED_BOOT_PROPS)
    }

    /// 강제 제거 명령 (`rm -f <name>`)
    fn remove_command(&self, name: &str) -> ExternalCommand {
        self.base_command().args(["rm", "-f", name])
    }

    /// 강제 제거. 컨테이너가 없거나 이미 제거 중이면 성공으로 취급.
    async fn force_remove(&self, name: &str) -> Result<(), CoreError> {
        let output = self.runner.run(&self.remove_command(name)).await?;
        if output.success() || is_missing_container(&output) || is_removal_in_progress(&output) {
            Ok(())
        } else {
            Err(CoreError::Command {
                program: self.profile.docker_path.clone(),
                message: format!("rm -f {name}: {}", output.stderr),
            })
        }
    }
}

/// docker 출력이 "컨테이너 없음"을 뜻하는지
fn is_missing_container(output: &CommandOutput) -> bool {
    let stderr = output.stderr.to_ascii_lowercase();
    stderr.contains("no such container") || stderr.contains("not found")
}

/// `--rm` 자동 제거와 `rm -f`가 겹친 경우
fn is_removal_in_progress(output: &CommandOutput) -> bool {
    output
        .stderr
        .to_ascii_lowercase()
        .contains("already in progress")
}

#[async_trait]
impl ContainerRuntime for DockerContainerManager {
    fn container_name(&self, account_id: &str) -> String {
        format!("{}{}", self.profile.name_prefix, account_id)
    }

    async fn start(
        &self,
        account: &AccountConfig,
        host_port: u16,
    ) -> Result<ContainerHandle, CoreError> {
        account.validate()?;
        let name = self.container_name(&account.account_id);

        // 같은 이름의 이전 컨테이너 정리
        if let Err(e) = self.force_remove(&name).await {
            warn!(container = %name, "기존 컨테이너 정리 실패 (계속 진행): {}", e);
        }

        let command = self.launch_command(account, host_port);
        info!(container = %name, host_port, image = %self.profile.image, "컨테이너 기동");

        let output = self
            .runner
            .run(&command)
            .await
            .map_err(|e| CoreError::Launch {
                container: name.clone(),
                message: e.to_string(),
            })?;

        if !output.success() {
            return Err(CoreError::Launch {
                container: name,
                message: format!("종료 코드 {:?}: {}", output.exit_code, output.stderr),
            });
        }

        let container_id = Some(output.stdout_text()).filter(|id| !id.is_empty());
        debug!(container = %name, ?container_id, "컨테이너 기동 완료");

        Ok(ContainerHandle {
            name,
            host_port,
            container_id,
        })
    }

    async fn stop(&self, handle: &ContainerHandle) -> Result<(), CoreError> {
        let stop = self.base_command().args(["stop", handle.name.as_str()]);
        let output = self.runner.run(&stop).await?;
        if !output.success() && !is_missing_container(&output) {
            warn!(container = %handle.name, "docker stop 실패: {}", output.stderr);
        }

        // --rm 으로 이미 제거되었을 수 있음
        self.force_remove(&handle.name).await?;
        info!(container = %handle.name, "컨테이너 정지/제거 완료");
        Ok(())
    }

    async fn image_present(&self) -> Result<bool, CoreError> {
        let command = self
            .base_command()
            .args(["images", "-q", self.profile.image.as_str()]);
        let output = self.runner.run(&command).await?;
        if !output.success() {
            return Err(CoreError::Command {
                program: self.profile.docker_path.clone(),
                message: format!("images -q: {}", output.stderr),
            });
        }
        Ok(!output.stdout_text().is_empty())
    }
}
