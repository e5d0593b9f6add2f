//! 외부 프로세스 실행.
//!
//! `CommandRunner` 포트 구현: `TokioCommandRunner` (실제 프로세스).

use async_trait::async_trait;
use std::process::Stdio;
use tracing::{debug, trace};

use twinfarm_core::error::CoreError;
use twinfarm_core::ports::command_runner::{CommandOutput, CommandRunner, ExternalCommand};

// ============================================================
// TokioCommandRunner: 실제 프로세스 실행
// ============================================================

/// tokio 프로세스 기반 명령 실행기
///
/// 셸을 거치지 않고 `program` + `args`를 그대로 exec한다.
/// 타임아웃 초과 시 자식 프로세스는 drop 시점에 kill된다.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioCommandRunner;

impl TokioCommandRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(&self, command: &ExternalCommand) -> Result<CommandOutput, CoreError> {
        debug!(command = %command, "외부 명령 실행");

        let mut cmd = tokio::process::Command::new(&command.program);
        cmd.args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output_future = cmd.output();
        let output = match command.timeout {
            Some(limit) => tokio::time::timeout(limit, output_future)
                .await
                .map_err(|_| CoreError::ExecutionTimeout {
                    timeout_ms: limit.as_millis() as u64,
                })?,
            None => output_future.await,
        }
        .map_err(|e| CoreError::Command {
            program: command.program.clone(),
            message: format!("실행 실패: {e}"),
        })?;

        let result = CommandOutput {
            exit_code: output.status.code(),
            stdout: output.stdout,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        };
        trace!(
            exit_code = ?result.exit_code,
            stdout_len = result.stdout.len(),
            "외부 명령 종료"
        );
        Ok(result)
    }
}
