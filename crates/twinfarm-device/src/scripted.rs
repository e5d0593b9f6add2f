//! 스크립트 명령 실행기.
//!
//! 명령을 실제로 실행하지 않고 기록만 하며, 등록된 규칙대로 응답한다.
//! 단위 테스트와 `test-support` 기능을 켠 통합 테스트에서만 컴파일된다.

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use twinfarm_core::error::CoreError;
use twinfarm_core::ports::command_runner::{CommandOutput, CommandRunner, ExternalCommand};

type Matcher = Box<dyn Fn(&ExternalCommand) -> bool + Send + Sync>;

/// 명령을 실행하지 않고 기록하며, 등록된 규칙에 따라 응답하는 실행기
///
/// 규칙은 등록 역순(나중 등록 우선)으로 매칭되며, 매칭이 없으면 종료 코드 0 + 빈 출력.
#[derive(Default)]
pub struct ScriptedCommandRunner {
    rules: Mutex<Vec<(Matcher, Result<CommandOutput, String>)>>,
    calls: Mutex<Vec<ExternalCommand>>,
}

impl ScriptedCommandRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// 인자 중 `needle`을 포함하는 명령에 `output`으로 응답
    pub fn respond_when_arg(&self, needle: &str, output: CommandOutput) {
        let needle = needle.to_string();
        self.respond_when(move |cmd| cmd.args.iter().any(|a| a == &needle), output);
    }

    /// 조건을 만족하는 명령에 `output`으로 응답
    pub fn respond_when<F>(&self, matcher: F, output: CommandOutput)
    where
        F: Fn(&ExternalCommand) -> bool + Send + Sync + 'static,
    {
        self.rules.lock().push((Box::new(matcher), Ok(output)));
    }

    /// 조건을 만족하는 명령을 spawn 실패로 처리
    pub fn fail_when<F>(&self, matcher: F, message: &str)
    where
        F: Fn(&ExternalCommand) -> bool + Send + Sync + 'static,
    {
        self.rules
            .lock()
            .push((Box::new(matcher), Err(message.to_string())));
    }

    /// 기록된 모든 호출
    pub fn calls(&self) -> Vec<ExternalCommand> {
        self.calls.lock().clone()
    }

    /// 인자 중 `needle`을 포함하는 호출 수
    pub fn count_with_arg(&self, needle: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|cmd| cmd.args.iter().any(|a| a == needle))
            .count()
    }
}

/// 성공 출력 헬퍼
pub fn ok_output(stdout: impl Into<Vec<u8>>) -> CommandOutput {
    CommandOutput {
        exit_code: Some(0),
        stdout: stdout.into(),
        stderr: String::new(),
    }
}

/// 실패 출력 헬퍼
pub fn failed_output(code: i32, stderr: &str) -> CommandOutput {
    CommandOutput {
        exit_code: Some(code),
        stdout: Vec::new(),
        stderr: stderr.to_string(),
    }
}

#[async_trait]
impl CommandRunner for ScriptedCommandRunner {
    async fn run(&self, command: &ExternalCommand) -> Result<CommandOutput, CoreError> {
        debug!(command = %command, "[Scripted] 외부 명령 기록");
        self.calls.lock().push(command.clone());

        let rules = self.rules.lock();
        let response = rules
            .iter()
            .rev()
            .find(|(matcher, _)| matcher(command))
            .map(|(_, response)| response.clone());
        drop(rules);

        match response {
            Some(Ok(output)) => Ok(output),
            Some(Err(message)) => Err(CoreError::Command {
                program: command.program.clone(),
                message,
            }),
            None => Ok(ok_output(Vec::new())),
        }
    }
}
