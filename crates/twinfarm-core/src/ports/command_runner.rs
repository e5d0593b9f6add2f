//! 외부 명령 실행 포트.
//!
//! 컨테이너/전송 어댑터는 모든 외부 호출을 인자 리스트(`ExternalCommand`)로 표현한다.
//! 셸 문자열 보간은 사용하지 않는다.

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

use crate::error::CoreError;

/// 실행할 외부 명령 (프로그램 + 인자 리스트)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalCommand {
    /// 실행 파일
    pub program: String,
    /// 인자 (셸 해석 없음)
    pub args: Vec<String>,
    /// 실행 타임아웃 (None = 무제한)
    pub timeout: Option<Duration>,
}

impl ExternalCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl fmt::Display for ExternalCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// 명령 실행 결과
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// 종료 코드 (시그널 종료 시 None)
    pub exit_code: Option<i32>,
    /// 표준 출력 (바이너리 가능: 예: PNG 스크린샷)
    pub stdout: Vec<u8>,
    /// 표준 에러
    pub stderr: String,
}

impl CommandOutput {
    /// 종료 코드 0 여부
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// 표준 출력을 UTF-8(손실 허용)로 변환, 앞뒤 공백 제거
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).trim().to_string()
    }
}

/// 외부 명령 실행기
///
/// 구현체: `TokioCommandRunner` (실제 프로세스), 테스트용 기록 러너
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// 명령 실행.
    ///
    /// spawn 실패나 타임아웃은 `Err`, 비정상 종료 코드는 `Ok(CommandOutput)`로 반환한다.
    /// 종료 코드 해석은 호출자 책임.
    async fn run(&self, command: &ExternalCommand) -> Result<CommandOutput, CoreError>;
}
