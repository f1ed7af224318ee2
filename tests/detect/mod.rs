//! Detection and environment tests.

mod environment_test;

use std::collections::HashMap;
use std::ffi::OsStr;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use copilot_bridge::detect::{CommandRunner, RunError, CommandOutput};

/// Runner that answers from a table keyed by `"program arg1 arg2"`.
///
/// Unlisted invocations fail as `NotFound`. Every call is recorded.
#[derive(Default)]
pub struct FakeRunner {
    responses: HashMap<String, Result<CommandOutput, (Option<i32>, String)>>,
    calls: Mutex<Vec<String>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ok(mut self, invocation: &str, stdout: &str) -> Self {
        self.responses
            .insert(invocation.to_string(), Ok(CommandOutput::new(stdout, "")));
        self
    }

    pub fn ok_stderr(mut self, invocation: &str, stderr: &str) -> Self {
        self.responses
            .insert(invocation.to_string(), Ok(CommandOutput::new("", stderr)));
        self
    }

    pub fn exits(mut self, invocation: &str, code: i32, stderr: &str) -> Self {
        self.responses
            .insert(invocation.to_string(), Err((Some(code), stderr.to_string())));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(
        &self,
        program: &OsStr,
        args: &[String],
        _timeout: Duration,
    ) -> Result<CommandOutput, RunError> {
        let program = program.to_string_lossy().into_owned();
        let key = std::iter::once(program.clone())
            .chain(args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ");
        self.calls.lock().unwrap().push(key.clone());

        match self.responses.get(&key) {
            Some(Ok(output)) => Ok(output.clone()),
            Some(Err((code, stderr))) => Err(RunError::Exited {
                program,
                code: *code,
                stdout: String::new(),
                stderr: stderr.clone(),
            }),
            None => Err(RunError::NotFound { program }),
        }
    }
}
