/*
Copyright 2024 San Francisco Compute Company

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

//! Test doubles shared by unit tests

use crate::domain::CommandError;
use crate::ports::{CommandExecutor, CommandOutput, SystemCommand};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// Command executor that replays canned results keyed by the full command line
///
/// Unscripted commands fail as if the binary were missing. Every invocation
/// is recorded in order.
#[derive(Default)]
pub struct ScriptedExecutor {
    responses: HashMap<String, CommandOutput>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a successful run printing `stdout`
    pub fn ok(self, command_line: &str, stdout: &str) -> Self {
        self.script(command_line, stdout, "", 0)
    }

    /// Script a failed run with no output
    pub fn fail(self, command_line: &str) -> Self {
        self.script(command_line, "", "scripted failure", 1)
    }

    /// Script a run that prints `stdout` but still exits with status 1
    pub fn partial(self, command_line: &str, stdout: &str, stderr: &str) -> Self {
        self.script(command_line, stdout, stderr, 1)
    }

    fn script(mut self, command_line: &str, stdout: &str, stderr: &str, code: i32) -> Self {
        self.responses.insert(
            command_line.to_string(),
            CommandOutput {
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
                exit_code: Some(code),
                success: code == 0,
            },
        );
        self
    }

    /// All command lines executed so far
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of executed command lines starting with `prefix`
    pub fn count(&self, prefix: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }
}

#[async_trait]
impl CommandExecutor for ScriptedExecutor {
    async fn execute(&self, command: &SystemCommand) -> Result<CommandOutput, CommandError> {
        let command_line = command.to_string();
        self.calls.lock().unwrap().push(command_line.clone());

        match self.responses.get(&command_line) {
            Some(output) => Ok(output.clone()),
            None => Err(CommandError::unavailable(
                &command.program,
                "failed to execute: No such file or directory",
            )),
        }
    }

    async fn is_command_available(&self, command_name: &str) -> bool {
        self.responses
            .keys()
            .any(|line| line.split_whitespace().next() == Some(command_name))
    }
}
