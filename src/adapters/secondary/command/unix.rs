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

//! Unix command execution adapter

use crate::domain::CommandError;
use crate::ports::{CommandExecutor, CommandOutput, SystemCommand};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

/// Unix-based command executor that enforces a timeout on every command
///
/// Commands are never retried; callers choose their own fallback.
pub struct UnixCommandExecutor {
    /// Default timeout for commands
    default_timeout: Duration,
}

impl UnixCommandExecutor {
    /// Create a new Unix command executor
    ///
    /// # Arguments
    /// * `default_timeout` - Timeout for commands that do not set their own
    pub fn new(default_timeout: Duration) -> Self {
        Self { default_timeout }
    }

    /// Create a Unix command executor with default settings
    pub fn with_defaults() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

#[async_trait]
impl CommandExecutor for UnixCommandExecutor {
    async fn execute(&self, command: &SystemCommand) -> Result<CommandOutput, CommandError> {
        let command_timeout = command.timeout.unwrap_or(self.default_timeout);

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(Stdio::null())
            .kill_on_drop(true);

        log::debug!("executing: {command}");

        match timeout(command_timeout, cmd.output()).await {
            Ok(Ok(output)) => {
                let stdout = String::from_utf8_lossy(&output.stdout).to_string();
                let stderr = String::from_utf8_lossy(&output.stderr).to_string();
                let success = output.status.success();
                let exit_code = output.status.code();

                if !success {
                    log::debug!(
                        "{} exited with {:?}: {}",
                        command.program,
                        exit_code,
                        stderr.trim()
                    );
                }

                Ok(CommandOutput {
                    stdout,
                    stderr,
                    exit_code,
                    success,
                })
            }
            Ok(Err(e)) => Err(CommandError::unavailable(
                &command.program,
                format!("failed to execute: {e}"),
            )),
            Err(_) => Err(CommandError::unavailable(
                &command.program,
                format!("timed out after {command_timeout:?}"),
            )),
        }
    }

    async fn is_command_available(&self, command_name: &str) -> bool {
        let which_cmd = SystemCommand::new("which")
            .args(&[command_name])
            .timeout(Duration::from_secs(5));

        match self.execute(&which_cmd).await {
            Ok(output) => output.success && !output.stdout.trim().is_empty(),
            Err(_) => false, // If 'which' fails, assume command is not available
        }
    }
}
