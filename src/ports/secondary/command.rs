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

use crate::domain::CommandError;
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

/// Represents a system command to be executed
///
/// Arguments are passed to the program directly, never through a shell.
#[derive(Debug, Clone, PartialEq)]
pub struct SystemCommand {
    /// Command program name
    pub program: String,
    /// Command arguments
    pub args: Vec<String>,
    /// Execution timeout
    pub timeout: Option<Duration>,
}

impl SystemCommand {
    /// Create a new system command
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
            timeout: None,
        }
    }

    /// Add arguments to the command
    pub fn args(mut self, args: &[&str]) -> Self {
        self.args.extend(args.iter().map(|s| s.to_string()));
        self
    }

    /// Add a single argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Set execution timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl fmt::Display for SystemCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Command execution result
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// Standard output
    pub stdout: String,
    /// Standard error
    pub stderr: String,
    /// Exit status code
    pub exit_code: Option<i32>,
    /// Whether command was successful
    pub success: bool,
}

/// Secondary port - Command execution abstraction
///
/// This interface abstracts system command execution, allowing for different
/// implementations (direct execution, mocked for testing, etc.)
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Execute a system command
    ///
    /// # Arguments
    /// * `command` - The command to execute
    ///
    /// # Returns
    /// * `Ok(CommandOutput)` - Command output and status, whatever the exit code
    /// * `Err(CommandError)` - The command could not be spawned or timed out
    async fn execute(&self, command: &SystemCommand) -> Result<CommandOutput, CommandError>;

    /// Run a command and return its stdout, treating a non-zero exit as failure
    ///
    /// # Returns
    /// * `Ok(String)` - Stdout of a successful run, possibly empty
    /// * `Err(CommandError::ToolUnavailable)` - Missing binary, non-zero exit or timeout
    async fn run(&self, command: &SystemCommand) -> Result<String, CommandError> {
        let output = self.execute(command).await?;
        if output.success {
            return Ok(output.stdout);
        }

        let mut reason = match output.exit_code {
            Some(code) => format!("exited with status {code}"),
            None => "terminated by signal".to_string(),
        };
        let stderr = output.stderr.trim();
        if !stderr.is_empty() {
            reason.push_str(": ");
            reason.push_str(stderr);
        }
        Err(CommandError::unavailable(&command.program, reason))
    }

    /// Check if a command is available on the system
    ///
    /// # Arguments
    /// * `command_name` - Name of the command to check
    async fn is_command_available(&self, command_name: &str) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedExecutor(CommandOutput);

    #[async_trait]
    impl CommandExecutor for FixedExecutor {
        async fn execute(&self, _command: &SystemCommand) -> Result<CommandOutput, CommandError> {
            Ok(self.0.clone())
        }

        async fn is_command_available(&self, _command_name: &str) -> bool {
            true
        }
    }

    #[test]
    fn test_command_builder_and_display() {
        let cmd = SystemCommand::new("ps")
            .args(&["-o", "user="])
            .arg("-p")
            .arg(4821.to_string())
            .timeout(Duration::from_secs(5));

        assert_eq!(cmd.args, vec!["-o", "user=", "-p", "4821"]);
        assert_eq!(cmd.to_string(), "ps -o user= -p 4821");
        assert_eq!(cmd.timeout, Some(Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn test_run_returns_stdout_on_success() {
        let executor = FixedExecutor(CommandOutput {
            stdout: String::new(),
            success: true,
            exit_code: Some(0),
            ..Default::default()
        });

        // Ran but reported nothing is not an error
        let out = executor.run(&SystemCommand::new("lspci")).await.unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_run_maps_non_zero_exit_to_unavailable() {
        let executor = FixedExecutor(CommandOutput {
            stderr: "NVIDIA-SMI has failed\n".to_string(),
            exit_code: Some(9),
            success: false,
            ..Default::default()
        });

        let err = executor
            .run(&SystemCommand::new("nvidia-smi"))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            CommandError::unavailable("nvidia-smi", "exited with status 9: NVIDIA-SMI has failed")
        );
    }
}
