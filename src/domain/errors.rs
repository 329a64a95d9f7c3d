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

use thiserror::Error;

/// Command execution errors
///
/// A missing binary, a non-zero exit status and a timeout all collapse into
/// `ToolUnavailable`. A tool that ran successfully but printed nothing is not
/// an error; callers see an empty stdout instead.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CommandError {
    /// The tool could not be run to a successful exit
    #[error("{program} unavailable: {reason}")]
    ToolUnavailable { program: String, reason: String },
}

impl CommandError {
    /// Shorthand for building a `ToolUnavailable` error
    pub fn unavailable(program: &str, reason: impl Into<String>) -> Self {
        CommandError::ToolUnavailable {
            program: program.to_string(),
            reason: reason.into(),
        }
    }
}

/// System-level errors for adapters (not exposed to the HTTP layer)
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SystemError {
    /// Every candidate tool for a collection path failed
    #[error("no usable tool: {}", .0.join("; "))]
    ToolsUnavailable(Vec<String>),
    /// Command execution failed
    #[error(transparent)]
    Command(#[from] CommandError),
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(String),
    /// Tool output could not be interpreted at all
    #[error("Parse error: {0}")]
    Parse(String),
    /// The tool ran but reported nothing usable
    #[error("nothing found: {0}")]
    NotFound(String),
}

/// Endpoint-level failures surfaced to HTTP callers
///
/// Each variant maps to one endpoint and knows which remediation hint, if
/// any, accompanies it.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TelemetryError {
    #[error("unable to list listening ports: {0}")]
    Ports(SystemError),
    #[error("unable to query GPU devices: {0}")]
    Gpu(SystemError),
    #[error("unable to query GPU processes: {0}")]
    GpuProcesses(SystemError),
    #[error("unable to list models: {0}")]
    Models(SystemError),
    #[error("unable to read storage stats: {0}")]
    Storage(SystemError),
}

impl TelemetryError {
    /// Human-actionable hint shown next to the error message
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            TelemetryError::Ports(_) => Some(
                "check that netstat (net-tools) is installed; run the service as root to see owning processes",
            ),
            TelemetryError::Gpu(_) => {
                Some("make sure nvidia-smi is installed and the GPU driver is loaded")
            }
            TelemetryError::GpuProcesses(SystemError::NotFound(_)) => Some(
                "this nvidia-smi does not support --query-compute-apps; upgrade the NVIDIA driver",
            ),
            TelemetryError::GpuProcesses(_) => {
                Some("make sure nvidia-smi supports process queries")
            }
            TelemetryError::Models(_) | TelemetryError::Storage(_) => None,
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_error_display() {
        let err = CommandError::unavailable("netstat", "No such file or directory");
        assert_eq!(err.to_string(), "netstat unavailable: No such file or directory");
    }

    #[test]
    fn test_tools_unavailable_joins_reasons() {
        let err = SystemError::ToolsUnavailable(vec!["a failed".into(), "b failed".into()]);
        assert_eq!(err.to_string(), "no usable tool: a failed; b failed");
    }

    #[test]
    fn test_suggestions() {
        let ports = TelemetryError::Ports(SystemError::Io("x".into()));
        assert!(ports.suggestion().unwrap().contains("root"));

        let old_driver = TelemetryError::GpuProcesses(SystemError::NotFound("pmon only".into()));
        assert!(old_driver.suggestion().unwrap().contains("upgrade"));

        let models = TelemetryError::Models(SystemError::Io("missing".into()));
        assert!(models.suggestion().is_none());
    }
}
