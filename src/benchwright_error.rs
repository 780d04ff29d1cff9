// SPDX-License-Identifier: Apache-2.0

//! Error taxonomy for testbench compilation and simulator execution.

/// Details captured when an external command is judged to have failed,
/// either through its exit code or through a known error substring in its
/// output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubprocessError {
    /// The shell-quoted command line that was run.
    pub command: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    /// Human readable reasons, in the order they were detected.
    pub reasons: Vec<String>,
}

impl std::fmt::Display for SubprocessError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "command `{}` failed with {} error(s): {}",
            self.command,
            self.reasons.len(),
            self.reasons.join(" ")
        )
    }
}

#[derive(Debug)]
pub enum BenchwrightError {
    /// Malformed or unsupported configuration; always fatal, never retried.
    Configuration(String),
    /// A well-formed request this backend cannot express.
    NotSupported(String),
    /// A command run outside of a compile/simulate sequence failed.
    Subprocess(SubprocessError),
    /// The simulator's compile stage failed; the run stage was skipped.
    CompilationFailed(SubprocessError),
    /// The simulator's execution stage failed.
    SimulationFailed(SubprocessError),
    Io(std::io::Error),
}

impl BenchwrightError {
    /// Returns the captured process details when this error came from an
    /// external command.
    pub fn subprocess_error(&self) -> Option<&SubprocessError> {
        match self {
            BenchwrightError::Subprocess(e)
            | BenchwrightError::CompilationFailed(e)
            | BenchwrightError::SimulationFailed(e) => Some(e),
            _ => None,
        }
    }
}

impl std::fmt::Display for BenchwrightError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BenchwrightError::Configuration(msg) => write!(f, "configuration error: {}", msg),
            BenchwrightError::NotSupported(msg) => write!(f, "not supported: {}", msg),
            BenchwrightError::Subprocess(e) => write!(f, "subprocess error: {}", e),
            BenchwrightError::CompilationFailed(e) => write!(f, "compilation failed: {}", e),
            BenchwrightError::SimulationFailed(e) => write!(f, "simulation failed: {}", e),
            BenchwrightError::Io(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for BenchwrightError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BenchwrightError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for BenchwrightError {
    fn from(e: std::io::Error) -> Self {
        BenchwrightError::Io(e)
    }
}
