use thiserror::Error;

/// Result type alias for container runtime calls
pub type RuntimeResult<T> = std::result::Result<T, RuntimeError>;

/// Errors from the container runtime
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// The runtime command ran and exited non-zero
    #[error("`{command}` exited with {status}: {stderr}")]
    CommandFailed {
        /// Command line that was run
        command: String,
        /// Exit status description
        status: String,
        /// Trimmed standard error
        stderr: String,
    },

    /// The runtime binary could not be started
    #[error("failed to start `{command}`: {source}")]
    Spawn {
        /// Command line that was attempted
        command: String,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// Runtime output did not have the expected shape
    #[error("unexpected runtime output: {0}")]
    Parse(String),
}

impl From<RuntimeError> for fluxlab_core::LabError {
    fn from(err: RuntimeError) -> Self {
        Self::Orchestration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fluxlab_core::LabError;

    #[test]
    fn test_converts_to_orchestration() {
        let err = RuntimeError::CommandFailed {
            command: "docker compose up".into(),
            status: "exit status: 1".into(),
            stderr: "no such service".into(),
        };
        let lab: LabError = err.into();
        assert!(lab.is_orchestration());
        assert!(lab.to_string().contains("no such service"));
    }
}
