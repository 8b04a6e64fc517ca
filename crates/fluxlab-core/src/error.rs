use thiserror::Error;

use crate::types::NetworkKind;

/// Result type alias for fluxlab operations
pub type Result<T> = std::result::Result<T, LabError>;

/// Errors that can occur while managing the topology catalog
#[derive(Error, Debug)]
pub enum LabError {
    /// A network with this name is already registered
    #[error("network '{name}' already exists")]
    DuplicateName {
        /// Name that collided
        name: String,
    },

    /// No network with this name is registered
    #[error("unknown network '{name}'")]
    UnknownNetwork {
        /// Name that was looked up
        name: String,
    },

    /// The operation only applies to another kind of network
    #[error("'{name}' is a {actual} network, expected {expected}")]
    KindMismatch {
        /// Network the operation targeted
        name: String,
        /// Kind the operation requires
        expected: NetworkKind,
        /// Kind the network actually has
        actual: NetworkKind,
    },

    /// A numeric setting fell outside its allowed range
    #[error("{field} must be in {min}..={max}, got {value}")]
    OutOfRange {
        /// Setting name
        field: &'static str,
        /// Rejected value
        value: i64,
        /// Inclusive lower bound
        min: i64,
        /// Inclusive upper bound
        max: i64,
    },

    /// A textual setting could not be parsed
    #[error("invalid {field}: '{value}' (expected {expected})")]
    InvalidValue {
        /// Setting name
        field: &'static str,
        /// Rejected value
        value: String,
        /// Human readable list of accepted values
        expected: &'static str,
    },

    /// The network kind does not support the requested operation
    #[error("{operation} is not supported for {kind} network '{name}'")]
    UnsupportedOperation {
        /// Network the operation targeted
        name: String,
        /// Kind of that network
        kind: NetworkKind,
        /// Operation name
        operation: &'static str,
    },

    /// Every 172.x.0.0/24 range has been handed out
    #[error("subnet pool exhausted: no 172.x.0.0/24 range left above {last}")]
    SubnetExhausted {
        /// Last octet that was tried
        last: u16,
    },

    /// A container runtime call failed
    #[error("orchestration failed: {0}")]
    Orchestration(String),

    /// On-disk state did not have the expected shape
    #[error("integrity warning: {0}")]
    Integrity(String),

    /// Filesystem error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing/serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LabError {
    /// Returns true if the error was caused by operator input.
    ///
    /// These are rejected commands: nothing was changed.
    #[must_use]
    pub const fn is_user_input(&self) -> bool {
        matches!(
            self,
            Self::DuplicateName { .. }
                | Self::UnknownNetwork { .. }
                | Self::KindMismatch { .. }
                | Self::OutOfRange { .. }
                | Self::InvalidValue { .. }
                | Self::UnsupportedOperation { .. }
        )
    }

    /// Returns true if a shared resource pool ran dry
    #[must_use]
    pub const fn is_resource_exhausted(&self) -> bool {
        matches!(self, Self::SubnetExhausted { .. })
    }

    /// Returns true if the container runtime rejected a call
    #[must_use]
    pub const fn is_orchestration(&self) -> bool {
        matches!(self, Self::Orchestration(_))
    }

    pub(crate) fn unknown(name: &str) -> Self {
        Self::UnknownNetwork {
            name: name.to_string(),
        }
    }
}
