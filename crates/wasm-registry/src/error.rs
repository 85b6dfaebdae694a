// Error taxonomy for the x/wasm registry core

use thiserror::Error;

/// Errors that can occur in the wasm registry, admission guard and migrations
#[derive(Error, Debug)]
pub enum WasmError {
    #[error("invalid access config: {0}")]
    InvalidPolicyShape(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("exceeds limit: max {limit} bytes")]
    SizeLimitExceeded { limit: u64 },

    #[error("unrecognized format: payload is neither gzip nor wasm")]
    UnrecognizedFormat,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("failed to decode {kind}: {reason}")]
    DecodeFailure { kind: &'static str, reason: String },

    #[error("migration {from} -> {to} aborted: {source}")]
    MigrationAborted {
        from: u64,
        to: u64,
        #[source]
        source: Box<WasmError>,
    },

    #[error("invalid request: {0}")]
    Invalid(String),

    #[error("duplicate: {0}")]
    Duplicate(String),

    #[error("wasm engine error: {0}")]
    Engine(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WasmError {
    pub(crate) fn decode(kind: &'static str, err: impl std::fmt::Display) -> Self {
        WasmError::DecodeFailure {
            kind,
            reason: err.to_string(),
        }
    }

    /// True for failures that indicate on-disk corruption rather than a rejected request
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            WasmError::DecodeFailure { .. } | WasmError::MigrationAborted { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, WasmError>;
