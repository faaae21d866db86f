//! Error types for forwarding-state generation and programming.

use crate::client::ClientError;
use crate::expected::OpResult;
use thiserror::Error;

/// Errors surfaced by the generator and the profile orchestrator.
///
/// Every variant is fatal to the calling step; nothing in the crate retries.
#[derive(Debug, Error)]
pub enum ScaleError {
    #[error("division by zero: {0}")]
    DivisionByZero(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("address overflow: {0}")]
    Overflow(String),

    #[error("address pool exhausted after {0} addresses")]
    PoolExhausted(usize),

    #[error("batch index {index} out of range (batch count {batch_count})")]
    BatchOutOfRange { index: usize, batch_count: usize },

    #[error("batch index {0} requested more than once")]
    DuplicateBatch(usize),

    #[error("segment {segment}: {reason}")]
    InvalidSegment { segment: String, reason: String },

    #[error("segment {segment}: {semantics} next hops need at least one target")]
    MissingNextHopTargets { segment: String, semantics: String },

    #[error("segment {segment}: {semantics} next hops need a tunnel source")]
    MissingTunnelSource { segment: String, semantics: String },

    #[error("segment {0} declared more than once")]
    DuplicateSegment(String),

    #[error("no RIB client configured")]
    NoClient,

    #[error("{phase} of batches {batches:?} failed: {source}")]
    Transaction {
        phase: String,
        batches: Vec<usize>,
        #[source]
        source: ClientError,
    },

    #[error("confirmation {position} mismatch: expected {expected}, got {actual}")]
    ResultMismatch {
        position: usize,
        expected: OpResult,
        actual: OpResult,
    },

    #[error("confirmation count mismatch: expected {expected}, got {actual}")]
    ResultCountMismatch { expected: usize, actual: usize },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for generator operations.
pub type Result<T> = std::result::Result<T, ScaleError>;

impl From<gribi_types::ParseError> for ScaleError {
    fn from(err: gribi_types::ParseError) -> Self {
        ScaleError::InvalidAddress(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    #[test]
    fn test_error_display() {
        let err = ScaleError::BatchOutOfRange {
            index: 5,
            batch_count: 4,
        };
        assert_eq!(err.to_string(), "batch index 5 out of range (batch count 4)");
    }

    #[test]
    fn test_transaction_error_names_batches() {
        let err = ScaleError::Transaction {
            phase: "push".to_string(),
            batches: vec![0, 1],
            source: ClientError::Timeout(Duration::from_secs(600)),
        };
        assert_eq!(
            err.to_string(),
            "push of batches [0, 1] failed: timed out after 600s"
        );
    }

    #[test]
    fn test_parse_error_maps_to_invalid_address() {
        let err: ScaleError = gribi_types::ParseError::InvalidIpAddress("1.2.3".to_string()).into();
        assert!(matches!(err, ScaleError::InvalidAddress(_)));
    }
}
