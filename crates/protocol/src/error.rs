//! Protocol error types

use thiserror::Error;

/// Protocol-level errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Report shorter than the fixed boot layout
    #[error("Report too short: needed {needed} bytes, got {actual}")]
    ReportTooShort { needed: usize, actual: usize },
}

/// Type alias for protocol results
pub type Result<T> = std::result::Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProtocolError::ReportTooShort {
            needed: 4,
            actual: 2,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Report too short"));
        assert!(msg.contains("needed 4"));
        assert!(msg.contains("got 2"));
    }
}
