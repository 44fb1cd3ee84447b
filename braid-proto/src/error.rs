//! Error types for RESP reply decoding.
//!
//! Short reads are not errors: the decoder reports them through its own
//! progress value and leaves the buffer untouched. Everything here is a
//! genuine protocol violation on the reply stream.

/// Error type for reply decoding operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// Invalid type prefix byte.
    #[error("invalid prefix byte: {0:#04x}")]
    InvalidPrefix(u8),

    /// Invalid integer format.
    #[error("invalid integer: {0}")]
    InvalidInteger(String),

    /// Protocol violation.
    #[error("protocol error: {0}")]
    Protocol(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            format!("{}", ParseError::InvalidPrefix(0x42)),
            "invalid prefix byte: 0x42"
        );
        assert_eq!(
            format!("{}", ParseError::InvalidInteger("bad".to_string())),
            "invalid integer: bad"
        );
        assert_eq!(
            format!("{}", ParseError::Protocol("junk".to_string())),
            "protocol error: junk"
        );
    }

    #[test]
    fn test_error_clone_eq() {
        let error = ParseError::InvalidPrefix(0x42);
        assert_eq!(error.clone(), error);
        assert_ne!(error, ParseError::InvalidPrefix(0x43));
    }
}
