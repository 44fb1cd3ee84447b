//! Errors surfaced by the braid client.

use braid_proto::ParseError;

/// Errors delivered by completions and blocking waits.
///
/// Transport failures are recovered by the reconnection watchdog where
/// possible; everything here surfaces to the caller on the affected
/// request only. Server-reported errors are never retried.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// The connection was closed before the request could complete, or a
    /// dispatch was attempted after [`close`](crate::Connection::close).
    #[error("connection is closed")]
    ConnectionClosed,

    /// A blocking wait elapsed. The request is cancelled client-side; the
    /// server still executes it.
    #[error("command timed out")]
    Timeout,

    /// A blocking wait was abandoned because the request was cancelled
    /// from elsewhere while this caller was waiting on it.
    #[error("command interrupted: {0}")]
    Interrupted(String),

    /// The server answered with an error reply.
    #[error("redis error: {0}")]
    Redis(String),

    /// The active transaction was discarded before this request executed.
    #[error("transaction discarded")]
    Discarded,

    /// The reply had a shape the request's output sink cannot hold.
    #[error("unexpected response")]
    UnexpectedResponse,

    /// The reply stream violated the wire protocol.
    #[error("protocol error: {0}")]
    Protocol(#[from] ParseError),

    /// I/O failure reported by the transport.
    #[error("io error: {0}")]
    Io(String),

    /// Every error collected by a [`join`](crate::completion::join)
    /// aggregate, in child order.
    #[error("aggregate failure: {0:?}")]
    Aggregate(Vec<Error>),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Error::ConnectionClosed.to_string(), "connection is closed");
        assert_eq!(
            Error::Redis("ERR wrongtype".to_string()).to_string(),
            "redis error: ERR wrongtype"
        );
        assert_eq!(Error::Timeout.to_string(), "command timed out");
    }

    #[test]
    fn test_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe");
        assert!(matches!(Error::from(io), Error::Io(_)));
    }
}
