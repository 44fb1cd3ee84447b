//! Reply-side value types.

use bytes::Bytes;

/// A dynamically typed reply tree.
///
/// Used where a command's reply shape is not fixed: `EXEC` aggregates,
/// `SLOWLOG GET`, and script evaluation. Leaves hold raw payload bytes;
/// interpreting them is up to the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// A status line or bulk string payload.
    Bulk(Bytes),
    /// An integer reply.
    Int(i64),
    /// A nil bulk or nil array.
    Nil,
    /// A multi-bulk reply.
    Array(Vec<Reply>),
    /// An error reply embedded as an element.
    Error(String),
}

impl Reply {
    /// The payload bytes, if this is a bulk or status leaf.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Reply::Bulk(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// The integer payload, if present.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Reply::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// The elements, if this is an array.
    pub fn as_array(&self) -> Option<&[Reply]> {
        match self {
            Reply::Array(items) => Some(items),
            _ => None,
        }
    }

    /// True if this is a nil reply.
    pub fn is_nil(&self) -> bool {
        matches!(self, Reply::Nil)
    }
}

/// A key paired with the value popped from it, as returned by the
/// blocking list operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue<K, V> {
    pub key: K,
    pub value: V,
}

/// A sorted-set member paired with its score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredValue<V> {
    pub value: V,
    pub score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_accessors() {
        assert_eq!(Reply::Int(3).as_int(), Some(3));
        assert_eq!(Reply::Bulk(Bytes::from_static(b"x")).as_bytes(), Some(&b"x"[..]));
        assert!(Reply::Nil.is_nil());
        assert!(Reply::Array(vec![Reply::Nil]).as_array().is_some());
        assert_eq!(Reply::Int(3).as_bytes(), None);
    }
}
