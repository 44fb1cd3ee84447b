//! The token interface between the reply decoder and reply consumers.

/// A consumer of decoded reply tokens.
///
/// The decoder feeds exactly one consumer per reply - the one belonging to
/// the oldest in-flight request. Consumers accumulate tokens into a typed
/// result; the decoder does not interpret payloads beyond framing.
///
/// Token order mirrors the wire: a reply is either a single scalar token
/// (`set_bytes`, `set_int`, `set_error`, or `multi(-1)` for a nil bulk) or
/// a `multi(n)` header followed by `n` nested replies. `complete` fires
/// once, after the outermost frame of the reply has been fully consumed.
/// Tokens a consumer does not expect default to being ignored, so a sink
/// only overrides the shapes its command can produce. `set_error` is
/// always required: any reply can be an error.
pub trait ReplyConsumer {
    /// A simple status line or a bulk string payload.
    fn set_bytes(&mut self, bytes: &[u8]) {
        let _ = bytes;
    }

    /// An integer reply.
    fn set_int(&mut self, value: i64) {
        let _ = value;
    }

    /// A multi-bulk header of `count` elements. Negative counts denote a
    /// nil reply (`$-1` or `*-1` on the wire).
    fn multi(&mut self, count: i64) {
        let _ = count;
    }

    /// An error reply. Counts as a complete frame.
    fn set_error(&mut self, error: &str);

    /// The outermost frame of the reply has ended.
    fn complete(&mut self) {}
}
