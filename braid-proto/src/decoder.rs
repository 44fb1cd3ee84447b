//! Resumable reply decoder.
//!
//! The decoder turns a byte stream into token callbacks on a
//! [`ReplyConsumer`], one reply at a time. It is driven with whatever bytes
//! have arrived so far: each call consumes as much of the current reply as
//! is wholly buffered and parks on a partial frame without advancing the
//! cursor, so the caller can feed the remainder later and observe exactly
//! the same token sequence as a one-shot feed.
//!
//! Frames are keyed by their first byte:
//!
//! | Byte | Frame        | Tokens emitted                          |
//! |------|--------------|-----------------------------------------|
//! | `+`  | status       | `set_bytes(line)`                       |
//! | `-`  | error        | `set_error(line)`                       |
//! | `:`  | integer      | `set_int(n)`                            |
//! | `$`  | bulk string  | `set_bytes(body)`; `$-1` ⇒ `multi(-1)`  |
//! | `*`  | multi-bulk   | `multi(n)` then `n` nested frames       |
//!
//! Nesting is tracked by a countdown stack that survives across feeds; a
//! frame decrements its parent only once it is itself fully consumed. When
//! the outermost frame ends the decoder emits `complete()` and reports one
//! finished reply, leaving any following bytes untouched for the next
//! reply's consumer.

use bytes::{Buf, BytesMut};

use crate::consumer::ReplyConsumer;
use crate::error::ParseError;

/// Outcome of one [`ReplyDecoder::decode`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoded {
    /// One complete reply was delivered to the consumer.
    Complete,
    /// More bytes are needed; nothing past the last whole frame was consumed.
    Incomplete,
}

/// Incremental decoder for a single connection's reply stream.
#[derive(Debug, Default)]
pub struct ReplyDecoder {
    /// Remaining element counts of the multi-bulk frames currently open.
    stack: Vec<i64>,
}

impl ReplyDecoder {
    /// Create a decoder with no reply in progress.
    pub fn new() -> Self {
        Self { stack: Vec::new() }
    }

    /// Discard any partially decoded reply. Used when the underlying
    /// channel is replaced and buffered frames belong to a dead stream.
    pub fn reset(&mut self) {
        self.stack.clear();
    }

    /// True if a multi-bulk reply is partially decoded.
    pub fn mid_reply(&self) -> bool {
        !self.stack.is_empty()
    }

    /// Decode at most one reply from `buf` into `out`.
    ///
    /// Consumed bytes are drained from the front of `buf`. On
    /// [`Decoded::Incomplete`] the cursor stops at the last whole frame;
    /// already-emitted tokens are never re-emitted on the next call.
    pub fn decode(
        &mut self,
        buf: &mut BytesMut,
        out: &mut dyn ReplyConsumer,
    ) -> Result<Decoded, ParseError> {
        loop {
            let step = self.scan_frame(&buf[..], out)?;
            let (consumed, terminal) = match step {
                Some(step) => step,
                None => return Ok(Decoded::Incomplete),
            };
            buf.advance(consumed);

            if terminal {
                // A fully consumed frame closes every parent that it
                // exhausts, innermost first.
                while let Some(remaining) = self.stack.last_mut() {
                    *remaining -= 1;
                    if *remaining == 0 {
                        self.stack.pop();
                    } else {
                        break;
                    }
                }
                if self.stack.is_empty() {
                    out.complete();
                    return Ok(Decoded::Complete);
                }
            }
        }
    }

    /// Scan one frame from the start of `buf`, emitting its token.
    ///
    /// Returns `None` when the frame is not wholly buffered; otherwise the
    /// number of bytes it occupies and whether it terminated (multi-bulk
    /// headers with elements still pending do not).
    fn scan_frame(
        &mut self,
        buf: &[u8],
        out: &mut dyn ReplyConsumer,
    ) -> Result<Option<(usize, bool)>, ParseError> {
        if buf.is_empty() {
            return Ok(None);
        }

        match buf[0] {
            b'+' => {
                let end = match find_crlf(buf) {
                    Some(end) => end,
                    None => return Ok(None),
                };
                out.set_bytes(&buf[1..end]);
                Ok(Some((end + 2, true)))
            }
            b'-' => {
                let end = match find_crlf(buf) {
                    Some(end) => end,
                    None => return Ok(None),
                };
                out.set_error(&String::from_utf8_lossy(&buf[1..end]));
                Ok(Some((end + 2, true)))
            }
            b':' => {
                let end = match find_crlf(buf) {
                    Some(end) => end,
                    None => return Ok(None),
                };
                out.set_int(parse_i64(&buf[1..end])?);
                Ok(Some((end + 2, true)))
            }
            b'$' => {
                let end = match find_crlf(buf) {
                    Some(end) => end,
                    None => return Ok(None),
                };
                let len = parse_i64(&buf[1..end])?;
                if len < 0 {
                    // Nil bulk surfaces as a nil multi, as consumers only
                    // distinguish present payloads from absence.
                    out.multi(-1);
                    return Ok(Some((end + 2, true)));
                }
                let len = len as usize;
                let body_start = end + 2;
                let frame_end = body_start + len + 2;
                if buf.len() < frame_end {
                    return Ok(None);
                }
                if buf[frame_end - 2] != b'\r' || buf[frame_end - 1] != b'\n' {
                    return Err(ParseError::Protocol(
                        "missing trailing CRLF".to_string(),
                    ));
                }
                out.set_bytes(&buf[body_start..body_start + len]);
                Ok(Some((frame_end, true)))
            }
            b'*' => {
                let end = match find_crlf(buf) {
                    Some(end) => end,
                    None => return Ok(None),
                };
                let count = parse_i64(&buf[1..end])?;
                out.multi(count);
                if count > 0 {
                    self.stack.push(count);
                    Ok(Some((end + 2, false)))
                } else {
                    // Empty and nil arrays are complete frames themselves.
                    Ok(Some((end + 2, true)))
                }
            }
            other => Err(ParseError::InvalidPrefix(other)),
        }
    }
}

/// Find the position of `\r` in a `\r\n` pair, if wholly present.
#[inline]
fn find_crlf(data: &[u8]) -> Option<usize> {
    memchr::memchr(b'\r', data).and_then(|pos| {
        if pos + 1 < data.len() && data[pos + 1] == b'\n' {
            Some(pos)
        } else {
            None
        }
    })
}

fn parse_i64(data: &[u8]) -> Result<i64, ParseError> {
    let s = std::str::from_utf8(data)
        .map_err(|e| ParseError::InvalidInteger(e.to_string()))?;
    s.parse()
        .map_err(|e: std::num::ParseIntError| ParseError::InvalidInteger(e.to_string()))
}
