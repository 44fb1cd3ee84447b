//! Request framing.
//!
//! A request is an array of bulk strings: `*N\r\n` followed by N frames of
//! `$len\r\n<bytes>\r\n`. Element 0 is the command name; the rest come from
//! a [`CommandArgs`] buffer that the caller fills in protocol order.
//!
//! Arguments are framed eagerly as they are appended, so a finished
//! `CommandArgs` is a contiguous run of bulk strings that can be spliced
//! after the array header without re-walking the arguments.

use bytes::{BufMut, Bytes, BytesMut};

use crate::command::{CommandKind, Keyword};

/// An ordered, pre-framed argument buffer for a single request.
#[derive(Debug, Clone, Default)]
pub struct CommandArgs {
    buf: BytesMut,
    count: usize,
}

impl CommandArgs {
    /// Create an empty argument buffer.
    #[inline]
    pub fn new() -> Self {
        Self {
            buf: BytesMut::new(),
            count: 0,
        }
    }

    /// Number of arguments appended so far.
    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    /// The framed argument bytes (a run of `$len\r\n<bytes>\r\n` frames).
    #[inline]
    pub fn frames(&self) -> &[u8] {
        &self.buf
    }

    /// Append one argument from a raw byte slice.
    pub fn add(&mut self, arg: &[u8]) -> &mut Self {
        let mut len = itoa::Buffer::new();
        let len = len.format(arg.len());
        self.buf.reserve(1 + len.len() + 2 + arg.len() + 2);
        self.buf.put_u8(b'$');
        self.buf.put_slice(len.as_bytes());
        self.buf.put_slice(b"\r\n");
        self.buf.put_slice(arg);
        self.buf.put_slice(b"\r\n");
        self.count += 1;
        self
    }

    /// Append a string argument.
    #[inline]
    pub fn add_str(&mut self, arg: &str) -> &mut Self {
        self.add(arg.as_bytes())
    }

    /// Append a signed integer argument in decimal form.
    #[inline]
    pub fn add_i64(&mut self, arg: i64) -> &mut Self {
        let mut buf = itoa::Buffer::new();
        self.add(buf.format(arg).as_bytes())
    }

    /// Append an unsigned integer argument in decimal form.
    #[inline]
    pub fn add_u64(&mut self, arg: u64) -> &mut Self {
        let mut buf = itoa::Buffer::new();
        self.add(buf.format(arg).as_bytes())
    }

    /// Append a double argument, rendered per [`format_double`].
    #[inline]
    pub fn add_double(&mut self, arg: f64) -> &mut Self {
        self.add(format_double(arg).as_bytes())
    }

    /// Append a keyword argument.
    #[inline]
    pub fn add_keyword(&mut self, keyword: Keyword) -> &mut Self {
        self.add(keyword.bytes())
    }
}

/// Render a double the way the protocol expects: infinities as `+inf` /
/// `-inf`, everything else in shortest-round-trip decimal form.
///
/// ryu pins the finite rendering to one algorithm, so the output is
/// identical on every platform. `NaN` renders as `nan`.
pub fn format_double(value: f64) -> String {
    if value.is_infinite() {
        return if value > 0.0 { "+inf" } else { "-inf" }.to_string();
    }
    if value.is_nan() {
        return "nan".to_string();
    }
    let mut buf = ryu::Buffer::new();
    buf.format(value).to_string()
}

/// Encode a complete request frame: array header, command name, then the
/// pre-framed arguments.
pub fn encode_request(kind: CommandKind, args: &CommandArgs) -> Bytes {
    let name = kind.bytes();
    let mut header = itoa::Buffer::new();
    let header = header.format(1 + args.count());
    let mut name_len = itoa::Buffer::new();
    let name_len = name_len.format(name.len());

    let mut buf = BytesMut::with_capacity(
        1 + header.len() + 2 + 1 + name_len.len() + 2 + name.len() + 2 + args.frames().len(),
    );
    buf.put_u8(b'*');
    buf.put_slice(header.as_bytes());
    buf.put_slice(b"\r\n");
    buf.put_u8(b'$');
    buf.put_slice(name_len.as_bytes());
    buf.put_slice(b"\r\n");
    buf.put_slice(name);
    buf.put_slice(b"\r\n");
    buf.put_slice(args.frames());
    buf.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_no_args() {
        let args = CommandArgs::new();
        let frame = encode_request(CommandKind::PING, &args);
        assert_eq!(&frame[..], b"*1\r\n$4\r\nPING\r\n");
    }

    #[test]
    fn test_encode_get() {
        let mut args = CommandArgs::new();
        args.add(b"mykey");
        let frame = encode_request(CommandKind::GET, &args);
        assert_eq!(&frame[..], b"*2\r\n$3\r\nGET\r\n$5\r\nmykey\r\n");
    }

    #[test]
    fn test_encode_set_with_binary_value() {
        let mut args = CommandArgs::new();
        args.add(b"k").add(b"\x00\xffbar");
        let frame = encode_request(CommandKind::SET, &args);
        assert_eq!(&frame[..], b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$5\r\n\x00\xffbar\r\n");
    }

    #[test]
    fn test_numeric_args() {
        let mut args = CommandArgs::new();
        args.add(b"counter").add_i64(-42).add_u64(7);
        let frame = encode_request(CommandKind::SETRANGE, &args);
        assert_eq!(
            &frame[..],
            b"*4\r\n$8\r\nSETRANGE\r\n$7\r\ncounter\r\n$3\r\n-42\r\n$1\r\n7\r\n"
        );
    }

    #[test]
    fn test_keyword_arg() {
        let mut args = CommandArgs::new();
        args.add(b"zset").add_i64(0).add_i64(-1).add_keyword(Keyword::WITHSCORES);
        let frame = encode_request(CommandKind::ZRANGE, &args);
        assert!(frame.ends_with(b"$10\r\nWITHSCORES\r\n"));
        assert!(frame.starts_with(b"*5\r\n$6\r\nZRANGE\r\n"));
    }

    #[test]
    fn test_format_double() {
        assert_eq!(format_double(f64::INFINITY), "+inf");
        assert_eq!(format_double(f64::NEG_INFINITY), "-inf");
        assert_eq!(format_double(f64::NAN), "nan");
        assert_eq!(format_double(1.5), "1.5");
        assert_eq!(format_double(-0.25), "-0.25");
        assert_eq!(format_double(1.0), "1.0");
    }

    #[test]
    fn test_double_arg_uses_protocol_rendering() {
        let mut args = CommandArgs::new();
        args.add_double(f64::NEG_INFINITY).add_double(2.5);
        assert_eq!(args.frames(), b"$4\r\n-inf\r\n$3\r\n2.5\r\n");
        assert_eq!(args.count(), 2);
    }
}
