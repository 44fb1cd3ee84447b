//! The injected key/value codec.
//!
//! The connection core never interprets key or value bytes; a codec
//! translates between the caller's types and the opaque payloads placed on
//! the wire. Both directions are infallible by contract - a codec that can
//! fail should map failures to a sentinel value of its own choosing.

use bytes::Bytes;

/// Translates user keys and values to and from wire bytes.
pub trait RedisCodec: Send + Sync + 'static {
    /// The caller-facing key type.
    type Key: Clone + Send + 'static;
    /// The caller-facing value type.
    type Value: Clone + Send + 'static;

    /// Encode a key into wire bytes.
    fn encode_key(&self, key: &Self::Key) -> Vec<u8>;

    /// Encode a value into wire bytes.
    fn encode_value(&self, value: &Self::Value) -> Vec<u8>;

    /// Decode a key from wire bytes.
    fn decode_key(&self, bytes: &[u8]) -> Self::Key;

    /// Decode a value from wire bytes.
    fn decode_value(&self, bytes: &[u8]) -> Self::Value;
}

/// UTF-8 string keys and values. Invalid UTF-8 decodes lossily.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringCodec;

impl RedisCodec for StringCodec {
    type Key = String;
    type Value = String;

    fn encode_key(&self, key: &String) -> Vec<u8> {
        key.as_bytes().to_vec()
    }

    fn encode_value(&self, value: &String) -> Vec<u8> {
        value.as_bytes().to_vec()
    }

    fn decode_key(&self, bytes: &[u8]) -> String {
        String::from_utf8_lossy(bytes).into_owned()
    }

    fn decode_value(&self, bytes: &[u8]) -> String {
        String::from_utf8_lossy(bytes).into_owned()
    }
}

/// Opaque byte keys and values, passed through untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct BytesCodec;

impl RedisCodec for BytesCodec {
    type Key = Bytes;
    type Value = Bytes;

    fn encode_key(&self, key: &Bytes) -> Vec<u8> {
        key.to_vec()
    }

    fn encode_value(&self, value: &Bytes) -> Vec<u8> {
        value.to_vec()
    }

    fn decode_key(&self, bytes: &[u8]) -> Bytes {
        Bytes::copy_from_slice(bytes)
    }

    fn decode_value(&self, bytes: &[u8]) -> Bytes {
        Bytes::copy_from_slice(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_codec_round_trip() {
        let codec = StringCodec;
        let key = "hello".to_string();
        assert_eq!(codec.decode_key(&codec.encode_key(&key)), key);
    }

    #[test]
    fn test_string_codec_lossy_decode() {
        let codec = StringCodec;
        assert_eq!(codec.decode_value(&[0xff, 0xfe]), "\u{fffd}\u{fffd}");
    }

    #[test]
    fn test_bytes_codec_passthrough() {
        let codec = BytesCodec;
        let value = Bytes::from_static(b"\x00\x01\x02");
        assert_eq!(codec.decode_value(&codec.encode_value(&value)), value);
    }
}
