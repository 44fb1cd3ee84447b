//! Typed output sinks.
//!
//! Each request carries one sink; the reply decoder feeds it tokens and
//! the request's completion reads the assembled result out of it with
//! [`CommandOutput::take`] once the reply has ended. Sinks that produce
//! user keys or values hold the connection's codec and decode as they
//! accumulate.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use braid_proto::ReplyConsumer;
use bytes::Bytes;

use crate::codec::RedisCodec;
use crate::error::Error;
use crate::types::{KeyValue, Reply, ScoredValue};

/// A reply sink with a typed terminal result.
pub trait CommandOutput: ReplyConsumer + Send + 'static {
    /// The assembled result type.
    type Item: Clone + Send + 'static;

    /// Yield the result. Called once, after the decoder has signalled the
    /// end of the reply. A recorded error wins over any partial value.
    fn take(&mut self) -> Result<Self::Item, Error>;

    /// The request failed outright before its reply completed. Aggregate
    /// sinks settle their dependent requests here; plain sinks have none.
    fn abort(&mut self, error: &Error) {
        let _ = error;
    }
}

/// Parse a protocol double: `inf`/`+inf`/`-inf`/`nan` or plain decimal.
fn parse_double(bytes: &[u8]) -> Option<f64> {
    match bytes {
        b"inf" | b"+inf" => Some(f64::INFINITY),
        b"-inf" => Some(f64::NEG_INFINITY),
        b"nan" => Some(f64::NAN),
        _ => std::str::from_utf8(bytes).ok()?.parse().ok(),
    }
}

// ── Scalar sinks ────────────────────────────────────────────────────────

/// A status line, e.g. `OK` or `QUEUED`.
#[derive(Debug, Default)]
pub struct StatusOutput {
    status: Option<String>,
    error: Option<String>,
}

impl StatusOutput {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReplyConsumer for StatusOutput {
    fn set_bytes(&mut self, bytes: &[u8]) {
        self.status = Some(String::from_utf8_lossy(bytes).into_owned());
    }

    fn set_error(&mut self, error: &str) {
        self.error = Some(error.to_string());
    }
}

impl CommandOutput for StatusOutput {
    type Item = String;

    fn take(&mut self) -> Result<String, Error> {
        if let Some(error) = self.error.take() {
            return Err(Error::Redis(error));
        }
        self.status.take().ok_or(Error::UnexpectedResponse)
    }
}

/// An integer reply.
#[derive(Debug, Default)]
pub struct IntegerOutput {
    value: Option<i64>,
    error: Option<String>,
}

impl IntegerOutput {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReplyConsumer for IntegerOutput {
    fn set_int(&mut self, value: i64) {
        self.value = Some(value);
    }

    fn set_error(&mut self, error: &str) {
        self.error = Some(error.to_string());
    }
}

impl CommandOutput for IntegerOutput {
    type Item = i64;

    fn take(&mut self) -> Result<i64, Error> {
        if let Some(error) = self.error.take() {
            return Err(Error::Redis(error));
        }
        self.value.take().ok_or(Error::UnexpectedResponse)
    }
}

/// An integer that may legitimately be absent (`ZRANK` on a missing
/// member).
#[derive(Debug, Default)]
pub struct OptionalIntegerOutput {
    value: Option<i64>,
    error: Option<String>,
}

impl OptionalIntegerOutput {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReplyConsumer for OptionalIntegerOutput {
    fn set_int(&mut self, value: i64) {
        self.value = Some(value);
    }

    fn set_error(&mut self, error: &str) {
        self.error = Some(error.to_string());
    }
}

impl CommandOutput for OptionalIntegerOutput {
    type Item = Option<i64>;

    fn take(&mut self) -> Result<Option<i64>, Error> {
        if let Some(error) = self.error.take() {
            return Err(Error::Redis(error));
        }
        Ok(self.value.take())
    }
}

/// An integer reply folded to a flag: `1` is true, anything else false.
#[derive(Debug, Default)]
pub struct BooleanOutput {
    value: Option<bool>,
    error: Option<String>,
}

impl BooleanOutput {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReplyConsumer for BooleanOutput {
    fn set_int(&mut self, value: i64) {
        self.value = Some(value == 1);
    }

    fn multi(&mut self, _count: i64) {
        // Nil replies count as false.
        self.value = Some(false);
    }

    fn set_error(&mut self, error: &str) {
        self.error = Some(error.to_string());
    }
}

impl CommandOutput for BooleanOutput {
    type Item = bool;

    fn take(&mut self) -> Result<bool, Error> {
        if let Some(error) = self.error.take() {
            return Err(Error::Redis(error));
        }
        self.value.take().ok_or(Error::UnexpectedResponse)
    }
}

/// A double carried as a bulk string.
#[derive(Debug, Default)]
pub struct DoubleOutput {
    value: Option<f64>,
    error: Option<String>,
}

impl DoubleOutput {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReplyConsumer for DoubleOutput {
    fn set_bytes(&mut self, bytes: &[u8]) {
        match parse_double(bytes) {
            Some(value) => self.value = Some(value),
            None => self.error = Some("invalid double reply".to_string()),
        }
    }

    fn set_error(&mut self, error: &str) {
        self.error = Some(error.to_string());
    }
}

impl CommandOutput for DoubleOutput {
    type Item = f64;

    fn take(&mut self) -> Result<f64, Error> {
        if let Some(error) = self.error.take() {
            return Err(Error::Redis(error));
        }
        self.value.take().ok_or(Error::UnexpectedResponse)
    }
}

/// A double that may legitimately be absent (`ZSCORE` on a missing member).
#[derive(Debug, Default)]
pub struct OptionalDoubleOutput {
    value: Option<f64>,
    error: Option<String>,
}

impl OptionalDoubleOutput {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReplyConsumer for OptionalDoubleOutput {
    fn set_bytes(&mut self, bytes: &[u8]) {
        match parse_double(bytes) {
            Some(value) => self.value = Some(value),
            None => self.error = Some("invalid double reply".to_string()),
        }
    }

    fn set_error(&mut self, error: &str) {
        self.error = Some(error.to_string());
    }
}

impl CommandOutput for OptionalDoubleOutput {
    type Item = Option<f64>;

    fn take(&mut self) -> Result<Option<f64>, Error> {
        if let Some(error) = self.error.take() {
            return Err(Error::Redis(error));
        }
        Ok(self.value.take())
    }
}

/// A Unix-seconds timestamp, e.g. `LASTSAVE`.
#[derive(Debug, Default)]
pub struct DateOutput {
    value: Option<SystemTime>,
    error: Option<String>,
}

impl DateOutput {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReplyConsumer for DateOutput {
    fn set_int(&mut self, value: i64) {
        self.value = Some(UNIX_EPOCH + Duration::from_secs(value.max(0) as u64));
    }

    fn set_error(&mut self, error: &str) {
        self.error = Some(error.to_string());
    }
}

impl CommandOutput for DateOutput {
    type Item = SystemTime;

    fn take(&mut self) -> Result<SystemTime, Error> {
        if let Some(error) = self.error.take() {
            return Err(Error::Redis(error));
        }
        self.value.take().ok_or(Error::UnexpectedResponse)
    }
}

/// Raw reply bytes, e.g. `DUMP`. Nil decodes to `None`.
#[derive(Debug, Default)]
pub struct ByteArrayOutput {
    value: Option<Vec<u8>>,
    error: Option<String>,
}

impl ByteArrayOutput {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReplyConsumer for ByteArrayOutput {
    fn set_bytes(&mut self, bytes: &[u8]) {
        self.value = Some(bytes.to_vec());
    }

    fn set_error(&mut self, error: &str) {
        self.error = Some(error.to_string());
    }
}

impl CommandOutput for ByteArrayOutput {
    type Item = Option<Vec<u8>>;

    fn take(&mut self) -> Result<Option<Vec<u8>>, Error> {
        if let Some(error) = self.error.take() {
            return Err(Error::Redis(error));
        }
        Ok(self.value.take())
    }
}

// ── Codec-decoding sinks ────────────────────────────────────────────────

/// A single key, absent when the reply is nil.
pub struct KeyOutput<C: RedisCodec> {
    codec: Arc<C>,
    key: Option<C::Key>,
    error: Option<String>,
}

impl<C: RedisCodec> KeyOutput<C> {
    pub fn new(codec: Arc<C>) -> Self {
        Self {
            codec,
            key: None,
            error: None,
        }
    }
}

impl<C: RedisCodec> ReplyConsumer for KeyOutput<C> {
    fn set_bytes(&mut self, bytes: &[u8]) {
        self.key = Some(self.codec.decode_key(bytes));
    }

    fn set_error(&mut self, error: &str) {
        self.error = Some(error.to_string());
    }
}

impl<C: RedisCodec> CommandOutput for KeyOutput<C> {
    type Item = Option<C::Key>;

    fn take(&mut self) -> Result<Option<C::Key>, Error> {
        if let Some(error) = self.error.take() {
            return Err(Error::Redis(error));
        }
        Ok(self.key.take())
    }
}

/// A single value, absent when the reply is nil (`GET` miss).
pub struct ValueOutput<C: RedisCodec> {
    codec: Arc<C>,
    value: Option<C::Value>,
    error: Option<String>,
}

impl<C: RedisCodec> ValueOutput<C> {
    pub fn new(codec: Arc<C>) -> Self {
        Self {
            codec,
            value: None,
            error: None,
        }
    }
}

impl<C: RedisCodec> ReplyConsumer for ValueOutput<C> {
    fn set_bytes(&mut self, bytes: &[u8]) {
        self.value = Some(self.codec.decode_value(bytes));
    }

    fn set_error(&mut self, error: &str) {
        self.error = Some(error.to_string());
    }
}

impl<C: RedisCodec> CommandOutput for ValueOutput<C> {
    type Item = Option<C::Value>;

    fn take(&mut self) -> Result<Option<C::Value>, Error> {
        if let Some(error) = self.error.take() {
            return Err(Error::Redis(error));
        }
        Ok(self.value.take())
    }
}

/// A list of keys.
pub struct KeyListOutput<C: RedisCodec> {
    codec: Arc<C>,
    keys: Vec<C::Key>,
    error: Option<String>,
}

impl<C: RedisCodec> KeyListOutput<C> {
    pub fn new(codec: Arc<C>) -> Self {
        Self {
            codec,
            keys: Vec::new(),
            error: None,
        }
    }
}

impl<C: RedisCodec> ReplyConsumer for KeyListOutput<C> {
    fn set_bytes(&mut self, bytes: &[u8]) {
        self.keys.push(self.codec.decode_key(bytes));
    }

    fn set_error(&mut self, error: &str) {
        self.error = Some(error.to_string());
    }
}

impl<C: RedisCodec> CommandOutput for KeyListOutput<C> {
    type Item = Vec<C::Key>;

    fn take(&mut self) -> Result<Vec<C::Key>, Error> {
        if let Some(error) = self.error.take() {
            return Err(Error::Redis(error));
        }
        Ok(std::mem::take(&mut self.keys))
    }
}

/// A list of values. Nil elements are dropped; use
/// [`OptionalValueListOutput`] where positions matter.
pub struct ValueListOutput<C: RedisCodec> {
    codec: Arc<C>,
    values: Vec<C::Value>,
    error: Option<String>,
}

impl<C: RedisCodec> ValueListOutput<C> {
    pub fn new(codec: Arc<C>) -> Self {
        Self {
            codec,
            values: Vec::new(),
            error: None,
        }
    }
}

impl<C: RedisCodec> ReplyConsumer for ValueListOutput<C> {
    fn set_bytes(&mut self, bytes: &[u8]) {
        self.values.push(self.codec.decode_value(bytes));
    }

    fn set_error(&mut self, error: &str) {
        self.error = Some(error.to_string());
    }
}

impl<C: RedisCodec> CommandOutput for ValueListOutput<C> {
    type Item = Vec<C::Value>;

    fn take(&mut self) -> Result<Vec<C::Value>, Error> {
        if let Some(error) = self.error.take() {
            return Err(Error::Redis(error));
        }
        Ok(std::mem::take(&mut self.values))
    }
}

/// A positional list of values where nil elements survive as `None`
/// (`MGET`).
pub struct OptionalValueListOutput<C: RedisCodec> {
    codec: Arc<C>,
    values: Vec<Option<C::Value>>,
    saw_header: bool,
    error: Option<String>,
}

impl<C: RedisCodec> OptionalValueListOutput<C> {
    pub fn new(codec: Arc<C>) -> Self {
        Self {
            codec,
            values: Vec::new(),
            saw_header: false,
            error: None,
        }
    }
}

impl<C: RedisCodec> ReplyConsumer for OptionalValueListOutput<C> {
    fn set_bytes(&mut self, bytes: &[u8]) {
        self.values.push(Some(self.codec.decode_value(bytes)));
    }

    fn multi(&mut self, count: i64) {
        if !self.saw_header {
            self.saw_header = true;
            if count > 0 {
                self.values.reserve(count as usize);
            }
        } else if count < 0 {
            self.values.push(None);
        }
    }

    fn set_error(&mut self, error: &str) {
        self.error = Some(error.to_string());
    }
}

impl<C: RedisCodec> CommandOutput for OptionalValueListOutput<C> {
    type Item = Vec<Option<C::Value>>;

    fn take(&mut self) -> Result<Vec<Option<C::Value>>, Error> {
        if let Some(error) = self.error.take() {
            return Err(Error::Redis(error));
        }
        Ok(std::mem::take(&mut self.values))
    }
}

/// An unordered set of values.
pub struct ValueSetOutput<C: RedisCodec>
where
    C::Value: Eq + Hash,
{
    codec: Arc<C>,
    values: HashSet<C::Value>,
    error: Option<String>,
}

impl<C: RedisCodec> ValueSetOutput<C>
where
    C::Value: Eq + Hash,
{
    pub fn new(codec: Arc<C>) -> Self {
        Self {
            codec,
            values: HashSet::new(),
            error: None,
        }
    }
}

impl<C: RedisCodec> ReplyConsumer for ValueSetOutput<C>
where
    C::Value: Eq + Hash,
{
    fn set_bytes(&mut self, bytes: &[u8]) {
        self.values.insert(self.codec.decode_value(bytes));
    }

    fn set_error(&mut self, error: &str) {
        self.error = Some(error.to_string());
    }
}

impl<C: RedisCodec> CommandOutput for ValueSetOutput<C>
where
    C::Value: Eq + Hash,
{
    type Item = HashSet<C::Value>;

    fn take(&mut self) -> Result<HashSet<C::Value>, Error> {
        if let Some(error) = self.error.take() {
            return Err(Error::Redis(error));
        }
        Ok(std::mem::take(&mut self.values))
    }
}

/// A field/value map. Successive payloads pair up: field then value.
pub struct MapOutput<C: RedisCodec>
where
    C::Key: Eq + Hash,
{
    codec: Arc<C>,
    map: HashMap<C::Key, C::Value>,
    pending_key: Option<C::Key>,
    error: Option<String>,
}

impl<C: RedisCodec> MapOutput<C>
where
    C::Key: Eq + Hash,
{
    pub fn new(codec: Arc<C>) -> Self {
        Self {
            codec,
            map: HashMap::new(),
            pending_key: None,
            error: None,
        }
    }
}

impl<C: RedisCodec> ReplyConsumer for MapOutput<C>
where
    C::Key: Eq + Hash,
{
    fn set_bytes(&mut self, bytes: &[u8]) {
        match self.pending_key.take() {
            None => self.pending_key = Some(self.codec.decode_key(bytes)),
            Some(key) => {
                self.map.insert(key, self.codec.decode_value(bytes));
            }
        }
    }

    fn set_error(&mut self, error: &str) {
        self.error = Some(error.to_string());
    }
}

impl<C: RedisCodec> CommandOutput for MapOutput<C>
where
    C::Key: Eq + Hash,
{
    type Item = HashMap<C::Key, C::Value>;

    fn take(&mut self) -> Result<HashMap<C::Key, C::Value>, Error> {
        if let Some(error) = self.error.take() {
            return Err(Error::Redis(error));
        }
        Ok(std::mem::take(&mut self.map))
    }
}

/// Member/score pairs from a `WITHSCORES` range.
pub struct ScoredValueListOutput<C: RedisCodec> {
    codec: Arc<C>,
    values: Vec<ScoredValue<C::Value>>,
    pending: Option<C::Value>,
    error: Option<String>,
}

impl<C: RedisCodec> ScoredValueListOutput<C> {
    pub fn new(codec: Arc<C>) -> Self {
        Self {
            codec,
            values: Vec::new(),
            pending: None,
            error: None,
        }
    }
}

impl<C: RedisCodec> ReplyConsumer for ScoredValueListOutput<C> {
    fn set_bytes(&mut self, bytes: &[u8]) {
        match self.pending.take() {
            None => self.pending = Some(self.codec.decode_value(bytes)),
            Some(value) => {
                let score = parse_double(bytes).unwrap_or(f64::NAN);
                self.values.push(ScoredValue { value, score });
            }
        }
    }

    fn set_error(&mut self, error: &str) {
        self.error = Some(error.to_string());
    }
}

impl<C: RedisCodec> CommandOutput for ScoredValueListOutput<C> {
    type Item = Vec<ScoredValue<C::Value>>;

    fn take(&mut self) -> Result<Vec<ScoredValue<C::Value>>, Error> {
        if let Some(error) = self.error.take() {
            return Err(Error::Redis(error));
        }
        Ok(std::mem::take(&mut self.values))
    }
}

/// A list of flags, e.g. `SCRIPT EXISTS`.
#[derive(Debug, Default)]
pub struct BooleanListOutput {
    values: Vec<bool>,
    error: Option<String>,
}

impl BooleanListOutput {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReplyConsumer for BooleanListOutput {
    fn set_int(&mut self, value: i64) {
        self.values.push(value == 1);
    }

    fn set_error(&mut self, error: &str) {
        self.error = Some(error.to_string());
    }
}

impl CommandOutput for BooleanListOutput {
    type Item = Vec<bool>;

    fn take(&mut self) -> Result<Vec<bool>, Error> {
        if let Some(error) = self.error.take() {
            return Err(Error::Redis(error));
        }
        Ok(std::mem::take(&mut self.values))
    }
}

/// A list of strings, e.g. `CONFIG GET`.
#[derive(Debug, Default)]
pub struct StringListOutput {
    values: Vec<String>,
    error: Option<String>,
}

impl StringListOutput {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReplyConsumer for StringListOutput {
    fn set_bytes(&mut self, bytes: &[u8]) {
        self.values.push(String::from_utf8_lossy(bytes).into_owned());
    }

    fn set_error(&mut self, error: &str) {
        self.error = Some(error.to_string());
    }
}

impl CommandOutput for StringListOutput {
    type Item = Vec<String>;

    fn take(&mut self) -> Result<Vec<String>, Error> {
        if let Some(error) = self.error.take() {
            return Err(Error::Redis(error));
        }
        Ok(std::mem::take(&mut self.values))
    }
}

/// The key/value pair returned by the blocking pops, `None` on timeout.
pub struct KeyValueOutput<C: RedisCodec> {
    codec: Arc<C>,
    key: Option<C::Key>,
    value: Option<KeyValue<C::Key, C::Value>>,
    error: Option<String>,
}

impl<C: RedisCodec> KeyValueOutput<C> {
    pub fn new(codec: Arc<C>) -> Self {
        Self {
            codec,
            key: None,
            value: None,
            error: None,
        }
    }
}

impl<C: RedisCodec> ReplyConsumer for KeyValueOutput<C> {
    fn set_bytes(&mut self, bytes: &[u8]) {
        match self.key.take() {
            None => self.key = Some(self.codec.decode_key(bytes)),
            Some(key) => {
                self.value = Some(KeyValue {
                    key,
                    value: self.codec.decode_value(bytes),
                });
            }
        }
    }

    fn set_error(&mut self, error: &str) {
        self.error = Some(error.to_string());
    }
}

impl<C: RedisCodec> CommandOutput for KeyValueOutput<C> {
    type Item = Option<KeyValue<C::Key, C::Value>>;

    fn take(&mut self) -> Result<Option<KeyValue<C::Key, C::Value>>, Error> {
        if let Some(error) = self.error.take() {
            return Err(Error::Redis(error));
        }
        Ok(self.value.take())
    }
}

// ── Nested-multi sink ───────────────────────────────────────────────────

/// Assembles an arbitrary reply tree.
///
/// Array headers push a frame; each completed element bubbles into its
/// parent once the parent's countdown reaches zero. Used for replies with
/// no fixed shape (`SLOWLOG GET`, script results) and as the raw recorder
/// inside the transaction aggregate.
#[derive(Debug, Default)]
pub struct NestedMultiOutput {
    stack: Vec<(i64, Vec<Reply>)>,
    root: Option<Reply>,
    error: Option<String>,
}

impl NestedMultiOutput {
    pub fn new() -> Self {
        Self::default()
    }

    fn push_leaf(&mut self, reply: Reply) {
        let mut reply = reply;
        loop {
            match self.stack.last_mut() {
                Some((remaining, items)) => {
                    items.push(reply);
                    *remaining -= 1;
                    if *remaining == 0 {
                        let (_, items) = self.stack.pop().expect("frame just observed");
                        reply = Reply::Array(items);
                        continue;
                    }
                    return;
                }
                None => {
                    self.root = Some(reply);
                    return;
                }
            }
        }
    }

    /// The assembled tree, once the outermost frame has closed.
    pub(crate) fn root(&mut self) -> Option<Reply> {
        self.root.take()
    }
}

impl ReplyConsumer for NestedMultiOutput {
    fn set_bytes(&mut self, bytes: &[u8]) {
        self.push_leaf(Reply::Bulk(Bytes::copy_from_slice(bytes)));
    }

    fn set_int(&mut self, value: i64) {
        self.push_leaf(Reply::Int(value));
    }

    fn multi(&mut self, count: i64) {
        if count < 0 {
            self.push_leaf(Reply::Nil);
        } else if count == 0 {
            self.push_leaf(Reply::Array(Vec::new()));
        } else {
            self.stack.push((count, Vec::with_capacity(count as usize)));
        }
    }

    fn set_error(&mut self, error: &str) {
        if self.stack.is_empty() && self.root.is_none() {
            // The whole reply is an error.
            self.error = Some(error.to_string());
        } else {
            self.push_leaf(Reply::Error(error.to_string()));
        }
    }
}

impl CommandOutput for NestedMultiOutput {
    type Item = Reply;

    fn take(&mut self) -> Result<Reply, Error> {
        if let Some(error) = self.error.take() {
            return Err(Error::Redis(error));
        }
        self.root.take().ok_or(Error::UnexpectedResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::StringCodec;

    fn codec() -> Arc<StringCodec> {
        Arc::new(StringCodec)
    }

    #[test]
    fn test_status_output() {
        let mut out = StatusOutput::new();
        out.set_bytes(b"OK");
        assert_eq!(out.take().unwrap(), "OK");
    }

    #[test]
    fn test_error_wins_over_value() {
        let mut out = IntegerOutput::new();
        out.set_int(3);
        out.set_error("ERR oops");
        assert_eq!(out.take(), Err(Error::Redis("ERR oops".to_string())));
    }

    #[test]
    fn test_boolean_output() {
        let mut out = BooleanOutput::new();
        out.set_int(1);
        assert!(out.take().unwrap());

        let mut out = BooleanOutput::new();
        out.set_int(0);
        assert!(!out.take().unwrap());

        let mut out = BooleanOutput::new();
        out.multi(-1);
        assert!(!out.take().unwrap());
    }

    #[test]
    fn test_double_output_special_values() {
        let mut out = DoubleOutput::new();
        out.set_bytes(b"+inf");
        assert_eq!(out.take().unwrap(), f64::INFINITY);

        let mut out = DoubleOutput::new();
        out.set_bytes(b"-inf");
        assert_eq!(out.take().unwrap(), f64::NEG_INFINITY);

        let mut out = DoubleOutput::new();
        out.set_bytes(b"3.25");
        assert_eq!(out.take().unwrap(), 3.25);
    }

    #[test]
    fn test_optional_double_absent() {
        let mut out = OptionalDoubleOutput::new();
        out.multi(-1);
        assert_eq!(out.take().unwrap(), None);
    }

    #[test]
    fn test_value_output_nil() {
        let mut out = ValueOutput::new(codec());
        out.multi(-1);
        assert_eq!(out.take().unwrap(), None);
    }

    #[test]
    fn test_map_output_pairs_fields() {
        let mut out = MapOutput::new(codec());
        out.multi(4);
        out.set_bytes(b"a");
        out.set_bytes(b"1");
        out.set_bytes(b"b");
        out.set_bytes(b"2");
        let map = out.take().unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map["a"], "1");
        assert_eq!(map["b"], "2");
    }

    #[test]
    fn test_optional_value_list_keeps_positions() {
        let mut out = OptionalValueListOutput::new(codec());
        out.multi(3);
        out.set_bytes(b"x");
        out.multi(-1);
        out.set_bytes(b"z");
        assert_eq!(
            out.take().unwrap(),
            vec![Some("x".to_string()), None, Some("z".to_string())]
        );
    }

    #[test]
    fn test_scored_value_list_pairs_scores() {
        let mut out = ScoredValueListOutput::new(codec());
        out.multi(4);
        out.set_bytes(b"one");
        out.set_bytes(b"1.5");
        out.set_bytes(b"two");
        out.set_bytes(b"-inf");
        let scored = out.take().unwrap();
        assert_eq!(scored.len(), 2);
        assert_eq!(scored[0].value, "one");
        assert_eq!(scored[0].score, 1.5);
        assert_eq!(scored[1].score, f64::NEG_INFINITY);
    }

    #[test]
    fn test_key_value_output() {
        let mut out = KeyValueOutput::new(codec());
        out.multi(2);
        out.set_bytes(b"queue");
        out.set_bytes(b"job1");
        let kv = out.take().unwrap().unwrap();
        assert_eq!(kv.key, "queue");
        assert_eq!(kv.value, "job1");
    }

    #[test]
    fn test_key_value_output_timeout_is_none() {
        let mut out = KeyValueOutput::new(codec());
        out.multi(-1);
        assert_eq!(out.take().unwrap(), None);
    }

    #[test]
    fn test_nested_multi_builds_tree() {
        let mut out = NestedMultiOutput::new();
        out.multi(3);
        out.set_int(1);
        out.multi(2);
        out.set_bytes(b"a");
        out.multi(-1);
        out.set_bytes(b"tail");
        let reply = out.take().unwrap();
        assert_eq!(
            reply,
            Reply::Array(vec![
                Reply::Int(1),
                Reply::Array(vec![Reply::Bulk(Bytes::from_static(b"a")), Reply::Nil]),
                Reply::Bulk(Bytes::from_static(b"tail")),
            ])
        );
    }

    #[test]
    fn test_nested_multi_top_level_error() {
        let mut out = NestedMultiOutput::new();
        out.set_error("ERR broken");
        assert_eq!(out.take(), Err(Error::Redis("ERR broken".to_string())));
    }

    #[test]
    fn test_nested_multi_error_element_is_data() {
        let mut out = NestedMultiOutput::new();
        out.multi(2);
        out.set_bytes(b"OK");
        out.set_error("ERR elem");
        let reply = out.take().unwrap();
        assert_eq!(
            reply,
            Reply::Array(vec![
                Reply::Bulk(Bytes::from_static(b"OK")),
                Reply::Error("ERR elem".to_string()),
            ])
        );
    }
}
