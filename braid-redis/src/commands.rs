//! The public request surface.
//!
//! One thin entry per command: assemble the argument vector in protocol
//! order, pick the output sink that matches the reply shape, dispatch,
//! and hand the completion back. Nothing here blocks; the synchronous
//! session commands (`AUTH`, `SELECT`) live on the connection itself.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::time::SystemTime;

use braid_proto::{CommandArgs, CommandKind, Keyword};
use sha1::{Digest, Sha1};

use crate::codec::RedisCodec;
use crate::completion::Completion;
use crate::connection::Connection;
use crate::output::{
    BooleanListOutput, BooleanOutput, ByteArrayOutput, DateOutput, DoubleOutput, IntegerOutput,
    KeyListOutput, KeyOutput, KeyValueOutput, MapOutput, NestedMultiOutput, OptionalDoubleOutput,
    OptionalIntegerOutput, OptionalValueListOutput, ScoredValueListOutput, StatusOutput,
    StringListOutput, ValueListOutput, ValueOutput, ValueSetOutput,
};
use crate::types::{KeyValue, Reply, ScoredValue};

/// Sort order for [`SortArgs`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

/// Options for `SORT`.
#[derive(Debug, Clone, Default)]
pub struct SortArgs {
    by: Option<String>,
    limit: Option<(i64, i64)>,
    get: Vec<String>,
    order: Option<Order>,
    alpha: bool,
}

impl SortArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sort by the values at keys matching `pattern`.
    pub fn by(mut self, pattern: &str) -> Self {
        self.by = Some(pattern.to_string());
        self
    }

    /// Return `count` elements starting at `offset`.
    pub fn limit(mut self, offset: i64, count: i64) -> Self {
        self.limit = Some((offset, count));
        self
    }

    /// Fetch the values at keys matching `pattern` instead of the
    /// elements themselves. May be given several times.
    pub fn get(mut self, pattern: &str) -> Self {
        self.get.push(pattern.to_string());
        self
    }

    pub fn asc(mut self) -> Self {
        self.order = Some(Order::Asc);
        self
    }

    pub fn desc(mut self) -> Self {
        self.order = Some(Order::Desc);
        self
    }

    /// Sort lexicographically rather than numerically.
    pub fn alpha(mut self) -> Self {
        self.alpha = true;
        self
    }

    fn build(&self, args: &mut CommandArgs, store: Option<&[u8]>) {
        if let Some(by) = &self.by {
            args.add_keyword(Keyword::BY).add_str(by);
        }
        if let Some((offset, count)) = self.limit {
            args.add_keyword(Keyword::LIMIT).add_i64(offset).add_i64(count);
        }
        for pattern in &self.get {
            args.add_keyword(Keyword::GET).add_str(pattern);
        }
        match self.order {
            Some(Order::Asc) => {
                args.add_keyword(Keyword::ASC);
            }
            Some(Order::Desc) => {
                args.add_keyword(Keyword::DESC);
            }
            None => {}
        }
        if self.alpha {
            args.add_keyword(Keyword::ALPHA);
        }
        if let Some(destination) = store {
            args.add_keyword(Keyword::STORE).add(destination);
        }
    }
}

/// Aggregation mode for [`ZStoreArgs`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Sum,
    Min,
    Max,
}

/// Options for `ZUNIONSTORE` / `ZINTERSTORE`.
#[derive(Debug, Clone, Default)]
pub struct ZStoreArgs {
    weights: Vec<f64>,
    aggregate: Option<Aggregate>,
}

impl ZStoreArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Per-input-set multiplication factors, in key order.
    pub fn weights(mut self, weights: &[f64]) -> Self {
        self.weights = weights.to_vec();
        self
    }

    pub fn aggregate(mut self, aggregate: Aggregate) -> Self {
        self.aggregate = Some(aggregate);
        self
    }

    fn build(&self, args: &mut CommandArgs) {
        if !self.weights.is_empty() {
            args.add_keyword(Keyword::WEIGHTS);
            for weight in &self.weights {
                args.add_double(*weight);
            }
        }
        match self.aggregate {
            Some(Aggregate::Sum) => {
                args.add_keyword(Keyword::AGGREGATE).add_keyword(Keyword::SUM);
            }
            Some(Aggregate::Min) => {
                args.add_keyword(Keyword::AGGREGATE).add_keyword(Keyword::MIN);
            }
            Some(Aggregate::Max) => {
                args.add_keyword(Keyword::AGGREGATE).add_keyword(Keyword::MAX);
            }
            None => {}
        }
    }
}

impl<C: RedisCodec> Connection<C> {
    // ── Argument helpers ────────────────────────────────────────────────

    fn key_args(&self, key: &C::Key) -> CommandArgs {
        let mut args = CommandArgs::new();
        args.add(&self.codec().encode_key(key));
        args
    }

    fn keys_args(&self, keys: &[&C::Key]) -> CommandArgs {
        let codec = self.codec();
        let mut args = CommandArgs::new();
        for key in keys {
            args.add(&codec.encode_key(key));
        }
        args
    }

    fn key_value_args(&self, key: &C::Key, value: &C::Value) -> CommandArgs {
        let codec = self.codec();
        let mut args = CommandArgs::new();
        args.add(&codec.encode_key(key));
        args.add(&codec.encode_value(value));
        args
    }

    fn key_values_args(&self, key: &C::Key, values: &[&C::Value]) -> CommandArgs {
        let codec = self.codec();
        let mut args = CommandArgs::new();
        args.add(&codec.encode_key(key));
        for value in values {
            args.add(&codec.encode_value(value));
        }
        args
    }

    /// Append key/value pairs, two frames per entry, in slice order.
    fn pairs_args(&self, args: &mut CommandArgs, pairs: &[(&C::Key, &C::Value)]) {
        let codec = self.codec();
        for (key, value) in pairs {
            args.add(&codec.encode_key(key));
            args.add(&codec.encode_value(value));
        }
    }

    // ── Strings ─────────────────────────────────────────────────────────

    pub fn append(&self, key: &C::Key, value: &C::Value) -> Completion<i64> {
        self.dispatch(CommandKind::APPEND, IntegerOutput::new(), self.key_value_args(key, value))
    }

    pub fn bitcount(&self, key: &C::Key) -> Completion<i64> {
        self.dispatch(CommandKind::BITCOUNT, IntegerOutput::new(), self.key_args(key))
    }

    pub fn bitcount_range(&self, key: &C::Key, start: i64, end: i64) -> Completion<i64> {
        let mut args = self.key_args(key);
        args.add_i64(start).add_i64(end);
        self.dispatch(CommandKind::BITCOUNT, IntegerOutput::new(), args)
    }

    fn bitop(&self, op: Keyword, destination: &C::Key, keys: &[&C::Key]) -> Completion<i64> {
        let codec = self.codec();
        let mut args = CommandArgs::new();
        args.add_keyword(op).add(&codec.encode_key(destination));
        for key in keys {
            args.add(&codec.encode_key(key));
        }
        self.dispatch(CommandKind::BITOP, IntegerOutput::new(), args)
    }

    pub fn bitop_and(&self, destination: &C::Key, keys: &[&C::Key]) -> Completion<i64> {
        self.bitop(Keyword::AND, destination, keys)
    }

    pub fn bitop_or(&self, destination: &C::Key, keys: &[&C::Key]) -> Completion<i64> {
        self.bitop(Keyword::OR, destination, keys)
    }

    pub fn bitop_xor(&self, destination: &C::Key, keys: &[&C::Key]) -> Completion<i64> {
        self.bitop(Keyword::XOR, destination, keys)
    }

    pub fn bitop_not(&self, destination: &C::Key, source: &C::Key) -> Completion<i64> {
        self.bitop(Keyword::NOT, destination, &[source])
    }

    pub fn decr(&self, key: &C::Key) -> Completion<i64> {
        self.dispatch(CommandKind::DECR, IntegerOutput::new(), self.key_args(key))
    }

    pub fn decrby(&self, key: &C::Key, amount: i64) -> Completion<i64> {
        let mut args = self.key_args(key);
        args.add_i64(amount);
        self.dispatch(CommandKind::DECRBY, IntegerOutput::new(), args)
    }

    pub fn get(&self, key: &C::Key) -> Completion<Option<C::Value>> {
        self.dispatch(CommandKind::GET, ValueOutput::new(self.codec()), self.key_args(key))
    }

    pub fn getbit(&self, key: &C::Key, offset: i64) -> Completion<i64> {
        let mut args = self.key_args(key);
        args.add_i64(offset);
        self.dispatch(CommandKind::GETBIT, IntegerOutput::new(), args)
    }

    pub fn getrange(&self, key: &C::Key, start: i64, end: i64) -> Completion<Option<C::Value>> {
        let mut args = self.key_args(key);
        args.add_i64(start).add_i64(end);
        self.dispatch(CommandKind::GETRANGE, ValueOutput::new(self.codec()), args)
    }

    pub fn getset(&self, key: &C::Key, value: &C::Value) -> Completion<Option<C::Value>> {
        self.dispatch(
            CommandKind::GETSET,
            ValueOutput::new(self.codec()),
            self.key_value_args(key, value),
        )
    }

    pub fn incr(&self, key: &C::Key) -> Completion<i64> {
        self.dispatch(CommandKind::INCR, IntegerOutput::new(), self.key_args(key))
    }

    pub fn incrby(&self, key: &C::Key, amount: i64) -> Completion<i64> {
        let mut args = self.key_args(key);
        args.add_i64(amount);
        self.dispatch(CommandKind::INCRBY, IntegerOutput::new(), args)
    }

    pub fn incrbyfloat(&self, key: &C::Key, amount: f64) -> Completion<f64> {
        let mut args = self.key_args(key);
        args.add_double(amount);
        self.dispatch(CommandKind::INCRBYFLOAT, DoubleOutput::new(), args)
    }

    pub fn mget(&self, keys: &[&C::Key]) -> Completion<Vec<Option<C::Value>>> {
        self.dispatch(
            CommandKind::MGET,
            OptionalValueListOutput::new(self.codec()),
            self.keys_args(keys),
        )
    }

    pub fn mset(&self, pairs: &[(&C::Key, &C::Value)]) -> Completion<String> {
        let mut args = CommandArgs::new();
        self.pairs_args(&mut args, pairs);
        self.dispatch(CommandKind::MSET, StatusOutput::new(), args)
    }

    pub fn msetnx(&self, pairs: &[(&C::Key, &C::Value)]) -> Completion<bool> {
        let mut args = CommandArgs::new();
        self.pairs_args(&mut args, pairs);
        self.dispatch(CommandKind::MSETNX, BooleanOutput::new(), args)
    }

    pub fn set(&self, key: &C::Key, value: &C::Value) -> Completion<String> {
        self.dispatch(CommandKind::SET, StatusOutput::new(), self.key_value_args(key, value))
    }

    pub fn setbit(&self, key: &C::Key, offset: i64, value: i64) -> Completion<i64> {
        let mut args = self.key_args(key);
        args.add_i64(offset).add_i64(value);
        self.dispatch(CommandKind::SETBIT, IntegerOutput::new(), args)
    }

    pub fn setex(&self, key: &C::Key, seconds: i64, value: &C::Value) -> Completion<String> {
        let codec = self.codec();
        let mut args = self.key_args(key);
        args.add_i64(seconds).add(&codec.encode_value(value));
        self.dispatch(CommandKind::SETEX, StatusOutput::new(), args)
    }

    pub fn psetex(&self, key: &C::Key, milliseconds: i64, value: &C::Value) -> Completion<String> {
        let codec = self.codec();
        let mut args = self.key_args(key);
        args.add_i64(milliseconds).add(&codec.encode_value(value));
        self.dispatch(CommandKind::PSETEX, StatusOutput::new(), args)
    }

    pub fn setnx(&self, key: &C::Key, value: &C::Value) -> Completion<bool> {
        self.dispatch(CommandKind::SETNX, BooleanOutput::new(), self.key_value_args(key, value))
    }

    pub fn setrange(&self, key: &C::Key, offset: i64, value: &C::Value) -> Completion<i64> {
        let codec = self.codec();
        let mut args = self.key_args(key);
        args.add_i64(offset).add(&codec.encode_value(value));
        self.dispatch(CommandKind::SETRANGE, IntegerOutput::new(), args)
    }

    pub fn strlen(&self, key: &C::Key) -> Completion<i64> {
        self.dispatch(CommandKind::STRLEN, IntegerOutput::new(), self.key_args(key))
    }

    // ── Keys ────────────────────────────────────────────────────────────

    pub fn del(&self, keys: &[&C::Key]) -> Completion<i64> {
        self.dispatch(CommandKind::DEL, IntegerOutput::new(), self.keys_args(keys))
    }

    pub fn dump(&self, key: &C::Key) -> Completion<Option<Vec<u8>>> {
        self.dispatch(CommandKind::DUMP, ByteArrayOutput::new(), self.key_args(key))
    }

    pub fn exists(&self, key: &C::Key) -> Completion<bool> {
        self.dispatch(CommandKind::EXISTS, BooleanOutput::new(), self.key_args(key))
    }

    pub fn expire(&self, key: &C::Key, seconds: i64) -> Completion<bool> {
        let mut args = self.key_args(key);
        args.add_i64(seconds);
        self.dispatch(CommandKind::EXPIRE, BooleanOutput::new(), args)
    }

    pub fn expireat(&self, key: &C::Key, timestamp: i64) -> Completion<bool> {
        let mut args = self.key_args(key);
        args.add_i64(timestamp);
        self.dispatch(CommandKind::EXPIREAT, BooleanOutput::new(), args)
    }

    pub fn pexpire(&self, key: &C::Key, milliseconds: i64) -> Completion<bool> {
        let mut args = self.key_args(key);
        args.add_i64(milliseconds);
        self.dispatch(CommandKind::PEXPIRE, BooleanOutput::new(), args)
    }

    pub fn pexpireat(&self, key: &C::Key, timestamp: i64) -> Completion<bool> {
        let mut args = self.key_args(key);
        args.add_i64(timestamp);
        self.dispatch(CommandKind::PEXPIREAT, BooleanOutput::new(), args)
    }

    pub fn keys(&self, pattern: &C::Key) -> Completion<Vec<C::Key>> {
        self.dispatch(CommandKind::KEYS, KeyListOutput::new(self.codec()), self.key_args(pattern))
    }

    pub fn move_key(&self, key: &C::Key, db: i64) -> Completion<bool> {
        let mut args = self.key_args(key);
        args.add_i64(db);
        self.dispatch(CommandKind::MOVE, BooleanOutput::new(), args)
    }

    pub fn persist(&self, key: &C::Key) -> Completion<bool> {
        self.dispatch(CommandKind::PERSIST, BooleanOutput::new(), self.key_args(key))
    }

    pub fn pttl(&self, key: &C::Key) -> Completion<i64> {
        self.dispatch(CommandKind::PTTL, IntegerOutput::new(), self.key_args(key))
    }

    pub fn ttl(&self, key: &C::Key) -> Completion<i64> {
        self.dispatch(CommandKind::TTL, IntegerOutput::new(), self.key_args(key))
    }

    pub fn randomkey(&self) -> Completion<Option<C::Key>> {
        self.dispatch(CommandKind::RANDOMKEY, KeyOutput::new(self.codec()), CommandArgs::new())
    }

    pub fn rename(&self, key: &C::Key, new_key: &C::Key) -> Completion<String> {
        self.dispatch(CommandKind::RENAME, StatusOutput::new(), self.keys_args(&[key, new_key]))
    }

    pub fn renamenx(&self, key: &C::Key, new_key: &C::Key) -> Completion<bool> {
        self.dispatch(CommandKind::RENAMENX, BooleanOutput::new(), self.keys_args(&[key, new_key]))
    }

    pub fn restore(&self, key: &C::Key, ttl: i64, serialized: &[u8]) -> Completion<String> {
        let mut args = self.key_args(key);
        args.add_i64(ttl).add(serialized);
        self.dispatch(CommandKind::RESTORE, StatusOutput::new(), args)
    }

    pub fn migrate(
        &self,
        host: &str,
        port: u16,
        key: &C::Key,
        db: i64,
        timeout_ms: i64,
    ) -> Completion<String> {
        let codec = self.codec();
        let mut args = CommandArgs::new();
        args.add_str(host)
            .add_u64(port as u64)
            .add(&codec.encode_key(key))
            .add_i64(db)
            .add_i64(timeout_ms);
        self.dispatch(CommandKind::MIGRATE, StatusOutput::new(), args)
    }

    pub fn sort(&self, key: &C::Key) -> Completion<Vec<C::Value>> {
        self.dispatch(CommandKind::SORT, ValueListOutput::new(self.codec()), self.key_args(key))
    }

    pub fn sort_with(&self, key: &C::Key, sort_args: &SortArgs) -> Completion<Vec<C::Value>> {
        let mut args = self.key_args(key);
        sort_args.build(&mut args, None);
        self.dispatch(CommandKind::SORT, ValueListOutput::new(self.codec()), args)
    }

    pub fn sort_store(
        &self,
        key: &C::Key,
        sort_args: &SortArgs,
        destination: &C::Key,
    ) -> Completion<i64> {
        let codec = self.codec();
        let mut args = self.key_args(key);
        sort_args.build(&mut args, Some(&codec.encode_key(destination)));
        self.dispatch(CommandKind::SORT, IntegerOutput::new(), args)
    }

    pub fn type_of(&self, key: &C::Key) -> Completion<String> {
        self.dispatch(CommandKind::TYPE, StatusOutput::new(), self.key_args(key))
    }

    // ── Hashes ──────────────────────────────────────────────────────────

    pub fn hdel(&self, key: &C::Key, fields: &[&C::Key]) -> Completion<i64> {
        let codec = self.codec();
        let mut args = self.key_args(key);
        for field in fields {
            args.add(&codec.encode_key(field));
        }
        self.dispatch(CommandKind::HDEL, IntegerOutput::new(), args)
    }

    pub fn hexists(&self, key: &C::Key, field: &C::Key) -> Completion<bool> {
        self.dispatch(CommandKind::HEXISTS, BooleanOutput::new(), self.keys_args(&[key, field]))
    }

    pub fn hget(&self, key: &C::Key, field: &C::Key) -> Completion<Option<C::Value>> {
        self.dispatch(
            CommandKind::HGET,
            ValueOutput::new(self.codec()),
            self.keys_args(&[key, field]),
        )
    }

    pub fn hgetall(&self, key: &C::Key) -> Completion<HashMap<C::Key, C::Value>>
    where
        C::Key: Eq + Hash,
    {
        self.dispatch(CommandKind::HGETALL, MapOutput::new(self.codec()), self.key_args(key))
    }

    pub fn hincrby(&self, key: &C::Key, field: &C::Key, amount: i64) -> Completion<i64> {
        let mut args = self.keys_args(&[key, field]);
        args.add_i64(amount);
        self.dispatch(CommandKind::HINCRBY, IntegerOutput::new(), args)
    }

    pub fn hincrbyfloat(&self, key: &C::Key, field: &C::Key, amount: f64) -> Completion<f64> {
        let mut args = self.keys_args(&[key, field]);
        args.add_double(amount);
        self.dispatch(CommandKind::HINCRBYFLOAT, DoubleOutput::new(), args)
    }

    pub fn hkeys(&self, key: &C::Key) -> Completion<Vec<C::Key>> {
        self.dispatch(CommandKind::HKEYS, KeyListOutput::new(self.codec()), self.key_args(key))
    }

    pub fn hlen(&self, key: &C::Key) -> Completion<i64> {
        self.dispatch(CommandKind::HLEN, IntegerOutput::new(), self.key_args(key))
    }

    pub fn hmget(&self, key: &C::Key, fields: &[&C::Key]) -> Completion<Vec<Option<C::Value>>> {
        let codec = self.codec();
        let mut args = self.key_args(key);
        for field in fields {
            args.add(&codec.encode_key(field));
        }
        self.dispatch(CommandKind::HMGET, OptionalValueListOutput::new(self.codec()), args)
    }

    pub fn hmset(&self, key: &C::Key, pairs: &[(&C::Key, &C::Value)]) -> Completion<String> {
        let mut args = self.key_args(key);
        self.pairs_args(&mut args, pairs);
        self.dispatch(CommandKind::HMSET, StatusOutput::new(), args)
    }

    pub fn hset(&self, key: &C::Key, field: &C::Key, value: &C::Value) -> Completion<bool> {
        let codec = self.codec();
        let mut args = self.keys_args(&[key, field]);
        args.add(&codec.encode_value(value));
        self.dispatch(CommandKind::HSET, BooleanOutput::new(), args)
    }

    pub fn hsetnx(&self, key: &C::Key, field: &C::Key, value: &C::Value) -> Completion<bool> {
        let codec = self.codec();
        let mut args = self.keys_args(&[key, field]);
        args.add(&codec.encode_value(value));
        self.dispatch(CommandKind::HSETNX, BooleanOutput::new(), args)
    }

    pub fn hvals(&self, key: &C::Key) -> Completion<Vec<C::Value>> {
        self.dispatch(CommandKind::HVALS, ValueListOutput::new(self.codec()), self.key_args(key))
    }

    // ── Lists ───────────────────────────────────────────────────────────

    pub fn blpop(
        &self,
        timeout: i64,
        keys: &[&C::Key],
    ) -> Completion<Option<KeyValue<C::Key, C::Value>>> {
        let mut args = self.keys_args(keys);
        args.add_i64(timeout);
        self.dispatch(CommandKind::BLPOP, KeyValueOutput::new(self.codec()), args)
    }

    pub fn brpop(
        &self,
        timeout: i64,
        keys: &[&C::Key],
    ) -> Completion<Option<KeyValue<C::Key, C::Value>>> {
        let mut args = self.keys_args(keys);
        args.add_i64(timeout);
        self.dispatch(CommandKind::BRPOP, KeyValueOutput::new(self.codec()), args)
    }

    pub fn brpoplpush(
        &self,
        timeout: i64,
        source: &C::Key,
        destination: &C::Key,
    ) -> Completion<Option<C::Value>> {
        let mut args = self.keys_args(&[source, destination]);
        args.add_i64(timeout);
        self.dispatch(CommandKind::BRPOPLPUSH, ValueOutput::new(self.codec()), args)
    }

    pub fn lindex(&self, key: &C::Key, index: i64) -> Completion<Option<C::Value>> {
        let mut args = self.key_args(key);
        args.add_i64(index);
        self.dispatch(CommandKind::LINDEX, ValueOutput::new(self.codec()), args)
    }

    pub fn linsert(
        &self,
        key: &C::Key,
        before: bool,
        pivot: &C::Value,
        value: &C::Value,
    ) -> Completion<i64> {
        let codec = self.codec();
        let mut args = self.key_args(key);
        args.add_keyword(if before { Keyword::BEFORE } else { Keyword::AFTER })
            .add(&codec.encode_value(pivot))
            .add(&codec.encode_value(value));
        self.dispatch(CommandKind::LINSERT, IntegerOutput::new(), args)
    }

    pub fn llen(&self, key: &C::Key) -> Completion<i64> {
        self.dispatch(CommandKind::LLEN, IntegerOutput::new(), self.key_args(key))
    }

    pub fn lpop(&self, key: &C::Key) -> Completion<Option<C::Value>> {
        self.dispatch(CommandKind::LPOP, ValueOutput::new(self.codec()), self.key_args(key))
    }

    pub fn lpush(&self, key: &C::Key, values: &[&C::Value]) -> Completion<i64> {
        self.dispatch(CommandKind::LPUSH, IntegerOutput::new(), self.key_values_args(key, values))
    }

    pub fn lpushx(&self, key: &C::Key, value: &C::Value) -> Completion<i64> {
        self.dispatch(CommandKind::LPUSHX, IntegerOutput::new(), self.key_value_args(key, value))
    }

    pub fn lrange(&self, key: &C::Key, start: i64, stop: i64) -> Completion<Vec<C::Value>> {
        let mut args = self.key_args(key);
        args.add_i64(start).add_i64(stop);
        self.dispatch(CommandKind::LRANGE, ValueListOutput::new(self.codec()), args)
    }

    pub fn lrem(&self, key: &C::Key, count: i64, value: &C::Value) -> Completion<i64> {
        let codec = self.codec();
        let mut args = self.key_args(key);
        args.add_i64(count).add(&codec.encode_value(value));
        self.dispatch(CommandKind::LREM, IntegerOutput::new(), args)
    }

    pub fn lset(&self, key: &C::Key, index: i64, value: &C::Value) -> Completion<String> {
        let codec = self.codec();
        let mut args = self.key_args(key);
        args.add_i64(index).add(&codec.encode_value(value));
        self.dispatch(CommandKind::LSET, StatusOutput::new(), args)
    }

    pub fn ltrim(&self, key: &C::Key, start: i64, stop: i64) -> Completion<String> {
        let mut args = self.key_args(key);
        args.add_i64(start).add_i64(stop);
        self.dispatch(CommandKind::LTRIM, StatusOutput::new(), args)
    }

    pub fn rpop(&self, key: &C::Key) -> Completion<Option<C::Value>> {
        self.dispatch(CommandKind::RPOP, ValueOutput::new(self.codec()), self.key_args(key))
    }

    pub fn rpoplpush(&self, source: &C::Key, destination: &C::Key) -> Completion<Option<C::Value>> {
        self.dispatch(
            CommandKind::RPOPLPUSH,
            ValueOutput::new(self.codec()),
            self.keys_args(&[source, destination]),
        )
    }

    pub fn rpush(&self, key: &C::Key, values: &[&C::Value]) -> Completion<i64> {
        self.dispatch(CommandKind::RPUSH, IntegerOutput::new(), self.key_values_args(key, values))
    }

    pub fn rpushx(&self, key: &C::Key, value: &C::Value) -> Completion<i64> {
        self.dispatch(CommandKind::RPUSHX, IntegerOutput::new(), self.key_value_args(key, value))
    }

    // ── Sets ────────────────────────────────────────────────────────────

    pub fn sadd(&self, key: &C::Key, members: &[&C::Value]) -> Completion<i64> {
        self.dispatch(CommandKind::SADD, IntegerOutput::new(), self.key_values_args(key, members))
    }

    pub fn scard(&self, key: &C::Key) -> Completion<i64> {
        self.dispatch(CommandKind::SCARD, IntegerOutput::new(), self.key_args(key))
    }

    pub fn sdiff(&self, keys: &[&C::Key]) -> Completion<HashSet<C::Value>>
    where
        C::Value: Eq + Hash,
    {
        self.dispatch(CommandKind::SDIFF, ValueSetOutput::new(self.codec()), self.keys_args(keys))
    }

    pub fn sdiffstore(&self, destination: &C::Key, keys: &[&C::Key]) -> Completion<i64> {
        let mut all = vec![destination];
        all.extend_from_slice(keys);
        self.dispatch(CommandKind::SDIFFSTORE, IntegerOutput::new(), self.keys_args(&all))
    }

    pub fn sinter(&self, keys: &[&C::Key]) -> Completion<HashSet<C::Value>>
    where
        C::Value: Eq + Hash,
    {
        self.dispatch(CommandKind::SINTER, ValueSetOutput::new(self.codec()), self.keys_args(keys))
    }

    pub fn sinterstore(&self, destination: &C::Key, keys: &[&C::Key]) -> Completion<i64> {
        let mut all = vec![destination];
        all.extend_from_slice(keys);
        self.dispatch(CommandKind::SINTERSTORE, IntegerOutput::new(), self.keys_args(&all))
    }

    pub fn sismember(&self, key: &C::Key, member: &C::Value) -> Completion<bool> {
        self.dispatch(
            CommandKind::SISMEMBER,
            BooleanOutput::new(),
            self.key_value_args(key, member),
        )
    }

    pub fn smembers(&self, key: &C::Key) -> Completion<HashSet<C::Value>>
    where
        C::Value: Eq + Hash,
    {
        self.dispatch(CommandKind::SMEMBERS, ValueSetOutput::new(self.codec()), self.key_args(key))
    }

    pub fn smove(
        &self,
        source: &C::Key,
        destination: &C::Key,
        member: &C::Value,
    ) -> Completion<bool> {
        let codec = self.codec();
        let mut args = self.keys_args(&[source, destination]);
        args.add(&codec.encode_value(member));
        self.dispatch(CommandKind::SMOVE, BooleanOutput::new(), args)
    }

    pub fn spop(&self, key: &C::Key) -> Completion<Option<C::Value>> {
        self.dispatch(CommandKind::SPOP, ValueOutput::new(self.codec()), self.key_args(key))
    }

    pub fn srandmember(&self, key: &C::Key) -> Completion<Option<C::Value>> {
        self.dispatch(CommandKind::SRANDMEMBER, ValueOutput::new(self.codec()), self.key_args(key))
    }

    pub fn srandmember_count(&self, key: &C::Key, count: i64) -> Completion<HashSet<C::Value>>
    where
        C::Value: Eq + Hash,
    {
        let mut args = self.key_args(key);
        args.add_i64(count);
        self.dispatch(CommandKind::SRANDMEMBER, ValueSetOutput::new(self.codec()), args)
    }

    pub fn srem(&self, key: &C::Key, members: &[&C::Value]) -> Completion<i64> {
        self.dispatch(CommandKind::SREM, IntegerOutput::new(), self.key_values_args(key, members))
    }

    pub fn sunion(&self, keys: &[&C::Key]) -> Completion<HashSet<C::Value>>
    where
        C::Value: Eq + Hash,
    {
        self.dispatch(CommandKind::SUNION, ValueSetOutput::new(self.codec()), self.keys_args(keys))
    }

    pub fn sunionstore(&self, destination: &C::Key, keys: &[&C::Key]) -> Completion<i64> {
        let mut all = vec![destination];
        all.extend_from_slice(keys);
        self.dispatch(CommandKind::SUNIONSTORE, IntegerOutput::new(), self.keys_args(&all))
    }

    // ── Sorted sets ─────────────────────────────────────────────────────

    pub fn zadd(&self, key: &C::Key, score: f64, member: &C::Value) -> Completion<i64> {
        let codec = self.codec();
        let mut args = self.key_args(key);
        args.add_double(score).add(&codec.encode_value(member));
        self.dispatch(CommandKind::ZADD, IntegerOutput::new(), args)
    }

    pub fn zadd_multi(&self, key: &C::Key, members: &[(f64, &C::Value)]) -> Completion<i64> {
        let codec = self.codec();
        let mut args = self.key_args(key);
        for (score, member) in members {
            args.add_double(*score).add(&codec.encode_value(member));
        }
        self.dispatch(CommandKind::ZADD, IntegerOutput::new(), args)
    }

    pub fn zcard(&self, key: &C::Key) -> Completion<i64> {
        self.dispatch(CommandKind::ZCARD, IntegerOutput::new(), self.key_args(key))
    }

    pub fn zcount(&self, key: &C::Key, min: f64, max: f64) -> Completion<i64> {
        self.zcount_range(key, &braid_proto::format_double(min), &braid_proto::format_double(max))
    }

    pub fn zcount_range(&self, key: &C::Key, min: &str, max: &str) -> Completion<i64> {
        let mut args = self.key_args(key);
        args.add_str(min).add_str(max);
        self.dispatch(CommandKind::ZCOUNT, IntegerOutput::new(), args)
    }

    pub fn zincrby(&self, key: &C::Key, amount: f64, member: &C::Value) -> Completion<f64> {
        let codec = self.codec();
        let mut args = self.key_args(key);
        args.add_double(amount).add(&codec.encode_value(member));
        self.dispatch(CommandKind::ZINCRBY, DoubleOutput::new(), args)
    }

    pub fn zinterstore(&self, destination: &C::Key, keys: &[&C::Key]) -> Completion<i64> {
        self.zinterstore_with(destination, &ZStoreArgs::new(), keys)
    }

    pub fn zinterstore_with(
        &self,
        destination: &C::Key,
        store_args: &ZStoreArgs,
        keys: &[&C::Key],
    ) -> Completion<i64> {
        let codec = self.codec();
        let mut args = self.key_args(destination);
        args.add_u64(keys.len() as u64);
        for key in keys {
            args.add(&codec.encode_key(key));
        }
        store_args.build(&mut args);
        self.dispatch(CommandKind::ZINTERSTORE, IntegerOutput::new(), args)
    }

    pub fn zunionstore(&self, destination: &C::Key, keys: &[&C::Key]) -> Completion<i64> {
        self.zunionstore_with(destination, &ZStoreArgs::new(), keys)
    }

    pub fn zunionstore_with(
        &self,
        destination: &C::Key,
        store_args: &ZStoreArgs,
        keys: &[&C::Key],
    ) -> Completion<i64> {
        let codec = self.codec();
        let mut args = self.key_args(destination);
        args.add_u64(keys.len() as u64);
        for key in keys {
            args.add(&codec.encode_key(key));
        }
        store_args.build(&mut args);
        self.dispatch(CommandKind::ZUNIONSTORE, IntegerOutput::new(), args)
    }

    pub fn zrange(&self, key: &C::Key, start: i64, stop: i64) -> Completion<Vec<C::Value>> {
        let mut args = self.key_args(key);
        args.add_i64(start).add_i64(stop);
        self.dispatch(CommandKind::ZRANGE, ValueListOutput::new(self.codec()), args)
    }

    pub fn zrange_with_scores(
        &self,
        key: &C::Key,
        start: i64,
        stop: i64,
    ) -> Completion<Vec<ScoredValue<C::Value>>> {
        let mut args = self.key_args(key);
        args.add_i64(start).add_i64(stop).add_keyword(Keyword::WITHSCORES);
        self.dispatch(CommandKind::ZRANGE, ScoredValueListOutput::new(self.codec()), args)
    }

    pub fn zrangebyscore(&self, key: &C::Key, min: &str, max: &str) -> Completion<Vec<C::Value>> {
        let mut args = self.key_args(key);
        args.add_str(min).add_str(max);
        self.dispatch(CommandKind::ZRANGEBYSCORE, ValueListOutput::new(self.codec()), args)
    }

    pub fn zrangebyscore_limit(
        &self,
        key: &C::Key,
        min: &str,
        max: &str,
        offset: i64,
        count: i64,
    ) -> Completion<Vec<C::Value>> {
        let mut args = self.key_args(key);
        args.add_str(min)
            .add_str(max)
            .add_keyword(Keyword::LIMIT)
            .add_i64(offset)
            .add_i64(count);
        self.dispatch(CommandKind::ZRANGEBYSCORE, ValueListOutput::new(self.codec()), args)
    }

    pub fn zrangebyscore_with_scores(
        &self,
        key: &C::Key,
        min: &str,
        max: &str,
    ) -> Completion<Vec<ScoredValue<C::Value>>> {
        let mut args = self.key_args(key);
        args.add_str(min).add_str(max).add_keyword(Keyword::WITHSCORES);
        self.dispatch(
            CommandKind::ZRANGEBYSCORE,
            ScoredValueListOutput::new(self.codec()),
            args,
        )
    }

    pub fn zrank(&self, key: &C::Key, member: &C::Value) -> Completion<Option<i64>> {
        self.dispatch(
            CommandKind::ZRANK,
            OptionalIntegerOutput::new(),
            self.key_value_args(key, member),
        )
    }

    pub fn zrem(&self, key: &C::Key, members: &[&C::Value]) -> Completion<i64> {
        self.dispatch(CommandKind::ZREM, IntegerOutput::new(), self.key_values_args(key, members))
    }

    pub fn zremrangebyrank(&self, key: &C::Key, start: i64, stop: i64) -> Completion<i64> {
        let mut args = self.key_args(key);
        args.add_i64(start).add_i64(stop);
        self.dispatch(CommandKind::ZREMRANGEBYRANK, IntegerOutput::new(), args)
    }

    pub fn zremrangebyscore(&self, key: &C::Key, min: &str, max: &str) -> Completion<i64> {
        let mut args = self.key_args(key);
        args.add_str(min).add_str(max);
        self.dispatch(CommandKind::ZREMRANGEBYSCORE, IntegerOutput::new(), args)
    }

    pub fn zrevrange(&self, key: &C::Key, start: i64, stop: i64) -> Completion<Vec<C::Value>> {
        let mut args = self.key_args(key);
        args.add_i64(start).add_i64(stop);
        self.dispatch(CommandKind::ZREVRANGE, ValueListOutput::new(self.codec()), args)
    }

    pub fn zrevrange_with_scores(
        &self,
        key: &C::Key,
        start: i64,
        stop: i64,
    ) -> Completion<Vec<ScoredValue<C::Value>>> {
        let mut args = self.key_args(key);
        args.add_i64(start).add_i64(stop).add_keyword(Keyword::WITHSCORES);
        self.dispatch(CommandKind::ZREVRANGE, ScoredValueListOutput::new(self.codec()), args)
    }

    pub fn zrevrangebyscore(&self, key: &C::Key, max: &str, min: &str) -> Completion<Vec<C::Value>> {
        let mut args = self.key_args(key);
        args.add_str(max).add_str(min);
        self.dispatch(CommandKind::ZREVRANGEBYSCORE, ValueListOutput::new(self.codec()), args)
    }

    pub fn zrevrangebyscore_with_scores(
        &self,
        key: &C::Key,
        max: &str,
        min: &str,
    ) -> Completion<Vec<ScoredValue<C::Value>>> {
        let mut args = self.key_args(key);
        args.add_str(max).add_str(min).add_keyword(Keyword::WITHSCORES);
        self.dispatch(
            CommandKind::ZREVRANGEBYSCORE,
            ScoredValueListOutput::new(self.codec()),
            args,
        )
    }

    pub fn zrevrank(&self, key: &C::Key, member: &C::Value) -> Completion<Option<i64>> {
        self.dispatch(
            CommandKind::ZREVRANK,
            OptionalIntegerOutput::new(),
            self.key_value_args(key, member),
        )
    }

    pub fn zscore(&self, key: &C::Key, member: &C::Value) -> Completion<Option<f64>> {
        self.dispatch(
            CommandKind::ZSCORE,
            OptionalDoubleOutput::new(),
            self.key_value_args(key, member),
        )
    }

    // ── Scripting ───────────────────────────────────────────────────────

    /// The lowercase hex SHA-1 digest of a script's encoded bytes, as
    /// expected by `EVALSHA`.
    pub fn digest(&self, script: &C::Value) -> String {
        let mut hasher = Sha1::new();
        hasher.update(self.codec().encode_value(script));
        hasher.finalize().iter().map(|b| format!("{b:02x}")).collect()
    }

    pub fn eval(
        &self,
        script: &C::Value,
        keys: &[&C::Key],
        values: &[&C::Value],
    ) -> Completion<Reply> {
        let codec = self.codec();
        let mut args = CommandArgs::new();
        args.add(&codec.encode_value(script)).add_u64(keys.len() as u64);
        for key in keys {
            args.add(&codec.encode_key(key));
        }
        for value in values {
            args.add(&codec.encode_value(value));
        }
        self.dispatch(CommandKind::EVAL, NestedMultiOutput::new(), args)
    }

    pub fn evalsha(
        &self,
        digest: &str,
        keys: &[&C::Key],
        values: &[&C::Value],
    ) -> Completion<Reply> {
        let codec = self.codec();
        let mut args = CommandArgs::new();
        args.add_str(digest).add_u64(keys.len() as u64);
        for key in keys {
            args.add(&codec.encode_key(key));
        }
        for value in values {
            args.add(&codec.encode_value(value));
        }
        self.dispatch(CommandKind::EVALSHA, NestedMultiOutput::new(), args)
    }

    pub fn script_exists(&self, digests: &[&str]) -> Completion<Vec<bool>> {
        let mut args = CommandArgs::new();
        args.add_keyword(Keyword::EXISTS);
        for digest in digests {
            args.add_str(digest);
        }
        self.dispatch(CommandKind::SCRIPT, BooleanListOutput::new(), args)
    }

    pub fn script_flush(&self) -> Completion<String> {
        let mut args = CommandArgs::new();
        args.add_keyword(Keyword::FLUSH);
        self.dispatch(CommandKind::SCRIPT, StatusOutput::new(), args)
    }

    pub fn script_kill(&self) -> Completion<String> {
        let mut args = CommandArgs::new();
        args.add_keyword(Keyword::KILL);
        self.dispatch(CommandKind::SCRIPT, StatusOutput::new(), args)
    }

    pub fn script_load(&self, script: &C::Value) -> Completion<String> {
        let codec = self.codec();
        let mut args = CommandArgs::new();
        args.add_keyword(Keyword::LOAD).add(&codec.encode_value(script));
        self.dispatch(CommandKind::SCRIPT, StatusOutput::new(), args)
    }

    // ── Server ──────────────────────────────────────────────────────────

    pub fn bgrewriteaof(&self) -> Completion<String> {
        self.dispatch(CommandKind::BGREWRITEAOF, StatusOutput::new(), CommandArgs::new())
    }

    pub fn bgsave(&self) -> Completion<String> {
        self.dispatch(CommandKind::BGSAVE, StatusOutput::new(), CommandArgs::new())
    }

    pub fn client_getname(&self) -> Completion<Option<C::Key>> {
        let mut args = CommandArgs::new();
        args.add_keyword(Keyword::GETNAME);
        self.dispatch(CommandKind::CLIENT, KeyOutput::new(self.codec()), args)
    }

    pub fn client_setname(&self, name: &C::Key) -> Completion<String> {
        let codec = self.codec();
        let mut args = CommandArgs::new();
        args.add_keyword(Keyword::SETNAME).add(&codec.encode_key(name));
        self.dispatch(CommandKind::CLIENT, StatusOutput::new(), args)
    }

    pub fn client_kill(&self, addr: &str) -> Completion<String> {
        let mut args = CommandArgs::new();
        args.add_keyword(Keyword::KILL).add_str(addr);
        self.dispatch(CommandKind::CLIENT, StatusOutput::new(), args)
    }

    pub fn client_list(&self) -> Completion<String> {
        let mut args = CommandArgs::new();
        args.add_keyword(Keyword::LIST);
        self.dispatch(CommandKind::CLIENT, StatusOutput::new(), args)
    }

    pub fn config_get(&self, parameter: &str) -> Completion<Vec<String>> {
        let mut args = CommandArgs::new();
        args.add_keyword(Keyword::GET).add_str(parameter);
        self.dispatch(CommandKind::CONFIG, StringListOutput::new(), args)
    }

    pub fn config_set(&self, parameter: &str, value: &str) -> Completion<String> {
        let mut args = CommandArgs::new();
        args.add_keyword(Keyword::SET).add_str(parameter).add_str(value);
        self.dispatch(CommandKind::CONFIG, StatusOutput::new(), args)
    }

    pub fn config_resetstat(&self) -> Completion<String> {
        let mut args = CommandArgs::new();
        args.add_keyword(Keyword::RESETSTAT);
        self.dispatch(CommandKind::CONFIG, StatusOutput::new(), args)
    }

    pub fn dbsize(&self) -> Completion<i64> {
        self.dispatch(CommandKind::DBSIZE, IntegerOutput::new(), CommandArgs::new())
    }

    pub fn debug_object(&self, key: &C::Key) -> Completion<String> {
        let codec = self.codec();
        let mut args = CommandArgs::new();
        args.add_keyword(Keyword::OBJECT).add(&codec.encode_key(key));
        self.dispatch(CommandKind::DEBUG, StatusOutput::new(), args)
    }

    pub fn flushall(&self) -> Completion<String> {
        self.dispatch(CommandKind::FLUSHALL, StatusOutput::new(), CommandArgs::new())
    }

    pub fn flushdb(&self) -> Completion<String> {
        self.dispatch(CommandKind::FLUSHDB, StatusOutput::new(), CommandArgs::new())
    }

    pub fn info(&self) -> Completion<String> {
        self.dispatch(CommandKind::INFO, StatusOutput::new(), CommandArgs::new())
    }

    pub fn info_section(&self, section: &str) -> Completion<String> {
        let mut args = CommandArgs::new();
        args.add_str(section);
        self.dispatch(CommandKind::INFO, StatusOutput::new(), args)
    }

    pub fn lastsave(&self) -> Completion<SystemTime> {
        self.dispatch(CommandKind::LASTSAVE, DateOutput::new(), CommandArgs::new())
    }

    pub fn object_encoding(&self, key: &C::Key) -> Completion<String> {
        let codec = self.codec();
        let mut args = CommandArgs::new();
        args.add_keyword(Keyword::ENCODING).add(&codec.encode_key(key));
        self.dispatch(CommandKind::OBJECT, StatusOutput::new(), args)
    }

    pub fn object_idletime(&self, key: &C::Key) -> Completion<i64> {
        let codec = self.codec();
        let mut args = CommandArgs::new();
        args.add_keyword(Keyword::IDLETIME).add(&codec.encode_key(key));
        self.dispatch(CommandKind::OBJECT, IntegerOutput::new(), args)
    }

    pub fn object_refcount(&self, key: &C::Key) -> Completion<i64> {
        let codec = self.codec();
        let mut args = CommandArgs::new();
        args.add_keyword(Keyword::REFCOUNT).add(&codec.encode_key(key));
        self.dispatch(CommandKind::OBJECT, IntegerOutput::new(), args)
    }

    pub fn save(&self) -> Completion<String> {
        self.dispatch(CommandKind::SAVE, StatusOutput::new(), CommandArgs::new())
    }

    /// Ask the server to shut down. No reply arrives on success, so no
    /// completion is returned.
    pub fn shutdown(&self, save: bool) {
        let mut args = CommandArgs::new();
        args.add_keyword(if save { Keyword::SAVE } else { Keyword::NOSAVE });
        drop(self.dispatch(CommandKind::SHUTDOWN, StatusOutput::new(), args));
    }

    pub fn slaveof(&self, host: &str, port: u16) -> Completion<String> {
        let mut args = CommandArgs::new();
        args.add_str(host).add_u64(port as u64);
        self.dispatch(CommandKind::SLAVEOF, StatusOutput::new(), args)
    }

    pub fn slaveof_no_one(&self) -> Completion<String> {
        let mut args = CommandArgs::new();
        args.add_keyword(Keyword::NO).add_keyword(Keyword::ONE);
        self.dispatch(CommandKind::SLAVEOF, StatusOutput::new(), args)
    }

    pub fn slowlog_get(&self) -> Completion<Reply> {
        let mut args = CommandArgs::new();
        args.add_keyword(Keyword::GET);
        self.dispatch(CommandKind::SLOWLOG, NestedMultiOutput::new(), args)
    }

    pub fn slowlog_get_count(&self, count: i64) -> Completion<Reply> {
        let mut args = CommandArgs::new();
        args.add_keyword(Keyword::GET).add_i64(count);
        self.dispatch(CommandKind::SLOWLOG, NestedMultiOutput::new(), args)
    }

    pub fn slowlog_len(&self) -> Completion<i64> {
        let mut args = CommandArgs::new();
        args.add_keyword(Keyword::LEN);
        self.dispatch(CommandKind::SLOWLOG, IntegerOutput::new(), args)
    }

    pub fn slowlog_reset(&self) -> Completion<String> {
        let mut args = CommandArgs::new();
        args.add_keyword(Keyword::RESET);
        self.dispatch(CommandKind::SLOWLOG, StatusOutput::new(), args)
    }

    pub fn sync(&self) -> Completion<String> {
        self.dispatch(CommandKind::SYNC, StatusOutput::new(), CommandArgs::new())
    }

    // ── Connection ──────────────────────────────────────────────────────

    pub fn echo(&self, message: &C::Value) -> Completion<Option<C::Value>> {
        let codec = self.codec();
        let mut args = CommandArgs::new();
        args.add(&codec.encode_value(message));
        self.dispatch(CommandKind::ECHO, ValueOutput::new(self.codec()), args)
    }

    pub fn ping(&self) -> Completion<String> {
        self.dispatch(CommandKind::PING, StatusOutput::new(), CommandArgs::new())
    }

    /// Publish to a channel; resolves with the number of receivers.
    pub fn publish(&self, channel: &C::Key, message: &C::Value) -> Completion<i64> {
        self.dispatch(
            CommandKind::PUBLISH,
            IntegerOutput::new(),
            self.key_value_args(channel, message),
        )
    }

    pub fn quit(&self) -> Completion<String> {
        self.dispatch(CommandKind::QUIT, StatusOutput::new(), CommandArgs::new())
    }

    pub fn watch(&self, keys: &[&C::Key]) -> Completion<String> {
        self.dispatch(CommandKind::WATCH, StatusOutput::new(), self.keys_args(keys))
    }

    pub fn unwatch(&self) -> Completion<String> {
        self.dispatch(CommandKind::UNWATCH, StatusOutput::new(), CommandArgs::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::StringCodec;

    #[test]
    fn test_digest_is_lowercase_hex_sha1() {
        let connection = Connection::new(StringCodec);
        // SHA-1("return 1") - a fixed vector.
        assert_eq!(
            connection.digest(&"return 1".to_string()),
            "e0e1f9fabfc9d4800c877a703b823ac0578ff8db"
        );
        assert_eq!(connection.digest(&"return 1".to_string()).len(), 40);
    }

    #[test]
    fn test_sort_args_build_order() {
        let mut args = CommandArgs::new();
        SortArgs::new()
            .by("weight_*")
            .limit(0, 5)
            .get("object_*")
            .desc()
            .alpha()
            .build(&mut args, Some(b"dest"));
        let frames = args.frames();
        let rendered = String::from_utf8_lossy(frames);
        let by = rendered.find("BY").unwrap();
        let limit = rendered.find("LIMIT").unwrap();
        let get = rendered.find("GET").unwrap();
        let desc = rendered.find("DESC").unwrap();
        let alpha = rendered.find("ALPHA").unwrap();
        let store = rendered.find("STORE").unwrap();
        assert!(by < limit && limit < get && get < desc && desc < alpha && alpha < store);
    }

    #[test]
    fn test_zstore_args_build() {
        let mut args = CommandArgs::new();
        ZStoreArgs::new()
            .weights(&[2.0, 0.5])
            .aggregate(Aggregate::Max)
            .build(&mut args);
        let rendered = String::from_utf8_lossy(args.frames()).into_owned();
        assert!(rendered.contains("WEIGHTS"));
        assert!(rendered.contains("2.0"));
        assert!(rendered.contains("0.5"));
        assert!(rendered.contains("AGGREGATE"));
        assert!(rendered.contains("MAX"));
    }
}
