//! Command name and keyword byte tables.
//!
//! Every request frame begins with a command name drawn from a closed set.
//! The variant name doubles as the canonical wire spelling, so the tables
//! stay declarative: one identifier per command, no duplicated byte
//! literals.

macro_rules! name_table {
    ($(#[$meta:meta])* $table:ident { $($name:ident),* $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[allow(clippy::upper_case_acronyms)]
        pub enum $table {
            $($name),*
        }

        impl $table {
            /// The canonical wire spelling of this name.
            #[inline]
            pub const fn bytes(self) -> &'static [u8] {
                match self {
                    $($table::$name => stringify!($name).as_bytes()),*
                }
            }

            /// The canonical wire spelling as a string.
            #[inline]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $($table::$name => stringify!($name)),*
                }
            }
        }
    };
}

name_table! {
    /// The set of commands this client can place on the wire.
    CommandKind {
        APPEND, AUTH, BGREWRITEAOF, BGSAVE, BITCOUNT, BITOP, BLPOP, BRPOP,
        BRPOPLPUSH, CLIENT, CONFIG, DBSIZE, DEBUG, DECR, DECRBY, DEL,
        DISCARD, DUMP, ECHO, EVAL, EVALSHA, EXEC, EXISTS, EXPIRE, EXPIREAT,
        FLUSHALL, FLUSHDB, GET, GETBIT, GETRANGE, GETSET, HDEL, HEXISTS,
        HGET, HGETALL, HINCRBY, HINCRBYFLOAT, HKEYS, HLEN, HMGET, HMSET,
        HSET, HSETNX, HVALS, INCR, INCRBY, INCRBYFLOAT, INFO, KEYS,
        LASTSAVE, LINDEX, LINSERT, LLEN, LPOP, LPUSH, LPUSHX, LRANGE, LREM,
        LSET, LTRIM, MGET, MIGRATE, MOVE, MSET, MSETNX, MULTI, OBJECT,
        PERSIST, PEXPIRE, PEXPIREAT, PING, PSETEX, PTTL, PUBLISH, QUIT,
        RANDOMKEY, RENAME, RENAMENX, RESTORE, RPOP, RPOPLPUSH, RPUSH,
        RPUSHX, SADD, SAVE, SCARD, SCRIPT, SDIFF, SDIFFSTORE, SELECT, SET,
        SETBIT, SETEX, SETNX, SETRANGE, SHUTDOWN, SINTER, SINTERSTORE,
        SISMEMBER, SLAVEOF, SLOWLOG, SMEMBERS, SMOVE, SORT, SPOP,
        SRANDMEMBER, SREM, STRLEN, SUNION, SUNIONSTORE, SYNC, TTL, TYPE,
        UNWATCH, WATCH, ZADD, ZCARD, ZCOUNT, ZINCRBY, ZINTERSTORE, ZRANGE,
        ZRANGEBYSCORE, ZRANK, ZREM, ZREMRANGEBYRANK, ZREMRANGEBYSCORE,
        ZREVRANGE, ZREVRANGEBYSCORE, ZREVRANK, ZSCORE, ZUNIONSTORE,
    }
}

name_table! {
    /// Sub-command and option keywords appearing in argument position.
    Keyword {
        AFTER, AGGREGATE, ALPHA, AND, ASC, BEFORE, BY, DESC, ENCODING,
        EXISTS, FLUSH, GET, GETNAME, IDLETIME, KILL, LEN, LIMIT, LIST,
        LOAD, MAX, MIN, NO, NOSAVE, NOT, OBJECT, ONE, OR, REFCOUNT, RESET,
        RESETSTAT, SAVE, SET, SETNAME, STORE, SUM, WEIGHTS, WITHSCORES, XOR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_spelling() {
        assert_eq!(CommandKind::GET.bytes(), b"GET");
        assert_eq!(CommandKind::ZRANGEBYSCORE.bytes(), b"ZRANGEBYSCORE");
        assert_eq!(CommandKind::BGREWRITEAOF.as_str(), "BGREWRITEAOF");
    }

    #[test]
    fn test_keyword_spelling() {
        assert_eq!(Keyword::WITHSCORES.bytes(), b"WITHSCORES");
        assert_eq!(Keyword::NOSAVE.as_str(), "NOSAVE");
    }
}
