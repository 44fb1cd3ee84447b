//! Asynchronous RESP client with transparent reconnection.
//!
//! braid multiplexes many logically independent request/response exchanges
//! over a single full-duplex TCP connection. Requests are non-blocking:
//! every command entry returns a [`Completion`] that resolves with a typed
//! result once the reply is decoded. A strictly FIFO pending queue binds
//! replies to requests; a watchdog survives transient disconnections by
//! re-establishing the channel, replaying remembered session state
//! (`AUTH`, `SELECT`), and rewriting every still-pending request in order.
//!
//! Keys and values are translated by an injected [`RedisCodec`]; the core
//! never interprets their bytes.
//!
//! # Example
//!
//! ```no_run
//! use braid_redis::{ConnectOptions, StringCodec, transport};
//! use std::time::Duration;
//!
//! # fn main() -> Result<(), braid_redis::Error> {
//! let conn = transport::connect(
//!     "127.0.0.1:6379".parse().unwrap(),
//!     StringCodec,
//!     ConnectOptions::default(),
//! )?;
//!
//! let set = conn.set(&"hello".to_string(), &"world".to_string());
//! let get = conn.get(&"hello".to_string());
//! assert_eq!(get.get(Duration::from_secs(1))?, Some("world".to_string()));
//! # let _ = set;
//! conn.close();
//! # Ok(())
//! # }
//! ```
//!
//! Completions also compose without blocking:
//!
//! ```no_run
//! # use braid_redis::{Connection, StringCodec};
//! # fn example(conn: &Connection<StringCodec>) {
//! conn.incr(&"counter".to_string()).then_fail(
//!     |n| println!("counter is now {n}"),
//!     |e| eprintln!("increment failed: {e}"),
//! );
//! # }
//! ```

mod codec;
mod command;
mod commands;
pub mod completion;
mod connection;
mod error;
pub mod output;
mod transaction;
pub mod transport;
mod types;

pub use codec::{BytesCodec, RedisCodec, StringCodec};
pub use commands::{Aggregate, Order, SortArgs, ZStoreArgs};
pub use completion::{Awaitable, Completion, await_all, join};
pub use connection::{Connection, DEFAULT_TIMEOUT};
pub use error::Error;
pub use transport::{Channel, ConnectOptions, connect};
pub use types::{KeyValue, Reply, ScoredValue};
