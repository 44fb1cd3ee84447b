//! RESP wire format for the braid client.
//!
//! This crate owns the byte-level half of the client: command name and
//! keyword tables, request framing, and an incremental reply decoder that
//! feeds decoded tokens into a caller-supplied [`ReplyConsumer`].
//!
//! - **Requests**: build an argument buffer with [`CommandArgs`] and frame
//!   it with [`encode_request`].
//! - **Replies**: drive a [`ReplyDecoder`] with received bytes; it emits
//!   tokens into the consumer for the oldest in-flight request and reports
//!   one [`Decoded::Complete`] per finished reply.
//!
//! # Example
//!
//! ```
//! use braid_proto::{CommandArgs, CommandKind, encode_request};
//!
//! let mut args = CommandArgs::new();
//! args.add(b"mykey");
//! let frame = encode_request(CommandKind::GET, &args);
//! assert_eq!(&frame[..], b"*2\r\n$3\r\nGET\r\n$5\r\nmykey\r\n");
//! ```

mod args;
mod command;
mod consumer;
mod decoder;
mod error;

pub use args::{CommandArgs, encode_request, format_double};
pub use command::{CommandKind, Keyword};
pub use consumer::ReplyConsumer;
pub use decoder::{Decoded, ReplyDecoder};
pub use error::ParseError;
