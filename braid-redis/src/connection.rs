//! The connection context.
//!
//! A [`Connection`] multiplexes concurrently dispatched requests over one
//! logical channel. Dispatchers serialize on the connection mutex: a
//! request is encoded, optionally attached to the active transaction
//! scope, appended to the pending queue, and written to the channel if
//! one is currently up. The transport's reader drives
//! [`data_received`](Connection::data_received), which decodes replies
//! into the queue head's sink - the queue's FIFO discipline is what binds
//! the i-th reply to the i-th dispatched request.
//!
//! The connection outlives any one channel. On `channel_active` the
//! remembered session state (password, selected database) is replayed
//! ahead of every still-pending request; on `channel_inactive` the queue
//! is either kept for the next channel or, after a user-initiated close,
//! drained with a connection-closed failure per request.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use braid_proto::{CommandArgs, CommandKind, Decoded, ReplyDecoder, encode_request};
use bytes::BytesMut;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::codec::RedisCodec;
use crate::command::{Command, SharedCommand};
use crate::completion::Completion;
use crate::error::Error;
use crate::output::{CommandOutput, StatusOutput};
use crate::transaction::TransactionOutput;
use crate::transport::Channel;
use crate::types::Reply;

/// Default wait applied by the synchronous entry points.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

struct ConnState {
    /// In-flight requests in dispatch order; `None` once closed and drained.
    queue: Option<VecDeque<SharedCommand>>,
    /// The currently active channel, if any.
    channel: Option<Arc<dyn Channel>>,
    /// The active transaction scope.
    multi: Option<TransactionOutput>,
    /// Remembered session state, replayed on reconnect.
    password: Option<String>,
    db: i64,
    closed: bool,
    /// Tells the reconnection watchdog to stop retrying.
    stop_reconnect: Option<Arc<AtomicBool>>,
    decoder: ReplyDecoder,
    rbuf: BytesMut,
}

struct Inner<C> {
    codec: Arc<C>,
    timeout: Mutex<Duration>,
    state: Mutex<ConnState>,
}

/// An asynchronous, thread-safe connection to a RESP server.
///
/// Clones share the same connection context. Multiple threads may share
/// one connection provided they avoid the blocking and transactional
/// operations (`BLPOP`/`BRPOP`, `MULTI`..`EXEC`), which assume exclusive
/// use while active.
pub struct Connection<C: RedisCodec> {
    inner: Arc<Inner<C>>,
}

impl<C: RedisCodec> Clone for Connection<C> {
    fn clone(&self) -> Self {
        Connection {
            inner: self.inner.clone(),
        }
    }
}

impl<C: RedisCodec> Connection<C> {
    /// Create a detached connection context. No channel is active until
    /// the transport delivers [`channel_active`](Connection::channel_active).
    pub fn new(codec: C) -> Self {
        Connection {
            inner: Arc::new(Inner {
                codec: Arc::new(codec),
                timeout: Mutex::new(DEFAULT_TIMEOUT),
                state: Mutex::new(ConnState {
                    queue: Some(VecDeque::new()),
                    channel: None,
                    multi: None,
                    password: None,
                    db: 0,
                    closed: false,
                    stop_reconnect: None,
                    decoder: ReplyDecoder::new(),
                    rbuf: BytesMut::new(),
                }),
            }),
        }
    }

    /// The timeout applied by synchronous waits.
    pub fn timeout(&self) -> Duration {
        *self.inner.timeout.lock()
    }

    /// Set the timeout applied by synchronous waits.
    pub fn set_timeout(&self, timeout: Duration) {
        *self.inner.timeout.lock() = timeout;
    }

    pub(crate) fn codec(&self) -> Arc<C> {
        self.inner.codec.clone()
    }

    // ── Dispatch ────────────────────────────────────────────────────────

    /// Dispatch a request: encode, attach to any active transaction,
    /// enqueue, and write if a channel is up. Never blocks on I/O; errors
    /// are delivered through the returned completion's fail path.
    ///
    /// The command entries are all thin wrappers over this; it is public
    /// so callers can issue commands this surface does not cover, with an
    /// output sink of their choosing.
    pub fn dispatch<O: CommandOutput>(
        &self,
        kind: CommandKind,
        output: O,
        args: CommandArgs,
    ) -> Completion<O::Item> {
        let mut guard = self.inner.state.lock();
        self.dispatch_with(&mut guard, kind, output, &args)
    }

    fn dispatch_with<O: CommandOutput>(
        &self,
        st: &mut ConnState,
        kind: CommandKind,
        output: O,
        args: &CommandArgs,
    ) -> Completion<O::Item> {
        let Some(queue) = st.queue.as_mut() else {
            return Completion::rejected(Error::ConnectionClosed);
        };

        let wire = encode_request(kind, args);
        let transactional = st.multi.is_some();
        let (command, completion) = Command::new(kind, wire.clone(), output, transactional);
        let shared = command.into_shared();

        if let Some(tx) = st.multi.as_mut() {
            tx.add(shared.clone());
        }
        queue.push_back(shared);

        if let Some(channel) = st.channel.as_ref() {
            if let Err(error) = channel.write_and_flush(&wire) {
                // The channel is going down; the request stays queued and
                // is rewritten on the next channel_active.
                debug!(command = kind.as_str(), %error, "write failed, request stays queued");
            }
        }

        completion
    }

    // ── Session state (synchronous variants) ────────────────────────────

    /// Authenticate, blocking for the status reply. On `"OK"` the
    /// password is remembered and replayed after every reconnect.
    pub fn auth(&self, password: &str) -> Result<String, Error> {
        let completion = {
            let mut guard = self.inner.state.lock();
            let mut args = CommandArgs::new();
            args.add_str(password);
            self.dispatch_with(&mut guard, CommandKind::AUTH, StatusOutput::new(), &args)
        };
        let status = completion.get(self.timeout())?;
        if status == "OK" {
            self.inner.state.lock().password = Some(password.to_string());
        }
        Ok(status)
    }

    /// Select a logical database, blocking for the status reply. On
    /// `"OK"` the database is remembered and replayed after reconnects.
    pub fn select(&self, db: i64) -> Result<String, Error> {
        let completion = {
            let mut guard = self.inner.state.lock();
            let mut args = CommandArgs::new();
            args.add_i64(db);
            self.dispatch_with(&mut guard, CommandKind::SELECT, StatusOutput::new(), &args)
        };
        let status = completion.get(self.timeout())?;
        if status == "OK" {
            self.inner.state.lock().db = db;
        }
        Ok(status)
    }

    // ── Transactions ────────────────────────────────────────────────────

    /// Begin a transaction. Requests dispatched while the scope is active
    /// receive two-phase completion and settle when the `EXEC` reply is
    /// decoded.
    pub fn multi(&self) -> Completion<String> {
        let mut guard = self.inner.state.lock();
        let completion =
            self.dispatch_with(&mut guard, CommandKind::MULTI, StatusOutput::new(), &CommandArgs::new());
        if guard.multi.is_none() {
            guard.multi = Some(TransactionOutput::new());
        }
        completion
    }

    /// Execute the transaction. Resolves with the raw result of each
    /// queued request, in dispatch order, after every child completion
    /// has settled.
    pub fn exec(&self) -> Completion<Vec<Reply>> {
        let mut guard = self.inner.state.lock();
        let tx = guard.multi.take().unwrap_or_else(TransactionOutput::new);
        self.dispatch_with(&mut guard, CommandKind::EXEC, tx, &CommandArgs::new())
    }

    /// Abandon the transaction. Every request queued in the scope is
    /// rejected as discarded; with no scope active this is just a plain
    /// `DISCARD` dispatch.
    pub fn discard(&self) -> Completion<String> {
        let (scope, completion) = {
            let mut guard = self.inner.state.lock();
            let scope = guard.multi.take();
            let completion = self.dispatch_with(
                &mut guard,
                CommandKind::DISCARD,
                StatusOutput::new(),
                &CommandArgs::new(),
            );
            (scope, completion)
        };
        // Settle the children outside the connection lock: rejection runs
        // caller callbacks which may themselves dispatch.
        if let Some(mut scope) = scope {
            scope.cancel();
        }
        completion
    }

    // ── Lifecycle ───────────────────────────────────────────────────────

    /// Close the connection: stop the reconnection watchdog, mark the
    /// context closed, and tear down the channel. Requests still pending
    /// when the channel goes inactive fail with a connection-closed
    /// error. Idempotent.
    pub fn close(&self) {
        let (channel, stop) = {
            let mut guard = self.inner.state.lock();
            if guard.closed {
                return;
            }
            guard.closed = true;
            (guard.channel.clone(), guard.stop_reconnect.take())
        };
        if let Some(stop) = stop {
            stop.store(true, Ordering::SeqCst);
        }
        match channel {
            Some(channel) => channel.close(),
            // Never connected: there is no transport to call back.
            None => self.channel_inactive(),
        }
    }

    /// True once [`close`](Connection::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    pub(crate) fn set_reconnect_stop(&self, stop: Arc<AtomicBool>) {
        self.inner.state.lock().stop_reconnect = Some(stop);
    }

    // ── Transport events ────────────────────────────────────────────────

    /// A channel came up. Replays remembered session state (`AUTH`, then
    /// `SELECT` if the database is non-default) followed by every pending
    /// request, in order, skipping cancelled ones. The synthetic session
    /// commands carry no caller-visible completion.
    pub fn channel_active(&self, channel: Arc<dyn Channel>) {
        let mut guard = self.inner.state.lock();
        let st = &mut *guard;

        // Partial frames in the buffer belong to the dead channel.
        st.decoder.reset();
        st.rbuf.clear();
        st.channel = Some(channel.clone());

        let Some(queue) = st.queue.as_mut() else {
            return;
        };

        let mut replay: Vec<SharedCommand> = Vec::with_capacity(queue.len() + 2);

        if let Some(password) = st.password.as_ref() {
            let mut args = CommandArgs::new();
            args.add_str(password);
            let wire = encode_request(CommandKind::AUTH, &args);
            let (command, _) = Command::new(CommandKind::AUTH, wire, StatusOutput::new(), false);
            replay.push(command.into_shared());
        }

        if st.db != 0 {
            let mut args = CommandArgs::new();
            args.add_i64(st.db);
            let wire = encode_request(CommandKind::SELECT, &args);
            let (command, _) = Command::new(CommandKind::SELECT, wire, StatusOutput::new(), false);
            replay.push(command.into_shared());
        }

        replay.extend(queue.drain(..));
        debug!(requests = replay.len(), "channel active, replaying session");

        for command in replay {
            {
                let cmd = command.lock();
                if cmd.is_cancelled() {
                    continue;
                }
                if let Err(error) = channel.write_and_flush(cmd.wire_bytes()) {
                    debug!(%error, "replay write failed, request stays queued");
                }
            }
            queue.push_back(command);
        }
    }

    /// The channel went down. After a user-initiated close the pending
    /// queue is drained, failing every request; otherwise the queue is
    /// kept intact for the watchdog's next successful reconnect.
    pub fn channel_inactive(&self) {
        let drained = {
            let mut guard = self.inner.state.lock();
            let st = &mut *guard;
            st.channel = None;
            st.decoder.reset();
            st.rbuf.clear();
            if st.closed {
                st.queue.take()
            } else {
                debug!("channel inactive, keeping pending queue for replay");
                None
            }
        };
        if let Some(queue) = drained {
            for command in queue {
                command.lock().fail(Error::ConnectionClosed);
            }
        }
    }

    /// Bytes arrived from the transport. Decodes as many complete replies
    /// as the buffer holds, feeding each into the queue head's sink and
    /// popping it; partial frames stay buffered for the next call.
    pub fn data_received(&self, data: &[u8]) {
        let mut completed: Vec<SharedCommand> = Vec::new();
        let mut failed: Option<(SharedCommand, Error)> = None;

        {
            let mut guard = self.inner.state.lock();
            let st = &mut *guard;
            st.rbuf.extend_from_slice(data);

            let Some(queue) = st.queue.as_mut() else {
                st.rbuf.clear();
                return;
            };

            loop {
                let Some(head) = queue.front().cloned() else {
                    if !st.rbuf.is_empty() {
                        warn!(bytes = st.rbuf.len(), "reply bytes with no pending request");
                        st.rbuf.clear();
                    }
                    break;
                };

                let mut cmd = head.lock();
                match st.decoder.decode(&mut st.rbuf, cmd.consumer()) {
                    Ok(Decoded::Complete) => {
                        drop(cmd);
                        queue.pop_front();
                        completed.push(head);
                    }
                    Ok(Decoded::Incomplete) => break,
                    Err(error) => {
                        warn!(command = cmd.kind().as_str(), %error, "protocol violation, failing request");
                        drop(cmd);
                        queue.pop_front();
                        st.rbuf.clear();
                        st.decoder.reset();
                        failed = Some((head, Error::Protocol(error)));
                        break;
                    }
                }
            }
        }

        // Deliver outside the connection lock: completions run caller
        // callbacks which may themselves dispatch.
        for command in completed {
            command.lock().complete();
        }
        if let Some((command, error)) = failed {
            command.lock().fail(error);
        }
    }
}
