//! End-to-end exercises of the connection core against an in-memory
//! channel: requests are dispatched for real, the written wire bytes are
//! inspected, and reply bytes are fed back by hand.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use braid_redis::{Channel, Connection, Error, Reply, StringCodec, await_all};
use parking_lot::Mutex;

#[derive(Default)]
struct TestChannel {
    written: Mutex<Vec<u8>>,
    closed: AtomicBool,
}

impl TestChannel {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn written(&self) -> Vec<u8> {
        self.written.lock().clone()
    }
}

impl Channel for TestChannel {
    fn write_and_flush(&self, bytes: &[u8]) -> std::io::Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "channel closed",
            ));
        }
        self.written.lock().extend_from_slice(bytes);
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

fn active_connection() -> (Connection<StringCodec>, Arc<TestChannel>) {
    let connection = Connection::new(StringCodec);
    let channel = TestChannel::new();
    connection.channel_active(channel.clone());
    (connection, channel)
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}

fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not met in time");
        thread::sleep(Duration::from_millis(1));
    }
}

const WAIT: Duration = Duration::from_millis(200);

fn key(s: &str) -> String {
    s.to_string()
}

// ── Request pipeline ────────────────────────────────────────────────────

#[test]
fn test_set_then_get_pipeline() {
    let (connection, channel) = active_connection();

    let set = connection.set(&key("foo"), &key("bar"));
    let get = connection.get(&key("foo"));

    assert_eq!(
        channel.written(),
        b"*3\r\n$3\r\nSET\r\n$3\r\nfoo\r\n$3\r\nbar\r\n*2\r\n$3\r\nGET\r\n$3\r\nfoo\r\n".to_vec()
    );

    connection.data_received(b"+OK\r\n$3\r\nbar\r\n");
    assert_eq!(set.get(WAIT), Ok("OK".to_string()));
    assert_eq!(get.get(WAIT), Ok(Some("bar".to_string())));
}

#[test]
fn test_incr_resolves_integer() {
    let (connection, _channel) = active_connection();
    let incr = connection.incr(&key("c"));
    connection.data_received(b":42\r\n");
    assert_eq!(incr.get(WAIT), Ok(42));
}

#[test]
fn test_lrange_empty_list() {
    let (connection, _channel) = active_connection();
    let range = connection.lrange(&key("k"), 0, -1);
    connection.data_received(b"*0\r\n");
    assert_eq!(range.get(WAIT), Ok(Vec::new()));
}

#[test]
fn test_hgetall_builds_map() {
    let (connection, _channel) = active_connection();
    let all = connection.hgetall(&key("h"));
    connection.data_received(b"*4\r\n$1\r\na\r\n$1\r\n1\r\n$1\r\nb\r\n$1\r\n2\r\n");
    let map = all.get(WAIT).unwrap();
    assert_eq!(map.len(), 2);
    assert_eq!(map["a"], "1");
    assert_eq!(map["b"], "2");
}

#[test]
fn test_fifo_binding_over_one_feed() {
    let (connection, _channel) = active_connection();
    let first = connection.incr(&key("a"));
    let second = connection.incr(&key("b"));
    let third = connection.incr(&key("c"));

    connection.data_received(b":1\r\n:2\r\n:3\r\n");
    assert_eq!(first.get(WAIT), Ok(1));
    assert_eq!(second.get(WAIT), Ok(2));
    assert_eq!(third.get(WAIT), Ok(3));
}

#[test]
fn test_decoder_resumable_byte_at_a_time() {
    let (connection, _channel) = active_connection();
    let all = connection.hgetall(&key("h"));
    for &byte in b"*4\r\n$1\r\na\r\n$1\r\n1\r\n$1\r\nb\r\n$1\r\n2\r\n".iter() {
        connection.data_received(&[byte]);
    }
    let map = all.get(WAIT).unwrap();
    assert_eq!(map["a"], "1");
    assert_eq!(map["b"], "2");
}

#[test]
fn test_server_error_rejects_only_that_request() {
    let (connection, _channel) = active_connection();
    let bad = connection.incr(&key("k"));
    let good = connection.incr(&key("n"));
    connection.data_received(b"-ERR wrongtype\r\n:7\r\n");
    assert_eq!(bad.get(WAIT), Err(Error::Redis("ERR wrongtype".to_string())));
    assert_eq!(good.get(WAIT), Ok(7));
}

#[test]
fn test_mget_preserves_positions() {
    let (connection, _channel) = active_connection();
    let values = connection.mget(&[&key("a"), &key("b"), &key("c")]);
    connection.data_received(b"*3\r\n$1\r\n1\r\n$-1\r\n$1\r\n3\r\n");
    assert_eq!(
        values.get(WAIT),
        Ok(vec![Some("1".to_string()), None, Some("3".to_string())])
    );
}

#[test]
fn test_unsolicited_bytes_are_ignored() {
    let (connection, _channel) = active_connection();
    connection.data_received(b"+OK\r\n");
    let ping = connection.ping();
    connection.data_received(b"+PONG\r\n");
    assert_eq!(ping.get(WAIT), Ok("PONG".to_string()));
}

#[test]
fn test_protocol_violation_fails_head_and_recovers() {
    let (connection, _channel) = active_connection();
    let ping = connection.ping();
    connection.data_received(b"!bogus\r\n");
    assert!(matches!(ping.get(WAIT), Err(Error::Protocol(_))));

    let incr = connection.incr(&key("k"));
    connection.data_received(b":1\r\n");
    assert_eq!(incr.get(WAIT), Ok(1));
}

// ── Transactions ────────────────────────────────────────────────────────

#[test]
fn test_multi_exec_two_phase_completion() {
    let (connection, _channel) = active_connection();

    let multi = connection.multi();
    let set = connection.set(&key("x"), &key("1"));
    let incr = connection.incr(&key("x"));

    connection.data_received(b"+OK\r\n+QUEUED\r\n+QUEUED\r\n");
    assert_eq!(multi.get(WAIT), Ok("OK".to_string()));
    // Neither user command has completed: only the queued-acks arrived.
    assert!(!set.is_settled());
    assert!(!incr.is_settled());

    let exec = connection.exec();
    connection.data_received(b"*2\r\n+OK\r\n:2\r\n");

    assert_eq!(set.get(WAIT), Ok("OK".to_string()));
    assert_eq!(incr.get(WAIT), Ok(2));
    assert_eq!(
        exec.get(WAIT),
        Ok(vec![
            Reply::Bulk(bytes::Bytes::from_static(b"OK")),
            Reply::Int(2)
        ])
    );
}

#[test]
fn test_discard_cancels_scoped_requests() {
    let (connection, _channel) = active_connection();

    let multi = connection.multi();
    let set = connection.set(&key("x"), &key("1"));
    let discard = connection.discard();

    assert_eq!(set.get(WAIT), Err(Error::Discarded));

    connection.data_received(b"+OK\r\n+QUEUED\r\n+OK\r\n");
    assert_eq!(multi.get(WAIT), Ok("OK".to_string()));
    assert_eq!(discard.get(WAIT), Ok("OK".to_string()));
}

#[test]
fn test_discard_without_multi_is_plain_dispatch() {
    let (connection, channel) = active_connection();
    let discard = connection.discard();
    assert!(contains(&channel.written(), b"DISCARD"));
    connection.data_received(b"-ERR DISCARD without MULTI\r\n");
    assert!(matches!(discard.get(WAIT), Err(Error::Redis(_))));
}

#[test]
fn test_exec_aborted_by_watch() {
    let (connection, _channel) = active_connection();
    let multi = connection.multi();
    let set = connection.set(&key("x"), &key("1"));
    connection.data_received(b"+OK\r\n+QUEUED\r\n");
    assert_eq!(multi.get(WAIT), Ok("OK".to_string()));

    let exec = connection.exec();
    connection.data_received(b"*-1\r\n");
    assert_eq!(exec.get(WAIT), Ok(Vec::new()));
    assert_eq!(
        set.get(WAIT),
        Err(Error::Redis("transaction aborted".to_string()))
    );
}

// ── Reconnection ────────────────────────────────────────────────────────

fn remember_password(connection: &Connection<StringCodec>, channel: &Arc<TestChannel>, password: &str) {
    let remote = connection.clone();
    let password = password.to_string();
    let handle = thread::spawn(move || remote.auth(&password));
    let probe = channel.clone();
    wait_until(move || contains(&probe.written(), b"AUTH"));
    connection.data_received(b"+OK\r\n");
    assert_eq!(handle.join().unwrap(), Ok("OK".to_string()));
}

fn remember_db(connection: &Connection<StringCodec>, channel: &Arc<TestChannel>, db: i64) {
    let remote = connection.clone();
    let handle = thread::spawn(move || remote.select(db));
    let probe = channel.clone();
    wait_until(move || contains(&probe.written(), b"SELECT"));
    connection.data_received(b"+OK\r\n");
    assert_eq!(handle.join().unwrap(), Ok("OK".to_string()));
}

#[test]
fn test_replay_prepends_auth_and_select() {
    let (connection, channel) = active_connection();
    remember_password(&connection, &channel, "sekrit");
    remember_db(&connection, &channel, 3);

    connection.channel_inactive();

    // Dispatched while down: stays queued, nothing written anywhere.
    let get = connection.get(&key("k"));
    assert!(!get.is_settled());

    let replacement = TestChannel::new();
    connection.channel_active(replacement.clone());

    let expected: &[u8] = b"*2\r\n$4\r\nAUTH\r\n$6\r\nsekrit\r\n\
                            *2\r\n$6\r\nSELECT\r\n$1\r\n3\r\n\
                            *2\r\n$3\r\nGET\r\n$1\r\nk\r\n";
    assert_eq!(replacement.written(), expected.to_vec());

    // The synthetic session replies are consumed first, then the request.
    connection.data_received(b"+OK\r\n+OK\r\n$1\r\nv\r\n");
    assert_eq!(get.get(WAIT), Ok(Some("v".to_string())));
}

#[test]
fn test_replay_preserves_pending_order() {
    let (connection, _channel) = active_connection();
    let first = connection.incr(&key("a"));
    let second = connection.incr(&key("b"));

    connection.channel_inactive();
    let replacement = TestChannel::new();
    connection.channel_active(replacement.clone());

    let written = replacement.written();
    let a = written
        .windows(b"$1\r\na\r\n".len())
        .position(|w| w == b"$1\r\na\r\n")
        .expect("INCR a rewritten");
    let b = written
        .windows(b"$1\r\nb\r\n".len())
        .position(|w| w == b"$1\r\nb\r\n")
        .expect("INCR b rewritten");
    assert!(a < b);

    connection.data_received(b":1\r\n:2\r\n");
    assert_eq!(first.get(WAIT), Ok(1));
    assert_eq!(second.get(WAIT), Ok(2));
}

#[test]
fn test_replay_skips_cancelled_requests() {
    let connection = Connection::new(StringCodec);

    // Queued with no channel; times out and is cancelled client-side.
    let abandoned = connection.get(&key("slow"));
    assert_eq!(abandoned.get(Duration::from_millis(5)), Err(Error::Timeout));

    let kept = connection.incr(&key("kept"));

    let channel = TestChannel::new();
    connection.channel_active(channel.clone());

    let written = channel.written();
    assert!(!contains(&written, b"slow"));
    assert!(contains(&written, b"kept"));

    connection.data_received(b":1\r\n");
    assert_eq!(kept.get(WAIT), Ok(1));
}

#[test]
fn test_mid_reply_disconnect_discards_partial_frame() {
    let (connection, _channel) = active_connection();
    let get = connection.get(&key("k"));

    // Half a bulk reply arrives, then the channel drops.
    connection.data_received(b"$5\r\nhe");
    connection.channel_inactive();

    let replacement = TestChannel::new();
    connection.channel_active(replacement.clone());
    assert!(contains(&replacement.written(), b"GET"));

    connection.data_received(b"$5\r\nhello\r\n");
    assert_eq!(get.get(WAIT), Ok(Some("hello".to_string())));
}

// ── Close semantics ─────────────────────────────────────────────────────

#[test]
fn test_close_drains_pending_with_connection_closed() {
    let (connection, channel) = active_connection();
    let pending = connection.get(&key("k"));

    connection.close();
    assert!(channel.closed.load(Ordering::SeqCst));
    // The transport observes the teardown and reports the channel down.
    connection.channel_inactive();

    assert_eq!(pending.get(WAIT), Err(Error::ConnectionClosed));
}

#[test]
fn test_close_with_pending_exec_settles_children() {
    let (connection, _channel) = active_connection();
    let multi = connection.multi();
    let set = connection.set(&key("x"), &key("1"));
    connection.data_received(b"+OK\r\n+QUEUED\r\n");
    assert_eq!(multi.get(WAIT), Ok("OK".to_string()));

    let exec = connection.exec();
    connection.close();
    connection.channel_inactive();

    assert_eq!(exec.get(WAIT), Err(Error::ConnectionClosed));
    assert_eq!(set.get(WAIT), Err(Error::ConnectionClosed));
}

#[test]
fn test_dispatch_after_close_is_rejected() {
    let (connection, _channel) = active_connection();
    connection.close();
    connection.channel_inactive();

    let late = connection.ping();
    assert_eq!(late.get(WAIT), Err(Error::ConnectionClosed));
}

#[test]
fn test_close_is_idempotent() {
    let connection = Connection::new(StringCodec);
    connection.close();
    connection.close();
    assert!(connection.is_closed());
}

// ── Waiting ─────────────────────────────────────────────────────────────

#[test]
fn test_await_all_over_mixed_completions() {
    let (connection, _channel) = active_connection();
    let incr = connection.incr(&key("a"));
    let status = connection.set(&key("b"), &key("2"));
    connection.data_received(b":1\r\n+OK\r\n");
    assert!(await_all(Duration::from_millis(100), &[&incr, &status]));
}

#[test]
fn test_callbacks_fire_from_decoder_thread() {
    let (connection, _channel) = active_connection();
    let observed = Arc::new(Mutex::new(None));
    let sink = observed.clone();
    connection.incr(&key("a")).then(move |n| {
        *sink.lock() = Some(*n);
    });
    connection.data_received(b":5\r\n");
    assert_eq!(*observed.lock(), Some(5));
}
