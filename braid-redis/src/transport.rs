//! TCP transport and reconnection watchdog.
//!
//! The connection core only assumes an ordered byte channel that reports
//! `channel_active` / `channel_inactive` transitions. This module supplies
//! the stock implementation: a TCP stream with a dedicated reader thread
//! that feeds [`Connection::data_received`] and a watchdog loop that keeps
//! reconnecting with exponential backoff until the connection is closed.

use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;

use crate::codec::RedisCodec;
use crate::connection::Connection;
use crate::error::Error;

/// A write-side handle to the underlying byte channel.
///
/// Implementations must tolerate concurrent writers; the connection core
/// serializes its own writes but closing may race a write.
pub trait Channel: Send + Sync {
    /// Write a request frame and flush it toward the peer.
    fn write_and_flush(&self, bytes: &[u8]) -> std::io::Result<()>;

    /// Tear the channel down. The transport delivers `channel_inactive`
    /// once the reader observes the teardown.
    fn close(&self);
}

/// Transport configuration.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Connect timeout. `None` uses the OS default.
    pub connect_timeout: Option<Duration>,
    /// Base delay for reconnect backoff.
    pub base_delay: Duration,
    /// Cap for reconnect backoff.
    pub max_delay: Duration,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Some(Duration::from_secs(10)),
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
        }
    }
}

/// Delay before reconnect attempt `attempt` (0-indexed): exponential from
/// the base, capped at the maximum.
fn backoff_delay(options: &ConnectOptions, attempt: u32) -> Duration {
    let factor = 1u32.checked_shl(attempt.min(16)).unwrap_or(u32::MAX);
    options
        .base_delay
        .checked_mul(factor)
        .map(|delay| delay.min(options.max_delay))
        .unwrap_or(options.max_delay)
}

struct TcpChannel {
    writer: Mutex<TcpStream>,
}

impl Channel for TcpChannel {
    fn write_and_flush(&self, bytes: &[u8]) -> std::io::Result<()> {
        let mut writer = self.writer.lock();
        writer.write_all(bytes)?;
        writer.flush()
    }

    fn close(&self) {
        let _ = self.writer.lock().shutdown(Shutdown::Both);
    }
}

/// Connect to `addr` and return a connection supervised by a watchdog
/// thread.
///
/// The initial connect is synchronous so that an unreachable address
/// surfaces immediately. Afterwards the watchdog owns the channel
/// lifecycle: on connection loss it keeps retrying with exponential
/// backoff, and every successful reconnect replays the remembered session
/// state and pending queue through
/// [`channel_active`](Connection::channel_active).
pub fn connect<C: RedisCodec>(
    addr: SocketAddr,
    codec: C,
    options: ConnectOptions,
) -> Result<Connection<C>, Error> {
    let connection = Connection::new(codec);
    let stream = open_stream(addr, &options)?;

    let stop = Arc::new(AtomicBool::new(false));
    connection.set_reconnect_stop(stop.clone());

    let watchdog = connection.clone();
    thread::Builder::new()
        .name("braid-io".to_string())
        .spawn(move || watchdog_loop(watchdog, addr, options, stream, stop))
        .map_err(|e| Error::Io(e.to_string()))?;

    Ok(connection)
}

fn open_stream(addr: SocketAddr, options: &ConnectOptions) -> Result<TcpStream, Error> {
    let stream = match options.connect_timeout {
        Some(timeout) => TcpStream::connect_timeout(&addr, timeout)?,
        None => TcpStream::connect(addr)?,
    };
    stream.set_nodelay(true)?;
    // A finite read timeout lets the reader notice a stop request even
    // while the peer is silent.
    stream.set_read_timeout(Some(Duration::from_millis(500)))?;
    Ok(stream)
}

fn watchdog_loop<C: RedisCodec>(
    connection: Connection<C>,
    addr: SocketAddr,
    options: ConnectOptions,
    first: TcpStream,
    stop: Arc<AtomicBool>,
) {
    let mut stream = Some(first);
    let mut attempt = 0u32;

    while !stop.load(Ordering::SeqCst) {
        let current = match stream.take() {
            Some(stream) => stream,
            None => {
                let delay = backoff_delay(&options, attempt);
                attempt = attempt.saturating_add(1);
                debug!(?delay, attempt, "reconnecting");
                thread::sleep(delay);
                if stop.load(Ordering::SeqCst) {
                    break;
                }
                match open_stream(addr, &options) {
                    Ok(stream) => stream,
                    Err(error) => {
                        debug!(%error, "reconnect attempt failed");
                        continue;
                    }
                }
            }
        };
        attempt = 0;

        let writer = match current.try_clone() {
            Ok(writer) => writer,
            Err(error) => {
                debug!(%error, "failed to clone stream");
                continue;
            }
        };
        let channel = Arc::new(TcpChannel {
            writer: Mutex::new(writer),
        });

        connection.channel_active(channel);
        read_loop(&connection, current, &stop);
        connection.channel_inactive();
    }
}

fn read_loop<C: RedisCodec>(connection: &Connection<C>, mut stream: TcpStream, stop: &AtomicBool) {
    let mut buf = [0u8; 16 * 1024];
    loop {
        if stop.load(Ordering::SeqCst) {
            return;
        }
        match stream.read(&mut buf) {
            Ok(0) => return,
            Ok(n) => connection.data_received(&buf[..n]),
            Err(error)
                if error.kind() == std::io::ErrorKind::WouldBlock
                    || error.kind() == std::io::ErrorKind::TimedOut =>
            {
                continue;
            }
            Err(error) => {
                debug!(%error, "read failed");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_is_exponential_and_capped() {
        let options = ConnectOptions {
            connect_timeout: None,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
        };
        assert_eq!(backoff_delay(&options, 0), Duration::from_millis(100));
        assert_eq!(backoff_delay(&options, 1), Duration::from_millis(200));
        assert_eq!(backoff_delay(&options, 2), Duration::from_millis(400));
        assert_eq!(backoff_delay(&options, 10), Duration::from_secs(2));
        assert_eq!(backoff_delay(&options, 63), Duration::from_secs(2));
    }
}
