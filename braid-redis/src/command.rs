//! The in-flight request.
//!
//! A [`Command`] couples one encoded request frame with its output sink
//! and completion. Once enqueued it is shared between the dispatcher
//! (which may rewrite it on reconnect) and the decoder (which feeds its
//! sink), so the pending queue holds type-erased, lock-guarded handles.
//!
//! Completion is budgeted: a plain request carries a budget of one, a
//! request dispatched inside an active transaction carries two. Each
//! decoded reply bound to the request burns one unit; the typed result is
//! delivered only when the budget reaches zero. The first unit of a
//! transactional request is its queued-acknowledgement, which is fed to a
//! throwaway ack sink rather than the real output.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use braid_proto::{CommandKind, ReplyConsumer};
use bytes::Bytes;
use parking_lot::Mutex;

use crate::completion::Completion;
use crate::error::Error;
use crate::output::CommandOutput;

/// The unit held by the pending queue and the transaction aggregate.
pub(crate) type SharedCommand = Arc<Mutex<Box<dyn QueuedCommand>>>;

/// Type-erased view of an in-flight request.
pub(crate) trait QueuedCommand: Send {
    /// The command name, for diagnostics.
    fn kind(&self) -> CommandKind;

    /// The encoded request frame, rewritten verbatim on replay.
    fn wire_bytes(&self) -> &[u8];

    /// The sink the next reply bound to this request feeds. While the
    /// queued-acknowledgement of a transactional request is outstanding
    /// this is the ack sink, afterwards the real output.
    fn consumer(&mut self) -> &mut dyn ReplyConsumer;

    /// Burn one unit of the completion budget; deliver at zero.
    fn complete(&mut self);

    /// Fail the request outright (connection loss, protocol violation).
    fn fail(&mut self, error: Error);

    /// True once the request was cancelled client-side.
    fn is_cancelled(&self) -> bool;

    /// Cancel the request, settling its completion with `error`.
    fn cancel(&mut self, error: Error);

    /// True if the queued-acknowledgement came back as an error.
    fn ack_failed(&self) -> bool;
}

/// Sink for the queued-acknowledgement of an in-transaction request.
/// `+QUEUED` is discarded; an error ack is kept to reject the request.
#[derive(Debug, Default)]
struct AckOutput {
    error: Option<String>,
}

impl ReplyConsumer for AckOutput {
    fn set_error(&mut self, error: &str) {
        self.error = Some(error.to_string());
    }
}

/// A typed in-flight request.
pub(crate) struct Command<O: CommandOutput> {
    kind: CommandKind,
    wire: Bytes,
    output: O,
    ack: Option<AckOutput>,
    remaining: u8,
    ack_error: bool,
    cancelled: Arc<AtomicBool>,
    completion: Completion<O::Item>,
}

impl<O: CommandOutput> Command<O> {
    /// Create a request and the completion handed back to the caller.
    pub(crate) fn new(
        kind: CommandKind,
        wire: Bytes,
        output: O,
        transactional: bool,
    ) -> (Self, Completion<O::Item>) {
        let cancelled = Arc::new(AtomicBool::new(false));
        let completion = Completion::with_canceller(cancelled.clone());
        let command = Command {
            kind,
            wire,
            output,
            ack: transactional.then(AckOutput::default),
            remaining: if transactional { 2 } else { 1 },
            ack_error: false,
            cancelled,
            completion: completion.clone(),
        };
        (command, completion)
    }

    /// Box a request into the shared, type-erased queue handle.
    pub(crate) fn into_shared(self) -> SharedCommand {
        Arc::new(Mutex::new(Box::new(self) as Box<dyn QueuedCommand>))
    }
}

impl<O: CommandOutput> QueuedCommand for Command<O> {
    fn kind(&self) -> CommandKind {
        self.kind
    }

    fn wire_bytes(&self) -> &[u8] {
        &self.wire
    }

    fn consumer(&mut self) -> &mut dyn ReplyConsumer {
        if self.remaining > 1 && self.ack.is_some() {
            self.ack.as_mut().expect("ack present while budget is 2")
        } else {
            &mut self.output
        }
    }

    fn complete(&mut self) {
        if self.remaining == 0 {
            return;
        }
        self.remaining -= 1;
        if self.remaining > 0 {
            // Queued-acknowledgement phase. An error ack (for example a
            // command rejected inside MULTI) settles the caller now; the
            // EXEC reply will not carry an element for this request.
            if let Some(ack) = self.ack.take() {
                if let Some(error) = ack.error {
                    self.ack_error = true;
                    self.completion.reject(Error::Redis(error));
                }
            }
            return;
        }
        if self.cancelled.load(Ordering::SeqCst) {
            // A cancelled request's reply is decoded and discarded.
            self.completion.cancel();
            return;
        }
        match self.output.take() {
            Ok(value) => self.completion.resolve(value),
            Err(error) => self.completion.reject(error),
        }
    }

    fn fail(&mut self, error: Error) {
        self.remaining = 0;
        self.output.set_error(&error.to_string());
        self.output.abort(&error);
        self.completion.reject(error);
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn cancel(&mut self, error: Error) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.completion.reject(error);
    }

    fn ack_failed(&self) -> bool {
        self.ack_error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{IntegerOutput, StatusOutput};
    use std::time::Duration;

    fn wire(kind: CommandKind) -> Bytes {
        braid_proto::encode_request(kind, &braid_proto::CommandArgs::new())
    }

    #[test]
    fn test_plain_command_completes_once() {
        let (mut command, completion) =
            Command::new(CommandKind::INCR, wire(CommandKind::INCR), IntegerOutput::new(), false);
        command.consumer().set_int(42);
        command.complete();
        assert_eq!(completion.get(Duration::from_millis(10)), Ok(42));

        // Further budget burns are no-ops.
        command.complete();
        assert_eq!(completion.get(Duration::from_millis(10)), Ok(42));
    }

    #[test]
    fn test_transactional_command_two_phase() {
        let (mut command, completion) =
            Command::new(CommandKind::INCR, wire(CommandKind::INCR), IntegerOutput::new(), true);

        // Phase 1: the ack goes to the throwaway sink.
        command.consumer().set_bytes(b"QUEUED");
        command.complete();
        assert!(!completion.is_settled());

        // Phase 2: the real result.
        command.consumer().set_int(2);
        command.complete();
        assert_eq!(completion.get(Duration::from_millis(10)), Ok(2));
    }

    #[test]
    fn test_error_ack_rejects_immediately() {
        let (mut command, completion) =
            Command::new(CommandKind::GET, wire(CommandKind::GET), StatusOutput::new(), true);
        command.consumer().set_error("ERR not allowed in MULTI");
        command.complete();
        assert!(command.ack_failed());
        assert_eq!(
            completion.get(Duration::from_millis(10)),
            Err(Error::Redis("ERR not allowed in MULTI".to_string()))
        );
    }

    #[test]
    fn test_fail_rejects_and_drains_budget() {
        let (mut command, completion) =
            Command::new(CommandKind::GET, wire(CommandKind::GET), StatusOutput::new(), false);
        command.fail(Error::ConnectionClosed);
        assert_eq!(
            completion.get(Duration::from_millis(10)),
            Err(Error::ConnectionClosed)
        );
        command.complete();
        assert_eq!(
            completion.get(Duration::from_millis(10)),
            Err(Error::ConnectionClosed)
        );
    }

    #[test]
    fn test_cancelled_command_never_delivers() {
        let (mut command, completion) =
            Command::new(CommandKind::GET, wire(CommandKind::GET), IntegerOutput::new(), false);
        assert_eq!(
            completion.get(Duration::from_millis(5)),
            Err(Error::Timeout)
        );
        assert!(command.is_cancelled());

        // The reply still arrives and is decoded, but is discarded.
        command.consumer().set_int(9);
        command.complete();
        assert!(matches!(
            completion.get(Duration::from_millis(5)),
            Err(Error::Interrupted(_))
        ));
    }
}
