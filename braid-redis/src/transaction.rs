//! The transaction aggregate.
//!
//! While a `MULTI` scope is active every dispatched request is attached
//! here as a child. The aggregate then serves as the `EXEC` request's
//! output sink: the server's reply is one array whose i-th element is the
//! real result of the i-th queued request. Tokens are routed into the
//! corresponding child sink (tracking nested frames so an array-valued
//! element stays within its child) while a raw [`Reply`] per element is
//! recorded for the `EXEC` completion itself.
//!
//! Children settle in queue order when the aggregate is finalized, before
//! the `EXEC` completion resolves with the grouped result vector.

use braid_proto::ReplyConsumer;

use crate::command::SharedCommand;
use crate::error::Error;
use crate::output::{CommandOutput, NestedMultiOutput};
use crate::types::Reply;

pub(crate) struct TransactionOutput {
    children: Vec<SharedCommand>,
    /// Raw per-element record, independent of the children's typed sinks.
    raw: NestedMultiOutput,
    /// Set once the outer array header has been seen; later `multi`
    /// tokens belong to element payloads.
    header_seen: bool,
    /// The server answered `*-1`: the transaction was aborted by a
    /// failed `WATCH` guard.
    aborted: bool,
    /// A top-level error reply to `EXEC` itself.
    error: Option<String>,
    /// Index of the child currently being fed.
    current: usize,
    /// Countdown stack for nested frames inside the current element.
    frame: Vec<i64>,
}

impl TransactionOutput {
    pub(crate) fn new() -> Self {
        Self {
            children: Vec::new(),
            raw: NestedMultiOutput::new(),
            header_seen: false,
            aborted: false,
            error: None,
            current: 0,
            frame: Vec::new(),
        }
    }

    /// Attach a request dispatched inside the scope.
    pub(crate) fn add(&mut self, child: SharedCommand) {
        self.children.push(child);
    }

    /// Discard the scope: settle every child and mark it cancelled so the
    /// replay writer skips it.
    pub(crate) fn cancel(&mut self) {
        for child in self.children.drain(..) {
            child.lock().cancel(Error::Discarded);
        }
    }

    /// Skip children whose queued-acknowledgement failed: the server
    /// never queued them, so the reply array carries no element for them.
    fn advance_to_eligible(&mut self) {
        while let Some(child) = self.children.get(self.current) {
            if child.lock().ack_failed() {
                self.current += 1;
            } else {
                break;
            }
        }
    }

    fn feed_child(&mut self, feed: impl FnOnce(&mut dyn ReplyConsumer)) {
        self.advance_to_eligible();
        if let Some(child) = self.children.get(self.current) {
            let mut guard = child.lock();
            feed(guard.consumer());
        }
    }

    /// One token of the current element has been consumed; advance to the
    /// next element once its outermost frame closes.
    fn token_done(&mut self) {
        while let Some(remaining) = self.frame.last_mut() {
            *remaining -= 1;
            if *remaining == 0 {
                self.frame.pop();
            } else {
                return;
            }
        }
        self.current += 1;
    }
}

impl ReplyConsumer for TransactionOutput {
    fn set_bytes(&mut self, bytes: &[u8]) {
        if !self.header_seen {
            return;
        }
        self.raw.set_bytes(bytes);
        self.feed_child(|sink| sink.set_bytes(bytes));
        self.token_done();
    }

    fn set_int(&mut self, value: i64) {
        if !self.header_seen {
            return;
        }
        self.raw.set_int(value);
        self.feed_child(|sink| sink.set_int(value));
        self.token_done();
    }

    fn multi(&mut self, count: i64) {
        if !self.header_seen {
            self.header_seen = true;
            if count < 0 {
                self.aborted = true;
            } else {
                self.raw.multi(count);
            }
            return;
        }
        self.raw.multi(count);
        self.feed_child(|sink| sink.multi(count));
        if count > 0 {
            self.frame.push(count);
        } else {
            self.token_done();
        }
    }

    fn set_error(&mut self, error: &str) {
        if !self.header_seen {
            self.error = Some(error.to_string());
            return;
        }
        self.raw.set_error(error);
        self.feed_child(|sink| sink.set_error(error));
        self.token_done();
    }
}

impl CommandOutput for TransactionOutput {
    type Item = Vec<Reply>;

    /// Finalize the batch: settle the children in order, then yield the
    /// grouped raw results for the `EXEC` completion.
    fn take(&mut self) -> Result<Vec<Reply>, Error> {
        if let Some(message) = self.error.take() {
            let error = Error::Redis(message);
            for child in self.children.drain(..) {
                child.lock().fail(error.clone());
            }
            return Err(error);
        }

        if self.aborted {
            for child in self.children.drain(..) {
                child.lock().cancel(Error::Redis("transaction aborted".to_string()));
            }
            return Ok(Vec::new());
        }

        for child in self.children.drain(..) {
            child.lock().complete();
        }

        match self.raw.root() {
            Some(Reply::Array(items)) => Ok(items),
            _ => Err(Error::UnexpectedResponse),
        }
    }

    fn abort(&mut self, error: &Error) {
        for child in self.children.drain(..) {
            child.lock().fail(error.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;
    use crate::output::{IntegerOutput, StatusOutput};
    use braid_proto::{CommandArgs, CommandKind, encode_request};
    use bytes::Bytes;
    use std::time::Duration;

    fn transactional_status(kind: CommandKind) -> (SharedCommand, crate::completion::Completion<String>) {
        let wire = encode_request(kind, &CommandArgs::new());
        let (command, completion) = Command::new(kind, wire, StatusOutput::new(), true);
        (command.into_shared(), completion)
    }

    fn transactional_integer(kind: CommandKind) -> (SharedCommand, crate::completion::Completion<i64>) {
        let wire = encode_request(kind, &CommandArgs::new());
        let (command, completion) = Command::new(kind, wire, IntegerOutput::new(), true);
        (command.into_shared(), completion)
    }

    fn ack(child: &SharedCommand) {
        let mut guard = child.lock();
        guard.consumer().set_bytes(b"QUEUED");
        guard.complete();
    }

    #[test]
    fn test_exec_routes_elements_and_settles_children() {
        let (set_cmd, set_completion) = transactional_status(CommandKind::SET);
        let (incr_cmd, incr_completion) = transactional_integer(CommandKind::INCR);
        ack(&set_cmd);
        ack(&incr_cmd);

        let mut tx = TransactionOutput::new();
        tx.add(set_cmd);
        tx.add(incr_cmd);

        // Server reply to EXEC: *2 [+OK, :2]
        tx.multi(2);
        tx.set_bytes(b"OK");
        tx.set_int(2);

        assert!(!set_completion.is_settled());
        assert!(!incr_completion.is_settled());

        let replies = tx.take().unwrap();
        assert_eq!(
            replies,
            vec![Reply::Bulk(Bytes::from_static(b"OK")), Reply::Int(2)]
        );
        assert_eq!(set_completion.get(Duration::from_millis(10)), Ok("OK".to_string()));
        assert_eq!(incr_completion.get(Duration::from_millis(10)), Ok(2));
    }

    #[test]
    fn test_exec_error_element_rejects_its_child_only() {
        let (a_cmd, a_completion) = transactional_status(CommandKind::SET);
        let (b_cmd, b_completion) = transactional_integer(CommandKind::INCR);
        ack(&a_cmd);
        ack(&b_cmd);

        let mut tx = TransactionOutput::new();
        tx.add(a_cmd);
        tx.add(b_cmd);

        tx.multi(2);
        tx.set_bytes(b"OK");
        tx.set_error("ERR wrongtype");

        let replies = tx.take().unwrap();
        assert_eq!(replies[1], Reply::Error("ERR wrongtype".to_string()));
        assert_eq!(a_completion.get(Duration::from_millis(10)), Ok("OK".to_string()));
        assert_eq!(
            b_completion.get(Duration::from_millis(10)),
            Err(Error::Redis("ERR wrongtype".to_string()))
        );
    }

    #[test]
    fn test_array_element_stays_within_child() {
        let (a_cmd, _a_completion) = transactional_status(CommandKind::SET);
        let (b_cmd, b_completion) = transactional_status(CommandKind::GET);
        ack(&a_cmd);
        ack(&b_cmd);

        let mut tx = TransactionOutput::new();
        tx.add(a_cmd);
        tx.add(b_cmd);

        // *2 [ *2 [:1 :2], +OK ] - the nested array all belongs to child 0.
        tx.multi(2);
        tx.multi(2);
        tx.set_int(1);
        tx.set_int(2);
        tx.set_bytes(b"OK");

        let replies = tx.take().unwrap();
        assert_eq!(
            replies,
            vec![
                Reply::Array(vec![Reply::Int(1), Reply::Int(2)]),
                Reply::Bulk(Bytes::from_static(b"OK")),
            ]
        );
        assert_eq!(b_completion.get(Duration::from_millis(10)), Ok("OK".to_string()));
    }

    #[test]
    fn test_failed_ack_child_is_skipped_in_routing() {
        let (bad_cmd, bad_completion) = transactional_status(CommandKind::GET);
        {
            let mut guard = bad_cmd.lock();
            guard.consumer().set_error("ERR unknown command");
            guard.complete();
        }
        let (good_cmd, good_completion) = transactional_integer(CommandKind::INCR);
        ack(&good_cmd);

        let mut tx = TransactionOutput::new();
        tx.add(bad_cmd);
        tx.add(good_cmd);

        // Only the good command was queued, so EXEC returns one element.
        tx.multi(1);
        tx.set_int(5);

        let replies = tx.take().unwrap();
        assert_eq!(replies, vec![Reply::Int(5)]);
        assert_eq!(good_completion.get(Duration::from_millis(10)), Ok(5));
        assert_eq!(
            bad_completion.get(Duration::from_millis(10)),
            Err(Error::Redis("ERR unknown command".to_string()))
        );
    }

    #[test]
    fn test_aborted_exec_cancels_children() {
        let (cmd, completion) = transactional_status(CommandKind::SET);
        ack(&cmd);

        let mut tx = TransactionOutput::new();
        tx.add(cmd);
        tx.multi(-1);

        assert_eq!(tx.take().unwrap(), Vec::new());
        assert_eq!(
            completion.get(Duration::from_millis(10)),
            Err(Error::Redis("transaction aborted".to_string()))
        );
    }

    #[test]
    fn test_cancel_rejects_children_as_discarded() {
        let (cmd, completion) = transactional_status(CommandKind::SET);
        ack(&cmd);

        let mut tx = TransactionOutput::new();
        tx.add(cmd);
        tx.cancel();

        assert_eq!(
            completion.get(Duration::from_millis(10)),
            Err(Error::Discarded)
        );
    }

    #[test]
    fn test_exec_level_error_fails_children() {
        let (cmd, completion) = transactional_status(CommandKind::SET);
        ack(&cmd);

        let mut tx = TransactionOutput::new();
        tx.add(cmd);
        tx.set_error("EXECABORT Transaction discarded because of previous errors.");

        assert!(matches!(tx.take(), Err(Error::Redis(_))));
        assert!(matches!(
            completion.get(Duration::from_millis(10)),
            Err(Error::Redis(_))
        ));
    }

    #[test]
    fn test_empty_transaction() {
        let mut tx = TransactionOutput::new();
        tx.multi(0);
        assert_eq!(tx.take().unwrap(), Vec::new());
    }
}
