//! Single-assignment completion primitive.
//!
//! A [`Completion`] carries the eventual result of one request: it starts
//! pending and transitions exactly once to resolved, rejected, or
//! cancelled. Subscribers registered with [`then`](Completion::then) and
//! [`fail`](Completion::fail) fire in registration order, each at most
//! once; a subscriber added after the transition fires immediately on the
//! registering thread. Panics inside subscribers are caught and logged,
//! never propagated into the decoder or transport.
//!
//! Blocking consumers use [`get`](Completion::get) (which cancels the
//! request when the wait elapses) or [`wait`](Completion::wait);
//! [`await_all`] waits for a whole batch against one shared time budget.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::warn;

use crate::error::Error;

type DoneCallback<T> = Box<dyn FnOnce(&T) + Send>;
type FailCallback = Box<dyn FnOnce(&Error) + Send>;

enum State<T> {
    Pending,
    Resolved(T),
    Rejected(Error),
    Cancelled,
}

struct Slot<T> {
    state: State<T>,
    done: Vec<DoneCallback<T>>,
    fail: Vec<FailCallback>,
}

struct Core<T> {
    slot: Mutex<Slot<T>>,
    settled: Condvar,
}

/// A single-assignment result carrier with callback chaining.
///
/// Clones share the same underlying slot; resolving any clone settles all
/// of them.
pub struct Completion<T> {
    core: Arc<Core<T>>,
    cancel_flag: Option<Arc<AtomicBool>>,
}

impl<T> Clone for Completion<T> {
    fn clone(&self) -> Self {
        Completion {
            core: self.core.clone(),
            cancel_flag: self.cancel_flag.clone(),
        }
    }
}

impl<T: Clone + Send + 'static> Completion<T> {
    /// Create a pending completion.
    pub fn pending() -> Self {
        Completion {
            core: Arc::new(Core {
                slot: Mutex::new(Slot {
                    state: State::Pending,
                    done: Vec::new(),
                    fail: Vec::new(),
                }),
                settled: Condvar::new(),
            }),
            cancel_flag: None,
        }
    }

    /// Create a pending completion whose timeout-cancellation also flips
    /// the supplied request flag.
    pub(crate) fn with_canceller(flag: Arc<AtomicBool>) -> Self {
        let mut completion = Self::pending();
        completion.cancel_flag = Some(flag);
        completion
    }

    /// Create a completion already rejected with `error`.
    pub fn rejected(error: Error) -> Self {
        let completion = Self::pending();
        completion.reject(error);
        completion
    }

    /// Resolve with `value`. A no-op unless still pending.
    pub fn resolve(&self, value: T) {
        let callbacks = {
            let mut slot = self.core.slot.lock();
            if !matches!(slot.state, State::Pending) {
                return;
            }
            slot.state = State::Resolved(value.clone());
            slot.fail.clear();
            self.core.settled.notify_all();
            std::mem::take(&mut slot.done)
        };
        for callback in callbacks {
            fire_done(callback, &value);
        }
    }

    /// Reject with `error`. A no-op unless still pending.
    pub fn reject(&self, error: Error) {
        let (error, callbacks) = {
            let mut slot = self.core.slot.lock();
            if !matches!(slot.state, State::Pending) {
                return;
            }
            slot.state = State::Rejected(error.clone());
            slot.done.clear();
            self.core.settled.notify_all();
            (error, std::mem::take(&mut slot.fail))
        };
        for callback in callbacks {
            fire_fail(callback, &error);
        }
    }

    /// Move to the cancelled state: waiters wake with an interruption
    /// error and no subscriber ever fires.
    pub(crate) fn cancel(&self) {
        if let Some(flag) = &self.cancel_flag {
            flag.store(true, Ordering::SeqCst);
        }
        let mut slot = self.core.slot.lock();
        if matches!(slot.state, State::Pending) {
            slot.state = State::Cancelled;
            slot.done.clear();
            slot.fail.clear();
            self.core.settled.notify_all();
        }
    }

    /// Subscribe to the resolved value.
    pub fn then<F>(&self, callback: F) -> &Self
    where
        F: FnOnce(&T) + Send + 'static,
    {
        let fire = {
            let mut slot = self.core.slot.lock();
            match &slot.state {
                State::Pending => {
                    slot.done.push(Box::new(callback));
                    None
                }
                State::Resolved(value) => {
                    Some((Box::new(callback) as DoneCallback<T>, value.clone()))
                }
                State::Rejected(_) | State::Cancelled => None,
            }
        };
        if let Some((callback, value)) = fire {
            fire_done(callback, &value);
        }
        self
    }

    /// Subscribe to the rejection error.
    pub fn fail<F>(&self, callback: F) -> &Self
    where
        F: FnOnce(&Error) + Send + 'static,
    {
        let fire = {
            let mut slot = self.core.slot.lock();
            match &slot.state {
                State::Pending => {
                    slot.fail.push(Box::new(callback));
                    None
                }
                State::Rejected(error) => {
                    Some((Box::new(callback) as FailCallback, error.clone()))
                }
                State::Resolved(_) | State::Cancelled => None,
            }
        };
        if let Some((callback, error)) = fire {
            fire_fail(callback, &error);
        }
        self
    }

    /// Subscribe to both outcomes at once.
    pub fn then_fail<D, F>(&self, done: D, fail: F) -> &Self
    where
        D: FnOnce(&T) + Send + 'static,
        F: FnOnce(&Error) + Send + 'static,
    {
        self.then(done).fail(fail)
    }

    /// Sequential composition: on resolution, invoke `f` to obtain an
    /// inner completion and forward its outcome to the returned one.
    /// Rejections of either stage are forwarded as well.
    pub fn pipe<R, F>(&self, f: F) -> Completion<R>
    where
        R: Clone + Send + 'static,
        F: FnOnce(&T) -> Completion<R> + Send + 'static,
    {
        let piped = Completion::pending();
        let on_done = piped.clone();
        self.then(move |value| {
            let inner = f(value);
            let forward = on_done.clone();
            inner.then(move |inner_value| forward.resolve(inner_value.clone()));
            let forward = on_done.clone();
            inner.fail(move |error| forward.reject(error.clone()));
        });
        let on_fail = piped.clone();
        self.fail(move |error| on_fail.reject(error.clone()));
        piped
    }

    /// Block until settled or `timeout` elapses.
    ///
    /// On elapse the request is cancelled client-side and
    /// [`Error::Timeout`] is returned; the server still executes it.
    pub fn get(&self, timeout: Duration) -> Result<T, Error>
    where
        T: Clone,
    {
        let deadline = Instant::now() + timeout;
        let mut slot = self.core.slot.lock();
        while matches!(slot.state, State::Pending) {
            if self.core.settled.wait_until(&mut slot, deadline).timed_out() {
                break;
            }
        }
        match &slot.state {
            State::Resolved(value) => Ok(value.clone()),
            State::Rejected(error) => Err(error.clone()),
            State::Cancelled => Err(Error::Interrupted("command cancelled".to_string())),
            State::Pending => {
                drop(slot);
                self.cancel();
                Err(Error::Timeout)
            }
        }
    }

    /// Block until settled or `timeout` elapses; true if it settled.
    /// Unlike [`get`](Completion::get), elapsing does not cancel.
    pub fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut slot = self.core.slot.lock();
        while matches!(slot.state, State::Pending) {
            if self.core.settled.wait_until(&mut slot, deadline).timed_out() {
                return !matches!(slot.state, State::Pending);
            }
        }
        true
    }

    /// True once the completion has left the pending state.
    pub fn is_settled(&self) -> bool {
        !matches!(self.core.slot.lock().state, State::Pending)
    }
}

fn fire_done<T>(callback: DoneCallback<T>, value: &T) {
    if panic::catch_unwind(AssertUnwindSafe(|| callback(value))).is_err() {
        warn!("completion callback panicked");
    }
}

fn fire_fail(callback: FailCallback, error: &Error) {
    if panic::catch_unwind(AssertUnwindSafe(|| callback(error))).is_err() {
        warn!("completion failure callback panicked");
    }
}

/// A type-erased handle for waiting on heterogeneous completions.
pub trait Awaitable {
    /// Block until settled or `timeout` elapses; true if it settled.
    fn wait(&self, timeout: Duration) -> bool;
}

impl<T: Clone + Send + 'static> Awaitable for Completion<T> {
    fn wait(&self, timeout: Duration) -> bool {
        Completion::wait(self, timeout)
    }
}

/// Wait for every completion, deducting elapsed time from one shared
/// budget. Returns false as soon as the budget runs out.
pub fn await_all(timeout: Duration, completions: &[&dyn Awaitable]) -> bool {
    let mut remaining = timeout;
    let mut checkpoint = Instant::now();
    for completion in completions {
        if !completion.wait(remaining) {
            return false;
        }
        let now = Instant::now();
        remaining = remaining.saturating_sub(now - checkpoint);
        checkpoint = now;
    }
    true
}

/// Aggregate a batch into one completion over the ordered results.
///
/// Collect-all semantics: the aggregate settles only once every child has,
/// even when some fail early. If any child failed, the aggregate rejects
/// with every collected error; otherwise it resolves with the values in
/// child order.
pub fn join<T>(completions: Vec<Completion<T>>) -> Completion<Vec<T>>
where
    T: Clone + Send + 'static,
{
    let aggregate = Completion::pending();
    let total = completions.len();
    if total == 0 {
        aggregate.resolve(Vec::new());
        return aggregate;
    }

    struct Progress<T> {
        results: Vec<Option<T>>,
        errors: Vec<Error>,
        settled: usize,
    }

    let progress = Arc::new(Mutex::new(Progress {
        results: (0..total).map(|_| None).collect(),
        errors: Vec::new(),
        settled: 0,
    }));

    fn settle_one<T: Clone + Send + 'static>(
        progress: &Mutex<Progress<T>>,
        total: usize,
        aggregate: &Completion<Vec<T>>,
        outcome: Result<(usize, T), Error>,
    ) {
        let mut guard = progress.lock();
        match outcome {
            Ok((index, value)) => guard.results[index] = Some(value),
            Err(error) => guard.errors.push(error),
        }
        guard.settled += 1;
        if guard.settled < total {
            return;
        }
        if guard.errors.is_empty() {
            let values = guard.results.iter_mut().map(|r| r.take().unwrap()).collect();
            drop(guard);
            aggregate.resolve(values);
        } else {
            let errors = std::mem::take(&mut guard.errors);
            drop(guard);
            aggregate.reject(Error::Aggregate(errors));
        }
    }

    for (index, completion) in completions.iter().enumerate() {
        let progress_done = progress.clone();
        let aggregate_done = aggregate.clone();
        completion.then(move |value| {
            settle_one(&progress_done, total, &aggregate_done, Ok((index, value.clone())));
        });
        let progress_fail = progress.clone();
        let aggregate_fail = aggregate.clone();
        completion.fail(move |error| {
            settle_one::<T>(&progress_fail, total, &aggregate_fail, Err(error.clone()));
        });
    }

    aggregate
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_resolve_fires_callbacks_in_order() {
        let completion: Completion<i64> = Completion::pending();
        let order = Arc::new(Mutex::new(Vec::new()));
        for tag in 0..3 {
            let order = order.clone();
            completion.then(move |value| order.lock().push((tag, *value)));
        }
        completion.resolve(7);
        assert_eq!(*order.lock(), vec![(0, 7), (1, 7), (2, 7)]);
    }

    #[test]
    fn test_late_subscriber_fires_once() {
        let completion: Completion<i64> = Completion::pending();
        completion.resolve(1);
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        completion.then(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_single_assignment() {
        let completion: Completion<i64> = Completion::pending();
        completion.resolve(1);
        completion.resolve(2);
        completion.reject(Error::Timeout);
        assert_eq!(completion.get(Duration::from_millis(10)), Ok(1));
    }

    #[test]
    fn test_reject_fires_fail_only() {
        let completion: Completion<i64> = Completion::pending();
        let done = Arc::new(AtomicUsize::new(0));
        let failed = Arc::new(AtomicUsize::new(0));
        let d = done.clone();
        let f = failed.clone();
        completion.then_fail(
            move |_| {
                d.fetch_add(1, Ordering::SeqCst);
            },
            move |_| {
                f.fetch_add(1, Ordering::SeqCst);
            },
        );
        completion.reject(Error::Redis("ERR".to_string()));
        assert_eq!(done.load(Ordering::SeqCst), 0);
        assert_eq!(failed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_callback_panic_is_contained() {
        let completion: Completion<i64> = Completion::pending();
        let fired = Arc::new(AtomicUsize::new(0));
        completion.then(|_| panic!("subscriber bug"));
        let counter = fired.clone();
        completion.then(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        completion.resolve(1);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_get_timeout_cancels() {
        let flag = Arc::new(AtomicBool::new(false));
        let completion: Completion<i64> = Completion::with_canceller(flag.clone());
        assert_eq!(
            completion.get(Duration::from_millis(5)),
            Err(Error::Timeout)
        );
        assert!(flag.load(Ordering::SeqCst));
        // A resolution arriving after cancellation is discarded.
        completion.resolve(1);
        assert!(matches!(
            completion.get(Duration::from_millis(5)),
            Err(Error::Interrupted(_))
        ));
    }

    #[test]
    fn test_get_from_another_thread() {
        let completion: Completion<String> = Completion::pending();
        let remote = completion.clone();
        let handle = std::thread::spawn(move || remote.get(Duration::from_secs(5)));
        std::thread::sleep(Duration::from_millis(10));
        completion.resolve("OK".to_string());
        assert_eq!(handle.join().unwrap(), Ok("OK".to_string()));
    }

    #[test]
    fn test_pipe_forwards_inner_resolution() {
        let first: Completion<i64> = Completion::pending();
        let second: Completion<String> = Completion::pending();
        let inner = second.clone();
        let piped = first.pipe(move |value| {
            assert_eq!(*value, 1);
            inner
        });
        first.resolve(1);
        assert!(!piped.is_settled());
        second.resolve("done".to_string());
        assert_eq!(piped.get(Duration::from_millis(10)), Ok("done".to_string()));
    }

    #[test]
    fn test_pipe_forwards_outer_rejection() {
        let first: Completion<i64> = Completion::pending();
        let piped = first.pipe(|_| Completion::<i64>::pending());
        first.reject(Error::ConnectionClosed);
        assert_eq!(
            piped.get(Duration::from_millis(10)),
            Err(Error::ConnectionClosed)
        );
    }

    #[test]
    fn test_await_all_within_budget() {
        let a: Completion<i64> = Completion::pending();
        let b: Completion<String> = Completion::pending();
        a.resolve(1);
        b.resolve("x".to_string());
        assert!(await_all(Duration::from_millis(50), &[&a, &b]));
    }

    #[test]
    fn test_await_all_budget_elapses() {
        let a: Completion<i64> = Completion::pending();
        let b: Completion<i64> = Completion::pending();
        a.resolve(1);
        assert!(!await_all(Duration::from_millis(20), &[&a, &b]));
    }

    #[test]
    fn test_join_resolves_in_child_order() {
        let a: Completion<i64> = Completion::pending();
        let b: Completion<i64> = Completion::pending();
        let joined = join(vec![a.clone(), b.clone()]);
        b.resolve(2);
        a.resolve(1);
        assert_eq!(joined.get(Duration::from_millis(10)), Ok(vec![1, 2]));
    }

    #[test]
    fn test_join_collects_every_error() {
        let a: Completion<i64> = Completion::pending();
        let b: Completion<i64> = Completion::pending();
        let c: Completion<i64> = Completion::pending();
        let joined = join(vec![a.clone(), b.clone(), c.clone()]);
        a.reject(Error::Timeout);
        // Still waiting: collect-all semantics hold the aggregate open.
        assert!(!joined.is_settled());
        b.resolve(2);
        c.reject(Error::ConnectionClosed);
        match joined.get(Duration::from_millis(10)) {
            Err(Error::Aggregate(errors)) => {
                assert_eq!(errors, vec![Error::Timeout, Error::ConnectionClosed]);
            }
            other => panic!("expected aggregate failure, got {other:?}"),
        }
    }

    #[test]
    fn test_join_empty() {
        let joined = join(Vec::<Completion<i64>>::new());
        assert_eq!(joined.get(Duration::from_millis(10)), Ok(Vec::new()));
    }
}
