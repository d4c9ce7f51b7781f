//! Subscription handle and cancellation semantics.
//!
//! A [`Subscription`] represents one live SSE connection and is the only way
//! to tear it down. Closing is idempotent and acts as a hard upper bound on
//! dispatch activity: once `close` returns, no further payload is forwarded
//! even if the transport delivers late events.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Lifecycle state of a subscription.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SubscriptionState {
    /// Transport worker running, payloads forwarded to the dispatch callback.
    Active,
    /// Terminal. The transport is released and no handler fires again.
    Closed,
}

/// Gate consulted immediately before every dispatch.
///
/// Closing the gate is the synchronous half of cancellation: the worker task
/// checks it right before invoking the callback, so a payload arriving after
/// `close` has returned can never be forwarded. `close` may also be called
/// from inside the dispatch callback, so no lock is held across the callback.
#[derive(Debug, Default)]
pub(crate) struct DispatchGate {
    closed: AtomicBool,
}

impl DispatchGate {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Forwards `payload` unless the gate has been closed.
    ///
    /// Returns `false` once closed, signalling the worker to shut down.
    pub(crate) fn dispatch(&self, callback: &(dyn Fn(String) + Send), payload: String) -> bool {
        if self.closed.load(Ordering::SeqCst) {
            return false;
        }
        callback(payload);
        true
    }

    /// Closes the gate. Returns `true` only for the first effective close.
    pub(crate) fn close(&self) -> bool {
        !self.closed.swap(true, Ordering::SeqCst)
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Handle to one live SSE subscription.
///
/// Returned by [`SseClient::subscribe`](crate::stream::client::SseClient::subscribe).
/// Dropping the handle closes the subscription; keep it alive for as long as
/// payloads should keep flowing. A closed subscription is never reused —
/// reconnecting means opening a fresh one.
#[derive(Debug)]
pub struct Subscription {
    gate: Arc<DispatchGate>,
    cancel: CancellationToken,
}

impl Subscription {
    pub(crate) fn new(gate: Arc<DispatchGate>, cancel: CancellationToken) -> Self {
        Self { gate, cancel }
    }

    /// Closes the subscription and releases the transport.
    ///
    /// Idempotent: the first call transitions the subscription to
    /// [`SubscriptionState::Closed`]; later calls are no-ops. After this
    /// method returns, the dispatch callback is never invoked again.
    pub fn close(&self) {
        if self.gate.close() {
            self.cancel.cancel();
            debug!(event = "subscription_closed");
        } else {
            debug!(event = "subscription_close_noop");
        }
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> SubscriptionState {
        if self.gate.is_closed() {
            SubscriptionState::Closed
        } else {
            SubscriptionState::Active
        }
    }

    /// Returns `true` while the subscription has not been closed.
    pub fn is_active(&self) -> bool {
        self.state() == SubscriptionState::Active
    }

    /// Returns a cloneable cancel-only handle.
    ///
    /// Useful for triggering teardown from another task or from inside the
    /// dispatch callback, where the owning `Subscription` is not reachable.
    pub fn canceller(&self) -> Canceller {
        Canceller {
            gate: Arc::clone(&self.gate),
            cancel: self.cancel.clone(),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}

/// Cloneable cancel-only handle to a subscription.
#[derive(Clone, Debug)]
pub struct Canceller {
    gate: Arc<DispatchGate>,
    cancel: CancellationToken,
}

impl Canceller {
    /// Closes the underlying subscription. Idempotent, same contract as
    /// [`Subscription::close`].
    pub fn cancel(&self) {
        if self.gate.close() {
            self.cancel.cancel();
            debug!(event = "subscription_closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use tokio_util::sync::CancellationToken;

    use super::{DispatchGate, Subscription, SubscriptionState};

    #[test]
    fn gate_forwards_while_open() {
        let gate = DispatchGate::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let callback = move |_payload: String| {
            counter.fetch_add(1, Ordering::SeqCst);
        };

        assert!(gate.dispatch(&callback, "a".to_string()));
        assert!(gate.dispatch(&callback, "b".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn gate_drops_payloads_after_close() {
        let gate = DispatchGate::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let callback = move |_payload: String| {
            counter.fetch_add(1, Ordering::SeqCst);
        };

        assert!(gate.close());
        assert!(!gate.dispatch(&callback, "late".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn gate_close_is_idempotent() {
        let gate = DispatchGate::new();
        assert!(gate.close());
        assert!(!gate.close());
        assert!(!gate.close());
    }

    #[test]
    fn subscription_reports_state_transitions() {
        let subscription = Subscription::new(
            Arc::new(DispatchGate::new()),
            CancellationToken::new(),
        );
        assert!(subscription.is_active());
        assert_eq!(subscription.state(), SubscriptionState::Active);

        subscription.close();
        assert!(!subscription.is_active());
        assert_eq!(subscription.state(), SubscriptionState::Closed);

        subscription.close();
        assert_eq!(subscription.state(), SubscriptionState::Closed);
    }

    #[test]
    fn close_cancels_the_worker_token_once() {
        let token = CancellationToken::new();
        let subscription = Subscription::new(Arc::new(DispatchGate::new()), token.clone());

        assert!(!token.is_cancelled());
        subscription.close();
        assert!(token.is_cancelled());
        subscription.close();
        assert!(token.is_cancelled());
    }

    #[test]
    fn canceller_closes_the_shared_subscription() {
        let gate = Arc::new(DispatchGate::new());
        let token = CancellationToken::new();
        let subscription = Subscription::new(Arc::clone(&gate), token.clone());

        let canceller = subscription.canceller();
        canceller.cancel();

        assert!(token.is_cancelled());
        assert_eq!(subscription.state(), SubscriptionState::Closed);

        // A cloned canceller firing again stays a no-op.
        canceller.clone().cancel();
        assert_eq!(subscription.state(), SubscriptionState::Closed);
    }

    #[test]
    fn drop_closes_the_subscription() {
        let gate = Arc::new(DispatchGate::new());
        let token = CancellationToken::new();

        {
            let _subscription = Subscription::new(Arc::clone(&gate), token.clone());
        }

        assert!(gate.is_closed());
        assert!(token.is_cancelled());
    }
}
