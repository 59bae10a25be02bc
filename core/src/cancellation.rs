//! Cancellation primitives for long-running effects.
//!
//! A [`SubscriptionHandle`] is owned by exactly one party (usually a
//! middleware) and is the only way to cancel. The runtime only ever sees the
//! read-only [`CancellationSignal`] half, attached to an
//! [`Effect::Cancellable`](crate::effect::Effect::Cancellable).
//!
//! Dropping the handle cancels as well, so a middleware that forgets a
//! subscription can never leak a live stream.
//!
//! # Example
//!
//! ```
//! use rexlist_core::cancellation::SubscriptionHandle;
//!
//! let handle = SubscriptionHandle::new();
//! let signal = handle.signal();
//! assert!(!signal.is_cancelled());
//!
//! handle.cancel();
//! assert!(signal.is_cancelled());
//! ```

use tokio::sync::watch;

/// Exclusive owner of a cancellable subscription
///
/// Not `Clone`: ownership of the handle is ownership of the right to cancel.
#[derive(Debug)]
pub struct SubscriptionHandle {
    sender: watch::Sender<bool>,
}

impl SubscriptionHandle {
    /// Create a new, live handle
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self { sender }
    }

    /// A read-only signal that observes this handle
    #[must_use]
    pub fn signal(&self) -> CancellationSignal {
        CancellationSignal {
            receiver: self.sender.subscribe(),
        }
    }

    /// Whether the handle has already been cancelled
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }

    /// Cancel and release the subscription
    ///
    /// Every signal observes the cancellation as soon as this returns.
    pub fn cancel(self) {
        self.sender.send_replace(true);
    }
}

impl Default for SubscriptionHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.sender.send_replace(true);
    }
}

/// Read-only view of a [`SubscriptionHandle`]
#[derive(Debug, Clone)]
pub struct CancellationSignal {
    receiver: watch::Receiver<bool>,
}

impl CancellationSignal {
    /// Whether the owning handle has cancelled
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolve once the owning handle cancels
    ///
    /// Resolves immediately if cancellation already happened or the handle
    /// is gone.
    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        // An error means the sender was dropped, which also cancels.
        let _ = receiver.wait_for(|cancelled| *cancelled).await;
    }
}
