//! Single-slot holder for a request awaiting a Bluetooth stack callback
//!
//! Platform stacks report start/stop outcomes through delegate callbacks on
//! their own threads. A [`PendingSlot`] turns such a callback into a future:
//! the requester arms the slot and awaits the receiver, the callback resolves
//! it. At most one request is outstanding; a second `arm` while the first
//! waiter is still alive fails with [`BleError::RequestPending`].
//!
//! Every arm is numbered. A callback must name the request it answers, so an
//! outcome that arrives after its waiter gave up is dropped instead of being
//! handed to whichever request was armed next.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::debug;

use crate::error::{BleError, Result};

// ----------------------------------------------------------------------------
// Tokens
// ----------------------------------------------------------------------------

/// Identifies one armed request
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PendingToken(u64);

impl PendingToken {
    pub(crate) fn from_sequence(sequence: u64) -> Self {
        Self(sequence)
    }

    /// Position of the request among all arms of its slot, starting at 1
    pub fn sequence(&self) -> u64 {
        self.0
    }
}

/// Receiving half of an armed slot
#[derive(Debug)]
pub struct PendingRequest<T> {
    token: PendingToken,
    receiver: oneshot::Receiver<T>,
}

impl<T> PendingRequest<T> {
    pub fn token(&self) -> PendingToken {
        self.token
    }
}

// ----------------------------------------------------------------------------
// Pending Slot
// ----------------------------------------------------------------------------

struct SlotState<T> {
    generation: u64,
    waiter: Option<(PendingToken, oneshot::Sender<T>)>,
}

pub struct PendingSlot<T> {
    inner: Arc<Mutex<SlotState<T>>>,
}

impl<T> Clone for PendingSlot<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for PendingSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PendingSlot<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(SlotState {
                generation: 0,
                waiter: None,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SlotState<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a waiter
    ///
    /// A slot whose previous waiter has gone away (for example after a
    /// timeout) is reclaimed.
    pub fn arm(&self) -> Result<PendingRequest<T>> {
        let mut slot = self.lock();
        if let Some((token, sender)) = slot.waiter.as_ref() {
            if !sender.is_closed() {
                return Err(BleError::RequestPending);
            }
            debug!("Reclaiming pending slot abandoned by request {}", token.0);
        }
        slot.generation += 1;
        let token = PendingToken(slot.generation);
        let (tx, receiver) = oneshot::channel();
        slot.waiter = Some((token, tx));
        Ok(PendingRequest { token, receiver })
    }

    /// Deliver the outcome of request `token`
    ///
    /// Returns `false` when that request is no longer waiting; the value is
    /// dropped and any newer waiter stays armed.
    pub fn resolve(&self, token: PendingToken, value: T) -> bool {
        let sender = {
            let mut slot = self.lock();
            match slot.waiter.as_ref() {
                Some((current, _)) if *current == token => slot.waiter.take(),
                Some((current, _)) => {
                    debug!(
                        "Dropping outcome for request {}; request {} is waiting",
                        token.0, current.0
                    );
                    None
                }
                None => None,
            }
        };
        match sender {
            Some((_, sender)) => sender.send(value).is_ok(),
            None => false,
        }
    }

    /// Deliver an unsolicited report to whichever request is waiting
    ///
    /// Only for notifications that concern any request, such as the adapter
    /// powering off.
    pub fn notify(&self, value: T) -> bool {
        let sender = self.lock().waiter.take();
        match sender {
            Some((_, sender)) => sender.send(value).is_ok(),
            None => false,
        }
    }

    /// Drop the waiter for `token` without an outcome
    pub fn cancel(&self, token: PendingToken) {
        let mut slot = self.lock();
        if matches!(slot.waiter.as_ref(), Some((current, _)) if *current == token) {
            slot.waiter = None;
        }
    }

    /// Drop whatever waiter is armed
    pub fn clear(&self) {
        self.lock().waiter = None;
    }

    /// Token of the most recent arm, if any
    pub fn latest(&self) -> Option<PendingToken> {
        let generation = self.lock().generation;
        (generation > 0).then_some(PendingToken(generation))
    }

    pub fn is_armed(&self) -> bool {
        self.lock()
            .waiter
            .as_ref()
            .map(|(_, sender)| !sender.is_closed())
            .unwrap_or(false)
    }
}

/// Await an armed request, optionally bounded by a timeout
pub async fn wait_for<T>(
    slot: &PendingSlot<T>,
    request: PendingRequest<T>,
    timeout: Option<Duration>,
) -> Result<T> {
    let PendingRequest { token, receiver } = request;
    let outcome = match timeout {
        Some(duration) => match tokio::time::timeout(duration, receiver).await {
            Ok(outcome) => outcome,
            Err(_) => {
                slot.cancel(token);
                return Err(BleError::CallbackTimeout(duration));
            }
        },
        None => receiver.await,
    };
    outcome.map_err(|_| BleError::CallbackDropped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolve_delivers_once() {
        let slot = PendingSlot::new();
        let request = slot.arm().unwrap();
        let token = request.token();
        assert!(slot.is_armed());

        assert!(slot.resolve(token, 7u8));
        assert!(!slot.resolve(token, 8u8));
        assert_eq!(wait_for(&slot, request, None).await.unwrap(), 7);
        assert!(!slot.is_armed());
    }

    #[tokio::test]
    async fn test_second_arm_is_rejected() {
        let slot: PendingSlot<()> = PendingSlot::new();
        let _request = slot.arm().unwrap();
        assert!(matches!(slot.arm(), Err(BleError::RequestPending)));
    }

    #[tokio::test]
    async fn test_abandoned_slot_is_reclaimed() {
        let slot: PendingSlot<()> = PendingSlot::new();
        let request = slot.arm().unwrap();
        drop(request);
        assert!(!slot.is_armed());

        let next = slot.arm().unwrap();
        assert_eq!(next.token().sequence(), 2);
        assert_eq!(slot.latest(), Some(next.token()));
    }

    #[tokio::test]
    async fn test_late_outcome_skips_newer_request() {
        let slot = PendingSlot::new();
        let first = slot.arm().unwrap();
        let stale = first.token();
        drop(first);

        let second = slot.arm().unwrap();
        let current = second.token();

        assert!(!slot.resolve(stale, "late"));
        assert!(slot.is_armed());

        assert!(slot.resolve(current, "fresh"));
        assert_eq!(wait_for(&slot, second, None).await.unwrap(), "fresh");
    }

    #[tokio::test]
    async fn test_notify_reaches_current_waiter() {
        let slot = PendingSlot::new();
        let request = slot.arm().unwrap();

        assert!(slot.notify(3u8));
        assert_eq!(wait_for(&slot, request, None).await.unwrap(), 3);
        assert!(!slot.notify(4u8));
    }

    #[tokio::test]
    async fn test_callback_from_another_task() {
        let slot = PendingSlot::new();
        let request = slot.arm().unwrap();
        let token = request.token();

        let callback = slot.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            callback.resolve(token, "started");
        });

        let outcome = wait_for(&slot, request, Some(Duration::from_secs(1)))
            .await
            .unwrap();
        assert_eq!(outcome, "started");
    }

    #[tokio::test]
    async fn test_timeout_clears_slot() {
        let slot: PendingSlot<()> = PendingSlot::new();
        let request = slot.arm().unwrap();
        let token = request.token();

        let result = wait_for(&slot, request, Some(Duration::from_millis(10))).await;
        assert!(matches!(result, Err(BleError::CallbackTimeout(_))));
        assert!(!slot.is_armed());
        assert!(!slot.resolve(token, ()));
    }

    #[tokio::test]
    async fn test_cancel_only_drops_named_request() {
        let slot: PendingSlot<()> = PendingSlot::new();
        let request = slot.arm().unwrap();

        slot.cancel(PendingToken::from_sequence(99));
        assert!(slot.is_armed());

        slot.cancel(request.token());
        let result = wait_for(&slot, request, None).await;
        assert!(matches!(result, Err(BleError::CallbackDropped)));
    }
}
