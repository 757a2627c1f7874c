//! Broadcast cancellation for the collect pipeline.
//!
//! A flag plus a done channel nobody ever sends on: [`CancelToken::cancel`] drops the only
//! sender, so `recv(token.done())` becomes ready in every `select!` at once.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded, select};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

struct Inner {
    canceled: AtomicBool,
    done_tx: Mutex<Option<Sender<()>>>,
    done_rx: Receiver<()>,
}

#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("canceled", &self.is_canceled())
            .finish()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        let (done_tx, done_rx) = bounded::<()>(0);
        Self {
            inner: Arc::new(Inner {
                canceled: AtomicBool::new(false),
                done_tx: Mutex::new(Some(done_tx)),
                done_rx,
            }),
        }
    }

    /// Trigger cancellation. Idempotent.
    pub fn cancel(&self) {
        self.inner.canceled.store(true, Ordering::SeqCst);
        let tx = self
            .inner
            .done_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(tx);
    }

    pub fn is_canceled(&self) -> bool {
        self.inner.canceled.load(Ordering::SeqCst)
    }

    /// Ready (disconnected) once canceled. Use as a `recv` arm in `select!`.
    pub fn done(&self) -> &Receiver<()> {
        &self.inner.done_rx
    }

    /// Sleep up to `timeout`, waking early on cancel. Returns true if canceled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        match self.inner.done_rx.recv_timeout(timeout) {
            Err(RecvTimeoutError::Disconnected) => true,
            _ => self.is_canceled(),
        }
    }
}

/// Blocking hand-off that gives up on cancel. Returns false if the item was not delivered
/// (canceled, or the receiving side is gone).
pub fn send_or_cancel<T>(tx: &Sender<T>, item: T, cancel: &CancelToken) -> bool {
    if cancel.is_canceled() {
        return false;
    }
    select! {
        send(tx, item) -> res => res.is_ok(),
        recv(cancel.done()) -> _ => false,
    }
}
