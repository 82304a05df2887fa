//! Cooperative shutdown signalling.
//!
//! A [`ShutdownHandle`] flips a `watch` channel once; every cloned
//! [`ShutdownSignal`] observes it. Retry sleeps and in-flight scan batches
//! race against [`ShutdownSignal::cancelled`].

use std::sync::Arc;

use tokio::sync::watch;

/// Constructor for a linked handle/signal pair.
pub struct Shutdown;

impl Shutdown {
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> (ShutdownHandle, ShutdownSignal) {
        let (tx, rx) = watch::channel(false);
        (ShutdownHandle { tx: Arc::new(tx) }, ShutdownSignal { rx })
    }
}

/// Triggers shutdown. Cheap to clone.
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

/// Observes shutdown. Cheap to clone.
#[derive(Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once shutdown has been triggered. Never resolves if the
    /// handle was dropped without triggering.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::never()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn trigger_wakes_waiters() {
        let (handle, signal) = Shutdown::new();
        let waiter = tokio::spawn({
            let signal = signal.clone();
            async move { signal.cancelled().await }
        });
        assert!(!signal.is_triggered());
        handle.trigger();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake")
            .unwrap();
        assert!(signal.is_triggered());
    }

    #[tokio::test]
    async fn never_stays_pending() {
        let signal = ShutdownSignal::never();
        let res = tokio::time::timeout(Duration::from_millis(20), signal.cancelled()).await;
        assert!(res.is_err());
    }
}
