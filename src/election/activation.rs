//! One-shot "became active" signal.
//!
//! The trigger fires at most once. Listeners registered after it fired
//! observe it immediately.

use tokio::sync::watch;

/// Create a linked trigger/listener pair.
pub fn activation_signal() -> (ActivationTrigger, ActivationListener) {
    let (tx, rx) = watch::channel(false);
    (ActivationTrigger { tx }, ActivationListener { rx })
}

/// Firing side, owned by the election task.
#[derive(Debug)]
pub struct ActivationTrigger {
    tx: watch::Sender<bool>,
}

impl ActivationTrigger {
    /// Fire the signal. Returns true only on the first call.
    pub fn fire(&self) -> bool {
        self.tx.send_if_modified(|active| {
            if *active {
                false
            } else {
                *active = true;
                true
            }
        })
    }

    /// Raw flag, used to gate the marker broadcast.
    pub fn flag(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

/// Observing side, handed out to the application.
#[derive(Debug, Clone)]
pub struct ActivationListener {
    rx: watch::Receiver<bool>,
}

impl ActivationListener {
    pub fn is_active(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once active. Returns false if the trigger was dropped unfired.
    pub async fn wait(&self) -> bool {
        let mut rx = self.rx.clone();
        let fired = rx.wait_for(|active| *active).await.is_ok();
        fired
    }

    /// Run `callback` exactly once on activation.
    ///
    /// Runs synchronously when already active, otherwise on a spawned task.
    /// Dropped without running if this instance never becomes active.
    pub fn on_active<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.is_active() {
            callback();
            return;
        }
        let listener = self.clone();
        tokio::spawn(async move {
            if listener.wait().await {
                callback();
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn fires_once() {
        let (trigger, listener) = activation_signal();
        assert!(!listener.is_active());
        assert!(trigger.fire());
        assert!(!trigger.fire());
        assert!(listener.is_active());
        assert!(listener.wait().await);
    }

    #[tokio::test]
    async fn late_subscriber_runs_synchronously() {
        let (trigger, listener) = activation_signal();
        trigger.fire();

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        listener.on_active(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn early_subscriber_runs_after_fire() {
        let (trigger, listener) = activation_signal();
        let (tx, rx) = tokio::sync::oneshot::channel();
        listener.on_active(move || {
            let _ = tx.send(());
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        trigger.fire();
        trigger.fire();

        tokio::time::timeout(Duration::from_secs(1), rx)
            .await
            .expect("callback should run")
            .unwrap();
    }

    #[tokio::test]
    async fn dropped_trigger_never_activates() {
        let (trigger, listener) = activation_signal();
        drop(trigger);
        assert!(!listener.wait().await);
    }
}
