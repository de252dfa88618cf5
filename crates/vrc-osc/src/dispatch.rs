//! Change notification fan-out
//!
//! Subscribers are called synchronously, in subscription order, on whatever
//! thread reported the change (usually the OSC receive thread). A subscriber
//! that returns an error or panics is skipped for that notification only; it
//! stays subscribed and the remaining subscribers still run.

use crate::types::ParameterValue;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// One observed change of a registry entry
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterChange {
    /// Address whose value changed
    pub address: String,
    /// Value before the update (`None` if the address was unknown)
    pub old_value: Option<ParameterValue>,
    /// Value after the update
    pub new_value: ParameterValue,
}

/// Opaque handle returned by [`ChangeDispatcher::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionToken(u64);

type Handler = Arc<dyn Fn(&ParameterChange) -> anyhow::Result<()> + Send + Sync>;

/// Ordered list of change subscribers
#[derive(Default)]
pub struct ChangeDispatcher {
    handlers: Mutex<Vec<(SubscriptionToken, Handler)>>,
    next_token: AtomicU64,
}

impl ChangeDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber; it is called after every subscriber added before it
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionToken
    where
        F: Fn(&ParameterChange) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let token = SubscriptionToken(self.next_token.fetch_add(1, Ordering::Relaxed));
        self.handlers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((token, Arc::new(handler)));
        token
    }

    /// Remove a subscriber
    ///
    /// Returns false if the token was unknown (already removed).
    pub fn unsubscribe(&self, token: SubscriptionToken) -> bool {
        let mut handlers = self.handlers.lock().unwrap_or_else(|e| e.into_inner());
        let before = handlers.len();
        handlers.retain(|(t, _)| *t != token);
        handlers.len() != before
    }

    /// Number of current subscribers
    pub fn len(&self) -> usize {
        self.handlers.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver a change to every subscriber
    ///
    /// The subscriber list is snapshotted first and the lock released, so a
    /// handler may subscribe, unsubscribe or write to the registry.
    pub fn notify(&self, change: &ParameterChange) {
        let snapshot: Vec<Handler> = self
            .handlers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(_, handler)| handler.clone())
            .collect();

        for handler in snapshot {
            match catch_unwind(AssertUnwindSafe(|| handler(change))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    log::debug!("OSC: Change handler for '{}' failed: {}", change.address, e);
                }
                Err(_) => {
                    log::debug!("OSC: Change handler for '{}' panicked", change.address);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn change(value: i32) -> ParameterChange {
        ParameterChange {
            address: "/avatar/parameters/TestParam".to_string(),
            old_value: None,
            new_value: ParameterValue::Int32(value),
        }
    }

    #[test]
    fn test_subscription_order() {
        let dispatcher = ChangeDispatcher::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for id in 0..3 {
            let order = order.clone();
            dispatcher.subscribe(move |_| {
                order.lock().unwrap().push(id);
                Ok(())
            });
        }

        dispatcher.notify(&change(1));
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_failing_handler_is_isolated() {
        let dispatcher = ChangeDispatcher::new();
        let failures = Arc::new(AtomicUsize::new(0));
        let calls = Arc::new(AtomicUsize::new(0));

        let f = failures.clone();
        dispatcher.subscribe(move |_| {
            f.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("handler failure")
        });
        let c = calls.clone();
        dispatcher.subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        dispatcher.notify(&change(1));
        dispatcher.notify(&change(2));

        // The failing handler stays subscribed and is called every time
        assert_eq!(failures.load(Ordering::SeqCst), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(dispatcher.len(), 2);
    }

    #[test]
    fn test_panicking_handler_is_isolated() {
        let dispatcher = ChangeDispatcher::new();
        let calls = Arc::new(AtomicUsize::new(0));

        dispatcher.subscribe(|_| panic!("boom"));
        let c = calls.clone();
        dispatcher.subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        dispatcher.notify(&change(1));
        dispatcher.notify(&change(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unsubscribe() {
        let dispatcher = ChangeDispatcher::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let c = calls.clone();
        let token = dispatcher.subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        dispatcher.notify(&change(1));
        assert!(dispatcher.unsubscribe(token));
        assert!(!dispatcher.unsubscribe(token));
        dispatcher.notify(&change(2));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(dispatcher.is_empty());
    }

    #[test]
    fn test_handler_can_reenter_dispatcher() {
        let dispatcher = Arc::new(ChangeDispatcher::new());
        let inner = dispatcher.clone();
        dispatcher.subscribe(move |_| {
            inner.subscribe(|_| Ok(()));
            Ok(())
        });

        dispatcher.notify(&change(1));
        assert_eq!(dispatcher.len(), 2);
    }
}
