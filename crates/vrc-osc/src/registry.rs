//! Last-known parameter values shared between the receive thread and the app
//!
//! The OSC receive thread writes every inbound value here, application code
//! reads it from its own threads. Both reference the registry via
//! `Arc<ParameterRegistry>`.

use crate::dispatch::{ChangeDispatcher, ParameterChange, SubscriptionToken};
use crate::types::ParameterValue;
use std::collections::HashMap;
use std::sync::{Condvar, Mutex, RwLock};
use std::thread::{self, ThreadId};

/// Map from OSC address to the most recent value seen for it
#[derive(Default)]
pub struct ParameterRegistry {
    values: RwLock<HashMap<String, ParameterValue>>,
    order: AddressGate,
    dispatcher: ChangeDispatcher,
}

impl ParameterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value and notify subscribers
    ///
    /// Writers of the same address take turns: each one swaps its value in
    /// and finishes notifying before the next starts, so subscribers see a
    /// chain where every `old_value` is the previous `new_value`. The map
    /// lock itself is released before subscribers run. A subscriber may
    /// update the same address again from its own thread.
    pub fn update(&self, address: impl Into<String>, value: ParameterValue) {
        let address = address.into();
        let _turn = self.order.enter(&address);

        let old_value = self
            .values
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(address.clone(), value.clone());

        self.dispatcher.notify(&ParameterChange {
            address,
            old_value,
            new_value: value,
        });
    }

    /// Current value for an address
    pub fn get(&self, address: &str) -> Option<ParameterValue> {
        self.values
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(address)
            .cloned()
    }

    pub fn contains(&self, address: &str) -> bool {
        self.values
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(address)
    }

    /// Forget one address without notifying subscribers
    pub fn remove(&self, address: &str) -> Option<ParameterValue> {
        self.values
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(address)
    }

    /// Forget every address; subscriptions are kept
    pub fn clear(&self) {
        self.values.write().unwrap_or_else(|e| e.into_inner()).clear();
    }

    pub fn len(&self) -> usize {
        self.values.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of every entry
    pub fn snapshot(&self) -> HashMap<String, ParameterValue> {
        self.values.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Subscribe to every change, see [`ChangeDispatcher::subscribe`]
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionToken
    where
        F: Fn(&ParameterChange) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.dispatcher.subscribe(handler)
    }

    pub fn unsubscribe(&self, token: SubscriptionToken) -> bool {
        self.dispatcher.unsubscribe(token)
    }
}

/// Per-address turn-taking for writers, re-entrant on the owning thread
#[derive(Default)]
struct AddressGate {
    /// Address → (owning thread, nesting depth)
    owners: Mutex<HashMap<String, (ThreadId, usize)>>,
    released: Condvar,
}

impl AddressGate {
    fn enter(&self, address: &str) -> AddressTurn<'_> {
        let current = thread::current().id();
        let mut owners = self.owners.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            match owners.get(address).map(|(owner, _)| *owner == current) {
                None => {
                    owners.insert(address.to_string(), (current, 1));
                    break;
                }
                Some(true) => {
                    if let Some((_, depth)) = owners.get_mut(address) {
                        *depth += 1;
                    }
                    break;
                }
                Some(false) => {
                    owners = self
                        .released
                        .wait(owners)
                        .unwrap_or_else(|e| e.into_inner());
                }
            }
        }
        AddressTurn {
            gate: self,
            address: address.to_string(),
        }
    }
}

/// Held while one writer applies and dispatches its update
struct AddressTurn<'a> {
    gate: &'a AddressGate,
    address: String,
}

impl Drop for AddressTurn<'_> {
    fn drop(&mut self) {
        let mut owners = self.gate.owners.lock().unwrap_or_else(|e| e.into_inner());
        let finished = match owners.get_mut(&self.address) {
            Some((_, depth)) => {
                *depth -= 1;
                *depth == 0
            }
            None => false,
        };
        if finished {
            owners.remove(&self.address);
            drop(owners);
            self.gate.released.notify_all();
        }
    }
}
