//! Shared "current IP" state
//!
//! `SharedIpState` is the only mutable value shared between the UI thread, the
//! tray thread and the runtime workers. Publishes are serialized by a dedicated
//! lock so observers see changes in exactly the order they were made, even when
//! two threads publish back to back.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Local};

use crate::resolver::Address;
use crate::state::StateChange;

/// Snapshot of the last known addresses
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IpState {
    /// `None` until the first lookup has completed
    pub internal: Option<Address>,
    pub external: Option<Address>,
    /// Completion time of the last finished refresh cycle
    pub last_updated: Option<DateTime<Local>>,
    /// A refresh cycle is in flight
    pub refreshing: bool,
}

impl IpState {
    /// Status line shown under the addresses
    pub fn status_text(&self) -> String {
        if self.refreshing {
            "Refreshing...".to_string()
        } else if let Some(at) = self.last_updated {
            format!("Last update: {}", at.format("%H:%M:%S"))
        } else {
            "Checking...".to_string()
        }
    }

    /// One-line summary used for the tray tooltip and menu label
    pub fn summary(&self) -> String {
        format!(
            "Internal IP: {} / External IP: {}",
            display_address(self.internal),
            display_address(self.external)
        )
    }
}

/// Render an address field, with a placeholder before the first lookup
pub fn display_address(address: Option<Address>) -> String {
    address
        .map(|a| a.to_string())
        .unwrap_or_else(|| "--".to_string())
}

type Observer = Box<dyn Fn(StateChange, &IpState) + Send + Sync>;

struct Inner {
    state: Mutex<IpState>,
    /// Held for the whole publish-and-notify sequence
    publish: Mutex<()>,
    observers: Mutex<Vec<Observer>>,
}

/// Thread-safe owner of the process-wide `IpState`
#[derive(Clone)]
pub struct SharedIpState {
    inner: Arc<Inner>,
}

impl Default for SharedIpState {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SharedIpState {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(IpState::default()),
                publish: Mutex::new(()),
                observers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Consistent copy of all fields at one instant
    pub fn snapshot(&self) -> IpState {
        lock(&self.inner.state).clone()
    }

    /// Register an observer called after every publish.
    ///
    /// Observers run on the publishing thread. They may call `snapshot()` but
    /// must not publish.
    pub fn subscribe<F>(&self, observer: F)
    where
        F: Fn(StateChange, &IpState) + Send + Sync + 'static,
    {
        lock(&self.inner.observers).push(Box::new(observer));
    }

    pub fn begin_refresh(&self) {
        self.publish(StateChange::RefreshStarted, |state| state.refreshing = true);
    }

    pub fn publish_internal(&self, address: Address) {
        self.publish(StateChange::Internal, |state| {
            state.internal = Some(address);
        });
    }

    pub fn publish_external(&self, address: Address) {
        self.publish(StateChange::External, |state| {
            state.external = Some(address);
        });
    }

    pub fn finish_refresh(&self, at: DateTime<Local>) {
        self.publish(StateChange::RefreshFinished, |state| {
            state.last_updated = Some(at);
            state.refreshing = false;
        });
    }

    fn publish(&self, change: StateChange, apply: impl FnOnce(&mut IpState)) {
        let _order = lock(&self.inner.publish);

        let snapshot = {
            let mut state = lock(&self.inner.state);
            apply(&mut state);
            state.clone()
        };

        for observer in lock(&self.inner.observers).iter() {
            observer(change, &snapshot);
        }
    }
}
