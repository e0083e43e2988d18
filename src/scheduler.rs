//! Refresh scheduling.
//!
//! A refresh cycle resolves the internal address inline, then hands the
//! external lookup to a detached runtime task. At most one cycle is in flight:
//! triggers that arrive while a cycle is running are dropped, not queued, so
//! the periodic timer and user actions can never pile up work.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Local;
use futures::FutureExt;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::resolver::{Address, Resolver};
use crate::state::SharedIpState;

struct Inner<R> {
    resolver: R,
    state: SharedIpState,
    /// `false` = Idle, `true` = Refreshing
    refreshing: AtomicBool,
    runtime: Handle,
    periodic: Mutex<Option<JoinHandle<()>>>,
}

/// Owns refresh timing and the Idle/Refreshing cycle state
pub struct RefreshScheduler<R: Resolver> {
    inner: Arc<Inner<R>>,
}

impl<R: Resolver> Clone for RefreshScheduler<R> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<R: Resolver> RefreshScheduler<R> {
    /// Create a scheduler that spawns lookups on `runtime`
    pub fn new(resolver: R, state: SharedIpState, runtime: Handle) -> Self {
        Self {
            inner: Arc::new(Inner {
                resolver,
                state,
                refreshing: AtomicBool::new(false),
                runtime,
                periodic: Mutex::new(None),
            }),
        }
    }

    /// Start a refresh cycle unless one is already running.
    ///
    /// Safe to call from any thread. Returns the handle of the background half
    /// of the cycle when a new cycle was started; dropping it detaches the task.
    pub fn trigger_refresh(&self) -> Option<JoinHandle<()>> {
        if self
            .inner
            .refreshing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Refresh already in progress, ignoring trigger");
            return None;
        }

        let state = &self.inner.state;
        state.begin_refresh();

        let internal = std::panic::catch_unwind(AssertUnwindSafe(|| {
            self.inner.resolver.resolve_internal()
        }))
        .unwrap_or_else(|_| {
            tracing::error!("Internal lookup panicked");
            Address::Unavailable
        });
        state.publish_internal(internal);

        let inner = self.inner.clone();
        Some(self.inner.runtime.spawn(async move {
            let external = AssertUnwindSafe(inner.resolver.resolve_external())
                .catch_unwind()
                .await
                .unwrap_or_else(|_| {
                    tracing::error!("External lookup panicked");
                    Address::Unavailable
                });

            inner.state.publish_external(external);
            inner.state.finish_refresh(Local::now());
            inner.refreshing.store(false, Ordering::Release);

            tracing::info!("Refresh complete: {}", inner.state.snapshot().summary());
        }))
    }

    /// Refresh now, then every `interval` until `shutdown`.
    ///
    /// Ticks that fall while a cycle is still running are ignored; late ticks
    /// are delayed rather than fired in a burst.
    pub fn start_periodic(&self, interval: Duration) {
        let scheduler = self.clone();
        let task = self.inner.runtime.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                // The internal lookup blocks on the OS resolver
                let scheduler = scheduler.clone();
                let started =
                    tokio::task::spawn_blocking(move || scheduler.trigger_refresh()).await;
                if let Err(e) = started {
                    tracing::error!("Periodic refresh failed to start: {}", e);
                }
            }
        });

        tracing::info!("Refreshing every {}s", interval.as_secs());

        let previous = self
            .inner
            .periodic
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(task);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Stop the periodic timer. An in-flight lookup is left to finish or be
    /// dropped with the runtime; nothing waits for it.
    pub fn shutdown(&self) {
        let periodic = self
            .inner
            .periodic
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = periodic {
            task.abort();
            tracing::debug!("Periodic refresh stopped");
        }
    }
}
