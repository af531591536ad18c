//! Delayed work on the bridge's runtime
//!
//! Tasks are spawned through a [`Handle`] captured when the bridge is
//! installed, so page operations that schedule work may run on any thread.

use crate::lock;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// A delayed action where each new request replaces the pending one
///
/// Scheduling aborts whatever has not fired yet, so a burst of requests
/// collapses into a single run after the last delay elapses.
#[derive(Debug)]
pub struct Debouncer {
    runtime: Handle,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl Debouncer {
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            pending: Mutex::new(None),
        }
    }

    /// Run `action` after `delay`, cancelling any earlier request
    pub fn schedule<F>(&self, delay: Duration, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            action.await;
        });

        if let Some(previous) = lock(&self.pending).replace(handle) {
            previous.abort();
        }
    }

    /// Drop the pending request, if any
    pub fn cancel(&self) {
        if let Some(handle) = lock(&self.pending).take() {
            handle.abort();
        }
    }

    /// Whether a request is waiting to fire
    pub fn is_pending(&self) -> bool {
        lock(&self.pending).as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Run `action` once after `delay` without any cancellation handle
pub fn run_after<F>(runtime: &Handle, delay: Duration, action: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    runtime.spawn(async move {
        tokio::time::sleep(delay).await;
        action.await;
    });
}
