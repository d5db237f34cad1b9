//! Shared resource-release scope
//!
//! Connections register a release action when they acquire a transport.
//! Closing the scope drains the actions in reverse acquisition order. Every
//! action runs even if an earlier one failed, and the drain happens once.
//! A resource dropped before close (a removed server) is released early
//! through its key or label and leaves the scope.

use std::future::Future;

use futures::future::BoxFuture;
use futures::FutureExt;
use mcpcomposer_core::{Error, Result};
use parking_lot::Mutex;
use tracing::{debug, warn};

type ReleaseAction = Box<dyn FnOnce() -> BoxFuture<'static, anyhow::Result<()>> + Send>;

/// Handle to a single registered release action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceKey(u64);

struct ScopeEntry {
    key: ResourceKey,
    label: String,
    release: ReleaseAction,
}

#[derive(Default)]
struct ScopeInner {
    entries: Vec<ScopeEntry>,
    next_key: u64,
    closed: bool,
}

/// Outcome of closing a [`ResourceScope`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseReport {
    /// Actions that completed successfully
    pub released: usize,
    /// `(label, error)` for actions that failed
    pub failures: Vec<(String, String)>,
}

impl ReleaseReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Ordered list of release actions executed LIFO on close
#[derive(Default)]
pub struct ResourceScope {
    inner: Mutex<ScopeInner>,
}

impl ResourceScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a release action. Fails once the scope is closed; the caller
    /// still owns the resource in that case.
    pub fn push<F, Fut>(&self, label: impl Into<String>, release: F) -> Result<ResourceKey>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let label = label.into();
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(Error::invalid_state("register a resource", "the scope is closed"));
        }
        let key = ResourceKey(inner.next_key);
        inner.next_key += 1;
        debug!(resource = %label, depth = inner.entries.len() + 1, "Resource registered");
        inner.entries.push(ScopeEntry {
            key,
            label,
            release: Box::new(move || release().boxed()),
        });
        Ok(key)
    }

    /// Run one action now and drop it from the scope.
    ///
    /// Returns `None` if the key was already released or the scope is closed.
    pub async fn release(&self, key: ResourceKey) -> Option<anyhow::Result<()>> {
        let entry = {
            let mut inner = self.inner.lock();
            let position = inner.entries.iter().position(|e| e.key == key)?;
            inner.entries.remove(position)
        };
        let label = entry.label.clone();
        let outcome = (entry.release)().await;
        match &outcome {
            Ok(()) => debug!(resource = %label, "Resource released early"),
            Err(e) => {
                warn!(resource = %label, error = %format!("{:#}", e), "Failed to release resource")
            }
        }
        Some(outcome)
    }

    /// Release every action registered under `label`, newest first
    pub async fn release_labeled(&self, label: &str) -> ReleaseReport {
        let entries = {
            let mut inner = self.inner.lock();
            let (matching, rest): (Vec<ScopeEntry>, Vec<ScopeEntry>) = std::mem::take(&mut inner.entries)
                .into_iter()
                .partition(|e| e.label == label);
            inner.entries = rest;
            matching
        };
        run_release(entries).await
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Release every tracked resource, newest first.
    ///
    /// Only the first call does any work; later calls return an empty report.
    pub async fn close(&self) -> ReleaseReport {
        let entries = {
            let mut inner = self.inner.lock();
            if inner.closed {
                return ReleaseReport::default();
            }
            inner.closed = true;
            std::mem::take(&mut inner.entries)
        };

        run_release(entries).await
    }
}

/// Run `entries` newest first, continuing past failures
async fn run_release(entries: Vec<ScopeEntry>) -> ReleaseReport {
    let mut report = ReleaseReport::default();
    for entry in entries.into_iter().rev() {
        match (entry.release)().await {
            Ok(()) => {
                debug!(resource = %entry.label, "Resource released");
                report.released += 1;
            }
            Err(e) => {
                warn!(resource = %entry.label, error = %format!("{:#}", e), "Failed to release resource");
                report.failures.push((entry.label, format!("{:#}", e)));
            }
        }
    }
    report
}

impl Drop for ResourceScope {
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        if !inner.closed && !inner.entries.is_empty() {
            warn!(
                pending = inner.entries.len(),
                "Resource scope dropped without being closed"
            );
        }
    }
}
