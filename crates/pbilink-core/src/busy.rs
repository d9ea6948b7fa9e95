//! Busy indicator bookkeeping.
//!
//! Every authentication or network exchange holds a `BusyGuard` for its
//! duration. The indicator counts outstanding guards and tells its
//! `BusyObserver` when the app goes from idle to busy and back. Guards release
//! on drop, so an error path or a dropped future never leaves the indicator
//! stuck on.

use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

/// UI binding for the busy flag (e.g. a spinner or `IsBusy` property).
///
/// Called with the counter lock held: implementations must not call back into
/// the `BusyIndicator`, and should hand the work off to their UI thread.
pub trait BusyObserver: Send + Sync {
    fn on_busy_changed(&self, busy: bool);
}

/// Observer for hosts that don't display a busy state
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl BusyObserver for NoopObserver {
    fn on_busy_changed(&self, _busy: bool) {}
}

pub struct BusyIndicator {
    count: Mutex<usize>,
    observer: Arc<dyn BusyObserver>,
}

impl BusyIndicator {
    pub fn new(observer: Arc<dyn BusyObserver>) -> Self {
        Self {
            count: Mutex::new(0),
            observer,
        }
    }

    /// Mark one operation as started
    pub fn begin(&self) {
        let mut count = self.count.lock().unwrap_or_else(|e| e.into_inner());
        *count += 1;
        debug!(count = *count, "Busy count incremented");
        if *count == 1 {
            self.observer.on_busy_changed(true);
        }
    }

    /// Mark one operation as finished. The count is clamped at zero.
    pub fn end(&self) {
        let mut count = self.count.lock().unwrap_or_else(|e| e.into_inner());
        if *count == 0 {
            warn!("Busy count decremented while already idle");
            return;
        }
        *count -= 1;
        debug!(count = *count, "Busy count decremented");
        if *count == 0 {
            self.observer.on_busy_changed(false);
        }
    }

    /// Begin an operation that ends when the returned guard is dropped
    pub fn guard(&self) -> BusyGuard<'_> {
        self.begin();
        BusyGuard { indicator: self }
    }

    pub fn count(&self) -> usize {
        *self.count.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_busy(&self) -> bool {
        self.count() > 0
    }
}

impl Default for BusyIndicator {
    fn default() -> Self {
        Self::new(Arc::new(NoopObserver))
    }
}

impl std::fmt::Debug for BusyIndicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusyIndicator")
            .field("count", &self.count())
            .finish()
    }
}

#[must_use = "the operation ends as soon as the guard is dropped"]
pub struct BusyGuard<'a> {
    indicator: &'a BusyIndicator,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.indicator.end();
    }
}
