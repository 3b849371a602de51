//! Progress reporting and caller-side cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Receives progress from a running search and tells it whether to stop.
///
/// All methods are called from the engine's progress thread and from the calling thread,
/// never from scan workers.
pub trait ProgressMonitor: Send + Sync {
    fn begin_task(&self, _name: &str, _total_work: usize) {}

    fn sub_task(&self, _name: &str) {}

    /// Advances the completed-work counter by `work` units.
    fn worked(&self, _work: usize) {}

    fn done(&self) {}

    fn is_cancelled(&self) -> bool {
        false
    }
}

/// A monitor that ignores everything and is never cancelled
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgressMonitor;

impl ProgressMonitor for NullProgressMonitor {}

/// A monitor that only carries a cancellation flag.
///
/// Clones share the flag, so one clone can be handed to a signal handler while another is
/// passed to the search.
#[derive(Debug, Default, Clone)]
pub struct CancellationMonitor {
    cancelled: Arc<AtomicBool>,
}

impl CancellationMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

impl ProgressMonitor for CancellationMonitor {
    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_cancellation() {
        let monitor = CancellationMonitor::new();
        let handle = monitor.clone();
        assert!(!monitor.is_cancelled());

        handle.cancel();
        assert!(monitor.is_cancelled());
    }

    #[test]
    fn test_null_monitor_never_cancels() {
        let monitor = NullProgressMonitor;
        monitor.begin_task("task", 10);
        monitor.worked(3);
        assert!(!monitor.is_cancelled());
    }
}
