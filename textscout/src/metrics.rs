use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

/// Counters shared by every worker of a search
#[derive(Debug, Clone)]
pub struct ScanMetrics {
    batches_processed: Arc<AtomicU64>,
    files_scanned: Arc<AtomicU64>,
    duplicates_replayed: Arc<AtomicU64>,
    matches_reported: Arc<AtomicU64>,
    binary_files_skipped: Arc<AtomicU64>,
    failed_files: Arc<AtomicU64>,
}

impl ScanMetrics {
    /// Creates a new ScanMetrics instance
    pub fn new() -> Self {
        Self {
            batches_processed: Arc::new(AtomicU64::new(0)),
            files_scanned: Arc::new(AtomicU64::new(0)),
            duplicates_replayed: Arc::new(AtomicU64::new(0)),
            matches_reported: Arc::new(AtomicU64::new(0)),
            binary_files_skipped: Arc::new(AtomicU64::new(0)),
            failed_files: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Records one finished batch covering `files` files
    pub fn record_batch(&self, files: usize) {
        self.batches_processed.fetch_add(1, Ordering::Relaxed);
        self.files_scanned.fetch_add(files as u64, Ordering::Relaxed);
    }

    pub fn record_duplicate(&self) {
        self.duplicates_replayed.fetch_add(1, Ordering::Relaxed);
    }

    /// Records matches handed to the collector
    pub fn record_matches(&self, count: usize) {
        self.matches_reported
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_binary_skip(&self) {
        self.binary_files_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failed_files.fetch_add(1, Ordering::Relaxed);
    }

    /// Gets current statistics
    pub fn get_stats(&self) -> ScanStats {
        ScanStats {
            batches_processed: self.batches_processed.load(Ordering::Relaxed),
            files_scanned: self.files_scanned.load(Ordering::Relaxed),
            duplicates_replayed: self.duplicates_replayed.load(Ordering::Relaxed),
            matches_reported: self.matches_reported.load(Ordering::Relaxed),
            binary_files_skipped: self.binary_files_skipped.load(Ordering::Relaxed),
            failed_files: self.failed_files.load(Ordering::Relaxed),
        }
    }

    /// Logs current statistics
    pub fn log_stats(&self) {
        let stats = self.get_stats();
        info!(
            "Scan stats:\n\
             Batches processed: {}\n\
             Files scanned: {}\n\
             Duplicates replayed: {}\n\
             Matches reported: {}\n\
             Binary files skipped: {}\n\
             Failed files: {}",
            stats.batches_processed,
            stats.files_scanned,
            stats.duplicates_replayed,
            stats.matches_reported,
            stats.binary_files_skipped,
            stats.failed_files
        );
    }
}

impl Default for ScanMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`ScanMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub batches_processed: u64,
    pub files_scanned: u64,
    pub duplicates_replayed: u64,
    pub matches_reported: u64,
    pub binary_files_skipped: u64,
    pub failed_files: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_tracking() {
        let metrics = ScanMetrics::new();

        metrics.record_batch(1);
        metrics.record_batch(3);
        let stats = metrics.get_stats();
        assert_eq!(stats.batches_processed, 2);
        assert_eq!(stats.files_scanned, 4);
    }

    #[test]
    fn test_clones_share_counters() {
        let metrics = ScanMetrics::new();
        let worker_view = metrics.clone();

        worker_view.record_matches(5);
        worker_view.record_duplicate();
        worker_view.record_binary_skip();
        worker_view.record_failure();

        let stats = metrics.get_stats();
        assert_eq!(stats.matches_reported, 5);
        assert_eq!(stats.duplicates_replayed, 1);
        assert_eq!(stats.binary_files_skipped, 1);
        assert_eq!(stats.failed_files, 1);
    }
}
