use crossbeam_channel::{bounded, unbounded};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::coordinator::ProgressCoordinator;
use super::matcher::SearchPattern;
use super::planner::plan_batches;
use super::queue::WorkQueue;
use super::state::ScanState;
use super::worker::{ScanContext, ScanWorker};
use crate::collector::MatchCollector;
use crate::config::SearchConfig;
use crate::content::{ContentSource, DocumentRegistry, LocalContentSource};
use crate::errors::SearchError;
use crate::file::FileHandle;
use crate::metrics::ScanMetrics;
use crate::progress::{NullProgressMonitor, ProgressMonitor};
use crate::results::{ScanOutcome, SearchStatus, StatusEntry};
use crate::scope::SearchScope;

const FILE_SEARCH_TASK: &str = "Searching for files";

/// Prefix of every scan worker thread's name.
///
/// A panic while matching is caught and reported as a fatal status entry, but it still
/// passes through the process panic hook first. Front ends that print the status can use
/// this prefix to keep such panics out of their own output.
pub const WORKER_THREAD_PREFIX: &str = "textscout-worker-";

/// Runs text searches over lists of files.
///
/// One engine can run any number of searches, one after another or concurrently; each call
/// to [`TextSearchEngine::search`] builds its own worker pool and shares nothing with other
/// calls except the collector, the content source and the cumulative [`ScanMetrics`].
pub struct TextSearchEngine {
    collector: Arc<dyn MatchCollector>,
    pattern: SearchPattern,
    config: SearchConfig,
    source: Arc<dyn ContentSource>,
    documents: DocumentRegistry,
    custom_source: bool,
    metrics: ScanMetrics,
}

/// Runs the end-of-scan bookkeeping on every exit path
struct ScanFinish<'a> {
    queue: &'a WorkQueue,
    state: &'a ScanState,
    monitor: &'a dyn ProgressMonitor,
    collector: &'a dyn MatchCollector,
    metrics: &'a ScanMetrics,
    workers: usize,
    started: Instant,
}

impl Drop for ScanFinish<'_> {
    fn drop(&mut self) {
        self.queue.clear();
        self.monitor.done();
        self.collector.end_reporting();
        info!(
            "Scanned {} of {} files with {} workers in {}",
            self.state.scanned(),
            self.state.files_to_scan(),
            self.workers,
            humantime::format_duration(self.started.elapsed())
        );
        self.metrics.log_stats();
    }
}

impl TextSearchEngine {
    /// Creates an engine reading files from disk with the default configuration.
    pub fn new(collector: Arc<dyn MatchCollector>, pattern: SearchPattern) -> Self {
        let config = SearchConfig::default();
        let documents = DocumentRegistry::new();
        Self {
            collector,
            pattern,
            source: Arc::new(LocalContentSource::with_documents(&config, documents.clone())),
            documents,
            custom_source: false,
            config,
            metrics: ScanMetrics::new(),
        }
    }

    /// Replaces the configuration. The built-in local source is rebuilt from it; a source
    /// set with [`TextSearchEngine::with_content_source`] is kept as is.
    pub fn with_config(mut self, config: SearchConfig) -> Self {
        self.config = config;
        if !self.custom_source {
            self.rebuild_local_source();
        }
        self
    }

    /// Reads from disk, but lets the open documents in `documents` win over file content.
    pub fn with_documents(mut self, documents: DocumentRegistry) -> Self {
        self.documents = documents;
        self.custom_source = false;
        self.rebuild_local_source();
        self
    }

    pub fn with_content_source(mut self, source: Arc<dyn ContentSource>) -> Self {
        self.source = source;
        self.custom_source = true;
        self
    }

    fn rebuild_local_source(&mut self) {
        self.source = Arc::new(LocalContentSource::with_documents(
            &self.config,
            self.documents.clone(),
        ));
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn pattern(&self) -> &SearchPattern {
        &self.pattern
    }

    /// Counters accumulated over every search run by this engine.
    pub fn metrics(&self) -> &ScanMetrics {
        &self.metrics
    }

    /// Searches the files that `scope` yields. Problems found while evaluating the scope are
    /// returned alongside the search's own.
    pub fn search_scope(
        &self,
        scope: &dyn SearchScope,
        monitor: Option<&dyn ProgressMonitor>,
    ) -> SearchStatus {
        let mut status = SearchStatus::new();
        let files = scope.evaluate_files_in_scope(&mut status);
        status.merge(self.search(&files, monitor));
        status
    }

    /// Searches `files` and blocks until the search completed, was cancelled through
    /// `monitor`, or aborted.
    ///
    /// Matches are delivered to the collector while the search runs. The returned status
    /// holds every problem found and how the search ended.
    pub fn search(&self, files: &[FileHandle], monitor: Option<&dyn ProgressMonitor>) -> SearchStatus {
        if files.is_empty() {
            debug!("No files to search");
            return SearchStatus::new();
        }

        let null_monitor = NullProgressMonitor;
        let monitor = monitor.unwrap_or(&null_monitor);
        let workers = self.worker_count(files.len());
        info!(
            "Searching {} files for '{}' with {} workers",
            files.len(),
            self.pattern.as_str(),
            workers
        );

        let task_name = if self.pattern.is_empty() {
            FILE_SEARCH_TASK
        } else {
            ""
        };
        monitor.begin_task(task_name, files.len());

        let queue = WorkQueue::new();
        let state = ScanState::new(files.len());
        let _finish = ScanFinish {
            queue: &queue,
            state: &state,
            monitor,
            collector: &*self.collector,
            metrics: &self.metrics,
            workers,
            started: Instant::now(),
        };
        self.collector.begin_reporting();

        if !monitor.is_cancelled() {
            queue.push_all(plan_batches(files));
        }
        debug!("Queued {} batches", queue.len());

        let ctx = ScanContext {
            state: &state,
            queue: &queue,
            collector: &*self.collector,
            source: &*self.source,
            pattern: &self.pattern,
            metrics: &self.metrics,
            lightweight_auto_refresh: self.config.lightweight_auto_refresh,
        };
        let entries = self.run_scan(ctx, monitor, workers);

        let mut status = SearchStatus::new();
        status.files_to_scan = files.len();
        status.extend(entries);
        status.files_scanned = state.scanned();

        let outcome = if state.caller_cancelled() || monitor.is_cancelled() {
            ScanOutcome::Cancelled
        } else if status.fatal_entries().next().is_some() {
            ScanOutcome::FatalAborted
        } else {
            ScanOutcome::Completed
        };
        status.set_outcome(outcome);
        status
    }

    /// Workers for a scan of `file_count` files.
    ///
    /// One thread of the budget goes to the progress coordinator when the collector can take
    /// concurrent calls; otherwise a single worker keeps every collector call on one thread.
    fn worker_count(&self, file_count: usize) -> usize {
        let threads = file_count.min(self.config.thread_count.get());
        let workers = if self.collector.can_run_in_parallel() && threads > 1 {
            threads - 1
        } else {
            1
        };
        debug!(
            "Using {} workers ({} threads, parallel collector: {})",
            workers,
            threads,
            self.collector.can_run_in_parallel()
        );
        workers
    }

    /// Runs the coordinator and the workers, returning the workers' entries once both stopped.
    fn run_scan(
        &self,
        ctx: ScanContext<'_>,
        monitor: &dyn ProgressMonitor,
        workers: usize,
    ) -> Vec<StatusEntry> {
        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);
        let interval = self.config.progress_interval();

        thread::scope(|s| {
            let coordinator = thread::Builder::new()
                .name("textscout-progress".to_string())
                .spawn_scoped(s, move || {
                    ProgressCoordinator::new(ctx.state, monitor, interval, shutdown_rx).run()
                });
            if let Err(e) = &coordinator {
                warn!("Could not start progress thread, cancellation is unavailable: {}", e);
            }

            let entries = run_workers(ctx, workers);

            drop(shutdown_tx);
            if let Ok(handle) = coordinator {
                if handle.join().is_err() {
                    warn!("Progress thread panicked");
                }
            }
            entries
        })
    }
}

/// Runs `workers` scan workers on a dedicated pool until the queue is drained.
///
/// Every worker keeps taking batches after individual failures; only the fatal flag stops them.
fn run_workers(ctx: ScanContext<'_>, workers: usize) -> Vec<StatusEntry> {
    let pool = match rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("{}{}", WORKER_THREAD_PREFIX, i))
        .build()
    {
        Ok(pool) => pool,
        Err(e) => {
            return vec![StatusEntry::error(
                format!("Could not start search workers: {}", e),
                SearchError::IoError(std::io::Error::other(e)),
            )]
        }
    };

    let (tx, rx) = unbounded();
    pool.scope(|scope| {
        for id in 0..workers {
            let tx = tx.clone();
            scope.spawn(move |_| {
                let entries = ScanWorker::new(id, ctx).run();
                // The receiver outlives the pool scope
                let _ = tx.send(entries);
            });
        }
    });
    drop(tx);

    rx.into_iter().flatten().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::CancellationMonitor;
    use std::num::NonZeroUsize;

    struct ParallelCollector(bool);

    impl MatchCollector for ParallelCollector {
        fn can_run_in_parallel(&self) -> bool {
            self.0
        }
    }

    fn engine(parallel: bool, threads: usize) -> TextSearchEngine {
        TextSearchEngine::new(
            Arc::new(ParallelCollector(parallel)),
            SearchPattern::new("x").unwrap(),
        )
        .with_config(SearchConfig {
            thread_count: NonZeroUsize::new(threads).unwrap(),
            ..SearchConfig::default()
        })
    }

    #[test]
    fn test_worker_count() {
        assert_eq!(engine(true, 8).worker_count(100), 7);
        assert_eq!(engine(true, 8).worker_count(3), 2);
        assert_eq!(engine(true, 8).worker_count(1), 1);
        assert_eq!(engine(true, 1).worker_count(100), 1);
        assert_eq!(engine(false, 8).worker_count(100), 1);
    }

    #[test]
    fn test_empty_input_is_ok() {
        let status = engine(true, 4).search(&[], None);
        assert!(status.is_ok());
        assert_eq!(status.files_to_scan, 0);
        assert_eq!(status.outcome(), ScanOutcome::Completed);
    }

    #[test]
    fn test_pre_cancelled_search_scans_nothing() {
        let monitor = CancellationMonitor::new();
        monitor.cancel();
        let files = vec![
            FileHandle::from_path("/never/a.txt"),
            FileHandle::from_path("/never/b.txt"),
        ];

        let status = engine(true, 4).search(&files, Some(&monitor));
        assert!(status.is_cancelled());
        assert!(status.entries().is_empty());
        assert_eq!(status.files_scanned, 0);
        assert_eq!(status.files_to_scan, 2);
    }

    #[test]
    fn test_local_source_follows_config_in_any_builder_order() {
        let config = SearchConfig {
            buffer_size: 512,
            ..SearchConfig::default()
        };
        let documents = DocumentRegistry::new();
        documents.open(FileHandle::from_path("/open/doc.txt"), "x");

        let documents_first = engine(true, 2)
            .with_documents(documents.clone())
            .with_config(config.clone());
        let config_first = engine(true, 2)
            .with_config(config)
            .with_documents(documents);

        for engine in [documents_first, config_first] {
            assert_eq!(engine.source.buffer_size(), 512);
            assert!(engine
                .source
                .open_document(&FileHandle::from_path("/open/doc.txt"))
                .is_some());
        }
    }

    #[test]
    fn test_custom_source_survives_config_change() {
        let custom: Arc<dyn ContentSource> =
            Arc::new(LocalContentSource::new(&SearchConfig::default()));
        let engine = engine(true, 2)
            .with_content_source(Arc::clone(&custom))
            .with_config(SearchConfig {
                buffer_size: 512,
                ..SearchConfig::default()
            });
        assert!(Arc::ptr_eq(&engine.source, &custom));
    }
}
