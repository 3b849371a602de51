use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{trace, warn};

use super::matcher::{locate_matches, MatchRecord, SearchPattern};
use super::planner::FileBatch;
use super::queue::WorkQueue;
use super::state::ScanState;
use crate::collector::MatchCollector;
use crate::content::{has_binary_content, ContentSource, FileContent};
use crate::errors::{SearchError, SearchResult};
use crate::file::FileHandle;
use crate::metrics::ScanMetrics;
use crate::results::StatusEntry;

/// Everything a worker needs, borrowed from the engine for the duration of one scan
#[derive(Clone, Copy)]
pub(crate) struct ScanContext<'a> {
    pub state: &'a ScanState,
    pub queue: &'a WorkQueue,
    pub collector: &'a dyn MatchCollector,
    pub source: &'a dyn ContentSource,
    pub pattern: &'a SearchPattern,
    pub metrics: &'a ScanMetrics,
    pub lightweight_auto_refresh: bool,
}

/// How one batch ended
#[derive(Debug)]
enum BatchStatus {
    Ok,
    Cancelled,
    Failed(StatusEntry),
}

/// Counts a batch as scanned however its processing ends
struct BatchGuard<'a> {
    state: &'a ScanState,
    metrics: &'a ScanMetrics,
    batch: &'a FileBatch,
}

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        self.state.record_batch(self.batch.primary(), self.batch.len());
        self.metrics.record_batch(self.batch.len());
    }
}

/// Drains the work queue, scanning one batch at a time.
pub(crate) struct ScanWorker<'a> {
    id: usize,
    ctx: ScanContext<'a>,
}

impl<'a> ScanWorker<'a> {
    pub fn new(id: usize, ctx: ScanContext<'a>) -> Self {
        Self { id, ctx }
    }

    /// Runs until the queue is empty or the scan turned fatal.
    ///
    /// Returns the problems found; successful and cancelled batches leave no entry.
    pub fn run(self) -> Vec<StatusEntry> {
        let mut entries = Vec::new();
        let mut batches = 0usize;
        while !self.ctx.state.is_fatal() {
            let Some(batch) = self.ctx.queue.pop() else {
                break;
            };
            batches += 1;
            match self.process(&batch) {
                BatchStatus::Ok => {}
                BatchStatus::Cancelled => {
                    trace!(
                        "Worker {} stopped after cancelled batch {}",
                        self.id,
                        batch.primary()
                    );
                }
                BatchStatus::Failed(entry) => {
                    self.ctx.metrics.record_failure();
                    if entry.is_fatal() {
                        self.ctx.state.set_fatal();
                    }
                    entries.push(entry);
                }
            }
        }
        trace!("Worker {} finished after {} batches", self.id, batches);
        entries
    }

    fn process(&self, batch: &FileBatch) -> BatchStatus {
        let result = {
            let _guard = BatchGuard {
                state: self.ctx.state,
                metrics: self.ctx.metrics,
                batch,
            };
            self.scan_batch(batch)
        };

        match result {
            Ok(()) if self.ctx.state.is_group_cancelled() => {
                self.ctx.state.set_fatal();
                BatchStatus::Cancelled
            }
            Ok(()) => BatchStatus::Ok,
            Err(e) => self.classify(batch.primary(), e),
        }
    }

    fn scan_batch(&self, batch: &FileBatch) -> SearchResult<()> {
        let file = batch.primary();
        trace!("Scanning {} ({} duplicates)", file, batch.duplicates().len());

        if !self.ctx.collector.accept_file(file)? {
            return Ok(());
        }
        let Some(regex) = self.ctx.pattern.regex() else {
            return Ok(());
        };

        let mut content = match self.ctx.source.open_document(file) {
            Some(document) => FileContent::Document(document),
            None => {
                let mut content = self.ctx.source.load(file)?;
                if has_binary_content(&mut content, file, self.ctx.source)?
                    && !self.ctx.collector.report_binary_file(file)
                {
                    trace!("Skipping binary file {}", file);
                    self.ctx.metrics.record_binary_skip();
                    self.release(file, content);
                    return Ok(());
                }
                content
            }
        };

        let text = content.text()?;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let occurrences = locate_matches(file, &text, regex, self.ctx.collector, || {
                self.ctx.state.is_group_cancelled()
            })?;
            self.ctx.metrics.record_matches(occurrences.len());
            self.ctx.collector.flush_matches(file);
            self.replay(batch.duplicates(), &occurrences, &text)
        }));

        if !content.is_document() {
            self.release(file, content);
        }

        match outcome {
            Ok(result) => result,
            Err(payload) => Err(SearchError::match_aborted(
                file.full_path(),
                panic_message(payload.as_ref()),
            )),
        }
    }

    /// Offers the primary's matches again for every duplicate, reusing one record.
    fn replay(
        &self,
        duplicates: &[FileHandle],
        occurrences: &[MatchRecord],
        text: &Arc<str>,
    ) -> SearchResult<()> {
        let mut reusable = occurrences.first().cloned();
        for duplicate in duplicates {
            if let Some(record) = reusable.as_mut() {
                for occurrence in occurrences {
                    record.initialize(duplicate, occurrence.offset(), occurrence.length(), text);
                    let go_on = self.ctx.collector.accept_pattern_match(record)?;
                    self.ctx.metrics.record_matches(1);
                    if !go_on {
                        break;
                    }
                }
            }
            self.ctx.collector.flush_matches(duplicate);
            self.ctx.metrics.record_duplicate();
        }
        Ok(())
    }

    fn release(&self, file: &FileHandle, content: FileContent) {
        if let Err(e) = self.ctx.source.release(content) {
            warn!("Failed to release content of {}: {}", file, e);
        }
    }

    fn classify(&self, file: &FileHandle, err: SearchError) -> BatchStatus {
        let path = file.display_path();
        let message = match &err {
            SearchError::UnsupportedCharset { .. } => format!(
                "File '{}' has been skipped: unsupported encoding '{}'",
                path,
                self.charset_name(file)
            ),
            SearchError::IllegalCharsetName { .. } => format!(
                "File '{}' has been skipped: illegal encoding name '{}'",
                path,
                self.charset_name(file)
            ),
            SearchError::MatchAborted { reason, .. } => format!(
                "Search pattern is too complex ({}) while searching '{}'. Search canceled.",
                reason, path
            ),
            e if e.is_resource_missing() && self.ctx.lightweight_auto_refresh => {
                trace!("Ignoring vanished file {}", file);
                return if self.ctx.state.is_group_cancelled() {
                    BatchStatus::Cancelled
                } else {
                    BatchStatus::Ok
                };
            }
            e => format!("Error reading '{}': {}", path, e),
        };
        BatchStatus::Failed(StatusEntry::error(message, err))
    }

    fn charset_name(&self, file: &FileHandle) -> String {
        self.ctx
            .source
            .charset_name(file)
            .unwrap_or_else(|_| "unknown".to_string())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "matching panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SearchConfig;
    use crate::content::LocalContentSource;
    use crate::results::Severity;
    use crate::search::planner::plan_batches;
    use parking_lot::Mutex;
    use std::fs;
    use tempfile::tempdir;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
        panic_on: Option<&'static str>,
        declines_binary: bool,
    }

    impl Recorder {
        fn events(&self) -> Vec<String> {
            self.events.lock().clone()
        }
    }

    impl MatchCollector for Recorder {
        fn accept_file(&self, file: &FileHandle) -> SearchResult<bool> {
            self.events.lock().push(format!("accept {}", file.name()));
            Ok(true)
        }

        fn accept_pattern_match(&self, record: &MatchRecord) -> SearchResult<bool> {
            if self.panic_on == Some(record.matched_text().as_str()) {
                panic!("stack exhausted");
            }
            self.events
                .lock()
                .push(format!("match {} {}", record.file().name(), record.offset()));
            Ok(true)
        }

        fn report_binary_file(&self, file: &FileHandle) -> bool {
            self.events.lock().push(format!("binary {}", file.name()));
            !self.declines_binary
        }

        fn flush_matches(&self, file: &FileHandle) {
            self.events.lock().push(format!("flush {}", file.name()));
        }
    }

    struct Harness {
        state: ScanState,
        queue: WorkQueue,
        source: LocalContentSource,
        pattern: SearchPattern,
        metrics: ScanMetrics,
        lightweight: bool,
    }

    impl Harness {
        fn new(pattern: &str, files: &[FileHandle]) -> Self {
            let queue = WorkQueue::new();
            queue.push_all(plan_batches(files));
            Self {
                state: ScanState::new(files.len()),
                queue,
                source: LocalContentSource::new(&SearchConfig::default()),
                pattern: SearchPattern::new(pattern).unwrap(),
                metrics: ScanMetrics::new(),
                lightweight: false,
            }
        }

        fn run(&self, collector: &dyn MatchCollector) -> Vec<StatusEntry> {
            let ctx = ScanContext {
                state: &self.state,
                queue: &self.queue,
                collector,
                source: &self.source,
                pattern: &self.pattern,
                metrics: &self.metrics,
                lightweight_auto_refresh: self.lightweight,
            };
            ScanWorker::new(0, ctx).run()
        }
    }

    #[test]
    fn test_duplicates_replay_primary_matches() {
        let dir = tempdir().unwrap();
        let disk = dir.path().join("shared.txt");
        fs::write(&disk, "ab foo cd ef gh ij foo").unwrap();
        let files = vec![
            FileHandle::local("/p/A.txt", &disk),
            FileHandle::local("/p/B.txt", &disk),
        ];

        let harness = Harness::new("foo", &files);
        let collector = Recorder::default();
        let entries = harness.run(&collector);

        assert!(entries.is_empty());
        assert_eq!(
            collector.events(),
            vec![
                "accept A.txt",
                "match A.txt 3",
                "match A.txt 19",
                "flush A.txt",
                "match B.txt 3",
                "match B.txt 19",
                "flush B.txt",
            ]
        );
        assert_eq!(harness.state.scanned(), 2);
        assert_eq!(harness.metrics.get_stats().duplicates_replayed, 1);
    }

    #[test]
    fn test_empty_pattern_only_visits() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, "anything").unwrap();

        let harness = Harness::new("", &[FileHandle::from_path(&path)]);
        let collector = Recorder::default();
        assert!(harness.run(&collector).is_empty());
        assert_eq!(collector.events(), vec!["accept a.txt"]);
        assert_eq!(harness.state.scanned(), 1);
    }

    #[test]
    fn test_declined_binary_file_is_skipped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("blob.dat");
        fs::write(&path, b"foo\0foo").unwrap();

        let harness = Harness::new("foo", &[FileHandle::from_path(&path)]);
        let collector = Recorder {
            declines_binary: true,
            ..Default::default()
        };
        assert!(harness.run(&collector).is_empty());
        assert_eq!(collector.events(), vec!["accept blob.dat", "binary blob.dat"]);
        assert_eq!(harness.metrics.get_stats().binary_files_skipped, 1);
    }

    #[test]
    fn test_small_undecodable_binary_is_skipped_not_failed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("icon.dat");
        fs::write(&path, b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR foo").unwrap();

        let harness = Harness::new("foo", &[FileHandle::from_path(&path)]);
        let collector = Recorder {
            declines_binary: true,
            ..Default::default()
        };
        assert!(harness.run(&collector).is_empty());
        assert_eq!(collector.events(), vec!["accept icon.dat", "binary icon.dat"]);
        assert_eq!(harness.metrics.get_stats().binary_files_skipped, 1);
        assert_eq!(harness.metrics.get_stats().failed_files, 0);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gone.txt");

        let harness = Harness::new("foo", &[FileHandle::from_path(&path)]);
        let entries = harness.run(&Recorder::default());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].severity(), Severity::Error);
        assert!(entries[0].message().starts_with("Error reading '"));
        assert!(entries[0].message().contains("gone.txt"));
        assert_eq!(harness.state.scanned(), 1);
    }

    #[test]
    fn test_missing_file_ignored_with_lightweight_refresh() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gone.txt");

        let mut harness = Harness::new("foo", &[FileHandle::from_path(&path)]);
        harness.lightweight = true;
        assert!(harness.run(&Recorder::default()).is_empty());
        assert_eq!(harness.state.scanned(), 1);
    }

    #[test]
    fn test_unsupported_charset_names_file_and_charset() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("old.txt");
        fs::write(&path, "foo").unwrap();

        let file = FileHandle::from_path(&path).with_charset("EBCDIC-500");
        let harness = Harness::new("foo", &[file]);
        let entries = harness.run(&Recorder::default());
        assert_eq!(entries.len(), 1);
        assert!(entries[0].message().contains("EBCDIC-500"));
        assert!(entries[0].message().contains("old.txt"));
    }

    #[test]
    fn test_panic_in_matching_is_fatal_and_stops_worker() {
        let dir = tempdir().unwrap();
        let first = dir.path().join("1.txt");
        let second = dir.path().join("2.txt");
        fs::write(&first, "boom").unwrap();
        fs::write(&second, "boom").unwrap();

        let harness = Harness::new(
            "boom",
            &[FileHandle::from_path(&first), FileHandle::from_path(&second)],
        );
        let collector = Recorder {
            panic_on: Some("boom"),
            ..Default::default()
        };
        let entries = harness.run(&collector);

        assert_eq!(entries.len(), 1);
        assert!(entries[0].is_fatal());
        assert!(entries[0].message().starts_with("Search pattern is too complex"));
        assert!(entries[0].message().contains("1.txt"));
        assert!(harness.state.is_fatal());
        assert_eq!(harness.state.scanned(), 1);
        assert_eq!(harness.queue.len(), 1);
    }

    #[test]
    fn test_group_cancellation_marks_batch_cancelled() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, "foo").unwrap();

        let harness = Harness::new(
            "foo",
            &[FileHandle::from_path(&path), FileHandle::from_path(dir.path().join("b.txt"))],
        );
        harness.state.cancel_group();
        let entries = harness.run(&Recorder::default());

        assert!(entries.is_empty());
        assert!(harness.state.is_fatal());
        assert_eq!(harness.state.scanned(), 1);
    }

    #[test]
    fn test_documents_are_never_binary_checked() {
        let file = FileHandle::from_path("/virtual/edited.bin");
        let harness = Harness::new("foo", std::slice::from_ref(&file));
        harness.source.documents().open(file, "x\0 foo");
        let collector = Recorder {
            declines_binary: true,
            ..Default::default()
        };

        assert!(harness.run(&collector).is_empty());
        assert_eq!(
            collector.events(),
            vec!["accept edited.bin", "match edited.bin 3", "flush edited.bin"]
        );
    }
}
