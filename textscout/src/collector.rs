use crate::errors::SearchResult;
use crate::file::FileHandle;
use crate::search::matcher::MatchRecord;

/// Receives the results of a search as they are found.
///
/// When [`MatchCollector::can_run_in_parallel`] returns `true` the engine calls the
/// collector from several worker threads at once. Otherwise every call comes from one
/// worker.
pub trait MatchCollector: Send + Sync {
    /// Called once before any file is visited.
    fn begin_reporting(&self) {}

    /// Called once after the search finished, was cancelled or aborted.
    fn end_reporting(&self) {}

    /// Whether `file` should be searched. Declined files are skipped.
    fn accept_file(&self, _file: &FileHandle) -> SearchResult<bool> {
        Ok(true)
    }

    /// Offers one match; `Ok(false)` asks for no further matches in this file.
    fn accept_pattern_match(&self, _record: &MatchRecord) -> SearchResult<bool> {
        Ok(true)
    }

    /// Whether a file that looks binary should still be searched.
    fn report_binary_file(&self, _file: &FileHandle) -> bool {
        false
    }

    /// No more matches will be offered for `file` in this search.
    fn flush_matches(&self, _file: &FileHandle) {}

    fn can_run_in_parallel(&self) -> bool {
        false
    }
}
