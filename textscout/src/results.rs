/// Aggregated outcome of one search.
///
/// A search never fails as a whole because of one file. Instead each problem becomes a
/// [`StatusEntry`] and the search carries on; the caller receives a [`SearchStatus`] that
/// combines every entry with the terminal [`ScanOutcome`]:
///
/// ```rust,ignore
/// let status = engine.search(&files, Some(&monitor));
/// match status.outcome() {
///     ScanOutcome::Completed => report_problems(status.entries()),
///     ScanOutcome::Cancelled => show("search cancelled"),
///     ScanOutcome::FatalAborted => show(status.fatal_entries().next()),
/// }
/// ```
///
/// Cancellation is deliberately not an entry: it is a terminal state the caller can
/// distinguish from "completed with errors".
use std::fmt;

use crate::errors::SearchError;

/// Severity of a status entry, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Ok,
    Info,
    Warning,
    Error,
    Cancel,
}

/// How a search ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanOutcome {
    /// Every batch was drained without a fatal error.
    #[default]
    Completed,
    /// The caller cancelled the search.
    Cancelled,
    /// A fatal error stopped the workers from taking further batches.
    FatalAborted,
}

/// One problem recorded during a search
#[derive(Debug)]
pub struct StatusEntry {
    severity: Severity,
    message: String,
    cause: Option<SearchError>,
}

impl StatusEntry {
    pub fn new(severity: Severity, message: impl Into<String>, cause: Option<SearchError>) -> Self {
        Self {
            severity,
            message: message.into(),
            cause,
        }
    }

    /// An error entry caused by `cause`.
    pub fn error(message: impl Into<String>, cause: SearchError) -> Self {
        Self::new(Severity::Error, message, Some(cause))
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn cause(&self) -> Option<&SearchError> {
        self.cause.as_ref()
    }

    /// True when this entry stopped the whole search.
    pub fn is_fatal(&self) -> bool {
        self.cause.as_ref().is_some_and(SearchError::is_fatal)
    }
}

impl fmt::Display for StatusEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Represents the complete outcome of a search
#[derive(Debug, Default)]
pub struct SearchStatus {
    entries: Vec<StatusEntry>,
    outcome: ScanOutcome,
    /// Total number of files handed to the search
    pub files_to_scan: usize,
    /// Number of files whose batch finished, successfully or not
    pub files_scanned: usize,
}

impl SearchStatus {
    /// Creates a new empty, successful status
    pub fn new() -> Self {
        Default::default()
    }

    /// Adds an entry. `Ok` entries carry no information and are dropped.
    pub fn add(&mut self, entry: StatusEntry) {
        if entry.severity != Severity::Ok {
            self.entries.push(entry);
        }
    }

    /// Merges the entries of another status into this one
    pub fn merge(&mut self, other: SearchStatus) {
        self.extend(other.entries);
        self.files_to_scan += other.files_to_scan;
        self.files_scanned += other.files_scanned;
        if other.outcome != ScanOutcome::Completed && self.outcome == ScanOutcome::Completed {
            self.outcome = other.outcome;
        }
    }

    pub fn extend(&mut self, entries: impl IntoIterator<Item = StatusEntry>) {
        for entry in entries {
            self.add(entry);
        }
    }

    pub fn set_outcome(&mut self, outcome: ScanOutcome) {
        self.outcome = outcome;
    }

    pub fn outcome(&self) -> ScanOutcome {
        self.outcome
    }

    pub fn entries(&self) -> &[StatusEntry] {
        &self.entries
    }

    pub fn fatal_entries(&self) -> impl Iterator<Item = &StatusEntry> {
        self.entries.iter().filter(|e| e.is_fatal())
    }

    /// Overall severity: `Cancel` for cancelled searches, otherwise the most severe entry.
    pub fn severity(&self) -> Severity {
        if self.outcome == ScanOutcome::Cancelled {
            return Severity::Cancel;
        }
        self.entries
            .iter()
            .map(StatusEntry::severity)
            .max()
            .unwrap_or(Severity::Ok)
    }

    pub fn is_ok(&self) -> bool {
        self.severity() == Severity::Ok
    }

    pub fn is_cancelled(&self) -> bool {
        self.outcome == ScanOutcome::Cancelled
    }
}
