pub mod collector;
pub mod config;
pub mod content;
pub mod errors;
pub mod file;
pub mod metrics;
pub mod progress;
pub mod results;
pub mod scope;
pub mod search;

pub use collector::MatchCollector;
pub use config::{CliOverrides, EncodingMode, SearchConfig};
pub use content::{ContentSource, DocumentRegistry, FileContent, LocalContentSource};
pub use errors::{SearchError, SearchResult};
pub use file::FileHandle;
pub use metrics::{ScanMetrics, ScanStats};
pub use progress::{CancellationMonitor, NullProgressMonitor, ProgressMonitor};
pub use results::{ScanOutcome, SearchStatus, Severity, StatusEntry};
pub use scope::{DirectoryScope, SearchScope};
pub use search::{MatchRecord, SearchPattern, TextSearchEngine, WORKER_THREAD_PREFIX};
