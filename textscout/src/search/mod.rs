/// Parallel plain-text search.
///
/// A search runs through a small pipeline:
///
/// 1. **Planning** ([`planner`]): files are grouped into batches of handles that resolve to
///    the same content, so aliased files (links, linked resources) are read once. Local
///    files are queued before files without a local copy.
/// 2. **Queueing** ([`queue`]): every batch is pushed onto a shared FIFO before any worker
///    starts. Workers pop without blocking and stop when the queue is empty.
/// 3. **Scanning** (`worker`): each worker takes a batch, resolves the primary file's
///    content (an open document wins over disk bytes), skips binary content unless the
///    collector wants it, offers every non-empty regex match to the collector, and replays
///    those matches onto the batch's duplicates.
/// 4. **Coordination** (`coordinator`): one extra thread samples progress for the caller's
///    [`ProgressMonitor`](crate::progress::ProgressMonitor) and is the only path by which
///    caller cancellation reaches the workers.
///
/// ```rust,ignore
/// let engine = TextSearchEngine::new(Arc::new(collector), SearchPattern::new(r"fn \w+")?)
///     .with_config(config);
/// let status = engine.search_scope(&DirectoryScope::new(["src"]), Some(&monitor));
/// ```
///
/// # Failure handling
///
/// The pool never stops because one file failed. Problems with individual files become
/// [`StatusEntry`](crate::results::StatusEntry) values and the worker moves on. A panic
/// unwinding out of matching is different: whatever caused it on one file will cause it on
/// the next, so the worker records a fatal entry and raises a flag that keeps every worker
/// from taking further batches.
///
/// # Cancellation
///
/// Two flags are kept apart. Caller cancellation is observed by the coordinator, which then
/// cancels the worker group; the match loop polls the group every 20 finds. The fatal flag is
/// raised by workers. The final [`SearchStatus`](crate::results::SearchStatus) tells the
/// two apart through its [`ScanOutcome`](crate::results::ScanOutcome).
pub mod engine;
pub mod matcher;
pub mod planner;
pub mod queue;

mod coordinator;
mod state;
mod worker;

pub use engine::{TextSearchEngine, WORKER_THREAD_PREFIX};
pub use matcher::{MatchRecord, SearchPattern};
pub use planner::{plan_batches, FileBatch};
pub use queue::WorkQueue;
