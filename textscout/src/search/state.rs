use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::file::FileHandle;

/// Progress as seen by the coordinator
#[derive(Debug, Clone, Default)]
pub(crate) struct ProgressSnapshot {
    pub current_file: Option<FileHandle>,
    pub scanned: usize,
}

/// State shared between the workers, the progress coordinator and the engine for one scan.
///
/// The current file and the scanned counter move together under one lock. The flags are
/// independent: `fatal` stops workers from taking new batches, `group_cancelled` is how the
/// coordinator stops in-flight work, and `caller_cancelled` remembers that the caller asked.
#[derive(Debug)]
pub(crate) struct ScanState {
    files_to_scan: usize,
    progress: Mutex<ProgressSnapshot>,
    fatal: AtomicBool,
    group_cancelled: AtomicBool,
    caller_cancelled: AtomicBool,
}

impl ScanState {
    pub fn new(files_to_scan: usize) -> Self {
        Self {
            files_to_scan,
            progress: Mutex::new(ProgressSnapshot::default()),
            fatal: AtomicBool::new(false),
            group_cancelled: AtomicBool::new(false),
            caller_cancelled: AtomicBool::new(false),
        }
    }

    pub fn files_to_scan(&self) -> usize {
        self.files_to_scan
    }

    /// Marks `file` as current and counts `files` more files as scanned
    pub fn record_batch(&self, file: &FileHandle, files: usize) {
        let mut progress = self.progress.lock();
        progress.current_file = Some(file.clone());
        progress.scanned += files;
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.progress.lock().clone()
    }

    pub fn scanned(&self) -> usize {
        self.progress.lock().scanned
    }

    pub fn is_fatal(&self) -> bool {
        self.fatal.load(Ordering::Acquire)
    }

    pub fn set_fatal(&self) {
        self.fatal.store(true, Ordering::Release);
    }

    pub fn cancel_group(&self) {
        self.group_cancelled.store(true, Ordering::Release);
    }

    pub fn is_group_cancelled(&self) -> bool {
        self.group_cancelled.load(Ordering::Acquire)
    }

    pub fn mark_caller_cancelled(&self) {
        self.caller_cancelled.store(true, Ordering::Release);
    }

    pub fn caller_cancelled(&self) -> bool {
        self.caller_cancelled.load(Ordering::Acquire)
    }
}
