use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::time::Duration;
use tracing::debug;

use super::state::ScanState;
use crate::progress::ProgressMonitor;

/// Cancels the worker group when the coordinator stops, whichever way it stops
struct CancelGroupOnExit<'a>(&'a ScanState);

impl Drop for CancelGroupOnExit<'_> {
    fn drop(&mut self) {
        self.0.cancel_group();
    }
}

/// Samples scan progress for the caller and carries caller cancellation to the workers.
///
/// Runs on its own thread next to the workers. It stops when every file has been counted,
/// when the caller cancels, or when the shutdown channel is closed by the engine.
pub(crate) struct ProgressCoordinator<'a> {
    state: &'a ScanState,
    monitor: &'a dyn ProgressMonitor,
    interval: Duration,
    shutdown: Receiver<()>,
    last_scanned: usize,
}

impl<'a> ProgressCoordinator<'a> {
    pub fn new(
        state: &'a ScanState,
        monitor: &'a dyn ProgressMonitor,
        interval: Duration,
        shutdown: Receiver<()>,
    ) -> Self {
        Self {
            state,
            monitor,
            interval,
            shutdown,
            last_scanned: 0,
        }
    }

    pub fn run(mut self) {
        let _cancel = CancelGroupOnExit(self.state);
        let total = self.state.files_to_scan();

        loop {
            if self.monitor.is_cancelled() {
                debug!("Caller cancelled the search");
                self.state.mark_caller_cancelled();
                break;
            }

            let snapshot = self.state.snapshot();
            if snapshot.scanned > self.last_scanned {
                self.monitor.worked(snapshot.scanned - self.last_scanned);
                self.last_scanned = snapshot.scanned;
            }
            if snapshot.scanned >= total {
                break;
            }
            if let Some(file) = &snapshot.current_file {
                self.monitor.sub_task(&format!(
                    "Scanning file {} ({} of {})",
                    file.name(),
                    snapshot.scanned,
                    total
                ));
            }

            match self.shutdown.recv_timeout(self.interval) {
                Err(RecvTimeoutError::Timeout) => {}
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::FileHandle;
    use crate::progress::CancellationMonitor;
    use crossbeam_channel::bounded;
    use parking_lot::Mutex;
    use std::time::Instant;

    #[derive(Default)]
    struct RecordingMonitor {
        worked: Mutex<usize>,
        sub_tasks: Mutex<Vec<String>>,
    }

    impl ProgressMonitor for RecordingMonitor {
        fn sub_task(&self, name: &str) {
            self.sub_tasks.lock().push(name.to_string());
        }

        fn worked(&self, work: usize) {
            *self.worked.lock() += work;
        }
    }

    #[test]
    fn test_stops_when_everything_is_scanned() {
        let state = ScanState::new(2);
        state.record_batch(&FileHandle::from_path("/a.txt"), 2);
        let monitor = RecordingMonitor::default();
        let (_tx, rx) = bounded(0);

        ProgressCoordinator::new(&state, &monitor, Duration::from_millis(5), rx).run();

        assert_eq!(*monitor.worked.lock(), 2);
        assert!(state.is_group_cancelled());
        assert!(!state.caller_cancelled());
    }

    #[test]
    fn test_reports_progress_until_shutdown() {
        let state = ScanState::new(3);
        state.record_batch(&FileHandle::from_path("/dir/a.txt"), 1);
        let monitor = RecordingMonitor::default();
        let (tx, rx) = bounded::<()>(0);

        std::thread::scope(|s| {
            s.spawn(|| {
                ProgressCoordinator::new(&state, &monitor, Duration::from_millis(5), rx).run()
            });
            std::thread::sleep(Duration::from_millis(30));
            drop(tx);
        });

        assert_eq!(*monitor.worked.lock(), 1);
        assert_eq!(
            monitor.sub_tasks.lock().first().map(String::as_str),
            Some("Scanning file a.txt (1 of 3)")
        );
        assert!(state.is_group_cancelled());
    }

    #[test]
    fn test_caller_cancellation_reaches_worker_group() {
        let state = ScanState::new(10);
        let monitor = CancellationMonitor::new();
        let (_tx, rx) = bounded(0);

        let started = Instant::now();
        std::thread::scope(|s| {
            s.spawn(|| {
                ProgressCoordinator::new(&state, &monitor, Duration::from_millis(10), rx).run()
            });
            monitor.cancel();
        });

        assert!(state.caller_cancelled());
        assert!(state.is_group_cancelled());
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
