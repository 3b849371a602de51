use crossbeam_channel::{unbounded, Receiver, Sender};

use super::planner::FileBatch;

/// FIFO of batches shared by all workers.
///
/// Filled before the workers start; a worker that finds it empty is done.
#[derive(Debug)]
pub struct WorkQueue {
    tx: Sender<FileBatch>,
    rx: Receiver<FileBatch>,
}

impl WorkQueue {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    pub fn push_all(&self, batches: impl IntoIterator<Item = FileBatch>) {
        for batch in batches {
            // Cannot fail: the queue owns a receiver for as long as it owns the sender
            let _ = self.tx.send(batch);
        }
    }

    /// Takes the next batch without blocking.
    pub fn pop(&self) -> Option<FileBatch> {
        self.rx.try_recv().ok()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Drops every queued batch.
    pub fn clear(&self) {
        for _ in self.rx.try_iter() {}
    }
}

impl Default for WorkQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::FileHandle;
    use std::collections::HashSet;
    use std::sync::Mutex;

    fn batch(name: &str) -> FileBatch {
        FileBatch::new(FileHandle::from_path(name))
    }

    #[test]
    fn test_fifo_order() {
        let queue = WorkQueue::new();
        queue.push_all(vec![batch("/1"), batch("/2"), batch("/3")]);
        assert_eq!(queue.len(), 3);

        let drained: Vec<_> = std::iter::from_fn(|| queue.pop())
            .map(|b| b.primary().full_path().display().to_string())
            .collect();
        assert_eq!(drained, vec!["/1", "/2", "/3"]);
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_clear() {
        let queue = WorkQueue::new();
        queue.push_all(vec![batch("/1"), batch("/2")]);
        queue.clear();
        assert!(queue.is_empty());
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_concurrent_pop_takes_each_batch_once() {
        let queue = WorkQueue::new();
        queue.push_all((0..500).map(|i| batch(&format!("/{i}"))));
        let seen = Mutex::new(HashSet::new());

        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    while let Some(b) = queue.pop() {
                        let fresh = seen
                            .lock()
                            .unwrap()
                            .insert(b.primary().full_path().to_path_buf());
                        assert!(fresh);
                    }
                });
            }
        });

        assert_eq!(seen.lock().unwrap().len(), 500);
    }
}
