use std::collections::HashMap;
use tracing::debug;

use crate::file::FileHandle;

/// Files that share one content location.
///
/// The primary is scanned; duplicates receive the primary's matches.
#[derive(Debug, Clone)]
pub struct FileBatch {
    primary: FileHandle,
    duplicates: Vec<FileHandle>,
}

impl FileBatch {
    pub fn new(primary: FileHandle) -> Self {
        Self {
            primary,
            duplicates: Vec::new(),
        }
    }

    pub fn primary(&self) -> &FileHandle {
        &self.primary
    }

    pub fn duplicates(&self) -> &[FileHandle] {
        &self.duplicates
    }

    /// Number of files in the batch, primary included
    pub fn len(&self) -> usize {
        1 + self.duplicates.len()
    }

    /// Batches always hold a primary
    pub fn is_empty(&self) -> bool {
        false
    }

    fn push(&mut self, file: FileHandle) {
        self.duplicates.push(file);
    }
}

/// Groups files by content key, keeping first-seen order
#[derive(Default)]
struct Grouping {
    index: HashMap<String, usize>,
    batches: Vec<FileBatch>,
}

impl Grouping {
    fn add(&mut self, key: String, file: FileHandle) {
        match self.index.get(&key) {
            Some(&slot) => self.batches[slot].push(file),
            None => {
                self.index.insert(key, self.batches.len());
                self.batches.push(FileBatch::new(file));
            }
        }
    }
}

/// Groups `files` into batches of handles that resolve to the same content.
///
/// The key is the local filesystem location when there is one, else the location URI.
/// Batches of local files come first, then the rest, each in first-seen order.
pub fn plan_batches(files: &[FileHandle]) -> Vec<FileBatch> {
    let mut local = Grouping::default();
    let mut remote = Grouping::default();

    for file in files {
        match file.location() {
            Some(path) => local.add(path.to_string_lossy().into_owned(), file.clone()),
            None => remote.add(file.location_uri().to_string(), file.clone()),
        }
    }

    debug!(
        "Planned {} local and {} non-local batches for {} files",
        local.batches.len(),
        remote.batches.len(),
        files.len()
    );

    let mut batches = local.batches;
    batches.extend(remote.batches);
    batches
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(batch: &FileBatch) -> Vec<String> {
        std::iter::once(batch.primary())
            .chain(batch.duplicates())
            .map(|f| f.full_path().display().to_string())
            .collect()
    }

    #[test]
    fn test_unique_files_make_single_batches() {
        let files = vec![
            FileHandle::from_path("/a.txt"),
            FileHandle::from_path("/b.txt"),
        ];
        let batches = plan_batches(&files);
        assert_eq!(batches.len(), 2);
        assert!(batches.iter().all(|b| b.len() == 1 && b.duplicates().is_empty()));
    }

    #[test]
    fn test_same_location_grouped_in_order() {
        let files = vec![
            FileHandle::local("/p/a.txt", "/disk/one.txt"),
            FileHandle::local("/p/b.txt", "/disk/two.txt"),
            FileHandle::local("/p/link/a.txt", "/disk/one.txt"),
            FileHandle::local("/p/other/a.txt", "/disk/one.txt"),
        ];
        let batches = plan_batches(&files);
        assert_eq!(batches.len(), 2);
        assert_eq!(
            names(&batches[0]),
            vec!["/p/a.txt", "/p/link/a.txt", "/p/other/a.txt"]
        );
        assert_eq!(names(&batches[1]), vec!["/p/b.txt"]);
    }

    #[test]
    fn test_local_batches_come_first() {
        let files = vec![
            FileHandle::remote("/p/r1.txt", "mem://r1"),
            FileHandle::local("/p/l1.txt", "/disk/l1.txt"),
            FileHandle::remote("/p/r1-alias.txt", "mem://r1"),
            FileHandle::local("/p/l2.txt", "/disk/l2.txt"),
        ];
        let batches = plan_batches(&files);
        let order: Vec<_> = batches.iter().map(names).collect();
        assert_eq!(
            order,
            vec![
                vec!["/p/l1.txt".to_string()],
                vec!["/p/l2.txt".to_string()],
                vec!["/p/r1.txt".to_string(), "/p/r1-alias.txt".to_string()],
            ]
        );
    }

    #[test]
    fn test_empty_input() {
        assert!(plan_batches(&[]).is_empty());
    }
}
