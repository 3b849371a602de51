use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::errors::{unify_path, SearchError};
use crate::file::FileHandle;
use crate::results::{SearchStatus, Severity, StatusEntry};

/// A set of files to search, evaluated lazily.
pub trait SearchScope: Send + Sync {
    /// Lists the files in the scope. Problems met along the way go into `status`.
    fn evaluate_files_in_scope(&self, status: &mut SearchStatus) -> Vec<FileHandle>;
}

impl SearchScope for Vec<FileHandle> {
    fn evaluate_files_in_scope(&self, _status: &mut SearchStatus) -> Vec<FileHandle> {
        self.clone()
    }
}

/// Every regular file below a set of directories.
///
/// Nothing is skipped implicitly: hidden files and files excluded by ignore files are part of
/// the scope. Each file's location is its canonical path, so files reached through symlinks
/// are searched once and reported under every name.
#[derive(Debug, Clone, Default)]
pub struct DirectoryScope {
    roots: Vec<PathBuf>,
    extensions: Option<Vec<String>>,
}

impl DirectoryScope {
    pub fn new(roots: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        Self {
            roots: roots.into_iter().map(Into::into).collect(),
            extensions: None,
        }
    }

    /// Restricts the scope to files with one of `extensions` (case-insensitive, no dot)
    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = Some(extensions);
        self
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }
}

/// Checks if a file should be included based on its extension
pub fn has_valid_extension(path: &Path, extensions: &Option<Vec<String>>) -> bool {
    match extensions {
        None => true,
        Some(exts) => {
            if let Some(ext) = path.extension() {
                if let Some(ext_str) = ext.to_str() {
                    return exts
                        .iter()
                        .any(|e| e.trim_start_matches('.').eq_ignore_ascii_case(ext_str));
                }
            }
            false
        }
    }
}

impl SearchScope for DirectoryScope {
    fn evaluate_files_in_scope(&self, status: &mut SearchStatus) -> Vec<FileHandle> {
        let mut files = Vec::new();

        for root in &self.roots {
            if !root.exists() {
                status.add(StatusEntry::error(
                    format!("Search root '{}' does not exist", root.display()),
                    SearchError::file_not_found(root),
                ));
                continue;
            }

            let mut walker = WalkBuilder::new(root);
            walker
                .standard_filters(false)
                .follow_links(false)
                .sort_by_file_name(|a, b| a.cmp(b));

            for entry in walker.build() {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        let cause = match e.into_io_error() {
                            Some(io) => SearchError::IoError(io),
                            None => SearchError::content_unavailable(root, "walk failed"),
                        };
                        status.add(StatusEntry::new(
                            Severity::Warning,
                            format!("Could not list files below '{}': {}", root.display(), cause),
                            Some(cause),
                        ));
                        continue;
                    }
                };
                let is_file = entry
                    .file_type()
                    .is_some_and(|ft| ft.is_file() || ft.is_symlink());
                if !is_file || !has_valid_extension(entry.path(), &self.extensions) {
                    continue;
                }
                let location = unify_path(entry.path());
                if !location.is_file() {
                    continue;
                }
                files.push(FileHandle::local(entry.path(), location));
            }
        }

        debug!("Scope holds {} files", files.len());
        files
    }
}
