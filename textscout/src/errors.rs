/// Error types for textscout.
///
/// Every failure the engine can observe while scanning a file is represented by one
/// [`SearchError`] variant. The scan workers never propagate these out of a scan; they
/// classify them into status entries (see [`crate::results::SearchStatus`]) so that one bad
/// file never aborts the whole search:
///
/// ```rust,ignore
/// match worker.scan_batch(&batch) {
///     Ok(()) => {}
///     Err(SearchError::FileNotFound(_)) if lightweight_refresh => {} // stale file list
///     Err(e) => status.add(StatusEntry::error(message_for(&e), e)),
/// }
/// ```
///
/// The only error that stops a scan is [`SearchError::MatchAborted`], raised when matching
/// unwinds out of a file. Whatever broke matching on one file would break it on every file.
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for search operations
pub type SearchResult<T> = Result<T, SearchError>;

/// Errors that can occur during search operations
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Unsupported encoding '{charset}' in file {path}")]
    UnsupportedCharset { charset: String, path: PathBuf },
    #[error("Illegal encoding name '{charset}' in file {path}")]
    IllegalCharsetName { charset: String, path: PathBuf },
    #[error("Input is not valid {charset} at byte {offset} in file {path}")]
    CharConversion {
        charset: String,
        offset: usize,
        path: PathBuf,
    },
    #[error("Content of {path} is unavailable: {reason}")]
    ContentUnavailable { path: PathBuf, reason: String },
    #[error("Collector failed: {0}")]
    CollectorError(String),
    #[error("Matching aborted in {path}: {reason}")]
    MatchAborted { path: PathBuf, reason: String },
}

/// Canonicalize the path and strip UNC prefixes so that
/// comparisons on Windows are consistent.
pub fn unify_path(original: &Path) -> PathBuf {
    let canonical = original
        .canonicalize()
        .unwrap_or_else(|_| original.to_path_buf());
    strip_unc_prefix(&canonical)
}

/// Strips the Windows UNC prefix (\\?\) from a path if present
fn strip_unc_prefix(p: &Path) -> PathBuf {
    let s = p.display().to_string();
    if let Some(stripped) = s.strip_prefix(r"\\?\") {
        PathBuf::from(stripped)
    } else {
        p.to_path_buf()
    }
}

impl SearchError {
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound(path.into())
    }

    pub fn permission_denied(path: impl Into<PathBuf>) -> Self {
        Self::PermissionDenied(path.into())
    }

    pub fn invalid_pattern(pattern: impl Into<String>) -> Self {
        Self::InvalidPattern(pattern.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn unsupported_charset(charset: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::UnsupportedCharset {
            charset: charset.into(),
            path: path.into(),
        }
    }

    pub fn illegal_charset_name(charset: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::IllegalCharsetName {
            charset: charset.into(),
            path: path.into(),
        }
    }

    pub fn char_conversion(
        charset: impl Into<String>,
        offset: usize,
        path: impl Into<PathBuf>,
    ) -> Self {
        Self::CharConversion {
            charset: charset.into(),
            offset,
            path: path.into(),
        }
    }

    pub fn content_unavailable(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::ContentUnavailable {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn collector_error(msg: impl Into<String>) -> Self {
        Self::CollectorError(msg.into())
    }

    pub fn match_aborted(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::MatchAborted {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Maps an I/O error raised while opening or reading `path`.
    pub fn from_io(err: std::io::Error, path: &Path) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::file_not_found(path),
            std::io::ErrorKind::PermissionDenied => Self::permission_denied(path),
            _ => Self::IoError(err),
        }
    }

    /// True for errors that end the whole scan rather than one file.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::MatchAborted { .. })
    }

    /// True when the underlying resource no longer exists.
    pub fn is_resource_missing(&self) -> bool {
        match self {
            Self::FileNotFound(_) => true,
            Self::IoError(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}
