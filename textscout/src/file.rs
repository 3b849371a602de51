use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug)]
struct FileInfo {
    full_path: PathBuf,
    location: Option<PathBuf>,
    location_uri: String,
    charset: Option<String>,
}

/// A logical file taking part in a search.
///
/// The handle's identity is its logical `full_path`. Several handles may point at the same
/// bytes (linked folders, virtual resources); the resolved `location` is what tells them
/// apart from genuinely different files. Cloning is cheap.
#[derive(Clone)]
pub struct FileHandle(Arc<FileInfo>);

impl FileHandle {
    /// A file whose content lives at `location` on the local filesystem.
    pub fn local(full_path: impl Into<PathBuf>, location: impl Into<PathBuf>) -> Self {
        let location = location.into();
        let location_uri = file_uri(&location);
        Self(Arc::new(FileInfo {
            full_path: full_path.into(),
            location: Some(location),
            location_uri,
            charset: None,
        }))
    }

    /// A file with no local filesystem location, known only by URI.
    pub fn remote(full_path: impl Into<PathBuf>, location_uri: impl Into<String>) -> Self {
        Self(Arc::new(FileInfo {
            full_path: full_path.into(),
            location: None,
            location_uri: location_uri.into(),
            charset: None,
        }))
    }

    /// Shorthand for a local file whose logical path is its location.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self::local(path.clone(), path)
    }

    /// Returns a copy of this handle with an explicit charset name.
    pub fn with_charset(self, charset: impl Into<String>) -> Self {
        Self(Arc::new(FileInfo {
            full_path: self.0.full_path.clone(),
            location: self.0.location.clone(),
            location_uri: self.0.location_uri.clone(),
            charset: Some(charset.into()),
        }))
    }

    pub fn full_path(&self) -> &Path {
        &self.0.full_path
    }

    /// The last path segment, used for progress display.
    pub fn name(&self) -> String {
        self.0
            .full_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.0.full_path.display().to_string())
    }

    pub fn location(&self) -> Option<&Path> {
        self.0.location.as_deref()
    }

    pub fn location_uri(&self) -> &str {
        &self.0.location_uri
    }

    pub fn charset(&self) -> Option<&str> {
        self.0.charset.as_deref()
    }

    /// The logical path without a leading root, as shown in status messages.
    pub fn display_path(&self) -> String {
        let shown = self.0.full_path.display().to_string();
        match shown.strip_prefix('/') {
            Some(relative) if !relative.is_empty() => relative.to_string(),
            _ => shown,
        }
    }
}

fn file_uri(location: &Path) -> String {
    let shown = location.display().to_string().replace('\\', "/");
    if shown.starts_with('/') {
        format!("file://{}", shown)
    } else {
        format!("file:///{}", shown)
    }
}

impl PartialEq for FileHandle {
    fn eq(&self, other: &Self) -> bool {
        self.0.full_path == other.0.full_path
    }
}

impl Eq for FileHandle {}

impl Hash for FileHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.full_path.hash(state);
    }
}

impl fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileHandle")
            .field("full_path", &self.0.full_path)
            .field("location", &self.0.location)
            .finish()
    }
}

impl fmt::Display for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.full_path.display())
    }
}
