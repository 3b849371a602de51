use dashmap::DashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::trace;

use super::{Charset, ContentKind, ContentSource, FileContent, StreamedContent};
use crate::config::{EncodingMode, SearchConfig};
use crate::errors::{SearchError, SearchResult};
use crate::file::FileHandle;

const TEXT_EXTENSIONS: &[&str] = &[
    "c", "cc", "cfg", "conf", "cpp", "cs", "css", "csv", "go", "h", "hpp", "html", "ini", "java",
    "js", "json", "jsx", "kt", "log", "md", "properties", "py", "rb", "rs", "sh", "sql", "toml",
    "ts", "tsx", "txt", "xml", "yaml", "yml",
];

const BINARY_EXTENSIONS: &[&str] = &[
    "class", "dll", "exe", "gif", "gz", "ico", "jar", "jpeg", "jpg", "o", "pdf", "png", "so",
    "tar", "zip",
];

/// Open documents with unsaved modifications, keyed by file.
///
/// Clones share the same registry.
#[derive(Debug, Clone, Default)]
pub struct DocumentRegistry {
    documents: Arc<DashMap<FileHandle, Arc<str>>>,
}

impl DocumentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the in-memory text of `file`.
    pub fn open(&self, file: FileHandle, text: impl Into<Arc<str>>) {
        self.documents.insert(file, text.into());
    }

    pub fn close(&self, file: &FileHandle) -> Option<Arc<str>> {
        self.documents.remove(file).map(|(_, text)| text)
    }

    pub fn get(&self, file: &FileHandle) -> Option<Arc<str>> {
        self.documents.get(file).map(|entry| Arc::clone(entry.value()))
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Reads content from the local filesystem, preferring registered documents
#[derive(Debug, Clone)]
pub struct LocalContentSource {
    documents: DocumentRegistry,
    buffer_size: usize,
    encoding_mode: EncodingMode,
    default_charset: String,
}

impl LocalContentSource {
    pub fn new(config: &SearchConfig) -> Self {
        Self::with_documents(config, DocumentRegistry::new())
    }

    pub fn with_documents(config: &SearchConfig, documents: DocumentRegistry) -> Self {
        Self {
            documents,
            buffer_size: config.buffer_size.max(1),
            encoding_mode: config.encoding_mode,
            default_charset: config.default_charset.clone(),
        }
    }

    pub fn documents(&self) -> &DocumentRegistry {
        &self.documents
    }

    fn resolve_location(file: &FileHandle) -> SearchResult<PathBuf> {
        if let Some(location) = file.location() {
            return Ok(location.to_path_buf());
        }
        match file.location_uri().strip_prefix("file://") {
            Some(path) if !path.is_empty() => Ok(PathBuf::from(path)),
            _ => Err(SearchError::content_unavailable(
                file.full_path(),
                format!("no local copy of {}", file.location_uri()),
            )),
        }
    }
}

impl ContentSource for LocalContentSource {
    fn open_document(&self, file: &FileHandle) -> Option<Arc<str>> {
        self.documents.get(file)
    }

    fn load(&self, file: &FileHandle) -> SearchResult<FileContent> {
        let path = Self::resolve_location(file)?;
        let charset = Charset::for_name(&self.charset_name(file)?, file.full_path())?;

        let metadata = fs::metadata(&path).map_err(|e| SearchError::from_io(e, &path))?;
        if !metadata.is_file() {
            return Err(SearchError::content_unavailable(
                &path,
                "not a regular file",
            ));
        }

        if metadata.len() < self.buffer_size as u64 {
            trace!("Reading small file whole: {}", path.display());
            let bytes = fs::read(&path).map_err(|e| SearchError::from_io(e, &path))?;
            Ok(FileContent::Streamed(StreamedContent::from_bytes(
                &path,
                bytes,
                charset,
                self.encoding_mode,
            )))
        } else {
            trace!("Streaming large file: {}", path.display());
            Ok(FileContent::Streamed(StreamedContent::open(
                &path,
                charset,
                self.encoding_mode,
            )?))
        }
    }

    fn content_kind(&self, file: &FileHandle) -> SearchResult<Option<ContentKind>> {
        let Some(ext) = file.full_path().extension() else {
            return Ok(None);
        };
        let ext = ext.to_string_lossy().to_lowercase();
        if TEXT_EXTENSIONS.contains(&ext.as_str()) {
            Ok(Some(ContentKind::Text))
        } else if BINARY_EXTENSIONS.contains(&ext.as_str()) {
            Ok(Some(ContentKind::Binary))
        } else {
            Ok(None)
        }
    }

    fn release(&self, content: FileContent) -> SearchResult<()> {
        if let FileContent::Streamed(mut streamed) = content {
            streamed.close();
        }
        Ok(())
    }

    fn charset_name(&self, file: &FileHandle) -> SearchResult<String> {
        Ok(file
            .charset()
            .unwrap_or(self.default_charset.as_str())
            .to_string())
    }

    fn buffer_size(&self) -> usize {
        self.buffer_size
    }
}
