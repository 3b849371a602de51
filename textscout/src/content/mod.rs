//! File content as seen by the scan workers.
//!
//! Content comes from a [`ContentSource`]. An open, modified in-memory document always
//! wins over the bytes on disk so that searches see unsaved edits. Disk content is kept as
//! raw bytes in a [`StreamedContent`] until the text is needed. Small files are read whole
//! up front, larger ones are loaded on demand, which lets binary detection look at a
//! bounded prefix without reading the entire file. Either way nothing is decoded before
//! binary detection had its say.

pub mod binary;
pub mod charset;
pub mod local;

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::EncodingMode;
use crate::errors::{SearchError, SearchResult};
use crate::file::FileHandle;

pub use binary::has_binary_content;
pub use charset::Charset;
pub use local::{DocumentRegistry, LocalContentSource};

/// Classification of a file's content type, when one is known without reading it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Text,
    Binary,
}

impl ContentKind {
    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text)
    }
}

/// Supplies file content to the engine.
///
/// Implementations are shared by every worker and must be safe to call concurrently.
pub trait ContentSource: Send + Sync {
    /// An open, modified in-memory document for `file`, if there is one.
    fn open_document(&self, _file: &FileHandle) -> Option<Arc<str>> {
        None
    }

    /// Loads the content of `file` from its backing storage.
    fn load(&self, file: &FileHandle) -> SearchResult<FileContent>;

    /// Content type metadata for `file`, if available.
    fn content_kind(&self, _file: &FileHandle) -> SearchResult<Option<ContentKind>> {
        Ok(None)
    }

    /// Releases content obtained from [`ContentSource::load`].
    fn release(&self, content: FileContent) -> SearchResult<()> {
        drop(content);
        Ok(())
    }

    /// Name of the charset used to decode `file`.
    fn charset_name(&self, file: &FileHandle) -> SearchResult<String>;

    /// Number of bytes binary detection may inspect.
    fn buffer_size(&self) -> usize;
}

/// Content of one file
#[derive(Debug)]
pub enum FileContent {
    /// An open in-memory document; always treated as text
    Document(Arc<str>),
    /// Fully decoded file content
    Text(Arc<str>),
    /// A file that is read lazily
    Streamed(StreamedContent),
}

impl FileContent {
    pub fn is_document(&self) -> bool {
        matches!(self, Self::Document(_))
    }

    /// The decoded text, if it is already in memory.
    pub fn materialized(&self) -> Option<&Arc<str>> {
        match self {
            Self::Document(text) | Self::Text(text) => Some(text),
            Self::Streamed(streamed) => streamed.text.as_ref(),
        }
    }

    /// The full decoded text, reading whatever has not been loaded yet.
    pub fn text(&mut self) -> SearchResult<Arc<str>> {
        match self {
            Self::Document(text) | Self::Text(text) => Ok(Arc::clone(text)),
            Self::Streamed(streamed) => streamed.materialize(),
        }
    }
}

/// A file on disk that is only read as far as someone asks.
#[derive(Debug)]
pub struct StreamedContent {
    path: PathBuf,
    file: Option<File>,
    charset: Charset,
    mode: EncodingMode,
    loaded: Vec<u8>,
    bytes_read: usize,
    eof: bool,
    text: Option<Arc<str>>,
}

impl StreamedContent {
    pub fn open(path: &Path, charset: Charset, mode: EncodingMode) -> SearchResult<Self> {
        let file = File::open(path).map_err(|e| SearchError::from_io(e, path))?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Some(file),
            charset,
            mode,
            loaded: Vec::new(),
            bytes_read: 0,
            eof: false,
            text: None,
        })
    }

    /// Wraps a file that was already read whole; decoding still happens on demand.
    pub fn from_bytes(path: &Path, bytes: Vec<u8>, charset: Charset, mode: EncodingMode) -> Self {
        Self {
            path: path.to_path_buf(),
            file: None,
            charset,
            mode,
            bytes_read: bytes.len(),
            loaded: bytes,
            eof: true,
            text: None,
        }
    }

    /// Total bytes read from disk so far.
    pub fn bytes_read(&self) -> usize {
        self.bytes_read
    }

    pub fn charset(&self) -> Charset {
        self.charset
    }

    /// Returns up to `limit` leading bytes, reading no more than needed.
    pub fn prefix(&mut self, limit: usize) -> SearchResult<&[u8]> {
        self.fill_to(limit)?;
        let end = limit.min(self.loaded.len());
        Ok(&self.loaded[..end])
    }

    /// Fails with a conversion error if the first `limit` bytes cannot be decoded.
    pub fn check_prefix(&mut self, limit: usize) -> SearchResult<()> {
        self.fill_to(limit)?;
        let end = limit.min(self.loaded.len());
        self.charset
            .check_prefix(&self.loaded[..end], self.mode, &self.path)
    }

    fn fill_to(&mut self, limit: usize) -> SearchResult<()> {
        if self.eof || self.loaded.len() >= limit {
            return Ok(());
        }
        let Some(file) = self.file.as_mut() else {
            return Err(SearchError::content_unavailable(
                &self.path,
                "content was already released",
            ));
        };
        let want = (limit - self.loaded.len()) as u64;
        let read = file
            .by_ref()
            .take(want)
            .read_to_end(&mut self.loaded)
            .map_err(|e| SearchError::from_io(e, &self.path))?;
        self.bytes_read += read;
        if (read as u64) < want {
            self.eof = true;
        }
        Ok(())
    }

    /// Reads the rest of the file and decodes it.
    pub fn materialize(&mut self) -> SearchResult<Arc<str>> {
        if let Some(text) = &self.text {
            return Ok(Arc::clone(text));
        }
        if !self.eof {
            let Some(file) = self.file.as_mut() else {
                return Err(SearchError::content_unavailable(
                    &self.path,
                    "content was already released",
                ));
            };
            let read = file
                .read_to_end(&mut self.loaded)
                .map_err(|e| SearchError::from_io(e, &self.path))?;
            self.bytes_read += read;
            self.eof = true;
        }
        let decoded = self.charset.decode(&self.loaded, self.mode, &self.path)?;
        self.loaded = Vec::new();
        let text: Arc<str> = Arc::from(decoded);
        self.text = Some(Arc::clone(&text));
        Ok(text)
    }

    /// Closes the underlying file; decoded text stays available.
    pub fn close(&mut self) {
        self.file = None;
    }
}
