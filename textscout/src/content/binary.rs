use super::{ContentSource, FileContent};
use crate::errors::{SearchError, SearchResult};
use crate::file::FileHandle;

/// Decides whether `content` looks binary, reading at most `source.buffer_size()` bytes.
///
/// Cheapest checks first: in-memory text without a NUL is text, then the content-type
/// metadata, and only then a bounded scan of the leading bytes. A prefix that cannot be
/// decoded in the file's charset counts as binary.
pub fn has_binary_content(
    content: &mut FileContent,
    file: &FileHandle,
    source: &dyn ContentSource,
) -> SearchResult<bool> {
    if let Some(text) = content.materialized() {
        if !text.contains('\0') {
            return Ok(false);
        }
    }

    if source.content_kind(file)?.is_some_and(|kind| kind.is_text()) {
        return Ok(false);
    }

    let limit = source.buffer_size();
    match content {
        FileContent::Document(text) | FileContent::Text(text) => {
            let end = limit.min(text.len());
            Ok(text.as_bytes()[..end].contains(&0))
        }
        FileContent::Streamed(streamed) => {
            if streamed.prefix(limit)?.contains(&0) {
                return Ok(true);
            }
            match streamed.check_prefix(limit) {
                Ok(()) => Ok(false),
                Err(SearchError::CharConversion { .. }) => Ok(true),
                Err(e) => Err(e),
            }
        }
    }
}
