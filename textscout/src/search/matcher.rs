use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use std::fmt;
use std::sync::Arc;

use crate::collector::MatchCollector;
use crate::errors::{SearchError, SearchResult};
use crate::file::FileHandle;

/// Cancellation is polled once per this many finds
pub(crate) const CANCEL_CHECK_INTERVAL: usize = 20;

static PATTERN_CACHE: Lazy<DashMap<(String, usize), Arc<Regex>>> = Lazy::new(DashMap::new);

/// A compiled search pattern.
///
/// The empty pattern matches nothing: a search with it only visits files.
#[derive(Debug, Clone)]
pub struct SearchPattern {
    regex: Option<Arc<Regex>>,
}

impl SearchPattern {
    /// Compiles `pattern` with the default size limit
    pub fn new(pattern: &str) -> SearchResult<Self> {
        Self::with_size_limit(pattern, 10 * (1 << 20))
    }

    /// Compiles `pattern`, rejecting patterns whose compiled form exceeds `size_limit` bytes
    pub fn with_size_limit(pattern: &str, size_limit: usize) -> SearchResult<Self> {
        if pattern.is_empty() {
            return Ok(Self::empty());
        }
        let key = (pattern.to_string(), size_limit);
        if let Some(entry) = PATTERN_CACHE.get(&key) {
            return Ok(Self {
                regex: Some(Arc::clone(entry.value())),
            });
        }
        let regex = RegexBuilder::new(pattern)
            .size_limit(size_limit)
            .build()
            .map_err(|e| SearchError::invalid_pattern(e.to_string()))?;
        let regex = Arc::new(regex);
        PATTERN_CACHE.insert(key, Arc::clone(&regex));
        Ok(Self { regex: Some(regex) })
    }

    /// The pattern that only visits files
    pub fn empty() -> Self {
        Self { regex: None }
    }

    pub fn is_empty(&self) -> bool {
        self.regex.is_none()
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_deref().map_or("", Regex::as_str)
    }

    pub(crate) fn regex(&self) -> Option<&Regex> {
        self.regex.as_deref()
    }
}

/// One match inside a file's content.
///
/// Records are cheap to reuse: [`MatchRecord::initialize`] rebinds an existing record to a
/// new location. Offsets are byte offsets into the backing content.
#[derive(Clone)]
pub struct MatchRecord {
    file: FileHandle,
    offset: usize,
    length: usize,
    content: Arc<str>,
}

impl MatchRecord {
    pub fn new(file: FileHandle, offset: usize, length: usize, content: Arc<str>) -> Self {
        debug_assert!(offset + length <= content.len());
        Self {
            file,
            offset,
            length,
            content,
        }
    }

    /// Rebinds this record in place
    pub fn initialize(&mut self, file: &FileHandle, offset: usize, length: usize, content: &Arc<str>) {
        debug_assert!(offset + length <= content.len());
        if self.file != *file {
            self.file = file.clone();
        }
        self.offset = offset;
        self.length = length;
        if !Arc::ptr_eq(&self.content, content) {
            self.content = Arc::clone(content);
        }
    }

    pub fn file(&self) -> &FileHandle {
        &self.file
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn content_length(&self) -> usize {
        self.content.len()
    }

    /// The character starting at byte `offset`, if `offset` is on a character boundary
    pub fn content_char(&self, offset: usize) -> Option<char> {
        self.content.get(offset..)?.chars().next()
    }

    /// An owned copy of `length` bytes of content starting at `offset`
    pub fn content(&self, offset: usize, length: usize) -> Option<String> {
        self.content
            .get(offset..offset.checked_add(length)?)
            .map(str::to_owned)
    }

    /// An owned copy of the matched text
    pub fn matched_text(&self) -> String {
        self.content[self.offset..self.offset + self.length].to_owned()
    }

    /// 1-based line and column (in characters) of the match start
    pub fn line_and_column(&self) -> (usize, usize) {
        let before = &self.content[..self.offset];
        let line = 1 + before.matches('\n').count();
        let line_start = before.rfind('\n').map_or(0, |n| n + 1);
        let column = 1 + before[line_start..].chars().count();
        (line, column)
    }

    /// The full line containing the match start, without its terminator
    pub fn line_text(&self) -> String {
        let line_start = self.content[..self.offset].rfind('\n').map_or(0, |n| n + 1);
        let line_end = self.content[self.offset..]
            .find('\n')
            .map_or(self.content.len(), |n| self.offset + n);
        self.content[line_start..line_end]
            .trim_end_matches('\r')
            .to_owned()
    }
}

impl fmt::Debug for MatchRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatchRecord")
            .field("file", &self.file)
            .field("offset", &self.offset)
            .field("length", &self.length)
            .finish()
    }
}

/// Finds every non-empty match of `regex` in `content` and offers each to `collector`.
///
/// Returns the matches that were offered, in order. Stops early when the collector declines
/// further matches, or when `is_cancelled` reports true at one of the periodic checks.
pub(crate) fn locate_matches(
    file: &FileHandle,
    content: &Arc<str>,
    regex: &Regex,
    collector: &dyn MatchCollector,
    is_cancelled: impl Fn() -> bool,
) -> SearchResult<Vec<MatchRecord>> {
    let mut occurrences = Vec::new();
    for (k, found) in regex.find_iter(content).enumerate() {
        if found.end() != found.start() {
            let record = MatchRecord::new(
                file.clone(),
                found.start(),
                found.end() - found.start(),
                Arc::clone(content),
            );
            let go_on = collector.accept_pattern_match(&record)?;
            occurrences.push(record);
            if !go_on {
                return Ok(occurrences);
            }
        }
        if k % CANCEL_CHECK_INTERVAL == 0 && is_cancelled() {
            break;
        }
    }
    Ok(occurrences)
}
