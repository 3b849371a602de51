use std::borrow::Cow;
use std::path::Path;
use tracing::warn;

use crate::config::EncodingMode;
use crate::errors::{SearchError, SearchResult};

/// Character sets the local content source can decode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charset {
    Utf8,
    UsAscii,
    Latin1,
}

impl Charset {
    /// Resolves a charset name as declared on a file.
    ///
    /// Names that could never be a charset (empty, or containing characters outside
    /// `[A-Za-z0-9-+:_.]`) are illegal; well-formed names we cannot decode are unsupported.
    pub fn for_name(name: &str, path: &Path) -> SearchResult<Self> {
        if !is_legal_name(name) {
            return Err(SearchError::illegal_charset_name(name, path));
        }
        let normalized: String = name
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match normalized.as_str() {
            "utf8" => Ok(Self::Utf8),
            "usascii" | "ascii" => Ok(Self::UsAscii),
            "iso88591" | "latin1" | "l1" => Ok(Self::Latin1),
            _ => Err(SearchError::unsupported_charset(name, path)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Utf8 => "UTF-8",
            Self::UsAscii => "US-ASCII",
            Self::Latin1 => "ISO-8859-1",
        }
    }

    /// Decodes a complete file.
    pub fn decode(&self, bytes: &[u8], mode: EncodingMode, path: &Path) -> SearchResult<String> {
        match self {
            Self::Utf8 => match mode {
                EncodingMode::FailFast => match std::str::from_utf8(bytes) {
                    Ok(valid) => Ok(valid.to_owned()),
                    Err(e) => Err(SearchError::char_conversion(
                        self.name(),
                        e.valid_up_to(),
                        path,
                    )),
                },
                EncodingMode::Lossy => {
                    let cow = String::from_utf8_lossy(bytes);
                    // Owned means at least one invalid sequence was replaced
                    if let Cow::Owned(_) = cow {
                        warn!("Invalid UTF-8 replaced in file: {}", path.display());
                    }
                    Ok(cow.into_owned())
                }
            },
            Self::UsAscii => match (mode, bytes.iter().position(|b| !b.is_ascii())) {
                (_, None) => Ok(bytes.iter().map(|&b| b as char).collect()),
                (EncodingMode::FailFast, Some(offset)) => {
                    Err(SearchError::char_conversion(self.name(), offset, path))
                }
                (EncodingMode::Lossy, Some(_)) => {
                    warn!("Non-ASCII bytes replaced in file: {}", path.display());
                    Ok(bytes
                        .iter()
                        .map(|&b| if b.is_ascii() { b as char } else { '\u{FFFD}' })
                        .collect())
                }
            },
            Self::Latin1 => Ok(bytes.iter().map(|&b| b as char).collect()),
        }
    }

    /// Checks that a file prefix decodes cleanly. A multi-byte sequence cut off by the end
    /// of the prefix is not an error.
    pub fn check_prefix(&self, bytes: &[u8], mode: EncodingMode, path: &Path) -> SearchResult<()> {
        if mode == EncodingMode::Lossy {
            return Ok(());
        }
        match self {
            Self::Utf8 => match std::str::from_utf8(bytes) {
                Err(e) if e.error_len().is_some() => Err(SearchError::char_conversion(
                    self.name(),
                    e.valid_up_to(),
                    path,
                )),
                _ => Ok(()),
            },
            Self::UsAscii => match bytes.iter().position(|b| !b.is_ascii()) {
                Some(offset) => Err(SearchError::char_conversion(self.name(), offset, path)),
                None => Ok(()),
            },
            Self::Latin1 => Ok(()),
        }
    }
}

fn is_legal_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphanumeric() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '+' | ':' | '_' | '.'))
}
