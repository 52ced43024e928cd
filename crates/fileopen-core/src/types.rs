// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the FileOpen bridge.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::error::{FileOpenError, Result};

/// Unique identifier for a picker session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle states of a picker session.
///
/// ```text
/// New -> Picking -> Resolving -> Published -> Done
///           |                 \-> Failed ----> Done
///           \-> (cancelled) ----------------> Done
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// Created and registered, picker not yet shown.
    New,
    /// Picker visible, awaiting the host's result.
    Picking,
    /// A URI arrived and is being resolved.
    Resolving,
    /// Result published to the consumer.
    Published,
    /// Resolution failed; failure published.
    Failed,
    /// Surface finished. Terminal.
    Done,
}

/// What the host picker reported back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickerOutcome {
    /// The user chose a document.
    Selected(PickerUri),
    /// The picker returned no URI.
    Cancelled,
}

impl PickerOutcome {
    /// Map a nullable URI string from the host into an outcome.
    pub fn from_nullable(uri: Option<String>) -> Self {
        match uri {
            Some(raw) if !raw.is_empty() => Self::Selected(PickerUri::new(raw)),
            _ => Self::Cancelled,
        }
    }
}

// ---------------------------------------------------------------------------
// URIs
// ---------------------------------------------------------------------------

/// Scheme of a picker URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UriScheme {
    Content,
    File,
    /// Anything else, lowercased. Empty when the URI has no scheme.
    Other(String),
}

/// An opaque, scheme-tagged resource identifier handed back by the picker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PickerUri(String);

impl PickerUri {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn scheme(&self) -> UriScheme {
        match self.parsed() {
            Some(url) => match url.scheme() {
                "content" => UriScheme::Content,
                "file" => UriScheme::File,
                other => UriScheme::Other(other.to_owned()),
            },
            None => UriScheme::Other(String::new()),
        }
    }

    /// Final non-empty path segment, percent-decoded.
    pub fn last_path_segment(&self) -> Option<String> {
        let url = self.parsed()?;
        let segment = url.path_segments()?.filter(|s| !s.is_empty()).next_back()?;
        Some(percent_decode_str(segment).decode_utf8_lossy().into_owned())
    }

    /// Build a `file://` URI for an absolute local path.
    pub fn from_path(path: &Path) -> Result<Self> {
        Url::from_file_path(path)
            .map(|url| Self(url.into()))
            .map_err(|()| FileOpenError::RelativePath(path.to_path_buf()))
    }

    /// The local path behind a `file://` URI.
    pub fn to_file_path(&self) -> Option<PathBuf> {
        self.parsed()?.to_file_path().ok()
    }

    fn parsed(&self) -> Option<Url> {
        Url::parse(&self.0).ok()
    }
}

impl std::fmt::Display for PickerUri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Published result
// ---------------------------------------------------------------------------

/// Payload half of a [`SelectionResult`].
///
/// Bytes and failure are mutually exclusive, so a result can never be
/// partially populated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionContent {
    /// The document was read in full.
    Bytes(Arc<[u8]>),
    /// The document could not be opened or read.
    Failed,
    /// The consumer released the bytes; metadata is retained.
    Cleared,
}

/// The triple the bridge publishes for the native consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionResult {
    /// Never empty or whitespace-only.
    pub display_name: String,
    /// Text after the last `.` of the name, or the MIME registry's answer. May be empty.
    pub extension: String,
    pub content: SelectionContent,
    /// Lowercase hex SHA-256 of the bytes, when present.
    pub content_hash: Option<String>,
    /// Monotonic per publisher; unchanged by `clear`.
    pub generation: u64,
    pub published_at: DateTime<Utc>,
}

impl SelectionResult {
    pub fn bytes(&self) -> Option<&[u8]> {
        match &self.content {
            SelectionContent::Bytes(bytes) => Some(&bytes[..]),
            _ => None,
        }
    }

    /// Bytes are present and readable.
    pub fn is_ready(&self) -> bool {
        matches!(self.content, SelectionContent::Bytes(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.content, SelectionContent::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheme_detection() {
        assert_eq!(PickerUri::new("content://provider/doc/42").scheme(), UriScheme::Content);
        assert_eq!(PickerUri::new("FILE:///sdcard/a.txt").scheme(), UriScheme::File);
        assert_eq!(
            PickerUri::new("https://example.org/x").scheme(),
            UriScheme::Other("https".into())
        );
        assert_eq!(PickerUri::new("/no/scheme").scheme(), UriScheme::Other(String::new()));
    }

    #[test]
    fn last_segment_of_file_uri() {
        let uri = PickerUri::new("file:///sdcard/notes.txt");
        assert_eq!(uri.last_path_segment().as_deref(), Some("notes.txt"));

        let hidden = PickerUri::new("file:///tmp/.hidden");
        assert_eq!(hidden.last_path_segment().as_deref(), Some(".hidden"));
    }

    #[test]
    fn last_segment_ignores_query_and_trailing_slash() {
        let uri = PickerUri::new("file:///data/report%20final.pdf?x=1#frag");
        assert_eq!(uri.last_path_segment().as_deref(), Some("report final.pdf"));

        let dir = PickerUri::new("file:///data/dir/");
        assert_eq!(dir.last_path_segment().as_deref(), Some("dir"));

        assert_eq!(PickerUri::new("file://").last_path_segment(), None);
    }

    #[test]
    fn authority_is_not_a_segment() {
        let uri = PickerUri::new("content://com.example.provider");
        assert_eq!(uri.last_path_segment(), None);
    }

    #[test]
    fn file_path_conversion() {
        let uri = PickerUri::from_path(Path::new("/tmp/my file#1.txt")).expect("absolute");
        assert_eq!(uri.as_str(), "file:///tmp/my%20file%231.txt");
        assert_eq!(uri.to_file_path(), Some(PathBuf::from("/tmp/my file#1.txt")));
        assert_eq!(uri.last_path_segment().as_deref(), Some("my file#1.txt"));

        let accented = PickerUri::from_path(Path::new("/tmp/résumé.pdf")).expect("absolute");
        assert_eq!(accented.as_str(), "file:///tmp/r%C3%A9sum%C3%A9.pdf");
        assert_eq!(accented.last_path_segment().as_deref(), Some("résumé.pdf"));

        assert_eq!(PickerUri::new("content://p/doc").to_file_path(), None);
    }

    #[test]
    fn relative_path_is_rejected() {
        let err = PickerUri::from_path(Path::new("docs/a.txt")).expect_err("relative");
        assert!(matches!(err, FileOpenError::RelativePath(p) if p == Path::new("docs/a.txt")));
    }

    #[test]
    fn malformed_escape_is_kept() {
        let uri = PickerUri::new("file:///tmp/100%");
        assert_eq!(uri.last_path_segment().as_deref(), Some("100%"));
        let uri = PickerUri::new("file:///tmp/a%zzb");
        assert_eq!(uri.last_path_segment().as_deref(), Some("a%zzb"));
    }

    #[test]
    fn null_uri_is_cancellation() {
        assert_eq!(PickerOutcome::from_nullable(None), PickerOutcome::Cancelled);
        assert_eq!(PickerOutcome::from_nullable(Some(String::new())), PickerOutcome::Cancelled);
        assert_eq!(
            PickerOutcome::from_nullable(Some("content://p/1".into())),
            PickerOutcome::Selected(PickerUri::new("content://p/1"))
        );
    }

    #[test]
    fn content_flags() {
        let result = SelectionResult {
            display_name: "a.bin".into(),
            extension: "bin".into(),
            content: SelectionContent::Bytes(Arc::from(vec![1u8, 2])),
            content_hash: None,
            generation: 1,
            published_at: Utc::now(),
        };
        assert!(result.is_ready());
        assert!(!result.is_failed());
        assert_eq!(result.bytes(), Some(&[1u8, 2][..]));

        let failed = SelectionResult { content: SelectionContent::Failed, ..result };
        assert!(failed.is_failed());
        assert!(failed.bytes().is_none());
    }
}
