// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Resolver — turns the URI handed back by the picker into a display name,
// an extension and the document bytes.
//
// Name and extension derivation never fail: missing metadata falls back to
// the sentinel name and the MIME registry. Only the byte read can fail, and
// the host stream is released on every exit path because it is owned by a
// local that drops when `read_bytes` returns.

use std::io::Read;

use tracing::{debug, info, warn};

use fileopen_core::error::{FileOpenError, Result};
use fileopen_core::types::{PickerUri, UriScheme};

use crate::traits::{ContentResolver, MimeTypeRegistry};

/// Everything the resolver learned about one URI.
#[derive(Debug)]
pub struct Resolution {
    pub display_name: String,
    pub extension: String,
    pub bytes: Result<Vec<u8>>,
}

/// Resolves picker URIs against a host content resolver and MIME registry.
pub struct Resolver<C, M> {
    content: C,
    mime: M,
    fallback_name: String,
}

impl<C: ContentResolver, M: MimeTypeRegistry> Resolver<C, M> {
    pub fn new(content: C, mime: M, fallback_name: impl Into<String>) -> Self {
        Self {
            content,
            mime,
            fallback_name: fallback_name.into(),
        }
    }

    /// Derive metadata and read the document behind `uri`.
    pub fn resolve(&self, uri: &PickerUri) -> Resolution {
        let display_name = self.display_name(uri);
        let extension = self.extension(uri, &display_name);
        let bytes = self.read_bytes(uri);
        match &bytes {
            Ok(data) => info!(
                %uri,
                name = %display_name,
                ext = %extension,
                bytes = data.len(),
                "resolved picked document"
            ),
            Err(e) => {
                warn!(%uri, name = %display_name, error = %e, "failed to read picked document")
            }
        }
        Resolution {
            display_name,
            extension,
            bytes,
        }
    }

    /// Human-readable name for `uri`; never empty or whitespace-only.
    ///
    /// `content://` URIs ask the provider's display-name column, `file://`
    /// URIs use their last path segment. Anything else, or a blank answer,
    /// yields the fallback name.
    pub fn display_name(&self, uri: &PickerUri) -> String {
        let derived = match uri.scheme() {
            UriScheme::Content => match self.content.query_display_name(uri) {
                Ok(name) => name,
                Err(e) => {
                    debug!(%uri, error = %e, "display-name query failed");
                    None
                }
            },
            UriScheme::File => uri.last_path_segment(),
            UriScheme::Other(_) => None,
        };

        match derived {
            Some(name) if !name.trim().is_empty() => name,
            _ => {
                debug!(%uri, fallback = %self.fallback_name, "no display name; using fallback");
                self.fallback_name.clone()
            }
        }
    }

    /// Extension for `display_name`: the text after its last `.` when it has
    /// one (so `.hidden` yields `hidden`), otherwise whatever the MIME
    /// registry maps the URI's type to. May be empty.
    pub fn extension(&self, uri: &PickerUri, display_name: &str) -> String {
        if let Some(dot) = display_name.rfind('.') {
            return display_name[dot + 1..].to_owned();
        }
        self.content
            .mime_type(uri)
            .and_then(|mime| self.mime.extension_from_mime_type(&mime))
            .unwrap_or_default()
    }

    /// Read the whole document into memory.
    pub fn read_bytes(&self, uri: &PickerUri) -> Result<Vec<u8>> {
        let Some(mut stream) = self.content.open_input_stream(uri)? else {
            return Err(FileOpenError::StreamUnavailable {
                uri: uri.to_string(),
            });
        };
        let mut bytes = Vec::new();
        stream.read_to_end(&mut bytes)?;
        Ok(bytes)
    }
}
