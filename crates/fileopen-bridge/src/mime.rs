// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Built-in MIME type <-> extension table for hosts without a registry of
// their own.

use crate::traits::MimeTypeRegistry;

/// MIME type and its extensions, preferred extension first.
const MIME_TABLE: &[(&str, &[&str])] = &[
    ("application/pdf", &["pdf"]),
    ("application/json", &["json"]),
    ("application/zip", &["zip"]),
    ("application/octet-stream", &["bin"]),
    ("application/postscript", &["ps", "eps"]),
    ("image/jpeg", &["jpg", "jpeg"]),
    ("image/png", &["png"]),
    ("image/gif", &["gif"]),
    ("image/webp", &["webp"]),
    ("image/bmp", &["bmp"]),
    ("image/tiff", &["tif", "tiff"]),
    ("image/vnd.adobe.photoshop", &["psd"]),
    ("text/plain", &["txt", "text"]),
    ("text/csv", &["csv"]),
    ("text/html", &["html", "htm"]),
    ("audio/mpeg", &["mp3"]),
    ("audio/ogg", &["ogg"]),
    ("video/mp4", &["mp4"]),
];

/// Static registry backed by [`MIME_TABLE`].
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticMimeRegistry;

impl StaticMimeRegistry {
    /// Infer a MIME type from a file extension.
    pub fn mime_for_extension(&self, ext: &str) -> Option<&'static str> {
        let ext = ext.to_ascii_lowercase();
        MIME_TABLE
            .iter()
            .find(|(_, exts)| exts.contains(&ext.as_str()))
            .map(|(mime, _)| *mime)
    }

    /// Every extension matching a picker filter such as `image/*` or
    /// `text/plain`. Empty for `*/*` and unknown types, meaning "no filter".
    pub fn extensions_for_filter(&self, filter: &str) -> Vec<&'static str> {
        let filter = filter.trim().to_ascii_lowercase();
        let (major, minor) = filter.split_once('/').unwrap_or((filter.as_str(), "*"));
        if major == "*" {
            return Vec::new();
        }
        MIME_TABLE
            .iter()
            .filter(|(mime, _)| {
                let (m, s) = mime.split_once('/').unwrap_or((*mime, ""));
                m == major && (minor == "*" || s == minor)
            })
            .flat_map(|(_, exts)| exts.iter().copied())
            .collect()
    }
}

impl MimeTypeRegistry for StaticMimeRegistry {
    fn extension_from_mime_type(&self, mime_type: &str) -> Option<String> {
        let mime = mime_type.trim().to_ascii_lowercase();
        MIME_TABLE
            .iter()
            .find(|(m, _)| *m == mime)
            .and_then(|(_, exts)| exts.first())
            .map(|ext| (*ext).to_owned())
    }
}
