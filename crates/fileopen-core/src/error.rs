// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for FileOpen.

use thiserror::Error;

use crate::types::SessionState;

/// Top-level error type for all FileOpen operations.
#[derive(Debug, Error)]
pub enum FileOpenError {
    // -- Picker session --
    #[error("session is {actual:?}, expected {expected:?}")]
    InvalidState {
        expected: SessionState,
        actual: SessionState,
    },

    #[error("picker launched before the result callback was registered")]
    CallbackNotRegistered,

    #[error("another picker session is already active")]
    SessionBusy,

    // -- Resolver --
    #[error("content resolver returned no stream for {uri}")]
    StreamUnavailable { uri: String },

    // -- Class-loader patcher --
    #[error("no declared field `{field}` on {class}")]
    FieldNotFound { class: String, field: String },

    #[error("field `{field}` holds null")]
    NullSlot { field: String },

    #[error("package `{0}` has no runtime record")]
    PackageNotFound(String),

    #[error("package record for `{0}` has been reclaimed")]
    ReferentReclaimed(String),

    // -- URIs --
    #[error("not an absolute path: {}", .0.display())]
    RelativePath(std::path::PathBuf),

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // -- Platform bridge --
    #[error("platform bridge error: {0}")]
    Bridge(String),

    #[error("feature not available on this platform")]
    PlatformUnavailable,
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, FileOpenError>;
