// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Desktop host for builds where the Android picker is unavailable.
//
// The native file dialog stands in for the system picker and the local
// filesystem for the content provider. Picked paths travel as `file://`
// URIs so the resolver takes the same path it takes on a device.

use std::fs::File;
use std::io::ErrorKind;

use tracing::{debug, info};

use fileopen_core::error::{FileOpenError, Result};
use fileopen_core::types::{PickerOutcome, PickerUri};

use crate::mime::StaticMimeRegistry;
use crate::session::DeliveryReport;
use crate::traits::{ContentResolver, PickerSurface};
use crate::FileOpenBridge;

/// Surface backed by the platform's native file dialog.
///
/// The dialog is modal, so the outcome is known as soon as
/// [`launch_picker`](PickerSurface::launch_picker) returns; it is held
/// until the caller collects it with [`take_outcome`](Self::take_outcome).
#[derive(Debug)]
pub struct DesktopSurface {
    title: String,
    registered: bool,
    outcome: Option<PickerOutcome>,
}

impl DesktopSurface {
    pub fn new() -> Self {
        Self::with_title("Open file")
    }

    pub fn with_title(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            registered: false,
            outcome: None,
        }
    }

    /// The outcome of the last launch, if not yet collected.
    pub fn take_outcome(&mut self) -> Option<PickerOutcome> {
        self.outcome.take()
    }
}

impl Default for DesktopSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl PickerSurface for DesktopSurface {
    fn register_result_callback(&mut self) -> Result<()> {
        self.registered = true;
        Ok(())
    }

    fn launch_picker(&mut self, filter: &str) -> Result<()> {
        if !self.registered {
            return Err(FileOpenError::CallbackNotRegistered);
        }

        let extensions = StaticMimeRegistry.extensions_for_filter(filter);
        let mut dialog = rfd::FileDialog::new().set_title(self.title.as_str());
        if !extensions.is_empty() {
            dialog = dialog.add_filter(filter, &extensions[..]);
        }
        debug!(%filter, ?extensions, "showing native file dialog");

        self.outcome = Some(match dialog.pick_file() {
            Some(path) => PickerOutcome::Selected(PickerUri::from_path(&path)?),
            None => PickerOutcome::Cancelled,
        });
        Ok(())
    }

    fn finish(&mut self) {
        debug!(title = %self.title, "desktop picker surface finished");
    }
}

/// Serves `file://` URIs from the local filesystem.
///
/// There is no provider to ask for display names, so names always come from
/// the path's last segment or the fallback.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalContentResolver;

impl ContentResolver for LocalContentResolver {
    type Stream = File;

    fn query_display_name(&self, _uri: &PickerUri) -> Result<Option<String>> {
        Ok(None)
    }

    fn mime_type(&self, uri: &PickerUri) -> Option<String> {
        let path = uri.to_file_path()?;
        let ext = path.extension()?.to_str()?;
        StaticMimeRegistry.mime_for_extension(ext).map(str::to_owned)
    }

    fn open_input_stream(&self, uri: &PickerUri) -> Result<Option<File>> {
        let Some(path) = uri.to_file_path() else {
            return Ok(None);
        };
        match File::open(&path) {
            Ok(file) => Ok(Some(file)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Run one complete picker session through the native file dialog.
///
/// Blocks until the user picks or dismisses; the outcome is then readable
/// through `bridge.publisher()`.
pub fn open(bridge: &FileOpenBridge, filter: Option<&str>) -> Result<DeliveryReport> {
    let mut session = bridge.open(DesktopSurface::new(), filter)?;
    let outcome = session
        .surface_mut()
        .take_outcome()
        .unwrap_or(PickerOutcome::Cancelled);
    let resolver = bridge.resolver(LocalContentResolver, StaticMimeRegistry);
    let report = bridge.complete(&mut session, outcome, &resolver)?;
    info!(session = %session.id(), ?report, "desktop picker session complete");
    Ok(report)
}
