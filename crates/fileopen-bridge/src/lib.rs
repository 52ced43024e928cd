// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

//! FileOpen — native bridge to the host's permission-gated document picker.
//!
//! A [`FileOpenBridge`] owns the publication slot and hands out
//! [`PickerSession`]s bound to a transient UI surface. Each session launches
//! the picker, resolves the returned URI to `(display name, extension,
//! bytes)` and publishes the triple before finishing its surface. The
//! [`ClassLoaderPatcher`] is independent of the picker flow.
//!
//! Host contracts live in [`traits`]. Android implements them over JNI;
//! every other target gets a desktop implementation over the filesystem and
//! a native file dialog.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use fileopen_core::config::BridgeConfig;
use fileopen_core::error::Result;
use fileopen_core::types::PickerOutcome;

pub mod integrity;
pub mod mime;
pub mod patcher;
pub mod publisher;
pub mod resolver;
pub mod session;
pub mod traits;

#[cfg(target_os = "android")]
pub mod android;

#[cfg(not(target_os = "android"))]
pub mod desktop;

#[cfg(test)]
mod testing;

pub use patcher::ClassLoaderPatcher;
pub use publisher::Publisher;
pub use resolver::{Resolution, Resolver};
pub use session::{DeliveryReport, PickerSession};

use session::SessionLease;
use traits::{ContentResolver, MimeTypeRegistry, PickerSurface};

/// Owner of the published selection and gatekeeper for picker sessions.
///
/// At most one session is live at a time; a second `begin` fails with
/// `SessionBusy` until the first finishes or is dropped.
#[derive(Debug)]
pub struct FileOpenBridge {
    config: BridgeConfig,
    publisher: Publisher,
    patcher: ClassLoaderPatcher,
    busy: Arc<AtomicBool>,
}

impl FileOpenBridge {
    pub fn new(config: BridgeConfig) -> Self {
        let patcher = ClassLoaderPatcher::new(config.patcher.clone());
        Self {
            config,
            publisher: Publisher::new(),
            patcher,
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// A handle for the native consumer to read publications through.
    pub fn publisher(&self) -> Publisher {
        self.publisher.clone()
    }

    pub fn patcher(&self) -> &ClassLoaderPatcher {
        &self.patcher
    }

    /// Create and register a session on `surface` without launching it.
    pub fn begin<S: PickerSurface>(
        &self,
        surface: S,
        filter: Option<&str>,
    ) -> Result<PickerSession<S>> {
        let lease = SessionLease::acquire(&self.busy)?;
        let filter = self.config.effective_filter(filter).to_owned();
        Ok(PickerSession::new(surface, filter)?.with_lease(lease))
    }

    /// Create, register and launch a session.
    pub fn open<S: PickerSurface>(
        &self,
        surface: S,
        filter: Option<&str>,
    ) -> Result<PickerSession<S>> {
        let mut session = self.begin(surface, filter)?;
        session.start()?;
        Ok(session)
    }

    /// A resolver using this bridge's fallback display name.
    pub fn resolver<C, M>(&self, content: C, mime: M) -> Resolver<C, M>
    where
        C: ContentResolver,
        M: MimeTypeRegistry,
    {
        Resolver::new(content, mime, self.config.fallback_display_name.clone())
    }

    /// Feed the host's answer into `session` and publish through this bridge.
    pub fn complete<S, C, M>(
        &self,
        session: &mut PickerSession<S>,
        outcome: PickerOutcome,
        resolver: &Resolver<C, M>,
    ) -> Result<DeliveryReport>
    where
        S: PickerSurface,
        C: ContentResolver,
        M: MimeTypeRegistry,
    {
        session.deliver(outcome, resolver, &self.publisher)
    }

    /// Release the published bytes; metadata stays readable.
    pub fn clear(&self) {
        self.publisher.clear();
    }
}

impl Default for FileOpenBridge {
    fn default() -> Self {
        Self::new(BridgeConfig::default())
    }
}
