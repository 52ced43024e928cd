// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Publisher — the slot through which the native consumer observes the
// outcome of a picker session.
//
// Each publication is a single immutable `SelectionResult` swapped in under
// a write lock, so a reader holding a snapshot sees either the previous
// triple or the new one in full, never a mix. Handles are cheap clones of
// one shared slot; the bridge owns it and consumers read through a handle.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::Utc;
use tracing::{debug, info};

use fileopen_core::types::{SelectionContent, SelectionResult};

use crate::integrity::hash_bytes;
use crate::resolver::Resolution;

#[derive(Debug, Default)]
struct Slot {
    current: Option<Arc<SelectionResult>>,
    generation: u64,
}

/// Shared handle to the published selection.
#[derive(Debug, Clone, Default)]
pub struct Publisher {
    slot: Arc<RwLock<Slot>>,
}

impl Publisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a fully read document.
    pub fn publish(
        &self,
        display_name: impl Into<String>,
        extension: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Arc<SelectionResult> {
        let content_hash = Some(hash_bytes(&bytes));
        self.swap_in(
            display_name.into(),
            extension.into(),
            SelectionContent::Bytes(Arc::from(bytes)),
            content_hash,
        )
    }

    /// Publish a failed read. Bytes are absent.
    pub fn publish_failure(
        &self,
        display_name: impl Into<String>,
        extension: impl Into<String>,
    ) -> Arc<SelectionResult> {
        self.swap_in(
            display_name.into(),
            extension.into(),
            SelectionContent::Failed,
            None,
        )
    }

    /// Publish whatever the resolver produced.
    pub fn publish_resolution(&self, resolution: Resolution) -> Arc<SelectionResult> {
        match resolution.bytes {
            Ok(bytes) => self.publish(resolution.display_name, resolution.extension, bytes),
            Err(_) => self.publish_failure(resolution.display_name, resolution.extension),
        }
    }

    /// The current publication, if any.
    pub fn snapshot(&self) -> Option<Arc<SelectionResult>> {
        self.read_slot().current.clone()
    }

    /// Bytes are published and not cleared.
    pub fn is_ready(&self) -> bool {
        self.snapshot().is_some_and(|r| r.is_ready())
    }

    /// The last publication recorded a failure.
    pub fn is_failed(&self) -> bool {
        self.snapshot().is_some_and(|r| r.is_failed())
    }

    /// Number of publications made through this slot.
    pub fn generation(&self) -> u64 {
        self.read_slot().generation
    }

    /// Release the published bytes. Name, extension, generation and a
    /// recorded failure stay.
    ///
    /// Idempotent; a no-op before the first publication.
    pub fn clear(&self) {
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        let Some(current) = slot.current.as_ref() else {
            return;
        };
        if !current.is_ready() {
            return;
        }
        let cleared = SelectionResult {
            content: SelectionContent::Cleared,
            content_hash: None,
            ..SelectionResult::clone(current)
        };
        debug!(
            generation = cleared.generation,
            name = %cleared.display_name,
            "cleared published bytes"
        );
        slot.current = Some(Arc::new(cleared));
    }

    fn swap_in(
        &self,
        display_name: String,
        extension: String,
        content: SelectionContent,
        content_hash: Option<String>,
    ) -> Arc<SelectionResult> {
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        slot.generation += 1;
        let result = Arc::new(SelectionResult {
            display_name,
            extension,
            content,
            content_hash,
            generation: slot.generation,
            published_at: Utc::now(),
        });
        slot.current = Some(Arc::clone(&result));
        info!(
            generation = result.generation,
            name = %result.display_name,
            ext = %result.extension,
            failed = result.is_failed(),
            bytes = result.bytes().map_or(0, <[u8]>::len),
            "published selection"
        );
        result
    }

    fn read_slot(&self) -> std::sync::RwLockReadGuard<'_, Slot> {
        self.slot.read().unwrap_or_else(PoisonError::into_inner)
    }
}
