// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Launcher — one picker session on one transient UI surface.
//
// The session is a state machine driven by two host events, `Selected(uri)`
// and `Cancelled`:
//
//   New --start--> Picking --selected--> Resolving --ok---> Published --finish--> Done
//                     |                            \-fail-> Failed ----finish--> Done
//                     \--cancelled----------------------------------------------> Done
//
// The result callback is registered when the session is constructed, so a
// session that exists can always be started. Cancellation leaves the
// publisher untouched: the consumer keeps seeing the previous selection.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{info, warn};

use fileopen_core::error::{FileOpenError, Result};
use fileopen_core::types::{PickerOutcome, SelectionResult, SessionId, SessionState};

use crate::publisher::Publisher;
use crate::resolver::Resolver;
use crate::traits::{ContentResolver, MimeTypeRegistry, PickerSurface};

/// How a delivered picker result was handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryReport {
    /// The document was read and published.
    Published(Arc<SelectionResult>),
    /// The document could not be read; a failure was published.
    Failed(Arc<SelectionResult>),
    /// The picker returned nothing; nothing was published.
    Cancelled,
}

/// Exclusive claim on the bridge's single session slot. Released on drop.
#[derive(Debug)]
pub(crate) struct SessionLease(Arc<AtomicBool>);

impl SessionLease {
    pub(crate) fn acquire(flag: &Arc<AtomicBool>) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| FileOpenError::SessionBusy)?;
        Ok(Self(Arc::clone(flag)))
    }
}

impl Drop for SessionLease {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// A picker session bound to one surface.
pub struct PickerSession<S: PickerSurface> {
    id: SessionId,
    filter: String,
    state: SessionState,
    surface: S,
    lease: Option<SessionLease>,
}

impl<S: PickerSurface> PickerSession<S> {
    /// Create a session and register its result callback with the host.
    pub fn new(mut surface: S, filter: impl Into<String>) -> Result<Self> {
        let id = SessionId::new();
        let filter = filter.into();
        surface.register_result_callback()?;
        info!(session = %id, %filter, "picker session registered");
        Ok(Self {
            id,
            filter,
            state: SessionState::New,
            surface,
            lease: None,
        })
    }

    pub(crate) fn with_lease(mut self, lease: SessionLease) -> Self {
        self.lease = Some(lease);
        self
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    /// Show the picker. If the host refuses, the surface is finished and
    /// the session ends in `Done`.
    pub fn start(&mut self) -> Result<()> {
        self.require_state(SessionState::New)?;
        if let Err(e) = self.surface.launch_picker(&self.filter) {
            warn!(session = %self.id, error = %e, "picker launch refused");
            self.finish();
            return Err(e);
        }
        self.state = SessionState::Picking;
        info!(session = %self.id, filter = %self.filter, "picker launched");
        Ok(())
    }

    /// Handle the host's answer, publish, and finish the surface.
    ///
    /// Only valid while `Picking`; a second delivery is rejected without
    /// touching the publisher.
    pub fn deliver<C, M>(
        &mut self,
        outcome: PickerOutcome,
        resolver: &Resolver<C, M>,
        publisher: &Publisher,
    ) -> Result<DeliveryReport>
    where
        C: ContentResolver,
        M: MimeTypeRegistry,
    {
        self.require_state(SessionState::Picking)?;

        let report = match outcome {
            PickerOutcome::Cancelled => {
                info!(session = %self.id, "picker cancelled; previous selection kept");
                DeliveryReport::Cancelled
            }
            PickerOutcome::Selected(uri) => {
                self.state = SessionState::Resolving;
                info!(session = %self.id, %uri, "picker returned a document");
                let result = publisher.publish_resolution(resolver.resolve(&uri));
                if result.is_failed() {
                    self.state = SessionState::Failed;
                    DeliveryReport::Failed(result)
                } else {
                    self.state = SessionState::Published;
                    DeliveryReport::Published(result)
                }
            }
        };

        self.finish();
        Ok(report)
    }

    fn finish(&mut self) {
        self.surface.finish();
        self.state = SessionState::Done;
        self.lease = None;
        info!(session = %self.id, "picker surface finished");
    }

    fn require_state(&self, expected: SessionState) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(FileOpenError::InvalidState {
                expected,
                actual: self.state,
            })
        }
    }
}
