// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-agnostic trait definitions for the host contracts the bridge
// consumes.
//
// Each host (Android through JNI, desktop through the filesystem and a
// native dialog, tests through in-memory fakes) supplies these, and the
// session, resolver and patcher are written once against them.

use std::io::Read;

use fileopen_core::error::Result;
use fileopen_core::types::PickerUri;

/// The transient UI surface that hosts one picker session.
pub trait PickerSurface {
    /// Register the result callback with the host's result-delivery
    /// machinery. Must happen before [`launch_picker`](Self::launch_picker).
    fn register_result_callback(&mut self) -> Result<()>;

    /// Show the system picker restricted (advisorily) to `filter`.
    ///
    /// Returns once the request has been issued; the outcome arrives later.
    fn launch_picker(&mut self, filter: &str) -> Result<()>;

    /// Tear the surface down. Failures are logged, never surfaced.
    fn finish(&mut self);
}

/// Access to documents and their metadata behind picker URIs.
pub trait ContentResolver {
    /// A readable stream over one document. Dropping it releases the
    /// underlying host stream.
    type Stream: Read;

    /// Query the display-name column for `uri`.
    ///
    /// `Ok(None)` when the provider has no row or no such column.
    fn query_display_name(&self, uri: &PickerUri) -> Result<Option<String>>;

    /// MIME type the host reports for `uri`, if any.
    fn mime_type(&self, uri: &PickerUri) -> Option<String>;

    /// Open a stream over `uri`. `Ok(None)` mirrors a host that returns no
    /// stream without raising.
    fn open_input_stream(&self, uri: &PickerUri) -> Result<Option<Self::Stream>>;
}

/// The host's MIME-type to file-extension registry.
pub trait MimeTypeRegistry {
    /// Extension (without the dot) registered for `mime_type`.
    fn extension_from_mime_type(&self, mime_type: &str) -> Option<String>;
}

/// Reflective access to the host runtime's internal records.
///
/// Every value (class, field, object) is an opaque [`Handle`](Self::Handle).
/// Lookups that can legitimately come back empty return `Option`.
pub trait HostRuntime {
    type Handle: Clone;

    /// Resolve a class by its JNI-style name (`android/app/Activity`).
    fn find_class(&mut self, name: &str) -> Result<Self::Handle>;

    /// Runtime class of `object`.
    fn class_of(&mut self, object: &Self::Handle) -> Result<Self::Handle>;

    /// Fields declared directly on `class`, superclasses excluded.
    fn declared_fields(&mut self, class: &Self::Handle) -> Result<Vec<Self::Handle>>;

    fn field_name(&mut self, field: &Self::Handle) -> Result<String>;

    /// Lift access checks on `field` regardless of its visibility.
    fn set_accessible(&mut self, field: &Self::Handle) -> Result<()>;

    /// Read `field` on `target`. `Ok(None)` when the slot holds null.
    fn get_field(&mut self, field: &Self::Handle, target: &Self::Handle)
    -> Result<Option<Self::Handle>>;

    /// Overwrite `field` on `target` with `value`.
    fn set_field(
        &mut self,
        field: &Self::Handle,
        target: &Self::Handle,
        value: &Self::Handle,
    ) -> Result<()>;

    /// Package name of a context object.
    fn package_name(&mut self, context: &Self::Handle) -> Result<String>;

    /// Look `key` up in a map object.
    fn map_lookup(&mut self, map: &Self::Handle, key: &str) -> Result<Option<Self::Handle>>;

    /// Resolve a weak reference. `Ok(None)` once the referent is reclaimed.
    fn weak_referent(&mut self, weak: &Self::Handle) -> Result<Option<Self::Handle>>;
}
