// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bridge configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Display name used when the host yields none.
pub const FALLBACK_DISPLAY_NAME: &str = "dummy.dat";

/// Settings for the picker bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// MIME filter used when the caller supplies none.
    pub default_filter: String,
    /// Sentinel display name substituted when none can be derived.
    pub fallback_display_name: String,
    /// Fully qualified managed class hosting the transient picker surface.
    pub surface_activity_class: String,
    /// Request code registered for the picker result.
    pub request_code: i32,
    /// Buffer size used when draining a host input stream.
    pub read_chunk_size: usize,
    /// Slot names for the class-loader patcher.
    pub patcher: PatcherConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            default_filter: "*/*".into(),
            fallback_display_name: FALLBACK_DISPLAY_NAME.into(),
            surface_activity_class: "dev.fileopen.FileOpenActivity".into(),
            request_code: 0x464F_0001, // "FO" + 1
            read_chunk_size: 8192,
            patcher: PatcherConfig::default(),
        }
    }
}

impl BridgeConfig {
    /// Read a configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Read a configuration, falling back to defaults if the file is
    /// missing or malformed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "using default bridge config");
                Self::default()
            }
        }
    }

    /// Persist this configuration as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// The filter to launch with: the caller's if non-blank, else the default.
    pub fn effective_filter<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        match requested.map(str::trim) {
            Some(f) if !f.is_empty() => f,
            _ => &self.default_filter,
        }
    }
}

/// Host-runtime slot names used by the class-loader patcher.
///
/// These are private implementation details of the host and drift between
/// releases. Callers version-gate by supplying a different set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatcherConfig {
    /// Class declaring the main-thread slot, in JNI form.
    pub activity_class: String,
    /// Slot on `activity_class` holding the per-process main-thread record.
    pub main_thread_field: String,
    /// Slot on the main-thread record holding the package map.
    pub packages_field: String,
    /// Slot on the package record holding its class loader.
    pub class_loader_field: String,
}

impl Default for PatcherConfig {
    fn default() -> Self {
        Self {
            activity_class: "android/app/Activity".into(),
            main_thread_field: "mMainThread".into(),
            packages_field: "mPackages".into(),
            class_loader_field: "mClassLoader".into(),
        }
    }
}
