// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// FileOpen — desktop driver
//
// Entry point. Initialises logging, loads the bridge configuration, runs one
// picker session through the native file dialog and prints what was
// published.
//
//   fileopen [--config PATH] [--out PATH] [MIME_FILTER]

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use serde::Serialize;

use fileopen_core::types::SelectionResult;

/// Pick one document and report what the bridge published.
#[derive(Debug, Default, PartialEq, Eq, Parser)]
#[command(name = "fileopen", version, about)]
struct Args {
    /// Bridge configuration file (JSON).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Write the picked bytes here.
    #[arg(long, value_name = "PATH")]
    out: Option<PathBuf>,

    /// MIME filter for the picker, e.g. `image/*`.
    #[arg(value_name = "MIME_FILTER")]
    filter: Option<String>,
}

/// What gets printed after a session.
#[derive(Debug, Serialize)]
struct Summary<'a> {
    outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    display_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    extension: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha256: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation: Option<u64>,
}

impl<'a> Summary<'a> {
    fn cancelled() -> Self {
        Self {
            outcome: "cancelled",
            display_name: None,
            extension: None,
            size: None,
            sha256: None,
            generation: None,
        }
    }

    fn of(outcome: &'static str, result: &'a SelectionResult) -> Self {
        Self {
            outcome,
            display_name: Some(&result.display_name),
            extension: Some(&result.extension),
            size: result.bytes().map(<[u8]>::len),
            sha256: result.content_hash.as_deref(),
            generation: Some(result.generation),
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    tracing::info!("FileOpen starting");
    run(args)
}

#[cfg(not(target_os = "android"))]
fn run(args: Args) -> ExitCode {
    use fileopen_bridge::{DeliveryReport, FileOpenBridge};
    use fileopen_core::config::BridgeConfig;

    let config = args
        .config
        .as_deref()
        .map(BridgeConfig::load_or_default)
        .unwrap_or_default();
    let bridge = FileOpenBridge::new(config);

    let report = match fileopen_bridge::desktop::open(&bridge, args.filter.as_deref()) {
        Ok(report) => report,
        Err(e) => {
            tracing::error!(error = %e, "picker session failed");
            eprintln!("fileopen: {e}");
            return ExitCode::FAILURE;
        }
    };

    let (summary, code) = match &report {
        DeliveryReport::Published(result) => (Summary::of("published", result), ExitCode::SUCCESS),
        DeliveryReport::Failed(result) => (Summary::of("failed", result), ExitCode::FAILURE),
        DeliveryReport::Cancelled => (Summary::cancelled(), ExitCode::SUCCESS),
    };
    match serde_json::to_string_pretty(&summary) {
        Ok(json) => println!("{json}"),
        Err(e) => tracing::warn!(error = %e, "could not render summary"),
    }

    if let (Some(out), DeliveryReport::Published(result)) = (&args.out, &report) {
        let bytes = result.bytes().unwrap_or_default();
        if let Err(e) = std::fs::write(out, bytes) {
            tracing::error!(path = %out.display(), error = %e, "could not write document");
            return ExitCode::FAILURE;
        }
        tracing::info!(path = %out.display(), bytes = bytes.len(), "document written");
    }

    // The driver is done with the bytes once they are printed or saved.
    bridge.clear();
    code
}

#[cfg(target_os = "android")]
fn run(_args: Args) -> ExitCode {
    eprintln!("fileopen: the desktop driver does not run on Android; use the JNI entry points");
    ExitCode::FAILURE
}
