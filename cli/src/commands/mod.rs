// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the remedy CLI

pub mod config;
pub mod dedup;
pub mod ingest;
pub mod migrate;
pub mod serve;
pub mod suggestions;

pub use self::config::ConfigCommand;
pub use self::dedup::DedupCommand;
pub use self::ingest::IngestCommand;
pub use self::migrate::MigrateCommand;
pub use self::serve::ServeCommand;
pub use self::suggestions::SuggestionsCommand;

use anyhow::{Context, Result};
use serde::Serialize;

/// Print `value` as pretty JSON on stdout.
pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("Failed to render JSON")?;
    println!("{}", rendered);
    Ok(())
}
