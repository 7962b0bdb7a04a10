// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use remedy_core::domain::config::RemedyConfigManifest;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate a configuration file populated with defaults
    Generate {
        /// Output path
        #[arg(short, long, default_value = "./remedy-config.yaml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, force } => generate(output, force).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = RemedyConfigManifest::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. REMEDY_CONFIG_PATH: {}",
            std::env::var("REMEDY_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./remedy-config.yaml");
        println!("  4. ~/.remedy/config.yaml");
        println!("  5. /etc/remedy/config.yaml");
        println!();
    }

    println!("{}", "Current configuration:".bold());
    println!("  Name: {}", config.metadata.name);
    println!();

    let embedding = &config.spec.embedding;
    println!("{}", "Embedding:".bold());
    println!("  Provider: {:?}", embedding.provider);
    println!("  Endpoint: {}", embedding.endpoint);
    println!("  Model: {} ({} dimensions)", embedding.model, embedding.dimension);
    println!(
        "  Retries: {} attempts, {}ms..{}ms backoff",
        embedding.retry.max_attempts, embedding.retry.initial_delay_ms, embedding.retry.max_delay_ms
    );
    println!("  Cache capacity: {}", embedding.cache_capacity);
    println!();

    println!("{}", "Deduplication:".bold());
    println!(
        "  Similarity threshold: {}",
        config.spec.deduplication.similarity_threshold
    );
    println!("  Batch size: {}", config.spec.deduplication.batch_size);
    println!();

    let storage = &config.spec.storage;
    println!("{}", "Storage:".bold());
    println!("  Backend: {:?}", storage.backend);
    if let Some(url) = &storage.database_url {
        // Only env: references are safe to echo
        if url.starts_with("env:") {
            println!("  Database URL: {}", url);
        } else {
            println!("  Database URL: {}", "(set)".dimmed());
        }
    }
    println!("  Transaction attempts: {}", storage.transaction_max_attempts);
    println!();

    println!("{}", "Server:".bold());
    println!("  Listen: {}:{}", config.spec.server.host, config.spec.server.port);
    match config.spec.server.metrics_port {
        Some(port) => println!("  Metrics port: {}", port),
        None => println!("  Metrics port: {}", "(disabled)".dimmed()),
    }

    let webhook = config
        .spec
        .notifications
        .as_ref()
        .and_then(|n| n.webhook_url.as_deref());
    println!(
        "  Review webhook: {}",
        webhook.unwrap_or("(log only)")
    );

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = RemedyConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: PathBuf, force: bool) -> Result<()> {
    if output.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            output.display()
        );
    }

    RemedyConfigManifest::default()
        .to_yaml_file(&output)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_generated_config_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("remedy-config.yaml");

        generate(path.clone(), false).await.unwrap();
        validate(Some(path.clone())).await.unwrap();

        // Refuses to clobber without --force
        assert!(generate(path.clone(), false).await.is_err());
        assert!(generate(path, true).await.is_ok());
    }
}
