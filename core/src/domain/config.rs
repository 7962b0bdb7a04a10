// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Remedy Configuration Types
//
// Defines the configuration schema for a remedy deployment:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - Embedding provider, retry and cache settings
// - Deduplication threshold and batch sizing
// - Storage backend and transaction budget
// - Review notifications and HTTP server settings

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::embedding::DEFAULT_DIMENSION;
use crate::domain::repository::{PostgresConfig, StorageBackend};

pub const API_VERSION: &str = "remedy/v1";
pub const KIND: &str = "RemedyConfig";

/// Top-level configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemedyConfigManifest {
    /// API version (must be "remedy/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "RemedyConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    #[serde(default)]
    pub spec: RemedyConfigSpec,
}

/// Manifest metadata (Kubernetes-style)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    /// Human-readable deployment name
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemedyConfigSpec {
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub deduplication: DeduplicationConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub notifications: Option<NotificationConfig>,

    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    /// OpenAI or any OpenAI-compatible `/embeddings` endpoint
    OpenAI,
    Ollama,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProviderKind,

    pub endpoint: String,

    pub model: String,

    /// API key (supports "env:VAR_NAME" for environment variables)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Per-call timeout in milliseconds
    #[serde(default = "default_embedding_timeout")]
    pub timeout_ms: u64,

    #[serde(default)]
    pub retry: RetryConfig,

    /// In-process memoization capacity (0 disables the cache)
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

/// Bounded exponential backoff for transient embedding failures
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
}

impl RetryConfig {
    /// Delay before retry number `retry` (1-based): `initial * 2^(retry-1)`,
    /// capped at `max_delay_ms`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(20);
        let delay = self.initial_delay_ms.saturating_mul(1u64 << exponent);
        Duration::from_millis(delay.min(self.max_delay_ms))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeduplicationConfig {
    /// Inclusive cosine similarity threshold for merging
    #[serde(default = "default_threshold")]
    pub similarity_threshold: f32,

    /// Maximum patterns handled per run
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackendKind {
    #[default]
    InMemory,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackendKind,

    /// Connection string (supports "env:VAR_NAME")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Optimistic transaction attempts before reporting contention
    #[serde(default = "default_transaction_attempts")]
    pub transaction_max_attempts: u32,

    #[serde(default = "default_transaction_timeout")]
    pub transaction_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,

    #[serde(default = "default_notification_timeout")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Prometheus exporter port (disabled when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics_port: Option<u16>,
}

fn default_dimension() -> usize {
    DEFAULT_DIMENSION
}

fn default_embedding_timeout() -> u64 {
    10_000
}

fn default_cache_capacity() -> usize {
    4096
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> u64 {
    1_000
}

fn default_max_delay() -> u64 {
    4_000
}

fn default_threshold() -> f32 {
    0.85
}

fn default_batch_size() -> usize {
    100
}

fn default_max_connections() -> u32 {
    5
}

fn default_transaction_attempts() -> u32 {
    5
}

fn default_transaction_timeout() -> u64 {
    5_000
}

fn default_notification_timeout() -> u64 {
    5_000
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::Ollama,
            endpoint: "http://localhost:11434".to_string(),
            model: "nomic-embed-text".to_string(),
            api_key: None,
            dimension: default_dimension(),
            timeout_ms: default_embedding_timeout(),
            retry: RetryConfig::default(),
            cache_capacity: default_cache_capacity(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
        }
    }
}

impl Default for DeduplicationConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_threshold(),
            batch_size: default_batch_size(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackendKind::InMemory,
            database_url: None,
            max_connections: default_max_connections(),
            transaction_max_attempts: default_transaction_attempts(),
            transaction_timeout_ms: default_transaction_timeout(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            metrics_port: None,
        }
    }
}

impl Default for RemedyConfigManifest {
    fn default() -> Self {
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "remedy".to_string());

        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: hostname,
                version: Some("1.0.0".to_string()),
                labels: None,
            },
            spec: RemedyConfigSpec::default(),
        }
    }
}

/// Resolve a config value that may reference an environment variable
/// ("env:VAR_NAME"). Returns `None` when the variable is unset.
pub fn resolve_secret(value: &str) -> Option<String> {
    resolve_secret_with(value, |name| std::env::var(name).ok())
}

fn resolve_secret_with(value: &str, lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
    match value.strip_prefix("env:") {
        Some(name) => lookup(name.trim()),
        None => Some(value.to_string()),
    }
}

impl RemedyConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. REMEDY_CONFIG_PATH environment variable
    /// 2. ./remedy-config.yaml (working directory)
    /// 3. ~/.remedy/config.yaml (user home)
    /// 4. /etc/remedy/config.yaml (system, Unix)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("REMEDY_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./remedy-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".remedy").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        let system_config = PathBuf::from("/etc/remedy/config.yaml");
        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit CLI path: fail if missing/invalid
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path).map_err(|e| {
                anyhow::anyhow!("Failed to load config at {:?}: {}", path, e)
            })?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|name| std::env::var(name).ok());
    }

    fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("REMEDY_DATABASE_URL") {
            tracing::info!("Environment override: REMEDY_DATABASE_URL");
            self.spec.storage.database_url = Some(url);
            self.spec.storage.backend = StorageBackendKind::Postgres;
        }

        if let Some(val) = lookup("REMEDY_SIMILARITY_THRESHOLD") {
            match val.trim().parse::<f32>() {
                Ok(threshold) => {
                    tracing::info!("Environment override: REMEDY_SIMILARITY_THRESHOLD={}", threshold);
                    self.spec.deduplication.similarity_threshold = threshold;
                }
                Err(_) => {
                    tracing::warn!(
                        "Invalid value for REMEDY_SIMILARITY_THRESHOLD: '{}'. Ignoring.",
                        val
                    );
                }
            }
        }

        if let Some(endpoint) = lookup("REMEDY_EMBEDDING_ENDPOINT") {
            tracing::info!("Environment override: REMEDY_EMBEDDING_ENDPOINT={}", endpoint);
            self.spec.embedding.endpoint = endpoint;
        }
    }

    /// Storage backend selected by this configuration
    pub fn storage_backend(&self) -> anyhow::Result<StorageBackend> {
        match self.spec.storage.backend {
            StorageBackendKind::InMemory => Ok(StorageBackend::InMemory),
            StorageBackendKind::Postgres => {
                let url = self
                    .spec
                    .storage
                    .database_url
                    .as_deref()
                    .and_then(resolve_secret)
                    .ok_or_else(|| anyhow::anyhow!("spec.storage.database_url is not set"))?;
                Ok(StorageBackend::PostgreSQL(PostgresConfig {
                    connection_string: url,
                    max_connections: self.spec.storage.max_connections,
                }))
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        let embedding = &self.spec.embedding;
        if embedding.endpoint.is_empty() {
            anyhow::bail!("spec.embedding.endpoint cannot be empty");
        }
        if embedding.model.is_empty() {
            anyhow::bail!("spec.embedding.model cannot be empty");
        }
        if embedding.dimension == 0 {
            anyhow::bail!("spec.embedding.dimension must be positive");
        }
        if embedding.retry.max_attempts == 0 {
            anyhow::bail!("spec.embedding.retry.max_attempts must be at least 1");
        }
        if embedding.retry.initial_delay_ms > embedding.retry.max_delay_ms {
            anyhow::bail!("spec.embedding.retry.initial_delay_ms exceeds max_delay_ms");
        }

        let threshold = self.spec.deduplication.similarity_threshold;
        if !threshold.is_finite() || threshold <= 0.0 || threshold > 1.0 {
            anyhow::bail!(
                "spec.deduplication.similarity_threshold must lie in (0, 1], got {}",
                threshold
            );
        }
        if self.spec.deduplication.batch_size == 0 {
            anyhow::bail!("spec.deduplication.batch_size must be at least 1");
        }

        let storage = &self.spec.storage;
        if storage.transaction_max_attempts == 0 {
            anyhow::bail!("spec.storage.transaction_max_attempts must be at least 1");
        }
        if storage.backend == StorageBackendKind::Postgres && storage.database_url.is_none() {
            anyhow::bail!("spec.storage.database_url is required for the postgres backend");
        }

        if let Some(notifications) = &self.spec.notifications {
            if let Some(url) = &notifications.webhook_url {
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    anyhow::bail!("spec.notifications.webhook_url must be an http(s) URL");
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_manifest_is_valid() {
        let manifest = RemedyConfigManifest::default();
        assert_eq!(manifest.api_version, API_VERSION);
        assert_eq!(manifest.kind, KIND);
        assert!(!manifest.metadata.name.is_empty());
        assert_eq!(manifest.spec.deduplication.similarity_threshold, 0.85);
        assert_eq!(manifest.spec.embedding.dimension, 768);
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = r#"
apiVersion: remedy/v1
kind: RemedyConfig
metadata:
  name: triage-prod
spec:
  embedding:
    provider: openai
    endpoint: https://api.openai.com/v1
    model: text-embedding-3-small
    api_key: env:OPENAI_API_KEY
    dimension: 1536
  deduplication:
    similarity_threshold: 0.9
  storage:
    backend: postgres
    database_url: env:DATABASE_URL
"#;
        let manifest = RemedyConfigManifest::from_yaml_str(yaml).unwrap();
        assert_eq!(manifest.spec.embedding.provider, EmbeddingProviderKind::OpenAI);
        assert_eq!(manifest.spec.embedding.retry.max_attempts, 3);
        assert_eq!(manifest.spec.embedding.timeout_ms, 10_000);
        assert_eq!(manifest.spec.deduplication.batch_size, 100);
        assert_eq!(manifest.spec.storage.transaction_max_attempts, 5);
        assert_eq!(manifest.spec.server.port, 8080);
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut manifest = RemedyConfigManifest::default();
        manifest.spec.deduplication.similarity_threshold = 1.5;
        assert!(manifest.validate().is_err());

        let mut manifest = RemedyConfigManifest::default();
        manifest.spec.deduplication.batch_size = 0;
        assert!(manifest.validate().is_err());

        let mut manifest = RemedyConfigManifest::default();
        manifest.spec.storage.backend = StorageBackendKind::Postgres;
        assert!(manifest.validate().is_err());

        let mut manifest = RemedyConfigManifest::default();
        manifest.kind = "NodeConfig".to_string();
        assert!(manifest.validate().is_err());
    }

    #[test]
    fn test_retry_delays_double_up_to_ceiling() {
        let retry = RetryConfig::default();
        assert_eq!(retry.delay_for(1), Duration::from_secs(1));
        assert_eq!(retry.delay_for(2), Duration::from_secs(2));
        assert_eq!(retry.delay_for(3), Duration::from_secs(4));
        assert_eq!(retry.delay_for(4), Duration::from_secs(4));
    }

    #[test]
    fn test_env_overrides() {
        let mut manifest = RemedyConfigManifest::default();
        manifest.apply_overrides_from(|name| match name {
            "REMEDY_DATABASE_URL" => Some("postgres://localhost/remedy".to_string()),
            "REMEDY_SIMILARITY_THRESHOLD" => Some("0.92".to_string()),
            _ => None,
        });
        assert_eq!(manifest.spec.storage.backend, StorageBackendKind::Postgres);
        assert_eq!(manifest.spec.deduplication.similarity_threshold, 0.92);

        match manifest.storage_backend().unwrap() {
            StorageBackend::PostgreSQL(pg) => {
                assert_eq!(pg.connection_string, "postgres://localhost/remedy")
            }
            StorageBackend::InMemory => panic!("expected postgres backend"),
        }
    }

    #[test]
    fn test_invalid_threshold_override_is_ignored() {
        let mut manifest = RemedyConfigManifest::default();
        manifest.apply_overrides_from(|name| {
            (name == "REMEDY_SIMILARITY_THRESHOLD").then(|| "high".to_string())
        });
        assert_eq!(manifest.spec.deduplication.similarity_threshold, 0.85);
    }

    #[test]
    fn test_resolve_secret() {
        let lookup = |name: &str| (name == "KEY").then(|| "s3cret".to_string());
        assert_eq!(resolve_secret_with("env:KEY", lookup), Some("s3cret".to_string()));
        assert_eq!(resolve_secret_with("env:MISSING", lookup), None);
        assert_eq!(resolve_secret_with("literal", lookup), Some("literal".to_string()));
    }

    #[test]
    fn test_yaml_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("remedy-config.yaml");

        let mut manifest = RemedyConfigManifest::default();
        manifest.spec.deduplication.batch_size = 25;
        manifest.to_yaml_file(&path).unwrap();

        let loaded = RemedyConfigManifest::load_or_default(Some(path)).unwrap();
        assert_eq!(loaded.spec.deduplication.batch_size, 25);
    }
}
