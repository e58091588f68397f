//! Pipeline configuration from YAML

use crate::execution::SchedulingStrategy;
use crate::persistence::{InMemoryCache, SharedCache};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::Level;

/// Top-level runner configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Pipeline name
    pub name: String,

    /// Worker pool size; absent or 0 runs groups serially
    #[serde(default)]
    pub workers: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default)]
    pub log_level: Option<String>,

    #[serde(default)]
    pub cache: CacheConfig,
}

/// Which cache store backs the pipeline
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub backend: CacheBackend,

    /// Database path for the SQLite backend
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// Process-lifetime map
    #[default]
    Memory,
    /// Durable SQLite file
    Sqlite,
}

impl PipelineConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: PipelineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            anyhow::bail!("Pipeline name must not be empty");
        }

        self.log_level()?;

        if self.cache.backend == CacheBackend::Sqlite && !cfg!(feature = "sqlite") {
            anyhow::bail!("Cache backend 'sqlite' requires the 'sqlite' feature");
        }

        if self.cache.backend == CacheBackend::Memory && self.cache.path.is_some() {
            anyhow::bail!("Cache path is only used by the 'sqlite' backend");
        }

        Ok(())
    }

    /// Parsed log level, if one is configured
    pub fn log_level(&self) -> Result<Option<Level>> {
        self.log_level
            .as_deref()
            .map(|raw| {
                Level::from_str(raw).map_err(|_| anyhow::anyhow!("Invalid log level: {}", raw))
            })
            .transpose()
    }

    /// Scheduling strategy implied by `workers`
    pub fn strategy(&self) -> SchedulingStrategy {
        SchedulingStrategy::from_workers(self.workers)
    }

    /// Open the configured cache store
    pub async fn open_cache(&self) -> Result<SharedCache> {
        match self.cache.backend {
            CacheBackend::Memory => Ok(InMemoryCache::shared()),
            #[cfg(feature = "sqlite")]
            CacheBackend::Sqlite => {
                use crate::persistence::SqliteCache;
                use std::sync::Arc;

                let store = match &self.cache.path {
                    Some(path) => SqliteCache::new(path).await?,
                    None => SqliteCache::with_default_path().await?,
                };
                Ok(Arc::new(store))
            }
            #[cfg(not(feature = "sqlite"))]
            CacheBackend::Sqlite => {
                anyhow::bail!("Cache backend 'sqlite' requires the 'sqlite' feature")
            }
        }
    }
}
