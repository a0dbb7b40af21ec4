// Copyright 2025 Readygraph (https://github.com/readygraph)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use anyhow::{Context, Result};
use readygraph_cache::CacheConfig;
use readygraph_engine::PipelineConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Readygraph server configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: HttpServerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub repository: RepositoryConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpServerConfig {
    /// HTTP API listen address (e.g., "127.0.0.1:8080")
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Enable CORS
    #[serde(default = "default_enable_cors")]
    pub enable_cors: bool,

    /// Allowed CORS origins (empty = allow all; use specific origins in
    /// production)
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RepositoryConfig {
    /// Path to the student sequences JSON file
    #[serde(default = "default_sequences_path")]
    pub sequences_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelConfig {
    /// Path to the scoring-network checkpoint
    #[serde(default = "default_checkpoint_path")]
    pub checkpoint_path: PathBuf,
}

fn default_listen_addr() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_enable_cors() -> bool {
    true
}

fn default_sequences_path() -> PathBuf {
    PathBuf::from("data/student_sequences.json")
}

fn default_checkpoint_path() -> PathBuf {
    PathBuf::from("data/readiness_checkpoint.bin")
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            enable_cors: default_enable_cors(),
            cors_origins: Vec::new(),
        }
    }
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            sequences_path: default_sequences_path(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            checkpoint_path: default_checkpoint_path(),
        }
    }
}

impl ServerConfig {
    /// Load from a TOML file, or fall back to defaults when no path is
    /// given.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        match path {
            Some(path) => {
                let raw = std::fs::read_to_string(&path)
                    .with_context(|| format!("reading config {}", path.display()))?;
                let config = toml::from_str(&raw)
                    .with_context(|| format!("parsing config {}", path.display()))?;
                Ok(config)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.server
            .listen_addr
            .parse::<SocketAddr>()
            .with_context(|| format!("invalid listen address {:?}", self.server.listen_addr))?;
        if self.pipeline.ready_threshold <= 0.0 || self.pipeline.ready_threshold >= 1.0 {
            anyhow::bail!(
                "ready_threshold {} outside (0, 1)",
                self.pipeline.ready_threshold
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(ServerConfig::default().validate().is_ok());
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let config: ServerConfig = toml::from_str(
            r#"
            [server]
            listen_addr = "0.0.0.0:9000"

            [pipeline]
            ready_threshold = 0.5
            "#,
        )
        .unwrap();
        assert_eq!(config.server.listen_addr, "0.0.0.0:9000");
        assert!((config.pipeline.ready_threshold - 0.5).abs() < f32::EPSILON);
        assert_eq!(config.pipeline.max_history, 32);
        assert_eq!(config.cache.download_concurrency, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn bad_listen_addr_fails_validation() {
        let mut config = ServerConfig::default();
        config.server.listen_addr = "not an address".to_string();
        assert!(config.validate().is_err());
    }
}
