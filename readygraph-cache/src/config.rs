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

//! Subgraph cache configuration.

use readygraph_core::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Base URL of the remote artifact store
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Local directory holding one artifact file per concept code
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// File extension of the serialized artifacts
    #[serde(default = "default_artifact_ext")]
    pub artifact_ext: String,

    /// Byte budget for resident artifacts; eviction keeps the total at or
    /// under this, advisory during an in-flight download
    #[serde(default = "default_max_cache_bytes")]
    pub max_cache_bytes: u64,

    /// Simultaneous outbound fetches across all keys
    #[serde(default = "default_download_concurrency")]
    pub download_concurrency: usize,

    /// Per-attempt HTTP timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Attempts per download before a transient failure escalates
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Backoff before the first retry, in milliseconds
    #[serde(default = "default_retry_initial_delay_ms")]
    pub retry_initial_delay_ms: u64,

    /// Deserialized subgraphs held in memory in front of the disk layer
    #[serde(default = "default_memory_entries")]
    pub memory_entries: u64,
}

fn default_base_url() -> String {
    "https://artifacts.readygraph.dev/subgraphs".to_string()
}

fn default_cache_dir() -> PathBuf {
    std::env::temp_dir().join("readygraph-subgraphs")
}

fn default_artifact_ext() -> String {
    "json".to_string()
}

fn default_max_cache_bytes() -> u64 {
    200 * 1024 * 1024
}

fn default_download_concurrency() -> usize {
    2
}

fn default_request_timeout_secs() -> u64 {
    45
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_initial_delay_ms() -> u64 {
    800
}

fn default_memory_entries() -> u64 {
    256
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            cache_dir: default_cache_dir(),
            artifact_ext: default_artifact_ext(),
            max_cache_bytes: default_max_cache_bytes(),
            download_concurrency: default_download_concurrency(),
            request_timeout_secs: default_request_timeout_secs(),
            retry_attempts: default_retry_attempts(),
            retry_initial_delay_ms: default_retry_initial_delay_ms(),
            memory_entries: default_memory_entries(),
        }
    }
}

impl CacheConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_attempts,
            initial_delay: Duration::from_millis(self.retry_initial_delay_ms),
            ..RetryPolicy::downloads()
        }
    }
}
