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

//! Remote artifact store abstraction.
//!
//! The cache only distinguishes two failure classes: a definitive 404
//! (`NotFound`, never retried) and everything else (`Transient`, retried up
//! to the attempt budget). The trait seam exists so tests can count and
//! fault-inject fetches without a network.

use async_trait::async_trait;
use readygraph_core::{ReadygraphError, Result};
use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Fetch failure as seen by the retry loop.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The store definitively does not have this code
    #[error("artifact not found: {0}")]
    NotFound(String),

    /// Network or server failure; worth retrying
    #[error("transient fetch failure: {0}")]
    Transient(String),
}

/// A fully fetched artifact plus the size the store advertised before the
/// body was read (used for eviction accounting).
#[derive(Debug, Clone)]
pub struct RemoteArtifact {
    pub bytes: Vec<u8>,
    pub advertised_len: Option<u64>,
}

/// HTTP-addressable blob store keyed by concept code.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn fetch(&self, code: &str) -> std::result::Result<RemoteArtifact, RemoteError>;
}

/// `GET {base}/{code}.{ext}` against a real blob store.
pub struct HttpRemoteStore {
    client: reqwest::Client,
    base_url: String,
    artifact_ext: String,
}

impl HttpRemoteStore {
    pub fn new(base_url: &str, artifact_ext: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                ReadygraphError::InvalidInput(format!("invalid http client configuration: {e}"))
            })?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            artifact_ext: artifact_ext.to_string(),
        })
    }

    fn url_for(&self, code: &str) -> String {
        format!("{}/{}.{}", self.base_url, code, self.artifact_ext)
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn fetch(&self, code: &str) -> std::result::Result<RemoteArtifact, RemoteError> {
        let url = self.url_for(code);
        debug!(%url, "downloading artifact");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| RemoteError::Transient(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(RemoteError::NotFound(url));
        }
        if !response.status().is_success() {
            return Err(RemoteError::Transient(format!(
                "status {} from {}",
                response.status(),
                url
            )));
        }

        let advertised_len = response.content_length();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| RemoteError::Transient(e.to_string()))?
            .to_vec();

        Ok(RemoteArtifact {
            bytes,
            advertised_len,
        })
    }
}
