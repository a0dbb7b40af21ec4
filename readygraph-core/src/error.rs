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

//! Error taxonomy shared across the workspace.
//!
//! Callers branch on the variant, not the message: `InvalidInput` and
//! `NotFound` surface to clients with their reason, `Transient` is retried
//! inside the cache layer before it ever escapes, and everything else maps
//! to an opaque server-side failure.

use thiserror::Error;

/// Result type for readygraph operations
pub type Result<T> = std::result::Result<T, ReadygraphError>;

/// Errors that can occur across the readiness pipeline
#[derive(Debug, Error)]
pub enum ReadygraphError {
    /// Malformed or missing request fields; never retried
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Unknown student, unknown concept code, or a subgraph that does not
    /// contain its own defining code; never retried
    #[error("not found: {0}")]
    NotFound(String),

    /// Network or storage failure while fetching a remote artifact, after
    /// the internal retry budget is exhausted
    #[error("transient failure: {0}")]
    Transient(String),

    /// A cached artifact failed to deserialize or violates its own
    /// structural invariants
    #[error("integrity violation: {0}")]
    Integrity(String),

    /// Scoring model failure (shape mismatch, missing weights)
    #[error("model failure: {0}")]
    Model(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serde(String),
}

impl From<serde_json::Error> for ReadygraphError {
    fn from(e: serde_json::Error) -> Self {
        ReadygraphError::Serde(e.to_string())
    }
}

impl ReadygraphError {
    /// True for failures that are client mistakes rather than server faults
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ReadygraphError::InvalidInput(_) | ReadygraphError::NotFound(_)
        )
    }
}
