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

//! Seam between the inference pipeline and the scoring model.
//!
//! The contract is fixed: the model receives an ordered, non-empty sequence
//! of steps and returns exactly one logit per step. The pipeline always
//! reads the final element; there is no scalar special case.

use crate::error::Result;
use crate::subgraph::ConceptSubgraph;
use std::sync::Arc;

/// One position of the assembled input sequence: a concept subgraph plus
/// the difficulty level it was (or will be) assessed at.
#[derive(Debug, Clone)]
pub struct GraphStep {
    pub subgraph: Arc<ConceptSubgraph>,
    pub level: u8,
}

/// Outcome of a readiness inference.
#[derive(Debug, Clone, PartialEq)]
pub struct Readiness {
    /// Probability thresholded against the configured cutoff
    pub ready: bool,
    /// Logistic-transformed final logit, in [0, 1]
    pub probability: f32,
    /// History steps that made it into the sequence (target excluded)
    pub history_steps: usize,
    /// History entries skipped because their subgraph could not be resolved
    pub degraded_steps: usize,
    /// Remote fetches this request triggered
    pub downloads: usize,
}

/// Scoring model: graph encoder + sequence encoder, run forward-only.
pub trait ScoringModel: Send + Sync {
    /// Score an ordered sequence, returning one logit per step.
    fn score_sequence(&self, steps: &[GraphStep]) -> Result<Vec<f32>>;
}

/// Logistic transform of a raw logit into [0, 1].
pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
