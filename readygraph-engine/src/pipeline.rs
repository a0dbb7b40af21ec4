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

//! Inference pipeline: assemble a bounded, ordered sequence of
//! (subgraph, level) steps for one student and target, score it, and
//! threshold the final probability.
//!
//! History entries degrade gracefully: an entry whose subgraph cannot be
//! resolved is skipped, logged and counted, never fatal. The target step
//! is mandatory and always appended last, so the scored sequence is never
//! empty.

use crate::projection::{self, GraphProjection};
use crate::repository::SequenceRepository;
use readygraph_cache::{FetchSource, SubgraphCache};
use readygraph_core::{
    level_in_vocab, sigmoid, GraphStep, Readiness, ReadygraphError, Result, ScoringModel,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Most recent history entries considered per request
    #[serde(default = "default_max_history")]
    pub max_history: usize,

    /// New (not locally cached) artifacts one request may pull before its
    /// history is truncated
    #[serde(default = "default_max_downloads")]
    pub max_downloads: usize,

    /// Probability cutoff for the readiness decision
    #[serde(default = "default_ready_threshold")]
    pub ready_threshold: f32,
}

fn default_max_history() -> usize {
    32
}

fn default_max_downloads() -> usize {
    12
}

fn default_ready_threshold() -> f32 {
    0.7
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_history: default_max_history(),
            max_downloads: default_max_downloads(),
            ready_threshold: default_ready_threshold(),
        }
    }
}

/// The inference core behind both public operations.
pub struct InferenceEngine {
    cache: Arc<SubgraphCache>,
    repository: Arc<SequenceRepository>,
    model: Arc<dyn ScoringModel>,
    config: PipelineConfig,
}

impl InferenceEngine {
    pub fn new(
        cache: Arc<SubgraphCache>,
        repository: Arc<SequenceRepository>,
        model: Arc<dyn ScoringModel>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            cache,
            repository,
            model,
            config,
        }
    }

    pub fn cache(&self) -> &SubgraphCache {
        &self.cache
    }

    /// Predict readiness of `student_id` for `target_code` at
    /// `target_level`.
    pub async fn run_inference(
        &self,
        student_id: &str,
        target_code: &str,
        target_level: i64,
    ) -> Result<Readiness> {
        let student_id = required(student_id, "student_id")?;
        let target_code = required(target_code, "target_code")?;
        let target_level = validated_level(target_level)?;

        if !self.repository.contains(student_id) {
            return Err(ReadygraphError::NotFound(format!(
                "student {student_id} has no recorded history"
            )));
        }

        let history = self.repository.history_for(student_id);
        let recent = &history[history.len().saturating_sub(self.config.max_history)..];

        let mut steps: Vec<GraphStep> = Vec::with_capacity(recent.len() + 1);
        let mut seen: HashSet<&str> = HashSet::new();
        let mut downloads = 0usize;
        let mut degraded = 0usize;

        for entry in recent {
            if !seen.insert(entry.code.as_str()) {
                continue;
            }
            if downloads >= self.config.max_downloads {
                debug!(
                    student_id,
                    max_downloads = self.config.max_downloads,
                    "download budget exhausted, truncating history"
                );
                break;
            }
            match self.cache.get_traced(&entry.code).await {
                Ok((subgraph, source)) => {
                    if source == FetchSource::Remote {
                        downloads += 1;
                    }
                    steps.push(GraphStep {
                        subgraph,
                        level: entry.level,
                    });
                }
                Err(e) => {
                    warn!(
                        student_id,
                        code = %entry.code,
                        error = %e,
                        "skipping unresolvable history step"
                    );
                    degraded += 1;
                }
            }
        }

        // The target never degrades; absence of its subgraph fails the
        // request, and its download is exempt from the history budget.
        let target_subgraph = match self.cache.get(target_code).await {
            Ok(subgraph) => subgraph,
            Err(ReadygraphError::NotFound(_)) | Err(ReadygraphError::Integrity(_)) => {
                return Err(ReadygraphError::NotFound(format!(
                    "target subgraph {target_code} not found"
                )));
            }
            Err(e) => return Err(e),
        };

        let history_steps = steps.len();
        steps.push(GraphStep {
            subgraph: target_subgraph,
            level: target_level,
        });

        let scores = self.model.score_sequence(&steps)?;
        let logit = scores.last().copied().ok_or_else(|| {
            ReadygraphError::Model("scoring model returned no scores".to_string())
        })?;
        let probability = sigmoid(logit);
        let ready = probability >= self.config.ready_threshold;

        debug!(
            student_id,
            target_code,
            probability = f64::from(probability),
            ready,
            history_steps,
            degraded,
            downloads,
            "inference complete"
        );

        Ok(Readiness {
            ready,
            probability,
            history_steps,
            degraded_steps: degraded,
            downloads,
        })
    }

    /// One-hop projection of the target's subgraph for UI consumption,
    /// annotated with this student's historical scores.
    pub async fn project_graph(
        &self,
        student_id: &str,
        target_code: &str,
    ) -> Result<GraphProjection> {
        let student_id = required(student_id, "student_id")?;
        let target_code = required(target_code, "target_code")?;
        let subgraph = self.cache.get(target_code).await?;
        projection::project_subgraph(&subgraph, student_id, target_code)
    }
}

fn required<'a>(value: &'a str, field: &str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ReadygraphError::InvalidInput(format!("{field} is empty")));
    }
    Ok(trimmed)
}

fn validated_level(level: i64) -> Result<u8> {
    if !level_in_vocab(level) {
        return Err(ReadygraphError::InvalidInput(format!(
            "difficulty level {level} is not a valid level"
        )));
    }
    Ok(level as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_trims_and_rejects_empty() {
        assert_eq!(required("  s1 ", "student_id").unwrap(), "s1");
        assert!(required("   ", "student_id").is_err());
        assert!(required("", "student_id").is_err());
    }

    #[test]
    fn level_validation_bounds() {
        assert_eq!(validated_level(0).unwrap(), 0);
        assert_eq!(validated_level(4).unwrap(), 4);
        assert!(validated_level(5).is_err());
        assert!(validated_level(-1).is_err());
    }

    #[test]
    fn config_defaults_are_in_range() {
        let config = PipelineConfig::default();
        assert!(config.max_history >= 16 && config.max_history <= 60);
        assert!(config.max_downloads >= 8 && config.max_downloads <= 25);
        assert!((config.ready_threshold - 0.7).abs() < f32::EPSILON);
    }
}
