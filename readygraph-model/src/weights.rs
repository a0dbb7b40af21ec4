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

//! Model weight checkpoint: a bincode file holding every parameter of the
//! scoring network. Dimensions are validated on load so shape errors
//! surface at startup, not mid-request.

use readygraph_core::{ReadygraphError, Result, LEVEL_VOCAB};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Dense layer parameters; `weight` is row-major `[out][in]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearWeights {
    pub weight: Vec<Vec<f32>>,
    pub bias: Vec<f32>,
}

impl LinearWeights {
    pub fn out_dim(&self) -> usize {
        self.weight.len()
    }

    pub fn in_dim(&self) -> usize {
        self.weight.first().map(Vec::len).unwrap_or(0)
    }

    fn validate(&self, name: &str, in_dim: usize, out_dim: usize) -> Result<()> {
        if self.out_dim() != out_dim
            || self.bias.len() != out_dim
            || self.weight.iter().any(|row| row.len() != in_dim)
        {
            return Err(ReadygraphError::Model(format!(
                "{name} expected [{out_dim}x{in_dim}] weights with {out_dim} biases"
            )));
        }
        Ok(())
    }
}

/// One graph-isomorphism message-passing layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GinLayerWeights {
    /// Self-loop scaling term: aggregation is `(1 + eps) * h_i + sum h_j`
    pub eps: f32,
    pub lin: LinearWeights,
}

/// Single-layer LSTM parameters in gate order `i, f, g, o`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LstmWeights {
    /// `[4 * hidden][input]`
    pub w_ih: Vec<Vec<f32>>,
    /// `[4 * hidden][hidden]`
    pub w_hh: Vec<Vec<f32>>,
    pub b_ih: Vec<f32>,
    pub b_hh: Vec<f32>,
}

/// Full checkpoint for the scoring network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelWeights {
    pub node_feat_dim: usize,
    pub hidden_dim: usize,
    pub level_embed_dim: usize,
    /// `[LEVEL_VOCAB][level_embed_dim]`
    pub level_embedding: Vec<Vec<f32>>,
    pub gin1: GinLayerWeights,
    pub gin2: GinLayerWeights,
    pub lstm: LstmWeights,
    pub head: LinearWeights,
}

impl ModelWeights {
    /// Load and validate a bincode checkpoint.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        let weights: ModelWeights = bincode::deserialize(&bytes).map_err(|e| {
            ReadygraphError::Serde(format!(
                "checkpoint {} failed to deserialize: {e}",
                path.as_ref().display()
            ))
        })?;
        weights.validate()?;
        Ok(weights)
    }

    /// Serialize to a bincode checkpoint.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let bytes = bincode::serialize(self).map_err(|e| ReadygraphError::Serde(e.to_string()))?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// Check every parameter block against the declared dimensions.
    pub fn validate(&self) -> Result<()> {
        let feat = self.node_feat_dim;
        let hidden = self.hidden_dim;
        let embed = self.level_embed_dim;
        if feat == 0 || hidden == 0 || embed == 0 {
            return Err(ReadygraphError::Model(
                "checkpoint declares a zero dimension".to_string(),
            ));
        }

        if self.level_embedding.len() != LEVEL_VOCAB as usize
            || self.level_embedding.iter().any(|row| row.len() != embed)
        {
            return Err(ReadygraphError::Model(format!(
                "level embedding expected [{LEVEL_VOCAB}x{embed}]"
            )));
        }

        self.gin1.lin.validate("gin1", feat, hidden)?;
        self.gin2.lin.validate("gin2", hidden, hidden)?;

        let gates = 4 * hidden;
        let input = hidden + embed;
        if self.lstm.w_ih.len() != gates
            || self.lstm.w_ih.iter().any(|row| row.len() != input)
            || self.lstm.w_hh.len() != gates
            || self.lstm.w_hh.iter().any(|row| row.len() != hidden)
            || self.lstm.b_ih.len() != gates
            || self.lstm.b_hh.len() != gates
        {
            return Err(ReadygraphError::Model(format!(
                "lstm expected w_ih [{gates}x{input}], w_hh [{gates}x{hidden}]"
            )));
        }

        self.head.validate("head", hidden, 1)?;
        Ok(())
    }

    /// Deterministic pseudo-random weights for tests and benchmarks.
    pub fn seeded(node_feat_dim: usize, hidden_dim: usize, level_embed_dim: usize, seed: u64) -> Self {
        Self {
            node_feat_dim,
            hidden_dim,
            level_embed_dim,
            level_embedding: filled(LEVEL_VOCAB as usize, level_embed_dim, seed ^ 0x11),
            gin1: GinLayerWeights {
                eps: 0.0,
                lin: LinearWeights {
                    weight: filled(hidden_dim, node_feat_dim, seed ^ 0x22),
                    bias: filled(1, hidden_dim, seed ^ 0x33).remove(0),
                },
            },
            gin2: GinLayerWeights {
                eps: 0.0,
                lin: LinearWeights {
                    weight: filled(hidden_dim, hidden_dim, seed ^ 0x44),
                    bias: filled(1, hidden_dim, seed ^ 0x55).remove(0),
                },
            },
            lstm: LstmWeights {
                w_ih: filled(4 * hidden_dim, hidden_dim + level_embed_dim, seed ^ 0x66),
                w_hh: filled(4 * hidden_dim, hidden_dim, seed ^ 0x77),
                b_ih: filled(1, 4 * hidden_dim, seed ^ 0x88).remove(0),
                b_hh: filled(1, 4 * hidden_dim, seed ^ 0x99).remove(0),
            },
            head: LinearWeights {
                weight: filled(1, hidden_dim, seed ^ 0xaa),
                bias: filled(1, 1, seed ^ 0xbb).remove(0),
            },
        }
    }
}

fn filled(rows: usize, cols: usize, seed: u64) -> Vec<Vec<f32>> {
    (0..rows)
        .map(|r| {
            (0..cols)
                .map(|c| {
                    let mix = seed
                        .wrapping_mul(6364136223846793005)
                        .wrapping_add((r as u64) * 31 + (c as u64) * 17);
                    ((mix % 1000) as f32 / 1000.0 - 0.5) * 0.2
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn seeded_weights_validate() {
        assert!(ModelWeights::seeded(12, 8, 4, 7).validate().is_ok());
    }

    #[test]
    fn validate_rejects_wrong_lstm_shape() {
        let mut weights = ModelWeights::seeded(12, 8, 4, 7);
        weights.lstm.w_hh.pop();
        assert!(matches!(
            weights.validate(),
            Err(ReadygraphError::Model(_))
        ));
    }

    #[test]
    fn validate_rejects_wrong_embedding_vocab() {
        let mut weights = ModelWeights::seeded(12, 8, 4, 7);
        weights.level_embedding.pop();
        assert!(weights.validate().is_err());
    }

    #[test]
    fn checkpoint_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("weights.bin");
        let weights = ModelWeights::seeded(12, 8, 4, 7);
        weights.save(&path).unwrap();

        let loaded = ModelWeights::load(&path).unwrap();
        assert_eq!(loaded.node_feat_dim, 12);
        assert_eq!(loaded.gin1.lin.weight, weights.gin1.lin.weight);
    }

    #[test]
    fn load_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("weights.bin");
        std::fs::write(&path, b"definitely not bincode weights").unwrap();
        assert!(ModelWeights::load(&path).is_err());
    }
}
