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

//! Forward pass of the scoring network.
//!
//! Per step: two graph-isomorphism message-passing layers over the concept
//! subgraph, mean pooling, a difficulty-level embedding concatenated onto
//! the pooled vector. Across steps: a single-layer LSTM and a linear head
//! emitting one logit per step. There is no autograd here; the network
//! only ever runs in evaluation mode.

use crate::weights::{GinLayerWeights, LinearWeights, ModelWeights};
use ndarray::{s, Array1, Array2, Axis};
use readygraph_core::{GraphStep, ReadygraphError, Result, ScoringModel};
use tracing::debug;

struct GinLayer {
    eps: f32,
    weight: Array2<f32>,
    bias: Array1<f32>,
}

impl GinLayer {
    fn from_weights(w: &GinLayerWeights) -> Self {
        Self {
            eps: w.eps,
            weight: to_matrix(&w.lin.weight),
            bias: Array1::from_vec(w.lin.bias.clone()),
        }
    }

    /// `relu(W · ((1 + eps) * h_i + Σ_{j→i} h_j) + b)` for every node.
    fn forward(&self, x: &Array2<f32>, edges: &[(usize, usize)]) -> Array2<f32> {
        let mut agg = x * (1.0 + self.eps);
        for &(source, target) in edges {
            let row = x.row(source).to_owned();
            agg.row_mut(target).zip_mut_with(&row, |a, b| *a += b);
        }
        let mut out = agg.dot(&self.weight.t()) + &self.bias;
        out.mapv_inplace(|v| v.max(0.0));
        out
    }
}

/// The concrete [`ScoringModel`]: graph encoder + LSTM sequence encoder.
pub struct GinLstmScorer {
    node_feat_dim: usize,
    hidden_dim: usize,
    level_vocab: usize,
    gin1: GinLayer,
    gin2: GinLayer,
    embedding: Array2<f32>,
    w_ih: Array2<f32>,
    w_hh: Array2<f32>,
    b_ih: Array1<f32>,
    b_hh: Array1<f32>,
    head_weight: Array1<f32>,
    head_bias: f32,
}

impl GinLstmScorer {
    pub fn new(weights: ModelWeights) -> Result<Self> {
        weights.validate()?;
        debug!(
            node_feat_dim = weights.node_feat_dim,
            hidden_dim = weights.hidden_dim,
            "scoring network ready"
        );
        Ok(Self {
            node_feat_dim: weights.node_feat_dim,
            hidden_dim: weights.hidden_dim,
            level_vocab: weights.level_embedding.len(),
            gin1: GinLayer::from_weights(&weights.gin1),
            gin2: GinLayer::from_weights(&weights.gin2),
            embedding: to_matrix(&weights.level_embedding),
            w_ih: to_matrix(&weights.lstm.w_ih),
            w_hh: to_matrix(&weights.lstm.w_hh),
            b_ih: Array1::from_vec(weights.lstm.b_ih),
            b_hh: Array1::from_vec(weights.lstm.b_hh),
            head_weight: head_row(&weights.head),
            head_bias: weights.head.bias[0],
        })
    }

    /// Load a checkpoint from disk and build the network.
    pub fn from_checkpoint(path: impl AsRef<std::path::Path>) -> Result<Self> {
        Self::new(ModelWeights::load(path)?)
    }

    /// Encode one step into a `hidden + embed` vector.
    fn encode_step(&self, step: &GraphStep) -> Result<Array1<f32>> {
        let subgraph = &step.subgraph;
        if subgraph.feature_dim() != self.node_feat_dim {
            return Err(ReadygraphError::Model(format!(
                "subgraph feature width {} does not match model input {}",
                subgraph.feature_dim(),
                self.node_feat_dim
            )));
        }
        if usize::from(step.level) >= self.level_vocab {
            return Err(ReadygraphError::Model(format!(
                "difficulty level {} outside embedding vocabulary {}",
                step.level, self.level_vocab
            )));
        }

        let nodes = subgraph.node_count();
        let mut x = Array2::zeros((nodes, self.node_feat_dim));
        for (i, row) in subgraph.features.iter().enumerate() {
            x.row_mut(i).assign(&Array1::from_vec(row.clone()));
        }
        let edges: Vec<(usize, usize)> = subgraph
            .edges
            .iter()
            .map(|e| (e.source, e.target))
            .collect();

        let h = self.gin1.forward(&x, &edges);
        let h = self.gin2.forward(&h, &edges);
        let pooled = h
            .mean_axis(Axis(0))
            .ok_or_else(|| ReadygraphError::Model("cannot pool an empty subgraph".to_string()))?;

        let level_row = self.embedding.row(usize::from(step.level));
        let mut step_vec = Array1::zeros(self.hidden_dim + level_row.len());
        step_vec.slice_mut(s![..self.hidden_dim]).assign(&pooled);
        step_vec.slice_mut(s![self.hidden_dim..]).assign(&level_row);
        Ok(step_vec)
    }
}

impl ScoringModel for GinLstmScorer {
    fn score_sequence(&self, steps: &[GraphStep]) -> Result<Vec<f32>> {
        if steps.is_empty() {
            return Err(ReadygraphError::Model(
                "scoring model received an empty sequence".to_string(),
            ));
        }

        let hidden = self.hidden_dim;
        let mut h = Array1::<f32>::zeros(hidden);
        let mut c = Array1::<f32>::zeros(hidden);
        let mut logits = Vec::with_capacity(steps.len());

        for step in steps {
            let input = self.encode_step(step)?;
            let gates = self.w_ih.dot(&input) + &self.b_ih + self.w_hh.dot(&h) + &self.b_hh;

            let i = gates.slice(s![..hidden]).mapv(logistic);
            let f = gates.slice(s![hidden..2 * hidden]).mapv(logistic);
            let g = gates.slice(s![2 * hidden..3 * hidden]).mapv(f32::tanh);
            let o = gates.slice(s![3 * hidden..]).mapv(logistic);

            c = &f * &c + &i * &g;
            h = &o * &c.mapv(f32::tanh);

            logits.push(self.head_weight.dot(&h) + self.head_bias);
        }

        Ok(logits)
    }
}

fn logistic(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

fn to_matrix(rows: &[Vec<f32>]) -> Array2<f32> {
    let r = rows.len();
    let c = rows.first().map(Vec::len).unwrap_or(0);
    let flat: Vec<f32> = rows.iter().flatten().copied().collect();
    Array2::from_shape_vec((r, c), flat).unwrap_or_else(|_| Array2::zeros((r, c)))
}

fn head_row(head: &LinearWeights) -> Array1<f32> {
    Array1::from_vec(head.weight.first().cloned().unwrap_or_default())
}
