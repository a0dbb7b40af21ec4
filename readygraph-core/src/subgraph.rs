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

//! Concept subgraph: the graph-structured neighborhood of one curriculum
//! concept, as consumed by the scoring model and the projection path.
//!
//! A subgraph is materialized by deserializing a cached or freshly
//! downloaded artifact and is immutable afterwards; everything downstream
//! holds it behind an `Arc`.

use crate::error::{ReadygraphError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Typed edge between two node indices of a [`ConceptSubgraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubgraphEdge {
    pub source: usize,
    pub target: usize,
    /// Raw edge-type tag as stored in the artifact; see [`EdgeKind::from_tag`]
    pub kind: u8,
}

/// Closed vocabulary of curriculum edge types.
///
/// Tags outside the vocabulary collapse to [`EdgeKind::Related`] rather than
/// failing the artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    IsChildOf,
    IsPartOf,
    ExactMatch,
    InferredAlignment,
    Related,
}

impl EdgeKind {
    pub fn from_tag(tag: u8) -> Self {
        match tag {
            0 => EdgeKind::IsChildOf,
            1 => EdgeKind::IsPartOf,
            2 => EdgeKind::ExactMatch,
            3 => EdgeKind::InferredAlignment,
            _ => EdgeKind::Related,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::IsChildOf => "IS_CHILD_OF",
            EdgeKind::IsPartOf => "IS_PART_OF",
            EdgeKind::ExactMatch => "EXACT_MATCH",
            EdgeKind::InferredAlignment => "INFERRED_ALIGNMENT",
            EdgeKind::Related => "RELATED",
        }
    }
}

/// Graph-structured neighborhood of one concept code.
///
/// `codes`, `features` and the enrichment vectors are all indexed by node
/// position. Enrichment (grade levels, descriptions, per-student historical
/// scores) is optional in the artifact; [`ConceptSubgraph::validate`] only
/// checks alignment when it is present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConceptSubgraph {
    /// Node identifiers, ordered; the defining code must appear here
    pub codes: Vec<String>,
    /// Typed edges between node indices
    pub edges: Vec<SubgraphEdge>,
    /// Per-node feature vectors of uniform width
    pub features: Vec<Vec<f32>>,
    /// Per-node grade levels (enrichment)
    #[serde(default)]
    pub grade_levels: Option<Vec<Vec<String>>>,
    /// Per-node descriptions (enrichment)
    #[serde(default)]
    pub descriptions: Option<Vec<String>>,
    /// Per-node map of student id to normalized historical score (enrichment)
    #[serde(default)]
    pub history_scores: Option<Vec<HashMap<String, f32>>>,
}

impl ConceptSubgraph {
    /// Number of nodes
    pub fn node_count(&self) -> usize {
        self.codes.len()
    }

    /// Width of the per-node feature vectors; 0 for an empty graph
    pub fn feature_dim(&self) -> usize {
        self.features.first().map(Vec::len).unwrap_or(0)
    }

    /// Index of `code` in the node list, if present
    pub fn index_of(&self, code: &str) -> Option<usize> {
        self.codes.iter().position(|c| c == code)
    }

    /// Node indices sharing an edge with `idx` in either direction,
    /// including `idx` itself. Sorted and deduplicated.
    pub fn one_hop(&self, idx: usize) -> BTreeSet<usize> {
        let mut visible = BTreeSet::new();
        visible.insert(idx);
        for edge in &self.edges {
            if edge.source == idx || edge.target == idx {
                visible.insert(edge.source);
                visible.insert(edge.target);
            }
        }
        visible
    }

    /// Structural invariants every materialized artifact must satisfy.
    ///
    /// Violations are integrity failures: the artifact is unusable as-is and
    /// the cache treats it like an absent code in history context.
    pub fn validate(&self) -> Result<()> {
        if self.codes.is_empty() {
            return Err(ReadygraphError::Integrity(
                "subgraph has no nodes".to_string(),
            ));
        }
        if self.features.len() != self.codes.len() {
            return Err(ReadygraphError::Integrity(format!(
                "feature rows ({}) do not match node count ({})",
                self.features.len(),
                self.codes.len()
            )));
        }
        let width = self.feature_dim();
        if self.features.iter().any(|row| row.len() != width) {
            return Err(ReadygraphError::Integrity(
                "feature rows have inconsistent widths".to_string(),
            ));
        }
        for edge in &self.edges {
            if edge.source >= self.codes.len() || edge.target >= self.codes.len() {
                return Err(ReadygraphError::Integrity(format!(
                    "edge ({}, {}) out of range for {} nodes",
                    edge.source,
                    edge.target,
                    self.codes.len()
                )));
            }
        }
        if let Some(grades) = &self.grade_levels {
            if grades.len() != self.codes.len() {
                return Err(ReadygraphError::Integrity(
                    "grade_levels not aligned with node list".to_string(),
                ));
            }
        }
        if let Some(descriptions) = &self.descriptions {
            if descriptions.len() != self.codes.len() {
                return Err(ReadygraphError::Integrity(
                    "descriptions not aligned with node list".to_string(),
                ));
            }
        }
        if let Some(scores) = &self.history_scores {
            if scores.len() != self.codes.len() {
                return Err(ReadygraphError::Integrity(
                    "history_scores not aligned with node list".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_graph() -> ConceptSubgraph {
        ConceptSubgraph {
            codes: vec!["A".into(), "B".into(), "C".into(), "D".into()],
            edges: vec![
                SubgraphEdge { source: 0, target: 1, kind: 0 },
                SubgraphEdge { source: 1, target: 2, kind: 2 },
            ],
            features: vec![vec![1.0, 0.0]; 4],
            grade_levels: None,
            descriptions: None,
            history_scores: None,
        }
    }

    #[test]
    fn validate_accepts_well_formed_graph() {
        assert!(small_graph().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_node_list() {
        let g = ConceptSubgraph {
            codes: vec![],
            edges: vec![],
            features: vec![],
            grade_levels: None,
            descriptions: None,
            history_scores: None,
        };
        assert!(matches!(
            g.validate(),
            Err(ReadygraphError::Integrity(_))
        ));
    }

    #[test]
    fn validate_rejects_out_of_range_edge() {
        let mut g = small_graph();
        g.edges.push(SubgraphEdge { source: 0, target: 9, kind: 0 });
        assert!(g.validate().is_err());
    }

    #[test]
    fn validate_rejects_ragged_features() {
        let mut g = small_graph();
        g.features[2] = vec![1.0];
        assert!(g.validate().is_err());
    }

    #[test]
    fn validate_rejects_misaligned_enrichment() {
        let mut g = small_graph();
        g.descriptions = Some(vec!["only one".into()]);
        assert!(g.validate().is_err());
    }

    #[test]
    fn one_hop_excludes_disconnected_nodes() {
        let g = small_graph();
        let b = g.index_of("B").unwrap();
        let visible = g.one_hop(b);
        // D shares no edge with B
        assert_eq!(visible.into_iter().collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn edge_kind_vocabulary() {
        assert_eq!(EdgeKind::from_tag(0).as_str(), "IS_CHILD_OF");
        assert_eq!(EdgeKind::from_tag(1).as_str(), "IS_PART_OF");
        assert_eq!(EdgeKind::from_tag(2).as_str(), "EXACT_MATCH");
        assert_eq!(EdgeKind::from_tag(3).as_str(), "INFERRED_ALIGNMENT");
        assert_eq!(EdgeKind::from_tag(42).as_str(), "RELATED");
    }

    #[test]
    fn artifact_round_trips_through_json() {
        let g = small_graph();
        let json = serde_json::to_string(&g).unwrap();
        let back: ConceptSubgraph = serde_json::from_str(&json).unwrap();
        assert_eq!(back.codes, g.codes);
        assert_eq!(back.edges, g.edges);
        assert!(back.validate().is_ok());
    }
}
