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

//! One-hop projection of a concept subgraph into the node/link shape the
//! UI consumes.

use readygraph_core::{ConceptSubgraph, EdgeKind, ReadygraphError, Result};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct GraphProjection {
    pub nodes: Vec<NodeRecord>,
    pub links: Vec<LinkRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeRecord {
    pub id: String,
    pub label: String,
    pub grade_levels: Vec<String>,
    pub description: String,
    /// This student's historical score for the concept, when enriched
    pub score: Option<f32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LinkRecord {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Project the target node and its direct neighbors out of `subgraph`.
///
/// A subgraph file must contain its own defining code; its absence is a
/// data-integrity violation surfaced as `NotFound`.
pub fn project_subgraph(
    subgraph: &ConceptSubgraph,
    student_id: &str,
    target_code: &str,
) -> Result<GraphProjection> {
    let target_idx = subgraph.index_of(target_code).ok_or_else(|| {
        ReadygraphError::NotFound(format!(
            "code {target_code} missing from its own subgraph"
        ))
    })?;

    let visible = subgraph.one_hop(target_idx);

    let nodes = visible
        .iter()
        .map(|&i| NodeRecord {
            id: subgraph.codes[i].clone(),
            label: subgraph.codes[i].clone(),
            grade_levels: subgraph
                .grade_levels
                .as_ref()
                .map(|g| g[i].clone())
                .unwrap_or_default(),
            description: subgraph
                .descriptions
                .as_ref()
                .map(|d| d[i].clone())
                .unwrap_or_default(),
            score: subgraph
                .history_scores
                .as_ref()
                .and_then(|s| s[i].get(student_id).copied()),
        })
        .collect();

    let links = subgraph
        .edges
        .iter()
        .filter(|e| visible.contains(&e.source) && visible.contains(&e.target))
        .map(|e| LinkRecord {
            source: subgraph.codes[e.source].clone(),
            target: subgraph.codes[e.target].clone(),
            kind: EdgeKind::from_tag(e.kind).as_str().to_string(),
        })
        .collect();

    Ok(GraphProjection { nodes, links })
}
