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

//! Readygraph Core
//!
//! Fundamental data structures and seams for the readiness-prediction
//! pipeline: concept subgraphs, student history entries, the scoring-model
//! contract, the shared error taxonomy and retry policy.

pub mod error;
pub mod history;
pub mod retry;
pub mod scoring;
pub mod subgraph;

pub use error::{ReadygraphError, Result};
pub use history::{level_in_vocab, StudentHistoryEntry, LEVEL_VOCAB};
pub use retry::RetryPolicy;
pub use scoring::{sigmoid, GraphStep, Readiness, ScoringModel};
pub use subgraph::{ConceptSubgraph, EdgeKind, SubgraphEdge};
