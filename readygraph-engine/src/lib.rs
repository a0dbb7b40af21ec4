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

//! Readygraph Engine
//!
//! The inference core: sequence repository, readiness pipeline and graph
//! projection, all sharing one subgraph cache.

pub mod pipeline;
pub mod projection;
pub mod repository;

pub use pipeline::{InferenceEngine, PipelineConfig};
pub use projection::{GraphProjection, LinkRecord, NodeRecord};
pub use repository::SequenceRepository;
