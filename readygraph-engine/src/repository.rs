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

//! Per-student assessment history, loaded once at process start from a
//! static JSON mapping and read-only afterwards.

use readygraph_core::{Result, StudentHistoryEntry};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

const NO_HISTORY: &[StudentHistoryEntry] = &[];

/// Read-only index of student assessment sequences.
pub struct SequenceRepository {
    sequences: HashMap<String, Vec<StudentHistoryEntry>>,
}

impl SequenceRepository {
    /// Load `{student_id: [entries]}` from a JSON file. Entries are
    /// sorted by sequence position regardless of file order.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        let sequences: HashMap<String, Vec<StudentHistoryEntry>> =
            serde_json::from_slice(&bytes)?;
        let repository = Self::from_map(sequences);
        info!(
            students = repository.student_count(),
            path = %path.as_ref().display(),
            "sequence repository loaded"
        );
        Ok(repository)
    }

    pub fn from_map(mut sequences: HashMap<String, Vec<StudentHistoryEntry>>) -> Self {
        for entries in sequences.values_mut() {
            entries.sort_by_key(|e| e.position);
        }
        Self { sequences }
    }

    /// True if the student has ever been seen, even with zero entries.
    pub fn contains(&self, student_id: &str) -> bool {
        self.sequences.contains_key(student_id)
    }

    /// Chronologically ordered history; empty for unknown students.
    /// Callers decide whether an empty history is acceptable.
    pub fn history_for(&self, student_id: &str) -> &[StudentHistoryEntry] {
        self.sequences
            .get(student_id)
            .map(Vec::as_slice)
            .unwrap_or(NO_HISTORY)
    }

    pub fn student_count(&self) -> usize {
        self.sequences.len()
    }
}
