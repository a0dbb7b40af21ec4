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

//! Historical assessment entries, loaded once at startup and read-only
//! afterwards.

use serde::{Deserialize, Serialize};

/// Number of difficulty levels the scoring model can embed (levels 0..=4).
pub const LEVEL_VOCAB: u8 = 5;

/// One assessed item in a student's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentHistoryEntry {
    /// Concept code the item assessed
    pub code: String,
    /// Difficulty level of the item, within `0..LEVEL_VOCAB`
    pub level: u8,
    /// Position in the student's chronological sequence
    pub position: u32,
    /// Normalized score the student achieved, when recorded
    #[serde(default)]
    pub score: Option<f32>,
}

/// True if `level` falls inside the difficulty vocabulary.
pub fn level_in_vocab(level: i64) -> bool {
    (0..i64::from(LEVEL_VOCAB)).contains(&level)
}
