// Copyright 2025 PRAGMA
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::scoring::Score;
use sprinkle_kernel::UnitId;
use std::collections::{btree_set, BTreeSet};

/// Units already counted during a campaign's lifetime. The set only ever grows: there is no way
/// to "un-count" a unit.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UsedUnitSet(BTreeSet<UnitId>);

impl UsedUnitSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, unit: &UnitId) -> bool {
        self.0.contains(unit)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Record the units consumed by a score. Returns how many were not already known.
    pub fn commit(&mut self, score: &Score) -> usize {
        self.extend(score.consumed_units.iter().cloned())
    }

    /// Returns how many units were not already known.
    pub fn extend(&mut self, units: impl IntoIterator<Item = UnitId>) -> usize {
        let before = self.0.len();
        self.0.extend(units);
        self.0.len() - before
    }

    pub fn iter(&self) -> btree_set::Iter<'_, UnitId> {
        self.0.iter()
    }
}

impl FromIterator<UnitId> for UsedUnitSet {
    fn from_iter<T: IntoIterator<Item = UnitId>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<BTreeSet<UnitId>> for UsedUnitSet {
    fn from(units: BTreeSet<UnitId>) -> Self {
        Self(units)
    }
}

impl<'a> IntoIterator for &'a UsedUnitSet {
    type Item = &'a UnitId;
    type IntoIter = btree_set::Iter<'a, UnitId>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
