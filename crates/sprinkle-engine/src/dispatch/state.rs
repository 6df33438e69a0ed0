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

use super::capacity::Capacity;
use sprinkle_kernel::{Decimal, PayoutHolder};

/// Progress of a dispatch run, carried by every dispatch error so that an interrupted run can be
/// reported and resumed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchState {
    /// Positions of the payouts still lacking a transaction reference.
    pub unresolved: Vec<usize>,
    /// Fraction of the unresolved payouts to put in a single batch. Starts at 1.
    pub batch_size_factor: Decimal,
    /// Largest batch size still allowed; strictly decreases on every capacity error.
    pub batch_ceiling: usize,
    /// Payouts carrying a transaction reference, including those resolved by earlier runs.
    pub confirmed_count: usize,
    pub last_message: Option<String>,
    pub last_error: Option<String>,
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ShrinkError {
    Unparseable,
    CannotShrink(Capacity),
}

impl BatchState {
    pub fn new(holders: &[PayoutHolder]) -> Self {
        let mut state = BatchState {
            unresolved: Vec::new(),
            batch_size_factor: Decimal::one(),
            batch_ceiling: holders.len().max(1),
            confirmed_count: 0,
            last_message: None,
            last_error: None,
        };
        state.refresh(holders);
        state
    }

    pub(crate) fn refresh(&mut self, holders: &[PayoutHolder]) {
        self.unresolved = holders
            .iter()
            .enumerate()
            .filter(|(_, holder)| !holder.is_resolved())
            .map(|(i, _)| i)
            .collect();
        self.confirmed_count = holders.len() - self.unresolved.len();
    }

    /// `floor(batch_size_factor × unresolved)`, within `[1, batch_ceiling]`.
    pub fn batch_size(&self) -> usize {
        let size = (&self.batch_size_factor * self.unresolved.len() as u64).floor();
        usize::try_from(size)
            .unwrap_or(usize::MAX)
            .clamp(1, self.batch_ceiling.max(1))
    }

    /// Adjust sizing after a batch of `failed` transfers exceeded capacity.
    pub(crate) fn shrink(&mut self, message: &str, failed: usize) -> Result<Capacity, ShrinkError> {
        self.last_error = Some(message.to_string());

        let capacity = Capacity::parse(message).ok_or(ShrinkError::Unparseable)?;

        if failed <= 1 {
            return Err(ShrinkError::CannotShrink(capacity));
        }

        let ratio = capacity
            .shrink_ratio()
            .ok_or(ShrinkError::CannotShrink(capacity))?;

        self.batch_size_factor = &self.batch_size_factor * &ratio;
        self.batch_ceiling = failed - 1;

        Ok(capacity)
    }
}
