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

pub mod allocation;
pub mod campaign;
pub mod dispatch;
pub mod eligibility;
pub mod minimum;
pub mod modifiers;
pub mod providers;
pub mod ranks;
pub mod scoring;
pub mod store;
pub mod used_units;

pub use allocation::{allocate, Allocation};
pub use dispatch::{
    BatchState, Checkpoint, DispatchError, DispatchReport, Dispatcher, SubmissionError, Submitter,
};
pub use eligibility::{Eligibility, Ineligible};
pub use minimum::{check_minimum, Adjustment, MinimumCheck, MinimumResolution};
pub use providers::{HoldingsProvider, ProviderError, WalletPage};
pub use ranks::{MemoizedRanks, RankProvider, RankTable, RankedUnit};
pub use scoring::{evaluate_wallet, score_wallet, Score};
pub use store::{in_memory::MemoryStore, CampaignStore, StoreCheckpoint, StoreError};
pub use used_units::UsedUnitSet;
