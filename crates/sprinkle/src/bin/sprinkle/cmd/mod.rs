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

use sprinkle_engine::CampaignStore;
use sprinkle_kernel::{CampaignConfig, CampaignId};
use std::error::Error;

pub mod allocate;
pub mod dispatch;
pub mod score;
pub mod snapshot;
pub mod status;
pub mod tally;

/// The configuration of a campaign previously recorded by `snapshot` or `allocate`.
pub(crate) fn stored_config(
    store: &dyn CampaignStore,
    campaign: &CampaignId,
) -> Result<CampaignConfig, Box<dyn Error>> {
    store.config(campaign)?.ok_or_else(|| {
        format!("unknown campaign '{campaign}'; record it first with 'snapshot' or 'allocate'")
            .into()
    })
}
