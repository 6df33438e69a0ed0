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

use crate::{
    AssetId, CampaignId, CollectionId, OnChainAmount, PolicySetting, PoolId, UnitId, WalletId,
};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, fs, io, path::Path};
use thiserror::Error;

/// Everything that defines a distribution. A configuration is immutable for the duration of an
/// allocation pass.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignConfig {
    pub id: CampaignId,

    pub policy_settings: Vec<PolicySetting>,

    #[serde(default)]
    pub blacklisted_wallets: BTreeSet<WalletId>,

    #[serde(default)]
    pub blacklisted_units: BTreeSet<UnitId>,

    /// When non-empty, only wallets delegated to one of these pools are eligible.
    #[serde(default)]
    pub required_delegation_targets: BTreeSet<PoolId>,

    /// Total amount to distribute, in the smallest on-chain unit of the pool asset.
    pub total_pool_on_chain_amount: OnChainAmount,

    pub pool_decimals: u8,

    #[serde(default)]
    pub pool_asset: AssetId,

    /// Smallest amount worth transferring to a single recipient, if any.
    #[serde(default)]
    pub minimum_transfer: Option<OnChainAmount>,
}

#[derive(Debug, Error)]
pub enum InvalidCampaign {
    #[error("unable to read campaign file: {0}")]
    Io(#[from] io::Error),
    #[error("malformed campaign document: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("collection {0} is configured more than once")]
    DuplicateCollection(CollectionId),
    #[error("whale modifier of collection {0} has a group size of zero")]
    EmptyWhaleGroup(CollectionId),
    #[error("rank modifier of collection {collection} has an empty range [{min}, {max}]")]
    EmptyRankRange {
        collection: CollectionId,
        min: u64,
        max: u64,
    },
}

impl CampaignConfig {
    pub fn from_json(bytes: &[u8]) -> Result<Self, InvalidCampaign> {
        let config: CampaignConfig = serde_json::from_slice(bytes)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, InvalidCampaign> {
        Self::from_json(&fs::read(path)?)
    }

    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(self)
    }

    pub fn validate(&self) -> Result<(), InvalidCampaign> {
        let mut seen = BTreeSet::new();
        for policy in &self.policy_settings {
            if !seen.insert(&policy.collection_id) {
                return Err(InvalidCampaign::DuplicateCollection(
                    policy.collection_id.clone(),
                ));
            }

            if policy.whale_modifiers.iter().any(|w| w.group_size == 0) {
                return Err(InvalidCampaign::EmptyWhaleGroup(
                    policy.collection_id.clone(),
                ));
            }

            if let Some(r) = policy
                .rank_modifiers
                .iter()
                .find(|r| r.min_rank > r.max_rank)
            {
                return Err(InvalidCampaign::EmptyRankRange {
                    collection: policy.collection_id.clone(),
                    min: r.min_rank,
                    max: r.max_rank,
                });
            }
        }
        Ok(())
    }

    pub fn policy(&self, collection: &CollectionId) -> Option<&PolicySetting> {
        self.policy_settings
            .iter()
            .find(|p| &p.collection_id == collection)
    }

    pub fn collections(&self) -> impl Iterator<Item = &CollectionId> {
        self.policy_settings.iter().map(|p| &p.collection_id)
    }

    pub fn requires_delegation(&self) -> bool {
        !self.required_delegation_targets.is_empty()
    }
}
