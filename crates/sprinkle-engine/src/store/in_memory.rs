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

use super::{apply_stamps, CampaignStore, StoreError};
use crate::used_units::UsedUnitSet;
use sprinkle_kernel::{
    CampaignConfig, CampaignId, FungibleSnapshotEntry, PayoutHolder, UnitId, WalletId,
};
use std::{
    cell::RefCell,
    collections::{BTreeMap, BTreeSet},
};

/// A campaign store living in memory, for tests and dry runs.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    configs: RefCell<BTreeMap<CampaignId, CampaignConfig>>,
    used_units: RefCell<BTreeMap<CampaignId, BTreeSet<UnitId>>>,
    fungible: RefCell<BTreeMap<CampaignId, BTreeMap<WalletId, FungibleSnapshotEntry>>>,
    payouts: RefCell<BTreeMap<CampaignId, Vec<PayoutHolder>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CampaignStore for MemoryStore {
    fn config(&self, campaign: &CampaignId) -> Result<Option<CampaignConfig>, StoreError> {
        Ok(self.configs.borrow().get(campaign).cloned())
    }

    fn put_config(&self, config: &CampaignConfig) -> Result<(), StoreError> {
        self.configs
            .borrow_mut()
            .insert(config.id.clone(), config.clone());
        Ok(())
    }

    fn used_units(&self, campaign: &CampaignId) -> Result<UsedUnitSet, StoreError> {
        Ok(self
            .used_units
            .borrow()
            .get(campaign)
            .cloned()
            .unwrap_or_default()
            .into())
    }

    fn add_used_units(
        &self,
        campaign: &CampaignId,
        units: &BTreeSet<UnitId>,
    ) -> Result<BTreeSet<UnitId>, StoreError> {
        let mut used_units = self.used_units.borrow_mut();
        let set = used_units.entry(campaign.clone()).or_default();
        Ok(units
            .iter()
            .filter(|unit| set.insert((*unit).clone()))
            .cloned()
            .collect())
    }

    fn remove_used_units(
        &self,
        campaign: &CampaignId,
        units: &BTreeSet<UnitId>,
    ) -> Result<usize, StoreError> {
        let mut used_units = self.used_units.borrow_mut();
        Ok(match used_units.get_mut(campaign) {
            None => 0,
            Some(set) => units.iter().filter(|unit| set.remove(*unit)).count(),
        })
    }

    fn fungible_entry(
        &self,
        campaign: &CampaignId,
        wallet: &WalletId,
    ) -> Result<Option<FungibleSnapshotEntry>, StoreError> {
        Ok(self
            .fungible
            .borrow()
            .get(campaign)
            .and_then(|entries| entries.get(wallet))
            .cloned())
    }

    fn fungible_snapshot(
        &self,
        campaign: &CampaignId,
    ) -> Result<BTreeMap<WalletId, FungibleSnapshotEntry>, StoreError> {
        Ok(self
            .fungible
            .borrow()
            .get(campaign)
            .cloned()
            .unwrap_or_default())
    }

    fn put_fungible_snapshot(
        &self,
        campaign: &CampaignId,
        entries: &BTreeMap<WalletId, FungibleSnapshotEntry>,
    ) -> Result<(), StoreError> {
        self.fungible
            .borrow_mut()
            .insert(campaign.clone(), entries.clone());
        Ok(())
    }

    fn consume_fungible_entry(
        &self,
        campaign: &CampaignId,
        wallet: &WalletId,
    ) -> Result<bool, StoreError> {
        let mut fungible = self.fungible.borrow_mut();
        match fungible
            .get_mut(campaign)
            .and_then(|entries| entries.get_mut(wallet))
        {
            Some(entry) if !entry.consumed => {
                entry.consumed = true;
                Ok(true)
            }
            Some(_) | None => Ok(false),
        }
    }

    fn payouts(&self, campaign: &CampaignId) -> Result<Vec<PayoutHolder>, StoreError> {
        Ok(self
            .payouts
            .borrow()
            .get(campaign)
            .cloned()
            .unwrap_or_default())
    }

    fn put_payouts(
        &self,
        campaign: &CampaignId,
        holders: &[PayoutHolder],
    ) -> Result<(), StoreError> {
        self.payouts
            .borrow_mut()
            .insert(campaign.clone(), holders.to_vec());
        Ok(())
    }

    fn stamp_payouts(
        &self,
        campaign: &CampaignId,
        stamped: &[PayoutHolder],
    ) -> Result<usize, StoreError> {
        let mut payouts = self.payouts.borrow_mut();
        let holders = payouts
            .get_mut(campaign)
            .ok_or_else(|| StoreError::UnknownCampaign(campaign.clone()))?;
        Ok(apply_stamps(holders, stamped))
    }
}
