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

pub mod in_memory;

use crate::{dispatch::Checkpoint, used_units::UsedUnitSet};
use sprinkle_kernel::{
    CampaignConfig, CampaignId, FungibleSnapshotEntry, PayoutHolder, UnitId, WalletId,
};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Internal(#[from] Box<dyn std::error::Error + Send + Sync>),
    #[error("unknown campaign {0}")]
    UnknownCampaign(CampaignId),
    #[error("malformed row under '{key}': {reason}")]
    Malformed { key: String, reason: String },
}

/// Durable state of campaigns.
///
/// Every method is atomic on its own: a set-union of used units, the consumption of a fungible
/// entry or the stamping of payouts either fully happen or not at all, even when several
/// processes share the store.
pub trait CampaignStore {
    // Configuration
    // ------------------------------------------------------------------------

    fn config(&self, campaign: &CampaignId) -> Result<Option<CampaignConfig>, StoreError>;

    /// Insert or replace the whole document.
    fn put_config(&self, config: &CampaignConfig) -> Result<(), StoreError>;

    // Used units
    // ------------------------------------------------------------------------

    fn used_units(&self, campaign: &CampaignId) -> Result<UsedUnitSet, StoreError>;

    /// Returns the units that were not already recorded; any other unit was claimed before.
    fn add_used_units(
        &self,
        campaign: &CampaignId,
        units: &BTreeSet<UnitId>,
    ) -> Result<BTreeSet<UnitId>, StoreError>;

    /// Returns how many units were actually removed.
    fn remove_used_units(
        &self,
        campaign: &CampaignId,
        units: &BTreeSet<UnitId>,
    ) -> Result<usize, StoreError>;

    // Fungible snapshot
    // ------------------------------------------------------------------------

    fn fungible_entry(
        &self,
        campaign: &CampaignId,
        wallet: &WalletId,
    ) -> Result<Option<FungibleSnapshotEntry>, StoreError>;

    fn fungible_snapshot(
        &self,
        campaign: &CampaignId,
    ) -> Result<BTreeMap<WalletId, FungibleSnapshotEntry>, StoreError>;

    /// Replace any previous snapshot of the campaign.
    fn put_fungible_snapshot(
        &self,
        campaign: &CampaignId,
        entries: &BTreeMap<WalletId, FungibleSnapshotEntry>,
    ) -> Result<(), StoreError>;

    /// Mark a wallet's entry consumed. Returns `false` when there's no entry, or when it was
    /// consumed already; only one caller ever gets `true` for a given entry.
    fn consume_fungible_entry(
        &self,
        campaign: &CampaignId,
        wallet: &WalletId,
    ) -> Result<bool, StoreError>;

    // Payouts
    // ------------------------------------------------------------------------

    /// Payouts in the order they were published.
    fn payouts(&self, campaign: &CampaignId) -> Result<Vec<PayoutHolder>, StoreError>;

    /// Replace the payout list.
    fn put_payouts(&self, campaign: &CampaignId, holders: &[PayoutHolder])
        -> Result<(), StoreError>;

    /// Copy the transaction reference of each given holder onto the stored payout of the same
    /// wallet, unless that payout carries a reference already. Returns how many were stamped.
    fn stamp_payouts(
        &self,
        campaign: &CampaignId,
        stamped: &[PayoutHolder],
    ) -> Result<usize, StoreError>;
}

/// Persists dispatch progress of one campaign into a [`CampaignStore`].
pub struct StoreCheckpoint<'a, S: ?Sized> {
    store: &'a S,
    campaign: CampaignId,
}

impl<'a, S: CampaignStore + ?Sized> StoreCheckpoint<'a, S> {
    pub fn new(store: &'a S, campaign: CampaignId) -> Self {
        Self { store, campaign }
    }

    /// Persist every stamp of `holders` the store doesn't know yet, e.g. after a run stopped on
    /// a failing checkpoint. Stored references are never overwritten, so this is safe to repeat.
    pub fn recover(&self, holders: &[PayoutHolder]) -> Result<usize, StoreError> {
        let stamped: Vec<PayoutHolder> = holders
            .iter()
            .filter(|h| h.is_resolved())
            .cloned()
            .collect();
        if stamped.is_empty() {
            return Ok(0);
        }
        self.store.stamp_payouts(&self.campaign, &stamped)
    }
}

impl<S: CampaignStore + ?Sized> Checkpoint for StoreCheckpoint<'_, S> {
    fn confirmed(&self, batch: &[PayoutHolder]) -> Result<(), StoreError> {
        self.store.stamp_payouts(&self.campaign, batch).map(|_| ())
    }
}

/// Stamp `target` from `stamped`, by wallet. Shared by store implementations.
pub fn apply_stamps(target: &mut [PayoutHolder], stamped: &[PayoutHolder]) -> usize {
    let refs: BTreeMap<&WalletId, _> = stamped
        .iter()
        .filter_map(|h| h.transaction_ref.as_ref().map(|r| (&h.wallet, r)))
        .collect();

    let mut count = 0;
    for holder in target.iter_mut().filter(|h| !h.is_resolved()) {
        if let Some(reference) = refs.get(&holder.wallet) {
            holder.transaction_ref = Some((*reference).clone());
            count += 1;
        }
    }
    count
}
