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

//! The different ways a campaign uses the engine: a fungible snapshot taken once upfront, live
//! entries scored one wallet at a time, vote tallies, and the final publication of payouts.

use crate::{
    allocation::{self, allocate, Allocation},
    eligibility::{self, Ineligible},
    minimum::{check_minimum, MinimumCheck, MinimumResolution},
    providers::ProviderError,
    ranks::{MemoizedRanks, RankTable},
    scoring::{evaluate_wallet, Score},
    store::{CampaignStore, StoreError},
    used_units::UsedUnitSet,
};
use sprinkle_kernel::{
    CampaignConfig, CampaignId, Decimal, FungibleSnapshotEntry, HolderHoldings, Holding, PoolId,
    UnitId, WalletId,
};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use tracing::{debug, info, instrument};

const EVENT_TARGET: &str = "sprinkle::engine::campaign";

#[derive(Debug, Error)]
pub enum CampaignError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("unknown campaign {0}")]
    UnknownCampaign(CampaignId),
    #[error(
        "{affected} payouts fall below the minimum transfer of {minimum}; raising them costs {extra} more"
    )]
    MinimumUnconfirmed {
        affected: usize,
        minimum: u64,
        extra: u128,
    },
    #[error("payouts of campaign {0} are being dispatched already")]
    AlreadyDispatched(CampaignId),
}

// Fungible snapshot
// ----------------------------------------------------------------------------

/// Points of every eligible wallet holding fungible tokens of the configured collections:
/// `Σ balance × weight` over fungible policies.
#[instrument(level = "debug", skip_all, fields(campaign = %config.id))]
pub fn fungible_snapshot(
    config: &CampaignConfig,
    holders: &[HolderHoldings],
) -> BTreeMap<WalletId, FungibleSnapshotEntry> {
    let mut snapshot = BTreeMap::new();

    for recipient in allocation::merge(holders) {
        let Ok(policies) = eligibility::check(
            recipient.wallet,
            &recipient.holdings,
            recipient.delegation,
            config,
        )
        .into_result() else {
            continue;
        };

        let points: Decimal = policies
            .iter()
            .filter(|policy| policy.has_fungible_component)
            .flat_map(|policy| {
                recipient
                    .holdings
                    .iter()
                    .filter(|holding| {
                        holding.is_fungible
                            && holding.collection_id == policy.collection_id
                            && !config.blacklisted_units.contains(&holding.unit_id)
                    })
                    .map(|holding| &holding.human_amount * &policy.weight)
            })
            .sum();

        if !points.is_zero() {
            snapshot.insert(
                recipient.wallet.clone(),
                FungibleSnapshotEntry::new(recipient.wallet.clone(), points),
            );
        }
    }

    debug!(target: EVENT_TARGET, wallets = snapshot.len(), "fungible_snapshot.done");

    snapshot
}

// Live entry
// ----------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Entry {
    Scored(Score),
    Ineligible(Ineligible),
}

/// Score one wallet against the campaign's current state, then consume what the score used: the
/// wallet's fungible entry and every unit counted.
#[instrument(level = "debug", skip_all, fields(campaign = %campaign, wallet = %wallet))]
pub async fn live_entry(
    store: &dyn CampaignStore,
    campaign: &CampaignId,
    wallet: &WalletId,
    holdings: &[Holding],
    delegation: Option<&PoolId>,
    ranks: &mut MemoizedRanks<'_>,
) -> Result<Entry, CampaignError> {
    let config = store
        .config(campaign)?
        .ok_or_else(|| CampaignError::UnknownCampaign(campaign.clone()))?;

    if let Err(reason) = eligibility::check_wallet(wallet, delegation, &config) {
        return Ok(Entry::Ineligible(reason));
    }

    let used = store.used_units(campaign)?;
    let fungible = store.fungible_entry(campaign, wallet)?;
    let table = ranks.prefetch(config.collections()).await?;

    let mut score = match evaluate_wallet(
        wallet,
        holdings,
        delegation,
        &config,
        fungible.as_ref(),
        &used,
        table,
    ) {
        Ok(score) => score,
        Err(reason) => return Ok(Entry::Ineligible(reason)),
    };

    // Someone else consumed the entry in the meantime: score again without it.
    if score.fungible_consumed && !store.consume_fungible_entry(campaign, wallet)? {
        score = match evaluate_wallet(wallet, holdings, delegation, &config, None, &used, table) {
            Ok(score) => score,
            Err(reason) => return Ok(Entry::Ineligible(reason)),
        };
    }

    let recorded = store.add_used_units(campaign, &score.consumed_units)?;

    // Likewise for units claimed by a concurrent entry: they no longer count. Scoring again
    // only ever drops units, so what remains is exactly what was recorded.
    if recorded.len() < score.consumed_units.len() {
        let claimed: Vec<UnitId> = score
            .consumed_units
            .difference(&recorded)
            .cloned()
            .collect();
        debug!(target: EVENT_TARGET, claimed = claimed.len(), "live_entry.units_claimed");

        let mut used = used;
        used.extend(claimed);
        let fungible = fungible.filter(|_| score.fungible_consumed);
        score = match evaluate_wallet(
            wallet,
            holdings,
            delegation,
            &config,
            fungible.as_ref(),
            &used,
            table,
        ) {
            Ok(score) => score,
            Err(reason) => return Ok(Entry::Ineligible(reason)),
        };
    }

    info!(
        target: EVENT_TARGET,
        amount = %score.amount,
        units = recorded.len(),
        fungible = score.fungible_consumed,
        "live_entry.scored"
    );

    Ok(Entry::Scored(score))
}

// Vote tally
// ----------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Voter {
    pub wallet: WalletId,
    pub delegation: Option<PoolId>,
    pub holdings: Vec<Holding>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Tally {
    /// Weight of each eligible vote, in voting order.
    pub weights: Vec<(WalletId, Decimal)>,
    pub ineligible: Vec<Ineligible>,
    pub total: Decimal,
}

/// Weigh votes in order. Units and fungible entries are shared across the whole tally: whoever
/// votes first with a unit gets to count it.
#[instrument(level = "debug", skip_all, fields(campaign = %config.id, voters = voters.len()))]
pub fn tally_votes(
    config: &CampaignConfig,
    voters: &[Voter],
    fungible: &BTreeMap<WalletId, FungibleSnapshotEntry>,
    ranks: &RankTable,
) -> Tally {
    let mut tally = Tally::default();
    let mut used = UsedUnitSet::new();
    let mut latched: BTreeSet<&WalletId> = BTreeSet::new();

    for voter in voters {
        let entry = fungible.get(&voter.wallet).map(|entry| {
            let mut entry = entry.clone();
            entry.consumed |= latched.contains(&voter.wallet);
            entry
        });

        match evaluate_wallet(
            &voter.wallet,
            &voter.holdings,
            voter.delegation.as_ref(),
            config,
            entry.as_ref(),
            &used,
            ranks,
        ) {
            Ok(score) => {
                used.commit(&score);
                if score.fungible_consumed {
                    latched.insert(&voter.wallet);
                }
                tally.total += &score.amount;
                tally.weights.push((voter.wallet.clone(), score.amount));
            }
            Err(reason) => tally.ineligible.push(reason),
        }
    }

    debug!(
        target: EVENT_TARGET,
        total = %tally.total,
        counted = tally.weights.len(),
        ineligible = tally.ineligible.len(),
        "tally_votes.done"
    );

    tally
}

// Publication
// ----------------------------------------------------------------------------

/// Allocate the pool, settle payouts below the minimum transfer, and persist both the campaign
/// and its payout list, ready for dispatch. Ranks missing from the holdings are fetched through
/// `ranks`, once per collection.
///
/// Fails with [`CampaignError::MinimumUnconfirmed`] when some payouts fall short and no
/// resolution was given, and refuses to replace a payout list of which some payouts were sent.
#[instrument(level = "info", skip_all, fields(campaign = %config.id))]
pub async fn publish(
    store: &dyn CampaignStore,
    config: &CampaignConfig,
    holders: &[HolderHoldings],
    resolution: Option<MinimumResolution>,
    ranks: &mut MemoizedRanks<'_>,
) -> Result<Allocation, CampaignError> {
    if store.payouts(&config.id)?.iter().any(|h| h.is_resolved()) {
        return Err(CampaignError::AlreadyDispatched(config.id.clone()));
    }

    let table = ranks.prefetch(config.collections()).await?;
    let mut allocation = allocate(config, holders, table);

    if let Some(minimum) = config.minimum_transfer {
        let payouts = std::mem::take(&mut allocation.holders);
        allocation.holders = match check_minimum(payouts, minimum) {
            MinimumCheck::Ready(payouts) => payouts,
            MinimumCheck::NeedsConfirmation(adjustment) => match resolution {
                Some(resolution) => adjustment.resolve(resolution),
                None => {
                    return Err(CampaignError::MinimumUnconfirmed {
                        affected: adjustment.affected().len(),
                        minimum,
                        extra: adjustment.extra_required(),
                    })
                }
            },
        };
    }

    store.put_config(config)?;
    store.put_payouts(&config.id, &allocation.holders)?;

    info!(
        target: EVENT_TARGET,
        payouts = allocation.holders.len(),
        total = allocation.total(),
        "publish.done"
    );

    Ok(allocation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ranks::tests::FixedRanks, store::in_memory::MemoryStore, tests::campaign};
    use pretty_assertions::assert_eq;
    use sprinkle_kernel::{PayoutHolder, PolicySetting, RankModifier, TransactionRef, UnitId};

    fn fungible_campaign() -> CampaignConfig {
        campaign(vec![
            PolicySetting::new("aa"),
            PolicySetting::new("ff").fungible(),
            PolicySetting::new("gg")
                .fungible()
                .with_weight(Decimal::from_integer(2)),
        ])
    }

    #[test]
    fn snapshot_of_fungible_balances() {
        let mut config = fungible_campaign();
        config.blacklisted_wallets.insert(WalletId::from("w3"));

        let holders = vec![
            HolderHoldings::new("w1", "a1")
                .holding(Holding::balance("ff", "ff", Decimal::from_integer(10)))
                .holding(Holding::balance("gg", "gg", Decimal::from_integer(5))),
            HolderHoldings::new("w2", "a2").holding(Holding::unit("aa01", "aa")),
            HolderHoldings::new("w3", "a3")
                .holding(Holding::balance("ff", "ff", Decimal::from_integer(10))),
            HolderHoldings::new("w1", "a1b")
                .holding(Holding::balance("ff", "ff", Decimal::from_integer(1))),
        ];

        let snapshot = fungible_snapshot(&config, &holders);

        assert_eq!(
            snapshot,
            BTreeMap::from([(
                WalletId::from("w1"),
                FungibleSnapshotEntry::new(WalletId::from("w1"), Decimal::from_integer(21)),
            )])
        );
    }

    #[tokio::test]
    async fn live_entries_consume_units_and_fungible_points() {
        let mut config = fungible_campaign();
        config.policy_settings[0].rank_modifiers = vec![RankModifier {
            min_rank: 1,
            max_rank: 1,
            amount: Decimal::from_integer(10),
        }];

        let store = MemoryStore::new();
        store.put_config(&config).unwrap();
        let wallet = WalletId::from("w1");
        store
            .put_fungible_snapshot(
                &config.id,
                &BTreeMap::from([(
                    wallet.clone(),
                    FungibleSnapshotEntry::new(wallet.clone(), Decimal::from_integer(4)),
                )]),
            )
            .unwrap();

        let provider = FixedRanks::default().with("aa", &[("aa01", 1)]);
        let mut ranks = MemoizedRanks::new(&provider);

        let holdings = vec![
            Holding::unit("aa01", "aa"),
            Holding::unit("aa02", "aa"),
            Holding::balance("ff", "ff", Decimal::from_integer(4)),
        ];

        let Entry::Scored(first) =
            live_entry(&store, &config.id, &wallet, &holdings, None, &mut ranks)
                .await
                .unwrap()
        else {
            panic!("expected a score");
        };
        assert_eq!(first.amount, Decimal::from_integer(2 + 10 + 4));

        let Entry::Scored(second) =
            live_entry(&store, &config.id, &wallet, &holdings, None, &mut ranks)
                .await
                .unwrap()
        else {
            panic!("expected a score");
        };
        assert_eq!(second.amount, Decimal::zero());

        assert_eq!(store.used_units(&config.id).unwrap().len(), 2);
        assert_eq!(provider.calls("aa"), 1);
    }

    /// A store in which another entry claims `claim` right before units get recorded.
    struct RacingStore {
        inner: MemoryStore,
        claim: BTreeSet<UnitId>,
    }

    impl CampaignStore for RacingStore {
        fn config(&self, campaign: &CampaignId) -> Result<Option<CampaignConfig>, StoreError> {
            self.inner.config(campaign)
        }

        fn put_config(&self, config: &CampaignConfig) -> Result<(), StoreError> {
            self.inner.put_config(config)
        }

        fn used_units(&self, campaign: &CampaignId) -> Result<UsedUnitSet, StoreError> {
            self.inner.used_units(campaign)
        }

        fn add_used_units(
            &self,
            campaign: &CampaignId,
            units: &BTreeSet<UnitId>,
        ) -> Result<BTreeSet<UnitId>, StoreError> {
            self.inner.add_used_units(campaign, &self.claim)?;
            self.inner.add_used_units(campaign, units)
        }

        fn remove_used_units(
            &self,
            campaign: &CampaignId,
            units: &BTreeSet<UnitId>,
        ) -> Result<usize, StoreError> {
            self.inner.remove_used_units(campaign, units)
        }

        fn fungible_entry(
            &self,
            campaign: &CampaignId,
            wallet: &WalletId,
        ) -> Result<Option<FungibleSnapshotEntry>, StoreError> {
            self.inner.fungible_entry(campaign, wallet)
        }

        fn fungible_snapshot(
            &self,
            campaign: &CampaignId,
        ) -> Result<BTreeMap<WalletId, FungibleSnapshotEntry>, StoreError> {
            self.inner.fungible_snapshot(campaign)
        }

        fn put_fungible_snapshot(
            &self,
            campaign: &CampaignId,
            entries: &BTreeMap<WalletId, FungibleSnapshotEntry>,
        ) -> Result<(), StoreError> {
            self.inner.put_fungible_snapshot(campaign, entries)
        }

        fn consume_fungible_entry(
            &self,
            campaign: &CampaignId,
            wallet: &WalletId,
        ) -> Result<bool, StoreError> {
            self.inner.consume_fungible_entry(campaign, wallet)
        }

        fn payouts(&self, campaign: &CampaignId) -> Result<Vec<PayoutHolder>, StoreError> {
            self.inner.payouts(campaign)
        }

        fn put_payouts(
            &self,
            campaign: &CampaignId,
            holders: &[PayoutHolder],
        ) -> Result<(), StoreError> {
            self.inner.put_payouts(campaign, holders)
        }

        fn stamp_payouts(
            &self,
            campaign: &CampaignId,
            stamped: &[PayoutHolder],
        ) -> Result<usize, StoreError> {
            self.inner.stamp_payouts(campaign, stamped)
        }
    }

    #[tokio::test]
    async fn units_claimed_concurrently_are_not_counted_twice() {
        let mut config = fungible_campaign();
        config.policy_settings[0].rank_modifiers = vec![RankModifier {
            min_rank: 1,
            max_rank: 1,
            amount: Decimal::from_integer(10),
        }];

        let store = RacingStore {
            inner: MemoryStore::new(),
            claim: BTreeSet::from([UnitId::from("aa01")]),
        };
        store.put_config(&config).unwrap();
        let wallet = WalletId::from("w1");
        store
            .put_fungible_snapshot(
                &config.id,
                &BTreeMap::from([(
                    wallet.clone(),
                    FungibleSnapshotEntry::new(wallet.clone(), Decimal::from_integer(4)),
                )]),
            )
            .unwrap();

        let provider = FixedRanks::default().with("aa", &[("aa01", 1)]);
        let mut ranks = MemoizedRanks::new(&provider);

        let holdings = vec![
            Holding::unit("aa01", "aa"),
            Holding::unit("aa02", "aa"),
            Holding::balance("ff", "ff", Decimal::from_integer(4)),
        ];

        let Entry::Scored(score) =
            live_entry(&store, &config.id, &wallet, &holdings, None, &mut ranks)
                .await
                .unwrap()
        else {
            panic!("expected a score");
        };

        assert_eq!(score.amount, Decimal::from_integer(1 + 4));
        assert_eq!(score.consumed_units, BTreeSet::from([UnitId::from("aa02")]));
        assert!(score.fungible_consumed);
        assert_eq!(store.used_units(&config.id).unwrap().len(), 2);
        assert!(store.fungible_entry(&config.id, &wallet).unwrap().unwrap().consumed);
    }

    #[tokio::test]
    async fn live_entry_of_a_blacklisted_wallet() {
        let mut config = fungible_campaign();
        config.blacklisted_wallets.insert(WalletId::from("w1"));
        let store = MemoryStore::new();
        store.put_config(&config).unwrap();
        let provider = FixedRanks::default();
        let mut ranks = MemoizedRanks::new(&provider);

        let entry = live_entry(
            &store,
            &config.id,
            &WalletId::from("w1"),
            &[Holding::unit("aa01", "aa")],
            None,
            &mut ranks,
        )
        .await
        .unwrap();

        assert_eq!(entry, Entry::Ineligible(Ineligible::Blacklisted(WalletId::from("w1"))));
        assert!(store.used_units(&config.id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn live_entry_of_an_unknown_campaign() {
        let store = MemoryStore::new();
        let provider = FixedRanks::default();
        let mut ranks = MemoizedRanks::new(&provider);

        let result = live_entry(
            &store,
            &CampaignId::from("nope"),
            &WalletId::from("w1"),
            &[],
            None,
            &mut ranks,
        )
        .await;

        assert!(matches!(result, Err(CampaignError::UnknownCampaign(..))));
    }

    #[test]
    fn votes_share_units_and_fungible_latch() {
        let config = fungible_campaign();
        let fungible = BTreeMap::from([(
            WalletId::from("w1"),
            FungibleSnapshotEntry::new(WalletId::from("w1"), Decimal::from_integer(5)),
        )]);

        let voters = vec![
            Voter {
                wallet: WalletId::from("w1"),
                delegation: None,
                holdings: vec![
                    Holding::unit("aa01", "aa"),
                    Holding::balance("ff", "ff", Decimal::from_integer(5)),
                ],
            },
            Voter {
                wallet: WalletId::from("w2"),
                delegation: None,
                holdings: vec![Holding::unit("aa01", "aa"), Holding::unit("aa02", "aa")],
            },
            Voter {
                wallet: WalletId::from("w1"),
                delegation: None,
                holdings: vec![Holding::balance("ff", "ff", Decimal::from_integer(5))],
            },
            Voter {
                wallet: WalletId::from("w3"),
                delegation: None,
                holdings: vec![Holding::unit("zz01", "zz")],
            },
        ];

        let tally = tally_votes(&config, &voters, &fungible, &RankTable::new());

        assert_eq!(
            tally.weights,
            vec![
                (WalletId::from("w1"), Decimal::from_integer(6)),
                (WalletId::from("w2"), Decimal::from_integer(1)),
                (WalletId::from("w1"), Decimal::zero()),
            ]
        );
        assert_eq!(tally.total, Decimal::from_integer(7));
        assert_eq!(
            tally.ineligible,
            vec![Ineligible::NoConfiguredCollection(WalletId::from("w3"))]
        );
    }

    fn two_holders() -> Vec<HolderHoldings> {
        vec![
            HolderHoldings::new("w1", "a1")
                .holding(Holding::unit("aa01", "aa"))
                .holding(Holding::unit("aa02", "aa"))
                .holding(Holding::unit("aa03", "aa")),
            HolderHoldings::new("w2", "a2").holding(Holding::unit("aa04", "aa")),
        ]
    }

    #[tokio::test]
    async fn publish_requires_a_minimum_resolution() {
        let mut config = campaign(vec![PolicySetting::new("aa")]);
        config.minimum_transfer = Some(300_000);
        let store = MemoryStore::new();
        let provider = FixedRanks::default();
        let mut ranks = MemoizedRanks::new(&provider);

        let result = publish(&store, &config, &two_holders(), None, &mut ranks).await;
        assert!(matches!(
            result,
            Err(CampaignError::MinimumUnconfirmed {
                affected: 1,
                minimum: 300_000,
                extra: 50_000,
            })
        ));
        assert!(store.payouts(&config.id).unwrap().is_empty());

        let allocation = publish(
            &store,
            &config,
            &two_holders(),
            Some(MinimumResolution::Accept),
            &mut ranks,
        )
        .await
        .unwrap();
        let amounts: Vec<(u64, bool)> = allocation
            .holders
            .iter()
            .map(|h| (h.amount, h.forced_minimum))
            .collect();
        assert_eq!(amounts, vec![(750_000, false), (300_000, true)]);
        assert_eq!(store.payouts(&config.id).unwrap(), allocation.holders);
        assert_eq!(store.config(&config.id).unwrap(), Some(config));
        assert_eq!(provider.calls("aa"), 1);
    }

    #[tokio::test]
    async fn publish_grants_rank_bonuses_from_the_rank_provider() {
        let mut policy = PolicySetting::new("aa");
        policy.rank_modifiers = vec![RankModifier {
            min_rank: 1,
            max_rank: 1,
            amount: Decimal::from_integer(1),
        }];
        let config = campaign(vec![policy]);
        let store = MemoryStore::new();
        let provider = FixedRanks::default().with("aa", &[("aa04", 1), ("aa01", 2)]);
        let mut ranks = MemoizedRanks::new(&provider);

        let allocation = publish(&store, &config, &two_holders(), None, &mut ranks)
            .await
            .unwrap();

        let amounts: Vec<(&str, u64)> = allocation
            .holders
            .iter()
            .map(|h| (h.wallet.as_str(), h.amount))
            .collect();
        assert_eq!(amounts, vec![("w2", 250_000 + 1_000_000), ("w1", 750_000)]);
    }

    #[tokio::test]
    async fn publish_never_replaces_dispatched_payouts() {
        let config = campaign(vec![PolicySetting::new("aa")]);
        let store = MemoryStore::new();
        let provider = FixedRanks::default();
        let mut ranks = MemoizedRanks::new(&provider);

        let mut payouts = publish(&store, &config, &two_holders(), None, &mut ranks)
            .await
            .unwrap()
            .holders;
        payouts[0].transaction_ref = Some(TransactionRef::from("tx"));
        store.put_payouts(&config.id, &payouts).unwrap();

        assert!(matches!(
            publish(&store, &config, &two_holders(), None, &mut ranks).await,
            Err(CampaignError::AlreadyDispatched(..))
        ));
    }

    #[test]
    fn blacklisted_units_never_enter_the_snapshot() {
        let mut config = fungible_campaign();
        config.blacklisted_units.insert(UnitId::from("gg"));

        let holders = vec![HolderHoldings::new("w1", "a1")
            .holding(Holding::balance("gg", "gg", Decimal::from_integer(5)))];

        assert!(fungible_snapshot(&config, &holders).is_empty());
    }
}
