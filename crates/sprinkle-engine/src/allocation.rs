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

/*
Allocation splits a fixed pool between every current holder of the configured collections.

The pool is shared proportionally to each holder's weighted holdings:

    divider        = Σ(human_amount × weight)            over every qualifying holding
    share_per_unit = total_pool_on_chain_amount / divider

    amount(holder) = ⌊ Σ(human_amount × weight) × share_per_unit + bonuses × 10^pool_decimals ⌋

Bonuses (trait, rank and whale) are expressed in human units of the pool asset and are flat
additions on top of the proportional share; they are *not* taken out of the pool. Hence, as soon
as a campaign configures bonuses, the sum of all payouts may exceed the pool. Without bonuses, the
sum never exceeds the pool and falls short of it by strictly less than one on-chain unit per
holder.

A holder may show up under several addresses. Records are merged per wallet, and the first
address seen is the one receiving the payout. Script addresses never receive anything, and neither
do ineligible wallets. Blacklisted units are ignored entirely: they don't count towards the
divider either.

Ranks come from the holding itself when the provider reports one, and from the rank table
otherwise; exactly like live scoring.
*/

use crate::{
    eligibility::{self, Ineligible},
    modifiers::{rank_bonus, trait_bonus, whale_bonus},
    ranks::RankTable,
};
use sprinkle_kernel::{
    Address, CampaignConfig, CollectionId, Decimal, HolderHoldings, Holding, PayoutHolder,
    PolicySetting, PoolId, UnitId, WalletId,
};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, instrument};

const EVENT_TARGET: &str = "sprinkle::engine::allocation";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Allocation {
    /// Sum of every qualifying holding, weighted.
    pub divider: Decimal,
    /// On-chain amount granted per weighted unit held. Zero when nothing qualifies.
    pub share_per_unit: Decimal,
    /// Recipients with a non-zero payout, largest first.
    pub holders: Vec<PayoutHolder>,
    /// Wallets left out, and why.
    pub excluded: Vec<Ineligible>,
}

impl Allocation {
    pub fn total(&self) -> u128 {
        self.holders.iter().map(|h| u128::from(h.amount)).sum()
    }
}

/// A wallet with all its (non-script) records merged.
#[derive(Debug)]
pub(crate) struct Recipient<'a> {
    pub(crate) wallet: &'a WalletId,
    pub(crate) address: &'a Address,
    pub(crate) delegation: Option<&'a PoolId>,
    pub(crate) holdings: Vec<Holding>,
}

/// What a recipient brings in, before knowing the share per unit.
#[derive(Debug, Default)]
struct Contribution {
    weighted: Decimal,
    bonuses: Decimal,
}

#[instrument(level = "debug", skip_all, fields(campaign = %config.id, records = holders.len()))]
pub fn allocate(
    config: &CampaignConfig,
    holders: &[HolderHoldings],
    ranks: &RankTable,
) -> Allocation {
    let mut excluded = Vec::new();
    let mut contributions = Vec::new();

    for recipient in merge(holders) {
        let policies = match eligibility::check(
            recipient.wallet,
            &recipient.holdings,
            recipient.delegation,
            config,
        )
        .into_result()
        {
            Ok(policies) => policies,
            Err(reason) => {
                excluded.push(reason);
                continue;
            }
        };

        let contribution = contribute(
            &policies,
            &recipient.holdings,
            &config.blacklisted_units,
            ranks,
        );
        contributions.push((recipient, contribution));
    }

    let divider: Decimal = contributions.iter().map(|(_, c)| &c.weighted).sum();
    let share_per_unit = Decimal::from_integer(config.total_pool_on_chain_amount)
        .checked_div(&divider)
        .unwrap_or_default();

    let mut payouts: Vec<PayoutHolder> = contributions
        .into_iter()
        .filter_map(|(recipient, contribution)| {
            let amount = (&contribution.weighted * &share_per_unit
                + contribution.bonuses.scale_up(config.pool_decimals))
            .floor();
            (amount > 0).then(|| {
                PayoutHolder::new(recipient.wallet.clone(), recipient.address.clone(), amount)
            })
        })
        .collect();

    sort_payouts(&mut payouts);

    let allocation = Allocation {
        divider,
        share_per_unit,
        holders: payouts,
        excluded,
    };

    debug!(
        target: EVENT_TARGET,
        divider = %allocation.divider,
        share_per_unit = %allocation.share_per_unit,
        recipients = allocation.holders.len(),
        excluded = allocation.excluded.len(),
        total = allocation.total(),
        pool = config.total_pool_on_chain_amount,
        "allocate.done"
    );

    allocation
}

/// Largest payouts first; ties broken by wallet so that the order is fully deterministic.
pub fn sort_payouts(payouts: &mut [PayoutHolder]) {
    payouts.sort_by(|a, b| b.amount.cmp(&a.amount).then_with(|| a.wallet.cmp(&b.wallet)));
}

/// Merge records per wallet, preserving the order in which wallets first appear. Script records
/// are dropped beforehand, so a wallet only known through scripts disappears altogether.
pub(crate) fn merge(holders: &[HolderHoldings]) -> Vec<Recipient<'_>> {
    let mut recipients: Vec<Recipient<'_>> = Vec::new();
    let mut index: BTreeMap<&WalletId, usize> = BTreeMap::new();

    for record in holders.iter().filter(|record| !record.is_script) {
        match index.get(&record.wallet) {
            Some(&i) => {
                let recipient = &mut recipients[i];
                recipient.holdings.extend(record.holdings.iter().cloned());
                if recipient.delegation.is_none() {
                    recipient.delegation = record.delegation.as_ref();
                }
            }
            None => {
                index.insert(&record.wallet, recipients.len());
                recipients.push(Recipient {
                    wallet: &record.wallet,
                    address: &record.address,
                    delegation: record.delegation.as_ref(),
                    holdings: record.holdings.clone(),
                });
            }
        }
    }

    recipients
}

fn contribute(
    policies: &[&PolicySetting],
    holdings: &[Holding],
    blacklisted_units: &BTreeSet<UnitId>,
    ranks: &RankTable,
) -> Contribution {
    let mut contribution = Contribution::default();
    let mut seen: BTreeSet<&UnitId> = BTreeSet::new();
    let mut counts: BTreeMap<&CollectionId, u64> = BTreeMap::new();

    for policy in policies {
        let matching = holdings.iter().filter(|holding| {
            holding.collection_id == policy.collection_id
                && !blacklisted_units.contains(&holding.unit_id)
        });

        for holding in matching {
            // Balances of a same token held on several addresses add up; units don't.
            if !holding.is_fungible && !seen.insert(&holding.unit_id) {
                continue;
            }

            contribution.weighted += &holding.human_amount * &policy.weight;

            if !holding.is_fungible {
                *counts.entry(&policy.collection_id).or_default() += 1;
                let rank = holding
                    .rank
                    .or_else(|| ranks.rank(&policy.collection_id, &holding.unit_id));
                contribution.bonuses += rank_bonus(policy, rank);
                contribution.bonuses += trait_bonus(policy, holding);
            }
        }

        let count = counts.get(&policy.collection_id).copied().unwrap_or_default();
        contribution.bonuses += whale_bonus(policy, count);
    }

    contribution
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::campaign;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use crate::ranks::RankedUnit;
    use sprinkle_kernel::{RankModifier, TraitModifier, WhaleModifier};

    fn holder(wallet: &str, units: &[&str]) -> HolderHoldings {
        units.iter().fold(
            HolderHoldings::new(wallet, format!("addr_{wallet}")),
            |record, unit| record.holding(Holding::unit(*unit, &unit[..2])),
        )
    }

    fn amounts(allocation: &Allocation) -> Vec<(&str, u64)> {
        allocation
            .holders
            .iter()
            .map(|h| (h.wallet.as_str(), h.amount))
            .collect()
    }

    #[test]
    fn two_equal_holders_share_the_pool() {
        let config = campaign(vec![
            PolicySetting::new("aa").with_weight(Decimal::from_integer(2))
        ]);
        let holders = vec![holder("w1", &["aa01"]), holder("w2", &["aa02"])];

        let allocation = allocate(&config, &holders, &RankTable::new());

        assert_eq!(allocation.divider, Decimal::from_integer(4));
        assert_eq!(allocation.share_per_unit, Decimal::from_integer(250_000));
        assert_eq!(amounts(&allocation), vec![("w1", 500_000), ("w2", 500_000)]);
        assert!(allocation.holders.iter().all(|h| !h.is_resolved()));
    }

    #[test]
    fn nothing_qualifies() {
        let config = campaign(vec![PolicySetting::new("aa")]);
        let holders = vec![holder("w1", &["bb01"])];

        let allocation = allocate(&config, &holders, &RankTable::new());

        assert_eq!(allocation.divider, Decimal::zero());
        assert_eq!(allocation.share_per_unit, Decimal::zero());
        assert!(allocation.holders.is_empty());
        assert_eq!(
            allocation.excluded,
            vec![Ineligible::NoConfiguredCollection(WalletId::from("w1"))]
        );
    }

    #[test]
    fn records_of_a_wallet_are_merged_first_address_receives() {
        let config = campaign(vec![PolicySetting::new("aa")]);
        let holders = vec![
            holder("w1", &["aa01"]),
            holder("w2", &["aa02", "aa03"]),
            HolderHoldings::new("w1", "addr_w1_second").holding(Holding::unit("aa04", "aa")),
        ];

        let allocation = allocate(&config, &holders, &RankTable::new());

        assert_eq!(allocation.divider, Decimal::from_integer(4));
        assert_eq!(amounts(&allocation), vec![("w1", 500_000), ("w2", 500_000)]);
        assert_eq!(allocation.holders[0].address, Address::from("addr_w1"));
    }

    #[test]
    fn scripts_blacklists_and_delegation_are_excluded() {
        let mut config = campaign(vec![PolicySetting::new("aa")]);
        config.blacklisted_wallets.insert(WalletId::from("w2"));
        config.blacklisted_units.insert(UnitId::from("aa05"));
        config.required_delegation_targets.insert(PoolId::from("pool1"));

        let mut script = holder("w3", &["aa03"]).delegated_to("pool1");
        script.is_script = true;

        let holders = vec![
            holder("w1", &["aa01", "aa05"]).delegated_to("pool1"),
            holder("w2", &["aa02"]).delegated_to("pool1"),
            script,
            holder("w4", &["aa04"]).delegated_to("pool2"),
        ];

        let allocation = allocate(&config, &holders, &RankTable::new());

        assert_eq!(allocation.divider, Decimal::one());
        assert_eq!(amounts(&allocation), vec![("w1", 1_000_000)]);
        assert_eq!(allocation.excluded.len(), 2);
    }

    #[test]
    fn bonuses_are_added_on_top_of_the_pool() {
        let mut policy = PolicySetting::new("aa");
        policy.trait_modifiers = vec![TraitModifier {
            category: "Hat".to_string(),
            trait_value: "Crown".to_string(),
            amount: Decimal::from_ratio(1, 2).unwrap(),
        }];
        policy.whale_modifiers = vec![WhaleModifier {
            group_size: 2,
            amount: Decimal::from_integer(1),
            stackable: false,
        }];
        let config = campaign(vec![policy]);

        let holders = vec![
            HolderHoldings::new("w1", "addr_w1")
                .holding(Holding::unit("aa01", "aa").with_attribute("Hat", "crown"))
                .holding(Holding::unit("aa02", "aa")),
            holder("w2", &["aa03", "aa04"]),
        ];

        let allocation = allocate(&config, &holders, &RankTable::new());

        assert_eq!(
            amounts(&allocation),
            vec![("w1", 500_000 + 500_000 + 1_000_000), ("w2", 500_000 + 1_000_000)]
        );
        assert!(allocation.total() > u128::from(config.total_pool_on_chain_amount));
    }

    #[test]
    fn rank_bonuses_fall_back_to_the_rank_table() {
        let mut policy = PolicySetting::new("aa");
        policy.rank_modifiers = vec![RankModifier {
            min_rank: 1,
            max_rank: 1,
            amount: Decimal::from_integer(1),
        }];
        let config = campaign(vec![policy]);

        let mut ranks = RankTable::new();
        ranks.insert(
            CollectionId::from("aa"),
            vec![RankedUnit {
                unit_id: UnitId::from("aa01"),
                amount: Decimal::one(),
                rank: Some(1),
            }],
        );

        let holders = vec![holder("w1", &["aa01"]), holder("w2", &["aa02"])];

        let allocation = allocate(&config, &holders, &ranks);

        assert_eq!(
            amounts(&allocation),
            vec![("w1", 500_000 + 1_000_000), ("w2", 500_000)]
        );
    }

    #[test]
    fn rank_reported_with_the_holding_wins() {
        let mut policy = PolicySetting::new("aa");
        policy.rank_modifiers = vec![RankModifier {
            min_rank: 1,
            max_rank: 10,
            amount: Decimal::from_integer(1),
        }];
        let config = campaign(vec![policy]);

        let mut ranks = RankTable::new();
        ranks.insert(
            CollectionId::from("aa"),
            vec![RankedUnit {
                unit_id: UnitId::from("aa01"),
                amount: Decimal::one(),
                rank: Some(5),
            }],
        );

        let holders = vec![HolderHoldings::new("w1", "addr_w1")
            .holding(Holding::unit("aa01", "aa").with_rank(42))];

        let allocation = allocate(&config, &holders, &ranks);

        assert_eq!(amounts(&allocation), vec![("w1", 1_000_000)]);
    }

    #[test]
    fn fungible_balances_count_without_bonuses() {
        let mut fungible = PolicySetting::new("ff").fungible();
        fungible.whale_modifiers = vec![WhaleModifier {
            group_size: 1,
            amount: Decimal::from_integer(100),
            stackable: true,
        }];
        let config = campaign(vec![PolicySetting::new("aa"), fungible]);

        let holders = vec![
            holder("w1", &["aa01"]),
            HolderHoldings::new("w2", "addr_w2").holding(Holding::balance(
                "ff",
                "ff",
                Decimal::from_integer(3),
            )),
        ];

        let allocation = allocate(&config, &holders, &RankTable::new());

        assert_eq!(amounts(&allocation), vec![("w2", 750_000), ("w1", 250_000)]);
    }

    #[test]
    fn fungible_balances_add_up_across_addresses() {
        let config = campaign(vec![PolicySetting::new("aa"), PolicySetting::new("ff").fungible()]);

        let holders = vec![
            holder("w1", &["aa01", "aa02"]),
            HolderHoldings::new("w2", "addr_w2a").holding(Holding::balance(
                "ff",
                "ff",
                Decimal::from_integer(1),
            )),
            HolderHoldings::new("w2", "addr_w2b").holding(Holding::balance(
                "ff",
                "ff",
                Decimal::from_integer(1),
            )),
        ];

        let allocation = allocate(&config, &holders, &RankTable::new());

        assert_eq!(amounts(&allocation), vec![("w1", 500_000), ("w2", 500_000)]);
        assert_eq!(allocation.holders[1].address.as_str(), "addr_w2a");
    }

    #[test]
    fn ties_are_ordered_by_wallet() {
        let config = campaign(vec![PolicySetting::new("aa")]);
        let holders = vec![
            holder("w3", &["aa01"]),
            holder("w1", &["aa02"]),
            holder("w2", &["aa03", "aa04"]),
        ];

        let allocation = allocate(&config, &holders, &RankTable::new());

        assert_eq!(
            amounts(&allocation),
            vec![("w2", 500_000), ("w1", 250_000), ("w3", 250_000)]
        );
    }

    proptest! {
        #[test]
        fn prop_conservation_without_bonuses(
            pool in 0..10_000_000_000u64,
            held in prop::collection::vec((1..5u8, 0..10usize), 1..20),
        ) {
            let mut config = campaign(vec![
                PolicySetting::new("aa"),
                PolicySetting::new("bb").with_weight(Decimal::from_ratio(3, 2).unwrap()),
            ]);
            config.total_pool_on_chain_amount = pool;

            let holders: Vec<HolderHoldings> = held
                .iter()
                .enumerate()
                .map(|(i, (aa, bb))| {
                    let mut record = HolderHoldings::new(format!("w{i:02}"), format!("addr{i}"));
                    for j in 0..*aa {
                        record = record.holding(Holding::unit(format!("aa{i:02}{j}"), "aa"));
                    }
                    for j in 0..*bb {
                        record = record.holding(Holding::unit(format!("bb{i:02}{j}"), "bb"));
                    }
                    record
                })
                .collect();

            let allocation = allocate(&config, &holders, &RankTable::new());
            let total = allocation.total();

            prop_assert!(total <= u128::from(pool));
            prop_assert!(u128::from(pool) - total < holders.len() as u128);

            for pair in allocation.holders.windows(2) {
                prop_assert!(pair[0].amount >= pair[1].amount);
            }
        }
    }
}
