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
Scoring turns what a wallet holds into a number of points, used as-is for live entries and votes.

Per matched policy setting:

- Fungible policies contribute the wallet's precomputed fungible points. Those points are
  collection-agnostic, so they are added at most once per scoring pass no matter how many
  fungible policies match (the "fungible latch"), and never when the entry was consumed already.

- Non-fungible policies contribute, for each unit neither blacklisted nor already used:

      human_amount × weight + rank bonus + trait bonus

  and, once per policy, a whale bonus based on the number of units counted.

Scoring never fails: a wallet holding nothing of interest simply scores zero. It never mutates
the used-unit set either; the units it consumed are returned so that callers commit them once
the score is actually used.
*/

use crate::{
    eligibility::{self, Ineligible},
    modifiers::{rank_bonus, trait_bonus, whale_bonus},
    ranks::RankTable,
    used_units::UsedUnitSet,
};
use sprinkle_kernel::{
    CampaignConfig, CollectionId, Decimal, FungibleSnapshotEntry, Holding, PolicySetting, PoolId,
    UnitId, WalletId,
};
use std::collections::{BTreeMap, BTreeSet};
use tracing::trace;

const EVENT_TARGET: &str = "sprinkle::engine::scoring";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Score {
    /// Total points.
    pub amount: Decimal,
    /// Units counted by this score, to be committed to the used-unit set.
    pub consumed_units: BTreeSet<UnitId>,
    /// Whether the wallet's fungible snapshot entry was counted, and must now be marked consumed.
    pub fungible_consumed: bool,
    /// Points per matched policy; fungible points are attributed to the first fungible policy.
    pub per_policy: BTreeMap<CollectionId, Decimal>,
}

/// Score a wallet, assuming it is eligible and `policies` are the settings it matched.
pub fn score_wallet(
    holdings: &[Holding],
    policies: &[&PolicySetting],
    fungible: Option<&FungibleSnapshotEntry>,
    used: &UsedUnitSet,
    blacklisted_units: &BTreeSet<UnitId>,
    ranks: &RankTable,
) -> Score {
    let mut score = Score::default();

    for policy in policies {
        let subtotal = if policy.has_fungible_component {
            match fungible {
                Some(entry) if !entry.consumed && !score.fungible_consumed => {
                    score.fungible_consumed = true;
                    entry.points.clone()
                }
                _ => Decimal::zero(),
            }
        } else {
            score_units(
                policy,
                holdings,
                used,
                blacklisted_units,
                ranks,
                &mut score.consumed_units,
            )
        };

        score.amount += &subtotal;
        *score
            .per_policy
            .entry(policy.collection_id.clone())
            .or_default() += subtotal;
    }

    score
}

/// Subtotal of a non-fungible policy. Newly counted units are added to `consumed`, which also
/// guards against the same unit being listed twice (e.g. reported under two addresses).
fn score_units(
    policy: &PolicySetting,
    holdings: &[Holding],
    used: &UsedUnitSet,
    blacklisted_units: &BTreeSet<UnitId>,
    ranks: &RankTable,
    consumed: &mut BTreeSet<UnitId>,
) -> Decimal {
    let mut subtotal = Decimal::zero();
    let mut count = 0u64;

    let eligible = holdings.iter().filter(|holding| {
        holding.collection_id == policy.collection_id
            && !holding.is_fungible
            && !blacklisted_units.contains(&holding.unit_id)
            && !used.contains(&holding.unit_id)
    });

    for holding in eligible {
        if !consumed.insert(holding.unit_id.clone()) {
            continue;
        }
        count += 1;

        let rank = holding
            .rank
            .or_else(|| ranks.rank(&policy.collection_id, &holding.unit_id));

        subtotal += &holding.human_amount * &policy.weight;
        subtotal += rank_bonus(policy, rank);
        subtotal += trait_bonus(policy, holding);
    }

    subtotal + whale_bonus(policy, count)
}

/// Eligibility followed by scoring: an ineligible wallet is never scored.
pub fn evaluate_wallet(
    wallet: &WalletId,
    holdings: &[Holding],
    delegation: Option<&PoolId>,
    config: &CampaignConfig,
    fungible: Option<&FungibleSnapshotEntry>,
    used: &UsedUnitSet,
    ranks: &RankTable,
) -> Result<Score, Ineligible> {
    let policies = eligibility::check(wallet, holdings, delegation, config).into_result()?;

    let score = score_wallet(
        holdings,
        &policies,
        fungible,
        used,
        &config.blacklisted_units,
        ranks,
    );

    trace!(
        target: EVENT_TARGET,
        wallet = %wallet,
        amount = %score.amount,
        consumed = score.consumed_units.len(),
        fungible = score.fungible_consumed,
        "evaluate_wallet.scored"
    );

    Ok(score)
}
