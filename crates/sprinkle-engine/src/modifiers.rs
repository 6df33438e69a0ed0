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

//! Bonus rules attached to a policy setting. They apply to non-fungible holdings only, and are
//! shared between live scoring and allocation so that both always agree on what a unit is worth.

use sprinkle_kernel::{Decimal, Holding, PolicySetting, WhaleModifier};

/// Sum of every rank modifier whose range contains `rank`. Overlapping ranges all apply.
pub fn rank_bonus(policy: &PolicySetting, rank: Option<u64>) -> Decimal {
    let Some(rank) = rank else {
        return Decimal::zero();
    };

    policy
        .rank_modifiers
        .iter()
        .filter(|modifier| modifier.contains(rank))
        .map(|modifier| &modifier.amount)
        .sum()
}

/// Sum of every trait modifier matched by the holding's attributes. Values are compared
/// case-insensitively.
pub fn trait_bonus(policy: &PolicySetting, holding: &Holding) -> Decimal {
    policy
        .trait_modifiers
        .iter()
        .filter(|modifier| {
            holding
                .attribute(&modifier.category)
                .is_some_and(|value| value.eq_ignore_ascii_case(&modifier.trait_value))
        })
        .map(|modifier| &modifier.amount)
        .sum()
}

/// The single whale tier that applies for `count` units: the one with the largest group size not
/// exceeding `count`.
pub fn whale_tier(policy: &PolicySetting, count: u64) -> Option<&WhaleModifier> {
    let mut tiers: Vec<&WhaleModifier> = policy.whale_modifiers.iter().collect();
    tiers.sort_by(|a, b| b.group_size.cmp(&a.group_size));
    tiers
        .into_iter()
        .find(|tier| tier.group_size > 0 && tier.group_size <= count)
}

/// Whale bonus for `count` units. Stackable tiers pay once per full group.
pub fn whale_bonus(policy: &PolicySetting, count: u64) -> Decimal {
    match whale_tier(policy, count) {
        None => Decimal::zero(),
        Some(tier) if tier.stackable => &tier.amount * (count / tier.group_size),
        Some(tier) => tier.amount.clone(),
    }
}
