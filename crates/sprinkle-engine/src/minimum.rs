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

use crate::allocation::sort_payouts;
use sprinkle_kernel::{OnChainAmount, PayoutHolder, WalletId};
use std::str::FromStr;

/// Outcome of checking a payout list against a minimum transfer amount.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MinimumCheck {
    /// Every payout reaches the minimum; nothing to decide.
    Ready(Vec<PayoutHolder>),
    /// Some payouts fall short; the operator must choose a resolution.
    NeedsConfirmation(Adjustment),
}

/// How to resolve payouts below the minimum.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MinimumResolution {
    /// Raise every short payout to the minimum.
    Accept,
    /// Drop every short payout.
    Decline,
}

impl FromStr for MinimumResolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "accept" => Ok(Self::Accept),
            "decline" => Ok(Self::Decline),
            _ => Err(format!("unknown resolution '{s}', expected 'accept' or 'decline'")),
        }
    }
}

/// A pending decision over the payouts below the minimum.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Adjustment {
    holders: Vec<PayoutHolder>,
    minimum: OnChainAmount,
}

impl Adjustment {
    pub fn minimum(&self) -> OnChainAmount {
        self.minimum
    }

    /// Wallets whose payout falls short.
    pub fn affected(&self) -> Vec<&WalletId> {
        self.short().map(|h| &h.wallet).collect()
    }

    /// What accepting costs on top of the current payouts.
    pub fn extra_required(&self) -> u128 {
        self.short()
            .map(|h| u128::from(self.minimum - h.amount))
            .sum()
    }

    pub fn accept(self) -> Vec<PayoutHolder> {
        let minimum = self.minimum;
        let mut holders = self.holders;
        for holder in holders.iter_mut().filter(|h| h.amount < minimum) {
            holder.amount = minimum;
            holder.forced_minimum = true;
        }
        sort_payouts(&mut holders);
        holders
    }

    pub fn decline(self) -> Vec<PayoutHolder> {
        let minimum = self.minimum;
        self.holders
            .into_iter()
            .filter(|h| h.amount >= minimum)
            .collect()
    }

    pub fn resolve(self, resolution: MinimumResolution) -> Vec<PayoutHolder> {
        match resolution {
            MinimumResolution::Accept => self.accept(),
            MinimumResolution::Decline => self.decline(),
        }
    }

    fn short(&self) -> impl Iterator<Item = &PayoutHolder> {
        self.holders.iter().filter(|h| h.amount < self.minimum)
    }
}

pub fn check_minimum(holders: Vec<PayoutHolder>, minimum: OnChainAmount) -> MinimumCheck {
    if holders.iter().all(|h| h.amount >= minimum) {
        MinimumCheck::Ready(holders)
    } else {
        MinimumCheck::NeedsConfirmation(Adjustment { holders, minimum })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sprinkle_kernel::Address;

    fn payouts(amounts: &[(&str, u64)]) -> Vec<PayoutHolder> {
        amounts
            .iter()
            .map(|(wallet, amount)| {
                PayoutHolder::new(
                    WalletId::from(*wallet),
                    Address::from(format!("addr_{wallet}")),
                    *amount,
                )
            })
            .collect()
    }

    #[test]
    fn everything_above_minimum() {
        let holders = payouts(&[("w1", 5_000_000), ("w2", 1_000_000)]);
        assert_eq!(
            check_minimum(holders.clone(), 1_000_000),
            MinimumCheck::Ready(holders)
        );
    }

    #[test]
    fn accept_raises_short_payouts() {
        let holders = payouts(&[("w1", 5_000_000), ("w3", 400_000), ("w2", 100_000)]);
        let MinimumCheck::NeedsConfirmation(adjustment) = check_minimum(holders, 1_000_000) else {
            panic!("expected a pending adjustment");
        };

        assert_eq!(
            adjustment.affected(),
            vec![&WalletId::from("w3"), &WalletId::from("w2")]
        );
        assert_eq!(adjustment.extra_required(), 600_000 + 900_000);

        let accepted = adjustment.accept();
        let summary: Vec<(&str, u64, bool)> = accepted
            .iter()
            .map(|h| (h.wallet.as_str(), h.amount, h.forced_minimum))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("w1", 5_000_000, false),
                ("w2", 1_000_000, true),
                ("w3", 1_000_000, true)
            ]
        );
    }

    #[test]
    fn decline_drops_short_payouts() {
        let holders = payouts(&[("w1", 5_000_000), ("w2", 999_999)]);
        let MinimumCheck::NeedsConfirmation(adjustment) = check_minimum(holders, 1_000_000) else {
            panic!("expected a pending adjustment");
        };

        let declined = adjustment.resolve(MinimumResolution::Decline);
        assert_eq!(declined, payouts(&[("w1", 5_000_000)]));
    }
}
