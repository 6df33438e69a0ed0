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

use sprinkle_kernel::{CampaignConfig, Holding, PolicySetting, PoolId, WalletId};
use std::collections::BTreeSet;
use thiserror::Error;

/// Reasons for which a wallet takes no part in a campaign. These are expected outcomes, not
/// failures: callers report them back rather than propagating them.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Ineligible {
    #[error("wallet {0} is blacklisted")]
    Blacklisted(WalletId),
    #[error("wallet {wallet} is not delegated to a required pool (delegated to: {delegation:?})")]
    NotDelegated {
        wallet: WalletId,
        delegation: Option<PoolId>,
    },
    #[error("wallet {0} holds nothing from the configured collections")]
    NoConfiguredCollection(WalletId),
}

#[derive(Debug, PartialEq, Eq)]
pub enum Eligibility<'a> {
    /// The policy settings matching at least one of the wallet's holdings, in configuration order.
    Eligible(Vec<&'a PolicySetting>),
    Ineligible(Ineligible),
}

impl<'a> Eligibility<'a> {
    pub fn into_result(self) -> Result<Vec<&'a PolicySetting>, Ineligible> {
        match self {
            Eligibility::Eligible(policies) => Ok(policies),
            Eligibility::Ineligible(reason) => Err(reason),
        }
    }

    pub fn is_eligible(&self) -> bool {
        matches!(self, Eligibility::Eligible(..))
    }
}

/// Wallet-level checks only; they don't depend on what the wallet holds.
pub fn check_wallet(
    wallet: &WalletId,
    delegation: Option<&PoolId>,
    config: &CampaignConfig,
) -> Result<(), Ineligible> {
    if config.blacklisted_wallets.contains(wallet) {
        return Err(Ineligible::Blacklisted(wallet.clone()));
    }

    if config.requires_delegation()
        && !delegation.is_some_and(|pool| config.required_delegation_targets.contains(pool))
    {
        return Err(Ineligible::NotDelegated {
            wallet: wallet.clone(),
            delegation: delegation.cloned(),
        });
    }

    Ok(())
}

/// Decide whether a wallet takes part in a campaign, and through which policies. Checks are
/// performed in order: blacklist, delegation, then configured collections.
pub fn check<'a>(
    wallet: &WalletId,
    holdings: &[Holding],
    delegation: Option<&PoolId>,
    config: &'a CampaignConfig,
) -> Eligibility<'a> {
    if let Err(reason) = check_wallet(wallet, delegation, config) {
        return Eligibility::Ineligible(reason);
    }

    let held: BTreeSet<_> = holdings.iter().map(|h| &h.collection_id).collect();

    let policies: Vec<&PolicySetting> = config
        .policy_settings
        .iter()
        .filter(|policy| held.contains(&policy.collection_id))
        .collect();

    if policies.is_empty() {
        return Eligibility::Ineligible(Ineligible::NoConfiguredCollection(wallet.clone()));
    }

    Eligibility::Eligible(policies)
}
