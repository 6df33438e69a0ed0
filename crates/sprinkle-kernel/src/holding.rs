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

use crate::{Address, CollectionId, Decimal, PoolId, UnitId, WalletId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A quantity of one asset held by a wallet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holding {
    pub unit_id: UnitId,
    pub collection_id: CollectionId,
    #[serde(default)]
    pub is_fungible: bool,
    /// Quantity already adjusted for the asset's decimals.
    pub human_amount: Decimal,
    #[serde(default)]
    pub rank: Option<u64>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl Holding {
    /// A single non-fungible unit.
    pub fn unit(unit_id: impl Into<UnitId>, collection_id: impl Into<CollectionId>) -> Self {
        Self {
            unit_id: unit_id.into(),
            collection_id: collection_id.into(),
            is_fungible: false,
            human_amount: Decimal::one(),
            rank: None,
            attributes: BTreeMap::new(),
        }
    }

    /// A fungible balance.
    pub fn balance(
        unit_id: impl Into<UnitId>,
        collection_id: impl Into<CollectionId>,
        human_amount: Decimal,
    ) -> Self {
        Self {
            unit_id: unit_id.into(),
            collection_id: collection_id.into(),
            is_fungible: true,
            human_amount,
            rank: None,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_rank(mut self, rank: u64) -> Self {
        self.rank = Some(rank);
        self
    }

    pub fn with_attribute(mut self, category: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(category.into(), value.into());
        self
    }

    /// Look up an attribute by category; retried lower-cased when the exact category is absent.
    pub fn attribute(&self, category: &str) -> Option<&str> {
        self.attributes
            .get(category)
            .or_else(|| self.attributes.get(&category.to_lowercase()))
            .map(String::as_str)
    }
}

/// Everything a holdings provider knows about one receiving address of a holder.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HolderHoldings {
    pub wallet: WalletId,
    pub address: Address,
    /// Addresses locked by a script (e.g. marketplace or staking contracts) never receive payouts.
    #[serde(default)]
    pub is_script: bool,
    #[serde(default)]
    pub delegation: Option<PoolId>,
    pub holdings: Vec<Holding>,
}

impl HolderHoldings {
    pub fn new(wallet: impl Into<WalletId>, address: impl Into<Address>) -> Self {
        Self {
            wallet: wallet.into(),
            address: address.into(),
            is_script: false,
            delegation: None,
            holdings: Vec::new(),
        }
    }

    pub fn delegated_to(mut self, pool: impl Into<PoolId>) -> Self {
        self.delegation = Some(pool.into());
        self
    }

    pub fn holding(mut self, holding: Holding) -> Self {
        self.holdings.push(holding);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_lookup_falls_back_to_lowercase() {
        let holding = Holding::unit("aa01", "aa").with_attribute("background", "Gold");
        assert_eq!(holding.attribute("Background"), Some("Gold"));
        assert_eq!(holding.attribute("background"), Some("Gold"));
        assert_eq!(holding.attribute("Eyes"), None);
    }
}
