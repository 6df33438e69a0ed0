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

use crate::{CollectionId, Decimal};
use serde::{Deserialize, Serialize};

/// How holdings of one collection count towards a wallet's share.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySetting {
    pub collection_id: CollectionId,

    #[serde(default = "Decimal::one")]
    pub weight: Decimal,

    /// Whether the collection is (or contains) a fungible token. Fungible balances are accounted
    /// for through the campaign's fungible snapshot rather than unit by unit.
    #[serde(default)]
    pub has_fungible_component: bool,

    #[serde(default)]
    pub trait_modifiers: Vec<TraitModifier>,

    #[serde(default)]
    pub rank_modifiers: Vec<RankModifier>,

    #[serde(default)]
    pub whale_modifiers: Vec<WhaleModifier>,
}

impl PolicySetting {
    pub fn new(collection_id: impl Into<CollectionId>) -> Self {
        Self {
            collection_id: collection_id.into(),
            weight: Decimal::one(),
            has_fungible_component: false,
            trait_modifiers: Vec::new(),
            rank_modifiers: Vec::new(),
            whale_modifiers: Vec::new(),
        }
    }

    pub fn with_weight(mut self, weight: Decimal) -> Self {
        self.weight = weight;
        self
    }

    pub fn fungible(mut self) -> Self {
        self.has_fungible_component = true;
        self
    }

    pub fn has_modifiers(&self) -> bool {
        !self.trait_modifiers.is_empty()
            || !self.rank_modifiers.is_empty()
            || !self.whale_modifiers.is_empty()
    }
}

/// A bonus granted to every unit carrying a given attribute value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraitModifier {
    pub category: String,
    #[serde(rename = "trait")]
    pub trait_value: String,
    pub amount: Decimal,
}

/// A bonus granted to every unit whose rarity rank falls within `[min_rank, max_rank]`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankModifier {
    pub min_rank: u64,
    pub max_rank: u64,
    pub amount: Decimal,
}

impl RankModifier {
    pub fn contains(&self, rank: u64) -> bool {
        self.min_rank <= rank && rank <= self.max_rank
    }
}

/// A bonus for holding at least `group_size` units of a collection. When stackable, the bonus is
/// granted once per full group held.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhaleModifier {
    pub group_size: u64,
    pub amount: Decimal,
    #[serde(default)]
    pub stackable: bool,
}
