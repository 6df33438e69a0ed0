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

use crate::providers::ProviderError;
use async_trait::async_trait;
use sprinkle_kernel::{CollectionId, Decimal, UnitId};
use std::collections::BTreeMap;
use tracing::debug;

const EVENT_TARGET: &str = "sprinkle::engine::ranks";

/// A unit as listed by a rank source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RankedUnit {
    pub unit_id: UnitId,
    pub amount: Decimal,
    pub rank: Option<u64>,
}

/// Source of externally-computed rarity ranks.
#[async_trait]
pub trait RankProvider: Send + Sync {
    /// Every unit of a collection, with its rank when known.
    async fn collection_ranks(
        &self,
        collection: &CollectionId,
    ) -> Result<Vec<RankedUnit>, ProviderError>;
}

/// Ranks of the units of every collection fetched so far.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RankTable {
    ranks: BTreeMap<CollectionId, BTreeMap<UnitId, u64>>,
}

impl RankTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, collection: CollectionId, units: Vec<RankedUnit>) {
        let ranks = units
            .into_iter()
            .filter_map(|unit| unit.rank.map(|rank| (unit.unit_id, rank)))
            .collect();
        self.ranks.insert(collection, ranks);
    }

    pub fn contains_collection(&self, collection: &CollectionId) -> bool {
        self.ranks.contains_key(collection)
    }

    pub fn rank(&self, collection: &CollectionId, unit: &UnitId) -> Option<u64> {
        self.ranks.get(collection)?.get(unit).copied()
    }
}

/// Fetches each collection's ranks at most once for the lifetime of the value. One `MemoizedRanks`
/// is meant to live exactly as long as one pass.
pub struct MemoizedRanks<'a> {
    provider: &'a dyn RankProvider,
    table: RankTable,
}

impl<'a> MemoizedRanks<'a> {
    pub fn new(provider: &'a dyn RankProvider) -> Self {
        Self {
            provider,
            table: RankTable::new(),
        }
    }

    /// Make sure the ranks of the given collections are available, fetching only those not yet
    /// known.
    pub async fn prefetch<'c>(
        &mut self,
        collections: impl IntoIterator<Item = &'c CollectionId>,
    ) -> Result<&RankTable, ProviderError> {
        for collection in collections {
            if self.table.contains_collection(collection) {
                continue;
            }
            let units = self.provider.collection_ranks(collection).await?;
            debug!(
                target: EVENT_TARGET,
                collection = %collection,
                units = units.len(),
                "prefetch.fetched"
            );
            self.table.insert(collection.clone(), units);
        }
        Ok(&self.table)
    }

    pub fn table(&self) -> &RankTable {
        &self.table
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// A rank provider serving fixed ranks and counting how often each collection is requested.
    #[derive(Default)]
    pub(crate) struct FixedRanks {
        pub(crate) units: BTreeMap<CollectionId, Vec<RankedUnit>>,
        pub(crate) calls: Mutex<BTreeMap<CollectionId, usize>>,
    }

    impl FixedRanks {
        pub(crate) fn with(mut self, collection: &str, ranks: &[(&str, u64)]) -> Self {
            self.units.insert(
                CollectionId::from(collection),
                ranks
                    .iter()
                    .map(|(unit, rank)| RankedUnit {
                        unit_id: UnitId::from(*unit),
                        amount: Decimal::one(),
                        rank: Some(*rank),
                    })
                    .collect(),
            );
            self
        }

        pub(crate) fn calls(&self, collection: &str) -> usize {
            self.calls
                .lock()
                .unwrap()
                .get(&CollectionId::from(collection))
                .copied()
                .unwrap_or_default()
        }
    }

    #[async_trait]
    impl RankProvider for FixedRanks {
        async fn collection_ranks(
            &self,
            collection: &CollectionId,
        ) -> Result<Vec<RankedUnit>, ProviderError> {
            *self
                .calls
                .lock()
                .unwrap()
                .entry(collection.clone())
                .or_default() += 1;
            Ok(self.units.get(collection).cloned().unwrap_or_default())
        }
    }

    #[tokio::test]
    async fn fetch_each_collection_once() {
        let provider = FixedRanks::default()
            .with("aa", &[("aa01", 1), ("aa02", 2)])
            .with("bb", &[("bb01", 3)]);
        let mut ranks = MemoizedRanks::new(&provider);

        let aa = CollectionId::from("aa");
        let bb = CollectionId::from("bb");

        ranks.prefetch([&aa]).await.unwrap();
        ranks.prefetch([&aa, &bb]).await.unwrap();
        let table = ranks.prefetch([&bb, &aa]).await.unwrap();

        assert_eq!(table.rank(&aa, &UnitId::from("aa02")), Some(2));
        assert_eq!(table.rank(&bb, &UnitId::from("bb01")), Some(3));
        assert_eq!(table.rank(&bb, &UnitId::from("aa01")), None);
        assert_eq!(provider.calls("aa"), 1);
        assert_eq!(provider.calls("bb"), 1);
    }
}
