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

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sprinkle_engine::{
    providers::{HoldingsProvider, ProviderError, WalletPage},
    ranks::{RankProvider, RankedUnit},
};
use sprinkle_kernel::{CollectionId, Decimal, HolderHoldings, Holding, UnitId, WalletId};
use std::{collections::BTreeMap, path::Path};
use tracing::debug;

/// A holders export, as produced by an indexer ahead of a distribution.
///
/// ```json
/// {
///   "holders": [
///     { "wallet": "stake1...", "address": "addr1...", "delegation": "pool1...",
///       "holdings": [{ "unit_id": "<policy><name>", "collection_id": "<policy>",
///                      "human_amount": 1, "rank": 12 }] }
///   ],
///   "ranks": { "<policy>": [{ "unit_id": "<policy><name>", "rank": 12 }] }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoldingsExport {
    pub holders: Vec<HolderHoldings>,
    /// Rarity ranks per collection. Collections missing here are ranked from the ranks carried
    /// by the holdings themselves.
    #[serde(default)]
    pub ranks: BTreeMap<CollectionId, Vec<RankEntry>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankEntry {
    pub unit_id: UnitId,
    #[serde(default = "Decimal::one")]
    pub amount: Decimal,
    #[serde(default)]
    pub rank: Option<u64>,
}

impl From<RankEntry> for RankedUnit {
    fn from(entry: RankEntry) -> Self {
        RankedUnit {
            unit_id: entry.unit_id,
            amount: entry.amount,
            rank: entry.rank,
        }
    }
}

/// Serves holdings and ranks out of a [`HoldingsExport`], `page_size` records per page.
///
/// Wallets and collections absent from the export simply hold, or list, nothing.
#[derive(Clone, Debug)]
pub struct JsonHoldings {
    export: HoldingsExport,
    page_size: usize,
}

impl JsonHoldings {
    pub fn new(export: HoldingsExport, page_size: usize) -> Self {
        Self {
            export,
            page_size: page_size.max(1),
        }
    }

    pub async fn load(path: &Path, page_size: usize) -> Result<Self, ProviderError> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("unable to read holders export {}", path.display()))?;
        let export: HoldingsExport = serde_json::from_slice(&bytes)
            .with_context(|| format!("malformed holders export {}", path.display()))?;

        debug!(
            path = %path.display(),
            holders = export.holders.len(),
            ranked_collections = export.ranks.len(),
            "holders export loaded"
        );

        Ok(Self::new(export, page_size))
    }

    pub fn holders(&self) -> &[HolderHoldings] {
        &self.export.holders
    }

    fn page<T: Clone>(&self, items: &[T], page: u32) -> Vec<T> {
        let Some(index) = (page as usize).checked_sub(1) else {
            return Vec::new();
        };
        items
            .chunks(self.page_size)
            .nth(index)
            .map(|chunk| chunk.to_vec())
            .unwrap_or_default()
    }
}

#[async_trait]
impl HoldingsProvider for JsonHoldings {
    async fn wallet_holdings(
        &self,
        wallet: &WalletId,
        page: u32,
    ) -> Result<WalletPage, ProviderError> {
        let records: Vec<&HolderHoldings> = self
            .export
            .holders
            .iter()
            .filter(|holder| &holder.wallet == wallet)
            .collect();

        let holdings: Vec<Holding> = records
            .iter()
            .flat_map(|holder| holder.holdings.iter().cloned())
            .collect();

        Ok(WalletPage {
            holdings: self.page(&holdings, page),
            delegation: records.iter().find_map(|holder| holder.delegation.clone()),
        })
    }

    async fn collection_holders(
        &self,
        collection: &CollectionId,
        page: u32,
    ) -> Result<Vec<HolderHoldings>, ProviderError> {
        let holders: Vec<HolderHoldings> = self
            .export
            .holders
            .iter()
            .filter(|holder| {
                holder
                    .holdings
                    .iter()
                    .any(|holding| &holding.collection_id == collection)
            })
            .cloned()
            .collect();

        Ok(self.page(&holders, page))
    }
}

#[async_trait]
impl RankProvider for JsonHoldings {
    async fn collection_ranks(
        &self,
        collection: &CollectionId,
    ) -> Result<Vec<RankedUnit>, ProviderError> {
        if let Some(entries) = self.export.ranks.get(collection) {
            return Ok(entries.iter().cloned().map(RankedUnit::from).collect());
        }

        let mut units: BTreeMap<&UnitId, RankedUnit> = BTreeMap::new();
        for holding in self
            .export
            .holders
            .iter()
            .flat_map(|holder| holder.holdings.iter())
            .filter(|holding| &holding.collection_id == collection)
        {
            units
                .entry(&holding.unit_id)
                .and_modify(|unit| unit.amount += &holding.human_amount)
                .or_insert_with(|| RankedUnit {
                    unit_id: holding.unit_id.clone(),
                    amount: holding.human_amount.clone(),
                    rank: holding.rank,
                });
        }

        Ok(units.into_values().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sprinkle_engine::providers::{collection_holders, wallet_holdings};
    use sprinkle_kernel::PoolId;
    use std::io::Write;

    fn export() -> HoldingsExport {
        HoldingsExport {
            holders: vec![
                HolderHoldings::new("w1", "addr1a")
                    .delegated_to("pool1")
                    .holding(Holding::unit("aa01", "aa").with_rank(3))
                    .holding(Holding::unit("aa02", "aa")),
                HolderHoldings::new("w1", "addr1b").holding(Holding::unit("bb01", "bb")),
                HolderHoldings::new("w2", "addr2").holding(Holding::unit("aa03", "aa")),
            ],
            ranks: BTreeMap::from([(
                CollectionId::from("bb"),
                vec![RankEntry {
                    unit_id: UnitId::from("bb01"),
                    amount: Decimal::one(),
                    rank: Some(7),
                }],
            )]),
        }
    }

    #[tokio::test]
    async fn wallet_holdings_span_addresses() {
        let provider = JsonHoldings::new(export(), 2);

        let page = wallet_holdings(&provider, &WalletId::from("w1"))
            .await
            .unwrap();

        assert_eq!(page.holdings.len(), 3);
        assert_eq!(page.delegation, Some(PoolId::from("pool1")));
    }

    #[tokio::test]
    async fn unknown_wallet_holds_nothing() {
        let provider = JsonHoldings::new(export(), 2);
        let page = provider
            .wallet_holdings(&WalletId::from("w9"), 1)
            .await
            .unwrap();
        assert_eq!(page, WalletPage::default());
    }

    #[tokio::test]
    async fn page_zero_is_empty() {
        let provider = JsonHoldings::new(export(), 2);
        let page = provider
            .collection_holders(&CollectionId::from("aa"), 0)
            .await
            .unwrap();
        assert!(page.is_empty());
    }

    #[tokio::test]
    async fn collection_holders_across_pages() {
        let provider = JsonHoldings::new(export(), 1);
        let holders = collection_holders(&provider, [&CollectionId::from("aa")])
            .await
            .unwrap();
        let wallets: Vec<&str> = holders.iter().map(|h| h.wallet.as_str()).collect();
        assert_eq!(wallets, vec!["w1", "w2"]);
    }

    #[tokio::test]
    async fn explicit_ranks_take_precedence() {
        let provider = JsonHoldings::new(export(), 10);

        let bb = provider
            .collection_ranks(&CollectionId::from("bb"))
            .await
            .unwrap();
        assert_eq!(bb[0].rank, Some(7));

        let aa = provider
            .collection_ranks(&CollectionId::from("aa"))
            .await
            .unwrap();
        let ranks: Vec<(&str, Option<u64>)> =
            aa.iter().map(|u| (u.unit_id.as_str(), u.rank)).collect();
        assert_eq!(
            ranks,
            vec![("aa01", Some(3)), ("aa02", None), ("aa03", None)]
        );

        let nobody = provider
            .collection_ranks(&CollectionId::from("cc"))
            .await
            .unwrap();
        assert!(nobody.is_empty());
    }

    #[tokio::test]
    async fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&serde_json::to_vec(&export()).unwrap())
            .unwrap();

        let provider = JsonHoldings::load(file.path(), 10).await.unwrap();
        assert_eq!(provider.holders().len(), 3);

        let mut garbage = tempfile::NamedTempFile::new().unwrap();
        garbage.write_all(b"{ not json").unwrap();
        assert!(matches!(
            JsonHoldings::load(garbage.path(), 10).await,
            Err(ProviderError::Other(..))
        ));
    }
}
