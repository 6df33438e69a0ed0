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

use async_trait::async_trait;
use sprinkle_kernel::{Address, CollectionId, HolderHoldings, Holding, PoolId, UnitId, WalletId};
use std::{
    collections::{BTreeMap, BTreeSet},
    future::Future,
};
use thiserror::Error;
use tracing::trace;

const EVENT_TARGET: &str = "sprinkle::engine::providers";

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("unknown wallet {0}")]
    UnknownWallet(WalletId),
    #[error("unknown collection {0}")]
    UnknownCollection(CollectionId),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// A page of a wallet's holdings. Pages are numbered from 1.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WalletPage {
    pub holdings: Vec<Holding>,
    pub delegation: Option<PoolId>,
}

/// Read-only access to the chain's current holdings.
///
/// Results are paginated: callers request pages starting at 1 until they receive an empty one.
#[async_trait]
pub trait HoldingsProvider: Send + Sync {
    async fn wallet_holdings(&self, wallet: &WalletId, page: u32)
        -> Result<WalletPage, ProviderError>;

    /// Current holders of a collection, one record per receiving address.
    async fn collection_holders(
        &self,
        collection: &CollectionId,
        page: u32,
    ) -> Result<Vec<HolderHoldings>, ProviderError>;
}

/// Drain a paginated source, page after page, until an empty page comes back.
pub async fn collect_pages<T, F, Fut>(mut fetch: F) -> Result<Vec<T>, ProviderError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Vec<T>, ProviderError>>,
{
    let mut all = Vec::new();
    let mut page = 1;
    loop {
        let items = fetch(page).await?;
        trace!(target: EVENT_TARGET, page, items = items.len(), "collect_pages.page");
        if items.is_empty() {
            return Ok(all);
        }
        all.extend(items);
        page += 1;
    }
}

/// All holdings of a wallet, and its delegation as reported by the first page.
pub async fn wallet_holdings(
    provider: &dyn HoldingsProvider,
    wallet: &WalletId,
) -> Result<WalletPage, ProviderError> {
    let mut result = WalletPage::default();
    let mut page = 1;
    loop {
        let WalletPage {
            holdings,
            delegation,
        } = provider.wallet_holdings(wallet, page).await?;
        if page == 1 {
            result.delegation = delegation;
        }
        if holdings.is_empty() {
            return Ok(result);
        }
        result.holdings.extend(holdings);
        page += 1;
    }
}

/// All holders of every given collection, one record per (wallet, address). Records of the same
/// address are merged, whether the provider lists full or per-collection holdings; a unit listed
/// twice for an address is kept once.
pub async fn collection_holders<'c>(
    provider: &dyn HoldingsProvider,
    collections: impl IntoIterator<Item = &'c CollectionId>,
) -> Result<Vec<HolderHoldings>, ProviderError> {
    let mut holders: Vec<HolderHoldings> = Vec::new();
    let mut index: BTreeMap<(WalletId, Address), usize> = BTreeMap::new();
    for collection in collections {
        for record in collect_pages(|page| provider.collection_holders(collection, page)).await? {
            match index.get(&(record.wallet.clone(), record.address.clone())) {
                Some(&i) => merge_record(&mut holders[i], record),
                None => {
                    index.insert((record.wallet.clone(), record.address.clone()), holders.len());
                    holders.push(record);
                }
            }
        }
    }
    Ok(holders)
}

fn merge_record(into: &mut HolderHoldings, record: HolderHoldings) {
    let known: BTreeSet<UnitId> = into.holdings.iter().map(|h| h.unit_id.clone()).collect();
    into.holdings.extend(
        record
            .holdings
            .into_iter()
            .filter(|holding| !known.contains(&holding.unit_id)),
    );
    if into.delegation.is_none() {
        into.delegation = record.delegation;
    }
    into.is_script |= record.is_script;
}
