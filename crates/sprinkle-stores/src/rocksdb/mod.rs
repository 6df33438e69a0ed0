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

mod common;

use ::rocksdb::{OptimisticTransactionDB, Options, SliceTransform, Transaction};
use common::{as_key, as_value, decode, internal, scope, PREFIX_LEN};
use sprinkle_engine::{store::apply_stamps, CampaignStore, StoreError, UsedUnitSet};
use sprinkle_kernel::{
    CampaignConfig, CampaignId, FungibleSnapshotEntry, PayoutHolder, UnitId, WalletId,
};
use std::{
    collections::{BTreeMap, BTreeSet},
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument, Level};

const EVENT_TARGET: &str = "sprinkle::stores::rocksdb";

/// Name prefixed used for storing campaign configurations. UTF-8 encoding for "conf"
const CONFIG_PREFIX: [u8; PREFIX_LEN] = [0x63, 0x6f, 0x6e, 0x66];

/// Name prefixed used for storing used units. UTF-8 encoding for "used"
const USED_PREFIX: [u8; PREFIX_LEN] = [0x75, 0x73, 0x65, 0x64];

/// Name prefixed used for storing fungible snapshot entries. UTF-8 encoding for "fung"
const FUNGIBLE_PREFIX: [u8; PREFIX_LEN] = [0x66, 0x75, 0x6e, 0x67];

/// Name prefixed used for storing payouts. UTF-8 encoding for "pays"
const PAYOUT_PREFIX: [u8; PREFIX_LEN] = [0x70, 0x61, 0x79, 0x73];

/// An opaque handle for a store implementation of top of RocksDB. The database has the
/// following structure:
///
/// * ===========================================*========================================= *
/// *                  key                       *                  value                  *
/// * ===========================================*========================================= *
/// * 'conf' campaign                            * CampaignConfig (JSON document)          *
/// * 'used' campaign unit                       * (empty)                                 *
/// * 'fung' campaign wallet                     * FungibleSnapshotEntry                   *
/// * 'pays' campaign position                   * PayoutHolder                            *
/// * ===========================================*========================================= *
///
/// CBOR is used to serialize keys and rows into their binary equivalent. Positions are CBOR
/// unsigned integers, whose encoding preserves their order; so iterating over payouts yields
/// them in the order they were published.
pub struct RocksDB {
    /// The working directory of the key/value store.
    dir: PathBuf,

    /// An instance of RocksDB.
    db: OptimisticTransactionDB,
}

impl RocksDB {
    pub fn open(dir: &Path) -> Result<RocksDB, StoreError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_prefix_extractor(SliceTransform::create_fixed_prefix(PREFIX_LEN));

        let db = OptimisticTransactionDB::open(&opts, dir).map_err(internal)?;

        info!(target: EVENT_TARGET, dir = %dir.display(), "open.done");

        Ok(RocksDB {
            dir: dir.to_path_buf(),
            db,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Every (key, value) pair of a scope, in key order.
fn scan<DB>(
    db: &Transaction<'_, DB>,
    scope: &[u8],
) -> Result<Vec<(Box<[u8]>, Box<[u8]>)>, StoreError> {
    let mut rows = Vec::new();
    for item in db.prefix_iterator(scope) {
        let (key, value) = item.map_err(internal)?;
        if !key.starts_with(scope) {
            break;
        }
        rows.push((key, value));
    }
    Ok(rows)
}

/// Replace every row of a scope.
fn replace<DB>(
    db: &Transaction<'_, DB>,
    scope: &[u8],
    rows: impl IntoIterator<Item = (Vec<u8>, Vec<u8>)>,
) -> Result<(), StoreError> {
    for (key, _) in scan(db, scope)? {
        db.delete(key).map_err(internal)?;
    }
    for (key, value) in rows {
        db.put(key, value).map_err(internal)?;
    }
    Ok(())
}

impl CampaignStore for RocksDB {
    fn config(&self, campaign: &CampaignId) -> Result<Option<CampaignConfig>, StoreError> {
        let key = scope(&CONFIG_PREFIX, campaign);
        self.db
            .get_pinned(&key)
            .map_err(internal)?
            .map(|bytes| {
                CampaignConfig::from_json(&bytes).map_err(|e| StoreError::Malformed {
                    key: hex::encode(&key),
                    reason: e.to_string(),
                })
            })
            .transpose()
    }

    #[instrument(level = Level::TRACE, skip_all, fields(campaign = %config.id))]
    fn put_config(&self, config: &CampaignConfig) -> Result<(), StoreError> {
        let document = config.to_json().map_err(internal)?;
        self.db
            .put(scope(&CONFIG_PREFIX, &config.id), document)
            .map_err(internal)
    }

    fn used_units(&self, campaign: &CampaignId) -> Result<UsedUnitSet, StoreError> {
        let scope = scope(&USED_PREFIX, campaign);
        scan(&self.db.transaction(), &scope)?
            .iter()
            .map(|(key, _)| decode::<UnitId>(key, &key[scope.len()..]))
            .collect()
    }

    fn add_used_units(
        &self,
        campaign: &CampaignId,
        units: &BTreeSet<UnitId>,
    ) -> Result<BTreeSet<UnitId>, StoreError> {
        let scope = scope(&USED_PREFIX, campaign);
        let db = self.db.transaction();

        let mut added = BTreeSet::new();
        for unit in units {
            let key = as_key(&scope, unit);
            if db.get_for_update(&key, true).map_err(internal)?.is_none() {
                db.put(&key, b"").map_err(internal)?;
                added.insert(unit.clone());
            }
        }

        db.commit().map_err(internal)?;

        debug!(
            target: EVENT_TARGET,
            campaign = %campaign,
            added = added.len(),
            claimed = units.len() - added.len(),
            "add_used_units.committed"
        );

        Ok(added)
    }

    fn remove_used_units(
        &self,
        campaign: &CampaignId,
        units: &BTreeSet<UnitId>,
    ) -> Result<usize, StoreError> {
        let scope = scope(&USED_PREFIX, campaign);
        let db = self.db.transaction();

        let mut removed = 0;
        for unit in units {
            let key = as_key(&scope, unit);
            if db.get_for_update(&key, true).map_err(internal)?.is_some() {
                db.delete(&key).map_err(internal)?;
                removed += 1;
            }
        }

        db.commit().map_err(internal)?;

        Ok(removed)
    }

    fn fungible_entry(
        &self,
        campaign: &CampaignId,
        wallet: &WalletId,
    ) -> Result<Option<FungibleSnapshotEntry>, StoreError> {
        let key = as_key(&scope(&FUNGIBLE_PREFIX, campaign), wallet);
        self.db
            .get_pinned(&key)
            .map_err(internal)?
            .map(|bytes| decode(&key, &bytes))
            .transpose()
    }

    fn fungible_snapshot(
        &self,
        campaign: &CampaignId,
    ) -> Result<BTreeMap<WalletId, FungibleSnapshotEntry>, StoreError> {
        let scope = scope(&FUNGIBLE_PREFIX, campaign);
        scan(&self.db.transaction(), &scope)?
            .iter()
            .map(|(key, value)| {
                let entry: FungibleSnapshotEntry = decode(key, value)?;
                Ok((entry.wallet.clone(), entry))
            })
            .collect()
    }

    fn put_fungible_snapshot(
        &self,
        campaign: &CampaignId,
        entries: &BTreeMap<WalletId, FungibleSnapshotEntry>,
    ) -> Result<(), StoreError> {
        let scope = scope(&FUNGIBLE_PREFIX, campaign);
        let db = self.db.transaction();
        replace(
            &db,
            &scope,
            entries
                .iter()
                .map(|(wallet, entry)| (as_key(&scope, wallet), as_value(entry))),
        )?;
        db.commit().map_err(internal)
    }

    fn consume_fungible_entry(
        &self,
        campaign: &CampaignId,
        wallet: &WalletId,
    ) -> Result<bool, StoreError> {
        let key = as_key(&scope(&FUNGIBLE_PREFIX, campaign), wallet);
        let db = self.db.transaction();

        let Some(bytes) = db.get_for_update(&key, true).map_err(internal)? else {
            return Ok(false);
        };

        let mut entry: FungibleSnapshotEntry = decode(&key, &bytes)?;
        if entry.consumed {
            return Ok(false);
        }

        entry.consumed = true;
        db.put(&key, as_value(&entry)).map_err(internal)?;
        db.commit().map_err(internal)?;

        Ok(true)
    }

    fn payouts(&self, campaign: &CampaignId) -> Result<Vec<PayoutHolder>, StoreError> {
        let scope = scope(&PAYOUT_PREFIX, campaign);
        scan(&self.db.transaction(), &scope)?
            .iter()
            .map(|(key, value)| decode(key, value))
            .collect()
    }

    #[instrument(level = Level::TRACE, skip_all, fields(campaign = %campaign, payouts = holders.len()))]
    fn put_payouts(
        &self,
        campaign: &CampaignId,
        holders: &[PayoutHolder],
    ) -> Result<(), StoreError> {
        let scope = scope(&PAYOUT_PREFIX, campaign);
        let db = self.db.transaction();
        replace(
            &db,
            &scope,
            holders
                .iter()
                .enumerate()
                .map(|(position, holder)| (as_key(&scope, position as u64), as_value(holder))),
        )?;
        db.commit().map_err(internal)
    }

    fn stamp_payouts(
        &self,
        campaign: &CampaignId,
        stamped: &[PayoutHolder],
    ) -> Result<usize, StoreError> {
        let scope = scope(&PAYOUT_PREFIX, campaign);
        let db = self.db.transaction();

        let keys: Vec<Box<[u8]>> = scan(&db, &scope)?.into_iter().map(|(key, _)| key).collect();
        if keys.is_empty() {
            return Err(StoreError::UnknownCampaign(campaign.clone()));
        }

        let mut count = 0;
        for key in keys {
            let Some(bytes) = db.get_for_update(&key, true).map_err(internal)? else {
                continue;
            };
            let mut row: PayoutHolder = decode(&key, &bytes)?;
            if apply_stamps(std::slice::from_mut(&mut row), stamped) > 0 {
                db.put(&key, as_value(&row)).map_err(internal)?;
                count += 1;
            }
        }

        db.commit().map_err(internal)?;

        debug!(target: EVENT_TARGET, campaign = %campaign, count, "stamp_payouts.committed");

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sprinkle_kernel::{Address, AssetId, Decimal, PolicySetting, TransactionRef};

    fn campaign() -> CampaignId {
        CampaignId::from("spring")
    }

    fn config() -> CampaignConfig {
        CampaignConfig {
            id: campaign(),
            policy_settings: vec![PolicySetting::new("aa")],
            blacklisted_wallets: BTreeSet::new(),
            blacklisted_units: BTreeSet::new(),
            required_delegation_targets: BTreeSet::new(),
            total_pool_on_chain_amount: 1_000_000,
            pool_decimals: 6,
            pool_asset: AssetId::Lovelace,
            minimum_transfer: Some(1_000),
        }
    }

    fn units(ids: &[&str]) -> BTreeSet<UnitId> {
        ids.iter().map(|id| UnitId::from(*id)).collect()
    }

    fn payouts(n: usize) -> Vec<PayoutHolder> {
        (0..n)
            .map(|i| {
                PayoutHolder::new(
                    WalletId::from(format!("w{i}")),
                    Address::from(format!("a{i}")),
                    1_000 * (n - i) as u64,
                )
            })
            .collect()
    }

    #[test]
    fn config_roundtrip_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = RocksDB::open(dir.path()).unwrap();
            assert_eq!(store.config(&campaign()).unwrap(), None);
            store.put_config(&config()).unwrap();
        }

        let store = RocksDB::open(dir.path()).unwrap();
        assert_eq!(store.config(&campaign()).unwrap(), Some(config()));
    }

    #[test]
    fn used_units_are_scoped_by_campaign() {
        let dir = tempfile::tempdir().unwrap();
        let store = RocksDB::open(dir.path()).unwrap();
        let other = CampaignId::from("spring-2");

        assert_eq!(
            store.add_used_units(&campaign(), &units(&["a", "b"])).unwrap(),
            units(&["a", "b"])
        );
        assert_eq!(
            store.add_used_units(&campaign(), &units(&["b", "c"])).unwrap(),
            units(&["c"])
        );
        assert_eq!(
            store.add_used_units(&other, &units(&["z"])).unwrap(),
            units(&["z"])
        );

        let used = store.used_units(&campaign()).unwrap();
        assert_eq!(used, UsedUnitSet::from(units(&["a", "b", "c"])));

        assert_eq!(store.remove_used_units(&campaign(), &units(&["a", "y"])).unwrap(), 1);
        assert_eq!(store.used_units(&campaign()).unwrap().len(), 2);
        assert_eq!(store.used_units(&other).unwrap().len(), 1);
    }

    #[test]
    fn fungible_entries_are_consumed_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = RocksDB::open(dir.path()).unwrap();
        let w1 = WalletId::from("w1");
        let w2 = WalletId::from("w2");

        let snapshot = BTreeMap::from([
            (
                w1.clone(),
                FungibleSnapshotEntry::new(w1.clone(), Decimal::from_integer(3)),
            ),
            (
                w2.clone(),
                FungibleSnapshotEntry::new(w2.clone(), Decimal::from_ratio(1, 3).unwrap()),
            ),
        ]);
        store.put_fungible_snapshot(&campaign(), &snapshot).unwrap();
        assert_eq!(store.fungible_snapshot(&campaign()).unwrap(), snapshot);

        assert!(store.consume_fungible_entry(&campaign(), &w1).unwrap());
        assert!(!store.consume_fungible_entry(&campaign(), &w1).unwrap());
        assert!(!store
            .consume_fungible_entry(&campaign(), &WalletId::from("w3"))
            .unwrap());

        assert!(store.fungible_entry(&campaign(), &w1).unwrap().unwrap().consumed);
        assert!(!store.fungible_entry(&campaign(), &w2).unwrap().unwrap().consumed);

        // A new snapshot replaces the previous one entirely.
        store
            .put_fungible_snapshot(
                &campaign(),
                &BTreeMap::from([(
                    w2.clone(),
                    FungibleSnapshotEntry::new(w2.clone(), Decimal::one()),
                )]),
            )
            .unwrap();
        assert_eq!(store.fungible_entry(&campaign(), &w1).unwrap(), None);
    }

    #[test]
    fn payouts_keep_their_order_and_stamps() {
        let dir = tempfile::tempdir().unwrap();
        let store = RocksDB::open(dir.path()).unwrap();

        // More than 24 rows, so that positions span several CBOR integer widths.
        let holders = payouts(300);
        store.put_payouts(&campaign(), &holders).unwrap();
        assert_eq!(store.payouts(&campaign()).unwrap(), holders);

        let mut confirmed = holders[10].clone();
        confirmed.transaction_ref = Some(TransactionRef::from("tx1"));
        assert_eq!(store.stamp_payouts(&campaign(), &[confirmed.clone()]).unwrap(), 1);

        confirmed.transaction_ref = Some(TransactionRef::from("tx2"));
        assert_eq!(store.stamp_payouts(&campaign(), &[confirmed]).unwrap(), 0);

        let stored = store.payouts(&campaign()).unwrap();
        assert_eq!(stored[10].transaction_ref, Some(TransactionRef::from("tx1")));
        assert_eq!(stored.iter().filter(|h| h.is_resolved()).count(), 1);

        store.put_payouts(&campaign(), &payouts(2)).unwrap();
        assert_eq!(store.payouts(&campaign()).unwrap().len(), 2);

        assert!(matches!(
            store.stamp_payouts(&CampaignId::from("unknown"), &[]),
            Err(StoreError::UnknownCampaign(..))
        ));
    }
}
