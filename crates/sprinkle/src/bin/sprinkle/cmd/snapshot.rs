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

use clap::Parser;
use sprinkle::{providers::JsonHoldings, DEFAULT_PAGE_SIZE};
use sprinkle_engine::{campaign::fungible_snapshot, providers::collection_holders, CampaignStore};
use sprinkle_kernel::{CampaignConfig, Decimal};
use sprinkle_stores::rocksdb::RocksDB;
use std::{
    error::Error,
    path::{Path, PathBuf},
};
use tracing::info;

#[derive(Debug, Parser)]
pub struct Args {
    /// Path to the campaign document (JSON).
    #[arg(long, value_name = "FILE", env = "SPRINKLE_CAMPAIGN")]
    campaign: PathBuf,

    /// Path to the holders export (JSON) of the campaign's collections.
    #[arg(long, value_name = "FILE", env = "SPRINKLE_HOLDERS")]
    holders: PathBuf,

    /// Number of records fetched at once from the holders export.
    #[arg(long, value_name = "N", default_value_t = DEFAULT_PAGE_SIZE)]
    page_size: usize,
}

pub async fn run(args: Args, db: &Path) -> Result<(), Box<dyn Error>> {
    let config = CampaignConfig::from_file(&args.campaign)?;

    info!(
        campaign = %config.id,
        holders = %args.holders.display(),
        "Running command snapshot",
    );

    let provider = JsonHoldings::load(&args.holders, args.page_size).await?;
    let holders = collection_holders(&provider, config.collections()).await?;

    let snapshot = fungible_snapshot(&config, &holders);

    let store = RocksDB::open(db)?;
    store.put_config(&config)?;
    store.put_fungible_snapshot(&config.id, &snapshot)?;

    let points: Decimal = snapshot.values().map(|entry| &entry.points).sum();
    println!(
        "{} wallets in the fungible snapshot of '{}', for {points} points",
        snapshot.len(),
        config.id
    );

    Ok(())
}
