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

use super::stored_config;
use clap::Parser;
use sprinkle_engine::{dispatch::outstanding, CampaignStore};
use sprinkle_kernel::CampaignId;
use sprinkle_stores::rocksdb::RocksDB;
use std::{collections::BTreeSet, error::Error, path::Path};
use tracing::info;

#[derive(Debug, Parser)]
pub struct Args {
    /// Identifier of a recorded campaign.
    #[arg(long, value_name = "ID", env = "SPRINKLE_CAMPAIGN_ID")]
    campaign_id: CampaignId,
}

pub async fn run(args: Args, db: &Path) -> Result<(), Box<dyn Error>> {
    info!(campaign = %args.campaign_id, "Running command status");

    let store = RocksDB::open(db)?;
    let config = stored_config(&store, &args.campaign_id)?;

    let payouts = store.payouts(&config.id)?;
    let paid = payouts.iter().filter(|h| h.is_resolved()).count();
    let transactions: BTreeSet<_> = payouts
        .iter()
        .filter_map(|h| h.transaction_ref.as_ref())
        .collect();
    let forced = payouts.iter().filter(|h| h.forced_minimum).count();

    let used = store.used_units(&config.id)?;
    let fungible = store.fungible_snapshot(&config.id)?;
    let consumed = fungible.values().filter(|entry| entry.consumed).count();

    println!(
        "{}",
        indoc::formatdoc! {"
            campaign            {id}
            pool                {pool} {asset}
            payouts             {total} ({forced} raised to the minimum)
              paid              {paid} in {transactions} transactions
              outstanding       {outstanding}
            used units          {used}
            fungible entries    {entries} ({consumed} consumed)",
            id = config.id,
            pool = config.total_pool_on_chain_amount,
            asset = config.pool_asset,
            total = payouts.len(),
            forced = forced,
            paid = paid,
            transactions = transactions.len(),
            outstanding = outstanding(&payouts),
            used = used.len(),
            entries = fungible.len(),
            consumed = consumed,
        }
    );

    Ok(())
}
