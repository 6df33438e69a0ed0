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
use sprinkle_engine::{
    campaign::{live_entry, Entry},
    providers::wallet_holdings,
    MemoizedRanks,
};
use sprinkle_kernel::{CampaignId, WalletId};
use sprinkle_stores::rocksdb::RocksDB;
use std::{
    error::Error,
    path::{Path, PathBuf},
};
use tracing::info;

#[derive(Debug, Parser)]
pub struct Args {
    /// Identifier of a recorded campaign.
    #[arg(long, value_name = "ID", env = "SPRINKLE_CAMPAIGN_ID")]
    campaign_id: CampaignId,

    /// The wallet entering, as a stake address.
    #[arg(long, value_name = "WALLET")]
    wallet: WalletId,

    /// Path to the holders export (JSON) to read the wallet's holdings from.
    #[arg(long, value_name = "FILE", env = "SPRINKLE_HOLDERS")]
    holders: PathBuf,

    #[arg(long, value_name = "N", default_value_t = DEFAULT_PAGE_SIZE)]
    page_size: usize,
}

pub async fn run(args: Args, db: &Path) -> Result<(), Box<dyn Error>> {
    info!(
        campaign = %args.campaign_id,
        wallet = %args.wallet,
        "Running command score",
    );

    let store = RocksDB::open(db)?;
    let provider = JsonHoldings::load(&args.holders, args.page_size).await?;
    let page = wallet_holdings(&provider, &args.wallet).await?;
    let mut ranks = MemoizedRanks::new(&provider);

    let entry = live_entry(
        &store,
        &args.campaign_id,
        &args.wallet,
        &page.holdings,
        page.delegation.as_ref(),
        &mut ranks,
    )
    .await?;

    match entry {
        Entry::Scored(score) => {
            for (collection, points) in &score.per_policy {
                println!("{collection}\t{points}");
            }
            println!(
                "{} scores {} ({} units consumed{})",
                args.wallet,
                score.amount,
                score.consumed_units.len(),
                if score.fungible_consumed {
                    ", fungible points consumed"
                } else {
                    ""
                },
            );
        }
        Entry::Ineligible(reason) => println!("ineligible: {reason}"),
    }

    Ok(())
}
