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
use sprinkle::{providers::JsonHoldings, DEFAULT_PAGE_SIZE};
use sprinkle_engine::{
    campaign::{tally_votes, Voter},
    providers::wallet_holdings,
    CampaignStore, MemoizedRanks,
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

    /// Path to the votes (JSON): the voting wallets, in the order they voted.
    #[arg(long, value_name = "FILE")]
    votes: PathBuf,

    /// Path to the holders export (JSON) to read the voters' holdings from.
    #[arg(long, value_name = "FILE", env = "SPRINKLE_HOLDERS")]
    holders: PathBuf,

    #[arg(long, value_name = "N", default_value_t = DEFAULT_PAGE_SIZE)]
    page_size: usize,
}

pub async fn run(args: Args, db: &Path) -> Result<(), Box<dyn Error>> {
    info!(
        campaign = %args.campaign_id,
        votes = %args.votes.display(),
        "Running command tally",
    );

    let store = RocksDB::open(db)?;
    let config = stored_config(&store, &args.campaign_id)?;
    let fungible = store.fungible_snapshot(&config.id)?;

    let votes: Vec<WalletId> = serde_json::from_slice(&tokio::fs::read(&args.votes).await?)?;

    let provider = JsonHoldings::load(&args.holders, args.page_size).await?;
    let mut voters = Vec::with_capacity(votes.len());
    for wallet in votes {
        let page = wallet_holdings(&provider, &wallet).await?;
        voters.push(Voter {
            wallet,
            delegation: page.delegation,
            holdings: page.holdings,
        });
    }

    let mut ranks = MemoizedRanks::new(&provider);
    let table = ranks.prefetch(config.collections()).await?;

    let tally = tally_votes(&config, &voters, &fungible, table);

    for (wallet, weight) in &tally.weights {
        println!("{wallet}\t{weight}");
    }
    for reason in &tally.ineligible {
        println!("# {reason}");
    }
    println!("total\t{}", tally.total);

    Ok(())
}
