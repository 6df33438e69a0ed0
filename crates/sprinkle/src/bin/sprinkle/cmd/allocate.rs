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
    campaign::{publish, CampaignError},
    providers::collection_holders,
    MemoizedRanks, MinimumResolution,
};
use sprinkle_kernel::CampaignConfig;
use sprinkle_stores::rocksdb::RocksDB;
use std::{
    error::Error,
    path::{Path, PathBuf},
};
use tracing::{info, warn};

#[derive(Debug, Parser)]
pub struct Args {
    /// Path to the campaign document (JSON).
    #[arg(long, value_name = "FILE", env = "SPRINKLE_CAMPAIGN")]
    campaign: PathBuf,

    /// Path to the holders export (JSON) of the campaign's collections.
    #[arg(long, value_name = "FILE", env = "SPRINKLE_HOLDERS")]
    holders: PathBuf,

    #[arg(long, value_name = "N", default_value_t = DEFAULT_PAGE_SIZE)]
    page_size: usize,

    /// What to do with payouts below the campaign's minimum transfer: 'accept' raises them to
    /// the minimum, 'decline' drops them.
    #[arg(long, value_name = "RESOLUTION")]
    minimum: Option<MinimumResolution>,

    /// Shorthand for '--minimum accept'.
    #[arg(long, conflicts_with = "minimum")]
    accept_minimum: bool,
}

pub async fn run(args: Args, db: &Path) -> Result<(), Box<dyn Error>> {
    let config = CampaignConfig::from_file(&args.campaign)?;

    let resolution = if args.accept_minimum {
        Some(MinimumResolution::Accept)
    } else {
        args.minimum
    };

    info!(
        campaign = %config.id,
        holders = %args.holders.display(),
        minimum = ?resolution,
        "Running command allocate",
    );

    let provider = JsonHoldings::load(&args.holders, args.page_size).await?;
    let holders = collection_holders(&provider, config.collections()).await?;

    let mut ranks = MemoizedRanks::new(&provider);

    let store = RocksDB::open(db)?;
    let allocation = match publish(&store, &config, &holders, resolution, &mut ranks).await {
        Ok(allocation) => allocation,
        Err(e @ CampaignError::MinimumUnconfirmed { .. }) => {
            warn!(reason = %e, "payouts below the minimum transfer need settling");
            return Err(
                format!("{e}; run again with '--minimum accept' or '--minimum decline'").into(),
            );
        }
        Err(e) => return Err(e.into()),
    };

    for reason in &allocation.excluded {
        println!("# {reason}");
    }
    for payout in &allocation.holders {
        println!(
            "{}\t{}\t{}{}",
            payout.wallet,
            payout.address,
            payout.amount,
            if payout.forced_minimum { "\t(minimum)" } else { "" }
        );
    }
    println!(
        "{} payouts for a total of {} out of {}",
        allocation.holders.len(),
        allocation.total(),
        config.total_pool_on_chain_amount,
    );

    Ok(())
}
