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
use progress_bar::new_terminal_progress_bar;
use sprinkle::{exit::hook_exit_token, submitter::HttpSubmitter};
use sprinkle_engine::{
    dispatch::outstanding, CampaignStore, DispatchError, Dispatcher, StoreCheckpoint,
};
use sprinkle_kernel::CampaignId;
use sprinkle_stores::rocksdb::RocksDB;
use std::{error::Error, path::Path};
use tracing::{error, info};

#[derive(Debug, Parser)]
pub struct Args {
    /// Identifier of a recorded campaign.
    #[arg(long, value_name = "ID", env = "SPRINKLE_CAMPAIGN_ID")]
    campaign_id: CampaignId,

    /// Base URL of the signing service submitting transactions.
    #[arg(long, value_name = "URL", env = "SPRINKLE_SUBMITTER_URL")]
    submitter: String,
}

pub async fn run(args: Args, db: &Path) -> Result<(), Box<dyn Error>> {
    info!(
        campaign = %args.campaign_id,
        submitter = %args.submitter,
        "Running command dispatch",
    );

    let store = RocksDB::open(db)?;
    let config = stored_config(&store, &args.campaign_id)?;

    let mut payouts = store.payouts(&config.id)?;
    if payouts.is_empty() {
        return Err(format!(
            "campaign '{}' has no payouts; compute them first with 'allocate'",
            config.id
        )
        .into());
    }

    let submitter = HttpSubmitter::new(args.submitter)?;
    let checkpoint = StoreCheckpoint::new(&store, config.id.clone());

    let dispatcher = Dispatcher::new(&submitter, config.pool_asset.clone())
        .with_checkpoint(&checkpoint)
        .with_progress(&new_terminal_progress_bar)
        .with_cancellation(hook_exit_token());

    match dispatcher.run(&mut payouts).await {
        Ok(report) => {
            for transaction in &report.transactions {
                println!("{transaction}");
            }
            println!(
                "{} payouts confirmed in {} transactions",
                report.confirmed, report.batches
            );
            Ok(())
        }
        Err(e) => {
            // Payouts confirmed during the run may be stamped in memory only.
            match checkpoint.recover(&payouts) {
                Ok(stamped) => info!(stamped, "stamps of confirmed payouts persisted"),
                Err(reason) => {
                    if let DispatchError::Checkpoint { unsaved, .. } = &e {
                        for payout in unsaved {
                            error!(
                                wallet = %payout.wallet,
                                transaction = ?payout.transaction_ref,
                                "payout confirmed but not persisted"
                            );
                        }
                    }
                    error!(%reason, "unable to persist stamps; reconcile before resuming");
                }
            }

            let state = e.state();
            error!(
                reason = %e,
                confirmed = state.confirmed_count,
                unresolved = state.unresolved.len(),
                outstanding = outstanding(&payouts),
                last_error = ?state.last_error,
                "dispatch stopped; run it again to resume"
            );
            Err(e.into())
        }
    }
}
