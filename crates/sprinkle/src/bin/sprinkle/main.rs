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

use clap::{CommandFactory, FromArgMatches, Parser, Subcommand};
use sprinkle::{
    observability::{setup_observability, Color},
    panic::{panic_handler, version},
    DEFAULT_DB_DIR,
};
use std::{path::PathBuf, sync::LazyLock};
use tracing::info;

mod cmd;

/// Version string including the git commit it was built from.
static VERSION: LazyLock<String> = LazyLock::new(|| version(true));

#[derive(Debug, Subcommand)]
enum Command {
    /// Take the fungible snapshot of a campaign.
    ///
    /// Computes, once and for all, the points every eligible wallet gets from its fungible
    /// balances, and records the campaign document along with it. Each wallet's points can then
    /// be consumed once by a live entry or a vote.
    Snapshot(cmd::snapshot::Args),

    /// Score a wallet's live entry into a campaign.
    ///
    /// The units counted and the wallet's fungible points are consumed: they won't count again
    /// in any later entry of the same campaign.
    Score(cmd::score::Args),

    /// Weigh the votes cast in a campaign, in order.
    Tally(cmd::tally::Args),

    /// Split a campaign's pool between holders and record the resulting payouts.
    ///
    /// Payouts are computed proportionally to what each wallet holds, plus the rank, trait and
    /// whale bonuses of the campaign. Payouts below the campaign's minimum transfer need to be
    /// settled explicitly:
    ///
    ///   --minimum accept    raises them to the minimum
    ///   --minimum decline   drops them
    #[clap(verbatim_doc_comment)]
    Allocate(cmd::allocate::Args),

    /// Send the outstanding payouts of a campaign.
    ///
    /// Payouts are sent in batches, shrunk as needed to fit the submitter's limits, and recorded
    /// as paid as soon as their batch is confirmed. An interrupted dispatch (Ctrl-C, failure)
    /// resumes where it stopped when run again.
    Dispatch(cmd::dispatch::Args),

    /// Summarize where a campaign stands.
    Status(cmd::status::Args),
}

#[derive(Debug, Parser)]
#[clap(name = "Sprinkle")]
#[clap(bin_name = "sprinkle")]
#[clap(author, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path of the campaigns on-disk storage.
    #[arg(
        long,
        global = true,
        value_name = "DIR",
        env = "SPRINKLE_DB",
        default_value = DEFAULT_DB_DIR
    )]
    db: PathBuf,

    #[clap(long, action, env("SPRINKLE_WITH_JSON_TRACES"))]
    with_json_traces: bool,

    #[clap(long, action, env("SPRINKLE_COLOR"))]
    color: Option<Color>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    panic_handler();

    let matches = <Cli as CommandFactory>::command()
        .version(VERSION.as_str())
        .get_matches();
    let Cli {
        command,
        db,
        with_json_traces,
        color,
    } = <Cli as FromArgMatches>::from_arg_matches(&matches)?;

    setup_observability(with_json_traces, Color::is_enabled(color));

    info!(
        db = %db.display(),
        with_json_traces,
        "Started with global arguments"
    );

    match command {
        Command::Snapshot(args) => cmd::snapshot::run(args, &db).await,
        Command::Score(args) => cmd::score::run(args, &db).await,
        Command::Tally(args) => cmd::tally::run(args, &db).await,
        Command::Allocate(args) => cmd::allocate::run(args, &db).await,
        Command::Dispatch(args) => cmd::dispatch::run(args, &db).await,
        Command::Status(args) => cmd::status::run(args, &db).await,
    }
}
