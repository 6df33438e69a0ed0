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

use std::{future::Future, io};
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

/// A token cancelled on the first Ctrl-C received by the process.
///
/// Long operations are expected to stop at their next safe point. Further interrupts are
/// acknowledged but never abort the process: a transaction already broadcast must be awaited and
/// recorded, or a later run would pay it again.
pub fn hook_exit_token() -> CancellationToken {
    let exit = CancellationToken::new();
    tokio::spawn(watch_interrupts(tokio::signal::ctrl_c, exit.clone()));
    exit
}

/// Cancel `token` on the first interrupt, and keep acknowledging the following ones until the
/// signal source fails.
async fn watch_interrupts<F, Fut>(mut interrupted: F, token: CancellationToken)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<()>>,
{
    loop {
        if let Err(e) = interrupted().await {
            error!(reason = %e, "unable to listen for Ctrl-C");
            return;
        }

        if token.is_cancelled() {
            warn!("still stopping; waiting for the batch in flight to be confirmed and recorded");
        } else {
            warn!("interrupted; stopping at the next safe point");
            token.cancel();
        }
    }
}
