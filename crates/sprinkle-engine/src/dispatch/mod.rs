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

/*
The dispatcher pays a list of payouts, a batch of transfers at a time.

Submitters enforce a hard limit on the size of a transaction, which isn't known upfront and only
surfaces as an error of the form:

    Maximum transaction size of 16384 exceeded. Found: 21861

The dispatcher starts optimistic, with every outstanding payout in a single batch, and shrinks
batches on each such error:

    batch_size_factor := batch_size_factor × maximum / attempted
    batch_ceiling     := length of the failed batch - 1
    batch_size        := clamp(⌊batch_size_factor × unresolved⌋, 1, batch_ceiling)

Since the ceiling strictly decreases on every capacity error, a run either converges or fails
with `CannotShrink` once a single transfer doesn't fit.

Payouts are stamped with their transaction reference as soon as their batch is confirmed, and a
stamped payout is never resubmitted; neither within a run (batches are recomputed from the
unresolved payouts only) nor across runs. Hence a failed or cancelled run can simply be started
again on the same list.

A batch confirmed on-chain is paid, whatever happens next. Persisting its stamps is retried a few
times; when it still fails, the run stops and the error lists the payouts that are stamped in
memory only. Those must reach the store before another run starts.
*/

mod capacity;
mod state;

pub use capacity::Capacity;
pub use state::BatchState;

use crate::store::StoreError;
use async_trait::async_trait;
use progress_bar::{no_progress_bar, ProgressBar, ProgressBarFactory};
use sprinkle_kernel::{AssetId, OnChainAmount, PayoutHolder, TransactionRef, Transfer};
use state::ShrinkError;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

const EVENT_TARGET: &str = "sprinkle::engine::dispatch";

/// How many times the stamps of a confirmed batch are handed to the checkpoint before giving up.
const CHECKPOINT_ATTEMPTS: usize = 3;

const PROGRESS_TEMPLATE: &str = "  {spinner} {pos:>6}/{len:6} payouts {wide_msg}";

#[derive(Debug, Error)]
pub enum SubmissionError {
    /// The batch exceeds the submitter's size limit; the message carries the maximum and the
    /// attempted size.
    #[error("capacity exceeded: {0}")]
    CapacityExceeded(String),
    #[error("rejected: {0}")]
    Rejected(String),
    #[error(transparent)]
    Network(#[from] anyhow::Error),
}

/// Signs and broadcasts batches of transfers.
#[async_trait]
pub trait Submitter: Send + Sync {
    /// Submit all transfers as one transaction, and wait for its confirmation.
    async fn submit(&self, transfers: &[Transfer]) -> Result<TransactionRef, SubmissionError>;

    /// Spendable amount of `asset`, in its smallest on-chain unit.
    async fn available_balance(&self, asset: &AssetId) -> Result<u128, SubmissionError>;
}

/// Persists payouts as soon as their batch is confirmed.
pub trait Checkpoint {
    /// `batch` holds the newly stamped payouts.
    fn confirmed(&self, batch: &[PayoutHolder]) -> Result<(), StoreError>;
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("insufficient balance: {required} required, {available} available")]
    InsufficientBalance {
        required: u128,
        available: u128,
        state: Box<BatchState>,
    },
    #[error("unable to read the size limit out of '{message}'")]
    UnparseableCapacity {
        message: String,
        state: Box<BatchState>,
    },
    #[error("cannot shrink batches any further (capacity: {capacity}, failed batch: {batch_len})")]
    CannotShrink {
        capacity: Capacity,
        batch_len: usize,
        state: Box<BatchState>,
    },
    #[error("submission failed")]
    Submission {
        #[source]
        source: SubmissionError,
        state: Box<BatchState>,
    },
    #[error("unable to persist {} confirmed payouts", .unsaved.len())]
    Checkpoint {
        #[source]
        source: StoreError,
        /// Payouts of the confirmed batch, stamped in memory only.
        unsaved: Vec<PayoutHolder>,
        state: Box<BatchState>,
    },
    #[error("dispatch cancelled")]
    Cancelled { state: Box<BatchState> },
}

impl DispatchError {
    /// Where the run stopped.
    pub fn state(&self) -> &BatchState {
        match self {
            DispatchError::InsufficientBalance { state, .. }
            | DispatchError::UnparseableCapacity { state, .. }
            | DispatchError::CannotShrink { state, .. }
            | DispatchError::Submission { state, .. }
            | DispatchError::Checkpoint { state, .. }
            | DispatchError::Cancelled { state } => state,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Payouts confirmed during this run.
    pub confirmed: usize,
    /// Batches submitted successfully.
    pub batches: usize,
    pub transactions: Vec<TransactionRef>,
}

pub struct Dispatcher<'a> {
    submitter: &'a dyn Submitter,
    asset: AssetId,
    checkpoint: Option<&'a dyn Checkpoint>,
    progress: Option<ProgressBarFactory<'a>>,
    cancel: CancellationToken,
}

impl<'a> Dispatcher<'a> {
    pub fn new(submitter: &'a dyn Submitter, asset: AssetId) -> Self {
        Self {
            submitter,
            asset,
            checkpoint: None,
            progress: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_checkpoint(mut self, checkpoint: &'a dyn Checkpoint) -> Self {
        self.checkpoint = Some(checkpoint);
        self
    }

    pub fn with_progress(mut self, progress: ProgressBarFactory<'a>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Cancellation is only ever observed between two batches.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Pay every payout lacking a transaction reference.
    #[instrument(level = "info", skip_all, fields(payouts = holders.len(), asset = %self.asset))]
    pub async fn run(&self, holders: &mut [PayoutHolder]) -> Result<DispatchReport, DispatchError> {
        let mut state = BatchState::new(holders);
        if state.unresolved.is_empty() {
            return Ok(DispatchReport::default());
        }

        self.preflight(holders, &state).await?;

        let progress = match self.progress {
            Some(factory) => factory(holders.len(), PROGRESS_TEMPLATE),
            None => no_progress_bar(holders.len(), PROGRESS_TEMPLATE),
        };
        progress.tick(state.confirmed_count);

        let result = self.dispatch(holders, &mut state, progress.as_ref()).await;
        progress.clear();

        match &result {
            Ok(report) => info!(
                target: EVENT_TARGET,
                confirmed = report.confirmed,
                batches = report.batches,
                "run.done"
            ),
            Err(error) => warn!(
                target: EVENT_TARGET,
                %error,
                confirmed = error.state().confirmed_count,
                unresolved = error.state().unresolved.len(),
                "run.stopped"
            ),
        }

        result
    }

    async fn preflight(
        &self,
        holders: &[PayoutHolder],
        state: &BatchState,
    ) -> Result<(), DispatchError> {
        let required: u128 = state
            .unresolved
            .iter()
            .map(|&i| u128::from(holders[i].amount))
            .sum();

        let available = self
            .submitter
            .available_balance(&self.asset)
            .await
            .map_err(|source| DispatchError::Submission {
                source,
                state: Box::new(state.clone()),
            })?;

        debug!(target: EVENT_TARGET, required, available, "preflight.balance");

        if required > available {
            return Err(DispatchError::InsufficientBalance {
                required,
                available,
                state: Box::new(state.clone()),
            });
        }

        Ok(())
    }

    async fn dispatch(
        &self,
        holders: &mut [PayoutHolder],
        state: &mut BatchState,
        progress: &dyn ProgressBar,
    ) -> Result<DispatchReport, DispatchError> {
        let mut report = DispatchReport::default();

        'resize: loop {
            state.refresh(holders);
            if state.unresolved.is_empty() {
                return Ok(report);
            }

            let batch_size = state.batch_size();
            let batches: Vec<Vec<usize>> = state
                .unresolved
                .chunks(batch_size)
                .map(<[usize]>::to_vec)
                .collect();

            debug!(
                target: EVENT_TARGET,
                unresolved = state.unresolved.len(),
                batch_size,
                batches = batches.len(),
                factor = %state.batch_size_factor,
                "dispatch.batching"
            );

            for batch in batches {
                if self.cancel.is_cancelled() {
                    state.refresh(holders);
                    return Err(DispatchError::Cancelled {
                        state: Box::new(state.clone()),
                    });
                }

                let transfers: Vec<Transfer> = batch
                    .iter()
                    .map(|&i| holders[i].transfer(&self.asset))
                    .collect();

                match self.submitter.submit(&transfers).await {
                    Ok(transaction) => {
                        for &i in &batch {
                            holders[i].transaction_ref = Some(transaction.clone());
                        }
                        state.confirmed_count += batch.len();
                        state.last_message = Some(format!(
                            "{} payouts confirmed in {}",
                            batch.len(),
                            transaction
                        ));

                        debug!(
                            target: EVENT_TARGET,
                            transaction = %transaction,
                            size = batch.len(),
                            confirmed = state.confirmed_count,
                            "dispatch.confirmed"
                        );

                        if let Some(checkpoint) = self.checkpoint {
                            let stamped: Vec<PayoutHolder> =
                                batch.iter().map(|&i| holders[i].clone()).collect();
                            if let Err(source) = persist(checkpoint, &stamped) {
                                state.refresh(holders);
                                return Err(DispatchError::Checkpoint {
                                    source,
                                    unsaved: stamped,
                                    state: Box::new(state.clone()),
                                });
                            }
                        }

                        progress.tick(batch.len());
                        if let Some(message) = &state.last_message {
                            progress.set_message(message.clone());
                        }

                        report.confirmed += batch.len();
                        report.batches += 1;
                        report.transactions.push(transaction);
                    }

                    Err(SubmissionError::CapacityExceeded(message)) => {
                        state.refresh(holders);
                        let capacity =
                            state
                                .shrink(&message, batch.len())
                                .map_err(|error| match error {
                                    ShrinkError::Unparseable => DispatchError::UnparseableCapacity {
                                        message: message.clone(),
                                        state: Box::new(state.clone()),
                                    },
                                    ShrinkError::CannotShrink(capacity) => {
                                        DispatchError::CannotShrink {
                                            capacity,
                                            batch_len: batch.len(),
                                            state: Box::new(state.clone()),
                                        }
                                    }
                                })?;

                        debug!(
                            target: EVENT_TARGET,
                            %capacity,
                            failed = batch.len(),
                            ceiling = state.batch_ceiling,
                            "dispatch.resized"
                        );

                        continue 'resize;
                    }

                    Err(source) => {
                        state.refresh(holders);
                        state.last_error = Some(source.to_string());
                        return Err(DispatchError::Submission {
                            source,
                            state: Box::new(state.clone()),
                        });
                    }
                }
            }
        }
    }
}

fn persist(checkpoint: &dyn Checkpoint, stamped: &[PayoutHolder]) -> Result<(), StoreError> {
    let mut attempt = 1;
    loop {
        match checkpoint.confirmed(stamped) {
            Ok(()) => return Ok(()),
            Err(error) if attempt < CHECKPOINT_ATTEMPTS => {
                warn!(
                    target: EVENT_TARGET,
                    %error,
                    attempt,
                    payouts = stamped.len(),
                    "dispatch.checkpoint.retry"
                );
                attempt += 1;
            }
            Err(error) => return Err(error),
        }
    }
}

/// Sum of all payouts still to be paid.
pub fn outstanding(holders: &[PayoutHolder]) -> OnChainAmount {
    holders
        .iter()
        .filter(|h| !h.is_resolved())
        .map(|h| h.amount)
        .fold(0, OnChainAmount::saturating_add)
}
