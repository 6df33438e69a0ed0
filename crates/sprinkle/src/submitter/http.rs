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

use anyhow::Context;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use sprinkle_engine::dispatch::{SubmissionError, Submitter};
use sprinkle_kernel::{AssetId, TransactionRef, Transfer};
use std::time::Duration;
use tracing::{debug, instrument};

/// Submissions wait for the transaction to be confirmed, which takes a few blocks.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Hands batches over to an external signing service, which builds, signs and broadcasts one
/// transaction per batch:
///
/// - `POST {endpoint}/submit` with `{ "transfers": [...] }`, answering
///   `{ "transaction": "<hash>" }` once confirmed;
/// - `GET {endpoint}/balance/{unit}`, answering `{ "quantity": <amount> }`.
///
/// Batches too large for a single transaction are answered with `413 Payload Too Large`, or with
/// an error mentioning the maximum size; the body is expected to carry both the maximum and the
/// attempted size.
#[derive(Clone, Debug)]
pub struct HttpSubmitter {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Serialize)]
struct SubmitRequest<'a> {
    transfers: &'a [Transfer],
}

#[derive(Deserialize)]
struct SubmitResponse {
    transaction: TransactionRef,
}

#[derive(Deserialize)]
struct BalanceResponse {
    quantity: u128,
}

impl HttpSubmitter {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, reqwest::Error> {
        Self::with_timeout(endpoint, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        endpoint: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        })
    }

    async fn read_error(response: reqwest::Response) -> SubmissionError {
        let status = response.status();
        match response.text().await {
            Ok(body) => classify(status, body),
            Err(e) => SubmissionError::Network(
                anyhow::Error::new(e).context(format!("unreadable error response ({status})")),
            ),
        }
    }
}

/// Tell capacity errors apart from any other refusal.
fn classify(status: StatusCode, body: String) -> SubmissionError {
    if status == StatusCode::PAYLOAD_TOO_LARGE || mentions_size_limit(&body) {
        SubmissionError::CapacityExceeded(body)
    } else {
        SubmissionError::Rejected(format!("{status}: {body}"))
    }
}

fn mentions_size_limit(body: &str) -> bool {
    let body = body.to_lowercase();
    (body.contains("maximum") || body.contains("max ")) && body.contains("size")
}

#[async_trait]
impl Submitter for HttpSubmitter {
    #[instrument(level = "debug", skip_all, fields(transfers = transfers.len()))]
    async fn submit(&self, transfers: &[Transfer]) -> Result<TransactionRef, SubmissionError> {
        let url = format!("{}/submit", self.endpoint);

        let response = self
            .client
            .post(&url)
            .json(&SubmitRequest { transfers })
            .send()
            .await
            .with_context(|| format!("unable to reach {url}"))?;

        if !response.status().is_success() {
            return Err(Self::read_error(response).await);
        }

        let SubmitResponse { transaction } = response
            .json()
            .await
            .with_context(|| format!("unexpected response from {url}"))?;

        debug!(transaction = %transaction, "submitted");

        Ok(transaction)
    }

    async fn available_balance(&self, asset: &AssetId) -> Result<u128, SubmissionError> {
        let url = format!("{}/balance/{}", self.endpoint, asset.unit());

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("unable to reach {url}"))?;

        if !response.status().is_success() {
            return Err(Self::read_error(response).await);
        }

        let BalanceResponse { quantity } = response
            .json()
            .await
            .with_context(|| format!("unexpected response from {url}"))?;

        Ok(quantity)
    }
}
