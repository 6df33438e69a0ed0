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

//! Shared vocabulary of distribution campaigns: identifiers, exact decimal quantities, policy
//! settings, holdings and payouts.

pub use minicbor as cbor;

mod macros;

pub mod asset;
pub use asset::AssetId;

pub mod campaign;
pub use campaign::{CampaignConfig, InvalidCampaign};

pub mod decimal;
pub use decimal::{Decimal, InvalidDecimal};

pub mod holding;
pub use holding::{HolderHoldings, Holding};

pub mod payout;
pub use payout::{FungibleSnapshotEntry, PayoutHolder, Transfer};

pub mod policy;
pub use policy::{PolicySetting, RankModifier, TraitModifier, WhaleModifier};

/// A quantity expressed in the smallest indivisible unit of an asset.
pub type OnChainAmount = u64;

/// Number of decimals of the native currency.
pub const LOVELACE_DECIMALS: u8 = 6;

string_identifier!(
    /// A campaign, as known by the campaign store.
    CampaignId
);

string_identifier!(
    /// A collection's minting policy id, hex-encoded.
    CollectionId
);

string_identifier!(
    /// A single asset: the policy id followed by the hex-encoded asset name.
    UnitId
);

string_identifier!(
    /// The identity under which balances are aggregated; a stake address, or a payment address
    /// when the holder has no stake credential.
    WalletId
);

string_identifier!(
    /// A bech32-encoded receiving address.
    Address
);

string_identifier!(
    /// A stake pool id, as targeted by delegation certificates.
    PoolId
);

string_identifier!(
    /// The hash of a submitted transaction.
    TransactionRef
);
