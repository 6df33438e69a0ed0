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

use crate::{cbor, Address, AssetId, Decimal, OnChainAmount, TransactionRef, WalletId};
use serde::{Deserialize, Serialize};

/// Fungible points of a wallet, computed once per campaign. Fungible balances cannot be
/// attributed to any discrete unit, so the entry as a whole may only be consumed once.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FungibleSnapshotEntry {
    pub wallet: WalletId,
    pub points: Decimal,
    #[serde(default)]
    pub consumed: bool,
}

impl FungibleSnapshotEntry {
    pub fn new(wallet: WalletId, points: Decimal) -> Self {
        Self {
            wallet,
            points,
            consumed: false,
        }
    }
}

impl<C> cbor::encode::Encode<C> for FungibleSnapshotEntry {
    fn encode<W: cbor::encode::Write>(
        &self,
        e: &mut cbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), cbor::encode::Error<W::Error>> {
        e.array(3)?;
        e.encode_with(&self.wallet, ctx)?;
        e.encode_with(&self.points, ctx)?;
        e.bool(self.consumed)?;
        Ok(())
    }
}

impl<'b, C> cbor::decode::Decode<'b, C> for FungibleSnapshotEntry {
    fn decode(d: &mut cbor::Decoder<'b>, ctx: &mut C) -> Result<Self, cbor::decode::Error> {
        d.array()?;
        Ok(FungibleSnapshotEntry {
            wallet: d.decode_with(ctx)?,
            points: d.decode_with(ctx)?,
            consumed: d.bool()?,
        })
    }
}

/// A computed payout, and the proof it has been paid once it has.
///
/// A payout holder is created without transaction reference. The reference is set exactly once,
/// when the batch containing the payout is confirmed; a holder with a reference is never paid
/// again.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutHolder {
    pub wallet: WalletId,
    pub address: Address,
    /// In the smallest on-chain unit of the pool asset.
    pub amount: OnChainAmount,
    /// Set when the amount was raised to the campaign's minimum transfer.
    #[serde(default)]
    pub forced_minimum: bool,
    #[serde(default)]
    pub transaction_ref: Option<TransactionRef>,
}

impl PayoutHolder {
    pub fn new(wallet: WalletId, address: Address, amount: OnChainAmount) -> Self {
        Self {
            wallet,
            address,
            amount,
            forced_minimum: false,
            transaction_ref: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.transaction_ref.is_some()
    }

    pub fn transfer(&self, asset: &AssetId) -> Transfer {
        Transfer {
            destination: self.address.clone(),
            amount: self.amount,
            asset: asset.clone(),
        }
    }
}

impl<C> cbor::encode::Encode<C> for PayoutHolder {
    fn encode<W: cbor::encode::Write>(
        &self,
        e: &mut cbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), cbor::encode::Error<W::Error>> {
        e.array(5)?;
        e.encode_with(&self.wallet, ctx)?;
        e.encode_with(&self.address, ctx)?;
        e.u64(self.amount)?;
        e.bool(self.forced_minimum)?;
        e.encode_with(&self.transaction_ref, ctx)?;
        Ok(())
    }
}

impl<'b, C> cbor::decode::Decode<'b, C> for PayoutHolder {
    fn decode(d: &mut cbor::Decoder<'b>, ctx: &mut C) -> Result<Self, cbor::decode::Error> {
        d.array()?;
        Ok(PayoutHolder {
            wallet: d.decode_with(ctx)?,
            address: d.decode_with(ctx)?,
            amount: d.u64()?,
            forced_minimum: d.bool()?,
            transaction_ref: d.decode_with(ctx)?,
        })
    }
}

/// A single output of a distribution transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub destination: Address,
    pub amount: OnChainAmount,
    pub asset: AssetId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payout_holder_cbor_roundtrip() {
        let mut holder = PayoutHolder::new(
            WalletId::from("stake1u9..."),
            Address::from("addr1q9..."),
            42,
        );
        let bytes = cbor::to_vec(&holder).unwrap();
        assert_eq!(cbor::decode::<PayoutHolder>(&bytes).unwrap(), holder);

        holder.transaction_ref = Some(TransactionRef::from("ab".repeat(32)));
        holder.forced_minimum = true;
        let bytes = cbor::to_vec(&holder).unwrap();
        assert_eq!(cbor::decode::<PayoutHolder>(&bytes).unwrap(), holder);
    }

    #[test]
    fn fungible_entry_cbor_roundtrip() {
        let entry = FungibleSnapshotEntry::new(
            WalletId::from("stake1u9..."),
            Decimal::from_ratio(7, 4).unwrap(),
        );
        let bytes = cbor::to_vec(&entry).unwrap();
        assert_eq!(cbor::decode::<FungibleSnapshotEntry>(&bytes).unwrap(), entry);
    }

    #[test]
    fn transfer_of_holder() {
        let holder = PayoutHolder::new(WalletId::from("w"), Address::from("addr"), 7);
        let transfer = holder.transfer(&AssetId::Lovelace);
        assert_eq!(transfer.destination, Address::from("addr"));
        assert_eq!(transfer.amount, 7);
        assert_eq!(transfer.asset, AssetId::Lovelace);
    }
}
