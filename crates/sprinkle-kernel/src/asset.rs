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

use crate::{cbor, CollectionId, LOVELACE_DECIMALS};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The asset being distributed from the pool.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AssetId {
    /// The native currency, in Lovelace.
    #[default]
    Lovelace,
    /// A native token identified by its policy and its hex-encoded asset name.
    Native { policy: CollectionId, name: String },
}

impl AssetId {
    /// The concatenation of the policy id and the asset name, as most indexers name assets.
    pub fn unit(&self) -> String {
        match self {
            AssetId::Lovelace => "lovelace".to_string(),
            AssetId::Native { policy, name } => format!("{policy}{name}"),
        }
    }

    /// Decimals of the native currency, if this is the native currency.
    pub fn native_decimals(&self) -> Option<u8> {
        match self {
            AssetId::Lovelace => Some(LOVELACE_DECIMALS),
            AssetId::Native { .. } => None,
        }
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetId::Lovelace => f.write_str("lovelace"),
            AssetId::Native { policy, name } => {
                // Asset names are arbitrary bytes; most of them are readable though.
                match hex::decode(name)
                    .ok()
                    .and_then(|bytes| String::from_utf8(bytes).ok())
                {
                    Some(readable) if !readable.is_empty() => write!(f, "{policy}.{readable}"),
                    _ => write!(f, "{policy}.{name}"),
                }
            }
        }
    }
}

impl<C> cbor::encode::Encode<C> for AssetId {
    fn encode<W: cbor::encode::Write>(
        &self,
        e: &mut cbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), cbor::encode::Error<W::Error>> {
        match self {
            AssetId::Lovelace => {
                e.array(1)?;
                e.u8(0)?;
            }
            AssetId::Native { policy, name } => {
                e.array(3)?;
                e.u8(1)?;
                e.encode_with(policy, ctx)?;
                e.str(name)?;
            }
        }
        Ok(())
    }
}

impl<'b, C> cbor::decode::Decode<'b, C> for AssetId {
    fn decode(d: &mut cbor::Decoder<'b>, ctx: &mut C) -> Result<Self, cbor::decode::Error> {
        d.array()?;
        match d.u8()? {
            0 => Ok(AssetId::Lovelace),
            1 => Ok(AssetId::Native {
                policy: d.decode_with(ctx)?,
                name: d.str()?.to_string(),
            }),
            t => Err(cbor::decode::Error::message(format!(
                "unknown asset id tag: {t}"
            ))),
        }
    }
}
