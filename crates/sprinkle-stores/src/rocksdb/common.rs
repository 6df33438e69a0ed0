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

use sprinkle_engine::StoreError;
use sprinkle_kernel::cbor;

/// Length of the prefix, here as a constant to keep it consistent across columns.
pub const PREFIX_LEN: usize = 4;

/// Keys of a column are scoped by campaign: the column prefix, followed by the CBOR-encoded
/// campaign id. Since CBOR strings are length-prefixed, no campaign's scope is a prefix of
/// another's.
pub fn scope<T: cbor::Encode<()>>(prefix: &[u8; PREFIX_LEN], campaign: T) -> Vec<u8> {
    as_bytes(prefix, campaign)
}

/// A key within a campaign's scope.
pub fn as_key<T: cbor::Encode<()>>(scope: &[u8], key: T) -> Vec<u8> {
    as_bytes(scope, key)
}

/// A simple helper function to encode any (serialisable) value to CBOR bytes.
pub fn as_value<T: cbor::Encode<()>>(value: T) -> Vec<u8> {
    as_bytes(&[], value)
}

/// Encoding into a vector cannot fail.
#[allow(clippy::panic)]
pub fn as_bytes<T: cbor::Encode<()>>(prefix: &[u8], value: T) -> Vec<u8> {
    let mut buffer = Vec::from(prefix);
    cbor::encode(value, &mut buffer)
        .unwrap_or_else(|e| panic!("unable to encode value to CBOR: {e:?}"));
    buffer
}

pub fn decode<T: for<'d> cbor::Decode<'d, ()>>(key: &[u8], bytes: &[u8]) -> Result<T, StoreError> {
    cbor::decode(bytes).map_err(|e| StoreError::Malformed {
        key: hex::encode(key),
        reason: e.to_string(),
    })
}

pub fn internal(error: impl std::error::Error + Send + Sync + 'static) -> StoreError {
    StoreError::Internal(Box::new(error))
}
