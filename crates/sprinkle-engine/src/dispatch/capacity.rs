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

use sprinkle_kernel::Decimal;
use std::fmt;

/// Size figures reported by a submitter rejecting a batch for being too large, e.g.
/// `"Maximum transaction size of 16384 exceeded. Found: 21861"`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Capacity {
    pub maximum: u64,
    pub attempted: u64,
}

impl Capacity {
    /// The first two integers found in the message: the maximum, then the attempted size.
    pub fn parse(message: &str) -> Option<Self> {
        let mut integers = message
            .split(|c: char| !c.is_ascii_digit())
            .filter(|s| !s.is_empty())
            .map(str::parse::<u64>);

        let maximum = integers.next()?.ok()?;
        let attempted = integers.next()?.ok()?;

        Some(Capacity { maximum, attempted })
    }

    /// `maximum / attempted`, when it allows shrinking, i.e. strictly below 1.
    pub fn shrink_ratio(&self) -> Option<Decimal> {
        if self.maximum >= self.attempted {
            return None;
        }
        Decimal::from_ratio(self.maximum, self.attempted)
    }
}

impl fmt::Display for Capacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.maximum, self.attempted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("Maximum transaction size of 16384 exceeded. Found: 21861" => Some((16384, 21861)); "node message")]
    #[test_case("too big (max=100, got=250, extra=3)" => Some((100, 250)); "extra integers ignored")]
    #[test_case("max 100" => None; "single integer")]
    #[test_case("transaction too large" => None; "no integer")]
    #[test_case("max 99999999999999999999999 got 1" => None; "overflow")]
    fn parse_capacity(message: &str) -> Option<(u64, u64)> {
        Capacity::parse(message).map(|c| (c.maximum, c.attempted))
    }

    #[test]
    fn only_shrinking_ratios() {
        let capacity = Capacity {
            maximum: 16384,
            attempted: 21861,
        };
        assert_eq!(capacity.shrink_ratio(), Decimal::from_ratio(16384, 21861));

        let capacity = Capacity {
            maximum: 100,
            attempted: 100,
        };
        assert_eq!(capacity.shrink_ratio(), None);
    }
}
