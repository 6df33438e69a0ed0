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

use crate::{cbor, OnChainAmount};
use num::{
    rational::Ratio,
    traits::{One, Pow, ToPrimitive, Zero},
    BigUint,
};
use std::{
    fmt,
    iter::Sum,
    ops::{Add, AddAssign, Mul},
    str::FromStr,
};
use thiserror::Error;

/// An exact, non-negative, rational quantity.
///
/// Every human-facing quantity (token balances adjusted for decimals, collection weights, modifier
/// amounts, scores) is a `Decimal`. Working with exact ratios means that proportional shares never
/// accumulate rounding errors; the only rounding that ever happens is the final floor to on-chain
/// units.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Decimal(Ratio<BigUint>);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidDecimal {
    #[error("empty decimal")]
    Empty,
    #[error("malformed decimal '{0}'")]
    Malformed(String),
    #[error("negative decimal '{0}'")]
    Negative(String),
    #[error("zero denominator in '{0}'")]
    ZeroDenominator(String),
}

impl Decimal {
    pub fn zero() -> Self {
        Decimal(Ratio::zero())
    }

    pub fn one() -> Self {
        Decimal(Ratio::one())
    }

    pub fn from_integer(n: u64) -> Self {
        Decimal(Ratio::from_integer(BigUint::from(n)))
    }

    /// `None` when the denominator is zero.
    pub fn from_ratio(numerator: u64, denominator: u64) -> Option<Self> {
        if denominator == 0 {
            return None;
        }
        Some(Decimal(Ratio::new(
            BigUint::from(numerator),
            BigUint::from(denominator),
        )))
    }

    /// Convert a quantity expressed in the smallest on-chain unit into its human equivalent,
    /// i.e. `quantity / 10^decimals`.
    pub fn from_on_chain(quantity: OnChainAmount, decimals: u8) -> Self {
        Decimal(Ratio::new(
            BigUint::from(quantity),
            scale(decimals),
        ))
    }

    /// Inverse of [`Self::from_on_chain`], flooring any fractional remainder. Saturates at
    /// `u64::MAX`.
    pub fn to_on_chain(&self, decimals: u8) -> OnChainAmount {
        self.scale_up(decimals).floor()
    }

    /// `self × 10^decimals`, exactly.
    pub fn scale_up(&self, decimals: u8) -> Self {
        self * &Decimal(Ratio::from_integer(scale(decimals)))
    }

    /// The integral part, saturating at `u64::MAX`.
    pub fn floor(&self) -> u64 {
        self.0.floor().to_integer().to_u64().unwrap_or(u64::MAX)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_integer(&self) -> bool {
        self.0.is_integer()
    }

    /// `None` when dividing by zero.
    pub fn checked_div(&self, rhs: &Decimal) -> Option<Decimal> {
        if rhs.is_zero() {
            None
        } else {
            Some(Decimal(&self.0 / &rhs.0))
        }
    }

    pub fn numer(&self) -> &BigUint {
        self.0.numer()
    }

    pub fn denom(&self) -> &BigUint {
        self.0.denom()
    }

    /// Render the value as a finite decimal expansion, if it has one.
    fn as_finite_decimal(&self) -> Option<String> {
        let mut denom = self.0.denom().clone();
        let two = BigUint::from(2u8);
        let five = BigUint::from(5u8);
        let (mut twos, mut fives) = (0u32, 0u32);

        while (&denom % &two).is_zero() {
            denom /= &two;
            twos += 1;
        }
        while (&denom % &five).is_zero() {
            denom /= &five;
            fives += 1;
        }
        if !denom.is_one() {
            return None;
        }
        let digits = twos.max(fives);

        let scaled = self.0.numer() * BigUint::from(10u8).pow(digits) / self.0.denom();
        let mut text = scaled.to_string();
        if digits == 0 {
            return Some(text);
        }

        let digits = digits as usize;
        if text.len() <= digits {
            text = format!("{}{text}", "0".repeat(digits + 1 - text.len()));
        }
        let (int, frac) = text.split_at(text.len() - digits);
        Some(format!("{int}.{}", frac.trim_end_matches('0')))
    }
}

fn scale(decimals: u8) -> BigUint {
    BigUint::from(10u8).pow(u32::from(decimals))
}

impl Default for Decimal {
    fn default() -> Self {
        Decimal::zero()
    }
}

impl From<u64> for Decimal {
    fn from(n: u64) -> Self {
        Decimal::from_integer(n)
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_finite_decimal() {
            Some(text) => f.write_str(&text),
            None => write!(f, "{}/{}", self.0.numer(), self.0.denom()),
        }
    }
}

impl FromStr for Decimal {
    type Err = InvalidDecimal;

    /// Accepts plain integers (`42`), decimal notation (`0.125`) and explicit ratios (`1/3`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let malformed = || InvalidDecimal::Malformed(s.to_string());

        if s.is_empty() {
            return Err(InvalidDecimal::Empty);
        }
        if s.starts_with('-') {
            return Err(InvalidDecimal::Negative(s.to_string()));
        }

        let digits = |part: &str| -> Result<BigUint, InvalidDecimal> {
            if part.is_empty() || !part.chars().all(|c| c.is_ascii_digit()) {
                return Err(malformed());
            }
            BigUint::from_str(part).map_err(|_| malformed())
        };

        if let Some((numer, denom)) = s.split_once('/') {
            let denom = digits(denom.trim())?;
            if denom.is_zero() {
                return Err(InvalidDecimal::ZeroDenominator(s.to_string()));
            }
            return Ok(Decimal(Ratio::new(digits(numer.trim())?, denom)));
        }

        let s = s.strip_prefix('+').unwrap_or(s);
        match s.split_once('.') {
            None => Ok(Decimal(Ratio::from_integer(digits(s)?))),
            Some((int, frac)) => {
                let int = if int.is_empty() { "0" } else { int };
                let frac = if frac.is_empty() { "0" } else { frac };
                let numer = digits(&format!("{int}{frac}"))?;
                let denom = BigUint::from(10u8).pow(frac.len() as u32);
                Ok(Decimal(Ratio::new(numer, denom)))
            }
        }
    }
}

// ------------------------------------------------------------------- Arithmetic

impl Add<&Decimal> for &Decimal {
    type Output = Decimal;

    fn add(self, rhs: &Decimal) -> Decimal {
        Decimal(&self.0 + &rhs.0)
    }
}

impl Add for Decimal {
    type Output = Decimal;

    fn add(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 + rhs.0)
    }
}

impl AddAssign<&Decimal> for Decimal {
    fn add_assign(&mut self, rhs: &Decimal) {
        self.0 = &self.0 + &rhs.0;
    }
}

impl AddAssign for Decimal {
    fn add_assign(&mut self, rhs: Decimal) {
        self.0 = &self.0 + rhs.0;
    }
}

impl Mul<&Decimal> for &Decimal {
    type Output = Decimal;

    fn mul(self, rhs: &Decimal) -> Decimal {
        Decimal(&self.0 * &rhs.0)
    }
}

impl Mul for Decimal {
    type Output = Decimal;

    fn mul(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 * rhs.0)
    }
}

impl Mul<u64> for &Decimal {
    type Output = Decimal;

    fn mul(self, rhs: u64) -> Decimal {
        Decimal(&self.0 * Ratio::from_integer(BigUint::from(rhs)))
    }
}

impl Sum for Decimal {
    fn sum<I: Iterator<Item = Decimal>>(iter: I) -> Self {
        iter.fold(Decimal::zero(), |acc, x| acc + x)
    }
}

impl<'a> Sum<&'a Decimal> for Decimal {
    fn sum<I: Iterator<Item = &'a Decimal>>(iter: I) -> Self {
        iter.fold(Decimal::zero(), |mut acc, x| {
            acc += x;
            acc
        })
    }
}

// ------------------------------------------------------------------- Serde

impl serde::Serialize for Decimal {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match (self.is_integer(), self.0.numer().to_u64()) {
            (true, Some(n)) => serializer.serialize_u64(n),
            _ => serializer.collect_str(self),
        }
    }
}

impl<'de> serde::Deserialize<'de> for Decimal {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct DecimalVisitor;

        impl serde::de::Visitor<'_> for DecimalVisitor {
            type Value = Decimal;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a non-negative number, or a string such as '0.25' or '1/3'")
            }

            fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<Decimal, E> {
                Ok(Decimal::from_integer(v))
            }

            fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<Decimal, E> {
                u64::try_from(v)
                    .map(Decimal::from_integer)
                    .map_err(|_| E::custom(InvalidDecimal::Negative(v.to_string())))
            }

            // Floats go through their shortest round-tripping rendering, so that `0.1` in a JSON
            // document means exactly 1/10.
            fn visit_f64<E: serde::de::Error>(self, v: f64) -> Result<Decimal, E> {
                if !v.is_finite() {
                    return Err(E::custom(InvalidDecimal::Malformed(v.to_string())));
                }
                Decimal::from_str(&format!("{v}")).map_err(E::custom)
            }

            fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<Decimal, E> {
                Decimal::from_str(v).map_err(E::custom)
            }
        }

        deserializer.deserialize_any(DecimalVisitor)
    }
}

// ------------------------------------------------------------------- CBOR

impl<C> cbor::encode::Encode<C> for Decimal {
    fn encode<W: cbor::encode::Write>(
        &self,
        e: &mut cbor::Encoder<W>,
        _ctx: &mut C,
    ) -> Result<(), cbor::encode::Error<W::Error>> {
        e.array(2)?;
        e.bytes(&self.0.numer().to_bytes_be())?;
        e.bytes(&self.0.denom().to_bytes_be())?;
        Ok(())
    }
}

impl<'b, C> cbor::decode::Decode<'b, C> for Decimal {
    fn decode(d: &mut cbor::Decoder<'b>, _ctx: &mut C) -> Result<Self, cbor::decode::Error> {
        d.array()?;
        let numer = BigUint::from_bytes_be(d.bytes()?);
        let denom = BigUint::from_bytes_be(d.bytes()?);
        if denom.is_zero() {
            return Err(cbor::decode::Error::message("decimal with a zero denominator"));
        }
        Ok(Decimal(Ratio::new(numer, denom)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    fn any_decimal() -> impl Strategy<Value = Decimal> {
        (0..1_000_000u64, 1..1_000u64)
            .prop_map(|(n, d)| Decimal::from_ratio(n, d).unwrap_or_default())
    }

    #[test_case("42" => Ok(Decimal::from_integer(42)))]
    #[test_case("0.25" => Decimal::from_ratio(1, 4).ok_or(InvalidDecimal::Empty))]
    #[test_case(".5" => Decimal::from_ratio(1, 2).ok_or(InvalidDecimal::Empty))]
    #[test_case("1/3" => Decimal::from_ratio(1, 3).ok_or(InvalidDecimal::Empty))]
    #[test_case("-1" => Err(InvalidDecimal::Negative("-1".to_string())))]
    #[test_case("1/0" => Err(InvalidDecimal::ZeroDenominator("1/0".to_string())))]
    #[test_case("1.2.3" => Err(InvalidDecimal::Malformed("1.2.3".to_string())))]
    #[test_case("" => Err(InvalidDecimal::Empty))]
    fn parse(s: &str) -> Result<Decimal, InvalidDecimal> {
        Decimal::from_str(s)
    }

    #[test_case(Decimal::from_integer(7) => "7")]
    #[test_case(Decimal::from_ratio(1, 8).unwrap() => "0.125")]
    #[test_case(Decimal::from_ratio(5, 2).unwrap() => "2.5")]
    #[test_case(Decimal::from_ratio(1, 3).unwrap() => "1/3")]
    fn display(d: Decimal) -> String {
        d.to_string()
    }

    #[test]
    fn on_chain_conversions() {
        let human = Decimal::from_on_chain(1_500_000, 6);
        assert_eq!(human, Decimal::from_ratio(3, 2).unwrap());
        assert_eq!(human.to_on_chain(6), 1_500_000);
        assert_eq!(Decimal::from_ratio(1, 3).unwrap().to_on_chain(2), 33);
    }

    #[test]
    fn deserialize_json_forms() {
        let values: Vec<Decimal> = serde_json::from_str(r#"[2, 0.1, "1/4", "3.5"]"#).unwrap();
        assert_eq!(
            values,
            vec![
                Decimal::from_integer(2),
                Decimal::from_ratio(1, 10).unwrap(),
                Decimal::from_ratio(1, 4).unwrap(),
                Decimal::from_ratio(7, 2).unwrap(),
            ]
        );
        assert!(serde_json::from_str::<Decimal>("-3").is_err());
    }

    #[test]
    fn checked_div_by_zero() {
        assert_eq!(Decimal::one().checked_div(&Decimal::zero()), None);
    }

    proptest! {
        #[test]
        fn prop_display_parses_back(d in any_decimal()) {
            prop_assert_eq!(Decimal::from_str(&d.to_string()), Ok(d));
        }

        #[test]
        fn prop_cbor_roundtrip(d in any_decimal()) {
            let bytes = cbor::to_vec(&d).unwrap();
            prop_assert_eq!(cbor::decode::<Decimal>(&bytes).unwrap(), d);
        }
    }
}
