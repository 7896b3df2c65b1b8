// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Monetary amounts and percentages in integer units.
//!
//! [`Money`] counts minor units (cents) and [`Percentage`] counts basis points
//! (hundredths of a percent). All engine arithmetic happens on these integers;
//! [`Decimal`] appears only when values cross the library boundary.
//!
//! # Example
//!
//! ```
//! use rust_decimal_macros::dec;
//! use split_ledger::{Money, Percentage};
//!
//! let amount = Money::from_decimal(dec!(12.50)).unwrap();
//! assert_eq!(amount.cents(), 1250);
//! assert_eq!(amount.to_string(), "12.50");
//!
//! let half = Percentage::of(Money::from_cents(625), amount);
//! assert_eq!(half.to_string(), "50.00");
//! ```

use crate::error::MoneyError;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::de::{self, Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use std::str::FromStr;

/// A signed amount of money in minor units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(i64);

impl Money {
    /// Decimal places of one minor unit.
    pub const SCALE: u32 = 2;
    pub const ZERO: Money = Money(0);
    pub const CENT: Money = Money(1);

    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    pub const fn cents(self) -> i64 {
        self.0
    }

    /// Converts a decimal amount, rejecting anything finer than a cent.
    ///
    /// # Errors
    ///
    /// - [`MoneyError::TooPrecise`] - The value has more than two decimal places.
    /// - [`MoneyError::OutOfRange`] - The value does not fit in `i64` cents.
    pub fn from_decimal(value: Decimal) -> Result<Self, MoneyError> {
        to_units(value, Self::SCALE).map(Self)
    }

    pub fn to_decimal(self) -> Decimal {
        Decimal::new(self.0, Self::SCALE)
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub const fn abs(self) -> Self {
        Self(self.0.abs())
    }

    /// Returns `percentage` of this amount, rounded half away from zero to the cent.
    pub fn percent(self, percentage: Percentage) -> Self {
        let units = div_round(
            i128::from(self.0) * i128::from(percentage.0),
            i128::from(Percentage::WHOLE.0),
        );
        Self(saturate(units))
    }

    /// `self + rhs`, or `None` if the result leaves the `i64` cent range.
    pub fn checked_add(self, rhs: Money) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }

    /// `self - rhs`, or `None` if the result leaves the `i64` cent range.
    pub fn checked_sub(self, rhs: Money) -> Option<Self> {
        self.0.checked_sub(rhs.0).map(Self)
    }

    /// Magnitude, or `None` for the one amount whose magnitude does not fit.
    pub fn checked_abs(self) -> Option<Self> {
        self.0.checked_abs().map(Self)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_decimal())
    }
}

impl FromStr for Money {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = Decimal::from_str(s.trim()).map_err(|_| MoneyError::Malformed(s.to_string()))?;
        Self::from_decimal(value)
    }
}

impl TryFrom<Decimal> for Money {
    type Error = MoneyError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::from_decimal(value)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Money) {
        self.0 -= rhs.0;
    }
}

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Money {
        Money(-self.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

impl Serialize for Money {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        Serialize::serialize(&self.to_decimal(), serializer)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = <Decimal as Deserialize>::deserialize(deserializer)?;
        Money::from_decimal(value).map_err(de::Error::custom)
    }
}

/// A percentage in basis points; [`Percentage::WHOLE`] is 100%.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Percentage(i64);

impl Percentage {
    /// Decimal places of one basis point when written as a percent.
    pub const SCALE: u32 = 2;
    pub const ZERO: Percentage = Percentage(0);
    pub const WHOLE: Percentage = Percentage(10_000);

    pub const fn from_basis_points(points: i64) -> Self {
        Self(points)
    }

    pub const fn basis_points(self) -> i64 {
        self.0
    }

    /// Converts a percent value such as `33.33`, rejecting finer precision.
    ///
    /// # Errors
    ///
    /// Same as [`Money::from_decimal`].
    pub fn from_decimal(value: Decimal) -> Result<Self, MoneyError> {
        to_units(value, Self::SCALE).map(Self)
    }

    pub fn to_decimal(self) -> Decimal {
        Decimal::new(self.0, Self::SCALE)
    }

    /// The share `part` represents of `total`, rounded half away from zero.
    ///
    /// A zero `total` yields [`Percentage::ZERO`].
    pub fn of(part: Money, total: Money) -> Self {
        if total.is_zero() {
            return Self::ZERO;
        }
        let points = div_round(
            i128::from(part.0) * i128::from(Self::WHOLE.0),
            i128::from(total.0),
        );
        Self(saturate(points))
    }

    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub const fn abs(self) -> Self {
        Self(self.0.abs())
    }

    pub fn checked_add(self, rhs: Percentage) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_decimal())
    }
}

impl FromStr for Percentage {
    type Err = MoneyError;

    /// Parses `25`, `25.5` or `25.5%`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed.strip_suffix('%').unwrap_or(trimmed).trim_end();
        let value =
            Decimal::from_str(digits).map_err(|_| MoneyError::Malformed(s.to_string()))?;
        Self::from_decimal(value)
    }
}

impl Add for Percentage {
    type Output = Percentage;

    fn add(self, rhs: Percentage) -> Percentage {
        Percentage(self.0 + rhs.0)
    }
}

impl AddAssign for Percentage {
    fn add_assign(&mut self, rhs: Percentage) {
        self.0 += rhs.0;
    }
}

impl Sub for Percentage {
    type Output = Percentage;

    fn sub(self, rhs: Percentage) -> Percentage {
        Percentage(self.0 - rhs.0)
    }
}

impl Sum for Percentage {
    fn sum<I: Iterator<Item = Percentage>>(iter: I) -> Self {
        iter.fold(Percentage::ZERO, Add::add)
    }
}

impl Serialize for Percentage {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        Serialize::serialize(&self.to_decimal(), serializer)
    }
}

impl<'de> Deserialize<'de> for Percentage {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = <Decimal as Deserialize>::deserialize(deserializer)?;
        Percentage::from_decimal(value).map_err(de::Error::custom)
    }
}

fn to_units(value: Decimal, scale: u32) -> Result<i64, MoneyError> {
    let factor = Decimal::from(10_i64.pow(scale));
    let units = value
        .checked_mul(factor)
        .ok_or(MoneyError::OutOfRange(value))?;
    if !units.fract().is_zero() {
        return Err(MoneyError::TooPrecise(value));
    }
    units.to_i64().ok_or(MoneyError::OutOfRange(value))
}

/// Integer division rounding half away from zero.
pub(crate) fn div_round(numerator: i128, denominator: i128) -> i128 {
    let quotient = numerator / denominator;
    let remainder = numerator % denominator;
    if 2 * remainder.abs() >= denominator.abs() {
        quotient + numerator.signum() * denominator.signum()
    } else {
        quotient
    }
}

pub(crate) fn saturate(value: i128) -> i64 {
    i64::try_from(value).unwrap_or(if value < 0 { i64::MIN } else { i64::MAX })
}
