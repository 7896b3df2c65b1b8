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

//! Split calculation.
//!
//! Turns an expense amount, a [`SplitPolicy`] and the chosen participants into
//! one [`Share`] per participant. Accepted shares always sum to the expense
//! amount exactly.
//!
//! # Remainder rule
//!
//! An equal split gives every participant `floor(cents / n)` and hands the
//! `cents mod n` leftover cents out one each to the *last* participants in the
//! given order. Basis points of percentage are spread the same way, so
//! percentages sum to exactly 100%.
//!
//! Custom percentages are converted with cumulative rounding: each share is the
//! rounded running total minus the previous rounded running total. Percentages
//! that add up to exactly 100% therefore always cover the amount to the cent.
//!
//! ```
//! use split_ledger::{compute_shares, ExpenseId, MemberId, Money, SplitPolicy};
//!
//! let members = [MemberId(1), MemberId(2), MemberId(3)];
//! let shares = compute_shares(ExpenseId(1), Money::from_cents(10_000), &SplitPolicy::Equal, &members)
//!     .unwrap();
//! let amounts: Vec<i64> = shares.iter().map(|s| s.amount.cents()).collect();
//! assert_eq!(amounts, vec![3333, 3333, 3334]);
//! ```

use crate::base::{ExpenseId, MemberId};
use crate::error::SplitError;
use crate::expense::{CustomShare, Share, SplitPolicy};
use crate::money::{Money, Percentage, div_round, saturate};
use std::collections::{BTreeMap, HashSet};

/// How far a custom split may stray from the expense before it is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitTolerance {
    pub amount: Money,
    pub percentage: Percentage,
}

impl Default for SplitTolerance {
    /// One cent and 0.1%.
    fn default() -> Self {
        Self {
            amount: Money::CENT,
            percentage: Percentage::from_basis_points(10),
        }
    }
}

/// Resolves split declarations into shares.
#[derive(Debug, Clone, Copy, Default)]
pub struct SplitCalculator {
    tolerance: SplitTolerance,
}

impl SplitCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tolerance(tolerance: SplitTolerance) -> Self {
        Self { tolerance }
    }

    pub fn tolerance(&self) -> SplitTolerance {
        self.tolerance
    }

    /// Computes one share per participant, in participant order.
    ///
    /// # Errors
    ///
    /// - [`SplitError::InvalidAmount`] - `amount` is not positive.
    /// - [`SplitError::NoParticipants`] - `participants` is empty.
    /// - [`SplitError::DuplicateParticipant`] - A member is listed twice.
    /// - [`SplitError::MissingCustomShare`] / [`SplitError::UnexpectedCustomShare`] -
    ///   Custom declarations and participants disagree.
    /// - [`SplitError::NegativeShare`] - A custom declaration is below zero.
    /// - [`SplitError::SplitMismatch`] - Custom declarations do not reconcile.
    /// - [`SplitError::Overflow`] - Declared percentages add up past the `i64` range.
    pub fn compute(
        &self,
        expense_id: ExpenseId,
        amount: Money,
        policy: &SplitPolicy,
        participants: &[MemberId],
    ) -> Result<Vec<Share>, SplitError> {
        if !amount.is_positive() {
            return Err(SplitError::InvalidAmount);
        }
        if participants.is_empty() {
            return Err(SplitError::NoParticipants);
        }

        let mut listed = HashSet::with_capacity(participants.len());
        for &member in participants {
            if !listed.insert(member) {
                return Err(SplitError::DuplicateParticipant(member));
            }
        }

        let shares = match policy {
            SplitPolicy::Equal => equal_split(expense_id, amount, participants),
            SplitPolicy::Custom(declared) => {
                if let Some(&stray) = declared.keys().find(|member| !listed.contains(member)) {
                    return Err(SplitError::UnexpectedCustomShare(stray));
                }
                self.custom_split(expense_id, amount, declared, participants)?
            }
        };

        debug_assert_eq!(
            shares.iter().map(|share| share.amount).sum::<Money>(),
            amount,
            "Invariant violated: shares of expense {expense_id} do not sum to its amount"
        );
        tracing::debug!(
            expense = %expense_id,
            split = ?policy.split_type(),
            participants = shares.len(),
            %amount,
            "computed shares"
        );
        Ok(shares)
    }

    fn custom_split(
        &self,
        expense_id: ExpenseId,
        amount: Money,
        declared: &BTreeMap<MemberId, CustomShare>,
        participants: &[MemberId],
    ) -> Result<Vec<Share>, SplitError> {
        let mut shares = Vec::with_capacity(participants.len());
        // Declared percentages and declared amounts, kept apart so the
        // percentage check can use the exact ratio of each declared amount.
        let mut declared_points: i128 = 0;
        let mut declared_cents: i128 = 0;
        let mut amount_declared = Vec::new();
        // Running percentage total, so rounded amounts telescope instead of drifting.
        let mut cumulative = Percentage::ZERO;

        for (index, &member) in participants.iter().enumerate() {
            let declaration = declared
                .get(&member)
                .ok_or(SplitError::MissingCustomShare(member))?;
            let (share_amount, percentage) = match *declaration {
                CustomShare::Amount(share_amount) => {
                    if share_amount.is_negative() {
                        return Err(SplitError::NegativeShare(member));
                    }
                    declared_cents += i128::from(share_amount.cents());
                    amount_declared.push(index);
                    (share_amount, Percentage::of(share_amount, amount))
                }
                CustomShare::Percentage(percentage) => {
                    if percentage.is_negative() {
                        return Err(SplitError::NegativeShare(member));
                    }
                    declared_points += i128::from(percentage.basis_points());
                    let before = amount.percent(cumulative);
                    cumulative = cumulative
                        .checked_add(percentage)
                        .ok_or(SplitError::Overflow)?;
                    (amount.percent(cumulative) - before, percentage)
                }
            };
            shares.push(Share {
                expense_id,
                member_id: member,
                amount: share_amount,
                percentage,
            });
        }

        // Declared amounts may sum past i64 before the split is rejected.
        let total = i128::from(amount.cents());
        let resolved: i128 = shares
            .iter()
            .map(|share| i128::from(share.amount.cents()))
            .sum();
        let residual = total - resolved;

        // Total percentage scaled by the amount: points * amount + cents * 100%.
        let whole = i128::from(Percentage::WHOLE.basis_points());
        let scaled_points = declared_points * total + declared_cents * whole;
        let deviation = (scaled_points - whole * total).abs();
        let points_within = deviation <= i128::from(self.tolerance.percentage.basis_points()) * total;
        let total_points = Percentage::from_basis_points(
            i64::try_from(div_round(scaled_points, total)).unwrap_or(i64::MAX),
        );

        if residual.abs() > i128::from(self.tolerance.amount.cents()) || !points_within {
            return Err(SplitError::SplitMismatch {
                declared_amount: Money::from_cents(saturate(resolved)),
                expected_amount: amount,
                declared_percentage: total_points,
            });
        }

        // Within tolerance, so every share and the residual fit in i64.
        absorb_residual(&mut shares, Money::from_cents(saturate(residual)));

        // Rounded percentages of declared amounts can drift from the exact total.
        let stored: Percentage = shares.iter().map(|share| share.percentage).sum();
        absorb_drift(&mut shares, &amount_declared, total_points - stored);

        Ok(shares)
    }
}

/// Computes shares with the default [`SplitTolerance`].
///
/// See [`SplitCalculator::compute`].
pub fn compute_shares(
    expense_id: ExpenseId,
    amount: Money,
    policy: &SplitPolicy,
    participants: &[MemberId],
) -> Result<Vec<Share>, SplitError> {
    SplitCalculator::default().compute(expense_id, amount, policy, participants)
}

fn equal_split(expense_id: ExpenseId, amount: Money, participants: &[MemberId]) -> Vec<Share> {
    let count = participants.len();
    participants
        .iter()
        .zip(spread(amount.cents(), count))
        .zip(spread(Percentage::WHOLE.basis_points(), count))
        .map(|((&member_id, cents), points)| Share {
            expense_id,
            member_id,
            amount: Money::from_cents(cents),
            percentage: Percentage::from_basis_points(points),
        })
        .collect()
}

/// Splits a positive `total` into `count` parts, leftover units going to the last parts.
fn spread(total: i64, count: usize) -> impl Iterator<Item = i64> {
    let divisor = count as i64;
    let base = total / divisor;
    let leftover = (total % divisor) as usize;
    let first_bumped = count - leftover;
    (0..count).map(move |index| if index >= first_bumped { base + 1 } else { base })
}

/// Folds an accepted rounding residual into the shares, last participant first,
/// never driving a share below zero.
fn absorb_residual(shares: &mut [Share], residual: Money) {
    let mut remaining = residual;
    for share in shares.iter_mut().rev() {
        if remaining.is_zero() {
            break;
        }
        let taken = if remaining.is_negative() {
            -share.amount.min(remaining.abs())
        } else {
            remaining
        };
        share.amount += taken;
        remaining -= taken;
    }
}

/// Folds percentage drift into the amount-declared shares, last one first,
/// never driving a percentage below zero.
fn absorb_drift(shares: &mut [Share], amount_declared: &[usize], drift: Percentage) {
    let mut remaining = drift;
    for &index in amount_declared.iter().rev() {
        if remaining == Percentage::ZERO {
            break;
        }
        let share = &mut shares[index];
        let taken = if remaining.is_negative() {
            Percentage::ZERO - share.percentage.min(remaining.abs())
        } else {
            remaining
        };
        share.percentage += taken;
        remaining = remaining - taken;
    }
}
