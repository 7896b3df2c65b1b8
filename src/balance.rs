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

//! Net balance aggregation.
//!
//! Every roster member starts at zero. Each expense credits its payer with the
//! full amount and debits each share's member by the share amount. Payer and
//! participant are independent roles, so a payer who also participates is
//! both credited and debited.
//!
//! # Example
//!
//! ```
//! use split_ledger::{compute_balances, compute_shares, ExpenseDraft, ExpenseId, Member, MemberId, Money};
//!
//! let members = vec![Member::new(MemberId(1), "Ana"), Member::new(MemberId(2), "Ben")];
//! let draft = ExpenseDraft::equal(ExpenseId(1), MemberId(1), Money::from_cents(2000), [MemberId(1), MemberId(2)]);
//! let shares = compute_shares(draft.id, draft.amount, &draft.policy, &draft.participants).unwrap();
//!
//! let balances = compute_balances(&[draft.to_expense()], &shares, &members).unwrap();
//! assert_eq!(balances[0].net, Money::from_cents(1000));
//! assert_eq!(balances[1].net, Money::from_cents(-1000));
//! ```

use crate::base::{ExpenseId, Member, MemberId};
use crate::error::AggregationError;
use crate::expense::{Expense, Share};
use crate::money::Money;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// A member's net position across all expenses.
///
/// Positive means the member is owed money; negative means they owe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Balance {
    pub member_id: MemberId,
    pub net: Money,
}

/// Which way a balance points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Standing {
    /// Gets money back
    Owed,
    Owes,
    Settled,
}

impl Balance {
    pub fn new(member_id: MemberId, net: Money) -> Self {
        Self { member_id, net }
    }

    pub fn standing(&self) -> Standing {
        if self.net.is_positive() {
            Standing::Owed
        } else if self.net.is_negative() {
            Standing::Owes
        } else {
            Standing::Settled
        }
    }
}

/// Aggregates expense history into one balance per roster member.
#[derive(Debug, Clone, Copy, Default)]
pub struct BalanceAggregator;

impl BalanceAggregator {
    /// Computes balances in roster order with a single pass over expenses and shares.
    ///
    /// # Errors
    ///
    /// - [`AggregationError::UnknownParticipant`] - A payer or share member is not in `members`.
    /// - [`AggregationError::DuplicateMember`] - `members` lists an ID twice.
    /// - [`AggregationError::DuplicateExpense`] - Two expenses share an ID.
    /// - [`AggregationError::UnknownExpense`] - A share references a missing expense.
    /// - [`AggregationError::DuplicateShare`] - A member has two shares in one expense.
    /// - [`AggregationError::ShareSumMismatch`] - An expense's shares miss its amount.
    /// - [`AggregationError::Overflow`] - A running balance leaves the `i64` cent range.
    pub fn compute(
        &self,
        expenses: &[Expense],
        shares: &[Share],
        members: &[Member],
    ) -> Result<Vec<Balance>, AggregationError> {
        let mut positions: HashMap<MemberId, Money> = HashMap::with_capacity(members.len());
        for member in members {
            if positions.insert(member.id, Money::ZERO).is_some() {
                return Err(AggregationError::DuplicateMember(member.id));
            }
        }

        // Amount of each expense not yet covered by its shares.
        let mut undistributed: HashMap<ExpenseId, Money> = HashMap::with_capacity(expenses.len());
        for expense in expenses {
            if undistributed.insert(expense.id, expense.amount).is_some() {
                return Err(AggregationError::DuplicateExpense(expense.id));
            }
            let payer = positions.get_mut(&expense.payer).ok_or(
                AggregationError::UnknownParticipant {
                    expense: expense.id,
                    member: expense.payer,
                },
            )?;
            *payer = payer
                .checked_add(expense.amount)
                .ok_or(AggregationError::Overflow {
                    expense: expense.id,
                })?;
        }

        let mut seen = HashSet::with_capacity(shares.len());
        for share in shares {
            let remaining = undistributed
                .get_mut(&share.expense_id)
                .ok_or(AggregationError::UnknownExpense(share.expense_id))?;
            if !seen.insert((share.expense_id, share.member_id)) {
                return Err(AggregationError::DuplicateShare {
                    expense: share.expense_id,
                    member: share.member_id,
                });
            }
            let position = positions.get_mut(&share.member_id).ok_or(
                AggregationError::UnknownParticipant {
                    expense: share.expense_id,
                    member: share.member_id,
                },
            )?;
            let overflow = AggregationError::Overflow {
                expense: share.expense_id,
            };
            *position = position.checked_sub(share.amount).ok_or(overflow.clone())?;
            *remaining = remaining.checked_sub(share.amount).ok_or(overflow)?;
        }

        for expense in expenses {
            let remaining = undistributed
                .get(&expense.id)
                .copied()
                .unwrap_or_default();
            if !remaining.is_zero() {
                let actual = expense
                    .amount
                    .checked_sub(remaining)
                    .ok_or(AggregationError::Overflow {
                        expense: expense.id,
                    })?;
                return Err(AggregationError::ShareSumMismatch {
                    expense: expense.id,
                    expected: expense.amount,
                    actual,
                });
            }
        }

        let balances: Vec<Balance> = members
            .iter()
            .map(|member| {
                let net = positions.get(&member.id).copied().unwrap_or_default();
                Balance::new(member.id, net)
            })
            .collect();

        debug_assert!(
            balances
                .iter()
                .map(|balance| i128::from(balance.net.cents()))
                .sum::<i128>()
                == 0,
            "Invariant violated: balances do not sum to zero"
        );
        tracing::debug!(
            expenses = expenses.len(),
            shares = shares.len(),
            members = members.len(),
            "aggregated balances"
        );
        Ok(balances)
    }
}

/// Computes net balances for `members`. See [`BalanceAggregator::compute`].
pub fn compute_balances(
    expenses: &[Expense],
    shares: &[Share],
    members: &[Member],
) -> Result<Vec<Balance>, AggregationError> {
    BalanceAggregator.compute(expenses, shares, members)
}
