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

//! Error types for split calculation, balance aggregation, and settlement planning.
//!
//! Every failure here is a validation failure on malformed input. Nothing is
//! retryable, and nothing is corrected behind the caller's back.

use crate::base::{ExpenseId, MemberId};
use crate::money::{Money, Percentage};
use rust_decimal::Decimal;
use thiserror::Error;

/// Failures converting boundary decimals into integer units.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MoneyError {
    /// Value is finer than one minor unit
    #[error("{0} has more than two decimal places")]
    TooPrecise(Decimal),

    /// Value does not fit in the integer representation
    #[error("{0} is out of range")]
    OutOfRange(Decimal),

    /// Text is not a decimal number
    #[error("malformed amount: {0:?}")]
    Malformed(String),
}

/// Split calculation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SplitError {
    /// Expense amount is zero or negative
    #[error("invalid amount (must be positive)")]
    InvalidAmount,

    /// Participant list is empty
    #[error("expense has no participants")]
    NoParticipants,

    /// Custom declarations do not add up to the expense
    #[error(
        "custom split does not reconcile: shares total {declared_amount} of {expected_amount}, percentages total {declared_percentage}%"
    )]
    SplitMismatch {
        declared_amount: Money,
        expected_amount: Money,
        declared_percentage: Percentage,
    },

    /// Same member listed more than once
    #[error("member {0} is listed more than once")]
    DuplicateParticipant(MemberId),

    /// Custom split lacks an entry for a participant
    #[error("no custom share declared for member {0}")]
    MissingCustomShare(MemberId),

    /// Custom split has an entry for a non-participant
    #[error("custom share declared for non-participant {0}")]
    UnexpectedCustomShare(MemberId),

    /// Custom amount or percentage below zero
    #[error("negative custom share for member {0}")]
    NegativeShare(MemberId),

    /// Declared percentages run past the representable range
    #[error("custom percentages overflow")]
    Overflow,
}

/// Balance aggregation errors. All of them indicate inconsistent history data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AggregationError {
    /// Share or payer references a member outside the roster
    #[error("expense {expense} references unknown member {member}")]
    UnknownParticipant { expense: ExpenseId, member: MemberId },

    /// Roster lists a member twice
    #[error("member {0} appears twice in the roster")]
    DuplicateMember(MemberId),

    /// Two expenses share an ID
    #[error("duplicate expense ID {0}")]
    DuplicateExpense(ExpenseId),

    /// Share references an expense that was not supplied
    #[error("share references unknown expense {0}")]
    UnknownExpense(ExpenseId),

    /// More than one share for one (expense, member) pair
    #[error("member {member} has more than one share in expense {expense}")]
    DuplicateShare { expense: ExpenseId, member: MemberId },

    /// Shares of an expense do not add up to its amount
    #[error("shares of expense {expense} total {actual}, expected {expected}")]
    ShareSumMismatch {
        expense: ExpenseId,
        expected: Money,
        actual: Money,
    },

    /// A running balance left the representable range
    #[error("balance overflow while applying expense {expense}")]
    Overflow { expense: ExpenseId },
}

/// Settlement planning errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanningError {
    /// Balances do not sum to zero
    #[error("balances do not sum to zero (residual {residual})")]
    UnbalancedInput { residual: Money },

    /// Two balances for one member
    #[error("member {0} has more than one balance")]
    DuplicateMember(MemberId),

    /// Transfer references a member without a balance
    #[error("transfer references unknown member {0}")]
    UnknownMember(MemberId),

    /// Transfer amount is zero or negative, or a member pays themself
    #[error("invalid transfer from {from} to {to}")]
    InvalidTransfer { from: MemberId, to: MemberId },

    /// A balance, or a balance after a transfer, does not fit in `i64` cents
    #[error("balance of member {0} overflows")]
    Overflow(MemberId),
}

/// Errors raised by a [`GroupLedger`](crate::GroupLedger).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error(transparent)]
    Split(#[from] SplitError),

    #[error(transparent)]
    Aggregation(#[from] AggregationError),

    #[error(transparent)]
    Planning(#[from] PlanningError),

    /// Expense ID already recorded
    #[error("duplicate expense ID {0}")]
    DuplicateExpense(ExpenseId),

    /// Payer or participant is not a member of the group
    #[error("member {0} is not in this group")]
    UnknownParticipant(MemberId),
}
