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

//! Expense model.
//!
//! An [`Expense`] is paid by one member and divided among participants
//! according to a [`SplitPolicy`]. The division is resolved into one
//! [`Share`] per participant by the [`SplitCalculator`](crate::SplitCalculator).

use crate::base::{ExpenseId, MemberId};
use crate::money::{Money, Percentage};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Currency code used when a draft does not name one.
pub const DEFAULT_CURRENCY: &str = "USD";

/// How an expense is divided, as recorded on the expense.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SplitType {
    Equal,
    Custom,
}

/// A recorded expense. Immutable once created.
///
/// `currency` is informational: the engine never converts, and the caller must
/// not mix currencies within one balance computation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expense {
    pub id: ExpenseId,
    pub amount: Money,
    pub currency: String,
    pub description: String,
    pub date: NaiveDate,
    pub payer: MemberId,
    pub split_type: SplitType,
}

/// One participant's declared portion of a custom split.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CustomShare {
    Amount(Money),
    Percentage(Percentage),
}

/// Rule for dividing an expense amount among its participants.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SplitPolicy {
    #[default]
    Equal,
    Custom(BTreeMap<MemberId, CustomShare>),
}

impl SplitPolicy {
    pub fn split_type(&self) -> SplitType {
        match self {
            Self::Equal => SplitType::Equal,
            Self::Custom(_) => SplitType::Custom,
        }
    }
}

/// A participant's resolved portion of one expense.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Share {
    pub expense_id: ExpenseId,
    pub member_id: MemberId,
    pub amount: Money,
    pub percentage: Percentage,
}

/// An expense that has not been split yet.
///
/// The constructors fill in [`DEFAULT_CURRENCY`], an empty description and
/// `NaiveDate::default()` (1970-01-01) as the date. Set them with
/// [`with_currency`](Self::with_currency), [`with_description`](Self::with_description)
/// and [`on`](Self::on).
///
/// # Example
///
/// ```
/// use split_ledger::{ExpenseDraft, ExpenseId, MemberId, Money};
///
/// let draft = ExpenseDraft::equal(
///     ExpenseId(1),
///     MemberId(1),
///     Money::from_cents(9000),
///     [MemberId(1), MemberId(2), MemberId(3)],
/// )
/// .with_description("Dinner");
/// assert_eq!(draft.participants.len(), 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpenseDraft {
    pub id: ExpenseId,
    pub payer: MemberId,
    pub amount: Money,
    pub currency: String,
    pub description: String,
    pub date: NaiveDate,
    pub policy: SplitPolicy,
    pub participants: Vec<MemberId>,
}

impl ExpenseDraft {
    /// Draft split equally among `participants`, in the given order.
    pub fn equal(
        id: ExpenseId,
        payer: MemberId,
        amount: Money,
        participants: impl IntoIterator<Item = MemberId>,
    ) -> Self {
        Self::new(id, payer, amount, SplitPolicy::Equal, participants.into_iter().collect())
    }

    /// Draft with one declared share per participant, in the given order.
    ///
    /// A member repeated in `shares` keeps its last declaration but is listed
    /// twice, which the split calculator rejects.
    pub fn custom(
        id: ExpenseId,
        payer: MemberId,
        amount: Money,
        shares: impl IntoIterator<Item = (MemberId, CustomShare)>,
    ) -> Self {
        let mut participants = Vec::new();
        let mut declared = BTreeMap::new();
        for (member, share) in shares {
            participants.push(member);
            declared.insert(member, share);
        }
        Self::new(id, payer, amount, SplitPolicy::Custom(declared), participants)
    }

    fn new(
        id: ExpenseId,
        payer: MemberId,
        amount: Money,
        policy: SplitPolicy,
        participants: Vec<MemberId>,
    ) -> Self {
        Self {
            id,
            payer,
            amount,
            currency: DEFAULT_CURRENCY.to_string(),
            description: String::new(),
            date: NaiveDate::default(),
            policy,
            participants,
        }
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn on(mut self, date: NaiveDate) -> Self {
        self.date = date;
        self
    }

    /// The expense record this draft produces once its split is accepted.
    pub fn to_expense(&self) -> Expense {
        Expense {
            id: self.id,
            amount: self.amount,
            currency: self.currency.clone(),
            description: self.description.clone(),
            date: self.date,
            payer: self.payer,
            split_type: self.policy.split_type(),
        }
    }
}
