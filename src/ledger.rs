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

//! Group expense ledger.
//!
//! The [`GroupLedger`] keeps the append-only expense history of one group and
//! answers balance and settlement queries by running the full pipeline over
//! that history. Nothing is updated incrementally: every query recomputes from
//! scratch, so results always match a fresh computation over the same history.
//!
//! # Thread Safety
//!
//! The history sits behind a single [`RwLock`]. Recording takes the write lock,
//! so writers are serialized; queries clone the history under the read lock and
//! compute outside it.

use crate::balance::{Balance, compute_balances};
use crate::base::{ExpenseId, Member, MemberId};
use crate::error::{AggregationError, LedgerError};
use crate::expense::{Expense, ExpenseDraft, Share};
use crate::settlement::{Transfer, compute_settlements};
use crate::split::SplitCalculator;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;

/// An expense together with its resolved shares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedExpense {
    pub expense: Expense,
    pub shares: Vec<Share>,
}

/// Balances and the settlement plan computed from one snapshot of history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub balances: Vec<Balance>,
    pub transfers: Vec<Transfer>,
}

#[derive(Debug, Default)]
struct History {
    /// Recorded expense IDs for duplicate detection.
    ids: HashSet<ExpenseId>,
    /// Expenses in insertion order.
    entries: Vec<Arc<RecordedExpense>>,
}

/// Expense history for one fixed roster.
///
/// # Invariants
///
/// - Expense IDs are unique within the ledger.
/// - Every recorded payer and participant is on the roster.
/// - Every recorded expense's shares sum to its amount.
#[derive(Debug)]
pub struct GroupLedger {
    members: Vec<Member>,
    roster: HashSet<MemberId>,
    calculator: SplitCalculator,
    history: RwLock<History>,
}

impl GroupLedger {
    /// Creates an empty ledger for `members`, kept in the given order.
    ///
    /// # Errors
    ///
    /// [`AggregationError::DuplicateMember`] if a member ID repeats.
    pub fn new(members: impl IntoIterator<Item = Member>) -> Result<Self, LedgerError> {
        let members: Vec<Member> = members.into_iter().collect();
        let mut roster = HashSet::with_capacity(members.len());
        for member in &members {
            if !roster.insert(member.id) {
                return Err(AggregationError::DuplicateMember(member.id).into());
            }
        }
        Ok(Self {
            members,
            roster,
            calculator: SplitCalculator::default(),
            history: RwLock::new(History::default()),
        })
    }

    /// Uses `calculator` for every expense recorded from now on.
    pub fn with_calculator(mut self, calculator: SplitCalculator) -> Self {
        self.calculator = calculator;
        self
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn member(&self, id: MemberId) -> Option<&Member> {
        self.members.iter().find(|member| member.id == id)
    }

    /// Splits `draft` and appends it to the history.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::UnknownParticipant`] - Payer or a participant is not on the roster.
    /// - [`LedgerError::Split`] - The split calculator rejected the draft.
    /// - [`LedgerError::DuplicateExpense`] - The expense ID is already recorded.
    pub fn record(&self, draft: ExpenseDraft) -> Result<Arc<RecordedExpense>, LedgerError> {
        if let Some(&stranger) = std::iter::once(&draft.payer)
            .chain(&draft.participants)
            .find(|member| !self.roster.contains(*member))
        {
            return Err(LedgerError::UnknownParticipant(stranger));
        }

        let shares =
            self.calculator
                .compute(draft.id, draft.amount, &draft.policy, &draft.participants)?;
        let recorded = Arc::new(RecordedExpense {
            expense: draft.to_expense(),
            shares,
        });

        let mut history = self.history.write();
        if !history.ids.insert(draft.id) {
            return Err(LedgerError::DuplicateExpense(draft.id));
        }
        history.entries.push(Arc::clone(&recorded));
        tracing::debug!(
            expense = %draft.id,
            recorded = history.entries.len(),
            "recorded expense"
        );
        Ok(recorded)
    }

    /// Snapshot of the history in insertion order.
    pub fn expenses(&self) -> Vec<Arc<RecordedExpense>> {
        self.history.read().entries.clone()
    }

    pub fn len(&self) -> usize {
        self.history.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Net balance of every member, in roster order.
    pub fn balances(&self) -> Result<Vec<Balance>, LedgerError> {
        balances_of(&self.expenses(), &self.members)
    }

    /// Settlement plan for the current history.
    pub fn settlements(&self) -> Result<Vec<Transfer>, LedgerError> {
        Ok(self.report()?.transfers)
    }

    /// Balances and settlement plan from the same snapshot.
    pub fn report(&self) -> Result<Report, LedgerError> {
        let balances = balances_of(&self.expenses(), &self.members)?;
        let transfers = compute_settlements(&balances)?;
        Ok(Report {
            balances,
            transfers,
        })
    }
}

fn balances_of(
    snapshot: &[Arc<RecordedExpense>],
    members: &[Member],
) -> Result<Vec<Balance>, LedgerError> {
    let expenses: Vec<Expense> = snapshot
        .iter()
        .map(|recorded| recorded.expense.clone())
        .collect();
    let shares: Vec<Share> = snapshot
        .iter()
        .flat_map(|recorded| recorded.shares.iter().copied())
        .collect();
    Ok(compute_balances(&expenses, &shares, members)?)
}
