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

//! Settlement planning.
//!
//! Converts net balances into point-to-point transfers that zero every balance,
//! using a greedy largest-debtor / largest-creditor match:
//!
//! 1. Members owing money are debtors, members owed money are creditors;
//!    zero balances are already settled and left out.
//! 2. Both queues are ordered by magnitude, largest first. Equal magnitudes are
//!    ordered by ascending [`MemberId`] so plans are reproducible.
//! 3. The head debtor pays the head creditor `min(debt, credit)`, and whichever
//!    side reaches zero leaves its queue.
//!
//! Every round settles at least one party, so the loop ends after at most
//! `debtors + creditors - 1` transfers.
//!
//! This is a heuristic. It does not always find the smallest possible number of
//! transfers; doing that is a subset-sum partitioning problem and is not
//! attempted here.
//!
//! # Example
//!
//! ```
//! use split_ledger::{compute_settlements, Balance, MemberId, Money, Transfer};
//!
//! let balances = [
//!     Balance::new(MemberId(1), Money::from_cents(5000)),
//!     Balance::new(MemberId(2), Money::from_cents(-1000)),
//!     Balance::new(MemberId(3), Money::from_cents(-4000)),
//! ];
//! let plan = compute_settlements(&balances).unwrap();
//! assert_eq!(
//!     plan,
//!     vec![
//!         Transfer { from: MemberId(3), to: MemberId(1), amount: Money::from_cents(4000) },
//!         Transfer { from: MemberId(2), to: MemberId(1), amount: Money::from_cents(1000) },
//!     ]
//! );
//! ```

use crate::balance::Balance;
use crate::base::MemberId;
use crate::error::PlanningError;
use crate::money::{Money, saturate};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

/// A proposed payment from a debtor to a creditor. `amount` is always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Transfer {
    pub from: MemberId,
    pub to: MemberId,
    pub amount: Money,
}

/// Plans transfers from balances.
#[derive(Debug, Clone, Copy, Default)]
pub struct SettlementPlanner;

impl SettlementPlanner {
    /// Produces transfers in the order the greedy match generates them.
    ///
    /// # Errors
    ///
    /// - [`PlanningError::UnbalancedInput`] - Balances do not sum to zero.
    /// - [`PlanningError::DuplicateMember`] - A member has two balances.
    /// - [`PlanningError::Overflow`] - A debt of `i64::MIN` cents has no positive magnitude.
    pub fn plan(&self, balances: &[Balance]) -> Result<Vec<Transfer>, PlanningError> {
        let mut members = HashSet::with_capacity(balances.len());
        for balance in balances {
            if !members.insert(balance.member_id) {
                return Err(PlanningError::DuplicateMember(balance.member_id));
            }
        }

        let residual: i128 = balances
            .iter()
            .map(|balance| i128::from(balance.net.cents()))
            .sum();
        if residual != 0 {
            return Err(PlanningError::UnbalancedInput {
                residual: Money::from_cents(saturate(residual)),
            });
        }

        // Both queues hold positive magnitudes.
        let mut debts = Vec::new();
        for balance in balances.iter().filter(|balance| balance.net.is_negative()) {
            let magnitude = balance
                .net
                .checked_abs()
                .ok_or(PlanningError::Overflow(balance.member_id))?;
            debts.push((balance.member_id, magnitude));
        }
        let mut debtors = ranked(debts.into_iter());
        let mut creditors = ranked(
            balances
                .iter()
                .filter(|balance| balance.net.is_positive())
                .map(|balance| (balance.member_id, balance.net)),
        );
        let parties = debtors.len() + creditors.len();
        let mut transfers = Vec::with_capacity(parties.saturating_sub(1));

        while let (Some(debtor), Some(creditor)) = (debtors.front_mut(), creditors.front_mut()) {
            let amount = debtor.1.min(creditor.1);
            transfers.push(Transfer {
                from: debtor.0,
                to: creditor.0,
                amount,
            });
            debtor.1 -= amount;
            creditor.1 -= amount;

            let debtor_settled = debtor.1.is_zero();
            let creditor_settled = creditor.1.is_zero();
            if debtor_settled {
                debtors.pop_front();
            }
            if creditor_settled {
                creditors.pop_front();
            }
        }

        debug_assert!(
            debtors.is_empty() && creditors.is_empty(),
            "Invariant violated: zero-sum balances left unmatched parties"
        );
        tracing::debug!(parties, transfers = transfers.len(), "planned settlements");
        Ok(transfers)
    }
}

/// Orders parties by magnitude, largest first, then by member ID.
fn ranked(parties: impl Iterator<Item = (MemberId, Money)>) -> VecDeque<(MemberId, Money)> {
    let mut parties: Vec<_> = parties.collect();
    parties.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    parties.into()
}

/// Plans settlements for `balances`. See [`SettlementPlanner::plan`].
pub fn compute_settlements(balances: &[Balance]) -> Result<Vec<Transfer>, PlanningError> {
    SettlementPlanner.plan(balances)
}

/// Returns `balances` as they stand once every transfer has been paid.
///
/// Paying reduces the debtor's debt and the creditor's credit by the amount.
///
/// # Errors
///
/// - [`PlanningError::UnknownMember`] - A transfer names a member without a balance.
/// - [`PlanningError::InvalidTransfer`] - A transfer is not positive or pays its own sender.
/// - [`PlanningError::DuplicateMember`] - A member has two balances.
/// - [`PlanningError::Overflow`] - A transfer pushes a balance out of the `i64` cent range.
pub fn apply_transfers(
    balances: &[Balance],
    transfers: &[Transfer],
) -> Result<Vec<Balance>, PlanningError> {
    let mut settled = balances.to_vec();
    let mut index = HashMap::with_capacity(settled.len());
    for (position, balance) in settled.iter().enumerate() {
        if index.insert(balance.member_id, position).is_some() {
            return Err(PlanningError::DuplicateMember(balance.member_id));
        }
    }

    for transfer in transfers {
        if !transfer.amount.is_positive() || transfer.from == transfer.to {
            return Err(PlanningError::InvalidTransfer {
                from: transfer.from,
                to: transfer.to,
            });
        }
        let from = *index
            .get(&transfer.from)
            .ok_or(PlanningError::UnknownMember(transfer.from))?;
        let to = *index
            .get(&transfer.to)
            .ok_or(PlanningError::UnknownMember(transfer.to))?;
        settled[from].net = settled[from]
            .net
            .checked_add(transfer.amount)
            .ok_or(PlanningError::Overflow(transfer.from))?;
        settled[to].net = settled[to]
            .net
            .checked_sub(transfer.amount)
            .ok_or(PlanningError::Overflow(transfer.to))?;
    }

    Ok(settled)
}
