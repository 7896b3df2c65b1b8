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

//! # Split Ledger
//!
//! This library computes who owes whom in a group that shares expenses. Each
//! expense is paid by one member and divided among some participants; the
//! engine resolves the division, nets everything into one balance per member,
//! and proposes transfers that settle every balance.
//!
//! ## Core Components
//!
//! - [`SplitCalculator`]: Resolves an equal or custom split into per-participant [`Share`]s
//! - [`BalanceAggregator`]: Nets expenses and shares into one [`Balance`] per member
//! - [`SettlementPlanner`]: Greedily matches debtors with creditors into [`Transfer`]s
//! - [`GroupLedger`]: Append-only expense history that recomputes the pipeline on demand
//!
//! All amounts are [`Money`] in integer minor units, so the balances of a group
//! always sum to exactly zero.
//!
//! ## Example
//!
//! ```
//! use split_ledger::{ExpenseDraft, ExpenseId, GroupLedger, Member, MemberId, Money, Transfer};
//!
//! let (a, b, c) = (MemberId(1), MemberId(2), MemberId(3));
//! let ledger = GroupLedger::new([
//!     Member::new(a, "Ana"),
//!     Member::new(b, "Ben"),
//!     Member::new(c, "Cleo"),
//! ])
//! .unwrap();
//!
//! ledger
//!     .record(ExpenseDraft::equal(ExpenseId(1), a, Money::from_cents(9000), [a, b, c]))
//!     .unwrap();
//! ledger
//!     .record(ExpenseDraft::equal(ExpenseId(2), b, Money::from_cents(3000), [a, b, c]))
//!     .unwrap();
//!
//! let nets: Vec<i64> = ledger.balances().unwrap().iter().map(|b| b.net.cents()).collect();
//! assert_eq!(nets, vec![5000, -1000, -4000]);
//!
//! assert_eq!(
//!     ledger.settlements().unwrap(),
//!     vec![
//!         Transfer { from: c, to: a, amount: Money::from_cents(4000) },
//!         Transfer { from: b, to: a, amount: Money::from_cents(1000) },
//!     ]
//! );
//! ```
//!
//! ## Purity
//!
//! [`compute_shares`], [`compute_balances`] and [`compute_settlements`] are pure
//! functions of their inputs. [`GroupLedger`] is the only stateful piece, and it
//! only stores history.

mod balance;
mod base;
pub mod error;
mod expense;
mod ledger;
pub mod money;
mod settlement;
mod split;

pub use balance::{Balance, BalanceAggregator, Standing, compute_balances};
pub use base::{ExpenseId, Member, MemberId};
pub use error::{AggregationError, LedgerError, MoneyError, PlanningError, SplitError};
pub use expense::{CustomShare, DEFAULT_CURRENCY, Expense, ExpenseDraft, Share, SplitPolicy, SplitType};
pub use ledger::{GroupLedger, RecordedExpense, Report};
pub use money::{Money, Percentage};
pub use settlement::{SettlementPlanner, Transfer, apply_transfers, compute_settlements};
pub use split::{SplitCalculator, SplitTolerance, compute_shares};
