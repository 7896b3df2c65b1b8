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

//! Group ledger public API integration tests.

use rust_decimal_macros::dec;
use split_ledger::{
    AggregationError, CustomShare, ExpenseDraft, ExpenseId, GroupLedger, LedgerError, Member,
    MemberId, Money, Percentage, SplitError, SplitType, Transfer, compute_balances,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

// === Helper Functions ===

const A: MemberId = MemberId(1);
const B: MemberId = MemberId(2);
const C: MemberId = MemberId(3);

fn money(value: rust_decimal::Decimal) -> Money {
    Money::from_decimal(value).unwrap()
}

fn ledger() -> GroupLedger {
    GroupLedger::new([
        Member::new(A, "A"),
        Member::new(B, "B"),
        Member::new(C, "C"),
    ])
    .unwrap()
}

fn nets(ledger: &GroupLedger) -> Vec<Money> {
    ledger
        .balances()
        .unwrap()
        .iter()
        .map(|balance| balance.net)
        .collect()
}

// === Recording ===

#[test]
fn record_stores_expense_and_shares() {
    let ledger = ledger();
    let recorded = ledger
        .record(
            ExpenseDraft::equal(ExpenseId(1), A, money(dec!(90)), [A, B, C])
                .with_description("Dinner")
                .with_currency("EUR"),
        )
        .unwrap();

    assert_eq!(recorded.expense.split_type, SplitType::Equal);
    assert_eq!(recorded.expense.currency, "EUR");
    assert_eq!(recorded.shares.len(), 3);
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger.expenses()[0], recorded);
}

#[test]
fn scenario_balances_and_settlements() {
    let ledger = ledger();
    ledger
        .record(ExpenseDraft::equal(ExpenseId(1), A, money(dec!(90)), [A, B, C]))
        .unwrap();
    assert_eq!(
        nets(&ledger),
        vec![money(dec!(60)), money(dec!(-30)), money(dec!(-30))]
    );

    ledger
        .record(ExpenseDraft::equal(ExpenseId(2), B, money(dec!(30)), [A, B, C]))
        .unwrap();
    assert_eq!(
        nets(&ledger),
        vec![money(dec!(50)), money(dec!(-10)), money(dec!(-40))]
    );

    let report = ledger.report().unwrap();
    assert_eq!(
        report.transfers,
        vec![
            Transfer {
                from: C,
                to: A,
                amount: money(dec!(40)),
            },
            Transfer {
                from: B,
                to: A,
                amount: money(dec!(10)),
            },
        ]
    );
    assert_eq!(ledger.settlements().unwrap(), report.transfers);
}

#[test]
fn custom_split_through_ledger() {
    let ledger = ledger();
    ledger
        .record(ExpenseDraft::custom(
            ExpenseId(1),
            C,
            money(dec!(60)),
            [
                (A, CustomShare::Percentage(Percentage::from_decimal(dec!(50)).unwrap())),
                (B, CustomShare::Amount(money(dec!(30)))),
            ],
        ))
        .unwrap();
    assert_eq!(
        nets(&ledger),
        vec![money(dec!(-30)), money(dec!(-30)), money(dec!(60))]
    );
}

#[test]
fn duplicate_expense_id_is_rejected() {
    let ledger = ledger();
    ledger
        .record(ExpenseDraft::equal(ExpenseId(1), A, money(dec!(10)), [A, B]))
        .unwrap();
    let result = ledger.record(ExpenseDraft::equal(ExpenseId(1), B, money(dec!(20)), [A, B]));

    assert_eq!(result, Err(LedgerError::DuplicateExpense(ExpenseId(1))));
    assert_eq!(ledger.len(), 1);
    assert_eq!(nets(&ledger), vec![money(dec!(5)), money(dec!(-5)), Money::ZERO]);
}

#[test]
fn mismatched_custom_split_is_rejected() {
    let ledger = ledger();
    let result = ledger.record(ExpenseDraft::custom(
        ExpenseId(1),
        A,
        money(dec!(100)),
        [
            (A, CustomShare::Amount(money(dec!(50)))),
            (B, CustomShare::Amount(money(dec!(45)))),
        ],
    ));
    assert!(matches!(
        result,
        Err(LedgerError::Split(SplitError::SplitMismatch { .. }))
    ));
    assert!(ledger.is_empty());
}

#[test]
fn participant_outside_group_is_rejected() {
    let ledger = ledger();
    let result = ledger.record(ExpenseDraft::equal(
        ExpenseId(1),
        A,
        money(dec!(10)),
        [A, MemberId(42)],
    ));
    assert_eq!(result, Err(LedgerError::UnknownParticipant(MemberId(42))));
}

// === Recomputation ===

#[test]
fn single_member_group_is_always_settled() {
    let ledger = GroupLedger::new([Member::new(A, "Solo")]).unwrap();
    for id in 1..=5 {
        ledger
            .record(ExpenseDraft::equal(ExpenseId(id), A, money(dec!(12.34)), [A]))
            .unwrap();
    }
    assert_eq!(nets(&ledger), vec![Money::ZERO]);
    assert!(ledger.settlements().unwrap().is_empty());
}

#[test]
fn ledger_matches_from_scratch_computation() {
    let ledger = ledger();
    ledger
        .record(ExpenseDraft::equal(ExpenseId(1), A, money(dec!(100)), [A, B, C]))
        .unwrap();
    ledger
        .record(ExpenseDraft::equal(ExpenseId(2), C, money(dec!(7.01)), [B, C]))
        .unwrap();

    let snapshot = ledger.expenses();
    let expenses: Vec<_> = snapshot.iter().map(|r| r.expense.clone()).collect();
    let shares: Vec<_> = snapshot.iter().flat_map(|r| r.shares.clone()).collect();
    let fresh = compute_balances(&expenses, &shares, ledger.members()).unwrap();

    assert_eq!(ledger.balances().unwrap(), fresh);
    assert_eq!(ledger.balances().unwrap(), ledger.balances().unwrap());
}

// === Concurrency ===

#[test]
fn concurrent_writers_are_serialized() {
    let ledger = Arc::new(ledger());
    let next_id = Arc::new(AtomicU64::new(1));

    const NUM_THREADS: usize = 8;
    const EXPENSES_PER_THREAD: usize = 50;

    let handles: Vec<_> = (0..NUM_THREADS)
        .map(|thread_index| {
            let ledger = Arc::clone(&ledger);
            let next_id = Arc::clone(&next_id);
            thread::spawn(move || {
                let payer = [A, B, C][thread_index % 3];
                for _ in 0..EXPENSES_PER_THREAD {
                    let id = ExpenseId(next_id.fetch_add(1, Ordering::SeqCst));
                    ledger
                        .record(ExpenseDraft::equal(id, payer, money(dec!(10.01)), [A, B, C]))
                        .unwrap();
                    let _ = ledger.report().unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    assert_eq!(ledger.len(), NUM_THREADS * EXPENSES_PER_THREAD);
    let total: Money = ledger.balances().unwrap().iter().map(|b| b.net).sum();
    assert_eq!(total, Money::ZERO);
}

#[test]
fn racing_duplicate_ids_record_once() {
    let ledger = Arc::new(ledger());

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let ledger = Arc::clone(&ledger);
            thread::spawn(move || {
                ledger
                    .record(ExpenseDraft::equal(ExpenseId(7), A, money(dec!(3)), [A, B, C]))
                    .is_ok()
            })
        })
        .collect();

    let successes = handles
        .into_iter()
        .map(|handle| handle.join().expect("Thread panicked"))
        .filter(|&ok| ok)
        .count();

    assert_eq!(successes, 1);
    assert_eq!(ledger.len(), 1);
}

// === Overflow ===

#[test]
fn balance_overflow_is_an_error() {
    let ledger = ledger();
    let huge = Money::from_cents(i64::MAX);
    ledger
        .record(ExpenseDraft::equal(ExpenseId(1), A, huge, [B]))
        .unwrap();
    ledger
        .record(ExpenseDraft::equal(ExpenseId(2), A, huge, [B]))
        .unwrap();

    assert_eq!(
        ledger.balances(),
        Err(LedgerError::Aggregation(AggregationError::Overflow {
            expense: ExpenseId(2)
        }))
    );
    assert!(ledger.report().is_err());
}
