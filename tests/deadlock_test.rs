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

//! Deadlock detection tests using parking_lot's built-in deadlock detector.
//!
//! These tests drive a shared [`GroupLedger`] from many threads at once, mixing
//! writers that record expenses with readers that take snapshots and reports.
//! The ledger's history sits behind a `parking_lot::RwLock`, so the
//! `deadlock_detection` feature sees every acquisition it makes.

use parking_lot::deadlock;
use split_ledger::{
    CustomShare, ExpenseDraft, ExpenseId, GroupLedger, LedgerError, Member, MemberId, Money,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

const MEMBERS: u64 = 6;

fn roster() -> Vec<Member> {
    (1..=MEMBERS)
        .map(|id| Member::new(MemberId(id), format!("member-{id}")))
        .collect()
}

fn everyone() -> Vec<MemberId> {
    (1..=MEMBERS).map(MemberId).collect()
}

struct Detector {
    running: Arc<AtomicBool>,
    found: Arc<AtomicBool>,
    handle: thread::JoinHandle<()>,
}

/// Starts a background thread that checks for deadlocks.
fn start_deadlock_detector() -> Detector {
    let running = Arc::new(AtomicBool::new(true));
    let found = Arc::new(AtomicBool::new(false));
    let (running_clone, found_clone) = (running.clone(), found.clone());

    let handle = thread::spawn(move || {
        while running_clone.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(100));
            let deadlocks = deadlock::check_deadlock();
            if !deadlocks.is_empty() {
                eprintln!("\n=== DEADLOCK DETECTED ===");
                for (i, threads) in deadlocks.iter().enumerate() {
                    eprintln!("\nDeadlock #{}", i + 1);
                    for t in threads {
                        eprintln!("Thread ID: {:?}", t.thread_id());
                        eprintln!("Backtrace:\n{:#?}", t.backtrace());
                    }
                }
                found_clone.store(true, Ordering::SeqCst);
                return;
            }
        }
    });

    Detector {
        running,
        found,
        handle,
    }
}

/// Stops the deadlock detector and fails the test if it saw a cycle.
fn stop_deadlock_detector(detector: Detector) {
    detector.running.store(false, Ordering::SeqCst);
    detector.handle.join().expect("Detector panicked");
    assert!(
        !detector.found.load(Ordering::SeqCst),
        "Deadlock detected! See output above for details."
    );
}

// === Tests ===

/// Many writers recording distinct expenses against one ledger.
#[test]
fn no_deadlock_concurrent_writers() {
    let detector = start_deadlock_detector();
    let ledger = Arc::new(GroupLedger::new(roster()).unwrap());
    let next_id = Arc::new(AtomicU64::new(1));

    const NUM_THREADS: usize = 32;
    const OPS_PER_THREAD: usize = 100;

    let mut handles = Vec::with_capacity(NUM_THREADS);
    for thread_id in 0..NUM_THREADS {
        let ledger = ledger.clone();
        let next_id = next_id.clone();

        handles.push(thread::spawn(move || {
            let payer = MemberId(thread_id as u64 % MEMBERS + 1);
            for _ in 0..OPS_PER_THREAD {
                let id = ExpenseId(next_id.fetch_add(1, Ordering::SeqCst));
                ledger
                    .record(ExpenseDraft::equal(id, payer, Money::from_cents(1001), everyone()))
                    .expect("Distinct IDs are always accepted");
            }
        }));
    }

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    stop_deadlock_detector(detector);

    assert_eq!(ledger.len(), NUM_THREADS * OPS_PER_THREAD);
    let balances = ledger.balances().unwrap();
    assert_eq!(balances.iter().map(|b| b.net).sum::<Money>(), Money::ZERO);
}

/// Readers computing reports while writers keep appending.
#[test]
fn no_deadlock_reports_during_recording() {
    let detector = start_deadlock_detector();
    let ledger = Arc::new(GroupLedger::new(roster()).unwrap());
    let next_id = Arc::new(AtomicU64::new(1));
    let writing = Arc::new(AtomicBool::new(true));

    const WRITERS: usize = 8;
    const READERS: usize = 8;
    const OPS_PER_WRITER: usize = 200;

    let mut writers = Vec::with_capacity(WRITERS);
    for thread_id in 0..WRITERS {
        let ledger = ledger.clone();
        let next_id = next_id.clone();
        writers.push(thread::spawn(move || {
            let payer = MemberId(thread_id as u64 % MEMBERS + 1);
            let other = MemberId((thread_id as u64 + 1) % MEMBERS + 1);
            for i in 0..OPS_PER_WRITER {
                let id = ExpenseId(next_id.fetch_add(1, Ordering::SeqCst));
                let draft = if i % 2 == 0 {
                    ExpenseDraft::equal(id, payer, Money::from_cents(997), everyone())
                } else {
                    ExpenseDraft::custom(
                        id,
                        payer,
                        Money::from_cents(500),
                        [
                            (payer, CustomShare::Amount(Money::from_cents(200))),
                            (other, CustomShare::Amount(Money::from_cents(300))),
                        ],
                    )
                };
                ledger.record(draft).expect("Valid drafts are accepted");
            }
        }));
    }

    let mut readers = Vec::with_capacity(READERS);
    for _ in 0..READERS {
        let ledger = ledger.clone();
        let writing = writing.clone();
        readers.push(thread::spawn(move || {
            let mut reports = 0usize;
            while writing.load(Ordering::SeqCst) {
                let report = ledger.report().expect("Recorded history always aggregates");
                assert_eq!(
                    report.balances.iter().map(|b| b.net).sum::<Money>(),
                    Money::ZERO
                );
                let _ = ledger.expenses();
                reports += 1;
                thread::yield_now();
            }
            reports
        }));
    }

    for handle in writers {
        handle.join().expect("Writer panicked");
    }
    writing.store(false, Ordering::SeqCst);
    for handle in readers {
        handle.join().expect("Reader panicked");
    }

    stop_deadlock_detector(detector);

    assert_eq!(ledger.len(), WRITERS * OPS_PER_WRITER);
}

/// Threads racing on the same expense IDs; exactly one wins each.
#[test]
fn no_deadlock_duplicate_id_races() {
    let detector = start_deadlock_detector();
    let ledger = Arc::new(GroupLedger::new(roster()).unwrap());

    const NUM_THREADS: usize = 16;
    const IDS: u64 = 250;

    let mut handles = Vec::with_capacity(NUM_THREADS);
    for _ in 0..NUM_THREADS {
        let ledger = ledger.clone();
        handles.push(thread::spawn(move || {
            let mut won = 0usize;
            for id in 1..=IDS {
                let draft =
                    ExpenseDraft::equal(ExpenseId(id), MemberId(1), Money::from_cents(600), everyone());
                match ledger.record(draft) {
                    Ok(_) => won += 1,
                    Err(LedgerError::DuplicateExpense(dup)) => assert_eq!(dup, ExpenseId(id)),
                    Err(other) => panic!("Unexpected error: {other}"),
                }
            }
            won
        }));
    }

    let won: usize = handles
        .into_iter()
        .map(|handle| handle.join().expect("Thread panicked"))
        .sum();

    stop_deadlock_detector(detector);

    assert_eq!(won, IDS as usize);
    assert_eq!(ledger.len(), IDS as usize);
}

/// Rejected drafts never leave a lock held behind them.
#[test]
fn no_deadlock_after_rejections() {
    let detector = start_deadlock_detector();
    let ledger = Arc::new(GroupLedger::new(roster()).unwrap());
    let next_id = Arc::new(AtomicU64::new(1));

    const NUM_THREADS: usize = 12;
    const CYCLES_PER_THREAD: usize = 300;

    let mut handles = Vec::with_capacity(NUM_THREADS);
    for _ in 0..NUM_THREADS {
        let ledger = ledger.clone();
        let next_id = next_id.clone();
        handles.push(thread::spawn(move || {
            for i in 0..CYCLES_PER_THREAD {
                let id = ExpenseId(next_id.fetch_add(1, Ordering::SeqCst));
                let result = match i % 3 {
                    // Stranger on the roster check.
                    0 => ledger.record(ExpenseDraft::equal(
                        id,
                        MemberId(99),
                        Money::from_cents(100),
                        everyone(),
                    )),
                    // Split mismatch from the calculator.
                    1 => ledger.record(ExpenseDraft::custom(
                        id,
                        MemberId(1),
                        Money::from_cents(100),
                        [(MemberId(2), CustomShare::Amount(Money::from_cents(50)))],
                    )),
                    _ => ledger.record(ExpenseDraft::equal(
                        id,
                        MemberId(2),
                        Money::from_cents(100),
                        everyone(),
                    )),
                };
                assert_eq!(result.is_ok(), i % 3 == 2);
                let _ = ledger.len();
            }
        }));
    }

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    stop_deadlock_detector(detector);

    assert_eq!(ledger.len(), NUM_THREADS * CYCLES_PER_THREAD / 3);
    assert!(ledger.settlements().is_ok());
}
