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

use chrono::NaiveDate;
use clap::{Parser, ValueEnum};
use csv::{ReaderBuilder, Trim, Writer};
use serde::{Deserialize, Serialize};
use split_ledger::{
    Balance, CustomShare, ExpenseDraft, ExpenseId, GroupLedger, LedgerError, Member, MemberId,
    Money, MoneyError, Percentage, SplitError, Standing, Transfer,
};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Split Ledger - Settle shared expenses from CSV files
///
/// Reads a group roster and its expenses, then writes net balances and a
/// settlement plan to stdout.
#[derive(Parser, Debug)]
#[command(name = "split-ledger")]
#[command(about = "Computes balances and settlement plans for shared expenses", long_about = None)]
struct Args {
    /// Path to CSV file with expenses, one row per participant
    ///
    /// Expected format: expense,payer,amount,currency,date,description,participant,share
    /// Example: split-ledger --members members.csv expenses.csv > plan.csv
    #[arg(value_name = "FILE")]
    expenses: PathBuf,

    /// Path to CSV file with group members (id,name)
    #[arg(short, long, value_name = "FILE")]
    members: PathBuf,

    /// Which report to write
    #[arg(short, long, value_enum, default_value_t = ReportKind::All)]
    report: ReportKind,

    /// Abort on the first malformed row or rejected expense instead of skipping it
    #[arg(long, env = "SPLIT_LEDGER_STRICT")]
    strict: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ReportKind {
    Balances,
    Settlements,
    All,
}

/// Failures of the command-line driver.
#[derive(Error, Debug)]
enum CliError {
    #[error("cannot open '{}': {}", .path.display(), .source)]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("expense {expense}: {source}")]
    Ledger {
        expense: ExpenseId,
        source: LedgerError,
    },

    #[error(transparent)]
    Group(LedgerError),

    #[error("expense {expense}: {reason}")]
    Row { expense: ExpenseId, reason: String },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), CliError> {
    let members = read_members(open(&args.members)?, args.strict)?;
    let ledger = GroupLedger::new(members).map_err(CliError::Group)?;

    let recorded = process_expenses(&ledger, open(&args.expenses)?, args.strict)?;
    tracing::info!(recorded, members = ledger.members().len(), "loaded expense history");

    let report = ledger.report().map_err(CliError::Group)?;
    let mut stdout = std::io::stdout().lock();
    if args.report != ReportKind::Settlements {
        write_balances(&ledger, &report.balances, &mut stdout)?;
    }
    if args.report == ReportKind::All {
        writeln!(stdout)?;
    }
    if args.report != ReportKind::Balances {
        write_settlements(&ledger, &report.transfers, &mut stdout)?;
    }
    Ok(())
}

fn open(path: &Path) -> Result<BufReader<File>, CliError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| CliError::Open {
            path: path.to_path_buf(),
            source,
        })
}

/// Raw roster record: `id, name`.
#[derive(Debug, Deserialize)]
struct MemberRecord {
    id: u64,
    name: String,
}

/// Reads the group roster.
///
/// Malformed rows are logged and skipped unless `strict` is set.
fn read_members<R: Read>(reader: R, strict: bool) -> Result<Vec<Member>, CliError> {
    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .has_headers(true)
        .from_reader(reader);

    let mut members = Vec::new();
    for result in rdr.deserialize::<MemberRecord>() {
        match result {
            Ok(record) => members.push(Member::new(MemberId(record.id), record.name)),
            Err(e) if strict => return Err(e.into()),
            Err(e) => tracing::warn!("skipping malformed member row: {}", e),
        }
    }
    Ok(members)
}

/// Raw expense record, one per participant.
///
/// Fields: `expense, payer, amount, currency, date, description, participant, share`
#[derive(Debug, Deserialize)]
struct ExpenseRecord {
    expense: u64,
    payer: u64,
    amount: Money,
    currency: String,
    date: NaiveDate,
    #[serde(default)]
    description: String,
    participant: u64,
    #[serde(default)]
    share: Option<String>,
}

/// Rows of one expense collected so far.
#[derive(Debug)]
struct PendingExpense {
    id: ExpenseId,
    payer: MemberId,
    amount: Money,
    currency: String,
    date: NaiveDate,
    description: String,
    participants: Vec<(MemberId, Option<CustomShare>)>,
}

impl PendingExpense {
    fn from_record(record: &ExpenseRecord) -> Self {
        Self {
            id: ExpenseId(record.expense),
            payer: MemberId(record.payer),
            amount: record.amount,
            currency: record.currency.clone(),
            date: record.date,
            description: record.description.clone(),
            participants: Vec::new(),
        }
    }

    fn matches(&self, record: &ExpenseRecord) -> bool {
        self.payer == MemberId(record.payer)
            && self.amount == record.amount
            && self.currency == record.currency
            && self.date == record.date
    }

    /// An expense is custom when any participant declares a share.
    fn into_draft(self) -> Result<ExpenseDraft, LedgerError> {
        let draft = if self.participants.iter().all(|(_, share)| share.is_none()) {
            ExpenseDraft::equal(
                self.id,
                self.payer,
                self.amount,
                self.participants.iter().map(|&(member, _)| member),
            )
        } else {
            let mut declared = Vec::with_capacity(self.participants.len());
            for (member, share) in self.participants {
                let share = share.ok_or(SplitError::MissingCustomShare(member))?;
                declared.push((member, share));
            }
            ExpenseDraft::custom(self.id, self.payer, self.amount, declared)
        };
        Ok(draft
            .with_currency(self.currency)
            .with_description(self.description)
            .on(self.date))
    }
}

/// Parses `12.50` as an amount or `25%` as a percentage.
fn parse_share(raw: &str) -> Result<CustomShare, MoneyError> {
    if raw.trim_end().ends_with('%') {
        raw.parse::<Percentage>().map(CustomShare::Percentage)
    } else {
        raw.parse::<Money>().map(CustomShare::Amount)
    }
}

/// Reads expense rows and records every expense into `ledger`.
///
/// Rows sharing an `expense` ID form one expense, in order of first appearance.
/// A malformed or conflicting row rejects its whole expense, so no expense is
/// ever recorded with participants missing. Rejected expenses and rows without
/// a readable expense ID are logged and skipped unless `strict` is set.
/// Returns the number of recorded expenses.
///
/// # Example
///
/// ```csv
/// expense,payer,amount,currency,date,description,participant,share
/// 1,1,90.00,USD,2024-05-01,Dinner,1,
/// 1,1,90.00,USD,2024-05-01,Dinner,2,
/// 2,2,30.00,USD,2024-05-02,Taxi,1,20.00
/// 2,2,30.00,USD,2024-05-02,Taxi,2,10.00
/// ```
fn process_expenses<R: Read>(
    ledger: &GroupLedger,
    reader: R,
    strict: bool,
) -> Result<usize, CliError> {
    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);
    let headers = rdr.headers()?.clone();
    let expense_column = headers.iter().position(|name| name == "expense");

    let mut pending: Vec<PendingExpense> = Vec::new();
    let mut index: HashMap<ExpenseId, usize> = HashMap::new();
    let mut rejected: HashSet<ExpenseId> = HashSet::new();

    for result in rdr.records() {
        let row = match result {
            Ok(row) => row,
            Err(e) if strict => return Err(e.into()),
            Err(e) => {
                tracing::warn!("skipping unreadable expense row: {}", e);
                continue;
            }
        };

        let record = match row.deserialize::<ExpenseRecord>(Some(&headers)) {
            Ok(record) => record,
            Err(e) if strict => return Err(e.into()),
            Err(e) => {
                let id = expense_column
                    .and_then(|column| row.get(column))
                    .and_then(|raw| raw.parse::<u64>().ok())
                    .map(ExpenseId);
                match id {
                    Some(id) => {
                        tracing::warn!("rejecting expense {}: malformed row: {}", id, e);
                        rejected.insert(id);
                    }
                    None => tracing::warn!("skipping malformed expense row: {}", e),
                }
                continue;
            }
        };

        let id = ExpenseId(record.expense);
        if let Err(error) = collect_row(&mut pending, &mut index, record) {
            if strict {
                return Err(error);
            }
            tracing::warn!("rejecting {}", error);
            rejected.insert(id);
        }
    }

    let mut recorded = 0;
    for expense in pending {
        let id = expense.id;
        if rejected.contains(&id) {
            tracing::warn!("skipping expense {}: some of its rows were rejected", id);
            continue;
        }
        match expense.into_draft().and_then(|draft| ledger.record(draft)) {
            Ok(_) => recorded += 1,
            Err(source) if strict => return Err(CliError::Ledger { expense: id, source }),
            Err(source) => tracing::warn!("skipping expense {}: {}", id, source),
        }
    }
    Ok(recorded)
}

/// Adds one row to the pending expense it belongs to.
fn collect_row(
    pending: &mut Vec<PendingExpense>,
    index: &mut HashMap<ExpenseId, usize>,
    record: ExpenseRecord,
) -> Result<(), CliError> {
    let id = ExpenseId(record.expense);
    let share = record
        .share
        .as_deref()
        .map(parse_share)
        .transpose()
        .map_err(|e| CliError::Row {
            expense: id,
            reason: e.to_string(),
        })?;

    let slot = *index.entry(id).or_insert_with(|| {
        pending.push(PendingExpense::from_record(&record));
        pending.len() - 1
    });
    let expense = &mut pending[slot];
    if !expense.matches(&record) {
        return Err(CliError::Row {
            expense: id,
            reason: "payer, amount, currency or date differs from the first row".to_string(),
        });
    }
    expense
        .participants
        .push((MemberId(record.participant), share));
    Ok(())
}

#[derive(Debug, Serialize)]
struct BalanceRow<'a> {
    member: MemberId,
    name: &'a str,
    balance: Money,
    standing: Standing,
}

#[derive(Debug, Serialize)]
struct TransferRow<'a> {
    from: MemberId,
    from_name: &'a str,
    to: MemberId,
    to_name: &'a str,
    amount: Money,
}

fn name_of(ledger: &GroupLedger, id: MemberId) -> &str {
    ledger
        .member(id)
        .map(|member| member.name.as_str())
        .unwrap_or_default()
}

/// Writes balances as CSV.
///
/// Columns: `member, name, balance, standing`
fn write_balances<W: Write>(
    ledger: &GroupLedger,
    balances: &[Balance],
    writer: W,
) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);
    for balance in balances {
        wtr.serialize(BalanceRow {
            member: balance.member_id,
            name: name_of(ledger, balance.member_id),
            balance: balance.net,
            standing: balance.standing(),
        })?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes the settlement plan as CSV.
///
/// Columns: `from, from_name, to, to_name, amount`
fn write_settlements<W: Write>(
    ledger: &GroupLedger,
    transfers: &[Transfer],
    writer: W,
) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);
    for transfer in transfers {
        wtr.serialize(TransferRow {
            from: transfer.from,
            from_name: name_of(ledger, transfer.from),
            to: transfer.to,
            to_name: name_of(ledger, transfer.to),
            amount: transfer.amount,
        })?;
    }
    wtr.flush()?;
    Ok(())
}
