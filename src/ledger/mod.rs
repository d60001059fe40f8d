//! Transaction ledger and balance reconciliation.
//!
//! The backend reports a `balance` inside every player-state payload, but that
//! figure has been seen to disagree with the account's actual transaction
//! history. The balance shown to the player is therefore always recomputed
//! here from the most recently fetched ledger.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

/// Initial account balance the backend opens every player with.
///
/// Not reported by any endpoint; if the backend changes its opening balance
/// this constant (or `LIFESIM_STARTING_BALANCE`) must follow.
pub const DEFAULT_STARTING_BALANCE: i64 = 5000;

/// Direction of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Deposit => "deposit",
            TransactionKind::Withdrawal => "withdrawal",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        if raw.eq_ignore_ascii_case("deposit") {
            Some(TransactionKind::Deposit)
        } else if raw.eq_ignore_ascii_case("withdrawal") {
            Some(TransactionKind::Withdrawal)
        } else {
            None
        }
    }
}

/// One entry of `transaction_history` as delivered by the backend.
///
/// Fields are decoded leniently so a single bad entry never fails the whole
/// history response; [`compute_balance`] decides whether the entry counts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    #[serde(rename = "transaction_date", default, deserialize_with = "de_string_opt")]
    pub date: Option<String>,
    #[serde(rename = "type", default, deserialize_with = "de_string_opt")]
    pub kind: Option<String>,
    #[serde(
        default,
        deserialize_with = "de_decimal_opt",
        serialize_with = "rust_decimal::serde::float_option::serialize"
    )]
    pub amount: Option<Decimal>,
    #[serde(
        default,
        deserialize_with = "de_string_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<String>,
}

impl TransactionRecord {
    pub fn new(date: &str, kind: TransactionKind, amount: Decimal, description: &str) -> Self {
        Self {
            date: Some(date.to_string()),
            kind: Some(kind.as_str().to_string()),
            amount: Some(amount),
            description: Some(description.to_string()),
        }
    }

    pub fn deposit(date: &str, amount: Decimal, description: &str) -> Self {
        Self::new(date, TransactionKind::Deposit, amount, description)
    }

    pub fn withdrawal(date: &str, amount: Decimal, description: &str) -> Self {
        Self::new(date, TransactionKind::Withdrawal, amount, description)
    }

    /// Validated view of the record, or the reason it cannot be applied.
    pub fn classify(&self) -> Result<(TransactionKind, Decimal), MalformedReason> {
        let raw_kind = self.kind.as_deref().ok_or(MalformedReason::MissingType)?;
        let kind = TransactionKind::parse(raw_kind)
            .ok_or_else(|| MalformedReason::UnknownType(raw_kind.to_string()))?;
        let amount = self.amount.ok_or(MalformedReason::MissingAmount)?;
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(MalformedReason::NegativeAmount(amount));
        }
        Ok((kind, amount))
    }

    /// Signed effect on the balance: positive for deposits, negative for withdrawals.
    pub fn signed_amount(&self) -> Result<Decimal, MalformedReason> {
        let (kind, amount) = self.classify()?;
        Ok(match kind {
            TransactionKind::Deposit => amount,
            TransactionKind::Withdrawal => -amount,
        })
    }
}

fn de_string_opt<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(deserializer)?;
    Ok(match v {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    })
}

/// Accepts JSON numbers and numeric strings; anything else decodes as `None`.
pub(crate) fn de_decimal_opt<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(deserializer)?;
    Ok(match v {
        Value::Number(n) => parse_decimal(&n.to_string()),
        Value::String(s) => parse_decimal(s.trim()),
        _ => None,
    })
}

fn parse_decimal(raw: &str) -> Option<Decimal> {
    if raw.is_empty() {
        return None;
    }
    // serde_json prints large or tiny floats in exponent form
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .ok()
}

/// Ordered transaction history for one session.
///
/// Replaced wholesale on every fetch and never reordered: the backend's order
/// is the display order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Ledger {
    records: Vec<TransactionRecord>,
}

impl<'de> Deserialize<'de> for Ledger {
    /// Entries that are not records at all (`null`, numbers, strings) keep
    /// their slot as an empty record so the index in warnings still matches.
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Vec::<Value>::deserialize(deserializer)?;
        let records = raw
            .into_iter()
            .map(|v| TransactionRecord::deserialize(v).unwrap_or_default())
            .collect();
        Ok(Self { records })
    }
}

impl Ledger {
    pub fn new(records: Vec<TransactionRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[TransactionRecord] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &TransactionRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl From<Vec<TransactionRecord>> for Ledger {
    fn from(records: Vec<TransactionRecord>) -> Self {
        Self::new(records)
    }
}

/// Ledger-derived account balance, kept at full precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Balance(Decimal);

impl Balance {
    pub fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }

    /// Whole currency units for display. Halves round away from zero.
    pub fn display_units(&self) -> Decimal {
        self.0
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_currency(self.display_units()))
    }
}

/// `$1,234` style rendering of a whole-unit amount. Fractions are printed as-is.
pub fn format_currency(amount: Decimal) -> String {
    let negative = amount.is_sign_negative() && !amount.is_zero();
    let text = amount.abs().normalize().to_string();
    let (int_part, frac_part) = match text.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (text.as_str(), None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.push('$');
    out.push_str(&grouped);
    if let Some(frac) = frac_part {
        out.push('.');
        out.push_str(frac);
    }
    out
}

/// Why a ledger record was left out of the balance.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedReason {
    #[error("missing transaction type")]
    MissingType,
    #[error("unrecognized transaction type {0:?}")]
    UnknownType(String),
    #[error("missing or non-numeric amount")]
    MissingAmount,
    #[error("negative amount {0}")]
    NegativeAmount(Decimal),
    #[error("amount {0} overflows the running balance")]
    Overflow(Decimal),
}

/// Non-fatal data-quality finding for a single ledger record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("ledger record #{index} skipped: {reason}")]
pub struct MalformedRecordWarning {
    pub index: usize,
    pub reason: MalformedReason,
}

/// Result of reconciling a ledger against the starting balance.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub balance: Balance,
    pub applied: usize,
    pub warnings: Vec<MalformedRecordWarning>,
}

impl Reconciliation {
    pub fn skipped(&self) -> usize {
        self.warnings.len()
    }
}

/// Recompute the balance as `starting + Σ deposits − Σ withdrawals`.
///
/// Malformed records are skipped and reported; they never abort the
/// computation. No rounding happens here.
pub fn compute_balance(ledger: &Ledger, starting_balance: Decimal) -> Reconciliation {
    let mut total = starting_balance;
    let mut applied = 0usize;
    let mut warnings = Vec::new();

    for (index, record) in ledger.iter().enumerate() {
        let applied_total = record.signed_amount().and_then(|delta| {
            total
                .checked_add(delta)
                .ok_or(MalformedReason::Overflow(delta))
        });
        match applied_total {
            Ok(next) => {
                total = next;
                applied += 1;
            }
            Err(reason) => {
                warn!(
                    index,
                    date = record.date.as_deref().unwrap_or("-"),
                    reason = %reason,
                    "skipping malformed ledger record"
                );
                warnings.push(MalformedRecordWarning { index, reason });
            }
        }
    }

    Reconciliation {
        balance: Balance::new(total),
        applied,
        warnings,
    }
}
