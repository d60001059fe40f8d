//! Plain-text rendering of game state.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::Value;
use std::fmt::Write as _;

use crate::choice::{Choice, ImpactAction};
use crate::ledger::{format_currency, Balance, Ledger, TransactionKind};
use crate::models::{FinalSummary, PlayerState, Scenario};
use crate::reconciler::{BalanceSink, BalanceUpdate};

/// Writes balance updates to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalSink;

impl BalanceSink for TerminalSink {
    fn show_balance(&self, update: &BalanceUpdate) {
        println!("{}", balance_line(update));
    }
}

pub fn balance_line(update: &BalanceUpdate) -> String {
    let mut line = format!("Balance: {}", update.balance);
    if update.skipped > 0 {
        let _ = write!(
            line,
            "  ({} unreadable transaction{} ignored)",
            update.skipped,
            if update.skipped == 1 { "" } else { "s" }
        );
    }
    line
}

/// ISO dates become `Jan 01, 2026`; anything else is shown verbatim.
pub fn display_date(raw: &str) -> String {
    match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        Ok(d) => d.format("%b %d, %Y").to_string(),
        Err(_) => raw.to_string(),
    }
}

/// Status header. The ledger-derived balance is authoritative; the server's
/// figure is only mentioned when it disagrees.
pub fn player_summary(player: &PlayerState, ledger_balance: Option<Balance>) -> String {
    let mut out = String::new();
    if let Some(name) = &player.name {
        let _ = writeln!(out, "{name}");
    }
    let _ = write!(out, "Age: {}", player.age);
    if let Some(date) = &player.current_date {
        let _ = write!(out, "   Date: {}", display_date(date));
    }
    out.push('\n');

    let job = player.job_title.as_deref().unwrap_or("Unemployed");
    let income = player.income.unwrap_or(Decimal::ZERO);
    let _ = writeln!(out, "Job: {job} ({}/yr)", format_currency(income));

    match (ledger_balance, player.balance) {
        (Some(b), Some(server)) if b.display_units() != Balance::new(server).display_units() => {
            let _ = writeln!(
                out,
                "Balance: {b}   (server reports {})",
                Balance::new(server)
            );
        }
        (Some(b), _) => {
            let _ = writeln!(out, "Balance: {b}");
        }
        (None, Some(server)) => {
            let _ = writeln!(out, "Balance: {} (unreconciled)", Balance::new(server));
        }
        (None, None) => {}
    }

    for (i, loan) in player.loans.iter().enumerate() {
        let remaining = loan
            .remaining_amount
            .map(|a| Balance::new(a).to_string())
            .unwrap_or_else(|| "?".to_string());
        let _ = writeln!(out, "Loan {}: {} ({remaining} remaining)", i + 1, loan.description);
    }
    out
}

pub fn choice_line(number: usize, choice: &Choice) -> String {
    let tag = match choice {
        Choice::Mcq { impact, .. } => match impact.action {
            ImpactAction::Deposit => format!("+{}", format_currency(impact.amount)),
            ImpactAction::Withdrawal => format!("-{}", format_currency(impact.amount)),
            ImpactAction::CreateLoan => format!("loan {}", format_currency(impact.amount)),
        },
        Choice::Job { impact, .. } => {
            format!("{} @ {}/yr", impact.title, format_currency(impact.income))
        }
    };
    format!("  [{number}] {}  <{tag}>", choice.description())
}

pub fn scenario(scenario: &Scenario) -> String {
    let mut out = String::new();
    if !scenario.scenario_title.is_empty() {
        let _ = writeln!(out, "== {} ==", scenario.scenario_title);
    }
    if !scenario.scenario_description.is_empty() {
        let _ = writeln!(out, "{}", scenario.scenario_description);
    }
    for (i, choice) in scenario.choices.iter().enumerate() {
        let _ = writeln!(out, "{}", choice_line(i + 1, choice));
    }
    out
}

/// Ledger in delivery order, one row per record. Malformed rows are flagged.
pub fn ledger_table(ledger: &Ledger) -> String {
    if ledger.is_empty() {
        return "No transactions yet.\n".to_string();
    }

    let mut out = String::new();
    let _ = writeln!(out, "{:<14} {:>14}  {}", "Date", "Amount", "Description");
    for record in ledger.iter() {
        let date = record
            .date
            .as_deref()
            .map(display_date)
            .unwrap_or_else(|| "-".to_string());
        let amount = match record.classify() {
            Ok((TransactionKind::Deposit, a)) => format!("+{}", format_currency(a)),
            Ok((TransactionKind::Withdrawal, a)) => format!("-{}", format_currency(a)),
            Err(_) => "(ignored)".to_string(),
        };
        let desc = record.description.as_deref().unwrap_or("");
        let _ = writeln!(out, "{date:<14} {amount:>14}  {desc}");
    }
    out
}

fn value_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|i| format!("  - {}", value_text(i)))
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| format!("{k}: {}", value_text(v)))
            .collect::<Vec<_>>()
            .join("; "),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

pub fn final_summary(summary: &FinalSummary) -> String {
    let mut out = String::from("=== Retirement ===\n");
    if let Some(title) = &summary.persona_title {
        let _ = writeln!(out, "{title}");
    }
    if let Some(text) = &summary.summary {
        let _ = writeln!(out, "{text}");
    }
    if let Some(best) = &summary.best_decision {
        let _ = writeln!(out, "Best decisions:\n{}", value_text(best));
    }
    if let Some(worst) = &summary.worst_decision {
        let _ = writeln!(out, "Worst decisions:\n{}", value_text(worst));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::TransactionRecord;
    use crate::models::Loan;
    use serde_json::json;

    #[test]
    fn server_balance_mentioned_only_on_disagreement() {
        let player = PlayerState {
            age: 18,
            balance: Some(Decimal::from(6200)),
            ..PlayerState::default()
        };
        let same = player_summary(&player, Some(Balance::new(Decimal::from(6200))));
        assert!(same.contains("Balance: $6,200\n"));
        assert!(!same.contains("server reports"));

        let differs = player_summary(&player, Some(Balance::new(Decimal::from(5700))));
        assert!(differs.contains("Balance: $5,700   (server reports $6,200)"));
    }

    #[test]
    fn loans_are_listed() {
        let player = PlayerState {
            loans: vec![Loan {
                description: "Student Loan".to_string(),
                remaining_amount: Some(Decimal::from(40000)),
            }],
            ..PlayerState::default()
        };
        let text = player_summary(&player, None);
        assert!(text.contains("Loan 1: Student Loan ($40,000 remaining)"));
    }

    #[test]
    fn ledger_rows_keep_order_and_flag_bad_records() {
        let mut bad = TransactionRecord::deposit("2026-02-01", Decimal::from(5), "Transfer");
        bad.kind = Some("transfer".to_string());
        let ledger = Ledger::new(vec![
            TransactionRecord::withdrawal("2026-03-01", Decimal::from(500), "Camp"),
            bad,
            TransactionRecord::deposit("2026-01-01", Decimal::from(1200), "Job"),
        ]);
        let table = ledger_table(&ledger);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[1].starts_with("Mar 01, 2026"));
        assert!(lines[1].contains("-$500"));
        assert!(lines[2].contains("(ignored)"));
        assert!(lines[3].contains("+$1,200"));
    }

    #[test]
    fn balance_line_mentions_skipped_records() {
        let update = BalanceUpdate {
            seq: 3,
            balance: Balance::new(Decimal::new(61996, 1)),
            applied: 4,
            skipped: 1,
        };
        assert_eq!(
            balance_line(&update),
            "Balance: $6,200  (1 unreadable transaction ignored)"
        );
    }

    #[test]
    fn scenario_lists_numbered_choices() {
        let s: Scenario = serde_json::from_value(json!({
            "scenario_title": "Offer",
            "scenario_description": "A startup calls.",
            "choices": [
                { "description": "Accept", "financial_impact": { "income": 75000, "title": "Junior Developer" } },
                { "description": "Decline", "financial_impact": { "income": 0, "title": "Unemployed" } }
            ]
        }))
        .unwrap();
        let text = scenario(&s);
        assert!(text.contains("== Offer =="));
        assert!(text.contains("[1] Accept  <Junior Developer @ $75,000/yr>"));
        assert!(text.contains("[2] Decline"));
    }

    #[test]
    fn summary_accepts_structured_sections() {
        let summary = FinalSummary {
            persona_title: Some("The Cautious Saver".to_string()),
            summary: None,
            best_decision: Some(json!(["Index funds", "No car loan"])),
            worst_decision: Some(json!("Timeshare")),
        };
        let text = final_summary(&summary);
        assert!(text.contains("The Cautious Saver"));
        assert!(text.contains("  - Index funds"));
        assert!(text.contains("Worst decisions:\nTimeshare"));
    }
}
