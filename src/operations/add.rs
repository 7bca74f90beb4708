use crate::db::{alert_repository, repository};
use crate::error::{FinanceError, FinanceResult};
use crate::models::alert::BudgetAlert;
use crate::models::budget::MonthKey;
use crate::models::category::Category;
use crate::models::transaction::NewTransaction;
use crate::operations::amount::normalize_amount;
use crate::operations::evaluate::{self, BudgetStatus};
use chrono::NaiveDate;
use rusqlite::Connection;
use std::str::FromStr;

#[derive(Debug)]
pub struct AddOutcome {
    pub id: String,
    pub alert: Option<BudgetAlert>,
}

pub fn parse_date(raw: &str) -> FinanceResult<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
        FinanceError::Validation(format!("Invalid date '{}'. Please use YYYY-MM-DD.", raw.trim()))
    })
}

/// Builds a manual-entry transaction from raw form values.
pub fn create_transaction(
    date: &str,
    vendor: &str,
    amount: &str,
    category: &str,
    note: &str,
) -> FinanceResult<NewTransaction> {
    let date = parse_date(date)?;

    let amount = normalize_amount(amount).map_err(|e| {
        FinanceError::Validation(format!("Invalid amount: {}. Please provide a valid decimal number.", e))
    })?;

    let vendor = vendor.trim();
    if vendor.is_empty() {
        return Err(FinanceError::Validation("Vendor cannot be empty".to_string()));
    }
    if vendor.chars().count() > repository::MAX_VENDOR_LEN {
        return Err(FinanceError::Validation("Vendor too long".to_string()));
    }

    let category = Category::from_str(category)?;

    let note = note.trim();
    if note.chars().count() > repository::MAX_NOTE_LEN {
        return Err(FinanceError::Validation("Note too long".to_string()));
    }
    let note = (!note.is_empty()).then(|| note.to_string());

    Ok(NewTransaction::new(date, vendor, amount, category, note))
}

/// Parses `date, vendor, amount, category[, note]`.
pub fn parse_entry_line(input: &str) -> FinanceResult<NewTransaction> {
    let parts: Vec<&str> = input.splitn(5, ',').map(|s| s.trim()).collect();
    if parts.len() < 4 {
        return Err(FinanceError::Validation(format!(
            "Invalid number of details provided. Expected at least 4 details separated by commas but got {}",
            parts.len()
        )));
    }
    create_transaction(parts[0], parts[1], parts[2], parts[3], parts.get(4).copied().unwrap_or(""))
}

/// Persists `transaction`, then re-evaluates its category for that month and
/// records an alert when the budget is near, at or over its limit. The insert
/// and the alert commit together or not at all.
pub fn add_transaction_to_db(conn: &Connection, transaction: &NewTransaction) -> FinanceResult<AddOutcome> {
    let tx = conn.unchecked_transaction()?;
    let id = repository::add_transaction(&tx, transaction)?;
    let alert = check_budget(&tx, transaction.category, MonthKey::of(transaction.date))?;
    tx.commit()?;
    Ok(AddOutcome { id, alert })
}

pub fn check_budget(
    conn: &Connection,
    category: Category,
    month: MonthKey,
) -> FinanceResult<Option<BudgetAlert>> {
    let line = evaluate::evaluate_category(conn, category, month)?;
    let Some(limit) = line.limit else {
        return Ok(None);
    };

    let message = match line.status {
        BudgetStatus::Exceeded => format!(
            "Budget exceeded for {} in {}: spent {}, budget {}",
            category, month, line.spent, limit
        ),
        BudgetStatus::AtLimit => format!(
            "Budget for {} in {} is fully used: spent {} of {}",
            category, month, line.spent, limit
        ),
        _ if line.is_near_limit() => format!(
            "You're at {}% of your {} budget for {}",
            line.utilization_percent().unwrap_or_default(),
            category,
            month
        ),
        _ => return Ok(None),
    };

    log::warn!("{}", message);
    let alert = alert_repository::add_alert(conn, category, month, &message)?;
    Ok(Some(alert))
}
