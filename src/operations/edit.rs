use crate::db::repository;
use crate::error::{FinanceError, FinanceResult};
use crate::models::category::Category;
use crate::models::transaction::NewTransaction;
use crate::operations::add::parse_date;
use crate::operations::amount::normalize_amount;
use rusqlite::Connection;
use std::str::FromStr;

/// Raw replacement values from a review form. `None` keeps the current value;
/// for the note, `Some("")` clears it.
#[derive(Debug, Clone, Default)]
pub struct FieldEdits {
    pub date: Option<String>,
    pub vendor: Option<String>,
    pub amount: Option<String>,
    pub category: Option<String>,
    pub note: Option<String>,
}

impl FieldEdits {
    pub fn is_empty(&self) -> bool {
        self.date.is_none()
            && self.vendor.is_none()
            && self.amount.is_none()
            && self.category.is_none()
            && self.note.is_none()
    }
}

pub fn apply_edits(mut base: NewTransaction, edits: &FieldEdits) -> FinanceResult<NewTransaction> {
    if let Some(date) = &edits.date {
        base.date = parse_date(date)?;
    }
    if let Some(vendor) = &edits.vendor {
        if vendor.trim().is_empty() {
            return Err(FinanceError::Validation("Vendor cannot be empty".to_string()));
        }
        base.vendor = vendor.trim().to_string();
    }
    if let Some(amount) = &edits.amount {
        base.amount = normalize_amount(amount).map_err(|e| FinanceError::Validation(format!("Invalid amount: {}", e)))?;
    }
    if let Some(category) = &edits.category {
        base.category = Category::from_str(category)?;
    }
    if let Some(note) = &edits.note {
        let note = note.trim();
        base.note = (!note.is_empty()).then(|| note.to_string());
    }
    Ok(base)
}

/// Applies `edits` to the stored transaction `id` and returns the new values.
pub fn edit_transaction_db(conn: &Connection, id: &str, edits: &FieldEdits) -> FinanceResult<NewTransaction> {
    let current = repository::get_transaction(conn, id)?
        .ok_or_else(|| FinanceError::transaction_not_found(id.trim()))?;
    let updated = apply_edits(current.into(), edits)?;
    repository::update_transaction(conn, id, &updated)?;
    Ok(updated)
}
