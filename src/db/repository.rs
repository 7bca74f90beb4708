use crate::error::{FinanceError, FinanceResult};
use crate::models::category::Category;
use crate::models::transaction::{check_amount, NewTransaction, SourceType, Transaction, TransactionFilter};
use chrono::{NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use std::str::FromStr;
use uuid::Uuid;

pub const MAX_VENDOR_LEN: usize = 255;
pub const MAX_NOTE_LEN: usize = 1000;

const SELECT_COLUMNS: &str =
    "SELECT id, date, vendor, amount, category, note, source_type, raw_data FROM transactions";

fn conversion_error<E>(idx: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

fn row_to_transaction(row: &Row) -> rusqlite::Result<Transaction> {
    let date_str: String = row.get(1)?;
    let amount_str: String = row.get(3)?;
    let category_str: String = row.get(4)?;
    let source_str: String = row.get(6)?;

    Ok(Transaction {
        id: row.get(0)?,
        date: NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").map_err(|e| conversion_error(1, e))?,
        vendor: row.get(2)?,
        amount: Decimal::from_str(&amount_str).map_err(|e| conversion_error(3, e))?,
        category: Category::from_str(&category_str).map_err(|e| conversion_error(4, e))?,
        note: row.get(5)?,
        source_type: SourceType::from_str(&source_str).map_err(|e| conversion_error(6, e))?,
        raw_data: row.get(7)?,
    })
}

fn validate(transaction: &NewTransaction) -> FinanceResult<()> {
    let vendor = transaction.vendor.trim();
    if vendor.is_empty() {
        return Err(FinanceError::Validation("Vendor cannot be empty".to_string()));
    }
    if vendor.chars().count() > MAX_VENDOR_LEN {
        return Err(FinanceError::Validation("Vendor too long".to_string()));
    }
    check_amount(transaction.amount).map_err(FinanceError::Validation)?;
    if let Some(note) = &transaction.note {
        if note.chars().count() > MAX_NOTE_LEN {
            return Err(FinanceError::Validation("Note too long".to_string()));
        }
    }
    Ok(())
}

fn clean_note(note: &Option<String>) -> Option<String> {
    note.as_ref()
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
}

/// Inserts a transaction and returns the id assigned to it.
pub fn add_transaction(conn: &Connection, transaction: &NewTransaction) -> FinanceResult<String> {
    validate(transaction)?;
    let id = Uuid::new_v4().to_string();

    conn.execute(
        "INSERT INTO transactions (id, date, vendor, amount, category, note, source_type, raw_data, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        rusqlite::params![
            &id,
            transaction.date.to_string(),
            transaction.vendor.trim(),
            transaction.amount.to_string(),
            transaction.category.as_str(),
            clean_note(&transaction.note),
            transaction.source_type.as_str(),
            &transaction.raw_data,
            Utc::now().to_rfc3339(),
        ],
    )?;

    log::debug!(
        "Inserted transaction {} ({} {} {})",
        id,
        transaction.date,
        transaction.category,
        transaction.amount
    );
    Ok(id)
}

pub fn get_transaction(conn: &Connection, id: &str) -> FinanceResult<Option<Transaction>> {
    let sql = format!("{} WHERE id = ?1", SELECT_COLUMNS);
    let transaction = conn
        .query_row(&sql, [id.trim()], row_to_transaction)
        .optional()?;
    Ok(transaction)
}

/// Lists transactions matching `filter`, newest date first. Rows sharing a
/// date come back in reverse insertion order.
pub fn list_transactions(
    conn: &Connection,
    filter: &TransactionFilter,
) -> FinanceResult<Vec<Transaction>> {
    let mut clauses: Vec<&str> = Vec::new();
    let mut params: Vec<String> = Vec::new();

    if let Some(from) = filter.from {
        params.push(from.to_string());
        clauses.push("date >= ?");
    }
    if let Some(to) = filter.to {
        params.push(to.to_string());
        clauses.push("date <= ?");
    }
    if let Some(category) = filter.category {
        params.push(category.as_str().to_string());
        clauses.push("category = ?");
    }
    if let Some(source_type) = filter.source_type {
        params.push(source_type.as_str().to_string());
        clauses.push("source_type = ?");
    }

    let mut sql = SELECT_COLUMNS.to_string();
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(" ORDER BY date DESC, rowid DESC");
    if let Some(limit) = filter.limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }

    let mut stmt = conn.prepare(&sql)?;
    let transaction_iter = stmt.query_map(rusqlite::params_from_iter(params.iter()), row_to_transaction)?;

    let mut transactions = Vec::new();
    for transaction in transaction_iter {
        transactions.push(transaction?);
    }
    Ok(transactions)
}

pub fn update_transaction(
    conn: &Connection,
    id: &str,
    transaction: &NewTransaction,
) -> FinanceResult<()> {
    validate(transaction)?;
    let rows_affected = conn.execute(
        "UPDATE transactions SET date = ?1, vendor = ?2, amount = ?3, category = ?4, note = ?5, \
         source_type = ?6, raw_data = ?7 WHERE id = ?8",
        rusqlite::params![
            transaction.date.to_string(),
            transaction.vendor.trim(),
            transaction.amount.to_string(),
            transaction.category.as_str(),
            clean_note(&transaction.note),
            transaction.source_type.as_str(),
            &transaction.raw_data,
            id.trim(),
        ],
    )?;

    if rows_affected == 0 {
        return Err(FinanceError::transaction_not_found(id.trim()));
    }
    log::debug!("Updated transaction {}", id.trim());
    Ok(())
}

pub fn delete_transaction(conn: &Connection, id: &str) -> FinanceResult<()> {
    let rows_affected = conn.execute("DELETE FROM transactions WHERE id = ?1", [id.trim()])?;

    if rows_affected == 0 {
        return Err(FinanceError::transaction_not_found(id.trim()));
    }
    log::debug!("Deleted transaction {}", id.trim());
    Ok(())
}

pub fn count_transactions(conn: &Connection) -> FinanceResult<usize> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM transactions", [], |row| row.get(0))?;
    Ok(count as usize)
}
