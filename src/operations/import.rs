use super::add::create_transaction;
use crate::db::repository;
use crate::error::{FinanceError, FinanceResult};
use crate::models::transaction::{NewTransaction, SourceType};
use rusqlite::Connection;
use std::fs::File;
use std::path::Path;

/// Imports `date,vendor,amount,category[,note]` rows. Every row is validated
/// before anything is written, and the inserts share one database transaction.
pub fn import_transactions_to_db(conn: &Connection, path: &Path) -> FinanceResult<usize> {
    let transactions = import_csv(path)?;

    let tx = conn.unchecked_transaction()?;
    for transaction in &transactions {
        repository::add_transaction(&tx, transaction)?;
    }
    tx.commit()?;

    log::info!("Imported {} transaction(s) from {}", transactions.len(), path.display());
    Ok(transactions.len())
}

fn import_csv(path: &Path) -> FinanceResult<Vec<NewTransaction>> {
    let file = File::open(path)
        .map_err(|e| FinanceError::Io(format!("Failed to open file '{}': {}", path.display(), e)))?;

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .has_headers(false)
        .flexible(true)
        .from_reader(file);

    let mut transactions = Vec::new();

    for (line_index, result) in reader.records().enumerate() {
        let line = line_index + 1;
        let record = result
            .map_err(|e| FinanceError::Validation(format!("CSV parse error on line {}: {}", line, e)))?;

        if record.len() < 4 || record.len() > 5 {
            return Err(FinanceError::Validation(format!(
                "Invalid number of columns on line {}: expected 4 or 5, got {}",
                line,
                record.len()
            )));
        }

        let transaction = create_transaction(
            record.get(0).unwrap_or(""),
            record.get(1).unwrap_or(""),
            record.get(2).unwrap_or(""),
            record.get(3).unwrap_or(""),
            record.get(4).unwrap_or(""),
        )
        .map_err(|e| FinanceError::Validation(format!("Line {}: {}", line, e)))?;

        transactions.push(transaction.with_source(SourceType::CsvImport));
    }

    Ok(transactions)
}
