use crate::db::repository;
use crate::error::FinanceResult;
use crate::models::category::Category;
use crate::models::transaction::{NewTransaction, SourceType};
use chrono::NaiveDate;
use rusqlite::Connection;
use rust_decimal::Decimal;

const SAMPLE_TRANSACTIONS: [(&str, i64, u32, Category, &str); 4] = [
    ("Starbucks", 1250, 2, Category::Food, "Coffee and pastry"),
    ("Uber", 2375, 2, Category::Transportation, "Ride to downtown"),
    ("Amazon", 4599, 2, Category::Shopping, "Books and supplies"),
    ("Netflix", 1599, 2, Category::Entertainment, "Monthly subscription"),
];

pub fn sample_transactions(date: NaiveDate) -> Vec<NewTransaction> {
    SAMPLE_TRANSACTIONS
        .iter()
        .map(|(vendor, units, scale, category, note)| {
            NewTransaction::new(date, *vendor, Decimal::new(*units, *scale), *category, Some(note.to_string()))
                .with_source(SourceType::SampleData)
        })
        .collect()
}

/// Inserts the sample transactions dated `date`, but only into an empty
/// store. Returns how many were inserted.
pub fn seed_sample_data(conn: &Connection, date: NaiveDate) -> FinanceResult<usize> {
    if repository::count_transactions(conn)? > 0 {
        log::info!("Store already has transactions, skipping sample data");
        return Ok(0);
    }

    let samples = sample_transactions(date);
    let tx = conn.unchecked_transaction()?;
    for sample in &samples {
        repository::add_transaction(&tx, sample)?;
    }
    tx.commit()?;
    Ok(samples.len())
}
