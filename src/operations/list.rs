use crate::db::repository;
use crate::error::{FinanceError, FinanceResult};
use crate::models::budget::MonthKey;
use crate::models::category::Category;
use crate::models::transaction::{SourceType, Transaction, TransactionFilter};
use crate::operations::add::parse_date;
use rusqlite::Connection;
use std::str::FromStr;

/// Parses filter terms such as `category=Food month=2024-01 limit=10`.
///
/// Recognised keys: `category`, `source`, `from`, `to`, `month`, `limit`. An empty
/// input means no filter.
pub fn parse_filter(input: &str) -> FinanceResult<TransactionFilter> {
    let mut filter = TransactionFilter::all();

    for term in input.split_whitespace() {
        let (key, value) = term.split_once('=').ok_or_else(|| {
            FinanceError::Validation(format!("Invalid filter '{}'. Use key=value.", term))
        })?;
        match key.to_lowercase().as_str() {
            "category" => filter = filter.with_category(Category::from_str(value)?),
            "source" => filter.source_type = Some(SourceType::from_str(value)?),
            "from" => filter.from = Some(parse_date(value)?),
            "to" => filter.to = Some(parse_date(value)?),
            "month" => {
                let month = MonthKey::from_str(value)?;
                filter.from = Some(month.first_day());
                filter.to = Some(month.last_day());
            }
            "limit" => {
                let limit = value.parse::<usize>().map_err(|_| {
                    FinanceError::Validation(format!("Invalid limit '{}'", value))
                })?;
                filter = filter.with_limit(limit);
            }
            other => {
                return Err(FinanceError::Validation(format!(
                    "Unknown filter '{}'. Use category, source, from, to, month or limit.",
                    other
                )));
            }
        }
    }

    if let (Some(from), Some(to)) = (filter.from, filter.to) {
        if from > to {
            return Err(FinanceError::Validation("Start date must be before end date.".to_string()));
        }
    }
    Ok(filter)
}

pub fn list_transactions_db(conn: &Connection, input: &str) -> FinanceResult<Vec<Transaction>> {
    let filter = parse_filter(input)?;
    repository::list_transactions(conn, &filter)
}
