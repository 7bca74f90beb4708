use crate::db::budget_repository;
use crate::error::{FinanceError, FinanceResult};
use crate::models::budget::MonthKey;
use crate::models::category::Category;
use crate::operations::amount::normalize_amount;
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::str::FromStr;

fn parse_month_or_current(month: &str) -> FinanceResult<MonthKey> {
    if month.trim().is_empty() {
        Ok(MonthKey::current())
    } else {
        MonthKey::from_str(month)
    }
}

/// Sets a budget from raw form input. An empty month means the current one.
pub fn set_budget_db(conn: &Connection, category: &str, month: &str, limit: &str) -> FinanceResult<MonthKey> {
    let category = Category::from_str(category)?;
    let month = parse_month_or_current(month)?;
    let limit = normalize_amount(limit).map_err(|_| {
        FinanceError::Validation(format!("Invalid budget limit '{}'. Must be a valid number", limit.trim()))
    })?;
    if let Some(previous) = budget_repository::get_budget(conn, category, month)? {
        log::info!("Replacing {} budget for {} ({} -> {})", category, month, previous.limit, limit);
    }
    budget_repository::upsert_budget(conn, category, month, limit)?;
    Ok(month)
}

pub fn list_budgets_db(conn: &Connection, month: &str) -> FinanceResult<(MonthKey, BTreeMap<Category, Decimal>)> {
    let month = parse_month_or_current(month)?;
    let budgets = budget_repository::get_budgets(conn, month)?;
    Ok((month, budgets))
}

pub fn delete_budget_db(conn: &Connection, category: &str, month: &str) -> FinanceResult<()> {
    let category = Category::from_str(category)?;
    let month = parse_month_or_current(month)?;
    budget_repository::delete_budget(conn, category, month)
}
