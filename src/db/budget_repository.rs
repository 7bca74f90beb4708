use crate::error::{FinanceError, FinanceResult};
use crate::models::budget::{Budget, MonthKey};
use crate::models::category::Category;
use crate::models::transaction::check_amount;
use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::str::FromStr;

/// Sets the limit for (category, month), replacing any existing one.
pub fn upsert_budget(
    conn: &Connection,
    category: Category,
    month: MonthKey,
    limit: Decimal,
) -> FinanceResult<()> {
    if limit <= Decimal::ZERO {
        return Err(FinanceError::Validation(format!(
            "Budget limit must be positive, got {}",
            limit
        )));
    }
    check_amount(limit).map_err(|e| FinanceError::Validation(format!("Budget limit {}", e)))?;

    conn.execute(
        "INSERT INTO budgets (category, month, limit_amount, updated_at) VALUES (?1, ?2, ?3, ?4)\n         ON CONFLICT(category, month) DO UPDATE SET limit_amount = excluded.limit_amount, updated_at = excluded.updated_at",
        [
            category.as_str().to_string(),
            month.to_string(),
            limit.to_string(),
            Utc::now().to_rfc3339(),
        ],
    )?;
    log::debug!("Budget for {} in {} set to {}", category, month, limit);
    Ok(())
}

pub fn get_budgets(conn: &Connection, month: MonthKey) -> FinanceResult<BTreeMap<Category, Decimal>> {
    let mut stmt = conn
        .prepare("SELECT category, limit_amount FROM budgets WHERE month = ?1 ORDER BY category ASC")?;

    let iter = stmt.query_map([month.to_string()], |row| {
        let category_str: String = row.get(0)?;
        let amount_str: String = row.get(1)?;
        let category = Category::from_str(&category_str)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?;
        let limit = Decimal::from_str(&amount_str)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?;
        Ok((category, limit))
    })?;

    let mut budgets = BTreeMap::new();
    for budget in iter {
        let (category, limit) = budget?;
        budgets.insert(category, limit);
    }
    Ok(budgets)
}

pub fn get_budget(
    conn: &Connection,
    category: Category,
    month: MonthKey,
) -> FinanceResult<Option<Budget>> {
    Ok(get_budgets(conn, month)?
        .get(&category)
        .map(|limit| Budget {
            category,
            month,
            limit: *limit,
        }))
}

/// Months that have at least one budget, newest first.
pub fn list_budget_months(conn: &Connection) -> FinanceResult<Vec<MonthKey>> {
    let mut stmt = conn.prepare("SELECT DISTINCT month FROM budgets ORDER BY month DESC")?;
    let iter = stmt.query_map([], |row| row.get::<_, String>(0))?;

    let mut months = Vec::new();
    for month in iter {
        months.push(MonthKey::from_str(&month?)?);
    }
    Ok(months)
}

pub fn delete_budget(conn: &Connection, category: Category, month: MonthKey) -> FinanceResult<()> {
    let rows = conn.execute(
        "DELETE FROM budgets WHERE category = ?1 AND month = ?2",
        [category.as_str().to_string(), month.to_string()],
    )?;

    if rows == 0 {
        return Err(FinanceError::budget_not_found(format!("{} {}", category, month)));
    }
    Ok(())
}
