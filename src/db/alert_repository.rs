use crate::error::FinanceResult;
use crate::models::alert::BudgetAlert;
use crate::models::budget::MonthKey;
use crate::models::category::Category;
use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::Connection;
use std::str::FromStr;

pub fn add_alert(
    conn: &Connection,
    category: Category,
    month: MonthKey,
    message: &str,
) -> FinanceResult<BudgetAlert> {
    let created_at = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO budget_alerts (category, month, message, created_at) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![category.as_str(), month.to_string(), message, &created_at],
    )?;
    Ok(BudgetAlert {
        id: conn.last_insert_rowid(),
        category,
        month,
        message: message.to_string(),
        created_at,
    })
}

/// All recorded alerts, newest first.
pub fn get_all_alerts(conn: &Connection) -> FinanceResult<Vec<BudgetAlert>> {
    let mut stmt = conn.prepare(
        "SELECT id, category, month, message, created_at FROM budget_alerts ORDER BY id DESC",
    )?;

    let iter = stmt.query_map([], |row| {
        let category_str: String = row.get(1)?;
        let month_str: String = row.get(2)?;
        Ok(BudgetAlert {
            id: row.get(0)?,
            category: Category::from_str(&category_str)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?,
            month: MonthKey::from_str(&month_str)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?,
            message: row.get(3)?,
            created_at: row.get(4)?,
        })
    })?;

    let mut alerts = Vec::new();
    for alert in iter {
        alerts.push(alert?);
    }
    Ok(alerts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connection::establish_test_connection;

    #[test]
    fn test_get_all_alerts_empty() {
        let conn = establish_test_connection().unwrap();
        assert!(get_all_alerts(&conn).unwrap().is_empty());
    }

    #[test]
    fn test_alerts_newest_first() {
        let conn = establish_test_connection().unwrap();
        let month: MonthKey = "2024-01".parse().unwrap();

        let first = add_alert(&conn, Category::Food, month, "80% used").unwrap();
        let second = add_alert(&conn, Category::Food, month, "exceeded").unwrap();
        assert!(second.id > first.id);

        let alerts = get_all_alerts(&conn).unwrap();
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].message, "exceeded");
        assert_eq!(alerts[1].category, Category::Food);
        assert_eq!(alerts[1].month, month);
    }
}
