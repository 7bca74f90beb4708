//! Table definitions and forward-only migrations.
//!
//! The applied version is tracked in `PRAGMA user_version`. Migrations run in
//! order at startup, each inside its own transaction.

use crate::error::{FinanceError, FinanceResult};
use rusqlite::Connection;

pub struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "transactions and budgets",
        sql: "
            CREATE TABLE IF NOT EXISTS transactions (
                id TEXT PRIMARY KEY,
                date TEXT NOT NULL,
                vendor TEXT NOT NULL,
                amount TEXT NOT NULL,
                category TEXT NOT NULL,
                note TEXT,
                source_type TEXT NOT NULL DEFAULT 'manual_entry',
                raw_data TEXT,
                created_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS budgets (
                category TEXT NOT NULL,
                month TEXT NOT NULL,
                limit_amount TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (category, month)
            );
        ",
    },
    Migration {
        version: 2,
        description: "budget alerts",
        sql: "
            CREATE TABLE IF NOT EXISTS budget_alerts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                category TEXT NOT NULL,
                month TEXT NOT NULL,
                message TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
        ",
    },
    Migration {
        version: 3,
        description: "date and category indexes",
        sql: "
            CREATE INDEX IF NOT EXISTS idx_transactions_date ON transactions(date);
            CREATE INDEX IF NOT EXISTS idx_transactions_category_date ON transactions(category, date);
        ",
    },
];

pub fn schema_version() -> u32 {
    MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
}

pub fn current_version(conn: &Connection) -> FinanceResult<u32> {
    let version: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    Ok(version)
}

/// Brings the database up to [`schema_version`]. Returns the number of
/// migrations applied.
pub fn run_migrations(conn: &Connection) -> FinanceResult<usize> {
    let current = current_version(conn)?;
    let target = schema_version();

    if current > target {
        return Err(FinanceError::Connection(format!(
            "Database schema version {} is newer than supported version {}",
            current, target
        )));
    }

    let mut applied = 0;
    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        log::info!(
            "Applying migration v{}: {}",
            migration.version,
            migration.description
        );
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(migration.sql).map_err(|e| {
            FinanceError::Storage(format!("Migration to v{} failed: {}", migration.version, e))
        })?;
        tx.pragma_update(None, "user_version", migration.version)?;
        tx.commit()?;
        applied += 1;
    }

    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_ordered() {
        for pair in MIGRATIONS.windows(2) {
            assert!(pair[0].version < pair[1].version);
        }
    }

    #[test]
    fn test_run_migrations_on_fresh_database() {
        let conn = Connection::open_in_memory().unwrap();
        let applied = run_migrations(&conn).unwrap();
        assert_eq!(applied, MIGRATIONS.len());
        assert_eq!(current_version(&conn).unwrap(), schema_version());

        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('transactions', 'budgets', 'budget_alerts')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 3);
    }

    #[test]
    fn test_run_migrations_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        let applied = run_migrations(&conn).unwrap();
        assert_eq!(applied, 0);
    }

    #[test]
    fn test_newer_database_is_refused() {
        let conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "user_version", schema_version() + 1)
            .unwrap();
        let result = run_migrations(&conn);
        assert!(matches!(result, Err(FinanceError::Connection(_))));
    }
}
