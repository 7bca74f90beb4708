use crate::config::DbConfig;
use crate::db::schema;
use crate::error::{FinanceError, FinanceResult};
use rusqlite::{Connection, OpenFlags};

/// Opens the store described by `config` and applies pending migrations.
pub fn establish_connection(config: &DbConfig) -> FinanceResult<Connection> {
    let path = config.database_path();

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if !parent.is_dir() {
            return Err(FinanceError::Connection(format!(
                "Database directory '{}' does not exist",
                parent.display()
            )));
        }
    }
    if config.password.is_some() || config.user != crate::config::DEFAULT_DB_USER {
        log::debug!("DB_USER/DB_PASSWORD are not used by the embedded store");
    }

    let conn = Connection::open_with_flags(
        &path,
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
    )
    .map_err(|e| {
        FinanceError::Connection(format!(
            "Failed to open database '{}': {}",
            path.display(),
            e
        ))
    })?;
    conn.pragma_update(None, "foreign_keys", true)?;

    let applied = schema::run_migrations(&conn)?;
    log::info!(
        "Connected to {} (schema v{}, {} migration(s) applied)",
        path.display(),
        schema::schema_version(),
        applied
    );
    Ok(conn)
}

#[cfg(test)]
pub fn establish_test_connection() -> FinanceResult<Connection> {
    let conn = Connection::open_in_memory()?;
    schema::run_migrations(&conn)?;
    Ok(conn)
}
