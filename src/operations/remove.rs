use crate::db::repository;
use crate::error::{FinanceError, FinanceResult};
use rusqlite::Connection;
use uuid::Uuid;

pub fn remove_transaction_from_db(conn: &Connection, id_input: &str) -> FinanceResult<()> {
    let id_input = id_input.trim();
    if id_input.is_empty() {
        return Err(FinanceError::Validation("Transaction ID cannot be empty.".to_string()));
    }

    let id = Uuid::parse_str(id_input).map_err(|_| {
        FinanceError::Validation("Invalid transaction ID format. Please provide a valid UUID.".to_string())
    })?;

    repository::delete_transaction(conn, &id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connection::establish_test_connection;
    use crate::operations::add::create_transaction;

    #[test]
    fn test_remove_existing_transaction() {
        let conn = establish_test_connection().unwrap();
        let tx = create_transaction("2024-01-05", "Coffee", "4.50", "Food", "").unwrap();
        let id = repository::add_transaction(&conn, &tx).unwrap();

        remove_transaction_from_db(&conn, &format!("  {}  ", id)).unwrap();
        assert_eq!(repository::count_transactions(&conn).unwrap(), 0);
    }

    #[test]
    fn test_remove_empty_id() {
        let conn = establish_test_connection().unwrap();
        let err = remove_transaction_from_db(&conn, "").unwrap_err();
        assert!(err.to_string().contains("cannot be empty"));
    }

    #[test]
    fn test_remove_invalid_uuid() {
        let conn = establish_test_connection().unwrap();
        let err = remove_transaction_from_db(&conn, "123").unwrap_err();
        assert!(err.to_string().contains("valid UUID"));
    }

    #[test]
    fn test_remove_unknown_id() {
        let conn = establish_test_connection().unwrap();
        let err = remove_transaction_from_db(&conn, &Uuid::new_v4().to_string()).unwrap_err();
        assert!(err.is_not_found());
    }
}
