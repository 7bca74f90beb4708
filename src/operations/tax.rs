//! Income tax return draft built from stored transactions.
//!
//! The mapping is a heuristic: `Other` entries count as salary income and
//! `Healthcare` spend as a section 80D deduction. Everything else is only
//! reported in the per-category breakdown.

use crate::db::repository;
use crate::error::{FinanceError, FinanceResult};
use crate::models::category::Category;
use crate::models::transaction::{Transaction, TransactionFilter};
use chrono::NaiveDate;
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

pub const DEFAULT_OUTPUT: &str = "tax_return.json";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TaxReturn {
    /// Calendar year covered, or `all`
    pub period: String,
    pub income_details: IncomeDetails,
    pub deduction: Deduction,
    pub summary: TaxSummary,
    pub spend_by_category: BTreeMap<Category, Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct IncomeDetails {
    pub salary: Decimal,
    pub other_income: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Deduction {
    #[serde(rename = "80C")]
    pub section_80c: Decimal,
    #[serde(rename = "80D")]
    pub section_80d: Decimal,
    #[serde(rename = "Other")]
    pub other: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TaxSummary {
    pub total_income: Decimal,
    pub total_deduction: Decimal,
    /// Never below zero
    pub taxable_income: Decimal,
}

fn checked_sum(values: &[Decimal], what: &str) -> FinanceResult<Decimal> {
    values.iter().try_fold(Decimal::ZERO, |acc, v| {
        acc.checked_add(*v)
            .ok_or_else(|| FinanceError::Validation(format!("{} is out of range", what)))
    })
}

pub fn map_to_tax_return(transactions: &[Transaction], period: &str) -> FinanceResult<TaxReturn> {
    let mut spend_by_category: BTreeMap<Category, Decimal> = BTreeMap::new();
    for transaction in transactions {
        let total = spend_by_category.entry(transaction.category).or_insert(Decimal::ZERO);
        *total = total
            .checked_add(transaction.amount)
            .ok_or_else(|| FinanceError::total_overflow(transaction.category, period))?;
    }
    let category_total = |category| spend_by_category.get(&category).copied().unwrap_or(Decimal::ZERO);

    let income_details = IncomeDetails {
        salary: category_total(Category::Other),
        other_income: Decimal::ZERO,
    };
    let deduction = Deduction {
        section_80c: Decimal::ZERO,
        section_80d: category_total(Category::Healthcare),
        other: Decimal::ZERO,
    };

    let total_income = checked_sum(&[income_details.salary, income_details.other_income], "Total income")?;
    let total_deduction = checked_sum(
        &[deduction.section_80c, deduction.section_80d, deduction.other],
        "Total deduction",
    )?;
    let taxable_income = total_income
        .checked_sub(total_deduction)
        .ok_or_else(|| FinanceError::Validation("Taxable income is out of range".to_string()))?
        .max(Decimal::ZERO);

    Ok(TaxReturn {
        period: period.to_string(),
        income_details,
        deduction,
        summary: TaxSummary {
            total_income,
            total_deduction,
            taxable_income,
        },
        spend_by_category,
    })
}

/// Builds the return from every stored transaction, or only those dated in
/// `year`.
pub fn generate_tax_return_db(conn: &Connection, year: Option<i32>) -> FinanceResult<TaxReturn> {
    let (filter, period) = match year {
        Some(year) => {
            let from = NaiveDate::from_ymd_opt(year, 1, 1)
                .ok_or_else(|| FinanceError::Validation(format!("Invalid year {}", year)))?;
            let to = NaiveDate::from_ymd_opt(year, 12, 31)
                .ok_or_else(|| FinanceError::Validation(format!("Invalid year {}", year)))?;
            (TransactionFilter::between(from, to), year.to_string())
        }
        None => (TransactionFilter::all(), "all".to_string()),
    };

    let transactions = repository::list_transactions(conn, &filter)?;
    if transactions.is_empty() {
        return Err(FinanceError::Validation(format!(
            "No transactions available for period {}",
            period
        )));
    }
    map_to_tax_return(&transactions, &period)
}

pub fn write_tax_return(tax_return: &TaxReturn, path: &Path) -> FinanceResult<()> {
    let json = serde_json::to_string_pretty(tax_return)
        .map_err(|e| FinanceError::Io(format!("Failed to encode tax return: {}", e)))?;
    std::fs::write(path, json)
        .map_err(|e| FinanceError::Io(format!("Failed to write '{}': {}", path.display(), e)))?;
    log::info!("Tax return for {} written to {}", tax_return.period, path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connection::establish_test_connection;
    use crate::operations::add::create_transaction;
    use serde_json::Value;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn seed(conn: &Connection) {
        for (date, vendor, amount, category) in [
            ("2024-03-31", "Employer", "50000", "Other"),
            ("2024-04-02", "Clinic", "1200.50", "Healthcare"),
            ("2024-05-10", "Grocer", "300", "Food"),
            ("2023-12-30", "Employer", "48000", "Other"),
        ] {
            let tx = create_transaction(date, vendor, amount, category, "").unwrap();
            repository::add_transaction(conn, &tx).unwrap();
        }
    }

    #[test]
    fn test_heuristic_mapping_for_year() {
        let conn = establish_test_connection().unwrap();
        seed(&conn);

        let tax_return = generate_tax_return_db(&conn, Some(2024)).unwrap();
        assert_eq!(tax_return.period, "2024");
        assert_eq!(tax_return.income_details.salary, dec("50000"));
        assert_eq!(tax_return.deduction.section_80d, dec("1200.50"));
        assert_eq!(tax_return.summary.total_income, dec("50000"));
        assert_eq!(tax_return.summary.taxable_income, dec("48799.50"));
        assert_eq!(tax_return.spend_by_category[&Category::Food], dec("300"));
    }

    #[test]
    fn test_all_periods_and_floor_at_zero() {
        let conn = establish_test_connection().unwrap();
        seed(&conn);
        let tax_return = generate_tax_return_db(&conn, None).unwrap();
        assert_eq!(tax_return.income_details.salary, dec("98000"));

        let conn = establish_test_connection().unwrap();
        let tx = create_transaction("2024-04-02", "Hospital", "900", "Healthcare", "").unwrap();
        repository::add_transaction(&conn, &tx).unwrap();
        let tax_return = generate_tax_return_db(&conn, Some(2024)).unwrap();
        assert_eq!(tax_return.summary.taxable_income, Decimal::ZERO);
    }

    #[test]
    fn test_empty_period_is_an_error() {
        let conn = establish_test_connection().unwrap();
        seed(&conn);
        let err = generate_tax_return_db(&conn, Some(2019)).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_write_tax_return_json_layout() {
        let conn = establish_test_connection().unwrap();
        seed(&conn);
        let tax_return = generate_tax_return_db(&conn, Some(2024)).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_OUTPUT);
        write_tax_return(&tax_return, &path).unwrap();

        let json: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["Period"], "2024");
        assert_eq!(json["IncomeDetails"]["Salary"], "50000");
        assert_eq!(json["Deduction"]["80D"], "1200.50");
        assert_eq!(json["Summary"]["TaxableIncome"], "48799.50");
        assert_eq!(json["SpendByCategory"]["Healthcare"], "1200.50");
    }
}
