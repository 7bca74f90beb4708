//! Month-to-date spend per category compared against configured limits.

use crate::db::{budget_repository, repository};
use crate::error::{FinanceError, FinanceResult};
use crate::models::budget::MonthKey;
use crate::models::category::Category;
use crate::models::transaction::{Transaction, TransactionFilter};
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::fmt;

/// Utilisation (in percent) from which a line counts as near its limit.
pub const NEAR_LIMIT_PERCENT: u32 = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetStatus {
    Unbudgeted,
    Ok,
    AtLimit,
    Exceeded,
}

impl BudgetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BudgetStatus::Unbudgeted => "unbudgeted",
            BudgetStatus::Ok => "ok",
            BudgetStatus::AtLimit => "at-limit",
            BudgetStatus::Exceeded => "exceeded",
        }
    }

    /// Exact decimal comparison, no rounding tolerance.
    pub fn classify(spent: Decimal, limit: Option<Decimal>) -> Self {
        match limit {
            None => BudgetStatus::Unbudgeted,
            Some(limit) if spent < limit => BudgetStatus::Ok,
            Some(limit) if spent == limit => BudgetStatus::AtLimit,
            Some(_) => BudgetStatus::Exceeded,
        }
    }
}

impl fmt::Display for BudgetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BudgetLine {
    pub spent: Decimal,
    pub limit: Option<Decimal>,
    pub status: BudgetStatus,
}

impl BudgetLine {
    pub fn new(spent: Decimal, limit: Option<Decimal>) -> Self {
        Self {
            spent,
            limit,
            status: BudgetStatus::classify(spent, limit),
        }
    }

    pub fn remaining(&self) -> Option<Decimal> {
        self.limit.and_then(|limit| limit.checked_sub(self.spent))
    }

    /// `None` without a positive limit or when the ratio is not representable.
    pub fn utilization_percent(&self) -> Option<Decimal> {
        self.limit
            .filter(|limit| *limit > Decimal::ZERO)
            .and_then(|limit| self.spent.checked_div(limit))
            .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
            .map(|pct| pct.round_dp(1))
    }

    pub fn is_near_limit(&self) -> bool {
        self.status == BudgetStatus::Ok
            && self
                .utilization_percent()
                .is_some_and(|pct| pct >= Decimal::from(NEAR_LIMIT_PERCENT))
    }
}

/// Groups the given transactions' amounts by category, keeping only dates
/// inside `month`.
pub fn spend_by_category(
    transactions: &[Transaction],
    month: MonthKey,
) -> FinanceResult<BTreeMap<Category, Decimal>> {
    let mut totals: BTreeMap<Category, Decimal> = BTreeMap::new();
    for transaction in transactions.iter().filter(|t| month.contains(t.date)) {
        let total = totals.entry(transaction.category).or_insert(Decimal::ZERO);
        *total = total
            .checked_add(transaction.amount)
            .ok_or_else(|| FinanceError::total_overflow(transaction.category, month))?;
    }
    Ok(totals)
}

/// Pure combination step: every category present in either map gets a line.
pub fn combine(
    spent: &BTreeMap<Category, Decimal>,
    budgets: &BTreeMap<Category, Decimal>,
) -> BTreeMap<Category, BudgetLine> {
    let mut lines = BTreeMap::new();
    for category in spent.keys().chain(budgets.keys()) {
        if lines.contains_key(category) {
            continue;
        }
        let total = spent.get(category).copied().unwrap_or(Decimal::ZERO);
        lines.insert(*category, BudgetLine::new(total, budgets.get(category).copied()));
    }
    lines
}

pub fn evaluate(conn: &Connection, month: MonthKey) -> FinanceResult<BTreeMap<Category, BudgetLine>> {
    let filter = TransactionFilter::between(month.first_day(), month.last_day());
    let transactions = repository::list_transactions(conn, &filter)?;
    let budgets = budget_repository::get_budgets(conn, month)?;

    let lines = combine(&spend_by_category(&transactions, month)?, &budgets);
    log::debug!("Evaluated {} budget line(s) for {}", lines.len(), month);
    Ok(lines)
}

pub fn evaluate_category(
    conn: &Connection,
    category: Category,
    month: MonthKey,
) -> FinanceResult<BudgetLine> {
    let lines = evaluate(conn, month)?;
    Ok(lines
        .get(&category)
        .cloned()
        .unwrap_or_else(|| BudgetLine::new(Decimal::ZERO, None)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connection::establish_test_connection;
    use crate::models::transaction::NewTransaction;
    use chrono::NaiveDate;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn month(s: &str) -> MonthKey {
        s.parse().unwrap()
    }

    fn add(conn: &Connection, date: &str, vendor: &str, amount: &str, category: Category) {
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap();
        repository::add_transaction(conn, &NewTransaction::new(date, vendor, dec(amount), category, None))
            .unwrap();
    }

    #[test]
    fn test_classify_boundaries() {
        assert_eq!(BudgetStatus::classify(dec("99.99"), Some(dec("100.00"))), BudgetStatus::Ok);
        assert_eq!(BudgetStatus::classify(dec("100.00"), Some(dec("100.00"))), BudgetStatus::AtLimit);
        assert_eq!(BudgetStatus::classify(dec("100"), Some(dec("100.00"))), BudgetStatus::AtLimit);
        assert_eq!(BudgetStatus::classify(dec("100.01"), Some(dec("100.00"))), BudgetStatus::Exceeded);
        assert_eq!(BudgetStatus::classify(dec("5"), None), BudgetStatus::Unbudgeted);
    }

    #[test]
    fn test_decimal_sums_do_not_drift() {
        // 0.1 + 0.2 == 0.3 exactly in decimal
        let conn = establish_test_connection().unwrap();
        add(&conn, "2024-03-01", "A", "0.1", Category::Food);
        add(&conn, "2024-03-02", "B", "0.2", Category::Food);
        budget_repository::upsert_budget(&conn, Category::Food, month("2024-03"), dec("0.3")).unwrap();

        let lines = evaluate(&conn, month("2024-03")).unwrap();
        assert_eq!(lines[&Category::Food].status, BudgetStatus::AtLimit);
    }

    #[test]
    fn test_coffee_scenario() {
        let conn = establish_test_connection().unwrap();
        add(&conn, "2024-01-05", "Coffee", "4.50", Category::Food);
        add(&conn, "2024-01-20", "Coffee", "3.50", Category::Food);
        budget_repository::upsert_budget(&conn, Category::Food, month("2024-01"), dec("10.00")).unwrap();

        let lines = evaluate(&conn, month("2024-01")).unwrap();
        assert_eq!(lines.len(), 1);
        let food = &lines[&Category::Food];
        assert_eq!(food.spent, dec("8.00"));
        assert_eq!(food.limit, Some(dec("10.00")));
        assert_eq!(food.status, BudgetStatus::Ok);
        assert_eq!(food.remaining(), Some(dec("2.00")));
        assert_eq!(food.utilization_percent(), Some(dec("80.0")));
        assert!(food.is_near_limit());
    }

    #[test]
    fn test_at_limit_and_exceeded() {
        let conn = establish_test_connection().unwrap();
        add(&conn, "2024-01-10", "Grocer", "100.00", Category::Food);
        add(&conn, "2024-01-10", "Mall", "100.01", Category::Shopping);
        budget_repository::upsert_budget(&conn, Category::Food, month("2024-01"), dec("100.00")).unwrap();
        budget_repository::upsert_budget(&conn, Category::Shopping, month("2024-01"), dec("100.00")).unwrap();

        let lines = evaluate(&conn, month("2024-01")).unwrap();
        assert_eq!(lines[&Category::Food].status, BudgetStatus::AtLimit);
        assert_eq!(lines[&Category::Shopping].status, BudgetStatus::Exceeded);
        assert!(!lines[&Category::Shopping].is_near_limit());
    }

    #[test]
    fn test_unbudgeted_category_has_no_limit() {
        let conn = establish_test_connection().unwrap();
        add(&conn, "2024-01-10", "Cinema", "12.00", Category::Entertainment);

        let lines = evaluate(&conn, month("2024-01")).unwrap();
        let line = &lines[&Category::Entertainment];
        assert_eq!(line.status, BudgetStatus::Unbudgeted);
        assert!(line.limit.is_none());
        assert!(line.remaining().is_none());
        assert!(line.utilization_percent().is_none());
    }

    #[test]
    fn test_budget_without_spend_is_ok() {
        let conn = establish_test_connection().unwrap();
        budget_repository::upsert_budget(&conn, Category::Utilities, month("2024-01"), dec("50")).unwrap();

        let lines = evaluate(&conn, month("2024-01")).unwrap();
        assert_eq!(lines[&Category::Utilities].spent, Decimal::ZERO);
        assert_eq!(lines[&Category::Utilities].status, BudgetStatus::Ok);
    }

    #[test]
    fn test_other_months_are_ignored() {
        let conn = establish_test_connection().unwrap();
        add(&conn, "2023-12-31", "Late", "50", Category::Food);
        add(&conn, "2024-01-31", "In", "5", Category::Food);
        add(&conn, "2024-02-01", "Early", "50", Category::Food);

        let lines = evaluate(&conn, month("2024-01")).unwrap();
        assert_eq!(lines[&Category::Food].spent, dec("5"));
    }

    fn stored(amount: Decimal) -> Transaction {
        Transaction {
            id: "t".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            vendor: "Vendor".to_string(),
            amount,
            category: Category::Food,
            note: None,
            source_type: crate::models::transaction::SourceType::ManualEntry,
            raw_data: None,
        }
    }

    #[test]
    fn test_spend_overflow_is_an_error() {
        let transactions = vec![stored(Decimal::MAX), stored(Decimal::MAX)];
        let err = spend_by_category(&transactions, month("2024-01")).unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("Food"));
    }

    #[test]
    fn test_utilization_with_tiny_limit_is_none() {
        let line = BudgetLine::new(dec("1000"), Some(Decimal::new(1, 27)));
        assert_eq!(line.status, BudgetStatus::Exceeded);
        assert!(line.utilization_percent().is_none());
        assert!(!line.is_near_limit());
    }

    #[test]
    fn test_evaluate_empty_month() {
        let conn = establish_test_connection().unwrap();
        assert!(evaluate(&conn, month("2024-01")).unwrap().is_empty());
    }

    #[test]
    fn test_evaluate_category_without_data() {
        let conn = establish_test_connection().unwrap();
        let line = evaluate_category(&conn, Category::Food, month("2024-01")).unwrap();
        assert_eq!(line.status, BudgetStatus::Unbudgeted);
        assert_eq!(line.spent, Decimal::ZERO);
    }
}
