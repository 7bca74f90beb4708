use crate::error::{FinanceError, FinanceResult};
use crate::models::category::Category;
use crate::models::transaction::Transaction;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Headline figures for a set of transactions.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub total_spent: Decimal,
    pub average: Decimal,
    pub count: usize,
    pub category_count: usize,
    /// Largest spend first.
    pub by_category: Vec<(Category, Decimal)>,
    pub recent: Vec<Transaction>,
}

/// `transactions` is expected newest first, as the store returns them.
pub fn build_summary(transactions: &[Transaction], recent_n: usize) -> FinanceResult<Summary> {
    let mut totals: HashMap<Category, Decimal> = HashMap::new();
    for transaction in transactions {
        let total = totals.entry(transaction.category).or_insert(Decimal::ZERO);
        *total = total
            .checked_add(transaction.amount)
            .ok_or_else(|| FinanceError::total_overflow(transaction.category, "all transactions"))?;
    }

    let total_spent = totals.values().try_fold(Decimal::ZERO, |acc, v| {
        acc.checked_add(*v)
            .ok_or_else(|| FinanceError::Validation("Total spent is out of range".to_string()))
    })?;
    let count = transactions.len();
    let average = total_spent
        .checked_div(Decimal::from(count))
        .map(|avg| avg.round_dp(2))
        .unwrap_or(Decimal::ZERO);

    let mut by_category: Vec<(Category, Decimal)> = totals.into_iter().collect();
    by_category.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    Ok(Summary {
        total_spent,
        average,
        count,
        category_count: by_category.len(),
        by_category,
        recent: transactions.iter().take(recent_n).cloned().collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::transaction::SourceType;
    use chrono::NaiveDate;
    use std::str::FromStr;

    fn tx(vendor: &str, amount: &str, category: Category) -> Transaction {
        Transaction {
            id: vendor.to_string(),
            date: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            vendor: vendor.to_string(),
            amount: Decimal::from_str(amount).unwrap(),
            category,
            note: None,
            source_type: SourceType::ManualEntry,
            raw_data: None,
        }
    }

    #[test]
    fn test_summary_of_nothing() {
        let summary = build_summary(&[], 5).unwrap();
        assert_eq!(summary.total_spent, Decimal::ZERO);
        assert_eq!(summary.average, Decimal::ZERO);
        assert_eq!(summary.count, 0);
        assert!(summary.by_category.is_empty());
        assert!(summary.recent.is_empty());
    }

    #[test]
    fn test_summary_totals_and_ordering() {
        let transactions = vec![
            tx("Cafe", "4.50", Category::Food),
            tx("Bus", "20.00", Category::Transportation),
            tx("Deli", "10.00", Category::Food),
        ];

        let summary = build_summary(&transactions, 2).unwrap();
        assert_eq!(summary.total_spent, Decimal::from_str("34.50").unwrap());
        assert_eq!(summary.average, Decimal::from_str("11.50").unwrap());
        assert_eq!(summary.count, 3);
        assert_eq!(summary.category_count, 2);
        assert_eq!(summary.by_category[0], (Category::Transportation, Decimal::from_str("20.00").unwrap()));
        assert_eq!(summary.by_category[1].1, Decimal::from_str("14.50").unwrap());
        assert_eq!(summary.recent.len(), 2);
        assert_eq!(summary.recent[0].vendor, "Cafe");
    }

    #[test]
    fn test_summary_average_rounds_to_cents() {
        let transactions = vec![
            tx("A", "1", Category::Other),
            tx("B", "1", Category::Other),
            tx("C", "1.01", Category::Other),
        ];
        assert_eq!(build_summary(&transactions, 0).unwrap().average, Decimal::from_str("1.00").unwrap());
    }

    #[test]
    fn test_summary_overflow_is_an_error() {
        let transactions = vec![
            tx("A", "79228162514264337593543950335", Category::Food),
            tx("B", "79228162514264337593543950335", Category::Shopping),
        ];
        assert!(build_summary(&transactions, 5).unwrap_err().is_validation());

        let same_category = vec![
            tx("A", "79228162514264337593543950335", Category::Food),
            tx("B", "1", Category::Food),
        ];
        assert!(build_summary(&same_category, 5).is_err());
    }
}
