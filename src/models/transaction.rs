use crate::error::{FinanceError, FinanceResult};
use crate::models::category::Category;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;

/// Amounts must stay strictly below this magnitude.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(0xD4A5_1000, 0xE8, 0, false, 0); // 1_000_000_000_000
pub const MAX_AMOUNT_SCALE: u32 = 4;

/// Rejects amounts too large or too precise to aggregate safely.
pub fn check_amount(amount: Decimal) -> Result<Decimal, String> {
    if amount.abs() >= MAX_AMOUNT {
        return Err(format!("amount {} is out of range (limit {})", amount, MAX_AMOUNT));
    }
    if amount.normalize().scale() > MAX_AMOUNT_SCALE {
        return Err(format!(
            "amount {} has more than {} decimal places",
            amount, MAX_AMOUNT_SCALE
        ));
    }
    Ok(amount)
}

/// How a transaction entered the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceType {
    ManualEntry,
    ReceiptScan,
    CsvImport,
    SampleData,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::ManualEntry => "manual_entry",
            SourceType::ReceiptScan => "receipt_scan",
            SourceType::CsvImport => "csv_import",
            SourceType::SampleData => "sample_data",
        }
    }
}

impl FromStr for SourceType {
    type Err = FinanceError;

    fn from_str(s: &str) -> FinanceResult<Self> {
        match s {
            "manual_entry" => Ok(SourceType::ManualEntry),
            "receipt_scan" => Ok(SourceType::ReceiptScan),
            "csv_import" => Ok(SourceType::CsvImport),
            "sample_data" => Ok(SourceType::SampleData),
            other => Err(FinanceError::Validation(format!("Unknown source type '{}'", other))),
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored transaction. The id is assigned by the store on insert.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub id: String,
    pub date: NaiveDate,
    pub vendor: String,
    pub amount: Decimal,
    pub category: Category,
    pub note: Option<String>,
    pub source_type: SourceType,
    pub raw_data: Option<String>,
}

/// Validated field values for an insert or edit.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub date: NaiveDate,
    pub vendor: String,
    pub amount: Decimal,
    pub category: Category,
    pub note: Option<String>,
    pub source_type: SourceType,
    pub raw_data: Option<String>,
}

impl NewTransaction {
    pub fn new(
        date: NaiveDate,
        vendor: impl Into<String>,
        amount: Decimal,
        category: Category,
        note: Option<String>,
    ) -> Self {
        Self {
            date,
            vendor: vendor.into(),
            amount,
            category,
            note,
            source_type: SourceType::ManualEntry,
            raw_data: None,
        }
    }

    pub fn with_source(mut self, source_type: SourceType) -> Self {
        self.source_type = source_type;
        self
    }
}

impl From<Transaction> for NewTransaction {
    fn from(t: Transaction) -> Self {
        NewTransaction {
            date: t.date,
            vendor: t.vendor,
            amount: t.amount,
            category: t.category,
            note: t.note,
            source_type: t.source_type,
            raw_data: t.raw_data,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    /// Inclusive lower bound
    pub from: Option<NaiveDate>,
    /// Inclusive upper bound
    pub to: Option<NaiveDate>,
    pub category: Option<Category>,
    pub source_type: Option<SourceType>,
    pub limit: Option<usize>,
}

impl TransactionFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn between(from: NaiveDate, to: NaiveDate) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
            ..Self::default()
        }
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}
