use crate::models::budget::MonthKey;
use crate::models::category::Category;

#[derive(Debug, Clone)]
pub struct BudgetAlert {
    pub id: i64,
    pub category: Category,
    pub month: MonthKey,
    pub message: String,
    pub created_at: String,
}
