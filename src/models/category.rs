use crate::error::{FinanceError, FinanceResult};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// The fixed set of spending categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Category {
    Food,
    Transportation,
    Entertainment,
    Utilities,
    Shopping,
    Healthcare,
    Other,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Food,
        Category::Transportation,
        Category::Entertainment,
        Category::Utilities,
        Category::Shopping,
        Category::Healthcare,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Food => "Food",
            Category::Transportation => "Transportation",
            Category::Entertainment => "Entertainment",
            Category::Utilities => "Utilities",
            Category::Shopping => "Shopping",
            Category::Healthcare => "Healthcare",
            Category::Other => "Other",
        }
    }

    pub fn allowed_list() -> String {
        Self::ALL
            .iter()
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Lenient mapping for labels coming back from the AI model.
    pub fn from_model_label(label: Option<&str>) -> Category {
        label
            .and_then(|l| l.parse::<Category>().ok())
            .unwrap_or(Category::Other)
    }
}

impl FromStr for Category {
    type Err = FinanceError;

    fn from_str(s: &str) -> FinanceResult<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(FinanceError::Validation("Category cannot be empty".to_string()));
        }
        Self::ALL
            .iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(trimmed))
            .copied()
            .ok_or_else(|| {
                FinanceError::Validation(format!(
                    "Unknown category '{}'. Use one of: {}",
                    trimmed,
                    Self::allowed_list()
                ))
            })
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
