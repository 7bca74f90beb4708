use crate::models::transaction::check_amount;
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::LazyLock;

// A run of digits that may contain group separators and a decimal point.
static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.?\d(?:[\d.,\s]*\d)?").unwrap());

/// Parses a human or model supplied amount such as `"₹1,234.50"` or `"$ 4.50"`.
///
/// Currency markers are stripped and well-formed digit groups (`1,234`,
/// `12,00,000`, `1 234`) are joined. A separator that could be a decimal comma
/// (`4,50`) is rejected, as is anything else that is not a decimal afterwards.
pub fn normalize_amount(raw: &str) -> Result<Decimal, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("amount is empty".to_string());
    }
    let not_numeric = || format!("amount '{}' is not numeric", trimmed);

    let number = NUMBER.find(trimmed).ok_or_else(not_numeric)?;
    if NUMBER.is_match(&trimmed[number.end()..]) {
        return Err(not_numeric());
    }

    let negative = trimmed[..number.start()].contains('-')
        || (trimmed.starts_with('(') && trimmed.ends_with(')'));

    let digits = join_groups(number.as_str()).ok_or_else(|| {
        format!("amount '{}' has ambiguous digit grouping", trimmed)
    })?;
    let value = Decimal::from_str(&digits).map_err(|_| not_numeric())?;
    check_amount(if negative { -value } else { value })
}

/// Joins the integer groups of `run` when they form a thousands (`1,234,567`)
/// or Indian (`12,34,567`) grouping. The last group must have three digits.
fn join_groups(run: &str) -> Option<String> {
    let (int_part, fraction) = match run.split_once('.') {
        Some((int_part, fraction)) => (int_part, Some(fraction)),
        None => (run, None),
    };
    if let Some(fraction) = fraction {
        if fraction.is_empty() || !fraction.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
    }

    let groups: Vec<&str> = int_part
        .split(|c: char| c == ',' || c.is_whitespace())
        .collect();
    if groups.len() > 1 {
        let (first, rest) = groups.split_first()?;
        let (last, middle) = rest.split_last()?;
        let well_formed = (1..=3).contains(&first.len())
            && last.len() == 3
            && middle.iter().all(|g| g.len() == 2 || g.len() == 3);
        if !well_formed {
            return None;
        }
    }

    let mut joined: String = groups.concat();
    if joined.is_empty() {
        joined.push('0');
    }
    if let Some(fraction) = fraction {
        joined.push('.');
        joined.push_str(fraction);
    }
    Some(joined)
}
