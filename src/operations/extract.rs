//! Receipt image to transaction fields via an external vision model.
//!
//! Extraction never touches the store. The caller reviews the returned
//! [`ExtractedFields`] and decides whether to persist them.

use crate::config::AiConfig;
use crate::error::{FinanceError, FinanceResult};
use crate::models::category::Category;
use crate::models::transaction::{NewTransaction, SourceType};
use crate::operations::amount::normalize_amount;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};

pub const RECEIPT_PROMPT: &str = r#"Extract from this receipt and return ONLY valid JSON:
{
    "vendor": "store name",
    "date": "YYYY-MM-DD",
    "total_amount": 0.00,
    "category": "Food",
    "items": [{"name": "item", "price": 0.00}]
}
Categories: Food, Transportation, Entertainment, Utilities, Shopping, Healthcare, Other"#;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// A model that answers a text prompt about one image.
pub trait VisionModel {
    fn generate(&self, image: &[u8], mime_type: &str, prompt: &str) -> FinanceResult<String>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReceiptItem {
    pub name: String,
    pub price: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedFields {
    pub vendor: String,
    pub amount: Decimal,
    pub date: Option<NaiveDate>,
    pub category: Category,
    pub items: Vec<ReceiptItem>,
    /// The model's JSON payload, kept alongside the saved transaction
    pub raw_json: String,
}

impl ExtractedFields {
    pub fn into_new_transaction(self, fallback_date: NaiveDate) -> NewTransaction {
        let note = Some(format!("Receipt from {}", self.vendor));
        NewTransaction {
            date: self.date.unwrap_or(fallback_date),
            vendor: self.vendor,
            amount: self.amount,
            category: self.category,
            note,
            source_type: SourceType::ReceiptScan,
            raw_data: Some(self.raw_json),
        }
    }
}

pub struct ReceiptExtractor<M: VisionModel> {
    model: M,
}

impl<M: VisionModel> ReceiptExtractor<M> {
    pub fn new(model: M) -> Self {
        Self { model }
    }

    pub fn extract(&self, image_bytes: &[u8]) -> FinanceResult<ExtractedFields> {
        let mime_type = sniff_image_type(image_bytes)?;
        let started = Instant::now();
        let response = self
            .model
            .generate(image_bytes, mime_type, RECEIPT_PROMPT)
            .map_err(|e| {
                if e.is_extraction() {
                    e
                } else {
                    FinanceError::Extraction(e.to_string())
                }
            })?;
        log::info!(
            "Receipt model answered in {} ms ({} bytes {})",
            started.elapsed().as_millis(),
            image_bytes.len(),
            mime_type
        );
        parse_receipt_response(&response)
    }
}

/// Detects the image format from its magic bytes.
pub fn sniff_image_type(bytes: &[u8]) -> FinanceResult<&'static str> {
    if bytes.is_empty() {
        return Err(FinanceError::Extraction("Image is empty".to_string()));
    }
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Ok("image/jpeg")
    } else if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        Ok("image/png")
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Ok("image/webp")
    } else {
        Err(FinanceError::Extraction(
            "Unsupported image format, expected JPEG, PNG or WEBP".to_string(),
        ))
    }
}

fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // drop an optional language tag such as "json"
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest.trim_start_matches("json"),
    };
    body.trim_end().trim_end_matches("```").trim()
}

fn amount_from_value(value: Option<&Value>) -> Option<Result<Decimal, String>> {
    match value? {
        Value::Null => None,
        Value::Number(n) => Some(normalize_amount(&n.to_string())),
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(normalize_amount(s)),
        other => Some(Err(format!("amount has unexpected type: {}", other))),
    }
}

/// Parses the model's answer into [`ExtractedFields`].
pub fn parse_receipt_response(text: &str) -> FinanceResult<ExtractedFields> {
    let body = strip_code_fences(text);
    let json: Value = serde_json::from_str(body)
        .map_err(|e| FinanceError::Extraction(format!("Model response is not valid JSON: {}", e)))?;
    let object = json
        .as_object()
        .ok_or_else(|| FinanceError::Extraction("Model response is not a JSON object".to_string()))?;

    let vendor = object
        .get("vendor")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| FinanceError::Extraction("Response is missing 'vendor'".to_string()))?
        .to_string();

    let amount = amount_from_value(object.get("total_amount"))
        .or_else(|| amount_from_value(object.get("amount")))
        .ok_or_else(|| FinanceError::Extraction("Response is missing 'amount'".to_string()))?
        .map_err(FinanceError::Extraction)?;

    let date = object
        .get("date")
        .and_then(Value::as_str)
        .and_then(|d| NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d").ok());

    let category = Category::from_model_label(object.get("category").and_then(Value::as_str));

    let items = object
        .get("items")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    let name = item.get("name")?.as_str()?.trim().to_string();
                    let price = amount_from_value(item.get("price")).and_then(Result::ok);
                    Some(ReceiptItem { name, price })
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(ExtractedFields {
        vendor,
        amount,
        date,
        category,
        items,
        raw_json: json.to_string(),
    })
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    InlineData { inline_data: InlineData },
    Text { text: &'a str },
}

#[derive(Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "responseMimeType")]
    response_mime_type: &'static str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

/// Google Gemini `generateContent` over REST.
pub struct GeminiClient {
    http: reqwest::blocking::Client,
    api_key: String,
    url: String,
}

impl GeminiClient {
    pub fn new(config: &AiConfig) -> FinanceResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| FinanceError::Config("GEMINI_API_KEY is not set".to_string()))?;
        let http = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| FinanceError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            api_key,
            url: format!(
                "{}/models/{}:generateContent",
                config.endpoint.trim_end_matches('/'),
                config.model
            ),
        })
    }
}

impl VisionModel for GeminiClient {
    fn generate(&self, image: &[u8], mime_type: &str, prompt: &str) -> FinanceResult<String> {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: mime_type.to_string(),
                            data: STANDARD.encode(image),
                        },
                    },
                    Part::Text { text: prompt },
                ],
            }],
            generation_config: GenerationConfig {
                temperature: 0.0,
                response_mime_type: "application/json",
            },
        };

        let response = self
            .http
            .post(&self.url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .map_err(|e| FinanceError::Extraction(format!("AI request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            log::warn!("Gemini returned {}", status);
            return Err(FinanceError::Extraction(format!(
                "AI service returned {}: {}",
                status,
                body.chars().take(300).collect::<String>()
            )));
        }

        let parsed: GenerateResponse = response
            .json()
            .map_err(|e| FinanceError::Extraction(format!("Unreadable AI response: {}", e)))?;

        parsed
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .find_map(|p| p.text)
            .ok_or_else(|| FinanceError::Extraction("AI response contained no text".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connection::establish_test_connection;
    use crate::db::repository;
    use std::cell::Cell;
    use std::str::FromStr;

    const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
    const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10];

    struct FakeModel {
        reply: Result<String, String>,
        calls: Cell<usize>,
    }

    impl FakeModel {
        fn answering(text: &str) -> Self {
            Self {
                reply: Ok(text.to_string()),
                calls: Cell::new(0),
            }
        }

        fn failing(message: &str) -> Self {
            Self {
                reply: Err(message.to_string()),
                calls: Cell::new(0),
            }
        }
    }

    impl VisionModel for &FakeModel {
        fn generate(&self, _image: &[u8], _mime_type: &str, prompt: &str) -> FinanceResult<String> {
            assert!(prompt.contains("total_amount"));
            self.calls.set(self.calls.get() + 1);
            self.reply.clone().map_err(FinanceError::Extraction)
        }
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_extract_full_response() {
        let model = FakeModel::answering(
            r#"```json
{"vendor": "Starbucks", "date": "2024-01-05", "total_amount": "₹1,204.50", "category": "Food",
 "items": [{"name": "Latte", "price": 4.5}, {"name": "Cake", "price": "n/a"}]}
```"#,
        );
        let extractor = ReceiptExtractor::new(&model);

        let fields = extractor.extract(JPEG).unwrap();
        assert_eq!(fields.vendor, "Starbucks");
        assert_eq!(fields.amount, dec("1204.50"));
        assert_eq!(fields.date, NaiveDate::from_ymd_opt(2024, 1, 5));
        assert_eq!(fields.category, Category::Food);
        assert_eq!(fields.items.len(), 2);
        assert_eq!(fields.items[0].price, Some(dec("4.5")));
        assert_eq!(fields.items[1].price, None);
        assert_eq!(model.calls.get(), 1);
    }

    #[test]
    fn test_numeric_amount_and_plain_amount_key() {
        let fields = parse_receipt_response(r#"{"vendor": "Uber", "amount": 23.75}"#).unwrap();
        assert_eq!(fields.amount, dec("23.75"));
        assert_eq!(fields.category, Category::Other);
        assert!(fields.date.is_none());
    }

    #[test]
    fn test_missing_amount_is_extraction_error_without_store_write() {
        let conn = establish_test_connection().unwrap();
        let model = FakeModel::answering(r#"{"vendor": "Starbucks", "date": "2024-01-05"}"#);
        let extractor = ReceiptExtractor::new(&model);

        let result = extractor.extract(PNG);
        let err = result.unwrap_err();
        assert!(err.is_extraction());
        assert!(err.to_string().contains("amount"));
        assert_eq!(repository::count_transactions(&conn).unwrap(), 0);
    }

    #[test]
    fn test_missing_vendor_is_extraction_error() {
        let result = parse_receipt_response(r#"{"vendor": "  ", "total_amount": 5}"#);
        assert!(result.unwrap_err().to_string().contains("vendor"));
    }

    #[test]
    fn test_unparsable_amount_is_not_zero() {
        let result = parse_receipt_response(r#"{"vendor": "Shop", "total_amount": "about ten"}"#);
        assert!(result.unwrap_err().is_extraction());
    }

    #[test]
    fn test_null_amount_is_missing() {
        let result = parse_receipt_response(r#"{"vendor": "Shop", "total_amount": null}"#);
        assert!(result.unwrap_err().to_string().contains("missing"));
    }

    #[test]
    fn test_non_json_response() {
        let result = parse_receipt_response("Sorry, I cannot read this receipt.");
        assert!(result.unwrap_err().is_extraction());
    }

    #[test]
    fn test_invalid_date_is_dropped() {
        let fields =
            parse_receipt_response(r#"{"vendor": "Shop", "total_amount": 3, "date": "05/01/2024"}"#)
                .unwrap();
        assert!(fields.date.is_none());
    }

    #[test]
    fn test_model_failure_is_extraction_error() {
        let model = FakeModel::failing("API key not valid");
        let extractor = ReceiptExtractor::new(&model);
        let err = extractor.extract(JPEG).unwrap_err();
        assert!(err.is_extraction());
        assert!(err.to_string().contains("API key not valid"));
    }

    #[test]
    fn test_unknown_image_never_reaches_model() {
        let model = FakeModel::answering(r#"{"vendor": "X", "total_amount": 1}"#);
        let extractor = ReceiptExtractor::new(&model);

        assert!(extractor.extract(b"GIF89a....").unwrap_err().is_extraction());
        assert!(extractor.extract(&[]).unwrap_err().is_extraction());
        assert_eq!(model.calls.get(), 0);
    }

    #[test]
    fn test_sniff_image_type() {
        assert_eq!(sniff_image_type(JPEG).unwrap(), "image/jpeg");
        assert_eq!(sniff_image_type(PNG).unwrap(), "image/png");
        assert_eq!(sniff_image_type(b"RIFF\0\0\0\0WEBPVP8 ").unwrap(), "image/webp");
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("  {}  "), "{}");
    }

    #[test]
    fn test_into_new_transaction_uses_fallback_date() {
        let fields = parse_receipt_response(r#"{"vendor": "Amazon", "total_amount": "45.99", "category": "shopping"}"#)
            .unwrap();
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();

        let new = fields.into_new_transaction(today);
        assert_eq!(new.date, today);
        assert_eq!(new.category, Category::Shopping);
        assert_eq!(new.source_type, SourceType::ReceiptScan);
        assert_eq!(new.note.as_deref(), Some("Receipt from Amazon"));
        assert!(new.raw_data.unwrap().contains("Amazon"));
    }

    #[test]
    fn test_gemini_client_requires_key() {
        let config = AiConfig {
            api_key: None,
            model: "m".to_string(),
            endpoint: "http://localhost".to_string(),
        };
        assert!(matches!(GeminiClient::new(&config), Err(FinanceError::Config(_))));
    }
}
