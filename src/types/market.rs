use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Wire format for dates exchanged with the analysis service.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchRequest {
    pub ticker: String,
    pub start_date: String,
    pub end_date: String,
}

impl FetchRequest {
    pub fn new(ticker: &str, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            ticker: ticker.to_string(),
            start_date: start.format(DATE_FORMAT).to_string(),
            end_date: end.format(DATE_FORMAT).to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchResponse {
    pub filename: String,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    pub filename: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilesResponse {
    #[serde(default)]
    pub files: Vec<String>,
}

/// Error body attached to non-2xx responses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
}

impl ErrorBody {
    /// The detail message, when the service sent a non-empty string.
    pub fn message(&self) -> Option<String> {
        match &self.detail {
            Some(serde_json::Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
            _ => None,
        }
    }
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, chrono::ParseError> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_request_formats_dates() {
        let req = FetchRequest::new(
            "AAPL",
            NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2023, 6, 1).unwrap(),
        );
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["start_date"], "2023-01-01");
        assert_eq!(json["end_date"], "2023-06-01");
    }

    #[test]
    fn test_error_body_detail() {
        let body: ErrorBody = serde_json::from_str(r#"{"detail": "file not found"}"#).unwrap();
        assert_eq!(body.message().as_deref(), Some("file not found"));

        // FastAPI request-validation errors carry a list, not a message
        let body: ErrorBody = serde_json::from_str(r#"{"detail": [{"loc": ["body"]}]}"#).unwrap();
        assert_eq!(body.message(), None);

        let body: ErrorBody = serde_json::from_str(r#"{"detail": "  "}"#).unwrap();
        assert_eq!(body.message(), None);
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date("2023-01-01").unwrap(), NaiveDate::from_ymd_opt(2023, 1, 1).unwrap());
        assert!(parse_date("01/01/2023").is_err());
    }
}
