use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;

use crate::error::ApiError;

/// Collects per-field problems so one response reports all of them.
#[derive(Debug, Default)]
pub struct Validator {
    missing: Vec<String>,
    fields: HashMap<String, String>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trimmed value of a required text field; records an error when absent or blank.
    pub fn required(&mut self, field: &str, value: Option<String>) -> String {
        match value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
            Some(v) => v,
            None => {
                self.missing.push(field.to_string());
                self.fields.insert(field.to_string(), "This field is required".to_string());
                String::new()
            }
        }
    }

    /// Field given in an update must not be blanked.
    pub fn not_blank(&mut self, field: &str, value: Option<String>) -> Option<String> {
        match value {
            Some(v) if v.trim().is_empty() => {
                self.error(field, "This field cannot be empty");
                None
            }
            Some(v) => Some(v.trim().to_string()),
            None => None,
        }
    }

    pub fn datetime(&mut self, field: &str, value: Option<&str>) -> Option<NaiveDateTime> {
        let raw = value?;
        match parse_datetime(raw) {
            Some(dt) => Some(dt),
            None => {
                self.error(field, format!("Invalid date: {}", raw));
                None
            }
        }
    }

    pub fn error(&mut self, field: &str, message: impl Into<String>) {
        self.fields.insert(field.to_string(), message.into());
    }

    pub fn finish(self) -> Result<(), ApiError> {
        if self.fields.is_empty() {
            return Ok(());
        }
        let message = if !self.missing.is_empty() {
            let mut missing = self.missing;
            missing.sort();
            format!("Missing required fields: {}", missing.join(", "))
        } else {
            let mut messages: Vec<_> = self.fields.values().cloned().collect();
            messages.sort();
            messages.join("; ")
        };
        Err(ApiError::validation_fields(message, self.fields))
    }
}

/// For update payloads: absent stays `None`, an explicit `null` becomes `Some(None)`.
/// Use with `#[serde(default, deserialize_with = "nullable")]`.
pub fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Trimmed optional text; blank becomes absent.
pub fn optional_text(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Accepts RFC 3339, `YYYY-MM-DDTHH:MM[:SS[.f]]` and bare dates.
pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_portal_date_formats() {
        assert!(parse_datetime("2025-01-01T18:00").is_some());
        assert!(parse_datetime("2025-01-01T18:00:30").is_some());
        assert!(parse_datetime("2025-01-01T18:00:00Z").is_some());
        assert!(parse_datetime("2025-01-01").is_some());
        assert!(parse_datetime("next tuesday").is_none());
    }

    #[test]
    fn reports_all_missing_fields() {
        let mut v = Validator::new();
        v.required("title", None);
        v.required("location", Some("   ".to_string()));
        let title = v.required("description", Some(" ok ".to_string()));
        assert_eq!(title, "ok");

        match v.finish() {
            Err(ApiError::Validation { message, field_errors }) => {
                assert_eq!(message, "Missing required fields: location, title");
                assert_eq!(field_errors.unwrap().len(), 2);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }
}
