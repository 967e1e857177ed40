use std::collections::HashMap;
use thiserror::Error;

use crate::error::ApiError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    #[error("Invalid field name: {0}")]
    InvalidField(String),

    #[error("Cannot sort by {0}")]
    UnsupportedSort(String),

    #[error("Invalid sort order: {0}")]
    InvalidOrder(String),

    #[error("Invalid page: {0}")]
    InvalidPage(String),

    #[error("Invalid limit: {0}")]
    InvalidLimit(String),

    #[error("JSON conversion error: {0}")]
    Json(String),
}

impl From<serde_json::Error> for FilterError {
    fn from(err: serde_json::Error) -> Self {
        FilterError::Json(err.to_string())
    }
}

impl From<FilterError> for ApiError {
    fn from(err: FilterError) -> Self {
        let field = match &err {
            FilterError::Json(msg) => return ApiError::upstream(format!("filter serialization: {}", msg)),
            FilterError::InvalidField(name) => name.clone(),
            FilterError::UnsupportedSort(_) => "sort".to_string(),
            FilterError::InvalidOrder(_) => "order".to_string(),
            FilterError::InvalidPage(_) => "page".to_string(),
            FilterError::InvalidLimit(_) => "limit".to_string(),
        };
        let message = err.to_string();
        ApiError::validation_fields(message.clone(), HashMap::from([(field, message)]))
    }
}
