use serde::{Deserialize, Serialize};

use super::error::FilterError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterOrderInfo {
    pub field: String,
    pub sort: SortDirection,
}

/// Equality condition on a single field. Array fields match when they contain the value.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterWhereInfo {
    pub field: String,
    pub value: String,
}

/// Case-insensitive substring match over a fixed set of fields.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterSearch {
    pub text: String,
    pub fields: &'static [&'static str],
}

/// Which fields a list endpoint exposes for filtering, searching and sorting.
#[derive(Debug, Clone, Copy)]
pub struct FilterSpec {
    pub filters: &'static [&'static str],
    pub search_fields: &'static [&'static str],
    /// `None` allows any well-formed field name (JSON documents)
    pub sort_fields: Option<&'static [&'static str]>,
    pub default_order: (&'static str, SortDirection),
}

/// Physical layout the SQL generator targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlTarget {
    /// `documents` table: metadata columns plus a JSONB `data` payload
    Documents,
    /// `users` table: one column per field
    Users,
}

impl SqlTarget {
    /// Text expression for equality and search conditions
    pub fn text_expr(&self, field: &str) -> Result<String, FilterError> {
        match self {
            SqlTarget::Documents => Ok(match field {
                "id" => "id::text".to_string(),
                "createdBy" => "created_by".to_string(),
                "createdAt" => "created_at::text".to_string(),
                "updatedAt" => "updated_at::text".to_string(),
                other => format!("data->>'{}'", other),
            }),
            SqlTarget::Users => Self::user_column(field).map(|c| format!("{}::text", c)),
        }
    }

    /// Expression used for ordering; JSONB keeps numbers numeric
    pub fn order_expr(&self, field: &str) -> Result<String, FilterError> {
        match self {
            SqlTarget::Documents => Ok(match field {
                "id" => "id".to_string(),
                "createdBy" => "created_by".to_string(),
                "createdAt" => "created_at".to_string(),
                "updatedAt" => "updated_at".to_string(),
                other => format!("data->'{}'", other),
            }),
            SqlTarget::Users => Self::user_column(field).map(str::to_string),
        }
    }

    /// Whether `field` holds a JSON array (containment instead of equality)
    pub fn array_expr(&self, field: &str) -> Option<String> {
        match self {
            SqlTarget::Documents => Some(format!("data->'{}'", field)),
            SqlTarget::Users => None,
        }
    }

    fn user_column(field: &str) -> Result<&'static str, FilterError> {
        Ok(match field {
            "id" => "id",
            "email" => "email",
            "role" => "role",
            "displayName" => "display_name",
            "phone" => "phone",
            "unit" => "unit",
            "block" => "block",
            "flatNumber" => "flat_number",
            "createdAt" => "created_at",
            "updatedAt" => "updated_at",
            other => return Err(FilterError::InvalidField(other.to_string())),
        })
    }
}

#[derive(Debug, Clone)]
pub struct SqlResult {
    pub query: String,
    pub params: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u64,
}

impl Pagination {
    pub fn new(page: u32, limit: u32, total: u64) -> Self {
        let total_pages = if limit == 0 { 0 } else { total.div_ceil(limit as u64) };
        Self { page, limit, total, total_pages }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

impl<T> Page<T> {
    pub fn try_map<U, E>(self, f: impl FnMut(T) -> Result<U, E>) -> Result<Page<U>, E> {
        Ok(Page {
            items: self.items.into_iter().map(f).collect::<Result<Vec<_>, E>>()?,
            pagination: self.pagination,
        })
    }
}
