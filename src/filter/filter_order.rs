use serde_json::Value;
use std::cmp::Ordering;

use super::error::FilterError;
use super::types::{FilterOrderInfo, SortDirection, SqlTarget};

pub struct FilterOrder;

impl FilterOrder {
    /// Parse `sort` / `order` query parameters, e.g. `sort=date&order=desc`.
    pub fn parse(sort: &str, order: Option<&str>) -> Result<FilterOrderInfo, FilterError> {
        let field = sort.trim();
        super::filter::Filter::validate_field(field)?;
        let sort = match order.map(|o| o.trim().to_ascii_lowercase()).as_deref() {
            None | Some("") | Some("asc") => SortDirection::Asc,
            Some("desc") => SortDirection::Desc,
            Some(other) => return Err(FilterError::InvalidOrder(other.to_string())),
        };
        Ok(FilterOrderInfo { field: field.to_string(), sort })
    }

    pub fn generate(info: &FilterOrderInfo, target: SqlTarget) -> Result<String, FilterError> {
        // id as tie-breaker keeps pages stable
        Ok(format!(
            "ORDER BY {} {} NULLS LAST, id {}",
            target.order_expr(&info.field)?,
            info.sort.to_sql(),
            info.sort.to_sql()
        ))
    }

    pub fn compare(a: &Value, b: &Value, info: &FilterOrderInfo) -> Ordering {
        let ordering = match (a.get(&info.field), b.get(&info.field)) {
            (Some(x), Some(y)) => compare_values(x, y),
            // Missing values sort last in both directions
            (Some(_), None) => return Ordering::Less,
            (None, Some(_)) => return Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        match info.sort {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        _ => Ordering::Equal,
    }
}
