use serde::Serialize;
use std::collections::HashMap;

use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::filter_where::FilterWhere;
use super::types::{FilterOrderInfo, FilterSearch, FilterSpec, FilterWhereInfo, Page, Pagination, SqlResult, SqlTarget};
use crate::config::ApiConfig;

/// Parsed list request: equality filters, search, ordering and page window.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    conditions: Vec<FilterWhereInfo>,
    search: Option<FilterSearch>,
    order: FilterOrderInfo,
    page: u32,
    limit: u32,
}

impl Filter {
    pub fn new(spec: &FilterSpec, api: &ApiConfig) -> Self {
        Self {
            conditions: vec![],
            search: None,
            order: FilterOrderInfo { field: spec.default_order.0.to_string(), sort: spec.default_order.1 },
            page: 1,
            limit: api.default_page_size,
        }
    }

    /// Build from query string parameters. Unknown parameters are ignored; an unknown sort field is not.
    pub fn from_params(params: &HashMap<String, String>, spec: &FilterSpec, api: &ApiConfig) -> Result<Self, FilterError> {
        let mut filter = Self::new(spec, api);

        if let Some(page) = params.get("page") {
            let page: u32 = page.trim().parse().map_err(|_| FilterError::InvalidPage(page.clone()))?;
            if page == 0 {
                return Err(FilterError::InvalidPage("Page must be at least 1".to_string()));
            }
            filter.page = page;
        }

        if let Some(limit) = params.get("limit") {
            let limit: u32 = limit.trim().parse().map_err(|_| FilterError::InvalidLimit(limit.clone()))?;
            filter.limit(limit, api)?;
        }

        if let Some(sort) = params.get("sort").filter(|s| !s.trim().is_empty()) {
            let order = FilterOrder::parse(sort, params.get("order").map(String::as_str))?;
            if let Some(allowed) = spec.sort_fields {
                if !allowed.contains(&order.field.as_str()) {
                    return Err(FilterError::UnsupportedSort(order.field));
                }
            }
            filter.order = order;
        } else if let Some(order) = params.get("order") {
            filter.order = FilterOrder::parse(&filter.order.field, Some(order))?;
        }

        if let Some(text) = params.get("search").map(|s| s.trim()).filter(|s| !s.is_empty()) {
            filter.search = Some(FilterSearch { text: text.to_string(), fields: spec.search_fields });
        }

        for field in spec.filters {
            if let Some(value) = params.get(*field).map(|s| s.trim()).filter(|s| !s.is_empty()) {
                filter.where_eq(field, value)?;
            }
        }

        Ok(filter)
    }

    pub fn where_eq(&mut self, field: &str, value: impl Into<String>) -> Result<&mut Self, FilterError> {
        Self::validate_field(field)?;
        self.conditions.push(FilterWhereInfo { field: field.to_string(), value: value.into() });
        Ok(self)
    }

    pub fn limit(&mut self, limit: u32, api: &ApiConfig) -> Result<&mut Self, FilterError> {
        if limit == 0 {
            return Err(FilterError::InvalidLimit("Limit must be at least 1".to_string()));
        }
        if limit > api.max_page_size {
            tracing::debug!("Limit {} exceeds max {}, capping to max", limit, api.max_page_size);
        }
        self.limit = limit.min(api.max_page_size);
        Ok(self)
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.limit
    }

    pub fn offset(&self) -> u64 {
        (self.page as u64 - 1) * self.limit as u64
    }

    pub fn conditions(&self) -> &[FilterWhereInfo] {
        &self.conditions
    }

    /// WHERE clause (without the keyword). Parameter numbering starts after `param_offset`.
    pub fn to_where_sql(&self, target: SqlTarget, param_offset: usize) -> Result<SqlResult, FilterError> {
        let (query, params) = FilterWhere::generate(&self.conditions, self.search.as_ref(), target, param_offset)?;
        Ok(SqlResult { query, params })
    }

    /// ORDER BY + LIMIT/OFFSET suffix
    pub fn to_window_sql(&self, target: SqlTarget) -> Result<String, FilterError> {
        Ok(format!(
            "{} LIMIT {} OFFSET {}",
            FilterOrder::generate(&self.order, target)?,
            self.limit,
            self.offset()
        ))
    }

    /// In-process filter, sort and paginate.
    pub fn apply<T: Serialize>(&self, items: Vec<T>) -> Result<Page<T>, FilterError> {
        let mut rows = Vec::with_capacity(items.len());
        for item in items {
            let value = serde_json::to_value(&item)?;
            if FilterWhere::matches(&value, &self.conditions, self.search.as_ref()) {
                rows.push((value, item));
            }
        }

        rows.sort_by(|(a, _), (b, _)| FilterOrder::compare(a, b, &self.order));

        let total = rows.len() as u64;
        let items = rows
            .into_iter()
            .skip(self.offset() as usize)
            .take(self.limit as usize)
            .map(|(_, item)| item)
            .collect();

        Ok(Page { items, pagination: Pagination::new(self.page, self.limit, total) })
    }

    pub fn validate_field(name: &str) -> Result<(), FilterError> {
        let mut chars = name.chars();
        let valid_start = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_');
        if !valid_start || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(FilterError::InvalidField(name.to_string()));
        }
        Ok(())
    }
}
