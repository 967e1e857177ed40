use serde_json::Value;

use super::error::FilterError;
use super::types::{FilterSearch, FilterWhereInfo, SqlTarget};

pub struct FilterWhere {
    param_values: Vec<String>,
    param_index: usize,
}

impl FilterWhere {
    pub fn new(starting_param_index: usize) -> Self {
        Self {
            param_values: vec![],
            param_index: starting_param_index,
        }
    }

    /// Build `cond AND cond ...` with positional parameters starting after `starting_param_index`.
    pub fn generate(
        conditions: &[FilterWhereInfo],
        search: Option<&FilterSearch>,
        target: SqlTarget,
        starting_param_index: usize,
    ) -> Result<(String, Vec<String>), FilterError> {
        let mut filter_where = Self::new(starting_param_index);
        let mut sql_conditions = vec![];

        for condition in conditions {
            sql_conditions.push(filter_where.build_condition(condition, target)?);
        }

        if let Some(search) = search {
            let placeholder = filter_where.param(format!("%{}%", escape_like(&search.text)));
            let parts = search
                .fields
                .iter()
                .map(|field| target.text_expr(field).map(|expr| format!("{} ILIKE {}", expr, placeholder)))
                .collect::<Result<Vec<_>, _>>()?;
            if !parts.is_empty() {
                sql_conditions.push(format!("({})", parts.join(" OR ")));
            }
        }

        let where_clause = if sql_conditions.is_empty() { "1=1".to_string() } else { sql_conditions.join(" AND ") };
        Ok((where_clause, filter_where.param_values))
    }

    fn build_condition(&mut self, condition: &FilterWhereInfo, target: SqlTarget) -> Result<String, FilterError> {
        let text = target.text_expr(&condition.field)?;
        let placeholder = self.param(condition.value.clone());
        match target.array_expr(&condition.field) {
            // Scalar fields compare as text, array fields (tags) by containment
            Some(array) => Ok(format!(
                "({text} = {p} OR (jsonb_typeof({array}) = 'array' AND {array} ? {p}))",
                text = text,
                array = array,
                p = placeholder
            )),
            None => Ok(format!("{} = {}", text, placeholder)),
        }
    }

    fn param(&mut self, value: String) -> String {
        self.param_values.push(value);
        self.param_index += 1;
        format!("${}", self.param_index)
    }

    /// In-process evaluation of the same conditions against a serialized record.
    pub fn matches(record: &Value, conditions: &[FilterWhereInfo], search: Option<&FilterSearch>) -> bool {
        let conditions_ok = conditions.iter().all(|c| match record.get(&c.field) {
            Some(Value::Array(items)) => items.iter().any(|item| scalar_text(item).as_deref() == Some(c.value.as_str())),
            Some(other) => scalar_text(other).as_deref() == Some(c.value.as_str()),
            None => false,
        });
        if !conditions_ok {
            return false;
        }

        match search {
            None => true,
            Some(search) => {
                let needle = search.text.to_lowercase();
                search.fields.iter().any(|field| {
                    record
                        .get(*field)
                        .and_then(Value::as_str)
                        .map(|s| s.to_lowercase().contains(&needle))
                        .unwrap_or(false)
                })
            }
        }
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn escape_like(text: &str) -> String {
    text.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}
