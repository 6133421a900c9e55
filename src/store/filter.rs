//! Typed filter and query construction for store commands.

use std::cmp::Ordering;

use serde::Serialize;
use serde_json::Value;

use super::Row;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
}

#[derive(Debug, Clone)]
pub struct Condition {
    pub column: String,
    pub op: Op,
    pub value: Value,
}

/// Conjunction of column conditions. An empty filter matches every row.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(self, column: &str, value: impl Serialize) -> Self {
        self.push(column, Op::Eq, value)
    }

    pub fn ne(self, column: &str, value: impl Serialize) -> Self {
        self.push(column, Op::Ne, value)
    }

    pub fn lt(self, column: &str, value: impl Serialize) -> Self {
        self.push(column, Op::Lt, value)
    }

    pub fn lte(self, column: &str, value: impl Serialize) -> Self {
        self.push(column, Op::Lte, value)
    }

    pub fn gt(self, column: &str, value: impl Serialize) -> Self {
        self.push(column, Op::Gt, value)
    }

    pub fn gte(self, column: &str, value: impl Serialize) -> Self {
        self.push(column, Op::Gte, value)
    }

    fn push(mut self, column: &str, op: Op, value: impl Serialize) -> Self {
        self.conditions.push(Condition {
            column: column.to_string(),
            op,
            value: serde_json::to_value(value).unwrap_or(Value::Null),
        });
        self
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Evaluates the filter against one row. Absent columns read as null.
    pub fn matches(&self, row: &Row) -> bool {
        self.conditions.iter().all(|cond| {
            let actual = row.get(&cond.column).unwrap_or(&Value::Null);
            let ordering = compare_values(actual, &cond.value);
            match cond.op {
                Op::Eq => ordering == Some(Ordering::Equal),
                Op::Ne => ordering != Some(Ordering::Equal),
                Op::Lt => ordering == Some(Ordering::Less),
                Op::Lte => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
                Op::Gt => ordering == Some(Ordering::Greater),
                Op::Gte => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
            }
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone)]
pub struct OrderBy {
    pub column: String,
    pub order: SortOrder,
}

/// A select: filter plus optional ordering and row limit.
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub filter: Filter,
    pub order_by: Option<OrderBy>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filtered(filter: Filter) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    pub fn order_by_asc(mut self, column: &str) -> Self {
        self.order_by = Some(OrderBy {
            column: column.to_string(),
            order: SortOrder::Asc,
        });
        self
    }

    pub fn order_by_desc(mut self, column: &str) -> Self {
        self.order_by = Some(OrderBy {
            column: column.to_string(),
            order: SortOrder::Desc,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Total order over comparable JSON scalars; `None` for mismatched or
/// non-scalar types. ISO dates compare correctly as strings.
pub(crate) fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}
