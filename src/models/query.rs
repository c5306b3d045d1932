//! Query-related data models.
//!
//! This module defines the filter tree accepted by `load columns`, the
//! aggregators, and the bound parameter values sent to the database.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Default row limit for query results.
pub const DEFAULT_ROW_LIMIT: u32 = 10_000;

/// Maximum allowed row limit.
pub const MAX_ROW_LIMIT: u32 = 1_000_000;

/// Default query timeout in seconds.
pub const DEFAULT_QUERY_TIMEOUT_SECS: u32 = 30;

/// Maximum query timeout in seconds.
pub const MAX_QUERY_TIMEOUT_SECS: u32 = 300;

/// A parameter value for parameterized queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryParam {
    Null,
    Bool(bool),
    /// Integer value (stored as i64 for maximum range)
    Int(i64),
    Float(f64),
    String(String),
}

impl QueryParam {
    /// Convert a JSON scalar. Arrays and objects cannot be bound.
    pub fn from_json(value: &JsonValue) -> Option<Self> {
        match value {
            JsonValue::Null => Some(Self::Null),
            JsonValue::Bool(b) => Some(Self::Bool(*b)),
            JsonValue::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_f64().map(Self::Float)),
            JsonValue::String(s) => Some(Self::String(s.clone())),
            JsonValue::Array(_) | JsonValue::Object(_) => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the type name of this parameter for debugging.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
        }
    }
}

/// Comparison applied by an equality filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    StartsWith,
    EndsWith,
    Contains,
}

impl Operator {
    /// True for the substring operators, which only take a string on the right.
    pub fn is_string_match(self) -> bool {
        matches!(self, Self::StartsWith | Self::EndsWith | Self::Contains)
    }

    /// The operator with its operands swapped: `v < col` is `col > v`.
    pub fn mirrored(self) -> Self {
        match self {
            Self::Lt => Self::Gt,
            Self::Le => Self::Ge,
            Self::Gt => Self::Lt,
            Self::Ge => Self::Le,
            other => other,
        }
    }

    /// SQL comparison symbol. Substring operators are rendered with `LIKE`.
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::StartsWith | Self::EndsWith | Self::Contains => "LIKE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum BoolOperator {
    And,
    Or,
    Not,
    /// True when at least one child holds but not all of them.
    Xor,
}

/// A column named as `{"schema": table, "name": column}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FieldRef {
    pub schema: String,
    pub name: String,
}

/// Compare one column against up to two constant values:
/// `leftValue leftOperator column` and `column rightOperator rightValue`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EqualityFilter {
    pub field: FieldRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left_operator: Option<Operator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left_value: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right_operator: Option<Operator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right_value: Option<JsonValue>,
}

/// Combine child filters with a boolean operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ParentFilter {
    pub operator: BoolOperator,
    pub children: Vec<Filter>,
}

/// Row filter tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type")]
pub enum Filter {
    EqualityQuery(EqualityFilter),
    ParentQuery(ParentFilter),
}

impl Filter {
    /// AND two optional filters together.
    pub fn and(a: Option<Filter>, b: Option<Filter>) -> Option<Filter> {
        match (a, b) {
            (Some(a), Some(b)) => Some(Filter::ParentQuery(ParentFilter {
                operator: BoolOperator::And,
                children: vec![a, b],
            })),
            (a, None) => a,
            (None, b) => b,
        }
    }

    /// Every column referenced by the filter, depth first.
    pub fn fields(&self) -> Vec<&FieldRef> {
        let mut fields = Vec::new();
        self.collect_fields(&mut fields);
        fields
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a FieldRef>) {
        match self {
            Filter::EqualityQuery(eq) => out.push(&eq.field),
            Filter::ParentQuery(parent) => {
                for child in &parent.children {
                    child.collect_fields(out);
                }
            }
        }
    }
}

/// Reduction applied to every requested column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Aggregator {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl Aggregator {
    pub fn sql_function(self) -> &'static str {
        match self {
            Self::Count => "COUNT",
            Self::Sum => "SUM",
            Self::Avg => "AVG",
            Self::Min => "MIN",
            Self::Max => "MAX",
        }
    }

    /// SUM and AVG only make sense for numeric columns.
    pub fn requires_numeric(self) -> bool {
        matches!(self, Self::Sum | Self::Avg)
    }
}
