//! Schema data models.
//!
//! These types are the validated, immutable form of a schema document. They are
//! only constructed by [`crate::schema::loader`], and serialize back to the same
//! document shape they were loaded from.

use schemars::JsonSchema;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

/// A logical database: tables plus the joins that connect them.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct Database {
    pub name: String,
    /// Stable identifier. Defaults to `name` when the document omits it.
    pub id: String,
    pub description: String,
    pub tables: Vec<Table>,
    pub joins: Vec<Join>,
}

impl Database {
    /// Look up a table by name.
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Names of all tables in declaration order.
    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }

    /// Look up a column with a `table.column` pair.
    pub fn column(&self, table: &str, column: &str) -> Option<&Column> {
        self.table(table).and_then(|t| t.column(column))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct Table {
    pub name: String,
    /// Columns forming the logical key of the table.
    pub index_columns: Vec<String>,
    pub columns: Vec<Column>,
}

impl Table {
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct Column {
    pub name: String,
    pub datatype: Datatype,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Scalar column datatype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Datatype {
    Int,
    Long,
    Float,
    Double,
    Char,
    String,
    Boolean,
    Date,
    Datetime,
}

/// Coarse grouping used to decide whether two columns can be matched in a join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatatypeFamily {
    Integer,
    Float,
    Text,
    Boolean,
    Temporal,
}

impl Datatype {
    /// All names accepted in a schema document.
    pub const NAMES: &'static [&'static str] = &[
        "int", "long", "float", "double", "char", "string", "boolean", "date", "datetime",
    ];

    /// Parse a datatype name as written in a schema document.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "int" => Some(Self::Int),
            "long" => Some(Self::Long),
            "float" => Some(Self::Float),
            "double" => Some(Self::Double),
            "char" => Some(Self::Char),
            "string" => Some(Self::String),
            "boolean" | "bool" => Some(Self::Boolean),
            "date" => Some(Self::Date),
            "datetime" => Some(Self::Datetime),
            _ => None,
        }
    }

    pub fn family(&self) -> DatatypeFamily {
        match self {
            Self::Int | Self::Long => DatatypeFamily::Integer,
            Self::Float | Self::Double => DatatypeFamily::Float,
            Self::Char | Self::String => DatatypeFamily::Text,
            Self::Boolean => DatatypeFamily::Boolean,
            Self::Date | Self::Datetime => DatatypeFamily::Temporal,
        }
    }

    /// True for datatypes that support SUM/AVG aggregation.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self.family(),
            DatatypeFamily::Integer | DatatypeFamily::Float
        )
    }

    /// SQL column type used when creating tables for this datatype.
    pub fn sql_type(&self) -> &'static str {
        match self {
            Self::Int | Self::Long => "BIGINT",
            Self::Float | Self::Double => "DOUBLE PRECISION",
            Self::Char | Self::String => "TEXT",
            Self::Boolean => "BOOLEAN",
            Self::Date => "DATE",
            Self::Datetime => "TIMESTAMP",
        }
    }
}

impl std::fmt::Display for Datatype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Int => "int",
            Self::Long => "long",
            Self::Float => "float",
            Self::Double => "double",
            Self::Char => "char",
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::Datetime => "datetime",
        };
        write!(f, "{}", name)
    }
}

/// Join type as declared in a schema document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum JoinType {
    Inner,
    /// Full outer unless `preserve` names a side.
    Outer,
    Left,
    Right,
}

impl JoinType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inner" => Some(Self::Inner),
            "outer" | "full" => Some(Self::Outer),
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            _ => None,
        }
    }
}

impl std::fmt::Display for JoinType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inner => write!(f, "inner"),
            Self::Outer => write!(f, "outer"),
            Self::Left => write!(f, "left"),
            Self::Right => write!(f, "right"),
        }
    }
}

/// One participating table of a join and the key columns it is matched on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinMatch {
    pub table: String,
    pub keys: Vec<String>,
}

/// Declarative rule connecting two or more tables by key equality.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct Join {
    #[serde(rename = "type")]
    pub join_type: JoinType,
    /// Table to preserve for outer joins.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preserve: Option<String>,
    /// Table name to key columns, in declaration order.
    #[serde(serialize_with = "serialize_matches")]
    #[schemars(with = "BTreeMap<String, Vec<String>>")]
    pub matches: Vec<JoinMatch>,
}

impl Join {
    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.matches.iter().map(|m| m.table.as_str())
    }

    pub fn keys_for(&self, table: &str) -> Option<&[String]> {
        self.matches
            .iter()
            .find(|m| m.table == table)
            .map(|m| m.keys.as_slice())
    }
}

fn serialize_matches<S>(matches: &[JoinMatch], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut map = serializer.serialize_map(Some(matches.len()))?;
    for m in matches {
        map.serialize_entry(&m.table, &m.keys)?;
    }
    map.end()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_datatype_parse_accepts_every_documented_name() {
        for name in Datatype::NAMES {
            assert!(Datatype::parse(name).is_some(), "{} should parse", name);
        }
        assert_eq!(Datatype::parse("LONG"), Some(Datatype::Long));
        assert_eq!(Datatype::parse("blob"), None);
    }

    #[test]
    fn test_datatype_families() {
        assert_eq!(Datatype::Int.family(), Datatype::Long.family());
        assert_eq!(Datatype::Char.family(), Datatype::String.family());
        assert_ne!(Datatype::Long.family(), Datatype::Double.family());
        assert!(Datatype::Double.is_numeric());
        assert!(!Datatype::Date.is_numeric());
    }

    #[test]
    fn test_join_type_parse() {
        assert_eq!(JoinType::parse("inner"), Some(JoinType::Inner));
        assert_eq!(JoinType::parse("full"), Some(JoinType::Outer));
        assert_eq!(JoinType::parse("cross"), None);
    }

    #[test]
    fn test_join_serializes_matches_in_declaration_order() {
        let join = Join {
            join_type: JoinType::Inner,
            preserve: None,
            matches: vec![
                JoinMatch {
                    table: "visit1_quicklook".into(),
                    keys: vec!["visit_id".into()],
                },
                JoinMatch {
                    table: "exposure".into(),
                    keys: vec!["exposure_id".into()],
                },
            ],
        };
        let json = serde_json::to_string(&join).unwrap();
        assert_eq!(
            json,
            r#"{"type":"inner","matches":{"visit1_quicklook":["visit_id"],"exposure":["exposure_id"]}}"#
        );
    }
}
