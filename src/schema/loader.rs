//! Schema document loading and validation.
//!
//! A document is first parsed into a `serde_yaml::Value` tree (YAML or JSON input),
//! then walked field by field so that every failure can name the exact path that
//! caused it, e.g. `tables[2].columns[1].name`. Repeated mapping keys survive the
//! parse and are reported as duplicates at their path.

use crate::error::SchemaError;
use crate::models::{Column, Database, Datatype, Join, JoinMatch, JoinType, Table};
use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde_yaml::{Mapping, Value};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use tracing::{debug, warn};

/// Path used for errors about the document root.
const ROOT: &str = "$";

/// Load a schema from YAML text.
pub fn from_yaml_str(text: &str) -> Result<Database, SchemaError> {
    let node: Node = serde_yaml::from_str(text)
        .map_err(|e| SchemaError::syntax(ROOT, format!("invalid YAML: {}", e)))?;
    from_value(&node.into_value(ROOT)?)
}

/// Load a schema from JSON text.
pub fn from_json_str(text: &str) -> Result<Database, SchemaError> {
    let node: Node = serde_json::from_str(text)
        .map_err(|e| SchemaError::syntax(ROOT, format!("invalid JSON: {}", e)))?;
    from_value(&node.into_value(ROOT)?)
}

/// Load a schema from a file. Files ending in `.json` are read as JSON, anything
/// else as YAML.
pub fn from_path(path: &Path) -> Result<Database, SchemaError> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        SchemaError::syntax(
            ROOT,
            format!("failed to read '{}': {}", path.display(), e),
        )
    })?;
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        from_json_str(&text)
    } else {
        from_yaml_str(&text)
    }
}

/// Validate an already parsed document tree.
pub fn from_value(value: &Value) -> Result<Database, SchemaError> {
    let root = as_mapping(value, ROOT)?;
    warn_unknown_keys(root, ROOT, &["name", "id", "description", "tables", "joins"]);

    let name = required_str(root, "name", ROOT)?;
    let id = optional_str(root, "id", ROOT)?.unwrap_or_else(|| name.clone());
    let description = optional_str(root, "description", ROOT)?.unwrap_or_default();

    let tables_path = field(ROOT, "tables");
    let raw_tables = required_seq(root, "tables", ROOT)?;
    if raw_tables.is_empty() {
        return Err(SchemaError::syntax(
            tables_path,
            "a database needs at least one table",
        ));
    }

    let mut tables: Vec<Table> = Vec::with_capacity(raw_tables.len());
    for (i, raw) in raw_tables.iter().enumerate() {
        let path = index(&tables_path, i);
        let table = parse_table(raw, &path)?;
        if tables.iter().any(|t| t.name == table.name) {
            return Err(SchemaError::duplicate(
                field(&path, "name"),
                "table",
                table.name,
            ));
        }
        tables.push(table);
    }

    let joins_path = field(ROOT, "joins");
    let raw_joins = optional_seq(root, "joins", ROOT)?.unwrap_or_default();
    let mut joins = Vec::with_capacity(raw_joins.len());
    for (i, raw) in raw_joins.iter().enumerate() {
        joins.push(parse_join(raw, &index(&joins_path, i), &tables)?);
    }

    debug!(
        database = %name,
        tables = tables.len(),
        joins = joins.len(),
        "Schema document validated"
    );

    Ok(Database {
        name,
        id,
        description,
        tables,
        joins,
    })
}

fn parse_table(value: &Value, path: &str) -> Result<Table, SchemaError> {
    let map = as_mapping(value, path)?;
    warn_unknown_keys(map, path, &["name", "index_columns", "columns", "description"]);
    let name = required_str(map, "name", path)?;

    let columns_path = field(path, "columns");
    let raw_columns = required_seq(map, "columns", path)?;
    if raw_columns.is_empty() {
        return Err(SchemaError::syntax(
            columns_path,
            "a table needs at least one column",
        ));
    }

    let mut columns: Vec<Column> = Vec::with_capacity(raw_columns.len());
    for (j, raw) in raw_columns.iter().enumerate() {
        let column_path = index(&columns_path, j);
        let column = parse_column(raw, &column_path)?;
        if columns.iter().any(|c| c.name == column.name) {
            return Err(SchemaError::duplicate(
                field(&column_path, "name"),
                "column",
                format!("{}.{}", name, column.name),
            ));
        }
        columns.push(column);
    }

    let index_path = field(path, "index_columns");
    let index_columns = string_list(required(map, "index_columns", path)?, &index_path)?;
    if index_columns.is_empty() {
        return Err(SchemaError::syntax(
            index_path,
            "a table needs at least one index column",
        ));
    }
    check_column_list(&index_columns, &index_path, &name, &columns)?;

    Ok(Table {
        name,
        index_columns,
        columns,
    })
}

fn parse_column(value: &Value, path: &str) -> Result<Column, SchemaError> {
    let map = as_mapping(value, path)?;
    warn_unknown_keys(map, path, &["name", "datatype", "unit", "description"]);
    let name = required_str(map, "name", path)?;
    let raw_datatype = required_str(map, "datatype", path)?;
    let datatype = Datatype::parse(&raw_datatype).ok_or_else(|| {
        SchemaError::syntax(
            field(path, "datatype"),
            format!(
                "unsupported datatype '{}', expected one of: {}",
                raw_datatype,
                Datatype::NAMES.join(", ")
            ),
        )
    })?;

    Ok(Column {
        name,
        datatype,
        unit: optional_str(map, "unit", path)?,
        description: optional_str(map, "description", path)?,
    })
}

fn parse_join(value: &Value, path: &str, tables: &[Table]) -> Result<Join, SchemaError> {
    let map = as_mapping(value, path)?;
    warn_unknown_keys(map, path, &["type", "matches", "preserve"]);

    let raw_type = required_str(map, "type", path)?;
    let join_type = JoinType::parse(&raw_type).ok_or_else(|| {
        SchemaError::syntax(
            field(path, "type"),
            format!(
                "unsupported join type '{}', expected inner, outer, left or right",
                raw_type
            ),
        )
    })?;

    let matches_path = field(path, "matches");
    let raw_matches = match required(map, "matches", path)? {
        Value::Mapping(m) => m,
        _ => {
            return Err(SchemaError::syntax(
                matches_path,
                "expected a mapping from table name to key columns",
            ));
        }
    };
    if raw_matches.len() < 2 {
        return Err(SchemaError::syntax(
            matches_path,
            format!(
                "a join needs at least two tables, found {}",
                raw_matches.len()
            ),
        ));
    }

    let mut matches: Vec<JoinMatch> = Vec::with_capacity(raw_matches.len());
    for (raw_table, raw_keys) in raw_matches {
        let table_name = raw_table.as_str().ok_or_else(|| {
            SchemaError::syntax(&matches_path, "table names in matches must be strings")
        })?;
        let entry_path = field(&matches_path, table_name);
        let table = tables
            .iter()
            .find(|t| t.name == table_name)
            .ok_or_else(|| SchemaError::reference(&entry_path, "table", table_name))?;

        let keys = string_list(raw_keys, &entry_path)?;
        if keys.is_empty() {
            return Err(SchemaError::syntax(
                entry_path,
                "a join needs at least one key column per table",
            ));
        }
        check_column_list(&keys, &entry_path, &table.name, &table.columns)?;
        matches.push(JoinMatch {
            table: table.name.clone(),
            keys,
        });
    }

    let preserve_path = field(path, "preserve");
    let preserve = optional_str(map, "preserve", path)?;
    if let Some(preserved) = &preserve {
        if join_type != JoinType::Outer {
            return Err(SchemaError::syntax(
                preserve_path,
                format!("'preserve' only applies to outer joins, not {} joins", join_type),
            ));
        }
        if !matches.iter().any(|m| &m.table == preserved) {
            return Err(SchemaError::reference(preserve_path, "table", preserved.clone()));
        }
    } else if join_type == JoinType::Outer && matches.len() > 2 {
        return Err(SchemaError::syntax(
            preserve_path,
            format!(
                "an outer join over {} tables must name the preserved table",
                matches.len()
            ),
        ));
    }

    check_key_datatypes(&matches, &matches_path, tables)?;

    Ok(Join {
        join_type,
        preserve,
        matches,
    })
}

/// Key columns at the same position must share a datatype family. Only tables
/// whose key lists have the same arity are compared, since only those can be
/// matched against each other.
fn check_key_datatypes(
    matches: &[JoinMatch],
    matches_path: &str,
    tables: &[Table],
) -> Result<(), SchemaError> {
    let datatype = |table: &str, column: &str| {
        tables
            .iter()
            .find(|t| t.name == table)
            .and_then(|t| t.column(column))
            .map(|c| c.datatype)
    };

    for (i, current) in matches.iter().enumerate() {
        let Some(reference) = matches[..i]
            .iter()
            .find(|m| m.keys.len() == current.keys.len())
        else {
            continue;
        };
        for (k, (key, other)) in current.keys.iter().zip(&reference.keys).enumerate() {
            let (Some(ours), Some(theirs)) =
                (datatype(&current.table, key), datatype(&reference.table, other))
            else {
                continue;
            };
            if ours.family() != theirs.family() {
                return Err(SchemaError::type_mismatch(
                    index(&field(matches_path, &current.table), k),
                    format!(
                        "key '{}.{}' ({}) cannot be matched with '{}.{}' ({})",
                        current.table, key, ours, reference.table, other, theirs
                    ),
                ));
            }
        }
    }
    Ok(())
}

/// Check that a list of column names has no duplicates and only names declared columns.
fn check_column_list(
    names: &[String],
    path: &str,
    table: &str,
    columns: &[Column],
) -> Result<(), SchemaError> {
    let mut seen = HashSet::new();
    for (k, name) in names.iter().enumerate() {
        let item_path = index(path, k);
        if !seen.insert(name.as_str()) {
            return Err(SchemaError::duplicate(
                item_path,
                "key column",
                format!("{}.{}", table, name),
            ));
        }
        if !columns.iter().any(|c| &c.name == name) {
            return Err(SchemaError::reference(
                item_path,
                "column",
                format!("{}.{}", table, name),
            ));
        }
    }
    Ok(())
}

// =============================================================================
// Parsing
// =============================================================================

/// Document node as parsed. Mappings keep every entry in order, including
/// repeated keys, which `serde_yaml::Mapping` would reject during the parse.
#[derive(Debug)]
enum Node {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    String(String),
    Seq(Vec<Node>),
    Map(Vec<(Node, Node)>),
}

impl<'de> Deserialize<'de> for Node {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(NodeVisitor)
    }
}

struct NodeVisitor;

impl<'de> Visitor<'de> for NodeVisitor {
    type Value = Node;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a schema document value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Node, E> {
        Ok(Node::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Node, E> {
        Ok(Node::Int(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Node, E> {
        Ok(Node::UInt(v))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Node, E> {
        Ok(Node::Float(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Node, E> {
        Ok(Node::String(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Node, E> {
        Ok(Node::String(v))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Node, E> {
        Ok(Node::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<Node, E> {
        Ok(Node::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Node, D::Error> {
        Node::deserialize(deserializer)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Node, A::Error> {
        let mut items = Vec::new();
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(Node::Seq(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Node, A::Error> {
        let mut entries = Vec::new();
        while let Some(entry) = map.next_entry()? {
            entries.push(entry);
        }
        Ok(Node::Map(entries))
    }
}

impl Node {
    /// Build the value tree, failing on the first key repeated within a mapping.
    fn into_value(self, path: &str) -> Result<Value, SchemaError> {
        Ok(match self {
            Node::Null => Value::Null,
            Node::Bool(b) => Value::Bool(b),
            Node::Int(n) => Value::Number(n.into()),
            Node::UInt(n) => Value::Number(n.into()),
            Node::Float(n) => Value::Number(n.into()),
            Node::String(s) => Value::String(s),
            Node::Seq(items) => Value::Sequence(
                items
                    .into_iter()
                    .enumerate()
                    .map(|(i, item)| item.into_value(&index(path, i)))
                    .collect::<Result<_, _>>()?,
            ),
            Node::Map(entries) => {
                let mut mapping = Mapping::with_capacity(entries.len());
                for (key, value) in entries {
                    let key = key.into_value(path)?;
                    let label = key_label(&key);
                    let key_path = field(path, &label);
                    if mapping.contains_key(&key) {
                        // Keys of a join's matches are table names.
                        let object = if path.ends_with("matches") {
                            "table"
                        } else {
                            "field"
                        };
                        return Err(SchemaError::duplicate(key_path, object, label));
                    }
                    let value = value.into_value(&key_path)?;
                    mapping.insert(key, value);
                }
                Value::Mapping(mapping)
            }
        })
    }
}

fn key_label(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => type_name(other).to_string(),
    }
}

// =============================================================================
// Document tree helpers
// =============================================================================

fn field(parent: &str, key: &str) -> String {
    if parent == ROOT {
        key.to_string()
    } else {
        format!("{}.{}", parent, key)
    }
}

fn index(parent: &str, i: usize) -> String {
    format!("{}[{}]", parent, i)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

fn as_mapping<'a>(value: &'a Value, path: &str) -> Result<&'a Mapping, SchemaError> {
    value.as_mapping().ok_or_else(|| {
        SchemaError::syntax(path, format!("expected a mapping, found {}", type_name(value)))
    })
}

fn required<'a>(map: &'a Mapping, key: &str, path: &str) -> Result<&'a Value, SchemaError> {
    match map.get(key) {
        Some(Value::Null) | None => Err(SchemaError::syntax(
            field(path, key),
            "missing required field",
        )),
        Some(value) => Ok(value),
    }
}

fn required_str(map: &Mapping, key: &str, path: &str) -> Result<String, SchemaError> {
    let value = required(map, key, path)?;
    non_empty_str(value, &field(path, key))
}

fn optional_str(map: &Mapping, key: &str, path: &str) -> Result<Option<String>, SchemaError> {
    match map.get(key) {
        Some(Value::Null) | None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(SchemaError::syntax(
            field(path, key),
            format!("expected a string, found {}", type_name(other)),
        )),
    }
}

fn non_empty_str(value: &Value, path: &str) -> Result<String, SchemaError> {
    match value {
        Value::String(s) if s.trim().is_empty() => {
            Err(SchemaError::syntax(path, "must not be empty"))
        }
        Value::String(s) => Ok(s.trim().to_string()),
        other => Err(SchemaError::syntax(
            path,
            format!("expected a string, found {}", type_name(other)),
        )),
    }
}

fn required_seq<'a>(map: &'a Mapping, key: &str, path: &str) -> Result<&'a [Value], SchemaError> {
    let value = required(map, key, path)?;
    value.as_sequence().map(Vec::as_slice).ok_or_else(|| {
        SchemaError::syntax(
            field(path, key),
            format!("expected a sequence, found {}", type_name(value)),
        )
    })
}

fn optional_seq<'a>(
    map: &'a Mapping,
    key: &str,
    path: &str,
) -> Result<Option<&'a [Value]>, SchemaError> {
    match map.get(key) {
        Some(Value::Null) | None => Ok(None),
        Some(Value::Sequence(seq)) => Ok(Some(seq.as_slice())),
        Some(other) => Err(SchemaError::syntax(
            field(path, key),
            format!("expected a sequence, found {}", type_name(other)),
        )),
    }
}

/// A list of names. A bare string is accepted as a one-element list.
fn string_list(value: &Value, path: &str) -> Result<Vec<String>, SchemaError> {
    match value {
        Value::String(_) => Ok(vec![non_empty_str(value, path)?]),
        Value::Sequence(items) => items
            .iter()
            .enumerate()
            .map(|(k, item)| non_empty_str(item, &index(path, k)))
            .collect(),
        other => Err(SchemaError::syntax(
            path,
            format!("expected a list of column names, found {}", type_name(other)),
        )),
    }
}

fn warn_unknown_keys(map: &Mapping, path: &str, known: &[&str]) {
    for key in map.keys() {
        match key.as_str() {
            Some(k) if known.contains(&k) => {}
            _ => warn!(path = %path, key = ?key, "Ignoring unknown schema field"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"
name: testdb
id: testdb-v1
description: Exposure and visit quicklook tables
tables:
  - name: exposure
    index_columns: [exposure_id]
    columns:
      - name: exposure_id
        datatype: long
        description: Unique exposure identifier
      - name: ra
        datatype: double
        unit: degree
      - name: obs_start
        datatype: datetime
  - name: visit1_quicklook
    index_columns: [visit_id]
    columns:
      - name: visit_id
        datatype: long
      - name: psf_sigma
        datatype: double
joins:
  - type: inner
    matches:
      exposure: [exposure_id]
      visit1_quicklook: [visit_id]
"#;

    fn with_join(join: &str) -> String {
        let base = FIXTURE.split("joins:").next().unwrap();
        format!("{}joins:\n{}", base, join)
    }

    #[test]
    fn test_load_fixture() {
        let db = from_yaml_str(FIXTURE).unwrap();
        assert_eq!(db.name, "testdb");
        assert_eq!(db.id, "testdb-v1");
        assert_eq!(db.table_names(), vec!["exposure", "visit1_quicklook"]);
        assert_eq!(db.tables[0].columns[1].unit.as_deref(), Some("degree"));
        assert_eq!(db.joins.len(), 1);
        assert_eq!(db.joins[0].join_type, JoinType::Inner);
        assert_eq!(
            db.joins[0].keys_for("visit1_quicklook"),
            Some(&["visit_id".to_string()][..])
        );
    }

    #[test]
    fn test_id_defaults_to_name_and_joins_are_optional() {
        let doc = r#"
name: solo
tables:
  - name: t
    index_columns: k
    columns:
      - { name: k, datatype: int }
"#;
        let db = from_yaml_str(doc).unwrap();
        assert_eq!(db.id, "solo");
        assert_eq!(db.description, "");
        assert!(db.joins.is_empty());
        assert_eq!(db.tables[0].index_columns, vec!["k"]);
    }

    #[test]
    fn test_json_documents_load_the_same() {
        let yaml = from_yaml_str(FIXTURE).unwrap();
        let json_text = serde_json::to_string(&yaml).unwrap();
        let json = from_json_str(&json_text).unwrap();
        assert_eq!(yaml, json);
    }

    #[test]
    fn test_round_trip_preserves_structure() {
        let db = from_yaml_str(FIXTURE).unwrap();
        let text = serde_yaml::to_string(&db).unwrap();
        let reloaded = from_yaml_str(&text).unwrap();
        assert_eq!(db, reloaded);
    }

    #[test]
    fn test_root_must_be_mapping() {
        let err = from_yaml_str("- a\n- b\n").unwrap_err();
        assert!(matches!(err, SchemaError::Syntax { ref path, .. } if path == "$"));
    }

    #[test]
    fn test_missing_name_reports_path() {
        let doc = FIXTURE.replacen("  - name: visit1_quicklook\n", "  - title: visit1_quicklook\n", 1);
        let err = from_yaml_str(&doc).unwrap_err();
        assert_eq!(err.path(), "tables[1].name");
        assert!(matches!(err, SchemaError::Syntax { .. }));
    }

    #[test]
    fn test_unknown_datatype_is_syntax_error() {
        let doc = FIXTURE.replacen("datatype: datetime", "datatype: blob", 1);
        let err = from_yaml_str(&doc).unwrap_err();
        assert_eq!(err.path(), "tables[0].columns[2].datatype");
        assert!(err.to_string().contains("blob"));
    }

    #[test]
    fn test_duplicate_column() {
        let doc = FIXTURE.replacen("name: obs_start", "name: ra", 1);
        let err = from_yaml_str(&doc).unwrap_err();
        assert_eq!(
            err,
            SchemaError::duplicate("tables[0].columns[2].name", "column", "exposure.ra")
        );
    }

    #[test]
    fn test_duplicate_table() {
        let doc = FIXTURE
            .replacen("name: visit1_quicklook", "name: exposure", 1)
            .replace("visit1_quicklook: [visit_id]", "other: [visit_id]");
        let err = from_yaml_str(&doc).unwrap_err();
        assert!(matches!(err, SchemaError::Duplicate { ref path, ref name, .. }
            if path == "tables[1].name" && name == "exposure"));
    }

    #[test]
    fn test_index_column_must_be_declared() {
        let doc = FIXTURE.replacen("index_columns: [exposure_id]", "index_columns: [exp_id]", 1);
        let err = from_yaml_str(&doc).unwrap_err();
        assert_eq!(
            err,
            SchemaError::reference("tables[0].index_columns[0]", "column", "exposure.exp_id")
        );
    }

    #[test]
    fn test_empty_index_columns_rejected() {
        let doc = FIXTURE.replacen("index_columns: [exposure_id]", "index_columns: []", 1);
        let err = from_yaml_str(&doc).unwrap_err();
        assert_eq!(err.path(), "tables[0].index_columns");
    }

    #[test]
    fn test_join_to_undeclared_table() {
        let doc = with_join(
            "  - type: inner\n    matches:\n      exposure: [exposure_id]\n      visit2: [visit_id]\n",
        );
        let err = from_yaml_str(&doc).unwrap_err();
        assert_eq!(
            err,
            SchemaError::reference("joins[0].matches.visit2", "table", "visit2")
        );
    }

    #[test]
    fn test_join_key_must_be_declared() {
        let doc = with_join(
            "  - type: inner\n    matches:\n      exposure: [exposure_id]\n      visit1_quicklook: [exposure_id]\n",
        );
        let err = from_yaml_str(&doc).unwrap_err();
        assert_eq!(err.path(), "joins[0].matches.visit1_quicklook[0]");
        assert!(matches!(err, SchemaError::Reference { .. }));
    }

    #[test]
    fn test_join_needs_two_tables() {
        let doc = with_join("  - type: inner\n    matches:\n      exposure: [exposure_id]\n");
        let err = from_yaml_str(&doc).unwrap_err();
        assert_eq!(err.path(), "joins[0].matches");
        assert!(err.to_string().contains("at least two tables"));
    }

    #[test]
    fn test_unknown_join_type() {
        let doc = FIXTURE.replacen("type: inner", "type: cross", 1);
        let err = from_yaml_str(&doc).unwrap_err();
        assert_eq!(err.path(), "joins[0].type");
    }

    #[test]
    fn test_key_datatype_mismatch() {
        let doc = FIXTURE.replacen(
            "      - name: visit_id\n        datatype: long",
            "      - name: visit_id\n        datatype: double",
            1,
        );
        let err = from_yaml_str(&doc).unwrap_err();
        assert!(matches!(err, SchemaError::TypeMismatch { .. }));
        assert_eq!(err.path(), "joins[0].matches.visit1_quicklook[0]");
    }

    #[test]
    fn test_int_and_long_keys_are_compatible() {
        let doc = FIXTURE.replacen(
            "      - name: visit_id\n        datatype: long",
            "      - name: visit_id\n        datatype: int",
            1,
        );
        assert!(from_yaml_str(&doc).is_ok());
    }

    #[test]
    fn test_preserve_must_name_a_joined_table() {
        let doc = with_join(
            "  - type: outer\n    preserve: visit2\n    matches:\n      exposure: [exposure_id]\n      visit1_quicklook: [visit_id]\n",
        );
        let err = from_yaml_str(&doc).unwrap_err();
        assert_eq!(err, SchemaError::reference("joins[0].preserve", "table", "visit2"));
    }

    #[test]
    fn test_preserve_rejected_on_inner_join() {
        let doc = with_join(
            "  - type: inner\n    preserve: exposure\n    matches:\n      exposure: [exposure_id]\n      visit1_quicklook: [visit_id]\n",
        );
        let err = from_yaml_str(&doc).unwrap_err();
        assert_eq!(err.path(), "joins[0].preserve");
        assert!(matches!(err, SchemaError::Syntax { .. }));
    }

    #[test]
    fn test_repeated_join_table_is_duplicate() {
        let doc = with_join(
            "  - type: inner\n    matches:\n      exposure: [exposure_id]\n      visit1_quicklook: [visit_id]\n      exposure: [exposure_id]\n",
        );
        let err = from_yaml_str(&doc).unwrap_err();
        assert_eq!(
            err,
            SchemaError::duplicate("joins[0].matches.exposure", "table", "exposure")
        );
        assert_eq!(err.kind(), "SchemaDuplicateError");
    }

    #[derive(Clone, Default)]
    struct Captured(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for Captured {
        type Writer = Captured;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn test_unknown_field_is_logged_as_warning() {
        let captured = Captured::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(captured.clone())
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .finish();
        let doc = FIXTURE.replacen("name: testdb", "name: testdb\nowner: night crew", 1);
        tracing::subscriber::with_default(subscriber, || from_yaml_str(&doc).unwrap());

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("WARN"), "{output}");
        assert!(output.contains("Ignoring unknown schema field"), "{output}");
        assert!(output.contains("owner"), "{output}");
    }

    #[test]
    fn test_repeated_json_key_is_duplicate() {
        let err = from_json_str(
            r#"{"name": "testdb", "tables": [{"name": "a", "name": "b", "index_columns": ["id"], "columns": [{"name": "id", "datatype": "long"}]}]}"#,
        )
        .unwrap_err();
        assert_eq!(err, SchemaError::duplicate("tables[0].name", "field", "name"));
    }

    #[test]
    fn test_matches_must_be_mapping() {
        let doc = with_join("  - type: inner\n    matches: [exposure, visit1_quicklook]\n");
        let err = from_yaml_str(&doc).unwrap_err();
        assert_eq!(err.path(), "joins[0].matches");
    }
}
