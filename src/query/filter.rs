//! Rendering of filter trees into SQL conditions.

use super::{SqlWriter, qualified};
use crate::error::{ServiceError, ServiceResult};
use crate::models::{
    BoolOperator, Database, Datatype, DatatypeFamily, EqualityFilter, Filter, Operator, ParentFilter,
    QueryParam,
};
use serde_json::Value as JsonValue;

impl SqlWriter {
    /// Render a filter tree, binding every constant as a parameter.
    pub(crate) fn filter(&mut self, database: &Database, filter: &Filter) -> ServiceResult<String> {
        match filter {
            Filter::EqualityQuery(eq) => self.equality(database, eq),
            Filter::ParentQuery(parent) => self.parent(database, parent),
        }
    }

    fn parent(&mut self, database: &Database, parent: &ParentFilter) -> ServiceResult<String> {
        if parent.children.is_empty() {
            return Err(ServiceError::query(format!(
                "{:?} filter needs at least one child",
                parent.operator
            )));
        }

        match parent.operator {
            BoolOperator::Not => {
                if parent.children.len() != 1 {
                    return Err(ServiceError::query(format!(
                        "NOT filter takes exactly one child, found {}",
                        parent.children.len()
                    )));
                }
                Ok(format!("(NOT {})", self.filter(database, &parent.children[0])?))
            }
            BoolOperator::And => self.joined(database, &parent.children, " AND "),
            BoolOperator::Or => self.joined(database, &parent.children, " OR "),
            // Children are rendered twice so each placeholder gets its own parameter.
            BoolOperator::Xor => {
                let any = self.joined(database, &parent.children, " OR ")?;
                let all = self.joined(database, &parent.children, " AND ")?;
                Ok(format!("({} AND NOT {})", any, all))
            }
        }
    }

    fn joined(
        &mut self,
        database: &Database,
        children: &[Filter],
        separator: &str,
    ) -> ServiceResult<String> {
        let parts = children
            .iter()
            .map(|child| self.filter(database, child))
            .collect::<ServiceResult<Vec<_>>>()?;
        Ok(format!("({})", parts.join(separator)))
    }

    fn equality(&mut self, database: &Database, eq: &EqualityFilter) -> ServiceResult<String> {
        let table = &eq.field.schema;
        let name = &eq.field.name;
        let column = database.column(table, name).ok_or_else(|| {
            ServiceError::query(format!(
                "Filter references unknown column '{}.{}' in database '{}'",
                table, name, database.name
            ))
        })?;
        let target = qualified(table, name);

        let mut parts = Vec::with_capacity(2);
        if let Some(op) = eq.left_operator {
            if op.is_string_match() {
                return Err(ServiceError::query(format!(
                    "Operator '{:?}' on '{}.{}' can only be used as rightOperator",
                    op, table, name
                )));
            }
            let value = eq.left_value.as_ref().unwrap_or(&JsonValue::Null);
            parts.push(self.comparison(&target, op.mirrored(), value, column.datatype)?);
        }
        if let Some(op) = eq.right_operator {
            let value = eq.right_value.as_ref().unwrap_or(&JsonValue::Null);
            let part = if op.is_string_match() {
                if column.datatype.family() != DatatypeFamily::Text {
                    return Err(ServiceError::query(format!(
                        "Operator '{:?}' needs a text column, '{}.{}' is {}",
                        op, table, name, column.datatype
                    )));
                }
                self.like(&target, op, value)?
            } else {
                self.comparison(&target, op, value, column.datatype)?
            };
            parts.push(part);
        }

        match parts.len() {
            0 => Err(ServiceError::query(format!(
                "Filter on '{}.{}' has neither leftOperator nor rightOperator",
                table, name
            ))),
            1 => Ok(parts.remove(0)),
            _ => Ok(format!("({})", parts.join(" AND "))),
        }
    }

    /// `column op value`, with `eq`/`ne` against null rendered as `IS [NOT] NULL`.
    fn comparison(
        &mut self,
        target: &str,
        op: Operator,
        value: &JsonValue,
        datatype: Datatype,
    ) -> ServiceResult<String> {
        let param = scalar(value)?;
        if param.is_null() {
            return match op {
                Operator::Eq => Ok(format!("{} IS NULL", target)),
                Operator::Ne => Ok(format!("{} IS NOT NULL", target)),
                other => Err(ServiceError::query(format!(
                    "Cannot compare '{}' with null using '{:?}'",
                    target, other
                ))),
            };
        }
        let placeholder = self.bind(param, datatype);
        Ok(format!("{} {} {}", target, op.symbol(), placeholder))
    }

    fn like(&mut self, target: &str, op: Operator, value: &JsonValue) -> ServiceResult<String> {
        let JsonValue::String(text) = value else {
            return Err(ServiceError::query(format!(
                "Operator '{:?}' on '{}' needs a string value",
                op, target
            )));
        };
        let escaped = escape_like(text);
        let pattern = match op {
            Operator::StartsWith => format!("{}%", escaped),
            Operator::EndsWith => format!("%{}", escaped),
            _ => format!("%{}%", escaped),
        };
        let placeholder = self.bind(QueryParam::String(pattern), Datatype::String);
        Ok(format!("{} LIKE {} ESCAPE '\\'", target, placeholder))
    }
}

fn scalar(value: &JsonValue) -> ServiceResult<QueryParam> {
    QueryParam::from_json(value).ok_or_else(|| {
        ServiceError::query(format!(
            "Filter values must be scalars, found {}",
            value
        ))
    })
}

fn escape_like(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Dialect;
    use crate::schema::loader;
    use serde_json::json;

    fn database() -> Database {
        loader::from_yaml_str(
            r#"
name: testdb
tables:
  - name: exposure
    index_columns: [day_obs, seq_num]
    columns:
      - { name: day_obs, datatype: int }
      - { name: seq_num, datatype: int }
      - { name: ra, datatype: double }
      - { name: dec, datatype: double }
      - { name: physical_filter, datatype: char }
      - { name: obs_start, datatype: datetime }
"#,
        )
        .unwrap()
    }

    fn render(dialect: Dialect, filter: serde_json::Value) -> ServiceResult<(String, Vec<QueryParam>)> {
        let filter: Filter = serde_json::from_value(filter).unwrap();
        let mut writer = SqlWriter::new(dialect);
        let sql = writer.filter(&database(), &filter)?;
        Ok((sql, writer.params))
    }

    fn leaf(name: &str, side: &str, op: &str, value: serde_json::Value) -> serde_json::Value {
        let mut filter = json!({
            "type": "EqualityQuery",
            "field": {"schema": "exposure", "name": name},
        });
        filter[format!("{}Operator", side).as_str()] = json!(op);
        filter[format!("{}Value", side).as_str()] = value;
        filter
    }

    #[test]
    fn test_left_side_is_mirrored() {
        let (sql, params) = render(Dialect::Sqlite, leaf("dec", "left", "lt", json!(0))).unwrap();
        assert_eq!(sql, r#""exposure"."dec" > ?"#);
        assert_eq!(params, vec![QueryParam::Int(0)]);
    }

    #[test]
    fn test_both_sides_form_a_range() {
        let filter = json!({
            "type": "EqualityQuery",
            "field": {"schema": "exposure", "name": "ra"},
            "leftOperator": "le",
            "leftValue": 10.5,
            "rightOperator": "lt",
            "rightValue": 20
        });
        let (sql, params) = render(Dialect::Postgres, filter).unwrap();
        assert_eq!(sql, r#"("exposure"."ra" >= $1 AND "exposure"."ra" < $2)"#);
        assert_eq!(params, vec![QueryParam::Float(10.5), QueryParam::Int(20)]);
    }

    #[test]
    fn test_null_equality_becomes_is_null() {
        let (sql, params) = render(Dialect::Sqlite, leaf("ra", "right", "ne", json!(null))).unwrap();
        assert_eq!(sql, r#""exposure"."ra" IS NOT NULL"#);
        assert!(params.is_empty());
        assert!(render(Dialect::Sqlite, leaf("ra", "right", "lt", json!(null))).is_err());
    }

    #[test]
    fn test_string_operators_escape_wildcards() {
        let (sql, params) = render(
            Dialect::Sqlite,
            leaf("physical_filter", "right", "contains", json!("50%_r")),
        )
        .unwrap();
        assert_eq!(sql, r#""exposure"."physical_filter" LIKE ? ESCAPE '\'"#);
        assert_eq!(params, vec![QueryParam::String(r"%50\%\_r%".into())]);
    }

    #[test]
    fn test_string_operator_rules() {
        assert!(render(Dialect::Sqlite, leaf("physical_filter", "left", "startswith", json!("a"))).is_err());
        assert!(render(Dialect::Sqlite, leaf("ra", "right", "startswith", json!("1"))).is_err());
        assert!(render(Dialect::Sqlite, leaf("physical_filter", "right", "endswith", json!(1))).is_err());
    }

    #[test]
    fn test_postgres_casts_temporal_parameters() {
        let (sql, _) = render(
            Dialect::Postgres,
            leaf("obs_start", "right", "ge", json!("2024-01-01T00:00:00")),
        )
        .unwrap();
        assert_eq!(sql, r#""exposure"."obs_start" >= CAST($1 AS TIMESTAMP)"#);
    }

    #[test]
    fn test_xor_renders_children_twice() {
        let filter = json!({
            "type": "ParentQuery",
            "operator": "XOR",
            "children": [
                leaf("dec", "left", "lt", json!(0)),
                leaf("ra", "left", "lt", json!(60)),
            ]
        });
        let (sql, params) = render(Dialect::Postgres, filter).unwrap();
        assert_eq!(
            sql,
            r#"(("exposure"."dec" > $1 OR "exposure"."ra" > $2) AND NOT ("exposure"."dec" > $3 AND "exposure"."ra" > $4))"#
        );
        assert_eq!(params.len(), 4);
    }

    #[test]
    fn test_not_requires_one_child() {
        let filter = json!({
            "type": "ParentQuery",
            "operator": "NOT",
            "children": [leaf("dec", "left", "lt", json!(0)), leaf("ra", "left", "lt", json!(0))]
        });
        assert!(render(Dialect::Sqlite, filter).is_err());

        let empty = json!({"type": "ParentQuery", "operator": "AND", "children": []});
        assert!(render(Dialect::Sqlite, empty).is_err());
    }

    #[test]
    fn test_unknown_column_and_missing_operator() {
        assert!(render(Dialect::Sqlite, leaf("airmass", "right", "eq", json!(1))).is_err());
        let bare = json!({"type": "EqualityQuery", "field": {"schema": "exposure", "name": "ra"}});
        assert!(render(Dialect::Sqlite, bare).is_err());
    }
}
