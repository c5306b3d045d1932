//! SQL generation for column loads and bounds.
//!
//! Statements are built from a [`ResolvedSchema`] only: every table and column is
//! checked against the schema before it is written into SQL, identifiers are
//! always quoted, and every constant is sent as a bound parameter.

mod filter;

use crate::error::{ServiceError, ServiceResult};
use crate::models::{Aggregator, Database, Datatype, DatatypeFamily, Filter, QueryParam, Table};
use crate::schema::{ResolvedSchema, Route, StepKind};
use serde_json::Value as JsonValue;
use std::collections::HashSet;

/// SQL flavour of the target database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    Sqlite,
}

impl Dialect {
    /// Placeholder for the `n`th parameter (1-based) compared against a column
    /// of the given datatype.
    fn placeholder(self, n: usize, datatype: Datatype) -> String {
        match self {
            Self::Sqlite => "?".to_string(),
            Self::Postgres => match datatype {
                Datatype::Date => format!("CAST(${} AS DATE)", n),
                Datatype::Datetime => format!("CAST(${} AS TIMESTAMP)", n),
                _ => format!("${}", n),
            },
        }
    }
}

/// Quote an identifier with double quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn qualified(table: &str, column: &str) -> String {
    format!("{}.{}", quote_ident(table), quote_ident(column))
}

/// Accumulates bound parameters while SQL text is written.
#[derive(Debug)]
pub(crate) struct SqlWriter {
    dialect: Dialect,
    params: Vec<QueryParam>,
}

impl SqlWriter {
    pub(crate) fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            params: Vec::new(),
        }
    }

    fn bind(&mut self, param: QueryParam, datatype: Datatype) -> String {
        self.params.push(param);
        self.dialect.placeholder(self.params.len(), datatype)
    }
}

/// One column of a result set and the datatype used to decode it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputColumn {
    pub label: String,
    pub datatype: Datatype,
}

/// A ready-to-run statement.
#[derive(Debug, Clone)]
pub struct SelectStatement {
    pub sql: String,
    pub params: Vec<QueryParam>,
    pub columns: Vec<OutputColumn>,
    /// Labels of the columns the caller asked for; the other output columns
    /// are index columns added for record identity.
    pub requested: Vec<String>,
    /// Tables joined by the statement, anchor first.
    pub tables: Vec<String>,
}

/// What `load columns` asks for, after the request filters are combined.
#[derive(Debug, Clone, Default)]
pub struct ColumnsRequest<'a> {
    pub columns: &'a [String],
    pub filter: Option<&'a Filter>,
    pub data_ids: Option<&'a [Vec<JsonValue>]>,
    pub aggregator: Option<Aggregator>,
}

/// A schema column addressed as `table.column`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
    pub table: String,
    pub column: String,
    pub datatype: Datatype,
}

impl ColumnRef {
    pub fn label(&self) -> String {
        format!("{}.{}", self.table, self.column)
    }

    fn sql(&self) -> String {
        qualified(&self.table, &self.column)
    }
}

fn column_ref(database: &Database, table: &Table, column: &str) -> ServiceResult<ColumnRef> {
    let found = table.column(column).ok_or_else(|| {
        ServiceError::query(format!(
            "Unknown column '{}.{}' in database '{}'",
            table.name, column, database.name
        ))
    })?;
    Ok(ColumnRef {
        table: table.name.clone(),
        column: found.name.clone(),
        datatype: found.datatype,
    })
}

fn find_table<'a>(database: &'a Database, name: &str) -> ServiceResult<&'a Table> {
    database.table(name).ok_or_else(|| {
        ServiceError::query(format!(
            "Unknown table '{}' in database '{}'. Available tables: {}",
            name,
            database.name,
            database.table_names().join(", ")
        ))
    })
}

/// Resolve `table.column` references. A single reference without a dot selects
/// every column of that table. Duplicates are dropped.
pub fn resolve_columns(database: &Database, columns: &[String]) -> ServiceResult<Vec<ColumnRef>> {
    if columns.is_empty() {
        return Err(ServiceError::invalid_input("At least one column is required"));
    }

    if let [only] = columns {
        if !only.contains('.') {
            let table = find_table(database, only)?;
            return table
                .columns
                .iter()
                .map(|c| column_ref(database, table, &c.name))
                .collect();
        }
    }

    let mut resolved: Vec<ColumnRef> = Vec::with_capacity(columns.len());
    for reference in columns {
        let (table_name, column_name) = reference.split_once('.').ok_or_else(|| {
            ServiceError::invalid_input(format!(
                "Column '{}' must be written as table.column",
                reference
            ))
        })?;
        let table = find_table(database, table_name)?;
        let column = column_ref(database, table, column_name)?;
        if !resolved.contains(&column) {
            resolved.push(column);
        }
    }
    Ok(resolved)
}

/// Tables in order of first use.
fn tables_of<'a>(columns: impl IntoIterator<Item = &'a str>) -> Vec<&'a str> {
    let mut tables: Vec<&str> = Vec::new();
    for table in columns {
        if !tables.contains(&table) {
            tables.push(table);
        }
    }
    tables
}

fn from_clause(route: &Route) -> String {
    let mut sql = format!("FROM {}", quote_ident(&route.anchor));
    for step in &route.steps {
        let on = step
            .left_keys
            .iter()
            .zip(&step.right_keys)
            .map(|(l, r)| format!("{} = {}", qualified(&step.left, l), qualified(&step.right, r)))
            .collect::<Vec<_>>()
            .join(" AND ");
        sql.push_str(&format!(
            " {} {} ON {}",
            step.kind.sql_keyword(),
            quote_ident(&step.right),
            on
        ));
    }
    sql
}

/// Tables whose rows may be missing from a result row because an outer step of
/// the route pads them with NULLs.
fn nullable_tables(route: &Route) -> HashSet<&str> {
    let mut joined: Vec<&str> = vec![route.anchor.as_str()];
    let mut nullable: HashSet<&str> = HashSet::new();
    for step in &route.steps {
        match step.kind {
            StepKind::Inner => {
                if nullable.contains(step.left.as_str()) {
                    nullable.insert(step.right.as_str());
                }
            }
            StepKind::LeftOuter => {
                nullable.insert(step.right.as_str());
            }
            StepKind::RightOuter => nullable.extend(joined.iter().copied()),
            StepKind::FullOuter => {
                nullable.extend(joined.iter().copied());
                nullable.insert(step.right.as_str());
            }
        }
        joined.push(step.right.as_str());
    }
    nullable
}

/// Build the statement answering a `load columns` request.
///
/// Every requested column is labelled `table.column`. The index columns of every
/// table a requested column belongs to are appended. Selected columns must be
/// non-null unless their table sits on the NULL-padded side of an outer step, in
/// which case unmatched rows come back with nulls. Tables needed by the filter but
/// not selected are joined in too. Rows are ordered by the index columns of the
/// selected tables, first selected table first, with nulls last.
pub fn build_columns_query(
    schema: &ResolvedSchema,
    dialect: Dialect,
    request: &ColumnsRequest<'_>,
) -> ServiceResult<SelectStatement> {
    let database = &schema.database;
    let requested = resolve_columns(database, request.columns)?;
    let selected_tables = tables_of(requested.iter().map(|c| c.table.as_str()));

    let mut selected = requested.clone();
    for table_name in &selected_tables {
        let table = find_table(database, table_name)?;
        for index in &table.index_columns {
            let column = column_ref(database, table, index)?;
            if !selected.contains(&column) {
                selected.push(column);
            }
        }
    }

    let mut needed = selected_tables.clone();
    if let Some(filter) = request.filter {
        for field in filter.fields() {
            let table = find_table(database, &field.schema)?;
            column_ref(database, table, &field.name)?;
            if !needed.contains(&field.schema.as_str()) {
                needed.push(field.schema.as_str());
            }
        }
    }
    let route = schema.route(&needed)?;
    let anchor = find_table(database, &route.anchor)?;

    let nullable = nullable_tables(&route);

    let mut writer = SqlWriter::new(dialect);
    let mut conditions: Vec<String> = selected
        .iter()
        .filter(|c| !nullable.contains(c.table.as_str()))
        .map(|c| format!("{} IS NOT NULL", c.sql()))
        .collect();
    if let Some(filter) = request.filter {
        conditions.push(writer.filter(database, filter)?);
    }
    if let Some(data_ids) = request.data_ids {
        conditions.push(data_id_condition(&mut writer, database, anchor, data_ids)?);
    }

    let (select_list, columns) = match request.aggregator {
        None => (
            selected
                .iter()
                .map(|c| format!("{} AS {}", c.sql(), quote_ident(&c.label())))
                .collect::<Vec<_>>(),
            selected
                .iter()
                .map(|c| OutputColumn {
                    label: c.label(),
                    datatype: c.datatype,
                })
                .collect::<Vec<_>>(),
        ),
        Some(aggregator) => aggregate_list(aggregator, &requested)?,
    };

    let mut sql = format!("SELECT {} {}", select_list.join(", "), from_clause(&route));
    if !conditions.is_empty() {
        sql.push_str(&format!(" WHERE {}", conditions.join(" AND ")));
    }
    if request.aggregator.is_none() {
        let mut order: Vec<String> = Vec::new();
        for table_name in &selected_tables {
            let table = find_table(database, table_name)?;
            let nulls = if nullable.contains(table.name.as_str()) {
                " NULLS LAST"
            } else {
                ""
            };
            order.extend(
                table
                    .index_columns
                    .iter()
                    .map(|c| format!("{}{}", qualified(&table.name, c), nulls)),
            );
        }
        sql.push_str(&format!(" ORDER BY {}", order.join(", ")));
    }

    Ok(SelectStatement {
        sql,
        params: writer.params,
        columns,
        requested: requested.iter().map(ColumnRef::label).collect(),
        tables: route.tables,
    })
}

fn aggregate_list(
    aggregator: Aggregator,
    requested: &[ColumnRef],
) -> ServiceResult<(Vec<String>, Vec<OutputColumn>)> {
    let mut select_list = Vec::with_capacity(requested.len());
    let mut columns = Vec::with_capacity(requested.len());
    for c in requested {
        if aggregator.requires_numeric() && !c.datatype.is_numeric() {
            return Err(ServiceError::query(format!(
                "Cannot apply {} to '{}' of type {}",
                aggregator.sql_function(),
                c.label(),
                c.datatype
            )));
        }
        let expr = match aggregator {
            Aggregator::Count => format!("COUNT({})", c.sql()),
            Aggregator::Sum | Aggregator::Avg => format!(
                "CAST({}({}) AS DOUBLE PRECISION)",
                aggregator.sql_function(),
                c.sql()
            ),
            Aggregator::Min | Aggregator::Max => {
                format!("{}({})", aggregator.sql_function(), c.sql())
            }
        };
        let datatype = match aggregator {
            Aggregator::Count => Datatype::Long,
            Aggregator::Sum | Aggregator::Avg => Datatype::Double,
            Aggregator::Min | Aggregator::Max => c.datatype,
        };
        select_list.push(format!("{} AS {}", expr, quote_ident(&c.label())));
        columns.push(OutputColumn {
            label: c.label(),
            datatype,
        });
    }
    Ok((select_list, columns))
}

/// `(i1 = ? AND i2 = ?) OR ...` over the anchor table's index columns.
fn data_id_condition(
    writer: &mut SqlWriter,
    database: &Database,
    anchor: &Table,
    data_ids: &[Vec<JsonValue>],
) -> ServiceResult<String> {
    if data_ids.is_empty() {
        return Err(ServiceError::invalid_input("data_ids must not be empty"));
    }
    let index: Vec<ColumnRef> = anchor
        .index_columns
        .iter()
        .map(|c| column_ref(database, anchor, c))
        .collect::<ServiceResult<_>>()?;

    let mut alternatives = Vec::with_capacity(data_ids.len());
    for data_id in data_ids {
        if data_id.len() != index.len() {
            return Err(ServiceError::invalid_input(format!(
                "Each data id needs {} values ({}), found {}",
                index.len(),
                anchor.index_columns.join(", "),
                data_id.len()
            )));
        }
        let mut parts = Vec::with_capacity(index.len());
        for (column, value) in index.iter().zip(data_id) {
            let param = QueryParam::from_json(value)
                .filter(|p| !p.is_null())
                .ok_or_else(|| {
                    ServiceError::invalid_input(format!(
                        "Invalid data id value for '{}': {}",
                        column.label(),
                        value
                    ))
                })?;
            let placeholder = writer.bind(param, column.datatype);
            parts.push(format!("{} = {}", column.sql(), placeholder));
        }
        alternatives.push(format!("({})", parts.join(" AND ")));
    }
    Ok(format!("({})", alternatives.join(" OR ")))
}

/// Build the statement returning `MIN` and `MAX` of one column.
pub fn build_bounds_query(schema: &ResolvedSchema, column: &str) -> ServiceResult<SelectStatement> {
    let database = &schema.database;
    let (table_name, column_name) = column.split_once('.').ok_or_else(|| {
        ServiceError::invalid_input(format!("Column '{}' must be written as table.column", column))
    })?;
    let table = find_table(database, table_name)?;
    let column = column_ref(database, table, column_name)?;
    if column.datatype.family() == DatatypeFamily::Boolean {
        return Err(ServiceError::query(format!(
            "Cannot compute bounds of boolean column '{}'",
            column.label()
        )));
    }

    let sql = format!(
        "SELECT MIN({col}) AS \"min\", MAX({col}) AS \"max\" FROM {table}",
        col = column.sql(),
        table = quote_ident(&table.name)
    );
    Ok(SelectStatement {
        sql,
        params: Vec::new(),
        columns: vec![
            OutputColumn {
                label: "min".to_string(),
                datatype: column.datatype,
            },
            OutputColumn {
                label: "max".to_string(),
                datatype: column.datatype,
            },
        ],
        requested: vec![column.label()],
        tables: vec![table.name.clone()],
    })
}
