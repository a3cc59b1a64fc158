use std::sync::Arc;
use serde::Serialize;
use crate::backend::column::Column;
use crate::backend::data::{ResultSet, Row, RowBuilder};
use crate::backend::db::{Executor, StatementResult};
use crate::backend::query::{build_query, QueryKind};
use crate::util::error;

const NO_VALUES: &[&str] = &[];

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
/// A table name and its ordered columns.
/// Column order is significant: it is the order in which INSERT values are bound.
pub struct TableSchema {
    table_name: String,
    columns: Vec<Column>,
}

impl TableSchema {
    /// Creates a schema, checking that it has at least one column and that column names are unique.
    pub fn new(table_name: &str, columns: Vec<Column>) -> Result<TableSchema, error::Error> {
        if columns.is_empty() {
            return Err(error::Error::EmptySchema(table_name.to_string()));
        }
        for (idx, column) in columns.iter().enumerate() {
            if columns[..idx].iter().any(|c| c.name().eq_ignore_ascii_case(column.name())) {
                return Err(error::Error::DuplicateColumn {
                    table: table_name.to_string(),
                    column: column.name().to_string(),
                });
            }
        }
        return Ok(TableSchema {
            table_name: table_name.to_string(),
            columns,
        });
    }

    pub fn table_name(&self) -> &str {
        return &self.table_name;
    }

    pub fn columns(&self) -> &[Column] {
        return &self.columns;
    }

    /// Gets the position of a column by name, ignoring ASCII case like the database does.
    pub fn column_index(&self, column_name: &str) -> Option<usize> {
        return self.columns.iter().position(|c| c.name().eq_ignore_ascii_case(column_name));
    }

    /// Starts building a row for this table.
    pub fn row(&self) -> RowBuilder<'_> {
        return RowBuilder::new(self);
    }
}

/// A schema bound to the shared executor.
/// The plain operations log and swallow statement failures; the `try_` operations report them.
pub struct Table {
    schema: TableSchema,
    executor: Arc<Executor>,
}

impl Table {
    pub fn new(schema: TableSchema, executor: Arc<Executor>) -> Self {
        return Table { schema, executor };
    }

    pub fn schema(&self) -> &TableSchema {
        return &self.schema;
    }

    /// Creates the table. Creating a table that already exists fails inside the executor and leaves it as it was.
    pub fn create(&self) {
        let create_cmd = build_query(QueryKind::Create, &self.schema, NO_VALUES, NO_VALUES);
        self.executor.execute(&create_cmd, NO_VALUES);
    }

    /// Like create, but reports a failed statement, e.g. when the table already exists.
    pub fn try_create(&self) -> Result<StatementResult, error::Error> {
        let create_cmd = build_query(QueryKind::Create, &self.schema, NO_VALUES, NO_VALUES);
        return self.executor.try_execute(&create_cmd, NO_VALUES);
    }

    /// Inserts a row that was built from this table's schema.
    /// A failed statement is logged and swallowed; only a row of another table is reported.
    pub fn insert(&self, row: &Row) -> Result<(), error::Error> {
        self.check_row(row)?;
        return self.insert_values(row.values());
    }

    /// Like insert, but also reports a failed statement.
    pub fn try_insert(&self, row: &Row) -> Result<StatementResult, error::Error> {
        self.check_row(row)?;
        return self.try_insert_values(row.values());
    }

    /// Inserts positional literals, one per column in column order.
    /// Text and dates must already be quoted. A failed statement is logged and swallowed.
    pub fn insert_values<S: AsRef<str>>(&self, values: &[S]) -> Result<(), error::Error> {
        let insert_cmd = self.insert_query(values)?;
        self.executor.execute(&insert_cmd, NO_VALUES);
        return Ok(());
    }

    /// Like insert_values, but also reports a failed statement.
    pub fn try_insert_values<S: AsRef<str>>(&self, values: &[S]) -> Result<StatementResult, error::Error> {
        let insert_cmd = self.insert_query(values)?;
        return self.executor.try_execute(&insert_cmd, NO_VALUES);
    }

    fn check_row(&self, row: &Row) -> Result<(), error::Error> {
        if row.table() != self.schema.table_name() {
            return Err(error::Error::ForeignRow {
                table: self.schema.table_name().to_string(),
                row_table: row.table().to_string(),
            });
        }
        return Ok(());
    }

    fn insert_query<S: AsRef<str>>(&self, values: &[S]) -> Result<String, error::Error> {
        if values.len() != self.schema.columns().len() {
            return Err(error::Error::ArityMismatch {
                table: self.schema.table_name().to_string(),
                expected: self.schema.columns().len(),
                actual: values.len(),
            });
        }
        return Ok(build_query(QueryKind::Insert, &self.schema, values, NO_VALUES));
    }

    /// Selects the projection, returning the result under `result_columns`.
    /// Result column names must match the aliases used in the projection; an empty result is returned on failure.
    pub fn select<P: AsRef<str>, R: AsRef<str>, M: AsRef<str>>(&self, projection: &[P], result_columns: &[R], modifiers: &[M]) -> ResultSet {
        let select_cmd = build_query(QueryKind::Select, &self.schema, projection, modifiers);
        return self.executor.execute(&select_cmd, result_columns);
    }

    /// Like select, but reports a failed query instead of returning an empty result.
    pub fn try_select<P: AsRef<str>, R: AsRef<str>, M: AsRef<str>>(&self, projection: &[P], result_columns: &[R], modifiers: &[M]) -> Result<ResultSet, error::Error> {
        if result_columns.is_empty() {
            return Err(error::Error::AdhocError("A select must request at least one result column."));
        }
        let select_cmd = build_query(QueryKind::Select, &self.schema, projection, modifiers);
        match self.executor.try_execute(&select_cmd, result_columns)? {
            StatementResult::Query(result_set) => {
                return Ok(result_set);
            },
            StatementResult::Mutation { .. } => {
                return Ok(ResultSet::empty());
            }
        }
    }

    /// Drops the table.
    pub fn drop_table(&self) {
        let drop_cmd = build_query(QueryKind::Drop, &self.schema, NO_VALUES, NO_VALUES);
        self.executor.execute(&drop_cmd, NO_VALUES);
    }
}
