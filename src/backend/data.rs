use serde::ser::{Serialize, SerializeMap, Serializer};
use crate::backend::column_type::Value;
use crate::backend::table::TableSchema;
use crate::util::error;

/// A column-oriented query result.
/// Each requested column maps to one value per returned row, and all columns are aligned by row index.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultSet {
    columns: Vec<(String, Vec<String>)>,
}

impl ResultSet {
    /// The result of a failed or non-query statement, which has no columns at all.
    pub fn empty() -> Self {
        return ResultSet { columns: Vec::new() };
    }

    /// Creates a result with a bucket for each requested column and no rows.
    pub fn with_columns<S: AsRef<str>>(names: &[S]) -> Self {
        let mut columns: Vec<(String, Vec<String>)> = Vec::new();
        for name in names.iter() {
            let name = name.as_ref();
            if !columns.iter().any(|(existing, _)| existing == name) {
                columns.push((name.to_string(), Vec::new()));
            }
        }
        return ResultSet { columns };
    }

    /// Appends one row. The row must have one value per column, in column order.
    pub(crate) fn push_row(&mut self, row: Vec<String>) {
        debug_assert_eq!(row.len(), self.columns.len());
        for ((_, bucket), value) in self.columns.iter_mut().zip(row) {
            bucket.push(value);
        }
    }

    /// Gets the values of a column, if it was requested.
    pub fn column(&self, name: &str) -> Option<&[String]> {
        return self.columns.iter()
            .find(|(column, _)| column == name)
            .map(|(_, values)| values.as_slice());
    }

    /// Gets the names of the columns in the order they were requested.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        return self.columns.iter().map(|(name, _)| name.as_str());
    }

    pub fn row_count(&self) -> usize {
        return match self.columns.first() {
            Some((_, values)) => values.len(),
            None => 0
        };
    }

    /// True when the result has no columns, i.e. it came from a failed or non-query statement.
    pub fn is_empty(&self) -> bool {
        return self.columns.is_empty();
    }
}

impl Serialize for ResultSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (name, values) in self.columns.iter() {
            map.serialize_entry(name, values)?;
        }
        return map.end();
    }
}

/// A row of literal values for one table, checked against that table's schema when it was built.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    table: String,
    values: Vec<String>,
}

impl Row {
    /// Gets the name of the table the row was built for.
    pub fn table(&self) -> &str {
        return &self.table;
    }

    /// Gets the literal values in column order.
    pub fn values(&self) -> &[String] {
        return &self.values;
    }
}

/// Collects one value per column of a schema and checks names and types before producing a Row.
pub struct RowBuilder<'a> {
    schema: &'a TableSchema,
    values: Vec<Option<Value>>,
    error: Option<error::Error>,
}

impl<'a> RowBuilder<'a> {
    pub(crate) fn new(schema: &'a TableSchema) -> Self {
        return RowBuilder {
            schema,
            values: vec![None; schema.columns().len()],
            error: None,
        };
    }

    /// Sets the value of a column. The first failure is kept and reported by build().
    pub fn set<V: Into<Value>>(mut self, column_name: &str, value: V) -> Self {
        if self.error.is_some() {
            return self;
        }
        let value: Value = value.into();
        match self.schema.column_index(column_name) {
            Some(idx) => {
                let column = &self.schema.columns()[idx];
                if column.value_type() != value.value_type() {
                    self.error = Some(error::Error::TypeMismatch {
                        column: column.name().to_string(),
                        expected: column.value_type(),
                        actual: value.value_type(),
                    });
                } else {
                    self.values[idx] = Some(value);
                }
            },
            None => {
                self.error = Some(error::Error::UnknownColumn {
                    table: self.schema.table_name().to_string(),
                    column: column_name.to_string(),
                });
            }
        }
        return self;
    }

    /// Produces the row, failing if any column was unknown, mistyped, or left without a value.
    pub fn build(self) -> Result<Row, error::Error> {
        if let Some(e) = self.error {
            return Err(e);
        }

        let mut literals: Vec<String> = Vec::with_capacity(self.values.len());
        for (column, value) in self.schema.columns().iter().zip(self.values.iter()) {
            match value {
                Some(v) => {
                    literals.push(v.to_sql_literal()?);
                },
                None => {
                    return Err(error::Error::MissingColumn {
                        table: self.schema.table_name().to_string(),
                        column: column.name().to_string(),
                    });
                }
            }
        }
        return Ok(Row {
            table: self.schema.table_name().to_string(),
            values: literals,
        });
    }
}
