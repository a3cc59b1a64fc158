use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, Row};
use serde::{Serialize, Deserialize};
use tracing::{debug, error, info};
use crate::backend::data::ResultSet;
use crate::backend::query::{self, TABLE_NAME_COLUMN};
use crate::util::error;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
/// Where the database lives.
pub enum StorageMode {
    File,
    Memory,
}

/// What a statement produced.
#[derive(Debug, Clone, PartialEq)]
pub enum StatementResult {
    Mutation {
        affected_rows: usize
    },
    Query(ResultSet),
}

/// Owns the single connection to the database and runs one statement at a time against it.
pub struct Executor {
    conn: Mutex<Connection>,
}

impl Executor {
    /// Opens a connection to a database file, creating it if it does not exist.
    pub fn open_file<P: AsRef<Path>>(path: P) -> Result<Executor, error::Error> {
        let conn = match Connection::open(path.as_ref()) {
            Ok(c) => c,
            Err(e) => { return Err(error::Error::ConnectionError(e)); }
        };
        if let Err(e) = conn.execute_batch("
            PRAGMA foreign_keys = ON;
            PRAGMA journal_mode = WAL;
            ") {
            return Err(error::Error::ConnectionError(e));
        }
        info!(path = %path.as_ref().display(), "opened file database");
        return Ok(Executor { conn: Mutex::new(conn) });
    }

    /// Opens a connection to a fresh in-memory database.
    pub fn open_in_memory() -> Result<Executor, error::Error> {
        let conn = match Connection::open_in_memory() {
            Ok(c) => c,
            Err(e) => { return Err(error::Error::ConnectionError(e)); }
        };
        info!("opened in-memory database");
        return Ok(Executor { conn: Mutex::new(conn) });
    }

    /// Opens a connection according to the storage mode.
    pub fn open(mode: StorageMode, path: &Path) -> Result<Executor, error::Error> {
        return match mode {
            StorageMode::File => Self::open_file(path),
            StorageMode::Memory => Self::open_in_memory(),
        };
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, error::Error> {
        return match self.conn.lock() {
            Ok(guard) => Ok(guard),
            Err(_) => Err(error::Error::AdhocError("The database connection lock was poisoned."))
        };
    }

    /// Runs a statement and commits it.
    /// With no requested columns the statement is treated as a mutation; otherwise as a query whose
    /// rows are collected column by column under the requested names.
    pub fn try_execute<S: AsRef<str>>(&self, sql: &str, columns: &[S]) -> Result<StatementResult, error::Error> {
        debug!(sql, "SQL =>");
        let mut conn = self.lock()?;
        let trans = conn.transaction()?;

        let result = if columns.is_empty() {
            // Run to completion, discarding any rows the statement returns
            let changes_before = trans.total_changes();
            {
                let mut stmt = trans.prepare(sql)?;
                let mut rows = stmt.raw_query();
                while rows.next()?.is_some() {}
            }
            let affected_rows = usize::try_from(trans.total_changes().saturating_sub(changes_before)).unwrap_or(usize::MAX);
            StatementResult::Mutation { affected_rows }
        } else {
            let mut result_set = ResultSet::with_columns(columns);
            {
                // Prepare a statement
                let mut stmt = trans.prepare(sql)?;
                let names: Vec<String> = result_set.columns().map(|c| c.to_string()).collect();

                // Collect each row's values under the requested columns
                let mut rows = stmt.query([])?;
                while let Some(row) = rows.next()? {
                    let mut values: Vec<String> = Vec::with_capacity(names.len());
                    for name in names.iter() {
                        values.push(value_as_string(row, name)?);
                    }
                    result_set.push_row(values);
                }
            }
            info!(columns = ?result_set.columns().collect::<Vec<_>>(), rows = result_set.row_count(), "SQL <=");
            StatementResult::Query(result_set)
        };

        // Commit the transaction
        trans.commit()?;
        return Ok(result);
    }

    /// Runs a statement like try_execute, but never fails.
    /// Any error is logged together with the statement text and an empty result is returned instead.
    pub fn execute<S: AsRef<str>>(&self, sql: &str, columns: &[S]) -> ResultSet {
        match self.try_execute(sql, columns) {
            Ok(StatementResult::Query(result_set)) => {
                return result_set;
            },
            Ok(StatementResult::Mutation { .. }) => {
                return ResultSet::empty();
            },
            Err(e) => {
                error!(sql, error = %e, "Error executing the query");
                return ResultSet::empty();
            }
        }
    }

    /// Lists the names of every user table in the database.
    pub fn show_tables(&self) -> Result<Vec<String>, error::Error> {
        let sql = query::show_tables_query();
        match self.try_execute(&sql, &[TABLE_NAME_COLUMN])? {
            StatementResult::Query(result_set) => {
                return Ok(result_set.column(TABLE_NAME_COLUMN).map(|names| names.to_vec()).unwrap_or_default());
            },
            StatementResult::Mutation { .. } => {
                return Ok(Vec::new());
            }
        }
    }

    /// Drops every user table, so that a reused database file starts empty.
    pub fn flush_tables(&self) -> Result<(), error::Error> {
        for table_name in self.show_tables()? {
            let drop_cmd = format!("DROP TABLE IF EXISTS {table_name};");
            self.try_execute::<&str>(&drop_cmd, &[])?;
            debug!(table = %table_name, "table dropped");
        }
        return Ok(());
    }
}

/// Reads a column of a result row by name and converts it to its string form.
fn value_as_string(row: &Row<'_>, column_name: &str) -> Result<String, error::Error> {
    return Ok(match row.get_ref(column_name)? {
        ValueRef::Null => String::from("NULL"),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) | ValueRef::Blob(t) => String::from_utf8_lossy(t).into_owned(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tracing_subscriber::fmt::MakeWriter;

    const NONE: &[&str] = &[];

    fn executor_with_numbers() -> Executor {
        let executor = Executor::open_in_memory().unwrap();
        executor.try_execute("CREATE TABLE NUMBERS ( N INTEGER, LABEL VARCHAR(255) );", NONE).unwrap();
        return executor;
    }

    #[test]
    fn mutation_reports_affected_rows() {
        let executor = executor_with_numbers();
        let result = executor.try_execute("INSERT INTO NUMBERS VALUES ( 1, 'one' );", NONE).unwrap();
        assert_eq!(result, StatementResult::Mutation { affected_rows: 1 });
    }

    #[test]
    fn query_with_no_rows_keeps_requested_keys() {
        let executor = executor_with_numbers();
        let result = executor.execute("SELECT N, LABEL FROM NUMBERS;", &["N", "LABEL"]);
        assert!(!result.is_empty());
        assert_eq!(result.column("N"), Some(&[][..]));
        assert_eq!(result.column("LABEL"), Some(&[][..]));
    }

    #[test]
    fn query_values_are_column_oriented() {
        let executor = executor_with_numbers();
        executor.execute("INSERT INTO NUMBERS VALUES ( 1, 'one' );", NONE);
        executor.execute("INSERT INTO NUMBERS VALUES ( 2, NULL );", NONE);
        let result = executor.execute("SELECT N, LABEL, N * 1.5 AS SCALED FROM NUMBERS ORDER BY N;", &["LABEL", "N", "SCALED"]);
        assert_eq!(result.columns().collect::<Vec<_>>(), vec!["LABEL", "N", "SCALED"]);
        assert_eq!(result.column("N").unwrap(), &["1", "2"]);
        assert_eq!(result.column("LABEL").unwrap(), &["one", "NULL"]);
        assert_eq!(result.column("SCALED").unwrap(), &["1.5", "3"]);
    }

    /// Collects formatted log output so tests can check what was logged.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn contents(&self) -> String {
            return String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned();
        }
    }

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            return Ok(buf.len());
        }

        fn flush(&mut self) -> std::io::Result<()> {
            return Ok(());
        }
    }

    impl<'a> MakeWriter<'a> for CapturedLogs {
        type Writer = CapturedLogs;

        fn make_writer(&'a self) -> Self::Writer {
            return self.clone();
        }
    }

    #[test]
    fn malformed_statement_yields_empty_result() {
        let executor = executor_with_numbers();
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let result = executor.execute("SELEC N FROM NUMBERS;", &["N"]);
            assert!(result.is_empty());
            assert_eq!(result, ResultSet::empty());

            let mutation = executor.execute("INSERT INTO MISSING VALUES ( 1 );", NONE);
            assert!(mutation.is_empty());
        });

        let logged = logs.contents();
        assert!(logged.contains("ERROR"));
        assert!(logged.contains("Error executing the query"));
        assert!(logged.contains("SELEC N FROM NUMBERS;"));
        assert!(logged.contains("INSERT INTO MISSING VALUES ( 1 );"));
    }

    #[test]
    fn statements_without_columns_run_to_completion() {
        let executor = executor_with_numbers();
        assert_eq!(executor.try_execute("SELECT 1;", NONE).unwrap(), StatementResult::Mutation { affected_rows: 0 });
        assert_eq!(executor.try_execute("PRAGMA user_version = 3;", NONE).unwrap(), StatementResult::Mutation { affected_rows: 0 });
        executor.try_execute("INSERT INTO NUMBERS VALUES ( 1, 'one' ), ( 2, 'two' );", NONE).unwrap();
        // No rows changed, even though the previous statement changed two
        assert_eq!(executor.try_execute("CREATE TABLE OTHER ( ID INTEGER );", NONE).unwrap(), StatementResult::Mutation { affected_rows: 0 });
        assert_eq!(executor.try_execute("DELETE FROM NUMBERS;", NONE).unwrap(), StatementResult::Mutation { affected_rows: 2 });
    }

    #[test]
    fn malformed_statement_is_an_error_when_asked() {
        let executor = executor_with_numbers();
        let result = executor.try_execute("SELEC N FROM NUMBERS;", &["N"]);
        assert!(matches!(result, Err(error::Error::RusqliteError(_))));
    }

    #[test]
    fn unknown_result_column_is_an_error() {
        let executor = executor_with_numbers();
        executor.execute("INSERT INTO NUMBERS VALUES ( 1, 'one' );", NONE);
        assert!(executor.try_execute("SELECT N FROM NUMBERS;", &["MISSING"]).is_err());
        assert!(executor.execute("SELECT N FROM NUMBERS;", &["MISSING"]).is_empty());
    }

    #[test]
    fn failed_statement_leaves_no_partial_writes() {
        let executor = executor_with_numbers();
        executor.execute("INSERT INTO NUMBERS VALUES ( 1, 'one' ), ( 2, 'two', 'extra' );", NONE);
        let result = executor.execute("SELECT N FROM NUMBERS;", &["N"]);
        assert_eq!(result.row_count(), 0);
    }

    #[test]
    fn show_and_flush_tables() {
        let executor = executor_with_numbers();
        executor.execute("CREATE TABLE OTHER ( ID INTEGER PRIMARY KEY AUTOINCREMENT );", NONE);
        executor.execute("INSERT INTO OTHER VALUES ( 7 );", NONE);
        assert_eq!(executor.show_tables().unwrap(), vec!["NUMBERS", "OTHER"]);

        executor.flush_tables().unwrap();
        assert!(executor.show_tables().unwrap().is_empty());
    }

    #[test]
    fn file_database_persists_between_connections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("visits.sqlite3");
        {
            let executor = Executor::open(StorageMode::File, &path).unwrap();
            executor.try_execute("CREATE TABLE NUMBERS ( N INTEGER );", NONE).unwrap();
            executor.try_execute("INSERT INTO NUMBERS VALUES ( 3 );", NONE).unwrap();
        }
        let executor = Executor::open(StorageMode::File, &path).unwrap();
        assert_eq!(executor.execute("SELECT N FROM NUMBERS;", &["N"]).column("N").unwrap(), &["3"]);
    }

    #[test]
    fn unreachable_file_is_a_connection_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("visits.sqlite3");
        assert!(matches!(Executor::open_file(&path), Err(error::Error::ConnectionError(_))));
    }
}
