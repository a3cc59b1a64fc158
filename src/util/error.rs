use std::fmt;
use rusqlite::Error as RusqliteError;
use serde_json::Error as SerdeJsonError;
use time::error::Format as TimeFormatError;
use tokio::task::JoinError;
use crate::backend::column_type::ValueType;

#[derive(Debug)]
pub enum Error {
    AdhocError(&'static str),
    ConnectionError(RusqliteError),
    RusqliteError(RusqliteError),
    IoError(std::io::Error),
    SerdeJsonError(SerdeJsonError),
    TimeFormatError(TimeFormatError),
    JoinError(JoinError),
    InvalidConfig(String),
    EmptySchema(String),
    DuplicateColumn { table: String, column: String },
    UnknownColumn { table: String, column: String },
    MissingColumn { table: String, column: String },
    TypeMismatch { column: String, expected: ValueType, actual: ValueType },
    ArityMismatch { table: String, expected: usize, actual: usize },
    ForeignRow { table: String, row_table: String },
    EmptyEntityList,
}

impl From<RusqliteError> for Error {
    fn from(e: RusqliteError) -> Error {
        Error::RusqliteError(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Error {
        Error::IoError(e)
    }
}

impl From<SerdeJsonError> for Error {
    fn from(e: SerdeJsonError) -> Error {
        Error::SerdeJsonError(e)
    }
}

impl From<TimeFormatError> for Error {
    fn from(e: TimeFormatError) -> Error {
        Error::TimeFormatError(e)
    }
}

impl From<JoinError> for Error {
    fn from(e: JoinError) -> Error {
        Error::JoinError(e)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AdhocError(s) => {
                return write!(f, "{s}");
            },
            Self::ConnectionError(e) => {
                return write!(f, "An SQLite error occurred while attempting to open the database: {e}");
            },
            Self::RusqliteError(e) => {
                return write!(f, "SQLite error occurred: {e}");
            },
            Self::IoError(e) => {
                return write!(f, "I/O error occurred: {e}");
            },
            Self::SerdeJsonError(e) => {
                return write!(f, "JSON error occurred: {e}");
            },
            Self::TimeFormatError(e) => {
                return write!(f, "Date formatting error occurred: {e}");
            },
            Self::JoinError(e) => {
                return write!(f, "Background task failed: {e}");
            },
            Self::InvalidConfig(s) => {
                return write!(f, "Invalid configuration: {s}");
            },
            Self::EmptySchema(table) => {
                return write!(f, "Table {table} must have at least one column.");
            },
            Self::DuplicateColumn { table, column } => {
                return write!(f, "Table {table} declares column {column} more than once.");
            },
            Self::UnknownColumn { table, column } => {
                return write!(f, "Table {table} has no column named {column}.");
            },
            Self::MissingColumn { table, column } => {
                return write!(f, "No value was given for column {column} of table {table}.");
            },
            Self::TypeMismatch { column, expected, actual } => {
                return write!(f, "Column {column} expects a value of type {expected:?}, but got {actual:?}.");
            },
            Self::ArityMismatch { table, expected, actual } => {
                return write!(f, "Table {table} has {expected} columns, but {actual} values were given.");
            },
            Self::ForeignRow { table, row_table } => {
                return write!(f, "A row built for table {row_table} cannot be inserted into table {table}.");
            },
            Self::EmptyEntityList => {
                return write!(f, "The cafe list is empty.");
            },
        }
    }
}

impl std::error::Error for Error {}
