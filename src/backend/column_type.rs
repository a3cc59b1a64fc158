use serde::{Serialize, Deserialize};
use time::Date;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use crate::util::error;

/// The ISO calendar date format used for every date written to or read from the database.
pub const ISO_DATE: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Integer,
    Date,
    Text,
}

impl ValueType {
    /// Gets the corresponding SQLite column type for a given value type.
    pub fn get_sqlite_type(&self) -> &'static str {
        return match self {
            Self::Integer => "INTEGER",
            Self::Date => "DATE",
            Self::Text => "VARCHAR(255)",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integer(i64),
    Date(Date),
    Text(String),
}

impl Value {
    /// Gets the type of the value.
    pub fn value_type(&self) -> ValueType {
        return match self {
            Self::Integer(_) => ValueType::Integer,
            Self::Date(_) => ValueType::Date,
            Self::Text(_) => ValueType::Text,
        }
    }

    /// Formats the value as a literal that can be placed directly into a statement.
    pub fn to_sql_literal(&self) -> Result<String, error::Error> {
        match self {
            Self::Integer(i) => {
                return Ok(i.to_string());
            },
            Self::Date(d) => {
                // SQLite has no typed date literal, so the ISO string goes through DATE()
                return Ok(format!("DATE('{}')", d.format(ISO_DATE)?));
            },
            Self::Text(s) => {
                return Ok(quote_text(s));
            }
        }
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Value {
        Value::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Value {
        Value::Integer(i.into())
    }
}

impl From<Date> for Value {
    fn from(d: Date) -> Value {
        Value::Date(d)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Value {
        Value::Text(s)
    }
}

/// Wraps text in single quotes, doubling any quote inside it.
pub fn quote_text(s: &str) -> String {
    return format!("'{}'", s.replace('\'', "''"));
}

/// Parses an ISO calendar date (yyyy-MM-dd).
pub fn parse_iso_date(s: &str) -> Result<Date, time::error::Parse> {
    return Date::parse(s, ISO_DATE);
}
