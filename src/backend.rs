pub mod column_type;
pub mod column;
pub mod table;
pub mod data;
pub mod query;
pub mod db;
