use serde::Serialize;
use crate::backend::column_type::ValueType;

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all="camelCase")]
/// A single column of a table schema: its name, value type, and any constraint modifiers.
pub struct Column {
    name: String,
    value_type: ValueType,
    constraints: Vec<String>,
}

impl Column {
    pub fn new(name: &str, value_type: ValueType) -> Self {
        return Column {
            name: name.to_string(),
            value_type,
            constraints: Vec::new(),
        };
    }

    /// Appends constraint modifiers (e.g. "NOT NULL"), which are emitted in the given order.
    pub fn with_constraints(mut self, constraints: &[&str]) -> Self {
        self.constraints.extend(constraints.iter().map(|c| c.to_string()));
        return self;
    }

    pub fn name(&self) -> &str {
        return &self.name;
    }

    pub fn value_type(&self) -> ValueType {
        return self.value_type;
    }

    /// Builds the column definition used in a CREATE TABLE statement.
    pub fn definition(&self) -> String {
        let mut definition = format!("{} {}", self.name, self.value_type.get_sqlite_type());
        for constraint in self.constraints.iter() {
            definition.push(' ');
            definition.push_str(constraint);
        }
        return definition;
    }
}
