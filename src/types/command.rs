use crate::types::{SqlType, SqlValue};

/// A single bound parameter: name, type tag and value.
#[derive(Debug, Clone, PartialEq)]
pub struct DbParameter {
    pub name: String,
    pub sql_type: SqlType,
    pub value: SqlValue,
}

impl DbParameter {
    pub fn new(name: impl Into<String>, sql_type: SqlType, value: SqlValue) -> Self {
        Self {
            name: name.into(),
            sql_type,
            value,
        }
    }

    /// Parameter name without a leading `@`, `:` or `$` marker.
    pub fn bare_name(&self) -> &str {
        self.name.trim_start_matches(['@', ':', '$'])
    }
}

/// SQL text plus the parameters attached to it.
/// Created by a connection and handed back to it for execution.
#[derive(Debug, Clone, PartialEq)]
pub struct DbCommand {
    text: String,
    parameters: Vec<DbParameter>,
}

impl DbCommand {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            parameters: Vec::new(),
        }
    }

    pub fn add_parameter(&mut self, parameter: DbParameter) {
        self.parameters.push(parameter);
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn parameters(&self) -> &[DbParameter] {
        &self.parameters
    }

    /// Finds a parameter by name, ignoring placeholder markers on either side.
    pub fn parameter(&self, name: &str) -> Option<&DbParameter> {
        let name = name.trim_start_matches(['@', ':', '$']);
        self.parameters.iter().find(|p| p.bare_name() == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_lookup_ignores_marker() {
        let mut command = DbCommand::new("SELECT * FROM t WHERE age > @age");
        command.add_parameter(DbParameter::new("age", SqlType::Int32, SqlValue::Int32(18)));

        assert_eq!(command.parameter("@age").unwrap().value, SqlValue::Int32(18));
        assert_eq!(command.parameter("age").unwrap().sql_type, SqlType::Int32);
        assert!(command.parameter("name").is_none());
    }
}
