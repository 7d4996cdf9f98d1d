use std::collections::HashMap;

use serde::Deserialize;

use crate::error::{DbSqlError, Result};

/// A named connection string and the provider it is meant for.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConnectionSettings {
    #[serde(default)]
    pub name: String,
    pub provider: String,
    pub connection_string: String,
}

impl ConnectionSettings {
    pub fn new(
        name: impl Into<String>,
        provider: impl Into<String>,
        connection_string: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            provider: provider.into(),
            connection_string: connection_string.into(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    connection_strings: HashMap<String, ConnectionSettings>,
}

/// Named connection strings, usually loaded from a TOML document:
///
/// ```toml
/// [connection_strings.default]
/// provider = "postgres"
/// connection_string = "host=localhost user=postgres dbname=app"
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConnectionStrings {
    entries: HashMap<String, ConnectionSettings>,
}

impl ConnectionStrings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_toml_str(source: &str) -> Result<Self> {
        let file: ConfigFile =
            toml::from_str(source).map_err(|e| DbSqlError::Config(e.to_string()))?;

        let mut strings = Self::new();
        for (name, mut settings) in file.connection_strings {
            if settings.connection_string.trim().is_empty() {
                return Err(DbSqlError::Config(format!(
                    "connection string `{}` is empty",
                    name
                )));
            }
            settings.name = name;
            strings.add(settings);
        }
        Ok(strings)
    }

    /// Adds or replaces an entry, keyed by its name.
    pub fn add(&mut self, settings: ConnectionSettings) {
        self.entries.insert(settings.name.clone(), settings);
    }

    pub fn with(mut self, settings: ConnectionSettings) -> Self {
        self.add(settings);
        self
    }

    pub fn get(&self, name: &str) -> Result<&ConnectionSettings> {
        self.entries
            .get(name)
            .ok_or_else(|| DbSqlError::Config(format!("no connection string named `{}`", name)))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_toml_str() {
        let strings = ConnectionStrings::from_toml_str(
            r#"
            [connection_strings.default]
            provider = "postgres"
            connection_string = "host=localhost user=postgres"

            [connection_strings.reporting]
            provider = "in-memory"
            connection_string = "memory"
            "#,
        )
        .unwrap();

        assert_eq!(strings.len(), 2);
        let default = strings.get("default").unwrap();
        assert_eq!(default.name, "default");
        assert_eq!(default.provider, "postgres");
        assert_eq!(default.connection_string, "host=localhost user=postgres");
    }

    #[test]
    fn test_missing_name_is_config_error() {
        let strings = ConnectionStrings::new();
        match strings.get("default").unwrap_err() {
            DbSqlError::Config(message) => assert!(message.contains("default")),
            other => panic!("Expected Config error, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = ConnectionStrings::from_toml_str("[connection_strings.default]\nprovider = 1")
            .unwrap_err();
        assert!(matches!(err, DbSqlError::Config(_)));
    }

    #[test]
    fn test_empty_connection_string_rejected() {
        let err = ConnectionStrings::from_toml_str(
            "[connection_strings.default]\nprovider = \"postgres\"\nconnection_string = \"\"",
        )
        .unwrap_err();
        assert!(matches!(err, DbSqlError::Config(_)));
    }
}
