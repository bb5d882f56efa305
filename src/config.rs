use crate::storage::queries::Dialect;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default probe statement for cached connections
pub const DEFAULT_VALIDATION_QUERY: &str = "SELECT 1";

/// Connection descriptor supplied by the surrounding application.
///
/// `database` is a filesystem path for the sqlite dialect (`:memory:` is
/// accepted) and a connection URL for server dialects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub dialect: Dialect,
    pub database: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_query: Option<String>,
}

impl DatabaseConfig {
    pub fn sqlite(database: impl Into<String>) -> Self {
        DatabaseConfig {
            dialect: Dialect::Sqlite,
            database: database.into(),
            validation_query: None,
        }
    }

    pub fn validation_query(&self) -> &str {
        self.validation_query
            .as_deref()
            .unwrap_or(DEFAULT_VALIDATION_QUERY)
    }
}

pub fn load_config(path: &Path) -> anyhow::Result<DatabaseConfig> {
    let contents = std::fs::read_to_string(path)?;
    let config: DatabaseConfig = toml::from_str(&contents)?;
    Ok(config)
}

pub fn write_config(path: &Path, config: &DatabaseConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_toml() {
        let config: DatabaseConfig = toml::from_str(
            r#"
            dialect = "sqlite"
            database = ":memory:"
            "#,
        )
        .unwrap();
        assert_eq!(config.dialect, Dialect::Sqlite);
        assert_eq!(config.database, ":memory:");
        assert_eq!(config.validation_query(), DEFAULT_VALIDATION_QUERY);
    }

    #[test]
    fn test_config_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.toml");

        let config = DatabaseConfig {
            dialect: Dialect::Postgres,
            database: "postgres://localhost/fingerprints".into(),
            validation_query: Some("SELECT 1".into()),
        };
        write_config(&path, &config, false).unwrap();
        assert!(write_config(&path, &config, false).is_err());

        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded.dialect, Dialect::Postgres);
        assert_eq!(loaded.database, config.database);
    }
}
