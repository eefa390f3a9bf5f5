use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;
use validator::Validate;

use crate::resolver::MAX_RELATION_DEPTH;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    #[error("Parse error for {field}: {value} - {source}")]
    Parse {
        field: String,
        value: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Resolver configuration with validation
#[derive(Clone, Debug, Validate, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Collection catalog YAML file
    pub catalog_path: Option<String>,

    /// Relation hops allowed in a single field path (1-6)
    #[validate(range(
        min = 1,
        max = 6,
        message = "Max relation depth must be between 1 and 6"
    ))]
    pub max_relation_depth: usize,

    /// Whether hidden fields may be referenced by filters
    pub allow_hidden_fields: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            catalog_path: None,
            max_relation_depth: MAX_RELATION_DEPTH,
            allow_hidden_fields: false,
        }
    }
}

impl ResolverConfig {
    /// Create configuration from environment variables with validation
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            catalog_path: env::var("RULESQL_CATALOG_PATH").ok(),
            max_relation_depth: parse_env_var(
                "RULESQL_MAX_RELATION_DEPTH",
                &MAX_RELATION_DEPTH.to_string(),
            )?,
            allow_hidden_fields: parse_env_var("RULESQL_ALLOW_HIDDEN_FIELDS", "false")?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Create configuration from CLI arguments with validation
    pub fn from_cli(cli: CliConfig) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.merge_cli(cli)?;
        Ok(config)
    }

    /// Create configuration from YAML file
    pub fn from_yaml_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Parse {
            field: "yaml_file".to_string(),
            value: "file read failed".to_string(),
            source: Box::new(e),
        })?;

        let config: Self = serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
            field: "yaml_content".to_string(),
            value: content,
            source: Box::new(e),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Overlay CLI arguments; only the flags that were given override.
    pub fn merge_cli(&mut self, cli: CliConfig) -> Result<(), ConfigError> {
        if let Some(path) = cli.catalog_path {
            self.catalog_path = Some(path);
        }
        if let Some(depth) = cli.max_relation_depth {
            self.max_relation_depth = depth;
        }
        self.allow_hidden_fields |= cli.allow_hidden_fields;

        self.validate()?;
        Ok(())
    }
}

/// CLI configuration (parsed from command line arguments)
#[derive(Clone, Debug, Default)]
pub struct CliConfig {
    pub catalog_path: Option<String>,
    pub max_relation_depth: Option<usize>,
    pub allow_hidden_fields: bool,
}

/// Parse an environment variable with a default value
fn parse_env_var<T: std::str::FromStr>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = env::var(key).unwrap_or_else(|_| default.to_string());
    value.parse().map_err(|e| ConfigError::Parse {
        field: key.to_string(),
        value,
        source: Box::new(e),
    })
}
