//! Configuration handling for schema_graph

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::schema::inference::InferenceOptions;
use crate::schema::types::Alias;

/// Load configuration from a TOML file, or YAML when the extension says so
pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
    let config: Config = parse_file(path.as_ref())?;
    config.validate()?;
    Ok(config)
}

/// Load only the sections used without a database connection.
///
/// Other sections, `[database]` included, may be absent and are ignored.
pub fn load_offline_from_file(path: impl AsRef<Path>) -> Result<OfflineConfig> {
    let config: OfflineConfig = parse_file(path.as_ref())?;
    config.relations.validate()?;
    Ok(config)
}

fn parse_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let config_str = fs::read_to_string(path)
        .map_err(|e| Error::ConfigError(format!("Failed to read config file: {}", e)))?;

    let is_yaml = matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yml") | Some("yaml")
    );

    if is_yaml {
        serde_yaml::from_str(&config_str)
            .map_err(|e| Error::ConfigError(format!("Failed to parse config file: {}", e)))
    } else {
        toml::from_str(&config_str)
            .map_err(|e| Error::ConfigError(format!("Failed to parse config file: {}", e)))
    }
}

/// Parse and validate a TOML configuration
pub fn from_toml_str(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content)
        .map_err(|e| Error::ConfigError(format!("Failed to parse config file: {}", e)))?;
    config.validate()?;
    Ok(config)
}

/// Parse and validate a YAML configuration
pub fn from_yaml_str(content: &str) -> Result<Config> {
    let config: Config = serde_yaml::from_str(content)
        .map_err(|e| Error::ConfigError(format!("Failed to parse config file: {}", e)))?;
    config.validate()?;
    Ok(config)
}

/// Represents the complete schema_graph configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub relations: RelationsConfig,
    #[serde(default)]
    pub output: OutputConfig,
    pub logging: Option<LoggingConfig>,
}

impl Config {
    /// Reject settings that would make a run meaningless
    pub fn validate(&self) -> Result<()> {
        self.database.validate()?;
        self.relations.validate()?;

        if self.output.folder.as_os_str().is_empty() {
            return Err(Error::ConfigError("output.folder must not be empty".to_string()));
        }

        Ok(())
    }

    /// Name of the combined export document, without the `.schema` suffix
    pub fn export_name(&self) -> String {
        self.output
            .name
            .clone()
            .or_else(|| self.database.schema.clone())
            .or_else(|| self.database.database_name())
            .unwrap_or_else(|| "database".to_string())
    }
}

/// Relation and logging settings for runs on an exported snapshot
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct OfflineConfig {
    #[serde(default)]
    pub relations: RelationsConfig,
    pub logging: Option<LoggingConfig>,
}

/// Database connection configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub driver: String,
    pub url: String,
    pub schema: Option<String>,
    pub pool_size: Option<u32>,
    pub timeout_seconds: Option<u64>,
}

const SUPPORTED_DRIVERS: &[&str] = &["mysql", "postgres", "sqlite"];

impl DatabaseConfig {
    fn validate(&self) -> Result<()> {
        if !SUPPORTED_DRIVERS.contains(&self.driver.as_str()) {
            return Err(Error::ConfigError(format!(
                "Unsupported database driver `{}` (expected one of {})",
                self.driver,
                SUPPORTED_DRIVERS.join(", ")
            )));
        }
        if self.url.trim().is_empty() {
            return Err(Error::ConfigError("database.url must not be empty".to_string()));
        }
        Ok(())
    }

    /// Database name taken from the last path segment of the URL
    pub fn database_name(&self) -> Option<String> {
        let without_query = self.url.split('?').next().unwrap_or_default();
        let (_, path) = without_query.split_once("://")?;
        let (_, name) = path.rsplit_once('/')?;
        let name = name.trim_end_matches(".db").trim_end_matches(".sqlite");
        if name.is_empty() {
            None
        } else {
            Some(name.to_string())
        }
    }
}

/// Relation discovery configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct RelationsConfig {
    /// Read foreign-key constraints declared in the catalog
    pub extract_declared: bool,
    /// Run naming-convention inference after the declared merge
    pub discover_by_naming: bool,
    /// Skip prefix/suffix matching; aliases still apply
    pub ignore_conventions: bool,
    pub prefix: String,
    pub suffix: String,
    /// Also match singular forms of plural table names
    pub match_singular: bool,
    pub aliases: Vec<Alias>,
}

impl Default for RelationsConfig {
    fn default() -> Self {
        Self {
            extract_declared: true,
            discover_by_naming: false,
            ignore_conventions: false,
            prefix: "id_".to_string(),
            suffix: "_id".to_string(),
            match_singular: true,
            aliases: Vec::new(),
        }
    }
}

impl RelationsConfig {
    fn validate(&self) -> Result<()> {
        if self.prefix.is_empty() && self.suffix.is_empty() {
            return Err(Error::ConfigError(
                "relations.prefix and relations.suffix cannot both be empty".to_string(),
            ));
        }

        for (i, alias) in self.aliases.iter().enumerate() {
            let parts = [
                &alias.local_table,
                &alias.local_field,
                &alias.foreign_table,
                &alias.foreign_field,
            ];
            if parts.iter().any(|part| part.trim().is_empty()) {
                return Err(Error::ConfigError(format!(
                    "relations.aliases[{}] has an empty table or field name",
                    i
                )));
            }
        }

        Ok(())
    }

    /// Options for the inference engine
    pub fn inference_options(&self) -> InferenceOptions {
        InferenceOptions {
            aliases: self.aliases.clone(),
            ignore_conventions: self.ignore_conventions,
            prefix: self.prefix.clone(),
            suffix: self.suffix.clone(),
            match_singular: self.match_singular,
        }
    }
}

/// How the exported schema is laid out on disk
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExportMode {
    /// One `<name>.schema.json` holding every table
    #[default]
    Combined,
    /// One `<table>.json` per table
    PerTable,
}

/// Output configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct OutputConfig {
    pub folder: PathBuf,
    pub mode: ExportMode,
    pub name: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            folder: PathBuf::from("."),
            mode: ExportMode::Combined,
            name: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
    pub format: String,
    pub stdout: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            format: "text".to_string(),
            stdout: true,
        }
    }
}
