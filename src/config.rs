//! Datastore configuration.
//!
//! Precedence: explicit file > `ODMLITE_CONFIG` > `./odmlite.toml` > defaults,
//! with `ODMLITE_*` environment variables applied last.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::collection::WriteConcern;
use crate::errors::OdmError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatastoreOptions {
    /// Field-path checks for queries created by the datastore.
    pub validate_queries: bool,
    /// Field-path checks for update operations created by the datastore.
    pub validate_updates: bool,
    pub class_name_key: String,
    pub store_class_name: bool,
    /// `update(query, ops)` touches every match unless options say otherwise.
    pub multi_update_by_default: bool,
    pub default_write_concern: WriteConcern,
    pub default_max_time_ms: Option<u64>,
    pub log_dir: Option<PathBuf>,
    pub log_level: Option<String>,
    pub log_retention: Option<usize>,
}

impl Default for DatastoreOptions {
    fn default() -> Self {
        Self {
            validate_queries: true,
            validate_updates: true,
            class_name_key: "className".to_string(),
            store_class_name: true,
            multi_update_by_default: true,
            default_write_concern: WriteConcern::default(),
            default_max_time_ms: None,
            log_dir: None,
            log_level: None,
            log_retention: None,
        }
    }
}

impl DatastoreOptions {
    /// # Errors
    /// Returns `OdmError::Config` when the text is not valid for these options.
    pub fn from_toml_str(s: &str) -> Result<Self, OdmError> {
        let options: Self = toml::from_str(s)?;
        options.validate()?;
        Ok(options)
    }

    /// # Errors
    /// Returns an error when the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, OdmError> {
        let s = std::fs::read_to_string(path)?;
        Self::from_toml_str(&s)
    }

    /// Loads options following the documented precedence chain.
    ///
    /// # Errors
    /// Returns an error when a config file exists but cannot be parsed, or an
    /// environment override is malformed.
    pub fn load(explicit: Option<&Path>) -> Result<Self, OdmError> {
        let mut candidates: Vec<PathBuf> = Vec::new();
        if let Some(p) = explicit {
            candidates.push(p.to_path_buf());
        }
        if let Ok(p) = std::env::var("ODMLITE_CONFIG") {
            candidates.push(PathBuf::from(p));
        }
        if let Ok(cur) = std::env::current_dir() {
            candidates.push(cur.join("odmlite.toml"));
        }
        let mut options = Self::default();
        if let Some(found) = candidates.iter().find(|p| p.exists()) {
            log::info!("loading datastore options from {}", found.display());
            options = Self::from_file(found)?;
        }
        options.apply_env()?;
        Ok(options)
    }

    /// Applies `ODMLITE_VALIDATE_QUERIES`, `ODMLITE_VALIDATE_UPDATES` and
    /// `ODMLITE_CLASS_NAME_KEY` when set.
    ///
    /// # Errors
    /// Returns `OdmError::Config` for values that are not booleans.
    pub fn apply_env(&mut self) -> Result<(), OdmError> {
        if let Ok(v) = std::env::var("ODMLITE_VALIDATE_QUERIES") {
            self.validate_queries = parse_flag("ODMLITE_VALIDATE_QUERIES", &v)?;
        }
        if let Ok(v) = std::env::var("ODMLITE_VALIDATE_UPDATES") {
            self.validate_updates = parse_flag("ODMLITE_VALIDATE_UPDATES", &v)?;
        }
        if let Ok(v) = std::env::var("ODMLITE_CLASS_NAME_KEY") {
            self.class_name_key = v;
        }
        self.validate()
    }

    fn validate(&self) -> Result<(), OdmError> {
        if self.class_name_key.is_empty() || self.class_name_key.starts_with('$') || self.class_name_key.contains('.') {
            return Err(OdmError::Config(format!("invalid class_name_key '{}'", self.class_name_key)));
        }
        Ok(())
    }
}

fn parse_flag(name: &str, value: &str) -> Result<bool, OdmError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(OdmError::Config(format!("{name}: expected a boolean, got '{other}'"))),
    }
}
