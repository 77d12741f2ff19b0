//! Store configuration module.
//!
//! This module provides configuration loading for the record store from
//! environment variables.
//!
//! # Environment Variables
//!
//! - `STORE_ORDER`: B-tree order for new indexes (default: `6`, minimum `4`)
//! - `STORE_DATA_DIRECTORY`: Directory holding `index.json` and `records.json` (default: `./data`)
//! - `STORE_AUTOSAVE`: Save after every mutating command (default: `false`)
//!
//! # Invariants
//!
//! - `order` is always at least [`MIN_ORDER`]
//! - `data_directory` is always a valid path (may not exist yet)

use std::path::PathBuf;

use crate::storage::btree::MIN_ORDER;

/// Store configuration.
///
/// # Post-conditions
///
/// When constructed via `from_env()`, `order >= MIN_ORDER`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Order of the index for a fresh database.
    /// An existing snapshot keeps the order it was written with.
    pub order: usize,
    /// Directory where the snapshot files are stored.
    pub data_directory: PathBuf,
    /// Whether the binary saves after every mutating command.
    pub autosave: bool,
}

/// Error returned when loading configuration fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable is missing.
    MissingEnvVar(String),
    /// An environment variable has an invalid value.
    InvalidValue { name: String, message: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingEnvVar(name) => {
                write!(f, "missing required environment variable: {name}")
            }
            Self::InvalidValue { name, message } => {
                write!(f, "invalid value for {name}: {message}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            order: Self::DEFAULT_ORDER,
            data_directory: PathBuf::from(Self::DEFAULT_DATA_DIRECTORY),
            autosave: false,
        }
    }
}

impl StoreConfig {
    /// Default B-tree order.
    pub const DEFAULT_ORDER: usize = 6;
    /// Default data directory.
    pub const DEFAULT_DATA_DIRECTORY: &'static str = "./data";

    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `STORE_ORDER` is set but not an integer of at least 4
    /// - `STORE_AUTOSAVE` is set but not one of `true`, `false`, `1`, `0`
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            order: parse_order(std::env::var("STORE_ORDER").ok().as_deref())?,
            data_directory: Self::load_data_directory(),
            autosave: parse_autosave(std::env::var("STORE_AUTOSAVE").ok().as_deref())?,
        })
    }

    /// Load the data directory from environment.
    ///
    /// Returns the default if not set.
    fn load_data_directory() -> PathBuf {
        std::env::var("STORE_DATA_DIRECTORY")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(Self::DEFAULT_DATA_DIRECTORY))
    }
}

fn parse_order(value: Option<&str>) -> Result<usize, ConfigError> {
    let Some(value) = value else {
        return Ok(StoreConfig::DEFAULT_ORDER);
    };
    let invalid = || ConfigError::InvalidValue {
        name: "STORE_ORDER".to_string(),
        message: format!("'{value}' is not a valid order (must be an integer >= {MIN_ORDER})"),
    };
    let order = value.trim().parse::<usize>().map_err(|_| invalid())?;
    if order < MIN_ORDER {
        return Err(invalid());
    }
    Ok(order)
}

fn parse_autosave(value: Option<&str>) -> Result<bool, ConfigError> {
    match value.map(str::trim) {
        None => Ok(false),
        Some("true" | "1") => Ok(true),
        Some("false" | "0") => Ok(false),
        Some(other) => Err(ConfigError::InvalidValue {
            name: "STORE_AUTOSAVE".to_string(),
            message: format!("'{other}' is not a boolean (use true, false, 1 or 0)"),
        }),
    }
}
