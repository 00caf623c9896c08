//! Run configuration.
//!
//! A configuration file holds one `name=value` pair per line. Blank lines and
//! lines starting with `#` or `;` are ignored. Names are case-insensitive;
//! unknown names are reported and skipped.

use std::fs;
use std::path::Path;

use crate::compose::{Composer, DEFAULT_ENTRY_LABEL, DEFAULT_SHARD_CAPACITY};
use crate::format::OutputFormat;
use crate::Oracle;

/// Errors raised while loading a configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line_no}: expected `name=value`, found `{line}`")]
    InvalidLine { line_no: usize, line: String },

    #[error("invalid value `{value}` for `{key}`")]
    InvalidValue { key: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Outer operand values per generated module
    pub shard_capacity: usize,
    /// Label the generated modules start at and end with
    pub entry_label: String,
    /// Report format
    pub format: OutputFormat,
    /// Compare modules on the rayon thread pool
    pub parallel: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            shard_capacity: DEFAULT_SHARD_CAPACITY,
            entry_label: DEFAULT_ENTRY_LABEL.to_string(),
            format: OutputFormat::default(),
            parallel: true,
        }
    }
}

impl Config {
    /// Load a configuration file over the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        log::debug!("configuration: {}", path.display());
        Self::parse(&text)
    }

    /// Parse configuration text over the defaults.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        for (number, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            let Some((name, value)) = line.split_once('=') else {
                return Err(ConfigError::InvalidLine {
                    line_no: number + 1,
                    line: line.to_string(),
                });
            };
            config.set(name.trim(), value.trim())?;
        }

        Ok(config)
    }

    /// Set one named value.
    pub fn set(&mut self, name: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = || ConfigError::InvalidValue {
            key: name.to_string(),
            value: value.to_string(),
        };

        match name.to_lowercase().replace('-', "_").as_str() {
            "shard_capacity" | "capacity" => {
                self.shard_capacity = value.parse::<usize>().ok().filter(|capacity| *capacity > 0).ok_or_else(invalid)?;
            }
            "entry_label" => {
                let valid = value.chars().next().map_or(false, |c| c.is_ascii_alphabetic() || c == '_')
                    && value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
                if !valid {
                    return Err(invalid());
                }
                self.entry_label = value.to_string();
            }
            "format" => {
                self.format = value.parse().map_err(|_| invalid())?;
            }
            "parallel" => {
                self.parallel = flag(value);
            }
            _ => log::warn!("ignoring unknown configuration name `{}`", name),
        }

        log::debug!("config: {}={}", name, value);
        Ok(())
    }

    pub fn composer(&self) -> Composer {
        Composer::new(self.shard_capacity).with_entry_label(&self.entry_label)
    }

    pub fn oracle(&self) -> Oracle {
        Oracle::default().with_entry_label(&self.entry_label)
    }
}

/// Digits greater than zero, `on` and `true` are set; anything else is clear.
fn flag(value: &str) -> bool {
    let value = value.to_lowercase();
    if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
        return !value.trim_start_matches('0').is_empty();
    }
    value == "on" || value == "true"
}
