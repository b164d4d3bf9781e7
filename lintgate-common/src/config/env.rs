//! Environment variable parsing with type safety.
//!
//! Collects errors during parsing so all issues can be reported at once
//! instead of failing on the first bad variable.

use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during environment variable parsing.
#[derive(Debug, Error)]
pub enum EnvError {
    /// Invalid value for a variable.
    #[error("Invalid value for {var}: expected {expected}, got '{value}'")]
    InvalidValue {
        var: String,
        expected: String,
        value: String,
    },

    /// Value out of valid range.
    #[error("Value out of range for {var}: {value} (valid: {min}..={max})")]
    OutOfRange {
        var: String,
        value: String,
        min: String,
        max: String,
    },
}

/// Type-safe parser for `LINTGATE_*` variables.
///
/// Unset variables yield `None`; set but invalid ones record an error and
/// also yield `None`, so the caller keeps its lower-precedence value.
pub struct EnvParser {
    prefix: &'static str,
    errors: Vec<EnvError>,
}

impl EnvParser {
    pub fn new() -> Self {
        Self {
            prefix: "LINTGATE_",
            errors: Vec::new(),
        }
    }

    pub fn errors(&self) -> &[EnvError] {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn take_errors(&mut self) -> Vec<EnvError> {
        std::mem::take(&mut self.errors)
    }

    fn var_name(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    /// Accepts 1, true, yes, on and 0, false, no, off, "" (any case).
    pub fn get_bool(&mut self, name: &str) -> Option<bool> {
        let var_name = self.var_name(name);
        let value = env::var(&var_name).ok()?;
        match value.to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" | "" => Some(false),
            _ => {
                self.errors.push(EnvError::InvalidValue {
                    var: var_name,
                    expected: "boolean (true/false/1/0/yes/no)".to_string(),
                    value,
                });
                None
            }
        }
    }

    pub fn get_u64_range(&mut self, name: &str, min: u64, max: u64) -> Option<u64> {
        let var_name = self.var_name(name);
        let value = env::var(&var_name).ok()?;
        match value.trim().parse::<u64>() {
            Ok(n) if n >= min && n <= max => Some(n),
            Ok(n) => {
                self.errors.push(EnvError::OutOfRange {
                    var: var_name,
                    value: n.to_string(),
                    min: min.to_string(),
                    max: max.to_string(),
                });
                None
            }
            Err(_) => {
                self.errors.push(EnvError::InvalidValue {
                    var: var_name,
                    expected: "unsigned 64-bit integer".to_string(),
                    value,
                });
                None
            }
        }
    }

    /// A duration given in whole milliseconds, bounded by `max`.
    pub fn get_duration_ms(&mut self, name: &str, max: Duration) -> Option<Duration> {
        let max_ms = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);
        self.get_u64_range(name, 0, max_ms)
            .map(Duration::from_millis)
    }

    /// A path with `~/` expanded. Empty counts as unset.
    pub fn get_path(&mut self, name: &str) -> Option<PathBuf> {
        let value = self.get_optional_string(name)?;
        Some(match value.strip_prefix("~/") {
            Some(stripped) => match dirs::home_dir() {
                Some(home) => home.join(stripped),
                None => PathBuf::from(&value),
            },
            None => PathBuf::from(&value),
        })
    }

    /// None if unset or empty.
    pub fn get_optional_string(&mut self, name: &str) -> Option<String> {
        let var_name = self.var_name(name);
        env::var(&var_name).ok().filter(|value| !value.is_empty())
    }
}

impl Default for EnvParser {
    fn default() -> Self {
        Self::new()
    }
}
