//! Configuration System
//!
//! Layered configuration for the execution context service: built-in defaults,
//! then the user config file, then an explicit file, then `RUNCONTEXT_*`
//! environment variables.

use crate::error::ContextError;
use crate::execution::model::{DEFAULT_FORK_SEPARATOR, DEFAULT_LANE};
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

mod merge;
mod sources;

pub use sources::global_file::global_config_path;

/// Lane that continuations use when none is given.
pub const DEFAULT_CONTINUATION_LANE: &str = "PromiseThread";

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Lane returned for threads that are not bound to one
    #[serde(default = "default_lane")]
    pub default_lane: String,

    /// Lane used by continuations created without an explicit view
    #[serde(default = "default_continuation_lane")]
    pub continuation_lane: String,

    /// Separator between a lane name and the counter of an unnamed fork
    #[serde(default = "default_fork_separator")]
    pub fork_separator: String,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_lane() -> String {
    DEFAULT_LANE.to_string()
}

fn default_continuation_lane() -> String {
    DEFAULT_CONTINUATION_LANE.to_string()
}

fn default_fork_separator() -> String {
    DEFAULT_FORK_SEPARATOR.to_string()
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            default_lane: default_lane(),
            continuation_lane: default_continuation_lane(),
            fork_separator: default_fork_separator(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    Lane(String, String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Lane(field, msg) => write!(f, "Lane '{}': {}", field, msg),
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl ContextConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        for (field, value) in [
            ("default_lane", &self.default_lane),
            ("continuation_lane", &self.continuation_lane),
        ] {
            if value.trim().is_empty() {
                errors.push(ValidationError::Lane(
                    field.to_string(),
                    "lane name cannot be empty".to_string(),
                ));
            }
        }

        if self.fork_separator.is_empty() {
            errors.push(ValidationError::Lane(
                "fork_separator".to_string(),
                "separator cannot be empty".to_string(),
            ));
        } else if self.default_lane.contains(&self.fork_separator) {
            // Unnamed forks of the default lane would be indistinguishable from nested forks.
            errors.push(ValidationError::Lane(
                "default_lane".to_string(),
                format!("must not contain the fork separator '{}'", self.fork_separator),
            ));
        }

        if self.default_lane == self.continuation_lane {
            errors.push(ValidationError::Lane(
                "continuation_lane".to_string(),
                "must differ from default_lane".to_string(),
            ));
        }

        if let Err(e) = self.logging.validate() {
            errors.push(ValidationError::Logging(e));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Loads [`ContextConfig`] from its layered sources.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load and validate configuration. `file` is an optional explicit TOML file.
    pub fn load(file: Option<&Path>) -> Result<ContextConfig, ContextError> {
        let builder = merge::builder_with_defaults()?;
        let builder = sources::global_file::add_to_builder(builder)?;
        let builder = sources::explicit_file::add_to_builder(builder, file)?;
        let builder = sources::env::add_to_builder(builder);

        let config: ContextConfig = builder.build()?.try_deserialize()?;
        config.validate().map_err(|errors| {
            let error_msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            ContextError::Config(format!(
                "Configuration validation failed:\n{}",
                error_msgs.join("\n")
            ))
        })?;
        Ok(config)
    }

    /// Defaults only; ignores files and environment.
    pub fn defaults() -> ContextConfig {
        ContextConfig::default()
    }
}
