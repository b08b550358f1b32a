//! Merge rules: defaults applied before any file or environment source.

use crate::config::{ContextConfig, DEFAULT_CONTINUATION_LANE};
use crate::execution::model::{DEFAULT_FORK_SEPARATOR, DEFAULT_LANE};
use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    let logging = ContextConfig::default().logging;
    Config::builder()
        .set_default("default_lane", DEFAULT_LANE)?
        .set_default("continuation_lane", DEFAULT_CONTINUATION_LANE)?
        .set_default("fork_separator", DEFAULT_FORK_SEPARATOR)?
        .set_default("logging.level", logging.level)?
        .set_default("logging.format", logging.format)?
        .set_default("logging.output", logging.output)
}
