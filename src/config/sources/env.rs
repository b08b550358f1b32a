//! Environment source: RUNCONTEXT_DEFAULT_LANE, RUNCONTEXT_LOGGING__LEVEL, ...

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::Environment;

/// Prefix of every environment override.
pub const ENV_PREFIX: &str = "RUNCONTEXT";

/// Add environment overrides. Nested keys use `__` (e.g. `RUNCONTEXT_LOGGING__FORMAT`).
pub fn add_to_builder(builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
    builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(false),
    )
}
