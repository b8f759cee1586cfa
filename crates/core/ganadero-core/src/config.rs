//! Layered configuration loading.
//!
//! Values are resolved in this order, later sources overriding earlier ones:
//!
//! 1. the type's [`Default`] implementation
//! 2. an optional TOML file
//! 3. environment variables named `{PREFIX}__{FIELD}`, with `__` separating
//!    nested sections (e.g. `GANADERO__SYNC__REPLAY_TIMEOUT_SECS=10`)

use crate::{GanaderoError, GanaderoResult};
use config::{Config, Environment, File, FileFormat};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

/// Separator between the prefix, sections and keys of environment variables
pub const ENV_SEPARATOR: &str = "__";

/// Trait for configuration structures that can check their own invariants
pub trait Validate {
    /// Validate the configuration
    fn validate(&self) -> GanaderoResult<()>;
}

/// Load a configuration value from defaults, an optional TOML file and the
/// environment, then validate it.
pub fn load_layered<T>(path: Option<&Path>, env_prefix: &str) -> GanaderoResult<T>
where
    T: DeserializeOwned + Serialize + Default + Validate,
{
    let mut builder = Config::builder().add_source(Config::try_from(&T::default())?);

    if let Some(path) = path {
        if !path.exists() {
            return Err(GanaderoError::config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix(env_prefix)
            .prefix_separator(ENV_SEPARATOR)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    let value: T = builder.build()?.try_deserialize()?;
    value.validate()?;
    Ok(value)
}

/// Parse a TOML document directly (no environment overlay)
pub fn from_toml_str<T>(content: &str) -> GanaderoResult<T>
where
    T: DeserializeOwned + Validate,
{
    let value: T = toml::from_str(content)?;
    value.validate()?;
    Ok(value)
}
