use config::{Config, Environment, File};
use serde::de::DeserializeOwned;
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use tracing::info;

/// Env variables overriding the file use this prefix, e.g. `APEX__SERVER__PORT`.
pub const ENV_PREFIX: &str = "APEX";

#[apex_derive::apex_error]
pub enum ConfigError {
    #[error("Config error{}: {source}", format_context(.context))]
    Config { source: config::ConfigError, context: Option<Cow<'static, str>> },
}

/// Loads a layered configuration: the file first, then `APEX__` environment overrides.
///
/// Nested keys use double underscores, so `APEX__PLACEMENT__COOLDOWN_DAYS=7` sets
/// `placement.cooldown_days`. The file defaults to `server` (any supported extension) in
/// the working directory and may be absent; fields missing from both layers fall back to
/// the target's serde defaults.
///
/// # Errors
/// Returns an error when a source cannot be parsed or the merged values do not match `T`.
///
/// # Example
/// ```rust
/// use apex_kernel::config::load_config;
///
/// #[derive(Default, serde::Deserialize)]
/// struct AppConfig {
///     #[serde(default)]
///     port: u16,
/// }
///
/// let cfg: AppConfig = load_config(Some("config/missing")).unwrap_or_default();
/// ```
pub fn load_config<T>(path: Option<impl AsRef<Path>>) -> Result<T, ConfigError>
where
    T: DeserializeOwned,
{
    let effective_path = path.map_or_else(|| PathBuf::from("server"), |p| p.as_ref().to_path_buf());

    let builder = Config::builder()
        .add_source(File::from(effective_path.as_path()).required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .convert_case(config::Case::Snake),
        );

    info!("Loading config from {}", effective_path.display());

    let config = builder
        .build()
        .context("Failed to build config")?
        .try_deserialize::<T>()
        .context("Failed to deserialize config")?;

    Ok(config)
}
