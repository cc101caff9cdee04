use std::{collections::HashMap, error::Error, path::Path};

use config::{Config, Environment, File};
use eyre::{Context, Result};
use serde::de::DeserializeOwned;
use tracing::debug;

/// Prefix of environment variables overriding settings
pub const ENV_PREFIX: &str = "RELAY";

/// Load a settings object from the config locations.
///
/// Sources are layered in order: every `*.json` file in `config_dir`, then the
/// `extra_files`, then the `RELAY__`-prefixed entries of `env`.
pub(crate) fn load_settings_object<T>(
    config_dir: Option<&Path>,
    extra_files: &[String],
    env: HashMap<String, String>,
) -> Result<T>
where
    T: DeserializeOwned,
{
    let mut base_config_sources = vec![];
    let mut builder = Config::builder();

    if let Some(dir) = config_dir.filter(|dir| dir.is_dir()) {
        let mut paths = vec![];
        for entry in dir
            .read_dir()
            .with_context(|| format!("Failed to open config directory {dir:?}"))?
        {
            let path = entry?.path();
            if path.is_file() && path.extension().map_or(false, |ext| ext == "json") {
                paths.push(path);
            }
        }
        // later files override earlier ones, keep it deterministic
        paths.sort();
        for path in paths {
            base_config_sources.push(format!("{path:?}"));
            builder = builder.add_source(File::from(path));
        }
    }

    let builder = extra_files.iter().fold(builder, |builder, path| {
        builder.add_source(File::with_name(path))
    });

    let config_deserializer = builder
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .source(Some(env)),
        )
        .build()
        .context("Failed to assemble config sources")?;

    debug!(sources = ?base_config_sources, extra = ?extra_files, "Loaded config sources");

    match config_deserializer.try_deserialize::<T>() {
        Ok(cfg) => Ok(cfg),
        Err(err) => {
            let mut err = if let Some(source_err) = err.source() {
                let source = format!("Config error source: {source_err}");
                Err(err).context(source)
            } else {
                Err(err.into())
            };

            for cfg_path in base_config_sources.iter().chain(extra_files.iter()) {
                err = err.with_context(|| format!("Config loaded: {cfg_path}"));
            }

            err.context("Config deserialization error, please check the relay settings")
        }
    }
}
