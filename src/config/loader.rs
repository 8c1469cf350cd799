// Configuration loader
// Defaults, then an optional TOML file, then environment variables

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use super::settings::{Config, FileConfig};
use crate::clamd::DaemonAddress;

pub const ENV_CLAMD_ADDRESS: &str = "CLAMD_PORT";
pub const ENV_LISTEN: &str = "CLAMREST_LISTEN";
pub const ENV_READY_ATTEMPTS: &str = "CLAMREST_READY_ATTEMPTS";
pub const ENV_READY_INTERVAL_SECS: &str = "CLAMREST_READY_INTERVAL_SECS";
pub const ENV_CONNECT_TIMEOUT_SECS: &str = "CLAMREST_CONNECT_TIMEOUT_SECS";
pub const ENV_IO_TIMEOUT_SECS: &str = "CLAMREST_IO_TIMEOUT_SECS";
pub const ENV_CHUNK_SIZE: &str = "CLAMREST_CHUNK_SIZE";
pub const ENV_MAX_UPLOAD_BYTES: &str = "CLAMREST_MAX_UPLOAD_BYTES";

/// Default config file location (`~/.config/clamrest/config.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("clamrest").join("config.toml"))
}

/// Load configuration from `path` (or the default file, if present) and the
/// process environment
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let default_path = default_config_path().filter(|p| p.exists());
    let path = path.or(default_path.as_deref());
    load_config_with(path, |key| std::env::var(key).ok())
}

/// Same as `load_config`, with an explicit file and environment lookup
pub fn load_config_with<F>(path: Option<&Path>, env: F) -> Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = Config::default();

    if let Some(path) = path {
        let file = read_file(path)?;
        apply_file(&mut config, file)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
    }

    apply_env(&mut config, &env)?;
    config.validate()?;

    Ok(config)
}

fn read_file(path: &Path) -> Result<FileConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    toml::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))
}

fn apply_file(config: &mut Config, file: FileConfig) -> Result<()> {
    if let Some(address) = file.clamd_address {
        config.clamd_address = address.parse::<DaemonAddress>()?;
    }
    if let Some(listen) = file.listen {
        config.listen = listen;
    }
    if let Some(attempts) = file.ready_attempts {
        config.ready_attempts = attempts;
    }
    if let Some(secs) = file.ready_interval_secs {
        config.ready_interval = Duration::from_secs(secs);
    }
    if let Some(secs) = file.connect_timeout_secs {
        config.timeouts.connect = Duration::from_secs(secs);
    }
    if let Some(secs) = file.io_timeout_secs {
        config.timeouts.io = Duration::from_secs(secs);
    }
    if let Some(size) = file.chunk_size {
        config.chunk_size = size;
    }
    if let Some(max) = file.max_upload_bytes {
        config.max_upload_bytes = max;
    }
    Ok(())
}

/// Look up `key`, treating unset and empty the same
fn env_value<F>(env: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    env(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn env_parse<T, F>(env: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    env_value(env, key)
        .map(|v| {
            v.parse::<T>()
                .with_context(|| format!("Invalid value for {}: '{}'", key, v))
        })
        .transpose()
}

fn apply_env<F>(config: &mut Config, env: &F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(address) = env_parse::<DaemonAddress, _>(env, ENV_CLAMD_ADDRESS)? {
        config.clamd_address = address;
    }
    if let Some(listen) = env_parse(env, ENV_LISTEN)? {
        config.listen = listen;
    }
    if let Some(attempts) = env_parse(env, ENV_READY_ATTEMPTS)? {
        config.ready_attempts = attempts;
    }
    if let Some(secs) = env_parse(env, ENV_READY_INTERVAL_SECS)? {
        config.ready_interval = Duration::from_secs(secs);
    }
    if let Some(secs) = env_parse(env, ENV_CONNECT_TIMEOUT_SECS)? {
        config.timeouts.connect = Duration::from_secs(secs);
    }
    if let Some(secs) = env_parse(env, ENV_IO_TIMEOUT_SECS)? {
        config.timeouts.io = Duration::from_secs(secs);
    }
    if let Some(size) = env_parse(env, ENV_CHUNK_SIZE)? {
        config.chunk_size = size;
    }
    if let Some(max) = env_parse(env, ENV_MAX_UPLOAD_BYTES)? {
        config.max_upload_bytes = max;
    }
    Ok(())
}
