// Configuration module
// Public interface for configuration loading

mod loader;
mod settings;

pub use loader::{
    default_config_path, load_config, load_config_with, ENV_CHUNK_SIZE, ENV_CLAMD_ADDRESS,
    ENV_CONNECT_TIMEOUT_SECS, ENV_IO_TIMEOUT_SECS, ENV_LISTEN, ENV_MAX_UPLOAD_BYTES,
    ENV_READY_ATTEMPTS, ENV_READY_INTERVAL_SECS,
};
pub use settings::{Config, DEFAULT_MAX_UPLOAD_BYTES};
