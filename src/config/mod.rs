// Configuration module entry point
// Loads, validates and shares the process-wide configuration

mod state;
mod types;

use std::net::SocketAddr;

// Re-export public types
pub use state::AppState;
pub use types::{
    Config, DataSourceKind, HttpConfig, LimitsConfig, LoggingConfig, PerformanceConfig,
    ServerConfig, StorageConfig,
};

/// Default config file name, resolved without extension
pub const DEFAULT_CONFIG_PATH: &str = "config";

/// Environment variable prefix; nested keys use `__`, e.g. `FGB_STORAGE__BUCKET_NAME`
pub const ENV_PREFIX: &str = "FGB";

impl Config {
    /// Load configuration from the default `config.toml` (optional) and the environment
    pub fn load() -> Result<Self, ::config::ConfigError> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from specified file path (extension optional)
    pub fn load_from(config_path: &str) -> Result<Self, ::config::ConfigError> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::with_name(config_path).required(false))
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8000)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("logging.access_log_format", "combined")?
            .set_default("performance.keep_alive_timeout", 75)?
            .set_default("performance.read_timeout", 30)?
            .set_default("performance.write_timeout", 30)?
            .set_default("http.server_name", "fgbserve")?
            .set_default("http.enable_cors", true)?
            .set_default("storage.data_source", "local")?
            .set_default("storage.root_path", "data")?
            .set_default("storage.region", "eu-west-1")?
            .set_default("storage.force_path_style", false)?
            .set_default("storage.timeout_secs", 30)?
            .set_default("limits.max_range_bytes", 2_097_152)? // 2 MiB
            .set_default("limits.chunk_size", 65_536)? // 64 KiB
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject combinations that would only fail later, per request
    pub fn validate(&self) -> Result<(), ::config::ConfigError> {
        let fail = |msg: &str| Err(::config::ConfigError::Message(msg.to_string()));

        if self.limits.chunk_size == 0 {
            return fail("limits.chunk_size must be greater than 0");
        }
        if self.limits.max_range_bytes == 0 {
            return fail("limits.max_range_bytes must be greater than 0");
        }
        if self.storage.timeout_secs == 0 {
            return fail("storage.timeout_secs must be greater than 0");
        }
        if self.storage.data_source == DataSourceKind::Remote
            && self.storage.bucket_name.as_deref().map_or(true, str::is_empty)
        {
            return fail("storage.bucket_name is required when storage.data_source = \"remote\"");
        }
        if self.storage.access_key_id.is_some() != self.storage.secret_access_key.is_some() {
            return fail("storage.access_key_id and storage.secret_access_key must be set together");
        }
        Ok(())
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }
}
