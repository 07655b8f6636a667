use std::collections::HashSet;
use std::env;
use std::path::PathBuf;
use anyhow::{Result, Context};
use once_cell::sync::Lazy;
use tracing::{info, warn};

use crate::encoding::{EncodingOptions, NarrowingPolicy, DEFAULT_IMAGE_SIZE, DEFAULT_TEXT_LENGTH};

#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub max_file_size_mb: usize,
    pub max_concurrent_requests: usize,
    pub request_timeout_seconds: u64,
    pub worker_threads: usize,
    pub output_dir: PathBuf,
    pub image_size: u32,
    pub text_length: usize,
    pub code_point_policy: NarrowingPolicy,
}

// API keys loaded from environment; an empty set turns authentication off
pub static VALID_API_KEYS: Lazy<HashSet<String>> = Lazy::new(|| {
    env::var("VALID_API_KEYS")
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
});

impl Default for Config {
    fn default() -> Self {
        Self {
            server_host: "0.0.0.0".to_string(),
            server_port: 8080,
            max_file_size_mb: 10,
            max_concurrent_requests: 100,
            request_timeout_seconds: 30,
            worker_threads: 4,
            output_dir: PathBuf::from("output"),
            image_size: DEFAULT_IMAGE_SIZE,
            text_length: DEFAULT_TEXT_LENGTH,
            code_point_policy: NarrowingPolicy::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        info!("Loading configuration from environment variables");
        let defaults = Config::default();

        let config = Config {
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| {
                info!("SERVER_HOST not set, using default: {}", defaults.server_host);
                defaults.server_host.clone()
            }),
            server_port: Self::parse_env_var("SERVER_PORT", defaults.server_port)
                .context("Failed to parse SERVER_PORT")?,
            max_file_size_mb: Self::parse_env_var("MAX_FILE_SIZE_MB", defaults.max_file_size_mb)
                .context("Failed to parse MAX_FILE_SIZE_MB")?,
            max_concurrent_requests: Self::parse_env_var(
                "MAX_CONCURRENT_REQUESTS",
                defaults.max_concurrent_requests,
            )
            .context("Failed to parse MAX_CONCURRENT_REQUESTS")?,
            request_timeout_seconds: Self::parse_env_var(
                "REQUEST_TIMEOUT_SECONDS",
                defaults.request_timeout_seconds,
            )
            .context("Failed to parse REQUEST_TIMEOUT_SECONDS")?,
            worker_threads: Self::parse_env_var("WORKER_THREADS", defaults.worker_threads)
                .context("Failed to parse WORKER_THREADS")?,
            output_dir: env::var("OUTPUT_DIR").map(PathBuf::from).unwrap_or_else(|_| {
                info!("OUTPUT_DIR not set, using default: {}", defaults.output_dir.display());
                defaults.output_dir.clone()
            }),
            image_size: Self::parse_env_var("IMAGE_SIZE", defaults.image_size)
                .context("Failed to parse IMAGE_SIZE")?,
            text_length: Self::parse_env_var("TEXT_LENGTH", defaults.text_length)
                .context("Failed to parse TEXT_LENGTH")?,
            code_point_policy: Self::parse_required_env_var("CODE_POINT_POLICY", defaults.code_point_policy)?,
        };

        config.validate()?;

        if VALID_API_KEYS.is_empty() {
            warn!("No API keys configured, /api routes are unauthenticated. Set VALID_API_KEYS to enable auth.");
        } else {
            info!("Loaded {} valid API keys", VALID_API_KEYS.len());
        }

        info!("Configuration loaded successfully: {:?}", config);
        Ok(config)
    }

    fn parse_env_var<T>(var_name: &str, default: T) -> Result<T>
    where
        T: std::str::FromStr + Copy + std::fmt::Debug,
        T::Err: std::fmt::Display,
    {
        match env::var(var_name) {
            Ok(val) => match val.parse() {
                Ok(parsed) => Ok(parsed),
                Err(e) => {
                    warn!("Failed to parse {}: {} (using default: {:?})", var_name, e, default);
                    Ok(default)
                }
            },
            Err(_) => {
                info!("{} not set, using default: {:?}", var_name, default);
                Ok(default)
            }
        }
    }

    /// Like `parse_env_var`, but a value that is set and does not parse is an error.
    fn parse_required_env_var<T>(var_name: &str, default: T) -> Result<T>
    where
        T: std::str::FromStr + std::fmt::Debug,
        T::Err: std::fmt::Display,
    {
        match env::var(var_name) {
            Ok(val) => val
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid {} '{}': {}", var_name, val, e)),
            Err(_) => {
                info!("{} not set, using default: {:?}", var_name, default);
                Ok(default)
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.server_port == 0 {
            return Err(anyhow::anyhow!("SERVER_PORT must be greater than 0"));
        }
        if self.max_file_size_mb == 0 {
            return Err(anyhow::anyhow!("MAX_FILE_SIZE_MB must be greater than 0"));
        }
        if self.max_concurrent_requests == 0 {
            return Err(anyhow::anyhow!("MAX_CONCURRENT_REQUESTS must be greater than 0"));
        }
        if self.request_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("REQUEST_TIMEOUT_SECONDS must be greater than 0"));
        }
        if self.worker_threads == 0 {
            return Err(anyhow::anyhow!("WORKER_THREADS must be greater than 0"));
        }
        if self.image_size == 0 {
            return Err(anyhow::anyhow!("IMAGE_SIZE must be greater than 0"));
        }
        if self.text_length == 0 {
            return Err(anyhow::anyhow!("TEXT_LENGTH must be greater than 0"));
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(anyhow::anyhow!("OUTPUT_DIR must not be empty"));
        }
        Ok(())
    }

    pub fn max_file_size_bytes(&self) -> usize {
        self.max_file_size_mb * 1024 * 1024
    }

    pub fn encoding_options(&self) -> EncodingOptions {
        EncodingOptions {
            image_size: (self.image_size, self.image_size),
            text_length: self.text_length,
            policy: self.code_point_policy,
        }
    }

    pub fn auth_enabled() -> bool {
        !VALID_API_KEYS.is_empty()
    }

    pub fn validate_api_key(key: &str) -> bool {
        VALID_API_KEYS.contains(key)
    }
}
