use std::path::PathBuf;
use std::time::Duration;
use serde::{Deserialize, Serialize};
use directories::ProjectDirs;
use clap::Parser;
use std::fs;
use thiserror::Error;
use tracing::{info, warn};

/// Shortest secret accepted for signing cookies and reset tokens
pub const MIN_SECRET_LEN: usize = 32;

/// Configuration for the QuickSwap server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// URL for the database connection
    pub database_url: String,
    /// Address the HTTP server binds to
    pub bind_address: String,
    /// Secret used to sign session cookies and reset tokens
    pub secret_key: Option<String>,
    /// Externally visible base URL, used in emailed links
    pub public_url: String,
    /// Directory served under `/static`, also where uploads are written
    pub static_dir: String,
    /// Lifetime of password-reset tokens in seconds
    pub reset_token_expiry_secs: u64,
    /// Lifetime of a "remember me" session in days
    pub remember_days: u32,
    /// SMTP relay; when unset, mail is only logged
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    /// From address of outgoing mail
    pub mail_sender: String,
    /// Directory for rolling JSON log files
    pub log_dir: Option<String>,
}

/// Update structure for Config with all fields optional
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConfigUpdate {
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default)]
    pub bind_address: Option<String>,
    #[serde(default)]
    pub secret_key: Option<String>,
    #[serde(default)]
    pub public_url: Option<String>,
    #[serde(default)]
    pub static_dir: Option<String>,
    #[serde(default)]
    pub reset_token_expiry_secs: Option<u64>,
    #[serde(default)]
    pub remember_days: Option<u32>,
    #[serde(default)]
    pub smtp_host: Option<String>,
    #[serde(default)]
    pub smtp_port: Option<u16>,
    #[serde(default)]
    pub smtp_username: Option<String>,
    #[serde(default)]
    pub smtp_password: Option<String>,
    #[serde(default)]
    pub mail_sender: Option<String>,
    #[serde(default)]
    pub log_dir: Option<String>,
}

/// Command line arguments for the application
#[derive(Parser, Debug, Default)]
#[clap(name = "quickswap", about = "A small marketplace for swapping and selling things")]
pub struct CliArgs {
    /// Database URL
    #[clap(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Address to listen on, e.g. 127.0.0.1:5000
    #[clap(long, env = "BIND_ADDRESS")]
    pub bind_address: Option<String>,

    /// Secret key for cookies and reset tokens (at least 32 bytes)
    #[clap(long, env = "SECRET_KEY", hide_env_values = true)]
    pub secret_key: Option<String>,

    /// Base URL used in emailed links
    #[clap(long, env = "PUBLIC_URL")]
    pub public_url: Option<String>,

    /// Static files directory
    #[clap(long, env = "STATIC_DIR")]
    pub static_dir: Option<String>,

    /// Reset token lifetime in seconds
    #[clap(long, env = "RESET_TOKEN_EXPIRY_SECS")]
    pub reset_token_expiry_secs: Option<u64>,

    /// "Remember me" session lifetime in days
    #[clap(long, env = "REMEMBER_DAYS")]
    pub remember_days: Option<u32>,

    /// SMTP relay host
    #[clap(long, env = "MAIL_SERVER")]
    pub smtp_host: Option<String>,

    /// SMTP relay port
    #[clap(long, env = "MAIL_PORT")]
    pub smtp_port: Option<u16>,

    /// SMTP username
    #[clap(long, env = "MAIL_USERNAME")]
    pub smtp_username: Option<String>,

    /// SMTP password
    #[clap(long, env = "MAIL_PASSWORD", hide_env_values = true)]
    pub smtp_password: Option<String>,

    /// From address of outgoing mail
    #[clap(long, env = "MAIL_SENDER")]
    pub mail_sender: Option<String>,

    /// Directory for log files
    #[clap(long, env = "LOG_DIR")]
    pub log_dir: Option<String>,

    /// Debug mode
    #[clap(long, env = "QUICKSWAP_DEBUG", default_value_t = false)]
    pub debug: bool,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(String),
    #[error("Failed to parse config file: {0}")]
    Parse(String),
    #[error("secret_key must be at least 32 bytes, got {0}")]
    SecretTooShort(usize),
}

impl Config {
    /// Applies a config update to the current configuration
    pub fn apply_update(self, update: ConfigUpdate) -> Self {
        Self {
            database_url: update.database_url.unwrap_or(self.database_url),
            bind_address: update.bind_address.unwrap_or(self.bind_address),
            secret_key: update.secret_key.or(self.secret_key),
            public_url: update.public_url.unwrap_or(self.public_url),
            static_dir: update.static_dir.unwrap_or(self.static_dir),
            reset_token_expiry_secs: update.reset_token_expiry_secs.unwrap_or(self.reset_token_expiry_secs),
            remember_days: update.remember_days.unwrap_or(self.remember_days),
            smtp_host: update.smtp_host.or(self.smtp_host),
            smtp_port: update.smtp_port.unwrap_or(self.smtp_port),
            smtp_username: update.smtp_username.or(self.smtp_username),
            smtp_password: update.smtp_password.or(self.smtp_password),
            mail_sender: update.mail_sender.unwrap_or(self.mail_sender),
            log_dir: update.log_dir.or(self.log_dir),
        }
    }

    /// Returns the reset token lifetime as a Duration
    pub fn reset_token_expiry(&self) -> Duration {
        Duration::from_secs(self.reset_token_expiry_secs)
    }

    /// Checks values that can't be expressed in the types
    pub fn validate(&self) -> Result<(), ConfigError> {
        match &self.secret_key {
            Some(secret) if secret.len() < MIN_SECRET_LEN => Err(ConfigError::SecretTooShort(secret.len())),
            _ => Ok(()),
        }
    }
}

/// Returns the base (default) configuration
pub fn base_config(config_path: Option<PathBuf>) -> Config {
    let database_url = config_path.map_or("quickswap.db".to_string(), |path| path.join("quickswap.db").to_string_lossy().to_string());

    Config {
        database_url,
        bind_address: "127.0.0.1:5000".to_string(),
        secret_key: None,
        public_url: "http://127.0.0.1:5000".to_string(),
        static_dir: "static".to_string(),
        reset_token_expiry_secs: 1800,
        remember_days: 365,
        smtp_host: None,
        smtp_port: 25,
        smtp_username: None,
        smtp_password: None,
        mail_sender: "noreply@demo.com".to_string(),
        log_dir: None,
    }
}

/// Loads configuration from a TOML file
pub fn config_from_file(config_path: Option<PathBuf>) -> Result<ConfigUpdate, ConfigError> {
    let Some(config_path) = config_path else {
        return Ok(ConfigUpdate::default());
    };

    if !config_path.exists() {
        info!("Config file not found at {:?}, using defaults", config_path);
        return Ok(ConfigUpdate::default());
    }

    let content = fs::read_to_string(&config_path).map_err(|e| {
        warn!("Failed to read config file: {}", e);
        ConfigError::Read(e.to_string())
    })?;

    let config = toml::from_str::<ConfigUpdate>(&content).map_err(|e| {
        warn!("Failed to parse config file: {}", e);
        ConfigError::Parse(e.to_string())
    })?;

    info!("Loaded configuration from {:?}", config_path);
    Ok(config)
}

/// Loads configuration from command line arguments
pub fn config_from_args(args: CliArgs) -> ConfigUpdate {
    ConfigUpdate {
        database_url: args.database_url,
        bind_address: args.bind_address,
        secret_key: args.secret_key,
        public_url: args.public_url,
        static_dir: args.static_dir,
        reset_token_expiry_secs: args.reset_token_expiry_secs,
        remember_days: args.remember_days,
        smtp_host: args.smtp_host,
        smtp_port: args.smtp_port,
        smtp_username: args.smtp_username,
        smtp_password: args.smtp_password,
        mail_sender: args.mail_sender,
        log_dir: args.log_dir,
    }
}

/// Gets the complete configuration by combining defaults with
/// values from config file, environment variables, and command line arguments
/// in order of increasing precedence
pub fn get_config(args: CliArgs) -> Result<Config, ConfigError> {
    let config_dir = match ProjectDirs::from("com", "quickswap", "quickswap") {
        Some(proj_dirs) => Some(PathBuf::from(proj_dirs.config_dir())),
        None => {
            warn!("Could not determine XDG config directory, skipping config file");
            None
        }
    };

    let config_dir = config_dir.and_then(|path| {
        if !path.exists() {
            info!("Config path not found at {:?}, using defaults", path);
            None
        } else {
            Some(path)
        }
    });

    let base = base_config(config_dir.clone());
    let file_update = config_from_file(config_dir.map(|dir| dir.join("config.toml")))?;

    // Apply updates in order of increasing precedence
    let config = base
        .apply_update(file_update)
        .apply_update(config_from_args(args));

    config.validate()?;

    info!(
        "Final configuration: database_url={}, bind_address={}, static_dir={}, smtp_host={:?}",
        config.database_url, config.bind_address, config.static_dir, config.smtp_host
    );

    Ok(config)
}
