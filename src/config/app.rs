//! Main application configuration
//!
//! This module defines the configuration structures for the lobby bot,
//! including file and environment variable loading and validation.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub bot: BotSettings,
    pub scheduler: SchedulerSettings,
    pub service: ServiceSettings,
}

/// Discord-facing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotSettings {
    /// Bot token used for both the gateway and REST calls
    pub token: String,
    /// Channel that receives the "On standby" notice on ready
    pub standby_channel_id: Option<u64>,
    /// Prefix that marks a message as a command
    pub command_prefix: String,
    /// Emotes the bot picks from when seeding a lobby announcement
    pub reaction_emotes: Vec<String>,
}

/// Lobby sweep settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    /// Interval of the activation sweep in seconds
    pub activation_interval_seconds: u64,
    /// Interval of the idle-expiry sweep in seconds
    pub idle_sweep_interval_seconds: u64,
    /// How long a roster may be voice-absent before its lobby is retired
    pub idle_timeout_seconds: u64,
    /// Upper bound on every Discord send/edit call
    pub request_timeout_seconds: u64,
    /// Intermediate frames shown by the pick-game animation
    pub roll_count: usize,
    /// Delay between animation frames in milliseconds
    pub roll_delay_ms: u64,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Port for health check endpoint
    pub health_port: u16,
    /// Whether to serve health and metrics endpoints
    pub enable_health_server: bool,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            token: String::new(),
            standby_channel_id: None,
            command_prefix: "$".to_string(),
            reaction_emotes: ["👍", "🎮", "🔥", "🚀", "✨", "🕹️", "🏆", "🎲"]
                .iter()
                .map(|e| e.to_string())
                .collect(),
        }
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            activation_interval_seconds: 60,
            idle_sweep_interval_seconds: 60,
            idle_timeout_seconds: 300, // 5 minutes
            request_timeout_seconds: 10,
            roll_count: 5,
            roll_delay_ms: 300,
        }
    }
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "lobby-bot".to_string(),
            log_level: "info".to_string(),
            health_port: 8080,
            enable_health_server: true,
            shutdown_timeout_seconds: 30,
        }
    }
}

/// Longest accepted idle timeout (30 days)
pub const MAX_IDLE_TIMEOUT_SECONDS: u64 = 30 * 24 * 60 * 60;

/// Shape of the legacy `config.json` (`{"token": ..., "channel_id": ...}`)
#[derive(Debug, Deserialize)]
struct LegacyJsonConfig {
    token: String,
    #[serde(default)]
    channel_id: Option<u64>,
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML or JSON file, then apply environment overrides
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let mut config = if is_json {
            Self::from_json_str(&raw)?
        } else {
            toml::from_str(&raw)
                .with_context(|| format!("Invalid TOML in {}", path.display()))?
        };

        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Parse JSON in either the full layout or the legacy flat layout
    fn from_json_str(raw: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(raw).context("Invalid JSON config")?;

        if value.get("bot").is_some() {
            return serde_json::from_value(value).context("Invalid JSON config");
        }

        let legacy: LegacyJsonConfig =
            serde_json::from_value(value).context("Invalid legacy JSON config")?;
        let mut config = Self::default();
        config.bot.token = legacy.token;
        config.bot.standby_channel_id = legacy.channel_id;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(token) = env::var("DISCORD_TOKEN") {
            self.bot.token = token;
        }
        if let Ok(channel) = env::var("STANDBY_CHANNEL_ID") {
            self.bot.standby_channel_id = Some(
                channel
                    .parse()
                    .map_err(|_| anyhow!("Invalid STANDBY_CHANNEL_ID value: {}", channel))?,
            );
        }
        if let Ok(prefix) = env::var("COMMAND_PREFIX") {
            self.bot.command_prefix = prefix;
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            self.service.log_level = log_level;
        }
        if let Ok(port) = env::var("HEALTH_PORT") {
            self.service.health_port = port
                .parse()
                .map_err(|_| anyhow!("Invalid HEALTH_PORT value: {}", port))?;
        }
        if let Ok(timeout) = env::var("SHUTDOWN_TIMEOUT_SECONDS") {
            self.service.shutdown_timeout_seconds = timeout
                .parse()
                .map_err(|_| anyhow!("Invalid SHUTDOWN_TIMEOUT_SECONDS value: {}", timeout))?;
        }
        if let Ok(idle) = env::var("IDLE_TIMEOUT_SECONDS") {
            self.scheduler.idle_timeout_seconds = idle
                .parse()
                .map_err(|_| anyhow!("Invalid IDLE_TIMEOUT_SECONDS value: {}", idle))?;
        }
        if let Ok(interval) = env::var("ACTIVATION_INTERVAL_SECONDS") {
            self.scheduler.activation_interval_seconds = interval
                .parse()
                .map_err(|_| anyhow!("Invalid ACTIVATION_INTERVAL_SECONDS value: {}", interval))?;
        }
        if let Ok(interval) = env::var("IDLE_SWEEP_INTERVAL_SECONDS") {
            self.scheduler.idle_sweep_interval_seconds = interval
                .parse()
                .map_err(|_| anyhow!("Invalid IDLE_SWEEP_INTERVAL_SECONDS value: {}", interval))?;
        }
        if let Ok(timeout) = env::var("REQUEST_TIMEOUT_SECONDS") {
            self.scheduler.request_timeout_seconds = timeout
                .parse()
                .map_err(|_| anyhow!("Invalid REQUEST_TIMEOUT_SECONDS value: {}", timeout))?;
        }
        Ok(())
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }

    /// Get activation sweep interval as Duration
    pub fn activation_interval(&self) -> Duration {
        Duration::from_secs(self.scheduler.activation_interval_seconds)
    }

    /// Get idle sweep interval as Duration
    pub fn idle_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.scheduler.idle_sweep_interval_seconds)
    }

    /// Get idle timeout as a chrono Duration (compared against timestamps)
    pub fn idle_timeout(&self) -> chrono::Duration {
        let seconds = self
            .scheduler
            .idle_timeout_seconds
            .min(MAX_IDLE_TIMEOUT_SECONDS);
        chrono::Duration::seconds(i64::try_from(seconds).unwrap_or(i64::MAX / 1000))
    }

    /// Get the bound applied to each Discord call
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.scheduler.request_timeout_seconds)
    }

    /// Get the delay between pick-game animation frames
    pub fn roll_delay(&self) -> Duration {
        Duration::from_millis(self.scheduler.roll_delay_ms)
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    if config.bot.token.trim().is_empty() {
        return Err(anyhow!(
            "Bot token is missing (set bot.token or DISCORD_TOKEN)"
        ));
    }
    if config.bot.command_prefix.is_empty() {
        return Err(anyhow!("Command prefix cannot be empty"));
    }

    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    if config.service.health_port == 0 {
        return Err(anyhow!("Health port cannot be 0"));
    }
    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }

    if config.scheduler.activation_interval_seconds == 0 {
        return Err(anyhow!("Activation interval must be greater than 0"));
    }
    if config.scheduler.idle_sweep_interval_seconds == 0 {
        return Err(anyhow!("Idle sweep interval must be greater than 0"));
    }
    if config.scheduler.idle_timeout_seconds == 0 {
        return Err(anyhow!("Idle timeout must be greater than 0"));
    }
    if config.scheduler.idle_timeout_seconds > MAX_IDLE_TIMEOUT_SECONDS {
        return Err(anyhow!(
            "Idle timeout cannot exceed {} seconds",
            MAX_IDLE_TIMEOUT_SECONDS
        ));
    }
    if config.scheduler.request_timeout_seconds == 0 {
        return Err(anyhow!("Request timeout must be greater than 0"));
    }

    Ok(())
}
