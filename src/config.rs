//! Application-level configuration loading: game tuning, Telegram credentials and storage.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use serde_with::{DurationMilliSeconds, DurationSeconds, serde_as};
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "MINIAPP_BACK_CONFIG_PATH";

const EIGHT_HOURS: Duration = Duration::from_secs(8 * 60 * 60);

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Harvest minigame tuning.
    pub farm: FarmConfig,
    /// Ball-tap arcade tuning.
    pub arcade: ArcadeConfig,
    /// Point ledger behaviour.
    pub ledger: LedgerConfig,
    /// Telegram init-data verification and admin access.
    pub auth: AuthConfig,
    /// Telegram Stars invoices.
    pub payments: PaymentsConfig,
    /// Storage backend selection.
    pub storage: StorageConfig,
    /// HTTP listener.
    pub server: ServerConfig,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
/// Harvest cycle parameters.
pub struct FarmConfig {
    /// Time a harvest cycle takes before its reward can be claimed.
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(rename = "cooldown_secs")]
    pub cooldown: Duration,
    /// Points granted for each claimed cycle.
    pub point_reward: i64,
}

impl Default for FarmConfig {
    fn default() -> Self {
        Self {
            cooldown: EIGHT_HOURS,
            point_reward: 800,
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
/// Arcade rally and energy parameters.
pub struct ArcadeConfig {
    /// Points for a hit before the per-rally bonus is added.
    pub base_hit_reward: i64,
    /// Energy units granted to a newly provisioned player.
    pub default_total_energy: u32,
    /// Time after which a consumed energy unit replenishes.
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(rename = "energy_cooldown_secs")]
    pub energy_cooldown: Duration,
}

impl Default for ArcadeConfig {
    fn default() -> Self {
        Self {
            base_hit_reward: 10,
            default_total_energy: 3,
            energy_cooldown: EIGHT_HOURS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
/// Point ledger parameters.
pub struct LedgerConfig {
    /// Share of every credit forwarded to the user's referrer, in percent (rounded up).
    pub referral_bonus_percent: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            referral_bonus_percent: 10,
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
/// Telegram authentication parameters.
pub struct AuthConfig {
    /// Bot token used both to sign init data and to call the Bot API.
    pub bot_token: String,
    /// Maximum accepted age of `auth_date`.
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(rename = "init_data_ttl_secs")]
    pub init_data_ttl: Duration,
    /// Skip signature checks (local development only).
    pub debug_mode: bool,
    /// Token expected in the `X-Admin-Token` header; admin routes are closed when unset.
    pub admin_token: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            init_data_ttl: Duration::from_secs(24 * 60 * 60),
            debug_mode: false,
            admin_token: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
/// Prices (Telegram Stars) and Bot API location for store items.
pub struct PaymentsConfig {
    /// Base URL of the Telegram Bot API.
    pub api_base_url: String,
    /// Price of an energy recharge.
    pub energy_recharge_price: u32,
    /// Price of a custom ball skin.
    pub ball_skin_price: u32,
    /// Price of a custom hit reward.
    pub ball_hit_reward_price: u32,
    /// Expected `X-Telegram-Bot-Api-Secret-Token` on webhook calls; unchecked when unset.
    pub webhook_secret: Option<String>,
}

impl Default for PaymentsConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.telegram.org".into(),
            energy_recharge_price: 1,
            ball_skin_price: 1,
            ball_hit_reward_price: 1,
            webhook_secret: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
/// Storage backend selection.
pub struct StorageConfig {
    /// `mongodb` or `memory`.
    pub backend: StorageBackend,
    /// MongoDB connection string.
    pub mongo_uri: String,
    /// MongoDB database name; the connection string's database is used when unset.
    pub mongo_db: Option<String>,
    /// Backoff used by the initial connection and by every reconnect.
    pub connect: ConnectRetryConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            mongo_uri: "mongodb://localhost:27017".into(),
            mongo_db: None,
            connect: ConnectRetryConfig::default(),
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
/// Ping schedule while waiting for the storage server to answer.
pub struct ConnectRetryConfig {
    /// Pings attempted before a connection attempt is abandoned.
    pub max_attempts: u32,
    /// Pause after the first failed ping, doubled after each further failure.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "initial_delay_ms")]
    pub initial_delay: Duration,
    /// Upper bound on the pause between pings.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "max_delay_ms")]
    pub max_delay: Duration,
}

impl Default for ConnectRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl ConnectRetryConfig {
    /// Pauses to take between consecutive pings; one fewer than the attempt budget.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + use<> {
        let max = self.max_delay;
        std::iter::successors(Some(self.initial_delay.min(max)), move |delay| {
            Some(delay.saturating_mul(2).min(max))
        })
        .take(self.max_attempts.saturating_sub(1) as usize)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
/// Available storage backends.
pub enum StorageBackend {
    /// Durable MongoDB backend.
    Mongodb,
    /// Process-local backend; state is lost on restart.
    Memory,
}

impl Default for StorageBackend {
    fn default() -> Self {
        if cfg!(feature = "mongo-store") {
            StorageBackend::Mongodb
        } else {
            StorageBackend::Memory
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
/// HTTP listener parameters.
pub struct ServerConfig {
    /// TCP port to bind on all interfaces.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 8080 }
    }
}

impl AppConfig {
    /// Load the configuration from disk, then apply environment overrides.
    ///
    /// A missing or malformed file never aborts startup; built-in defaults are used instead.
    pub fn load() -> Self {
        let path = resolve_config_path();
        let mut config = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<AppConfig>(&contents) {
                Ok(config) => {
                    info!(path = %path.display(), "loaded configuration file");
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        };
        config.apply_env(|key| env::var(key).ok());
        config
    }

    /// Override file values with environment variables resolved through `lookup`.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(port) = lookup("PORT")
            .or_else(|| lookup("SERVER_PORT"))
            .and_then(|value| value.parse::<u16>().ok())
        {
            self.server.port = port;
        }
        if let Some(uri) = lookup("MONGO_URI") {
            self.storage.mongo_uri = uri;
        }
        if let Some(db) = lookup("MONGO_DB") {
            self.storage.mongo_db = Some(db);
        }
        if let Some(attempts) =
            lookup("MONGO_CONNECT_ATTEMPTS").and_then(|value| value.parse::<u32>().ok())
        {
            self.storage.connect.max_attempts = attempts;
        }
        match lookup("STORE").as_deref() {
            Some("memory") => self.storage.backend = StorageBackend::Memory,
            Some("mongodb") => self.storage.backend = StorageBackend::Mongodb,
            Some(other) => warn!(value = other, "ignoring unknown STORE value"),
            None => {}
        }
        if let Some(token) = lookup("TELEGRAM_BOT_TOKEN") {
            self.auth.bot_token = token;
        }
        if let Some(token) = lookup("ADMIN_TOKEN").filter(|token| !token.is_empty()) {
            self.auth.admin_token = Some(token);
        }
        if let Some(secret) = lookup("TELEGRAM_WEBHOOK_SECRET").filter(|secret| !secret.is_empty()) {
            self.payments.webhook_secret = Some(secret);
        }
        if let Some(flag) = lookup("AUTH_DEBUG_MODE") {
            self.auth.debug_mode = matches!(flag.as_str(), "1" | "true" | "yes");
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn defaults_match_game_rules() {
        let config = AppConfig::default();
        assert_eq!(config.farm.cooldown, Duration::from_secs(28_800));
        assert_eq!(config.farm.point_reward, 800);
        assert_eq!(config.arcade.base_hit_reward, 10);
        assert_eq!(config.arcade.default_total_energy, 3);
        assert_eq!(config.ledger.referral_bonus_percent, 10);
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_fields() {
        let raw = r#"{ "farm": { "cooldown_secs": 60 }, "arcade": { "base_hit_reward": 5 } }"#;
        let config: AppConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(config.farm.cooldown, Duration::from_secs(60));
        assert_eq!(config.farm.point_reward, 800);
        assert_eq!(config.arcade.base_hit_reward, 5);
        assert_eq!(config.arcade.energy_cooldown, Duration::from_secs(28_800));
    }

    #[test]
    fn environment_overrides_file_values() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("SERVER_PORT", "9000"),
            ("STORE", "memory"),
            ("TELEGRAM_BOT_TOKEN", "123:abc"),
            ("ADMIN_TOKEN", "s3cret"),
            ("AUTH_DEBUG_MODE", "true"),
        ]);
        let mut config = AppConfig::default();
        config.apply_env(|key| vars.get(key).map(|value| value.to_string()));

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.auth.bot_token, "123:abc");
        assert_eq!(config.auth.admin_token.as_deref(), Some("s3cret"));
        assert!(config.auth.debug_mode);
    }

    #[test]
    fn connect_backoff_doubles_up_to_the_cap() {
        let raw = r#"{ "storage": { "connect": { "max_attempts": 6, "initial_delay_ms": 400, "max_delay_ms": 2000 } } }"#;
        let config: AppConfig = serde_json::from_str(raw).unwrap();
        let delays: Vec<u64> = config
            .storage
            .connect
            .delays()
            .map(|delay| delay.as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![400, 800, 1600, 2000, 2000]);
    }

    #[test]
    fn single_connect_attempt_never_sleeps() {
        let vars: HashMap<&str, &str> = HashMap::from([("MONGO_CONNECT_ATTEMPTS", "1")]);
        let mut config = AppConfig::default();
        assert_eq!(config.storage.connect.delays().count(), 9);

        config.apply_env(|key| vars.get(key).map(|value| value.to_string()));
        assert_eq!(config.storage.connect.max_attempts, 1);
        assert_eq!(config.storage.connect.delays().count(), 0);
    }
}
