use chrono::Duration;
use serde::Deserialize;
use skyhold_order::{CloseWindowAction, ExpiryRules, ReservationRules};
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    /// Absent: run on the in-memory store.
    pub database: Option<DatabaseConfig>,
    pub redis: Option<RedisConfig>,
    pub kafka: Option<KafkaConfig>,
    pub auth: AuthConfig,
    pub business_rules: BusinessRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    #[serde(default = "default_payment_window_hours")]
    pub payment_window_hours: i64,
    #[serde(default = "default_purge_window_hours")]
    pub purge_window_hours: i64,
    #[serde(default = "default_reminder_band_start_hours")]
    pub reminder_band_start_hours: i64,
    #[serde(default = "default_reminder_band_end_hours")]
    pub reminder_band_end_hours: i64,
    #[serde(default = "default_close_window_action")]
    pub close_window_action: CloseWindowAction,
    #[serde(default = "default_true")]
    pub single_active_per_flight: bool,
    #[serde(default = "default_sweep_interval_seconds")]
    pub sweep_interval_seconds: u64,
    #[serde(default = "default_sweep_batch_limit")]
    pub sweep_batch_limit: usize,
    #[serde(default = "default_min_lookup_len")]
    pub min_lookup_len: usize,
}

fn default_payment_window_hours() -> i64 { 72 }
fn default_purge_window_hours() -> i64 { 24 }
fn default_reminder_band_start_hours() -> i64 { 48 }
fn default_reminder_band_end_hours() -> i64 { 72 }
fn default_close_window_action() -> CloseWindowAction { CloseWindowAction::Delete }
fn default_true() -> bool { true }
fn default_sweep_interval_seconds() -> u64 { 300 }
fn default_sweep_batch_limit() -> usize { 100 }
fn default_min_lookup_len() -> usize { 8 }

impl Default for BusinessRules {
    fn default() -> Self {
        Self {
            payment_window_hours: default_payment_window_hours(),
            purge_window_hours: default_purge_window_hours(),
            reminder_band_start_hours: default_reminder_band_start_hours(),
            reminder_band_end_hours: default_reminder_band_end_hours(),
            close_window_action: default_close_window_action(),
            single_active_per_flight: true,
            sweep_interval_seconds: default_sweep_interval_seconds(),
            sweep_batch_limit: default_sweep_batch_limit(),
            min_lookup_len: default_min_lookup_len(),
        }
    }
}

impl BusinessRules {
    pub fn reservation_rules(&self) -> ReservationRules {
        ReservationRules {
            payment_window: Duration::hours(self.payment_window_hours),
            single_active_per_flight: self.single_active_per_flight,
            min_lookup_len: self.min_lookup_len,
        }
    }

    pub fn expiry_rules(&self) -> ExpiryRules {
        ExpiryRules {
            purge_window: Duration::hours(self.purge_window_hours),
            reminder_band_start: Duration::hours(self.reminder_band_start_hours),
            reminder_band_end: Duration::hours(self.reminder_band_end_hours),
            close_window_action: self.close_window_action,
            default_limit: self.sweep_batch_limit,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiration_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Seed a demo fleet and flights at start-up (in-memory store only).
    #[serde(default)]
    pub seed_demo_data: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 { 5 }

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
    /// Requests per client IP per minute.
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: i64,
}

fn default_rate_limit() -> i64 { 100 }

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Optional per-environment overrides
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Developer overrides, never checked in
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. `SKYHOLD__DATABASE__URL=postgres://...`
            .add_source(config::Environment::with_prefix("SKYHOLD").prefix_separator("__").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_business_rule_defaults() {
        let rules: BusinessRules = serde_json::from_str("{}").unwrap();
        assert_eq!(rules.payment_window_hours, 72);
        assert_eq!(rules.close_window_action, CloseWindowAction::Delete);
        assert!(rules.single_active_per_flight);

        let expiry = rules.expiry_rules();
        assert_eq!(expiry.purge_window, Duration::hours(24));
        assert_eq!(expiry.reminder_band_start, Duration::hours(48));
        assert_eq!(expiry.default_limit, 100);
    }

    #[test]
    fn test_close_window_action_from_config() {
        let rules: BusinessRules =
            serde_json::from_str(r#"{"close_window_action": "EXPIRE", "payment_window_hours": 48}"#).unwrap();
        assert_eq!(rules.expiry_rules().close_window_action, CloseWindowAction::Expire);
        assert_eq!(rules.reservation_rules().payment_window, Duration::hours(48));
    }
}
