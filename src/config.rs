//! Config (C10): layered YAML + environment-variable configuration.
//!
//! A YAML file (optional) is deserialized into [`Config`], which carries
//! [`Default`] for every field (defaults matching spec.md §6 exactly). Every
//! field is then re-checked against an environment variable named by its
//! dotted path, upper-cased, dots replaced with underscores (e.g.
//! `stats.minSamples` -> `STATS_MINSAMPLES`); a present env var always wins
//! over both file and default.
//!
//! No generic layered-config crate is used: the override surface is small
//! and fixed (SPEC_FULL.md §9), so a direct pass over the typed struct is
//! simpler than a config-crate adapter layer.

use crate::core::config::{DedupConfig, FallbackConfig, PollingConfig, StatsConfig};
use crate::core::store::redis_store::RedisConfig;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TempoConfig {
    pub url: String,
    pub auth_token: String,
}

impl Default for TempoConfig {
    fn default() -> Self {
        TempoConfig {
            url: "http://localhost:3200".to_string(),
            auth_token: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HttpConfig {
    pub port: u16,
    #[serde(with = "duration_serde")]
    pub timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        HttpConfig {
            port: 8080,
            timeout: Duration::from_secs(15),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RedisSettings {
    pub host: String,
    pub port: u16,
    pub password: String,
    pub db: i64,
}

impl Default for RedisSettings {
    fn default() -> Self {
        RedisSettings {
            host: "127.0.0.1".to_string(),
            port: 6379,
            password: String::new(),
            db: 0,
        }
    }
}

impl From<&RedisSettings> for RedisConfig {
    fn from(s: &RedisSettings) -> Self {
        RedisConfig {
            host: s.host.clone(),
            port: s.port,
            password: s.password.clone(),
            db: s.db,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    pub timezone: String,
    pub window_size: usize,
    pub redis: RedisSettings,
    pub tempo: TempoConfig,
    pub stats: StatsConfig,
    pub dedup: DedupConfig,
    pub polling: PollingConfig,
    pub fallback: FallbackConfig,
    pub http: HttpConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            timezone: "Asia/Taipei".to_string(),
            window_size: 1000,
            redis: RedisSettings::default(),
            tempo: TempoConfig::default(),
            stats: StatsConfig::default(),
            dedup: DedupConfig::default(),
            polling: PollingConfig::default(),
            fallback: FallbackConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

impl Config {
    /// Loads defaults, optionally overlaid by a YAML file, then overlaid by
    /// environment variables. A supplied path that cannot be read or parsed
    /// is a hard error; no path means defaults-plus-env only.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Config> {
        let mut config = match path {
            Some(path) => {
                let contents = std::fs::read_to_string(path)
                    .map_err(|e| anyhow::anyhow!("reading config file {}: {e}", path.display()))?;
                serde_yaml::from_str(&contents)
                    .map_err(|e| anyhow::anyhow!("parsing config file {}: {e}", path.display()))?
            }
            None => Config::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        env_str("TIMEZONE", &mut self.timezone);
        env_parsed("WINDOWSIZE", &mut self.window_size);

        env_str("REDIS_HOST", &mut self.redis.host);
        env_parsed("REDIS_PORT", &mut self.redis.port);
        env_str("REDIS_PASSWORD", &mut self.redis.password);
        env_parsed("REDIS_DB", &mut self.redis.db);

        env_str("TEMPO_URL", &mut self.tempo.url);
        env_str("TEMPO_AUTHTOKEN", &mut self.tempo.auth_token);

        env_parsed("STATS_FACTOR", &mut self.stats.factor);
        env_parsed("STATS_K", &mut self.stats.k);
        env_parsed("STATS_MINSAMPLES", &mut self.stats.min_samples);

        env_duration("DEDUP_TTL", &mut self.dedup.ttl);

        env_duration("POLLING_TEMPOINTERVAL", &mut self.polling.tempo_interval);
        env_duration("POLLING_TEMPOLOOKBACK", &mut self.polling.tempo_lookback);
        env_duration("POLLING_BASELINEINTERVAL", &mut self.polling.baseline_interval);
        env_parsed("POLLING_BACKFILLENABLED", &mut self.polling.backfill_enabled);
        env_duration("POLLING_BACKFILLDURATION", &mut self.polling.backfill_duration);
        env_duration("POLLING_BACKFILLBATCH", &mut self.polling.backfill_batch);
        env_parsed(
            "POLLING_SPANTRACKINGENABLED",
            &mut self.polling.span_tracking_enabled,
        );

        env_parsed("FALLBACK_NEARBYHOURSENABLED", &mut self.fallback.nearby_hours_enabled);
        env_parsed("FALLBACK_NEARBYHOURSRANGE", &mut self.fallback.nearby_hours_range);
        env_parsed("FALLBACK_NEARBYMINSAMPLES", &mut self.fallback.nearby_min_samples);
        env_parsed(
            "FALLBACK_DAYTYPEGLOBALENABLED",
            &mut self.fallback.day_type_global_enabled,
        );
        env_parsed(
            "FALLBACK_DAYTYPEGLOBALMINSAMPLES",
            &mut self.fallback.day_type_global_min_samples,
        );
        env_parsed("FALLBACK_FULLGLOBALENABLED", &mut self.fallback.full_global_enabled);
        env_parsed(
            "FALLBACK_FULLGLOBALMINSAMPLES",
            &mut self.fallback.full_global_min_samples,
        );

        env_parsed("HTTP_PORT", &mut self.http.port);
        env_duration("HTTP_TIMEOUT", &mut self.http.timeout);
    }
}

fn env_str(key: &str, target: &mut String) {
    if let Ok(val) = env::var(key) {
        *target = val;
    }
}

fn env_parsed<T: std::str::FromStr>(key: &str, target: &mut T) {
    if let Ok(val) = env::var(key) {
        if let Ok(parsed) = val.parse() {
            *target = parsed;
        }
    }
}

fn env_duration(key: &str, target: &mut Duration) {
    if let Ok(val) = env::var(key) {
        if let Ok(parsed) = humantime::parse_duration(&val) {
            *target = parsed;
        }
    }
}

/// Human-readable duration (de)serialization (`"30s"`, `"6h"`) for the YAML
/// layer, in place of the teacher's millis-as-u64 `duration_serde`.
pub mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
