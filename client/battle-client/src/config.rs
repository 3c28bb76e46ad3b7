use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use url::Url;
use validator::Validate;

use crate::error::ConfigError;
use crate::models::timer::QUESTION_TIME_LIMIT_SECS;
use crate::models::OpaqueId;
use crate::services::sequencer::{StepTimings, MONSTER_DAMAGE, PLAYER_DAMAGE};

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:5000/";
/// Answer submitted on the player's behalf when a round times out.
pub const FORFEIT_TOKEN: &str = "sai";

#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub auth: AuthConfig,
    pub battle: BattleSettings,
    pub presentation: PresentationSettings,
    pub log: LogConfig,
    pub telemetry: TelemetryConfig,
    pub metrics_dump_on_exit: bool,
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: Url,
    pub request_timeout: Duration,
}

impl ApiConfig {
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            request_timeout: Duration::from_secs(10),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    pub token: Option<String>,
    pub token_file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Validate)]
pub struct BattleSettings {
    #[validate(length(min = 1))]
    pub difficulty: String,
    pub class_id: OpaqueId,
    #[validate(range(min = 1, max = 3600))]
    pub question_time_limit_secs: u32,
    #[validate(range(min = 1))]
    pub tick_interval_ms: u64,
    #[validate(range(min = 1))]
    pub player_damage: u32,
    #[validate(range(min = 1))]
    pub monster_damage: u32,
    #[validate(length(min = 1))]
    pub forfeit_token: String,
}

impl Default for BattleSettings {
    fn default() -> Self {
        Self {
            difficulty: "easy".to_string(),
            class_id: OpaqueId::Number(1),
            question_time_limit_secs: QUESTION_TIME_LIMIT_SECS,
            tick_interval_ms: 1000,
            player_damage: PLAYER_DAMAGE,
            monster_damage: MONSTER_DAMAGE,
            forfeit_token: FORFEIT_TOKEN.to_string(),
        }
    }
}

impl BattleSettings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

/// Settle delays between presentation steps, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresentationSettings {
    pub attack_settle_ms: u64,
    pub cooldown_ms: u64,
    pub game_end_delay_ms: u64,
}

impl Default for PresentationSettings {
    fn default() -> Self {
        Self {
            attack_settle_ms: 300,
            cooldown_ms: 1500,
            game_end_delay_ms: 500,
        }
    }
}

impl PresentationSettings {
    pub fn timings(&self) -> StepTimings {
        StepTimings {
            attack_settle: Duration::from_millis(self.attack_settle_ms),
            cooldown: Duration::from_millis(self.cooldown_ms),
            game_end_delay: Duration::from_millis(self.game_end_delay_ms),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub format: LogFormat,
    pub filter: String,
}

#[derive(Debug, Clone, Default)]
pub struct TelemetryConfig {
    pub otlp_endpoint: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        // Local .env first, then config/{APP_ENV}.toml, then APP_* overrides
        dotenvy::dotenv().ok();

        let env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", env)).required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        Self::from_settings(&settings)
    }

    pub fn from_settings(settings: &config::Config) -> Result<Self, ConfigError> {
        let base_url = lookup(settings, "api.base_url", "GAME_API_URL")
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let request_timeout_secs = lookup_number(
            settings,
            "api.request_timeout_secs",
            "GAME_API_TIMEOUT_SECS",
            10u64,
        )?;

        let defaults = BattleSettings::default();
        let battle = BattleSettings {
            difficulty: lookup(settings, "battle.difficulty", "GAME_DIFFICULTY")
                .unwrap_or(defaults.difficulty),
            class_id: lookup(settings, "battle.class_id", "GAME_CLASS_ID")
                .map(|raw| OpaqueId::parse(&raw))
                .unwrap_or(defaults.class_id),
            question_time_limit_secs: lookup_number(
                settings,
                "battle.question_time_limit_secs",
                "GAME_QUESTION_TIME_LIMIT",
                defaults.question_time_limit_secs,
            )?,
            tick_interval_ms: lookup_number(
                settings,
                "battle.tick_interval_ms",
                "GAME_TICK_INTERVAL_MS",
                defaults.tick_interval_ms,
            )?,
            player_damage: lookup_number(
                settings,
                "battle.player_damage",
                "GAME_PLAYER_DAMAGE",
                defaults.player_damage,
            )?,
            monster_damage: lookup_number(
                settings,
                "battle.monster_damage",
                "GAME_MONSTER_DAMAGE",
                defaults.monster_damage,
            )?,
            forfeit_token: lookup(settings, "battle.forfeit_token", "GAME_FORFEIT_TOKEN")
                .unwrap_or(defaults.forfeit_token),
        };
        battle.validate()?;

        let presentation_defaults = PresentationSettings::default();
        let presentation = PresentationSettings {
            attack_settle_ms: lookup_number(
                settings,
                "presentation.attack_settle_ms",
                "GAME_ATTACK_SETTLE_MS",
                presentation_defaults.attack_settle_ms,
            )?,
            cooldown_ms: lookup_number(
                settings,
                "presentation.cooldown_ms",
                "GAME_COOLDOWN_MS",
                presentation_defaults.cooldown_ms,
            )?,
            game_end_delay_ms: lookup_number(
                settings,
                "presentation.game_end_delay_ms",
                "GAME_END_DELAY_MS",
                presentation_defaults.game_end_delay_ms,
            )?,
        };

        let format = match lookup(settings, "log.format", "LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Plain,
        };

        Ok(Config {
            api: ApiConfig {
                base_url: parse_base_url(&base_url)?,
                request_timeout: Duration::from_secs(request_timeout_secs),
            },
            auth: AuthConfig {
                token: lookup(settings, "auth.token", "GAME_API_TOKEN"),
                token_file: lookup(settings, "auth.token_file", "GAME_TOKEN_FILE")
                    .map(PathBuf::from),
            },
            battle,
            presentation,
            log: LogConfig {
                format,
                filter: lookup(settings, "log.filter", "RUST_LOG_DEFAULT")
                    .unwrap_or_else(|| "battle_client=info".to_string()),
            },
            telemetry: TelemetryConfig {
                otlp_endpoint: lookup(
                    settings,
                    "telemetry.otlp_endpoint",
                    "OTEL_EXPORTER_OTLP_ENDPOINT",
                ),
            },
            metrics_dump_on_exit: lookup(settings, "metrics.dump_on_exit", "METRICS_DUMP")
                .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
                .unwrap_or(false),
        })
    }
}

/// Config value first, then the plain environment variable. Blank values count as unset.
fn lookup(settings: &config::Config, key: &str, env_var: &str) -> Option<String> {
    settings
        .get_string(key)
        .ok()
        .or_else(|| env::var(env_var).ok())
        .filter(|value| !value.trim().is_empty())
}

fn lookup_number<T: FromStr>(
    settings: &config::Config,
    key: &'static str,
    env_var: &str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(settings, key, env_var) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::NotANumber { key, value: raw }),
    }
}

/// `Url::join` drops the last path segment unless the base ends with a slash.
fn parse_base_url(raw: &str) -> Result<Url, url::ParseError> {
    let mut base = raw.trim().to_string();
    if !base.ends_with('/') {
        base.push('/');
    }
    Url::parse(&base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn settings(overrides: &[(&str, &str)]) -> config::Config {
        let mut builder = config::Config::builder();
        for (key, value) in overrides {
            builder = builder.set_override(*key, *value).unwrap();
        }
        builder.build().unwrap()
    }

    #[test]
    #[serial]
    fn defaults_match_game_constants() {
        let config = Config::from_settings(&settings(&[])).unwrap();
        assert_eq!(config.battle.question_time_limit_secs, 30);
        assert_eq!(config.battle.player_damage, 10);
        assert_eq!(config.battle.monster_damage, 5);
        assert_eq!(config.battle.forfeit_token, "sai");
        assert_eq!(config.presentation, PresentationSettings::default());
    }

    #[test]
    #[serial]
    fn base_url_gets_trailing_slash() {
        let config =
            Config::from_settings(&settings(&[("api.base_url", "http://game.local/api")]))
                .unwrap();
        assert_eq!(config.api.base_url.as_str(), "http://game.local/api/");
        assert_eq!(
            config.api.base_url.join("game/newroom").unwrap().as_str(),
            "http://game.local/api/game/newroom"
        );
    }

    #[test]
    #[serial]
    fn class_id_keeps_its_shape() {
        let config = Config::from_settings(&settings(&[("battle.class_id", "class1")])).unwrap();
        assert_eq!(config.battle.class_id, OpaqueId::Text("class1".to_string()));
    }

    #[test]
    #[serial]
    fn zero_time_limit_is_rejected() {
        let result = Config::from_settings(&settings(&[(
            "battle.question_time_limit_secs",
            "0",
        )]));
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    #[serial]
    fn non_numeric_damage_is_rejected() {
        let result = Config::from_settings(&settings(&[("battle.player_damage", "lots")]));
        assert!(matches!(
            result,
            Err(ConfigError::NotANumber {
                key: "battle.player_damage",
                ..
            })
        ));
    }

    #[test]
    #[serial]
    fn env_fallback_is_used_when_config_is_silent() {
        std::env::set_var("GAME_DIFFICULTY", "hard");
        let config = Config::from_settings(&settings(&[])).unwrap();
        std::env::remove_var("GAME_DIFFICULTY");
        assert_eq!(config.battle.difficulty, "hard");
    }
}
