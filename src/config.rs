use serde::{Deserialize, Serialize};
use std::env;

use crate::error::{AppError, AppResult};

pub const DEFAULT_COOLDOWN_SECS: u64 = 30;
pub const DEFAULT_STORE_TIMEOUT_MS: u64 = 3000;
pub const MAX_COOLDOWN_SECS: u64 = 365 * 24 * 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub gacha: GachaSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

/// 聊天网关配置，`token` 为空时不启动机器人
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DiscordConfig {
    #[serde(default)]
    pub token: String,
    /// 仅在该服务器注册斜杠命令（比全局注册生效快）
    #[serde(default)]
    pub guild_id: Option<u64>,
    #[serde(default)]
    pub dashboard_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GachaSettings {
    /// 同一扭蛋两次成功抽取的最小间隔
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    /// 处理事件时每次 Trigger Store 调用的超时上限
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,
}

impl Default for GachaSettings {
    fn default() -> Self {
        Self {
            cooldown_secs: DEFAULT_COOLDOWN_SECS,
            store_timeout_ms: DEFAULT_STORE_TIMEOUT_MS,
        }
    }
}

fn default_connect_timeout_secs() -> u64 {
    8
}

fn default_cooldown_secs() -> u64 {
    DEFAULT_COOLDOWN_SECS
}

fn default_store_timeout_ms() -> u64 {
    DEFAULT_STORE_TIMEOUT_MS
}

fn get_env(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

fn parse_env<T: std::str::FromStr>(name: &str) -> AppResult<Option<T>> {
    match get_env(name) {
        None => Ok(None),
        Some(v) => v
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| AppError::ConfigError(format!("Invalid value for {name}: '{v}'"))),
    }
}

impl Config {
    /// 加载 `CONFIG_PATH`（默认 `config.toml`），文件不存在时退回环境变量
    /// 无论哪种情况，环境变量都会覆盖文件中的值
    pub fn from_toml() -> AppResult<Self> {
        let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        use std::io::ErrorKind;

        let mut config: Config = match std::fs::read_to_string(&config_path) {
            Ok(config_str) => Self::parse(&config_str)?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let database_url = get_env("DATABASE_URL").ok_or_else(|| {
                    AppError::ConfigError(
                        "DATABASE_URL is not set and config.toml was not found".into(),
                    )
                })?;

                Config {
                    server: ServerConfig {
                        host: "0.0.0.0".to_string(),
                        port: 3000,
                    },
                    database: DatabaseConfig {
                        url: database_url,
                        max_connections: 10,
                        connect_timeout_secs: default_connect_timeout_secs(),
                    },
                    discord: DiscordConfig::default(),
                    gacha: GachaSettings::default(),
                }
            }
            Err(e) => {
                return Err(AppError::ConfigError(format!(
                    "Cannot read config file {config_path}: {e}"
                )));
            }
        };

        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn parse(config_str: &str) -> AppResult<Self> {
        toml::from_str(config_str)
            .map_err(|e| AppError::ConfigError(format!("Failed to parse config file: {e}")))
    }

    fn apply_env(&mut self) -> AppResult<()> {
        if let Some(v) = get_env("SERVER_HOST") {
            self.server.host = v;
        }
        // 多数托管平台注入的是 PORT
        if let Some(p) = parse_env("PORT")? {
            self.server.port = p;
        }
        if let Some(p) = parse_env("SERVER_PORT")? {
            self.server.port = p;
        }
        if let Some(v) = get_env("DATABASE_URL") {
            self.database.url = v;
        }
        if let Some(n) = parse_env("DB_MAX_CONNECTIONS")? {
            self.database.max_connections = n;
        }
        if let Some(n) = parse_env("DB_CONNECT_TIMEOUT_SECS")? {
            self.database.connect_timeout_secs = n;
        }
        if let Some(v) = get_env("DISCORD_TOKEN") {
            self.discord.token = v;
        }
        if let Some(id) = parse_env("GUILD_ID")? {
            self.discord.guild_id = Some(id);
        }
        if let Some(v) = get_env("DASHBOARD_URL") {
            self.discord.dashboard_url = v;
        }
        if let Some(n) = parse_env("GACHA_COOLDOWN_SECS")? {
            self.gacha.cooldown_secs = n;
        }
        if let Some(n) = parse_env("GACHA_STORE_TIMEOUT_MS")? {
            self.gacha.store_timeout_ms = n;
        }
        Ok(())
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.database.url.trim().is_empty() {
            return Err(AppError::ConfigError("database.url must not be empty".into()));
        }
        if self.database.max_connections == 0 {
            return Err(AppError::ConfigError(
                "database.max_connections must be at least 1".into(),
            ));
        }
        if self.gacha.cooldown_secs == 0 {
            return Err(AppError::ConfigError(
                "gacha.cooldown_secs must be greater than 0".into(),
            ));
        }
        if self.gacha.cooldown_secs > MAX_COOLDOWN_SECS {
            return Err(AppError::ConfigError(format!(
                "gacha.cooldown_secs must be at most {MAX_COOLDOWN_SECS}"
            )));
        }
        if self.gacha.store_timeout_ms == 0 {
            return Err(AppError::ConfigError(
                "gacha.store_timeout_ms must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    pub fn bot_enabled(&self) -> bool {
        !self.discord.token.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [server]
        host = "127.0.0.1"
        port = 8080

        [database]
        url = "postgres://localhost/gacha"
        max_connections = 5
    "#;

    #[test]
    fn test_parse_applies_defaults() {
        let config = Config::parse(SAMPLE).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.connect_timeout_secs, 8);
        assert_eq!(config.gacha.cooldown_secs, DEFAULT_COOLDOWN_SECS);
        assert_eq!(config.gacha.store_timeout_ms, DEFAULT_STORE_TIMEOUT_MS);
        assert!(!config.bot_enabled());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_gacha_section() {
        let text = format!(
            "{SAMPLE}\n[gacha]\ncooldown_secs = 5\n\n[discord]\ntoken = \"abc\"\nguild_id = 42\n"
        );
        let config = Config::parse(&text).unwrap();
        assert_eq!(config.gacha.cooldown_secs, 5);
        assert_eq!(config.gacha.store_timeout_ms, DEFAULT_STORE_TIMEOUT_MS);
        assert_eq!(config.discord.guild_id, Some(42));
        assert!(config.bot_enabled());
    }

    #[test]
    fn test_zero_cooldown_is_rejected() {
        let mut config = Config::parse(SAMPLE).unwrap();
        config.gacha.cooldown_secs = 0;
        assert!(matches!(config.validate(), Err(AppError::ConfigError(_))));
    }

    #[test]
    fn test_huge_cooldown_is_rejected() {
        let mut config = Config::parse(SAMPLE).unwrap();
        config.gacha.cooldown_secs = 10_000_000_000_000_000;
        assert!(matches!(config.validate(), Err(AppError::ConfigError(_))));

        config.gacha.cooldown_secs = MAX_COOLDOWN_SECS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        assert!(matches!(
            Config::parse("[server"),
            Err(AppError::ConfigError(_))
        ));
    }
}
