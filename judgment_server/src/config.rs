use ::config::{Config, ConfigError, Environment, File, FileFormat};
use judgment_core::Timings;
use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;

/// 服务器配置
///
/// 加载顺序：内置默认值 -> `config/judgment.toml`（可选）-> `JUDGMENT__*` 环境变量，
/// 后加载的覆盖先加载的，例如 `JUDGMENT__SERVER__PORT=9000`。
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub game: GameSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub bind_address: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GameSettings {
    pub card_throw_cooldown_ms: u64,
    pub trick_resolution_delay_ms: u64,
    pub next_round_delay_ms: u64,
    pub grace_period_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSettings {
    /// tracing 的 EnvFilter 语法；设置了 RUST_LOG 时以 RUST_LOG 为准
    pub filter: String,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::load(Some("config/judgment"))
    }

    /// `file` 为 None 时只用默认值和环境变量
    pub fn load(file: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("server.bind_address", "0.0.0.0")?
            .set_default("server.port", 25917)?
            .set_default("game.card_throw_cooldown_ms", 2000)?
            .set_default("game.trick_resolution_delay_ms", 2000)?
            .set_default("game.next_round_delay_ms", 4000)?
            .set_default("game.grace_period_secs", 20 * 60)?
            .set_default("logging.filter", "info,judgment_server=debug")?;

        if let Some(name) = file {
            builder = builder.add_source(File::with_name(name).format(FileFormat::Toml).required(false));
        }

        builder
            .add_source(Environment::with_prefix("JUDGMENT").prefix_separator("__").separator("__"))
            .build()?
            .try_deserialize()
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.server.bind_address, self.server.port).parse()
    }

    pub fn timings(&self) -> Timings {
        Timings {
            card_throw_cooldown: Duration::from_millis(self.game.card_throw_cooldown_ms),
            trick_resolution_delay: Duration::from_millis(self.game.trick_resolution_delay_ms),
            next_round_delay: Duration::from_millis(self.game.next_round_delay_ms),
            grace_period: Duration::from_secs(self.game.grace_period_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_game_timings() {
        let settings = Settings::load(None).unwrap();
        assert_eq!(settings.server.port, 25917);
        assert_eq!(settings.timings(), Timings::default());
        assert_eq!(settings.listen_addr().unwrap().port(), 25917);
    }
}
