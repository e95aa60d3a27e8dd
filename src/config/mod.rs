use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub ui: UiSettings,
    pub form: FormSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            ui: UiSettings::default(),
            form: FormSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file; a missing file means defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let settings: Settings =
            toml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.server.url.is_empty() {
            errors.push("server.url must not be empty".to_string());
        }
        if self.server.reconnect_secs == 0 {
            errors.push("server.reconnect_secs must be > 0".to_string());
        }
        if self.ui.tick_ms == 0 {
            errors.push("ui.tick_ms must be > 0".to_string());
        }
        if self.ui.lockout_secs == 0 {
            errors.push("ui.lockout_secs must be > 0".to_string());
        }
        if self.ui.max_log_lines == 0 {
            errors.push("ui.max_log_lines must be > 0".to_string());
        }
        if self.form.strategies.is_empty() {
            errors.push("form.strategies must not be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub url: String,
    pub reconnect_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:5000/ws".to_string(),
            reconnect_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiSettings {
    pub tick_ms: u64,
    pub lockout_secs: u64,
    pub max_log_lines: usize,
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            tick_ms: 100,
            lockout_secs: 3,
            max_log_lines: 2000,
        }
    }
}

/// Choices offered by the configuration form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FormSettings {
    pub default_symbol: String,
    pub strategies: Vec<String>,
}

impl Default for FormSettings {
    fn default() -> Self {
        Self {
            default_symbol: "DOGEUSDT".to_string(),
            strategies: vec![
                "EMA_VWAP".to_string(),
                "RSI_DIVERGENCE".to_string(),
                "SUPERTREND_ATR".to_string(),
                "MACD_SIGNAL".to_string(),
                "BOLLINGER_BOUNCE".to_string(),
                "ICHIMOKU_CLOUD".to_string(),
                "BREAKOUT_VOLUME_SR".to_string(),
                "TREND_MOMENTUM_VOLUME".to_string(),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(Settings::default().validate().is_ok());
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            [server]
            url = "ws://bot.example:9000/ws"
            "#,
        )
        .unwrap();
        assert_eq!(settings.server.url, "ws://bot.example:9000/ws");
        assert_eq!(settings.server.reconnect_secs, 5);
        assert_eq!(settings.ui.lockout_secs, 3);
        assert!(!settings.form.strategies.is_empty());
    }

    #[test]
    fn zeroed_timers_fail_validation() {
        let mut settings = Settings::default();
        settings.ui.tick_ms = 0;
        settings.ui.lockout_secs = 0;
        let errors = settings.validate().unwrap_err();
        assert_eq!(errors.len(), 2);
    }
}
