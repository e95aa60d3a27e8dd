use chrono::{DateTime, Local, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Shown in the signal panel whenever no signal has arrived yet.
pub const NO_SIGNAL_PLACEHOLDER: &str = "No signal yet";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Server-pushed bot status. All fields are optional on the wire so a
/// partial payload still renders whatever it carries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BotStatus {
    pub is_running: bool,
    pub uptime: String,
    pub config: Option<BotConfigInfo>,
    pub last_signal: Option<SignalInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfigInfo {
    pub symbol: String,
    pub interval: String,
}

impl BotConfigInfo {
    pub fn display_line(&self) -> String {
        format!("{} | {}", self.symbol, self.interval)
    }
}

/// Latest trading signal produced by the backend, consumed read-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalInfo {
    pub side: Side,
    pub strategy: String,
    pub entry: Decimal,
    pub final_confidence: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl SignalInfo {
    /// Entry price with exactly 8 fractional digits.
    pub fn entry_display(&self) -> String {
        let rounded = self
            .entry
            .round_dp_with_strategy(8, RoundingStrategy::MidpointAwayFromZero);
        format!("{:.8}", rounded)
    }

    /// Confidence as a percentage with exactly 1 fractional digit.
    pub fn confidence_display(&self) -> String {
        let pct = (self.final_confidence * Decimal::from(100))
            .round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero);
        format!("{:.1}%", pct)
    }

    /// Local time-of-day the signal was produced.
    pub fn time_display(&self) -> String {
        self.timestamp
            .with_timezone(&Local)
            .format("%H:%M:%S")
            .to_string()
    }

    pub fn headline(&self) -> String {
        format!("{} {} @ {}", self.side, self.strategy, self.entry_display())
    }
}

/// Per-strategy aggregate pushed by the server for the comparison chart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyStat {
    pub avg_confidence: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn signal(entry: Decimal, confidence: Decimal) -> SignalInfo {
        SignalInfo {
            side: Side::Buy,
            strategy: "EMA_VWAP".to_string(),
            entry,
            final_confidence: confidence,
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 45).unwrap(),
        }
    }

    #[test]
    fn entry_has_exactly_eight_fractional_digits() {
        assert_eq!(signal(dec!(0.00001234), dec!(0.5)).entry_display(), "0.00001234");
        assert_eq!(signal(dec!(1.5), dec!(0.5)).entry_display(), "1.50000000");
        assert_eq!(signal(dec!(43250), dec!(0.5)).entry_display(), "43250.00000000");
    }

    #[test]
    fn confidence_has_exactly_one_fractional_digit() {
        assert_eq!(signal(dec!(1), dec!(0.8675)).confidence_display(), "86.8%");
        assert_eq!(signal(dec!(1), dec!(1)).confidence_display(), "100.0%");
        assert_eq!(signal(dec!(1), dec!(0.5)).confidence_display(), "50.0%");
        assert_eq!(signal(dec!(1), dec!(0.123)).confidence_display(), "12.3%");
    }

    #[test]
    fn config_line_joins_symbol_and_interval() {
        let config = BotConfigInfo {
            symbol: "DOGEUSDT".to_string(),
            interval: "5m".to_string(),
        };
        assert_eq!(config.display_line(), "DOGEUSDT | 5m");
    }

    #[test]
    fn side_deserializes_from_uppercase() {
        assert_eq!(serde_json::from_str::<Side>("\"BUY\"").unwrap(), Side::Buy);
        assert_eq!(serde_json::from_str::<Side>("\"SELL\"").unwrap(), Side::Sell);
    }

    #[test]
    fn partial_status_payload_still_decodes() {
        let status: BotStatus = serde_json::from_str(r#"{"is_running": true}"#).unwrap();
        assert!(status.is_running);
        assert!(status.config.is_none());
        assert!(status.last_signal.is_none());
    }
}
