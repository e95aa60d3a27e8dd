use anyhow::Result;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use crate::types::{BotStatus, StrategyStat};

const DEFAULT_RECONNECT: Duration = Duration::from_secs(5);

/// Events surfaced to the UI task.
#[derive(Debug, Clone)]
pub enum ServerEvent {
    Status(BotStatus),
    Log(String),
    Balance(f64),
    StrategyStats(BTreeMap<String, StrategyStat>),
    Connected,
    Disconnected,
}

/// Commands the dashboard emits to the bot server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    StartBot,
    StopBot,
    UpdateConfig {
        symbol: String,
        active_strategies: Vec<String>,
    },
}

impl Command {
    pub fn event_name(&self) -> &'static str {
        match self {
            Command::StartBot => "start_bot",
            Command::StopBot => "stop_bot",
            Command::UpdateConfig { .. } => "update_config",
        }
    }

    /// JSON frame for the wire: `{"event": <name>}` plus a `data` member
    /// for commands that carry a payload.
    pub fn to_frame(&self) -> serde_json::Value {
        match self {
            Command::StartBot | Command::StopBot => json!({ "event": self.event_name() }),
            Command::UpdateConfig {
                symbol,
                active_strategies,
            } => json!({
                "event": self.event_name(),
                "data": {
                    "symbol": symbol,
                    "active_strategies": active_strategies,
                }
            }),
        }
    }
}

/// WebSocket adapter for the bot server's event channel. Owns the
/// connection on a spawned task and reconnects forever with a fixed
/// backoff, feeding inbound events to an mpsc channel and draining
/// outbound commands from another.
pub struct BotSocket {
    url: String,
    reconnect: Duration,
}

impl BotSocket {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reconnect: DEFAULT_RECONNECT,
        }
    }

    pub fn with_reconnect(mut self, reconnect: Duration) -> Self {
        self.reconnect = reconnect;
        self
    }

    pub fn connect(self) -> (mpsc::Receiver<ServerEvent>, mpsc::Sender<Command>) {
        let (event_tx, event_rx) = mpsc::channel(256);
        let (cmd_tx, mut cmd_rx) = mpsc::channel(32);

        tokio::spawn(async move {
            loop {
                match run_connection(&self.url, &event_tx, &mut cmd_rx).await {
                    Ok(_) => warn!("Connection closed, reconnecting..."),
                    Err(e) => error!("Connection error: {}, reconnecting...", e),
                }

                if event_tx.send(ServerEvent::Disconnected).await.is_err() {
                    break;
                }
                tokio::time::sleep(self.reconnect).await;
            }
        });

        (event_rx, cmd_tx)
    }
}

async fn run_connection(
    url: &str,
    events: &mpsc::Sender<ServerEvent>,
    commands: &mut mpsc::Receiver<Command>,
) -> Result<()> {
    info!("Connecting to {}", url);
    let (ws_stream, _) = connect_async(url).await?;
    let (mut write, mut read) = ws_stream.split();

    info!("Connected");
    events.send(ServerEvent::Connected).await?;

    loop {
        tokio::select! {
            msg = read.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    if let Some(event) = parse_message(&text) {
                        if events.send(event).await.is_err() {
                            return Ok(());
                        }
                    }
                }
                Some(Ok(Message::Ping(data))) => {
                    write.send(Message::Pong(data)).await?;
                }
                Some(Ok(Message::Close(_))) => {
                    info!("Closed by server");
                    return Ok(());
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(()),
            },
            cmd = commands.recv() => match cmd {
                Some(cmd) => {
                    info!("Sending {}", cmd.event_name());
                    write.send(Message::Text(cmd.to_frame().to_string())).await?;
                }
                None => return Ok(()),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct InboundEnvelope {
    event: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct LogPayload {
    log: String,
}

#[derive(Debug, Deserialize)]
struct BalancePayload {
    current_balance: f64,
}

/// Decode one inbound frame. Malformed payloads are logged and dropped
/// rather than failing the connection.
fn parse_message(text: &str) -> Option<ServerEvent> {
    let envelope: InboundEnvelope = match serde_json::from_str(text) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!("Undecodable frame ({}): {}", e, text);
            return None;
        }
    };

    match envelope.event.as_str() {
        "status_update" => match serde_json::from_value::<BotStatus>(envelope.data) {
            Ok(status) => Some(ServerEvent::Status(status)),
            Err(e) => {
                warn!("Malformed status_update: {}", e);
                None
            }
        },
        "log_update" => match serde_json::from_value::<LogPayload>(envelope.data) {
            Ok(payload) => Some(ServerEvent::Log(payload.log)),
            Err(e) => {
                warn!("Malformed log_update: {}", e);
                None
            }
        },
        "balance_update" => match serde_json::from_value::<BalancePayload>(envelope.data) {
            Ok(payload) => Some(ServerEvent::Balance(payload.current_balance)),
            Err(e) => {
                warn!("Malformed balance_update: {}", e);
                None
            }
        },
        "strategy_stats" => {
            match serde_json::from_value::<BTreeMap<String, StrategyStat>>(envelope.data) {
                Ok(stats) => Some(ServerEvent::StrategyStats(stats)),
                Err(e) => {
                    warn!("Malformed strategy_stats: {}", e);
                    None
                }
            }
        }
        other => {
            debug!("Ignoring unknown event: {}", other);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn parses_status_update() {
        let text = r#"{
            "event": "status_update",
            "data": {
                "is_running": true,
                "uptime": "01:02:03",
                "config": {"symbol": "DOGEUSDT", "interval": "5m"}
            }
        }"#;
        match parse_message(text) {
            Some(ServerEvent::Status(status)) => {
                assert!(status.is_running);
                assert_eq!(status.uptime, "01:02:03");
                assert_eq!(status.config.unwrap().symbol, "DOGEUSDT");
                assert!(status.last_signal.is_none());
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn parses_signal_fields() {
        let text = r#"{
            "event": "status_update",
            "data": {
                "is_running": true,
                "uptime": "00:10:00",
                "last_signal": {
                    "side": "SELL",
                    "strategy": "RSI_DIVERGENCE",
                    "entry": "0.12345678",
                    "final_confidence": "0.72",
                    "timestamp": "2024-03-01T12:30:45Z"
                }
            }
        }"#;
        match parse_message(text) {
            Some(ServerEvent::Status(status)) => {
                let signal = status.last_signal.unwrap();
                assert_eq!(signal.side.as_str(), "SELL");
                assert_eq!(signal.entry, dec!(0.12345678));
                assert_eq!(signal.final_confidence, dec!(0.72));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn parses_log_and_balance() {
        match parse_message(r#"{"event": "log_update", "data": {"log": "[12:00:00] started"}}"#) {
            Some(ServerEvent::Log(line)) => assert_eq!(line, "[12:00:00] started"),
            other => panic!("unexpected: {:?}", other),
        }
        match parse_message(r#"{"event": "balance_update", "data": {"current_balance": 1042.5}}"#) {
            Some(ServerEvent::Balance(balance)) => assert_eq!(balance, 1042.5),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn parses_strategy_stats() {
        let text = r#"{
            "event": "strategy_stats",
            "data": {
                "EMA_VWAP": {"avg_confidence": "0.61"},
                "MACD_SIGNAL": {"avg_confidence": "0.55"}
            }
        }"#;
        match parse_message(text) {
            Some(ServerEvent::StrategyStats(stats)) => {
                assert_eq!(stats.len(), 2);
                assert_eq!(stats["EMA_VWAP"].avg_confidence, dec!(0.61));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn malformed_and_unknown_frames_are_dropped() {
        assert!(parse_message("not json").is_none());
        assert!(parse_message(r#"{"event": "log_update", "data": {}}"#).is_none());
        assert!(parse_message(r#"{"event": "mystery", "data": {"x": 1}}"#).is_none());
    }

    #[test]
    fn command_frames_match_wire_contract() {
        assert_eq!(
            Command::StartBot.to_frame(),
            serde_json::json!({"event": "start_bot"})
        );
        assert_eq!(
            Command::StopBot.to_frame(),
            serde_json::json!({"event": "stop_bot"})
        );

        let cmd = Command::UpdateConfig {
            symbol: "BTCUSDT".to_string(),
            active_strategies: vec!["RSI".to_string(), "MACD".to_string()],
        };
        assert_eq!(
            cmd.to_frame(),
            serde_json::json!({
                "event": "update_config",
                "data": {"symbol": "BTCUSDT", "active_strategies": ["RSI", "MACD"]}
            })
        );
    }
}
