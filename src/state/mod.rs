use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, VecDeque};
use std::time::{Duration, Instant};

use crate::types::{BotStatus, StrategyStat};

/// Rolling window for the balance chart series.
pub const MAX_BALANCE_POINTS: usize = 50;
/// Synthetic points seeded at startup before real history arrives.
pub const SEED_BALANCE_POINTS: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Start,
    Stop,
}

/// Local double-submission guard for one control. `Pending` is released
/// either by the fixed deadline or early by a corroborating status update.
#[derive(Debug, Clone, Copy)]
pub enum Lockout {
    Idle,
    Pending { deadline: Instant },
}

impl Lockout {
    pub fn is_pending(&self) -> bool {
        matches!(self, Lockout::Pending { .. })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BalancePoint {
    pub timestamp: DateTime<Utc>,
    pub balance: f64,
}

/// Client-owned display state. Everything here is mutated from the single
/// UI task; the socket task only feeds events into it.
pub struct DashboardState {
    pub connected: bool,
    pub status: Option<BotStatus>,
    logs: VecDeque<String>,
    max_log_lines: usize,
    balance: VecDeque<BalancePoint>,
    strategy_stats: BTreeMap<String, StrategyStat>,
    start_lockout: Lockout,
    stop_lockout: Lockout,
    lockout: Duration,
}

impl DashboardState {
    pub fn new(lockout: Duration, max_log_lines: usize) -> Self {
        let now = Utc::now();
        let seed = now.timestamp_subsec_nanos() as u64 | 1;
        let mut balance = VecDeque::with_capacity(MAX_BALANCE_POINTS);
        for (i, value) in placeholder_series(seed, SEED_BALANCE_POINTS)
            .into_iter()
            .enumerate()
        {
            balance.push_back(BalancePoint {
                timestamp: now - chrono::Duration::seconds((SEED_BALANCE_POINTS - i) as i64),
                balance: value,
            });
        }

        Self {
            connected: false,
            status: None,
            logs: VecDeque::new(),
            max_log_lines,
            balance,
            strategy_stats: BTreeMap::new(),
            start_lockout: Lockout::Idle,
            stop_lockout: Lockout::Idle,
            lockout,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status.as_ref().map_or(false, |s| s.is_running)
    }

    pub fn lockout_pending(&self, control: Control) -> bool {
        match control {
            Control::Start => self.start_lockout.is_pending(),
            Control::Stop => self.stop_lockout.is_pending(),
        }
    }

    /// Control enablement follows the authoritative running flag, with the
    /// local lockout layered on top while a command is in flight.
    pub fn control_enabled(&self, control: Control) -> bool {
        if self.lockout_pending(control) {
            return false;
        }
        match control {
            Control::Start => !self.is_running(),
            Control::Stop => self.is_running(),
        }
    }

    /// Engage the lockout for a control if it may fire. Returns whether the
    /// caller should emit the command.
    pub fn trigger(&mut self, control: Control, now: Instant) -> bool {
        if !self.control_enabled(control) {
            return false;
        }
        let pending = Lockout::Pending {
            deadline: now + self.lockout,
        };
        match control {
            Control::Start => self.start_lockout = pending,
            Control::Stop => self.stop_lockout = pending,
        }
        true
    }

    /// Release any lockout whose fixed deadline has passed. Called from the
    /// UI tick so expiry and status updates are serialized.
    pub fn release_expired(&mut self, now: Instant) {
        if let Lockout::Pending { deadline } = self.start_lockout {
            if now >= deadline {
                self.start_lockout = Lockout::Idle;
            }
        }
        if let Lockout::Pending { deadline } = self.stop_lockout {
            if now >= deadline {
                self.stop_lockout = Lockout::Idle;
            }
        }
    }

    /// Most recent status wins. A status corroborating a pending command
    /// releases that command's lockout early, cancelling the timer.
    pub fn apply_status(&mut self, mut status: BotStatus) {
        if self.start_lockout.is_pending() && status.is_running {
            self.start_lockout = Lockout::Idle;
        }
        if self.stop_lockout.is_pending() && !status.is_running {
            self.stop_lockout = Lockout::Idle;
        }
        // an absent config skips its update and keeps the last known value;
        // an absent last_signal still overwrites to the placeholder
        if status.config.is_none() {
            status.config = self.status.as_ref().and_then(|s| s.config.clone());
        }
        self.status = Some(status);
    }

    pub fn push_log(&mut self, line: String) {
        self.logs.push_back(line);
        while self.logs.len() > self.max_log_lines {
            self.logs.pop_front();
        }
    }

    pub fn push_balance(&mut self, balance: f64, timestamp: DateTime<Utc>) {
        self.balance.push_back(BalancePoint { timestamp, balance });
        while self.balance.len() > MAX_BALANCE_POINTS {
            self.balance.pop_front();
        }
    }

    pub fn set_strategy_stats(&mut self, stats: BTreeMap<String, StrategyStat>) {
        self.strategy_stats = stats;
    }

    pub fn logs(&self) -> &VecDeque<String> {
        &self.logs
    }

    pub fn balance(&self) -> &VecDeque<BalancePoint> {
        &self.balance
    }

    pub fn strategy_stats(&self) -> &BTreeMap<String, StrategyStat> {
        &self.strategy_stats
    }
}

/// Small xorshift generator for the startup placeholder series, values in
/// the 1000..1100 band like the reference display stub.
fn placeholder_series(mut seed: u64, count: usize) -> Vec<f64> {
    (0..count)
        .map(|_| {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            1000.0 + (seed % 100) as f64
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BotConfigInfo, Side, SignalInfo};
    use rust_decimal_macros::dec;

    fn state() -> DashboardState {
        DashboardState::new(Duration::from_secs(3), 2000)
    }

    fn running(is_running: bool) -> BotStatus {
        BotStatus {
            is_running,
            ..BotStatus::default()
        }
    }

    #[test]
    fn seeds_thirty_placeholder_points() {
        let state = state();
        assert_eq!(state.balance().len(), SEED_BALANCE_POINTS);
        assert!(state
            .balance()
            .iter()
            .all(|p| p.balance >= 1000.0 && p.balance < 1100.0));
    }

    #[test]
    fn balance_series_is_a_fifo_window_of_fifty() {
        let mut state = state();
        for i in 1..=55 {
            state.push_balance(i as f64, Utc::now());
        }
        assert_eq!(state.balance().len(), MAX_BALANCE_POINTS);
        assert_eq!(state.balance().front().unwrap().balance, 6.0);
        assert_eq!(state.balance().back().unwrap().balance, 55.0);
    }

    #[test]
    fn enablement_follows_running_flag() {
        let mut state = state();

        state.apply_status(running(true));
        assert!(!state.control_enabled(Control::Start));
        assert!(state.control_enabled(Control::Stop));

        state.apply_status(running(false));
        assert!(state.control_enabled(Control::Start));
        assert!(!state.control_enabled(Control::Stop));
    }

    #[test]
    fn second_trigger_within_lockout_is_rejected() {
        let mut state = state();
        let now = Instant::now();

        assert!(state.trigger(Control::Start, now));
        assert!(!state.trigger(Control::Start, now));
        assert!(!state.trigger(Control::Start, now + Duration::from_secs(2)));
    }

    #[test]
    fn lockout_releases_on_deadline() {
        let mut state = state();
        let now = Instant::now();

        assert!(state.trigger(Control::Start, now));
        state.release_expired(now + Duration::from_secs(2));
        assert!(state.lockout_pending(Control::Start));

        state.release_expired(now + Duration::from_secs(3));
        assert!(!state.lockout_pending(Control::Start));
        assert!(state.trigger(Control::Start, now + Duration::from_secs(3)));
    }

    #[test]
    fn corroborating_status_releases_lockout_early() {
        let mut state = state();
        let now = Instant::now();

        assert!(state.trigger(Control::Start, now));
        state.apply_status(running(true));
        assert!(!state.lockout_pending(Control::Start));

        // stop flow: running, trigger stop, then a stopped status lands
        assert!(state.trigger(Control::Stop, now));
        state.apply_status(running(false));
        assert!(!state.lockout_pending(Control::Stop));
    }

    #[test]
    fn partial_status_keeps_last_known_config() {
        let mut state = state();
        state.apply_status(BotStatus {
            is_running: true,
            config: Some(BotConfigInfo {
                symbol: "DOGEUSDT".to_string(),
                interval: "5m".to_string(),
            }),
            ..BotStatus::default()
        });

        state.apply_status(running(true));
        let config = state.status.as_ref().unwrap().config.as_ref().unwrap();
        assert_eq!(config.symbol, "DOGEUSDT");
        assert_eq!(config.interval, "5m");
    }

    #[test]
    fn absent_signal_still_overwrites_to_placeholder() {
        let mut state = state();
        state.apply_status(BotStatus {
            is_running: true,
            last_signal: Some(SignalInfo {
                side: Side::Buy,
                strategy: "EMA_VWAP".to_string(),
                entry: dec!(0.1234),
                final_confidence: dec!(0.7),
                timestamp: Utc::now(),
            }),
            ..BotStatus::default()
        });
        assert!(state.status.as_ref().unwrap().last_signal.is_some());

        state.apply_status(running(true));
        assert!(state.status.as_ref().unwrap().last_signal.is_none());
    }

    #[test]
    fn contradicting_status_keeps_lockout_pending() {
        let mut state = state();
        let now = Instant::now();

        assert!(state.trigger(Control::Start, now));
        state.apply_status(running(false));
        assert!(state.lockout_pending(Control::Start));
    }

    #[test]
    fn log_buffer_evicts_oldest_beyond_cap() {
        let mut state = DashboardState::new(Duration::from_secs(3), 3);
        for i in 0..5 {
            state.push_log(format!("line {}", i));
        }
        assert_eq!(state.logs().len(), 3);
        assert_eq!(state.logs().front().unwrap(), "line 2");
        assert_eq!(state.logs().back().unwrap(), "line 4");
    }
}
