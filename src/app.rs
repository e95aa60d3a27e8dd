use anyhow::Result;
use chrono::Utc;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::DefaultTerminal;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::client::{Command, ServerEvent};
use crate::config::Settings;
use crate::state::{Control, DashboardState};
use crate::ui;

pub enum UiMode {
    Normal,
    ConfirmStop,
    ConfigForm(ConfigForm),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormFocus {
    Symbol,
    Strategies,
}

/// Configuration form: a symbol text input plus a strategy multi-select.
/// No validation of symbol format or selection size, matching the
/// reference behavior.
pub struct ConfigForm {
    pub symbol: String,
    pub strategies: Vec<(String, bool)>,
    pub cursor: usize,
    pub focus: FormFocus,
}

enum FormOutcome {
    Stay,
    Cancel,
    Submit(Command),
}

impl ConfigForm {
    fn new(settings: &Settings, current_symbol: Option<&str>) -> Self {
        Self {
            symbol: current_symbol
                .unwrap_or(&settings.form.default_symbol)
                .to_string(),
            strategies: settings
                .form
                .strategies
                .iter()
                .map(|name| (name.clone(), false))
                .collect(),
            cursor: 0,
            focus: FormFocus::Symbol,
        }
    }

    fn selected_strategies(&self) -> Vec<String> {
        self.strategies
            .iter()
            .filter(|(_, on)| *on)
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn on_key(&mut self, key: KeyEvent) -> FormOutcome {
        match key.code {
            KeyCode::Esc => return FormOutcome::Cancel,
            KeyCode::Enter => {
                return FormOutcome::Submit(Command::UpdateConfig {
                    symbol: self.symbol.clone(),
                    active_strategies: self.selected_strategies(),
                });
            }
            KeyCode::Tab => {
                self.focus = match self.focus {
                    FormFocus::Symbol => FormFocus::Strategies,
                    FormFocus::Strategies => FormFocus::Symbol,
                };
            }
            _ => match self.focus {
                FormFocus::Symbol => match key.code {
                    KeyCode::Char(c) => self.symbol.push(c.to_ascii_uppercase()),
                    KeyCode::Backspace => {
                        self.symbol.pop();
                    }
                    KeyCode::Down => self.focus = FormFocus::Strategies,
                    _ => {}
                },
                FormFocus::Strategies => match key.code {
                    KeyCode::Up => {
                        if self.cursor == 0 {
                            self.focus = FormFocus::Symbol;
                        } else {
                            self.cursor -= 1;
                        }
                    }
                    KeyCode::Down => {
                        if self.cursor + 1 < self.strategies.len() {
                            self.cursor += 1;
                        }
                    }
                    KeyCode::Char(' ') => {
                        if let Some(entry) = self.strategies.get_mut(self.cursor) {
                            entry.1 = !entry.1;
                        }
                    }
                    _ => {}
                },
            },
        }
        FormOutcome::Stay
    }
}

pub struct App {
    pub state: DashboardState,
    pub mode: UiMode,
    pub settings: Settings,
    /// Lines scrolled up from the log tail; 0 follows the newest entry.
    pub log_offset: usize,
    should_quit: bool,
}

impl App {
    pub fn new(settings: Settings) -> Self {
        let state = DashboardState::new(
            Duration::from_secs(settings.ui.lockout_secs),
            settings.ui.max_log_lines,
        );
        Self {
            state,
            mode: UiMode::Normal,
            settings,
            log_offset: 0,
            should_quit: false,
        }
    }

    pub fn on_event(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::Status(status) => self.state.apply_status(status),
            ServerEvent::Log(line) => self.state.push_log(line),
            ServerEvent::Balance(balance) => self.state.push_balance(balance, Utc::now()),
            ServerEvent::StrategyStats(stats) => self.state.set_strategy_stats(stats),
            ServerEvent::Connected => {
                info!("Channel connected");
                self.state.connected = true;
            }
            ServerEvent::Disconnected => {
                warn!("Channel disconnected");
                self.state.connected = false;
            }
        }
    }

    /// Handle one key press, returning the command to emit, if any.
    pub fn on_key(&mut self, key: KeyEvent, now: Instant) -> Option<Command> {
        if key.kind != KeyEventKind::Press {
            return None;
        }

        match &mut self.mode {
            UiMode::Normal => self.on_normal_key(key, now),
            UiMode::ConfirmStop => match key.code {
                KeyCode::Char('y') | KeyCode::Enter => {
                    self.mode = UiMode::Normal;
                    if !self.state.connected {
                        warn!("stop_bot dropped: channel disconnected");
                        None
                    } else if self.state.trigger(Control::Stop, now) {
                        Some(Command::StopBot)
                    } else {
                        None
                    }
                }
                KeyCode::Char('n') | KeyCode::Esc => {
                    // declined: no state change, nothing sent
                    self.mode = UiMode::Normal;
                    None
                }
                _ => None,
            },
            UiMode::ConfigForm(form) => match form.on_key(key) {
                FormOutcome::Stay => None,
                FormOutcome::Cancel => {
                    self.mode = UiMode::Normal;
                    None
                }
                FormOutcome::Submit(cmd) => {
                    self.mode = UiMode::Normal;
                    if self.state.connected {
                        Some(cmd)
                    } else {
                        warn!("{} dropped: channel disconnected", cmd.event_name());
                        None
                    }
                }
            },
        }
    }

    fn on_normal_key(&mut self, key: KeyEvent, now: Instant) -> Option<Command> {
        match key.code {
            KeyCode::Char('q') => {
                self.should_quit = true;
                None
            }
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.should_quit = true;
                None
            }
            KeyCode::Char('s') => {
                if !self.state.connected {
                    warn!("start_bot dropped: channel disconnected");
                    None
                } else if self.state.trigger(Control::Start, now) {
                    Some(Command::StartBot)
                } else {
                    debug!("Start ignored: control disabled or pending");
                    None
                }
            }
            KeyCode::Char('x') => {
                if self.state.control_enabled(Control::Stop) {
                    self.mode = UiMode::ConfirmStop;
                }
                None
            }
            KeyCode::Char('c') => {
                let current = self
                    .state
                    .status
                    .as_ref()
                    .and_then(|s| s.config.as_ref())
                    .map(|c| c.symbol.as_str());
                self.mode = UiMode::ConfigForm(ConfigForm::new(&self.settings, current));
                None
            }
            KeyCode::Up => {
                let max = self.state.logs().len();
                if self.log_offset < max {
                    self.log_offset += 1;
                }
                None
            }
            KeyCode::Down => {
                self.log_offset = self.log_offset.saturating_sub(1);
                None
            }
            KeyCode::PageUp => {
                let max = self.state.logs().len();
                self.log_offset = (self.log_offset + 10).min(max);
                None
            }
            KeyCode::PageDown => {
                self.log_offset = self.log_offset.saturating_sub(10);
                None
            }
            KeyCode::End => {
                self.log_offset = 0;
                None
            }
            _ => None,
        }
    }

    pub async fn run(
        mut self,
        mut terminal: DefaultTerminal,
        mut events: mpsc::Receiver<ServerEvent>,
        commands: mpsc::Sender<Command>,
    ) -> Result<()> {
        let mut tick = tokio::time::interval(Duration::from_millis(self.settings.ui.tick_ms));
        terminal.draw(|frame| ui::render(frame, &self))?;

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    let now = Instant::now();
                    self.state.release_expired(now);
                    while event::poll(Duration::from_millis(0))? {
                        if let Event::Key(key) = event::read()? {
                            if let Some(cmd) = self.on_key(key, now) {
                                if commands.send(cmd).await.is_err() {
                                    warn!("Command channel closed, command dropped");
                                }
                            }
                        }
                    }
                    if self.should_quit {
                        return Ok(());
                    }
                    terminal.draw(|frame| ui::render(frame, &self))?;
                }
                event = events.recv() => match event {
                    Some(event) => {
                        self.on_event(event);
                        terminal.draw(|frame| ui::render(frame, &self))?;
                    }
                    None => {
                        warn!("Event channel closed");
                        return Ok(());
                    }
                },
            }
        }
    }
}
