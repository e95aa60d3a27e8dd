use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::symbols;
use ratatui::text::{Line, Span};
use ratatui::widgets::{
    Axis, BarChart, Block, Borders, Chart, Clear, Dataset, GraphType, Paragraph, Wrap,
};
use ratatui::Frame;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::app::{App, ConfigForm, FormFocus, UiMode};
use crate::state::Control;
use crate::types::{BotStatus, Side, NO_SIGNAL_PLACEHOLDER};

const RUNNING_COLOR: Color = Color::Green;
const STOPPED_COLOR: Color = Color::Red;

pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(12),
            Constraint::Length(10),
            Constraint::Length(1),
        ])
        .split(frame.area());

    let top = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(chunks[0]);

    let charts = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(top[1]);

    render_status_panel(frame, app, top[0]);
    render_balance_chart(frame, app, charts[0]);
    render_strategy_chart(frame, app, charts[1]);
    render_log(frame, app, chunks[1]);
    render_controls(frame, app, chunks[2]);

    match &app.mode {
        UiMode::ConfirmStop => render_confirm_popup(frame),
        UiMode::ConfigForm(form) => render_config_form(frame, form),
        UiMode::Normal => {}
    }
}

fn render_status_panel(frame: &mut Frame, app: &App, area: Rect) {
    let mut lines = Vec::new();

    if !app.state.connected {
        lines.push(Line::from(Span::styled(
            "DISCONNECTED",
            Style::default()
                .fg(STOPPED_COLOR)
                .add_modifier(Modifier::BOLD | Modifier::SLOW_BLINK),
        )));
    }

    let (status_text, status_color) = if app.state.is_running() {
        ("● Running", RUNNING_COLOR)
    } else {
        ("● Stopped", STOPPED_COLOR)
    };
    lines.push(Line::from(Span::styled(
        status_text,
        Style::default()
            .fg(status_color)
            .add_modifier(Modifier::BOLD),
    )));

    let uptime = app
        .state
        .status
        .as_ref()
        .map(|s| s.uptime.as_str())
        .unwrap_or("-");
    lines.push(Line::from(format!("Uptime: {}", uptime)));

    let config_line = app
        .state
        .status
        .as_ref()
        .and_then(|s| s.config.as_ref())
        .map(|c| c.display_line())
        .unwrap_or_else(|| "-".to_string());
    lines.push(Line::from(config_line));

    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "Last signal",
        Style::default().add_modifier(Modifier::UNDERLINED),
    )));
    lines.extend(signal_lines(app.state.status.as_ref()));

    let panel = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Bot Status"))
        .wrap(Wrap { trim: false });
    frame.render_widget(panel, area);
}

/// Signal card lines, or the placeholder when no signal has arrived.
pub(crate) fn signal_lines(status: Option<&BotStatus>) -> Vec<Line<'static>> {
    let signal = match status.and_then(|s| s.last_signal.as_ref()) {
        Some(signal) => signal,
        None => return vec![Line::from(NO_SIGNAL_PLACEHOLDER)],
    };

    let side_color = match signal.side {
        Side::Buy => RUNNING_COLOR,
        Side::Sell => STOPPED_COLOR,
    };

    vec![
        Line::from(vec![
            Span::styled(
                signal.side.as_str().to_string(),
                Style::default().fg(side_color).add_modifier(Modifier::BOLD),
            ),
            Span::raw(format!(" {}", signal.strategy)),
        ]),
        Line::from(format!("@ {}", signal.entry_display())),
        Line::from(format!(
            "Confidence: {} | {}",
            signal.confidence_display(),
            signal.time_display()
        )),
    ]
}

fn render_balance_chart(frame: &mut Frame, app: &App, area: Rect) {
    let points: Vec<(f64, f64)> = app
        .state
        .balance()
        .iter()
        .enumerate()
        .map(|(i, p)| (i as f64, p.balance))
        .collect();

    let (y_min, y_max) = points
        .iter()
        .fold((f64::MAX, f64::MIN), |(min, max), &(_, y)| {
            (min.min(y), max.max(y))
        });
    let y_pad = ((y_max - y_min) * 0.1).max(1.0);
    let y_bounds = [y_min - y_pad, y_max + y_pad];
    let x_max = (points.len().saturating_sub(1)).max(1) as f64;

    let first_ts = app
        .state
        .balance()
        .front()
        .map(|p| p.timestamp.format("%H:%M:%S").to_string())
        .unwrap_or_default();
    let last_ts = app
        .state
        .balance()
        .back()
        .map(|p| p.timestamp.format("%H:%M:%S").to_string())
        .unwrap_or_default();

    let dataset = Dataset::default()
        .name("Balance (USD)")
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(Color::Cyan))
        .data(&points);

    let chart = Chart::new(vec![dataset])
        .block(Block::default().borders(Borders::ALL).title("Balance"))
        .x_axis(
            Axis::default()
                .style(Style::default().fg(Color::DarkGray))
                .bounds([0.0, x_max])
                .labels(vec![Span::raw(first_ts), Span::raw(last_ts)]),
        )
        .y_axis(
            Axis::default()
                .style(Style::default().fg(Color::DarkGray))
                .bounds(y_bounds)
                .labels(vec![
                    Span::raw(format!("{:.0}", y_bounds[0])),
                    Span::raw(format!("{:.0}", y_bounds[1])),
                ]),
        );
    frame.render_widget(chart, area);
}

fn render_strategy_chart(frame: &mut Frame, app: &App, area: Rect) {
    let data: Vec<(String, u64)> = app
        .state
        .strategy_stats()
        .iter()
        .map(|(name, stat)| {
            let pct = (stat.avg_confidence * Decimal::from(100))
                .to_u64()
                .unwrap_or(0);
            (name.clone(), pct)
        })
        .collect();

    let block = Block::default()
        .borders(Borders::ALL)
        .title("Strategy Confidence (%)");

    if data.is_empty() {
        let empty = Paragraph::new("No strategy stats yet")
            .block(block)
            .alignment(Alignment::Center);
        frame.render_widget(empty, area);
        return;
    }

    let bars: Vec<(&str, u64)> = data.iter().map(|(name, v)| (name.as_str(), *v)).collect();
    let chart = BarChart::default()
        .block(block)
        .bar_width(12)
        .bar_gap(1)
        .max(100)
        .bar_style(Style::default().fg(Color::Yellow))
        .value_style(Style::default().add_modifier(Modifier::BOLD))
        .data(bars.as_slice());
    frame.render_widget(chart, area);
}

fn render_log(frame: &mut Frame, app: &App, area: Rect) {
    let height = area.height.saturating_sub(2) as usize;
    let total = app.state.logs().len();
    let offset = app.log_offset.min(total);
    let end = total - offset;
    let start = end.saturating_sub(height);

    let lines: Vec<Line> = app
        .state
        .logs()
        .iter()
        .skip(start)
        .take(end - start)
        .map(|entry| Line::from(entry.as_str()))
        .collect();

    let title = if offset == 0 {
        "Log".to_string()
    } else {
        format!("Log (scrolled {} up, End to follow)", offset)
    };

    let log = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(title));
    frame.render_widget(log, area);
}

fn render_controls(frame: &mut Frame, app: &App, area: Rect) {
    let mut spans = vec![
        control_hint(
            "[s] Start",
            "[s] Starting...",
            app.state.control_enabled(Control::Start),
            app.state.lockout_pending(Control::Start),
        ),
        Span::raw("  "),
        control_hint(
            "[x] Stop",
            "[x] Stopping...",
            app.state.control_enabled(Control::Stop),
            app.state.lockout_pending(Control::Stop),
        ),
        Span::raw("  "),
        Span::raw("[c] Config"),
        Span::raw("  "),
        Span::raw("[↑/↓] Scroll log"),
        Span::raw("  "),
        Span::raw("[q] Quit"),
    ];

    if !app.state.connected {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            "offline",
            Style::default().fg(STOPPED_COLOR),
        ));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// Dim a control hint while it is disabled; show the in-progress label
/// while its command is pending.
pub(crate) fn control_hint(
    label: &'static str,
    pending_label: &'static str,
    enabled: bool,
    pending: bool,
) -> Span<'static> {
    if pending {
        Span::styled(
            pending_label,
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::DIM),
        )
    } else if enabled {
        Span::styled(label, Style::default().add_modifier(Modifier::BOLD))
    } else {
        Span::styled(label, Style::default().add_modifier(Modifier::DIM))
    }
}

fn render_confirm_popup(frame: &mut Frame) {
    let popup = centered_rect(frame.area(), 40, 5);
    let text = vec![
        Line::from("Stop the bot?"),
        Line::from(""),
        Line::from("[y] Yes    [n] No"),
    ];
    let paragraph = Paragraph::new(text)
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Confirm")
                .border_style(Style::default().fg(STOPPED_COLOR)),
        );
    frame.render_widget(Clear, popup);
    frame.render_widget(paragraph, popup);
}

fn render_config_form(frame: &mut Frame, form: &ConfigForm) {
    let height = (form.strategies.len() as u16 + 7).min(frame.area().height);
    let popup = centered_rect(frame.area(), 46, height);

    let mut lines = Vec::new();
    let symbol_style = if form.focus == FormFocus::Symbol {
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };
    lines.push(Line::from(vec![
        Span::raw("Symbol: "),
        Span::styled(format!("{}_", form.symbol), symbol_style),
    ]));
    lines.push(Line::from(""));
    lines.push(Line::from("Strategies (space to toggle):"));

    for (i, (name, selected)) in form.strategies.iter().enumerate() {
        let marker = if *selected { "[x]" } else { "[ ]" };
        let style = if form.focus == FormFocus::Strategies && i == form.cursor {
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        lines.push(Line::from(Span::styled(
            format!("{} {}", marker, name),
            style,
        )));
    }

    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "[Tab] Focus  [Enter] Save  [Esc] Cancel",
        Style::default().add_modifier(Modifier::DIM),
    )));

    let paragraph = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Configuration")
            .border_style(Style::default().fg(Color::Cyan)),
    );
    frame.render_widget(Clear, popup);
    frame.render_widget(paragraph, popup);
}

fn centered_rect(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    let left = area.x + (area.width - width) / 2;
    let top = area.y + (area.height - height) / 2;
    Rect::new(left, top, width, height)
}
