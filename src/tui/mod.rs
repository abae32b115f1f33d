//! Ratatui-based terminal UI.
//!
//! The TUI lists the scenarios of a data directory and renders the logged
//! error series of the selected one, with its rolling average, the `log10`
//! floor, and the stopping pace.

use std::io;
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph},
};

use crate::app::pipeline::{ScenarioAnalysis, ScenarioDir, StoppingRequest, analyse_scenario, discover_scenarios};
use crate::cli::ViewArgs;
use crate::domain::WindowAlignment;
use crate::error::AppError;

mod plotters_chart;

use plotters_chart::ErrorPlottersChart;

/// Start the TUI.
pub fn run(args: ViewArgs) -> Result<(), AppError> {
    let request = crate::app::stopping_request_from_args(&args.data, false)?;
    let scenarios = discover_scenarios(&request.data_dir, request.model_filter.as_deref())?;
    if scenarios.is_empty() {
        return Err(AppError::new(
            3,
            format!("No scenario directories under '{}'.", request.data_dir.display()),
        ));
    }

    let _guard = TerminalGuard::new()?;

    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)
        .map_err(|e| AppError::new(4, format!("Failed to initialize terminal: {e}")))?;

    let mut app = App::new(request, scenarios);
    app.event_loop(&mut terminal)
}

/// Ensures the terminal is restored (raw mode, alternate screen) on exit.
struct TerminalGuard;

impl TerminalGuard {
    fn new() -> Result<Self, AppError> {
        enable_raw_mode().map_err(|e| AppError::new(4, format!("Failed to enable raw mode: {e}")))?;
        if let Err(e) = execute!(io::stdout(), EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(AppError::new(4, format!("Failed to enter alternate screen: {e}")));
        }
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
    }
}

struct App {
    request: StoppingRequest,
    scenarios: Vec<ScenarioDir>,
    selected: usize,
    analysis: Option<ScenarioAnalysis>,
    status: String,
}

impl App {
    fn new(request: StoppingRequest, scenarios: Vec<ScenarioDir>) -> Self {
        let mut app = Self {
            request,
            scenarios,
            selected: 0,
            analysis: None,
            status: String::new(),
        };
        app.reload();
        app
    }

    fn event_loop<B: ratatui::backend::Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<(), AppError> {
        let mut needs_redraw = true;
        loop {
            if needs_redraw {
                terminal
                    .draw(|f| self.draw(f))
                    .map_err(|e| AppError::new(4, format!("Terminal draw error: {e}")))?;
                needs_redraw = false;
            }

            if !event::poll(Duration::from_millis(100))
                .map_err(|e| AppError::new(4, format!("Event poll error: {e}")))?
            {
                continue;
            }

            match event::read().map_err(|e| AppError::new(4, format!("Event read error: {e}")))? {
                Event::Key(key) => {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if self.handle_key(key.code) {
                        break;
                    }
                    needs_redraw = true;
                }
                Event::Resize(_, _) => {
                    needs_redraw = true;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Returns `true` to quit.
    fn handle_key(&mut self, code: KeyCode) -> bool {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Up => {
                if self.selected > 0 {
                    self.selected -= 1;
                    self.reload();
                }
            }
            KeyCode::Down => {
                if self.selected + 1 < self.scenarios.len() {
                    self.selected += 1;
                    self.reload();
                }
            }
            KeyCode::Char('m') => {
                self.request.measure = self.request.measure.next();
                self.reload();
            }
            KeyCode::Char('a') => {
                self.request.config.alignment = match self.request.config.alignment {
                    WindowAlignment::Centered => WindowAlignment::Trailing,
                    WindowAlignment::Trailing => WindowAlignment::Centered,
                };
                self.reload();
            }
            _ => {}
        }
        false
    }

    fn reload(&mut self) {
        let Some(dir) = self.scenarios.get(self.selected) else {
            self.analysis = None;
            return;
        };
        match analyse_scenario(&dir.path, &self.request) {
            Ok(analysis) => {
                self.status = match analysis.terminal_pace {
                    Some(pace) => format!("stops at pace {pace}"),
                    None => "criterion not reached".to_string(),
                };
                self.analysis = Some(analysis);
            }
            Err(err) => {
                self.status = err.to_string();
                self.analysis = None;
            }
        }
    }

    fn draw(&mut self, frame: &mut ratatui::Frame<'_>) {
        let size = frame.area();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(4), Constraint::Min(0), Constraint::Length(3)])
            .split(size);

        self.draw_header(frame, chunks[0]);
        self.draw_body(frame, chunks[1]);
        self.draw_footer(frame, chunks[2]);
    }

    fn draw_header(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let mut lines: Vec<Line> = Vec::new();
        lines.push(Line::from(vec![
            Span::styled("pex", Style::default().fg(Color::Cyan)),
            Span::raw(format!(" - {}", self.request.data_dir.display())),
        ]));

        let alignment = match self.request.config.alignment {
            WindowAlignment::Centered => "centered",
            WindowAlignment::Trailing => "trailing",
        };
        let point = self.analysis.as_ref().and_then(|a| a.decision.point().copied());
        let apd = point
            .and_then(|p| p.apd_error)
            .map(|e| format!("{e:.4}"))
            .unwrap_or_else(|| "-".to_string());
        let log_error = point
            .map(|p| format!("{:.3}", p.log_error))
            .unwrap_or_else(|| "-".to_string());
        lines.push(Line::from(Span::styled(
            format!(
                "measure: {} | windows: {alignment} | log10 err at stop: {log_error} | APD err: {apd}",
                self.request.measure
            ),
            Style::default().fg(Color::Gray),
        )));

        let p = Paragraph::new(Text::from(lines)).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }

    fn draw_body(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(44), Constraint::Min(0)])
            .split(area);

        self.draw_scenarios(frame, chunks[0]);
        self.draw_chart(frame, chunks[1]);
    }

    fn draw_scenarios(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let items: Vec<ListItem> = self
            .scenarios
            .iter()
            .map(|s| ListItem::new(s.id.to_string()))
            .collect();

        let list = List::new(items)
            .block(Block::default().title("Scenarios").borders(Borders::ALL))
            .highlight_style(Style::default().fg(Color::Black).bg(Color::White))
            .highlight_symbol("» ");

        let mut state = ListState::default();
        state.select(Some(self.selected));
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn draw_chart(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let block = Block::default().title("log10(error)").borders(Borders::ALL);
        let inner = block.inner(area);
        frame.render_widget(block, area);
        frame.render_widget(Clear, inner);

        let Some(analysis) = &self.analysis else {
            let msg = Paragraph::new("No data for this scenario.")
                .style(Style::default().fg(Color::Yellow))
                .block(Block::default());
            frame.render_widget(msg, inner);
            return;
        };

        let floor = self.request.config.log_floor;
        let series = chart_series(analysis, floor);

        let (chart_rect, insets) = chart_layout(inner);
        let widget = ErrorPlottersChart {
            logged: &series.logged,
            average: &series.average,
            floor,
            stop: analysis.decision.point().map(|p| p.index as f64),
            x_bounds: series.x_bounds,
            y_bounds: series.y_bounds,
            x_label: "pace",
            y_label: format!("log10 {}", self.request.measure),
            fmt_x: fmt_axis_x,
            fmt_y: fmt_axis_y,
        };

        frame.render_widget(widget, chart_rect);
        if let Some(insets) = insets {
            draw_axis_ticks(frame, inner, chart_rect, insets, series.x_bounds, series.y_bounds);
        }
    }

    fn draw_footer(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let help = "↑/↓ scenario  m measure  a window alignment  q quit";
        let line = Line::from(vec![
            Span::styled(help, Style::default().fg(Color::Gray)),
            Span::raw(" | "),
            Span::styled(&self.status, Style::default().fg(Color::Yellow)),
        ]);
        let p = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }
}

#[derive(Debug, Clone, PartialEq)]
struct ChartSeries {
    logged: Vec<(f64, f64)>,
    average: Vec<Vec<(f64, f64)>>,
    x_bounds: [f64; 2],
    y_bounds: [f64; 2],
}

/// Build chart series for Plotters.
fn chart_series(analysis: &ScenarioAnalysis, floor: f64) -> ChartSeries {
    let stats = &analysis.stats;
    let logged: Vec<(f64, f64)> = stats
        .logged
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_finite())
        .map(|(i, &v)| (i as f64, v))
        .collect();

    let mut average = Vec::new();
    let mut run = Vec::new();
    for (i, &v) in stats.average.iter().enumerate() {
        if v.is_finite() {
            run.push((i as f64, v));
        } else if !run.is_empty() {
            average.push(std::mem::take(&mut run));
        }
    }
    if !run.is_empty() {
        average.push(run);
    }

    let x_max = stats.logged.len().saturating_sub(1) as f64;
    let x_bounds = if x_max > 0.0 { [0.0, x_max] } else { [0.0, 1.0] };

    let (mut y_min, mut y_max) = (f64::INFINITY, f64::NEG_INFINITY);
    for y in logged
        .iter()
        .chain(average.iter().flatten())
        .map(|&(_, y)| y)
        .chain(std::iter::once(floor).filter(|f| f.is_finite()))
    {
        y_min = y_min.min(y);
        y_max = y_max.max(y);
    }
    if !y_min.is_finite() || !y_max.is_finite() || y_max <= y_min {
        y_min = -1.0;
        y_max = 0.0;
    }
    let pad = ((y_max - y_min).abs() * 0.05).max(1e-12);

    ChartSeries {
        logged,
        average,
        x_bounds,
        y_bounds: [y_min - pad, y_max + pad],
    }
}

fn fmt_axis_x(v: f64) -> String {
    format!("{v:.0}")
}

fn fmt_axis_y(v: f64) -> String {
    format!("{v:.1}")
}

#[derive(Debug, Clone, Copy)]
struct AxisInsets {
    left: u16,
    right: u16,
    top: u16,
    bottom: u16,
}

fn chart_layout(inner: Rect) -> (Rect, Option<AxisInsets>) {
    let insets = AxisInsets {
        left: 8,
        right: 2,
        top: 1,
        bottom: 2,
    };

    if inner.width <= insets.left + insets.right + 10 || inner.height <= insets.top + insets.bottom + 5 {
        return (inner, None);
    }

    let rect = Rect {
        x: inner.x + insets.left,
        y: inner.y + insets.top,
        width: inner.width - insets.left - insets.right,
        height: inner.height - insets.top - insets.bottom,
    };

    (rect, Some(insets))
}

fn draw_axis_ticks(
    frame: &mut ratatui::Frame<'_>,
    inner: Rect,
    chart: Rect,
    insets: AxisInsets,
    x_bounds: [f64; 2],
    y_bounds: [f64; 2],
) {
    let ticks = 5usize;
    let style = Style::default().fg(Color::Gray);

    for i in 0..ticks {
        let u = i as f64 / (ticks as f64 - 1.0);
        let label = fmt_axis_x(x_bounds[0] + u * (x_bounds[1] - x_bounds[0]));
        let x = chart.x + ((chart.width - 1) as f64 * u).round() as u16;
        let start = x.saturating_sub((label.len() / 2) as u16);
        let y = chart.y + chart.height;
        if y >= inner.y + inner.height - 1 {
            continue;
        }
        let width = label.len() as u16;
        frame.render_widget(Paragraph::new(label).style(style), Rect { x: start, y, width, height: 1 });
    }

    for i in 0..ticks {
        let u = i as f64 / (ticks as f64 - 1.0);
        let label = fmt_axis_y(y_bounds[0] + u * (y_bounds[1] - y_bounds[0]));
        let y = chart.y + (chart.height - 1) - ((chart.height - 1) as f64 * u).round() as u16;
        let x = inner.x + insets.left.saturating_sub(1);
        let start = x.saturating_sub(label.len() as u16);
        if start < inner.x {
            continue;
        }
        let width = label.len() as u16;
        frame.render_widget(Paragraph::new(label).style(style), Rect { x: start, y, width, height: 1 });
    }

    let x_label = Paragraph::new("pace")
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::Gray));
    let x_rect = Rect {
        x: chart.x,
        y: chart.y + chart.height + 1,
        width: chart.width,
        height: 1,
    };
    if x_rect.y < inner.y + inner.height {
        frame.render_widget(x_label, x_rect);
    }

    let y_label = Paragraph::new("log10").style(Style::default().fg(Color::Gray).add_modifier(Modifier::BOLD));
    let y_rect = Rect {
        x: inner.x,
        y: inner.y,
        width: insets.left.saturating_sub(1),
        height: 1,
    };
    frame.render_widget(y_label, y_rect);
}
