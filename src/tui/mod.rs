//! Ratatui-based terminal UI.
//!
//! One row per registered model: a checkbox for idle models, a progress gauge
//! for fitting ones. Job control goes through [`Session`]; the loop below only
//! polls the session and the terminal.

use std::io;
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Gauge, Paragraph},
    Terminal,
};

use crate::app::Session;
use crate::domain::{ModelStatus, Outcome};
use crate::error::AppError;
use crate::report::{format_job_report, format_percent, format_start_report};

/// Start the TUI.
pub fn run(session: Session) -> Result<(), AppError> {
    let _guard = TerminalGuard::new()?;

    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)
        .map_err(|e| AppError::new(4, format!("Failed to initialize terminal: {e}")))?;

    let mut app = App::new(session);
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
    session: Session,
    cursor: usize,
    status: String,
    /// Set once `q` was pressed while jobs were running.
    quitting: bool,
}

impl App {
    fn new(session: Session) -> Self {
        Self {
            session,
            cursor: 0,
            status: "Ready.".to_string(),
            quitting: false,
        }
    }

    fn event_loop<B: ratatui::backend::Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<(), AppError> {
        let mut needs_redraw = true;
        loop {
            for event in self.session.poll_events() {
                self.status = format_job_report(&event.report);
                needs_redraw = true;
            }
            let busy = self.session.can_abort();
            if self.quitting && !busy {
                break;
            }

            if needs_redraw || busy {
                terminal
                    .draw(|f| self.draw(f))
                    .map_err(|e| AppError::new(4, format!("Terminal draw error: {e}")))?;
                needs_redraw = false;
            }

            if !event::poll(Duration::from_millis(100))
                .map_err(|e| AppError::new(4, format!("Event poll error: {e}")))? {
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

    /// Returns `true` when the loop should exit right away.
    fn handle_key(&mut self, code: KeyCode) -> bool {
        let models = self.session.coordinator().list_models();
        match code {
            KeyCode::Char('q') | KeyCode::Esc => {
                if !self.session.can_abort() {
                    return true;
                }
                // Let running jobs flush their partial tables first.
                self.session.abort_all();
                self.quitting = true;
                self.status = "Aborting running fits before exit...".to_string();
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.cursor = self.cursor.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.cursor + 1 < models.len() {
                    self.cursor += 1;
                }
            }
            KeyCode::Char(' ') => {
                if let Some(&id) = models.get(self.cursor) {
                    if self.session.coordinator().is_active(id) {
                        self.status = format!("{id} is fitting.");
                    } else {
                        self.session.toggle(id);
                    }
                }
            }
            KeyCode::Char('a') => self.session.select_all(),
            KeyCode::Char('n') => self.session.select_none(),
            KeyCode::Char('r') => {
                let resume = !self.session.resume_computation();
                self.session.set_resume_computation(resume);
                self.status = if resume {
                    "Resume computation: on".to_string()
                } else {
                    "Resume computation: off, existing tables will be overwritten".to_string()
                };
            }
            KeyCode::Char('g') | KeyCode::Enter => {
                if self.quitting {
                    return false;
                }
                if !self.session.can_start() {
                    self.status = "Nothing selected.".to_string();
                    return false;
                }
                let report = self.session.start_selected();
                let notes = format_start_report(&report);
                self.status = if notes.trim().is_empty() {
                    format!("Started {} fit(s).", report.started.len())
                } else {
                    notes.lines().collect::<Vec<_>>().join("; ")
                };
            }
            KeyCode::Char('x') => {
                if self.session.can_abort() {
                    self.session.abort_all();
                    self.status = "Abort requested.".to_string();
                }
            }
            _ => {}
        }
        false
    }

    fn draw(&mut self, frame: &mut ratatui::Frame<'_>) {
        let size = frame.area();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(4), Constraint::Min(0), Constraint::Length(3)])
            .split(size);

        let rows = self.session.rows();
        self.draw_header(frame, chunks[0], &rows);
        self.draw_models(frame, chunks[1], &rows);
        self.draw_footer(frame, chunks[2]);
    }

    fn draw_header(&self, frame: &mut ratatui::Frame<'_>, area: Rect, rows: &[ModelStatus]) {
        let store = self.session.coordinator().store();
        let fitting = rows.iter().filter(|r| r.is_active).count();
        let selected = rows.iter().filter(|r| r.needs_fitting && !r.is_active).count();

        let mut lines: Vec<Line> = Vec::new();
        lines.push(Line::from(vec![
            Span::styled("ltcgen", Style::default().fg(Color::Cyan)),
            Span::raw(format!(
                " - {} BRDF model(s) | output: {}",
                rows.len(),
                store.dir().display()
            )),
        ]));

        let resume = if self.session.resume_computation() {
            Span::styled("resume: on", Style::default().fg(Color::Gray))
        } else {
            Span::styled(
                "resume: off (existing values will be overwritten)",
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            )
        };
        lines.push(Line::from(vec![
            Span::styled(
                format!("selected: {selected} | fitting: {fitting} | "),
                Style::default().fg(Color::Gray),
            ),
            resume,
        ]));

        let p = Paragraph::new(Text::from(lines)).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }

    fn draw_models(&self, frame: &mut ratatui::Frame<'_>, area: Rect, rows: &[ModelStatus]) {
        let block = Block::default().title("Models").borders(Borders::ALL);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        for (i, row) in rows.iter().enumerate() {
            let y = inner.y + i as u16;
            if y >= inner.y + inner.height {
                break;
            }
            let line = Rect {
                x: inner.x,
                y,
                width: inner.width,
                height: 1,
            };
            let cols = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Length(22), Constraint::Min(0)])
                .split(line);

            let marker = if i == self.cursor { "» " } else { "  " };
            let check = if row.is_active {
                "   "
            } else if row.needs_fitting {
                "[x]"
            } else {
                "[ ]"
            };
            let mut label_style = Style::default();
            if i == self.cursor {
                label_style = label_style.fg(Color::Black).bg(Color::White);
            }
            frame.render_widget(
                Paragraph::new(format!("{marker}{check} {}", row.label)).style(label_style),
                cols[0],
            );

            if row.is_active {
                let gauge = Gauge::default()
                    .gauge_style(Style::default().fg(Color::Green).bg(Color::DarkGray))
                    .ratio(row.progress.clamp(0.0, 1.0) as f64)
                    .label(format_percent(row.progress));
                frame.render_widget(gauge, cols[1]);
            } else {
                frame.render_widget(last_run_line(row), cols[1]);
            }
        }
    }

    fn draw_footer(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let help = "↑/↓ move  space toggle  a all  n none  r resume  g generate  x abort  q quit";
        let line = Line::from(vec![
            Span::styled(help, Style::default().fg(Color::Gray)),
            Span::raw(" | "),
            Span::styled(&self.status, Style::default().fg(Color::Yellow)),
        ]);
        let p = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }
}

fn last_run_line(row: &ModelStatus) -> Paragraph<'static> {
    let (text, color) = match row.last_outcome {
        None => ("not fitted yet".to_string(), Color::Gray),
        Some(Outcome::Succeeded) => ("succeeded".to_string(), Color::Green),
        Some(Outcome::SucceededWithErrors) => (
            format!("succeeded with {} warning(s)", row.warnings),
            Color::Yellow,
        ),
        Some(outcome) => (outcome.display_name().to_string(), Color::Red),
    };
    Paragraph::new(text).style(Style::default().fg(color))
}
