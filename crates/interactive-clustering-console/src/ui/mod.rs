mod worker;

use std::io::{self, Stdout};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::{Duration, Instant};

use crossterm::cursor::{Hide, Show};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, BorderType, Borders, Clear, Gauge, Paragraph, Wrap};

use crate::actions::{ButtonId, ButtonStatus, ProgressBarId, ProgressStatus};
use crate::client::{CommandClient, StatusClient};
use crate::commands::{PipelineCommand, begin_command, finish_command};
use crate::error::{Error, Result};
use crate::scheduler::{PollingScheduler, SchedulerState};
use crate::sink::ActionSink;
use crate::state::Family;
use crate::view::DashboardView;

use worker::{BackendWorker, Reply, Request};

fn command_for_key(c: char) -> Option<PipelineCommand> {
    match c {
        'm' => Some(PipelineCommand::Modelization),
        's' => Some(PipelineCommand::Sampling),
        'c' => Some(PipelineCommand::Clustering),
        'n' => Some(PipelineCommand::NextIteration),
        _ => None,
    }
}

fn key_for_button(button: ButtonId) -> Option<char> {
    match button {
        ButtonId::RunInitializeModelization | ButtonId::RunModelizationUpdate => Some('m'),
        ButtonId::RunConstraintsSampling => Some('s'),
        ButtonId::RunConstrainedClustering => Some('c'),
        ButtonId::CreateNextIteration => Some('n'),
        ButtonId::GoToAnnotations | ButtonId::ApproveAnnotations => None,
    }
}

fn details_hint(family: Family) -> &'static str {
    match family {
        Family::Initialization => "Preprocess and vectorize the texts before the first iteration.",
        Family::Sampling => "Select the pairs of texts to annotate during this iteration.",
        Family::Annotation => {
            "Annotate the sampled pairs in the web interface, then approve when conflicts are fixed."
        }
        Family::Clustering => "Group the texts while respecting the annotated constraints.",
        Family::IterationEnd => "Review the clustering, then start a new iteration.",
    }
}

struct App {
    project_id: String,
    worker: BackendWorker,
    view: DashboardView,
    scheduler: PollingScheduler,
    command_in_flight: Option<PipelineCommand>,
}

impl App {
    fn new<B>(project_id: String, backend: B, delay: Duration) -> Result<Self>
    where
        B: StatusClient + CommandClient + Send + 'static,
    {
        let alive = Arc::new(AtomicBool::new(true));
        Ok(Self {
            project_id,
            worker: BackendWorker::spawn(backend)?,
            view: DashboardView::new(),
            scheduler: PollingScheduler::new(delay, alive),
            command_in_flight: None,
        })
    }

    fn submit(&mut self, request: Request) -> bool {
        match self.worker.submit(request) {
            Ok(()) => true,
            Err(e) => {
                self.view.show_error(&e.to_string());
                false
            }
        }
    }

    fn restart(&mut self) {
        match self.scheduler.begin(&self.project_id) {
            Ok(request) => {
                self.submit(Request::Fetch(request));
            }
            Err(e) => self.view.show_error(&e.to_string()),
        }
    }

    fn tick(&mut self, now: Instant) {
        for reply in self.worker.drain() {
            self.handle_reply(reply, now);
        }
        if let Some(request) = self.scheduler.take_due(now) {
            self.submit(Request::Fetch(request));
        }
    }

    // Failures land in the view through `show_error`; the returned errors are
    // only logged.
    fn handle_reply(&mut self, reply: Reply, now: Instant) {
        match reply {
            Reply::Status { request, outcome } => {
                if let Err(e) = self
                    .scheduler
                    .complete(&request, now, outcome, &mut self.view)
                {
                    tracing::debug!(error = %e, "poll failed");
                }
            }
            Reply::Command { command, outcome } => {
                self.command_in_flight = None;
                if let Err(e) = finish_command(&mut self.view, &self.project_id, command, outcome) {
                    tracing::debug!(%command, error = %e, "command failed");
                }
                // The view was reloaded: poll again to rebuild it.
                self.restart();
            }
        }
    }

    fn trigger(&mut self, command: PipelineCommand) {
        if self.command_in_flight.is_some() || !command.is_enabled_in(&self.view) {
            tracing::debug!(%command, "command not available right now");
            return;
        }
        begin_command(&mut self.view, command);
        let request = Request::Command {
            project_id: self.project_id.clone(),
            command,
        };
        if self.submit(request) {
            self.command_in_flight = Some(command);
        }
    }

    fn handle_key(&mut self, code: KeyCode, mods: KeyModifiers) -> Result<bool> {
        if mods.contains(KeyModifiers::CONTROL) && matches!(code, KeyCode::Char('c')) {
            return Ok(true);
        }
        if self.view.last_error().is_some() {
            match code {
                KeyCode::Char('q') => return Ok(true),
                KeyCode::Esc | KeyCode::Enter => self.view.clear_error(),
                _ => {}
            }
            return Ok(false);
        }
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return Ok(true),
            KeyCode::Char('r') => self.restart(),
            KeyCode::Char(c) => {
                if let Some(command) = command_for_key(c) {
                    self.trigger(command);
                }
            }
            _ => {}
        }
        Ok(false)
    }

    fn draw(&self, f: &mut ratatui::Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(0),
                Constraint::Length(2),
            ])
            .split(f.area());

        self.draw_header(f, chunks[0]);
        self.draw_steps(f, chunks[1]);
        self.draw_footer(f, chunks[2]);
        self.draw_modal(f);
    }

    fn draw_header(&self, f: &mut ratatui::Frame, area: Rect) {
        let report = self.scheduler.last_report();
        let polling = match self.scheduler.state() {
            SchedulerState::Polling if self.scheduler.is_fetching() => {
                Span::styled("fetching", Style::default().fg(Color::Yellow))
            }
            SchedulerState::Polling => Span::styled("polling", Style::default().fg(Color::Yellow)),
            SchedulerState::Idle => Span::styled("idle", Style::default().fg(Color::Gray)),
        };
        let mut first = vec![
            Span::styled(
                "Interactive Clustering",
                Style::default().fg(Color::Cyan),
            ),
            Span::raw("  "),
            Span::styled(
                format!("project {}", self.project_id),
                Style::default().fg(Color::LightBlue),
            ),
        ];
        let mut second = Vec::new();
        match report {
            Some(r) => {
                first.push(Span::raw("  "));
                first.push(Span::raw(format!("iteration {}", r.snapshot.iteration_id)));
                first.push(Span::raw("  "));
                first.push(Span::styled(
                    r.snapshot.state.clone(),
                    Style::default().add_modifier(Modifier::BOLD),
                ));
                if let Ok(state) = r.snapshot.project_state() {
                    second.push(Span::styled(
                        state.details().to_string(),
                        Style::default().fg(Color::Gray),
                    ));
                    second.push(Span::raw("  "));
                }
                second.push(Span::styled(
                    format!("last poll {}", r.at.format("%H:%M:%S")),
                    Style::default().fg(Color::Yellow),
                ));
            }
            None => second.push(Span::styled(
                "waiting for first status...",
                Style::default().fg(Color::Gray),
            )),
        }
        second.push(Span::raw("  "));
        second.push(polling);
        if let Some(command) = self.command_in_flight {
            second.push(Span::raw("  "));
            second.push(Span::styled(
                format!("sending {command}..."),
                Style::default().fg(Color::Magenta),
            ));
        }

        let p = Paragraph::new(Text::from(vec![Line::from(first), Line::from(second)])).block(
            Block::default()
                .borders(Borders::BOTTOM)
                .border_type(BorderType::Plain),
        );
        f.render_widget(p, area);
    }

    fn step_height(&self, family: Family) -> u16 {
        let mut lines = 1;
        if self.view.details_open(family) {
            lines += 1;
        }
        if ProgressBarId::for_family(family)
            .and_then(|bar| self.view.visible_progress(bar))
            .is_some()
        {
            lines += 1;
        }
        lines + 2
    }

    fn draw_steps(&self, f: &mut ratatui::Frame, area: Rect) {
        let rows = self.view.visible_rows();
        if rows.is_empty() {
            let p = Paragraph::new("Nothing to show yet.")
                .style(Style::default().fg(Color::Gray))
                .block(Block::default().borders(Borders::ALL).title("Steps"));
            f.render_widget(p, area);
            return;
        }

        let mut constraints: Vec<Constraint> = rows
            .iter()
            .map(|family| Constraint::Length(self.step_height(*family)))
            .collect();
        constraints.push(Constraint::Min(0));
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints(constraints)
            .split(area);

        for (family, chunk) in rows.iter().zip(chunks.iter()) {
            self.draw_step(f, *family, *chunk);
        }
    }

    fn draw_step(&self, f: &mut ratatui::Frame, family: Family, area: Rect) {
        let block = Block::default()
            .title(family.label())
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded);
        let inner = block.inner(area);
        f.render_widget(block, area);

        let open = self.view.details_open(family);
        let progress = ProgressBarId::for_family(family).and_then(|bar| self.view.visible_progress(bar));
        let mut constraints = vec![Constraint::Length(1)];
        if open {
            constraints.push(Constraint::Length(1));
        }
        if progress.is_some() {
            constraints.push(Constraint::Length(1));
        }
        let lines = Layout::default()
            .direction(Direction::Vertical)
            .constraints(constraints)
            .split(inner);

        let mut spans = Vec::new();
        for button in ButtonId::for_family(family) {
            if !spans.is_empty() {
                spans.push(Span::raw("  "));
            }
            spans.push(self.button_span(*button));
        }
        f.render_widget(Paragraph::new(Line::from(spans)), lines[0]);

        let mut next = 1;
        if open {
            let hint = Paragraph::new(details_hint(family))
                .style(Style::default().fg(Color::Gray))
                .wrap(Wrap { trim: true });
            f.render_widget(hint, lines[next]);
            next += 1;
        }
        if let Some(p) = progress {
            let color = match p.status {
                ProgressStatus::Running => Color::Cyan,
                ProgressStatus::Error => Color::Red,
            };
            let g = Gauge::default()
                .gauge_style(Style::default().fg(color))
                .percent(u16::from(p.percent.min(100)))
                .label(format!("{}%  {}", p.percent, p.detail));
            f.render_widget(g, lines[next]);
        }
    }

    fn button_span(&self, button: ButtonId) -> Span<'static> {
        let (status, disabled) = self.view.button(button);
        let color = match status {
            ButtonStatus::Todo => Color::White,
            ButtonStatus::Wip => Color::Yellow,
            ButtonStatus::Error => Color::Red,
            ButtonStatus::Done => Color::Green,
        };
        let mut style = Style::default().fg(color);
        if disabled {
            style = style.add_modifier(Modifier::DIM);
        }
        let key = key_for_button(button)
            .filter(|_| self.view.button_enabled(button))
            .map(|k| format!("[{k}] "))
            .unwrap_or_default();
        Span::styled(
            format!("{key}{} ({})", button.label(), status.as_str()),
            style,
        )
    }

    fn draw_footer(&self, f: &mut ratatui::Frame, area: Rect) {
        let hint = "[m] Modelization  [s] Sampling  [c] Clustering  [n] Next iteration  [r] Reload  [q] Quit";
        let p = Paragraph::new(hint)
            .style(Style::default().fg(Color::Gray))
            .block(Block::default().borders(Borders::TOP));
        f.render_widget(p, area);
    }

    fn draw_modal(&self, f: &mut ratatui::Frame) {
        let Some(message) = self.view.last_error() else {
            return;
        };
        let area = centered_rect(70, 30, f.area());
        f.render_widget(Clear, area);
        let mut text: Vec<Line> = message
            .lines()
            .map(|l| Line::from(Span::styled(l.to_string(), Style::default().fg(Color::Red))))
            .collect();
        text.push(Line::from(""));
        text.push(Line::from(
            "[Esc/Enter] Close  [r] after closing to reload  [q] Quit",
        ));
        let p = Paragraph::new(Text::from(text))
            .style(Style::default().fg(Color::White).bg(Color::DarkGray))
            .wrap(Wrap { trim: false })
            .block(
                Block::default()
                    .title("Error")
                    .borders(Borders::ALL)
                    .border_type(BorderType::Rounded),
            );
        f.render_widget(p, area);
    }
}

/// Interactive dashboard for one project. Blocks until the user quits.
///
/// Backend requests run on a worker thread; a slow backend never freezes the
/// screen or the quit key.
pub fn run_tui<B>(project_id: &str, backend: B, delay: Duration) -> Result<()>
where
    B: StatusClient + CommandClient + Send + 'static,
{
    let mut app = App::new(project_id.to_string(), backend, delay)?;

    let mut stdout = io::stdout();
    enable_raw_mode().map_err(|e| Error::Terminal(e.to_string()))?;
    execute!(stdout, EnterAlternateScreen, Hide).map_err(|e| Error::Terminal(e.to_string()))?;
    let backend_term = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend_term).map_err(|e| Error::Terminal(e.to_string()))?;
    terminal
        .clear()
        .map_err(|e| Error::Terminal(format!("tui clear failed: {e}")))?;

    let result = run_loop(&mut terminal, &mut app);
    app.scheduler.teardown();

    disable_raw_mode().ok();
    execute!(terminal.backend_mut(), LeaveAlternateScreen, Show).ok();

    result
}

fn run_loop(terminal: &mut Terminal<CrosstermBackend<Stdout>>, app: &mut App) -> Result<()> {
    app.restart();

    let tick = Duration::from_millis(100);
    loop {
        terminal
            .draw(|f| app.draw(f))
            .map_err(|e| Error::Terminal(format!("draw failed: {e}")))?;

        if event::poll(tick).map_err(|e| Error::Terminal(e.to_string()))? {
            if let Event::Key(k) = event::read().map_err(|e| Error::Terminal(e.to_string()))? {
                if k.kind == KeyEventKind::Press && app.handle_key(k.code, k.modifiers)? {
                    break;
                }
            }
        }

        app.tick(Instant::now());
    }
    Ok(())
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);
    let vertical = popup_layout[1];
    let popup_layout = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical);
    popup_layout[1]
}
