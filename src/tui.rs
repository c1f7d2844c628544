use crate::config::Config;
use crate::debounce::Debouncer;
use crate::filter::{self, FilterState, StateFilter};
use crate::gh::{self, PullRequest};
use crate::render::{self, Counts, PrRow};
use crate::session::{PrSession, RefreshOutcome};
use anyhow::{Context, Result};
use chrono::Utc;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame, Terminal,
};
use std::io::{self, Stdout};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const EVENT_POLL: Duration = Duration::from_millis(100);

/// What the refresh worker sends back after each refresh
#[derive(Debug)]
pub struct RefreshReport {
    pub outcome: RefreshOutcome,
    pub prs: Vec<PullRequest>,
}

/// Moves the session onto its own thread. Each `bool` sent is one refresh
/// request (`true` forces the network); reports come back in request order.
pub fn spawn_worker(mut session: PrSession) -> (Sender<bool>, Receiver<RefreshReport>) {
    let (request_tx, request_rx) = mpsc::channel::<bool>();
    let (report_tx, report_rx) = mpsc::channel();

    thread::spawn(move || {
        for force in request_rx {
            let outcome = session.refresh(Utc::now(), force);
            debug!(force, authenticated = session.has_token(), "Refresh finished");
            let report = RefreshReport {
                outcome,
                prs: session.prs().to_vec(),
            };
            if report_tx.send(report).is_err() {
                break;
            }
        }
        debug!("Refresh worker stopped");
    });

    (request_tx, report_rx)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputMode {
    Normal,
    Search,
}

pub struct App {
    pub repo_slug: String,
    pub prs: Vec<PullRequest>,
    pub filter: FilterState,
    pub rows: Vec<PrRow>,
    /// Unset until the first successful refresh
    pub counts: Option<Counts>,
    pub error: Option<String>,
    pub list_state: ListState,
    pub input_mode: InputMode,
    pub search_input: String,
    pub debouncer: Debouncer,
    pub status_message: Option<String>,
    pub loading: bool,
    pub should_quit: bool,
    refresh_interval: Duration,
    next_refresh: Instant,
    refresh_request: Option<bool>,
    open_request: Option<u64>,
}

impl App {
    /// The periodic refresh first fires one `refresh_interval` after `now`.
    pub fn new(
        repo_slug: impl Into<String>,
        debounce: Duration,
        refresh_interval: Duration,
        now: Instant,
    ) -> Self {
        Self {
            repo_slug: repo_slug.into(),
            prs: Vec::new(),
            filter: FilterState::default(),
            rows: Vec::new(),
            counts: None,
            error: None,
            list_state: ListState::default(),
            input_mode: InputMode::Normal,
            search_input: String::new(),
            debouncer: Debouncer::new(debounce),
            status_message: None,
            loading: false,
            should_quit: false,
            refresh_interval,
            next_refresh: now + refresh_interval,
            refresh_request: None,
            open_request: None,
        }
    }

    pub fn selected_row(&self) -> Option<&PrRow> {
        if self.error.is_some() {
            return None;
        }
        self.list_state.selected().and_then(|i| self.rows.get(i))
    }

    pub fn pr_url(&self, number: u64) -> Option<&str> {
        self.prs
            .iter()
            .find(|pr| pr.number == number)
            .and_then(PullRequest::html_url)
    }

    pub fn apply_report(&mut self, report: RefreshReport) {
        self.loading = false;
        match report.outcome {
            RefreshOutcome::Failed { message } => {
                // counts keep whatever they showed before
                self.error = Some(message);
                self.rows.clear();
                self.list_state.select(None);
            }
            outcome => {
                debug!(outcome = %outcome.describe(), "Applying refresh");
                self.error = None;
                self.prs = report.prs;
                self.recompute();
            }
        }
    }

    /// Re-run filter and projection over the current collection.
    ///
    /// While a refresh error is shown the list stays empty; the new view
    /// applies once a refresh succeeds.
    pub fn recompute(&mut self) {
        if self.error.is_some() {
            self.rows.clear();
            self.list_state.select(None);
            return;
        }
        let filtered = filter::filter(&self.prs, &self.filter);
        self.counts = Some(Counts::of(&filtered));
        self.rows = render::project(&filtered);
        self.clamp_selection();
    }

    fn clamp_selection(&mut self) {
        if self.rows.is_empty() {
            self.list_state.select(None);
            return;
        }
        let idx = self.list_state.selected().unwrap_or(0);
        self.list_state.select(Some(idx.min(self.rows.len() - 1)));
    }

    pub fn set_filter(&mut self, state: StateFilter) {
        self.filter.state = state;
        self.recompute();
    }

    pub fn request_refresh(&mut self, force: bool) {
        // a forced request is never downgraded by a timer tick
        self.refresh_request = Some(force || self.refresh_request.unwrap_or(false));
    }

    pub fn take_refresh_request(&mut self) -> Option<bool> {
        self.refresh_request.take()
    }

    pub fn take_open_request(&mut self) -> Option<u64> {
        self.open_request.take()
    }

    fn edit_search(&mut self, now: Instant, edit: impl FnOnce(&mut String)) {
        edit(&mut self.search_input);
        self.debouncer.touch(now);
    }

    fn apply_search_now(&mut self) {
        self.debouncer.cancel();
        self.filter.search = self.search_input.clone();
        self.recompute();
    }

    /// Fires the debounced search once its quiet window has passed, and
    /// queues the periodic refresh when its deadline is reached.
    pub fn tick(&mut self, now: Instant) {
        if self.debouncer.poll(now) {
            self.filter.search = self.search_input.clone();
            self.recompute();
        }
        if now >= self.next_refresh {
            self.request_refresh(false);
            self.next_refresh = now + self.refresh_interval;
        }
    }

    fn next(&mut self) {
        if self.rows.is_empty() {
            return;
        }
        let i = match self.list_state.selected() {
            Some(i) => (i + 1) % self.rows.len(),
            None => 0,
        };
        self.list_state.select(Some(i));
    }

    fn previous(&mut self) {
        if self.rows.is_empty() {
            return;
        }
        let i = match self.list_state.selected() {
            Some(0) | None => self.rows.len() - 1,
            Some(i) => i - 1,
        };
        self.list_state.select(Some(i));
    }

    pub fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers, now: Instant) {
        self.status_message = None;
        match self.input_mode {
            InputMode::Normal => self.handle_normal_key(code),
            InputMode::Search => self.handle_search_key(code, modifiers, now),
        }
    }

    fn handle_normal_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('j') | KeyCode::Down => self.next(),
            KeyCode::Char('k') | KeyCode::Up => self.previous(),
            KeyCode::Char('/') => self.input_mode = InputMode::Search,
            KeyCode::Char('f') => self.set_filter(self.filter.state.next()),
            KeyCode::Char('a') => self.set_filter(StateFilter::All),
            KeyCode::Char('o') => self.set_filter(StateFilter::Open),
            KeyCode::Char('c') => self.set_filter(StateFilter::Closed),
            KeyCode::Char('d') => self.set_filter(StateFilter::Draft),
            KeyCode::Char('r') => {
                self.request_refresh(true);
                self.status_message = Some("Refreshing from GitHub...".to_string());
            }
            KeyCode::Enter => self.open_request = self.selected_row().map(|row| row.number),
            KeyCode::Esc if !self.search_input.is_empty() => {
                self.search_input.clear();
                self.apply_search_now();
            }
            _ => {}
        }
    }

    fn handle_search_key(&mut self, code: KeyCode, modifiers: KeyModifiers, now: Instant) {
        match code {
            KeyCode::Esc => self.input_mode = InputMode::Normal,
            KeyCode::Enter => {
                self.input_mode = InputMode::Normal;
                self.apply_search_now();
            }
            KeyCode::Backspace => self.edit_search(now, |s| {
                s.pop();
            }),
            KeyCode::Char('u') if modifiers.contains(KeyModifiers::CONTROL) => {
                self.edit_search(now, String::clear)
            }
            KeyCode::Char(c) => self.edit_search(now, |s| s.push(c)),
            _ => {}
        }
    }
}

fn count_label(counts: Option<Counts>, pick: fn(Counts) -> usize) -> String {
    counts.map_or_else(|| "-".to_string(), |c| pick(c).to_string())
}

pub fn draw(frame: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(frame.area());

    draw_header(frame, app, chunks[0]);
    draw_search(frame, app, chunks[1]);
    draw_list(frame, app, chunks[2]);

    let help = Paragraph::new(
        " j/k: navigate | /: search | f: cycle filter | a/o/c/d: all/open/closed/draft | r: refresh | Enter: open | q: quit",
    )
    .style(Style::default().fg(Color::DarkGray))
    .block(Block::default().borders(Borders::ALL).title(" Help "));
    frame.render_widget(help, chunks[3]);

    if let Some(msg) = &app.status_message {
        let area = frame.area();
        let popup_area = Rect {
            x: area.width / 4,
            y: area.height.saturating_sub(3),
            width: area.width / 2,
            height: 3u16.min(area.height),
        };
        let popup = Paragraph::new(msg.as_str())
            .block(Block::default().borders(Borders::ALL).title("Status"))
            .style(Style::default().fg(Color::Yellow));
        frame.render_widget(Clear, popup_area);
        frame.render_widget(popup, popup_area);
    }
}

fn draw_header(frame: &mut Frame, app: &App, area: Rect) {
    let mut spans = vec![
        Span::styled(
            format!(" {} ", app.repo_slug),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::raw(" "),
        Span::styled(
            format!("{} Open", count_label(app.counts, |c| c.open)),
            Style::default().fg(Color::Green),
        ),
        Span::raw("  "),
        Span::styled(
            format!("{} Closed", count_label(app.counts, |c| c.closed)),
            Style::default().fg(Color::Magenta),
        ),
        Span::raw("  "),
        Span::styled(
            format!("Filters: {}", app.filter.state.label()),
            Style::default().fg(Color::Yellow),
        ),
    ];
    if app.loading {
        spans.push(Span::styled(
            "  loading...",
            Style::default().fg(Color::DarkGray),
        ));
    }

    let header = Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::ALL));
    frame.render_widget(header, area);
}

fn draw_search(frame: &mut Frame, app: &App, area: Rect) {
    let focused = app.input_mode == InputMode::Search;
    let style = if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };
    let title = if app.debouncer.is_pending() {
        " Search (is:open author:name label:bug) ... "
    } else {
        " Search (is:open author:name label:bug) "
    };
    let search = Paragraph::new(app.search_input.as_str()).block(
        Block::default()
            .borders(Borders::ALL)
            .title(title)
            .style(style),
    );
    frame.render_widget(search, area);

    if focused {
        let width = app.search_input.chars().count() as u16;
        let x = (area.x + 1 + width).min(area.x + area.width.saturating_sub(2));
        frame.set_cursor_position((x, area.y + 1));
    }
}

fn draw_list(frame: &mut Frame, app: &mut App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" Pull requests ({}) ", app.rows.len()));

    if let Some(error) = &app.error {
        let para = Paragraph::new(error.as_str())
            .style(Style::default().fg(Color::Red))
            .wrap(Wrap { trim: false })
            .block(block);
        frame.render_widget(para, area);
        return;
    }

    let items: Vec<ListItem> = app
        .rows
        .iter()
        .map(|row| {
            let mut title = vec![Span::styled(
                row.title.as_str(),
                Style::default().add_modifier(Modifier::BOLD),
            )];
            if row.draft {
                title.push(Span::styled(" [draft]", Style::default().fg(Color::DarkGray)));
            }
            let state_color = match row.state {
                gh::PrState::Open => Color::Green,
                gh::PrState::Closed => Color::Magenta,
            };
            let meta = Line::from(vec![
                Span::styled("  ● ", Style::default().fg(state_color)),
                Span::styled(row.meta.as_str(), Style::default().fg(Color::DarkGray)),
            ]);
            ListItem::new(vec![Line::from(title), meta])
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("▶ ");

    frame.render_stateful_widget(list, area, &mut app.list_state);
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    stdout.execute(EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode().context("Failed to disable raw mode")?;
    terminal.backend_mut().execute(LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

pub fn run(cfg: &Config, session: PrSession) -> Result<()> {
    let (requests, reports) = spawn_worker(session);
    let repo_slug = cfg.repo_slug();

    let mut app = App::new(
        repo_slug.clone(),
        cfg.debounce(),
        cfg.refresh_interval(),
        Instant::now(),
    );
    app.request_refresh(false);

    let mut terminal = setup_terminal()?;

    let result = (|| -> Result<()> {
        loop {
            if let Some(force) = app.take_refresh_request() {
                requests.send(force).context("Refresh worker stopped")?;
                app.loading = true;
            }

            terminal.draw(|f| draw(f, &mut app))?;

            let now = Instant::now();
            let timeout = app
                .debouncer
                .remaining(now)
                .map_or(EVENT_POLL, |left| left.min(EVENT_POLL));
            if event::poll(timeout)? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        app.handle_key(key.code, key.modifiers, Instant::now());
                    }
                }
            }

            while let Ok(report) = reports.try_recv() {
                app.apply_report(report);
            }

            app.tick(Instant::now());

            if let Some(number) = app.take_open_request() {
                if let Err(err) = gh::open_pr_in_browser(&repo_slug, number) {
                    warn!(number, error = %err, "Could not open pull request");
                    app.status_message = Some(match app.pr_url(number) {
                        Some(url) => format!("Error: {}. Open {} manually", err, url),
                        None => format!("Error: {}", err),
                    });
                }
            }

            if app.should_quit {
                break Ok(());
            }
        }
    })();

    restore_terminal(&mut terminal)?;
    result
}
