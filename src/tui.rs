use anyhow::Result;
use crossterm::{
    ExecutableCommand,
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
};
use std::collections::HashMap;
use std::io::stdout;

use crate::api::ChallengeApi;
use crate::flows::{
    ApplyCard, ApplyState, EMPTY_LISTING_TEXT, ListingFlow, ListingState, LoginFlow, LoginState,
    Nav,
};
use crate::session::SessionStore;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Screen {
    Login,
    Jobs,
}

/// Blocking work queued by a key press; performed after the next draw so
/// the busy frame is on screen while the call runs.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Pending {
    None,
    Login,
    Fetch,
    Apply,
}

struct AppState {
    screen: Screen,
    email_input: String,
    login: LoginFlow,
    listing: ListingFlow,
    cards: HashMap<i64, ApplyCard>,
    selected: usize,
    scroll_offset: u16,
    editing_repo: bool,
    pending: Pending,
}

impl AppState {
    fn new() -> Self {
        Self {
            screen: Screen::Login,
            email_input: String::new(),
            login: LoginFlow::new(),
            listing: ListingFlow::new(),
            cards: HashMap::new(),
            selected: 0,
            scroll_offset: 0,
            editing_repo: false,
            pending: Pending::None,
        }
    }

    fn loaded_jobs(&self) -> &[crate::models::Job] {
        match self.listing.state() {
            ListingState::Loaded(jobs) => jobs,
            _ => &[],
        }
    }

    fn selected_job_id(&self) -> Option<i64> {
        self.loaded_jobs().get(self.selected).map(|job| job.id)
    }

    fn selected_card(&mut self) -> Option<&mut ApplyCard> {
        let job_id = self.selected_job_id()?;
        Some(self.cards.entry(job_id).or_insert_with(|| ApplyCard::new(job_id)))
    }

    /// One card per job id, created on load and kept across cursor moves
    /// so card state stays independent.
    fn ensure_cards(&mut self) {
        let job_ids: Vec<i64> = self.loaded_jobs().iter().map(|job| job.id).collect();
        for job_id in job_ids {
            self.cards
                .entry(job_id)
                .or_insert_with(|| ApplyCard::new(job_id));
        }
        if self.selected >= self.loaded_jobs().len() {
            self.selected = 0;
        }
    }

    fn enter_jobs(&mut self, store: &dyn SessionStore) {
        self.screen = Screen::Jobs;
        self.cards.clear();
        self.selected = 0;
        self.scroll_offset = 0;
        self.editing_repo = false;
        self.listing = ListingFlow::new();
        match self.listing.mount(store) {
            Nav::ToLogin => self.enter_login(),
            _ => self.pending = Pending::Fetch,
        }
    }

    fn enter_login(&mut self) {
        self.screen = Screen::Login;
        self.login = LoginFlow::new();
        self.email_input.clear();
        self.editing_repo = false;
        self.pending = Pending::None;
    }

    fn next(&mut self) {
        let count = self.loaded_jobs().len();
        if count > 0 && self.selected < count - 1 {
            self.selected += 1;
            self.scroll_offset = 0;
        }
    }

    fn prev(&mut self) {
        if self.selected > 0 {
            self.selected -= 1;
            self.scroll_offset = 0;
        }
    }

    fn scroll_down(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_add(3);
    }

    fn scroll_up(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_sub(3);
    }
}

pub fn run(api: &dyn ChallengeApi, store: &mut dyn SessionStore) -> Result<()> {
    let mut state = AppState::new();
    // An existing session skips the login screen.
    state.enter_jobs(store);

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = run_loop(&mut terminal, &mut state, api, store);

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    state: &mut AppState,
    api: &dyn ChallengeApi,
    store: &mut dyn SessionStore,
) -> Result<()> {
    let mut list_state = ListState::default();
    list_state.select(Some(0));

    loop {
        terminal.draw(|frame| draw(frame, state, &mut list_state))?;

        if state.pending != Pending::None {
            perform_pending(state, api, store);
            continue;
        }

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            let quit = match state.screen {
                Screen::Login => handle_login_key(state, key.code),
                Screen::Jobs => handle_jobs_key(state, store, key.code),
            };
            if quit {
                break;
            }
            list_state.select(Some(state.selected));
        }
    }
    Ok(())
}

fn perform_pending(state: &mut AppState, api: &dyn ChallengeApi, store: &mut dyn SessionStore) {
    let pending = state.pending;
    state.pending = Pending::None;
    match pending {
        Pending::None => {}
        Pending::Login => {
            let email = state.email_input.clone();
            if state.login.submit(api, store, &email) == Nav::ToJobs {
                state.enter_jobs(store);
            }
        }
        Pending::Fetch => {
            state.listing.fetch(api);
            state.ensure_cards();
        }
        Pending::Apply => {
            let Some(candidate_id) = state.listing.identity().map(|id| id.candidate_id) else {
                return;
            };
            if let Some(card) = state.selected_card() {
                card.submit(api, candidate_id);
            }
        }
    }
}

fn handle_login_key(state: &mut AppState, code: KeyCode) -> bool {
    match code {
        KeyCode::Esc => return true,
        KeyCode::Enter => {
            let email = state.email_input.clone();
            if state.login.begin_submit(&email) {
                state.pending = Pending::Login;
            }
        }
        KeyCode::Backspace => {
            state.email_input.pop();
        }
        KeyCode::Char(c) => state.email_input.push(c),
        _ => {}
    }
    false
}

fn handle_jobs_key(state: &mut AppState, store: &mut dyn SessionStore, code: KeyCode) -> bool {
    if state.editing_repo {
        match code {
            KeyCode::Esc => state.editing_repo = false,
            KeyCode::Enter => {
                state.editing_repo = false;
                if state.selected_card().is_some_and(|card| card.begin_submit()) {
                    state.pending = Pending::Apply;
                }
            }
            KeyCode::Backspace => {
                if let Some(card) = state.selected_card() {
                    card.pop_input();
                }
            }
            KeyCode::Char(c) => {
                if let Some(card) = state.selected_card() {
                    card.push_input(c);
                }
            }
            _ => {}
        }
        return false;
    }

    match code {
        KeyCode::Char('q') | KeyCode::Esc => return true,
        KeyCode::Down | KeyCode::Char('j') => state.next(),
        KeyCode::Up | KeyCode::Char('k') => state.prev(),
        KeyCode::Char('J') | KeyCode::PageDown => state.scroll_down(),
        KeyCode::Char('K') | KeyCode::PageUp => state.scroll_up(),
        KeyCode::Char('e') => {
            if state.selected_card().is_some_and(|card| !card.form_hidden()) {
                state.editing_repo = true;
            }
        }
        KeyCode::Enter => {
            if state.selected_card().is_some_and(|card| card.begin_submit()) {
                state.pending = Pending::Apply;
            }
        }
        KeyCode::Char('r') => {
            state.listing = ListingFlow::new();
            match state.listing.mount(store) {
                Nav::ToLogin => state.enter_login(),
                _ => {
                    state.cards.clear();
                    state.pending = Pending::Fetch;
                }
            }
        }
        KeyCode::Char('s') => {
            state.listing.sign_out(store);
            state.enter_login();
        }
        _ => {}
    }
    false
}

fn draw(frame: &mut Frame, state: &AppState, list_state: &mut ListState) {
    match state.screen {
        Screen::Login => draw_login(frame, state),
        Screen::Jobs => draw_jobs(frame, state, list_state),
    }
}

fn draw_login(frame: &mut Frame, state: &AppState) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(30),
            Constraint::Length(8),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(frame.area());
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(20),
            Constraint::Percentage(60),
            Constraint::Percentage(20),
        ])
        .split(rows[1]);

    let mut lines = vec![
        Line::from("Enter your email to view open positions"),
        Line::from(""),
        Line::from(format!("Email: {}_", state.email_input)),
        Line::from(""),
    ];
    match state.login.state() {
        LoginState::Submitting => {
            lines.push(Line::from(Span::styled(
                "Authenticating...",
                Style::default().fg(Color::Yellow),
            )));
        }
        LoginState::Failed(message) => {
            lines.push(Line::from(Span::styled(
                format!("Error: {message}"),
                Style::default().fg(Color::Red),
            )));
        }
        _ => {}
    }

    let form = Paragraph::new(Text::from(lines))
        .block(Block::default().borders(Borders::ALL).title(" Candidate Login "))
        .wrap(Wrap { trim: false });
    frame.render_widget(form, columns[1]);

    let help = Paragraph::new(" type your email  Enter:continue  Esc:quit")
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(help, rows[3]);
}

fn draw_jobs(frame: &mut Frame, state: &AppState, list_state: &mut ListState) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
        .split(frame.area());

    let email = state
        .listing
        .identity()
        .map(|identity| identity.email.clone())
        .unwrap_or_default();

    // Left panel: active job list
    let items: Vec<ListItem> = state
        .loaded_jobs()
        .iter()
        .map(|job| {
            let marker = match state.cards.get(&job.id).map(ApplyCard::state) {
                Some(ApplyState::Success(_)) => "+",
                Some(ApplyState::Error(_)) => "x",
                Some(ApplyState::Submitting) => "*",
                _ => " ",
            };
            let title = crate::truncate(&job.title, 35);
            ListItem::new(format!("{} #{:<4} {} | {}", marker, job.id, title, job.department))
        })
        .collect();

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(format!(
            " Open Positions ({}) - {} ",
            state.loaded_jobs().len(),
            email
        )))
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, chunks[0], list_state);

    // Right panel: detail and apply card
    let detail = build_detail(state);
    let detail_widget = Paragraph::new(detail)
        .block(Block::default().borders(Borders::ALL).title(" Detail "))
        .wrap(Wrap { trim: false })
        .scroll((state.scroll_offset, 0));

    frame.render_widget(detail_widget, chunks[1]);

    // Footer help
    let help_area = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(frame.area());

    let help = if state.editing_repo {
        " type repo URL  Enter:submit  Esc:done"
    } else {
        " j/k:navigate  J/K:scroll  e:edit repo URL  Enter:apply  r:reload  s:sign out  q:quit"
    };
    let help = Paragraph::new(help).style(Style::default().fg(Color::DarkGray));
    frame.render_widget(help, help_area[1]);
}

fn build_detail<'a>(state: &'a AppState) -> Text<'a> {
    match state.listing.state() {
        ListingState::Loading | ListingState::CheckingIdentity => {
            return Text::from(Line::from(Span::styled(
                "Loading jobs...",
                Style::default().fg(Color::Yellow),
            )));
        }
        ListingState::Failed(message) => {
            return Text::from(vec![
                Line::from(Span::styled(
                    "Error Loading Jobs",
                    Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                )),
                Line::from(Span::styled(message.as_str(), Style::default().fg(Color::Red))),
                Line::from(""),
                Line::from(Span::styled(
                    "Press r to try again.",
                    Style::default().fg(Color::DarkGray),
                )),
            ]);
        }
        ListingState::Redirecting => return Text::raw(""),
        ListingState::Loaded(jobs) if jobs.is_empty() => {
            return Text::from(Line::from(EMPTY_LISTING_TEXT));
        }
        ListingState::Loaded(_) => {}
    }

    let Some(job) = state.loaded_jobs().get(state.selected) else {
        return Text::raw("No job selected");
    };

    let mut lines: Vec<Line> = Vec::new();

    lines.push(Line::from(Span::styled(
        &job.title,
        Style::default().add_modifier(Modifier::BOLD),
    )));
    if !job.department.is_empty() {
        lines.push(Line::from(format!("Department: {}", job.department)));
    }
    lines.push(Line::from(""));

    if !job.description.is_empty() {
        for line in textwrap::fill(&job.description, 70).lines() {
            lines.push(Line::from(line.to_string()));
        }
        lines.push(Line::from(""));
    }

    if !job.requirements.is_empty() {
        lines.push(Line::from(Span::styled(
            "Requirements",
            Style::default().add_modifier(Modifier::BOLD),
        )));
        for requirement in &job.requirements {
            lines.push(Line::from(format!("  - {requirement}")));
        }
        lines.push(Line::from(""));
    }

    lines.push(Line::from(Span::styled(
        "Apply",
        Style::default().add_modifier(Modifier::BOLD),
    )));

    let card = state.cards.get(&job.id);
    match card.map(ApplyCard::state) {
        Some(ApplyState::Success(message)) => {
            lines.push(Line::from(Span::styled(
                format!("+ {message}"),
                Style::default().fg(Color::Green),
            )));
        }
        Some(ApplyState::Submitting) => {
            lines.push(Line::from(Span::styled(
                "Submitting...",
                Style::default().fg(Color::Yellow),
            )));
        }
        other => {
            if let Some(ApplyState::Error(message)) = other {
                lines.push(Line::from(Span::styled(
                    format!("x {message}"),
                    Style::default().fg(Color::Red),
                )));
            }
            let repo_url = card.map(ApplyCard::repo_url).unwrap_or_default();
            let cursor = if state.editing_repo { "_" } else { "" };
            lines.push(Line::from(format!("Repo URL: {repo_url}{cursor}")));
            if repo_url.is_empty() && !state.editing_repo {
                lines.push(Line::from(Span::styled(
                    "(press e, then paste https://github.com/...)",
                    Style::default().fg(Color::DarkGray),
                )));
            }
        }
    }

    Text::from(lines)
}
