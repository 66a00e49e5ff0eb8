use crate::app::AppSnapshot;
use color_eyre::eyre::Result;
use crossterm::{
    event::{
        Event,
        EventStream,
        KeyCode,
        KeyEvent,
        KeyEventKind,
        KeyModifiers,
    },
    terminal::{
        disable_raw_mode,
        enable_raw_mode,
    },
};
use futures::StreamExt;
use lottery_client::{
    controller::{
        Activity,
        ControllerView,
        Phase,
    },
    floaters::FloaterField,
    format::{
        format_eth,
        short_address,
    },
    wallets::WalletDescriptor,
};
use ratatui::{
    prelude::*,
    widgets::*,
};
use std::{
    io::stdout,
    time::Duration,
};

const MAX_AMOUNT_LEN: usize = 32;
const TAGLINE: &str = "\"Try your luck, where every block could be a jackpot!\"";

#[derive(Debug)]
pub enum UserEvent {
    Quit,
    Redraw,
    Refresh,
    OpenWalletPicker,
    UnlockWallet {
        wallet: WalletDescriptor,
        password: String,
    },
    Disconnect,
    OpenEntry,
    SubmitEntry(String),
    Claim,
}

pub struct UiState {
    mode: Mode,
    terminal: Option<Terminal<CrosstermBackend<std::io::Stdout>>>,
    wallets: Vec<WalletDescriptor>,
    floaters: FloaterField,
}

impl Default for UiState {
    fn default() -> Self {
        UiState {
            mode: Mode::Normal,
            terminal: None,
            wallets: Vec::new(),
            floaters: FloaterField::random(),
        }
    }
}

impl UiState {
    pub fn set_wallets(&mut self, wallets: Vec<WalletDescriptor>) {
        self.wallets = wallets;
        if let Mode::WalletPicker(picker) = &mut self.mode {
            picker.idx = picker.idx.min(self.wallets.len().saturating_sub(1));
        }
    }

    pub fn tick(&mut self, delta: Duration) {
        self.floaters.tick(delta);
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
enum Mode {
    #[default]
    Normal,
    Entry(EntryState),
    WalletPicker(PickerState),
    Password(PasswordState),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct EntryState {
    input: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct PickerState {
    idx: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct PasswordState {
    wallet: WalletDescriptor,
    input: String,
}

pub type InputEventReceiver = EventStream;

pub fn input_event_stream() -> InputEventReceiver {
    EventStream::new()
}

pub async fn next_raw_event(events: &mut InputEventReceiver) -> Result<Event> {
    match events.next().await {
        Some(event) => Ok(event?),
        None => Err(color_eyre::eyre::eyre!("terminal input stream closed")),
    }
}

pub fn terminal_enter(state: &mut UiState) -> Result<()> {
    enable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), crossterm::terminal::EnterAlternateScreen)?;
    // Create a single persistent Terminal to preserve buffers across draws
    let backend = CrosstermBackend::new(stdout());
    let terminal = Terminal::new(backend)?;
    state.terminal = Some(terminal);
    Ok(())
}

pub fn terminal_exit() -> Result<()> {
    disable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), crossterm::terminal::LeaveAlternateScreen)?;
    Ok(())
}

pub fn draw(state: &mut UiState, snap: &AppSnapshot) -> Result<()> {
    if let Some(mut term) = state.terminal.take() {
        let res = term.draw(|f| ui(f, state, snap)).map(|_| ());
        state.terminal = Some(term);
        res?;
    }
    Ok(())
}

/// Translate a terminal event into an intent, updating modal state on the way.
pub fn interpret_event(
    state: &mut UiState,
    view: &ControllerView,
    event: Event,
) -> Option<UserEvent> {
    match event {
        Event::Key(key) if key.kind == KeyEventKind::Press => {
            interpret_key(state, view, key)
        }
        Event::Resize(_, _) => Some(UserEvent::Redraw),
        _ => None,
    }
}

fn interpret_key(
    state: &mut UiState,
    view: &ControllerView,
    key: KeyEvent,
) -> Option<UserEvent> {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Some(UserEvent::Quit);
    }
    match &mut state.mode {
        Mode::Entry(entry) => match key.code {
            KeyCode::Esc => {
                state.mode = Mode::Normal;
                Some(UserEvent::Redraw)
            }
            KeyCode::Enter => {
                let amount = std::mem::take(&mut entry.input);
                state.mode = Mode::Normal;
                Some(UserEvent::SubmitEntry(amount))
            }
            KeyCode::Backspace => {
                entry.input.pop();
                Some(UserEvent::Redraw)
            }
            KeyCode::Char(c)
                if (c.is_ascii_digit() || c == '.')
                    && entry.input.len() < MAX_AMOUNT_LEN =>
            {
                entry.input.push(c);
                Some(UserEvent::Redraw)
            }
            _ => None,
        },
        Mode::WalletPicker(picker) => match key.code {
            KeyCode::Esc => {
                state.mode = Mode::Normal;
                Some(UserEvent::Redraw)
            }
            KeyCode::Up | KeyCode::Char('k') => {
                picker.idx = picker.idx.saturating_sub(1);
                Some(UserEvent::Redraw)
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if picker.idx + 1 < state.wallets.len() {
                    picker.idx += 1;
                }
                Some(UserEvent::Redraw)
            }
            KeyCode::Enter => {
                let wallet = state.wallets.get(picker.idx)?.clone();
                state.mode = Mode::Password(PasswordState {
                    wallet,
                    input: String::new(),
                });
                Some(UserEvent::Redraw)
            }
            _ => None,
        },
        Mode::Password(prompt) => match key.code {
            KeyCode::Esc => {
                state.mode = Mode::Normal;
                Some(UserEvent::Redraw)
            }
            KeyCode::Enter => {
                let wallet = prompt.wallet.clone();
                let password = std::mem::take(&mut prompt.input);
                state.mode = Mode::Normal;
                Some(UserEvent::UnlockWallet { wallet, password })
            }
            KeyCode::Backspace => {
                prompt.input.pop();
                Some(UserEvent::Redraw)
            }
            KeyCode::Char(c) => {
                prompt.input.push(c);
                Some(UserEvent::Redraw)
            }
            _ => None,
        },
        Mode::Normal => match key.code {
            KeyCode::Char('q') | KeyCode::Esc => Some(UserEvent::Quit),
            KeyCode::Char('r') => Some(UserEvent::Refresh),
            KeyCode::Char('w') if view.account.is_none() => {
                state.mode = Mode::WalletPicker(PickerState::default());
                Some(UserEvent::OpenWalletPicker)
            }
            KeyCode::Char('d') if view.account.is_some() => Some(UserEvent::Disconnect),
            KeyCode::Char('e') => {
                state.mode = Mode::Entry(EntryState::default());
                Some(UserEvent::OpenEntry)
            }
            // claiming is only offered to the recorded winner
            KeyCode::Char('c') if view.is_winner() => Some(UserEvent::Claim),
            _ => None,
        },
    }
}

/// Status line text and colour for the current phase.
pub fn status_line(view: &ControllerView) -> (String, Color) {
    match &view.phase {
        Phase::Idle => (String::from("Ready"), Color::Green),
        Phase::Loading(activity) => {
            let waiting = view
                .pending_tx
                .as_ref()
                .map(|tx| format!(" (waiting for {})", hash_preview(&tx.hash.to_string())));
            let text = match activity {
                Activity::Refreshing => String::from("Fetching contract data..."),
                Activity::Entering => format!(
                    "Entering the lottery...{}",
                    waiting.unwrap_or_default()
                ),
                Activity::Claiming => {
                    format!("Claiming prize...{}", waiting.unwrap_or_default())
                }
                Activity::Connecting => String::from("Connecting wallet..."),
            };
            (text, Color::Yellow)
        }
        Phase::Succeeded { message, .. } => (message.clone(), Color::Green),
        Phase::Failed { error, .. } => (error.to_string(), Color::Red),
    }
}

fn hash_preview(hash: &str) -> String {
    let preview_len = hash.len().min(16);
    let mut preview = hash[..preview_len].to_string();
    if hash.len() > preview_len {
        preview.push_str("...");
    }
    preview
}

fn ui(f: &mut Frame, state: &UiState, snap: &AppSnapshot) {
    // Clear the whole frame to avoid leftover fragments
    f.render_widget(Clear, f.area());
    f.render_widget(&state.floaters, f.area());

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5), // title, tagline, contract
            Constraint::Min(9),    // wallet/entry + participants
            Constraint::Length(3), // prize
            Constraint::Length(5), // winner + claim
            Constraint::Length(5), // status/errors
            Constraint::Length(3), // help
        ])
        .split(f.area());

    draw_header(f, chunks[0], snap);
    draw_middle(f, chunks[1], snap);
    draw_prize(f, chunks[2], snap);
    draw_winner(f, chunks[3], snap);
    draw_status(f, chunks[4], snap);
    draw_help(f, chunks[5], snap);
    draw_modals(f, state);
}

fn draw_header(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let lines = vec![
        Line::from(TAGLINE).style(Style::default().fg(Color::Cyan).italic()),
        Line::from(format!("📜 Contract: {}", snap.lottery.to_checksum(None))),
        Line::from(snap.endpoint.clone()).style(Style::default().fg(Color::DarkGray)),
    ];
    let title = Span::styled(
        format!(" 🎲 Lottery {} ", snap.network),
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
    );
    let header = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(header, area);
}

fn draw_middle(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);
    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(3),
        ])
        .split(columns[0]);

    let view = &snap.view;
    let wallet_text = match view.account {
        Some(account) => Line::from(format!("🔗 Connected {}", account.to_checksum(None))),
        None => Line::styled(
            "Connect wallet to see your address (w)",
            Style::default().fg(Color::DarkGray),
        ),
    };
    f.render_widget(
        Paragraph::new(wallet_text)
            .block(Block::default().borders(Borders::ALL).title("Wallet")),
        left[0],
    );

    let entering = view.phase == Phase::Loading(Activity::Entering);
    let entry_text = if entering {
        Line::styled("🎟️ Loading...", Style::default().fg(Color::Yellow))
    } else {
        Line::from(format!(
            "🎟️ Participate: press e and enter at least {} ETH",
            format_eth(view.min_entry)
        ))
    };
    f.render_widget(
        Paragraph::new(entry_text)
            .block(Block::default().borders(Borders::ALL).title("Entry")),
        left[1],
    );

    let info = match &view.snapshot {
        Some(snapshot) => vec![
            Line::from(format!(
                "Entrance fee: {} ETH",
                format_eth(snapshot.entrance_fee)
            )),
            Line::from(format!("State: {}", snapshot.status)),
        ],
        None => vec![Line::styled(
            "Loading contract data...",
            Style::default().fg(Color::DarkGray),
        )],
    };
    f.render_widget(
        Paragraph::new(info).block(Block::default().borders(Borders::ALL).title("Lottery")),
        left[2],
    );

    let participants: Vec<ListItem> = match &view.snapshot {
        Some(snapshot) if !snapshot.participants.is_empty() => snapshot
            .participants
            .iter()
            .map(|participant| {
                let mut text = short_address(participant);
                if view.account == Some(*participant) {
                    text.push_str(" (you)");
                }
                ListItem::new(text).style(Style::default().fg(Color::Cyan))
            })
            .collect(),
        _ => vec![
            ListItem::new("No participants yet")
                .style(Style::default().fg(Color::DarkGray).italic()),
        ],
    };
    let count = view
        .snapshot
        .as_ref()
        .map(|s| s.participants.len())
        .unwrap_or_default();
    let list = List::new(participants).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!("📋 Participants ({count})")),
    );
    f.render_widget(list, columns[1]);
}

fn draw_prize(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let prize = snap
        .view
        .snapshot
        .as_ref()
        .and_then(|s| s.winner.as_ref())
        .filter(|winner| !winner.balance.is_zero());
    let line = match prize {
        Some(winner) => Line::from(format!("{} ETH", format_eth(winner.balance))),
        None => Line::styled(
            "Waiting for prize...",
            Style::default().fg(Color::DarkGray).italic(),
        ),
    };
    let widget = Paragraph::new(line)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).title("💰 Total Prize"));
    f.render_widget(widget, area);
}

fn draw_winner(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let view = &snap.view;
    let mut lines = Vec::new();
    match view.snapshot.as_ref().and_then(|s| s.winner.as_ref()) {
        Some(winner) => {
            lines.push(Line::from(format!(
                "Address: {}",
                winner.address.to_checksum(None)
            )));
            lines.push(Line::from(format!("Win: {} ETH", format_eth(winner.balance))));
        }
        None => lines.push(Line::styled(
            "No winner yet",
            Style::default().fg(Color::DarkGray).italic(),
        )),
    }
    if view.is_winner() {
        let claim = if view.phase == Phase::Loading(Activity::Claiming) {
            "🎁 Claiming..."
        } else {
            "🎁 Claim prize (c)"
        };
        lines.push(Line::styled(
            claim,
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ));
    }
    let widget = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).title("🏆 Winner"));
    f.render_widget(widget, area);
}

fn draw_status(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let status_widget = if snap.errors.is_empty() {
        let (text, color) = status_line(&snap.view);
        Paragraph::new(text)
            .wrap(Wrap { trim: false })
            .block(Block::default().borders(Borders::ALL).title("Status"))
            .style(Style::default().fg(color))
    } else {
        let lines: Vec<Line> = snap.errors.iter().map(|e| Line::from(e.clone())).collect();
        Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .block(Block::default().borders(Borders::ALL).title("Errors"))
            .style(Style::default().fg(Color::Red))
    };
    f.render_widget(status_widget, area);
}

fn draw_help(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let mut keys = vec![if snap.view.account.is_some() {
        "d disconnect"
    } else {
        "w connect wallet"
    }];
    keys.push("e enter");
    if snap.view.is_winner() {
        keys.push("c claim");
    }
    keys.extend(["r refresh", "q/Esc quit"]);
    let help = Paragraph::new(keys.join(" | "))
        .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(help, area);
}

fn draw_modals(f: &mut Frame, state: &UiState) {
    match &state.mode {
        Mode::Normal => {}
        Mode::Entry(entry) => {
            let area = centered_rect(50, 20, f.area());
            f.render_widget(Clear, area);
            let lines = vec![
                Line::from("Amount in ETH (e.g. 0.01)"),
                Line::from(format!("> {}▏", entry.input)),
                Line::styled(
                    "Enter submit | Esc cancel",
                    Style::default().fg(Color::DarkGray),
                ),
            ];
            let widget = Paragraph::new(lines).block(
                Block::default()
                    .borders(Borders::ALL)
                    .title("🎟️ Participate"),
            );
            f.render_widget(widget, area);
        }
        Mode::WalletPicker(picker) => {
            let area = centered_rect(50, 40, f.area());
            f.render_widget(Clear, area);
            let items: Vec<ListItem> = if state.wallets.is_empty() {
                vec![ListItem::new("No keystores found")]
            } else {
                state
                    .wallets
                    .iter()
                    .map(|w| ListItem::new(w.name.clone()))
                    .collect()
            };
            let mut list_state = ListState::default();
            if !state.wallets.is_empty() {
                list_state.select(Some(picker.idx));
            }
            let list = List::new(items)
                .block(
                    Block::default()
                        .borders(Borders::ALL)
                        .title("Connect wallet (Enter select | Esc cancel)"),
                )
                .highlight_style(
                    Style::default()
                        .fg(Color::Yellow)
                        .add_modifier(Modifier::BOLD),
                )
                .highlight_symbol("> ");
            f.render_stateful_widget(list, area, &mut list_state);
        }
        Mode::Password(prompt) => {
            let area = centered_rect(50, 20, f.area());
            f.render_widget(Clear, area);
            let masked = "*".repeat(prompt.input.chars().count());
            let lines = vec![
                Line::from(format!("Password for '{}'", prompt.wallet.name)),
                Line::from(format!("> {masked}▏")),
                Line::styled(
                    "Enter unlock | Esc cancel",
                    Style::default().fg(Color::DarkGray),
                ),
            ];
            let widget = Paragraph::new(lines)
                .block(Block::default().borders(Borders::ALL).title("Unlock"));
            f.render_widget(widget, area);
        }
    }
}

fn centered_rect(w_percent: u16, h_percent: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - h_percent) / 2),
            Constraint::Percentage(h_percent),
            Constraint::Percentage((100 - h_percent) / 2),
        ])
        .split(r);

    let vertical = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - w_percent) / 2),
            Constraint::Percentage(w_percent),
            Constraint::Percentage((100 - w_percent) / 2),
        ])
        .split(popup_layout[1]);

    vertical[1]
}
