use crate::client::AgentClient;
use crate::conversation::{Conversation, ConversationMessage, Sender, TurnOutcome};
use crate::protocol::TokenUsage;
use crate::reducer::{Snapshot, ToolExecution, format_tool_args};
use crossterm::cursor::MoveTo;
use crossterm::event::{self, Event, KeyCode, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, size};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Paragraph, Widget, Wrap};
use ratatui::{Frame, Terminal, TerminalOptions, Viewport};
use std::io;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use unicode_width::UnicodeWidthStr;

type TuiTerminal = Terminal<CrosstermBackend<io::Stdout>>;
type UiResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

const INPUT_HEIGHT: u16 = 3;
const LIVE_HEIGHT: u16 = 10;

// Restores terminal settings even if the loop exits early.
struct TerminalGuard;

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = io::stdout().flush();
    }
}

#[derive(Debug, Clone)]
struct LineSpec {
    text: String,
    style: Style,
}

impl LineSpec {
    fn new(text: impl Into<String>, style: Style) -> Self {
        Self {
            text: text.into(),
            style,
        }
    }
}

fn indented(lines: &mut Vec<LineSpec>, body: &str, style: Style) {
    for line in body.lines() {
        lines.push(LineSpec::new(format!("  {}", line), style));
    }
}

fn truncate(value: &str, max: usize, suffix: &str) -> String {
    match value.char_indices().nth(max) {
        Some((end, _)) => format!("{}{}", &value[..end], suffix),
        None => value.to_string(),
    }
}

fn tool_lines(tools: &[ToolExecution]) -> Vec<LineSpec> {
    let header = Style::default()
        .fg(Color::Green)
        .add_modifier(Modifier::BOLD);
    let body = Style::default().fg(Color::Green);
    let pending = Style::default()
        .fg(Color::Gray)
        .add_modifier(Modifier::ITALIC);

    let mut lines = vec![LineSpec::new(
        format!("Execution details ({})", tools.len()),
        Style::default().fg(Color::DarkGray),
    )];
    for tool in tools {
        lines.push(LineSpec::new(format!("Tool: {}", tool.name), header));
        lines.push(LineSpec::new("Arguments:", header));
        indented(
            &mut lines,
            &truncate(&format_tool_args(&tool.args), 200, "...\n[truncated]"),
            body,
        );
        lines.push(LineSpec::new("Result:", header));
        let result_style = if tool.is_in_progress() {
            pending
        } else {
            Style::default().fg(Color::Cyan)
        };
        indented(
            &mut lines,
            &truncate(&tool.content, 300, "...\n[output truncated]"),
            result_style,
        );
    }
    lines
}

fn message_lines(message: &ConversationMessage) -> Vec<LineSpec> {
    let (label, color) = match message.sender {
        Sender::User => ("You:", Color::Blue),
        Sender::Assistant => ("Assistant:", Color::Yellow),
    };
    let mut lines = vec![LineSpec::new(
        label,
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    )];
    if let Some(tools) = &message.tools {
        lines.extend(tool_lines(tools));
    }
    indented(&mut lines, &message.text, Style::default().fg(color));
    lines
}

fn to_text(lines: Vec<LineSpec>) -> Text<'static> {
    Text::from(
        lines
            .into_iter()
            .map(|spec| Line::from(Span::styled(spec.text, spec.style)))
            .collect::<Vec<_>>(),
    )
}

fn rendered_height(lines: &[LineSpec], width: u16) -> u16 {
    let width = width.max(1) as usize;
    lines
        .iter()
        .map(|line| line.text.chars().count().max(1).div_ceil(width))
        .sum::<usize>() as u16
}

#[derive(Debug)]
pub enum UiEvent {
    Snapshot(Snapshot),
    TurnFinished(TurnOutcome),
}

/// Single-line message input; the cursor counts characters, not bytes.
#[derive(Debug, Default)]
struct InputLine {
    text: String,
    cursor: usize,
}

impl InputLine {
    fn byte_offset(&self) -> usize {
        self.text
            .char_indices()
            .nth(self.cursor)
            .map_or(self.text.len(), |(idx, _)| idx)
    }

    /// Terminal columns occupied by the text left of the cursor.
    fn cursor_column(&self) -> u16 {
        self.text[..self.byte_offset()].width() as u16
    }

    fn insert_char(&mut self, c: char) {
        let at = self.byte_offset();
        self.text.insert(at, c);
        self.cursor += 1;
    }

    fn delete_char(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let at = self.byte_offset();
            self.text.remove(at);
        }
    }

    fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    fn move_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.text.chars().count());
    }

    fn home(&mut self) {
        self.cursor = 0;
    }

    fn end(&mut self) {
        self.cursor = self.text.chars().count();
    }

    fn take(&mut self) -> String {
        self.cursor = 0;
        std::mem::take(&mut self.text)
    }

    fn render(&self) -> Text<'static> {
        if self.text.is_empty() {
            return Text::from(Span::styled(
                "Type your message here...",
                Style::default().fg(Color::DarkGray),
            ));
        }
        Text::from(self.text.clone())
    }
}

pub struct App {
    conversation: Conversation,
    input: InputLine,
    live: Snapshot,
    usage: Option<TokenUsage>,
    should_quit: bool,
    sender: mpsc::Sender<UiEvent>,
    receiver: mpsc::Receiver<UiEvent>,
    client: Arc<AgentClient>,
}

impl App {
    pub fn new(client: AgentClient) -> Self {
        let (sender, receiver) = mpsc::channel(100);

        Self {
            conversation: Conversation::new(client.user_id()),
            input: InputLine::default(),
            live: Snapshot::default(),
            usage: None,
            should_quit: false,
            sender,
            receiver,
            client: Arc::new(client),
        }
    }

    fn draw(&mut self, f: &mut Frame) {
        let [live_area, input_area] =
            Layout::vertical([Constraint::Min(0), Constraint::Length(INPUT_HEIGHT)])
                .areas(f.area());

        if self.conversation.is_busy() {
            let mut lines = Vec::new();
            if !self.live.tools.is_empty() {
                lines.extend(tool_lines(&self.live.tools));
            }
            indented(&mut lines, &self.live.answer, Style::default().fg(Color::Yellow));
            // Keep the tail visible while the answer grows.
            let height = rendered_height(&lines, live_area.width);
            let scroll = height.saturating_sub(live_area.height);
            f.render_widget(
                Paragraph::new(to_text(lines))
                    .wrap(Wrap { trim: false })
                    .scroll((scroll, 0)),
                live_area,
            );
        }

        let title = match (self.conversation.is_busy(), self.usage) {
            (true, _) => " Message (Enter to send, Esc to quit) [Thinking...] ".to_string(),
            (false, Some(usage)) => format!(
                " Message (Enter to send, Esc to quit) [last turn: {} tokens] ",
                usage.total_tokens
            ),
            (false, None) => " Message (Enter to send, Esc to quit) ".to_string(),
        };

        let input_paragraph = Paragraph::new(self.input.render()).block(
            Block::default()
                .borders(Borders::ALL)
                .title(title)
                .border_style(Style::default().fg(Color::DarkGray)),
        );
        f.render_widget(input_paragraph, input_area);

        let x = (input_area.x + 1 + self.input.cursor_column())
            .min(input_area.x + input_area.width.saturating_sub(2));
        f.set_cursor_position((x, input_area.y + 1));
    }

    fn print_message(
        terminal: &mut TuiTerminal,
        message: &ConversationMessage,
    ) -> UiResult<()> {
        let width = terminal.size()?.width;
        let lines = message_lines(message);
        let height = rendered_height(&lines, width).saturating_add(1);
        let mut text = to_text(lines);
        text.extend(Text::raw("\n"));
        // Insert above the inline viewport so the log stays in scrollback.
        terminal.insert_before(height, |buf| {
            Paragraph::new(text)
                .wrap(Wrap { trim: false })
                .render(buf.area, buf);
        })?;
        Ok(())
    }

    fn send(&mut self, terminal: &mut TuiTerminal) -> UiResult<()> {
        if self.conversation.is_busy() || self.input.text.trim().is_empty() {
            return Ok(());
        }
        let text = self.input.take();
        let request = match self.conversation.begin_turn(&text) {
            Ok(request) => request,
            Err(err) => {
                tracing::debug!(error = %err, "message not sent");
                return Ok(());
            }
        };
        if let Some(message) = self.conversation.messages().last() {
            Self::print_message(terminal, message)?;
        }
        self.live = Snapshot::default();

        let client = Arc::clone(&self.client);
        let sender = self.sender.clone();
        tokio::spawn(async move {
            let outcome = client
                .run_turn(&request, |snapshot| {
                    let sender = sender.clone();
                    async move {
                        let _ = sender.send(UiEvent::Snapshot(snapshot)).await;
                    }
                })
                .await;
            let _ = sender.send(UiEvent::TurnFinished(outcome)).await;
        });
        Ok(())
    }

    fn handle_events(&mut self, terminal: &mut TuiTerminal) -> UiResult<bool> {
        while let Ok(event) = self.receiver.try_recv() {
            match event {
                UiEvent::Snapshot(snapshot) => self.live = snapshot,
                UiEvent::TurnFinished(outcome) => {
                    if let TurnOutcome::Completed(output) = &outcome {
                        self.usage = output.usage;
                    }
                    self.live = Snapshot::default();
                    let message = self.conversation.finish_turn(outcome)?.clone();
                    Self::print_message(terminal, &message)?;
                }
            }
        }

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c')
                {
                    self.should_quit = true;
                    return Ok(false);
                }

                match key.code {
                    KeyCode::Esc => {
                        self.should_quit = true;
                        return Ok(false);
                    }
                    KeyCode::Enter => self.send(terminal)?,
                    KeyCode::Char(c) => self.input.insert_char(c),
                    KeyCode::Backspace => self.input.delete_char(),
                    KeyCode::Left => self.input.move_left(),
                    KeyCode::Right => self.input.move_right(),
                    KeyCode::Home => self.input.home(),
                    KeyCode::End => self.input.end(),
                    _ => {}
                }
            }
        }

        Ok(true)
    }
}

pub fn run_tui(client: AgentClient) -> UiResult<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    let (_, rows) = size()?;
    if rows > 0 {
        // Push existing screen content into scrollback without clearing it.
        for _ in 0..rows {
            writeln!(stdout)?;
        }
        stdout.flush()?;
    }
    execute!(stdout, MoveTo(0, 0))?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::with_options(
        backend,
        TerminalOptions {
            viewport: Viewport::Inline(LIVE_HEIGHT + INPUT_HEIGHT),
        },
    )?;

    let mut app = App::new(client);
    let _guard = TerminalGuard;

    for message in app.conversation.messages() {
        App::print_message(&mut terminal, message)?;
    }
    terminal.draw(|f| app.draw(f))?;

    while !app.should_quit {
        if !app.handle_events(&mut terminal)? {
            break;
        }

        terminal.draw(|f| app.draw(f))?;

        std::thread::sleep(Duration::from_millis(10));
    }

    Ok(())
}
