use chrono::{DateTime, Local};
use llama_buddy::{Role, TaskKey};
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
    Frame,
};

use crate::app::{App, InputMode};

/// Parse a line of text and convert **bold**, *italic* and `code` markdown to styled spans
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut chars = text.chars().peekable();
    let mut current_text = String::new();

    while let Some(c) = chars.next() {
        let (marker, style) = match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                ("**", Style::default().add_modifier(Modifier::BOLD))
            }
            // A lone `*` followed by a space is arithmetic or a bullet, not emphasis
            '*' if chars.peek().map_or(true, |next| next.is_whitespace()) => {
                current_text.push(c);
                continue;
            }
            '*' => ("*", Style::default().add_modifier(Modifier::ITALIC)),
            '`' => ("`", Style::default().fg(Color::Green)),
            _ => {
                current_text.push(c);
                continue;
            }
        };

        // Collect until the matching closing marker
        let mut inner = String::new();
        let mut found_close = false;
        while let Some(c) = chars.next() {
            let closes = match marker {
                "**" => c == '*' && chars.peek() == Some(&'*'),
                "*" => c == '*',
                _ => c == '`',
            };
            if closes {
                if marker == "**" {
                    chars.next();
                }
                found_close = true;
                break;
            }
            inner.push(c);
        }

        if found_close && inner.is_empty() {
            // Empty pair such as `` or ****, shown as typed
            current_text.push_str(marker);
            current_text.push_str(marker);
        } else if found_close {
            if !current_text.is_empty() {
                spans.push(Span::raw(std::mem::take(&mut current_text)));
            }
            spans.push(Span::styled(inner, style));
        } else {
            // No closing marker, treat as literal
            current_text.push_str(marker);
            current_text.push_str(&inner);
        }
    }

    if !current_text.is_empty() {
        spans.push(Span::raw(current_text));
    }

    if spans.is_empty() {
        Line::default()
    } else {
        Line::from(spans)
    }
}

/// Reply lines styled as a code block; fence lines are dropped.
fn code_block_lines(content: &str) -> Vec<Line<'static>> {
    let code_style = Style::default().fg(Color::Green).bg(Color::Black);
    content
        .lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .map(|line| Line::from(Span::styled(format!(" {line}"), code_style)))
        .collect()
}

fn format_last_request(at: Option<DateTime<Local>>) -> String {
    at.map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "None yet".to_string())
}

/// Human name of the service behind `endpoint`.
fn provider_label(endpoint: &str) -> String {
    if endpoint.contains("openrouter.ai") {
        return "OpenRouter".to_string();
    }
    reqwest::Url::parse(endpoint)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
        .unwrap_or_else(|| endpoint.to_string())
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    let [chat_column, sidebar_area] =
        Layout::horizontal([Constraint::Percentage(70), Constraint::Percentage(30)])
            .areas(body_area);

    render_header(app, frame, header_area);
    render_chat_column(app, frame, chat_column);
    render_sidebar(app, frame, sidebar_area);
    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(" Llama Buddy ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(
            format!(
                " Powered by {} via {} ",
                app.model(),
                provider_label(app.dispatcher.endpoint())
            ),
            Style::default().fg(Color::White),
        ),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_chat_column(app: &mut App, frame: &mut Frame, area: Rect) {
    let notice_height = if app.notice.is_some() { 3 } else { 0 };
    let [chat_area, notice_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(notice_height),
        Constraint::Length(3),
    ])
    .areas(area);

    render_chat(app, frame, chat_area);
    if notice_height > 0 {
        render_notice(app, frame, notice_area);
    }
    render_input(app, frame, input_area);
}

/// The chat pane's content: every transcript entry plus the pending-reply status.
fn chat_lines(app: &App) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::new();
    for msg in app.transcript.all() {
        let (label, color) = match msg.role() {
            Role::User => ("You:", Color::Cyan),
            Role::Assistant => ("AI:", Color::Yellow),
        };
        lines.push(Line::from(vec![
            Span::styled(label, Style::default().fg(color).add_modifier(Modifier::BOLD)),
            Span::styled(
                format!(" {}", msg.timestamp().format("%H:%M")),
                Style::default().fg(Color::DarkGray),
            ),
        ]));
        match msg.role() {
            Role::User => {
                lines.extend(msg.content().lines().map(|line| Line::from(line.to_string())));
            }
            Role::Assistant if app.task == TaskKey::Code => {
                lines.extend(code_block_lines(msg.content()));
            }
            Role::Assistant => {
                lines.extend(msg.content().lines().map(parse_markdown_line));
            }
        }
        lines.push(Line::default());
    }

    if app.query_loading {
        lines.push(Line::from(Span::styled(
            "AI:",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )));
        let status = match app.throttle_remaining() {
            Some(secs) => format!("Waiting for rate limit ({secs}s)"),
            // Animated ellipsis: cycles through ".", "..", "..."
            None => format!("Thinking{}", ".".repeat(app.animation_frame as usize + 1)),
        };
        lines.push(Line::from(Span::styled(
            status,
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }
    lines
}

fn chat_paragraph(app: &App) -> Paragraph<'static> {
    Paragraph::new(Text::from(chat_lines(app))).wrap(Wrap { trim: false })
}

/// Rows the chat content takes once wrapped to `width` columns.
pub fn chat_line_count(app: &App, width: u16) -> u16 {
    let count = chat_paragraph(app).line_count(width);
    u16::try_from(count).unwrap_or(u16::MAX)
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    // Store chat area dimensions for scroll calculations (inner size minus borders)
    app.chat_height = area.height.saturating_sub(2);
    app.chat_width = area.width.saturating_sub(2);

    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(format!(" {} ", app.task.display_name()));

    let chat = chat_paragraph(app)
        .block(chat_block)
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);
}

fn render_notice(app: &App, frame: &mut Frame, area: Rect) {
    let Some(notice) = &app.notice else {
        return;
    };
    let text = Text::from(vec![
        Line::from(Span::styled(
            notice.message.clone(),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(notice.hint, Style::default().fg(Color::Yellow))),
    ]);
    frame.render_widget(Paragraph::new(text).wrap(Wrap { trim: true }), area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let editing = app.input_mode == InputMode::Editing;
    let border_color = if editing { Color::Yellow } else { Color::DarkGray };

    let title = if app.is_busy() {
        " Type your message... (waiting for reply) "
    } else {
        " Type your message... "
    };
    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Horizontal scrolling keeps the cursor inside the box
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.query_cursor;
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = app
        .query_input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(input_block);
    frame.render_widget(input, area);

    if editing {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_sidebar(app: &App, frame: &mut Frame, area: Rect) {
    let task_height = TaskKey::all().len() as u16 + 2;
    if app.show_debug {
        let [tasks_area, usage_area, debug_area] = Layout::vertical([
            Constraint::Length(task_height),
            Constraint::Length(11),
            Constraint::Min(0),
        ])
        .areas(area);
        render_task_selector(app, frame, tasks_area);
        render_usage(app, frame, usage_area);
        render_debug(app, frame, debug_area);
    } else {
        let [tasks_area, usage_area] =
            Layout::vertical([Constraint::Length(task_height), Constraint::Min(0)]).areas(area);
        render_task_selector(app, frame, tasks_area);
        render_usage(app, frame, usage_area);
    }
}

fn render_task_selector(app: &App, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Magenta))
        .title(" Task Type ");

    let items: Vec<ListItem> = TaskKey::all()
        .iter()
        .enumerate()
        .map(|(i, task)| {
            let selected = *task == app.task;
            let marker = if selected { "(*)" } else { "( )" };
            let style = if selected {
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(format!(" {} {} {}", i + 1, marker, task.as_str())).style(style)
        })
        .collect();

    frame.render_widget(List::new(items).block(block), area);
}

fn render_usage(app: &App, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Usage Info ");

    let label = Style::default().add_modifier(Modifier::BOLD);
    let lines = vec![
        Line::from(vec![Span::styled("Model: ", label), Span::raw(app.model().to_string())]),
        Line::from(vec![
            Span::styled("Rate Limit: ", label),
            Span::raw(format!(
                "1 request every {}s",
                app.request_interval().as_secs()
            )),
        ]),
        Line::from(vec![
            Span::styled("Last Request: ", label),
            Span::raw(format_last_request(app.last_request_at)),
        ]),
        Line::default(),
        Line::from(Span::styled("Tips:", label)),
        Line::from("- For code, specify language in your prompt"),
        Line::from("- Keep prompts clear and concise"),
        Line::from("- Free tier has limited requests/hour"),
    ];

    let usage = Paragraph::new(lines).block(block).wrap(Wrap { trim: true });
    frame.render_widget(usage, area);
}

fn render_debug(app: &App, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Debug ");

    let mut lines = Vec::new();
    match &app.last_exchange {
        Some(exchange) => {
            let status = exchange
                .status
                .map(|s| s.to_string())
                .unwrap_or_else(|| "no response".to_string());
            lines.push(Line::from(format!(
                "Status: {} at {}",
                status,
                exchange.at.format("%H:%M:%S")
            )));
            lines.push(Line::from(format!("Response: {}...", exchange.body_preview)));
        }
        None => lines.push(Line::from("No requests yet")),
    }
    lines.push(Line::default());
    lines.push(Line::from(format!("Messages: {}", app.transcript.len())));
    lines.push(Line::from(format!("Task: {}", app.task)));
    lines.push(Line::from(format!(
        "Last request: {}",
        format_last_request(app.last_request_at)
    )));

    let debug = Paragraph::new(lines).block(block).wrap(Wrap { trim: false });
    frame.render_widget(debug, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let (mode_text, mode_style) = match app.input_mode {
        InputMode::Normal => (" NORMAL ", Style::default().bg(Color::Blue).fg(Color::White)),
        InputMode::Editing => (" INSERT ", Style::default().bg(Color::Yellow).fg(Color::Black)),
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let hints: Vec<(&str, &str)> = match app.input_mode {
        InputMode::Editing => vec![
            (" Enter ", " send "),
            (" Tab ", " task "),
            (" Esc ", " stop typing "),
        ],
        InputMode::Normal => vec![
            (" i ", " type "),
            (" 1-4 ", " task "),
            (" j/k ", " scroll "),
            (" d ", if app.show_debug { " hide debug " } else { " debug " }),
            (" q ", " quit "),
        ],
    };

    let footer_content = Line::from(
        vec![
            Span::styled(mode_text, mode_style),
            Span::styled(" ", label_style),
        ]
        .into_iter()
        .chain(hints.into_iter().flat_map(|(key, label)| {
            [Span::styled(key, key_style), Span::styled(label, label_style)]
        }))
        .collect::<Vec<_>>(),
    );

    let footer = Paragraph::new(footer_content).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use llama_buddy::{CompletionClient, Config, Dispatcher, Message};
    use ratatui::{backend::TestBackend, Terminal};
    use std::time::Duration;

    fn app() -> App {
        let client = CompletionClient::new(&Config::default(), "test-key").unwrap();
        App::new(Dispatcher::new(client, Duration::from_secs(10)), TaskKey::Chat)
    }

    fn screen_text(app: &mut App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(120, 30)).unwrap();
        terminal.draw(|frame| render(app, frame)).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    fn span_text(line: &Line) -> Vec<String> {
        line.spans.iter().map(|s| s.content.to_string()).collect()
    }

    #[test]
    fn markdown_bold_italic_and_code() {
        let line = parse_markdown_line("a **b** *c* `d`");
        assert_eq!(span_text(&line), vec!["a ", "b", " ", "c", " ", "d"]);
        assert!(line.spans[1].style.add_modifier.contains(Modifier::BOLD));
        assert!(line.spans[3].style.add_modifier.contains(Modifier::ITALIC));
    }

    #[test]
    fn unclosed_markers_stay_literal() {
        let line = parse_markdown_line("2 * 3 and **open");
        assert_eq!(span_text(&line).concat(), "2 * 3 and **open");
    }

    #[test]
    fn empty_marker_pairs_stay_literal() {
        let line = parse_markdown_line("a `` b ****");
        assert_eq!(span_text(&line).concat(), "a `` b ****");
        assert_eq!(line.spans.len(), 1);
    }

    #[test]
    fn code_block_drops_fences() {
        let lines = code_block_lines("```python\nprint('hi')\n```");
        assert_eq!(lines.len(), 1);
        assert_eq!(span_text(&lines[0]), vec![" print('hi')"]);
    }

    #[test]
    fn last_request_placeholder() {
        assert_eq!(format_last_request(None), "None yet");
    }

    #[test]
    fn provider_label_for_openrouter_and_others() {
        assert_eq!(
            provider_label("https://openrouter.ai/api/v1/chat/completions"),
            "OpenRouter"
        );
        assert_eq!(
            provider_label("http://localhost:1234/v1/chat/completions"),
            "localhost"
        );
    }

    #[test]
    fn renders_greeting_and_usage_info() {
        let mut app = app();
        let text = screen_text(&mut app);
        assert!(text.contains("How can I help you today?"));
        assert!(text.contains("meta-llama/llama-3-70b-instruct"));
        assert!(text.contains("1 request every 10s"));
        assert!(text.contains("None yet"));
    }

    #[test]
    fn renders_notice_and_debug_panel() {
        let mut app = app();
        app.transcript.append(Message::user("hello"));
        app.notice = Some(crate::app::Notice {
            message: "API Error: rate limited".to_string(),
            hint: crate::app::FAILURE_HINT,
        });
        app.show_debug = true;
        let text = screen_text(&mut app);
        assert!(text.contains("API Error: rate limited"));
        assert!(text.contains("No requests yet"));
        assert!(text.contains("Messages: 2"));
    }
}
