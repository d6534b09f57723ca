use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
};
use chrono::Local;
use hrchat_core::{CandidateSummary, ChatRole};
use crate::app::{App, FocusPane, InputMode};

const SIDEBAR_WIDTH: u16 = 34;

/// Render one line of assistant text: `- ` / `* ` bullets become `•`, and
/// **bold** spans are styled.
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();

    let trimmed = text.trim_start();
    let indent = &text[..text.len() - trimmed.len()];
    let body = match trimmed.strip_prefix("- ").or_else(|| trimmed.strip_prefix("* ")) {
        Some(rest) => {
            spans.push(Span::styled(
                format!("{}• ", indent),
                Style::default().fg(Color::Yellow),
            ));
            rest
        }
        None => text,
    };

    let mut chars = body.chars().peekable();
    let mut current_text = String::new();

    while let Some(c) = chars.next() {
        if c == '*' && chars.peek() == Some(&'*') {
            // Consume the second *
            chars.next();

            // Find closing **
            let mut bold_text = String::new();
            let mut found_close = false;
            while let Some(c) = chars.next() {
                if c == '*' && chars.peek() == Some(&'*') {
                    chars.next();
                    found_close = true;
                    break;
                }
                bold_text.push(c);
            }

            if found_close && !bold_text.is_empty() {
                if !current_text.is_empty() {
                    spans.push(Span::raw(std::mem::take(&mut current_text)));
                }
                spans.push(Span::styled(
                    bold_text,
                    Style::default().add_modifier(Modifier::BOLD),
                ));
            } else {
                // No closing **, treat as literal
                current_text.push_str("**");
                current_text.push_str(&bold_text);
            }
        } else {
            current_text.push(c);
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

/// One-line description of a candidate for the candidates panel
fn candidate_line(candidate: &CandidateSummary) -> Line<'static> {
    let mut details = Vec::new();
    if let Some(years) = candidate.experience_years {
        details.push(format!("{} yrs", years));
    }
    if let Some(availability) = &candidate.availability {
        details.push(availability.clone());
    }
    if !candidate.skills.is_empty() {
        details.push(candidate.skills.join(", "));
    }

    let mut spans = vec![Span::styled(
        candidate.name.clone(),
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
    )];
    if let Some(score) = candidate.match_score {
        spans.push(Span::styled(
            format!(" ({:.2})", score),
            Style::default().fg(Color::DarkGray),
        ));
    }
    if !details.is_empty() {
        spans.push(Span::raw(format!(" · {}", details.join(" · "))));
    }
    Line::from(spans)
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

    let [sessions_area, conversation_area] = Layout::horizontal([
        Constraint::Length(SIDEBAR_WIDTH),
        Constraint::Min(0),
    ])
    .areas(body_area);

    render_header(app, frame, header_area);
    render_sessions(app, frame, sessions_area);
    render_conversation(app, frame, conversation_area);
    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(" HR Assistant ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(
            format!("{} ", app.backend_url),
            Style::default().fg(Color::Gray),
        ),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let (mode_text, mode_style) = match app.input_mode {
        InputMode::Normal => (" CHATS ", Style::default().bg(Color::Blue).fg(Color::White)),
        InputMode::Editing => (" ASK ", Style::default().bg(Color::Yellow).fg(Color::Black)),
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let keys: &[(&str, &str)] = match app.input_mode {
        InputMode::Normal => &[
            ("i", "ask"),
            ("n", "new chat"),
            ("d", "delete"),
            ("j/k", "move"),
            ("Tab", "focus"),
            ("PgUp/PgDn", "scroll"),
            ("q", "quit"),
        ],
        InputMode::Editing => &[("Enter", "send"), ("Esc", "stop typing")],
    };

    let mut spans = vec![
        Span::styled(mode_text, mode_style),
        Span::styled(" ", label_style),
    ];
    for (key, label) in keys {
        spans.push(Span::styled(format!(" {} ", key), key_style));
        spans.push(Span::styled(format!(" {}  ", label), label_style));
    }

    let footer = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

fn render_sessions(app: &mut App, frame: &mut Frame, area: Rect) {
    app.sessions_area = Some(area);

    let focused = app.focus == FocusPane::Sessions;
    let border_color = if focused { Color::Cyan } else { Color::DarkGray };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(format!(" Chats ({}) ", app.store.sessions().len()));

    let title_width = area.width.saturating_sub(4) as usize;
    let pending_id = app.pending.as_ref().map(|p| p.session_id().to_string());

    let items: Vec<ListItem> = app
        .store
        .sessions()
        .iter()
        .map(|session| {
            let mut title: String = session.title.chars().take(title_width).collect();
            if pending_id.as_deref() == Some(session.id.as_str()) {
                title.push_str(" …");
            }
            let created = session
                .created_at
                .with_timezone(&Local)
                .format("%b %d, %H:%M")
                .to_string();

            ListItem::new(vec![
                Line::from(title),
                Line::from(Span::styled(created, Style::default().fg(Color::DarkGray))),
            ])
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, area, &mut app.sessions_state);
}

fn render_conversation(app: &mut App, frame: &mut Frame, area: Rect) {
    let candidates = app.active_candidates();
    let candidates_height = if candidates.is_empty() {
        0
    } else {
        (candidates.len().min(5) + 2) as u16 // +2 for borders
    };

    let [chat_area, candidates_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(candidates_height),
        Constraint::Length(3),
    ])
    .areas(area);

    // Store chat area dimensions for scroll calculations (inner size minus borders)
    app.chat_area = Some(chat_area);
    app.chat_height = chat_area.height.saturating_sub(2);
    app.chat_width = chat_area.width.saturating_sub(2);

    render_chat(app, frame, chat_area);

    if candidates_height > 0 {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Magenta))
            .title(" Candidates ");
        let lines: Vec<Line> = candidates.iter().map(candidate_line).collect();
        let panel = Paragraph::new(lines)
            .block(block)
            .wrap(Wrap { trim: true });
        frame.render_widget(panel, candidates_area);
    }

    render_input(app, frame, input_area);
}

fn render_chat(app: &App, frame: &mut Frame, area: Rect) {
    let focused = app.focus == FocusPane::Chat;
    let border_color = if focused { Color::Cyan } else { Color::DarkGray };
    let session = app.active_session();
    let loading = app.is_active_loading();

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(format!(" {} ", session.title));

    let chat_text = if session.messages.is_empty() && !loading {
        Text::from(vec![
            Line::from(Span::styled(
                "Introducing your HR Copilot",
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::default(),
            Line::from(Span::styled(
                "Ask for \"Senior React dev in healthcare\", \"Data scientist with NLP + AWS\", \
                 or paste a job description to get curated matches.",
                Style::default().fg(Color::DarkGray),
            )),
        ])
    } else {
        let mut lines: Vec<Line> = Vec::new();

        for msg in &session.messages {
            match msg.role {
                ChatRole::User => {
                    lines.push(Line::from(Span::styled(
                        "You:",
                        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                    )));
                    lines.push(Line::from(msg.text.clone()));
                }
                ChatRole::Assistant => {
                    lines.push(Line::from(Span::styled(
                        "HR:",
                        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                    )));
                    for line in msg.text.lines() {
                        lines.push(parse_markdown_line(line));
                    }
                }
            }
            lines.push(Line::default());
        }

        if loading {
            lines.push(Line::from(Span::styled(
                "HR:",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )));
            // Animated ellipsis: cycles through ".", "..", "..."
            let dots = ".".repeat((app.animation_frame as usize) + 1);
            lines.push(Line::from(Span::styled(
                format!("Thinking{}", dots),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )));
        }

        Text::from(lines)
    };

    let chat = Paragraph::new(chat_text)
        .block(block)
        .wrap(Wrap { trim: true })
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let editing = app.input_mode == InputMode::Editing;
    let border_color = if editing { Color::Yellow } else { Color::DarkGray };

    let title = if app.composer.is_busy() {
        " Waiting for a reply... "
    } else {
        " Ask (i to type, Enter to send) "
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Horizontal scrolling keeps the cursor inside the box
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.input_cursor;
    let scroll_offset = if inner_width == 0 || cursor_pos < inner_width {
        0
    } else {
        cursor_pos - inner_width + 1
    };

    let visible_text: String = app
        .composer
        .input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(block);

    frame.render_widget(input, area);

    if editing {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contents(line: &Line) -> Vec<String> {
        line.spans.iter().map(|s| s.content.to_string()).collect()
    }

    #[test]
    fn test_bullet_becomes_dot() {
        let line = parse_markdown_line("- Ana has 6 years.");
        assert_eq!(contents(&line), vec!["• ", "Ana has 6 years."]);
    }

    #[test]
    fn test_bold_inside_bullet() {
        let line = parse_markdown_line("- **Ana Ruiz** leads the team.");
        assert_eq!(contents(&line), vec!["• ", "Ana Ruiz", " leads the team."]);
        assert!(line.spans[1].style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn test_unclosed_bold_is_literal() {
        let line = parse_markdown_line("price **rising");
        assert_eq!(contents(&line), vec!["price **rising"]);
    }

    #[test]
    fn test_plain_and_empty_lines() {
        assert_eq!(contents(&parse_markdown_line("1. First")), vec!["1. First"]);
        assert!(parse_markdown_line("").spans.is_empty());
    }

    #[test]
    fn test_candidate_line() {
        let candidate = CandidateSummary {
            name: "Ana".to_string(),
            skills: vec!["Rust".to_string(), "AWS".to_string()],
            experience_years: Some(6),
            availability: Some("available".to_string()),
            match_score: Some(0.8123),
        };
        let text: String = contents(&candidate_line(&candidate)).concat();
        assert_eq!(text, "Ana (0.81) · 6 yrs · available · Rust, AWS");
    }
}
