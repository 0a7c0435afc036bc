use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
};
use banter_core::ChatRole;
use crate::app::{App, InputMode};

/// Style `**bold**` and `` `code` `` spans in one line of a reply.
///
/// Unclosed markers are kept as literal text.
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut rest = text;

    while !rest.is_empty() {
        let next = [("**", Modifier::BOLD), ("`", Modifier::empty())]
            .into_iter()
            .filter_map(|(marker, modifier)| rest.find(marker).map(|at| (at, marker, modifier)))
            .min_by_key(|(at, _, _)| *at);

        let Some((start, marker, modifier)) = next else {
            spans.push(Span::raw(rest.to_string()));
            break;
        };
        let body_start = start + marker.len();
        let Some(len) = rest[body_start..].find(marker) else {
            spans.push(Span::raw(rest.to_string()));
            break;
        };

        if start > 0 {
            spans.push(Span::raw(rest[..start].to_string()));
        }
        let body = rest[body_start..body_start + len].to_string();
        let style = if marker == "`" {
            Style::default().fg(Color::Green)
        } else {
            Style::default().add_modifier(modifier)
        };
        spans.push(Span::styled(body, style));
        rest = &rest[body_start + len + marker.len()..];
    }

    Line::from(spans)
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, chat, input, footer
    let [header_area, chat_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_chat(app, frame, chat_area);
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);

    if app.show_model_picker {
        render_model_picker(app, frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let session = app
        .controller
        .session_id()
        .map(|id| id.chars().take(8).collect::<String>())
        .unwrap_or_default();

    let title = Line::from(vec![
        Span::styled(" banter ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(
            format!("v{} ", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
        Span::styled(format!(" {} ", app.relay_url), Style::default().fg(Color::Gray)),
        Span::styled(format!(" session {} ", session), Style::default().fg(Color::DarkGray)),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::Black));
    frame.render_widget(header, area);
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    // Inner size minus borders, for scroll calculations
    app.chat_height = area.height.saturating_sub(2);
    app.chat_width = area.width.saturating_sub(2);
    if app.follow_tail {
        app.chat_scroll = app.max_scroll();
    }

    let state = app.state();
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(format!(" Model: {} ", state.selected_model));

    let user_style = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
    let ai_style = Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD);

    let text = if state.conversation.is_empty() && !state.is_busy() {
        Text::from(Span::styled(
            "Say something...",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        let mut lines: Vec<Line> = Vec::new();

        for entry in &state.conversation {
            match entry.role {
                ChatRole::User => {
                    lines.push(Line::from(Span::styled(App::role_label(entry.role), user_style)));
                    lines.push(Line::from(entry.text.clone()));
                }
                ChatRole::Assistant => {
                    lines.push(Line::from(Span::styled(App::role_label(entry.role), ai_style)));
                    lines.extend(entry.text.lines().map(parse_markdown_line));
                }
            }
            lines.push(Line::default());
        }

        if state.loading {
            lines.push(Line::from(Span::styled("AI:", ai_style)));
            // Animated ellipsis: cycles through ".", "..", "..."
            let dots = ".".repeat((app.animation_frame as usize) + 1);
            lines.push(Line::from(Span::styled(
                format!("Thinking{}", dots),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )));
        }

        if !state.typing_text.is_empty() {
            lines.push(Line::from(Span::styled("AI:", ai_style)));
            let mut typed: Vec<Line> = state.typing_text.lines().map(parse_markdown_line).collect();
            if let Some(last) = typed.last_mut() {
                last.push_span(Span::styled("▌", Style::default().fg(Color::Yellow)));
            }
            lines.extend(typed);
        }

        Text::from(lines)
    };

    let chat = Paragraph::new(text)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let editing = app.input_mode == InputMode::Editing;
    let busy = app.state().is_busy();

    let border_color = match (editing, busy) {
        (_, true) => Color::DarkGray,
        (true, false) => Color::Yellow,
        (false, false) => Color::Gray,
    };
    let title = if busy {
        " Waiting for reply (Esc to stop) "
    } else {
        " Prompt (Enter to send) "
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Horizontal scroll keeps the cursor visible
    let inner_width = area.width.saturating_sub(2) as usize;
    let scroll_offset = if inner_width > 0 && app.prompt_cursor >= inner_width {
        app.prompt_cursor - inner_width + 1
    } else {
        0
    };
    let visible_text: String = app
        .prompt
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(block);
    frame.render_widget(input, area);

    if editing && !app.show_model_picker {
        let cursor_x = (app.prompt_cursor - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let (mode_text, mode_style) = match app.input_mode {
        InputMode::Normal => (" NORMAL ", Style::default().bg(Color::Blue).fg(Color::White)),
        InputMode::Editing => (" INSERT ", Style::default().bg(Color::Yellow).fg(Color::Black)),
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let hints: &[(&str, &str)] = match app.input_mode {
        InputMode::Editing => &[
            (" Enter ", " send "),
            (" Esc ", " stop/normal "),
            (" Ctrl-N ", " new chat "),
            (" Ctrl-C ", " quit "),
        ],
        InputMode::Normal => &[
            (" i ", " type "),
            (" j/k ", " scroll "),
            (" M ", " model "),
            (" n ", " new chat "),
            (" s ", " stop "),
            (" q ", " quit "),
        ],
    };

    let mut spans = vec![Span::styled(mode_text, mode_style), Span::raw(" ")];
    for (key, label) in hints {
        spans.push(Span::styled(*key, key_style));
        spans.push(Span::styled(*label, label_style));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_model_picker(app: &mut App, frame: &mut Frame, area: Rect) {
    // Centered popup
    let popup_width = 40.min(area.width.saturating_sub(4));
    let popup_height = (app.available_models.len() as u16 + 2).min(area.height.saturating_sub(4));
    let popup_x = (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = (area.height.saturating_sub(popup_height)) / 2;
    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height);

    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Select Model (Enter to select, Esc to cancel) ");

    let selected_model = app.state().selected_model.clone();
    let items: Vec<ListItem> = app
        .available_models
        .iter()
        .map(|model| {
            let style = if *model == selected_model {
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(format!(" {} ", model)).style(style)
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

    frame.render_stateful_widget(list, popup_area, &mut app.model_picker_state);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contents(line: &Line) -> Vec<String> {
        line.spans.iter().map(|s| s.content.to_string()).collect()
    }

    #[test]
    fn test_bold_and_code_spans() {
        let line = parse_markdown_line("use **this** with `cargo`!");
        assert_eq!(contents(&line), ["use ", "this", " with ", "cargo", "!"]);
        assert!(line.spans[1].style.add_modifier.contains(Modifier::BOLD));
        assert_eq!(line.spans[3].style.fg, Some(Color::Green));
    }

    #[test]
    fn test_unclosed_marker_is_literal() {
        let line = parse_markdown_line("2 ** 3 is eight");
        assert_eq!(contents(&line), ["2 ** 3 is eight"]);
    }
}
