use andf_core::{format, StatusColor};
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Wrap},
};
use crate::app::App;

fn status_color(color: StatusColor) -> Color {
    match color {
        StatusColor::Gray => Color::Gray,
        StatusColor::Green => Color::Green,
        StatusColor::Yellow => Color::Yellow,
        StatusColor::Red => Color::Red,
    }
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    let suggestions_height = if app.session.suggestions_visible() {
        (app.session.suggestions().len() + 3) as u16 // +2 borders, +1 hint line
    } else {
        0
    };
    let warning_height = if app.session.warning().is_some() { 1 } else { 0 };

    // Main layout: header, chat, suggestions, input, warning, footer
    let [header_area, chat_area, suggestions_area, input_area, warning_area, footer_area] =
        Layout::vertical([
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(suggestions_height),
            Constraint::Length(3),
            Constraint::Length(warning_height),
            Constraint::Length(2),
        ])
        .areas(area);

    render_header(app, frame, header_area);
    render_chat(app, frame, chat_area);
    if suggestions_height > 0 {
        render_suggestions(app, frame, suggestions_area);
    }
    render_input(app, frame, input_area);
    if let Some(warning) = app.session.warning() {
        let banner = Paragraph::new(format!(" ⚠ {}", warning))
            .style(Style::default().fg(Color::Red).add_modifier(Modifier::BOLD));
        frame.render_widget(banner, warning_area);
    }
    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let status = app.session.connectivity();
    let badge_color = status_color(format::connectivity_color(status));

    let title = Line::from(vec![
        Span::styled(" Assistant ANDF ", Style::default().fg(Color::Green).bold()),
        Span::styled(
            "Agence Nationale du Domaine et du Foncier - Bénin ",
            Style::default().fg(Color::Gray),
        ),
        Span::styled(
            format!("v{} ", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ]);
    let badge = Line::from(vec![
        Span::styled("● ", Style::default().fg(badge_color)),
        Span::styled(format::connectivity_label(status), Style::default().fg(Color::White)),
        Span::raw(" "),
    ]);

    let [title_area, badge_area] =
        Layout::horizontal([Constraint::Min(0), Constraint::Length(16)]).areas(area);
    let style = Style::default().bg(Color::Black);
    frame.render_widget(Paragraph::new(title).style(style), title_area);
    frame.render_widget(Paragraph::new(badge).style(style).right_aligned(), badge_area);
}

/// The chat history as styled lines; `App::total_chat_lines` counts the same rows
fn chat_lines(app: &App) -> Vec<Line<'static>> {
    let mut lines: Vec<Line> = Vec::new();

    for message in app.session.messages() {
        let view = format::view(message);
        let (role_style, body_style) = if view.is_user {
            (Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD), Style::default())
        } else if view.is_error {
            (
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                Style::default().fg(Color::Red),
            )
        } else {
            (Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD), Style::default())
        };

        lines.push(Line::from(vec![
            Span::styled(format!("{}:", view.role_label), role_style),
            Span::styled(format!(" {}", view.time_label), Style::default().fg(Color::DarkGray)),
        ]));
        if view.content.is_empty() {
            lines.push(Line::default());
        }
        for line in view.content.lines() {
            lines.push(Line::from(Span::styled(line.to_string(), body_style)));
        }

        let details: Vec<String> = [
            view.confidence_label.map(|c| format!("Confiance : {}", c)),
            view.sources_label,
            view.latency_label,
        ]
        .into_iter()
        .flatten()
        .collect();
        if !details.is_empty() {
            lines.push(Line::from(Span::styled(
                details.join(" · "),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )));
        }
        lines.push(Line::default());
    }

    if app.session.is_awaiting() {
        lines.push(Line::from(Span::styled(
            format!("{}:", format::role_label(andf_core::ChatRole::Assistant)),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::from(Span::styled(
            format::pending_label(app.animation_frame),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }

    lines
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    // Store chat area dimensions for scroll calculations (inner size minus borders)
    app.chat_area = Some(area);
    app.chat_height = area.height.saturating_sub(2);
    app.chat_width = area.width.saturating_sub(2);
    if app.follow_bottom {
        app.scroll_to_bottom();
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(format!(" Conversation ({}) ", app.session.backend_label()));

    let chat = Paragraph::new(Text::from(chat_lines(app)))
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);
}

fn render_suggestions(app: &App, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Blue))
        .title(" Suggestions de questions ");

    let mut lines = vec![Line::from(Span::styled(
        "Tab / Maj+Tab pour choisir, Entrée pour envoyer",
        Style::default().fg(Color::DarkGray),
    ))];
    for (i, suggestion) in app.session.suggestions().iter().enumerate() {
        let style = if app.suggestion_idx == Some(i) {
            Style::default().bg(Color::Blue).fg(Color::White).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Blue)
        };
        lines.push(Line::from(Span::styled(format!(" {} ", suggestion), style)));
    }

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let enabled = app.input_enabled();
    let border_color = if enabled { Color::Yellow } else { Color::DarkGray };
    let title = if enabled {
        " Posez votre question sur le foncier béninois "
    } else {
        " En attente de la réponse... "
    };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Horizontal scrolling keeps the cursor visible
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.cursor;
    let scroll_offset = if inner_width == 0 || cursor_pos < inner_width {
        0
    } else {
        cursor_pos - inner_width + 1
    };

    let visible_text: String = app
        .session
        .draft()
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(if enabled { Color::Cyan } else { Color::DarkGray }))
        .block(input_block);
    frame.render_widget(input, area);

    if enabled {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let mut hints = vec![
        Span::styled(" Entrée ", key_style),
        Span::styled(" envoyer ", label_style),
    ];
    if app.session.suggestions_visible() {
        hints.extend([
            Span::styled(" Tab ", key_style),
            Span::styled(" suggestion ", label_style),
        ]);
    }
    hints.extend([
        Span::styled(" PgUp/PgDn ", key_style),
        Span::styled(" défiler ", label_style),
        Span::styled(" F5 ", key_style),
        Span::styled(" vérifier le serveur ", label_style),
        Span::styled(" Échap ", key_style),
        Span::styled(" quitter ", label_style),
    ]);

    let disclaimer = Line::from(Span::styled(
        " Assistant intelligent basé sur les informations officielles de l'ANDF · www.andf.bj",
        Style::default().fg(Color::DarkGray),
    ));

    frame.render_widget(Paragraph::new(vec![Line::from(hints), disclaimer]), area);
}
