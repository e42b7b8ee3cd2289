use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Gauge, Paragraph, Row, Table, Wrap},
    Frame,
};

use crate::{
    app::{App, ListingFocus, Screen, MENU_ITEMS},
    listing::{Amenity, ListingField, Step},
    mortgage::MortgageField,
    valuation::ValuationField,
};

pub fn ui(f: &mut Frame, app: &mut App) {
    match app.screen {
        Screen::Menu => render_menu_screen(f, app),
        Screen::Mortgage => render_mortgage_screen(f, app),
        Screen::Schedule => render_schedule_screen(f, app),
        Screen::Listing => render_listing_screen(f, app),
        Screen::Valuation => render_valuation_screen(f, app),
        Screen::ValuationResult => render_valuation_result_screen(f, app),
    }
}

fn title(text: &str) -> Paragraph<'_> {
    Paragraph::new(text)
        .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::BOTTOM))
}

fn help(text: &str) -> Paragraph<'_> {
    Paragraph::new(text)
        .style(Style::default().fg(Color::DarkGray))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::TOP))
}

fn status_line(app: &App) -> Line<'static> {
    match &app.status {
        Some(message) => Line::from(message.clone()).style(Style::default().fg(Color::Yellow)),
        None => Line::from(""),
    }
}

fn field_line(label: &str, value: String, focused: bool, error: Option<String>) -> Line<'static> {
    let marker = if focused { "▶ " } else { "  " };
    let style = if focused {
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };
    let mut spans = vec![
        Span::styled(format!("{marker}{label}: "), style),
        Span::raw(value),
    ];
    if let Some(error) = error {
        spans.push(Span::styled(format!("  {error}"), Style::default().fg(Color::Red)));
    }
    Line::from(spans)
}

fn money(value: f64) -> String {
    let whole = value.round() as i64;
    let digits = whole.unsigned_abs().to_string();
    let mut grouped = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    if whole < 0 {
        format!("-${grouped}")
    } else {
        format!("${grouped}")
    }
}

fn standard_layout(area: Rect) -> std::rc::Rc<[Rect]> {
    Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints(
            [
                Constraint::Length(3),
                Constraint::Min(1),
                Constraint::Length(1),
                Constraint::Length(2),
            ]
            .as_ref(),
        )
        .split(area)
}

fn render_menu_screen(f: &mut Frame, app: &App) {
    let chunks = standard_layout(f.size());
    f.render_widget(title("Realty Desk"), chunks[0]);

    let items: Vec<Line> = MENU_ITEMS
        .iter()
        .enumerate()
        .map(|(i, item)| {
            if i == app.menu_index {
                Line::from(format!("▶ {item}"))
                    .style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
            } else {
                Line::from(format!("  {item}")).style(Style::default().fg(Color::DarkGray))
            }
        })
        .collect();
    let menu = Paragraph::new(items).block(Block::default().borders(Borders::ALL).title("What would you like to do?"));
    f.render_widget(menu, chunks[1]);

    f.render_widget(Paragraph::new(status_line(app)), chunks[2]);
    f.render_widget(help("j/k or ↑/↓: select | Enter/l/→: open | Esc/q: exit"), chunks[3]);
}

fn render_mortgage_screen(f: &mut Frame, app: &App) {
    let chunks = standard_layout(f.size());
    f.render_widget(title("Mortgage Calculator"), chunks[0]);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)].as_ref())
        .split(chunks[1]);

    let estimator = &app.mortgage;
    let form = estimator.form();
    let lines: Vec<Line> = MortgageField::ALL
        .iter()
        .map(|field| {
            let value = match field {
                MortgageField::LoanTerm => format!("{} years", form.loan_term.years()),
                MortgageField::InterestRate => format!("{}%", form.text(*field)),
                other => format!("${}", form.text(*other)),
            };
            let error = estimator.errors().get(*field).map(|e| e.to_string());
            field_line(field.label(), value, *field == app.mortgage_focus, error)
        })
        .collect();
    let inputs = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Loan Details"));
    f.render_widget(inputs, body[0]);

    let results = match estimator.result() {
        Some(result) => {
            let mut text = vec![
                Line::from(vec![
                    Span::styled("Monthly Payment: ", Style::default().add_modifier(Modifier::BOLD)),
                    Span::styled(money(result.total_monthly_payment), Style::default().fg(Color::Cyan)),
                ]),
                Line::from(""),
            ];
            for (label, amount) in result.breakdown.items() {
                text.push(Line::from(format!(
                    "  {label}: {} ({:.0}%)",
                    money(amount),
                    result.breakdown.share(amount) * 100.0
                )));
            }
            text.push(Line::from(""));
            text.push(Line::from(vec![
                Span::styled("Loan Amount: ", Style::default().add_modifier(Modifier::BOLD)),
                Span::styled(money(result.loan_amount), Style::default().fg(Color::Green)),
            ]));
            text.push(Line::from(vec![
                Span::styled("Total Interest: ", Style::default().add_modifier(Modifier::BOLD)),
                Span::styled(money(result.total_interest_over_term), Style::default().fg(Color::Red)),
            ]));
            text.push(Line::from(vec![
                Span::styled("Total Paid Over Term: ", Style::default().add_modifier(Modifier::BOLD)),
                Span::raw(money(result.total_paid_over_term)),
            ]));
            Paragraph::new(text)
        }
        None if estimator.can_calculate() => Paragraph::new("Fix the highlighted fields to see your payment"),
        None => Paragraph::new("Enter home price, down payment and interest rate"),
    };
    f.render_widget(
        results.block(Block::default().borders(Borders::ALL).title("Payment Breakdown")),
        body[1],
    );

    f.render_widget(Paragraph::new(status_line(app)), chunks[2]);
    f.render_widget(
        help("↑/↓: field | Tab: loan term | Enter/s: schedule | e: export CSV | Esc: menu"),
        chunks[3],
    );
}

fn render_schedule_screen(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1), Constraint::Length(2)].as_ref())
        .split(f.size());

    let header = Row::new(vec!["Month", "Interest", "Principal", "Balance"])
        .style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
        .height(1);

    let rows = app.schedule.iter().map(|row| {
        Row::new(vec![
            Cell::from(row.month.to_string()),
            Cell::from(format!("${:.2}", row.interest)),
            Cell::from(format!("${:.2}", row.principal)),
            Cell::from(format!("${:.2}", row.balance)),
        ])
        .height(1)
    });

    let widths = [
        Constraint::Length(6),
        Constraint::Length(14),
        Constraint::Length(14),
        Constraint::Length(16),
    ];

    let table = Table::new(rows, widths)
        .header(header)
        .block(Block::default().borders(Borders::ALL).title("Amortization Schedule"))
        .highlight_style(Style::default().bg(Color::DarkGray))
        .highlight_symbol(">> ");
    f.render_stateful_widget(table, chunks[0], &mut app.table_state);

    f.render_widget(Paragraph::new(status_line(app)), chunks[1]);
    f.render_widget(
        help("j/k or ↑/↓: navigate | PgUp/PgDn: year | g/G: top/bottom | e: export CSV | h/←: back | q: quit"),
        chunks[2],
    );
}

fn step_tracker(app: &App) -> Line<'static> {
    let current = app.wizard.current();
    let mut spans = Vec::new();
    for step in Step::ALL {
        let mark = if app.wizard.is_complete(step) { "✔".to_string() } else { step.number().to_string() };
        let style = if step == current {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else if step < current {
            Style::default().fg(Color::Green)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        spans.push(Span::styled(format!(" [{mark}] {} ", step.title()), style));
        if step != Step::Contact {
            spans.push(Span::raw("─"));
        }
    }
    Line::from(spans)
}

fn render_listing_screen(f: &mut Frame, app: &App) {
    let chunks = standard_layout(f.size());
    f.render_widget(title("List Your Property"), chunks[0]);

    let body = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(1)].as_ref())
        .split(chunks[1]);
    f.render_widget(Paragraph::new(step_tracker(app)).alignment(Alignment::Center), body[0]);

    let step = app.wizard.current();
    let focus = app.listing_focus();
    let draft = app.wizard.draft();
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!("Step {} of 4: {}", step.number(), step.title()));

    match step {
        Step::Media => {
            let area = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Length(3), Constraint::Length(3), Constraint::Min(1)].as_ref())
                .split(block.inner(body[1]));
            f.render_widget(block, body[1]);

            let path = Paragraph::new(app.image_path.clone()).block(
                Block::default()
                    .borders(Borders::ALL)
                    .title("Image files (comma separated), Enter to add")
                    .border_style(focus_border(focus == ListingFocus::ImagePath)),
            );
            f.render_widget(path, area[0]);

            let progress = app.wizard.upload_progress();
            let gauge = Gauge::default()
                .block(Block::default().borders(Borders::ALL).title("Upload"))
                .gauge_style(Style::default().fg(Color::Yellow))
                .percent(progress.percent() as u16);
            f.render_widget(gauge, area[1]);

            let images: Vec<Line> = draft
                .images
                .iter()
                .enumerate()
                .map(|(i, image)| {
                    let selected = focus == ListingFocus::Images && i == app.image_cursor;
                    let marker = if selected { "▶" } else { " " };
                    Line::from(format!(
                        "{marker} {} ({} bytes) {}",
                        image.source.file_name(),
                        image.source.bytes,
                        image.preview_url
                    ))
                })
                .collect();
            let list = Paragraph::new(images).block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(format!("Photos ({}), Tab: select, Del: remove", draft.images.len()))
                    .border_style(focus_border(focus == ListingFocus::Images)),
            );
            f.render_widget(list, area[2]);
        }
        _ => {
            let mut lines: Vec<Line> = ListingField::for_step(step)
                .iter()
                .map(|field| {
                    let focused = focus == ListingFocus::Field(*field);
                    let value = if focused && !field.is_choice() {
                        format!("{}_", app.listing_buffer)
                    } else {
                        draft.field_text(*field)
                    };
                    field_line(field.label(), value, focused, None)
                })
                .collect();

            if step == Step::Specs {
                lines.push(Line::from(""));
                let focused = focus == ListingFocus::Amenities;
                lines.push(field_line(
                    "Amenities",
                    format!("{} selected", draft.amenities.len()),
                    focused,
                    None,
                ));
                for (i, amenity) in Amenity::CATALOG.iter().enumerate() {
                    let checked = if draft.amenities.contains(amenity) { "[x]" } else { "[ ]" };
                    let style = if focused && i == app.amenity_cursor {
                        Style::default().fg(Color::Yellow)
                    } else {
                        Style::default()
                    };
                    lines.push(Line::from(format!("    {checked} {}", amenity.label())).style(style));
                }
            }

            if step == Step::Contact {
                lines.push(Line::from(""));
                lines.push(Line::from(Span::styled("Review", Style::default().add_modifier(Modifier::BOLD))));
                lines.push(Line::from(format!("  Title: {}", draft.title)));
                lines.push(Line::from(format!(
                    "  Price: {}",
                    draft.price.map(money).unwrap_or_default()
                )));
                lines.push(Line::from(format!("  Location: {}", draft.location)));
                lines.push(Line::from(format!("  Images: {}", draft.images.len())));
                lines.push(Line::from(format!("  Amenities: {} selected", draft.amenities.len())));
            }

            f.render_widget(Paragraph::new(lines).block(block).wrap(Wrap { trim: false }), body[1]);
        }
    }

    f.render_widget(Paragraph::new(status_line(app)), chunks[2]);
    let keys = match step {
        Step::Contact => "↑/↓: field | Enter: submit listing | Esc: previous step",
        Step::Specs => "↑/↓: field | Tab: choose option | Space: toggle amenity | Enter: next | Esc: back",
        Step::Media => "↑/↓: switch panel | Enter: add images / next | Esc: back",
        Step::Details => "↑/↓: field | Tab: property type | Enter: next | Esc: leave",
    };
    f.render_widget(help(keys), chunks[3]);
}

fn focus_border(focused: bool) -> Style {
    if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    }
}

fn render_valuation_screen(f: &mut Frame, app: &App) {
    let chunks = standard_layout(f.size());
    f.render_widget(title("Property Valuation"), chunks[0]);

    let lines: Vec<Line> = ValuationField::ALL
        .iter()
        .map(|field| {
            let error = app.valuation_errors.get(*field).map(|e| e.to_string());
            field_line(
                field.label(),
                app.valuation.display(*field),
                *field == app.valuation_focus,
                error,
            )
        })
        .collect();
    let form = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Tell us about your property"),
    );
    f.render_widget(form, chunks[1]);

    f.render_widget(Paragraph::new(status_line(app)), chunks[2]);
    f.render_widget(
        help("↑/↓: field | Tab: next option | Enter: get estimate | Esc: menu"),
        chunks[3],
    );
}

fn render_valuation_result_screen(f: &mut Frame, app: &App) {
    let chunks = standard_layout(f.size());
    f.render_widget(title("Valuation Complete"), chunks[0]);

    if let Some((request, value)) = &app.valuation_result {
        let text = vec![
            Line::from(vec![
                Span::styled("Estimated Property Value: ", Style::default().add_modifier(Modifier::BOLD)),
                Span::styled(money(*value), Style::default().fg(Color::Yellow)),
            ]),
            Line::from("Based on current market analysis").style(Style::default().fg(Color::DarkGray)),
            Line::from(""),
            Line::from(format!("Type: {}", request.property_type.label())),
            Line::from(format!("Location: {}", request.location)),
            Line::from(format!("Size: {} sq ft", request.square_footage)),
            Line::from(format!("Bedrooms: {}", request.bedrooms)),
            Line::from(format!("Bathrooms: {}", request.bathrooms)),
            Line::from(format!("Condition: {}", request.condition.label())),
            Line::from(""),
            Line::from("This is a preliminary estimate. An agent will contact you"),
            Line::from(format!("at {} to arrange a detailed market analysis.", request.contact_email)),
        ];
        let summary = Paragraph::new(text)
            .block(Block::default().borders(Borders::ALL).title("Your Estimate"))
            .wrap(Wrap { trim: false });
        f.render_widget(summary, chunks[1]);
    }

    f.render_widget(Paragraph::new(status_line(app)), chunks[2]);
    f.render_widget(help("l: list this property | n: new valuation | Enter/Esc: menu | q: quit"), chunks[3]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn money_groups_thousands() {
        assert_eq!(money(0.0), "$0");
        assert_eq!(money(1796.18), "$1,796");
        assert_eq!(money(246_624.8), "$246,625");
        assert_eq!(money(-1500.0), "-$1,500");
    }
}
