use ratatui::{
    Frame,
    layout::{Constraint, Flex, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Cell, Clear, Paragraph, Row, Table, Tabs, Wrap},
};
use tracing::trace;

use crate::account::{AuthStatusFilter, LocationFilter};
use crate::model::{Model, Popup, UIData};
use crate::table::{HeaderCell, SortDirection};

pub const STATS_HEIGHT: usize = 1;
pub const FILTER_HEIGHT: usize = 1;
pub const TABLE_HEADER_HEIGHT: usize = 1;
pub const STATUSLINE_HEIGHT: usize = 1;
pub const COLUMN_WIDTH_MARGIN: usize = 1;
const COLUMN_SPACING: u16 = 1;
const POPUP_WIDTH_PERCENT: u16 = 70;
const POPUP_HEIGHT_PERCENT: u16 = 80;
const DETAIL_LABEL_WIDTH: usize = 27;

const EMPTY_TITLE: &str = "No Data Available !";
const EMPTY_MESSAGE: &str = "Currently, no data are available for display.";
const LOADING_MESSAGE: &str = "Loading intakes ...";

#[derive(Debug, Default)]
pub struct TableUI {}

impl TableUI {
    pub fn new() -> Self {
        Self {}
    }

    pub fn draw(&mut self, model: &Model, frame: &mut Frame) {
        let uidata = model.get_uidata();
        let [stats_area, filter_area, table_area, status_area] = Layout::vertical([
            Constraint::Length(STATS_HEIGHT as u16),
            Constraint::Length(FILTER_HEIGHT as u16),
            Constraint::Min(0),
            Constraint::Length(STATUSLINE_HEIGHT as u16),
        ])
        .areas(frame.area());

        self.draw_statistics(uidata, frame, stats_area);
        self.draw_filters(uidata, frame, filter_area);
        self.draw_table(uidata, frame, table_area);
        self.draw_statusline(uidata, frame, status_area);

        if let Some(popup) = &uidata.popup {
            self.draw_popup(popup, frame);
        }
    }

    fn draw_statistics(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let stats = &uidata.statistics;
        let bold = Style::new().add_modifier(Modifier::BOLD);
        let line = Line::from(vec![
            Span::raw(" Total Intakes: "),
            Span::styled(stats.total_intakes.to_string(), bold),
            Span::raw("   Auth Pending: "),
            Span::styled(stats.auth_pending.to_string(), bold.fg(Color::Red)),
            Span::raw("   Completed: "),
            Span::styled(stats.completed.to_string(), bold.fg(Color::Green)),
        ]);
        frame.render_widget(Paragraph::new(line), area);
    }

    fn draw_filters(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let [location_label, location_tabs, auth_label, auth_tabs] = Layout::horizontal([
            Constraint::Length(11),
            Constraint::Length(32),
            Constraint::Length(7),
            Constraint::Min(0),
        ])
        .areas(area);
        let selected = Style::new().fg(Color::Yellow).add_modifier(Modifier::BOLD);

        let location_idx = LocationFilter::ALL
            .iter()
            .position(|f| *f == uidata.location)
            .unwrap_or(0);
        let locations = Tabs::new(LocationFilter::ALL.iter().map(|f| f.label()))
            .select(location_idx)
            .highlight_style(selected);

        let auth_idx = AuthStatusFilter::ALL
            .iter()
            .position(|f| *f == uidata.auth_status)
            .unwrap_or(0);
        let auth = Tabs::new(AuthStatusFilter::ALL.iter().map(|f| f.label()))
            .select(auth_idx)
            .highlight_style(selected);

        frame.render_widget(Paragraph::new(" Location:"), location_label);
        frame.render_widget(locations, location_tabs);
        frame.render_widget(Paragraph::new(" Auth:"), auth_label);
        frame.render_widget(auth, auth_tabs);
    }

    fn header_line(cell: &HeaderCell) -> Line<'static> {
        let mut line = cell.content.clone();
        if cell.sortable {
            let indicator = match cell.sorted {
                None => "↕",
                Some(SortDirection::Ascending) => "↑",
                Some(SortDirection::Descending) => "↓",
            };
            line.push_span(Span::raw(format!(" {indicator}")));
        }
        line
    }

    fn draw_table(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let table = &uidata.table;
        let header = Row::new(table.header.iter().enumerate().map(|(cidx, h)| {
            let style = if cidx == uidata.selected_column {
                Style::new().add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
            } else {
                Style::new().add_modifier(Modifier::BOLD)
            };
            Cell::from(Self::header_line(h)).style(style)
        }));

        let rows = table.rows().iter().enumerate().map(|(ridx, row)| {
            let is_selected = uidata.selected_row == Some(ridx);
            let cells = row.cells.iter().enumerate().map(|(cidx, content)| {
                let cell = Cell::from(content.clone());
                if is_selected && cidx == uidata.selected_column {
                    cell.style(Style::new().add_modifier(Modifier::REVERSED))
                } else {
                    cell
                }
            });
            let row = Row::new(cells);
            if is_selected {
                row.style(Style::new().bg(Color::DarkGray))
            } else {
                row
            }
        });

        let widths = uidata.widths.iter().map(|w| Constraint::Length(*w));
        frame.render_widget(
            Table::new(rows, widths)
                .header(header)
                .column_spacing(COLUMN_SPACING),
            area,
        );

        let body_top = TABLE_HEADER_HEIGHT as u16;
        let body = Rect {
            y: area.y + body_top.min(area.height),
            height: area.height.saturating_sub(body_top),
            ..area
        };

        if table.is_empty() {
            self.draw_placeholder(uidata.loading, frame, body);
            return;
        }

        // The sentinel occupies the line right after the last loaded row
        let used = table.rows().len() as u16;
        if let Some(sentinel) = table.sentinel()
            && used < body.height
        {
            trace!("Drawing sentinel at body line {used}");
            let sentinel_area = Rect {
                y: body.y + used,
                height: 1,
                ..body
            };
            let style = if sentinel.fetching {
                Style::new().fg(Color::Yellow)
            } else {
                Style::new().fg(Color::DarkGray).add_modifier(Modifier::ITALIC)
            };
            frame.render_widget(
                Paragraph::new(sentinel.message()).style(style).centered(),
                sentinel_area,
            );
        }
    }

    fn draw_placeholder(&self, loading: bool, frame: &mut Frame, area: Rect) {
        let text = if loading {
            Text::from(Line::from(LOADING_MESSAGE))
        } else {
            Text::from(vec![
                Line::from(Span::styled(
                    EMPTY_TITLE,
                    Style::new().add_modifier(Modifier::BOLD),
                )),
                Line::from(Span::styled(EMPTY_MESSAGE, Style::new().fg(Color::DarkGray))),
            ])
        };
        let [center] = Layout::vertical([Constraint::Length(text.height() as u16)])
            .flex(Flex::Center)
            .areas(area);
        frame.render_widget(Paragraph::new(text).centered(), center);
    }

    fn draw_statusline(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let mut info = format!("{}/{} loaded", uidata.nrows, uidata.total_count);
        if let Some(sort) = &uidata.sort_label {
            info.push_str(&format!(" | sorted by {sort}"));
        }
        info.push_str(&format!(" | {} | ? help ", uidata.name));

        let [message_area, info_area] = Layout::horizontal([
            Constraint::Min(0),
            Constraint::Length(info.chars().count() as u16),
        ])
        .areas(area);

        frame.render_widget(
            Paragraph::new(format!(" {}", uidata.status_message)),
            message_area,
        );
        frame.render_widget(
            Paragraph::new(info).style(Style::new().fg(Color::Black).bg(Color::Gray)),
            info_area,
        );
    }

    fn popup_area(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
        let vertical = Layout::vertical([Constraint::Percentage(percent_y)]).flex(Flex::Center);
        let horizontal = Layout::horizontal([Constraint::Percentage(percent_x)]).flex(Flex::Center);
        let [area] = vertical.areas(area);
        let [area] = horizontal.areas(area);
        area
    }

    fn draw_popup(&self, popup: &Popup, frame: &mut Frame) {
        let area = Self::popup_area(frame.area(), POPUP_WIDTH_PERCENT, POPUP_HEIGHT_PERCENT);
        let (block, text, scroll) = match popup {
            Popup::Help(help) => (
                Block::bordered()
                    .title(" Help ")
                    .title_bottom(Line::from(" Esc close ").centered()),
                Text::from(help.as_str()),
                0,
            ),
            Popup::Detail {
                title,
                summary,
                sections,
                scroll,
            } => {
                let summary = Line::styled(
                    summary.clone(),
                    Style::new().add_modifier(Modifier::ITALIC),
                );
                let mut lines = vec![summary, Line::default()];
                for section in sections {
                    lines.push(Line::styled(
                        section.title,
                        Style::new().fg(Color::Green).add_modifier(Modifier::BOLD),
                    ));
                    lines.extend(section.fields.iter().map(|(label, value)| {
                        Line::from(vec![
                            Span::styled(
                                format!("  {label:<DETAIL_LABEL_WIDTH$}"),
                                Style::new().fg(Color::DarkGray),
                            ),
                            Span::raw(value.clone()),
                        ])
                    }));
                    lines.push(Line::default());
                }
                (
                    Block::bordered()
                        .title(format!(" {title} "))
                        .title_bottom(
                            Line::from(" j/k scroll | h/l previous/next account | Esc close ")
                                .centered(),
                        ),
                    Text::from(lines),
                    *scroll,
                )
            }
        };

        frame.render_widget(Clear, area);
        frame.render_widget(
            Paragraph::new(text)
                .block(block)
                .wrap(Wrap { trim: false })
                .scroll((scroll, 0)),
            area,
        );
    }
}
