use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Cell, Clear, Paragraph, Row, Table, TableState},
};

use crate::model::UIData;

pub const CONTROLS_HEIGHT: usize = 1;
pub const STATUS_HEIGHT: usize = 1;
pub const TABLE_HEADER_HEIGHT: usize = 1;
pub const TABLE_BORDER_HEIGHT: usize = 2;
/// Everything around the table body rows.
pub const TABLE_CHROME_HEIGHT: usize =
    CONTROLS_HEIGHT + STATUS_HEIGHT + TABLE_HEADER_HEIGHT + TABLE_BORDER_HEIGHT;
pub const COLUMN_WIDTH_MARGIN: usize = 1;

/// Renders a `UIData` snapshot and nothing else; all state lives in the
/// model.
pub struct SheetUI;

impl SheetUI {
    pub fn new() -> Self {
        SheetUI
    }

    pub fn draw(&self, data: &UIData, frame: &mut Frame) {
        let area = frame.area();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(CONTROLS_HEIGHT as u16),
                Constraint::Min(1),
                Constraint::Length(STATUS_HEIGHT as u16),
            ])
            .split(area);

        self.draw_controls(data, frame, chunks[0]);
        self.draw_table(data, frame, chunks[1]);
        self.draw_status(data, frame, chunks[2]);
        if data.show_popup {
            self.draw_popup(data, frame, area);
        }
    }

    fn draw_controls(&self, data: &UIData, frame: &mut Frame, area: Rect) {
        let mut spans: Vec<Span> = Vec::new();
        for control in &data.controls {
            let text = format!(" {}: {} ", control.label, control.value);
            if control.focused {
                spans.push(text.reversed());
            } else {
                spans.push(text.into());
            }
        }

        let query = if data.active_search {
            // show the cursor while editing
            let at = data
                .search
                .input
                .char_indices()
                .nth(data.search.cursor_pos)
                .map(|(i, _)| i)
                .unwrap_or(data.search.input.len());
            let (head, tail) = data.search.input.split_at(at);
            format!("{head}▌{tail}")
        } else {
            data.search.input.clone()
        };
        let search = format!(" Search: {query} ");
        if data.active_search {
            spans.push(search.bold().yellow());
        } else {
            spans.push(search.into());
        }

        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }

    fn draw_table(&self, data: &UIData, frame: &mut Frame, area: Rect) {
        let title = Line::from(format!(" {} ", data.title).bold()).left_aligned();
        let mut block = Block::bordered().title(title);
        if let Some(stamp) = &data.last_loaded {
            block = block.title(Line::from(format!(" {stamp} ")).right_aligned());
        }

        let header = Row::new(
            data.header
                .iter()
                .map(|(name, _)| Cell::from(name.as_str())),
        )
        .style(Style::new().bold());

        let widths: Vec<Constraint> = data
            .header
            .iter()
            .map(|(_, width)| Constraint::Length(*width))
            .collect();

        let rows = data.rows.iter().enumerate().map(|(ri, cells)| {
            Row::new(cells.iter().enumerate().map(|(ci, content)| {
                let cell = Cell::from(content.as_str());
                if ri == data.selected_row && ci == data.selected_column {
                    cell.style(Style::new().bold().reversed())
                } else {
                    cell
                }
            }))
        });

        let table = Table::new(rows, widths)
            .header(header)
            .block(block)
            .column_spacing(1)
            .row_highlight_style(Style::new().reversed());

        let mut state = TableState::default();
        if !data.rows.is_empty() {
            state.select(Some(data.selected_row));
        }
        frame.render_stateful_widget(table, area, &mut state);
    }

    fn draw_status(&self, data: &UIData, frame: &mut Frame, area: Rect) {
        let counter = if data.nrows > 0 {
            format!(
                " {}/{} rows  page {}/{} ",
                data.abs_selected_row + 1,
                data.nrows,
                data.page,
                data.pages
            )
        } else {
            format!(" 0/{} rows ", data.total_rows)
        };

        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(1), Constraint::Length(counter.len() as u16)])
            .split(area);

        let style = if data.status_is_error {
            Style::new().red().bold()
        } else {
            Style::new()
        };
        frame.render_widget(
            Paragraph::new(data.status_message.as_str()).style(style),
            chunks[0],
        );
        frame.render_widget(Paragraph::new(counter).right_aligned(), chunks[1]);
    }

    fn draw_popup(&self, data: &UIData, frame: &mut Frame, area: Rect) {
        let popup = Self::popup_area(area, 60, 80);
        frame.render_widget(Clear, popup);
        frame.render_widget(
            Paragraph::new(data.popup_message.as_str())
                .block(Block::bordered().title(Line::from(" Help ".bold()).centered())),
            popup,
        );
    }

    fn popup_area(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
        let vertical = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Percentage((100 - percent_y) / 2),
                Constraint::Percentage(percent_y),
                Constraint::Percentage((100 - percent_y) / 2),
            ])
            .split(area);
        let horizontal = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage((100 - percent_x) / 2),
                Constraint::Percentage(percent_x),
                Constraint::Percentage((100 - percent_x) / 2),
            ])
            .split(vertical[1]);
        horizontal[1]
    }
}

impl Default for SheetUI {
    fn default() -> Self {
        Self::new()
    }
}
