use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Cell, Clear, Paragraph, Row, Table, Wrap},
};

use crate::domain::{CMDMode, TSConfig};
use crate::model::{Model, UIData};

pub const CMDLINE_HEIGHT: usize = 1;
pub const TABLE_HEADER_HEIGHT: usize = 1;
pub const COLUMN_WIDTH_MARGIN: usize = 1;

#[derive(Debug)]
pub struct TableUI {
    max_column_width: usize,
}

impl TableUI {
    pub fn new(cfg: &TSConfig) -> Self {
        Self {
            max_column_width: cfg.max_column_width,
        }
    }

    pub fn draw(&mut self, model: &Model, frame: &mut Frame) {
        let uidata = model.get_uidata();
        let [table_area, status_area] =
            Layout::vertical([Constraint::Min(1), Constraint::Length(CMDLINE_HEIGHT as u16)])
                .areas(frame.area());

        frame.render_widget(self.table(uidata), table_area);
        self.draw_statusline(uidata, frame, status_area);

        if uidata.show_popup {
            let area = popup_area(frame.area(), 80, 70);
            let popup = Paragraph::new(uidata.popup_message.as_str())
                .wrap(Wrap { trim: false })
                .block(
                    Block::bordered()
                        .title(Line::from(format!(" {} ", uidata.popup_title)).bold().centered())
                        .title_bottom(Line::from(" <Esc> close ").centered()),
                );
            frame.render_widget(Clear, area);
            frame.render_widget(popup, area);
        }
    }

    fn table<'a>(&self, uidata: &'a UIData) -> Table<'a> {
        let header_style = Style::default().add_modifier(Modifier::BOLD | Modifier::UNDERLINED);
        let selected_header = header_style.add_modifier(Modifier::REVERSED);
        let header = Row::new(uidata.table.iter().enumerate().map(|(cidx, column)| {
            let style = if cidx == uidata.selected_column {
                selected_header
            } else {
                header_style
            };
            Cell::from(column.name.as_str()).style(style)
        }))
        .height(TABLE_HEADER_HEIGHT as u16);

        let nrows = uidata.table.first().map(|c| c.data.len()).unwrap_or(0);
        let rows = (0..nrows).map(|ridx| {
            Row::new(uidata.table.iter().enumerate().map(|(cidx, column)| {
                let cell = Cell::from(column.data[ridx].as_str());
                match (ridx == uidata.selected_row, cidx == uidata.selected_column) {
                    (true, true) => cell.style(Style::default().add_modifier(Modifier::REVERSED)),
                    (true, false) => cell.style(Style::default().add_modifier(Modifier::BOLD)),
                    _ => cell,
                }
            }))
        });

        let widths = uidata
            .table
            .iter()
            .map(|c| Constraint::Length(c.width.min(self.max_column_width) as u16))
            .collect::<Vec<Constraint>>();

        Table::new(rows, widths).header(header).column_spacing(1)
    }

    fn draw_statusline(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        if uidata.active_cmdinput {
            let prompt = match uidata.cmd_mode {
                Some(CMDMode::SearchTable) => "/",
                Some(CMDMode::FilterByColumn) => "filter: ",
                None => ":",
            };
            let line = Line::from(vec![
                Span::from(prompt).yellow().bold(),
                Span::from(uidata.cmdinput.input.as_str()),
            ]);
            frame.render_widget(Paragraph::new(line), area);
            let x = area.x + (prompt.chars().count() + uidata.cmdinput.cursor_pos) as u16;
            frame.set_cursor_position((x.min(area.right().saturating_sub(1)), area.y));
            return;
        }

        let position = if uidata.nrows == 0 {
            "empty".to_string()
        } else {
            format!("{}/{}", uidata.abs_selected_row + 1, uidata.nrows)
        };
        let line = Line::from(vec![
            Span::from(format!(" {} ", uidata.name)).reversed(),
            Span::from(format!(" {position} ")).blue().bold(),
            Span::from(uidata.status_message.as_str()),
        ]);
        frame.render_widget(Paragraph::new(line), area);
    }
}

fn popup_area(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let [area] = Layout::vertical([Constraint::Percentage(percent_y)])
        .flex(ratatui::layout::Flex::Center)
        .areas(area);
    let [area] = Layout::horizontal([Constraint::Percentage(percent_x)])
        .flex(ratatui::layout::Flex::Center)
        .areas(area);
    area
}
