use arboard::Clipboard;
use rayon::prelude::*;
use std::time::Instant;
use tracing::{debug, error, info, trace};

use crate::domain::{CMDMode, HELP_TEXT, Message, TSConfig, TSError};
use crate::inputter::{InputResult, Inputter};
use crate::sorter::{self, ColumnClass, SortOutcome};
use crate::table::{Direction, Table};
use crate::ui::{CMDLINE_HEIGHT, COLUMN_WIDTH_MARGIN, TABLE_HEADER_HEIGHT};

#[derive(Debug, PartialEq)]
pub enum Status {
    READY,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modus {
    TABLE,
    POPUP,
    CMDINPUT,
}

/// A table together with the selection and scroll state shown for it.
struct TableView {
    table: Table,
    cursor_row: usize,
    cursor_column: usize,
    offset_row: usize,
    offset_column: usize,
    visible_columns: Vec<usize>,
    search_results: Vec<(usize, usize)>,
    search_idx: usize,
}

impl TableView {
    fn new(table: Table) -> Self {
        TableView {
            table,
            cursor_row: 0,
            cursor_column: 0,
            offset_row: 0,
            offset_column: 0,
            visible_columns: Vec::new(),
            search_results: Vec::new(),
            search_idx: 0,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ColumnView {
    pub name: String,
    pub width: usize,
    pub data: Vec<String>,
}

#[derive(Default, Clone, Debug)]
pub struct UILayout {
    pub width: usize,
    pub height: usize,
    pub table_width: usize,
    pub table_height: usize,
}

impl UILayout {
    pub fn from_values(ui_width: usize, ui_height: usize) -> Self {
        let layout = UILayout {
            width: ui_width,
            height: ui_height,
            table_width: ui_width,
            table_height: ui_height.saturating_sub(CMDLINE_HEIGHT + TABLE_HEADER_HEIGHT),
        };
        trace!("Build UILayout: {:?}", layout);
        layout
    }
}

/// Everything the ui needs to draw one frame.
pub struct UIData {
    pub name: String,
    pub table: Vec<ColumnView>,
    pub nrows: usize,
    pub selected_row: usize,
    pub selected_column: usize,
    pub abs_selected_row: usize,
    pub show_popup: bool,
    pub popup_title: String,
    pub popup_message: String,
    pub cmdinput: InputResult,
    pub cmd_mode: Option<CMDMode>,
    pub active_cmdinput: bool,
    pub status_message: String,
}

impl UIData {
    pub fn empty() -> Self {
        UIData {
            name: String::new(),
            table: Vec::new(),
            nrows: 0,
            selected_row: 0,
            selected_column: 0,
            abs_selected_row: 0,
            show_popup: false,
            popup_title: String::new(),
            popup_message: String::new(),
            cmdinput: InputResult::default(),
            cmd_mode: None,
            active_cmdinput: false,
            status_message: String::new(),
        }
    }
}

pub struct Model {
    config: TSConfig,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    tables: Vec<TableView>,
    uilayout: UILayout,
    uidata: UIData,
    clipboard: Option<Clipboard>,
    input: Inputter,
    cmd_mode: Option<CMDMode>,
    status_message: String,
}

impl Model {
    /// Mounts `table` into a fresh viewer state sized for the given terminal area.
    pub fn init(config: &TSConfig, table: Table, ui_width: usize, ui_height: usize) -> Self {
        info!("Mounting {}", table);
        let mut model = Self {
            config: config.clone(),
            status: Status::READY,
            modus: Modus::TABLE,
            previous_modus: Modus::TABLE,
            tables: vec![TableView::new(table)],
            uilayout: UILayout::from_values(ui_width, ui_height),
            uidata: UIData::empty(),
            clipboard: None,
            input: Inputter::default(),
            cmd_mode: None,
            status_message: String::new(),
        };
        model.set_status_message("Press ? for help");
        model.update_table_data();
        model
    }

    pub fn get_uidata(&self) -> &UIData {
        &self.uidata
    }

    pub fn raw_keyevents(&self) -> bool {
        self.modus == Modus::CMDINPUT
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    fn view(&self) -> &TableView {
        // The root view is never popped.
        &self.tables[self.tables.len() - 1]
    }

    fn view_mut(&mut self) -> &mut TableView {
        let last = self.tables.len() - 1;
        &mut self.tables[last]
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        self.uidata.status_message = self.status_message.clone();
    }

    pub fn update(&mut self, message: Option<Message>) -> Result<(), TSError> {
        if let Some(msg) = message {
            match self.modus {
                Modus::TABLE => match msg {
                    Message::Quit => self.quit(),
                    Message::MoveDown => self.move_selection_down(1),
                    Message::MoveUp => self.move_selection_up(1),
                    Message::MoveLeft => self.move_selection_left(),
                    Message::MoveRight => self.move_selection_right(),
                    Message::MovePageDown => {
                        self.move_selection_down(self.uilayout.table_height.max(1))
                    }
                    Message::MovePageUp => {
                        self.move_selection_up(self.uilayout.table_height.max(1))
                    }
                    Message::MoveBeginning => self.move_selection_up(usize::MAX),
                    Message::MoveEnd => self.move_selection_down(usize::MAX),
                    Message::SortColumn => self.sort_current_column(),
                    Message::Search => self.enter_cmd_mode(CMDMode::SearchTable),
                    Message::Filter => self.enter_cmd_mode(CMDMode::FilterByColumn),
                    Message::SearchNext => self.search_next(1),
                    Message::SearchPrev => self.search_next(-1),
                    Message::CopyCell => self.copy_cell(),
                    Message::CopyRow => self.copy_row(),
                    Message::CopyTable => self.copy_table(),
                    Message::Enter => self.show_record(),
                    Message::Exit => self.exit(),
                    Message::Help => self.show_popup("Help", HELP_TEXT.to_string()),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    _ => (),
                },
                Modus::POPUP => match msg {
                    Message::Quit => self.quit(),
                    Message::Exit | Message::Enter | Message::Help => self.exit(),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    _ => (),
                },
                Modus::CMDINPUT => match msg {
                    Message::RawKey(key) => self.raw_input(key),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    _ => (),
                },
            }
        }
        Ok(())
    }

    fn ui_resize(&mut self, width: usize, height: usize) {
        trace!(
            "UI was resized! w:{}->{}, h:{}->{}",
            self.uilayout.width, width, self.uilayout.height, height
        );
        self.uilayout = UILayout::from_values(width, height);
        self.update_table_data();
    }

    /// Recomputes the visible window of the current table.
    fn update_table_data(&mut self) {
        let layout = self.uilayout.clone();
        let max_column_width = self.config.max_column_width;
        let view = self.view_mut();
        let nrows = view.table.row_count();
        let ncols = view.table.column_count();

        // Keep the cursor inside the table and on screen.
        view.cursor_row = view.cursor_row.min(nrows.saturating_sub(1));
        view.cursor_column = view.cursor_column.min(ncols.saturating_sub(1));
        if view.cursor_row < view.offset_row {
            view.offset_row = view.cursor_row;
        } else if layout.table_height > 0
            && view.cursor_row >= view.offset_row + layout.table_height
        {
            view.offset_row = view.cursor_row + 1 - layout.table_height;
        }
        if view.cursor_column < view.offset_column {
            view.offset_column = view.cursor_column;
        }

        let widths: Vec<usize> = view
            .table
            .column_widths()
            .into_iter()
            .map(|w| (w + COLUMN_WIDTH_MARGIN).min(max_column_width))
            .collect();

        // Scroll right until the cursor column fits.
        loop {
            view.visible_columns =
                Self::fit_columns(&widths, view.offset_column, layout.table_width);
            if ncols == 0
                || view.visible_columns.contains(&view.cursor_column)
                || view.offset_column >= view.cursor_column
            {
                break;
            }
            view.offset_column += 1;
        }

        let rbegin = view.offset_row;
        let rend = std::cmp::min(rbegin + layout.table_height, nrows);
        let data = view
            .visible_columns
            .iter()
            .map(|&cidx| ColumnView {
                name: view.table.headers[cidx].display(),
                width: widths[cidx],
                data: view.table.rows[rbegin..rend]
                    .iter()
                    .map(|r| r.cells[cidx].text.replace("\r\n", " ↵ ").replace('\n', " ↵ "))
                    .collect(),
            })
            .collect::<Vec<ColumnView>>();

        let selected_column = view
            .visible_columns
            .iter()
            .position(|&c| c == view.cursor_column)
            .unwrap_or(0);

        let cursor_row = view.cursor_row;
        let selected_row = view.cursor_row - view.offset_row;
        let name = match self.tables.len() {
            1 => self.view().table.name.clone(),
            depth => format!("{} ({} views)", self.view().table.name, depth),
        };
        self.uidata.name = name;
        self.uidata.table = data;
        self.uidata.nrows = nrows;
        self.uidata.selected_row = selected_row;
        self.uidata.selected_column = selected_column;
        self.uidata.abs_selected_row = cursor_row;
    }

    // Columns starting at `offset` that fit into `width`; the first one is always shown.
    fn fit_columns(widths: &[usize], offset: usize, width: usize) -> Vec<usize> {
        let mut visible = Vec::new();
        let mut used = 0;
        for (cidx, w) in widths.iter().enumerate().skip(offset) {
            if !visible.is_empty() && used + w + 1 > width {
                break;
            }
            visible.push(cidx);
            used += w + 1;
        }
        visible
    }

    // -------------------- Control handling functions ---------------------- //

    fn sort_current_column(&mut self) {
        let view = self.view_mut();
        let column = view.cursor_column;
        let outcome = sorter::sort_by_column(&mut view.table, column);
        let label = view
            .table
            .headers
            .get(column)
            .map(|h| h.label.clone())
            .unwrap_or_default();

        let message = match outcome {
            SortOutcome::Inert => format!("Column \"{label}\" is not sortable"),
            SortOutcome::Empty(_) => "Nothing to sort".to_string(),
            SortOutcome::Sorted { direction, class } => {
                // Matches point to old positions.
                view.search_results.clear();
                view.search_idx = 0;
                let direction = match direction {
                    Direction::Ascending => "ascending",
                    Direction::Descending => "descending",
                };
                let class = match class {
                    ColumnClass::Numeric => "numeric",
                    ColumnClass::Lexicographic => "text",
                };
                format!("Sorted \"{label}\" {direction} ({class})")
            }
        };
        debug!("{message}");
        self.set_status_message(message);
        self.update_table_data();
    }

    fn select_cell(&mut self, row: usize, column: usize) {
        trace!("Select cell {}:{}", row, column);
        let view = self.view_mut();
        view.cursor_row = row;
        view.cursor_column = column;
        self.update_table_data();
    }

    fn move_selection_up(&mut self, size: usize) {
        let (row, column) = (self.view().cursor_row, self.view().cursor_column);
        self.select_cell(row.saturating_sub(size), column);
    }

    fn move_selection_down(&mut self, size: usize) {
        let view = self.view();
        let last = view.table.row_count().saturating_sub(1);
        let (row, column) = (view.cursor_row.saturating_add(size).min(last), view.cursor_column);
        self.select_cell(row, column);
    }

    fn move_selection_left(&mut self) {
        let (row, column) = (self.view().cursor_row, self.view().cursor_column);
        self.select_cell(row, column.saturating_sub(1));
    }

    fn move_selection_right(&mut self) {
        let view = self.view();
        let last = view.table.column_count().saturating_sub(1);
        let (row, column) = (view.cursor_row, (view.cursor_column + 1).min(last));
        self.select_cell(row, column);
    }

    fn enter_cmd_mode(&mut self, mode: CMDMode) {
        trace!("Entering command mode {:?} ...", mode);
        self.previous_modus = self.modus;
        self.modus = Modus::CMDINPUT;
        self.cmd_mode = Some(mode);
        self.input.clear();

        self.uidata.cmdinput = self.input.get();
        self.uidata.active_cmdinput = true;
        self.uidata.cmd_mode = self.cmd_mode;
    }

    fn raw_input(&mut self, key: ratatui::crossterm::event::KeyEvent) {
        let result = self.input.read(key);
        self.uidata.cmdinput = result.clone();
        if result.finished {
            self.handle_cmd_input(result);
        }
    }

    fn handle_cmd_input(&mut self, result: InputResult) {
        trace!("Handle cmd input {:?}", result);
        self.modus = self.previous_modus;
        self.previous_modus = Modus::CMDINPUT;
        self.uidata.active_cmdinput = false;
        self.uidata.cmd_mode = None;

        let mode = self.cmd_mode.take();
        if result.canceled || result.input.is_empty() {
            return;
        }
        match mode {
            Some(CMDMode::SearchTable) => self.search(&result.input),
            Some(CMDMode::FilterByColumn) => self.filter(&result.input),
            None => info!("Cmd input without mode: {}", result.input),
        }
    }

    // Positions of rows in `table` whose cell in `column` contains `term`, ignoring case.
    fn search_column(term: &str, table: &Table, column: usize) -> Vec<usize> {
        let term = term.to_uppercase();
        table
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| {
                row.cells
                    .get(column)
                    .is_some_and(|c| c.text.to_uppercase().contains(&term))
            })
            .map(|(ridx, _)| ridx)
            .collect()
    }

    fn search(&mut self, term: &str) {
        trace!("Starting search for {} ...", term);
        let start_time = Instant::now();
        let view = self.view_mut();

        let table = &view.table;
        let mut matches: Vec<(usize, usize)> = (0..table.column_count())
            .into_par_iter()
            .flat_map_iter(|cidx| {
                Self::search_column(term, table, cidx)
                    .into_iter()
                    .map(move |ridx| (ridx, cidx))
            })
            .collect();
        matches.sort_unstable();
        trace!(
            "Search found {} matches in {}ms",
            matches.len(),
            start_time.elapsed().as_millis()
        );

        if matches.is_empty() {
            view.search_results.clear();
            self.set_status_message(format!("No match for \"{term}\""));
            return;
        }

        // Start at the first match at or below the cursor
        let cursor_row = view.cursor_row;
        view.search_idx = matches
            .iter()
            .position(|&(row, _)| row >= cursor_row)
            .unwrap_or(0);
        view.search_results = matches;
        self.search_next(0);
    }

    // step is -1, 0 or 1; the match list wraps around at both ends.
    fn search_next(&mut self, step: i32) {
        let view = self.view_mut();
        let total = view.search_results.len();
        if total == 0 {
            self.set_status_message("No search results");
            return;
        }
        view.search_idx = (view.search_idx as i64 + step as i64).rem_euclid(total as i64) as usize;
        let (row, column) = view.search_results[view.search_idx];
        let idx = view.search_idx;
        self.select_cell(row, column);
        self.set_status_message(format!("Search result {}/{}", idx + 1, total));
    }

    fn filter(&mut self, term: &str) {
        trace!("Starting filter for {} ...", term);
        let view = self.view();
        let matches = Self::search_column(term, &view.table, view.cursor_column);
        if matches.is_empty() {
            self.set_status_message(format!("No rows match \"{term}\""));
            return;
        }

        let name = format!("F[{}]", view.table.name);
        let subset = view.table.subset(&matches, name);
        let mut new_view = TableView::new(subset);
        new_view.cursor_column = view.cursor_column;
        new_view.offset_column = view.offset_column;
        let count = matches.len();
        self.tables.push(new_view);
        self.set_status_message(format!("Filtered {count} rows, Esc to go back"));
        self.update_table_data();
    }

    fn exit(&mut self) {
        match self.modus {
            Modus::TABLE => {
                if self.tables.len() > 1 {
                    self.tables.pop();
                    self.set_status_message("");
                    self.update_table_data();
                }
            }
            Modus::POPUP => {
                trace!("Close popup ...");
                self.modus = self.previous_modus;
                self.previous_modus = Modus::POPUP;
                self.uidata.show_popup = false;
            }
            Modus::CMDINPUT => {}
        }
    }

    fn show_popup(&mut self, title: &str, message: String) {
        self.previous_modus = self.modus;
        self.modus = Modus::POPUP;
        self.uidata.popup_title = title.to_string();
        self.uidata.popup_message = message;
        self.uidata.show_popup = true;
    }

    /// Every header with the value of the selected row, sort values included.
    fn record_text(&self) -> Option<String> {
        let view = self.view();
        let row = view.table.rows.get(view.cursor_row)?;
        let label_width = view
            .table
            .headers
            .iter()
            .map(|h| h.label.chars().count())
            .max()
            .unwrap_or(0);
        let lines = view
            .table
            .headers
            .iter()
            .zip(row.cells.iter())
            .map(|(header, cell)| match &cell.sort_value {
                Some(value) => format!(
                    "{:label_width$}  {}  [{}]",
                    header.label, cell.text, value
                ),
                None => format!("{:label_width$}  {}", header.label, cell.text),
            })
            .collect::<Vec<String>>();
        Some(lines.join("\n"))
    }

    fn show_record(&mut self) {
        if let Some(text) = self.record_text() {
            let title = format!("Row {}", self.view().cursor_row + 1);
            self.show_popup(&title, text);
        }
    }

    fn cell_text(&self) -> Option<String> {
        let view = self.view();
        view.table
            .cell(view.cursor_row, view.cursor_column)
            .map(|c| c.text.clone())
    }

    fn wrap_cell_content(c: &str) -> String {
        let needs_escaping = c.contains('"');
        let needs_wrapping = c.chars().any(|c| c == ' ' || c == '\t' || c == ',' || c == '"');
        let mut out = String::from(c);

        if needs_escaping {
            out = out.replace('"', "\"\"");
        }
        if needs_wrapping {
            out = format!("\"{out}\"");
        }
        out
    }

    fn row_text(&self) -> Option<String> {
        let view = self.view();
        let row = view.table.rows.get(view.cursor_row)?;
        Some(
            row.cells
                .iter()
                .map(|c| Self::wrap_cell_content(&c.text))
                .collect::<Vec<String>>()
                .join(","),
        )
    }

    fn copy_cell(&mut self) {
        if let Some(text) = self.cell_text() {
            self.copy_to_clipboard(text, "cell");
        }
    }

    fn copy_row(&mut self) {
        if let Some(text) = self.row_text() {
            self.copy_to_clipboard(text, "row");
        }
    }

    fn copy_table(&mut self) {
        let text = self.view().table.to_tsv();
        self.copy_to_clipboard(text, "table");
    }

    fn copy_to_clipboard(&mut self, text: String, what: &str) {
        if self.clipboard.is_none() {
            match Clipboard::new() {
                Ok(clipboard) => self.clipboard = Some(clipboard),
                Err(e) => {
                    error!("Clipboard unavailable: {:?}", e);
                    self.set_status_message("Clipboard is not available");
                    return;
                }
            }
        }
        let result = match self.clipboard.as_mut() {
            Some(clipboard) => clipboard.set_text(text),
            None => return,
        };
        match result {
            Ok(_) => {
                trace!("Copied {what} to clipboard.");
                self.set_status_message(format!("Copied {what} to clipboard"));
            }
            Err(e) => {
                error!("Error copying to clipboard: {:?}", e);
                self.set_status_message("Copying to the clipboard failed");
            }
        }
    }
}
