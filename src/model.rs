use std::cmp::Ordering;
use std::sync::mpsc::Sender;
use std::time::Instant;

use arboard::Clipboard;
use chrono::Local;
use ratatui::crossterm::event::KeyEvent;
use rayon::prelude::*;
use regex::Regex;
use tracing::{debug, error, info, trace, warn};

use crate::controls::{Focus, SelectControl};
use crate::domain::{GAME_COLUMN, HELP_TEXT, Message, PLAYER_COLUMN, SheetConfig, SheetError};
use crate::export;
use crate::ingest::{self, RawSheet};
use crate::inputter::{InputResult, Inputter};
use crate::sheet::{self, Sheet, cell_cmp};
use crate::ui::{COLUMN_WIDTH_MARGIN, TABLE_CHROME_HEIGHT};

#[derive(Debug, PartialEq)]
pub enum Status {
    EMPTY,
    LOADING,
    READY,
    QUITTING,
}

#[derive(Debug, Clone, Copy)]
enum Modus {
    TABLE,
    SEARCH,
    POPUP,
}

/// The mounted table. Lifecycle is none -> mounted -> (torn down) ->
/// mounted; a reload replaces the whole handle so nothing from the
/// previous dataset can leak into the next one.
struct TableHandle {
    order: Vec<usize>,           // full display order over sheet rows
    rows: Vec<usize>,            // filtered mapping, in `order` order
    visible_columns: Vec<usize>, // schema indices, stat focus applied
    cursor_row: usize,           // within the rendered page
    cursor_column: usize,        // within visible_columns
    offset_row: usize,           // index into `rows` of the first page row
}

#[derive(Clone)]
pub struct ControlView {
    pub label: String,
    pub value: String,
    pub focused: bool,
}

pub struct UIData {
    pub title: String,
    pub header: Vec<(String, u16)>,
    pub rows: Vec<Vec<String>>,
    pub selected_row: usize,
    pub selected_column: usize,
    pub controls: Vec<ControlView>,
    pub search: InputResult,
    pub active_search: bool,
    pub nrows: usize,
    pub total_rows: usize,
    pub abs_selected_row: usize,
    pub page: usize,
    pub pages: usize,
    pub show_popup: bool,
    pub popup_message: String,
    pub status_message: String,
    pub status_is_error: bool,
    pub last_loaded: Option<String>,
    pub last_update: Instant,
}

impl UIData {
    pub fn empty() -> Self {
        UIData {
            title: String::new(),
            header: Vec::new(),
            rows: Vec::new(),
            selected_row: 0,
            selected_column: 0,
            controls: Vec::new(),
            search: InputResult::default(),
            active_search: false,
            nrows: 0,
            total_rows: 0,
            abs_selected_row: 0,
            page: 1,
            pages: 1,
            show_popup: false,
            popup_message: String::new(),
            status_message: String::new(),
            status_is_error: false,
            last_loaded: None,
            last_update: Instant::now(),
        }
    }
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
            table_width: ui_width.saturating_sub(2),
            table_height: ui_height.saturating_sub(TABLE_CHROME_HEIGHT),
        };
        trace!("Build UILayout: {:?}", layout);
        layout
    }
}

pub struct Model {
    config: SheetConfig,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    sheet: Option<Sheet>,
    table: Option<TableHandle>,
    player_filter: SelectControl,
    game_filter: SelectControl,
    stat_focus: SelectControl,
    focus: Focus,
    input: Inputter,
    last_input: InputResult,
    query: String,
    load_seq: u64,
    inflight: Option<u64>,
    tx: Sender<Message>,
    clipboard: Option<Clipboard>,
    uilayout: UILayout,
    uidata: UIData,
    status_message: String,
    status_is_error: bool,
    last_loaded: Option<String>,
    last_update: Instant,
}

impl Model {
    pub fn init(
        config: &SheetConfig,
        tx: Sender<Message>,
        ui_width: usize,
        ui_height: usize,
    ) -> Result<Self, SheetError> {
        let clipboard = Clipboard::new().ok();
        if clipboard.is_none() {
            debug!("No clipboard available, copy will be disabled");
        }
        let mut model = Self {
            config: config.clone(),
            status: Status::EMPTY,
            modus: Modus::TABLE,
            previous_modus: Modus::TABLE,
            sheet: None,
            table: None,
            player_filter: SelectControl::new("Player", "All players"),
            game_filter: SelectControl::new("Game", "All games"),
            stat_focus: SelectControl::new("Stat", "All (show every stat)"),
            focus: Focus::Table,
            input: Inputter::default(),
            last_input: InputResult::default(),
            query: String::new(),
            load_seq: 0,
            inflight: None,
            tx,
            clipboard,
            uilayout: UILayout::from_values(ui_width, ui_height),
            uidata: UIData::empty(),
            status_message: String::new(),
            status_is_error: false,
            last_loaded: None,
            last_update: Instant::now(),
        };
        model.input.set_width(model.uilayout.width);
        model.update_uidata();
        Ok(model)
    }

    /// Flip into the loading state and hand out the sequence token the
    /// matching completion must carry. Kept separate from the fetch so the
    /// whole completion path is drivable without a network.
    pub fn begin_load(&mut self) -> u64 {
        self.load_seq += 1;
        self.inflight = Some(self.load_seq);
        self.status = Status::LOADING;
        self.set_status_message("Loading CSV…", false);
        self.load_seq
    }

    pub fn start_load(&mut self) {
        if self.inflight.is_some() {
            debug!("A load is already in flight, ignoring");
            return;
        }
        let seq = self.begin_load();
        ingest::spawn_fetch(self.config.csv_url.clone(), seq, self.tx.clone());
    }

    pub fn get_uidata(&self) -> &UIData {
        &self.uidata
    }

    /// Raw key events bypass the controller key map while the quick-search
    /// box is active.
    pub fn raw_keyevents(&self) -> bool {
        matches!(self.modus, Modus::SEARCH)
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    pub fn update(&mut self, message: Message) -> Result<(), SheetError> {
        match self.modus {
            Modus::TABLE => match message {
                Message::Quit => self.quit(),
                Message::LoadFinished(seq, result) => self.finish_load(seq, result),
                Message::Reload => self.start_load(),
                Message::FocusNext => self.shift_focus(true),
                Message::FocusPrev => self.shift_focus(false),
                Message::MoveLeft => self.move_left(),
                Message::MoveRight => self.move_right(),
                Message::MoveUp => self.move_selection_up(1),
                Message::MoveDown => self.move_selection_down(1),
                Message::MovePageUp => self.move_selection_up(self.page_rows()),
                Message::MovePageDown => self.move_selection_down(self.page_rows()),
                Message::MoveBeginning => self.select_abs(0),
                Message::MoveEnd => self.select_abs(usize::MAX),
                Message::Search => self.enter_search(),
                Message::SortAscending => self.sort_current_column(true),
                Message::SortDescending => self.sort_current_column(false),
                Message::Export => self.export_visible(),
                Message::CopyCell => self.copy_table_cell(),
                Message::CopyRow => self.copy_table_row(),
                Message::ClearFilters => self.clear_filters(),
                Message::Help => self.show_help(),
                Message::Resize(width, height) => self.ui_resize(width, height),
                Message::Exit | Message::RawKey(_) => {}
            },
            Modus::SEARCH => match message {
                Message::RawKey(key) => self.raw_input(key),
                Message::LoadFinished(seq, result) => self.finish_load(seq, result),
                Message::Resize(width, height) => self.ui_resize(width, height),
                _ => {}
            },
            Modus::POPUP => match message {
                Message::Quit => self.quit(),
                Message::Exit | Message::Help => self.close_popup(),
                Message::LoadFinished(seq, result) => self.finish_load(seq, result),
                Message::Resize(width, height) => self.ui_resize(width, height),
                _ => {}
            },
        }
        self.last_update = Instant::now();
        Ok(())
    }

    // -------------------- load pipeline ---------------------- //

    fn finish_load(&mut self, seq: u64, result: Result<RawSheet, SheetError>) {
        if self.inflight != Some(seq) {
            debug!("Ignoring stale load {seq}, current {:?}", self.inflight);
            return;
        }
        self.inflight = None;

        match result {
            Ok(raw) => match sheet::derive(&raw) {
                Ok(sheet) => self.mount(sheet, &raw.warnings),
                Err(SheetError::MissingColumns(missing)) => {
                    error!("Sheet unusable, missing columns: {missing:?}");
                    self.set_status_message(
                        format!("CSV is missing required columns: {}", missing.join(", ")),
                        true,
                    );
                    self.settle_status();
                }
                Err(err) => {
                    error!("Deriving the sheet failed: {err:?}");
                    self.set_status_message("CSV could not be processed, see the log.", true);
                    self.settle_status();
                }
            },
            Err(err) => {
                error!("Loading the sheet failed: {err:?}");
                self.set_status_message(
                    "Failed to load CSV. Check the sheet URL and that it is published and reachable.",
                    true,
                );
                self.settle_status();
            }
        }
    }

    /// A failed load leaves whatever was mounted before untouched.
    fn settle_status(&mut self) {
        self.status = if self.table.is_some() {
            Status::READY
        } else {
            Status::EMPTY
        };
    }

    fn mount(&mut self, sheet: Sheet, warnings: &[String]) {
        let start_time = Instant::now();
        if self.table.take().is_some() {
            trace!("Tearing down the mounted table before rebuilding");
        }

        self.player_filter.bind(&sheet.players);
        self.game_filter.bind(&sheet.games);
        self.stat_focus.bind(&sheet.stat_columns);
        self.query.clear();
        self.input.clear();
        self.last_input = self.input.get();

        let mut table = TableHandle {
            order: (0..sheet.nrows).collect(),
            rows: Vec::new(),
            visible_columns: (0..sheet.schema.len()).collect(),
            cursor_row: 0,
            cursor_column: 0,
            offset_row: 0,
        };
        Self::initial_sort(&mut table.order, &sheet);

        self.sheet = Some(sheet);
        self.table = Some(table);
        self.status = Status::READY;
        self.modus = Modus::TABLE;
        self.focus = Focus::Table;
        self.last_loaded = Some(format!("Loaded {}", Local::now().format("%Y-%m-%d %H:%M:%S")));
        self.apply_filters();

        info!(
            "Mounted table in {}ms",
            start_time.elapsed().as_millis()
        );
        if warnings.is_empty() {
            self.set_status_message("", false);
        } else {
            warn!("Sheet loaded with parse warnings: {warnings:?}");
            self.set_status_message(
                "CSV parsed with errors. Continuing with the rows that parsed.",
                true,
            );
        }
    }

    /// Initial display order: first two schema columns, both ascending.
    fn initial_sort(order: &mut [usize], sheet: &Sheet) {
        let keys: Vec<usize> = (0..sheet.schema.len().min(2)).collect();
        if keys.is_empty() {
            return;
        }
        order.sort_by(|&a, &b| {
            let mut ord = Ordering::Equal;
            for &ci in &keys {
                let col = &sheet.columns[ci];
                ord = cell_cmp(&col.cells[a], &col.cells[b], col.numeric);
                if ord != Ordering::Equal {
                    break;
                }
            }
            ord
        });
    }

    // -------------------- filter application ---------------------- //

    /// Re-evaluate the full filter state (player, game, quick search) and
    /// rebuild the row mapping. Row filters reset paging.
    fn apply_filters(&mut self) {
        let Some(sheet) = self.sheet.as_ref() else {
            return;
        };
        let Some(table) = self.table.as_mut() else {
            return;
        };

        let player_filter = Self::exact_filter(self.player_filter.value());
        let game_filter = Self::exact_filter(self.game_filter.value());
        let needle = self.query.trim().to_lowercase();

        let player_col = sheet.column_index(PLAYER_COLUMN).unwrap_or(0);
        let game_col = sheet.column_index(GAME_COLUMN).unwrap_or(0);

        let start_time = Instant::now();
        let rows: Vec<usize> = table
            .order
            .par_iter()
            .copied()
            .filter(|&ri| {
                if let Some(re) = &player_filter
                    && !re.is_match(&sheet.columns[player_col].cells[ri].render())
                {
                    return false;
                }
                if let Some(re) = &game_filter
                    && !re.is_match(&sheet.columns[game_col].cells[ri].render())
                {
                    return false;
                }
                if needle.is_empty() {
                    return true;
                }
                sheet
                    .columns
                    .iter()
                    .any(|col| col.cells[ri].render().to_lowercase().contains(&needle))
            })
            .collect();

        trace!(
            "Filters leave {}/{} rows in {}ms",
            rows.len(),
            table.order.len(),
            start_time.elapsed().as_millis()
        );

        table.rows = rows;
        table.offset_row = 0;
        table.cursor_row = 0;
        self.update_uidata();
    }

    /// Anchored and escaped so a facet value matches literally, regex
    /// metacharacters ("A.J.") included. Empty selection clears the filter.
    fn exact_filter(value: Option<&str>) -> Option<Regex> {
        let value = value?;
        match Regex::new(&format!("^{}$", regex::escape(value))) {
            Ok(re) => Some(re),
            Err(err) => {
                error!("Facet filter rejected: {err}");
                None
            }
        }
    }

    /// Stat focus: everything, or Player/Game plus the chosen stat. Unlike
    /// the row filters this keeps the paging position.
    fn apply_visibility(&mut self) {
        let Some(sheet) = self.sheet.as_ref() else {
            return;
        };
        let Some(table) = self.table.as_mut() else {
            return;
        };

        let choice = self.stat_focus.value();
        table.visible_columns = (0..sheet.schema.len())
            .filter(|&ci| match choice {
                None => true,
                Some(stat) => {
                    let name = &sheet.schema[ci];
                    name == PLAYER_COLUMN || name == GAME_COLUMN || name == stat
                }
            })
            .collect();
        table.cursor_column = table
            .cursor_column
            .min(table.visible_columns.len().saturating_sub(1));
        self.update_uidata();
    }

    fn clear_filters(&mut self) {
        self.player_filter.clear();
        self.game_filter.clear();
        self.stat_focus.clear();
        self.query.clear();
        self.input.clear();
        self.last_input = self.input.get();
        self.apply_visibility();
        self.apply_filters();
        self.set_status_message("Filters cleared", false);
    }

    // -------------------- quick search input ---------------------- //

    fn enter_search(&mut self) {
        trace!("Entering quick search");
        self.previous_modus = self.modus;
        self.modus = Modus::SEARCH;
        self.input.clear();
        self.input.set(&self.query);
        self.last_input = self.input.get();
        self.update_uidata();
    }

    fn raw_input(&mut self, key: KeyEvent) {
        self.last_input = self.input.read(key);
        let changed = self.last_input.input != self.query;
        if changed {
            self.query = self.last_input.input.clone();
        }
        if self.last_input.finished {
            self.modus = self.previous_modus;
            self.previous_modus = Modus::SEARCH;
        }
        if changed {
            // the table refilters on every keystroke
            self.apply_filters();
        } else {
            self.update_uidata();
        }
    }

    // -------------------- control handling ---------------------- //

    fn shift_focus(&mut self, forward: bool) {
        self.focus = if forward {
            self.focus.next()
        } else {
            self.focus.prev()
        };
        self.update_uidata();
    }

    fn move_left(&mut self) {
        match self.focus {
            Focus::Table => self.move_table_selection_left(),
            Focus::PlayerFilter => {
                self.player_filter.select_prev();
                self.apply_filters();
            }
            Focus::GameFilter => {
                self.game_filter.select_prev();
                self.apply_filters();
            }
            Focus::StatFocus => {
                self.stat_focus.select_prev();
                self.apply_visibility();
            }
        }
    }

    fn move_right(&mut self) {
        match self.focus {
            Focus::Table => self.move_table_selection_right(),
            Focus::PlayerFilter => {
                self.player_filter.select_next();
                self.apply_filters();
            }
            Focus::GameFilter => {
                self.game_filter.select_next();
                self.apply_filters();
            }
            Focus::StatFocus => {
                self.stat_focus.select_next();
                self.apply_visibility();
            }
        }
    }

    fn move_table_selection_left(&mut self) {
        if let Some(table) = self.table.as_mut() {
            table.cursor_column = table.cursor_column.saturating_sub(1);
            self.update_uidata();
        }
    }

    fn move_table_selection_right(&mut self) {
        if let Some(table) = self.table.as_mut() {
            if table.cursor_column + 1 < table.visible_columns.len() {
                table.cursor_column += 1;
            }
            self.update_uidata();
        }
    }

    fn selected_abs(&self) -> Option<usize> {
        self.table
            .as_ref()
            .filter(|t| !t.rows.is_empty())
            .map(|t| t.offset_row + t.cursor_row)
    }

    /// Select by absolute index into the filtered rows; the page offset
    /// stays page-aligned like the widget's pager.
    fn select_abs(&mut self, abs: usize) {
        let page = self.page_rows();
        let Some(table) = self.table.as_mut() else {
            return;
        };
        if table.rows.is_empty() {
            table.offset_row = 0;
            table.cursor_row = 0;
            self.update_uidata();
            return;
        }
        let abs = abs.min(table.rows.len() - 1);
        if abs < table.offset_row || abs >= table.offset_row + page {
            table.offset_row = (abs / page) * page;
        }
        table.cursor_row = abs - table.offset_row;
        self.update_uidata();
    }

    fn move_selection_up(&mut self, size: usize) {
        if let Some(abs) = self.selected_abs() {
            self.select_abs(abs.saturating_sub(size));
        }
    }

    fn move_selection_down(&mut self, size: usize) {
        if let Some(abs) = self.selected_abs() {
            self.select_abs(abs + size);
        }
    }

    fn sort_current_column(&mut self, ascending: bool) {
        let name = {
            let (Some(sheet), Some(table)) = (self.sheet.as_ref(), self.table.as_mut()) else {
                return;
            };
            if table.visible_columns.is_empty() {
                return;
            }
            let ci = table.visible_columns[table.cursor_column];
            let col = &sheet.columns[ci];
            table.order.sort_by(|&a, &b| {
                let ord = cell_cmp(&col.cells[a], &col.cells[b], col.numeric);
                if ascending { ord } else { ord.reverse() }
            });
            col.name.clone()
        };
        self.apply_filters();
        self.set_status_message(
            format!(
                "Sorted by {name} {}",
                if ascending { "ascending" } else { "descending" }
            ),
            false,
        );
    }

    // -------------------- export and clipboard ---------------------- //

    fn export_visible(&mut self) {
        let (message, is_error) = match (self.sheet.as_ref(), self.table.as_ref()) {
            (Some(sheet), Some(table)) => {
                match export::write_visible(
                    sheet,
                    &table.rows,
                    &table.visible_columns,
                    &self.config.out_path,
                ) {
                    Ok(count) => (
                        format!(
                            "Exported {count} rows to {}",
                            self.config.out_path.display()
                        ),
                        false,
                    ),
                    Err(err) => {
                        error!("Export failed: {err:?}");
                        ("Export failed, see the log.".to_string(), true)
                    }
                }
            }
            _ => ("Nothing to export".to_string(), true),
        };
        self.set_status_message(message, is_error);
    }

    fn copy_table_cell(&mut self) {
        let cell = match (self.sheet.as_ref(), self.table.as_ref()) {
            (Some(sheet), Some(table)) if !table.rows.is_empty() => {
                let ri = table.rows[table.offset_row + table.cursor_row];
                let ci = table.visible_columns[table.cursor_column];
                sheet.columns[ci].cells[ri].render()
            }
            _ => return,
        };
        self.copy_to_clipboard(cell);
    }

    fn copy_table_row(&mut self) {
        let row = match (self.sheet.as_ref(), self.table.as_ref()) {
            (Some(sheet), Some(table)) if !table.rows.is_empty() => {
                let ri = table.rows[table.offset_row + table.cursor_row];
                table
                    .visible_columns
                    .iter()
                    .map(|&ci| Self::wrap_cell_content(&sheet.columns[ci].cells[ri].render()))
                    .collect::<Vec<String>>()
                    .join(",")
            }
            _ => return,
        };
        self.copy_to_clipboard(row);
    }

    fn wrap_cell_content(content: &str) -> String {
        let needs_escaping = content.contains('"');
        let needs_wrapping = content.chars().any(|c| c == ' ' || c == '\t' || c == ',');
        let mut out = String::from(content);
        if needs_escaping {
            out = out.replace('"', "\"\"");
        }
        if needs_wrapping || needs_escaping {
            out = format!("\"{out}\"");
        }
        out
    }

    fn copy_to_clipboard(&mut self, content: String) {
        match self.clipboard.as_mut() {
            Some(clipboard) => match clipboard.set_text(content) {
                Ok(_) => {
                    trace!("Copied to clipboard");
                    self.set_status_message("Copied", false);
                }
                Err(err) => {
                    trace!("Error copying to clipboard: {err:?}");
                    self.set_status_message("Copy failed", true);
                }
            },
            None => self.set_status_message("Clipboard unavailable", true),
        }
    }

    // -------------------- popup, resize, status ---------------------- //

    fn show_help(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::POPUP;
        self.update_uidata();
    }

    fn close_popup(&mut self) {
        self.modus = self.previous_modus;
        self.previous_modus = Modus::POPUP;
        self.update_uidata();
    }

    fn ui_resize(&mut self, width: usize, height: usize) {
        trace!(
            "UI was resized! w:{}->{}, h:{}->{}",
            self.uilayout.width, width, self.uilayout.height, height
        );
        self.uilayout = UILayout::from_values(width, height);
        self.input.set_width(self.uilayout.width);
        if let Some(abs) = self.selected_abs() {
            self.select_abs(abs);
        } else {
            self.update_uidata();
        }
    }

    fn set_status_message(&mut self, message: impl Into<String>, is_error: bool) {
        self.status_message = message.into();
        self.status_is_error = is_error;
        self.uidata.status_message = self.status_message.clone();
        self.uidata.status_is_error = is_error;
        self.uidata.last_update = Instant::now();
    }

    fn page_rows(&self) -> usize {
        self.config.page_size.min(self.uilayout.table_height.max(1))
    }

    fn update_uidata(&mut self) {
        let controls = vec![
            ControlView {
                label: self.player_filter.label.clone(),
                value: self.player_filter.display().to_string(),
                focused: self.focus == Focus::PlayerFilter,
            },
            ControlView {
                label: self.game_filter.label.clone(),
                value: self.game_filter.display().to_string(),
                focused: self.focus == Focus::GameFilter,
            },
            ControlView {
                label: self.stat_focus.label.clone(),
                value: self.stat_focus.display().to_string(),
                focused: self.focus == Focus::StatFocus,
            },
        ];

        let page_rows = self.page_rows();
        let (header, rows, selected_row, selected_column, nrows, total_rows, abs, page, pages) =
            match (&self.sheet, &self.table) {
                (Some(sheet), Some(table)) => {
                    let rbegin = table.offset_row;
                    let rend = (rbegin + page_rows).min(table.rows.len());
                    let header: Vec<(String, u16)> = table
                        .visible_columns
                        .iter()
                        .map(|&ci| {
                            let col = &sheet.columns[ci];
                            let width = col
                                .name
                                .len()
                                .max(col.max_width)
                                .saturating_add(COLUMN_WIDTH_MARGIN)
                                .min(self.config.max_column_width);
                            (col.name.clone(), width as u16)
                        })
                        .collect();
                    let rows: Vec<Vec<String>> = table.rows[rbegin..rend]
                        .iter()
                        .map(|&ri| {
                            table
                                .visible_columns
                                .iter()
                                .map(|&ci| {
                                    sheet.columns[ci].cells[ri]
                                        .render()
                                        .replace("\r\n", " ↵ ")
                                        .replace('\n', " ↵ ")
                                })
                                .collect()
                        })
                        .collect();
                    let nrows = table.rows.len();
                    let pages = if nrows == 0 {
                        1
                    } else {
                        nrows.div_ceil(page_rows)
                    };
                    let page = table.offset_row / page_rows + 1;
                    (
                        header,
                        rows,
                        table.cursor_row,
                        table.cursor_column,
                        nrows,
                        sheet.nrows,
                        rbegin + table.cursor_row,
                        page,
                        pages,
                    )
                }
                _ => (Vec::new(), Vec::new(), 0, 0, 0, 0, 0, 1, 1),
            };

        self.uidata = UIData {
            title: "player_game_stats".to_string(),
            header,
            rows,
            selected_row,
            selected_column,
            controls,
            search: self.last_input.clone(),
            active_search: matches!(self.modus, Modus::SEARCH),
            nrows,
            total_rows,
            abs_selected_row: abs,
            page,
            pages,
            show_popup: matches!(self.modus, Modus::POPUP),
            popup_message: if matches!(self.modus, Modus::POPUP) {
                HELP_TEXT.to_string()
            } else {
                String::new()
            },
            status_message: self.status_message.clone(),
            status_is_error: self.status_is_error,
            last_loaded: self.last_loaded.clone(),
            last_update: Instant::now(),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::parse_bytes;
    use ratatui::crossterm::event::KeyCode;
    use std::sync::mpsc;

    fn fresh_model() -> Model {
        let (tx, _rx) = mpsc::channel();
        Model::init(&SheetConfig::default(), tx, 120, 40).unwrap()
    }

    fn load(model: &mut Model, csv: &str) {
        let seq = model.begin_load();
        let raw = parse_bytes(csv.as_bytes().to_vec()).unwrap();
        model.update(Message::LoadFinished(seq, Ok(raw))).unwrap();
    }

    fn loaded_model(csv: &str) -> Model {
        let mut model = fresh_model();
        load(&mut model, csv);
        model
    }

    fn type_chars(model: &mut Model, text: &str) {
        for c in text.chars() {
            model
                .update(Message::RawKey(KeyCode::Char(c).into()))
                .unwrap();
        }
    }

    const BASE_CSV: &str = "\
Player,Game,Score,Fouls
Jo,Chess,10,1
Joe,Chess,7,0
Jo,Go,3,2
A.J.,Chess,5,1
AxJx,Go,4,0
";

    #[test]
    fn mounts_with_initial_two_column_sort() {
        let model = loaded_model("Player,Game,Score\nBo,Go,1\nAnn,Go,2\nAnn,Chess,3\n");
        let ui = model.get_uidata();
        assert_eq!(model.status, Status::READY);
        let first_two: Vec<(&str, &str)> = ui
            .rows
            .iter()
            .map(|r| (r[0].as_str(), r[1].as_str()))
            .collect();
        assert_eq!(
            first_two,
            vec![("Ann", "Chess"), ("Ann", "Go"), ("Bo", "Go")]
        );
    }

    #[test]
    fn player_selection_is_exact_not_substring() {
        let mut model = loaded_model(BASE_CSV);
        // focus the player select and pick the first facet value ("A.J."
        // sorts first, then "AxJx", "Jo", "Joe")
        model.update(Message::FocusNext).unwrap();
        model.update(Message::MoveRight).unwrap(); // A.J.
        model.update(Message::MoveRight).unwrap(); // AxJx
        model.update(Message::MoveRight).unwrap(); // Jo
        assert_eq!(model.get_uidata().nrows, 2);
        for row in &model.get_uidata().rows {
            assert_eq!(row[0], "Jo"); // never "Joe"
        }
    }

    #[test]
    fn regex_metacharacters_match_literally() {
        let mut model = loaded_model(BASE_CSV);
        model.update(Message::FocusNext).unwrap();
        model.update(Message::MoveRight).unwrap(); // "A.J."
        let ui = model.get_uidata();
        assert_eq!(ui.nrows, 1);
        assert_eq!(ui.rows[0][0], "A.J."); // "AxJx" must not leak in
    }

    #[test]
    fn player_and_game_selections_compose() {
        let mut model = loaded_model(BASE_CSV);
        model.update(Message::FocusNext).unwrap(); // player
        model.update(Message::MoveRight).unwrap();
        model.update(Message::MoveRight).unwrap();
        model.update(Message::MoveRight).unwrap(); // Jo
        model.update(Message::FocusNext).unwrap(); // game
        model.update(Message::MoveRight).unwrap(); // Chess
        let ui = model.get_uidata();
        assert_eq!(ui.nrows, 1);
        assert_eq!(ui.rows[0][0], "Jo");
        assert_eq!(ui.rows[0][1], "Chess");
    }

    #[test]
    fn empty_selection_clears_the_filter() {
        let mut model = loaded_model(BASE_CSV);
        model.update(Message::FocusNext).unwrap();
        model.update(Message::MoveRight).unwrap();
        assert!(model.get_uidata().nrows < 5);
        model.update(Message::MoveLeft).unwrap(); // back to the placeholder
        assert_eq!(model.get_uidata().nrows, 5);
    }

    #[test]
    fn stat_focus_isolates_one_stat_and_restores() {
        let mut model = loaded_model(BASE_CSV);
        model.update(Message::FocusNext).unwrap();
        model.update(Message::FocusNext).unwrap();
        model.update(Message::FocusNext).unwrap(); // stat focus
        model.update(Message::MoveRight).unwrap(); // Score
        let names: Vec<&str> = model
            .get_uidata()
            .header
            .iter()
            .map(|(n, _)| n.as_str())
            .collect();
        assert_eq!(names, vec!["Player", "Game", "Score"]);

        model.update(Message::MoveLeft).unwrap(); // back to "All"
        let names: Vec<&str> = model
            .get_uidata()
            .header
            .iter()
            .map(|(n, _)| n.as_str())
            .collect();
        assert_eq!(names, vec!["Player", "Game", "Score", "Fouls"]);
    }

    #[test]
    fn quick_search_is_case_insensitive_substring_over_all_columns() {
        let mut model = loaded_model(BASE_CSV);
        model.update(Message::Search).unwrap();
        type_chars(&mut model, "chess");
        assert_eq!(model.get_uidata().nrows, 3);
        model.update(Message::RawKey(KeyCode::Esc.into())).unwrap();
        assert_eq!(model.get_uidata().nrows, 5); // Esc cancels and clears
    }

    #[test]
    fn search_composes_with_facet_filters() {
        let mut model = loaded_model(BASE_CSV);
        model.update(Message::FocusNext).unwrap();
        model.update(Message::MoveRight).unwrap();
        model.update(Message::MoveRight).unwrap();
        model.update(Message::MoveRight).unwrap(); // Jo
        model.update(Message::Search).unwrap();
        type_chars(&mut model, "go");
        model
            .update(Message::RawKey(KeyCode::Enter.into()))
            .unwrap();
        let ui = model.get_uidata();
        assert_eq!(ui.nrows, 1);
        assert_eq!(ui.rows[0][1], "Go");
    }

    #[test]
    fn reload_replaces_table_and_controls_wholesale() {
        let mut model = loaded_model(BASE_CSV);
        model.update(Message::Search).unwrap();
        type_chars(&mut model, "chess");
        model
            .update(Message::RawKey(KeyCode::Enter.into()))
            .unwrap();

        load(
            &mut model,
            "Player,Game,Wins\nCleo,Darts,2\nDee,Darts,5\n",
        );
        let ui = model.get_uidata();
        let names: Vec<&str> = ui.header.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["Player", "Game", "Wins"]);
        assert_eq!(ui.nrows, 2); // stale query did not survive
        assert_eq!(ui.controls[0].value, "All players");
        assert!(ui.last_loaded.is_some());
    }

    #[test]
    fn transport_failure_leaves_previous_table_untouched() {
        let mut model = loaded_model(BASE_CSV);
        let seq = model.begin_load();
        model
            .update(Message::LoadFinished(
                seq,
                Err(SheetError::LoadingFailed("boom".into())),
            ))
            .unwrap();
        let ui = model.get_uidata();
        assert!(ui.status_is_error);
        assert_eq!(ui.header.len(), 4); // old table still mounted
        assert_eq!(model.status, Status::READY);
    }

    #[test]
    fn transport_failure_without_a_table_mounts_nothing() {
        let mut model = fresh_model();
        let seq = model.begin_load();
        model
            .update(Message::LoadFinished(
                seq,
                Err(SheetError::LoadingFailed("boom".into())),
            ))
            .unwrap();
        let ui = model.get_uidata();
        assert!(ui.status_is_error);
        assert!(ui.header.is_empty());
        assert!(ui.rows.is_empty());
        assert_eq!(model.status, Status::EMPTY);
    }

    #[test]
    fn stale_completions_are_discarded() {
        let mut model = loaded_model(BASE_CSV);
        let _seq = model.begin_load();
        let raw = parse_bytes(b"Player,Game\nZed,Zilch\n".to_vec()).unwrap();
        model.update(Message::LoadFinished(99, Ok(raw))).unwrap();
        // old schema still in place, new data ignored
        assert_eq!(model.get_uidata().header.len(), 4);
        assert_eq!(model.status, Status::LOADING);
    }

    #[test]
    fn missing_facet_headers_are_a_fatal_load_error() {
        let mut model = fresh_model();
        let seq = model.begin_load();
        let raw = parse_bytes(b"Person,Match\nAnn,Chess\n".to_vec()).unwrap();
        model.update(Message::LoadFinished(seq, Ok(raw))).unwrap();
        let ui = model.get_uidata();
        assert!(ui.status_is_error);
        assert!(ui.status_message.contains("Player"));
        assert!(ui.header.is_empty());
    }

    #[test]
    fn parse_warnings_surface_but_do_not_block_the_table() {
        let mut model = fresh_model();
        let seq = model.begin_load();
        let raw =
            parse_bytes(b"Player,Game,Score\nAnn,Chess,10\nBo,Go,7,junk,junk\n".to_vec()).unwrap();
        model.update(Message::LoadFinished(seq, Ok(raw))).unwrap();
        let ui = model.get_uidata();
        assert!(ui.status_is_error);
        assert!(ui.status_message.contains("parsed with errors"));
        assert_eq!(ui.nrows, 2);
        assert_eq!(model.status, Status::READY);
    }

    #[test]
    fn row_filters_reset_paging_but_stat_focus_keeps_it() {
        let mut csv = String::from("Player,Game,Score\n");
        for i in 0..60 {
            csv.push_str(&format!("P{i:02},Game {},{}\n", i % 4, i));
        }
        let mut model = loaded_model(&csv);
        model.update(Message::MovePageDown).unwrap();
        assert_eq!(model.get_uidata().page, 2);

        // stat focus keeps the page
        model.update(Message::FocusNext).unwrap();
        model.update(Message::FocusNext).unwrap();
        model.update(Message::FocusNext).unwrap();
        model.update(Message::MoveRight).unwrap();
        assert_eq!(model.get_uidata().page, 2);

        // a row filter resets it
        model.update(Message::FocusPrev).unwrap(); // game filter
        model.update(Message::MoveRight).unwrap();
        assert_eq!(model.get_uidata().page, 1);
    }

    #[test]
    fn zero_survivors_mounts_headers_with_no_rows() {
        let model = loaded_model("Player,Game,Score\n,Chess,1\nBo,,2\n");
        let ui = model.get_uidata();
        assert_eq!(ui.header.len(), 3);
        assert_eq!(ui.nrows, 0);
        assert!(ui.rows.is_empty());
        assert_eq!(ui.controls[0].value, "All players");
    }

    #[test]
    fn clear_filters_restores_everything() {
        let mut model = loaded_model(BASE_CSV);
        model.update(Message::FocusNext).unwrap();
        model.update(Message::MoveRight).unwrap();
        model.update(Message::FocusNext).unwrap();
        model.update(Message::FocusNext).unwrap();
        model.update(Message::MoveRight).unwrap();
        assert!(model.get_uidata().header.len() < 4);

        model.update(Message::ClearFilters).unwrap();
        let ui = model.get_uidata();
        assert_eq!(ui.nrows, 5);
        assert_eq!(ui.header.len(), 4);
    }

    #[test]
    fn overlapping_loads_are_not_started() {
        let mut model = fresh_model();
        model.begin_load();
        let seq_before = model.load_seq;
        model.start_load(); // must not spawn or bump while in flight
        assert_eq!(model.load_seq, seq_before);
    }
}
