use std::io::Error;
use std::path::PathBuf;

use polars::error::PolarsError;
use ratatui::crossterm::event::KeyEvent;

use crate::ingest::RawSheet;

/// Published sheet export this viewer is pointed at by default.
pub const STATS_CSV_URL: &str = "https://docs.google.com/spreadsheets/d/e/2PACX-1vQKXn9XNnhSp0aj8M0cjleJxy8CoLFUvlU3SJxDMvGWa9rcH1r38_YQE9a86twDKJqU0lu-iaeELYYZ/pub?gid=416213007&single=true&output=csv";

// Required facet columns. Rows missing either are dropped.
pub const PLAYER_COLUMN: &str = "Player";
pub const GAME_COLUMN: &str = "Game";

pub const EXPORT_FILE: &str = "player_game_stats.csv";

pub const HELP_TEXT: &str = "\
 statsheet keys

 Tab / Shift-Tab   cycle focus (table, player, game, stat focus)
 Left/Right h/l    previous/next option, or move the table cursor
 Up/Down j/k       move the table cursor
 PgUp/PgDn         previous/next page
 g / G             first / last row
 /                 quick search (Enter keeps it, Esc clears it)
 c                 clear all filters
 s / S             sort current column ascending / descending
 r                 reload the sheet
 e                 export visible rows/columns as CSV
 y / Y             copy cell / row
 ?                 this help
 q                 quit
";

#[derive(Debug)]
pub enum SheetError {
    IoError(Error),
    PolarsError(PolarsError),
    HttpError(reqwest::Error),
    LoadingFailed(String),
    MissingColumns(Vec<String>),
    EmptyBody,
}

impl From<Error> for SheetError {
    fn from(err: Error) -> Self {
        SheetError::IoError(err)
    }
}

impl From<PolarsError> for SheetError {
    fn from(err: PolarsError) -> Self {
        SheetError::PolarsError(err)
    }
}

impl From<reqwest::Error> for SheetError {
    fn from(err: reqwest::Error) -> Self {
        SheetError::HttpError(err)
    }
}

#[derive(Debug, Clone)]
pub struct SheetConfig {
    pub csv_url: String,
    pub out_path: PathBuf,
    pub event_poll_time: u64,
    pub page_size: usize,
    pub max_column_width: usize,
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self {
            csv_url: STATS_CSV_URL.to_string(),
            out_path: PathBuf::from(EXPORT_FILE),
            event_poll_time: 100,
            page_size: 25,
            max_column_width: 32,
        }
    }
}

#[derive(Debug)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    MovePageUp,
    MovePageDown,
    MoveBeginning,
    MoveEnd,
    FocusNext,
    FocusPrev,
    Search,
    RawKey(KeyEvent),
    SortAscending,
    SortDescending,
    Reload,
    Export,
    CopyCell,
    CopyRow,
    ClearFilters,
    Help,
    Exit,
    Resize(usize, usize),
    LoadFinished(u64, Result<RawSheet, SheetError>),
}
