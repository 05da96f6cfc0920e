use std::cmp::Ordering;
use std::collections::HashSet;
use std::iter::Peekable;
use std::str::Chars;

use polars::prelude::{DataFrame, DataType, PolarsError};
use rayon::prelude::*;
use tracing::debug;

use crate::domain::{GAME_COLUMN, PLAYER_COLUMN, SheetError};
use crate::ingest::RawSheet;

/// One parsed cell. The source types cells dynamically, so every value is
/// either text, a number, or absent; all string-ish operations (facets,
/// search, filters, export) go through `render`.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Str(String),
    Num(f64),
    Empty,
}

impl Cell {
    pub fn render(&self) -> String {
        match self {
            Cell::Str(s) => s.clone(),
            Cell::Num(v) if v.fract() == 0.0 && v.abs() < 9.0e15 => format!("{}", *v as i64),
            Cell::Num(v) => v.to_string(),
            Cell::Empty => String::new(),
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Str(s) => s.trim().is_empty(),
            Cell::Num(_) => false,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Num(v) => Some(*v),
            Cell::Str(s) => s.trim().parse().ok(),
            Cell::Empty => None,
        }
    }
}

pub struct Column {
    pub name: String,
    pub numeric: bool,
    pub cells: Vec<Cell>,
    pub max_width: usize,
}

impl Column {
    pub fn as_string(&self) -> String {
        format!(
            "\"{}\", numeric: {}, width_max: {}, # rows {}",
            self.name,
            self.numeric,
            self.max_width,
            self.cells.len(),
        )
    }
}

/// Everything derived from one ingestion: the displayed column set in
/// header order, the surviving records (column major), and the facet and
/// stat-column lists that feed the filter controls.
pub struct Sheet {
    pub schema: Vec<String>,
    pub columns: Vec<Column>,
    pub players: Vec<String>,
    pub games: Vec<String>,
    pub stat_columns: Vec<String>,
    pub nrows: usize,
}

impl Sheet {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.schema.iter().position(|n| n == name)
    }
}

/// Pure function of the ingestion result. Records missing either facet are
/// dropped before anything else looks at them; zero survivors is legal and
/// yields headers with empty facet lists.
pub fn derive(raw: &RawSheet) -> Result<Sheet, SheetError> {
    let schema: Vec<String> = raw
        .fields
        .iter()
        .filter(|name| !name.is_empty() && !name.starts_with("Unnamed"))
        .cloned()
        .collect();

    let missing: Vec<String> = [PLAYER_COLUMN, GAME_COLUMN]
        .iter()
        .filter(|required| !schema.iter().any(|name| name == *required))
        .map(|required| required.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(SheetError::MissingColumns(missing));
    }

    let full: Result<Vec<Column>, PolarsError> = schema
        .par_iter()
        .map(|name| materialize(&raw.frame, name))
        .collect();
    let full = full?;

    let player_idx = schema.iter().position(|n| n == PLAYER_COLUMN).unwrap_or(0);
    let game_idx = schema.iter().position(|n| n == GAME_COLUMN).unwrap_or(0);

    let keep: Vec<usize> = (0..raw.frame.height())
        .filter(|&ri| {
            !full[player_idx].cells[ri].is_blank() && !full[game_idx].cells[ri].is_blank()
        })
        .collect();
    let dropped = raw.frame.height() - keep.len();
    if dropped > 0 {
        debug!("Dropped {dropped} rows without both {PLAYER_COLUMN} and {GAME_COLUMN}");
    }

    let columns: Vec<Column> = full.into_iter().map(|col| retain(col, &keep)).collect();
    for col in columns.iter() {
        debug!("Column: {}", col.as_string());
    }

    let players = uniq_sorted(&columns[player_idx].cells);
    let games = uniq_sorted(&columns[game_idx].cells);
    let stat_columns: Vec<String> = schema
        .iter()
        .filter(|name| *name != PLAYER_COLUMN && *name != GAME_COLUMN)
        .cloned()
        .collect();

    Ok(Sheet {
        schema,
        columns,
        players,
        games,
        stat_columns,
        nrows: keep.len(),
    })
}

fn materialize(frame: &DataFrame, name: &str) -> Result<Column, PolarsError> {
    let col = frame.column(name)?;
    let numeric = is_numeric_dtype(col.dtype());

    let cells: Vec<Cell> = if numeric {
        let col = col.cast(&DataType::Float64)?;
        let values = col.f64()?;
        values
            .into_iter()
            .map(|v| match v {
                Some(v) => Cell::Num(v),
                None => Cell::Empty,
            })
            .collect()
    } else {
        let col = col.cast(&DataType::String)?;
        let values = col.str()?;
        values
            .into_iter()
            .map(|v| match v {
                Some(s) if !s.is_empty() => Cell::Str(s.to_string()),
                _ => Cell::Empty,
            })
            .collect()
    };

    Ok(Column {
        name: name.to_string(),
        numeric,
        cells,
        max_width: 0, // set once the surviving rows are known
    })
}

fn retain(col: Column, keep: &[usize]) -> Column {
    let cells: Vec<Cell> = keep.iter().map(|&ri| col.cells[ri].clone()).collect();
    let max_width = cells.iter().map(|c| c.render().len()).max().unwrap_or(0);
    Column {
        name: col.name,
        numeric: col.numeric,
        cells,
        max_width,
    }
}

fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Distinct non-blank rendered values, first-seen dedup, sorted with the
/// numeric-aware case-insensitive compare ("Game 2" before "Game 10").
pub fn uniq_sorted(cells: &[Cell]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut values = Vec::new();
    for cell in cells {
        let value = cell.render();
        if value.trim().is_empty() {
            continue;
        }
        if seen.insert(value.clone()) {
            values.push(value);
        }
    }
    values.sort_by(|a, b| natural_cmp(a, b));
    values
}

/// Case-insensitive compare where digit runs compare by numeric value.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut ia = a.chars().peekable();
    let mut ib = b.chars().peekable();
    loop {
        match (ia.peek().copied(), ib.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(ca), Some(cb)) => {
                if ca.is_ascii_digit() && cb.is_ascii_digit() {
                    let da = take_digits(&mut ia);
                    let db = take_digits(&mut ib);
                    let ord = compare_digit_runs(&da, &db);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                } else {
                    let la = lower(ca);
                    let lb = lower(cb);
                    if la != lb {
                        return la.cmp(&lb);
                    }
                    ia.next();
                    ib.next();
                }
            }
        }
    }
}

fn lower(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

fn take_digits(it: &mut Peekable<Chars>) -> String {
    let mut run = String::new();
    while let Some(&c) = it.peek() {
        if !c.is_ascii_digit() {
            break;
        }
        run.push(c);
        it.next();
    }
    run
}

fn compare_digit_runs(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Ordering used by the table. Numeric columns compare by value with
/// non-numbers after all numbers; everything else compares rendered text,
/// case-insensitive.
pub fn cell_cmp(a: &Cell, b: &Cell, numeric: bool) -> Ordering {
    if numeric {
        match (a.as_number(), b.as_number()) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => a.render().cmp(&b.render()),
        }
    } else {
        a.render().to_lowercase().cmp(&b.render().to_lowercase())
    }
}
