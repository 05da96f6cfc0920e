use std::fmt;
use std::io::Cursor;
use std::sync::mpsc::Sender;
use std::time::Duration;

use polars::prelude::{CsvReadOptions, CsvReader, DataFrame, PolarsError, SerReader};
use tracing::{debug, info, warn};

use crate::domain::{Message, SheetError};

/// Result of one ingestion attempt. Parse-level trouble ends up in
/// `warnings`; anything fatal is reported as `SheetError` instead.
pub struct RawSheet {
    pub frame: DataFrame,
    pub fields: Vec<String>,
    pub warnings: Vec<String>,
}

impl fmt::Debug for RawSheet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawSheet")
            .field("rows", &self.frame.height())
            .field("fields", &self.fields)
            .field("warnings", &self.warnings)
            .finish()
    }
}

/// Download the sheet and parse the body. Transport failures (DNS, TLS,
/// timeout, non-2xx) abort the attempt; no retries.
pub fn fetch(url: &str) -> Result<RawSheet, SheetError> {
    info!("Fetching sheet from {url}");
    let client = reqwest::blocking::Client::builder()
        .user_agent(concat!("statsheet/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(180))
        .build()?;
    let body = client.get(url).send()?.error_for_status()?.bytes()?;
    debug!("Fetched {} bytes", body.len());
    parse_bytes(body.to_vec())
}

/// Parse CSV bytes with a header row and whole-file schema inference, so
/// numeric-looking columns come back typed. A strict parse failure is
/// downgraded to a warning and the bytes are re-read leniently, keeping
/// whatever rows do parse.
pub fn parse_bytes(bytes: Vec<u8>) -> Result<RawSheet, SheetError> {
    if bytes.is_empty() {
        return Err(SheetError::EmptyBody);
    }

    let mut warnings = Vec::new();
    let frame = match read_frame(bytes.clone(), false) {
        Ok(frame) => frame,
        Err(err) => {
            warn!("Strict CSV parse failed, re-reading leniently: {err}");
            warnings.push(err.to_string());
            read_frame(bytes, true)?
        }
    };

    let fields: Vec<String> = frame
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();

    Ok(RawSheet {
        frame,
        fields,
        warnings,
    })
}

fn read_frame(bytes: Vec<u8>, lenient: bool) -> Result<DataFrame, PolarsError> {
    let mut options = CsvReadOptions::default();
    options.has_header = true;
    // Scan all rows so a late string in a numeric-looking column does not
    // blow up the strict pass.
    options.infer_schema_length = None;
    if lenient {
        options.ignore_errors = true;
        options = options.map_parse_options(|opts| opts.with_truncate_ragged_lines(true));
    }
    CsvReader::new(Cursor::new(bytes))
        .with_options(options)
        .finish()
}

/// Fetch on a worker thread. Exactly one `LoadFinished` carrying `seq` is
/// sent; the receiver decides whether it is still current.
pub fn spawn_fetch(url: String, seq: u64, tx: Sender<Message>) {
    std::thread::spawn(move || {
        let result = fetch(&url);
        if let Err(err) = tx.send(Message::LoadFinished(seq, result)) {
            debug!("Load {seq} finished after the receiver went away: {err}");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::DataType;

    #[test]
    fn parses_header_and_types_numeric_columns() {
        let csv = b"Player,Game,Score\nAnn,Chess,10\nBo,Go,7\n".to_vec();
        let raw = parse_bytes(csv).unwrap();
        assert_eq!(raw.fields, vec!["Player", "Game", "Score"]);
        assert_eq!(raw.frame.height(), 2);
        assert!(raw.warnings.is_empty());
        assert!(matches!(
            raw.frame.column("Score").unwrap().dtype(),
            DataType::Int64
        ));
    }

    #[test]
    fn skips_empty_lines() {
        let csv = b"Player,Game,Score\nAnn,Chess,10\n\nBo,Go,7\n".to_vec();
        let raw = parse_bytes(csv).unwrap();
        assert_eq!(raw.frame.height(), 2);
    }

    #[test]
    fn ragged_row_is_a_warning_not_a_failure() {
        let csv = b"Player,Game,Score\nAnn,Chess,10\nBo,Go,7,extra,junk\n".to_vec();
        let raw = parse_bytes(csv).unwrap();
        assert!(!raw.warnings.is_empty());
        assert_eq!(raw.frame.height(), 2);
    }

    #[test]
    fn empty_body_is_fatal() {
        assert!(matches!(
            parse_bytes(Vec::new()),
            Err(SheetError::EmptyBody)
        ));
    }
}
