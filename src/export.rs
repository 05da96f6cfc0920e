use std::fs::File;
use std::path::Path;

use tracing::info;

use crate::domain::SheetError;
use crate::sheet::Sheet;

/// Write the currently visible slice (filtered rows, visible columns, both
/// in display order) as headered CSV. Returns the number of data rows.
pub fn write_visible(
    sheet: &Sheet,
    rows: &[usize],
    visible: &[usize],
    path: &Path,
) -> Result<usize, SheetError> {
    use polars::prelude::*;

    let columns: Vec<Column> = visible
        .iter()
        .map(|&ci| {
            let col = &sheet.columns[ci];
            let values: Vec<String> = rows.iter().map(|&ri| col.cells[ri].render()).collect();
            Column::new(col.name.as_str().into(), values)
        })
        .collect();

    let mut frame = DataFrame::new(columns)?;
    let file = File::create(path)?;
    CsvWriter::new(file).include_header(true).finish(&mut frame)?;

    info!(
        "Exported {} rows x {} columns to {}",
        rows.len(),
        visible.len(),
        path.display()
    );
    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::parse_bytes;
    use crate::sheet::derive;

    #[test]
    fn writes_only_the_visible_slice() {
        let csv = b"Player,Game,Score,Fouls\nAnn,Chess,10,1\nBo,Chess,7,2\n".to_vec();
        let sheet = derive(&parse_bytes(csv).unwrap()).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("player_game_stats.csv");
        // second row only, Fouls hidden
        let written = write_visible(&sheet, &[1], &[0, 1, 2], &path).unwrap();
        assert_eq!(written, 1);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "Player,Game,Score\nBo,Chess,7\n");
    }

    #[test]
    fn zero_rows_still_writes_the_header() {
        let csv = b"Player,Game,Score\nAnn,Chess,10\n".to_vec();
        let sheet = derive(&parse_bytes(csv).unwrap()).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        assert_eq!(write_visible(&sheet, &[], &[0, 1], &path).unwrap(), 0);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().next(), Some("Player,Game"));
    }
}
