// src/table/mod.rs
use anyhow::{bail, Context, Result};
use csv::{ReaderBuilder, WriterBuilder};
use serde::{de::DeserializeOwned, Serialize};
use std::{
    fs::{self, File},
    io::Read,
    ops::Range,
    path::Path,
};
use tracing::debug;

pub mod utils;

pub use utils::{clean_str, parse_number};

/// A sheet or PDF table exported to CSV, kept cell-for-cell as strings.
///
/// Rows may have different lengths; a cell past the end of its row reads as "".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawGrid {
    pub rows: Vec<Vec<String>>,
}

impl RawGrid {
    pub fn from_rows(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut rows: Vec<Vec<String>> = Vec::new();
        for (idx, result) in rdr.records().enumerate() {
            let record = result.with_context(|| format!("CSV parse error at record {}", idx))?;
            rows.push(record.iter().map(str::to_string).collect());
        }
        Ok(Self { rows })
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        let grid =
            Self::from_reader(file).with_context(|| format!("reading {}", path.display()))?;
        debug!(path = %path.display(), rows = grid.len(), "loaded raw grid");
        Ok(grid)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Drop the first `n` rows (sheet headers).
    pub fn skip_rows(mut self, n: usize) -> Self {
        self.rows.drain(..n.min(self.rows.len()));
        self
    }

    /// Cut out a rectangular block. Fails if the grid has fewer rows than the
    /// block needs, since a short sheet means the layout has changed.
    pub fn slice(&self, rows: Range<usize>, cols: Range<usize>) -> Result<RawGrid> {
        if rows.start > rows.end || cols.start > cols.end {
            bail!("inverted range rows {:?} cols {:?}", rows, cols);
        }
        if rows.end > self.len() {
            bail!(
                "table needs rows {}..{} but the sheet only has {} rows",
                rows.start,
                rows.end,
                self.len()
            );
        }
        let block: Vec<Vec<String>> = rows
            .map(|r| cols.clone().map(|c| self.cell(r, c).to_string()).collect())
            .collect();
        Ok(RawGrid { rows: block })
    }

    /// Every row from `first_row` on, keeping only `keep_cols` in that order.
    pub fn select(&self, first_row: usize, keep_cols: &[usize]) -> RawGrid {
        let block: Vec<Vec<String>> = (first_row..self.len())
            .map(|r| keep_cols.iter().map(|&c| self.cell(r, c).to_string()).collect())
            .collect();
        RawGrid { rows: block }
    }
}

/// Deserialize every record of a headed CSV file.
pub fn read_records<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<Vec<T>> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    read_records_from(file).with_context(|| format!("reading {}", path.display()))
}

pub fn read_records_from<T: DeserializeOwned, R: Read>(reader: R) -> Result<Vec<T>> {
    let mut rdr = ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut out = Vec::new();
    for (idx, result) in rdr.deserialize().enumerate() {
        let record: T = result.with_context(|| format!("CSV parse error at record {}", idx))?;
        out.push(record);
    }
    Ok(out)
}

/// Write `rows` as a headed CSV file, creating the parent directory.
pub fn write_records<T: Serialize>(path: impl AsRef<Path>, rows: &[T]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating directory {}", parent.display()))?;
    }
    let mut wtr = WriterBuilder::new()
        .from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    for row in rows {
        wtr.serialize(row)
            .with_context(|| format!("writing row to {}", path.display()))?;
    }
    wtr.flush()
        .with_context(|| format!("flushing {}", path.display()))?;
    debug!(path = %path.display(), rows = rows.len(), "wrote table");
    Ok(())
}
