// src/ingest/mod.rs
pub mod discover;

use csv::{ReaderBuilder, StringRecord};
use std::{collections::HashMap, fs, path::Path};
use tracing::debug;

use crate::error::PipelineError;

pub use discover::{filing_sources, schedule_sources, FilingSource, ScheduleSource};

/// One loaded tabular batch: the header row plus every data row, with a
/// case-insensitive column index built once at load time. Column names in
/// the bulk exports drift in letter case across years, so all lookups go
/// through [`RawBatch::column`] instead of comparing headers directly.
#[derive(Debug)]
pub struct RawBatch {
    /// Provenance label, e.g. `Form5500_2021` or `ScheduleH_2023`.
    pub label: String,
    pub headers: Vec<String>,
    pub rows: Vec<StringRecord>,
    /// Upper-cased header name → column position. First occurrence wins on
    /// the (never observed) chance of duplicate headers.
    index: HashMap<String, usize>,
}

impl RawBatch {
    /// Read a CSV file into memory, decoding Latin-1 when the bytes are not
    /// valid UTF-8. The EFAST2 bulk exports are published as Latin-1.
    pub fn load(path: &Path, label: &str) -> Result<Self, PipelineError> {
        let bytes = fs::read(path)?;
        let text = decode_text(bytes);
        Self::from_csv_str(label, &text)
    }

    pub fn from_csv_str(label: &str, content: &str) -> Result<Self, PipelineError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(content.as_bytes());

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut index = HashMap::with_capacity(headers.len());
        for (pos, name) in headers.iter().enumerate() {
            index.entry(name.to_ascii_uppercase()).or_insert(pos);
        }

        let rows = reader.records().collect::<Result<Vec<_>, _>>()?;
        debug!(label, rows = rows.len(), cols = headers.len(), "loaded batch");

        Ok(RawBatch {
            label: label.to_string(),
            headers,
            rows,
            index,
        })
    }

    /// Case-insensitive exact-name column lookup. No fuzzy or partial
    /// matching: `EIN` does not resolve `SPONS_DFE_EIN`.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.index.get(&name.to_ascii_uppercase()).copied()
    }

    /// Like [`column`](Self::column) but a miss aborts the whole batch.
    pub fn require_column(&self, name: &str) -> Result<usize, PipelineError> {
        self.column(name).ok_or_else(|| PipelineError::MissingColumn {
            batch: self.label.clone(),
            column: name.to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// UTF-8 fast path, Windows-1252 (Latin-1 superset) fallback. 1252 decoding
/// cannot fail, so every input file yields some text.
fn decode_text(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => {
            let (text, _, _) = encoding_rs::WINDOWS_1252.decode(err.as_bytes());
            text.into_owned()
        }
    }
}
