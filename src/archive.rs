//! Archive Assembly - Deterministic ZIP Output
//!
//! Entries keep the order in which a name was first added. Adding a name
//! again replaces its content (last write wins). Timestamps are pinned so
//! the same entries always give byte-identical archives.

use std::collections::HashMap;
use std::io::{Cursor, Write};

use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Failed to write archive entry: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Default)]
pub struct ArchiveBuilder {
    entries: Vec<(String, Vec<u8>)>,
    positions: HashMap<String, usize>,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an entry. Returns `true` when an earlier entry with
    /// the same name was overwritten.
    pub fn add(&mut self, name: impl Into<String>, data: Vec<u8>) -> bool {
        let name = name.into();
        match self.positions.get(&name) {
            Some(&pos) => {
                self.entries[pos].1 = data;
                true
            }
            None => {
                self.positions.insert(name.clone(), self.entries.len());
                self.entries.push((name, data));
                false
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.entries.iter().map(|(n, d)| (n.as_str(), d.as_slice()))
    }

    /// Write all entries into an in-memory ZIP.
    pub fn finish(&self) -> Result<Vec<u8>, ArchiveError> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(DateTime::default())
            .unix_permissions(0o644);

        for (name, data) in &self.entries {
            writer.start_file(name.as_str(), options)?;
            writer.write_all(data)?;
        }

        let cursor = writer.finish()?;
        Ok(cursor.into_inner())
    }
}
