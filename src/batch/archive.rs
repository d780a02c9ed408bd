//! In-memory zip assembly for multi-file results.

use std::collections::HashSet;
use std::io::{Cursor, Write};
use std::path::Path;

use cafconvert_core::{Error, Result};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Accumulates converted files into a zip held in memory.
///
/// Entry names are unique: a name that was already used gets a `_1`, `_2`,
/// ... suffix on its stem.
pub struct ArchiveBuilder {
    writer: ZipWriter<Cursor<Vec<u8>>>,
    used: HashSet<String>,
    entries: Vec<String>,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self {
            writer: ZipWriter::new(Cursor::new(Vec::new())),
            used: HashSet::new(),
            entries: Vec::new(),
        }
    }

    /// Add one entry, returning the name it was stored under.
    pub fn append(&mut self, name: &str, data: &[u8]) -> Result<String> {
        let entry = self.unique_name(name);

        self.writer
            .start_file(entry.as_str(), entry_options())
            .map_err(|e| Error::Archive(format!("failed to start entry {entry}: {e}")))?;
        self.writer
            .write_all(data)
            .map_err(|e| Error::Archive(format!("failed to write entry {entry}: {e}")))?;

        self.used.insert(entry.clone());
        self.entries.push(entry.clone());
        Ok(entry)
    }

    /// Names of the entries added so far, in insertion order.
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write the central directory and return the archive bytes together
    /// with the entry names. An archive with no entries is valid.
    pub fn finish(self) -> Result<(Vec<u8>, Vec<String>)> {
        let Self {
            writer, entries, ..
        } = self;
        let cursor = writer
            .finish()
            .map_err(|e| Error::Archive(format!("failed to finalize archive: {e}")))?;
        Ok((cursor.into_inner(), entries))
    }

    fn unique_name(&self, name: &str) -> String {
        if !self.used.contains(name) {
            return name.to_string();
        }

        let path = Path::new(name);
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| name.to_string());
        let ext = path.extension().map(|e| e.to_string_lossy().to_string());

        (1..)
            .map(|n| match &ext {
                Some(ext) => format!("{stem}_{n}.{ext}"),
                None => format!("{stem}_{n}"),
            })
            .find(|candidate| !self.used.contains(candidate))
            .unwrap_or_else(|| name.to_string())
    }
}

// MP3 data does not compress further.
fn entry_options() -> SimpleFileOptions {
    SimpleFileOptions::default().compression_method(CompressionMethod::Stored)
}

impl Default for ArchiveBuilder {
    fn default() -> Self {
        Self::new()
    }
}
