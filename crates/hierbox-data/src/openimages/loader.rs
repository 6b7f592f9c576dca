//! CSV loading of annotation rows

use super::OpenImagesRow;
use crate::Result;
use anyhow::Context;
use hierbox_core::ObjectStore;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

/// What a load did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    pub rows: usize,
    pub inserted: usize,
    pub skipped: usize,
}

/// Reads "Open Images" CSV files into an object store.
///
/// Rows are inserted in file order, which fixes every object's index. By
/// default the first bad row aborts the load; in lenient mode bad rows are
/// logged and skipped.
#[derive(Debug, Clone, Default)]
pub struct OpenImagesLoader {
    lenient: bool,
    images: Option<Vec<String>>,
}

impl OpenImagesLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip rows that fail to parse instead of failing the load
    pub fn lenient(mut self, lenient: bool) -> Self {
        self.lenient = lenient;
        self
    }

    /// Only keep rows of the given image
    pub fn add_image<S: Into<String>>(mut self, image_id: S) -> Self {
        self.images.get_or_insert_with(Vec::new).push(image_id.into());
        self
    }

    fn wants(&self, row: &OpenImagesRow) -> bool {
        match &self.images {
            Some(images) => images.iter().any(|id| *id == row.image_id),
            None => true,
        }
    }

    /// Load a CSV file
    pub fn load_path<P: AsRef<Path>>(&self, path: P, store: &mut ObjectStore) -> Result<LoadStats> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("Failed to open file: {:?}", path))?;
        let stats = self
            .load_reader(file, store)
            .with_context(|| format!("Failed to load annotations from {:?}", path))?;

        info!(
            path = %path.display(),
            rows = stats.rows,
            inserted = stats.inserted,
            skipped = stats.skipped,
            images = store.image_count(),
            "loaded annotations"
        );
        Ok(stats)
    }

    /// Load CSV text with a header row from any reader
    pub fn load_reader<R: Read>(&self, reader: R, store: &mut ObjectStore) -> Result<LoadStats> {
        let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let headers = csv_reader.headers().context("Failed to read CSV header")?.clone();
        let mut stats = LoadStats::default();

        for record in csv_reader.records() {
            stats.rows += 1;
            // line the record starts on; quoted fields may span several
            let (line, row) = match record {
                Ok(record) => (
                    record.position().map_or(0, |p| p.line()),
                    record.deserialize::<OpenImagesRow>(Some(&headers)),
                ),
                Err(e) => (e.position().map_or(0, |p| p.line()), Err(e)),
            };

            let inserted = row
                .with_context(|| format!("Failed to read row at line {}", line))
                .and_then(|row| {
                    if !self.wants(&row) {
                        return Ok(false);
                    }
                    store
                        .insert_from(&row)
                        .with_context(|| format!("Invalid annotation at line {}", line))?;
                    Ok(true)
                });

            match inserted {
                Ok(true) => stats.inserted += 1,
                Ok(false) => stats.skipped += 1,
                Err(e) if self.lenient => {
                    warn!("Skipping line {}: {:#}", line, e);
                    stats.skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }

        Ok(stats)
    }
}
