use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::warn;

use crate::error::PrepError;
use crate::models::{AnnotationRecord, BoundingBox};

pub const COL_IMAGE_INDEX: &str = "Image Index";
pub const COL_FINDING_LABEL: &str = "Finding Label";
pub const COL_X: &str = "x";
pub const COL_Y: &str = "y";
pub const COL_W: &str = "w";
pub const COL_H: &str = "h";
pub const COL_AREA: &str = "area";

/// A CSV file held in memory with its column order intact.
///
/// Rows are stored as plain strings so that columns this crate does not know
/// about survive a read/modify/write cycle unchanged.
#[derive(Debug, Clone)]
pub struct AnnotationTable {
    source: PathBuf,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl AnnotationTable {
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("Failed to open CSV {:?}", path))?;
        let mut table = Self::from_reader(file)
            .with_context(|| format!("Failed to parse CSV {:?}", path))?;
        table.source = path.to_path_buf();
        Ok(table)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(reader);

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for (idx, record) in reader.records().enumerate() {
            let record = record?;
            let mut row: Vec<String> = record.iter().map(str::to_string).collect();
            if row.len() > headers.len() {
                warn!(
                    "Row {} has {} fields for {} columns, dropping the extra ones",
                    idx + 1,
                    row.len(),
                    headers.len()
                );
            }
            // Every row spans exactly the header so appended columns start empty.
            row.resize(headers.len(), String::new());
            rows.push(row);
        }

        Ok(Self {
            source: PathBuf::from("<reader>"),
            headers,
            rows,
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn require_column(&self, name: &str) -> Result<usize, PrepError> {
        self.column(name).ok_or_else(|| PrepError::MissingColumn {
            column: name.to_string(),
            path: self.source.clone(),
        })
    }

    pub fn field(&self, row: usize, column: usize) -> &str {
        self.rows[row].get(column).map(String::as_str).unwrap_or("")
    }

    pub fn set_field(&mut self, row: usize, column: usize, value: impl Into<String>) {
        self.rows[row][column] = value.into();
    }

    /// Index of `name`, appending an empty column when it does not exist yet.
    pub fn ensure_column(&mut self, name: &str) -> usize {
        if let Some(idx) = self.column(name) {
            return idx;
        }
        self.headers.push(name.to_string());
        let idx = self.headers.len() - 1;
        for row in &mut self.rows {
            row.resize(idx + 1, String::new());
        }
        idx
    }

    /// Parse a numeric field, naming the row and column on failure.
    pub fn number(&self, row: usize, column: usize) -> Result<f32, PrepError> {
        let raw = self.field(row, column).trim();
        raw.parse::<f32>().map_err(|_| PrepError::InvalidNumber {
            row,
            column: self.headers[column].clone(),
            value: raw.to_string(),
        })
    }

    /// `Image Index` of every row, in file order.
    pub fn image_index_column(&self) -> Result<Vec<&str>, PrepError> {
        let col = self.require_column(COL_IMAGE_INDEX)?;
        Ok((0..self.rows.len()).map(|row| self.field(row, col)).collect())
    }

    /// Distinct `Image Index` values in first-seen order.
    pub fn unique_images(&self) -> Result<Vec<String>, PrepError> {
        let mut seen = HashSet::new();
        Ok(self
            .image_index_column()?
            .into_iter()
            .filter(|name| seen.insert(*name))
            .map(str::to_string)
            .collect())
    }

    /// Pixel-space box of one row.
    pub fn bbox(&self, row: usize) -> Result<BoundingBox, PrepError> {
        let x = self.require_column(COL_X)?;
        let y = self.require_column(COL_Y)?;
        let w = self.require_column(COL_W)?;
        let h = self.require_column(COL_H)?;
        Ok(BoundingBox::new(
            self.number(row, x)?,
            self.number(row, y)?,
            self.number(row, w)?,
            self.number(row, h)?,
        ))
    }

    pub fn record(&self, row: usize) -> Result<AnnotationRecord, PrepError> {
        let image_col = self.require_column(COL_IMAGE_INDEX)?;
        let area = match self.column(COL_AREA) {
            Some(col) if !self.field(row, col).trim().is_empty() => Some(self.number(row, col)?),
            _ => None,
        };
        let finding_labels = self
            .column(COL_FINDING_LABEL)
            .map(|col| {
                self.field(row, col)
                    .split('|')
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(AnnotationRecord {
            image_index: self.field(row, image_col).to_string(),
            bbox: self.bbox(row)?,
            area,
            finding_labels,
        })
    }

    /// Every record for `image_index`, in file order.
    pub fn records_for(&self, image_index: &str) -> Result<Vec<AnnotationRecord>, PrepError> {
        let col = self.require_column(COL_IMAGE_INDEX)?;
        (0..self.rows.len())
            .filter(|&row| self.field(row, col) == image_index)
            .map(|row| self.record(row))
            .collect()
    }

    /// Box of the first row of each image, keyed by `Image Index`.
    pub fn first_boxes(&self) -> Result<HashMap<String, BoundingBox>, PrepError> {
        let col = self.require_column(COL_IMAGE_INDEX)?;
        let mut boxes = HashMap::new();
        for row in 0..self.rows.len() {
            let name = self.field(row, col);
            if !boxes.contains_key(name) {
                boxes.insert(name.to_string(), self.bbox(row)?);
            }
        }
        Ok(boxes)
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file =
            File::create(path).with_context(|| format!("Failed to create CSV {:?}", path))?;
        self.write_to(file)
            .with_context(|| format!("Failed to write CSV {:?}", path))
    }

    pub fn write_to<W: Write>(&self, writer: W) -> Result<()> {
        let mut writer = csv::WriterBuilder::new().flexible(true).from_writer(writer);
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }
}
