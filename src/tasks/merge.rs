use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::config::MergeConfig;
use crate::dataset::table::{COL_AREA, COL_H, COL_IMAGE_INDEX, COL_W, COL_X, COL_Y};
use crate::dataset::{AnnotationExport, AnnotationTable};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub rows: usize,
    pub updated_rows: usize,
    pub export_images: usize,
    pub folder_images: usize,
}

/// Overwrite `x, y, w, h, area` of every row whose image is both in
/// `image_dir` and in the annotation export, then write the whole table to
/// `output_csv`. The input CSV is left untouched.
pub fn merge_reannotated_boxes(config: &MergeConfig) -> Result<MergeSummary> {
    info!("Loading {:?} and {:?}", config.annotations_csv, config.export_json);
    let mut table = AnnotationTable::read(&config.annotations_csv)?;
    let export = AnnotationExport::load(&config.export_json)?;
    let folder_images = list_file_names(&config.image_dir)?;

    let summary = merge_into(&mut table, &export, &folder_images)?;
    table.write(&config.output_csv)?;

    info!(
        "Updated {} rows ({} export images, {} images in folder). Saved to {:?}",
        summary.updated_rows, summary.export_images, summary.folder_images, config.output_csv
    );
    Ok(summary)
}

/// In-memory part of the merge.
pub fn merge_into(
    table: &mut AnnotationTable,
    export: &AnnotationExport,
    folder_images: &HashSet<String>,
) -> Result<MergeSummary> {
    let boxes = export.boxes_by_filename();

    let image_col = table.require_column(COL_IMAGE_INDEX)?;
    let x = table.require_column(COL_X)?;
    let y = table.require_column(COL_Y)?;
    let w = table.require_column(COL_W)?;
    let h = table.require_column(COL_H)?;
    let area = table.ensure_column(COL_AREA);

    let mut summary = MergeSummary {
        rows: table.len(),
        export_images: boxes.len(),
        folder_images: folder_images.len(),
        ..Default::default()
    };

    for row in 0..table.len() {
        let name = table.field(row, image_col);
        if !folder_images.contains(name) {
            continue;
        }
        let Some(new) = boxes.get(name).copied() else {
            continue;
        };

        let [bx, by, bw, bh] = new.bbox;
        table.set_field(row, x, bx.to_string());
        table.set_field(row, y, by.to_string());
        table.set_field(row, w, bw.to_string());
        table.set_field(row, h, bh.to_string());
        table.set_field(row, area, new.area.to_string());
        summary.updated_rows += 1;
    }

    Ok(summary)
}

/// Names of the regular files directly inside `dir`.
fn list_file_names(dir: &Path) -> Result<HashSet<String>> {
    let mut names = HashSet::new();
    for entry in fs::read_dir(dir).with_context(|| format!("Failed to read {:?}", dir))? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            names.insert(name.to_string());
        }
    }
    Ok(names)
}
