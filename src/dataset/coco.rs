//! Annotation export in COCO layout, as produced by the re-annotation tool.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

/// Marker the export tool inserts between the original stem and its hash.
const EXPORT_MARKER: &str = ".rf.";

/// Extensions the export tool folds into the stem as `_<ext>`.
const FOLDED_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

#[derive(Debug, Clone, Deserialize)]
pub struct ExportImage {
    pub id: u64,
    pub file_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExportAnnotation {
    pub image_id: u64,
    /// `[x, y, w, h]` in pixels of the exported image.
    pub bbox: [f64; 4],
    pub area: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnnotationExport {
    pub images: Vec<ExportImage>,
    pub annotations: Vec<ExportAnnotation>,
}

/// Replacement box and area for one image, at the export's full precision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExportedBox {
    /// `[x, y, w, h]`
    pub bbox: [f64; 4],
    pub area: f64,
}

impl AnnotationExport {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read(path).with_context(|| format!("Failed to read export {:?}", path))?;
        serde_json::from_slice(&raw).with_context(|| format!("Failed to parse export {:?}", path))
    }

    /// Map cleaned filename → box. Annotations pointing at unknown image ids
    /// are ignored; when an image has several annotations the last one wins.
    pub fn boxes_by_filename(&self) -> HashMap<String, ExportedBox> {
        let id_to_name: HashMap<u64, &str> = self
            .images
            .iter()
            .map(|img| (img.id, img.file_name.as_str()))
            .collect();

        let mut boxes = HashMap::new();
        for ann in &self.annotations {
            let Some(name) = id_to_name.get(&ann.image_id) else {
                debug!("Annotation refers to unknown image id {}", ann.image_id);
                continue;
            };
            boxes.insert(
                clean_export_filename(name),
                ExportedBox {
                    bbox: ann.bbox,
                    area: ann.area,
                },
            );
        }
        boxes
    }
}

/// Recover the original filename from an export name.
///
/// `00012345_001_png.rf.abcdef.png` becomes `00012345_001.png`: everything from
/// the first `.rf.` on is dropped and the folded `_png` suffix turns back into
/// an extension. Names without the marker only get the suffix treatment.
pub fn clean_export_filename(name: &str) -> String {
    let stem = name.split(EXPORT_MARKER).next().unwrap_or(name);
    for ext in FOLDED_EXTENSIONS {
        if let Some(base) = stem.strip_suffix(&format!("_{ext}")) {
            return format!("{base}.{ext}");
        }
    }
    stem.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_export_hash_and_folded_extension() {
        assert_eq!(
            clean_export_filename("00012345_001_png.rf.abcdef.png"),
            "00012345_001.png"
        );
        assert_eq!(clean_export_filename("scan_7_jpg.rf.99.jpg"), "scan_7.jpg");
    }

    #[test]
    fn leaves_plain_names_alone() {
        assert_eq!(clean_export_filename("00012345_001.png"), "00012345_001.png");
    }

    #[test]
    fn last_annotation_per_image_wins() {
        let export: AnnotationExport = serde_json::from_str(
            r#"{
                "images": [{"id": 1, "file_name": "a_png.rf.x.png"}],
                "annotations": [
                    {"image_id": 1, "bbox": [1, 2, 3, 4], "area": 12},
                    {"image_id": 1, "bbox": [5, 6, 7, 8], "area": 56},
                    {"image_id": 9, "bbox": [0, 0, 1, 1], "area": 1}
                ]
            }"#,
        )
        .unwrap();
        let boxes = export.boxes_by_filename();
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes["a.png"].bbox, [5.0, 6.0, 7.0, 8.0]);
        assert_eq!(boxes["a.png"].area, 56.0);
    }
}
