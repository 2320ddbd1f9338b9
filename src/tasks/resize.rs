use std::fs;

use anyhow::{Context, Result};
use image::imageops::FilterType;
use tracing::{info, warn};

use crate::config::ResizeConfig;
use crate::dataset::{AnnotationTable, FileIndex};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResizeSummary {
    pub requested: usize,
    pub resized: usize,
    /// Names from the CSV with no matching file under the source root.
    pub not_found: usize,
    pub undecodable: usize,
}

/// Resize every image named in the annotation CSV to a square of
/// `image_size` pixels and save it under the same filename in `output_dir`.
///
/// Images are located through a one-time recursive scan of `source_root`.
/// Missing and undecodable images are counted and skipped.
pub fn resize_annotated_images(config: &ResizeConfig) -> Result<ResizeSummary> {
    fs::create_dir_all(&config.output_dir)
        .with_context(|| format!("Failed to create {:?}", config.output_dir))?;

    let images = AnnotationTable::read(&config.annotations_csv)?.unique_images()?;
    info!("Found {} unique images in {:?}", images.len(), config.annotations_csv);

    info!("Scanning {:?} to locate images...", config.source_root);
    let index = FileIndex::scan(&config.source_root, &config.extensions);
    info!("Indexed {} image files", index.len());

    let mut summary = ResizeSummary {
        requested: images.len(),
        ..Default::default()
    };

    for name in &images {
        let Some(source) = index.get(name) else {
            summary.not_found += 1;
            continue;
        };

        let img = match image::open(source) {
            Ok(img) => img,
            Err(err) => {
                warn!("Could not decode {}: {}", name, err);
                summary.undecodable += 1;
                continue;
            }
        };

        // Triangle filtering averages neighbouring pixels when shrinking.
        let resized = img.resize_exact(config.image_size, config.image_size, FilterType::Triangle);
        let target = config.output_dir.join(name);
        resized
            .save(&target)
            .with_context(|| format!("Failed to save resized image {:?}", target))?;

        summary.resized += 1;
        if summary.resized % config.progress_every.max(1) == 0 {
            info!("Processed {}/{} images", summary.resized, summary.requested);
        }
    }

    info!(
        "Resize done: {} images saved to {:?}",
        summary.resized, config.output_dir
    );
    if summary.not_found > 0 {
        warn!(
            "{} images from the CSV were not found under {:?}",
            summary.not_found, config.source_root
        );
    }
    Ok(summary)
}
