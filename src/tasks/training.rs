use std::collections::HashSet;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rten_tensor::NdTensor;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{InputLayout, TrainingConfig};
use crate::dataset::AnnotationTable;
use crate::dataset::table::COL_IMAGE_INDEX;
use crate::detection::preprocessing;
use crate::models::BoundingBox;

/// One audited image with its targets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSample {
    pub image_index: String,
    pub image_path: PathBuf,
    /// Multi-label target, one 0/1 entry per class.
    pub labels: Vec<f32>,
    /// Box normalized by the original frame size.
    pub bbox: BoundingBox,
}

impl TrainingSample {
    /// Decode the image into the model's input tensor.
    pub fn load_input(&self, size: u32, layout: InputLayout) -> Result<NdTensor<f32, 4>> {
        let img = image::open(&self.image_path)
            .with_context(|| format!("Failed to open image {:?}", self.image_path))?;
        Ok(preprocessing::to_input_tensor(&img, size, layout))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingManifest {
    pub classes: Vec<String>,
    pub input_size: u32,
    pub samples: Vec<TrainingSample>,
}

impl TrainingManifest {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read(path).with_context(|| format!("Failed to read {:?}", path))?;
        serde_json::from_slice(&raw).with_context(|| format!("Failed to parse {:?}", path))
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)
            .with_context(|| format!("Failed to write {:?}", path))?;
        Ok(())
    }
}

/// Collect the rows whose image sits in the audited `Correct` folder into
/// training samples. Every class in `config.classes` must exist as a 0/1
/// column in the CSV.
pub fn build_training_set(config: &TrainingConfig) -> Result<TrainingManifest> {
    let table = AnnotationTable::read(&config.annotations_csv)?;

    let audited: HashSet<String> = fs::read_dir(&config.audited_dir)
        .with_context(|| format!("Failed to read {:?}", config.audited_dir))?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
        .collect();
    info!("Loading {} audited images...", audited.len());

    let image_col = table.require_column(COL_IMAGE_INDEX)?;
    let class_cols = config
        .classes
        .iter()
        .map(|class| table.require_column(class))
        .collect::<Result<Vec<_>, _>>()?;

    let mut samples = Vec::new();
    for row in 0..table.len() {
        let name = table.field(row, image_col);
        if !audited.contains(name) {
            continue;
        }
        let labels = class_cols
            .iter()
            .map(|&col| table.number(row, col))
            .collect::<Result<Vec<_>, _>>()?;

        samples.push(TrainingSample {
            image_index: name.to_string(),
            image_path: config.audited_dir.join(name),
            labels,
            bbox: table.bbox(row)?.normalized(config.original_size),
        });
    }

    let in_csv: HashSet<&str> = samples.iter().map(|s| s.image_index.as_str()).collect();
    let unlisted = audited.iter().filter(|name| !in_csv.contains(name.as_str())).count();
    if unlisted > 0 {
        warn!("{} audited files have no row in {:?}", unlisted, config.annotations_csv);
    }

    Ok(TrainingManifest {
        classes: config.classes.clone(),
        input_size: config.input_size,
        samples,
    })
}

/// Build the training set and write it to `config.manifest_path`.
pub fn write_training_manifest(config: &TrainingConfig) -> Result<TrainingManifest> {
    let manifest = build_training_set(config)?;
    manifest.save(&config.manifest_path)?;
    info!(
        "Wrote {} training samples to {:?}",
        manifest.samples.len(),
        config.manifest_path
    );
    Ok(manifest)
}
