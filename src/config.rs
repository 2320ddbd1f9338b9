use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::PrepError;
use crate::models::TARGET_CLASSES;

/// All job settings. Each section is optional in the YAML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub resize: ResizeConfig,
    pub verify: VerifyConfig,
    pub audit: AuditConfig,
    pub merge: MergeConfig,
    pub rename: RenameConfig,
    pub distribute: DistributeConfig,
    pub training: TrainingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResizeConfig {
    /// CSV whose `Image Index` column names the images to resize.
    pub annotations_csv: PathBuf,
    /// Root searched recursively for the source images.
    pub source_root: PathBuf,
    pub output_dir: PathBuf,
    pub image_size: u32,
    pub extensions: Vec<String>,
    pub progress_every: usize,
}

impl Default for ResizeConfig {
    fn default() -> Self {
        Self {
            annotations_csv: PathBuf::from("BBox_List_2017.csv"),
            source_root: PathBuf::from("nih-chest-xrays"),
            output_dir: PathBuf::from("bbox_resized_512"),
            image_size: 512,
            extensions: vec!["png".to_string()],
            progress_every: 100,
        }
    }
}

/// Memory layout of the model input tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputLayout {
    /// `[batch, height, width, channels]`, the Keras default.
    Nhwc,
    /// `[batch, channels, height, width]`.
    Nchw,
}

/// Contract with the converted detection model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub path: PathBuf,
    pub input_size: u32,
    pub input_layout: InputLayout,
    /// Output node with per-class confidences. First output when unset.
    pub class_output: Option<String>,
    /// Output node with the normalized `[x, y, w, h]` box. Second output when unset.
    pub bbox_output: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("chest_detector.rten"),
            input_size: 512,
            input_layout: InputLayout::Nhwc,
            class_output: None,
            bbox_output: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifyConfig {
    pub model: ModelConfig,
    /// Images to verify, one per `Image Index`.
    pub images_csv: PathBuf,
    /// Ground-truth boxes in original pixel space.
    pub reference_csv: PathBuf,
    pub image_dir: PathBuf,
    /// Receives `Identified/`, `Unidentified/` and the verification log.
    pub output_root: PathBuf,
    /// Side of the square frame the reference boxes were drawn in.
    pub original_size: f32,
    pub conf_threshold: f32,
    pub iou_threshold: f32,
    pub progress_every: usize,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            images_csv: PathBuf::from("train_final.csv"),
            reference_csv: PathBuf::from("updated_annotations.csv"),
            image_dir: PathBuf::from("Image_512"),
            output_root: PathBuf::from("Sorted_Results"),
            original_size: 1024.0,
            conf_threshold: 0.70,
            iou_threshold: 0.50,
            progress_every: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub annotations_csv: PathBuf,
    /// Resized images shown to the operator.
    pub image_dir: PathBuf,
    /// Receives `Correct/`, `Re-annotate/`, `Garbage/` and the journal.
    pub output_dir: PathBuf,
    pub original_size: f32,
    pub target_size: f32,
    /// Skip every image up to and including this one.
    pub start_after: Option<String>,
    /// Overlay image rewritten for each reviewed image.
    pub preview_path: PathBuf,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            annotations_csv: PathBuf::from("BBox_Final.csv"),
            image_dir: PathBuf::from("bbox_resized_512"),
            output_dir: PathBuf::from("bbox_audited"),
            original_size: 1024.0,
            target_size: 512.0,
            start_after: None,
            preview_path: PathBuf::from("audit_preview.png"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    pub annotations_csv: PathBuf,
    pub export_json: PathBuf,
    /// Only images present in this folder are updated.
    pub image_dir: PathBuf,
    pub output_csv: PathBuf,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            annotations_csv: PathBuf::from("BBox_Final.csv"),
            export_json: PathBuf::from("_annotations.coco.json"),
            image_dir: PathBuf::from("bbox_audited/Correct"),
            output_csv: PathBuf::from("updated_annotations.csv"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenameConfig {
    pub folder: PathBuf,
}

impl Default for RenameConfig {
    fn default() -> Self {
        Self {
            folder: PathBuf::from("train"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DistributeConfig {
    pub folder: PathBuf,
    pub members: usize,
}

impl Default for DistributeConfig {
    fn default() -> Self {
        Self {
            folder: PathBuf::from("Sorted_Results/Unidentified"),
            members: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub annotations_csv: PathBuf,
    /// Folder of images the auditor marked correct.
    pub audited_dir: PathBuf,
    pub manifest_path: PathBuf,
    pub input_size: u32,
    pub original_size: f32,
    pub classes: Vec<String>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            annotations_csv: PathBuf::from("updated_annotations.csv"),
            audited_dir: PathBuf::from("bbox_audited/Correct"),
            manifest_path: PathBuf::from("training_manifest.json"),
            input_size: 512,
            original_size: 1024.0,
            classes: TARGET_CLASSES.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {:?}", path))?;
        let config: Config = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config {:?}", path))?;
        config.validate()?;
        Ok(config)
    }

    /// Like [`Config::load`], but a missing file yields the defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.is_file() {
            Self::load(path)
        } else {
            warn!("Config {:?} not found, using defaults", path);
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<(), PrepError> {
        let unit = |name: &str, v: f32| {
            if (0.0..=1.0).contains(&v) {
                Ok(())
            } else {
                Err(PrepError::InvalidConfig(format!("{name} must be in [0, 1], got {v}")))
            }
        };
        let positive = |name: &str, v: f32| {
            if v > 0.0 {
                Ok(())
            } else {
                Err(PrepError::InvalidConfig(format!("{name} must be positive, got {v}")))
            }
        };

        unit("verify.conf_threshold", self.verify.conf_threshold)?;
        unit("verify.iou_threshold", self.verify.iou_threshold)?;
        positive("verify.original_size", self.verify.original_size)?;
        positive("verify.model.input_size", self.verify.model.input_size as f32)?;
        positive("resize.image_size", self.resize.image_size as f32)?;
        positive("audit.original_size", self.audit.original_size)?;
        positive("audit.target_size", self.audit.target_size)?;
        positive("training.input_size", self.training.input_size as f32)?;
        positive("training.original_size", self.training.original_size)?;

        if self.distribute.members == 0 {
            return Err(PrepError::InvalidConfig(
                "distribute.members must be at least 1".to_string(),
            ));
        }
        if self.verify.progress_every == 0 || self.resize.progress_every == 0 {
            return Err(PrepError::InvalidConfig(
                "progress_every must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
