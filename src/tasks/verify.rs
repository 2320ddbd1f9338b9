use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::VerifyConfig;
use crate::dataset::AnnotationTable;
use crate::detection::Detector;
use crate::models::{VerificationOutcome, VerificationStatus};

pub const LOG_FILE_NAME: &str = "verification_log.csv";

/// Counts and per-image outcomes of one verified sorting run.
#[derive(Debug, Clone, Default)]
pub struct VerificationSummary {
    pub total: usize,
    /// Listed images with no file in the image folder.
    pub missing: usize,
    pub identified: usize,
    pub unidentified: usize,
    pub no_ref: usize,
    pub outcomes: Vec<VerificationOutcome>,
    pub log_path: PathBuf,
}

#[derive(Serialize)]
struct LogRow<'a> {
    #[serde(rename = "Image Index")]
    image_index: &'a str,
    #[serde(rename = "Confidence")]
    confidence: f64,
    #[serde(rename = "IoU")]
    iou: f64,
    #[serde(rename = "Status")]
    status: &'a str,
}

/// `Identified` only when both the confidence and the IoU reach their threshold.
pub fn classify(
    confidence: f32,
    iou: f32,
    conf_threshold: f32,
    iou_threshold: f32,
) -> VerificationStatus {
    if confidence >= conf_threshold && iou >= iou_threshold {
        VerificationStatus::Identified
    } else {
        VerificationStatus::Unidentified
    }
}

fn round4(v: f32) -> f64 {
    (v as f64 * 10_000.0).round() / 10_000.0
}

/// Run the detector on every listed image, compare its box with the ground
/// truth and copy the image into `Identified/` or `Unidentified/`.
///
/// Source images are never modified. The log is written once at the end, so
/// an inference error aborts the run without a log while files copied so far
/// stay in place.
pub fn run_verified_sorting<D: Detector>(
    config: &VerifyConfig,
    detector: &D,
) -> Result<VerificationSummary> {
    let images = AnnotationTable::read(&config.images_csv)?.unique_images()?;
    let references = AnnotationTable::read(&config.reference_csv)?.first_boxes()?;

    for status in [VerificationStatus::Identified, VerificationStatus::Unidentified] {
        let dir = config.output_root.join(status.bucket());
        fs::create_dir_all(&dir).with_context(|| format!("Failed to create {:?}", dir))?;
    }

    info!(
        "Verifying {} images against {} reference boxes",
        images.len(),
        references.len()
    );

    let mut summary = VerificationSummary {
        total: images.len(),
        ..Default::default()
    };
    let mut verified = 0usize;

    for name in &images {
        let path = config.image_dir.join(name);
        if !path.exists() {
            summary.missing += 1;
            continue;
        }

        let outcome = match references.get(name) {
            None => VerificationOutcome {
                image_index: name.clone(),
                confidence: 0.0,
                iou: 0.0,
                status: VerificationStatus::UnidentifiedNoRef,
            },
            Some(gt) => {
                let gt = gt.normalized(config.original_size);
                let img = image::open(&path)
                    .with_context(|| format!("Failed to open image {:?}", path))?;
                let prediction = detector
                    .predict(&img)
                    .with_context(|| format!("Inference failed for {}", name))?;

                let confidence = prediction.confidence();
                let iou = gt.iou(&prediction.bbox);
                let status = classify(
                    confidence,
                    iou,
                    config.conf_threshold,
                    config.iou_threshold,
                );
                debug!("{}: conf={:.4} iou={:.4} -> {}", name, confidence, iou, status);

                VerificationOutcome {
                    image_index: name.clone(),
                    confidence,
                    iou,
                    status,
                }
            }
        };

        copy_into_bucket(&path, &config.output_root, outcome.status, name)?;

        match outcome.status {
            VerificationStatus::Identified => summary.identified += 1,
            VerificationStatus::Unidentified => summary.unidentified += 1,
            VerificationStatus::UnidentifiedNoRef => summary.no_ref += 1,
        }

        if outcome.status != VerificationStatus::UnidentifiedNoRef {
            verified += 1;
            if verified % config.progress_every.max(1) == 0 {
                info!("Verified & logged {}/{} images", verified, summary.total);
            }
        }
        summary.outcomes.push(outcome);
    }

    summary.log_path = config.output_root.join(LOG_FILE_NAME);
    write_log(&summary.log_path, &summary.outcomes)?;

    info!(
        "Verification done: {} identified, {} unidentified, {} without reference, {} missing. Log: {:?}",
        summary.identified, summary.unidentified, summary.no_ref, summary.missing, summary.log_path
    );
    Ok(summary)
}

fn copy_into_bucket(
    src: &Path,
    root: &Path,
    status: VerificationStatus,
    name: &str,
) -> Result<()> {
    let dest = root.join(status.bucket()).join(name);
    fs::copy(src, &dest)
        .with_context(|| format!("Failed to copy {:?} to {:?}", src, dest))?;
    Ok(())
}

/// Write `Image Index,Confidence,IoU,Status` with scores rounded to 4 places.
pub fn write_log(path: &Path, outcomes: &[VerificationOutcome]) -> Result<()> {
    // Header written by hand so an empty run still yields a well-formed log.
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("Failed to create log {:?}", path))?;
    writer.write_record(["Image Index", "Confidence", "IoU", "Status"])?;
    for outcome in outcomes {
        writer.serialize(LogRow {
            image_index: &outcome.image_index,
            confidence: round4(outcome.confidence),
            iou: round4(outcome.iou),
            status: outcome.status.as_str(),
        })?;
    }
    writer.flush()?;
    Ok(())
}
