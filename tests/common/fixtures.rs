#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::anyhow;
use image::{DynamicImage, ImageBuffer, Luma, RgbaImage};
use tempfile::TempDir;

use xrayprep::detection::{Detector, Prediction};
use xrayprep::models::{AuditDecision, BoundingBox};
use xrayprep::tasks::{AuditView, DecisionSource};

/// Scratch directory for one test. Dropped (and deleted) with the guard.
pub fn create_workspace() -> TempDir {
    TempDir::new().expect("Failed to create temp directory")
}

/// Writes a grayscale PNG filled with `shade`, creating parent folders.
/// The shade doubles as an identifier for [`ScriptedDetector`].
pub fn write_png(path: &Path, size: u32, shade: u8) -> PathBuf {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create image folder");
    }
    let img = ImageBuffer::from_pixel(size, size, Luma([shade]));
    img.save_with_format(path, image::ImageFormat::Png)
        .expect("Failed to save test image");
    path.to_path_buf()
}

/// Writes bytes that carry a `.png` name but are not an image.
pub fn write_corrupt_png(path: &Path) -> PathBuf {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create image folder");
    }
    fs::write(path, b"definitely not a png").expect("Failed to write corrupt image");
    path.to_path_buf()
}

pub fn write_file(path: &Path, contents: &str) -> PathBuf {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create folder");
    }
    fs::write(path, contents).expect("Failed to write file");
    path.to_path_buf()
}

/// Sorted file names directly inside `dir`.
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .expect("Failed to read folder")
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// Detector double that answers by the shade of the top-left pixel.
#[derive(Debug, Default)]
pub struct ScriptedDetector {
    answers: HashMap<u8, Prediction>,
}

impl ScriptedDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(mut self, shade: u8, confidence: f32, bbox: BoundingBox) -> Self {
        self.answers.insert(
            shade,
            Prediction {
                class_scores: vec![0.01, confidence, 0.02],
                bbox,
            },
        );
        self
    }
}

impl Detector for ScriptedDetector {
    fn predict(&self, image: &DynamicImage) -> anyhow::Result<Prediction> {
        let shade = image.to_luma8().get_pixel(0, 0)[0];
        self.answers
            .get(&shade)
            .cloned()
            .ok_or_else(|| anyhow!("no scripted answer for shade {}", shade))
    }
}

/// Decisions handed out in order; `None` once the script runs out.
#[derive(Debug, Default)]
pub struct ScriptedDecisions {
    queue: VecDeque<AuditDecision>,
    pub asked: Vec<String>,
}

impl ScriptedDecisions {
    pub fn new(decisions: &[AuditDecision]) -> Self {
        Self {
            queue: decisions.iter().copied().collect(),
            asked: Vec::new(),
        }
    }
}

impl DecisionSource for ScriptedDecisions {
    fn decide(
        &mut self,
        image_index: &str,
        _findings: &[String],
    ) -> anyhow::Result<Option<AuditDecision>> {
        self.asked.push(image_index.to_string());
        Ok(self.queue.pop_front())
    }
}

/// View that keeps every overlay it was shown.
#[derive(Debug, Default)]
pub struct RecordingView {
    pub shown: Vec<(String, RgbaImage)>,
}

impl AuditView for RecordingView {
    fn show(&mut self, image_index: &str, overlay: &RgbaImage) -> anyhow::Result<()> {
        self.shown.push((image_index.to_string(), overlay.clone()));
        Ok(())
    }
}
