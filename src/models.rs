use std::fmt;

use serde::{Deserialize, Serialize};

/// Finding classes the detection network was trained on, in output order.
pub const TARGET_CLASSES: [&str; 8] = [
    "Atelectasis",
    "Cardiomegaly",
    "Effusion",
    "Infiltrate",
    "Mass",
    "Nodule",
    "Pneumonia",
    "Pneumothorax",
];

/// Added to the union area so two degenerate boxes never divide by zero.
const IOU_EPSILON: f32 = 1e-6;

/// Axis-aligned box as top-left corner plus size.
///
/// Coordinates are either source-image pixels or normalized to [0, 1];
/// both boxes given to [`BoundingBox::iou`] must use the same space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f32; 4]", into = "[f32; 4]")]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    /// Build from an `[x, y, w, h]` slice, as produced by model outputs and
    /// annotation exports. Returns `None` for fewer than four values.
    pub fn from_xywh(values: &[f32]) -> Option<Self> {
        match values {
            [x, y, w, h, ..] => Some(Self::new(*x, *y, *w, *h)),
            _ => None,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.w
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.h
    }

    pub fn area(&self) -> f32 {
        self.w * self.h
    }

    /// Multiply every coordinate by `factor`.
    pub fn scaled(&self, factor: f32) -> Self {
        Self::new(
            self.x * factor,
            self.y * factor,
            self.w * factor,
            self.h * factor,
        )
    }

    /// Convert pixel coordinates of a square `frame`-sized image to [0, 1].
    pub fn normalized(&self, frame: f32) -> Self {
        self.scaled(1.0 / frame)
    }

    /// Intersection over union with `other`.
    ///
    /// Non-overlapping boxes give 0. The result stays in [0, 1] up to
    /// floating-point rounding and never panics, even for zero-area boxes.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());

        let inter = (right - left).max(0.0) * (bottom - top).max(0.0);
        inter / (self.area() + other.area() - inter + IOU_EPSILON)
    }

    pub fn to_array(&self) -> [f32; 4] {
        [self.x, self.y, self.w, self.h]
    }
}

impl From<[f32; 4]> for BoundingBox {
    fn from(v: [f32; 4]) -> Self {
        BoundingBox::new(v[0], v[1], v[2], v[3])
    }
}

impl From<BoundingBox> for [f32; 4] {
    fn from(b: BoundingBox) -> Self {
        b.to_array()
    }
}

/// One row of an annotation CSV.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationRecord {
    pub image_index: String,
    pub bbox: BoundingBox,
    pub area: Option<f32>,
    /// `Finding Label` split on `|`, empty when the column is absent.
    pub finding_labels: Vec<String>,
}

/// Outcome of checking one image against its ground-truth box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VerificationStatus {
    Identified,
    Unidentified,
    UnidentifiedNoRef,
}

impl VerificationStatus {
    /// Name of the bucket folder the image is copied into.
    pub fn bucket(&self) -> &'static str {
        match self {
            VerificationStatus::Identified => "Identified",
            VerificationStatus::Unidentified | VerificationStatus::UnidentifiedNoRef => {
                "Unidentified"
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::Identified => "Identified",
            VerificationStatus::Unidentified => "Unidentified",
            VerificationStatus::UnidentifiedNoRef => "Unidentified (No Ref)",
        }
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-image result of a verified sorting run. Written once, never updated.
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationOutcome {
    pub image_index: String,
    pub confidence: f32,
    pub iou: f32,
    pub status: VerificationStatus,
}

/// Single-key choice made by the operator during a manual audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuditDecision {
    Correct,
    Reannotate,
    Garbage,
    Quit,
}

impl AuditDecision {
    /// Parse console input; only the first non-blank character counts.
    pub fn from_input(input: &str) -> Option<Self> {
        match input.trim().chars().next()?.to_ascii_lowercase() {
            'c' => Some(AuditDecision::Correct),
            'r' => Some(AuditDecision::Reannotate),
            'g' => Some(AuditDecision::Garbage),
            'q' => Some(AuditDecision::Quit),
            _ => None,
        }
    }

    /// Outcome folder for the decision; `Quit` has none.
    pub fn folder(&self) -> Option<&'static str> {
        match self {
            AuditDecision::Correct => Some("Correct"),
            AuditDecision::Reannotate => Some("Re-annotate"),
            AuditDecision::Garbage => Some("Garbage"),
            AuditDecision::Quit => None,
        }
    }
}

impl fmt::Display for AuditDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuditDecision::Correct => "correct",
            AuditDecision::Reannotate => "re-annotate",
            AuditDecision::Garbage => "garbage",
            AuditDecision::Quit => "quit",
        };
        f.write_str(name)
    }
}

impl TryFrom<&str> for AuditDecision {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "correct" => Ok(AuditDecision::Correct),
            "re-annotate" => Ok(AuditDecision::Reannotate),
            "garbage" => Ok(AuditDecision::Garbage),
            "quit" => Ok(AuditDecision::Quit),
            _ => Err(anyhow::anyhow!("Invalid audit decision: {}", value)),
        }
    }
}
