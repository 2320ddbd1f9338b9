pub mod preprocessing;
pub mod rten_model;

use anyhow::Result;
use image::DynamicImage;

use crate::models::BoundingBox;

pub use rten_model::RtenDetector;

/// Raw output of the detection network for one image.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// Per-class confidences in model output order.
    pub class_scores: Vec<f32>,
    /// Predicted box, normalized to [0, 1].
    pub bbox: BoundingBox,
}

impl Prediction {
    /// Highest class score (negative logits included), 0 when the model
    /// reports no classes.
    pub fn confidence(&self) -> f32 {
        self.class_scores
            .iter()
            .copied()
            .reduce(f32::max)
            .unwrap_or(0.0)
    }
}

/// A model that classifies findings and regresses one box per image.
///
/// Implementations own their input preprocessing; callers hand over the
/// decoded image as read from disk.
pub trait Detector {
    fn predict(&self, image: &DynamicImage) -> Result<Prediction>;
}

impl<D: Detector + ?Sized> Detector for &D {
    fn predict(&self, image: &DynamicImage) -> Result<Prediction> {
        (**self).predict(image)
    }
}

impl<D: Detector + ?Sized> Detector for Box<D> {
    fn predict(&self, image: &DynamicImage) -> Result<Prediction> {
        (**self).predict(image)
    }
}
