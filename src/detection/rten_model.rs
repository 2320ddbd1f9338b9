use std::path::Path;

use anyhow::{Context, Result};
use image::DynamicImage;
use rten::{Model, NodeId};
use rten_tensor::Tensor;
use rten_tensor::prelude::*;
use tracing::debug;

use crate::config::{InputLayout, ModelConfig};
use crate::detection::{Detector, Prediction, preprocessing};
use crate::error::PrepError;
use crate::models::BoundingBox;

/// Detection network converted to the `.rten` format.
///
/// The model is expected to take one image batch and produce two outputs:
/// per-class sigmoid scores `[1, classes]` and a normalized box `[1, 4]`.
/// Output nodes can be named explicitly; otherwise the first two outputs are
/// used in that order.
pub struct RtenDetector {
    model: Model,
    input: NodeId,
    class_output: NodeId,
    bbox_output: NodeId,
    input_size: u32,
    layout: InputLayout,
}

impl RtenDetector {
    pub fn load(config: &ModelConfig) -> Result<Self> {
        let model = load_model(&config.path)?;

        let input = *model
            .input_ids()
            .first()
            .ok_or_else(|| PrepError::ModelOutput("model has no inputs".to_string()))?;

        let outputs = model.output_ids();
        let class_output = resolve_output(&model, config.class_output.as_deref(), outputs, 0)?;
        let bbox_output = resolve_output(&model, config.bbox_output.as_deref(), outputs, 1)?;

        debug!(
            "Loaded model {:?} with {} outputs, input {}x{} {:?}",
            config.path,
            outputs.len(),
            config.input_size,
            config.input_size,
            config.input_layout
        );

        Ok(Self {
            model,
            input,
            class_output,
            bbox_output,
            input_size: config.input_size,
            layout: config.input_layout,
        })
    }
}

fn load_model(path: &Path) -> Result<Model> {
    if !path.exists() {
        anyhow::bail!("Model not found at {}", path.display());
    }
    let model =
        Model::load_file(path).with_context(|| format!("Failed to load model {:?}", path))?;
    Ok(model)
}

fn resolve_output(
    model: &Model,
    name: Option<&str>,
    outputs: &[NodeId],
    position: usize,
) -> Result<NodeId> {
    match name {
        Some(name) => model
            .find_node(name)
            .ok_or_else(|| PrepError::ModelOutput(format!("no node named '{name}'")).into()),
        None => outputs.get(position).copied().ok_or_else(|| {
            PrepError::ModelOutput(format!(
                "expected at least {} outputs, model has {}",
                position + 1,
                outputs.len()
            ))
            .into()
        }),
    }
}

impl Detector for RtenDetector {
    fn predict(&self, image: &DynamicImage) -> Result<Prediction> {
        let input = preprocessing::to_input_tensor(image, self.input_size, self.layout).into_dyn();

        let mut outputs = self.model.run(
            vec![(self.input, input.view().into())],
            &[self.class_output, self.bbox_output],
            None,
        )?;
        if outputs.len() != 2 {
            return Err(PrepError::ModelOutput(format!(
                "expected 2 outputs, got {}",
                outputs.len()
            ))
            .into());
        }

        let bbox: Tensor<f32> = outputs
            .remove(1)
            .try_into()
            .map_err(|e| PrepError::ModelOutput(format!("box output is not f32: {e:?}")))?;
        let scores: Tensor<f32> = outputs
            .remove(0)
            .try_into()
            .map_err(|e| PrepError::ModelOutput(format!("class output is not f32: {e:?}")))?;

        let bbox = bbox.to_vec();
        let bbox = BoundingBox::from_xywh(&bbox).ok_or_else(|| {
            PrepError::ModelOutput(format!("box output has {} values, need 4", bbox.len()))
        })?;

        Ok(Prediction {
            class_scores: scores.to_vec(),
            bbox,
        })
    }
}
