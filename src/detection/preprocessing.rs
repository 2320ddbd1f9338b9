use image::DynamicImage;
use image::imageops::FilterType;
use rten_tensor::NdTensor;

use crate::config::InputLayout;

/// Resize to a `size`×`size` RGB image.
///
/// Nearest-neighbour sampling matches how the training images were loaded.
pub fn resize_for_model(img: &DynamicImage, size: u32) -> image::RgbImage {
    img.resize_exact(size, size, FilterType::Nearest).to_rgb8()
}

/// Pixel values scaled to [0, 1] in height-width-channel order.
pub fn normalized_pixels(img: &image::RgbImage) -> Vec<f32> {
    img.as_raw().iter().map(|&v| v as f32 / 255.0).collect()
}

/// Build a batch-of-one input tensor for the model.
pub fn to_input_tensor(img: &DynamicImage, size: u32, layout: InputLayout) -> NdTensor<f32, 4> {
    let rgb = resize_for_model(img, size);
    let hwc = normalized_pixels(&rgb);
    let side = size as usize;

    match layout {
        InputLayout::Nhwc => NdTensor::from_data([1, side, side, 3], hwc),
        InputLayout::Nchw => {
            let plane = side * side;
            let mut chw = vec![0.0f32; plane * 3];
            for (i, px) in hwc.chunks_exact(3).enumerate() {
                for (c, v) in px.iter().enumerate() {
                    chw[c * plane + i] = *v;
                }
            }
            NdTensor::from_data([1, 3, side, side], chw)
        }
    }
}
