use image::{DynamicImage, Rgba, RgbaImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use crate::models::BoundingBox;

pub const BOX_COLOR: Rgba<u8> = Rgba([0, 255, 0, 255]);

/// Draw `boxes` (in original-frame pixels) onto `img` after multiplying them
/// by `scale`, two pixels wide. Boxes falling entirely outside are dropped.
pub fn render_overlay(img: &DynamicImage, boxes: &[BoundingBox], scale: f32) -> RgbaImage {
    let mut canvas = img.to_rgba8();
    for bbox in boxes {
        let b = bbox.scaled(scale);
        let (x, y) = (b.x.round() as i32, b.y.round() as i32);
        let (w, h) = (b.w.round().max(1.0) as u32, b.h.round().max(1.0) as u32);

        draw_hollow_rect_mut(&mut canvas, Rect::at(x, y).of_size(w, h), BOX_COLOR);
        if w > 2 && h > 2 {
            draw_hollow_rect_mut(
                &mut canvas,
                Rect::at(x + 1, y + 1).of_size(w - 2, h - 2),
                BOX_COLOR,
            );
        }
    }
    canvas
}
