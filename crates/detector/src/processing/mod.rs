pub mod post;
pub mod pre;

/// Letterbox geometry needed to map network coordinates back onto the source image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformParams {
    pub orig_width: u32,
    pub orig_height: u32,
    pub input_width: u32,
    pub input_height: u32,
    pub scale: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

impl TransformParams {
    /// Map a box in network input pixels to original image pixels, clamped to its bounds.
    pub fn to_original(&self, [x1, y1, x2, y2]: [f32; 4]) -> [f32; 4] {
        let max_x = self.orig_width as f32;
        let max_y = self.orig_height as f32;
        [
            ((x1 - self.offset_x) / self.scale).clamp(0.0, max_x),
            ((y1 - self.offset_y) / self.scale).clamp(0.0, max_y),
            ((x2 - self.offset_x) / self.scale).clamp(0.0, max_x),
            ((y2 - self.offset_y) / self.scale).clamp(0.0, max_y),
        ]
    }
}
