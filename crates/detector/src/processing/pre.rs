use common::span_debug;
use fast_image_resize::{FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer, images::Image};
use image::RgbImage;
use ndarray::{Array, IxDyn};

use super::TransformParams;
use crate::config::ModelFamily;
use crate::error::{DetectorError, Result};

const LETTERBOX_COLOR: u8 = 114;
const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalization {
    /// Scale to `[0, 1]`.
    Unit,
    /// Scale to `[0, 1]` then standardise with ImageNet statistics.
    ImageNet,
}

impl From<ModelFamily> for Normalization {
    fn from(family: ModelFamily) -> Self {
        match family {
            ModelFamily::Yolo => Normalization::Unit,
            ModelFamily::Detr => Normalization::ImageNet,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PreProcessor {
    pub input_size: (u32, u32),
    pub normalization: Normalization,
}

impl PreProcessor {
    pub fn new(input_size: (u32, u32), normalization: Normalization) -> Self {
        Self {
            input_size,
            normalization,
        }
    }

    /// Letterbox `image` into the network input and return the NCHW tensor.
    pub fn preprocess(&self, image: &RgbImage) -> Result<(Array<f32, IxDyn>, TransformParams)> {
        let _s = span_debug!("preprocess");

        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(DetectorError::Inference(format!(
                "Image has no pixels ({}x{})",
                width, height
            )));
        }

        tracing::trace!(width, height, "Preprocessing image");

        let (letterboxed, transform) = self.resize_and_letterbox(image)?;
        let input = self.normalize(&letterboxed, transform.input_width, transform.input_height)?;

        Ok((input, transform))
    }

    fn resize_and_letterbox(&self, image: &RgbImage) -> Result<(Vec<u8>, TransformParams)> {
        let (width, height) = image.dimensions();
        let (input_width, input_height) = self.input_size;

        let scale = (input_width as f32 / width as f32).min(input_height as f32 / height as f32);
        let new_width = ((width as f32 * scale) as u32).clamp(1, input_width);
        let new_height = ((height as f32 * scale) as u32).clamp(1, input_height);

        let offset_x = (input_width - new_width) / 2;
        let offset_y = (input_height - new_height) / 2;

        let src = Image::from_vec_u8(width, height, image.as_raw().clone(), PixelType::U8x3)
            .map_err(|e| DetectorError::Inference(format!("Invalid source image: {}", e)))?;
        let mut resized = Image::new(new_width, new_height, PixelType::U8x3);

        Resizer::new()
            .resize(
                &src,
                &mut resized,
                &ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear)),
            )
            .map_err(|e| DetectorError::Inference(format!("Resize failed: {}", e)))?;

        let stride = (input_width * 3) as usize;
        let row_len = (new_width * 3) as usize;
        let mut letterboxed = vec![LETTERBOX_COLOR; stride * input_height as usize];
        let resized_data = resized.buffer();

        for y in 0..new_height as usize {
            let src_row = y * row_len;
            let dst_row = (y + offset_y as usize) * stride + offset_x as usize * 3;
            letterboxed[dst_row..dst_row + row_len]
                .copy_from_slice(&resized_data[src_row..src_row + row_len]);
        }

        let transform = TransformParams {
            orig_width: width,
            orig_height: height,
            input_width,
            input_height,
            scale,
            offset_x: offset_x as f32,
            offset_y: offset_y as f32,
        };

        Ok((letterboxed, transform))
    }

    fn normalize(&self, pixels: &[u8], width: u32, height: u32) -> Result<Array<f32, IxDyn>> {
        let width = width as usize;
        let height = height as usize;
        let spatial = width * height;

        let (mean, std) = match self.normalization {
            Normalization::Unit => ([0.0; 3], [1.0; 3]),
            Normalization::ImageNet => (IMAGENET_MEAN, IMAGENET_STD),
        };

        let mut output = vec![0.0f32; 3 * spatial];
        for (i, px) in pixels.chunks_exact(3).enumerate() {
            for c in 0..3 {
                output[i + c * spatial] = (px[c] as f32 / 255.0 - mean[c]) / std[c];
            }
        }

        Array::from_shape_vec(IxDyn(&[1, 3, height, width]), output)
            .map_err(|e| DetectorError::Inference(format!("Tensor shape mismatch: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_output_shape_is_nchw() {
        let image = RgbImage::from_pixel(64, 48, Rgb([10, 20, 30]));
        let preprocessor = PreProcessor::new((32, 32), Normalization::Unit);

        let (tensor, _) = preprocessor.preprocess(&image).unwrap();
        assert_eq!(tensor.shape(), &[1, 3, 32, 32]);
    }

    #[test]
    fn test_letterboxing_preserves_aspect_ratio() {
        // 800x600 into 512x512: scale 0.64, resized 512x384, padded 64 top and bottom
        let image = RgbImage::from_pixel(800, 600, Rgb([255, 255, 255]));
        let preprocessor = PreProcessor::new((512, 512), Normalization::Unit);

        let (tensor, transform) = preprocessor.preprocess(&image).unwrap();

        assert!((transform.scale - 0.64).abs() < 1e-6);
        assert_eq!(transform.offset_x, 0.0);
        assert_eq!(transform.offset_y, 64.0);
        assert_eq!(transform.orig_width, 800);
        assert_eq!(transform.orig_height, 600);

        let pad = LETTERBOX_COLOR as f32 / 255.0;
        assert!((tensor[[0, 0, 0, 256]] - pad).abs() < 1e-6, "top border is padding");
        assert!((tensor[[0, 0, 511, 256]] - pad).abs() < 1e-6, "bottom border is padding");
        assert!((tensor[[0, 0, 256, 256]] - 1.0).abs() < 1e-6, "centre is image content");
    }

    #[test]
    fn test_unit_normalization_range() {
        let image = RgbImage::from_pixel(4, 4, Rgb([0, 128, 255]));
        let preprocessor = PreProcessor::new((4, 4), Normalization::Unit);

        let (tensor, _) = preprocessor.preprocess(&image).unwrap();
        assert!((tensor[[0, 0, 1, 1]] - 0.0).abs() < 1e-6);
        assert!((tensor[[0, 1, 1, 1]] - 128.0 / 255.0).abs() < 1e-6);
        assert!((tensor[[0, 2, 1, 1]] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_imagenet_normalization() {
        let image = RgbImage::from_pixel(4, 4, Rgb([255, 255, 255]));
        let preprocessor = PreProcessor::new((4, 4), Normalization::ImageNet);

        let (tensor, _) = preprocessor.preprocess(&image).unwrap();
        for c in 0..3 {
            let expected = (1.0 - IMAGENET_MEAN[c]) / IMAGENET_STD[c];
            assert!(
                (tensor[[0, c, 2, 2]] - expected).abs() < 1e-5,
                "channel {} normalised incorrectly",
                c
            );
        }
    }

    #[test]
    fn test_family_selects_normalization() {
        assert_eq!(Normalization::from(ModelFamily::Yolo), Normalization::Unit);
        assert_eq!(Normalization::from(ModelFamily::Detr), Normalization::ImageNet);
    }

    #[test]
    fn test_extreme_aspect_ratio_keeps_one_pixel() {
        let image = RgbImage::from_pixel(4000, 1, Rgb([0, 0, 0]));
        let preprocessor = PreProcessor::new((64, 64), Normalization::Unit);

        let (tensor, transform) = preprocessor.preprocess(&image).unwrap();
        assert_eq!(tensor.shape(), &[1, 3, 64, 64]);
        assert!(transform.offset_y > 0.0);
    }
}
