use image::{
    ColorType, ImageEncoder,
    codecs::{jpeg::JpegEncoder, png::PngEncoder},
};

use crate::ml::{
    error::{MlError, MlResult},
    types::{PixelLayout, RasterImage},
};

pub const FACE_CROP_JPEG_QUALITY: u8 = 90;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EncodedImageFormat {
    Jpeg { quality: u8 },
    Png,
}

/// Encodes a raster as PNG or JPEG. JPEG has no alpha channel, so RGBA input
/// is flattened to RGB by dropping alpha.
pub fn encode_raster(image: &RasterImage, format: EncodedImageFormat) -> MlResult<Vec<u8>> {
    let width = image.width();
    let height = image.height();
    if width == 0 || height == 0 {
        return Err(MlError::Encode(
            "cannot encode image with zero width or height".to_string(),
        ));
    }

    let mut encoded = Vec::new();
    match format {
        EncodedImageFormat::Jpeg { quality } => {
            let rgb = match image.layout() {
                PixelLayout::Rgb => image.pixels().to_vec(),
                PixelLayout::Rgba => drop_alpha(image.pixels()),
            };
            JpegEncoder::new_with_quality(&mut encoded, quality)
                .write_image(&rgb, width, height, ColorType::Rgb8.into())
                .map_err(|e| MlError::Encode(format!("failed to encode JPEG: {e}")))?;
        }
        EncodedImageFormat::Png => {
            let color = match image.layout() {
                PixelLayout::Rgb => ColorType::Rgb8,
                PixelLayout::Rgba => ColorType::Rgba8,
            };
            PngEncoder::new(&mut encoded)
                .write_image(image.pixels(), width, height, color.into())
                .map_err(|e| MlError::Encode(format!("failed to encode PNG: {e}")))?;
        }
    }
    Ok(encoded)
}

fn drop_alpha(rgba: &[u8]) -> Vec<u8> {
    rgba.chunks_exact(4)
        .flat_map(|px| [px[0], px[1], px[2]])
        .collect()
}
