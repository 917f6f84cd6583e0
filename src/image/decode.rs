use std::{io::Cursor, path::Path};

use exif::{In, Reader as ExifReader, Tag};
use image::DynamicImage;

use crate::ml::{
    error::{MlError, MlResult},
    types::{PixelLayout, RasterImage},
};

pub fn decode_image_from_path(image_path: impl AsRef<Path>) -> MlResult<RasterImage> {
    let image_path = image_path.as_ref();
    let file_bytes = std::fs::read(image_path).map_err(|e| {
        MlError::Decode(format!(
            "failed to read image file '{}': {e}",
            image_path.display()
        ))
    })?;
    decode_image_from_bytes(&file_bytes)
}

/// Decodes any format the `image` crate recognises into an upright RGB raster.
pub fn decode_image_from_bytes(file_bytes: &[u8]) -> MlResult<RasterImage> {
    let decoded = image::load_from_memory(file_bytes)?;
    let oriented = apply_exif_orientation(decoded, read_exif_orientation(file_bytes)).to_rgb8();

    RasterImage::new(
        oriented.width(),
        oriented.height(),
        PixelLayout::Rgb,
        oriented.into_raw(),
    )
}

fn read_exif_orientation(image_data: &[u8]) -> u32 {
    let mut reader = Cursor::new(image_data);
    ExifReader::new()
        .read_from_container(&mut reader)
        .ok()
        .and_then(|data| {
            data.get_field(Tag::Orientation, In::PRIMARY)
                .and_then(|field| field.value.get_uint(0))
        })
        .filter(|value| (1..=8).contains(value))
        .unwrap_or(1)
}

fn apply_exif_orientation(image: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        2 => image.fliph(),
        3 => image.rotate180(),
        4 => image.flipv(),
        5 => image.fliph().rotate270(),
        6 => image.rotate90(),
        7 => image.fliph().rotate90(),
        8 => image.rotate270(),
        _ => image,
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

    use super::{apply_exif_orientation, decode_image_from_bytes, decode_image_from_path};
    use crate::ml::{error::MlError, types::PixelLayout};

    fn png_bytes(image: &RgbImage) -> Vec<u8> {
        let mut bytes = Vec::new();
        image
            .write_to(&mut std::io::Cursor::new(&mut bytes), ImageFormat::Png)
            .expect("png encoding should succeed");
        bytes
    }

    fn corner_marked(width: u32, height: u32) -> RgbImage {
        let mut image = RgbImage::from_pixel(width, height, Rgb([10, 10, 10]));
        image.put_pixel(0, 0, Rgb([255, 0, 0]));
        image
    }

    #[test]
    fn decodes_png_bytes_to_rgb_raster() {
        let raster = decode_image_from_bytes(&png_bytes(&corner_marked(5, 3)))
            .expect("png should decode");

        assert_eq!(raster.width(), 5);
        assert_eq!(raster.height(), 3);
        assert_eq!(raster.layout(), PixelLayout::Rgb);
        assert_eq!(raster.rgb_at(0, 0), [255, 0, 0]);
        assert_eq!(raster.rgb_at(4, 2), [10, 10, 10]);
    }

    #[test]
    fn decodes_from_path() {
        let mut file = tempfile::Builder::new()
            .suffix(".png")
            .tempfile()
            .expect("temp file should be created");
        file.write_all(&png_bytes(&corner_marked(4, 6)))
            .expect("temp file should be writable");

        let raster = decode_image_from_path(file.path()).expect("png file should decode");

        assert_eq!((raster.width(), raster.height()), (4, 6));
    }

    #[test]
    fn missing_file_and_garbage_are_decode_errors() {
        let dir = tempfile::tempdir().expect("temp dir should be created");

        assert!(matches!(
            decode_image_from_path(dir.path().join("missing.jpg")),
            Err(MlError::Decode(_))
        ));
        assert!(matches!(
            decode_image_from_bytes(b"not an image"),
            Err(MlError::Decode(_))
        ));
    }

    #[test]
    fn orientation_six_rotates_clockwise() {
        let image = DynamicImage::ImageRgb8(corner_marked(5, 3));

        let rotated = apply_exif_orientation(image, 6).to_rgb8();

        assert_eq!(rotated.dimensions(), (3, 5));
        // Top-left moves to top-right after a 90 degree clockwise turn.
        assert_eq!(rotated.get_pixel(2, 0), &Rgb([255, 0, 0]));
    }

    #[test]
    fn unknown_orientation_is_left_alone() {
        let image = DynamicImage::ImageRgb8(corner_marked(5, 3));

        let same = apply_exif_orientation(image, 0).to_rgb8();

        assert_eq!(same.dimensions(), (5, 3));
        assert_eq!(same.get_pixel(0, 0), &Rgb([255, 0, 0]));
    }
}
