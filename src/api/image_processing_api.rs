use crate::{
    api::face_capture_api::{to_api_keypoints, to_keypoints},
    image::{
        decode::decode_image_from_path,
        image_compression::{EncodedImageFormat, encode_raster},
    },
    ml::{face::align::align_face, face::blur::estimate_sharpness, types::BoundingBox},
};

#[derive(Clone, Debug)]
pub struct RustFaceBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Clone, Debug)]
pub struct RustAlignedFace {
    pub png_bytes: Vec<u8>,
    pub width: i32,
    pub height: i32,
    pub all_keypoints: Vec<Vec<f64>>,
    pub rotation: f64,
}

pub fn estimate_sharpness_from_path(image_path: String) -> Result<f64, String> {
    let decoded = decode_image_from_path(&image_path).map_err(|e| e.to_string())?;
    Ok(estimate_sharpness(&decoded))
}

pub fn align_face_from_path(
    image_path: String,
    face_box: RustFaceBox,
    all_keypoints: Vec<Vec<f64>>,
    padding: i32,
) -> Result<RustAlignedFace, String> {
    let face_box =
        BoundingBox::try_from(face_box).map_err(|e| format!("invalid face box: {e}"))?;
    let keypoints = to_keypoints(&all_keypoints).map_err(|e| e.to_string())?;
    let decoded = decode_image_from_path(&image_path).map_err(|e| e.to_string())?;

    let aligned =
        align_face(&decoded, &keypoints, &face_box, padding).map_err(|e| e.to_string())?;
    let png_bytes =
        encode_raster(&aligned.image, EncodedImageFormat::Png).map_err(|e| e.to_string())?;

    Ok(RustAlignedFace {
        png_bytes,
        width: aligned.image.width() as i32,
        height: aligned.image.height() as i32,
        all_keypoints: to_api_keypoints(&aligned.keypoints),
        rotation: aligned.rotation as f64,
    })
}

impl TryFrom<RustFaceBox> for BoundingBox {
    type Error = String;

    fn try_from(value: RustFaceBox) -> Result<Self, Self::Error> {
        if !value.x.is_finite()
            || !value.y.is_finite()
            || !value.width.is_finite()
            || !value.height.is_finite()
        {
            return Err("non-finite values are not allowed".to_string());
        }
        if value.width <= 0.0 || value.height <= 0.0 {
            return Err("width and height must be greater than 0".to_string());
        }

        Ok(Self::new(
            value.x as f32,
            value.y as f32,
            (value.x + value.width) as f32,
            (value.y + value.height) as f32,
        ))
    }
}
