use image::{ImageBuffer, Pixel, Rgb, Rgba, imageops};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use nalgebra::{Matrix3, Vector2, Vector3};

use crate::ml::{
    error::{MlError, MlResult},
    types::{BoundingBox, Keypoints, PixelLayout, Point2D, RasterImage},
};

pub const DEFAULT_PADDING: i32 = 10;

#[derive(Clone, Debug)]
pub struct AlignedFace {
    /// Upright crop around the face box.
    pub image: RasterImage,
    /// Input keypoints in crop coordinates.
    pub keypoints: Keypoints,
    /// Eye-line angle of the source face, in radians. The crop is rotated by its negation.
    pub rotation: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct CropRect {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

/// Rotates `source` about the eye midpoint until the eye-line is horizontal,
/// then crops the rotated face box grown by `padding` on every side.
///
/// The rotated canvas is sized to hold the whole source, so no corner is
/// clipped before cropping. `source` is never modified.
pub fn align_face(
    source: &RasterImage,
    keypoints: &Keypoints,
    face_box: &BoundingBox,
    padding: i32,
) -> MlResult<AlignedFace> {
    let left_eye = keypoints.left_eye;
    let right_eye = keypoints.right_eye;
    let angle = (right_eye.y - left_eye.y).atan2(right_eye.x - left_eye.x);
    let pivot = left_eye.midpoint(&right_eye);
    let rotation = rotation_about(pivot, -angle);

    let width = source.width() as f32;
    let height = source.height() as f32;
    let source_corners = [
        Point2D::new(0.0, 0.0),
        Point2D::new(width, 0.0),
        Point2D::new(0.0, height),
        Point2D::new(width, height),
    ];
    let (min, max) = extent(&source_corners.map(|p| transform_point(&rotation, p)));
    let rotated_width = (max.x - min.x).ceil();
    let rotated_height = (max.y - min.y).ceil();
    if !(rotated_width >= 1.0 && rotated_height >= 1.0) {
        return Err(MlError::DegenerateGeometry(format!(
            "rotated canvas is {rotated_width}x{rotated_height}"
        )));
    }
    let rotated_width = rotated_width as u32;
    let rotated_height = rotated_height as u32;

    let transform = Matrix3::new_translation(&Vector2::new(-min.x, -min.y)) * rotation;
    let (box_min, box_max) = extent(&face_box.corners().map(|p| transform_point(&transform, p)));
    let padding = padding as f32;
    let crop_x1 = (box_min.x.floor() - padding).max(0.0);
    let crop_y1 = (box_min.y.floor() - padding).max(0.0);
    let crop_x2 = (box_max.x.ceil() + padding).min(rotated_width as f32);
    let crop_y2 = (box_max.y.ceil() + padding).min(rotated_height as f32);
    if !(crop_x2 > crop_x1 && crop_y2 > crop_y1) {
        return Err(MlError::DegenerateGeometry(
            "face crop is empty after rotation".to_string(),
        ));
    }
    let crop = CropRect {
        x: crop_x1 as u32,
        y: crop_y1 as u32,
        width: (crop_x2 - crop_x1) as u32,
        height: (crop_y2 - crop_y1) as u32,
    };

    let projection = Projection::from_matrix(row_major(&transform))
        .ok_or_else(|| MlError::DegenerateGeometry("rotation is not invertible".to_string()))?;
    let pixels = match source.layout() {
        PixelLayout::Rgb => rotate_and_crop(
            source,
            &projection,
            (rotated_width, rotated_height),
            crop,
            Rgb([0, 0, 0]),
        )?,
        PixelLayout::Rgba => rotate_and_crop(
            source,
            &projection,
            (rotated_width, rotated_height),
            crop,
            Rgba([0, 0, 0, 0]),
        )?,
    };
    let image = RasterImage::new(crop.width, crop.height, source.layout(), pixels)?;

    let offset = Point2D::new(crop.x as f32, crop.y as f32);
    let aligned_keypoints = keypoints.map(|p| {
        let moved = transform_point(&transform, p);
        Point2D::new(moved.x - offset.x, moved.y - offset.y)
    });

    Ok(AlignedFace {
        image,
        keypoints: aligned_keypoints,
        rotation: angle,
    })
}

fn rotate_and_crop<P>(
    source: &RasterImage,
    projection: &Projection,
    (rotated_width, rotated_height): (u32, u32),
    crop: CropRect,
    fill: P,
) -> MlResult<Vec<u8>>
where
    P: Pixel<Subpixel = u8> + Send + Sync + 'static,
{
    let input = ImageBuffer::<P, Vec<u8>>::from_raw(
        source.width(),
        source.height(),
        source.pixels().to_vec(),
    )
    .ok_or_else(|| MlError::InvalidRequest("source buffer does not match its size".to_string()))?;

    let mut rotated = ImageBuffer::from_pixel(rotated_width, rotated_height, fill);
    warp_into(
        &input,
        projection,
        Interpolation::Bilinear,
        fill,
        &mut rotated,
    );

    let cropped = imageops::crop_imm(&rotated, crop.x, crop.y, crop.width, crop.height).to_image();
    Ok(cropped.into_raw())
}

/// Homogeneous rotation by `angle` (y axis pointing down) about `pivot`.
fn rotation_about(pivot: Point2D, angle: f32) -> Matrix3<f32> {
    let to_pivot = Vector2::new(pivot.x, pivot.y);
    Matrix3::new_translation(&to_pivot)
        * Matrix3::new_rotation(angle)
        * Matrix3::new_translation(&-to_pivot)
}

fn transform_point(transform: &Matrix3<f32>, point: Point2D) -> Point2D {
    let moved = transform * Vector3::new(point.x, point.y, 1.0);
    Point2D::new(moved.x, moved.y)
}

fn extent(points: &[Point2D]) -> (Point2D, Point2D) {
    points.iter().fold(
        (
            Point2D::new(f32::INFINITY, f32::INFINITY),
            Point2D::new(f32::NEG_INFINITY, f32::NEG_INFINITY),
        ),
        |(min, max), p| {
            (
                Point2D::new(min.x.min(p.x), min.y.min(p.y)),
                Point2D::new(max.x.max(p.x), max.y.max(p.y)),
            )
        },
    )
}

fn row_major(m: &Matrix3<f32>) -> [f32; 9] {
    [
        m[(0, 0)],
        m[(0, 1)],
        m[(0, 2)],
        m[(1, 0)],
        m[(1, 1)],
        m[(1, 2)],
        m[(2, 0)],
        m[(2, 1)],
        m[(2, 2)],
    ]
}
