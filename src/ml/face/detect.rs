use log::debug;

use crate::ml::{
    config::DetectionSettings,
    error::{MlError, MlResult},
    face::nms::select_detections,
    types::{BoundingBox, Detection, Dimensions, ImageBounds, Keypoints, Point2D},
};

/// Raw detector outputs for one feature-map stride.
///
/// `scores` holds one value per anchor, `box_distances` four per anchor
/// (`left, top, right, bottom`) and `keypoint_distances` two per keypoint per
/// anchor, all in stride units as the detector emits them.
#[derive(Clone, Copy, Debug)]
pub struct StrideOutput<'a> {
    pub stride: u32,
    pub scores: &'a [f32],
    pub box_distances: &'a [f32],
    pub keypoint_distances: &'a [f32],
}

pub fn decode_boxes(
    anchors: &[Point2D],
    distances: &[f32],
    bounds: Option<ImageBounds>,
) -> MlResult<Vec<BoundingBox>> {
    if distances.len() != anchors.len() * 4 {
        return Err(MlError::ShapeMismatch(format!(
            "box distances length {} does not match 4 x {} anchors",
            distances.len(),
            anchors.len()
        )));
    }

    let boxes = anchors
        .iter()
        .zip(distances.chunks_exact(4))
        .map(|(anchor, d)| {
            let mut bbox = BoundingBox::new(
                anchor.x - d[0],
                anchor.y - d[1],
                anchor.x + d[2],
                anchor.y + d[3],
            );
            if let Some(bounds) = bounds {
                bbox.x1 = clamp_coordinate(bbox.x1, bounds.width);
                bbox.y1 = clamp_coordinate(bbox.y1, bounds.height);
                bbox.x2 = clamp_coordinate(bbox.x2, bounds.width);
                bbox.y2 = clamp_coordinate(bbox.y2, bounds.height);
                // Negative distances can invert the box; collapse it instead.
                bbox.x2 = bbox.x2.max(bbox.x1);
                bbox.y2 = bbox.y2.max(bbox.y1);
            }
            bbox
        })
        .collect();
    Ok(boxes)
}

/// Decodes keypoints, inferring the per-anchor count from the buffer length.
pub fn decode_keypoints(
    anchors: &[Point2D],
    distances: &[f32],
    bounds: Option<ImageBounds>,
) -> MlResult<Vec<Vec<Point2D>>> {
    if anchors.is_empty() {
        if distances.is_empty() {
            return Ok(Vec::new());
        }
        return Err(MlError::ShapeMismatch(format!(
            "{} keypoint distances supplied without anchors",
            distances.len()
        )));
    }

    let per_anchor = anchors.len() * 2;
    let num_keypoints = distances.len() / per_anchor;
    if num_keypoints == 0 || distances.len() % per_anchor != 0 {
        return Err(MlError::ShapeMismatch(format!(
            "keypoint distances length {} is not a positive multiple of 2 x {} anchors",
            distances.len(),
            anchors.len()
        )));
    }

    let keypoints = anchors
        .iter()
        .zip(distances.chunks_exact(num_keypoints * 2))
        .map(|(anchor, d)| {
            d.chunks_exact(2)
                .map(|offset| {
                    let mut point = Point2D::new(anchor.x + offset[0], anchor.y + offset[1]);
                    if let Some(bounds) = bounds {
                        point.x = clamp_coordinate(point.x, bounds.width);
                        point.y = clamp_coordinate(point.y, bounds.height);
                    }
                    point
                })
                .collect()
        })
        .collect();
    Ok(keypoints)
}

fn clamp_coordinate(value: f32, max: f32) -> f32 {
    value.min(max).max(0.0)
}

/// Anchor centres for one stride, row-major, each repeated `anchors_per_location` times.
pub fn anchor_centers(input: Dimensions, stride: u32, anchors_per_location: usize) -> Vec<Point2D> {
    if stride == 0 {
        return Vec::new();
    }
    let grid_width = input.width.div_ceil(stride);
    let grid_height = input.height.div_ceil(stride);

    let mut anchors =
        Vec::with_capacity(grid_width as usize * grid_height as usize * anchors_per_location);
    for y in 0..grid_height {
        for x in 0..grid_width {
            let center = Point2D::new((x * stride) as f32, (y * stride) as f32);
            anchors.extend(std::iter::repeat_n(center, anchors_per_location));
        }
    }
    anchors
}

pub fn run_face_detection(
    outputs: &[StrideOutput<'_>],
    input: Dimensions,
    settings: &DetectionSettings,
) -> MlResult<Vec<Detection>> {
    let bounds = settings.clamp_to_image.then(|| ImageBounds::from(input));
    let mut candidates = Vec::new();

    for output in outputs {
        if !settings.strides.contains(&output.stride) {
            return Err(MlError::InvalidRequest(format!(
                "stride {} is not one of the configured strides {:?}",
                output.stride, settings.strides
            )));
        }
        let anchors = anchor_centers(input, output.stride, settings.anchors_per_location);
        if output.scores.len() != anchors.len() {
            return Err(MlError::ShapeMismatch(format!(
                "stride {} produced {} scores for {} anchors",
                output.stride,
                output.scores.len(),
                anchors.len()
            )));
        }
        if output.box_distances.len() != anchors.len() * 4 {
            return Err(MlError::ShapeMismatch(format!(
                "stride {} produced {} box distances for {} anchors",
                output.stride,
                output.box_distances.len(),
                anchors.len()
            )));
        }
        if output.keypoint_distances.len() != anchors.len() * 10 {
            return Err(MlError::ShapeMismatch(format!(
                "stride {} produced {} keypoint distances for {} anchors",
                output.stride,
                output.keypoint_distances.len(),
                anchors.len()
            )));
        }

        let stride = output.stride as f32;
        let mut kept_anchors = Vec::new();
        let mut kept_scores = Vec::new();
        let mut box_distances = Vec::new();
        let mut keypoint_distances = Vec::new();
        for (i, &score) in output.scores.iter().enumerate() {
            if !score.is_finite() || score < settings.score_threshold {
                continue;
            }
            let anchor_boxes = &output.box_distances[i * 4..(i + 1) * 4];
            let anchor_keypoints = &output.keypoint_distances[i * 10..(i + 1) * 10];
            if !anchor_boxes.iter().chain(anchor_keypoints).all(|d| d.is_finite()) {
                continue;
            }
            kept_anchors.push(anchors[i]);
            kept_scores.push(score);
            box_distances.extend(anchor_boxes.iter().map(|d| d * stride));
            keypoint_distances.extend(anchor_keypoints.iter().map(|d| d * stride));
        }
        if kept_anchors.is_empty() {
            continue;
        }

        let boxes = decode_boxes(&kept_anchors, &box_distances, bounds)?;
        let keypoints = decode_keypoints(&kept_anchors, &keypoint_distances, bounds)?;
        for ((bbox, points), score) in boxes.into_iter().zip(keypoints).zip(kept_scores) {
            candidates.push(Detection {
                bbox,
                score,
                keypoints: Keypoints::try_from(points.as_slice())?,
            });
        }
    }

    let keep = select_detections(&candidates, settings.nms_threshold);
    debug!(
        "[ml][detect] {} candidates above score {}, {} kept after suppression",
        candidates.len(),
        settings.score_threshold,
        keep.len()
    );
    Ok(keep.into_iter().map(|i| candidates[i].clone()).collect())
}

/// Maps detections from letterboxed detector input back to source-image pixels.
pub fn rescale_detections(detections: &mut [Detection], det_scale: f32) -> MlResult<()> {
    if !det_scale.is_finite() || det_scale <= 0.0 {
        return Err(MlError::InvalidRequest(format!(
            "detection scale must be positive, got {det_scale}"
        )));
    }

    for detection in detections.iter_mut() {
        let bbox = &mut detection.bbox;
        bbox.x1 /= det_scale;
        bbox.y1 /= det_scale;
        bbox.x2 /= det_scale;
        bbox.y2 /= det_scale;
        detection.keypoints = detection
            .keypoints
            .map(|p| Point2D::new(p.x / det_scale, p.y / det_scale));
    }
    Ok(())
}
