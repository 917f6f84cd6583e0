use crate::ml::{
    error::{MlError, MlResult},
    types::Keypoints,
};

/// Score reported for faces whose geometry cannot be scored.
pub const QUALITY_SENTINEL: f32 = -10.0;

const EYE_LEVEL_WEIGHT: f32 = 2.0;
const MOUTH_LEVEL_WEIGHT: f32 = 1.0;
const NOSE_OFFSET_WEIGHT: f32 = 1.0;
const MOUTH_OFFSET_WEIGHT: f32 = 2.0;
const VERTICAL_RATIO_WEIGHT: f32 = 2.0;
const EYE_SYMMETRY_WEIGHT: f32 = 2.0;
const MOUTH_SYMMETRY_WEIGHT: f32 = 1.0;

/// Frontal-pose score from the five landmarks. Higher is more frontal.
///
/// Each deviation is normalised by the eye or mouth width and mapped through
/// `exp(-d)`, so a perfectly level, centred and symmetric face scores close to
/// `11`.
pub fn score_face_quality(keypoints: &Keypoints) -> MlResult<f32> {
    let points = keypoints.to_array();
    if points
        .iter()
        .any(|point| !point.x.is_finite() || !point.y.is_finite())
    {
        return Err(MlError::DegenerateGeometry(
            "keypoint has a non-finite coordinate".to_string(),
        ));
    }
    if points.iter().any(|point| point.x < 0.0 || point.y < 0.0) {
        return Err(MlError::DegenerateGeometry(
            "keypoint has a negative coordinate".to_string(),
        ));
    }

    let Keypoints {
        left_eye,
        right_eye,
        nose,
        left_mouth,
        right_mouth,
    } = *keypoints;

    let eye_dist = left_eye.distance(&right_eye);
    let mouth_dist = left_mouth.distance(&right_mouth);
    if eye_dist == 0.0 || mouth_dist == 0.0 {
        return Err(MlError::DegenerateGeometry(format!(
            "zero landmark spacing (eyes {eye_dist}, mouth {mouth_dist})"
        )));
    }

    let eye_center = left_eye.midpoint(&right_eye);
    let mouth_center = left_mouth.midpoint(&right_mouth);

    let diff_eye_y = (left_eye.y - right_eye.y).abs() / eye_dist;
    let diff_mouth_y = (left_mouth.y - right_mouth.y).abs() / mouth_dist;
    let nose_offset = (nose.x - eye_center.x).abs() / eye_dist;
    let mouth_offset = (mouth_center.x - nose.x).abs() / mouth_dist;

    let eye_mouth_dist = eye_center.distance(&mouth_center);
    let vertical_ratio = if eye_mouth_dist > 0.0 {
        (mouth_center.y - eye_center.y) / eye_mouth_dist
    } else {
        0.0
    };

    let diff_eye_symmetry =
        (left_eye.distance(&nose) - right_eye.distance(&nose)).abs() / eye_dist;
    let diff_mouth_symmetry =
        (left_mouth.distance(&nose) - right_mouth.distance(&nose)).abs() / mouth_dist;

    Ok(EYE_LEVEL_WEIGHT * (-diff_eye_y).exp()
        + MOUTH_LEVEL_WEIGHT * (-diff_mouth_y).exp()
        + NOSE_OFFSET_WEIGHT * (-nose_offset).exp()
        + MOUTH_OFFSET_WEIGHT * (-mouth_offset).exp()
        + VERTICAL_RATIO_WEIGHT * vertical_ratio
        + EYE_SYMMETRY_WEIGHT * (-diff_eye_symmetry).exp()
        + MOUTH_SYMMETRY_WEIGHT * (-diff_mouth_symmetry).exp())
}

pub fn score_face_quality_or_sentinel(keypoints: &Keypoints) -> f32 {
    score_face_quality(keypoints).unwrap_or(QUALITY_SENTINEL)
}
