//! Pipeline settings shared by detection post-processing, alignment and frame selection.
//!
//! Every section deserializes with `#[serde(default)]`, so a JSON document only
//! needs to name the values it overrides.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ml::{
    error::{MlError, MlResult},
    face::{align::DEFAULT_PADDING, nms::DEFAULT_OVERLAP_THRESHOLD},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionSettings {
    /// Anchors scoring below this are dropped before decoding.
    pub score_threshold: f32,
    /// Overlap ratio above which the lower-scoring detection is suppressed.
    pub nms_threshold: f32,
    /// Clamp decoded boxes and keypoints to the detector input.
    pub clamp_to_image: bool,
    /// Feature map strides, one output level each.
    pub strides: Vec<u32>,
    pub anchors_per_location: usize,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            score_threshold: 0.5,
            nms_threshold: DEFAULT_OVERLAP_THRESHOLD,
            clamp_to_image: true,
            strides: vec![8, 16, 32],
            anchors_per_location: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignmentSettings {
    /// Pixels added on every side of the rotated face box before cropping.
    pub padding: i32,
}

impl Default for AlignmentSettings {
    fn default() -> Self {
        Self {
            padding: DEFAULT_PADDING,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    /// Aligned crops with a Laplacian variance below this are never kept.
    pub min_sharpness: f64,
    /// Weight of `ln(1 + sharpness)` in the combined frame score.
    pub sharpness_weight: f64,
    pub max_payload_bytes: usize,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            min_sharpness: 10.0,
            sharpness_weight: 0.25,
            max_payload_bytes: 10 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub detection: DetectionSettings,
    pub alignment: AlignmentSettings,
    pub capture: CaptureSettings,
}

impl PipelineConfig {
    pub fn from_json_str(json: &str) -> MlResult<Self> {
        let config: PipelineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> MlResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            MlError::Config(format!("failed to read config '{}': {e}", path.display()))
        })?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> MlResult<()> {
        let detection = &self.detection;
        if !(0.0..=1.0).contains(&detection.score_threshold) {
            return Err(MlError::Config(format!(
                "score_threshold must be within [0, 1], got {}",
                detection.score_threshold
            )));
        }
        if !(0.0..=1.0).contains(&detection.nms_threshold) {
            return Err(MlError::Config(format!(
                "nms_threshold must be within [0, 1], got {}",
                detection.nms_threshold
            )));
        }
        if detection.strides.is_empty() || detection.strides.contains(&0) {
            return Err(MlError::Config(
                "strides must be non-empty and non-zero".to_string(),
            ));
        }
        if detection.anchors_per_location == 0 {
            return Err(MlError::Config(
                "anchors_per_location must be at least 1".to_string(),
            ));
        }

        let capture = &self.capture;
        if !capture.min_sharpness.is_finite() || capture.min_sharpness < 0.0 {
            return Err(MlError::Config(format!(
                "min_sharpness must be a non-negative number, got {}",
                capture.min_sharpness
            )));
        }
        if !capture.sharpness_weight.is_finite() || capture.sharpness_weight < 0.0 {
            return Err(MlError::Config(format!(
                "sharpness_weight must be a non-negative number, got {}",
                capture.sharpness_weight
            )));
        }
        Ok(())
    }
}
