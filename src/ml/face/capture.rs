use log::debug;

use crate::ml::{
    config::PipelineConfig,
    error::{MlError, MlResult},
    face::{
        align::{AlignedFace, align_face},
        blur::estimate_sharpness,
        quality::score_face_quality,
    },
    types::{Detection, RasterImage},
};

#[derive(Clone, Debug)]
pub struct FaceCandidate {
    pub detection: Detection,
    pub quality: f32,
    pub sharpness: f64,
    pub combined_score: f64,
    pub aligned: AlignedFace,
}

/// Scores one detection: pose quality, aligned crop and crop sharpness.
pub fn evaluate_detection(
    source: &RasterImage,
    detection: &Detection,
    config: &PipelineConfig,
) -> MlResult<FaceCandidate> {
    let quality = score_face_quality(&detection.keypoints)?;
    let aligned = align_face(
        source,
        &detection.keypoints,
        &detection.bbox,
        config.alignment.padding,
    )?;
    let sharpness = estimate_sharpness(&aligned.image);
    if sharpness < config.capture.min_sharpness {
        return Err(MlError::InsufficientSharpness {
            sharpness,
            minimum: config.capture.min_sharpness,
        });
    }

    let combined_score = combined_score(quality, sharpness, config.capture.sharpness_weight);
    if !combined_score.is_finite() {
        return Err(MlError::DegenerateGeometry(format!(
            "combined score {combined_score} is not finite"
        )));
    }

    Ok(FaceCandidate {
        detection: detection.clone(),
        quality,
        sharpness,
        combined_score,
        aligned,
    })
}

pub fn combined_score(quality: f32, sharpness: f64, sharpness_weight: f64) -> f64 {
    quality as f64 + sharpness_weight * sharpness.ln_1p()
}

/// Running best face across frames, owned by whoever drives the capture loop.
#[derive(Clone, Debug, Default)]
pub struct CaptureState {
    best: Option<FaceCandidate>,
    processed_faces: u64,
    frames_seen: u64,
}

impl CaptureState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one frame into the state. Returns `true` when the best face changed.
    ///
    /// Detections that fail scoring or alignment are skipped; they still count
    /// towards `processed_faces`.
    pub fn observe_frame(
        &mut self,
        source: &RasterImage,
        detections: &[Detection],
        config: &PipelineConfig,
    ) -> bool {
        self.frames_seen += 1;
        let mut improved = false;

        for (index, detection) in detections.iter().enumerate() {
            self.processed_faces += 1;
            let candidate = match evaluate_detection(source, detection, config) {
                Ok(candidate) => candidate,
                Err(err) => {
                    debug!(
                        "[ml][capture] frame {} skipped detection {index}: {err}",
                        self.frames_seen
                    );
                    continue;
                }
            };

            let is_better = self
                .best
                .as_ref()
                .is_none_or(|best| candidate.combined_score > best.combined_score);
            if is_better {
                debug!(
                    "[ml][capture] frame {} new best face: quality {:.2}, sharpness {:.2}",
                    self.frames_seen, candidate.quality, candidate.sharpness
                );
                self.best = Some(candidate);
                improved = true;
            }
        }
        improved
    }

    pub fn best(&self) -> Option<&FaceCandidate> {
        self.best.as_ref()
    }

    pub fn best_score(&self) -> Option<f64> {
        self.best.as_ref().map(|best| best.combined_score)
    }

    pub fn processed_faces(&self) -> u64 {
        self.processed_faces
    }

    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }

    pub fn into_best(self) -> Option<FaceCandidate> {
        self.best
    }
}

#[cfg(test)]
mod tests {
    use super::{CaptureState, combined_score, evaluate_detection};
    use crate::ml::{
        config::PipelineConfig,
        error::MlError,
        types::{BoundingBox, Detection, Keypoints, PixelLayout, Point2D, RasterImage},
    };

    fn checkerboard(width: u32, height: u32) -> RasterImage {
        let mut pixels = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                let v = if (x / 2 + y / 2) % 2 == 0 { 230 } else { 20 };
                pixels.extend_from_slice(&[v, v, v]);
            }
        }
        RasterImage::new(width, height, PixelLayout::Rgb, pixels).expect("buffer matches size")
    }

    fn face_at(dx: f32, nose_shift: f32, score: f32) -> Detection {
        let keypoints = Keypoints {
            left_eye: Point2D::new(dx + 30.0, 40.0),
            right_eye: Point2D::new(dx + 70.0, 40.0),
            nose: Point2D::new(dx + 50.0 + nose_shift, 60.0),
            left_mouth: Point2D::new(dx + 35.0, 80.0),
            right_mouth: Point2D::new(dx + 65.0, 80.0),
        };
        Detection {
            bbox: BoundingBox::new(dx + 20.0, 20.0, dx + 80.0, 100.0),
            score,
            keypoints,
        }
    }

    #[test]
    fn keeps_the_most_frontal_face_across_frames() {
        let frame = checkerboard(200, 120);
        let config = PipelineConfig::default();
        let mut state = CaptureState::new();

        assert!(state.observe_frame(&frame, &[face_at(0.0, 12.0, 0.9)], &config));
        let first = state.best_score().expect("first frame should set a best face");

        assert!(state.observe_frame(&frame, &[face_at(60.0, 0.0, 0.8)], &config));
        let second = state.best_score().expect("best face should remain");
        assert!(second > first);

        assert!(!state.observe_frame(&frame, &[face_at(0.0, 15.0, 0.99)], &config));
        assert_eq!(state.best_score(), Some(second));
        assert_eq!(state.frames_seen(), 3);
        assert_eq!(state.processed_faces(), 3);
        assert_eq!(
            state.best().map(|best| best.detection.bbox.x1),
            Some(80.0)
        );
    }

    #[test]
    fn skips_degenerate_and_blurry_faces() {
        let config = PipelineConfig::default();
        let mut state = CaptureState::new();

        let mut degenerate = face_at(0.0, 0.0, 0.9);
        degenerate.keypoints.right_eye = degenerate.keypoints.left_eye;
        assert!(!state.observe_frame(&checkerboard(200, 120), &[degenerate], &config));

        let flat = RasterImage::new(200, 120, PixelLayout::Rgb, vec![128; 200 * 120 * 3])
            .expect("buffer matches size");
        assert!(!state.observe_frame(&flat, &[face_at(0.0, 0.0, 0.9)], &config));

        assert!(state.best().is_none());
        assert_eq!(state.processed_faces(), 2);
    }

    #[test]
    fn non_finite_keypoints_never_become_the_best_face() {
        let frame = checkerboard(200, 120);
        let config = PipelineConfig::default();
        let mut state = CaptureState::new();

        let mut broken = face_at(0.0, 0.0, 0.95);
        broken.keypoints.nose.x = f32::NAN;
        assert!(!state.observe_frame(&frame, &[broken], &config));
        assert_eq!(state.best_score(), None);

        assert!(state.observe_frame(&frame, &[face_at(0.0, 0.0, 0.9)], &config));
        let best = state.best_score().expect("frontal face should be kept");
        assert!(best.is_finite());
    }

    #[test]
    fn blurry_crop_reports_its_sharpness() {
        let flat = RasterImage::new(200, 120, PixelLayout::Rgb, vec![90; 200 * 120 * 3])
            .expect("buffer matches size");

        let result = evaluate_detection(&flat, &face_at(0.0, 0.0, 0.9), &PipelineConfig::default());

        assert!(matches!(
            result,
            Err(MlError::InsufficientSharpness { sharpness, minimum })
                if sharpness == 0.0 && minimum == 10.0
        ));
    }

    #[test]
    fn sharper_crop_raises_combined_score() {
        assert!(combined_score(9.0, 400.0, 0.25) > combined_score(9.0, 40.0, 0.25));
        assert_eq!(combined_score(9.0, 400.0, 0.0), 9.0);
    }
}
