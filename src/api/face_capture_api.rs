use crate::ml::{
    config::PipelineConfig,
    error::{MlError, MlResult},
    face::{
        detect::{StrideOutput, rescale_detections, run_face_detection},
        nms::select_detections,
        quality::{QUALITY_SENTINEL, score_face_quality_or_sentinel},
    },
    types::{BoundingBox, Detection, Dimensions, Keypoints, Point2D},
};

#[derive(Clone, Debug)]
pub struct RustDimensions {
    pub width: i32,
    pub height: i32,
}

#[derive(Clone, Debug)]
pub struct RustStrideOutput {
    pub stride: i32,
    pub scores: Vec<f64>,
    pub box_distances: Vec<f64>,
    pub keypoint_distances: Vec<f64>,
}

#[derive(Clone, Debug)]
pub struct DetectFacesRequest {
    pub input_size: RustDimensions,
    /// Letterbox scale from source to detector input; `1.0` keeps input coordinates.
    pub det_scale: f64,
    pub outputs: Vec<RustStrideOutput>,
    /// Optional `PipelineConfig` JSON; missing fields keep their defaults.
    pub config_json: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RustDetection {
    pub score: f64,
    pub box_xyxy: Vec<f64>,
    pub all_keypoints: Vec<Vec<f64>>,
}

pub fn detect_faces_rust(req: DetectFacesRequest) -> Result<Vec<RustDetection>, String> {
    detect_faces_rust_inner(req).map_err(|e| e.to_string())
}

fn detect_faces_rust_inner(req: DetectFacesRequest) -> MlResult<Vec<RustDetection>> {
    let config = match req.config_json.as_deref() {
        Some(json) if !json.trim().is_empty() => PipelineConfig::from_json_str(json)?,
        _ => PipelineConfig::default(),
    };
    let input = to_dimensions(&req.input_size)?;

    let converted = req
        .outputs
        .iter()
        .map(|output| {
            let stride = u32::try_from(output.stride).map_err(|_| {
                MlError::InvalidRequest(format!("stride must be positive, got {}", output.stride))
            })?;
            Ok((
                stride,
                to_f32(&output.scores),
                to_f32(&output.box_distances),
                to_f32(&output.keypoint_distances),
            ))
        })
        .collect::<MlResult<Vec<_>>>()?;
    let outputs: Vec<StrideOutput<'_>> = converted
        .iter()
        .map(|(stride, scores, boxes, keypoints)| StrideOutput {
            stride: *stride,
            scores,
            box_distances: boxes,
            keypoint_distances: keypoints,
        })
        .collect();

    let mut detections = run_face_detection(&outputs, input, &config.detection)?;
    rescale_detections(&mut detections, req.det_scale as f32)?;
    Ok(detections.iter().map(to_api_detection).collect())
}

/// Runs non-maximum suppression over already decoded detections and returns
/// the survivors, highest score first.
pub fn select_detections_rust(
    detections: Vec<RustDetection>,
    nms_threshold: f64,
) -> Result<Vec<RustDetection>, String> {
    if !(0.0..=1.0).contains(&nms_threshold) {
        return Err(format!("nms threshold must be within [0, 1], got {nms_threshold}"));
    }
    let parsed = detections
        .iter()
        .enumerate()
        .map(|(index, detection)| {
            Detection::try_from(detection)
                .map_err(|e| format!("invalid detection at index {index}: {e}"))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(select_detections(&parsed, nms_threshold as f32)
        .into_iter()
        .map(|index| detections[index].clone())
        .collect())
}

/// Frontal-pose score of five `[x, y]` keypoints, or `-10` when they cannot be scored.
pub fn score_face_quality_rust(all_keypoints: Vec<Vec<f64>>) -> f64 {
    match to_keypoints(&all_keypoints) {
        Ok(keypoints) => score_face_quality_or_sentinel(&keypoints) as f64,
        Err(_) => QUALITY_SENTINEL as f64,
    }
}

pub(crate) fn to_dimensions(size: &RustDimensions) -> MlResult<Dimensions> {
    if size.width <= 0 || size.height <= 0 {
        return Err(MlError::InvalidRequest(format!(
            "input size must be positive, got {}x{}",
            size.width, size.height
        )));
    }
    Ok(Dimensions {
        width: size.width as u32,
        height: size.height as u32,
    })
}

pub(crate) fn to_keypoints(all_keypoints: &[Vec<f64>]) -> MlResult<Keypoints> {
    let points = all_keypoints
        .iter()
        .map(|pair| match pair.as_slice() {
            [x, y] if x.is_finite() && y.is_finite() => Ok(Point2D::new(*x as f32, *y as f32)),
            _ => Err(MlError::InvalidRequest(format!(
                "keypoint must be a finite [x, y] pair, got {pair:?}"
            ))),
        })
        .collect::<MlResult<Vec<_>>>()?;
    Keypoints::try_from(points.as_slice())
}

pub(crate) fn to_api_keypoints(keypoints: &Keypoints) -> Vec<Vec<f64>> {
    keypoints
        .to_array()
        .iter()
        .map(|p| vec![p.x as f64, p.y as f64])
        .collect()
}

fn to_api_detection(detection: &Detection) -> RustDetection {
    let bbox = detection.bbox;
    RustDetection {
        score: detection.score as f64,
        box_xyxy: vec![bbox.x1 as f64, bbox.y1 as f64, bbox.x2 as f64, bbox.y2 as f64],
        all_keypoints: to_api_keypoints(&detection.keypoints),
    }
}

fn to_f32(values: &[f64]) -> Vec<f32> {
    values.iter().map(|&v| v as f32).collect()
}

impl TryFrom<&RustDetection> for Detection {
    type Error = MlError;

    fn try_from(value: &RustDetection) -> Result<Self, Self::Error> {
        let [x1, y1, x2, y2] = value.box_xyxy.as_slice() else {
            return Err(MlError::InvalidRequest(format!(
                "box_xyxy must have 4 values, got {}",
                value.box_xyxy.len()
            )));
        };
        if ![*x1, *y1, *x2, *y2, value.score].iter().all(|v| v.is_finite()) {
            return Err(MlError::InvalidRequest(
                "non-finite values are not allowed".to_string(),
            ));
        }

        Ok(Self {
            bbox: BoundingBox::new(*x1 as f32, *y1 as f32, *x2 as f32, *y2 as f32),
            score: value.score as f32,
            keypoints: to_keypoints(&value.all_keypoints)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{
        DetectFacesRequest, RustDetection, RustDimensions, RustStrideOutput, detect_faces_rust,
        score_face_quality_rust, select_detections_rust,
    };

    fn frontal_keypoints() -> Vec<Vec<f64>> {
        vec![
            vec![30.0, 40.0],
            vec![70.0, 40.0],
            vec![50.0, 60.0],
            vec![35.0, 80.0],
            vec![65.0, 80.0],
        ]
    }

    fn api_detection(box_xyxy: [f64; 4], score: f64) -> RustDetection {
        RustDetection {
            score,
            box_xyxy: box_xyxy.to_vec(),
            all_keypoints: frontal_keypoints(),
        }
    }

    /// One stride-8 level over a 16x16 input: 2x2 grid, one anchor per cell.
    fn single_level_request(det_scale: f64) -> DetectFacesRequest {
        let mut keypoint_distances = vec![0.0; 4 * 10];
        keypoint_distances[..10]
            .copy_from_slice(&[-1.0, -1.0, 1.0, -1.0, 0.0, 0.0, -0.5, 1.0, 0.5, 1.0]);
        DetectFacesRequest {
            input_size: RustDimensions {
                width: 16,
                height: 16,
            },
            det_scale,
            outputs: vec![RustStrideOutput {
                stride: 8,
                scores: vec![0.9, 0.1, 0.2, 0.3],
                box_distances: [vec![0.0, 0.0, 1.0, 1.0], vec![0.0; 12]].concat(),
                keypoint_distances,
            }],
            config_json: Some(r#"{"detection": {"anchors_per_location": 1}}"#.to_string()),
        }
    }

    #[test]
    fn detect_faces_decodes_and_rescales() {
        let detections = detect_faces_rust(single_level_request(2.0)).expect("request is valid");

        assert_eq!(detections.len(), 1);
        let detection = &detections[0];
        assert!((detection.score - 0.9).abs() < 1e-6);
        assert_eq!(detection.box_xyxy, vec![0.0, 0.0, 4.0, 4.0]);
        assert_eq!(detection.all_keypoints.len(), 5);
        // Anchor (0, 0) with (-8, -8) is clamped to the origin.
        assert_eq!(detection.all_keypoints[0], vec![0.0, 0.0]);
        assert_eq!(detection.all_keypoints[1], vec![4.0, 0.0]);
    }

    #[test]
    fn detect_faces_reports_bad_shapes_and_config() {
        let mut short = single_level_request(1.0);
        short.outputs[0].scores.pop();
        assert!(detect_faces_rust(short).is_err());

        let mut bad_config = single_level_request(1.0);
        bad_config.config_json = Some(r#"{"detection": {"nms_threshold": 3.0}}"#.to_string());
        assert!(detect_faces_rust(bad_config).is_err());

        let mut bad_stride = single_level_request(1.0);
        bad_stride.outputs[0].stride = -8;
        assert!(detect_faces_rust(bad_stride).is_err());
    }

    #[test]
    fn select_detections_returns_survivors_in_score_order() {
        let detections = vec![
            api_detection([0.0, 0.0, 20.0, 20.0], 0.7),
            api_detection([1.0, 1.0, 21.0, 21.0], 0.95),
            api_detection([100.0, 100.0, 120.0, 120.0], 0.8),
        ];

        let kept = select_detections_rust(detections.clone(), 0.4).expect("detections are valid");

        assert_eq!(kept, vec![detections[1].clone(), detections[2].clone()]);
    }

    #[test]
    fn select_detections_rejects_malformed_input() {
        let mut detection = api_detection([0.0, 0.0, 20.0, 20.0], 0.7);
        detection.all_keypoints.pop();

        let err = select_detections_rust(vec![detection], 0.4).expect_err("four keypoints");

        assert!(err.contains("index 0"));
        assert!(err.contains("expected 5 keypoints, got 4"));
    }

    #[test]
    fn quality_uses_sentinel_on_failure() {
        assert!((score_face_quality_rust(frontal_keypoints()) - 11.0).abs() < 1e-4);
        assert_eq!(score_face_quality_rust(frontal_keypoints()[..3].to_vec()), -10.0);
        assert_eq!(score_face_quality_rust(vec![vec![1.0]; 5]), -10.0);

        let mut non_finite = frontal_keypoints();
        non_finite[2] = vec![f64::NAN, 60.0];
        assert_eq!(score_face_quality_rust(non_finite), -10.0);

        let mut coincident_eyes = frontal_keypoints();
        coincident_eyes[1] = coincident_eyes[0].clone();
        assert_eq!(score_face_quality_rust(coincident_eyes), -10.0);
    }
}
