use chrono::{DateTime, Utc};
use log::{debug, warn};

use crate::{
    image::image_compression::{EncodedImageFormat, encode_raster},
    ml::{
        config::CaptureSettings,
        error::{MlError, MlResult},
        face::capture::CaptureState,
    },
};

/// Path of the recognition service endpoint that accepts face submissions.
pub const QUERY_ENDPOINT: &str = "/query";

/// Multipart form payload for the best captured face. Sending it is up to the caller.
#[derive(Clone, Debug, PartialEq)]
pub struct FaceSubmission {
    pub filename: String,
    pub image_png: Vec<u8>,
    /// Pose quality of the submitted face, two decimals.
    pub score: String,
    pub timestamp: String,
    pub processed_faces: u64,
}

impl FaceSubmission {
    /// Text fields in the order they are appended after the `image` part.
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("score", self.score.clone()),
            ("timestamp", self.timestamp.clone()),
            ("processed_faces", self.processed_faces.to_string()),
        ]
    }
}

pub fn build_face_submission(
    state: &CaptureState,
    captured_at: DateTime<Utc>,
    settings: &CaptureSettings,
) -> MlResult<FaceSubmission> {
    let best = state.best().ok_or_else(|| {
        warn!("[api][submit] no face captured yet, nothing to submit");
        MlError::InvalidRequest("no face has been captured".to_string())
    })?;

    let image_png = encode_raster(&best.aligned.image, EncodedImageFormat::Png)?;
    if image_png.is_empty() {
        warn!("[api][submit] encoded face is empty");
        return Err(MlError::Encode("encoded face image is empty".to_string()));
    }
    if image_png.len() > settings.max_payload_bytes {
        warn!(
            "[api][submit] encoded face is {} bytes, limit is {}",
            image_png.len(),
            settings.max_payload_bytes
        );
        return Err(MlError::InvalidRequest(format!(
            "encoded face is {} bytes, above the {} byte limit",
            image_png.len(),
            settings.max_payload_bytes
        )));
    }

    let timestamp = submission_timestamp(captured_at);
    let submission = FaceSubmission {
        filename: format!("best_face_{timestamp}.png"),
        image_png,
        score: format!("{:.2}", best.quality),
        timestamp,
        processed_faces: state.processed_faces(),
    };
    debug!(
        "[api][submit] prepared {} ({} bytes) for {QUERY_ENDPOINT}",
        submission.filename,
        submission.image_png.len()
    );
    Ok(submission)
}

/// UTC time as `YYYY-MM-DDTHH-MM-SS`, safe for file names.
fn submission_timestamp(captured_at: DateTime<Utc>) -> String {
    captured_at.format("%Y-%m-%dT%H-%M-%S").to_string()
}
