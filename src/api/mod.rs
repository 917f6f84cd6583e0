pub mod face_capture_api;
pub mod face_submission_api;
pub mod image_processing_api;
