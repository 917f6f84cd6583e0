pub mod decode;
pub mod image_compression;
