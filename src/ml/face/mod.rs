pub mod align;
pub mod blur;
pub mod capture;
pub mod detect;
pub mod nms;
pub mod quality;
