pub mod config;
pub mod error;
pub mod face;
pub mod types;
