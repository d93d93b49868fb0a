//! Data models for the application

mod burn;
mod file;

pub use burn::BurnReason;
pub use file::{FileRecord, NewFile};
