//! Infrastructure adapters: file enumeration, text encodings and telemetry.

pub mod encoding;
pub mod error;
pub mod files;
pub mod telemetry;
