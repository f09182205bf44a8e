//! # Leadgen Common Library
//!
//! Shared code for the lead-generation gateway:
//! - Error and result types
//! - Uniform JSON envelope for error responses
//! - Configuration loading (TOML file + environment secrets)
//! - Lead sheet data model and category-block insertion planning

pub mod config;
pub mod envelope;
pub mod error;
pub mod leads;

pub use envelope::{ErrorBody, ErrorEnvelope};
pub use error::{Error, Result};
