//! Shared data models for the eyeblur service.
//!
//! This crate provides Serde-serializable types for:
//! - Video source kinds accepted by the endpoint
//! - The `/blur-eyes` request and response bodies

pub mod request;
pub mod source;

pub use request::{BlurEyesRequest, BlurEyesResponse, ErrorBody, DEFAULT_OUTPUT_FILENAME};
pub use source::{SourceType, SourceTypeError};
