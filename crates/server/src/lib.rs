//! Server crate for the rating predictor.
//!
//! This crate contains the service that owns the built engine and answers
//! prediction queries from async callers.

pub mod service;

pub use service::{ItemRecommendation, PredictionService, ServiceConfig};
