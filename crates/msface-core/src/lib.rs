//! msface-core — Face API client and face identification pipeline.
//!
//! Wraps the Face API v1.0 detect / identify / person group endpoints,
//! keeps an in-memory identity store per person group, and turns an
//! image into a list of named faces with confidences in percent.

pub mod client;
pub mod identity;
pub mod processor;
pub mod types;

pub use client::{ClientConfig, FaceApi, FaceApiError, FaceClient};
pub use identity::IdentityStore;
pub use processor::FaceProcessor;
pub use types::{Candidate, DetectedFace, FaceList, IdentifyResult, Person, ResolvedFace};
