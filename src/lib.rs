//! # vigil-track - Lightweight IoU Multi-Object Tracker
//!
//! Assigns stable integer identities to detected objects (typically people)
//! across the frames of independent video sources.
//!
//! ## Features
//!
//! - Greedy highest-IoU-first association of detections to tracks
//! - Track aging and eviction after a configurable number of missed frames
//! - Identities that start at 1 per source and are never reused
//! - Independent per-source state, with an optional thread-safe registry
//! - Fixed-cadence sampler driving any [`Detector`] over any [`FrameSource`]
//!
//! ## Example
//!
//! ```rust
//! use vigil_track::{BoundingBox, TrackerConfig, TrackerRegistry};
//!
//! let mut registry: TrackerRegistry = TrackerRegistry::new(TrackerConfig::default()).unwrap();
//!
//! let ids = registry.assign("camA", &[BoundingBox::new(10.0, 10.0, 50.0, 50.0)]);
//! assert_eq!(ids, vec![1]);
//!
//! // Small motion keeps the identity
//! let ids = registry.assign("camA", &[BoundingBox::new(12.0, 11.0, 50.0, 50.0)]);
//! assert_eq!(ids, vec![1]);
//! ```

pub mod bbox;
pub mod detection;
pub mod matching;
pub mod registry;
pub mod sampler;
pub mod track;
pub mod tracker;
pub mod utils;

// Re-exports for convenience
pub use bbox::BoundingBox;
pub use detection::{Detection, DetectionFilter, TrackedDetection};
pub use registry::{SharedTrackerRegistry, TrackerRegistry};
pub use sampler::{Detector, FrameSource, Sampler, SamplerConfig, SourceReport, TickReport};
pub use track::{Track, TrackId};
pub use tracker::{TrackerConfig, TrackerState};

// Error types
pub use crate::error::{Error, Result};

mod error {
    use thiserror::Error;

    /// Errors that can occur in the vigil-track library
    #[derive(Error, Debug)]
    pub enum Error {
        #[error("Invalid configuration: {0}")]
        InvalidConfig(String),

        #[error("Invalid input: {0}")]
        InvalidInput(String),

        #[error("Detector error: {0}")]
        Detector(String),

        #[error("JSON error: {0}")]
        Json(#[from] serde_json::Error),

        #[error("IO error: {0}")]
        IoError(#[from] std::io::Error),
    }

    /// Result type for vigil-track operations
    pub type Result<T> = std::result::Result<T, Error>;
}
