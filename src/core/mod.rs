//! Core deterministic primitives.
//!
//! All types in this module are designed for perfect cross-client determinism.
//! They form the foundation for a fair, identical obstacle course.

pub mod geometry;
pub mod rng;
pub mod hash;

// Re-export core types
pub use geometry::Rect;
pub use rng::SeededRandom;
pub use hash::{CourseHasher, Fingerprint};
