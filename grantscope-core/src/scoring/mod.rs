//! Track-specific multi-dimensional scoring
//!
//! - `dimensions`: one pure scorer per dimension, plus revenue band compatibility
//! - `confidence`: evidence-based confidence model
//! - `track_scorer`: track dispatch, weighted aggregation, promotion classification
//!
//! Scoring is pure and never suspends; results for a set of candidates do not
//! depend on evaluation order.

pub mod confidence;
pub mod dimensions;
pub mod track_scorer;

pub use track_scorer::{determine_best_track, TrackScorer};

/// Round a score to six decimal places
///
/// Keeps threshold comparisons stable against floating-point noise in the
/// weighted sums (e.g. 0.6 + 0.2 compared against a 0.8 gate).
pub fn round_score(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}
