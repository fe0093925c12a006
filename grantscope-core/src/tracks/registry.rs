//! Track Registry
//!
//! Built once at startup, read-only afterwards. Share it with `Arc`; no locking
//! is needed.

use super::{Dimension, PromotionThresholds, RevenueBand, TrackConfiguration, TrackId};
use crate::error::ScoringError;
use grantscope_common::config::TrackSection;
use std::collections::BTreeMap;
use tracing::info;

/// Registry of all scoring tracks, one per `TrackId`
#[derive(Debug, Clone)]
pub struct TrackRegistry {
    /// Indexed by `slot(id)`, in `TrackId::ALL` order
    tracks: Vec<TrackConfiguration>,
}

/// Position of a track in the registry
///
/// The single registration point for track identifiers: adding a variant to
/// `TrackId` fails to compile until it is given a slot here and a default below.
fn slot(id: TrackId) -> usize {
    match id {
        TrackId::CategoryBased => 0,
        TrackId::PublicAgency => 1,
        TrackId::RegionalAgency => 2,
        TrackId::CommercialPartner => 3,
    }
}

fn weights(category: f64, focus: f64, geographic: f64, scale: f64) -> BTreeMap<Dimension, f64> {
    BTreeMap::from([
        (Dimension::CategoryMatch, category),
        (Dimension::FocusAlignment, focus),
        (Dimension::GeographicAlignment, geographic),
        (Dimension::ScaleFit, scale),
    ])
}

/// Built-in configuration for a track
pub fn default_track(id: TrackId) -> TrackConfiguration {
    match id {
        TrackId::CategoryBased => TrackConfiguration {
            id,
            revenue_band: RevenueBand::new(50_000.0, 50_000_000.0),
            weights: weights(0.35, 0.25, 0.20, 0.20),
            thresholds: PromotionThresholds::new(0.80, 0.65, 0.50, 0.35),
        },
        TrackId::PublicAgency => TrackConfiguration {
            id,
            revenue_band: RevenueBand::new(1_000_000.0, 10_000_000_000.0),
            weights: weights(0.20, 0.30, 0.25, 0.25),
            thresholds: PromotionThresholds::new(0.82, 0.68, 0.52, 0.36),
        },
        TrackId::RegionalAgency => TrackConfiguration {
            id,
            revenue_band: RevenueBand::new(100_000.0, 500_000_000.0),
            weights: weights(0.15, 0.25, 0.40, 0.20),
            thresholds: PromotionThresholds::new(0.80, 0.65, 0.50, 0.35),
        },
        TrackId::CommercialPartner => TrackConfiguration {
            id,
            revenue_band: RevenueBand::new(1_000_000.0, 100_000_000_000.0),
            weights: weights(0.15, 0.35, 0.15, 0.35),
            thresholds: PromotionThresholds::new(0.85, 0.70, 0.55, 0.40),
        },
    }
}

impl TrackRegistry {
    /// Registry with the built-in tracks
    pub fn new() -> Self {
        Self {
            tracks: TrackId::ALL.into_iter().map(default_track).collect(),
        }
    }

    /// Registry with built-in tracks patched by configuration overrides
    ///
    /// Every patched track is re-validated; the first violation is returned.
    pub fn with_overrides(overrides: &[TrackSection]) -> Result<Self, ScoringError> {
        let mut registry = Self::new();

        for section in overrides {
            let id: TrackId = section.id.parse()?;
            let track = &mut registry.tracks[slot(id)];

            if let Some(min) = section.revenue_min {
                track.revenue_band.min = min;
            }
            if let Some(max) = section.revenue_max {
                track.revenue_band.max = max;
            }
            if let Some(raw) = &section.weights {
                let mut parsed = BTreeMap::new();
                for (name, weight) in raw {
                    parsed.insert(name.parse::<Dimension>()?, *weight);
                }
                track.weights = parsed;
            }

            let t = &mut track.thresholds;
            if let Some(v) = section.auto_promote {
                t.auto_promote = v;
            }
            if let Some(v) = section.high_priority {
                t.high_priority = v;
            }
            if let Some(v) = section.medium_priority {
                t.medium_priority = v;
            }
            if let Some(v) = section.low_priority {
                t.low_priority = v;
            }
            if let Some(v) = section.auto_promote_confidence {
                t.auto_promote_confidence = v;
            }

            track.validate()?;
            info!(track = %id, "Applied track configuration override");
        }

        Ok(registry)
    }

    /// Configuration for a track
    pub fn get_track(&self, id: TrackId) -> &TrackConfiguration {
        &self.tracks[slot(id)]
    }

    /// Configuration for a track named by string
    ///
    /// # Errors
    /// `ScoringError::UnknownTrack` if the name is not one of the closed set
    pub fn lookup(&self, name: &str) -> Result<&TrackConfiguration, ScoringError> {
        let id: TrackId = name.parse()?;
        Ok(self.get_track(id))
    }

    /// All tracks in classification priority order
    pub fn all_tracks(&self) -> &[TrackConfiguration] {
        &self.tracks
    }
}

impl Default for TrackRegistry {
    fn default() -> Self {
        Self::new()
    }
}
