use serde::{Deserialize, Serialize};

/// Special-feature (power-up) kinds. Durations are counted in rounds and
/// decay on every answer the owner processes, whether or not the effect
/// was useful that round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    /// Instant +10 distance for the caster.
    Teleport,
    /// Every other unshielded racer loses 10% speed (floored at base speed).
    SlowOthers,
    /// One random unshielded opponent is immobilized.
    Freeze,
    /// Absorbs traps and hostile features for the duration.
    Shield,
    /// Speed gains x1.2 while active.
    SpeedBoost,
    /// Speed gains x2 while active.
    DoubleSpeed,
}

impl FeatureKind {
    pub const ALL: [FeatureKind; 6] = [
        FeatureKind::Teleport,
        FeatureKind::SlowOthers,
        FeatureKind::Freeze,
        FeatureKind::Shield,
        FeatureKind::SpeedBoost,
        FeatureKind::DoubleSpeed,
    ];

    /// Rounds the feature stays active. Instant features have no duration.
    pub fn duration_rounds(self) -> u32 {
        match self {
            FeatureKind::Teleport => 0,
            FeatureKind::SlowOthers => 2,
            FeatureKind::Freeze => 1,
            FeatureKind::Shield => 3,
            FeatureKind::SpeedBoost => 3,
            FeatureKind::DoubleSpeed => 2,
        }
    }

    pub fn is_instant(self) -> bool {
        self.duration_rounds() == 0
    }
}

/// A duration-bearing feature currently active on a racer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveFeature {
    pub kind: FeatureKind,
    pub remaining_rounds: u32,
}

impl ActiveFeature {
    pub fn new(kind: FeatureKind) -> Self {
        Self {
            kind,
            remaining_rounds: kind.duration_rounds(),
        }
    }
}

/// Distance granted by a teleport.
pub const TELEPORT_DISTANCE: f32 = 10.0;

/// Speed multiplier applied to victims of slow-others.
pub const SLOW_OTHERS_FACTOR: f32 = 0.9;
