use serde::{Deserialize, Serialize};

use wordrush_core::PlayerId;

/// Track hazards. Each kind immobilizes on hit; sinkholes additionally
/// demand the tap-to-escape mini-game before the racer can move again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrapKind {
    Imprisonment,
    Freeze,
    Sinkhole,
}

impl TrapKind {
    pub const ALL: [TrapKind; 3] = [TrapKind::Imprisonment, TrapKind::Freeze, TrapKind::Sinkhole];

    /// Rounds the effect lingers on a racer.
    pub fn duration_rounds(self) -> u32 {
        match self {
            TrapKind::Imprisonment => 2,
            TrapKind::Freeze => 1,
            TrapKind::Sinkhole => 3,
        }
    }

    pub fn immobilizes(self) -> bool {
        true
    }

    pub fn escape_required(self) -> bool {
        matches!(self, TrapKind::Sinkhole)
    }

    /// Taps needed to climb out of a sinkhole.
    pub fn required_taps(self) -> u32 {
        match self {
            TrapKind::Sinkhole => 10,
            _ => 0,
        }
    }
}

/// A trap sitting on the track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trap {
    pub id: u64,
    pub kind: TrapKind,
    /// Track position in [0, 100].
    pub position: f32,
    /// Player who placed it, if placed from inventory rather than spawned.
    pub placed_by: Option<PlayerId>,
    pub active: bool,
}

/// A trap effect currently stuck to a racer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveTrapEffect {
    pub kind: TrapKind,
    pub remaining_rounds: u32,
    pub escape_taps: u32,
    pub required_taps: u32,
}

impl ActiveTrapEffect {
    pub fn new(kind: TrapKind) -> Self {
        Self {
            kind,
            remaining_rounds: kind.duration_rounds(),
            escape_taps: 0,
            required_taps: kind.required_taps(),
        }
    }
}

/// Random spawns land in this band of the track.
pub const SPAWN_MIN: f32 = 20.0;
pub const SPAWN_MAX: f32 = 80.0;

/// A placed trap must be this far ahead of the placing racer...
pub const MIN_PLACEMENT_OFFSET: f32 = 5.0;
/// ...and no further down the track than this.
pub const MAX_PLACEMENT: f32 = 95.0;

/// A trap is hit when the racer's distance advances across its position.
pub fn collided(trap: &Trap, old: f32, new: f32) -> bool {
    trap.active && old < trap.position && trap.position <= new
}
