use serde::{Deserialize, Serialize};

use crate::PlayerId;

/// Identity of a person (or bot) taking part in a race, as supplied by the
/// caller-identity provider. Host status gates host-only operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: PlayerId,
    pub display_name: String,
    pub avatar: String,
    pub is_host: bool,
    pub is_bot: bool,
}

/// A racer's chosen vehicle. Base speed is the floor debuffs can reduce to;
/// max speed caps what answer bonuses can accumulate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub name: String,
    pub base_speed: f32,
    pub max_speed: f32,
}

impl Default for Vehicle {
    fn default() -> Self {
        Self::preset(0)
    }
}

impl Vehicle {
    /// Predefined vehicles for player selection: (name, base speed, max speed).
    pub const PRESETS: &[(&str, f32, f32)] = &[
        ("Bicycle", 10.0, 50.0),
        ("Scooter", 8.0, 60.0),
        ("Kei Truck", 12.0, 45.0),
        ("Rocket", 6.0, 70.0),
    ];

    /// Build a vehicle from the preset list, wrapping out-of-range indices.
    pub fn preset(index: usize) -> Self {
        let (name, base_speed, max_speed) = Self::PRESETS[index % Self::PRESETS.len()];
        Self {
            name: name.to_string(),
            base_speed,
            max_speed,
        }
    }
}
