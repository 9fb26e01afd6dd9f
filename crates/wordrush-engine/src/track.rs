use serde::{Deserialize, Serialize};

use wordrush_core::rng::RngSource;

/// Cosmetic scenery band along the track. Purely visual; nothing in the
/// simulation reads these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackZone {
    pub start: f32,
    pub end: f32,
    pub theme: String,
}

const THEMES: &[&str] = &["sakura", "torii", "bamboo", "onsen", "matsuri", "yuki"];

/// Split the track into equal zones with randomly drawn themes.
pub fn generate_zones(track_length: f32, rng: &mut dyn RngSource) -> Vec<TrackZone> {
    let count = 4;
    let width = track_length / count as f32;
    (0..count)
        .map(|i| TrackZone {
            start: width * i as f32,
            end: width * (i + 1) as f32,
            theme: THEMES[rng.next_index(THEMES.len())].to_string(),
        })
        .collect()
}
