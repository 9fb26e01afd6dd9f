use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use wordrush_core::{PlayerId, TeamId};

use crate::Racer;

/// A team in team mode. `total_distance`/`total_points` are derived views
/// recomputed from member racers by [`update_team_scores`]; nothing else
/// writes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    pub color: String,
    pub emoji: String,
    pub members: Vec<PlayerId>,
    pub total_distance: f32,
    pub total_points: u64,
}

/// Fixed palette: (name, color key, emoji).
pub const TEAM_PALETTE: &[(&str, &str, &str)] = &[
    ("Red Dragons", "red", "🐉"),
    ("Blue Phoenix", "blue", "🦅"),
    ("Green Turtles", "green", "🐢"),
    ("Yellow Tigers", "yellow", "🐯"),
    ("Purple Foxes", "purple", "🦊"),
    ("Orange Crabs", "orange", "🦀"),
];

/// Create `count` empty teams from the palette, wrapping if necessary.
pub fn create_teams(count: usize) -> BTreeMap<TeamId, Team> {
    (0..count)
        .map(|i| {
            let (name, color, emoji) = TEAM_PALETTE[i % TEAM_PALETTE.len()];
            let id = i as TeamId;
            (
                id,
                Team {
                    id,
                    name: name.to_string(),
                    color: color.to_string(),
                    emoji: emoji.to_string(),
                    members: Vec::new(),
                    total_distance: 0.0,
                    total_points: 0,
                },
            )
        })
        .collect()
}

/// Greedy load balancer: the team with the fewest members, ties broken by
/// team iteration order (BTreeMap, so ascending id).
pub fn least_loaded_team(teams: &BTreeMap<TeamId, Team>) -> Option<TeamId> {
    teams
        .values()
        .min_by_key(|t| t.members.len())
        .map(|t| t.id)
}

/// Recompute every team's derived totals from its current members.
/// Call after any mutation that changes a racer's distance or points.
pub fn update_team_scores(teams: &mut BTreeMap<TeamId, Team>, racers: &BTreeMap<PlayerId, Racer>) {
    for team in teams.values_mut() {
        team.total_distance = 0.0;
        team.total_points = 0;
        for member in &team.members {
            if let Some(racer) = racers.get(member) {
                team.total_distance += racer.distance;
                team.total_points += u64::from(racer.total_points);
            }
        }
    }
}
