use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use wordrush_core::settings::GameMode;
use wordrush_core::{PlayerId, TeamId};

use crate::Racer;
use crate::team::Team;

/// One racer's final placing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerResult {
    pub player_id: PlayerId,
    pub display_name: String,
    /// 1-based overall rank.
    pub position: u32,
    pub distance: f32,
    pub points: u32,
    /// correct / total, 0 when the racer never answered.
    pub accuracy: f32,
    pub correct_answers: u32,
    pub total_answers: u32,
    pub traps_placed: u32,
    pub items_used: u32,
    pub is_finished: bool,
    pub team_id: Option<TeamId>,
}

/// One team's final placing (team mode only).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamResult {
    pub team_id: TeamId,
    pub name: String,
    pub position: u32,
    pub total_distance: f32,
    pub total_points: u64,
}

/// The results projection handed to the result consumer at finish.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameResults {
    pub rankings: Vec<PlayerResult>,
    pub team_rankings: Option<Vec<TeamResult>>,
}

/// Rank every racer: finished players first by ascending finish position,
/// then unfinished players by descending distance. Team rankings sort by
/// descending total distance with explicit positions 1..N.
pub fn compute_results(
    racers: &BTreeMap<PlayerId, Racer>,
    teams: &BTreeMap<TeamId, Team>,
    mode: GameMode,
) -> GameResults {
    let mut ordered: Vec<&Racer> = racers.values().collect();
    ordered.sort_by(|a, b| match (a.finish_position, b.finish_position) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => b.distance.total_cmp(&a.distance),
    });

    let rankings = ordered
        .iter()
        .enumerate()
        .map(|(i, racer)| PlayerResult {
            player_id: racer.id,
            display_name: racer.display_name.clone(),
            position: i as u32 + 1,
            distance: racer.distance,
            points: racer.total_points,
            accuracy: if racer.total_answers == 0 {
                0.0
            } else {
                racer.correct_answers as f32 / racer.total_answers as f32
            },
            correct_answers: racer.correct_answers,
            total_answers: racer.total_answers,
            traps_placed: racer.traps_placed,
            items_used: racer.items_used,
            is_finished: racer.is_finished,
            team_id: racer.team_id,
        })
        .collect();

    let team_rankings = (mode == GameMode::Team).then(|| {
        let mut ordered: Vec<&Team> = teams.values().collect();
        ordered.sort_by(|a, b| b.total_distance.total_cmp(&a.total_distance));
        ordered
            .iter()
            .enumerate()
            .map(|(i, team)| TeamResult {
                team_id: team.id,
                name: team.name.clone(),
                position: i as u32 + 1,
                total_distance: team.total_distance,
                total_points: team.total_points,
            })
            .collect()
    });

    GameResults {
        rankings,
        team_rankings,
    }
}
