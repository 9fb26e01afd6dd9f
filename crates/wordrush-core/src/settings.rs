use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Whether racers compete individually or in teams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    Individual,
    Team,
}

/// Data-driven configuration for a race session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RaceSettings {
    /// Track length in abstract units; divides speed for distance gain.
    pub track_length: f32,
    /// Number of questions per race.
    pub question_count: usize,
    /// Answer window per question (seconds).
    pub question_time_limit_secs: f32,
    /// Every Nth question carries a mystery box. 0 disables mystery boxes.
    pub mystery_box_frequency: usize,
    /// Every Nth question is a milestone (double bonus + item). 0 disables.
    pub milestone_frequency: usize,
    /// Whether traps spawn and can be placed.
    pub traps_enabled: bool,
    pub game_mode: GameMode,
    /// Number of teams created in team mode.
    pub team_count: usize,
    /// Minimum players required to start.
    pub min_players: usize,
    /// Room capacity.
    pub max_players: usize,
    /// Countdown between start() and the first question (seconds).
    pub countdown_secs: f32,
    /// Delay between presenting a question and opening answers (seconds).
    pub present_delay_secs: f32,
    /// Bot answer delay range (seconds).
    pub bot_delay_min_secs: f32,
    pub bot_delay_max_secs: f32,
    /// Bot per-question accuracy range.
    pub bot_accuracy_min: f32,
    pub bot_accuracy_max: f32,
    /// Delay before a scheduled random trap drops during a question (seconds).
    pub trap_spawn_delay_secs: f32,
}

impl Default for RaceSettings {
    fn default() -> Self {
        Self {
            track_length: 100.0,
            question_count: 10,
            question_time_limit_secs: 20.0,
            mystery_box_frequency: 4,
            milestone_frequency: 5,
            traps_enabled: true,
            game_mode: GameMode::Individual,
            team_count: 2,
            min_players: 2,
            max_players: 8,
            countdown_secs: 3.0,
            present_delay_secs: 2.0,
            bot_delay_min_secs: 1.0,
            bot_delay_max_secs: 8.0,
            bot_accuracy_min: 0.6,
            bot_accuracy_max: 0.8,
            trap_spawn_delay_secs: 6.0,
        }
    }
}

impl RaceSettings {
    /// Load settings from environment or TOML file, falling back to defaults.
    pub fn load() -> Self {
        if let Ok(path) = std::env::var("WORDRUSH_CONFIG") {
            match Self::from_file(&path) {
                Ok(settings) => return settings,
                Err(e) => {
                    tracing::warn!(path = %path, error = %e, "ignoring WORDRUSH_CONFIG");
                },
            }
        }
        if let Ok(contents) = std::fs::read_to_string("config/wordrush.toml")
            && let Ok(settings) = toml::from_str::<Self>(&contents)
        {
            return settings;
        }
        Self::default()
    }

    fn from_file(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    pub fn countdown(&self) -> Duration {
        Duration::from_secs_f32(self.countdown_secs)
    }

    pub fn present_delay(&self) -> Duration {
        Duration::from_secs_f32(self.present_delay_secs)
    }

    pub fn question_time_limit(&self) -> Duration {
        Duration::from_secs_f32(self.question_time_limit_secs)
    }

    pub fn trap_spawn_delay(&self) -> Duration {
        Duration::from_secs_f32(self.trap_spawn_delay_secs)
    }
}
