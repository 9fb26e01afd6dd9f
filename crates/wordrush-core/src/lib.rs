pub mod code;
pub mod participant;
pub mod question;
pub mod rng;
pub mod settings;
pub mod time;

/// Unique identifier for a player within one session.
pub type PlayerId = u64;

/// Identifier for a team within one session.
pub type TeamId = u8;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers {
    use crate::PlayerId;
    use crate::participant::{Participant, Vehicle};
    use crate::question::VocabEntry;
    use crate::settings::RaceSettings;

    /// Create `n` test participants with sequential IDs starting at 1.
    /// The first one is the host.
    pub fn make_participants(n: usize) -> Vec<Participant> {
        (0..n)
            .map(|i| Participant {
                id: i as PlayerId + 1,
                display_name: format!("Player{}", i + 1),
                avatar: "🦊".to_string(),
                is_host: i == 0,
                is_bot: false,
            })
            .collect()
    }

    /// Create a bot participant with the given id.
    pub fn make_bot(id: PlayerId) -> Participant {
        Participant {
            id,
            display_name: format!("Bot {id}"),
            avatar: "🤖".to_string(),
            is_host: false,
            is_bot: true,
        }
    }

    /// A vocabulary pool large enough for the default question count.
    pub fn make_vocab_pool(n: usize) -> Vec<VocabEntry> {
        (0..n)
            .map(|i| VocabEntry {
                word: format!("ことば{i}"),
                meaning: format!("meaning {i}"),
            })
            .collect()
    }

    /// Default settings with short timer delays suitable for tests.
    pub fn default_settings() -> RaceSettings {
        RaceSettings {
            countdown_secs: 0.05,
            present_delay_secs: 0.02,
            bot_delay_min_secs: 0.01,
            bot_delay_max_secs: 0.05,
            ..RaceSettings::default()
        }
    }

    /// A vehicle with round numbers for scoring assertions.
    pub fn test_vehicle() -> Vehicle {
        Vehicle {
            name: "Test Cart".to_string(),
            base_speed: 10.0,
            max_speed: 50.0,
        }
    }
}
