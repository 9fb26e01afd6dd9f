use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::rng::RngSource;
use crate::settings::RaceSettings;

/// Difficulty band of a question. Bands are assigned by position in the
/// race: the first 40% are easy, the next 30% medium, the rest hard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// Speed bonus awarded for a correct answer at this band.
    pub fn speed_bonus(self) -> f32 {
        match self {
            Difficulty::Easy => 3.0,
            Difficulty::Medium => 5.0,
            Difficulty::Hard => 8.0,
        }
    }
}

/// What a mystery box hands out when opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MysteryRewardKind {
    PowerUp,
    TrapItem,
}

/// Payload of a mystery-box question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MysteryBox {
    pub difficulty: Difficulty,
    pub reward: MysteryRewardKind,
}

/// A single quiz question: a vocabulary word with four candidate meanings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub prompt: String,
    pub options: [String; 4],
    pub correct_index: u8,
    pub difficulty: Difficulty,
    pub time_limit: Duration,
    pub speed_bonus: f32,
    pub mystery_box: Option<MysteryBox>,
    pub is_milestone: bool,
}

/// A word/meaning pair from the (out-of-scope) question source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabEntry {
    pub word: String,
    pub meaning: String,
}

/// Why a question set could not be built.
#[derive(Debug, PartialEq, Eq)]
pub enum QuestionSetError {
    /// Fewer pool entries than requested questions.
    PoolTooSmall { needed: usize, have: usize },
    /// Fewer than 4 distinct meanings in the pool, so no question can get
    /// a full distractor set. Entries sharing a meaning count once.
    TooFewMeanings { have: usize },
}

impl std::fmt::Display for QuestionSetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PoolTooSmall { needed, have } => {
                write!(f, "question pool too small: need {needed}, have {have}")
            },
            Self::TooFewMeanings { have } => {
                write!(f, "question pool has only {have} distinct meanings, need 4")
            },
        }
    }
}

impl std::error::Error for QuestionSetError {}

/// Band boundary: questions below 40% of the set are easy.
const EASY_SHARE: f32 = 0.4;
/// Questions below 70% are medium; the remainder is hard.
const MEDIUM_SHARE: f32 = 0.7;

fn band_for(index: usize, total: usize) -> Difficulty {
    let pos = index as f32 / total as f32;
    if pos < EASY_SHARE {
        Difficulty::Easy
    } else if pos < MEDIUM_SHARE {
        Difficulty::Medium
    } else {
        Difficulty::Hard
    }
}

/// Shuffle the vocabulary pool into a question set: one question per drawn
/// entry, each with the true meaning plus 3 distractor meanings drawn from
/// the rest of the pool, difficulty assigned by position, and every Nth
/// question flagged
/// as mystery-box or milestone per settings. A question cannot be both;
/// mystery boxes take precedence.
pub fn build_question_set(
    pool: &[VocabEntry],
    settings: &RaceSettings,
    rng: &mut dyn RngSource,
) -> Result<Vec<Question>, QuestionSetError> {
    let count = settings.question_count;
    if pool.len() < count {
        return Err(QuestionSetError::PoolTooSmall {
            needed: count,
            have: pool.len(),
        });
    }

    // Synonyms are common in vocabulary sources, so distractors are drawn
    // from the distinct meanings, not the raw entries.
    let mut meanings: Vec<&str> = pool.iter().map(|e| e.meaning.as_str()).collect();
    meanings.sort_unstable();
    meanings.dedup();
    if meanings.len() < 4 {
        return Err(QuestionSetError::TooFewMeanings {
            have: meanings.len(),
        });
    }

    let order = rng.shuffle_indices(pool.len());
    let mut questions = Vec::with_capacity(count);

    for (qi, &pi) in order.iter().take(count).enumerate() {
        let entry = &pool[pi];

        // First 3 meanings of a fresh shuffle that are not the answer.
        let mut distractors: Vec<&str> = Vec::with_capacity(3);
        for mi in rng.shuffle_indices(meanings.len()) {
            if distractors.len() == 3 {
                break;
            }
            if meanings[mi] != entry.meaning {
                distractors.push(meanings[mi]);
            }
        }

        let correct_index = rng.next_index(4) as u8;
        let mut options: [String; 4] = std::array::from_fn(|_| String::new());
        let mut d = distractors.into_iter();
        for (slot, option) in options.iter_mut().enumerate() {
            *option = if slot == correct_index as usize {
                entry.meaning.clone()
            } else {
                d.next().unwrap_or_default().to_string()
            };
        }

        let difficulty = band_for(qi, count);
        let is_mystery =
            settings.mystery_box_frequency > 0 && (qi + 1) % settings.mystery_box_frequency == 0;
        let is_milestone = !is_mystery
            && settings.milestone_frequency > 0
            && (qi + 1) % settings.milestone_frequency == 0;

        let mystery_box = is_mystery.then(|| MysteryBox {
            difficulty,
            reward: if rng.next_f32() < 0.5 {
                MysteryRewardKind::PowerUp
            } else {
                MysteryRewardKind::TrapItem
            },
        });

        questions.push(Question {
            prompt: entry.word.clone(),
            options,
            correct_index,
            difficulty,
            time_limit: settings.question_time_limit(),
            speed_bonus: difficulty.speed_bonus(),
            mystery_box,
            is_milestone,
        });
    }

    Ok(questions)
}
