use wordrush_core::question::Question;

use crate::Racer;
use crate::feature::FeatureKind;

/// Speed-to-distance conversion factor: distance gain per answer is
/// `speed / track_length * DISTANCE_FACTOR`. Tunable; the value 2 comes
/// from the original game balance.
pub const DISTANCE_FACTOR: f32 = 2.0;

/// Streak length at which the stacking bonus kicks in.
pub const STREAK_BONUS_THRESHOLD: u32 = 3;
/// Extra speed-gain fraction per streak step past the threshold.
pub const STREAK_BONUS_STEP: f32 = 0.1;

pub const DOUBLE_SPEED_MULT: f32 = 2.0;
pub const SPEED_BOOST_MULT: f32 = 1.2;

/// Points = bonus * POINTS_BASE_MULT * (1 + streak * POINTS_STREAK_STEP).
pub const POINTS_BASE_MULT: f32 = 10.0;
pub const POINTS_STREAK_STEP: f32 = 0.1;

/// Milestone questions double the effective speed bonus.
pub const MILESTONE_MULT: f32 = 2.0;

/// The numeric result of one answer. The caller applies it to the racer;
/// this function never mutates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnswerOutcome {
    pub correct: bool,
    pub new_streak: u32,
    pub new_speed: f32,
    pub distance_gain: f32,
    pub points: u32,
}

/// Convert an answer event into speed/distance/points deltas. Shared by
/// human submissions and the bot controller; there is no other scoring
/// path. A frozen racer burns their freeze on this attempt and neither
/// moves nor scores, regardless of correctness.
pub fn apply_answer(
    racer: &Racer,
    question: &Question,
    correct: bool,
    track_length: f32,
) -> AnswerOutcome {
    let new_streak = if correct { racer.streak + 1 } else { 0 };

    if !correct || racer.is_frozen {
        return AnswerOutcome {
            correct,
            new_streak,
            new_speed: racer.current_speed,
            distance_gain: 0.0,
            points: 0,
        };
    }

    let effective_bonus = if question.is_milestone {
        question.speed_bonus * MILESTONE_MULT
    } else {
        question.speed_bonus
    };

    let mut speed_gain = effective_bonus;
    if racer.has_feature(FeatureKind::DoubleSpeed) {
        speed_gain *= DOUBLE_SPEED_MULT;
    }
    if racer.has_feature(FeatureKind::SpeedBoost) {
        speed_gain *= SPEED_BOOST_MULT;
    }
    if new_streak >= STREAK_BONUS_THRESHOLD {
        speed_gain *= 1.0 + STREAK_BONUS_STEP * (new_streak - 2) as f32;
    }

    let new_speed = (racer.current_speed + speed_gain).min(racer.vehicle.max_speed);
    let distance_gain = new_speed / track_length * DISTANCE_FACTOR;
    let points =
        (effective_bonus * POINTS_BASE_MULT * (1.0 + new_streak as f32 * POINTS_STREAK_STEP))
            .round() as u32;

    AnswerOutcome {
        correct,
        new_streak,
        new_speed,
        distance_gain,
        points,
    }
}
