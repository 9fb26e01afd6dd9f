use std::time::Duration;

use wordrush_core::question::Question;
use wordrush_core::rng::RngSource;
use wordrush_core::settings::RaceSettings;

/// Sample a bot's answer delay, uniform in the configured window
/// (1s to 8s by default). The session layer schedules a timer with it;
/// the timer callback re-validates game state before answering.
pub fn answer_delay(settings: &RaceSettings, rng: &mut dyn RngSource) -> Duration {
    let secs = rng.range_f32(settings.bot_delay_min_secs, settings.bot_delay_max_secs);
    Duration::from_secs_f32(secs)
}

/// Sample a bot's per-question accuracy, uniform in the configured range
/// (0.6 to 0.8 by default).
pub fn sample_accuracy(settings: &RaceSettings, rng: &mut dyn RngSource) -> f32 {
    rng.range_f32(settings.bot_accuracy_min, settings.bot_accuracy_max)
}

/// Pick the bot's option: the correct one with probability `accuracy`,
/// otherwise a uniformly random wrong option. Returns (option, correct).
pub fn choose_answer(question: &Question, accuracy: f32, rng: &mut dyn RngSource) -> (u8, bool) {
    if rng.next_f32() < accuracy {
        return (question.correct_index, true);
    }
    // Three wrong options; skip past the correct one.
    let mut pick = rng.next_index(3) as u8;
    if pick >= question.correct_index {
        pick += 1;
    }
    (pick, false)
}
