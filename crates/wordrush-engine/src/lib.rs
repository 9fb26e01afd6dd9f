pub mod bot;
pub mod error;
pub mod feature;
pub mod inventory;
pub mod results;
pub mod scoring;
pub mod team;
pub mod track;
pub mod trap;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use wordrush_core::participant::{Participant, Vehicle};
use wordrush_core::question::{MysteryRewardKind, Question};
use wordrush_core::rng::RngSource;
use wordrush_core::settings::{GameMode, RaceSettings};
use wordrush_core::{PlayerId, TeamId};

use error::RaceError;
use feature::{ActiveFeature, FeatureKind, SLOW_OTHERS_FACTOR, TELEPORT_DISTANCE};
use inventory::{InventoryItem, ItemKind};
use results::{GameResults, compute_results};
use team::{Team, create_teams, least_loaded_team, update_team_scores};
use track::TrackZone;
use trap::{
    ActiveTrapEffect, MAX_PLACEMENT, MIN_PLACEMENT_OFFSET, SPAWN_MAX, SPAWN_MIN, Trap, TrapKind,
    collided,
};

/// Distance at which a racer finishes. Distances are normalized to [0, 100]
/// regardless of the configured track length.
pub const FINISH_LINE: f32 = 100.0;

/// Lifecycle of a race session. `Waiting` is initial, `Finished` terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    Waiting,
    Starting,
    Question,
    Answering,
    MysteryBox,
    Revealing,
    Finished,
}

/// Everything the engine tells the outside world. The session layer
/// forwards these to observers and derives its timer schedule from them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RaceEvent {
    PlayerJoined { player_id: PlayerId },
    PlayerLeft { player_id: PlayerId },
    HostTransferred { new_host: PlayerId },
    /// The last player left; the session must be torn down.
    GameDiscarded,
    CountdownStarted,
    QuestionPresented { index: usize },
    AnsweringOpened { index: usize },
    MysteryBoxPresented { index: usize },
    MysteryBoxOpened { player_id: PlayerId, item: ItemKind },
    AnswerSubmitted { player_id: PlayerId, correct: bool, points: u32 },
    AnswerRevealed { index: usize, correct_index: u8 },
    PlayerFinished { player_id: PlayerId, position: u32 },
    TrapPlaced { trap_id: u64, player_id: PlayerId, position: f32 },
    TrapSpawned { trap_id: u64, kind: TrapKind, position: f32 },
    TrapHit { player_id: PlayerId, kind: TrapKind },
    /// A shield absorbed a trap; the trap is gone and the racer untouched.
    TrapBlocked { player_id: PlayerId, trap_id: u64 },
    /// A trap item was selected for placement; nothing is consumed yet.
    TrapItemSelected { player_id: PlayerId, item_id: u64 },
    ItemGranted { player_id: PlayerId, item: ItemKind },
    ItemUsed { player_id: PlayerId, item: ItemKind },
    FeatureApplied { player_id: PlayerId, kind: FeatureKind, target: Option<PlayerId> },
    EscapeProgress { player_id: PlayerId, progress: f32 },
    EscapeCompleted { player_id: PlayerId },
    TeamAssigned { player_id: PlayerId, team_id: TeamId },
    RaceFinished,
}

/// Per-player race state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Racer {
    pub id: PlayerId,
    pub display_name: String,
    pub avatar: String,
    pub is_bot: bool,
    pub vehicle: Vehicle,
    pub current_speed: f32,
    /// 0 to 100, monotonically non-decreasing.
    pub distance: f32,
    pub correct_answers: u32,
    pub total_answers: u32,
    /// Consecutive correct answers; any miss resets it.
    pub streak: u32,
    pub active_features: Vec<ActiveFeature>,
    pub is_frozen: bool,
    /// Cleared at every question change.
    pub current_answer: Option<u8>,
    pub answer_time_ms: Option<u64>,
    pub is_finished: bool,
    /// Assigned exactly once, when distance first reaches the finish line.
    pub finish_position: Option<u32>,
    pub total_points: u32,
    pub team_id: Option<TeamId>,
    pub trap_effects: Vec<ActiveTrapEffect>,
    /// At most `inventory::INVENTORY_CAPACITY` items.
    pub inventory: Vec<InventoryItem>,
    pub is_escaping: bool,
    /// Escape mini-game progress, 0 to 100.
    pub escape_progress: f32,
    pub traps_placed: u32,
    pub items_used: u32,
}

impl Racer {
    pub fn new(participant: Participant, vehicle: Vehicle) -> Self {
        let current_speed = vehicle.base_speed;
        Self {
            id: participant.id,
            display_name: participant.display_name,
            avatar: participant.avatar,
            is_bot: participant.is_bot,
            vehicle,
            current_speed,
            distance: 0.0,
            correct_answers: 0,
            total_answers: 0,
            streak: 0,
            active_features: Vec::new(),
            is_frozen: false,
            current_answer: None,
            answer_time_ms: None,
            is_finished: false,
            finish_position: None,
            total_points: 0,
            team_id: None,
            trap_effects: Vec::new(),
            inventory: Vec::new(),
            is_escaping: false,
            escape_progress: 0.0,
            traps_placed: 0,
            items_used: 0,
        }
    }

    pub fn has_feature(&self, kind: FeatureKind) -> bool {
        self.active_features.iter().any(|f| f.kind == kind)
    }

    /// Derived from `active_features`; never stored independently.
    pub fn has_shield(&self) -> bool {
        self.has_feature(FeatureKind::Shield)
    }
}

/// The full serializable race aggregate. Snapshot/restore round-trips
/// through MessagePack; the RNG lives outside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceState {
    pub join_code: String,
    pub host_id: PlayerId,
    pub settings: RaceSettings,
    pub status: GameStatus,
    pub questions: Vec<Question>,
    pub current_question: usize,
    pub question_started_at_ms: Option<u64>,
    pub racers: BTreeMap<PlayerId, Racer>,
    pub teams: BTreeMap<TeamId, Team>,
    pub traps: Vec<Trap>,
    pub zones: Vec<TrackZone>,
    pub results: Option<GameResults>,
    next_item_id: u64,
    next_trap_id: u64,
}

/// One authoritative race session. All mutation funnels through the
/// methods below; timer entry points re-validate the current state before
/// touching anything, so stale callbacks degrade to no-ops.
pub struct RaceGame {
    state: RaceState,
    rng: Box<dyn RngSource>,
}

impl RaceGame {
    pub fn create(
        settings: RaceSettings,
        join_code: String,
        host: Participant,
        vehicle: Vehicle,
        questions: Vec<Question>,
        mut rng: Box<dyn RngSource>,
    ) -> Self {
        let zones = track::generate_zones(settings.track_length, rng.as_mut());
        let mut teams = BTreeMap::new();
        if settings.game_mode == GameMode::Team {
            teams = create_teams(settings.team_count);
        }

        let host_id = host.id;
        let mut racer = Racer::new(host, vehicle);
        if let Some(team) = teams.values_mut().next() {
            team.members.push(host_id);
            racer.team_id = Some(team.id);
        }

        let mut racers = BTreeMap::new();
        racers.insert(host_id, racer);

        Self {
            state: RaceState {
                join_code,
                host_id,
                settings,
                status: GameStatus::Waiting,
                questions,
                current_question: 0,
                question_started_at_ms: None,
                racers,
                teams,
                traps: Vec::new(),
                zones,
                results: None,
                next_item_id: 1,
                next_trap_id: 1,
            },
            rng,
        }
    }

    pub fn state(&self) -> &RaceState {
        &self.state
    }

    pub fn results(&self) -> Option<&GameResults> {
        self.state.results.as_ref()
    }

    /// Serialize the authoritative state for observers or replay.
    pub fn snapshot(&self) -> Vec<u8> {
        rmp_serde::to_vec(&self.state).expect("race state serialization must succeed")
    }

    /// Apply a previously captured snapshot. Malformed bytes are ignored.
    pub fn restore(&mut self, snapshot: &[u8]) {
        if let Ok(state) = rmp_serde::from_slice::<RaceState>(snapshot) {
            self.state = state;
        }
    }

    // ---- lobby ----------------------------------------------------------

    /// Add a player while waiting. Rejoining with a known id is a no-op.
    pub fn join(
        &mut self,
        participant: Participant,
        vehicle: Vehicle,
    ) -> Result<Vec<RaceEvent>, RaceError> {
        if self.state.status != GameStatus::Waiting {
            return Err(RaceError::RaceAlreadyStarted);
        }
        if self.state.racers.contains_key(&participant.id) {
            tracing::debug!(player_id = participant.id, "duplicate join ignored");
            return Ok(Vec::new());
        }
        if self.state.racers.len() >= self.state.settings.max_players {
            return Err(RaceError::RoomFull);
        }

        let player_id = participant.id;
        let mut racer = Racer::new(participant, vehicle);
        let mut events = vec![RaceEvent::PlayerJoined { player_id }];

        if let Some(team_id) = least_loaded_team(&self.state.teams) {
            racer.team_id = Some(team_id);
            if let Some(team) = self.state.teams.get_mut(&team_id) {
                team.members.push(player_id);
            }
            events.push(RaceEvent::TeamAssigned { player_id, team_id });
        }

        self.state.racers.insert(player_id, racer);
        Ok(events)
    }

    /// Remove a player. Works in every status; removing the last player
    /// discards the game, and the host role migrates if the host leaves.
    pub fn leave(&mut self, player_id: PlayerId) -> Vec<RaceEvent> {
        let Some(racer) = self.state.racers.remove(&player_id) else {
            return Vec::new();
        };
        if let Some(team_id) = racer.team_id
            && let Some(team) = self.state.teams.get_mut(&team_id)
        {
            team.members.retain(|&m| m != player_id);
        }

        let mut events = vec![RaceEvent::PlayerLeft { player_id }];

        if self.state.racers.is_empty() {
            tracing::info!(code = %self.state.join_code, "last player left, race discarded");
            self.state.status = GameStatus::Finished;
            events.push(RaceEvent::GameDiscarded);
            return events;
        }

        if self.state.host_id == player_id
            && let Some(&new_host) = self.state.racers.keys().next()
        {
            self.state.host_id = new_host;
            events.push(RaceEvent::HostTransferred { new_host });
        }

        events
    }

    /// Host-only removal of another player.
    pub fn kick(
        &mut self,
        caller: PlayerId,
        target: PlayerId,
    ) -> Result<Vec<RaceEvent>, RaceError> {
        self.ensure_host(caller)?;
        if !self.state.racers.contains_key(&target) {
            return Err(RaceError::UnknownPlayer);
        }
        Ok(self.leave(target))
    }

    /// Explicit team reassignment, host or self-service, lobby only.
    pub fn assign_team(
        &mut self,
        caller: PlayerId,
        target: PlayerId,
        team_id: TeamId,
    ) -> Result<Vec<RaceEvent>, RaceError> {
        if self.state.status != GameStatus::Waiting {
            return Err(RaceError::WrongStatus("change teams"));
        }
        if caller != target {
            self.ensure_host(caller)?;
        }
        if !self.state.teams.contains_key(&team_id) {
            return Err(RaceError::UnknownTeam);
        }
        let Some(racer) = self.state.racers.get_mut(&target) else {
            return Err(RaceError::UnknownPlayer);
        };

        let previous = racer.team_id;
        racer.team_id = Some(team_id);
        if let Some(prev) = previous
            && let Some(team) = self.state.teams.get_mut(&prev)
        {
            team.members.retain(|&m| m != target);
        }
        if let Some(team) = self.state.teams.get_mut(&team_id) {
            team.members.push(target);
        }
        Ok(vec![RaceEvent::TeamAssigned {
            player_id: target,
            team_id,
        }])
    }

    // ---- state machine --------------------------------------------------

    /// Host starts the race: waiting → starting. The session schedules the
    /// countdown timer off the returned event.
    pub fn start(&mut self, caller: PlayerId) -> Result<Vec<RaceEvent>, RaceError> {
        self.ensure_host(caller)?;
        if self.state.status != GameStatus::Waiting {
            return Err(RaceError::RaceAlreadyStarted);
        }
        let have = self.state.racers.len();
        let needed = self.state.settings.min_players;
        if have < needed {
            return Err(RaceError::NotEnoughPlayers { needed, have });
        }
        self.state.status = GameStatus::Starting;
        tracing::info!(code = %self.state.join_code, players = have, "race starting");
        Ok(vec![RaceEvent::CountdownStarted])
    }

    /// Timer: countdown finished, present the first question.
    pub fn countdown_elapsed(&mut self, now_ms: u64) -> Vec<RaceEvent> {
        if self.state.status != GameStatus::Starting {
            tracing::debug!(status = ?self.state.status, "stale countdown timer ignored");
            return Vec::new();
        }
        self.present_current_question(now_ms)
    }

    /// Timer: the present delay after a question elapsed; open answers,
    /// or divert to the mystery box for flagged questions.
    pub fn present_elapsed(&mut self, question: usize) -> Vec<RaceEvent> {
        if self.state.status != GameStatus::Question || self.state.current_question != question {
            tracing::debug!(question, "stale present timer ignored");
            return Vec::new();
        }
        let index = self.state.current_question;
        if self.state.questions[index].mystery_box.is_some() {
            self.state.status = GameStatus::MysteryBox;
            vec![RaceEvent::MysteryBoxPresented { index }]
        } else {
            self.state.status = GameStatus::Answering;
            vec![RaceEvent::AnsweringOpened { index }]
        }
    }

    /// A human answer. Guard failures (wrong status, duplicate submission,
    /// unknown player) are silent no-ops: they are races inherent to the
    /// timer model, not caller misuse.
    pub fn submit_answer(&mut self, player_id: PlayerId, option: u8, now_ms: u64) -> Vec<RaceEvent> {
        if self.state.status != GameStatus::Answering || option > 3 {
            tracing::debug!(player_id, "answer outside answering window ignored");
            return Vec::new();
        }
        match self.state.racers.get(&player_id) {
            Some(racer) if racer.current_answer.is_none() && !racer.is_finished => {},
            Some(_) => {
                tracing::debug!(player_id, "duplicate or post-finish answer ignored");
                return Vec::new();
            },
            None => return Vec::new(),
        }
        let mut events = Vec::new();
        self.process_answer(player_id, option, now_ms, &mut events);
        events
    }

    /// Timer: a bot's answer delay fired. Re-validates that the game is
    /// still answering the same question and the bot has not answered.
    pub fn bot_answer_due(
        &mut self,
        bot_id: PlayerId,
        question: usize,
        now_ms: u64,
    ) -> Vec<RaceEvent> {
        if self.state.status != GameStatus::Answering || self.state.current_question != question {
            tracing::debug!(bot_id, question, "stale bot timer ignored");
            return Vec::new();
        }
        let option = {
            let Some(racer) = self.state.racers.get(&bot_id) else {
                return Vec::new();
            };
            if !racer.is_bot || racer.current_answer.is_some() || racer.is_finished {
                return Vec::new();
            }
            let accuracy = bot::sample_accuracy(&self.state.settings, self.rng.as_mut());
            let q = &self.state.questions[question];
            let (option, _) = bot::choose_answer(q, accuracy, self.rng.as_mut());
            option
        };
        let mut events = Vec::new();
        self.process_answer(bot_id, option, now_ms, &mut events);
        events
    }

    /// Host reveals the correct answer: answering → revealing.
    pub fn reveal(&mut self, caller: PlayerId) -> Result<Vec<RaceEvent>, RaceError> {
        self.ensure_host(caller)?;
        if self.state.status != GameStatus::Answering {
            return Err(RaceError::WrongStatus("reveal the answer"));
        }
        Ok(self.do_reveal())
    }

    /// Timer: the answer window expired; auto-reveal. Stale fires no-op.
    pub fn reveal_due(&mut self, question: usize) -> Vec<RaceEvent> {
        if self.state.status != GameStatus::Answering || self.state.current_question != question {
            tracing::debug!(question, "stale reveal timer ignored");
            return Vec::new();
        }
        self.do_reveal()
    }

    fn do_reveal(&mut self) -> Vec<RaceEvent> {
        self.state.status = GameStatus::Revealing;
        let index = self.state.current_question;
        vec![RaceEvent::AnswerRevealed {
            index,
            correct_index: self.state.questions[index].correct_index,
        }]
    }

    /// Host advances the race. Ends it when every racer has finished or
    /// the question list is exhausted; otherwise presents the next question.
    pub fn next_question(
        &mut self,
        caller: PlayerId,
        now_ms: u64,
    ) -> Result<Vec<RaceEvent>, RaceError> {
        self.ensure_host(caller)?;
        if self.state.status != GameStatus::Revealing {
            return Err(RaceError::WrongStatus("advance the race"));
        }

        let all_finished = self.state.racers.values().all(|r| r.is_finished);
        let exhausted = self.state.current_question + 1 >= self.state.questions.len();
        if all_finished || exhausted {
            return Ok(self.conclude());
        }

        for racer in self.state.racers.values_mut() {
            racer.current_answer = None;
            racer.answer_time_ms = None;
        }
        self.state.current_question += 1;
        Ok(self.present_current_question(now_ms))
    }

    fn present_current_question(&mut self, now_ms: u64) -> Vec<RaceEvent> {
        self.state.status = GameStatus::Question;
        self.state.question_started_at_ms = Some(now_ms);
        vec![RaceEvent::QuestionPresented {
            index: self.state.current_question,
        }]
    }

    /// Host opens the mystery box: its reward is applied here, as a side
    /// effect of opening, then answering begins.
    pub fn open_mystery_box(&mut self, caller: PlayerId) -> Result<Vec<RaceEvent>, RaceError> {
        self.ensure_host(caller)?;
        if self.state.status != GameStatus::MysteryBox {
            return Err(RaceError::WrongStatus("open the mystery box"));
        }
        let index = self.state.current_question;
        let Some(mystery) = self.state.questions[index].mystery_box else {
            // Flag and status can only disagree through a corrupted snapshot.
            self.state.status = GameStatus::Answering;
            return Ok(vec![RaceEvent::AnsweringOpened { index }]);
        };

        let mut events = Vec::new();

        // Reward goes to a uniformly random racer still in the running.
        let candidates: Vec<PlayerId> = {
            let unfinished: Vec<PlayerId> = self
                .state
                .racers
                .values()
                .filter(|r| !r.is_finished)
                .map(|r| r.id)
                .collect();
            if unfinished.is_empty() {
                self.state.racers.keys().copied().collect()
            } else {
                unfinished
            }
        };
        if !candidates.is_empty() {
            let recipient = candidates[self.rng.next_index(candidates.len())];
            let item = self.random_item(mystery.reward);
            events.push(RaceEvent::MysteryBoxOpened {
                player_id: recipient,
                item,
            });
            if let Some(granted) = self.grant_item(recipient, item) {
                events.push(granted);
            }
        }

        self.state.status = GameStatus::Answering;
        events.push(RaceEvent::AnsweringOpened { index });
        Ok(events)
    }

    // ---- items & features ----------------------------------------------

    /// Use an inventory item. Power-ups apply immediately and are consumed;
    /// trap items are only selected here and consumed by `place_trap`.
    pub fn use_item(
        &mut self,
        player_id: PlayerId,
        item_id: u64,
    ) -> Result<Vec<RaceEvent>, RaceError> {
        let Some(racer) = self.state.racers.get(&player_id) else {
            return Err(RaceError::UnknownPlayer);
        };
        let Some(item) = racer.inventory.iter().find(|i| i.id == item_id).copied() else {
            return Err(RaceError::UnknownItem);
        };

        match item.kind {
            ItemKind::Trap(_) => Ok(vec![RaceEvent::TrapItemSelected { player_id, item_id }]),
            ItemKind::PowerUp(kind) => {
                if let Some(racer) = self.state.racers.get_mut(&player_id) {
                    inventory::take_item(&mut racer.inventory, item_id);
                    racer.items_used += 1;
                }
                let mut events = vec![RaceEvent::ItemUsed {
                    player_id,
                    item: item.kind,
                }];
                self.apply_feature(player_id, kind, &mut events);
                if self.state.settings.game_mode == GameMode::Team {
                    update_team_scores(&mut self.state.teams, &self.state.racers);
                }
                Ok(events)
            },
        }
    }

    fn apply_feature(&mut self, caster: PlayerId, kind: FeatureKind, events: &mut Vec<RaceEvent>) {
        match kind {
            FeatureKind::Teleport => {
                events.push(RaceEvent::FeatureApplied {
                    player_id: caster,
                    kind,
                    target: None,
                });
                self.advance_racer(caster, TELEPORT_DISTANCE, events);
            },
            FeatureKind::SlowOthers => {
                for racer in self.state.racers.values_mut() {
                    if racer.id != caster && !racer.has_shield() {
                        racer.current_speed =
                            (racer.current_speed * SLOW_OTHERS_FACTOR).max(racer.vehicle.base_speed);
                    }
                }
                if let Some(racer) = self.state.racers.get_mut(&caster) {
                    racer.active_features.push(ActiveFeature::new(kind));
                }
                events.push(RaceEvent::FeatureApplied {
                    player_id: caster,
                    kind,
                    target: None,
                });
            },
            FeatureKind::Freeze => {
                let candidates: Vec<PlayerId> = self
                    .state
                    .racers
                    .values()
                    .filter(|r| r.id != caster && !r.has_shield() && !r.is_finished)
                    .map(|r| r.id)
                    .collect();
                if candidates.is_empty() {
                    tracing::debug!(caster, "freeze found no eligible target");
                    return;
                }
                let target = candidates[self.rng.next_index(candidates.len())];
                if let Some(victim) = self.state.racers.get_mut(&target) {
                    victim.is_frozen = true;
                    victim.active_features.push(ActiveFeature::new(kind));
                }
                events.push(RaceEvent::FeatureApplied {
                    player_id: caster,
                    kind,
                    target: Some(target),
                });
            },
            FeatureKind::Shield | FeatureKind::SpeedBoost | FeatureKind::DoubleSpeed => {
                if let Some(racer) = self.state.racers.get_mut(&caster) {
                    racer.active_features.push(ActiveFeature::new(kind));
                }
                events.push(RaceEvent::FeatureApplied {
                    player_id: caster,
                    kind,
                    target: None,
                });
            },
        }
    }

    /// Place a trap from inventory ahead of the racer. Positions violating
    /// the minimum offset or the track bound are silent no-ops.
    pub fn place_trap(
        &mut self,
        player_id: PlayerId,
        item_id: u64,
        position: f32,
    ) -> Result<Vec<RaceEvent>, RaceError> {
        let Some(racer) = self.state.racers.get(&player_id) else {
            return Err(RaceError::UnknownPlayer);
        };
        let Some(item) = racer.inventory.iter().find(|i| i.id == item_id).copied() else {
            return Err(RaceError::UnknownItem);
        };
        let ItemKind::Trap(kind) = item.kind else {
            return Err(RaceError::UnknownItem);
        };

        if !self.state.settings.traps_enabled {
            tracing::debug!(player_id, "trap placement with traps disabled ignored");
            return Ok(Vec::new());
        }
        if position < racer.distance + MIN_PLACEMENT_OFFSET || position > MAX_PLACEMENT {
            tracing::debug!(player_id, position, "trap placement out of bounds ignored");
            return Ok(Vec::new());
        }

        if let Some(racer) = self.state.racers.get_mut(&player_id) {
            inventory::take_item(&mut racer.inventory, item_id);
            racer.traps_placed += 1;
        }
        let trap_id = self.push_trap(kind, position, Some(player_id));
        Ok(vec![RaceEvent::TrapPlaced {
            trap_id,
            player_id,
            position,
        }])
    }

    /// Host-triggered random trap spawn.
    pub fn spawn_random_trap(&mut self, caller: PlayerId) -> Result<Vec<RaceEvent>, RaceError> {
        self.ensure_host(caller)?;
        if matches!(self.state.status, GameStatus::Waiting | GameStatus::Finished) {
            return Err(RaceError::WrongStatus("spawn traps"));
        }
        if !self.state.settings.traps_enabled {
            return Ok(Vec::new());
        }
        Ok(vec![self.spawn_trap()])
    }

    /// Timer: the scheduled trap drop for this question.
    pub fn trap_spawn_due(&mut self) -> Vec<RaceEvent> {
        if self.state.status != GameStatus::Answering || !self.state.settings.traps_enabled {
            tracing::debug!("stale trap spawn timer ignored");
            return Vec::new();
        }
        vec![self.spawn_trap()]
    }

    fn spawn_trap(&mut self) -> RaceEvent {
        let kind = TrapKind::ALL[self.rng.next_index(TrapKind::ALL.len())];
        let position = self.rng.range_f32(SPAWN_MIN, SPAWN_MAX);
        let trap_id = self.push_trap(kind, position, None);
        RaceEvent::TrapSpawned {
            trap_id,
            kind,
            position,
        }
    }

    fn push_trap(&mut self, kind: TrapKind, position: f32, placed_by: Option<PlayerId>) -> u64 {
        let id = self.state.next_trap_id;
        self.state.next_trap_id += 1;
        self.state.traps.push(Trap {
            id,
            kind,
            position,
            placed_by,
            active: true,
        });
        id
    }

    /// One tap of the sinkhole escape mini-game. Taps from players who are
    /// not escaping are silent no-ops.
    pub fn escape_tap(&mut self, player_id: PlayerId) -> Vec<RaceEvent> {
        let Some(racer) = self.state.racers.get_mut(&player_id) else {
            return Vec::new();
        };
        if !racer.is_escaping {
            tracing::debug!(player_id, "escape tap while not trapped ignored");
            return Vec::new();
        }
        let Some(effect) = racer
            .trap_effects
            .iter_mut()
            .find(|e| e.kind.escape_required())
        else {
            // Escaping without a sinkhole effect: repair the flag.
            racer.is_escaping = false;
            return Vec::new();
        };

        effect.escape_taps += 1;
        let progress = (effect.escape_taps as f32 / effect.required_taps as f32 * 100.0).min(100.0);
        racer.escape_progress = progress;

        let mut events = vec![RaceEvent::EscapeProgress {
            player_id,
            progress,
        }];
        if effect.escape_taps >= effect.required_taps {
            racer.trap_effects.retain(|e| !e.kind.escape_required());
            racer.is_escaping = false;
            racer.is_frozen = false;
            events.push(RaceEvent::EscapeCompleted { player_id });
        }
        events
    }

    // ---- internals ------------------------------------------------------

    fn ensure_host(&self, caller: PlayerId) -> Result<(), RaceError> {
        if !self.state.racers.contains_key(&caller) {
            return Err(RaceError::UnknownPlayer);
        }
        if caller != self.state.host_id {
            return Err(RaceError::NotHost);
        }
        Ok(())
    }

    /// The one shared answer pipeline for humans and bots.
    fn process_answer(
        &mut self,
        player_id: PlayerId,
        option: u8,
        now_ms: u64,
        events: &mut Vec<RaceEvent>,
    ) {
        let question = self.state.questions[self.state.current_question].clone();
        let correct = option == question.correct_index;
        let track_length = self.state.settings.track_length;
        let started_at = self.state.question_started_at_ms;

        let Some(racer) = self.state.racers.get_mut(&player_id) else {
            return;
        };
        racer.current_answer = Some(option);
        racer.answer_time_ms = started_at.map(|t| now_ms.saturating_sub(t));

        let outcome = scoring::apply_answer(racer, &question, correct, track_length);
        racer.streak = outcome.new_streak;
        racer.total_answers += 1;
        if correct {
            racer.correct_answers += 1;
        }
        // One answer attempt consumes a freeze, hit or miss.
        racer.is_frozen = false;
        racer.current_speed = outcome.new_speed;
        racer.total_points += outcome.points;

        events.push(RaceEvent::AnswerSubmitted {
            player_id,
            correct,
            points: outcome.points,
        });

        // Pre-existing trap effects age out before this answer's movement,
        // so a trap hit below keeps its full duration.
        self.tick_trap_effects(player_id);

        if outcome.distance_gain > 0.0 {
            self.advance_racer(player_id, outcome.distance_gain, events);
        }

        if correct && question.is_milestone {
            let kind = FeatureKind::ALL[self.rng.next_index(FeatureKind::ALL.len())];
            if let Some(granted) = self.grant_item(player_id, ItemKind::PowerUp(kind)) {
                events.push(granted);
            }
        }

        self.tick_features(player_id);

        if self.state.settings.game_mode == GameMode::Team {
            update_team_scores(&mut self.state.teams, &self.state.racers);
        }
    }

    /// Move a racer forward, resolving trap collisions along the way and
    /// assigning a finish position the instant the line is crossed.
    fn advance_racer(&mut self, player_id: PlayerId, gain: f32, events: &mut Vec<RaceEvent>) {
        let Some(racer) = self.state.racers.get(&player_id) else {
            return;
        };
        let old = racer.distance;
        let new = (old + gain).min(FINISH_LINE);
        let shielded = racer.has_shield();

        let mut hits: Vec<TrapKind> = Vec::new();
        for trap in &mut self.state.traps {
            if !collided(trap, old, new) {
                continue;
            }
            trap.active = false;
            if shielded {
                events.push(RaceEvent::TrapBlocked {
                    player_id,
                    trap_id: trap.id,
                });
            } else {
                hits.push(trap.kind);
                events.push(RaceEvent::TrapHit {
                    player_id,
                    kind: trap.kind,
                });
            }
        }
        self.state.traps.retain(|t| t.active);

        let finished_before = self
            .state
            .racers
            .values()
            .filter(|r| r.is_finished)
            .count() as u32;

        let Some(racer) = self.state.racers.get_mut(&player_id) else {
            return;
        };
        racer.distance = new;
        for kind in hits {
            racer.trap_effects.push(ActiveTrapEffect::new(kind));
            if kind.immobilizes() {
                racer.is_frozen = true;
            }
            if kind.escape_required() {
                racer.is_escaping = true;
                racer.escape_progress = 0.0;
            }
        }

        if !racer.is_finished && new >= FINISH_LINE {
            racer.is_finished = true;
            let position = finished_before + 1;
            racer.finish_position = Some(position);
            events.push(RaceEvent::PlayerFinished {
                player_id,
                position,
            });
        }
    }

    /// Round-based decay for non-sinkhole trap effects. Sinkholes only go
    /// away through the escape mini-game.
    fn tick_trap_effects(&mut self, player_id: PlayerId) {
        let Some(racer) = self.state.racers.get_mut(&player_id) else {
            return;
        };
        for effect in &mut racer.trap_effects {
            if !effect.kind.escape_required() {
                effect.remaining_rounds = effect.remaining_rounds.saturating_sub(1);
            }
        }
        racer
            .trap_effects
            .retain(|e| e.kind.escape_required() || e.remaining_rounds > 0);
    }

    /// Round-based decay for special features, independent of whose turn
    /// produced them.
    fn tick_features(&mut self, player_id: PlayerId) {
        let Some(racer) = self.state.racers.get_mut(&player_id) else {
            return;
        };
        for feature in &mut racer.active_features {
            feature.remaining_rounds = feature.remaining_rounds.saturating_sub(1);
        }
        racer.active_features.retain(|f| f.remaining_rounds > 0);
    }

    fn new_item(&mut self, kind: ItemKind) -> InventoryItem {
        let id = self.state.next_item_id;
        self.state.next_item_id += 1;
        InventoryItem { id, kind }
    }

    fn random_item(&mut self, reward: MysteryRewardKind) -> ItemKind {
        match reward {
            MysteryRewardKind::PowerUp => {
                ItemKind::PowerUp(FeatureKind::ALL[self.rng.next_index(FeatureKind::ALL.len())])
            },
            MysteryRewardKind::TrapItem => {
                ItemKind::Trap(TrapKind::ALL[self.rng.next_index(TrapKind::ALL.len())])
            },
        }
    }

    fn grant_item(&mut self, player_id: PlayerId, kind: ItemKind) -> Option<RaceEvent> {
        let item = self.new_item(kind);
        let racer = self.state.racers.get_mut(&player_id)?;
        inventory::add_item(&mut racer.inventory, item).then_some(RaceEvent::ItemGranted {
            player_id,
            item: kind,
        })
    }

    fn conclude(&mut self) -> Vec<RaceEvent> {
        update_team_scores(&mut self.state.teams, &self.state.racers);
        self.state.results = Some(compute_results(
            &self.state.racers,
            &self.state.teams,
            self.state.settings.game_mode,
        ));
        self.state.status = GameStatus::Finished;
        tracing::info!(code = %self.state.join_code, "race finished");
        vec![RaceEvent::RaceFinished]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use proptest::prelude::*;
    use wordrush_core::question::{Difficulty, build_question_set};
    use wordrush_core::rng::SeededRngSource;
    use wordrush_core::test_helpers::{
        default_settings, make_bot, make_participants, make_vocab_pool, test_vehicle,
    };

    fn plain_question(correct: u8) -> Question {
        Question {
            prompt: "ねこ".to_string(),
            options: std::array::from_fn(|i| format!("meaning {i}")),
            correct_index: correct,
            difficulty: Difficulty::Easy,
            time_limit: Duration::from_secs(20),
            speed_bonus: Difficulty::Easy.speed_bonus(),
            mystery_box: None,
            is_milestone: false,
        }
    }

    fn plain_questions(n: usize) -> Vec<Question> {
        (0..n).map(|_| plain_question(1)).collect()
    }

    fn new_game_with(players: usize, settings: RaceSettings, questions: Vec<Question>) -> RaceGame {
        let mut participants = make_participants(players);
        let host = participants.remove(0);
        let mut game = RaceGame::create(
            settings,
            "AB2CD3".to_string(),
            host,
            test_vehicle(),
            questions,
            Box::new(SeededRngSource::new(7)),
        );
        for p in participants {
            game.join(p, test_vehicle()).unwrap();
        }
        game
    }

    fn new_game(players: usize) -> RaceGame {
        new_game_with(players, default_settings(), plain_questions(10))
    }

    /// start → countdown → present → answering, for the current question.
    fn run_to_answering(game: &mut RaceGame) {
        game.start(1).unwrap();
        game.countdown_elapsed(1_000);
        game.present_elapsed(0);
        assert_eq!(game.state().status, GameStatus::Answering);
    }

    #[test]
    fn create_starts_waiting_with_host() {
        let game = new_game(3);
        assert_eq!(game.state().status, GameStatus::Waiting);
        assert_eq!(game.state().host_id, 1);
        assert_eq!(game.state().racers.len(), 3);
    }

    #[test]
    fn join_rejected_when_full_or_started() {
        let mut settings = default_settings();
        settings.max_players = 2;
        let mut game = new_game_with(2, settings, plain_questions(10));

        let extra = make_bot(99);
        assert_eq!(
            game.join(extra.clone(), test_vehicle()),
            Err(RaceError::RoomFull)
        );

        game.start(1).unwrap();
        assert_eq!(
            game.join(extra, test_vehicle()),
            Err(RaceError::RaceAlreadyStarted)
        );
    }

    #[test]
    fn duplicate_join_is_a_no_op() {
        let mut game = new_game(2);
        let mut again = make_participants(2);
        let events = game.join(again.remove(1), test_vehicle()).unwrap();
        assert!(events.is_empty());
        assert_eq!(game.state().racers.len(), 2);
    }

    #[test]
    fn start_requires_host_and_min_players() {
        let mut game = new_game(3);
        assert_eq!(game.start(2), Err(RaceError::NotHost));

        let mut lonely = new_game(1);
        assert_eq!(
            lonely.start(1),
            Err(RaceError::NotEnoughPlayers { needed: 2, have: 1 })
        );
    }

    #[test]
    fn lifecycle_runs_question_cycle() {
        let mut game = new_game(2);
        let events = game.start(1).unwrap();
        assert_eq!(events, vec![RaceEvent::CountdownStarted]);
        assert_eq!(game.state().status, GameStatus::Starting);

        let events = game.countdown_elapsed(5_000);
        assert_eq!(events, vec![RaceEvent::QuestionPresented { index: 0 }]);
        assert_eq!(game.state().question_started_at_ms, Some(5_000));

        game.present_elapsed(0);
        assert_eq!(game.state().status, GameStatus::Answering);

        let events = game.submit_answer(2, 1, 6_000);
        assert!(matches!(
            events[0],
            RaceEvent::AnswerSubmitted { player_id: 2, correct: true, .. }
        ));
        assert_eq!(game.state().racers[&2].answer_time_ms, Some(1_000));

        let events = game.reveal(1).unwrap();
        assert_eq!(
            events,
            vec![RaceEvent::AnswerRevealed { index: 0, correct_index: 1 }]
        );

        let events = game.next_question(1, 9_000).unwrap();
        assert_eq!(events, vec![RaceEvent::QuestionPresented { index: 1 }]);
        assert_eq!(game.state().racers[&2].current_answer, None);
    }

    #[test]
    fn duplicate_submit_is_a_no_op() {
        let mut game = new_game(2);
        run_to_answering(&mut game);

        game.submit_answer(2, 1, 2_000);
        let before = game.state().racers[&2].clone();
        let events = game.submit_answer(2, 0, 3_000);
        assert!(events.is_empty());
        assert_eq!(game.state().racers[&2], before);
    }

    #[test]
    fn stale_timers_are_ignored() {
        let mut game = new_game(2);
        assert!(game.countdown_elapsed(1_000).is_empty());
        assert!(game.present_elapsed(0).is_empty());
        assert!(game.reveal_due(0).is_empty());
        assert!(game.trap_spawn_due().is_empty());

        run_to_answering(&mut game);
        // A present timer for the question already being answered.
        assert!(game.present_elapsed(0).is_empty());
        // A reveal timer for a different question.
        assert!(game.reveal_due(3).is_empty());
    }

    #[test]
    fn stale_bot_timer_after_advance_is_ignored() {
        let mut game = new_game(2);
        let bot = make_bot(9);
        game.join(bot, test_vehicle()).unwrap();
        run_to_answering(&mut game);

        game.reveal_due(0);
        game.next_question(1, 10_000).unwrap();
        game.present_elapsed(1);

        // The timer armed for question 0 fires after question 1 opened.
        assert!(game.bot_answer_due(9, 0, 11_000).is_empty());
        assert_eq!(game.state().racers[&9].current_answer, None);
    }

    #[test]
    fn bot_answer_moves_through_the_shared_pipeline() {
        let mut settings = default_settings();
        settings.bot_accuracy_min = 1.0;
        settings.bot_accuracy_max = 1.0;
        let mut game = new_game_with(2, settings, plain_questions(10));
        let bot = make_bot(9);
        game.join(bot, test_vehicle()).unwrap();
        run_to_answering(&mut game);

        let events = game.bot_answer_due(9, 0, 3_000);
        assert!(matches!(
            events[0],
            RaceEvent::AnswerSubmitted { player_id: 9, correct: true, .. }
        ));
        assert!(game.state().racers[&9].distance > 0.0);
    }

    #[test]
    fn wrong_answer_resets_streak_and_stays_put() {
        let mut game = new_game(2);
        run_to_answering(&mut game);

        game.submit_answer(2, 0, 2_000);
        let racer = &game.state().racers[&2];
        assert_eq!(racer.streak, 0);
        assert_eq!(racer.distance, 0.0);
        assert_eq!(racer.total_points, 0);
        assert_eq!(racer.total_answers, 1);
    }

    #[test]
    fn finish_position_is_assigned_exactly_once() {
        let mut game = new_game(2);
        run_to_answering(&mut game);
        for racer in game.state.racers.values_mut() {
            racer.distance = 99.9;
        }

        game.submit_answer(1, 1, 2_000);
        game.submit_answer(2, 1, 2_100);
        assert_eq!(game.state().racers[&1].finish_position, Some(1));
        assert_eq!(game.state().racers[&2].finish_position, Some(2));
        assert_eq!(game.state().racers[&1].distance, FINISH_LINE);

        // All finished, so advancing concludes even mid-list.
        game.reveal_due(0);
        let events = game.next_question(1, 9_000).unwrap();
        assert_eq!(events, vec![RaceEvent::RaceFinished]);
        let results = game.results().unwrap();
        assert_eq!(results.rankings.len(), 2);
        assert_eq!(results.rankings[0].player_id, 1);
    }

    #[test]
    fn finished_racers_stop_scoring() {
        let mut settings = default_settings();
        settings.bot_accuracy_min = 1.0;
        settings.bot_accuracy_max = 1.0;
        let mut game = new_game_with(2, settings, plain_questions(10));
        game.join(make_bot(9), test_vehicle()).unwrap();
        run_to_answering(&mut game);
        for id in [2, 9] {
            if let Some(racer) = game.state.racers.get_mut(&id) {
                racer.distance = 99.9;
            }
        }

        game.submit_answer(2, 1, 2_000);
        game.bot_answer_due(9, 0, 2_500);
        assert!(game.state().racers[&2].is_finished);
        assert!(game.state().racers[&9].is_finished);
        let human = game.state().racers[&2].clone();
        let bot = game.state().racers[&9].clone();

        // The host is still racing, so the next question opens.
        game.reveal_due(0);
        game.next_question(1, 9_000).unwrap();
        game.present_elapsed(1);

        assert!(game.submit_answer(2, 1, 12_000).is_empty());
        assert!(game.bot_answer_due(9, 1, 12_500).is_empty());
        assert_eq!(game.state().racers[&2].total_points, human.total_points);
        assert_eq!(game.state().racers[&2].total_answers, human.total_answers);
        assert_eq!(game.state().racers[&9].total_points, bot.total_points);
        assert_eq!(game.state().racers[&9].total_answers, bot.total_answers);
    }

    #[test]
    fn last_question_concludes_with_full_rankings() {
        let mut game = new_game_with(3, default_settings(), plain_questions(1));
        run_to_answering(&mut game);
        game.submit_answer(2, 1, 2_000);
        game.reveal_due(0);

        let events = game.next_question(1, 9_000).unwrap();
        assert_eq!(events, vec![RaceEvent::RaceFinished]);
        assert_eq!(game.state().status, GameStatus::Finished);

        let results = game.results().unwrap();
        assert_eq!(results.rankings.len(), 3);
        // The only mover ranks first on distance.
        assert_eq!(results.rankings[0].player_id, 2);
    }

    #[test]
    fn trap_hit_applies_effect_and_deactivates_trap() {
        let mut game = new_game(2);
        run_to_answering(&mut game);
        game.state.traps.push(Trap {
            id: 50,
            kind: TrapKind::Freeze,
            position: 0.1,
            placed_by: None,
            active: true,
        });

        let events = game.submit_answer(2, 1, 2_000);
        assert!(events.contains(&RaceEvent::TrapHit {
            player_id: 2,
            kind: TrapKind::Freeze,
        }));
        let racer = &game.state().racers[&2];
        assert!(racer.is_frozen);
        assert_eq!(racer.trap_effects.len(), 1);
        assert!(game.state().traps.is_empty());
    }

    #[test]
    fn frozen_racer_burns_freeze_without_moving() {
        let mut game = new_game(2);
        run_to_answering(&mut game);
        if let Some(racer) = game.state.racers.get_mut(&2) {
            racer.is_frozen = true;
        }

        game.submit_answer(2, 1, 2_000);
        let racer = &game.state().racers[&2];
        assert!(!racer.is_frozen);
        assert_eq!(racer.distance, 0.0);
        assert_eq!(racer.streak, 1);
    }

    #[test]
    fn shield_absorbs_trap_without_effect() {
        let mut game = new_game(2);
        run_to_answering(&mut game);
        game.state.traps.push(Trap {
            id: 50,
            kind: TrapKind::Sinkhole,
            position: 0.1,
            placed_by: None,
            active: true,
        });
        if let Some(racer) = game.state.racers.get_mut(&2) {
            racer
                .active_features
                .push(ActiveFeature::new(FeatureKind::Shield));
        }

        let events = game.submit_answer(2, 1, 2_000);
        assert!(events.contains(&RaceEvent::TrapBlocked {
            player_id: 2,
            trap_id: 50,
        }));
        let racer = &game.state().racers[&2];
        assert!(racer.trap_effects.is_empty());
        assert!(!racer.is_escaping);
        assert!(game.state().traps.is_empty());
    }

    #[test]
    fn sinkhole_escape_needs_all_taps() {
        let mut game = new_game(2);
        run_to_answering(&mut game);
        game.state.traps.push(Trap {
            id: 50,
            kind: TrapKind::Sinkhole,
            position: 0.1,
            placed_by: None,
            active: true,
        });
        game.submit_answer(2, 1, 2_000);
        assert!(game.state().racers[&2].is_escaping);

        for _ in 0..9 {
            let events = game.escape_tap(2);
            assert_eq!(events.len(), 1);
        }
        let events = game.escape_tap(2);
        assert!(events.contains(&RaceEvent::EscapeCompleted { player_id: 2 }));
        let racer = &game.state().racers[&2];
        assert!(!racer.is_escaping);
        assert!(!racer.is_frozen);
        assert!(racer.trap_effects.is_empty());

        // Once free, taps do nothing.
        assert!(game.escape_tap(2).is_empty());
    }

    #[test]
    fn place_trap_consumes_item_and_validates_position() {
        let mut game = new_game(2);
        run_to_answering(&mut game);
        if let Some(racer) = game.state.racers.get_mut(&2) {
            racer.inventory.push(InventoryItem {
                id: 7,
                kind: ItemKind::Trap(TrapKind::Imprisonment),
            });
        }

        assert_eq!(
            game.place_trap(2, 99, 50.0),
            Err(RaceError::UnknownItem)
        );
        // Too close to the owner, then past the placement bound.
        assert!(game.place_trap(2, 7, 3.0).unwrap().is_empty());
        assert!(game.place_trap(2, 7, 97.0).unwrap().is_empty());
        assert_eq!(game.state().racers[&2].inventory.len(), 1);

        let events = game.place_trap(2, 7, 40.0).unwrap();
        assert!(matches!(events[0], RaceEvent::TrapPlaced { player_id: 2, .. }));
        let racer = &game.state().racers[&2];
        assert!(racer.inventory.is_empty());
        assert_eq!(racer.traps_placed, 1);
        assert_eq!(game.state().traps.len(), 1);
        assert_eq!(game.state().traps[0].placed_by, Some(2));
    }

    #[test]
    fn use_item_applies_power_up_and_only_selects_traps() {
        let mut game = new_game(2);
        run_to_answering(&mut game);
        if let Some(racer) = game.state.racers.get_mut(&2) {
            racer.inventory.push(InventoryItem {
                id: 7,
                kind: ItemKind::PowerUp(FeatureKind::Teleport),
            });
            racer.inventory.push(InventoryItem {
                id: 8,
                kind: ItemKind::Trap(TrapKind::Freeze),
            });
        }

        let events = game.use_item(2, 7).unwrap();
        assert!(matches!(events[0], RaceEvent::ItemUsed { player_id: 2, .. }));
        let racer = &game.state().racers[&2];
        assert_eq!(racer.distance, TELEPORT_DISTANCE);
        assert_eq!(racer.items_used, 1);
        assert_eq!(racer.inventory.len(), 1);

        // Selecting a trap item consumes nothing.
        let events = game.use_item(2, 8).unwrap();
        assert_eq!(
            events,
            vec![RaceEvent::TrapItemSelected { player_id: 2, item_id: 8 }]
        );
        assert_eq!(game.state().racers[&2].inventory.len(), 1);

        assert_eq!(game.use_item(2, 42), Err(RaceError::UnknownItem));
        assert_eq!(game.use_item(42, 7), Err(RaceError::UnknownPlayer));
    }

    #[test]
    fn slow_others_respects_base_speed_floor_and_shields() {
        let mut game = new_game(3);
        run_to_answering(&mut game);
        if let Some(racer) = game.state.racers.get_mut(&1) {
            racer.inventory.push(InventoryItem {
                id: 7,
                kind: ItemKind::PowerUp(FeatureKind::SlowOthers),
            });
        }
        if let Some(racer) = game.state.racers.get_mut(&2) {
            racer.current_speed = 40.0;
        }
        if let Some(racer) = game.state.racers.get_mut(&3) {
            racer.current_speed = 40.0;
            racer
                .active_features
                .push(ActiveFeature::new(FeatureKind::Shield));
        }

        game.use_item(1, 7).unwrap();
        assert_eq!(game.state().racers[&2].current_speed, 36.0);
        assert_eq!(game.state().racers[&3].current_speed, 40.0);

        // Already at base speed: the floor holds.
        if let Some(racer) = game.state.racers.get_mut(&1) {
            racer.inventory.push(InventoryItem {
                id: 8,
                kind: ItemKind::PowerUp(FeatureKind::SlowOthers),
            });
        }
        if let Some(racer) = game.state.racers.get_mut(&2) {
            racer.current_speed = racer.vehicle.base_speed;
        }
        game.use_item(1, 8).unwrap();
        let racer = &game.state().racers[&2];
        assert_eq!(racer.current_speed, racer.vehicle.base_speed);
    }

    #[test]
    fn milestone_grants_an_item_up_to_capacity() {
        let mut questions = plain_questions(10);
        questions[0].is_milestone = true;
        let mut game = new_game_with(2, default_settings(), questions);
        run_to_answering(&mut game);

        let events = game.submit_answer(2, 1, 2_000);
        assert!(
            events
                .iter()
                .any(|e| matches!(e, RaceEvent::ItemGranted { player_id: 2, .. }))
        );
        assert_eq!(game.state().racers[&2].inventory.len(), 1);
    }

    #[test]
    fn milestone_grant_is_dropped_when_inventory_is_full() {
        let mut questions = plain_questions(10);
        questions[0].is_milestone = true;
        let mut game = new_game_with(2, default_settings(), questions);
        run_to_answering(&mut game);
        if let Some(racer) = game.state.racers.get_mut(&2) {
            for id in 100..103 {
                racer.inventory.push(InventoryItem {
                    id,
                    kind: ItemKind::PowerUp(FeatureKind::Shield),
                });
            }
        }

        let events = game.submit_answer(2, 1, 2_000);
        assert!(
            !events
                .iter()
                .any(|e| matches!(e, RaceEvent::ItemGranted { .. }))
        );
        assert_eq!(
            game.state().racers[&2].inventory.len(),
            inventory::INVENTORY_CAPACITY
        );
    }

    #[test]
    fn mystery_box_diverts_and_rewards_on_open() {
        use wordrush_core::question::MysteryBox;

        let mut questions = plain_questions(10);
        questions[0].mystery_box = Some(MysteryBox {
            difficulty: Difficulty::Medium,
            reward: MysteryRewardKind::PowerUp,
        });
        let mut game = new_game_with(2, default_settings(), questions);
        game.start(1).unwrap();
        game.countdown_elapsed(1_000);

        let events = game.present_elapsed(0);
        assert_eq!(events, vec![RaceEvent::MysteryBoxPresented { index: 0 }]);
        assert_eq!(game.state().status, GameStatus::MysteryBox);

        // Answers are not accepted while the box is closed.
        assert!(game.submit_answer(2, 1, 2_000).is_empty());
        assert_eq!(game.open_mystery_box(2), Err(RaceError::NotHost));

        let events = game.open_mystery_box(1).unwrap();
        assert!(matches!(
            events[0],
            RaceEvent::MysteryBoxOpened { item: ItemKind::PowerUp(_), .. }
        ));
        assert_eq!(*events.last().unwrap(), RaceEvent::AnsweringOpened { index: 0 });
        assert_eq!(game.state().status, GameStatus::Answering);
        assert_eq!(game.open_mystery_box(1), Err(RaceError::WrongStatus("open the mystery box")));

        let granted: usize = game
            .state()
            .racers
            .values()
            .map(|r| r.inventory.len())
            .sum();
        assert_eq!(granted, 1);
    }

    #[test]
    fn team_mode_balances_joins_and_recomputes_totals() {
        let mut settings = default_settings();
        settings.game_mode = GameMode::Team;
        settings.team_count = 2;
        let mut participants = make_participants(4);
        let host = participants.remove(0);
        let mut rng = SeededRngSource::new(3);
        let questions =
            build_question_set(&make_vocab_pool(20), &settings, &mut rng).unwrap();
        let mut game = RaceGame::create(
            settings,
            "AB2CD3".to_string(),
            host,
            test_vehicle(),
            questions,
            Box::new(SeededRngSource::new(7)),
        );
        for p in participants {
            game.join(p, test_vehicle()).unwrap();
        }

        let sizes: Vec<usize> = game.state().teams.values().map(|t| t.members.len()).collect();
        assert_eq!(sizes, vec![2, 2]);

        run_to_answering(&mut game);
        let correct = game.state().questions[0].correct_index;
        for id in 1..=4 {
            game.submit_answer(id, correct, 2_000 + id * 100);
        }

        for team in game.state().teams.values() {
            let members: Vec<&Racer> =
                team.members.iter().map(|id| &game.state().racers[id]).collect();
            let distance: f32 = members.iter().map(|r| r.distance).sum();
            let points: u64 = members.iter().map(|r| u64::from(r.total_points)).sum();
            assert!(team.total_distance > 0.0);
            assert_eq!(team.total_distance, distance);
            assert_eq!(team.total_points, points);
        }
    }

    #[test]
    fn assign_team_moves_membership() {
        let mut settings = default_settings();
        settings.game_mode = GameMode::Team;
        let mut game = new_game_with(2, settings, plain_questions(10));

        assert_eq!(game.assign_team(2, 1, 0), Err(RaceError::NotHost));
        assert_eq!(game.assign_team(1, 1, 9), Err(RaceError::UnknownTeam));

        let from = game.state().racers[&2].team_id.unwrap();
        let to = if from == 0 { 1 } else { 0 };
        game.assign_team(2, 2, to).unwrap();
        assert_eq!(game.state().racers[&2].team_id, Some(to));
        assert!(!game.state().teams[&from].members.contains(&2));
        assert!(game.state().teams[&to].members.contains(&2));
    }

    #[test]
    fn host_leave_transfers_and_last_leave_discards() {
        let mut game = new_game(3);
        let events = game.leave(1);
        assert!(events.contains(&RaceEvent::HostTransferred { new_host: 2 }));
        assert_eq!(game.state().host_id, 2);

        game.leave(2);
        let events = game.leave(3);
        assert!(events.contains(&RaceEvent::GameDiscarded));
        assert_eq!(game.state().status, GameStatus::Finished);
    }

    #[test]
    fn kick_is_host_only() {
        let mut game = new_game(3);
        assert_eq!(game.kick(2, 3), Err(RaceError::NotHost));
        assert_eq!(game.kick(1, 42), Err(RaceError::UnknownPlayer));

        let events = game.kick(1, 3).unwrap();
        assert!(events.contains(&RaceEvent::PlayerLeft { player_id: 3 }));
        assert_eq!(game.state().racers.len(), 2);
    }

    #[test]
    fn snapshot_round_trips_mid_race() {
        let mut game = new_game(2);
        run_to_answering(&mut game);
        game.submit_answer(2, 1, 2_000);

        let bytes = game.snapshot();
        let mut other = new_game(2);
        other.restore(&bytes);
        assert_eq!(other.state(), game.state());

        // Garbage bytes leave the state untouched.
        let before = other.state().clone();
        other.restore(b"not msgpack");
        assert_eq!(*other.state(), before);
    }

    #[test]
    fn spawn_random_trap_is_host_gated() {
        let mut game = new_game(2);
        assert_eq!(
            game.spawn_random_trap(1),
            Err(RaceError::WrongStatus("spawn traps"))
        );
        run_to_answering(&mut game);
        assert_eq!(game.spawn_random_trap(2), Err(RaceError::NotHost));

        let events = game.spawn_random_trap(1).unwrap();
        assert!(matches!(events[0], RaceEvent::TrapSpawned { .. }));
        let trap = &game.state().traps[0];
        assert!(trap.position >= SPAWN_MIN && trap.position <= SPAWN_MAX);
        assert_eq!(trap.placed_by, None);
    }

    proptest! {
        /// Any mix of answers keeps every racer inside the track and the
        /// inventory bound, and distances never regress.
        #[test]
        fn answers_preserve_track_and_inventory_bounds(
            options in proptest::collection::vec(0u8..4, 1..60),
            seed in 0u64..1_000,
        ) {
            let mut questions = plain_questions(60);
            for (i, q) in questions.iter_mut().enumerate() {
                q.is_milestone = i % 5 == 4;
            }
            let mut participants = make_participants(2);
            let host = participants.remove(0);
            let mut game = RaceGame::create(
                default_settings(),
                "AB2CD3".to_string(),
                host,
                test_vehicle(),
                questions,
                Box::new(SeededRngSource::new(seed)),
            );
            for p in participants {
                game.join(p, test_vehicle()).unwrap();
            }
            game.start(1).unwrap();
            game.countdown_elapsed(0);
            game.present_elapsed(0);

            let mut last_distance = 0.0f32;
            for (i, option) in options.iter().enumerate() {
                game.submit_answer(2, *option, (i as u64 + 1) * 1_000);

                let racer = &game.state().racers[&2];
                prop_assert!(racer.distance >= last_distance);
                prop_assert!(racer.distance <= FINISH_LINE);
                prop_assert!(racer.inventory.len() <= inventory::INVENTORY_CAPACITY);
                last_distance = racer.distance;

                game.reveal_due(i);
                if game.next_question(1, (i as u64 + 1) * 1_000 + 500).unwrap()
                    == vec![RaceEvent::RaceFinished]
                {
                    break;
                }
                game.present_elapsed(i + 1);
            }
        }
    }
}
