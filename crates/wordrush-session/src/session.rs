use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use wordrush_core::participant::{Participant, Vehicle};
use wordrush_core::rng::{RngSource, ThreadRngSource};
use wordrush_core::time::now_ms;
use wordrush_core::{PlayerId, TeamId};
use wordrush_engine::results::GameResults;
use wordrush_engine::{RaceEvent, RaceGame, bot};

use crate::timer::{TimerFired, TimerKey, TimerRegistry};

/// Commands sent from connection handlers to the session loop.
#[derive(Debug)]
pub enum SessionCommand {
    Join { participant: Participant, vehicle: Vehicle },
    Leave { player_id: PlayerId },
    Kick { caller: PlayerId, target: PlayerId },
    AssignTeam { caller: PlayerId, target: PlayerId, team_id: TeamId },
    Start { caller: PlayerId },
    SubmitAnswer { player_id: PlayerId, option: u8 },
    Reveal { caller: PlayerId },
    NextQuestion { caller: PlayerId },
    OpenMysteryBox { caller: PlayerId },
    UseItem { player_id: PlayerId, item_id: u64 },
    PlaceTrap { player_id: PlayerId, item_id: u64, position: f32 },
    EscapeTap { player_id: PlayerId },
    SpawnTrap { caller: PlayerId },
    Stop,
}

/// Broadcasts sent from the session loop to all connected clients.
#[derive(Debug, Clone)]
pub enum SessionBroadcast {
    Events(Vec<RaceEvent>),
    /// A command failed validation; only meaningful to its sender.
    Rejected { player_id: PlayerId, reason: String },
    /// Final standings, sent once when the race concludes normally.
    Finished(GameResults),
    /// The loop has exited and every timer is cancelled.
    SessionEnded,
}

/// Spawn a race session loop as a tokio task.
/// Returns the command sender and broadcast receiver.
pub fn spawn_race_session(
    game: RaceGame,
) -> (
    mpsc::UnboundedSender<SessionCommand>,
    mpsc::UnboundedReceiver<SessionBroadcast>,
    JoinHandle<()>,
) {
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (broadcast_tx, broadcast_rx) = mpsc::unbounded_channel();

    let handle = tokio::spawn(async move {
        run_race_session(game, cmd_rx, broadcast_tx).await;
    });

    (cmd_tx, broadcast_rx, handle)
}

/// The session loop. The engine owns all game rules; this loop owns
/// wall-clock time, translating engine events into timers and timer
/// expiries back into guarded engine calls.
async fn run_race_session(
    mut game: RaceGame,
    mut cmd_rx: mpsc::UnboundedReceiver<SessionCommand>,
    broadcast_tx: mpsc::UnboundedSender<SessionBroadcast>,
) {
    let (mut timers, mut timer_rx) = TimerRegistry::new();
    let mut delay_rng = ThreadRngSource;

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else { break };
                if matches!(cmd, SessionCommand::Stop) {
                    break;
                }
                let events = dispatch(&mut game, cmd, &broadcast_tx);
                if handle_events(&game, events, &mut timers, &mut delay_rng, &broadcast_tx) {
                    break;
                }
            }
            Some(fired) = timer_rx.recv() => {
                let events = apply_timer(&mut game, fired);
                if handle_events(&game, events, &mut timers, &mut delay_rng, &broadcast_tx) {
                    break;
                }
            }
        }
    }

    timers.cancel_all();
    // A discarded game has no results; only a concluded race reports them.
    if let Some(results) = game.results() {
        let _ = broadcast_tx.send(SessionBroadcast::Finished(results.clone()));
    }
    let _ = broadcast_tx.send(SessionBroadcast::SessionEnded);
    tracing::debug!(code = %game.state().join_code, "race session loop exited");
}

/// Route one command into the engine. Validation failures become
/// `Rejected` broadcasts; guarded no-ops come back as empty event lists.
fn dispatch(
    game: &mut RaceGame,
    cmd: SessionCommand,
    broadcast_tx: &mpsc::UnboundedSender<SessionBroadcast>,
) -> Vec<RaceEvent> {
    let (caller, result) = match cmd {
        SessionCommand::Join { participant, vehicle } => {
            let caller = participant.id;
            (caller, game.join(participant, vehicle))
        },
        SessionCommand::Leave { player_id } => (player_id, Ok(game.leave(player_id))),
        SessionCommand::Kick { caller, target } => (caller, game.kick(caller, target)),
        SessionCommand::AssignTeam { caller, target, team_id } => {
            (caller, game.assign_team(caller, target, team_id))
        },
        SessionCommand::Start { caller } => (caller, game.start(caller)),
        SessionCommand::SubmitAnswer { player_id, option } => {
            (player_id, Ok(game.submit_answer(player_id, option, now_ms())))
        },
        SessionCommand::Reveal { caller } => (caller, game.reveal(caller)),
        SessionCommand::NextQuestion { caller } => (caller, game.next_question(caller, now_ms())),
        SessionCommand::OpenMysteryBox { caller } => (caller, game.open_mystery_box(caller)),
        SessionCommand::UseItem { player_id, item_id } => {
            (player_id, game.use_item(player_id, item_id))
        },
        SessionCommand::PlaceTrap { player_id, item_id, position } => {
            (player_id, game.place_trap(player_id, item_id, position))
        },
        SessionCommand::EscapeTap { player_id } => (player_id, Ok(game.escape_tap(player_id))),
        SessionCommand::SpawnTrap { caller } => (caller, game.spawn_random_trap(caller)),
        // Handled by the loop before dispatch.
        SessionCommand::Stop => return Vec::new(),
    };

    match result {
        Ok(events) => events,
        Err(e) => {
            let _ = broadcast_tx.send(SessionBroadcast::Rejected {
                player_id: caller,
                reason: e.to_string(),
            });
            Vec::new()
        },
    }
}

/// A timer expired. The engine re-validates against its current state,
/// so stale expiries (raced by a command that already moved the game
/// on) come back empty.
fn apply_timer(game: &mut RaceGame, fired: TimerFired) -> Vec<RaceEvent> {
    match fired.key {
        TimerKey::Countdown => game.countdown_elapsed(now_ms()),
        TimerKey::Present => game.present_elapsed(fired.question),
        TimerKey::RevealTimeout => game.reveal_due(fired.question),
        TimerKey::TrapSpawn => game.trap_spawn_due(),
        TimerKey::BotAnswer(bot_id) => game.bot_answer_due(bot_id, fired.question, now_ms()),
    }
}

/// Forward events to clients and derive the follow-up timer schedule.
/// Returns true when the session is over and the loop should exit.
fn handle_events(
    game: &RaceGame,
    events: Vec<RaceEvent>,
    timers: &mut TimerRegistry,
    delay_rng: &mut dyn RngSource,
    broadcast_tx: &mpsc::UnboundedSender<SessionBroadcast>,
) -> bool {
    if events.is_empty() {
        return false;
    }

    let settings = &game.state().settings;
    let mut finished = false;

    for event in &events {
        match event {
            RaceEvent::CountdownStarted => {
                timers.schedule(
                    TimerKey::Countdown,
                    game.state().current_question,
                    settings.countdown(),
                );
            },
            RaceEvent::QuestionPresented { index } => {
                timers.schedule(TimerKey::Present, *index, settings.present_delay());
            },
            RaceEvent::AnsweringOpened { index } => {
                timers.schedule(
                    TimerKey::RevealTimeout,
                    *index,
                    game.state().questions[*index].time_limit,
                );
                for racer in game.state().racers.values() {
                    if racer.is_bot && !racer.is_finished && racer.current_answer.is_none() {
                        timers.schedule(
                            TimerKey::BotAnswer(racer.id),
                            *index,
                            bot::answer_delay(settings, delay_rng),
                        );
                    }
                }
                if settings.traps_enabled {
                    timers.schedule(TimerKey::TrapSpawn, *index, settings.trap_spawn_delay());
                }
            },
            RaceEvent::AnswerSubmitted { player_id, .. } => {
                timers.cancel(TimerKey::BotAnswer(*player_id));
            },
            RaceEvent::AnswerRevealed { .. } => {
                timers.cancel(TimerKey::RevealTimeout);
                timers.cancel(TimerKey::TrapSpawn);
                timers.cancel_bots();
            },
            RaceEvent::RaceFinished | RaceEvent::GameDiscarded => {
                timers.cancel_all();
                finished = true;
            },
            _ => {},
        }
    }

    let _ = broadcast_tx.send(SessionBroadcast::Events(events));
    finished
}
