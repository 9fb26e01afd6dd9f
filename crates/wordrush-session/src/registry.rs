use std::collections::HashMap;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use wordrush_core::code::generate_join_code;
use wordrush_core::participant::{Participant, Vehicle};
use wordrush_core::question::Question;
use wordrush_core::rng::ThreadRngSource;
use wordrush_core::settings::RaceSettings;
use wordrush_core::PlayerId;
use wordrush_engine::RaceGame;

use crate::session::{SessionBroadcast, SessionCommand, spawn_race_session};

struct SessionEntry {
    command_tx: mpsc::UnboundedSender<SessionCommand>,
    task: JoinHandle<()>,
}

/// Who a session token belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    pub join_code: String,
    pub player_id: PlayerId,
}

/// Manages all active race sessions. Player ids are unique across the
/// registry, so a token can never be replayed against another session.
pub struct SessionRegistry {
    sessions: HashMap<String, SessionEntry>,
    next_player_id: PlayerId,
    /// Maps session_token → claims.
    tokens: HashMap<String, TokenClaims>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
            next_player_id: 1,
            tokens: HashMap::new(),
        }
    }

    fn alloc_player_id(&mut self) -> PlayerId {
        let id = self.next_player_id;
        self.next_player_id += 1;
        id
    }

    fn issue_token(&mut self, join_code: &str, player_id: PlayerId) -> String {
        let token = Uuid::new_v4().to_string();
        self.tokens.insert(
            token.clone(),
            TokenClaims {
                join_code: join_code.to_string(),
                player_id,
            },
        );
        token
    }

    /// Create a session and spawn its loop. Returns the join code, the
    /// host's player id and session token, and the broadcast receiver.
    pub fn create_session(
        &mut self,
        settings: RaceSettings,
        host_name: String,
        avatar: String,
        vehicle: Vehicle,
        questions: Vec<Question>,
    ) -> (
        String,
        PlayerId,
        String,
        mpsc::UnboundedReceiver<SessionBroadcast>,
    ) {
        let code = self.generate_unique_code();
        let player_id = self.alloc_player_id();
        let token = self.issue_token(&code, player_id);
        let host = Participant {
            id: player_id,
            display_name: host_name,
            avatar,
            is_host: true,
            is_bot: false,
        };

        let game = RaceGame::create(
            settings,
            code.clone(),
            host,
            vehicle,
            questions,
            Box::new(ThreadRngSource),
        );
        let (command_tx, broadcast_rx, task) = spawn_race_session(game);
        tracing::info!(code = %code, host = player_id, "race session created");
        self.sessions.insert(code.clone(), SessionEntry { command_tx, task });
        (code, player_id, token, broadcast_rx)
    }

    fn generate_unique_code(&self) -> String {
        loop {
            let code = generate_join_code();
            if !self.sessions.contains_key(&code) {
                return code;
            }
        }
    }

    /// Register a joining player: allocates their id, issues a token and
    /// forwards the join to the session loop. The loop decides whether
    /// the join is actually accepted.
    pub fn join_session(
        &mut self,
        join_code: &str,
        display_name: String,
        avatar: String,
        vehicle: Vehicle,
    ) -> Result<(PlayerId, String), String> {
        if !self.sessions.contains_key(join_code) {
            return Err(format!("no session with code {join_code}"));
        }
        let player_id = self.alloc_player_id();
        let token = self.issue_token(join_code, player_id);
        let participant = Participant {
            id: player_id,
            display_name,
            avatar,
            is_host: false,
            is_bot: false,
        };
        self.command(join_code, SessionCommand::Join {
            participant,
            vehicle,
        });
        Ok((player_id, token))
    }

    /// Add a server-driven bot to a session.
    pub fn add_bot(&mut self, join_code: &str, vehicle: Vehicle) -> Option<PlayerId> {
        if !self.sessions.contains_key(join_code) {
            return None;
        }
        let player_id = self.alloc_player_id();
        let participant = Participant {
            id: player_id,
            display_name: format!("Bot {player_id}"),
            avatar: "🤖".to_string(),
            is_host: false,
            is_bot: true,
        };
        self.command(join_code, SessionCommand::Join {
            participant,
            vehicle,
        });
        Some(player_id)
    }

    /// Forward a command to a session's loop. Returns false when the
    /// code is unknown or the loop is gone.
    pub fn command(&self, join_code: &str, cmd: SessionCommand) -> bool {
        let Some(entry) = self.sessions.get(join_code) else {
            return false;
        };
        entry.command_tx.send(cmd).is_ok()
    }

    /// Resolve a session token back to its session and player.
    pub fn resolve_token(&self, token: &str) -> Option<&TokenClaims> {
        self.tokens.get(token)
    }

    /// Stop a session's loop and drop its tokens.
    pub fn remove(&mut self, join_code: &str) {
        if let Some(entry) = self.sessions.remove(join_code) {
            let _ = entry.command_tx.send(SessionCommand::Stop);
            entry.task.abort();
            self.tokens.retain(|_, claims| claims.join_code != join_code);
            tracing::info!(code = %join_code, "race session removed");
        }
    }

    pub fn stop_all(&mut self) {
        let codes: Vec<String> = self.sessions.keys().cloned().collect();
        for code in codes {
            self.remove(&code);
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
