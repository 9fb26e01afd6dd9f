/// Caller-visible validation errors. Returned synchronously with no state
/// mutation; stale-timer races and duplicate submissions are deliberately
/// not errors (they are silent no-ops in the engine).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RaceError {
    RoomFull,
    RaceAlreadyStarted,
    NotEnoughPlayers { needed: usize, have: usize },
    NotHost,
    UnknownPlayer,
    UnknownItem,
    UnknownTeam,
    WrongStatus(&'static str),
}

impl std::fmt::Display for RaceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RoomFull => write!(f, "Room is full"),
            Self::RaceAlreadyStarted => write!(f, "Race already started"),
            Self::NotEnoughPlayers { needed, have } => {
                write!(f, "Need at least {needed} players to start, have {have}")
            },
            Self::NotHost => write!(f, "Only the host can do that"),
            Self::UnknownPlayer => write!(f, "Player not in this race"),
            Self::UnknownItem => write!(f, "No such item in inventory"),
            Self::UnknownTeam => write!(f, "No such team"),
            Self::WrongStatus(action) => write!(f, "Cannot {action} in the current game state"),
        }
    }
}

impl std::error::Error for RaceError {}
