pub mod registry;
pub mod session;
pub mod timer;

pub use registry::SessionRegistry;
pub use session::{SessionBroadcast, SessionCommand, spawn_race_session};
pub use timer::{TimerFired, TimerKey, TimerRegistry};
