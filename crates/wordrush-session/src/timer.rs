use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use wordrush_core::PlayerId;

/// Identity of a pending timer. One timer per key; re-arming a key
/// replaces the previous timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKey {
    Countdown,
    Present,
    RevealTimeout,
    TrapSpawn,
    BotAnswer(PlayerId),
}

/// A timer expiry delivered back to the session loop. Carries the
/// question index it was armed for, so the engine can reject it if the
/// race moved on in the meantime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFired {
    pub key: TimerKey,
    pub question: usize,
}

/// Owns every pending timer for one session. Cancellation aborts the
/// sleep task; an already-queued expiry is instead rejected by the
/// engine's own guards.
pub struct TimerRegistry {
    timers: HashMap<TimerKey, JoinHandle<()>>,
    tx: mpsc::UnboundedSender<TimerFired>,
}

impl TimerRegistry {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TimerFired>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                timers: HashMap::new(),
                tx,
            },
            rx,
        )
    }

    /// Arm a timer, replacing any pending timer under the same key.
    pub fn schedule(&mut self, key: TimerKey, question: usize, delay: Duration) {
        self.cancel(key);
        let tx = self.tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(TimerFired { key, question });
        });
        self.timers.insert(key, handle);
    }

    pub fn cancel(&mut self, key: TimerKey) {
        if let Some(handle) = self.timers.remove(&key) {
            handle.abort();
        }
    }

    /// Cancel every pending bot answer timer.
    pub fn cancel_bots(&mut self) {
        let bots: Vec<TimerKey> = self
            .timers
            .keys()
            .filter(|k| matches!(k, TimerKey::BotAnswer(_)))
            .copied()
            .collect();
        for key in bots {
            self.cancel(key);
        }
    }

    pub fn cancel_all(&mut self) {
        for (_, handle) in self.timers.drain() {
            handle.abort();
        }
    }
}

impl Drop for TimerRegistry {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
