/// Cancellable delayed actions for the engine.
///
/// Timer tasks never touch island state. When one expires it sends
/// [`Command::TimerFired`] back into the engine's queue, where the fire is
/// accepted only if it still belongs to the outstanding timer for its key and
/// its [`Guard`] still holds. At most one timer per [`TimerKey`] is outstanding.
use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::engine::Command;
use crate::media::POLL_INTERVAL;
use crate::policy::Guard;

/// One slot per (event kind, dismiss reason).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKey {
    NotificationCollapse,
    NotificationDismiss,
    MediaPause,
    ChargingCollapse,
    ChargingDismiss,
    BluetoothDismiss,
    RingerDismiss,
}

struct Pending {
    generation: u64,
    guard: Guard,
    handle: JoinHandle<()>,
}

pub struct Timers {
    pending: HashMap<TimerKey, Pending>,
    next_generation: u64,
    tx: mpsc::Sender<Command>,
}

impl Timers {
    pub fn new(tx: mpsc::Sender<Command>) -> Self {
        Self {
            pending: HashMap::new(),
            next_generation: 0,
            tx,
        }
    }

    /// Cancels any outstanding timer for `key` and starts a new one.
    pub fn replace(&mut self, key: TimerKey, delay: Duration, guard: Guard) {
        self.cancel(key);
        self.next_generation += 1;
        let generation = self.next_generation;
        let tx = self.tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(Command::TimerFired { key, generation }).await;
        });
        self.pending.insert(
            key,
            Pending {
                generation,
                guard,
                handle,
            },
        );
    }

    /// Cancels the timer for `key`. Returns false if none was outstanding.
    pub fn cancel(&mut self, key: TimerKey) -> bool {
        match self.pending.remove(&key) {
            Some(pending) => {
                pending.handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&mut self) {
        for (_, pending) in self.pending.drain() {
            pending.handle.abort();
        }
    }

    pub fn is_pending(&self, key: TimerKey) -> bool {
        self.pending.contains_key(&key)
    }

    /// Claims a fire. Returns the guard to check if `generation` is the
    /// outstanding timer for `key`; a fire from a replaced or cancelled timer
    /// that was already queued returns `None`.
    pub fn take_fired(&mut self, key: TimerKey, generation: u64) -> Option<Guard> {
        match self.pending.get(&key) {
            Some(pending) if pending.generation == generation => {
                self.pending.remove(&key).map(|p| p.guard)
            }
            _ => None,
        }
    }
}

impl Drop for Timers {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

/// Sends [`Command::PositionTick`] every [`POLL_INTERVAL`] while running.
pub struct Poller {
    handle: Option<JoinHandle<()>>,
    tx: mpsc::Sender<Command>,
}

impl Poller {
    pub fn new(tx: mpsc::Sender<Command>) -> Self {
        Self { handle: None, tx }
    }

    /// Starts ticking; restarts the cadence if already running.
    pub fn start(&mut self) {
        self.stop();
        let tx = self.tx.clone();
        self.handle = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + POLL_INTERVAL, POLL_INTERVAL);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if tx.send(Command::PositionTick).await.is_err() {
                    break;
                }
            }
        }));
    }

    /// Stops ticking. Safe to call when not running.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop();
    }
}
