//! Events produced by the poll loop and the channel that carries them.
//!
//! Ordinary events are posted and forgotten. [`GameEvent::InvalidSettings`]
//! travels with an acknowledgement slot: the poll loop does not sample the
//! next tick until the consumer acknowledges (or drops) the [`Delivery`].

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, SyncSender};
use std::time::Duration;

use serde::Serialize;
use strum::{Display, IntoStaticStr};

/// What set a load screen off
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LoadCause {
    SinglePlayer,
    NewGame,
    Death,
    LevelChange,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, IntoStaticStr)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GameEvent {
    /// The end-of-level screen appeared
    LevelFinished {
        map: String,
        level: Option<String>,
        /// In-game clock at the moment of the split, when game time is tracked
        game_time: Option<Duration>,
    },
    LoadStarted { cause: LoadCause },
    LoadFinished,
    /// The in-game clock left zero on the first level
    FirstLevelStarted,
    /// The in-game clock went back to zero on the first level
    FirstLevelLoading,
    InvalidSettings {
        refresh_rate: i32,
        present_interval: i32,
    },
    PersonalBest {
        label: String,
        time: Duration,
        previous: Duration,
    },
}

impl GameEvent {
    /// Short snake_case name, used in logs
    pub fn kind(&self) -> &'static str {
        self.into()
    }

    /// Whether the poll loop waits for the consumer before the next tick
    pub fn is_blocking(&self) -> bool {
        matches!(self, Self::InvalidSettings { .. })
    }
}

/// Create a connected sink/stream pair
pub fn channel() -> (EventSink, EventStream) {
    let (tx, rx) = mpsc::channel();
    (EventSink { tx }, EventStream { rx })
}

/// Producer half, owned by the poll loop
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: Sender<Delivery>,
}

impl EventSink {
    /// Post an event without waiting.
    ///
    /// Returns `false` if the stream has been dropped.
    pub fn post(&self, event: GameEvent) -> bool {
        self.tx.send(Delivery { event, ack: None }).is_ok()
    }

    /// Post an event and get a handle to wait for the consumer.
    ///
    /// Returns `None` if the stream has been dropped.
    pub fn post_blocking(&self, event: GameEvent) -> Option<Acknowledgement> {
        let (ack_tx, ack_rx) = mpsc::sync_channel(1);
        self.tx
            .send(Delivery {
                event,
                ack: Some(ack_tx),
            })
            .ok()?;
        Some(Acknowledgement { rx: ack_rx })
    }
}

/// Consumer half
#[derive(Debug)]
pub struct EventStream {
    rx: Receiver<Delivery>,
}

impl EventStream {
    /// Block until the next delivery, `None` once every sink is gone
    pub fn recv(&self) -> Option<Delivery> {
        self.rx.recv().ok()
    }

    pub fn try_recv(&self) -> Option<Delivery> {
        self.rx.try_recv().ok()
    }

    /// Wait up to `timeout` for the next delivery
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Delivery, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// One event handed to the consumer.
///
/// Dropping a delivery acknowledges it.
#[derive(Debug)]
pub struct Delivery {
    event: GameEvent,
    ack: Option<SyncSender<()>>,
}

impl Delivery {
    pub fn event(&self) -> &GameEvent {
        &self.event
    }

    /// Whether the poll loop is waiting on this delivery
    pub fn requires_ack(&self) -> bool {
        self.ack.is_some()
    }

    /// Release the poll loop
    pub fn acknowledge(mut self) {
        self.send_ack();
    }

    fn send_ack(&mut self) {
        if let Some(ack) = self.ack.take() {
            let _ = ack.try_send(());
        }
    }
}

impl Drop for Delivery {
    fn drop(&mut self) {
        self.send_ack();
    }
}

/// Pending acknowledgement of a blocking delivery
#[derive(Debug)]
pub struct Acknowledgement {
    rx: Receiver<()>,
}

impl Acknowledgement {
    /// Wait up to `timeout`.
    ///
    /// Returns `true` once the delivery has been acknowledged or can never
    /// be (the stream went away with the delivery still queued).
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        match self.rx.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
            Err(RecvTimeoutError::Timeout) => false,
        }
    }
}
