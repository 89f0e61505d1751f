//! Session event emission
//!
//! The orchestrator pushes typed progress, log and activity events to an
//! [`EventSink`]; a UI or CLI drains the matching [`EventStream`]. Progress
//! and log events ride an unbounded channel and are never dropped. Activity
//! pulses fire on every byte transfer and ride a small bounded channel with
//! a drop-on-full policy so a slow consumer can never stall the protocol
//! worker.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Default capacity of the activity-pulse channel.
const ACTIVITY_CHANNEL_CAPACITY: usize = 64;

/// Progress notification emitted before each protocol step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub step: u32,
    pub total: u32,
    pub message: String,
}

/// Severity / direction tag on a log event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Tx,
    Rx,
    Info,
    Warn,
    Error,
    Success,
}

/// Communication log entry emitted around each frame exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEvent {
    /// Wall-clock timestamp, `HH:MM:SS.mmm`.
    pub timestamp: String,
    pub level: LogLevel,
    pub message: String,
    /// Hex dump of the raw bytes for TX/RX entries.
    pub raw_bytes: Option<String>,
}

/// Live-indicator pulse, one per byte transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activity {
    Tx,
    Rx,
    Idle,
}

/// Ordered event stream of one connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SessionEvent {
    Progress(ProgressEvent),
    Log(LogEvent),
}

/// Producer half handed to the session orchestrator.
///
/// Cloneable; all clones feed the same stream. A sink created with
/// [`EventSink::disabled`] swallows everything, which keeps headless use
/// free of channel plumbing.
#[derive(Clone)]
pub struct EventSink {
    events: Option<mpsc::UnboundedSender<SessionEvent>>,
    activity: Option<mpsc::Sender<Activity>>,
}

/// Consumer half returned by [`EventSink::channel`].
pub struct EventStream {
    pub events: mpsc::UnboundedReceiver<SessionEvent>,
    pub activity: mpsc::Receiver<Activity>,
}

impl EventSink {
    /// Create a connected sink/stream pair.
    pub fn channel() -> (EventSink, EventStream) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (activity_tx, activity_rx) = mpsc::channel(ACTIVITY_CHANNEL_CAPACITY);
        (
            EventSink {
                events: Some(events_tx),
                activity: Some(activity_tx),
            },
            EventStream {
                events: events_rx,
                activity: activity_rx,
            },
        )
    }

    /// A sink that discards every event.
    pub fn disabled() -> EventSink {
        EventSink {
            events: None,
            activity: None,
        }
    }

    /// Emit a progress event. Lossless.
    pub fn progress(&self, step: u32, total: u32, message: &str) {
        if let Some(tx) = &self.events {
            let _ = tx.send(SessionEvent::Progress(ProgressEvent {
                step,
                total,
                message: message.to_string(),
            }));
        }
    }

    /// Emit a log event with an optional raw-byte dump. Lossless.
    pub fn log(&self, level: LogLevel, message: &str, raw: Option<&[u8]>) {
        if let Some(tx) = &self.events {
            let _ = tx.send(SessionEvent::Log(LogEvent {
                timestamp: chrono::Local::now().format("%H:%M:%S%.3f").to_string(),
                level,
                message: message.to_string(),
                raw_bytes: raw.map(hex::encode_upper),
            }));
        }
    }

    /// Emit an activity pulse. Dropped when the consumer lags.
    pub fn activity(&self, kind: Activity) {
        if let Some(tx) = &self.activity {
            let _ = tx.try_send(kind);
        }
    }

    /// Log transmitted bytes and pulse the TX indicator.
    pub fn log_tx(&self, description: &str, data: &[u8]) {
        self.log(LogLevel::Tx, description, Some(data));
        self.activity(Activity::Tx);
    }

    /// Log received bytes and pulse the RX indicator.
    pub fn log_rx(&self, description: &str, data: &[u8]) {
        self.log(LogLevel::Rx, description, Some(data));
        self.activity(Activity::Rx);
    }

    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message, None);
    }

    pub fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, message, None);
    }

    pub fn error(&self, message: &str) {
        self.log(LogLevel::Error, message, None);
    }

    pub fn success(&self, message: &str) {
        self.log(LogLevel::Success, message, None);
    }
}
