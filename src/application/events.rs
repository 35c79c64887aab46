use std::fmt;

use chrono::{DateTime, Local};
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// One line of the user-facing log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub level: LogLevel,
    pub message: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.timestamp.format("%H:%M:%S"), self.message)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OrchestratorEvent {
    Log(LogEntry),
    /// Percentage of the current item, 0 to 100
    Progress(f32),
}

/// Producer half of the orchestrator -> presentation channel.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::Sender<OrchestratorEvent>,
}

/// Consumer half, drained by the presentation layer at its own pace.
#[derive(Debug)]
pub struct EventReceiver {
    rx: mpsc::Receiver<OrchestratorEvent>,
}

pub fn channel(capacity: usize) -> (EventSink, EventReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (EventSink { tx }, EventReceiver { rx })
}

impl EventSink {
    pub async fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message.into()).await;
    }

    pub async fn warn(&self, message: impl Into<String>) {
        self.log(LogLevel::Warn, message.into()).await;
    }

    pub async fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message.into()).await;
    }

    async fn log(&self, level: LogLevel, message: String) {
        match level {
            LogLevel::Info => tracing::info!("{}", message),
            LogLevel::Warn => tracing::warn!("{}", message),
            LogLevel::Error => tracing::error!("{}", message),
        }

        let entry = LogEntry {
            timestamp: Local::now(),
            level,
            message,
        };
        // A closed channel only means nobody is watching any more.
        let _ = self.tx.send(OrchestratorEvent::Log(entry)).await;
    }

    /// Waits for room in the channel.
    pub(crate) async fn progress(&self, percentage: f32) {
        let _ = self.tx.send(OrchestratorEvent::Progress(percentage)).await;
    }

    /// Returns false when the event was dropped because the channel is full.
    pub(crate) fn try_progress(&self, percentage: f32) -> bool {
        match self.tx.try_send(OrchestratorEvent::Progress(percentage)) {
            Ok(()) | Err(TrySendError::Closed(_)) => true,
            Err(TrySendError::Full(_)) => false,
        }
    }
}

impl EventReceiver {
    /// Next pending event without waiting.
    pub fn try_next(&mut self) -> Option<OrchestratorEvent> {
        match self.rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Everything currently queued, in order.
    pub fn drain(&mut self) -> Vec<OrchestratorEvent> {
        std::iter::from_fn(|| self.try_next()).collect()
    }
}
