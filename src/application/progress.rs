use parking_lot::Mutex;

use super::events::EventSink;

/// Percentage of a transfer that is done. Zero while the total is unknown.
pub fn percentage(bytes_total: u64, bytes_remaining: u64) -> f32 {
    if bytes_total == 0 {
        return 0.0;
    }
    let done = bytes_total.saturating_sub(bytes_remaining) as f64;
    ((done / bytes_total as f64) * 100.0).clamp(0.0, 100.0) as f32
}

/// Turns byte counts into percentage events for the single event subscriber.
///
/// Within one item the published value never goes down; `reset` starts the
/// next item from 0. `reset` and `complete` always reach the subscriber.
#[derive(Debug)]
pub struct ProgressReporter {
    sink: EventSink,
    floor: Mutex<f32>,
}

impl ProgressReporter {
    pub fn new(sink: EventSink) -> Self {
        Self {
            sink,
            floor: Mutex::new(0.0),
        }
    }

    /// Returns the value published. Under backpressure the event itself may
    /// be skipped; later events still carry the newer value.
    pub fn report(&self, bytes_total: u64, bytes_remaining: u64) -> f32 {
        let computed = percentage(bytes_total, bytes_remaining);
        let published = {
            let mut floor = self.floor.lock();
            *floor = floor.max(computed);
            *floor
        };

        if !self.sink.try_progress(published) {
            tracing::trace!(published, "progress event skipped, channel full");
        }
        published
    }

    pub async fn reset(&self) {
        *self.floor.lock() = 0.0;
        self.sink.progress(0.0).await;
    }

    /// Publishes 100 for a finished item, waiting for room if needed.
    pub async fn complete(&self) {
        *self.floor.lock() = 100.0;
        self.sink.progress(100.0).await;
    }
}
