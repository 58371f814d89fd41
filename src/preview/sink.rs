//! Cache-Event Sink (C10): observers of `CacheEvent`s emitted by the
//! preview service, grounded on the original implementation's mock UI
//! event logger and subscriber.

use std::sync::{Arc, Mutex};

use tracing::debug;

use super::types::CacheEvent;

/// Receives one `CacheEvent` per processed job.
pub trait CacheEventSink: Send + Sync {
    fn handle(&self, event: &CacheEvent);
}

/// Appends every event to an in-memory log and surfaces it through
/// `tracing` at debug level. Used as the default sink wired into
/// `PreviewService` when no caller-supplied sink is set.
pub struct EventLogger {
    events: Mutex<Vec<CacheEvent>>,
}

impl EventLogger {
    pub fn new() -> Self {
        Self { events: Mutex::new(Vec::new()) }
    }

    pub fn error_count(&self) -> usize {
        self.events.lock().expect("event log poisoned").iter().filter(|e| e.error).count()
    }

    pub fn len(&self) -> usize {
        self.events.lock().expect("event log poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(hits, misses, errors, avg_gpu_ms)` over every event logged so far.
    pub fn summary(&self) -> (usize, usize, usize, f64) {
        let events = self.events.lock().expect("event log poisoned");
        let hits = events.iter().filter(|e| e.hit).count();
        let misses = events.len() - hits;
        let errors = events.iter().filter(|e| e.error).count();
        let avg_gpu_ms = if events.is_empty() {
            0.0
        } else {
            events.iter().map(|e| e.gpu_upload_ms).sum::<f64>() / events.len() as f64
        };
        (hits, misses, errors, avg_gpu_ms)
    }

    /// One line per event, oldest first: `relative_path tier hit/miss [error: message]`.
    pub fn render_summary(&self) -> String {
        let events = self.events.lock().expect("event log poisoned");
        events
            .iter()
            .map(|e| {
                let outcome = if e.hit { "hit" } else { "miss" };
                if e.error {
                    format!("{} {:?} {} error: {}", e.relative_path, e.tier, outcome, e.error_message)
                } else {
                    format!("{} {:?} {}", e.relative_path, e.tier, outcome)
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Default for EventLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheEventSink for EventLogger {
    fn handle(&self, event: &CacheEvent) {
        debug!(
            relative_path = %event.relative_path,
            tier = ?event.tier,
            hit = event.hit,
            error = event.error,
            backend = %event.backend,
            "preview cache event"
        );
        self.events.lock().expect("event log poisoned").push(event.clone());
    }
}

/// A bounded-memory sink standing in for a UI's recent-activity list.
pub struct MockUiSubscriber {
    window: usize,
    recent: Mutex<Vec<CacheEvent>>,
    total: Mutex<usize>,
    errors: Mutex<usize>,
}

impl MockUiSubscriber {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            recent: Mutex::new(Vec::new()),
            total: Mutex::new(0),
            errors: Mutex::new(0),
        }
    }

    pub fn total_events(&self) -> usize {
        *self.total.lock().expect("subscriber poisoned")
    }

    pub fn error_events(&self) -> usize {
        *self.errors.lock().expect("subscriber poisoned")
    }

    pub fn recent_items(&self) -> Vec<CacheEvent> {
        self.recent.lock().expect("subscriber poisoned").clone()
    }
}

impl CacheEventSink for MockUiSubscriber {
    fn handle(&self, event: &CacheEvent) {
        *self.total.lock().expect("subscriber poisoned") += 1;
        if event.error {
            *self.errors.lock().expect("subscriber poisoned") += 1;
        }
        let mut recent = self.recent.lock().expect("subscriber poisoned");
        recent.push(event.clone());
        if recent.len() > self.window {
            let overflow = recent.len() - self.window;
            recent.drain(0..overflow);
        }
    }
}

/// Binds a single subscriber and forwards every event it is given. This
/// is the seam `PreviewService::set_event_sink` fills.
pub struct Navigator {
    subscriber: Arc<dyn CacheEventSink>,
}

impl Navigator {
    pub fn new(subscriber: Arc<dyn CacheEventSink>) -> Self {
        Self { subscriber }
    }
}

impl CacheEventSink for Navigator {
    fn handle(&self, event: &CacheEvent) {
        self.subscriber.handle(event);
    }
}
