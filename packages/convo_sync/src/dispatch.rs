//! Event dispatcher: synchronous pub/sub fan-out keyed by event name.
//!
//! The dispatcher is owned by a channel manager and outlives every stream
//! connection the manager opens, so subscriptions survive reconnects and
//! retargets without re-registering. Handlers are identified by `Arc`
//! pointer identity: subscribing the same handler reference twice is a
//! no-op, and unsubscribe removes exactly that reference.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex};

use tracing::warn;

use crate::protocol::EventFrame;

/// A subscriber callback. Handlers run synchronously on the connection's
/// reader task and must not block; longer work belongs on the handler's own
/// task, queued after it returns.
pub type EventHandler = Arc<dyn Fn(&EventFrame) + Send + Sync>;

/// Wrap a closure as a shareable [`EventHandler`].
pub fn handler(f: impl Fn(&EventFrame) + Send + Sync + 'static) -> EventHandler {
    Arc::new(f)
}

/// In-memory mapping from event name to registered handlers.
#[derive(Default)]
pub struct EventDispatcher {
    handlers: Mutex<HashMap<String, Vec<EventHandler>>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `event`.
    ///
    /// Idempotent per handler reference: re-subscribing the same `Arc` does
    /// not produce double delivery. (The source design kept a plain list and
    /// allowed duplicates; set semantics are a deliberate change.)
    pub fn subscribe(&self, event: &str, handler: EventHandler) {
        let mut handlers = self.handlers.lock().expect("dispatcher lock poisoned");
        let entry = handlers.entry(event.to_string()).or_default();
        if !entry.iter().any(|h| Arc::ptr_eq(h, &handler)) {
            entry.push(handler);
        }
    }

    /// Remove `handler` from `event`. Unknown pairs are ignored; the entry
    /// for the name is dropped once its last handler goes.
    pub fn unsubscribe(&self, event: &str, handler: &EventHandler) {
        let mut handlers = self.handlers.lock().expect("dispatcher lock poisoned");
        if let Some(entry) = handlers.get_mut(event) {
            entry.retain(|h| !Arc::ptr_eq(h, handler));
            if entry.is_empty() {
                handlers.remove(event);
            }
        }
    }

    /// Deliver `frame` to every handler currently registered for `event`,
    /// in registration order. A panicking handler is logged and skipped;
    /// the remaining handlers still run.
    pub fn dispatch(&self, event: &str, frame: &EventFrame) {
        let snapshot: Vec<EventHandler> = {
            let handlers = self.handlers.lock().expect("dispatcher lock poisoned");
            match handlers.get(event) {
                Some(entry) => entry.clone(),
                None => return,
            }
        };

        for handler in snapshot {
            if catch_unwind(AssertUnwindSafe(|| handler(frame))).is_err() {
                warn!(event = %event, "event handler panicked; continuing with remaining handlers");
            }
        }
    }

    /// Number of handlers registered for `event`.
    pub fn handler_count(&self, event: &str) -> usize {
        self.handlers
            .lock()
            .expect("dispatcher lock poisoned")
            .get(event)
            .map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(event: &str) -> EventFrame {
        EventFrame::new(event, "{}", None)
    }

    fn recording_handler(log: Arc<Mutex<Vec<String>>>, tag: &'static str) -> EventHandler {
        handler(move |f: &EventFrame| {
            log.lock().unwrap().push(format!("{tag}:{}", f.event));
        })
    }

    #[test]
    fn delivers_to_subscribed_name_only() {
        let dispatcher = EventDispatcher::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        dispatcher.subscribe("a", recording_handler(log.clone(), "h1"));

        dispatcher.dispatch("a", &frame("a"));
        dispatcher.dispatch("b", &frame("b"));

        assert_eq!(*log.lock().unwrap(), vec!["h1:a"]);
    }

    #[test]
    fn delivers_in_registration_order() {
        let dispatcher = EventDispatcher::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        dispatcher.subscribe("a", recording_handler(log.clone(), "first"));
        dispatcher.subscribe("a", recording_handler(log.clone(), "second"));

        dispatcher.dispatch("a", &frame("a"));

        assert_eq!(*log.lock().unwrap(), vec!["first:a", "second:a"]);
    }

    #[test]
    fn resubscribing_same_handler_is_idempotent() {
        let dispatcher = EventDispatcher::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let h = recording_handler(log.clone(), "h");

        dispatcher.subscribe("a", h.clone());
        dispatcher.subscribe("a", h.clone());
        assert_eq!(dispatcher.handler_count("a"), 1);

        dispatcher.dispatch("a", &frame("a"));
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[test]
    fn no_delivery_after_unsubscribe() {
        let dispatcher = EventDispatcher::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let h = recording_handler(log.clone(), "h");

        dispatcher.subscribe("a", h.clone());
        dispatcher.dispatch("a", &frame("a"));
        dispatcher.unsubscribe("a", &h);
        dispatcher.dispatch("a", &frame("a"));

        assert_eq!(log.lock().unwrap().len(), 1);
        assert_eq!(dispatcher.handler_count("a"), 0);
    }

    #[test]
    fn unsubscribe_unknown_pair_is_ignored() {
        let dispatcher = EventDispatcher::new();
        let h = handler(|_: &EventFrame| {});
        dispatcher.unsubscribe("never-registered", &h);
    }

    #[test]
    fn unsubscribe_removes_only_matching_reference() {
        let dispatcher = EventDispatcher::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let keep = recording_handler(log.clone(), "keep");
        let drop_ = recording_handler(log.clone(), "drop");

        dispatcher.subscribe("a", keep.clone());
        dispatcher.subscribe("a", drop_.clone());
        dispatcher.unsubscribe("a", &drop_);

        dispatcher.dispatch("a", &frame("a"));
        assert_eq!(*log.lock().unwrap(), vec!["keep:a"]);
    }

    #[test]
    fn panicking_handler_does_not_block_siblings() {
        let dispatcher = EventDispatcher::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        dispatcher.subscribe("a", handler(|_: &EventFrame| panic!("subscriber bug")));
        dispatcher.subscribe("a", recording_handler(log.clone(), "survivor"));

        dispatcher.dispatch("a", &frame("a"));

        assert_eq!(*log.lock().unwrap(), vec!["survivor:a"]);
    }

    #[test]
    fn handlers_receive_the_frame_payload() {
        let dispatcher = EventDispatcher::new();
        let seen = Arc::new(Mutex::new(None));
        let seen_clone = seen.clone();
        dispatcher.subscribe(
            "a",
            handler(move |f: &EventFrame| {
                *seen_clone.lock().unwrap() = Some(f.data.clone());
            }),
        );

        dispatcher.dispatch("a", &EventFrame::new("a", r#"{"x":1}"#, None));
        assert_eq!(seen.lock().unwrap().as_deref(), Some(r#"{"x":1}"#));
    }
}
