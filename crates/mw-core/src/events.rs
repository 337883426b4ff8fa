//! View-changed event bus
//!
//! The table owner publishes an event after every view mutation;
//! subscribers (stats panel, search highlighter, exporters) register
//! explicitly and are invoked synchronously in registration order.

use parking_lot::Mutex;

/// Events emitted by a table owner.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    /// A fresh snapshot replaced the base table (and the view with it).
    SnapshotReplaced { rows: usize },
    /// The current view changed (filter, sort, toggle, clear).
    ViewChanged { rows: usize },
}

/// Identifier handed out by [`ViewEventBus::subscribe`].
pub type SubscriberId = u64;

type Handler = Box<dyn Fn(&ViewEvent) + Send>;

/// Synchronous publish/subscribe channel for view events.
#[derive(Default)]
pub struct ViewEventBus {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    next_id: SubscriberId,
    handlers: Vec<(SubscriberId, Handler)>,
}

impl ViewEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler; it stays registered until unsubscribed.
    pub fn subscribe<F>(&self, handler: F) -> SubscriberId
    where
        F: Fn(&ViewEvent) + Send + 'static,
    {
        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.handlers.push((id, Box::new(handler)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriberId) {
        self.inner.lock().handlers.retain(|(hid, _)| *hid != id);
    }

    /// Invoke all handlers in registration order. Handlers must not
    /// subscribe or publish re-entrantly.
    pub fn publish(&self, event: &ViewEvent) {
        let inner = self.inner.lock();
        for (_, handler) in &inner.handlers {
            handler(event);
        }
    }
}
