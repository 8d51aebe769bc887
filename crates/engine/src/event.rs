//! Binding notifications and handler bookkeeping.

use std::{fmt, str::FromStr, sync::Arc};

use bindery_types::ChangeReason;
use serde_json::{Value, json};

use crate::error::BindingError;

/// Event kinds a context binding fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Change,
    DataRequested,
    DataReceived,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Change => "change",
            EventKind::DataRequested => "dataRequested",
            EventKind::DataReceived => "dataReceived",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = BindingError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "change" => Ok(EventKind::Change),
            "dataRequested" => Ok(EventKind::DataRequested),
            "dataReceived" => Ok(EventKind::DataReceived),
            other => Err(BindingError::UnsupportedEvent { event: other.to_string() }),
        }
    }
}

/// Payload of a `dataReceived` notification.
#[derive(Debug, Clone, PartialEq)]
pub enum DataReceived {
    /// Success or cancellation; the payload is always the empty marker object.
    Data(Value),
    Error(BindingError),
}

impl DataReceived {
    pub fn empty() -> Self {
        DataReceived::Data(json!({}))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, DataReceived::Error(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BindingEvent {
    Change { reason: ChangeReason },
    DataRequested,
    DataReceived(DataReceived),
}

impl BindingEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            BindingEvent::Change { .. } => EventKind::Change,
            BindingEvent::DataRequested => EventKind::DataRequested,
            BindingEvent::DataReceived(_) => EventKind::DataReceived,
        }
    }
}

pub type EventHandler = Arc<dyn Fn(&BindingEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

#[derive(Default)]
pub(crate) struct EventHandlers {
    next_id: u64,
    handlers: Vec<(EventKind, HandlerId, EventHandler)>,
}

impl EventHandlers {
    pub(crate) fn attach(&mut self, kind: EventKind, handler: EventHandler) -> HandlerId {
        self.next_id += 1;
        let id = HandlerId(self.next_id);
        self.handlers.push((kind, id, handler));
        id
    }

    pub(crate) fn detach(&mut self, kind: EventKind, id: HandlerId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(handler_kind, handler_id, _)| !(*handler_kind == kind && *handler_id == id));
        before != self.handlers.len()
    }

    /// Handlers for `kind` in attach order. Callers invoke them after releasing the lock.
    pub(crate) fn snapshot(&self, kind: EventKind) -> Vec<EventHandler> {
        self.handlers
            .iter()
            .filter(|(handler_kind, _, _)| *handler_kind == kind)
            .map(|(_, _, handler)| Arc::clone(handler))
            .collect()
    }

    pub(crate) fn clear(&mut self) {
        self.handlers.clear();
    }
}

impl fmt::Debug for EventHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHandlers").field("count", &self.handlers.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn parses_known_event_names() {
        assert_eq!("dataReceived".parse::<EventKind>(), Ok(EventKind::DataReceived));
        for unsupported in ["filter", "DataStateChange", "Change"] {
            assert_eq!(
                unsupported.parse::<EventKind>(),
                Err(BindingError::UnsupportedEvent {
                    event: unsupported.into()
                })
            );
        }
    }

    #[test]
    fn detach_removes_only_the_given_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut handlers = EventHandlers::default();
        let counter = Arc::clone(&calls);
        let first = handlers.attach(
            EventKind::Change,
            Arc::new(move |_: &BindingEvent| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        handlers.attach(EventKind::Change, Arc::new(|_: &BindingEvent| {}));

        assert!(handlers.detach(EventKind::Change, first));
        assert!(!handlers.detach(EventKind::DataRequested, first));
        let remaining = handlers.snapshot(EventKind::Change);
        assert_eq!(remaining.len(), 1);
        remaining[0](&BindingEvent::DataRequested);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
