//! Observer registry and notification dispatch
//!
//! One slot per [`EventKind`]. Subscribing replaces whatever the slot held.
//! Dispatch snapshots the slots and invokes handlers with no lock held, so a
//! handler may call back into the driver (including re-subscribing).

use protocol::{EventKind, MouseButtons, MouseEvent};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Handler receiving tagged events of one kind
pub type Handler = Arc<dyn Fn(MouseEvent) + Send + Sync>;

/// Composite handler: (buttons, x, y, wheel)
pub type UpdateHandler = Arc<dyn Fn(MouseButtons, i8, i8, i8) + Send + Sync>;

/// Button mask handler
pub type ButtonsHandler = Arc<dyn Fn(MouseButtons) + Send + Sync>;

/// Single axis handler (X, Y or wheel)
pub type AxisHandler = Arc<dyn Fn(i8) + Send + Sync>;

const SLOTS: usize = EventKind::ALL.len();

/// Registry of at most one handler per event kind
#[derive(Default)]
pub struct Observers {
    slots: Mutex<[Option<Handler>; SLOTS]>,
}

impl Observers {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, [Option<Handler>; SLOTS]> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Install a handler for `kind`, returning the one it replaced
    pub fn subscribe(&self, kind: EventKind, handler: Handler) -> Option<Handler> {
        self.slots()[kind.index()].replace(handler)
    }

    /// Remove the handler for `kind`
    pub fn unsubscribe(&self, kind: EventKind) -> Option<Handler> {
        self.slots()[kind.index()].take()
    }

    /// Replace the slot for `kind`; `None` clears it
    pub fn set(&self, kind: EventKind, handler: Option<Handler>) {
        self.slots()[kind.index()] = handler;
    }

    /// Whether a handler is installed for `kind`
    pub fn is_subscribed(&self, kind: EventKind) -> bool {
        self.slots()[kind.index()].is_some()
    }

    /// Remove every handler
    pub fn clear(&self) {
        *self.slots() = Default::default();
    }

    /// Deliver each event to the handler of its kind, if any
    ///
    /// Returns the number of handler invocations.
    pub fn dispatch(&self, events: &[MouseEvent]) -> usize {
        if events.is_empty() {
            return 0;
        }

        let snapshot = self.slots().clone();
        let mut invoked = 0;
        for event in events {
            if let Some(handler) = &snapshot[event.kind().index()] {
                handler(*event);
                invoked += 1;
            }
        }
        invoked
    }
}

/// Adapt a composite handler to the tagged form
pub fn update_handler(handler: UpdateHandler) -> Handler {
    Arc::new(move |event: MouseEvent| {
        if let MouseEvent::Update(report) = event {
            handler(report.buttons, report.x, report.y, report.wheel);
        }
    })
}

/// Adapt a button handler to the tagged form
pub fn buttons_handler(handler: ButtonsHandler) -> Handler {
    Arc::new(move |event: MouseEvent| {
        if let MouseEvent::Buttons(buttons) = event {
            handler(buttons);
        }
    })
}

/// Adapt an axis handler for `kind` (X, Y or Z) to the tagged form
pub fn axis_handler(kind: EventKind, handler: AxisHandler) -> Handler {
    Arc::new(move |event: MouseEvent| match (kind, event) {
        (EventKind::X, MouseEvent::X(v))
        | (EventKind::Y, MouseEvent::Y(v))
        | (EventKind::Z, MouseEvent::Z(v)) => handler(v),
        _ => {}
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::MouseReport;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, Handler) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        (
            count,
            Arc::new(move |_: MouseEvent| {
                c.fetch_add(1, Ordering::SeqCst);
            }),
        )
    }

    #[test]
    fn test_dispatch_skips_empty_slots() {
        let observers = Observers::new();
        let events = [MouseEvent::X(1), MouseEvent::Y(2)];

        assert_eq!(observers.dispatch(&events), 0);
    }

    #[test]
    fn test_dispatch_routes_by_kind() {
        let observers = Observers::new();
        let (x_count, x_handler) = counter();
        let (y_count, y_handler) = counter();
        observers.subscribe(EventKind::X, x_handler);
        observers.subscribe(EventKind::Y, y_handler);

        let invoked = observers.dispatch(&[MouseEvent::X(1), MouseEvent::X(2), MouseEvent::Z(3)]);

        assert_eq!(invoked, 2);
        assert_eq!(x_count.load(Ordering::SeqCst), 2);
        assert_eq!(y_count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_subscribe_replaces() {
        let observers = Observers::new();
        let (first, first_handler) = counter();
        let (second, second_handler) = counter();

        assert!(observers.subscribe(EventKind::Z, first_handler).is_none());
        assert!(observers.subscribe(EventKind::Z, second_handler).is_some());
        observers.dispatch(&[MouseEvent::Z(1)]);

        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsubscribe_and_clear() {
        let observers = Observers::new();
        let (_, handler) = counter();
        observers.subscribe(EventKind::Buttons, handler.clone());
        observers.subscribe(EventKind::Update, handler);

        assert!(observers.unsubscribe(EventKind::Buttons).is_some());
        assert!(!observers.is_subscribed(EventKind::Buttons));

        observers.clear();
        assert!(!observers.is_subscribed(EventKind::Update));
    }

    #[test]
    fn test_handler_may_resubscribe_during_dispatch() {
        let observers = Arc::new(Observers::new());
        let registry = observers.clone();
        observers.subscribe(
            EventKind::X,
            Arc::new(move |_: MouseEvent| {
                registry.unsubscribe(EventKind::X);
            }),
        );

        assert_eq!(observers.dispatch(&[MouseEvent::X(1)]), 1);
        assert!(!observers.is_subscribed(EventKind::X));
    }

    #[test]
    fn test_typed_adapters() {
        let seen = Arc::new(Mutex::new(Vec::new()));

        let s = seen.clone();
        let update = update_handler(Arc::new(move |b: MouseButtons, x: i8, y: i8, z: i8| {
            s.lock().unwrap().push(format!("update {} {} {} {}", b.bits(), x, y, z));
        }));
        let s = seen.clone();
        let axis = axis_handler(
            EventKind::Y,
            Arc::new(move |v: i8| s.lock().unwrap().push(format!("y {}", v))),
        );

        let report = MouseReport::parse(&[0x01, 2, 3, 4]).unwrap();
        update(MouseEvent::Update(report));
        axis(MouseEvent::X(9)); // wrong kind, ignored
        axis(MouseEvent::Y(3));

        assert_eq!(*seen.lock().unwrap(), vec!["update 1 2 3 4", "y 3"]);
    }
}
