//! Mouse change notifications

use crate::report::{MouseButtons, MouseReport};

/// Kind of notification an observer can subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Every non-empty report, whether or not anything changed
    Update,
    /// Button mask changed
    Buttons,
    /// X value changed
    X,
    /// Y value changed
    Y,
    /// Wheel value changed
    Z,
}

impl EventKind {
    /// All kinds, in dispatch order
    pub const ALL: [EventKind; 5] = [
        EventKind::Update,
        EventKind::Buttons,
        EventKind::X,
        EventKind::Y,
        EventKind::Z,
    ];

    /// Dense index for slot tables
    pub fn index(self) -> usize {
        match self {
            EventKind::Update => 0,
            EventKind::Buttons => 1,
            EventKind::X => 2,
            EventKind::Y => 3,
            EventKind::Z => 4,
        }
    }
}

/// A single notification produced from a decoded report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseEvent {
    /// Composite update with all decoded fields
    Update(MouseReport),
    /// New button mask
    Buttons(MouseButtons),
    /// New X value
    X(i8),
    /// New Y value
    Y(i8),
    /// New wheel value
    Z(i8),
}

impl MouseEvent {
    /// The kind this event is delivered to
    pub fn kind(&self) -> EventKind {
        match self {
            MouseEvent::Update(_) => EventKind::Update,
            MouseEvent::Buttons(_) => EventKind::Buttons,
            MouseEvent::X(_) => EventKind::X,
            MouseEvent::Y(_) => EventKind::Y,
            MouseEvent::Z(_) => EventKind::Z,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_indices_are_dense() {
        for (i, kind) in EventKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }

    #[test]
    fn test_event_kind() {
        assert_eq!(MouseEvent::X(3).kind(), EventKind::X);
        assert_eq!(
            MouseEvent::Update(MouseReport::default()).kind(),
            EventKind::Update
        );
    }
}
