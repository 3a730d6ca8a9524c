//! Driver state: claimed handles, report buffer and last decoded values

use super::matcher::MouseMatcher;
use protocol::{BOOT_MOUSE_REPORT_LEN, DeviceHandle, EndpointInfo, MouseEvent, MouseReport};

/// Capacity of the raw report buffer
pub const REPORT_CAPACITY: usize = 4;

const _: () = assert!(REPORT_CAPACITY >= BOOT_MOUSE_REPORT_LEN);

/// Fixed-size buffer holding the latest interrupt payload
///
/// Each completion overwrites the buffer in place. A transfer shorter than
/// the buffer leaves the trailing bytes of the previous one untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportBuffer {
    bytes: [u8; REPORT_CAPACITY],
    len: usize,
}

impl ReportBuffer {
    /// Buffer capacity in bytes
    pub const fn capacity(&self) -> usize {
        REPORT_CAPACITY
    }

    /// Copy a completed transfer into the buffer, returning the bytes kept
    pub fn fill(&mut self, data: &[u8]) -> usize {
        let len = data.len().min(REPORT_CAPACITY);
        self.bytes[..len].copy_from_slice(&data[..len]);
        self.len = len;
        len
    }

    /// Raw buffer contents
    pub fn as_bytes(&self) -> &[u8; REPORT_CAPACITY] {
        &self.bytes
    }

    /// Bytes stored by the last fill
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the last fill stored nothing
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Decode the whole buffer as a boot mouse report
    pub fn decode(&self) -> MouseReport {
        // Cannot fail: the buffer always holds a full boot report
        MouseReport::parse(&self.bytes).unwrap_or_default()
    }
}

/// Notifications for moving from `previous` to `next`
///
/// The composite update is always first; each single-value notification is
/// present only when its field changed.
pub fn notifications(previous: &MouseReport, next: &MouseReport) -> Vec<MouseEvent> {
    let mut events = Vec::with_capacity(5);
    events.push(MouseEvent::Update(*next));

    if previous.buttons != next.buttons {
        events.push(MouseEvent::Buttons(next.buttons));
    }
    if previous.x != next.x {
        events.push(MouseEvent::X(next.x));
    }
    if previous.y != next.y {
        events.push(MouseEvent::Y(next.y));
    }
    if previous.wheel != next.wheel {
        events.push(MouseEvent::Z(next.wheel));
    }

    events
}

/// Connection lifecycle as seen by callers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// Nothing claimed
    #[default]
    Disconnected,
    /// Endpoint claimed but no transfer running (the host refused a submission)
    Claimed,
    /// Endpoint claimed and a transfer loop is running
    Streaming,
}

/// Transfer counters since the last reset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferStats {
    /// Completions delivered while claimed
    pub completed: u64,
    /// Completions that carried no data
    pub empty: u64,
    /// Reads submitted to the host
    pub submitted: u64,
}

/// Device, interface and endpoint held while connected
///
/// The three are set and cleared together. `generation` is unique per claim
/// for the lifetime of the driver, so reads submitted for an earlier claim
/// can be told apart even when the endpoint handle is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Claim {
    pub device: DeviceHandle,
    pub interface: u8,
    pub endpoint: EndpointInfo,
    pub generation: u64,
}

impl Claim {
    /// Length of the next read: the reported packet size, clamped to the buffer
    pub fn transfer_len(&self) -> usize {
        self.endpoint.transfer_len(REPORT_CAPACITY)
    }
}

#[derive(Debug, Default)]
pub(crate) struct DriverState {
    pub(crate) matcher: MouseMatcher,
    pub(crate) claim: Option<Claim>,
    pub(crate) status: ConnectionStatus,
    /// A read is outstanding at the host
    pub(crate) in_flight: bool,
    pub(crate) report: ReportBuffer,
    /// Last dispatched values, used for change detection only
    pub(crate) last: MouseReport,
    pub(crate) stats: TransferStats,
}

impl DriverState {
    /// Release the claim ahead of a new device scan
    ///
    /// Decoded values and counters survive so a reconnect does not re-fire
    /// every single-value notification.
    pub(crate) fn begin_scan(&mut self) {
        self.matcher.reset();
        self.claim = None;
        self.status = ConnectionStatus::Disconnected;
        self.in_flight = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::MouseButtons;

    #[test]
    fn test_fill_clamps_to_capacity() {
        let mut buffer = ReportBuffer::default();

        assert_eq!(buffer.fill(&[1, 2, 3, 4, 5, 6, 7, 8]), 4);
        assert_eq!(buffer.as_bytes(), &[1, 2, 3, 4]);
        assert_eq!(buffer.len(), buffer.capacity());
    }

    #[test]
    fn test_short_fill_keeps_trailing_bytes() {
        let mut buffer = ReportBuffer::default();
        buffer.fill(&[0x01, 5, 6, 7]);
        buffer.fill(&[0x02, 9, 9]);

        assert_eq!(buffer.as_bytes(), &[0x02, 9, 9, 7]);
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.decode().wheel, 7);
    }

    #[test]
    fn test_notifications_composite_always_first() {
        let state = MouseReport::default();
        let events = notifications(&state, &state);
        assert_eq!(events, vec![MouseEvent::Update(state)]);
    }

    #[test]
    fn test_notifications_only_changed_fields() {
        let previous = MouseReport::parse(&[0x01, 1, 2, 3]).unwrap();
        let next = MouseReport::parse(&[0x01, 4, 2, 3]).unwrap();

        let events = notifications(&previous, &next);
        assert_eq!(events, vec![MouseEvent::Update(next), MouseEvent::X(4)]);
    }

    #[test]
    fn test_notifications_all_fields() {
        let previous = MouseReport::default();
        let next = MouseReport::parse(&[0x03, 1, 0xFF, 1]).unwrap();

        let events = notifications(&previous, &next);
        assert_eq!(
            events,
            vec![
                MouseEvent::Update(next),
                MouseEvent::Buttons(MouseButtons::LEFT | MouseButtons::RIGHT),
                MouseEvent::X(1),
                MouseEvent::Y(-1),
                MouseEvent::Z(1),
            ]
        );
    }

    #[test]
    fn test_begin_scan_keeps_decoded_state() {
        let mut state = DriverState {
            status: ConnectionStatus::Claimed,
            in_flight: true,
            last: MouseReport::parse(&[0, 9, 9, 9]).unwrap(),
            ..Default::default()
        };

        state.begin_scan();

        assert_eq!(state.status, ConnectionStatus::Disconnected);
        assert!(!state.in_flight);
        assert!(state.claim.is_none());
        assert_eq!(state.last.x, 9);
    }
}
