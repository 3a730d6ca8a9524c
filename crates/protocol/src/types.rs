//! USB type definitions
//!
//! Classification constants, endpoint descriptors as seen by a class driver,
//! and the outcomes a host stack reports when an interrupt read is submitted.

/// HID device class code
pub const HID_CLASS: u8 = 0x03;

/// Endpoint address bit selecting the IN (device to host) direction
pub const ENDPOINT_DIR_IN: u8 = 0x80;

/// HID subclass codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum HidSubclass {
    /// Boot interface subclass
    Boot = 0x01,
}

/// HID interface protocol codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum HidProtocol {
    /// Keyboard protocol
    Keyboard = 0x01,
    /// Mouse protocol
    Mouse = 0x02,
}

/// Check whether an interface triple names a boot-protocol HID mouse
pub fn is_boot_mouse(class: u8, subclass: u8, protocol: u8) -> bool {
    class == HID_CLASS
        && subclass == HidSubclass::Boot as u8
        && protocol == HidProtocol::Mouse as u8
}

/// Opaque reference to a device in the host's device table
///
/// The host owns the device; a class driver only keeps this handle while it
/// holds a claim on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceHandle(pub u32);

/// Opaque reference to an endpoint resolved by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EndpointHandle(pub u32);

/// USB endpoint transfer type (bits 0..1 of `bmAttributes`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointType {
    /// Control endpoint
    Control,
    /// Isochronous endpoint
    Isochronous,
    /// Bulk endpoint
    Bulk,
    /// Interrupt endpoint
    Interrupt,
}

impl EndpointType {
    /// Decode the transfer type from an endpoint descriptor's `bmAttributes`
    pub fn from_attributes(attributes: u8) -> Self {
        match attributes & 0x03 {
            0 => Self::Control,
            1 => Self::Isochronous,
            2 => Self::Bulk,
            _ => Self::Interrupt,
        }
    }
}

/// USB endpoint direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointDirection {
    /// Host to device
    Out,
    /// Device to host
    In,
}

impl EndpointDirection {
    /// Decode the direction from an endpoint address (bit 7)
    pub fn from_address(address: u8) -> Self {
        if address & ENDPOINT_DIR_IN != 0 {
            Self::In
        } else {
            Self::Out
        }
    }
}

/// Endpoint resolved by the host for a claimed interface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointInfo {
    /// Host-assigned handle
    pub handle: EndpointHandle,
    /// Endpoint address including the direction bit (e.g. 0x81)
    pub address: u8,
    /// Transfer type
    pub kind: EndpointType,
    /// Direction
    pub direction: EndpointDirection,
    /// Maximum packet size reported by the device
    pub max_packet_size: u16,
}

impl EndpointInfo {
    /// Length to request for the next read into a buffer of `capacity` bytes
    ///
    /// Devices may report packet sizes larger than the receive buffer; the
    /// request never exceeds the buffer.
    pub fn transfer_len(&self, capacity: usize) -> usize {
        usize::from(self.max_packet_size).min(capacity)
    }
}

/// Outcome of submitting a non-blocking interrupt read
///
/// A conforming host only ever answers a submission with [`Queued`],
/// [`Completed`] or [`QueueFull`]. The remaining variants exist because the
/// same status type is shared with other host operations.
///
/// [`Queued`]: TransferStatus::Queued
/// [`Completed`]: TransferStatus::Completed
/// [`QueueFull`]: TransferStatus::QueueFull
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    /// Transfer accepted, completion will be delivered later
    Queued,
    /// Transfer completed synchronously with success
    Completed,
    /// No transfer slot available right now
    QueueFull,
    /// Endpoint stalled
    Stalled,
    /// Device no longer present
    NoDevice,
    /// Any other host failure
    Failed,
}

impl TransferStatus {
    /// Whether a host is allowed to answer a submission with this status
    pub fn is_submission_outcome(&self) -> bool {
        matches!(self, Self::Queued | Self::Completed | Self::QueueFull)
    }

    /// Whether the transfer was accepted
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Queued | Self::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boot_mouse_triple() {
        assert!(is_boot_mouse(0x03, 0x01, 0x02));
        assert!(!is_boot_mouse(0x03, 0x01, 0x01)); // boot keyboard
        assert!(!is_boot_mouse(0x03, 0x00, 0x02)); // report protocol only
        assert!(!is_boot_mouse(0x08, 0x01, 0x02));
    }

    #[test]
    fn test_endpoint_decoding() {
        assert_eq!(EndpointType::from_attributes(0x03), EndpointType::Interrupt);
        assert_eq!(EndpointType::from_attributes(0x02), EndpointType::Bulk);
        // Upper bits carry sync/usage type and are ignored
        assert_eq!(EndpointType::from_attributes(0x0D), EndpointType::Isochronous);

        assert_eq!(EndpointDirection::from_address(0x81), EndpointDirection::In);
        assert_eq!(EndpointDirection::from_address(0x02), EndpointDirection::Out);
    }

    #[test]
    fn test_transfer_len_clamps_to_capacity() {
        let mut ep = EndpointInfo {
            handle: EndpointHandle(1),
            address: 0x81,
            kind: EndpointType::Interrupt,
            direction: EndpointDirection::In,
            max_packet_size: 8,
        };
        assert_eq!(ep.transfer_len(4), 4);

        ep.max_packet_size = 3;
        assert_eq!(ep.transfer_len(4), 3);
    }

    #[test]
    fn test_submission_outcomes() {
        assert!(TransferStatus::Queued.is_submission_outcome());
        assert!(TransferStatus::Completed.is_submission_outcome());
        assert!(TransferStatus::QueueFull.is_submission_outcome());
        assert!(!TransferStatus::Stalled.is_submission_outcome());
        assert!(!TransferStatus::QueueFull.is_accepted());
    }
}
