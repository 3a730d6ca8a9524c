//! Boot mouse interface and endpoint matching
//!
//! Invoked by the host while it walks a device's descriptors. The first
//! boot-protocol mouse interface wins; every later interface is refused even
//! if it would match, so at most one interface is claimed per device.

use common::EnumerationMatcher;
use protocol::{EndpointDirection, EndpointType, is_boot_mouse};
use tracing::{debug, trace};

/// Matching state for one enumeration pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MouseMatcher {
    vendor_id: u16,
    product_id: u16,
    /// Matched interface number, `None` until an interface matches
    interface: Option<u8>,
    /// Set once the matched interface offered an interrupt IN endpoint
    confirmed: bool,
}

impl MouseMatcher {
    /// Create a matcher that has not matched anything
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget any match, ready for another device
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Vendor ID of the device being enumerated
    pub fn vendor_id(&self) -> u16 {
        self.vendor_id
    }

    /// Product ID of the device being enumerated
    pub fn product_id(&self) -> u16 {
        self.product_id
    }

    /// Matched interface number
    pub fn interface(&self) -> Option<u8> {
        self.interface
    }

    /// Matched interface as a signed index, -1 while unmatched
    pub fn interface_index(&self) -> i16 {
        self.interface.map_or(-1, i16::from)
    }

    /// Whether the matched interface has a usable interrupt IN endpoint
    pub fn is_confirmed(&self) -> bool {
        self.confirmed
    }

    /// Accept the interface if it is the first boot mouse interface seen
    pub fn match_interface(&mut self, interface: u8, class: u8, subclass: u8, protocol: u8) -> bool {
        if self.interface.is_some() || !is_boot_mouse(class, subclass, protocol) {
            trace!(
                "Skipping interface {} ({:#04x}/{:#04x}/{:#04x})",
                interface, class, subclass, protocol
            );
            return false;
        }

        debug!("Matched boot mouse interface {}", interface);
        self.interface = Some(interface);
        true
    }

    /// Accept the endpoint if it is an interrupt IN endpoint of the matched interface
    pub fn match_endpoint(
        &mut self,
        interface: u8,
        kind: EndpointType,
        direction: EndpointDirection,
    ) -> bool {
        if self.interface != Some(interface)
            || kind != EndpointType::Interrupt
            || direction != EndpointDirection::In
        {
            return false;
        }

        debug!("Interface {} has an interrupt IN endpoint", interface);
        self.confirmed = true;
        true
    }
}

impl EnumerationMatcher for MouseMatcher {
    fn set_vid_pid(&mut self, vendor_id: u16, product_id: u16) {
        // Any vendor's boot mouse is accepted, the IDs are only logged
        trace!("Enumerating {:04x}:{:04x}", vendor_id, product_id);
        self.vendor_id = vendor_id;
        self.product_id = product_id;
    }

    fn parse_interface(&mut self, interface: u8, class: u8, subclass: u8, protocol: u8) -> bool {
        self.match_interface(interface, class, subclass, protocol)
    }

    fn use_endpoint(
        &mut self,
        interface: u8,
        kind: EndpointType,
        direction: EndpointDirection,
    ) -> bool {
        self.match_endpoint(interface, kind, direction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::{HID_CLASS, HidProtocol, HidSubclass};

    const BOOT: u8 = HidSubclass::Boot as u8;
    const MOUSE: u8 = HidProtocol::Mouse as u8;

    #[test]
    fn test_initial_state() {
        let matcher = MouseMatcher::new();
        assert_eq!(matcher.interface(), None);
        assert_eq!(matcher.interface_index(), -1);
        assert!(!matcher.is_confirmed());
    }

    #[test]
    fn test_first_matching_interface_wins() {
        let mut matcher = MouseMatcher::new();

        assert!(!matcher.match_interface(0, HID_CLASS, BOOT, HidProtocol::Keyboard as u8));
        assert!(matcher.match_interface(1, HID_CLASS, BOOT, MOUSE));
        assert!(!matcher.match_interface(2, HID_CLASS, BOOT, MOUSE));

        assert_eq!(matcher.interface(), Some(1));
        assert_eq!(matcher.interface_index(), 1);
    }

    #[test]
    fn test_endpoint_must_belong_to_matched_interface() {
        let mut matcher = MouseMatcher::new();
        assert!(!matcher.match_endpoint(0, EndpointType::Interrupt, EndpointDirection::In));

        matcher.match_interface(1, HID_CLASS, BOOT, MOUSE);
        assert!(!matcher.match_endpoint(0, EndpointType::Interrupt, EndpointDirection::In));
        assert!(!matcher.is_confirmed());

        assert!(matcher.match_endpoint(1, EndpointType::Interrupt, EndpointDirection::In));
        assert!(matcher.is_confirmed());
    }

    #[test]
    fn test_endpoint_type_and_direction() {
        let mut matcher = MouseMatcher::new();
        matcher.match_interface(0, HID_CLASS, BOOT, MOUSE);

        assert!(!matcher.match_endpoint(0, EndpointType::Interrupt, EndpointDirection::Out));
        assert!(!matcher.match_endpoint(0, EndpointType::Bulk, EndpointDirection::In));
        assert!(!matcher.is_confirmed());
    }

    #[test]
    fn test_vid_pid_recorded() {
        let mut matcher = MouseMatcher::new();
        matcher.set_vid_pid(0x046d, 0xc077);

        assert_eq!(matcher.vendor_id(), 0x046d);
        assert_eq!(matcher.product_id(), 0xc077);
        assert_eq!(matcher.interface(), None);
    }

    #[test]
    fn test_reset() {
        let mut matcher = MouseMatcher::new();
        matcher.match_interface(0, HID_CLASS, BOOT, MOUSE);
        matcher.match_endpoint(0, EndpointType::Interrupt, EndpointDirection::In);

        matcher.reset();
        assert_eq!(matcher, MouseMatcher::new());
        assert!(matcher.match_interface(3, HID_CLASS, BOOT, MOUSE));
    }
}

/// Property-based tests using proptest
#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    /// Interface triples biased towards HID so matches actually occur
    fn interface_strategy() -> impl Strategy<Value = (u8, u8, u8)> {
        (
            prop_oneof![Just(0x03u8), any::<u8>()],
            prop_oneof![Just(0x01u8), 0u8..3],
            prop_oneof![Just(0x02u8), 0u8..3],
        )
    }

    proptest! {
        #[test]
        fn prop_at_most_one_interface_matched(
            interfaces in proptest::collection::vec(interface_strategy(), 0..16)
        ) {
            let mut matcher = MouseMatcher::new();
            let mut accepted = Vec::new();

            for (number, &(class, subclass, protocol)) in interfaces.iter().enumerate() {
                if matcher.match_interface(number as u8, class, subclass, protocol) {
                    accepted.push(number as u8);
                }
            }

            let first = interfaces
                .iter()
                .position(|&(c, s, p)| is_boot_mouse(c, s, p))
                .map(|i| i as u8);

            prop_assert!(accepted.len() <= 1);
            prop_assert_eq!(accepted.first().copied(), first);
            prop_assert_eq!(matcher.interface(), first);
        }
    }
}
