//! USB device abstraction
//!
//! Wraps a rusb device with its cached descriptor, reads the interface and
//! endpoint layout of the active configuration, and claims single
//! interfaces on demand.

use protocol::{EndpointType, is_boot_mouse};
use rusb::{Context, Device, DeviceDescriptor, DeviceHandle};
use std::sync::Arc;
use tracing::{debug, warn};

/// Linux Foundation vendor ID used by root hubs
const ROOT_HUB_VENDOR: u16 = 0x1d6b;

/// Hub device class
const HUB_CLASS: u8 = 0x09;

/// Endpoint of an interface in the active configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointSummary {
    pub address: u8,
    pub kind: EndpointType,
    pub max_packet_size: u16,
}

/// First alternate setting of an interface in the active configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceSummary {
    pub number: u8,
    pub class: u8,
    pub subclass: u8,
    pub protocol: u8,
    pub endpoints: Vec<EndpointSummary>,
}

impl InterfaceSummary {
    pub fn is_boot_mouse(&self) -> bool {
        is_boot_mouse(self.class, self.subclass, self.protocol)
    }
}

/// USB device wrapper with cached information
pub struct UsbDevice {
    device: Device<Context>,
    descriptor: DeviceDescriptor,
    /// Shared with the transfer worker while reads are outstanding
    handle: Option<Arc<DeviceHandle<Context>>>,
    claimed_interfaces: Vec<u8>,
}

impl UsbDevice {
    /// Create a new USB device wrapper
    ///
    /// Reads and caches the device descriptor.
    pub fn new(device: Device<Context>) -> Result<Self, rusb::Error> {
        let descriptor = device.device_descriptor()?;

        Ok(Self {
            device,
            descriptor,
            handle: None,
            claimed_interfaces: Vec::new(),
        })
    }

    pub fn bus_number(&self) -> u8 {
        self.device.bus_number()
    }

    pub fn device_address(&self) -> u8 {
        self.device.address()
    }

    /// (bus, address) key identifying the device while it stays plugged in
    pub fn location(&self) -> (u8, u8) {
        (self.bus_number(), self.device_address())
    }

    pub fn vendor_id(&self) -> u16 {
        self.descriptor.vendor_id()
    }

    pub fn product_id(&self) -> u16 {
        self.descriptor.product_id()
    }

    pub fn is_root_hub(&self) -> bool {
        self.vendor_id() == ROOT_HUB_VENDOR && self.descriptor.class_code() == HUB_CLASS
    }

    /// Interfaces of the active configuration, in ascending order
    pub fn interfaces(&self) -> Result<Vec<InterfaceSummary>, rusb::Error> {
        let config = self.device.active_config_descriptor()?;

        let mut interfaces: Vec<InterfaceSummary> = config
            .interfaces()
            .filter_map(|interface| interface.descriptors().next())
            .map(|desc| InterfaceSummary {
                number: desc.interface_number(),
                class: desc.class_code(),
                subclass: desc.sub_class_code(),
                protocol: desc.protocol_code(),
                endpoints: desc
                    .endpoint_descriptors()
                    .map(|ep| EndpointSummary {
                        address: ep.address(),
                        kind: map_transfer_type(ep.transfer_type()),
                        max_packet_size: ep.max_packet_size(),
                    })
                    .collect(),
            })
            .collect();

        interfaces.sort_by_key(|i| i.number);
        Ok(interfaces)
    }

    /// Product string, if the device can be opened to read it
    pub fn product_string(&self) -> Option<String> {
        let index = self.descriptor.product_string_index()?;
        match &self.handle {
            Some(handle) => handle.read_string_descriptor_ascii(index).ok(),
            None => self
                .device
                .open()
                .ok()
                .and_then(|handle| handle.read_string_descriptor_ascii(index).ok()),
        }
    }

    /// Open the device if needed and claim one interface
    ///
    /// A kernel driver bound to the interface is detached first.
    pub fn claim_interface(&mut self, interface: u8) -> Result<Arc<DeviceHandle<Context>>, rusb::Error> {
        let handle = match &self.handle {
            Some(handle) => handle.clone(),
            None => {
                let handle = Arc::new(self.device.open()?);
                debug!("Opened device {:03}:{:03}", self.bus_number(), self.device_address());
                self.handle = Some(handle.clone());
                handle
            }
        };

        if self.claimed_interfaces.contains(&interface) {
            return Ok(handle);
        }

        match handle.kernel_driver_active(interface) {
            Ok(true) => {
                debug!("Detaching kernel driver from interface {}", interface);
                if let Err(e) = handle.detach_kernel_driver(interface) {
                    warn!(
                        "Failed to detach kernel driver from interface {}: {}",
                        interface, e
                    );
                }
            }
            Ok(false) => {}
            Err(e) => {
                debug!(
                    "Could not check kernel driver status for interface {}: {}",
                    interface, e
                );
            }
        }

        handle.claim_interface(interface)?;
        debug!("Claimed interface {}", interface);
        self.claimed_interfaces.push(interface);
        Ok(handle)
    }

    /// Open handle, if any interface is claimed
    pub fn handle(&self) -> Option<Arc<DeviceHandle<Context>>> {
        self.handle.clone()
    }

    /// Release claimed interfaces and hand them back to the kernel
    pub fn close(&mut self) {
        if let Some(handle) = self.handle.take() {
            for interface in &self.claimed_interfaces {
                if let Err(e) = handle.release_interface(*interface) {
                    debug!("Failed to release interface {}: {}", interface, e);
                }

                if let Err(e) = handle.attach_kernel_driver(*interface) {
                    debug!(
                        "Could not reattach kernel driver to interface {}: {}",
                        interface, e
                    );
                }
            }
            self.claimed_interfaces.clear();

            debug!("Closed device {:03}:{:03}", self.bus_number(), self.device_address());
        }
    }
}

impl Drop for UsbDevice {
    fn drop(&mut self) {
        self.close();
    }
}

/// Map a rusb transfer type to the protocol endpoint type
fn map_transfer_type(kind: rusb::TransferType) -> EndpointType {
    match kind {
        rusb::TransferType::Control => EndpointType::Control,
        rusb::TransferType::Isochronous => EndpointType::Isochronous,
        rusb::TransferType::Bulk => EndpointType::Bulk,
        rusb::TransferType::Interrupt => EndpointType::Interrupt,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_transfer_type() {
        assert_eq!(map_transfer_type(rusb::TransferType::Control), EndpointType::Control);
        assert_eq!(map_transfer_type(rusb::TransferType::Bulk), EndpointType::Bulk);
        assert_eq!(
            map_transfer_type(rusb::TransferType::Interrupt),
            EndpointType::Interrupt
        );
    }

    #[test]
    fn test_interface_summary_boot_mouse() {
        let interface = InterfaceSummary {
            number: 0,
            class: 0x03,
            subclass: 0x01,
            protocol: 0x02,
            endpoints: vec![EndpointSummary {
                address: 0x81,
                kind: EndpointType::Interrupt,
                max_packet_size: 8,
            }],
        };
        assert!(interface.is_boot_mouse());

        let keyboard = InterfaceSummary {
            protocol: 0x01,
            ..interface
        };
        assert!(!keyboard.is_boot_mouse());
    }
}
