//! Host stack built on libusb
//!
//! [`RusbHost`] keeps a fixed-size device table filled from the libusb
//! device list, walks configuration descriptors for class drivers, claims
//! interfaces on endpoint resolution and forwards interrupt reads to the
//! transfer worker.

use super::device::{InterfaceSummary, UsbDevice};
use super::filter::DeviceFilter;
use super::worker::{ReadRequest, WorkerCommand, spawn_transfer_worker};
use crate::config::UsbSettings;
use common::{
    CompletionHandler, EnumerationMatcher, Error, HostLock, Result, TeardownHandler, UsbHost,
};
use protocol::{
    DeviceHandle, EndpointDirection, EndpointHandle, EndpointInfo, EndpointType, TransferStatus,
};
use rusb::{Context, UsbContext};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

struct Registration {
    interface: u8,
    name: String,
    teardown: TeardownHandler,
}

#[derive(Default)]
struct DeviceTable {
    slots: Vec<Option<UsbDevice>>,
    completions: HashMap<EndpointHandle, CompletionHandler>,
    registrations: HashMap<DeviceHandle, Registration>,
}

impl DeviceTable {
    fn get(&self, device: DeviceHandle) -> Option<&UsbDevice> {
        self.slots.get(device.0 as usize)?.as_ref()
    }

    fn get_mut(&mut self, device: DeviceHandle) -> Option<&mut UsbDevice> {
        self.slots.get_mut(device.0 as usize)?.as_mut()
    }

    fn contains(&self, location: (u8, u8)) -> bool {
        self.slots.iter().flatten().any(|d| d.location() == location)
    }
}

/// A device in the host table, for display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSummary {
    pub slot: usize,
    pub bus: u8,
    pub address: u8,
    pub vendor_id: u16,
    pub product_id: u16,
    pub product: Option<String>,
    pub boot_mouse: bool,
    /// Interface name registered by a class driver
    pub driver: Option<String>,
}

/// libusb-backed host stack
pub struct RusbHost {
    context: Context,
    filters: Vec<DeviceFilter>,
    max_devices: usize,
    read_timeout: Duration,
    lock: Mutex<()>,
    table: Mutex<DeviceTable>,
    commands: async_channel::Sender<WorkerCommand>,
}

impl RusbHost {
    /// Create the host and the receiving end of its submission queue
    pub fn new(
        settings: &UsbSettings,
        max_devices: usize,
    ) -> Result<(Self, async_channel::Receiver<WorkerCommand>)> {
        let filters = DeviceFilter::parse_all(&settings.filters)
            .map_err(|e| Error::Config(e.to_string()))?;
        let context = Context::new().map_err(usb_error)?;
        let (commands, receiver) = async_channel::bounded(settings.queue_depth.max(1));

        let table = DeviceTable {
            slots: std::iter::repeat_with(|| None).take(max_devices).collect(),
            ..Default::default()
        };

        let host = Self {
            context,
            filters,
            max_devices,
            read_timeout: settings.read_timeout(),
            lock: Mutex::new(()),
            table: Mutex::new(table),
            commands,
        };
        Ok((host, receiver))
    }

    /// Create the host, fill the device table and start the transfer worker
    pub fn start(settings: &UsbSettings, max_devices: usize) -> Result<(Arc<Self>, JoinHandle<()>)> {
        let (host, receiver) = Self::new(settings, max_devices)?;
        let host = Arc::new(host);
        host.refresh()?;

        let worker = spawn_transfer_worker(host.clone(), receiver)?;
        Ok((host, worker))
    }

    fn table(&self) -> MutexGuard<'_, DeviceTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    /// Synchronize the device table with the devices libusb sees
    ///
    /// Departed devices go through the teardown path; new devices take the
    /// lowest free slot. Root hubs and filtered devices are skipped.
    pub fn refresh(&self) -> Result<()> {
        let devices = self.context.devices().map_err(usb_error)?;
        let present: Vec<(u8, u8)> = devices
            .iter()
            .map(|d| (d.bus_number(), d.address()))
            .collect();

        let departed: Vec<DeviceHandle> = self
            .table()
            .slots
            .iter()
            .enumerate()
            .filter_map(|(slot, entry)| {
                let device = entry.as_ref()?;
                (!present.contains(&device.location())).then_some(DeviceHandle(slot as u32))
            })
            .collect();
        for device in departed {
            info!("Device in slot {} left", device.0);
            self.teardown(device);
        }

        let mut table = self.table();
        for device in devices.iter() {
            if table.contains((device.bus_number(), device.address())) {
                continue;
            }

            let usb_device = match UsbDevice::new(device) {
                Ok(d) => d,
                Err(e) => {
                    debug!("Failed to read device descriptor: {}", e);
                    continue;
                }
            };

            if usb_device.is_root_hub() {
                debug!(
                    "Skipping root hub: bus={}, addr={}",
                    usb_device.bus_number(),
                    usb_device.device_address()
                );
                continue;
            }

            if !Self::check_filter(usb_device.vendor_id(), usb_device.product_id(), &self.filters) {
                debug!(
                    "Device ignored by filter: vid={:#06x}, pid={:#06x}",
                    usb_device.vendor_id(),
                    usb_device.product_id()
                );
                continue;
            }

            let Some(slot) = table.slots.iter().position(Option::is_none) else {
                warn!(
                    "Device table full ({} slots), ignoring {:04x}:{:04x}",
                    self.max_devices,
                    usb_device.vendor_id(),
                    usb_device.product_id()
                );
                break;
            };

            debug!(
                "Added device {:04x}:{:04x} (bus={}, addr={}) in slot {}",
                usb_device.vendor_id(),
                usb_device.product_id(),
                usb_device.bus_number(),
                usb_device.device_address(),
                slot
            );
            table.slots[slot] = Some(usb_device);
        }

        Ok(())
    }

    /// Describe every device in the table
    pub fn describe_devices(&self) -> Vec<DeviceSummary> {
        let table = self.table();
        table
            .slots
            .iter()
            .enumerate()
            .filter_map(|(slot, entry)| {
                let device = entry.as_ref()?;
                let boot_mouse = device
                    .interfaces()
                    .map(|interfaces| interfaces.iter().any(InterfaceSummary::is_boot_mouse))
                    .unwrap_or(false);

                Some(DeviceSummary {
                    slot,
                    bus: device.bus_number(),
                    address: device.device_address(),
                    vendor_id: device.vendor_id(),
                    product_id: device.product_id(),
                    product: device.product_string(),
                    boot_mouse,
                    driver: table
                        .registrations
                        .get(&DeviceHandle(slot as u32))
                        .map(|r| format!("{} (interface {})", r.name, r.interface)),
                })
            })
            .collect()
    }

    /// Open handle of a device in the table
    pub fn open_handle(
        &self,
        device: DeviceHandle,
    ) -> Option<Arc<rusb::DeviceHandle<Context>>> {
        self.table().get(device)?.handle()
    }

    /// Release a device and run its driver's teardown entry point
    ///
    /// The teardown handler is invoked with the host lock held.
    pub fn teardown(&self, device: DeviceHandle) {
        let _guard = self.lock();

        let (registration, released) = {
            let mut table = self.table();
            table
                .completions
                .retain(|endpoint, _| endpoint_device(*endpoint) != device);
            let released = table
                .slots
                .get_mut(device.0 as usize)
                .and_then(Option::take);
            (table.registrations.remove(&device), released)
        };

        if let Some(registration) = registration {
            debug!(
                "Tearing down {} on device {} interface {}",
                registration.name, device.0, registration.interface
            );
            (registration.teardown)();
        }

        // Releases claimed interfaces and reattaches kernel drivers
        drop(released);
    }

    /// Ask the transfer worker to stop after the read in progress
    pub fn shutdown(&self) {
        if self.commands.try_send(WorkerCommand::Shutdown).is_err() {
            self.commands.close();
        }
    }

    /// Check if a VID/PID pair is allowed by the filters
    pub fn check_filter(vid: u16, pid: u16, filters: &[DeviceFilter]) -> bool {
        filters.is_empty() || filters.iter().any(|filter| filter.matches(vid, pid))
    }
}

fn endpoint_handle(device: DeviceHandle, address: u8) -> EndpointHandle {
    EndpointHandle((device.0 << 8) | u32::from(address))
}

fn endpoint_device(endpoint: EndpointHandle) -> DeviceHandle {
    DeviceHandle(endpoint.0 >> 8)
}

fn usb_error(e: rusb::Error) -> Error {
    Error::Usb(e.to_string())
}

impl UsbHost for RusbHost {
    fn max_devices(&self) -> usize {
        self.max_devices
    }

    fn list_devices(&self, max_count: usize) -> Vec<Option<DeviceHandle>> {
        self.table()
            .slots
            .iter()
            .take(max_count)
            .enumerate()
            .map(|(slot, entry)| entry.as_ref().map(|_| DeviceHandle(slot as u32)))
            .collect()
    }

    fn enumerate(&self, device: DeviceHandle, matcher: &mut dyn EnumerationMatcher) -> Result<()> {
        let (vendor_id, product_id, interfaces) = {
            let table = self.table();
            let usb_device = table
                .get(device)
                .ok_or(Error::NoDevice(device.0))?;
            (
                usb_device.vendor_id(),
                usb_device.product_id(),
                usb_device.interfaces().map_err(usb_error)?,
            )
        };

        matcher.set_vid_pid(vendor_id, product_id);
        for interface in &interfaces {
            if !matcher.parse_interface(
                interface.number,
                interface.class,
                interface.subclass,
                interface.protocol,
            ) {
                continue;
            }

            for endpoint in &interface.endpoints {
                matcher.use_endpoint(
                    interface.number,
                    endpoint.kind,
                    EndpointDirection::from_address(endpoint.address),
                );
            }
        }

        Ok(())
    }

    fn resolve_endpoint(
        &self,
        device: DeviceHandle,
        interface: u8,
        kind: EndpointType,
        direction: EndpointDirection,
    ) -> Option<EndpointInfo> {
        let mut table = self.table();
        let usb_device = table.get_mut(device)?;

        let interfaces = match usb_device.interfaces() {
            Ok(interfaces) => interfaces,
            Err(e) => {
                warn!("Failed to read configuration of device {}: {}", device.0, e);
                return None;
            }
        };
        let endpoint = interfaces
            .iter()
            .filter(|i| i.number == interface)
            .flat_map(|i| i.endpoints.iter())
            .find(|e| e.kind == kind && EndpointDirection::from_address(e.address) == direction)
            .copied()?;

        if let Err(e) = usb_device.claim_interface(interface) {
            warn!(
                "Failed to claim interface {} on device {}: {}",
                interface, device.0, e
            );
            return None;
        }

        Some(EndpointInfo {
            handle: endpoint_handle(device, endpoint.address),
            address: endpoint.address,
            kind,
            direction,
            max_packet_size: endpoint.max_packet_size,
        })
    }

    fn register_driver(
        &self,
        device: DeviceHandle,
        interface: u8,
        name: &str,
        teardown: TeardownHandler,
    ) {
        debug!(
            "Registered {} driver on device {} interface {}",
            name, device.0, interface
        );
        self.table().registrations.insert(
            device,
            Registration {
                interface,
                name: name.to_string(),
                teardown,
            },
        );
    }

    fn attach_completion(&self, endpoint: &EndpointInfo, handler: CompletionHandler) {
        self.table().completions.insert(endpoint.handle, handler);
    }

    fn submit_interrupt_read(
        &self,
        device: DeviceHandle,
        endpoint: &EndpointInfo,
        len: usize,
    ) -> TransferStatus {
        let Some(handler) = self.table().completions.get(&endpoint.handle).cloned() else {
            warn!("No completion handler on endpoint {:#x}, read not queued", endpoint.handle.0);
            return TransferStatus::QueueFull;
        };
        let request = ReadRequest {
            device,
            endpoint: endpoint.handle,
            address: endpoint.address,
            len,
            handler,
        };

        match self.commands.try_send(WorkerCommand::Read(request)) {
            Ok(()) => TransferStatus::Queued,
            Err(async_channel::TrySendError::Full(_)) => TransferStatus::QueueFull,
            Err(async_channel::TrySendError::Closed(_)) => {
                warn!("Transfer worker stopped, read not queued");
                TransferStatus::QueueFull
            }
        }
    }

    fn lock(&self) -> HostLock<'_> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
