//! Test utilities for usb-host-mouse
//!
//! Provides a scriptable host stack and helper functions for testing across
//! crates.
//!
//! # Example
//!
//! ```
//! use common::UsbHost;
//! use common::test_utils::{MockHost, boot_mouse_device};
//!
//! let host = MockHost::with_devices(vec![boot_mouse_device(8)]);
//! let slots = host.list_devices(host.max_devices());
//! assert!(slots[0].is_some());
//! assert!(slots[1].is_none());
//! ```

use crate::host::{
    CompletionHandler, EnumerationMatcher, HostLock, MAX_DEVICE_CONNECTED, TeardownHandler,
    UsbHost,
};
use protocol::{
    DeviceHandle, EndpointDirection, EndpointHandle, EndpointInfo, EndpointType, HID_CLASS,
    HidProtocol, HidSubclass, TransferStatus,
};
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Default test timeout (5 seconds)
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Endpoint of a mock interface
#[derive(Debug, Clone)]
pub struct MockEndpoint {
    /// Endpoint address including the direction bit
    pub address: u8,
    /// Transfer type
    pub kind: EndpointType,
    /// Reported maximum packet size
    pub max_packet_size: u16,
}

/// Interface of a mock device
#[derive(Debug, Clone)]
pub struct MockInterface {
    pub number: u8,
    pub class: u8,
    pub subclass: u8,
    pub protocol: u8,
    pub endpoints: Vec<MockEndpoint>,
}

/// Device in the mock host's table
#[derive(Debug, Clone)]
pub struct MockDevice {
    pub vendor_id: u16,
    pub product_id: u16,
    pub interfaces: Vec<MockInterface>,
    /// Make `enumerate` fail for this device
    pub fail_enumeration: bool,
    /// Make `resolve_endpoint` return nothing for this device
    pub unresolvable: bool,
}

/// Create an interface with the given class triple and a single interrupt IN endpoint
pub fn interrupt_interface(
    number: u8,
    class: u8,
    subclass: u8,
    protocol: u8,
    max_packet_size: u16,
) -> MockInterface {
    MockInterface {
        number,
        class,
        subclass,
        protocol,
        endpoints: vec![MockEndpoint {
            address: 0x81 + number,
            kind: EndpointType::Interrupt,
            max_packet_size,
        }],
    }
}

/// Create a boot-protocol mouse on interface 0
pub fn boot_mouse_device(max_packet_size: u16) -> MockDevice {
    MockDevice {
        vendor_id: 0x046d,
        product_id: 0xc077,
        interfaces: vec![interrupt_interface(
            0,
            HID_CLASS,
            HidSubclass::Boot as u8,
            HidProtocol::Mouse as u8,
            max_packet_size,
        )],
        fail_enumeration: false,
        unresolvable: false,
    }
}

/// Create a boot-protocol keyboard on interface 0
pub fn boot_keyboard_device() -> MockDevice {
    MockDevice {
        vendor_id: 0x413c,
        product_id: 0x2113,
        interfaces: vec![interrupt_interface(
            0,
            HID_CLASS,
            HidSubclass::Boot as u8,
            HidProtocol::Keyboard as u8,
            8,
        )],
        fail_enumeration: false,
        unresolvable: false,
    }
}

/// Create a mass storage device with bulk endpoints only
pub fn mass_storage_device() -> MockDevice {
    MockDevice {
        vendor_id: 0x0781,
        product_id: 0x5581,
        interfaces: vec![MockInterface {
            number: 0,
            class: 0x08,
            subclass: 0x06,
            protocol: 0x50,
            endpoints: vec![
                MockEndpoint {
                    address: 0x81,
                    kind: EndpointType::Bulk,
                    max_packet_size: 512,
                },
                MockEndpoint {
                    address: 0x02,
                    kind: EndpointType::Bulk,
                    max_packet_size: 512,
                },
            ],
        }],
        fail_enumeration: false,
        unresolvable: false,
    }
}

/// A read submitted to the mock host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Submission {
    pub device: DeviceHandle,
    pub endpoint: EndpointHandle,
    pub len: usize,
}

/// A queued read waiting for the test to complete it
struct PendingRead {
    endpoint: EndpointHandle,
    handler: CompletionHandler,
}

struct Registration {
    interface: u8,
    name: String,
    teardown: TeardownHandler,
}

#[derive(Default)]
struct MockHostState {
    slots: Vec<Option<MockDevice>>,
    outcomes: VecDeque<TransferStatus>,
    submissions: Vec<Submission>,
    pending: VecDeque<PendingRead>,
    completions: HashMap<EndpointHandle, CompletionHandler>,
    registrations: HashMap<DeviceHandle, Registration>,
    enumerated: Vec<DeviceHandle>,
    interfaces_offered: Vec<(DeviceHandle, u8)>,
}

/// Scriptable in-memory host stack
///
/// Devices live in numbered slots; the slot index is the device handle.
/// Submissions are recorded and answered from a script (default
/// [`TransferStatus::Queued`]). Nothing completes on its own: tests deliver
/// completions explicitly with [`MockHost::complete`] or
/// [`MockHost::complete_last`], from whichever thread they like. Reads on
/// one endpoint complete in submission order, each through the handler
/// attached when it was submitted.
pub struct MockHost {
    max_devices: usize,
    lock: Mutex<()>,
    state: Mutex<MockHostState>,
}

impl MockHost {
    /// Create an empty host with the default table size
    pub fn new() -> Self {
        Self::with_capacity(MAX_DEVICE_CONNECTED)
    }

    /// Create an empty host with `max_devices` slots
    pub fn with_capacity(max_devices: usize) -> Self {
        let state = MockHostState {
            slots: vec![None; max_devices],
            ..Default::default()
        };

        Self {
            max_devices,
            lock: Mutex::new(()),
            state: Mutex::new(state),
        }
    }

    /// Create a host with devices in the first slots
    pub fn with_devices(devices: Vec<MockDevice>) -> Self {
        let host = Self::with_capacity(MAX_DEVICE_CONNECTED.max(devices.len()));
        for (slot, device) in devices.into_iter().enumerate() {
            host.insert(slot, device);
        }
        host
    }

    fn state(&self) -> MutexGuard<'_, MockHostState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Place a device in a slot
    pub fn insert(&self, slot: usize, device: MockDevice) {
        let mut state = self.state();
        if slot >= state.slots.len() {
            state.slots.resize(slot + 1, None);
        }
        state.slots[slot] = Some(device);
    }

    /// Queue the outcome of the next submission
    pub fn push_outcome(&self, status: TransferStatus) {
        self.state().outcomes.push_back(status);
    }

    /// All submissions so far, oldest first
    pub fn submissions(&self) -> Vec<Submission> {
        self.state().submissions.clone()
    }

    /// Number of submissions so far
    pub fn submission_count(&self) -> usize {
        self.state().submissions.len()
    }

    /// Devices `enumerate` was called for, in call order
    pub fn enumerated(&self) -> Vec<DeviceHandle> {
        self.state().enumerated.clone()
    }

    /// Interfaces offered to matchers, in call order
    pub fn interfaces_offered(&self) -> Vec<(DeviceHandle, u8)> {
        self.state().interfaces_offered.clone()
    }

    /// Interface number and name a driver registered for `device`
    pub fn registration(&self, device: DeviceHandle) -> Option<(u8, String)> {
        self.state()
            .registrations
            .get(&device)
            .map(|r| (r.interface, r.name.clone()))
    }

    /// Whether a completion handler is attached to `endpoint`
    pub fn has_completion(&self, endpoint: EndpointHandle) -> bool {
        self.state().completions.contains_key(&endpoint)
    }

    /// Reads queued and not yet completed
    pub fn pending_count(&self) -> usize {
        self.state().pending.len()
    }

    /// Complete the oldest queued read on `endpoint`
    ///
    /// The handler runs without any mock lock held. Returns false if no read
    /// is queued on the endpoint.
    pub fn complete(&self, endpoint: EndpointHandle, data: &[u8]) -> bool {
        let read = {
            let mut state = self.state();
            let index = state.pending.iter().position(|r| r.endpoint == endpoint);
            index.and_then(|i| state.pending.remove(i))
        };
        match read {
            Some(read) => {
                (read.handler)(data);
                true
            }
            None => false,
        }
    }

    /// Deliver a completed read for the most recent submission
    pub fn complete_last(&self, data: &[u8]) -> bool {
        let last = self.state().submissions.last().copied();
        match last {
            Some(submission) => self.complete(submission.endpoint, data),
            None => false,
        }
    }

    /// Remove the device in `slot` and run the host teardown path
    ///
    /// The registered teardown handler is invoked with the host lock held,
    /// as a real host does from its processing thread.
    pub fn disconnect(&self, slot: usize) {
        let device = DeviceHandle(slot as u32);
        let _guard = self.lock();

        let registration = {
            let mut state = self.state();
            if let Some(entry) = state.slots.get_mut(slot) {
                *entry = None;
            }
            state
                .completions
                .retain(|endpoint, _| endpoint.0 >> 8 != device.0);
            state.pending.retain(|read| read.endpoint.0 >> 8 != device.0);
            state.registrations.remove(&device)
        };

        if let Some(registration) = registration {
            (registration.teardown)();
        }
    }

    fn endpoint_handle(device: DeviceHandle, address: u8) -> EndpointHandle {
        EndpointHandle((device.0 << 8) | u32::from(address))
    }
}

impl Default for MockHost {
    fn default() -> Self {
        Self::new()
    }
}

impl UsbHost for MockHost {
    fn max_devices(&self) -> usize {
        self.max_devices
    }

    fn list_devices(&self, max_count: usize) -> Vec<Option<DeviceHandle>> {
        self.state()
            .slots
            .iter()
            .take(max_count)
            .enumerate()
            .map(|(slot, device)| device.as_ref().map(|_| DeviceHandle(slot as u32)))
            .collect()
    }

    fn enumerate(
        &self,
        device: DeviceHandle,
        matcher: &mut dyn EnumerationMatcher,
    ) -> crate::Result<()> {
        let snapshot = {
            let mut state = self.state();
            state.enumerated.push(device);
            state.slots.get(device.0 as usize).cloned().flatten()
        };

        let snapshot = snapshot.ok_or(crate::Error::NoDevice(device.0))?;
        if snapshot.fail_enumeration {
            return Err(crate::Error::Usb(format!(
                "Enumeration of device {} failed",
                device.0
            )));
        }

        matcher.set_vid_pid(snapshot.vendor_id, snapshot.product_id);
        for interface in &snapshot.interfaces {
            self.state()
                .interfaces_offered
                .push((device, interface.number));

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
        let state = self.state();
        let snapshot = state.slots.get(device.0 as usize)?.as_ref()?;
        if snapshot.unresolvable {
            return None;
        }

        snapshot
            .interfaces
            .iter()
            .filter(|i| i.number == interface)
            .flat_map(|i| i.endpoints.iter())
            .find(|e| e.kind == kind && EndpointDirection::from_address(e.address) == direction)
            .map(|e| EndpointInfo {
                handle: Self::endpoint_handle(device, e.address),
                address: e.address,
                kind,
                direction,
                max_packet_size: e.max_packet_size,
            })
    }

    fn register_driver(
        &self,
        device: DeviceHandle,
        interface: u8,
        name: &str,
        teardown: TeardownHandler,
    ) {
        self.state().registrations.insert(
            device,
            Registration {
                interface,
                name: name.to_string(),
                teardown,
            },
        );
    }

    fn attach_completion(&self, endpoint: &EndpointInfo, handler: CompletionHandler) {
        self.state().completions.insert(endpoint.handle, handler);
    }

    fn submit_interrupt_read(
        &self,
        device: DeviceHandle,
        endpoint: &EndpointInfo,
        len: usize,
    ) -> TransferStatus {
        let mut state = self.state();
        let present = matches!(state.slots.get(device.0 as usize), Some(Some(_)));
        if !present {
            return TransferStatus::NoDevice;
        }

        state.submissions.push(Submission {
            device,
            endpoint: endpoint.handle,
            len,
        });
        let status = state.outcomes.pop_front().unwrap_or(TransferStatus::Queued);

        let handler = state.completions.get(&endpoint.handle).cloned();
        if let (TransferStatus::Queued | TransferStatus::Completed, Some(handler)) =
            (status, handler)
        {
            state.pending.push_back(PendingRead {
                endpoint: endpoint.handle,
                handler,
            });
        }
        status
    }

    fn lock(&self) -> HostLock<'_> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Timeout wrapper for async tests
///
/// Wraps an async operation with a timeout to prevent tests from hanging.
pub async fn with_timeout<T, F>(duration: Duration, future: F) -> Result<T, TimeoutError>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(duration, future)
        .await
        .map_err(|_| TimeoutError { duration })
}

/// Error returned when a test times out
#[derive(Debug)]
pub struct TimeoutError {
    /// The timeout duration that was exceeded
    pub duration: Duration,
}

impl std::fmt::Display for TimeoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Test timed out after {:?}", self.duration)
    }
}

impl std::error::Error for TimeoutError {}
