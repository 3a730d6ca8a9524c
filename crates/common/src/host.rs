//! Host stack contract consumed by USB class drivers
//!
//! A host stack owns the device table, drives enumeration, resolves and
//! claims endpoints, and runs interrupt transfers on its own thread. Class
//! drivers see it only through [`UsbHost`], which keeps them testable
//! against [`crate::test_utils::MockHost`].
//!
//! Threading: completion and teardown handlers are invoked from the host's
//! processing thread. Teardown handlers are invoked with the host lock held,
//! so a driver that takes the host lock and then its own state lock never
//! deadlocks against teardown.

use protocol::{DeviceHandle, EndpointDirection, EndpointInfo, EndpointType, TransferStatus};
use std::sync::{Arc, MutexGuard};

/// Default bound on the host device table
pub const MAX_DEVICE_CONNECTED: usize = 5;

/// Called by the host with the bytes of one completed interrupt read
///
/// The slice length is the number of bytes actually transferred and may be
/// zero when the transfer completed without data.
pub type CompletionHandler = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// Called by the host when a registered device goes away
pub type TeardownHandler = Arc<dyn Fn() + Send + Sync>;

/// Scoped exclusive host lock
///
/// Serializes driver registration against the host's teardown path.
pub type HostLock<'a> = MutexGuard<'a, ()>;

/// Callbacks a class driver hands to [`UsbHost::enumerate`]
///
/// The host presents interfaces in ascending order and, for every interface
/// the driver accepts, that interface's endpoints in index order.
pub trait EnumerationMatcher {
    /// Vendor/product of the device being enumerated
    fn set_vid_pid(&mut self, _vendor_id: u16, _product_id: u16) {}

    /// Return true if the interface should be parsed (and later claimed)
    fn parse_interface(&mut self, interface: u8, class: u8, subclass: u8, protocol: u8) -> bool;

    /// Return true if the endpoint will be used by the driver
    fn use_endpoint(&mut self, interface: u8, kind: EndpointType, direction: EndpointDirection)
    -> bool;
}

/// Host stack operations used by class drivers
pub trait UsbHost: Send + Sync {
    /// Number of slots in the device table
    fn max_devices(&self) -> usize {
        MAX_DEVICE_CONNECTED
    }

    /// Snapshot of the device table, one entry per slot up to `max_count`
    fn list_devices(&self, max_count: usize) -> Vec<Option<DeviceHandle>>;

    /// Run interface/endpoint matching for one device
    fn enumerate(
        &self,
        device: DeviceHandle,
        matcher: &mut dyn EnumerationMatcher,
    ) -> crate::Result<()>;

    /// Find and claim an endpoint of a matched interface
    fn resolve_endpoint(
        &self,
        device: DeviceHandle,
        interface: u8,
        kind: EndpointType,
        direction: EndpointDirection,
    ) -> Option<EndpointInfo>;

    /// Name the interface and register the driver's teardown entry point
    fn register_driver(
        &self,
        device: DeviceHandle,
        interface: u8,
        name: &str,
        teardown: TeardownHandler,
    );

    /// Attach the handler invoked for reads later submitted on `endpoint`
    fn attach_completion(&self, endpoint: &EndpointInfo, handler: CompletionHandler);

    /// Submit a non-blocking interrupt read of `len` bytes
    ///
    /// The read completes through the handler attached when it was
    /// submitted, even if a newer handler has been attached since.
    fn submit_interrupt_read(
        &self,
        device: DeviceHandle,
        endpoint: &EndpointInfo,
        len: usize,
    ) -> TransferStatus;

    /// Acquire the host lock shared with the teardown path
    fn lock(&self) -> HostLock<'_>;
}
