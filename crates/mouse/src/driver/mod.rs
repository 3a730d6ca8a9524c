//! Boot-protocol HID mouse class driver
//!
//! [`MouseDriver`] finds the first boot mouse in the host's device table,
//! claims its interrupt IN endpoint and keeps exactly one interrupt read in
//! flight. Every completed read is decoded and turned into notifications:
//! the composite update always fires, the button and axis notifications fire
//! only when their value changed.
//!
//! The host is injected at construction. Lock order is host lock first,
//! then driver state; observers are always invoked with neither held.

mod completion;
mod connection;
pub mod matcher;
pub mod observers;
pub mod state;

pub use matcher::MouseMatcher;
pub use observers::{AxisHandler, ButtonsHandler, Handler, Observers, UpdateHandler};
pub use state::{Claim, ConnectionStatus, REPORT_CAPACITY, ReportBuffer, TransferStats};

use common::UsbHost;
use protocol::{EventKind, MouseReport};
use state::DriverState;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

/// Name the claimed interface is registered under
pub const INTERFACE_NAME: &str = "Mouse";

/// Why a connection attempt did not start streaming
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
    /// The whole device table was scanned without a usable boot mouse
    #[error("no boot mouse found")]
    NoMouseFound,

    /// The host failed to enumerate a device; the scan was abandoned
    #[error("enumeration failed: {0}")]
    EnumerationFailed(String),

    /// A mouse was claimed but the host had no room for the first read
    #[error("transfer queue full, mouse claimed but idle")]
    QueueFull,
}

pub(crate) struct Inner<H> {
    host: Arc<H>,
    /// Serializes connection attempts
    connecting: Mutex<()>,
    state: Mutex<DriverState>,
    observers: Observers,
    /// Last claim generation handed out; survives resets
    generation: AtomicU64,
}

impl<H> Inner<H> {
    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn state(&self) -> MutexGuard<'_, DriverState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reset entry point, also used by the host on teardown
    fn reset(&self) {
        *self.state() = DriverState::default();
        self.observers.clear();
    }
}

/// Boot mouse driver bound to one host
///
/// Cloning yields another handle to the same driver.
pub struct MouseDriver<H: UsbHost + 'static> {
    inner: Arc<Inner<H>>,
}

impl<H: UsbHost + 'static> Clone for MouseDriver<H> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<H: UsbHost + 'static> MouseDriver<H> {
    /// Create a driver in the reset state
    pub fn new(host: Arc<H>) -> Self {
        let driver = Self {
            inner: Arc::new(Inner {
                host,
                connecting: Mutex::new(()),
                state: Mutex::new(DriverState::default()),
                observers: Observers::new(),
                generation: AtomicU64::new(0),
            }),
        };
        driver.init();
        driver
    }

    /// The host this driver runs on
    pub fn host(&self) -> &Arc<H> {
        &self.inner.host
    }

    /// Release every handle, clear flags, counters and observers
    ///
    /// A completion arriving after this call is ignored and not resubmitted.
    pub fn init(&self) {
        self.inner.reset();
    }

    /// Find, claim and start streaming from a boot mouse
    ///
    /// Returns true once a mouse has been claimed, even if the host had no
    /// room for the first read; check [`connected`](Self::connected) or use
    /// [`connect_checked`](Self::connect_checked) to tell the two apart.
    pub fn connect(&self) -> bool {
        matches!(self.connect_checked(), Ok(()) | Err(DriverError::QueueFull))
    }

    /// Like [`connect`](Self::connect), reporting why streaming did not start
    ///
    /// # Panics
    ///
    /// Panics if the host answers the first submission with a status outside
    /// its contract (anything but queued, completed or queue full).
    pub fn connect_checked(&self) -> Result<(), DriverError> {
        self.inner.connect()
    }

    /// Whether a mouse is claimed and a read is being kept in flight
    pub fn connected(&self) -> bool {
        self.status() == ConnectionStatus::Streaming
    }

    pub fn status(&self) -> ConnectionStatus {
        self.inner.state().status
    }

    /// Matched interface number, -1 while nothing is matched
    pub fn interface_index(&self) -> i16 {
        self.inner.state().matcher.interface_index()
    }

    /// Current device, interface and endpoint, if claimed
    pub fn claim(&self) -> Option<Claim> {
        self.inner.state().claim
    }

    /// Last decoded mouse state
    pub fn state(&self) -> MouseReport {
        self.inner.state().last
    }

    pub fn stats(&self) -> TransferStats {
        self.inner.state().stats
    }

    /// Install `handler` for `kind`, returning the handler it replaced
    pub fn subscribe(&self, kind: EventKind, handler: Handler) -> Option<Handler> {
        self.inner.observers.subscribe(kind, handler)
    }

    pub fn unsubscribe(&self, kind: EventKind) -> Option<Handler> {
        self.inner.observers.unsubscribe(kind)
    }

    /// Composite handler, called for every report with data
    pub fn attach_event(&self, handler: Option<UpdateHandler>) {
        self.inner
            .observers
            .set(EventKind::Update, handler.map(observers::update_handler));
    }

    /// Button handler, called when the button mask changes
    pub fn attach_button_event(&self, handler: Option<ButtonsHandler>) {
        self.inner
            .observers
            .set(EventKind::Buttons, handler.map(observers::buttons_handler));
    }

    /// X handler, called when X changes
    pub fn attach_x_event(&self, handler: Option<AxisHandler>) {
        self.attach_axis(EventKind::X, handler);
    }

    /// Y handler, called when Y changes
    pub fn attach_y_event(&self, handler: Option<AxisHandler>) {
        self.attach_axis(EventKind::Y, handler);
    }

    /// Wheel handler, called when the wheel value changes
    pub fn attach_z_event(&self, handler: Option<AxisHandler>) {
        self.attach_axis(EventKind::Z, handler);
    }

    fn attach_axis(&self, kind: EventKind, handler: Option<AxisHandler>) {
        self.inner
            .observers
            .set(kind, handler.map(|h| observers::axis_handler(kind, h)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::test_utils::{MockHost, boot_mouse_device};
    use protocol::MouseButtons;

    #[test]
    fn test_new_driver_is_reset() {
        let driver = MouseDriver::new(Arc::new(MockHost::new()));

        assert!(!driver.connected());
        assert_eq!(driver.status(), ConnectionStatus::Disconnected);
        assert_eq!(driver.interface_index(), -1);
        assert!(driver.claim().is_none());
        assert_eq!(driver.state(), MouseReport::default());
        assert_eq!(driver.stats(), TransferStats::default());
    }

    #[test]
    fn test_setters_accept_none() {
        let driver = MouseDriver::new(Arc::new(MockHost::new()));
        driver.attach_x_event(Some(Arc::new(|_: i8| {})));
        assert!(driver.inner.observers.is_subscribed(EventKind::X));

        driver.attach_x_event(None);
        assert!(!driver.inner.observers.is_subscribed(EventKind::X));
    }

    #[test]
    fn test_init_releases_claim_and_observers() {
        let host = Arc::new(MockHost::with_devices(vec![boot_mouse_device(8)]));
        let driver = MouseDriver::new(host);
        driver.attach_event(Some(Arc::new(|_: MouseButtons, _: i8, _: i8, _: i8| {})));
        assert!(driver.connect());

        driver.init();

        assert!(!driver.connected());
        assert!(driver.claim().is_none());
        assert_eq!(driver.interface_index(), -1);
        assert!(!driver.inner.observers.is_subscribed(EventKind::Update));
    }
}
