//! Device scan, endpoint claim and the first submission

use super::matcher::MouseMatcher;
use super::state::{Claim, ConnectionStatus};
use super::{DriverError, INTERFACE_NAME, Inner};
use common::{CompletionHandler, TeardownHandler, UsbHost};
use protocol::{DeviceHandle, EndpointDirection, EndpointType, TransferStatus};
use std::sync::{Arc, PoisonError};
use tracing::{debug, info, trace, warn};

impl<H: UsbHost + 'static> Inner<H> {
    pub(super) fn connect(self: &Arc<Self>) -> Result<(), DriverError> {
        let _serial = self
            .connecting
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if self.state().status == ConnectionStatus::Streaming {
            trace!("Mouse already connected");
            return Ok(());
        }
        self.state().begin_scan();

        let slots = self.host.list_devices(self.host.max_devices());
        for device in slots.into_iter().flatten() {
            let mut matcher = MouseMatcher::new();
            if let Err(e) = self.host.enumerate(device, &mut matcher) {
                warn!("Enumeration of device {} failed: {}", device.0, e);
                self.reset();
                return Err(DriverError::EnumerationFailed(e.to_string()));
            }

            if !matcher.is_confirmed() {
                debug!("Device {} has no boot mouse interface", device.0);
                continue;
            }

            match self.claim(device, matcher) {
                Some(claim) => return self.start_streaming(claim),
                None => self.state().matcher.reset(),
            }
        }

        debug!("No boot mouse in the device table");
        self.reset();
        Err(DriverError::NoMouseFound)
    }

    /// Resolve the endpoint and register with the host
    ///
    /// Runs under the host lock so a concurrent teardown cannot release the
    /// device between resolution and registration.
    fn claim(self: &Arc<Self>, device: DeviceHandle, matcher: MouseMatcher) -> Option<Claim> {
        let interface = matcher.interface()?;
        let _host = self.host.lock();

        let Some(endpoint) = self.host.resolve_endpoint(
            device,
            interface,
            EndpointType::Interrupt,
            EndpointDirection::In,
        ) else {
            warn!(
                "Device {} interface {}: interrupt IN endpoint unavailable, skipping",
                device.0, interface
            );
            return None;
        };

        info!(
            "New Mouse device: {:04x}:{:04x} [dev: {} - intf: {}]",
            matcher.vendor_id(),
            matcher.product_id(),
            device.0,
            interface
        );

        let weak = Arc::downgrade(self);
        let teardown: TeardownHandler = Arc::new(move || {
            if let Some(inner) = weak.upgrade() {
                debug!("Mouse torn down by host");
                inner.reset();
            }
        });
        self.host
            .register_driver(device, interface, INTERFACE_NAME, teardown);

        let generation = self.next_generation();
        let weak = Arc::downgrade(self);
        let completion: CompletionHandler = Arc::new(move |data: &[u8]| {
            if let Some(inner) = weak.upgrade() {
                inner.on_transfer_complete(generation, data);
            }
        });
        self.host.attach_completion(&endpoint, completion);

        let claim = Claim {
            device,
            interface,
            endpoint,
            generation,
        };

        let mut state = self.state();
        state.matcher = matcher;
        state.claim = Some(claim);
        state.status = ConnectionStatus::Claimed;
        Some(claim)
    }

    /// Submit the first read of a fresh claim
    fn start_streaming(&self, claim: Claim) -> Result<(), DriverError> {
        let len = claim.transfer_len();
        {
            let mut state = self.state();
            state.in_flight = true;
            state.stats.submitted += 1;
        }

        let status = self
            .host
            .submit_interrupt_read(claim.device, &claim.endpoint, len);
        assert!(
            status.is_submission_outcome(),
            "host answered an interrupt read submission with {:?}",
            status
        );
        debug!("First read of {} bytes: {:?}", len, status);

        let mut state = self.state();
        if state.claim != Some(claim) {
            // Torn down while submitting
            return Ok(());
        }

        if status == TransferStatus::QueueFull {
            warn!("Transfer queue full, mouse claimed but idle");
            state.in_flight = false;
            state.status = ConnectionStatus::Claimed;
            return Err(DriverError::QueueFull);
        }

        if state.in_flight {
            state.status = ConnectionStatus::Streaming;
        }
        Ok(())
    }
}
