//! Transfer completion: decode, dispatch, resubmit

use super::Inner;
use super::state::{ConnectionStatus, notifications};
use common::UsbHost;
use protocol::TransferStatus;
use tracing::{debug, trace, warn};

impl<H: UsbHost> Inner<H> {
    /// Handle one completed interrupt read of `data.len()` bytes
    ///
    /// `generation` is the claim the read was submitted for. Completions for
    /// a released or replaced claim neither touch state nor resubmit.
    pub(super) fn on_transfer_complete(&self, generation: u64, data: &[u8]) {
        let events = {
            let mut state = self.state();
            if state.claim.map(|claim| claim.generation) != Some(generation) {
                trace!("Completion for released claim {}, ignoring", generation);
                return;
            }
            state.in_flight = false;
            state.stats.completed += 1;

            if data.is_empty() {
                state.stats.empty += 1;
                Vec::new()
            } else {
                state.report.fill(data);
                let report = state.report.decode();
                trace!(
                    "Report buttons={:#05b} x={} y={} wheel={}",
                    report.buttons.bits(),
                    report.x,
                    report.y,
                    report.wheel
                );
                let events = notifications(&state.last, &report);
                state.last = report;
                events
            }
        };

        self.observers.dispatch(&events);
        self.arm();
    }

    /// Resubmit the read for the current claim, if there still is one
    fn arm(&self) {
        let claim = {
            let mut state = self.state();
            let Some(claim) = state.claim else {
                debug!("Device released, receive loop ends");
                return;
            };
            if state.in_flight {
                // An observer reconnected and a read is already outstanding
                return;
            }
            state.in_flight = true;
            state.stats.submitted += 1;
            claim
        };

        let status = self
            .host
            .submit_interrupt_read(claim.device, &claim.endpoint, claim.transfer_len());

        let mut state = self.state();
        if state.claim != Some(claim) {
            return;
        }

        match status {
            status if status.is_accepted() => {
                state.status = ConnectionStatus::Streaming;
            }
            TransferStatus::QueueFull => {
                warn!("Transfer queue full, receive loop paused");
                state.in_flight = false;
                state.status = ConnectionStatus::Claimed;
            }
            other => {
                warn!("Resubmission refused with {:?}, receive loop ends", other);
                state.in_flight = false;
                state.status = ConnectionStatus::Claimed;
            }
        }
    }
}
