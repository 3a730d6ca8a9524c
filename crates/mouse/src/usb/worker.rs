//! Transfer worker thread
//!
//! Dedicated thread that performs the interrupt reads submitted through
//! [`RusbHost`] and delivers their completions. Submissions reach it over a
//! bounded channel, so a submission never blocks the caller; a full channel
//! is reported to the driver as a full transfer queue.

use super::host::RusbHost;
use super::transfers::{ReadOutcome, read_interrupt_in};
use common::CompletionHandler;
use protocol::{DeviceHandle, EndpointHandle, TransferStatus};
use std::fmt;
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, error, info, warn};

/// One pending interrupt read
#[derive(Clone)]
pub struct ReadRequest {
    pub device: DeviceHandle,
    pub endpoint: EndpointHandle,
    /// Endpoint address including the direction bit
    pub address: u8,
    pub len: usize,
    /// Handler attached to the endpoint when the read was submitted
    pub handler: CompletionHandler,
}

impl fmt::Debug for ReadRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadRequest")
            .field("device", &self.device)
            .field("endpoint", &self.endpoint)
            .field("address", &self.address)
            .field("len", &self.len)
            .finish_non_exhaustive()
    }
}

/// Commands accepted by the worker
#[derive(Debug, Clone)]
pub enum WorkerCommand {
    Read(ReadRequest),
    Shutdown,
}

/// Transfer worker state
pub struct TransferWorker {
    host: Arc<RusbHost>,
    commands: async_channel::Receiver<WorkerCommand>,
}

impl TransferWorker {
    pub fn new(host: Arc<RusbHost>, commands: async_channel::Receiver<WorkerCommand>) -> Self {
        Self { host, commands }
    }

    /// Process commands until shutdown or until every sender is gone
    pub fn run(self) {
        info!("Transfer worker started");

        while let Ok(command) = self.commands.recv_blocking() {
            match command {
                WorkerCommand::Shutdown => {
                    info!("Transfer worker shutting down");
                    break;
                }
                WorkerCommand::Read(request) => self.handle_read(request),
            }
        }

        info!("Transfer worker stopped");
    }

    fn handle_read(&self, request: ReadRequest) {
        // A panicking completion handler must not take the worker down
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            self.handle_read_inner(request)
        }));

        if let Err(e) = result {
            error!("Panic in completion handler: {:?}", e);
        }
    }

    fn handle_read_inner(&self, request: ReadRequest) {
        let Some(handle) = self.host.open_handle(request.device) else {
            debug!("Device {} gone before read, dropping", request.device.0);
            return;
        };

        match read_interrupt_in(&handle, request.address, request.len, self.host.read_timeout()) {
            ReadOutcome::Data(data) => (request.handler)(&data),
            ReadOutcome::Gone => {
                info!("Device {} disconnected", request.device.0);
                self.host.teardown(request.device);
            }
            ReadOutcome::Failed(TransferStatus::Stalled) => {
                warn!("Endpoint {:#04x} stalled, clearing halt", request.address);
                if let Err(e) = handle.clear_halt(request.address) {
                    warn!("Failed to clear halt on {:#04x}: {}", request.address, e);
                }
                // Keep the receive loop alive with a no-data completion
                (request.handler)(&[]);
            }
            ReadOutcome::Failed(status) => {
                error!(
                    "Interrupt read on device {} failed with {:?}, releasing it",
                    request.device.0, status
                );
                self.host.teardown(request.device);
            }
        }
    }
}

/// Spawn the transfer worker thread
pub fn spawn_transfer_worker(
    host: Arc<RusbHost>,
    commands: async_channel::Receiver<WorkerCommand>,
) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("usb-transfer".to_string())
        .spawn(move || TransferWorker::new(host, commands).run())
}
