//! Interrupt IN reads with rusb
//!
//! Reads are synchronous and bounded by a timeout. A timeout or transient
//! I/O error means the device had nothing to report; it completes the read
//! with no data rather than failing it.

use protocol::TransferStatus;
use rusb::{Context, DeviceHandle};
use std::time::Duration;
use tracing::{debug, warn};

/// Result of one interrupt read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Completed, possibly with zero bytes
    Data(Vec<u8>),
    /// The device has gone away
    Gone,
    /// The read failed; the endpoint may need recovery
    Failed(TransferStatus),
}

/// Read up to `len` bytes from interrupt IN `endpoint`
pub fn read_interrupt_in(
    handle: &DeviceHandle<Context>,
    endpoint: u8,
    len: usize,
    timeout: Duration,
) -> ReadOutcome {
    let mut buffer = vec![0u8; len];
    let result = handle.read_interrupt(endpoint, &mut buffer, timeout);
    classify(result, buffer, endpoint)
}

fn classify(result: rusb::Result<usize>, mut buffer: Vec<u8>, endpoint: u8) -> ReadOutcome {
    match result {
        Ok(len) => {
            buffer.truncate(len);
            ReadOutcome::Data(buffer)
        }
        Err(rusb::Error::Timeout) | Err(rusb::Error::Io) => {
            // Nothing to report this interval
            debug!("Interrupt IN {:#04x}: no data", endpoint);
            ReadOutcome::Data(Vec::new())
        }
        Err(e) => match map_rusb_error(e) {
            TransferStatus::NoDevice => ReadOutcome::Gone,
            status => {
                warn!("Interrupt IN {:#04x} failed: {}", endpoint, e);
                ReadOutcome::Failed(status)
            }
        },
    }
}

/// Map rusb::Error to the host's transfer status
pub fn map_rusb_error(err: rusb::Error) -> TransferStatus {
    match err {
        rusb::Error::NoDevice | rusb::Error::NotFound => TransferStatus::NoDevice,
        rusb::Error::Pipe => TransferStatus::Stalled,
        _ => TransferStatus::Failed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_rusb_error() {
        assert_eq!(map_rusb_error(rusb::Error::NoDevice), TransferStatus::NoDevice);
        assert_eq!(map_rusb_error(rusb::Error::NotFound), TransferStatus::NoDevice);
        assert_eq!(map_rusb_error(rusb::Error::Pipe), TransferStatus::Stalled);
        assert_eq!(map_rusb_error(rusb::Error::Overflow), TransferStatus::Failed);
    }

    #[test]
    fn test_short_read_is_truncated() {
        let outcome = classify(Ok(3), vec![1, 2, 3, 0], 0x81);
        assert_eq!(outcome, ReadOutcome::Data(vec![1, 2, 3]));
    }

    #[test]
    fn test_timeout_and_io_complete_empty() {
        assert_eq!(
            classify(Err(rusb::Error::Timeout), vec![0; 4], 0x81),
            ReadOutcome::Data(Vec::new())
        );
        assert_eq!(
            classify(Err(rusb::Error::Io), vec![0; 4], 0x81),
            ReadOutcome::Data(Vec::new())
        );
    }

    #[test]
    fn test_failures() {
        assert_eq!(
            classify(Err(rusb::Error::NoDevice), vec![0; 4], 0x81),
            ReadOutcome::Gone
        );
        assert_eq!(
            classify(Err(rusb::Error::Pipe), vec![0; 4], 0x81),
            ReadOutcome::Failed(TransferStatus::Stalled)
        );
    }
}
