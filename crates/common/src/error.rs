//! Errors shared by host stacks and the tools built on them

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// libusb or host-side failure
    #[error("USB error: {0}")]
    Usb(String),

    /// Slot index of the missing device
    #[error("No device in slot {0}")]
    NoDevice(u32),

    #[error("Event channel closed: {0}")]
    Channel(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
