//! Common utilities for usb-host-mouse
//!
//! This crate provides the contract between USB class drivers and the host
//! stack they run on, error handling, logging setup, the async channel
//! bridge that carries mouse notifications out of the host thread, and test
//! utilities shared by every crate.

pub mod channel;
pub mod error;
pub mod host;
pub mod logging;
pub mod test_utils;

pub use channel::{
    DEFAULT_EVENT_CAPACITY, EventPublisher, EventSubscriber, create_event_bridge,
};
pub use error::{Error, Result};
pub use host::{
    CompletionHandler, EnumerationMatcher, HostLock, MAX_DEVICE_CONNECTED, TeardownHandler,
    UsbHost,
};
pub use logging::setup_logging;
