//! USB HID boot mouse driver
//!
//! [`driver::MouseDriver`] runs on any [`common::UsbHost`]: it claims the
//! first boot-protocol mouse in the host's device table, keeps one interrupt
//! read in flight and turns every report into change notifications.
//! [`usb::RusbHost`] is the libusb-backed host used by the
//! `hid-mouse-monitor` binary.
//!
//! # Example
//!
//! ```
//! use common::test_utils::{MockHost, boot_mouse_device};
//! use mouse::driver::MouseDriver;
//! use std::sync::Arc;
//!
//! let host = Arc::new(MockHost::with_devices(vec![boot_mouse_device(4)]));
//! let driver = MouseDriver::new(host.clone());
//!
//! driver.attach_x_event(Some(Arc::new(|x: i8| println!("x = {}", x))));
//! assert!(driver.connect());
//! assert!(driver.connected());
//!
//! host.complete_last(&[0x00, 5, 0, 0]);
//! assert_eq!(driver.state().x, 5);
//! ```

pub mod config;
pub mod driver;
pub mod usb;

pub use driver::{ConnectionStatus, DriverError, MouseDriver};
