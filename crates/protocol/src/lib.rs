//! Protocol library for usb-host-mouse
//!
//! USB and HID vocabulary shared by the host collaborator and the mouse
//! class driver: interface classification constants, endpoint descriptors,
//! interrupt submission outcomes, the boot-protocol mouse report and the
//! change notifications derived from it.
//!
//! # Example
//!
//! ```
//! use protocol::{MouseReport, is_boot_mouse};
//!
//! // Interface 0: class HID, subclass boot, protocol mouse
//! assert!(is_boot_mouse(0x03, 0x01, 0x02));
//!
//! let report = MouseReport::parse(&[0x01, 0x05, 0xFB, 0x00]).unwrap();
//! assert!(report.buttons.left());
//! assert_eq!((report.x, report.y), (5, -5));
//! ```

pub mod error;
pub mod events;
pub mod report;
pub mod types;

pub use error::{ProtocolError, Result};
pub use events::{EventKind, MouseEvent};
pub use report::{BOOT_MOUSE_REPORT_LEN, MouseButtons, MouseReport};
pub use types::{
    DeviceHandle, ENDPOINT_DIR_IN, EndpointDirection, EndpointHandle, EndpointInfo, EndpointType,
    HID_CLASS, HidProtocol, HidSubclass, TransferStatus, is_boot_mouse,
};
