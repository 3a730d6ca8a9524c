//! libusb host stack
//!
//! A [`UsbHost`](common::UsbHost) implementation for real hardware. The
//! device table and descriptor walking live in [`host`]; interrupt reads
//! run on a dedicated worker thread so submissions never block the driver
//! and completions are delivered off the caller's thread.

pub mod device;
pub mod filter;
pub mod host;
pub mod transfers;
pub mod worker;

pub use device::{EndpointSummary, InterfaceSummary, UsbDevice};
pub use filter::{DeviceFilter, FilterError, IdPattern};
pub use host::{DeviceSummary, RusbHost};
pub use worker::{ReadRequest, TransferWorker, WorkerCommand, spawn_transfer_worker};
