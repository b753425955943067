//! usbcdc - talking to a USB CDC device through rusb
//!
//! This crate holds everything the `cdc-probe` binary needs to exchange data
//! with a CDC endpoint pair: bounded device opening, transactional interface
//! claiming, control/bulk/interrupt transfer wrappers, and a mock transport
//! for testing without hardware.

pub mod device;
pub mod error;
pub mod hex;
pub mod io;
pub mod link;
pub mod logging;
pub mod probe;
pub mod retry;
pub mod test_utils;

pub use device::{TeardownPolicy, claim_interfaces, open_device, release_interfaces};
pub use error::{Error, Result};
pub use link::{CDC_EP_IN, CDC_EP_OUT, UsbLink};
pub use logging::setup_logging;
pub use probe::read_device_descriptor;
pub use retry::BackoffPolicy;
