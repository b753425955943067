//! Library error types
//!
//! The error taxonomy is rusb's: every failed host-library call is carried
//! through unchanged in `Error::Transfer`. The remaining variants cover the
//! checks this crate adds on top (direction validation, claim/release
//! bookkeeping, bounded open retry).

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A host-library call failed; the rusb error is propagated verbatim.
    #[error("USB transfer failed: {0}")]
    Transfer(#[from] rusb::Error),

    /// Control send rejected: bit 7 of bmRequestType indicates IN.
    #[error("bmRequestType {request_type:#04x} is not an OUT request")]
    NotOutput { request_type: u8 },

    /// Control receive rejected: bit 7 of bmRequestType indicates OUT.
    #[error("bmRequestType {request_type:#04x} is not an IN request")]
    NotInput { request_type: u8 },

    /// Claiming an interface failed during acquisition.
    #[error("claiming interface {interface} failed: {source}")]
    Claim { interface: u8, source: rusb::Error },

    /// Releasing an interface failed under fail-fast teardown.
    #[error("releasing interface {interface} failed: {source}")]
    Release { interface: u8, source: rusb::Error },

    /// The requested log filter did not parse.
    #[error("invalid log filter: {0}")]
    LogFilter(String),

    /// Writing a received-data line to the console sink failed.
    #[error("console write failed: {0}")]
    Console(#[from] std::io::Error),

    /// The device never appeared within the open deadline.
    #[error("device {vendor_id:04x}:{product_id:04x} did not appear within {waited:?}")]
    OpenTimedOut {
        vendor_id: u16,
        product_id: u16,
        waited: Duration,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
