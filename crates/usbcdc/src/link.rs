//! Transfer wrappers over an open device
//!
//! [`UsbLink`] bundles a transport with the console sink received bytes are
//! dumped to. Each method is one call into the host library plus the
//! direction check or timeout the operation carries.

use crate::error::{Error, Result};
use crate::hex::hex_line;
use crate::io::UsbIo;
use std::io::Write;
use std::time::Duration;
use tracing::{debug, warn};

/// Default CDC bulk OUT endpoint.
pub const CDC_EP_OUT: u8 = 0x07;
/// Default CDC bulk IN endpoint.
pub const CDC_EP_IN: u8 = 0x85;

/// Fixed timeout for interrupt reads.
const INTERRUPT_TIMEOUT: Duration = Duration::from_secs(2);
/// Default timeout for CDC reads.
const CDC_RECV_TIMEOUT: Duration = Duration::from_secs(5);
/// No timeout: blocks until completion or a device-level error.
const NO_TIMEOUT: Duration = Duration::ZERO;

/// An open device plus the sink received bytes are printed to.
pub struct UsbLink<T: UsbIo, W: Write> {
    io: T,
    console: W,
    cdc_out: u8,
    cdc_in: u8,
    cdc_recv_timeout: Duration,
}

impl<T: UsbIo, W: Write> UsbLink<T, W> {
    pub fn new(io: T, console: W) -> Self {
        Self {
            io,
            console,
            cdc_out: CDC_EP_OUT,
            cdc_in: CDC_EP_IN,
            cdc_recv_timeout: CDC_RECV_TIMEOUT,
        }
    }

    /// Override the CDC endpoint pair.
    pub fn with_endpoints(mut self, out_ep: u8, in_ep: u8) -> Self {
        self.cdc_out = out_ep;
        self.cdc_in = in_ep;
        self
    }

    /// Override the CDC receive timeout.
    pub fn with_recv_timeout(mut self, timeout: Duration) -> Self {
        self.cdc_recv_timeout = timeout;
        self
    }

    /// Send a control request with an optional data stage.
    ///
    /// Rejects request types whose direction bit indicates IN before any
    /// transfer is attempted. Blocks with no timeout.
    pub fn send_control(
        &mut self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        data: &[u8],
    ) -> Result<usize> {
        if request_type & 0x80 != 0 {
            warn!("bmRequestType {:#04x} is not for output", request_type);
            return Err(Error::NotOutput { request_type });
        }

        debug!(
            "control out: request_type={:#04x} request={:#04x} value={:#06x} index={:#06x} len={}",
            request_type,
            request,
            value,
            index,
            data.len()
        );
        let len = self
            .io
            .control_out(request_type, request, value, index, data, NO_TIMEOUT)?;
        Ok(len)
    }

    /// Receive data via a control request into a caller-owned buffer.
    ///
    /// Rejects request types whose direction bit indicates OUT before any
    /// transfer is attempted. Blocks with no timeout. Returns bytes read.
    pub fn recv_control(
        &mut self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        buf: &mut [u8],
    ) -> Result<usize> {
        if request_type & 0x80 == 0 {
            warn!("bmRequestType {:#04x} is not for input", request_type);
            return Err(Error::NotInput { request_type });
        }

        debug!(
            "control in: request_type={:#04x} request={:#04x} value={:#06x} index={:#06x} len={}",
            request_type,
            request,
            value,
            index,
            buf.len()
        );
        let len = self
            .io
            .control_in(request_type, request, value, index, buf, NO_TIMEOUT)?;
        Ok(len)
    }

    /// Read up to `buf.len()` bytes from an interrupt endpoint.
    ///
    /// Uses a fixed 2-second timeout. On success dumps the bytes to the
    /// console sink and returns the count.
    pub fn recv_interrupt(&mut self, endpoint: u8, buf: &mut [u8]) -> Result<usize> {
        let len = match self.io.interrupt_in(endpoint, buf, INTERRUPT_TIMEOUT) {
            Ok(len) => len,
            Err(rusb::Error::Timeout) => {
                warn!("interrupt transfer on endpoint {:#04x} timed out", endpoint);
                return Err(rusb::Error::Timeout.into());
            }
            Err(e) => {
                warn!("interrupt transfer on endpoint {:#04x} failed: {}", endpoint, e);
                return Err(e.into());
            }
        };

        writeln!(self.console, "Received: {}", hex_line(&buf[..len]))?;
        Ok(len)
    }

    /// Write `data` to a bulk endpoint with no timeout. Returns bytes written.
    pub fn send_bulk(&mut self, endpoint: u8, data: &[u8]) -> Result<usize> {
        debug!("bulk out: endpoint={:#04x} len={}", endpoint, data.len());
        let len = self.io.bulk_out(endpoint, data, NO_TIMEOUT)?;
        Ok(len)
    }

    /// Read up to `buf.len()` bytes from a bulk endpoint.
    ///
    /// On success dumps the bytes to the console sink and returns the count.
    pub fn recv_bulk(&mut self, endpoint: u8, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        debug!(
            "bulk in: endpoint={:#04x} len={} timeout={:?}",
            endpoint,
            buf.len(),
            timeout
        );
        let len = match self.io.bulk_in(endpoint, buf, timeout) {
            Ok(len) => len,
            Err(rusb::Error::Timeout) => {
                warn!("bulk transfer on endpoint {:#04x} timed out", endpoint);
                return Err(rusb::Error::Timeout.into());
            }
            Err(e) => {
                warn!("bulk transfer on endpoint {:#04x} failed: {}", endpoint, e);
                return Err(e.into());
            }
        };

        writeln!(self.console, "Received: {}", hex_line(&buf[..len]))?;
        Ok(len)
    }

    /// Send data on the CDC OUT endpoint.
    pub fn send_cdc(&mut self, data: &[u8]) -> Result<usize> {
        let out = self.cdc_out;
        self.send_bulk(out, data)
    }

    /// Receive data from the CDC IN endpoint into a caller-owned buffer.
    pub fn recv_cdc(&mut self, buf: &mut [u8]) -> Result<usize> {
        let (ep, timeout) = (self.cdc_in, self.cdc_recv_timeout);
        self.recv_bulk(ep, buf, timeout)
    }

    /// The console sink received bytes are dumped to.
    pub fn console_mut(&mut self) -> &mut W {
        &mut self.console
    }

    /// Tear the link apart, returning the transport and the console sink.
    pub fn into_parts(self) -> (T, W) {
        (self.io, self.console)
    }
}
