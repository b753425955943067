//! Shared test utilities
//!
//! [`MockUsb`] is a scriptable stand-in for a device handle: tests queue up
//! per-call results and assert against the recorded call log afterwards. It
//! lives in the library (not behind `cfg(test)`) so integration tests can use
//! it too.

use crate::io::{InterfaceOps, UsbIo};
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

/// One recorded call into the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ControlOut {
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        len: usize,
    },
    ControlIn {
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        len: usize,
    },
    BulkOut {
        endpoint: u8,
        len: usize,
    },
    BulkIn {
        endpoint: u8,
        len: usize,
        timeout: Duration,
    },
    InterruptIn {
        endpoint: u8,
        len: usize,
        timeout: Duration,
    },
    KernelDriverActive(u8),
    DetachKernelDriver(u8),
    AttachKernelDriver(u8),
    ClaimInterface(u8),
    ReleaseInterface(u8),
}

/// Scriptable mock transport.
///
/// Queued expectations are consumed in FIFO order; with an empty queue,
/// reads return zero bytes and writes report the full length, so tests only
/// script what they care about.
#[derive(Default)]
pub struct MockUsb {
    calls: Vec<Call>,
    control_out: VecDeque<Result<usize, rusb::Error>>,
    control_in: VecDeque<Result<Vec<u8>, rusb::Error>>,
    bulk_out: VecDeque<Result<usize, rusb::Error>>,
    bulk_in: VecDeque<Result<Vec<u8>, rusb::Error>>,
    interrupt_in: VecDeque<Result<Vec<u8>, rusb::Error>>,
    active_drivers: HashSet<u8>,
    claim_failures: HashMap<u8, rusb::Error>,
    release_failures: HashMap<u8, rusb::Error>,
    attach_failures: HashMap<u8, rusb::Error>,
}

impl MockUsb {
    pub fn new() -> Self {
        Self::default()
    }

    /// The call log so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.calls.clone()
    }

    pub fn expect_control_out(&mut self, result: Result<usize, rusb::Error>) {
        self.control_out.push_back(result);
    }

    pub fn expect_control_in(&mut self, result: Result<Vec<u8>, rusb::Error>) {
        self.control_in.push_back(result);
    }

    pub fn expect_bulk_out(&mut self, result: Result<usize, rusb::Error>) {
        self.bulk_out.push_back(result);
    }

    pub fn expect_bulk_in(&mut self, result: Result<Vec<u8>, rusb::Error>) {
        self.bulk_in.push_back(result);
    }

    pub fn expect_interrupt_in(&mut self, result: Result<Vec<u8>, rusb::Error>) {
        self.interrupt_in.push_back(result);
    }

    /// Mark an interface as having an active kernel driver.
    pub fn kernel_driver_active_on(&mut self, interface: u8) {
        self.active_drivers.insert(interface);
    }

    pub fn fail_claim(&mut self, interface: u8, error: rusb::Error) {
        self.claim_failures.insert(interface, error);
    }

    pub fn fail_release(&mut self, interface: u8, error: rusb::Error) {
        self.release_failures.insert(interface, error);
    }

    pub fn fail_attach(&mut self, interface: u8, error: rusb::Error) {
        self.attach_failures.insert(interface, error);
    }

    fn fill(buf: &mut [u8], scripted: Result<Vec<u8>, rusb::Error>) -> Result<usize, rusb::Error> {
        let data = scripted?;
        let len = data.len().min(buf.len());
        buf[..len].copy_from_slice(&data[..len]);
        Ok(len)
    }
}

impl UsbIo for MockUsb {
    fn control_out(
        &mut self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        data: &[u8],
        _timeout: Duration,
    ) -> Result<usize, rusb::Error> {
        self.calls.push(Call::ControlOut {
            request_type,
            request,
            value,
            index,
            len: data.len(),
        });
        self.control_out.pop_front().unwrap_or(Ok(data.len()))
    }

    fn control_in(
        &mut self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        buf: &mut [u8],
        _timeout: Duration,
    ) -> Result<usize, rusb::Error> {
        self.calls.push(Call::ControlIn {
            request_type,
            request,
            value,
            index,
            len: buf.len(),
        });
        let scripted = self.control_in.pop_front().unwrap_or(Ok(Vec::new()));
        Self::fill(buf, scripted)
    }

    fn bulk_out(
        &mut self,
        endpoint: u8,
        data: &[u8],
        _timeout: Duration,
    ) -> Result<usize, rusb::Error> {
        self.calls.push(Call::BulkOut {
            endpoint,
            len: data.len(),
        });
        self.bulk_out.pop_front().unwrap_or(Ok(data.len()))
    }

    fn bulk_in(
        &mut self,
        endpoint: u8,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, rusb::Error> {
        self.calls.push(Call::BulkIn {
            endpoint,
            len: buf.len(),
            timeout,
        });
        let scripted = self.bulk_in.pop_front().unwrap_or(Ok(Vec::new()));
        Self::fill(buf, scripted)
    }

    fn interrupt_in(
        &mut self,
        endpoint: u8,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, rusb::Error> {
        self.calls.push(Call::InterruptIn {
            endpoint,
            len: buf.len(),
            timeout,
        });
        let scripted = self.interrupt_in.pop_front().unwrap_or(Ok(Vec::new()));
        Self::fill(buf, scripted)
    }
}

impl InterfaceOps for MockUsb {
    fn kernel_driver_active(&mut self, interface: u8) -> Result<bool, rusb::Error> {
        self.calls.push(Call::KernelDriverActive(interface));
        Ok(self.active_drivers.contains(&interface))
    }

    fn detach_kernel_driver(&mut self, interface: u8) -> Result<(), rusb::Error> {
        self.calls.push(Call::DetachKernelDriver(interface));
        self.active_drivers.remove(&interface);
        Ok(())
    }

    fn attach_kernel_driver(&mut self, interface: u8) -> Result<(), rusb::Error> {
        self.calls.push(Call::AttachKernelDriver(interface));
        match self.attach_failures.get(&interface) {
            Some(e) => Err(*e),
            None => {
                self.active_drivers.insert(interface);
                Ok(())
            }
        }
    }

    fn claim_interface(&mut self, interface: u8) -> Result<(), rusb::Error> {
        self.calls.push(Call::ClaimInterface(interface));
        match self.claim_failures.get(&interface) {
            Some(e) => Err(*e),
            None => Ok(()),
        }
    }

    fn release_interface(&mut self, interface: u8) -> Result<(), rusb::Error> {
        self.calls.push(Call::ReleaseInterface(interface));
        match self.release_failures.get(&interface) {
            Some(e) => Err(*e),
            None => Ok(()),
        }
    }
}
