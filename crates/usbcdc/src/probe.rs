//! Device descriptor probe
//!
//! The one query every USB device answers: GET_DESCRIPTOR for the device
//! descriptor, read over a control IN transfer and dumped in hex.

use crate::error::Result;
use crate::hex::hex_line;
use crate::io::UsbIo;
use crate::link::UsbLink;
use std::io::Write;
use tracing::info;

/// GET_DESCRIPTOR request code.
const GET_DESCRIPTOR: u8 = 0x06;
/// Descriptor type for the device descriptor, in the high byte of wValue.
const DEVICE_DESCRIPTOR: u16 = 0x01;
/// Request buffer size; a standard device descriptor is 18 bytes.
const DESCRIPTOR_BUF_LEN: usize = 0x40;

/// Read the device descriptor and print its bytes to the link's console.
///
/// Returns the number of bytes the device answered with.
pub fn read_device_descriptor<T: UsbIo, W: Write>(link: &mut UsbLink<T, W>) -> Result<usize> {
    let mut buf = [0u8; DESCRIPTOR_BUF_LEN];
    let len = link.recv_control(0x80, GET_DESCRIPTOR, DEVICE_DESCRIPTOR << 8, 0, &mut buf)?;

    info!("device descriptor: {} bytes", len);
    let line = hex_line(&buf[..len]);
    writeln!(link.console_mut(), "Received: {}", line)?;
    Ok(len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{Call, MockUsb};

    #[test]
    fn test_descriptor_request_shape() {
        let mut mock = MockUsb::new();
        mock.expect_control_in(Ok(vec![0x12, 0x01]));
        let mut link = UsbLink::new(mock, Vec::new());

        read_device_descriptor(&mut link).unwrap();

        let (mock, _) = link.into_parts();
        assert_eq!(
            mock.calls(),
            vec![Call::ControlIn {
                request_type: 0x80,
                request: 0x06,
                value: 0x0100,
                index: 0x0000,
                len: 0x40,
            }]
        );
    }
}
