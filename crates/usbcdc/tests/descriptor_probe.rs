//! End-to-end probe flow against the mock transport
//!
//! Drives the same sequence the binary runs (claim, descriptor read,
//! teardown) with a scripted device and checks the console output.

use usbcdc::test_utils::{Call, MockUsb};
use usbcdc::{TeardownPolicy, UsbLink, claim_interfaces, read_device_descriptor, release_interfaces};

/// A standard 18-byte device descriptor for a full-speed 2.0 device.
const DEVICE_DESCRIPTOR: [u8; 18] = [
    0x12, 0x01, 0x00, 0x02, 0x02, 0x00, 0x00, 0x40, 0xff, 0xff, 0xff, 0xff, 0x00, 0x01, 0x01,
    0x02, 0x03, 0x01,
];

#[test]
fn probe_prints_descriptor_bytes_in_hex() {
    let mut mock = MockUsb::new();
    mock.kernel_driver_active_on(0);
    mock.expect_control_in(Ok(DEVICE_DESCRIPTOR.to_vec()));

    let claimed = claim_interfaces(&mut mock, &[0]).unwrap();
    assert_eq!(claimed, vec![0]);

    let mut link = UsbLink::new(mock, Vec::new());
    let len = read_device_descriptor(&mut link).unwrap();
    assert_eq!(len, 18);

    let (mut mock, console) = link.into_parts();
    let output = String::from_utf8(console).unwrap();
    assert_eq!(
        output,
        "Received: 12 01 00 02 02 00 00 40 ff ff ff ff 00 01 01 02 03 01\n"
    );

    release_interfaces(&mut mock, &claimed, TeardownPolicy::BestEffort).unwrap();

    // The kernel driver was detached on claim and reattached on release.
    let calls = mock.calls();
    assert!(calls.contains(&Call::DetachKernelDriver(0)));
    assert!(calls.contains(&Call::AttachKernelDriver(0)));
}

#[test]
fn cdc_exchange_round_trip() {
    let mut mock = MockUsb::new();
    mock.expect_bulk_out(Ok(3));
    mock.expect_bulk_in(Ok(vec![0x4f, 0x4b]));

    let mut link = UsbLink::new(mock, Vec::new());
    assert_eq!(link.send_cdc(&[0x41, 0x54, 0x0d]).unwrap(), 3);

    let mut buf = [0u8; 255];
    assert_eq!(link.recv_cdc(&mut buf).unwrap(), 2);
    assert_eq!(&buf[..2], b"OK");

    let (_, console) = link.into_parts();
    assert_eq!(String::from_utf8(console).unwrap(), "Received: 4f 4b\n");
}
