//! Device acquisition and teardown
//!
//! Opening a device by VID:PID is a bounded poll under a [`BackoffPolicy`];
//! claiming interfaces is transactional (a claim failure mid-way releases
//! whatever was already claimed before returning); teardown runs under an
//! explicit [`TeardownPolicy`].

use crate::error::{Error, Result};
use crate::io::InterfaceOps;
use crate::retry::BackoffPolicy;
use rusb::{Context, DeviceHandle, UsbContext};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// How teardown reacts to release failures.
///
/// The original tool aborted teardown on the first release failure but only
/// logged reattach failures. Here the severity is uniform and picked by the
/// caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TeardownPolicy {
    /// Log every failure and keep going; teardown always reports Ok.
    #[default]
    BestEffort,
    /// Abort on the first release failure and surface it.
    FailFast,
}

/// Open a device matching `vendor_id:product_id`, polling under `policy`.
///
/// Blocks until the device opens or the policy's deadline passes. A policy
/// with `deadline: None` waits forever.
pub fn open_device(
    context: &Context,
    vendor_id: u16,
    product_id: u16,
    policy: &BackoffPolicy,
) -> Result<DeviceHandle<Context>> {
    info!("waiting for device {:04x}:{:04x}", vendor_id, product_id);

    let handle = policy
        .wait_for(|| context.open_device_with_vid_pid(vendor_id, product_id))
        .map_err(|waited| Error::OpenTimedOut {
            vendor_id,
            product_id,
            waited,
        })?;

    debug!("opened device {:04x}:{:04x}", vendor_id, product_id);
    Ok(handle)
}

/// Detach kernel drivers and claim `interfaces`, in order.
///
/// Returns the list of claimed interface numbers. If any claim fails, the
/// interfaces claimed so far are released in reverse order and the claim
/// error is returned; the caller never sees a partially-claimed device.
pub fn claim_interfaces(ops: &mut impl InterfaceOps, interfaces: &[u8]) -> Result<Vec<u8>> {
    let mut claimed = Vec::with_capacity(interfaces.len());

    for &interface in interfaces {
        match ops.kernel_driver_active(interface) {
            Ok(true) => {
                info!("detaching kernel driver from interface {}", interface);
                if let Err(e) = ops.detach_kernel_driver(interface) {
                    // Claiming will most likely fail next, but let the claim
                    // call produce the definitive error.
                    warn!(
                        "failed to detach kernel driver from interface {}: {}",
                        interface, e
                    );
                }
            }
            Ok(false) => {
                debug!("no kernel driver active on interface {}", interface);
            }
            Err(e) => {
                debug!(
                    "could not check kernel driver status for interface {}: {}",
                    interface, e
                );
            }
        }

        if let Err(e) = ops.claim_interface(interface) {
            warn!("failed to claim interface {}: {}", interface, e);
            unwind_claims(ops, &claimed);
            return Err(Error::Claim {
                interface,
                source: e,
            });
        }

        debug!("claimed interface {}", interface);
        claimed.push(interface);
    }

    Ok(claimed)
}

/// Release previously claimed interfaces, reattaching kernel drivers.
///
/// Releases in reverse claim order. Reattach failures are logged only under
/// both policies: the driver commonly was never detached in the first place.
pub fn release_interfaces(
    ops: &mut impl InterfaceOps,
    claimed: &[u8],
    policy: TeardownPolicy,
) -> Result<()> {
    for &interface in claimed.iter().rev() {
        if let Err(e) = ops.release_interface(interface) {
            warn!("failed to release interface {}: {}", interface, e);
            if policy == TeardownPolicy::FailFast {
                return Err(Error::Release {
                    interface,
                    source: e,
                });
            }
            continue;
        }

        match ops.attach_kernel_driver(interface) {
            Ok(()) => info!("reattached kernel driver to interface {}", interface),
            Err(e) => debug!(
                "could not reattach kernel driver to interface {} (may not have been detached): {}",
                interface, e
            ),
        }
    }

    Ok(())
}

fn unwind_claims(ops: &mut impl InterfaceOps, claimed: &[u8]) {
    for &interface in claimed.iter().rev() {
        if let Err(e) = ops.release_interface(interface) {
            warn!(
                "failed to release interface {} while unwinding: {}",
                interface, e
            );
        } else {
            debug!("released interface {} while unwinding", interface);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{Call, MockUsb};

    #[test]
    fn test_claim_all_interfaces() {
        let mut mock = MockUsb::new();
        mock.kernel_driver_active_on(0);

        let claimed = claim_interfaces(&mut mock, &[0, 1]).unwrap();
        assert_eq!(claimed, vec![0, 1]);
        assert_eq!(
            mock.calls(),
            vec![
                Call::KernelDriverActive(0),
                Call::DetachKernelDriver(0),
                Call::ClaimInterface(0),
                Call::KernelDriverActive(1),
                Call::ClaimInterface(1),
            ]
        );
    }

    #[test]
    fn test_claim_failure_unwinds_earlier_claims() {
        let mut mock = MockUsb::new();
        mock.fail_claim(1, rusb::Error::Busy);

        let err = claim_interfaces(&mut mock, &[0, 1]).unwrap_err();
        assert!(matches!(err, Error::Claim { interface: 1, .. }));

        // Interface 0 must have been released again: no partial state leaks.
        assert!(mock.calls().contains(&Call::ReleaseInterface(0)));
    }

    #[test]
    fn test_release_reverse_order() {
        let mut mock = MockUsb::new();
        release_interfaces(&mut mock, &[0, 1], TeardownPolicy::BestEffort).unwrap();

        let releases: Vec<_> = mock
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::ReleaseInterface(_)))
            .collect();
        assert_eq!(
            releases,
            vec![Call::ReleaseInterface(1), Call::ReleaseInterface(0)]
        );
    }

    #[test]
    fn test_fail_fast_surfaces_release_error() {
        let mut mock = MockUsb::new();
        mock.fail_release(1, rusb::Error::NoDevice);

        let err = release_interfaces(&mut mock, &[0, 1], TeardownPolicy::FailFast).unwrap_err();
        assert!(matches!(err, Error::Release { interface: 1, .. }));

        // Fail-fast aborts before touching interface 0.
        assert!(!mock.calls().contains(&Call::ReleaseInterface(0)));
    }

    #[test]
    fn test_best_effort_continues_past_release_error() {
        let mut mock = MockUsb::new();
        mock.fail_release(1, rusb::Error::NoDevice);

        release_interfaces(&mut mock, &[0, 1], TeardownPolicy::BestEffort).unwrap();
        assert!(mock.calls().contains(&Call::ReleaseInterface(0)));
    }

    #[test]
    fn test_reattach_failure_is_not_fatal() {
        let mut mock = MockUsb::new();
        mock.fail_attach(0, rusb::Error::NotFound);

        release_interfaces(&mut mock, &[0], TeardownPolicy::FailFast).unwrap();
    }
}
