//! cdc-probe
//!
//! Command-line tool for poking a USB CDC device through libusb: opens the
//! device by VID:PID, claims its interfaces, reads the device descriptor, and
//! optionally exchanges data over the CDC bulk endpoint pair.

mod config;

use anyhow::{Context as _, Result, anyhow};
use clap::Parser;
use config::{ProbeConfig, parse_hex_id};
use rusb::UsbContext;
use std::io;
use std::time::Duration;
use tracing::{error, info, warn};
use usbcdc::{
    BackoffPolicy, UsbLink, claim_interfaces, open_device, read_device_descriptor,
    release_interfaces, setup_logging,
};

#[derive(Parser, Debug)]
#[command(name = "cdc-probe")]
#[command(author, version, about = "Probe a USB CDC device over libusb")]
#[command(long_about = "
Opens a USB device by vendor:product ID, detaches kernel drivers, claims its
interfaces, and reads the device descriptor. With --send, additionally writes
data to the CDC OUT endpoint and reads the reply from the CDC IN endpoint.

EXAMPLES:
    # Probe the configured device
    cdc-probe

    # Probe a specific device
    cdc-probe --vid 0x0483 --pid 0x5740

    # Send two bytes and read the reply
    cdc-probe --vid 0x0483 --pid 0x5740 --send 'aa 55'

    # List USB devices without probing
    cdc-probe --list-devices

    # Run with debug logging
    cdc-probe --log-level debug

CONFIGURATION:
    The probe looks for configuration files in the following order:
    1. Path specified with --config
    2. ~/.config/cdc-probe/config.toml
    3. /etc/cdc-probe/config.toml
    4. Built-in defaults
")]
struct Args {
    /// Path to configuration file (tilde-expanded)
    #[arg(short, long, value_name = "PATH")]
    config: Option<String>,

    /// Save default configuration to default location and exit
    #[arg(long)]
    save_config: bool,

    /// List USB devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Vendor ID override, e.g. 0x0483
    #[arg(long, value_name = "VID")]
    vid: Option<String>,

    /// Product ID override, e.g. 0x5740
    #[arg(long, value_name = "PID")]
    pid: Option<String>,

    /// Hex bytes to send on the CDC OUT endpoint, e.g. 'de ad be ef'
    #[arg(long, value_name = "HEX")]
    send: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.save_config {
        let config = ProbeConfig::default();
        let path = ProbeConfig::default_path();
        config.save(&path).context("Failed to save configuration")?;
        println!("Configuration saved to: {}", path.display());
        return Ok(());
    }

    let config = if let Some(ref path) = args.config {
        let expanded = shellexpand::tilde(path);
        ProbeConfig::load(Some(expanded.as_ref().into()))
            .context("Failed to load configuration")?
    } else {
        ProbeConfig::load_or_default()
    };

    let log_level = args.log_level.as_deref().unwrap_or(&config.probe.log_level);
    setup_logging(log_level).context("Failed to setup logging")?;

    info!("cdc-probe v{}", env!("CARGO_PKG_VERSION"));

    // Library bring-up; failure here is fatal.
    let mut context = rusb::Context::new().context("Failed to initialize libusb")?;
    context.set_log_level(usb_log_level(config.probe.usb_debug_level));

    if args.list_devices {
        return list_devices(&context);
    }

    let vendor_id = match &args.vid {
        Some(vid) => parse_hex_id(vid, "--vid")?,
        None => config.device.vendor_id()?,
    };
    let product_id = match &args.pid {
        Some(pid) => parse_hex_id(pid, "--pid")?,
        None => config.device.product_id()?,
    };

    let policy = BackoffPolicy {
        deadline: match config.device.open_deadline_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        },
        ..BackoffPolicy::default()
    };

    let mut handle = open_device(&context, vendor_id, product_id, &policy)
        .with_context(|| format!("Failed to open device {:04x}:{:04x}", vendor_id, product_id))?;

    let claimed = claim_interfaces(&mut handle, &config.device.interfaces)
        .context("Failed to claim interfaces")?;

    let mut link = UsbLink::new(handle, io::stdout())
        .with_endpoints(config.transfer.endpoint_out, config.transfer.endpoint_in)
        .with_recv_timeout(Duration::from_millis(config.transfer.recv_timeout_ms));

    let result = run_probe(&mut link, &args, &config);

    let (mut handle, _) = link.into_parts();
    if let Err(e) = release_interfaces(&mut handle, &claimed, config.device.teardown) {
        error!("Teardown failed: {}", e);
        result?;
        return Err(e).context("Teardown failed");
    }

    result
}

/// Read the descriptor and run the optional CDC exchange.
fn run_probe(
    link: &mut UsbLink<rusb::DeviceHandle<rusb::Context>, io::Stdout>,
    args: &Args,
    config: &ProbeConfig,
) -> Result<()> {
    let len = read_device_descriptor(link).context("Failed to read device descriptor")?;
    info!("device descriptor read: {} bytes", len);

    if let Some(ref hex) = args.send {
        let data = parse_hex_bytes(hex)?;
        let sent = link
            .send_cdc(&data)
            .context("Failed to send CDC data")?;
        info!("sent {} bytes on the CDC OUT endpoint", sent);

        let mut buf = vec![0u8; config.transfer.read_len];
        match link.recv_cdc(&mut buf) {
            Ok(received) => info!("received {} bytes on the CDC IN endpoint", received),
            Err(usbcdc::Error::Transfer(rusb::Error::Timeout)) => {
                warn!("no CDC reply within the receive timeout");
            }
            Err(e) => return Err(e).context("Failed to receive CDC data"),
        }
    }

    Ok(())
}

/// List USB devices on the bus and exit.
fn list_devices(context: &rusb::Context) -> Result<()> {
    let devices = context.devices().context("Failed to enumerate devices")?;

    if devices.len() == 0 {
        println!("No USB devices found.");
        return Ok(());
    }

    println!("Found {} USB device(s):\n", devices.len());
    for device in devices.iter() {
        let desc = match device.device_descriptor() {
            Ok(desc) => desc,
            Err(e) => {
                warn!(
                    "skipping device on bus {} address {}: {}",
                    device.bus_number(),
                    device.address(),
                    e
                );
                continue;
            }
        };
        println!(
            "  Bus {:03} Device {:03}: {:04x}:{:04x} (class {:#04x})",
            device.bus_number(),
            device.address(),
            desc.vendor_id(),
            desc.product_id(),
            desc.class_code()
        );
    }

    Ok(())
}

/// Map the config verbosity (libusb 0-4) onto rusb's log level.
fn usb_log_level(verbosity: u8) -> rusb::LogLevel {
    match verbosity {
        0 => rusb::LogLevel::None,
        1 => rusb::LogLevel::Error,
        2 => rusb::LogLevel::Warning,
        3 => rusb::LogLevel::Info,
        _ => rusb::LogLevel::Debug,
    }
}

/// Parse hex bytes like "dead beef", "de:ad", or "deadbeef".
fn parse_hex_bytes(s: &str) -> Result<Vec<u8>> {
    let cleaned: String = s.chars().filter(|c| !c.is_whitespace() && *c != ':').collect();
    if cleaned.is_empty() {
        return Err(anyhow!("No bytes to send"));
    }
    // Reject non-hex (including non-ASCII) before slicing into byte pairs.
    if !cleaned.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(anyhow!("Invalid hex digit in '{}'", s));
    }
    if cleaned.len() % 2 != 0 {
        return Err(anyhow!("Odd number of hex digits in '{}'", s));
    }

    (0..cleaned.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&cleaned[i..i + 2], 16)
                .map_err(|_| anyhow!("Invalid hex byte '{}'", &cleaned[i..i + 2]))
        })
        .collect()
}
