//! hid-mouse-monitor
//!
//! Claims the first boot-protocol USB mouse it finds and prints its button,
//! axis and wheel changes. Reconnects after the mouse is unplugged.

use anyhow::{Context, Result};
use clap::Parser;
use common::{DEFAULT_EVENT_CAPACITY, EventPublisher, create_event_bridge, setup_logging};
use mouse::config::MonitorConfig;
use mouse::driver::MouseDriver;
use mouse::usb::RusbHost;
use protocol::{EventKind, MouseEvent};
use std::sync::Arc;
use tokio::signal;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "hid-mouse-monitor")]
#[command(author, version, about = "Print events from a USB boot-protocol mouse")]
#[command(long_about = "
Claims the first USB HID boot-protocol mouse it finds, detaching the kernel
driver from its interface, and prints every report it sends.

EXAMPLES:
    # Monitor with default config
    hid-mouse-monitor

    # List the devices the host would scan
    hid-mouse-monitor --list-devices

    # Exit once the mouse is unplugged, with debug logging
    hid-mouse-monitor --once --log-level debug

CONFIGURATION:
    The monitor looks for configuration files in the following order:
    1. Path specified with --config
    2. ~/.config/hid-mouse/monitor.toml
    3. /etc/hid-mouse/monitor.toml
    4. Built-in defaults
")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<std::path::PathBuf>,

    /// Save default configuration to default location and exit
    #[arg(long)]
    save_config: bool,

    /// List USB devices in the host table and exit
    #[arg(long)]
    list_devices: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Exit after the first disconnect instead of waiting for a new mouse
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.save_config {
        let config = MonitorConfig::default();
        let path = MonitorConfig::default_path();
        config.save(&path).context("Failed to save configuration")?;
        println!("Configuration saved to: {}", path.display());
        return Ok(());
    }

    let config = if let Some(ref path) = args.config {
        MonitorConfig::load(Some(path.clone())).context("Failed to load configuration")?
    } else {
        MonitorConfig::load_or_default()
    };

    let log_level = args
        .log_level
        .as_deref()
        .unwrap_or(&config.monitor.log_level);
    setup_logging(log_level).context("Failed to setup logging")?;

    info!("hid-mouse-monitor v{}", env!("CARGO_PKG_VERSION"));
    info!("Log level: {}", log_level);

    let (host, worker) = RusbHost::start(&config.usb, config.monitor.max_devices)
        .context("Failed to start USB host")?;

    let result = if args.list_devices {
        list_devices_mode(&host);
        Ok(())
    } else {
        run_monitor(&config, host.clone(), args.once).await
    };

    info!("Shutting down USB host...");
    host.shutdown();
    if let Err(e) = worker.join() {
        error!("Transfer worker thread panicked: {:?}", e);
    }

    result
}

/// List the device table and exit
fn list_devices_mode(host: &RusbHost) {
    let devices = host.describe_devices();

    if devices.is_empty() {
        println!("No USB devices found.");
        return;
    }

    println!("Found {} USB device(s):\n", devices.len());
    for device in devices {
        println!(
            "  [{}] {:04x}:{:04x} - {}{}",
            device.slot,
            device.vendor_id,
            device.product_id,
            device.product.as_deref().unwrap_or("Unknown Product"),
            if device.boot_mouse { " (boot mouse)" } else { "" }
        );
        println!("      Bus {:03} Device {:03}", device.bus, device.address);
        if let Some(driver) = &device.driver {
            println!("      Driver: {}", driver);
        }
        println!();
    }
}

/// Connect, print events, reconnect after teardown
async fn run_monitor(config: &MonitorConfig, host: Arc<RusbHost>, once: bool) -> Result<()> {
    let driver = MouseDriver::new(host.clone());
    let (publisher, subscriber) = create_event_bridge(DEFAULT_EVENT_CAPACITY);

    let mut retry = tokio::time::interval(config.monitor.connect_retry());
    retry.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let shutdown = signal::ctrl_c();
    tokio::pin!(shutdown);

    info!("Waiting for a boot mouse, press Ctrl+C to exit");
    let mut streaming = false;

    loop {
        tokio::select! {
            result = &mut shutdown => {
                match result {
                    Ok(()) => info!("Received Ctrl+C, shutting down..."),
                    Err(e) => error!("Error waiting for Ctrl+C: {}", e),
                }
                break;
            }

            event = subscriber.recv() => {
                let event = event.context("Event bridge closed")?;
                println!("{}", format_event(&event));
            }

            _ = retry.tick() => {
                if driver.connected() {
                    continue;
                }

                if streaming && driver.claim().is_none() {
                    info!("Mouse disconnected");
                    streaming = false;
                    if once {
                        break;
                    }
                }

                streaming = try_connect(&driver, &publisher).await?;
            }
        }
    }

    let stats = driver.stats();
    info!(
        "Transfers: {} completed ({} empty), {} submitted, {} events dropped",
        stats.completed,
        stats.empty,
        stats.submitted,
        publisher.dropped()
    );
    driver.init();
    Ok(())
}

/// Refresh the device table and attempt one connection
///
/// Observers are installed before every attempt because a failed scan or a
/// teardown resets the driver, clearing them.
async fn try_connect(driver: &MouseDriver<RusbHost>, publisher: &EventPublisher) -> Result<bool> {
    for kind in EventKind::ALL {
        let publisher = publisher.clone();
        driver.subscribe(
            kind,
            Arc::new(move |event: MouseEvent| {
                publisher.publish(event);
            }),
        );
    }

    let driver = driver.clone();
    let connected = tokio::task::spawn_blocking(move || {
        if let Err(e) = driver.host().refresh() {
            warn!("Failed to refresh device table: {}", e);
        }

        match driver.connect_checked() {
            Ok(()) => {
                info!(
                    "Mouse streaming on interface {}",
                    driver.interface_index()
                );
                true
            }
            Err(e) => {
                debug!("No mouse connected: {}", e);
                false
            }
        }
    })
    .await
    .context("Connect task failed")?;

    Ok(connected)
}

fn format_event(event: &MouseEvent) -> String {
    match event {
        MouseEvent::Update(report) => format!(
            "update  buttons=[{}{}{}] x={:4} y={:4} wheel={:4}",
            if report.buttons.left() { 'L' } else { '-' },
            if report.buttons.middle() { 'M' } else { '-' },
            if report.buttons.right() { 'R' } else { '-' },
            report.x,
            report.y,
            report.wheel
        ),
        MouseEvent::Buttons(buttons) => format!("buttons {:#05b}", buttons.bits()),
        MouseEvent::X(x) => format!("x       {}", x),
        MouseEvent::Y(y) => format!("y       {}", y),
        MouseEvent::Z(z) => format!("wheel   {}", z),
    }
}
