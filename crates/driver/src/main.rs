//! usb-led
//!
//! Userspace driver for a three-LED USB peripheral. Lists connected devices,
//! switches LEDs in one shot, or runs a hot-plug daemon with an interactive
//! console.

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use common::{InterfaceKey, UsbBridge, UsbCommand, UsbEvent, create_usb_bridge, setup_logging};
use driver::config::DriverConfig;
use driver::console::{self, ConsoleCommand, ConsoleInput};
use driver::usb::{LifecycleManager, UsbInterface, find_led_interfaces, spawn_usb_worker};
use driver::{AttributeDirectory, Caller};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "usb-led")]
#[command(author, version, about = "Control the LEDs of a USB LED peripheral")]
#[command(long_about = "
Drives a three-LED peripheral attached through a CP210x USB-to-TTL adapter
(10c4:ea60). Each LED change is a single byte written to the adapter's bulk
OUT endpoint.

EXAMPLES:
    # List connected LED devices
    usb-led list

    # Turn LED 1 and 3 on, LED 2 off
    usb-led set led1=1 led2=0 led3=1

    # Run the hot-plug daemon with an interactive console
    usb-led serve

CONFIGURATION:
    The driver looks for configuration files in the following order:
    1. Path specified with --config
    2. ~/.config/usb-led/driver.toml
    3. /etc/usb-led/driver.toml
    4. Built-in defaults
")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "PATH", global = true)]
    config: Option<String>,

    /// Save default configuration to default location and exit
    #[arg(long)]
    save_config: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL", global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List connected LED devices
    List,

    /// Attach, switch LEDs in order, and detach
    ///
    /// LED state is not kept between runs; LEDs not named start off.
    Set {
        /// Device to use (BBB-AAA:I); defaults to the first one found
        #[arg(short, long, value_name = "DEVICE")]
        device: Option<InterfaceKey>,

        /// Assignments such as led1=1
        #[arg(required = true, value_parser = parse_assignment)]
        assignments: Vec<(String, String)>,
    },

    /// Run the hot-plug daemon with an interactive console (default)
    Serve,
}

fn parse_assignment(s: &str) -> std::result::Result<(String, String), String> {
    s.split_once('=')
        .map(|(led, value)| (led.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected <led>=<0|1>, got '{}'", s))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.save_config {
        let config = DriverConfig::default();
        let path = DriverConfig::default_path();
        config.save(&path).context("Failed to save configuration")?;
        println!("Configuration saved to: {}", path.display());
        return Ok(());
    }

    let config = if let Some(ref path) = args.config {
        DriverConfig::load_expanded(path).context("Failed to load configuration")?
    } else {
        DriverConfig::load_or_default().context("Failed to load configuration")?
    };

    let log_level = args
        .log_level
        .as_deref()
        .unwrap_or(&config.driver.log_level);

    setup_logging(log_level).context("Failed to setup logging")?;

    info!("usb-led v{}", env!("CARGO_PKG_VERSION"));

    match args.command.unwrap_or(Command::Serve) {
        Command::List => tokio::task::spawn_blocking(list_devices)
            .await
            .context("List task panicked")?,
        Command::Set {
            device,
            assignments,
        } => tokio::task::spawn_blocking(move || set_leds(&config, device, &assignments))
            .await
            .context("Set task panicked")?,
        Command::Serve => run_serve(config).await,
    }
}

/// List connected LED devices without attaching
fn list_devices() -> Result<()> {
    let context = rusb::Context::new().context("Failed to initialize libusb")?;
    let interfaces = find_led_interfaces(&context).context("Failed to enumerate USB devices")?;

    if interfaces.is_empty() {
        println!("No LED devices found.");
        return Ok(());
    }

    println!("Found {} LED interface(s):\n", interfaces.len());
    for interface in interfaces {
        println!(
            "  {}  {:04x}:{:04x}  Bus {:03} Device {:03}",
            interface.key(),
            interface.vendor_id(),
            interface.product_id(),
            interface.bus_number(),
            interface.device_address()
        );
    }

    Ok(())
}

/// One-shot attach, store each assignment, detach
fn set_leds(
    config: &DriverConfig,
    device: Option<InterfaceKey>,
    assignments: &[(String, String)],
) -> Result<()> {
    let context = rusb::Context::new().context("Failed to initialize libusb")?;
    let mut interfaces = find_led_interfaces(&context)
        .context("Failed to enumerate USB devices")?
        .into_iter();

    let interface = match device {
        Some(key) => interfaces
            .find(|interface| interface.key() == key)
            .ok_or_else(|| anyhow!("LED device {} not found", key))?,
        None => interfaces
            .next()
            .ok_or_else(|| anyhow!("No LED device found"))?,
    };

    let manager = LifecycleManager::new(Arc::new(AttributeDirectory::new()), config.controller());
    let key = manager
        .attach(&interface)
        .with_context(|| format!("Failed to attach {}", interface.key()))?;

    let result = assignments.iter().try_for_each(|(led, value)| {
        manager
            .store(key, led, Caller::Owner, value)
            .map(|_| ())
            .with_context(|| format!("Failed to set {}={}", led, value))
    });

    let state = manager.context(key).map(|ctx| ctx.color());
    manager.detach(key)?;
    result?;

    if let Some(state) = state {
        println!("{} state {}", key, state);
    }
    Ok(())
}

/// Run the hot-plug daemon until Ctrl+C, `quit` or end of console input
async fn run_serve(config: DriverConfig) -> Result<()> {
    let directory = Arc::new(AttributeDirectory::new());
    let manager = Arc::new(LifecycleManager::new(
        directory.clone(),
        config.controller(),
    ));
    let caller = config.console.caller();

    let (usb_bridge, worker) = create_usb_bridge();
    let usb_worker_handle = spawn_usb_worker(worker, Arc::clone(&manager))
        .context("Failed to spawn USB worker thread")?;

    let events = usb_bridge.clone();
    let event_task = tokio::spawn(async move {
        while let Ok(event) = events.recv_event().await {
            match event {
                UsbEvent::DeviceAttached {
                    key,
                    vendor_id,
                    product_id,
                } => println!(
                    "+ {} {:04x}:{:04x} [{}]",
                    key,
                    vendor_id,
                    product_id,
                    directory.exposed(key).join(" ")
                ),
                UsbEvent::DeviceDetached { key } => println!("- {}", key),
                UsbEvent::AttachFailed { key, reason } => println!("! {}: {}", key, reason),
            }
        }
    });

    println!("{}", console::HELP);
    info!("Press Ctrl+C to shutdown");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let ctrl_c = signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            result = &mut ctrl_c => {
                if let Err(e) = result {
                    error!("Error waiting for Ctrl+C: {}", e);
                }
                info!("Received Ctrl+C, shutting down gracefully...");
                break;
            }
            line = lines.next_line() => match ConsoleInput::from_read(line) {
                ConsoleInput::Line(line) => {
                    if !handle_line(&line, &manager, caller, &usb_bridge).await {
                        break;
                    }
                }
                ConsoleInput::Closed => {
                    info!("Console input closed, shutting down...");
                    break;
                }
            },
        }
    }

    info!("Shutting down USB subsystem...");
    if let Err(e) = usb_bridge.send_command(UsbCommand::Shutdown).await {
        error!("Error shutting down USB worker: {:#}", e);
    }

    match tokio::task::spawn_blocking(move || usb_worker_handle.join()).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => error!("USB worker failed: {}", e),
        Ok(Err(e)) => error!("USB worker thread panicked: {:?}", e),
        Err(e) => error!("Failed to join USB worker: {}", e),
    }

    event_task.abort();
    info!("Daemon shutdown complete");
    Ok(())
}

/// Handle one console line; returns false when the daemon should stop
async fn handle_line(
    line: &str,
    manager: &Arc<LifecycleManager>,
    caller: Caller,
    usb_bridge: &UsbBridge,
) -> bool {
    let command = match console::parse_command(line) {
        Ok(Some(command)) => command,
        Ok(None) => return true,
        Err(e) => {
            eprintln!("error: {}", e);
            return true;
        }
    };

    match command {
        ConsoleCommand::Quit => return false,
        ConsoleCommand::Help => println!("{}", console::HELP),
        ConsoleCommand::List => {
            if let Err(e) = list_attached(usb_bridge).await {
                eprintln!("error: {:#}", e);
            }
        }
        command => {
            // Stores block for the transfer; run them off the runtime and concurrently
            let manager = Arc::clone(manager);
            tokio::spawn(async move {
                match tokio::task::spawn_blocking(move || {
                    console::execute(&manager, caller, command)
                })
                .await
                {
                    Ok(Ok(reply)) => println!("{}", reply),
                    Ok(Err(e)) => eprintln!("error: {}", e),
                    Err(e) => error!("Console task panicked: {}", e),
                }
            });
        }
    }

    true
}

/// Ask the USB thread for the attached devices and print them
async fn list_attached(usb_bridge: &UsbBridge) -> Result<()> {
    let (tx, rx) = tokio::sync::oneshot::channel();
    usb_bridge
        .send_command(UsbCommand::ListAttached { response: tx })
        .await
        .context("Failed to send ListAttached command")?;

    let devices = rx.await.context("Failed to receive device list")?;

    if devices.is_empty() {
        println!("No LED devices attached.");
    }
    for device in devices {
        println!(
            "  {}  {:04x}:{:04x}  state {}",
            device.key, device.vendor_id, device.product_id, device.state
        );
    }

    Ok(())
}
