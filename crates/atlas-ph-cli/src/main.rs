//! Atlas pH command-line tool
//!
//! Lists attached probes, takes single readings, queries or changes the baud
//! rate, and runs an interactive command loop.
//!
//! Usage:
//!   atlas-ph list [--json]
//!   atlas-ph --device DK0G4FXK read
//!   atlas-ph --device DK0G4FXK baud [--set 19200]
//!   atlas-ph --demo shell

mod logging;
mod shell;

use anyhow::{bail, Context, Result};
use atlas_ph_core::prelude::*;
use clap::{ArgAction, Parser, Subcommand};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Parser, Debug)]
#[command(name = "atlas-ph", version, about = "Drive Atlas Scientific pH probes over USB serial")]
struct Cli {
    /// USB serial number of the probe; defaults to the first one attached
    #[arg(short, long, global = true)]
    device: Option<String>,

    /// Settle delay after each command, in milliseconds
    #[arg(long, global = true, default_value_t = 1000)]
    settle_ms: u64,

    /// Deadline for a response line, in milliseconds
    #[arg(long, global = true, default_value_t = 2000)]
    timeout_ms: u64,

    /// Baud rate to open the port at
    #[arg(long, global = true, default_value_t = atlas_ph_core::transport::DEFAULT_BAUD_RATE)]
    baud: u32,

    /// Talk to a simulated probe instead of hardware
    #[arg(long, global = true)]
    demo: bool,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List attached device identifiers
    List {
        /// Print full device information as JSON
        #[arg(long)]
        json: bool,
    },
    /// Take one pH reading
    Read,
    /// Show or change the probe's baud rate
    Baud {
        /// New rate (300, 1200, 2400, 9600, 19200, 38400, 57600, 115200)
        #[arg(long)]
        set: Option<u32>,
    },
    /// Interactive command loop (default)
    Shell,
}

impl Cli {
    fn channel_config(&self) -> ChannelConfig {
        ChannelConfig::default()
            .with_baud_rate(self.baud)
            .with_settle_delay(Duration::from_millis(self.settle_ms))
            .with_read_timeout(Duration::from_millis(self.timeout_ms))
    }

    /// Longest a single command cycle can take
    fn cycle_time(&self) -> Duration {
        Duration::from_millis(self.settle_ms.saturating_add(self.timeout_ms))
    }
}

fn open_probe(cli: &Cli) -> Result<PhProbe> {
    let config = cli.channel_config();
    if cli.demo {
        info!("Using simulated probe");
        return Ok(PhProbe::new(Channel::from_link(
            "DEMO",
            SimulatedProbe::new(),
            config,
        )));
    }

    let device_id = match &cli.device {
        Some(id) => id.clone(),
        None => match device_ids().into_iter().next() {
            Some(id) => {
                info!("No device given, using {}", id);
                id
            }
            None => bail!("No devices attached; pass --device or use --demo"),
        },
    };

    PhProbe::open(&device_id, config).with_context(|| format!("Failed to open {}", device_id))
}

fn list(json: bool) -> Result<()> {
    let devices = list_devices();
    if json {
        println!("{}", serde_json::to_string_pretty(&devices)?);
        return Ok(());
    }

    if devices.is_empty() {
        warn!("No USB serial devices found");
    }
    for device in devices {
        match device.serial_number {
            Some(id) => println!("{}", id),
            None => debug!("Skipping {} (no serial number)", device.port_name),
        }
    }
    Ok(())
}

/// Run the interactive loop on a plain thread so a prompt blocked on stdin
/// never holds up shutdown
async fn run_shell(cli: &Cli, mut probe: PhProbe) -> Result<()> {
    let cancel = CancellationToken::new();
    let (done_tx, mut done_rx) = oneshot::channel();

    let shell_cancel = cancel.clone();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let result = shell::run(&mut probe, stdin.lock(), std::io::stdout(), &shell_cancel);
        let _ = done_tx.send(result);
    });

    tokio::select! {
        result = &mut done_rx => result.context("shell thread exited unexpectedly")?,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, stopping");
            cancel.cancel();

            // wait for an in-flight poll cycle so the channel closes cleanly
            let grace = cli.cycle_time().saturating_add(Duration::from_secs(1));
            match tokio::time::timeout(grace, &mut done_rx).await {
                Ok(Ok(result)) => result,
                Ok(Err(_)) => bail!("shell thread exited unexpectedly"),
                Err(_) => {
                    debug!("Shell still waiting on input, exiting anyway");
                    Ok(())
                }
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    debug!("{:?}", cli);

    match &cli.command {
        Some(Commands::List { json }) => list(*json),
        Some(Commands::Read) => {
            let mut probe = open_probe(&cli)?;
            let ph = tokio::task::block_in_place(|| probe.read_ph())?;
            println!("{:.3}", ph);
            Ok(())
        }
        Some(Commands::Baud { set: Some(rate) }) => {
            let rate = *rate;
            let mut probe = open_probe(&cli)?;
            if tokio::task::block_in_place(|| probe.set_baud(rate))? {
                println!("Baud rate set to {}", rate);
                Ok(())
            } else {
                bail!("Probe did not acknowledge baud rate {}", rate)
            }
        }
        Some(Commands::Baud { set: None }) => {
            let mut probe = open_probe(&cli)?;
            println!("{}", tokio::task::block_in_place(|| probe.get_baud())?);
            Ok(())
        }
        Some(Commands::Shell) | None => {
            let probe = open_probe(&cli)?;
            run_shell(&cli, probe).await
        }
    }
}
