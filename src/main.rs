//! netgear - command line client for Netgear routers
//!
//! Every command prints its result as JSON on stdout; logs go to stderr.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use netgear_soap::models::GuestBand;
use netgear_soap::{AllowOrBlock, Commit, Config, Router};
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "netgear")]
#[command(about = "Netgear router SOAP client", long_about = None)]
struct Args {
    /// Config file path (default: config.toml, /etc/netgear/config.toml, ~/.config/netgear/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Router address (discovered when omitted)
    #[arg(long, global = true)]
    host: Option<String>,

    /// SOAP port (probed when omitted)
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Use HTTPS for the SOAP endpoint
    #[arg(long, global = true)]
    tls: bool,

    #[arg(short, long, global = true)]
    user: Option<String>,

    #[arg(short, long, global = true)]
    password: Option<String>,

    #[arg(long, global = true, value_parser = ["auto", "modern", "legacy"])]
    login_method: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Locate the router on the local network
    Discover,
    /// Show /currentsetting.htm (no login needed)
    Setting,
    /// Show model, serial number and versions
    Info,
    /// List attached devices
    Devices,
    /// Show traffic statistics
    Traffic,
    /// Block a device by MAC address
    Block { mac: String },
    /// Allow a device by MAC address
    Allow { mac: String },
    /// Switch a guest network on or off
    GuestWifi {
        /// 2.4, 5 or 5-2
        band: GuestBand,
        state: Switch,
    },
    /// Check for new firmware
    Firmware,
    /// Install new firmware
    UpdateFirmware,
    /// Run the router's speed test
    SpeedTest,
    /// Reboot the router
    Reboot,
    /// Send a Wake-on-LAN packet
    Wake {
        mac: String,
        /// SecureOn password (12 hex digits)
        #[arg(long)]
        secure_on: Option<String>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Switch {
    On,
    Off,
}

#[derive(Serialize)]
struct CommitReport {
    response_code: u32,
    warning: Option<String>,
}

impl From<Commit> for CommitReport {
    fn from(commit: Commit) -> Self {
        Self {
            response_code: commit.response.response_code,
            warning: commit.warning.map(|w| w.to_string()),
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("Failed to serialize result")?;
    println!("{}", out);
    Ok(())
}

fn apply_args(cfg: &mut Config, args: &Args) {
    if let Some(host) = &args.host {
        cfg.router.host = Some(host.clone());
    }
    if let Some(port) = args.port {
        cfg.router.port = Some(port);
    }
    if args.tls {
        cfg.router.tls = true;
    }
    if let Some(user) = &args.user {
        cfg.router.username = user.clone();
    }
    if let Some(password) = &args.password {
        cfg.router.password = password.clone();
    }
    if let Some(method) = &args.login_method {
        cfg.router.login_method = method.clone();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut cfg = Config::load(args.config.as_deref()).context("Failed to load configuration")?;
    apply_args(&mut cfg, &args);

    // Initialize logging
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&cfg.logging.level)),
        )
        .init();

    let mut router = Router::from_config(&cfg).context("Failed to create router client")?;

    // Feature calls log in on demand
    let result = run(&mut router, args.command).await;

    if router.logged_in() {
        if let Err(e) = router.logout().await {
            tracing::warn!("Logout failed: {}", e);
        }
    }
    result
}

async fn run(router: &mut Router, command: Command) -> Result<()> {
    match command {
        Command::Discover => print_json(&router.discover().await?),
        Command::Setting => print_json(&router.get_current_setting().await?),
        Command::Info => print_json(&router.get_info().await?),
        Command::Devices => print_json(&router.get_attached_devices().await?),
        Command::Traffic => print_json(&router.get_traffic_meter().await?),
        Command::Block { mac } => {
            let commit = router.set_block_device(&mac, AllowOrBlock::Block).await?;
            print_json(&CommitReport::from(commit))
        }
        Command::Allow { mac } => {
            let commit = router.set_block_device(&mac, AllowOrBlock::Allow).await?;
            print_json(&CommitReport::from(commit))
        }
        Command::GuestWifi { band, state } => {
            let enabled = matches!(state, Switch::On);
            let commit = match band {
                GuestBand::G24 => router.set_guest_wifi(enabled).await?,
                GuestBand::G5 => router.set_5g_guest_wifi(enabled).await?,
                GuestBand::G5Second => router.set_5g_guest_wifi_2(enabled).await?,
            };
            print_json(&CommitReport::from(commit))
        }
        Command::Firmware => print_json(&router.check_new_firmware().await?),
        Command::UpdateFirmware => print_json(&CommitReport::from(router.update_new_firmware().await?)),
        Command::SpeedTest => print_json(&router.speed_test().await?),
        Command::Reboot => print_json(&CommitReport::from(router.reboot().await?)),
        Command::Wake { mac, secure_on } => {
            let sent = router.wake(&mac, secure_on.as_deref()).await?;
            print_json(&serde_json::json!({ "woke": sent }))
        }
    }
}
