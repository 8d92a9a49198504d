use clap::Parser;
use gpio_security_monitor::config::MonitorConfig;
use gpio_security_monitor::error::Result;
use gpio_security_monitor::gpio::{GpioBackend, SimulatedGpioBackend};
use gpio_security_monitor::instance_lock::InstanceLock;
use gpio_security_monitor::service::SecurityMonitor;
use log::{error, info};
use std::path::PathBuf;
use std::time::Duration;
use tokio::signal;
use tokio::signal::unix::{SignalKind, signal as unix_signal};

#[derive(Parser, Debug)]
#[command(name = "security-monitor", version, about = "GPIO security monitor")]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(default_value = "config.json", env = "SECURITY_MONITOR_CONFIG")]
    config: PathBuf,

    /// Toggle simulated lines on a timer instead of reading hardware
    #[arg(long)]
    simulate: bool,

    /// Interval between simulated toggles, in seconds
    #[arg(long, default_value_t = 30, requires = "simulate")]
    simulate_period: u64,

    /// GPIO character device to request lines from
    #[arg(long, default_value = "/dev/gpiochip0")]
    chip: PathBuf,
}

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

fn gpio_backend(cli: &Cli) -> Result<Box<dyn GpioBackend>> {
    if cli.simulate {
        info!(
            "Using simulated GPIO backend (toggling every {}s)",
            cli.simulate_period
        );
        return Ok(Box::new(SimulatedGpioBackend::new(Duration::from_secs(
            cli.simulate_period,
        ))));
    }

    #[cfg(feature = "hardware-gpio")]
    {
        info!("Using GPIO character device {}", cli.chip.display());
        Ok(Box::new(gpio_security_monitor::gpio::CdevGpioBackend::new(
            &cli.chip,
        )))
    }
    #[cfg(not(feature = "hardware-gpio"))]
    {
        let _ = &cli.chip;
        Err(gpio_security_monitor::error::MonitorError::GpioUnavailable)
    }
}

async fn wait_for_shutdown_signal() {
    let mut sigterm = unix_signal(SignalKind::terminate()).expect("Failed to register SIGTERM");
    tokio::select! {
        _ = signal::ctrl_c() => info!("Received SIGINT signal"),
        _ = sigterm.recv() => info!("Received SIGTERM signal"),
    }
}

async fn run(cli: Cli) -> Result<()> {
    info!("Starting GPIO Security Monitor");

    let _lock = InstanceLock::acquire()?;

    info!("Loading configuration from {}", cli.config.display());
    let config = MonitorConfig::load(&cli.config)?;

    let gpio = gpio_backend(&cli)?;

    let mut service = SecurityMonitor::new(config);
    service.start(gpio.as_ref()).await?;

    info!("Press Ctrl+C to stop monitoring");
    wait_for_shutdown_signal().await;

    service.shutdown().await;
    Ok(())
}

#[tokio::main]
async fn main() {
    init_logger();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}
