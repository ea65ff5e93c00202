use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use macsim_rs::mac::MacStrategy;
use macsim_rs::sim::{SimConfig, run_simulation};
use macsim_rs::ui::print_banner;
use macsim_rs::ui::progress::ProgressManager;
use macsim_rs::utils::logging::init_logging;
use macsim_rs::SimError;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(author, version, about = "Wireless MAC contention simulator", long_about = None)]
struct Cli {
    /// null-mac, null-mac-exponential-backoff, csma-ca or rts-cts
    #[arg(short, long)]
    protocol: Option<MacStrategy>,
    #[arg(short, long)]
    stations: Option<usize>,
    /// Packets generated per station
    #[arg(short = 'n', long)]
    packets: Option<u64>,
    /// Slot time scaling every backoff delay
    #[arg(long)]
    interval_ms: Option<u64>,
    /// Mean gap between packet arrivals
    #[arg(long)]
    gap_ms: Option<u64>,
    /// Probability that a frame heard alone is still lost
    #[arg(long)]
    loss: Option<f64>,
    #[arg(long)]
    seed: Option<u64>,
    /// JSON config file, flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Write the final report as JSON
    #[arg(short, long)]
    report: Option<PathBuf>,
    /// No progress bars
    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    fn apply(&self, config: &mut SimConfig) {
        if let Some(protocol) = self.protocol {
            config.protocol = protocol;
        }
        if let Some(stations) = self.stations {
            config.stations = stations;
        }
        if let Some(packets) = self.packets {
            config.packets_per_station = packets;
        }
        if let Some(interval) = self.interval_ms {
            config.interval_ms = interval;
        }
        if let Some(gap) = self.gap_ms {
            config.packet_gap_ms = gap;
        }
        if let Some(loss) = self.loss {
            config.loss_probability = loss;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
    }
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), SimError> {
    let mut config = match &cli.config {
        Some(path) => SimConfig::from_json_file(path)?,
        None => SimConfig::default(),
    };
    cli.apply(&mut config);
    config.validate()?;
    print_banner(&config);

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    // First Ctrl+C stops packet generation and lets stations drain, the
    // second one exits at once
    ctrlc::set_handler(move || {
        if !r.swap(false, Ordering::SeqCst) {
            std::process::exit(130);
        }
    })
    .unwrap_or_else(|err| warn!("Error setting Ctrl-C handler: {}", err));

    let progress = if cli.quiet {
        ProgressManager::hidden()
    } else {
        ProgressManager::new()
    };
    let report = run_simulation(&config, Some(Arc::new(progress)), running)?;
    report.log_summary();

    if let Some(path) = &cli.report {
        report.write_json(path)?;
        info!("Report written to {}", path.display());
    }
    Ok(())
}
