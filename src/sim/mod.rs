//! Host simulation: a set of stations running one MAC strategy against a
//! single access point over a lossy shared channel.

pub mod access_point;
pub mod config;
pub mod station;

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::SimError;
use crate::mac::{MacStation, MacStrategy};
use crate::ui::progress::{ProgressManager, templates};
use crate::utils::consts::STATION_POLL_MS;
use access_point::{AccessPoint, Medium, MediumStats, StationId};
pub use config::SimConfig;
use station::{SimStation, StationReport, StationStats, station_bar_id};

#[derive(Debug, Clone, Serialize)]
pub struct SimReport {
    pub protocol: MacStrategy,
    pub config: SimConfig,
    pub elapsed_secs: f64,
    pub stations: Vec<StationReport>,
    pub medium: MediumStats,
    /// Stations that were still busy when the run stopped waiting for them.
    pub unfinished_stations: Vec<StationId>,
}

impl SimReport {
    pub fn packets(&self) -> u64 {
        self.stations.iter().map(|s| s.packets).sum()
    }

    pub fn acked(&self) -> u64 {
        self.stations.iter().map(|s| s.acked).sum()
    }

    pub fn lost(&self) -> u64 {
        self.stations.iter().map(|s| s.dropped + s.rejected).sum()
    }

    pub fn data_sent(&self) -> u64 {
        self.stations.iter().map(|s| s.data_sent).sum()
    }

    /// Acked packets per DATA frame put on the air.
    pub fn efficiency(&self) -> f64 {
        match self.data_sent() {
            0 => 0.0,
            sent => self.acked() as f64 / sent as f64,
        }
    }

    pub fn log_summary(&self) {
        info!(
            "{}: {} stations, {} packets in {:.2} s",
            self.protocol,
            self.stations.len(),
            self.packets(),
            self.elapsed_secs
        );
        for s in &self.stations {
            info!(
                "  station {}: acked {}, dropped {}, rejected {}, DATA {}, RTS {}, backoff {:.1} ms",
                s.station,
                s.acked,
                s.dropped,
                s.rejected,
                s.data_sent,
                s.rts_sent,
                s.backoff_ms
            );
        }
        info!(
            "Channel: {} frames heard, {} collisions, {} lost, {} ACK, {} CTS",
            self.medium.frames_heard,
            self.medium.collisions,
            self.medium.losses,
            self.medium.acks,
            self.medium.grants
        );
        info!(
            "Delivered {}/{} packets, efficiency {:.1}%",
            self.acked(),
            self.packets(),
            self.efficiency() * 100.0
        );
        if !self.unfinished_stations.is_empty() {
            warn!(
                "Stations {:?} were still busy when the run ended",
                self.unfinished_stations
            );
        }
    }

    pub fn write_json(&self, path: &Path) -> Result<(), SimError> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        debug!("Report written to {}", path.display());
        Ok(())
    }
}

/// Runs every station to completion and reports what happened. Clearing
/// `running` stops packet generation; stations finish the packet they hold
/// and exit. A station still busy `shutdown_grace` after that is left behind
/// and listed in [`SimReport::unfinished_stations`].
pub fn run_simulation(
    config: &SimConfig,
    progress: Option<Arc<ProgressManager>>,
    running: Arc<AtomicBool>,
) -> Result<SimReport, SimError> {
    config.validate()?;
    info!(
        "Simulating {} with {} stations, {} packets each",
        config.protocol, config.stations, config.packets_per_station
    );

    let start_time = Instant::now();
    let medium = Arc::new(Medium::new());
    let (outbox, inbox) = crossbeam_channel::unbounded();
    let (reply_txs, reply_rxs): (Vec<_>, Vec<_>) =
        (0..config.stations).map(|_| crossbeam_channel::unbounded()).unzip();

    let access_point = AccessPoint::new(config, medium.clone(), inbox, reply_txs);
    let ap_handle = thread::Builder::new()
        .name("access-point".to_string())
        .spawn(move || access_point.run())?;

    let mut stations: Vec<StationThread> = Vec::with_capacity(config.stations);
    let mut traffic = Vec::with_capacity(config.stations);
    let mut spawn_error = None;
    for (id, replies) in reply_rxs.into_iter().enumerate() {
        if let Some(progress) = &progress {
            progress
                .create_bar(
                    &station_bar_id(id),
                    config.packets_per_station,
                    templates::STATION,
                    &format!("station {}", id),
                )
                .unwrap_or_else(|err| {
                    debug!("Error while creating station bar: {:?}", err)
                });
        }

        let (packet_tx, packet_rx) = crossbeam_channel::unbounded();
        let link = SimStation::new(
            id,
            config,
            packet_rx,
            outbox.clone(),
            replies,
            medium.clone(),
            running.clone(),
            progress.clone(),
        );
        let stats = link.stats();
        let mut mac = MacStation::new(
            config.protocol,
            link,
            StdRng::seed_from_u64(config.station_seed(id)),
        );
        match thread::Builder::new()
            .name(format!("station-{}", id))
            .spawn(move || mac.run())
        {
            Ok(handle) => stations.push((id, handle, stats)),
            Err(err) => {
                spawn_error = Some(err);
                break;
            }
        }

        let generator = TrafficGenerator {
            station: id,
            packets: config.packets_per_station,
            mean_gap: config.packet_gap(),
            rng: StdRng::seed_from_u64(!config.station_seed(id)),
            running: running.clone(),
        };
        match thread::Builder::new()
            .name(format!("traffic-{}", id))
            .spawn(move || generator.run(packet_tx))
        {
            Ok(handle) => traffic.push(handle),
            Err(err) => {
                spawn_error = Some(err);
                break;
            }
        }
    }
    // The access point stops once the last station drops its sender.
    drop(outbox);

    if let Some(err) = spawn_error {
        warn!("Could not spawn every thread, stopping: {}", err);
        abort_run(&running, traffic, stations, config.shutdown_grace());
        return Err(err.into());
    }

    for handle in traffic {
        handle
            .join()
            .map_err(|_| SimError::Thread("traffic generator panicked".into()))?;
    }
    let (reports, unfinished_stations) =
        join_stations(stations, &running, config.shutdown_grace())?;
    if unfinished_stations.is_empty() {
        ap_handle
            .join()
            .map_err(|_| SimError::Thread("access point panicked".into()))?;
    }

    if let Some(progress) = &progress {
        progress.finish_all();
    }

    Ok(SimReport {
        protocol: config.protocol,
        config: config.clone(),
        elapsed_secs: start_time.elapsed().as_secs_f64(),
        stations: reports,
        medium: medium.stats(),
        unfinished_stations,
    })
}

type StationThread = (StationId, JoinHandle<()>, Arc<StationStats>);

/// Waits for every station thread. Once `running` is cleared, stations still
/// busy after `grace` are left detached and returned as unfinished.
fn join_stations(
    stations: Vec<StationThread>,
    running: &AtomicBool,
    grace: Duration,
) -> Result<(Vec<StationReport>, Vec<StationId>), SimError> {
    let mut stopped_at = None;
    while !stations.iter().all(|(_, handle, _)| handle.is_finished()) {
        if !running.load(Ordering::SeqCst) {
            let since = *stopped_at.get_or_insert_with(Instant::now);
            if since.elapsed() >= grace {
                break;
            }
        }
        thread::sleep(Duration::from_millis(STATION_POLL_MS));
    }

    let mut reports = Vec::with_capacity(stations.len());
    let mut unfinished = Vec::new();
    for (id, handle, stats) in stations {
        if handle.is_finished() {
            handle.join().map_err(|_| {
                SimError::Thread(format!("station {} panicked", id))
            })?;
        } else {
            warn!("Station {} did not stop within the grace period", id);
            unfinished.push(id);
        }
        reports.push(stats.snapshot(id));
    }
    Ok((reports, unfinished))
}

/// Stops a partially started run: no new packets, every spawned thread
/// joined or, for stuck stations, left behind after `grace`.
fn abort_run(
    running: &AtomicBool,
    traffic: Vec<JoinHandle<()>>,
    stations: Vec<StationThread>,
    grace: Duration,
) {
    running.store(false, Ordering::SeqCst);
    for handle in traffic {
        if handle.join().is_err() {
            warn!("Traffic generator panicked during shutdown");
        }
    }
    if let Err(err) = join_stations(stations, running, grace) {
        warn!("{}", err);
    }
}

/// Feeds one station's packet queue with gaps drawn uniformly from
/// `[0, 2 * mean_gap]`.
struct TrafficGenerator {
    station: StationId,
    packets: u64,
    mean_gap: Duration,
    rng: StdRng,
    running: Arc<AtomicBool>,
}

impl TrafficGenerator {
    fn run(mut self, queue: Sender<u64>) {
        let max_gap_us =
            u64::try_from(self.mean_gap.as_micros() * 2).unwrap_or(u64::MAX);
        for seq in 0..self.packets {
            if !self.running.load(Ordering::SeqCst) {
                debug!("Traffic for station {} interrupted", self.station);
                break;
            }
            let gap = self.rng.random_range(0..=max_gap_us);
            thread::sleep(Duration::from_micros(gap));
            if queue.send(seq).is_err() {
                break;
            }
        }
        // Dropping the queue tells the station no more packets will come.
    }
}
