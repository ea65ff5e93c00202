use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SimError;
use crate::mac::MacStrategy;
use crate::utils::consts::*;

/// Parameters of one simulation run. Every field has a default, so a JSON
/// config only needs the values it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub protocol: MacStrategy,
    pub stations: usize,
    pub packets_per_station: u64,
    /// Station slot time, the unit of every backoff delay.
    pub interval_ms: u64,
    /// Mean gap between packet arrivals at one station.
    pub packet_gap_ms: u64,
    pub response_timeout_ms: u64,
    pub airtime_ms: u64,
    pub sense_time_ms: u64,
    pub reservation_ms: u64,
    pub loss_probability: f64,
    pub seed: u64,
    /// How long stations may keep going after shutdown before they are left
    /// behind.
    pub shutdown_grace_ms: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            protocol: MacStrategy::default(),
            stations: DEFAULT_STATIONS,
            packets_per_station: DEFAULT_PACKETS_PER_STATION,
            interval_ms: DEFAULT_INTERVAL_MS,
            packet_gap_ms: DEFAULT_PACKET_GAP_MS,
            response_timeout_ms: DEFAULT_RESPONSE_TIMEOUT_MS,
            airtime_ms: DEFAULT_AIRTIME_MS,
            sense_time_ms: DEFAULT_SENSE_TIME_MS,
            reservation_ms: DEFAULT_RESERVATION_MS,
            loss_probability: DEFAULT_LOSS_PROBABILITY,
            seed: DEFAULT_SEED,
            shutdown_grace_ms: DEFAULT_SHUTDOWN_GRACE_MS,
        }
    }
}

impl SimConfig {
    pub fn from_json_file(path: &Path) -> Result<Self, SimError> {
        let file = File::open(path)?;
        let config = serde_json::from_reader(BufReader::new(file))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SimError> {
        if self.stations == 0 {
            return Err(SimError::InvalidConfig(
                "stations must be > 0".to_string(),
            ));
        }
        if self.interval_ms == 0 {
            return Err(SimError::InvalidConfig(
                "interval_ms must be > 0".to_string(),
            ));
        }
        if self.airtime_ms == 0 {
            return Err(SimError::InvalidConfig(
                "airtime_ms must be > 0".to_string(),
            ));
        }
        // A response can only come back once the access point closes the
        // contention window of the frame.
        if self.response_timeout_ms <= self.airtime_ms {
            return Err(SimError::InvalidConfig(format!(
                "response_timeout_ms ({}) must exceed airtime_ms ({})",
                self.response_timeout_ms, self.airtime_ms
            )));
        }
        if self.reservation_ms <= self.response_timeout_ms {
            return Err(SimError::InvalidConfig(format!(
                "reservation_ms ({}) must exceed response_timeout_ms ({})",
                self.reservation_ms, self.response_timeout_ms
            )));
        }
        if !(0.0..=1.0).contains(&self.loss_probability) {
            return Err(SimError::InvalidConfig(format!(
                "loss_probability must be within [0, 1], got {}",
                self.loss_probability
            )));
        }
        // CSMA/CA retries a packet until it is acknowledged.
        if self.protocol == MacStrategy::CsmaCa && self.loss_probability >= 1.0 {
            return Err(SimError::InvalidConfig(
                "csma-ca needs loss_probability < 1 to finish a packet".into(),
            ));
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn packet_gap(&self) -> Duration {
        Duration::from_millis(self.packet_gap_ms)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    pub fn airtime(&self) -> Duration {
        Duration::from_millis(self.airtime_ms)
    }

    pub fn sense_time(&self) -> Duration {
        Duration::from_millis(self.sense_time_ms)
    }

    pub fn reservation(&self) -> Duration {
        Duration::from_millis(self.reservation_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    /// Independent seed per station so stations never share a random stream.
    pub fn station_seed(&self, station: usize) -> u64 {
        self.seed ^ (station as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
    }

    /// Seed of the access point's loss draws.
    pub fn access_point_seed(&self) -> u64 {
        self.seed.rotate_left(17) ^ 0xA11C_E5ED
    }
}
