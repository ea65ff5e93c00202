/// Log level (overridden by RUST_LOG)
pub const LOG_LEVEL: &str = "info";

// ============================================================================
// MAC Parameters
// ============================================================================

/// Total DATA transmissions allowed per packet by the NullMac family.
pub const NULL_MAC_MAX_ATTEMPTS: u32 = 3;

/// First attempt index of the exponential-backoff NullMac.
pub const BACKOFF_FIRST_ATTEMPT: u32 = 1;

/// First attempt index of the CSMA/CA family (CSMA/CA and the RTS/CTS data
/// phase).
pub const CSMA_FIRST_ATTEMPT: u32 = 1;

// ============================================================================
// Simulation Defaults
// ============================================================================

/// Number of contending stations.
pub const DEFAULT_STATIONS: usize = 3;

/// Packets queued by each station before it shuts down.
pub const DEFAULT_PACKETS_PER_STATION: u64 = 20;

/// Station slot time in milliseconds, the unit of every backoff delay.
pub const DEFAULT_INTERVAL_MS: u64 = 5;

/// Mean gap between two packets arriving at a station (milliseconds).
pub const DEFAULT_PACKET_GAP_MS: u64 = 20;

/// How long a station waits for ACK/CTS before declaring no response.
pub const DEFAULT_RESPONSE_TIMEOUT_MS: u64 = 30;

/// On-air duration of one frame. Frames starting within this window of
/// each other collide at the access point.
pub const DEFAULT_AIRTIME_MS: u64 = 4;

/// Duration of one carrier sense.
pub const DEFAULT_SENSE_TIME_MS: u64 = 1;

/// How long a granted CTS holds the medium without hearing DATA.
pub const DEFAULT_RESERVATION_MS: u64 = 200;

/// Probability that a frame heard alone is still lost.
pub const DEFAULT_LOSS_PROBABILITY: f64 = 0.05;

/// Seed for every per-station and access point random generator.
pub const DEFAULT_SEED: u64 = 0x5EED;

/// How long stations may keep running after shutdown is requested before the
/// simulation stops waiting for them.
pub const DEFAULT_SHUTDOWN_GRACE_MS: u64 = 2000;

/// Poll period of the driver while it waits for station threads.
pub const STATION_POLL_MS: u64 = 10;
