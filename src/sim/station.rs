use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use serde::Serialize;
use tracing::{debug, trace, warn};

use super::access_point::{Medium, StationId, Transmission};
use super::config::SimConfig;
use crate::mac::{Delivery, FrameKind, StationLink};
use crate::ui::progress::ProgressManager;

/// Per-station counters, shared with the simulation driver.
#[derive(Debug, Default)]
pub struct StationStats {
    packets: AtomicU64,
    data_sent: AtomicU64,
    rts_sent: AtomicU64,
    acked: AtomicU64,
    dropped: AtomicU64,
    rejected: AtomicU64,
    backoff_us: AtomicU64,
    stale_replies: AtomicU64,
}

impl StationStats {
    pub fn snapshot(&self, station: StationId) -> StationReport {
        StationReport {
            station,
            packets: self.packets.load(Ordering::Relaxed),
            data_sent: self.data_sent.load(Ordering::Relaxed),
            rts_sent: self.rts_sent.load(Ordering::Relaxed),
            acked: self.acked.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            backoff_ms: self.backoff_us.load(Ordering::Relaxed) as f64 / 1000.0,
            stale_replies: self.stale_replies.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationReport {
    pub station: StationId,
    /// Packets taken from the queue.
    pub packets: u64,
    pub data_sent: u64,
    pub rts_sent: u64,
    pub acked: u64,
    /// Packets given up after the retry limit.
    pub dropped: u64,
    /// Packets given up because the RTS got no CTS.
    pub rejected: u64,
    /// Total time spent in backoff sleeps.
    pub backoff_ms: f64,
    /// Responses that arrived after their exchange had timed out.
    pub stale_replies: u64,
}

pub fn station_bar_id(station: StationId) -> String {
    format!("station-{}", station)
}

/// [`StationLink`] over the simulated channel: packets come from a queue,
/// frames go to the access point and responses come back on a private
/// channel.
pub struct SimStation {
    id: StationId,
    packets: Receiver<u64>,
    outbox: Sender<Transmission>,
    replies: Receiver<FrameKind>,
    medium: Arc<Medium>,
    running: Arc<AtomicBool>,
    stats: Arc<StationStats>,
    progress: Option<Arc<ProgressManager>>,
    interval: Duration,
    response_timeout: Duration,
    sense_time: Duration,
    current: Option<u64>,
}

impl SimStation {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: StationId,
        config: &SimConfig,
        packets: Receiver<u64>,
        outbox: Sender<Transmission>,
        replies: Receiver<FrameKind>,
        medium: Arc<Medium>,
        running: Arc<AtomicBool>,
        progress: Option<Arc<ProgressManager>>,
    ) -> Self {
        Self {
            id,
            packets,
            outbox,
            replies,
            medium,
            running,
            stats: Arc::new(StationStats::default()),
            progress,
            interval: config.interval(),
            response_timeout: config.response_timeout(),
            sense_time: config.sense_time(),
            current: None,
        }
    }

    pub fn stats(&self) -> Arc<StationStats> {
        self.stats.clone()
    }

    fn finish_progress(&self) {
        if let Some(progress) = &self.progress {
            progress
                .finish(&station_bar_id(self.id), "done")
                .unwrap_or_else(|err| {
                    debug!("Error while finishing station bar: {:?}", err)
                });
        }
    }
}

impl StationLink for SimStation {
    fn await_transmission_opportunity(&mut self) -> bool {
        self.current = None;
        if !self.running.load(Ordering::SeqCst) {
            debug!("Station {} shutting down", self.id);
            self.finish_progress();
            return false;
        }
        match self.packets.recv() {
            Ok(seq) => {
                trace!("Station {} has packet {}", self.id, seq);
                self.current = Some(seq);
                self.stats.packets.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(_) => {
                debug!("Station {} queue closed", self.id);
                self.finish_progress();
                false
            }
        }
    }

    fn sense_channel_busy(&mut self) -> bool {
        if !self.sense_time.is_zero() {
            thread::sleep(self.sense_time);
        }
        self.medium.is_busy()
    }

    fn transmit(&mut self, kind: FrameKind) {
        // Late answers to an earlier exchange must not satisfy this one.
        let stale = self.replies.try_iter().count() as u64;
        if stale > 0 {
            self.stats.stale_replies.fetch_add(stale, Ordering::Relaxed);
        }

        match kind {
            FrameKind::Data => self.stats.data_sent.fetch_add(1, Ordering::Relaxed),
            FrameKind::Rts => self.stats.rts_sent.fetch_add(1, Ordering::Relaxed),
            other => {
                warn!("Station {} asked to transmit {}", self.id, other);
                return;
            }
        };

        trace!("Station {} sends {} for packet {:?}", self.id, kind, self.current);
        let frame = Transmission { station: self.id, kind };
        if self.outbox.send(frame).is_err() {
            warn!("Station {}: access point is gone", self.id);
        }
    }

    fn await_response(&mut self) -> FrameKind {
        self.replies
            .recv_timeout(self.response_timeout)
            .unwrap_or(FrameKind::NoResponse)
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn sleep(&mut self, delay: Duration) {
        self.stats.backoff_us.fetch_add(
            u64::try_from(delay.as_micros()).unwrap_or(u64::MAX),
            Ordering::Relaxed,
        );
        thread::sleep(delay);
    }

    fn record_outcome(&mut self, delivery: Delivery) {
        let counter = match delivery {
            Delivery::Acked { .. } => &self.stats.acked,
            Delivery::Dropped { .. } => &self.stats.dropped,
            Delivery::Rejected => &self.stats.rejected,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        if let Some(progress) = &self.progress {
            progress
                .inc(&station_bar_id(self.id), 1)
                .unwrap_or_else(|err| {
                    debug!("Error while updating station bar: {:?}", err)
                });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Wiring {
        station: SimStation,
        packets: Sender<u64>,
        outbox: Receiver<Transmission>,
        replies: Sender<FrameKind>,
        running: Arc<AtomicBool>,
    }

    fn wire() -> Wiring {
        let config = SimConfig {
            response_timeout_ms: 20,
            sense_time_ms: 0,
            ..Default::default()
        };
        let (packets, packet_rx) = crossbeam_channel::unbounded();
        let (outbox_tx, outbox) = crossbeam_channel::unbounded();
        let (replies, reply_rx) = crossbeam_channel::unbounded();
        let running = Arc::new(AtomicBool::new(true));
        let station = SimStation::new(
            3,
            &config,
            packet_rx,
            outbox_tx,
            reply_rx,
            Arc::new(Medium::new()),
            running.clone(),
            None,
        );
        Wiring {
            station,
            packets,
            outbox,
            replies,
            running,
        }
    }

    #[test]
    fn test_queue_close_ends_opportunities() {
        let mut w = wire();
        w.packets.send(0).unwrap();
        drop(w.packets);
        assert!(w.station.await_transmission_opportunity());
        assert!(!w.station.await_transmission_opportunity());
    }

    #[test]
    fn test_shutdown_flag_ends_opportunities() {
        let mut w = wire();
        w.packets.send(0).unwrap();
        w.running.store(false, Ordering::SeqCst);
        assert!(!w.station.await_transmission_opportunity());
    }

    #[test]
    fn test_transmit_tags_frames_with_station() {
        let mut w = wire();
        w.station.transmit(FrameKind::Rts);
        w.station.transmit(FrameKind::Data);
        let sent: Vec<Transmission> = w.outbox.try_iter().collect();
        assert_eq!(
            sent,
            vec![
                Transmission {
                    station: 3,
                    kind: FrameKind::Rts
                },
                Transmission {
                    station: 3,
                    kind: FrameKind::Data
                },
            ]
        );
        let report = w.station.stats().snapshot(3);
        assert_eq!(report.rts_sent, 1);
        assert_eq!(report.data_sent, 1);
    }

    #[test]
    fn test_timeout_yields_no_response() {
        let mut w = wire();
        assert_eq!(w.station.await_response(), FrameKind::NoResponse);
        w.replies.send(FrameKind::Ack).unwrap();
        assert_eq!(w.station.await_response(), FrameKind::Ack);
    }

    #[test]
    fn test_stale_reply_is_discarded_on_transmit() {
        let mut w = wire();
        w.replies.send(FrameKind::Cts).unwrap();
        w.station.transmit(FrameKind::Data);
        assert_eq!(w.station.await_response(), FrameKind::NoResponse);
        assert_eq!(w.station.stats().snapshot(3).stale_replies, 1);
    }

    #[test]
    fn test_outcomes_are_counted() {
        let mut w = wire();
        w.station.record_outcome(Delivery::Acked { attempts: 2 });
        w.station.record_outcome(Delivery::Dropped { attempts: 3 });
        w.station.record_outcome(Delivery::Rejected);
        w.station.sleep(Duration::from_millis(2));
        let report = w.station.stats().snapshot(3);
        assert_eq!(report.acked, 1);
        assert_eq!(report.dropped, 1);
        assert_eq!(report.rejected, 1);
        assert_eq!(report.backoff_ms, 2.0);
    }
}
