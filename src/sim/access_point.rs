//! The shared channel as heard by a single access point.
//!
//! Every station transmission lands in the access point's inbox. The first
//! frame opens a contention window one airtime long; frames arriving inside
//! the window collide and nobody is answered. A frame heard alone is answered
//! (`DATA` -> `ACK`, `RTS` -> `CTS`) unless the loss draw eats it. A granted
//! CTS keeps the medium busy for its holder until the holder's DATA is
//! acknowledged or the reservation runs out.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, trace, warn};

use super::config::SimConfig;
use crate::mac::FrameKind;

pub type StationId = usize;

/// A frame put on the air by a station.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transmission {
    pub station: StationId,
    pub kind: FrameKind,
}

/// Carrier state visible to every station, plus channel counters.
#[derive(Debug, Default)]
pub struct Medium {
    busy: AtomicBool,
    frames_heard: AtomicU64,
    collisions: AtomicU64,
    losses: AtomicU64,
    acks: AtomicU64,
    grants: AtomicU64,
}

impl Medium {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    fn set_busy(&self, busy: bool) {
        self.busy.store(busy, Ordering::Release);
    }

    pub fn stats(&self) -> MediumStats {
        MediumStats {
            frames_heard: self.frames_heard.load(Ordering::Relaxed),
            collisions: self.collisions.load(Ordering::Relaxed),
            losses: self.losses.load(Ordering::Relaxed),
            acks: self.acks.load(Ordering::Relaxed),
            grants: self.grants.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MediumStats {
    pub frames_heard: u64,
    /// Contention windows in which more than one frame was heard.
    pub collisions: u64,
    /// Frames dropped by the loss draw or sent into another station's
    /// reservation.
    pub losses: u64,
    pub acks: u64,
    /// CTS frames sent.
    pub grants: u64,
}

#[derive(Debug, Clone, Copy)]
struct Reservation {
    holder: StationId,
    expires: Instant,
}

pub struct AccessPoint {
    medium: Arc<Medium>,
    inbox: Receiver<Transmission>,
    replies: Vec<Sender<FrameKind>>,
    airtime: Duration,
    reservation_time: Duration,
    loss_probability: f64,
    rng: StdRng,
    reservation: Option<Reservation>,
}

impl AccessPoint {
    /// `replies[id]` is the response channel of station `id`.
    pub fn new(
        config: &SimConfig,
        medium: Arc<Medium>,
        inbox: Receiver<Transmission>,
        replies: Vec<Sender<FrameKind>>,
    ) -> Self {
        Self {
            medium,
            inbox,
            replies,
            airtime: config.airtime(),
            reservation_time: config.reservation(),
            loss_probability: config.loss_probability,
            rng: StdRng::seed_from_u64(config.access_point_seed()),
            reservation: None,
        }
    }

    /// Serves the channel until every station has dropped its sender.
    pub fn run(mut self) {
        loop {
            let received = match self.reservation {
                Some(reservation) => self.inbox.recv_deadline(reservation.expires),
                None => self
                    .inbox
                    .recv()
                    .map_err(|_| RecvTimeoutError::Disconnected),
            };

            match received {
                Ok(first) => {
                    let frames = self.collect_window(first);
                    self.resolve(frames);
                }
                Err(RecvTimeoutError::Timeout) => {
                    self.expire_reservation();
                    self.medium.set_busy(self.reservation.is_some());
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        self.medium.set_busy(false);
        debug!("Access point stopped: {:?}", self.medium.stats());
    }

    /// Everything heard within one airtime of `first`.
    fn collect_window(&mut self, first: Transmission) -> Vec<Transmission> {
        self.medium.set_busy(true);
        let deadline = Instant::now() + self.airtime;
        let mut frames = vec![first];
        loop {
            match self.inbox.recv_deadline(deadline) {
                Ok(frame) => frames.push(frame),
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => {
                    // Senders are gone but the window still runs its course.
                    let now = Instant::now();
                    if deadline > now {
                        std::thread::sleep(deadline - now);
                    }
                    break;
                }
            }
        }
        frames
    }

    fn resolve(&mut self, frames: Vec<Transmission>) {
        self.medium
            .frames_heard
            .fetch_add(frames.len() as u64, Ordering::Relaxed);
        self.expire_reservation();

        if let Some(reservation) = self.reservation {
            let mut from_holder = None;
            for frame in frames {
                if frame.station == reservation.holder && frame.kind == FrameKind::Data {
                    from_holder = Some(frame);
                } else {
                    trace!(
                        "{} from station {} lost in reservation of station {}",
                        frame.kind, frame.station, reservation.holder
                    );
                    self.medium.losses.fetch_add(1, Ordering::Relaxed);
                }
            }
            if let Some(frame) = from_holder {
                self.reservation = Some(Reservation {
                    holder: reservation.holder,
                    expires: Instant::now() + self.reservation_time,
                });
                self.deliver(frame);
            }
        } else if frames.len() > 1 {
            let stations: Vec<StationId> =
                frames.iter().map(|f| f.station).collect();
            debug!("Collision between stations {:?}", stations);
            self.medium.collisions.fetch_add(1, Ordering::Relaxed);
        } else if let Some(frame) = frames.into_iter().next() {
            self.deliver(frame);
        }

        self.medium.set_busy(self.reservation.is_some());
    }

    /// Answers a frame that made it through the window on its own.
    fn deliver(&mut self, frame: Transmission) {
        if self.loss_probability > 0.0 && self.rng.random_bool(self.loss_probability) {
            trace!("{} from station {} lost", frame.kind, frame.station);
            self.medium.losses.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let reply = match frame.kind {
            FrameKind::Data => {
                if self.reservation.is_some_and(|r| r.holder == frame.station) {
                    self.reservation = None;
                }
                self.medium.acks.fetch_add(1, Ordering::Relaxed);
                FrameKind::Ack
            }
            FrameKind::Rts => {
                self.reservation = Some(Reservation {
                    holder: frame.station,
                    expires: Instant::now() + self.reservation_time,
                });
                self.medium.grants.fetch_add(1, Ordering::Relaxed);
                FrameKind::Cts
            }
            other => {
                warn!(
                    "Ignoring unexpected {} from station {}",
                    other, frame.station
                );
                return;
            }
        };

        match self.replies.get(frame.station) {
            Some(tx) => {
                if tx.send(reply).is_err() {
                    trace!("Station {} is gone, {} dropped", frame.station, reply);
                }
            }
            None => warn!("No reply channel for station {}", frame.station),
        }
    }

    fn expire_reservation(&mut self) {
        if let Some(reservation) = self.reservation {
            if Instant::now() >= reservation.expires {
                debug!("Reservation of station {} expired", reservation.holder);
                self.reservation = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    struct Harness {
        medium: Arc<Medium>,
        inbox: Sender<Transmission>,
        replies: Vec<Receiver<FrameKind>>,
        handle: thread::JoinHandle<()>,
    }

    fn spawn(stations: usize, loss_probability: f64) -> Harness {
        let config = SimConfig {
            stations,
            loss_probability,
            airtime_ms: 5,
            response_timeout_ms: 50,
            reservation_ms: 200,
            ..Default::default()
        };
        let medium = Arc::new(Medium::new());
        let (inbox, rx) = crossbeam_channel::unbounded();
        let (reply_txs, replies): (Vec<_>, Vec<_>) =
            (0..stations).map(|_| crossbeam_channel::unbounded()).unzip();
        let ap = AccessPoint::new(&config, medium.clone(), rx, reply_txs);
        let handle = thread::spawn(move || ap.run());
        Harness {
            medium,
            inbox,
            replies,
            handle,
        }
    }

    fn send(h: &Harness, station: StationId, kind: FrameKind) {
        h.inbox.send(Transmission { station, kind }).unwrap();
    }

    fn reply(h: &Harness, station: StationId) -> Option<FrameKind> {
        h.replies[station]
            .recv_timeout(Duration::from_millis(50))
            .ok()
    }

    #[test]
    fn test_lone_data_is_acked() {
        let h = spawn(1, 0.0);
        send(&h, 0, FrameKind::Data);
        assert_eq!(reply(&h, 0), Some(FrameKind::Ack));
        let Harness { medium, inbox, handle, .. } = h;
        drop(inbox);
        handle.join().unwrap();
        assert_eq!(medium.stats().acks, 1);
        assert!(!medium.is_busy());
    }

    #[test]
    fn test_simultaneous_frames_collide() {
        let h = spawn(2, 0.0);
        send(&h, 0, FrameKind::Data);
        send(&h, 1, FrameKind::Data);
        assert_eq!(reply(&h, 0), None);
        assert_eq!(reply(&h, 1), None);
        let Harness { medium, inbox, handle, .. } = h;
        drop(inbox);
        handle.join().unwrap();
        let stats = medium.stats();
        assert_eq!(stats.collisions, 1);
        assert_eq!(stats.frames_heard, 2);
        assert_eq!(stats.acks, 0);
    }

    #[test]
    fn test_total_loss_answers_nothing() {
        let h = spawn(1, 1.0);
        send(&h, 0, FrameKind::Rts);
        assert_eq!(reply(&h, 0), None);
        let Harness { medium, inbox, handle, .. } = h;
        drop(inbox);
        handle.join().unwrap();
        assert_eq!(medium.stats().losses, 1);
    }

    #[test]
    fn test_cts_reserves_medium_for_holder() {
        let h = spawn(2, 0.0);
        send(&h, 0, FrameKind::Rts);
        assert_eq!(reply(&h, 0), Some(FrameKind::Cts));
        assert!(h.medium.is_busy());

        // Another station's frame is lost inside the reservation.
        send(&h, 1, FrameKind::Data);
        assert_eq!(reply(&h, 1), None);

        send(&h, 0, FrameKind::Data);
        assert_eq!(reply(&h, 0), Some(FrameKind::Ack));
        thread::sleep(Duration::from_millis(10));
        assert!(!h.medium.is_busy());

        let Harness { medium, inbox, handle, .. } = h;
        drop(inbox);
        handle.join().unwrap();
        let stats = medium.stats();
        assert_eq!(stats.grants, 1);
        assert_eq!(stats.acks, 1);
        assert_eq!(stats.losses, 1);
    }

    #[test]
    fn test_unused_reservation_expires() {
        let h = spawn(1, 0.0);
        send(&h, 0, FrameKind::Rts);
        assert_eq!(reply(&h, 0), Some(FrameKind::Cts));
        assert!(h.medium.is_busy());
        thread::sleep(Duration::from_millis(350));
        assert!(!h.medium.is_busy());
        let Harness { inbox, handle, .. } = h;
        drop(inbox);
        handle.join().unwrap();
    }
}
