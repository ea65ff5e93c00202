pub mod backoff;
pub mod csma_ca;
pub mod exponential_backoff;
pub mod null_mac;
pub mod rts_cts;

#[cfg(test)]
pub(crate) mod testing;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Logical frame tags exchanged on the shared channel. No payload is
/// modelled, only the tag drives the MAC decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    Data,
    Ack,
    Rts,
    Cts,
    /// Nothing arrived before the response timeout.
    NoResponse,
}

impl FrameKind {
    pub fn name(self) -> &'static str {
        match self {
            FrameKind::Data => "DATA",
            FrameKind::Ack => "ACK",
            FrameKind::Rts => "RTS",
            FrameKind::Cts => "CTS",
            FrameKind::NoResponse => "NONE",
        }
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Primitives a station runtime offers to the MAC layer.
///
/// Every blocking call is a suspension point of the station: a strategy
/// never senses or transmits while one of them is in progress.
pub trait StationLink {
    /// Blocks until an outbound packet is queued. Returns `false` once the
    /// station is shutting down and no packet will ever arrive.
    fn await_transmission_opportunity(&mut self) -> bool;

    /// One-shot carrier sense. The answer may already be stale when it
    /// returns.
    fn sense_channel_busy(&mut self) -> bool;

    /// Puts a `Data` or `Rts` frame onto the channel.
    fn transmit(&mut self, kind: FrameKind);

    /// Blocks until a response frame arrives or the station gives up
    /// waiting, in which case [`FrameKind::NoResponse`] is returned.
    fn await_response(&mut self) -> FrameKind;

    /// Slot time used to scale every backoff delay.
    fn interval(&self) -> Duration;

    /// Suspends the station for a backoff delay.
    fn sleep(&mut self, delay: Duration);

    /// Called once per packet with its final outcome.
    fn record_outcome(&mut self, _delivery: Delivery) {}
}

/// Outcome of one packet's complete attempt sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// ACK received after `attempts` DATA transmissions.
    Acked { attempts: u32 },
    /// Retries exhausted without an ACK.
    Dropped { attempts: u32 },
    /// The RTS was not answered by a CTS, no DATA was sent.
    Rejected,
}

/// The contention strategy a station runs.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum MacStrategy {
    /// Up to three DATA sends, no sensing, no backoff.
    NullMac,
    /// Up to three DATA sends with a `2^i - 2` slot backoff after failures.
    NullMacExponentialBackoff,
    /// Carrier sense before every DATA, unbounded `2^i - 1` backoff.
    #[default]
    CsmaCa,
    /// Carrier sense, RTS/CTS reservation, then unbounded DATA retries.
    RtsCts,
}

impl MacStrategy {
    pub const ALL: [MacStrategy; 4] = [
        MacStrategy::NullMac,
        MacStrategy::NullMacExponentialBackoff,
        MacStrategy::CsmaCa,
        MacStrategy::RtsCts,
    ];

    pub fn name(self) -> &'static str {
        match self {
            MacStrategy::NullMac => "null-mac",
            MacStrategy::NullMacExponentialBackoff => {
                "null-mac-exponential-backoff"
            }
            MacStrategy::CsmaCa => "csma-ca",
            MacStrategy::RtsCts => "rts-cts",
        }
    }

    /// Runs one packet's attempt sequence to completion.
    pub fn send_packet<L, R>(self, link: &mut L, rng: &mut R) -> Delivery
    where
        L: StationLink + ?Sized,
        R: Rng,
    {
        match self {
            MacStrategy::NullMac => null_mac::send_packet(link),
            MacStrategy::NullMacExponentialBackoff => {
                exponential_backoff::send_packet(link, rng)
            }
            MacStrategy::CsmaCa => csma_ca::send_packet(link, rng),
            MacStrategy::RtsCts => rts_cts::send_packet(link, rng),
        }
    }
}

impl fmt::Display for MacStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MacStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        MacStrategy::ALL
            .into_iter()
            .find(|strategy| strategy.name() == normalized)
            .ok_or_else(|| {
                let known: Vec<&str> =
                    MacStrategy::ALL.iter().map(|s| s.name()).collect();
                format!(
                    "unknown MAC strategy '{}', expected one of: {}",
                    s,
                    known.join(", ")
                )
            })
    }
}

/// A station's MAC layer: one strategy driving one link with its own
/// random generator.
pub struct MacStation<L, R> {
    strategy: MacStrategy,
    link: L,
    rng: R,
}

impl<L: StationLink, R: Rng> MacStation<L, R> {
    pub fn new(strategy: MacStrategy, link: L, rng: R) -> Self {
        Self {
            strategy,
            link,
            rng,
        }
    }

    /// Serves packets until the link reports shutdown. Lost packets are
    /// reported to the link and otherwise forgotten.
    pub fn run(&mut self) {
        let mut packets = 0u64;
        while self.link.await_transmission_opportunity() {
            packets += 1;
            let delivery = self.strategy.send_packet(&mut self.link, &mut self.rng);
            match delivery {
                Delivery::Acked { attempts } => {
                    trace!("Packet {} acked after {} DATA", packets, attempts);
                }
                Delivery::Dropped { attempts } => {
                    debug!(
                        "Packet {} dropped after {} DATA without ACK",
                        packets, attempts
                    );
                }
                Delivery::Rejected => {
                    debug!("Packet {} dropped, RTS not answered by CTS", packets);
                }
            }
            self.link.record_outcome(delivery);
        }
        debug!("{} station stopped after {} packets", self.strategy, packets);
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn into_link(self) -> L {
        self.link
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedLink;
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_strategy_names_round_trip() {
        for strategy in MacStrategy::ALL {
            assert_eq!(strategy.name().parse::<MacStrategy>(), Ok(strategy));
        }
        assert_eq!("CSMA_CA".parse::<MacStrategy>(), Ok(MacStrategy::CsmaCa));
        assert!("aloha".parse::<MacStrategy>().is_err());
    }

    #[test]
    fn test_strategy_serde_names() {
        let json = serde_json::to_string(&MacStrategy::RtsCts).unwrap();
        assert_eq!(json, "\"rts-cts\"");
        let parsed: MacStrategy =
            serde_json::from_str("\"null-mac-exponential-backoff\"").unwrap();
        assert_eq!(parsed, MacStrategy::NullMacExponentialBackoff);
    }

    #[test]
    fn test_run_serves_every_packet_then_stops() {
        let link = ScriptedLink::new(4).with_responses([
            FrameKind::Ack,
            FrameKind::NoResponse,
            FrameKind::Ack,
            FrameKind::Ack,
            FrameKind::Ack,
        ]);
        let mut station =
            MacStation::new(MacStrategy::NullMac, link, StdRng::seed_from_u64(1));
        station.run();

        let link = station.into_link();
        assert_eq!(
            link.outcomes,
            vec![
                Delivery::Acked { attempts: 1 },
                Delivery::Acked { attempts: 2 },
                Delivery::Acked { attempts: 1 },
                Delivery::Acked { attempts: 1 },
            ]
        );
        assert_eq!(link.count_transmits(FrameKind::Data), 5);
    }

    #[test]
    fn test_run_without_packets_returns_immediately() {
        for strategy in MacStrategy::ALL {
            let mut station = MacStation::new(
                strategy,
                ScriptedLink::new(0),
                StdRng::seed_from_u64(7),
            );
            station.run();
            assert!(station.link().events.is_empty());
            assert!(station.link().outcomes.is_empty());
        }
    }
}
