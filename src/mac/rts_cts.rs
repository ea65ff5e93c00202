//! CSMA/CA with RTS/CTS channel reservation.
//!
//! The station waits for an idle channel, asks for it with an RTS and only
//! sends DATA once a CTS grants it. A missing CTS drops the packet. A granted
//! CTS holds the channel for the whole DATA retry sequence, so the DATA
//! phase neither senses nor renegotiates, it only backs off between tries.

use rand::Rng;
use tracing::{debug, trace};

use super::csma_ca::exchange_until_acked;
use super::{Delivery, FrameKind, StationLink};

pub fn send_packet<L, R>(link: &mut L, rng: &mut R) -> Delivery
where
    L: StationLink + ?Sized,
    R: Rng,
{
    while link.sense_channel_busy() {
        trace!("Channel busy, waiting to send RTS.");
    }

    link.transmit(FrameKind::Rts);
    let response = link.await_response();
    if response != FrameKind::Cts {
        debug!("RTS answered by {}, giving up on packet", response);
        return Delivery::Rejected;
    }

    trace!("CTS received, channel reserved for DATA");
    Delivery::Acked {
        attempts: exchange_until_acked(link, rng, false),
    }
}
