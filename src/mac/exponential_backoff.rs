//! NullMac with randomized exponential backoff after every missing ACK.
//!
//! Attempts are indexed from 1. After a failed attempt `i` the station sleeps
//! `uniform(0, 2^i - 2)` slots, so the first retry never waits, the second
//! waits up to 2 slots and the drop after the third failure up to 6. The
//! `2^i - 2` law is this variant's own and differs from the `2^i - 1` used by
//! the CSMA/CA family.

use rand::Rng;
use tracing::trace;

use super::backoff::{BackoffLaw, ContentionWindow};
use super::{Delivery, FrameKind, StationLink};
use crate::utils::consts::{BACKOFF_FIRST_ATTEMPT, NULL_MAC_MAX_ATTEMPTS};

pub fn send_packet<L, R>(link: &mut L, rng: &mut R) -> Delivery
where
    L: StationLink + ?Sized,
    R: Rng,
{
    let mut window = ContentionWindow::new(
        BackoffLaw::PowerOfTwoMinusTwo,
        BACKOFF_FIRST_ATTEMPT,
    );

    for sent in 1..=NULL_MAC_MAX_ATTEMPTS {
        link.transmit(FrameKind::Data);
        let response = link.await_response();
        if response == FrameKind::Ack {
            return Delivery::Acked { attempts: sent };
        }

        let delay = window.draw(rng, link.interval());
        trace!(
            "No ACK on attempt {} ({}), backing off {:?}",
            window.attempt(),
            response,
            delay
        );
        link.sleep(delay);
        window.widen();
    }

    Delivery::Dropped {
        attempts: NULL_MAC_MAX_ATTEMPTS,
    }
}
