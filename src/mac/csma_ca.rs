//! CSMA/CA: only transmit DATA after sensing an idle channel, back off
//! `uniform(0, 2^i - 1)` slots after each missing ACK and keep going until
//! the packet is acknowledged. There is deliberately no retry limit.

use std::time::Duration;

use rand::Rng;
use tracing::trace;

use super::backoff::{BackoffLaw, ContentionWindow};
use super::{Delivery, FrameKind, StationLink};
use crate::utils::consts::CSMA_FIRST_ATTEMPT;

/// States of one packet's DATA/ACK exchange.
///
/// The delay carried by the later states is drawn in `Sensing` and only
/// slept if the ACK never comes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsmaState {
    Sensing,                 // Drawing a delay, sensing channel
    Transmitting(Duration),  // Channel idle, sending DATA
    WaitingForAck(Duration), // DATA sent
    Backoff(Duration),       // No ACK, sleeping the drawn delay
}

pub fn send_packet<L, R>(link: &mut L, rng: &mut R) -> Delivery
where
    L: StationLink + ?Sized,
    R: Rng,
{
    Delivery::Acked {
        attempts: exchange_until_acked(link, rng, true),
    }
}

/// Sends DATA until an ACK arrives and returns how many DATA frames it
/// took. With `carrier_sense` the channel is sensed before every DATA and a
/// busy channel is sensed again without touching the attempt counter.
pub(crate) fn exchange_until_acked<L, R>(
    link: &mut L,
    rng: &mut R,
    carrier_sense: bool,
) -> u32
where
    L: StationLink + ?Sized,
    R: Rng,
{
    let mut window =
        ContentionWindow::new(BackoffLaw::PowerOfTwoMinusOne, CSMA_FIRST_ATTEMPT);
    let mut state = CsmaState::Sensing;
    let mut sent = 0u32;

    loop {
        match state {
            CsmaState::Sensing => {
                let delay = window.draw(rng, link.interval());
                if carrier_sense && link.sense_channel_busy() {
                    trace!("Channel busy, sensing again.");
                    continue;
                }
                state = CsmaState::Transmitting(delay);
            }
            CsmaState::Transmitting(delay) => {
                link.transmit(FrameKind::Data);
                sent = sent.saturating_add(1);
                state = CsmaState::WaitingForAck(delay);
            }
            CsmaState::WaitingForAck(delay) => {
                let response = link.await_response();
                if response == FrameKind::Ack {
                    trace!("ACK received after {} DATA", sent);
                    return sent;
                }
                trace!(
                    "No ACK on attempt {} ({}), stage widened",
                    window.attempt(),
                    response
                );
                window.widen();
                state = CsmaState::Backoff(delay);
            }
            CsmaState::Backoff(delay) => {
                trace!("Backing off {:?}", delay);
                link.sleep(delay);
                state = CsmaState::Sensing;
            }
        }
    }
}
