//! No MAC protocol at all: send whenever a packet is ready and resend
//! straight away if no ACK comes back. Collisions are not avoided.

use tracing::trace;

use super::{Delivery, FrameKind, StationLink};
use crate::utils::consts::NULL_MAC_MAX_ATTEMPTS;

pub fn send_packet<L: StationLink + ?Sized>(link: &mut L) -> Delivery {
    for attempt in 0..NULL_MAC_MAX_ATTEMPTS {
        link.transmit(FrameKind::Data);
        let response = link.await_response();
        trace!("NullMac attempt {} got {}", attempt, response);
        if response == FrameKind::Ack {
            return Delivery::Acked {
                attempts: attempt + 1,
            };
        }
    }
    Delivery::Dropped {
        attempts: NULL_MAC_MAX_ATTEMPTS,
    }
}
