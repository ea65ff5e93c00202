use std::collections::VecDeque;
use std::time::Duration;

use super::{Delivery, FrameKind, StationLink};

/// Everything a strategy did to a [`ScriptedLink`], in call order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Event {
    Packet,
    Sense(bool),
    Transmit(FrameKind),
    Response(FrameKind),
    Sleep(Duration),
}

/// Station link replaying scripted sense results and responses. Once a
/// script runs dry the channel reads idle and nothing answers.
pub(crate) struct ScriptedLink {
    pub packets: usize,
    pub sense: VecDeque<bool>,
    pub responses: VecDeque<FrameKind>,
    pub interval: Duration,
    pub events: Vec<Event>,
    pub outcomes: Vec<Delivery>,
}

impl ScriptedLink {
    pub fn new(packets: usize) -> Self {
        Self {
            packets,
            sense: VecDeque::new(),
            responses: VecDeque::new(),
            interval: Duration::from_millis(10),
            events: Vec::new(),
            outcomes: Vec::new(),
        }
    }

    pub fn with_sense(mut self, sense: impl IntoIterator<Item = bool>) -> Self {
        self.sense.extend(sense);
        self
    }

    pub fn with_responses(
        mut self,
        responses: impl IntoIterator<Item = FrameKind>,
    ) -> Self {
        self.responses.extend(responses);
        self
    }

    pub fn count_transmits(&self, kind: FrameKind) -> usize {
        self.events
            .iter()
            .filter(|event| **event == Event::Transmit(kind))
            .count()
    }

    pub fn count_senses(&self) -> usize {
        self.events
            .iter()
            .filter(|event| matches!(event, Event::Sense(_)))
            .count()
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.events
            .iter()
            .filter_map(|event| match event {
                Event::Sleep(delay) => Some(*delay),
                _ => None,
            })
            .collect()
    }

    /// Events grouped per packet, packet markers removed.
    pub fn per_packet(&self) -> Vec<Vec<Event>> {
        let mut packets: Vec<Vec<Event>> = Vec::new();
        for event in &self.events {
            match event {
                Event::Packet => packets.push(Vec::new()),
                other => {
                    if let Some(current) = packets.last_mut() {
                        current.push(*other);
                    }
                }
            }
        }
        packets
    }
}

impl StationLink for ScriptedLink {
    fn await_transmission_opportunity(&mut self) -> bool {
        if self.packets == 0 {
            return false;
        }
        self.packets -= 1;
        self.events.push(Event::Packet);
        true
    }

    fn sense_channel_busy(&mut self) -> bool {
        let busy = self.sense.pop_front().unwrap_or(false);
        self.events.push(Event::Sense(busy));
        busy
    }

    fn transmit(&mut self, kind: FrameKind) {
        self.events.push(Event::Transmit(kind));
    }

    fn await_response(&mut self) -> FrameKind {
        let response = self.responses.pop_front().unwrap_or(FrameKind::NoResponse);
        self.events.push(Event::Response(response));
        response
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn sleep(&mut self, delay: Duration) {
        self.events.push(Event::Sleep(delay));
    }

    fn record_outcome(&mut self, delivery: Delivery) {
        self.outcomes.push(delivery);
    }
}
