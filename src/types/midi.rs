// Copyright (c) 2024 Mike Tsao

use midly::{
    live::{LiveEvent, SystemRealtime},
    MidiMessage,
};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use synonym::Synonym;

pub use midly::num::{u4, u7};

/// Newtype for MIDI channel.
#[derive(Synonym, Serialize, Deserialize)]
pub struct MidiChannel(pub u8);
#[allow(missing_docs)]
impl MidiChannel {
    pub const MIN_VALUE: u8 = 0;
    pub const MAX_VALUE: u8 = 15; // inclusive

    pub const fn new(value: u8) -> Self {
        Self(value)
    }

    /// The channel as users see it on hardware, 1..=16.
    pub fn display_number(&self) -> u8 {
        self.0 + 1
    }
}
impl From<u4> for MidiChannel {
    fn from(value: u4) -> Self {
        Self(value.as_int())
    }
}
impl From<MidiChannel> for u4 {
    fn from(value: MidiChannel) -> Self {
        u4::from_int_lossy(value.0)
    }
}

/// Provides user-friendly strings for displaying available MIDI ports.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct MidiPortDescriptor {
    /// The port descriptor's index.
    pub index: usize,
    /// The port descriptor's human-readable name.
    pub name: String,
}
impl std::fmt::Display for MidiPortDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// The inbound messages that drive the automation timeline. Everything else
/// arriving on the input port is ignored.
#[derive(Clone, Copy, Debug, Display, EnumString, Eq, PartialEq, Hash)]
#[strum(serialize_all = "lowercase")]
pub enum TransportEvent {
    /// Transport Start: rewind to the top and play.
    Start,
    /// Transport Stop.
    Stop,
    /// Transport Continue: resume from the current position.
    Continue,
    /// A single timing clock pulse.
    Clock,
}
impl TransportEvent {
    /// Picks the transport-relevant realtime messages out of a live MIDI
    /// event.
    pub fn from_live_event(event: &LiveEvent) -> Option<Self> {
        match event {
            LiveEvent::Realtime(SystemRealtime::TimingClock) => Some(Self::Clock),
            LiveEvent::Realtime(SystemRealtime::Start) => Some(Self::Start),
            LiveEvent::Realtime(SystemRealtime::Stop) => Some(Self::Stop),
            LiveEvent::Realtime(SystemRealtime::Continue) => Some(Self::Continue),
            _ => None,
        }
    }

    /// Parses raw bytes as delivered by a MIDI input callback.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        LiveEvent::parse(bytes)
            .ok()
            .and_then(|event| Self::from_live_event(&event))
    }
}

/// A single outbound Control Change.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ControlChange {
    #[allow(missing_docs)]
    pub channel: MidiChannel,
    /// The controller (CC) number.
    pub controller: u7,
    #[allow(missing_docs)]
    pub value: u7,
}
impl ControlChange {
    /// Builds a [ControlChange], masking out-of-range numbers to seven bits.
    pub fn new(channel: MidiChannel, controller: u8, value: u8) -> Self {
        Self {
            channel,
            controller: u7::from_int_lossy(controller),
            value: u7::from_int_lossy(value),
        }
    }

    /// The equivalent [LiveEvent], ready to be written to the wire.
    pub fn to_live_event(&self) -> LiveEvent<'static> {
        LiveEvent::Midi {
            channel: self.channel.into(),
            message: MidiMessage::Controller {
                controller: self.controller,
                value: self.value,
            },
        }
    }

    /// The three-byte wire encoding.
    pub fn to_bytes(&self) -> [u8; 3] {
        [
            0xB0 | (self.channel.0 & 0x0F),
            self.controller.as_int(),
            self.value.as_int(),
        ]
    }
}
