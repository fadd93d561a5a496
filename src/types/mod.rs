// Copyright (c) 2024 Mike Tsao

//! Common data types used throughout the system.

/// The most commonly used imports.
pub mod prelude {
    pub use super::{
        ClockPosition, ControlChange, Division, MidiChannel, MidiPortDescriptor, TransportEvent,
    };
}

pub use {
    midi::{u4, u7, ControlChange, MidiChannel, MidiPortDescriptor, TransportEvent},
    time::{parse_division, ClockPosition, Division, DEFAULT_PPQ},
};

mod midi;
mod time;
