// Copyright (c) 2024 Mike Tsao

//! Wrappers around [midir](https://crates.io/crates/midir) that connect
//! spiralwalk to real MIDI ports: a clock input that delivers transport
//! messages over a crossbeam channel, and a rate-limited Control Change
//! output.

#![deny(missing_docs)]

/// The most commonly used imports.
pub mod prelude {
    pub use super::{
        list_input_ports, list_output_ports, MidiCcOutput, MidiClockInput, PortChoice,
        ProvidesService,
    };
}

pub use midi::{
    list_input_ports, list_output_ports, select_port_index, MidiCcOutput, MidiClockInput,
    PortChoice, CLIENT_NAME, DEFAULT_VIRTUAL_INPUT_NAME, DEFAULT_VIRTUAL_OUTPUT_NAME,
};
pub use traits::ProvidesService;
pub use types::CrossbeamChannel;

mod midi;
mod traits;
mod types;
