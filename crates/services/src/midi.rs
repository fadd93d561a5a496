// Copyright (c) 2024 Mike Tsao

//! Provides MIDI interface services.
//!
//! "input" and "output" are from the perspective of this program. The clock
//! source's messages come *in* through a [MidiClockInput], and Control Changes
//! go *out* through a [MidiCcOutput].

use crate::{traits::ProvidesService, types::CrossbeamChannel};
use anyhow::anyhow;
use crossbeam_channel::Receiver;
use log::{debug, info, warn};
use midir::{Ignore, MidiIO, MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use midly::{live::LiveEvent, MidiMessage};
use spiralwalk::{
    traits::SendsControlChange,
    types::{ControlChange, MidiPortDescriptor, TransportEvent},
    util::RateLimiter,
};
use std::time::Instant;

/// The name this program gives itself when it talks to the MIDI system.
pub const CLIENT_NAME: &str = "spiralwalk";
#[allow(missing_docs)]
pub const DEFAULT_VIRTUAL_INPUT_NAME: &str = "Spiralwalk Virtual In";
#[allow(missing_docs)]
pub const DEFAULT_VIRTUAL_OUTPUT_NAME: &str = "Spiralwalk Virtual Out";

/// Which port a service should use.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PortChoice {
    /// No port at all. Input never hears a clock; output logs instead of
    /// sending.
    Disabled,
    /// An existing port, matched exactly by name, or failing that, as a
    /// substring.
    Existing(String),
    /// A new virtual port with this name, for other applications to connect
    /// to. Not every platform supports these.
    Virtual(String),
}
impl PortChoice {
    /// Picks a port from an optional configured name. A virtual port gets
    /// `default_virtual_name` if no name is given.
    pub fn new_with(name: Option<&str>, use_virtual: bool, default_virtual_name: &str) -> Self {
        match (name, use_virtual) {
            (name, true) => Self::Virtual(name.unwrap_or(default_virtual_name).to_string()),
            (Some(name), false) => Self::Existing(name.to_string()),
            (None, false) => Self::Disabled,
        }
    }
}

fn list_ports<IO: MidiIO>(io: &IO) -> Vec<MidiPortDescriptor> {
    io.ports()
        .iter()
        .enumerate()
        .filter_map(|(index, port)| {
            io.port_name(port)
                .ok()
                .map(|name| MidiPortDescriptor { index, name })
        })
        .collect()
}

/// Every MIDI input port on the system.
pub fn list_input_ports() -> anyhow::Result<Vec<MidiPortDescriptor>> {
    let midi_in = MidiInput::new(CLIENT_NAME)?;
    Ok(list_ports(&midi_in))
}

/// Every MIDI output port on the system.
pub fn list_output_ports() -> anyhow::Result<Vec<MidiPortDescriptor>> {
    let midi_out = MidiOutput::new(CLIENT_NAME)?;
    Ok(list_ports(&midi_out))
}

/// Finds `wanted` among port names: an exact match if there is one,
/// otherwise the first name that contains it.
pub fn select_port_index(names: &[String], wanted: &str) -> Option<usize> {
    names
        .iter()
        .position(|name| name == wanted)
        .or_else(|| names.iter().position(|name| name.contains(wanted)))
}

fn find_port<IO: MidiIO>(io: &IO, wanted: &str) -> anyhow::Result<IO::Port> {
    let ports = io.ports();
    let names: Vec<String> = ports
        .iter()
        .map(|port| io.port_name(port).unwrap_or_default())
        .collect();
    select_port_index(&names, wanted)
        .and_then(|index| ports.get(index).cloned())
        .ok_or_else(|| anyhow!("MIDI port {wanted:?} not found; available: {names:?}"))
}

/// Listens to a clock source and delivers its transport messages over a
/// crossbeam channel. Everything else on the port is ignored.
pub struct MidiClockInput {
    connection: Option<MidiInputConnection<()>>,
    events: CrossbeamChannel<TransportEvent>,
}
impl core::fmt::Debug for MidiClockInput {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MidiClockInput")
            .field("connected", &self.connection.is_some())
            .field("events", &self.events)
            .finish()
    }
}
impl MidiClockInput {
    /// Opens the chosen port and starts listening.
    pub fn open(choice: &PortChoice) -> anyhow::Result<Self> {
        let events = CrossbeamChannel::default();
        let sender = events.sender.clone();
        let callback = move |_timestamp_us: u64, bytes: &[u8], _: &mut ()| {
            if let Some(event) = TransportEvent::from_bytes(bytes) {
                let _ = sender.try_send(event);
            } else if let Ok(LiveEvent::Midi {
                channel,
                message: MidiMessage::Controller { controller, value },
            }) = LiveEvent::parse(bytes)
            {
                debug!(
                    "Ignoring inbound CC ch{} cc{} val{}",
                    channel.as_int() + 1,
                    controller.as_int(),
                    value.as_int()
                );
            }
        };

        let mut midi_in = MidiInput::new(CLIENT_NAME)?;
        // Timing clock must get through.
        midi_in.ignore(Ignore::Sysex | Ignore::ActiveSense);

        let connection = match choice {
            PortChoice::Disabled => {
                warn!("No MIDI input port configured; the clock will not advance");
                None
            }
            PortChoice::Existing(name) => {
                let port = find_port(&midi_in, name)?;
                let port_name = midi_in.port_name(&port)?;
                let connection = midi_in
                    .connect(&port, "clock-in", callback, ())
                    .map_err(|e| anyhow!("connecting to MIDI input {port_name:?}: {e}"))?;
                info!("Opened MIDI input: {port_name}");
                Some(connection)
            }
            PortChoice::Virtual(name) => Some(Self::open_virtual(midi_in, name, callback)?),
        };
        Ok(Self { connection, events })
    }

    #[cfg(unix)]
    fn open_virtual<F>(
        midi_in: MidiInput,
        name: &str,
        callback: F,
    ) -> anyhow::Result<MidiInputConnection<()>>
    where
        F: FnMut(u64, &[u8], &mut ()) + Send + 'static,
    {
        use midir::os::unix::VirtualInput;
        let connection = midi_in
            .create_virtual(name, callback, ())
            .map_err(|e| anyhow!("creating virtual MIDI input {name:?}: {e}"))?;
        info!("Opened virtual MIDI input: {name}");
        Ok(connection)
    }

    #[cfg(not(unix))]
    fn open_virtual<F>(
        _midi_in: MidiInput,
        name: &str,
        _callback: F,
    ) -> anyhow::Result<MidiInputConnection<()>>
    where
        F: FnMut(u64, &[u8], &mut ()) + Send + 'static,
    {
        Err(anyhow!(
            "virtual MIDI input {name:?} isn't supported on this platform"
        ))
    }

    /// Whether a port is actually open.
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Stops listening. Already-delivered events stay in the channel.
    pub fn close(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.close();
            info!("Closed MIDI input");
        }
    }
}
impl ProvidesService<TransportEvent> for MidiClockInput {
    fn receiver(&self) -> &Receiver<TransportEvent> {
        &self.events.receiver
    }
}
impl Drop for MidiClockInput {
    fn drop(&mut self) {
        self.close();
    }
}

/// Sends Control Changes to a port, dropping any that would exceed the rate
/// limit. In dry-run mode, or without a port, it logs them instead.
pub struct MidiCcOutput {
    connection: Option<MidiOutputConnection>,
    limiter: RateLimiter,
    dry_run: bool,
    sent: usize,
    dropped: usize,
}
impl core::fmt::Debug for MidiCcOutput {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MidiCcOutput")
            .field("connected", &self.connection.is_some())
            .field("limiter", &self.limiter)
            .field("dry_run", &self.dry_run)
            .field("sent", &self.sent)
            .field("dropped", &self.dropped)
            .finish()
    }
}
impl MidiCcOutput {
    /// Opens the chosen port. A dry run opens nothing.
    pub fn open(
        choice: &PortChoice,
        max_messages_per_sec: usize,
        dry_run: bool,
    ) -> anyhow::Result<Self> {
        let mut r = Self::new_dry_run(max_messages_per_sec);
        if dry_run {
            info!("Dry run: MIDI output disabled");
            return Ok(r);
        }
        r.dry_run = false;

        let midi_out = MidiOutput::new(CLIENT_NAME)?;
        r.connection = match choice {
            PortChoice::Disabled => {
                warn!("No MIDI output port configured; logging CCs instead");
                None
            }
            PortChoice::Existing(name) => {
                let port = find_port(&midi_out, name)?;
                let port_name = midi_out.port_name(&port)?;
                let connection = midi_out
                    .connect(&port, "cc-out")
                    .map_err(|e| anyhow!("connecting to MIDI output {port_name:?}: {e}"))?;
                info!("Opened MIDI output: {port_name}");
                Some(connection)
            }
            PortChoice::Virtual(name) => Some(Self::open_virtual(midi_out, name)?),
        };
        Ok(r)
    }

    /// An output that only logs.
    pub fn new_dry_run(max_messages_per_sec: usize) -> Self {
        Self {
            connection: None,
            limiter: RateLimiter::new(max_messages_per_sec),
            dry_run: true,
            sent: 0,
            dropped: 0,
        }
    }

    #[cfg(unix)]
    fn open_virtual(midi_out: MidiOutput, name: &str) -> anyhow::Result<MidiOutputConnection> {
        use midir::os::unix::VirtualOutput;
        let connection = midi_out
            .create_virtual(name)
            .map_err(|e| anyhow!("creating virtual MIDI output {name:?}: {e}"))?;
        info!("Opened virtual MIDI output: {name}");
        Ok(connection)
    }

    #[cfg(not(unix))]
    fn open_virtual(_midi_out: MidiOutput, name: &str) -> anyhow::Result<MidiOutputConnection> {
        Err(anyhow!(
            "virtual MIDI output {name:?} isn't supported on this platform"
        ))
    }

    /// Sends (or logs) a Control Change, subject to the rate limit, at time
    /// `now`.
    pub fn send_at(&mut self, control_change: ControlChange, now: Instant) {
        if !self.limiter.try_acquire(now) {
            self.dropped += 1;
            debug!(
                "Rate limit hit; skipping CC {}",
                control_change.controller.as_int()
            );
            return;
        }
        self.sent += 1;
        match self.connection.as_mut() {
            Some(connection) if !self.dry_run => {
                if let Err(e) = connection.send(&control_change.to_bytes()) {
                    warn!("While sending {control_change:?}: {e}");
                }
            }
            _ => info!(
                "CC ch{} cc{} val{}",
                control_change.channel.display_number(),
                control_change.controller.as_int(),
                control_change.value.as_int()
            ),
        }
    }

    /// Messages that passed the rate limit.
    pub fn sent(&self) -> usize {
        self.sent
    }

    /// Messages that the rate limit dropped.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    #[allow(missing_docs)]
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    #[allow(missing_docs)]
    pub fn close(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.close();
            info!("Closed MIDI output");
        }
    }
}
impl SendsControlChange for MidiCcOutput {
    fn send_control_change(&mut self, control_change: ControlChange) {
        self.send_at(control_change, Instant::now());
    }
}
impl Drop for MidiCcOutput {
    fn drop(&mut self) {
        self.close();
    }
}
