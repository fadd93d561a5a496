// Copyright (c) 2024 Mike Tsao

//! Commands that check MIDI wiring without performing.

use anyhow::anyhow;
use crossbeam_channel::RecvTimeoutError;
use spiralwalk::{
    traits::SendsControlChange,
    types::{ControlChange, MidiChannel, TransportEvent},
    util::Settings,
};
use spiralwalk_services::{
    list_input_ports, list_output_ports, MidiCcOutput, MidiClockInput, PortChoice,
    ProvidesService,
};
use std::{
    ops::RangeInclusive,
    sync::atomic::{AtomicBool, Ordering},
    time::{Duration, Instant},
};

/// MIDI clock always runs at 24 pulses per quarter note.
const CLOCKS_PER_BEAT: u64 = 24;

pub(crate) fn list_ports() -> anyhow::Result<()> {
    println!("MIDI Inputs:");
    for port in list_input_ports()? {
        println!("  {port}");
    }
    println!("MIDI Outputs:");
    for port in list_output_ports()? {
        println!("  {port}");
    }
    Ok(())
}

/// Estimates tempo from clock pulses counted since listening began.
#[derive(Debug)]
pub(crate) struct TempoMeter {
    start: Instant,
    clocks: u64,
}
impl TempoMeter {
    pub(crate) fn new_with(start: Instant) -> Self {
        Self { start, clocks: 0 }
    }

    /// Counts a pulse. On each beat, returns the beat number and the average
    /// BPM so far.
    pub(crate) fn handle_clock(&mut self, now: Instant) -> Option<(u64, f64)> {
        self.clocks += 1;
        if self.clocks % CLOCKS_PER_BEAT != 0 {
            return None;
        }
        let elapsed = now.saturating_duration_since(self.start).as_secs_f64();
        if elapsed <= 0.0 {
            return None;
        }
        let beats = self.clocks / CLOCKS_PER_BEAT;
        Some((beats, beats as f64 / (elapsed / 60.0)))
    }

    pub(crate) fn clocks(&self) -> u64 {
        self.clocks
    }
}

/// Prints transport messages and tempo from the configured input for up to
/// `timeout` seconds. Fails if no clock arrived. Returns the number of
/// pulses heard.
pub(crate) fn listen_clock(
    settings: &Settings,
    timeout: f64,
    stop: &AtomicBool,
) -> anyhow::Result<u64> {
    let Some(port_name) = settings.midi.in_port_name.as_deref() else {
        return Err(anyhow!("No MIDI input port configured."));
    };
    let input = MidiClockInput::open(&PortChoice::Existing(port_name.to_string()))?;
    println!("Listening for clock on {port_name} for up to {timeout} seconds...");

    let start = Instant::now();
    let deadline = start + Duration::from_secs_f64(timeout.max(0.0));
    let mut meter = TempoMeter::new_with(start);
    while !stop.load(Ordering::Relaxed) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        match input
            .receiver()
            .recv_timeout((deadline - now).min(Duration::from_millis(100)))
        {
            Ok(TransportEvent::Clock) => {
                if let Some((beat, bpm)) = meter.handle_clock(Instant::now()) {
                    println!("Beat {beat} approx BPM {bpm:.2}");
                }
            }
            Ok(event) => println!("Transport: {event}"),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    if meter.clocks() == 0 {
        return Err(anyhow!("No clock received."));
    }
    Ok(meter.clocks())
}

/// The signal `send-test` sends.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum TestMode {
    /// Ramp every CC up and down in coarse steps.
    #[default]
    Sweep,
    /// Alternate every CC between 127 and 0, twice a second.
    Pulse,
    /// Hold every CC at one value.
    Hold,
}

/// A `send-test` run.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct SendTest {
    pub(crate) mode: TestMode,
    pub(crate) hold: u8,
    pub(crate) ccs: RangeInclusive<u8>,
    pub(crate) duration: Duration,
}
impl SendTest {
    pub(crate) const DEFAULT_HOLD: i32 = 64;
    pub(crate) const DEFAULT_CC_RANGE: [u8; 2] = [20, 29];

    const STEP: Duration = Duration::from_millis(250);
    const SWEEP_STEP: Duration = Duration::from_millis(10);

    /// `cc_range` is `[first, last]`; anything shorter falls back to the
    /// default range.
    pub(crate) fn new_with(mode: TestMode, hold: i32, cc_range: &[u8], seconds: f64) -> Self {
        let (first, last) = match cc_range {
            [first, last, ..] => (*first, *last),
            _ => (Self::DEFAULT_CC_RANGE[0], Self::DEFAULT_CC_RANGE[1]),
        };
        Self {
            mode,
            hold: hold.clamp(0, 127) as u8,
            ccs: first.min(127)..=last.min(127),
            duration: Duration::from_secs_f64(seconds.max(0.0)),
        }
    }

    /// Coarse steps up from 0, then down from 127.
    pub(crate) fn sweep_values() -> impl Iterator<Item = u8> {
        (0..128u8).step_by(8).chain((0..=127u8).rev().step_by(8))
    }

    /// The pulse value `elapsed` into the test.
    pub(crate) fn pulse_value(elapsed: Duration) -> u8 {
        if (elapsed.as_secs_f64() * 2.0) as u64 % 2 == 0 {
            127
        } else {
            0
        }
    }

    fn send_all(&self, output: &mut impl SendsControlChange, value: u8) {
        for cc in self.ccs.clone() {
            output.send_control_change(ControlChange::new(MidiChannel::new(0), cc, value));
        }
    }

    /// Sends the test signal to `output` until the duration runs out or
    /// `stop` is set.
    pub(crate) fn run(&self, output: &mut impl SendsControlChange, stop: &AtomicBool) {
        let start = Instant::now();
        while start.elapsed() < self.duration && !stop.load(Ordering::Relaxed) {
            match self.mode {
                TestMode::Hold => {
                    self.send_all(output, self.hold);
                    std::thread::sleep(Self::STEP);
                }
                TestMode::Pulse => {
                    self.send_all(output, Self::pulse_value(start.elapsed()));
                    std::thread::sleep(Self::STEP);
                }
                TestMode::Sweep => {
                    for value in Self::sweep_values() {
                        if stop.load(Ordering::Relaxed) {
                            break;
                        }
                        self.send_all(output, value);
                        std::thread::sleep(Self::SWEEP_STEP);
                    }
                }
            }
        }
    }
}

/// Sends a test signal to the configured output port (never a dry run).
pub(crate) fn send_test(
    settings: &Settings,
    test: &SendTest,
    stop: &AtomicBool,
) -> anyhow::Result<()> {
    let Some(port_name) = settings.midi.out_port_name.as_deref() else {
        return Err(anyhow!("No MIDI output port configured."));
    };
    let mut output = MidiCcOutput::open(
        &PortChoice::Existing(port_name.to_string()),
        settings.midi.max_messages_per_sec,
        false,
    )?;
    println!(
        "Sending test CCs ({:?}) to {port_name} for {:?} on CCs {}-{}",
        test.mode,
        test.duration,
        test.ccs.start(),
        test.ccs.end()
    );
    test.run(&mut output, stop);
    if stop.load(Ordering::Relaxed) {
        println!("Test stopped.");
    }
    output.close();
    Ok(())
}
