// Copyright (c) 2024 Mike Tsao

use super::arming::Arming;
use crate::{
    elements::ClockFollower,
    traits::{HandlesTransport, SendsControlChange},
    types::{ClockPosition, ControlChange, MidiChannel, TransportEvent},
    util::Settings,
    Error,
};
use log::{info, warn};
use std::collections::BTreeMap;

/// One bar's lane values, by lane name.
pub type ReplayFrame = BTreeMap<String, u8>;

/// [TempoReplay] plays back a recorded session in time with an external
/// clock: one recorded bar per live bar, looping when it runs out.
#[derive(Debug)]
pub struct TempoReplay<O: SendsControlChange> {
    clock: ClockFollower<()>,
    frames: Vec<ReplayFrame>,
    frame_index: usize,
    // Lane name to (controller, channel).
    lane_map: BTreeMap<String, (u8, MidiChannel)>,
    arming: Arming,
    output: O,
}
impl<O: SendsControlChange> TempoReplay<O> {
    /// Sixteenths are frequent enough to catch every bar boundary.
    const DIVISION: &'static str = "1/16";

    /// Maps frames onto the lanes in `settings`. Values for lanes that
    /// aren't configured are skipped.
    pub fn new_with(
        settings: &Settings,
        frames: Vec<ReplayFrame>,
        arm_ticks: u32,
        output: O,
    ) -> Result<Self, Error> {
        let mut clock = ClockFollower::new_with(settings.transport.ppq_division, 4);
        clock.register_callback(Self::DIVISION, ())?;
        if frames.is_empty() {
            warn!("No frames to replay");
        }
        Ok(Self {
            clock,
            frames,
            frame_index: 0,
            lane_map: settings
                .lanes
                .iter()
                .map(|lane| (lane.name.clone(), (lane.cc, lane.midi_channel())))
                .collect(),
            arming: Arming::new(arm_ticks),
            output,
        })
    }

    fn handle_clock(&mut self) {
        let mut fired: Vec<ClockPosition> = Vec::default();
        self.clock
            .handle_clock_tick(&mut |_, position| fired.push(position));
        if self.arming.is_armed() {
            for position in fired {
                if position.tick % self.clock.ticks_per_bar() == 0 {
                    self.send_next_frame(position);
                }
            }
        }
        self.arming.handle_clock(self.clock.is_running());
    }

    fn send_next_frame(&mut self, position: ClockPosition) {
        if self.frames.is_empty() {
            return;
        }
        let frame = &self.frames[self.frame_index % self.frames.len()];
        info!("Replay bar {} frame {}", position.bar + 1, self.frame_index);
        for (lane_name, value) in frame {
            if let Some((cc, channel)) = self.lane_map.get(lane_name) {
                self.output
                    .send_control_change(ControlChange::new(*channel, *cc, *value));
            }
        }
        self.frame_index += 1;
    }

    /// How many frames have been sent since the last Start.
    pub fn frame_index(&self) -> usize {
        self.frame_index
    }

    #[allow(missing_docs)]
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    #[allow(missing_docs)]
    pub fn output(&self) -> &O {
        &self.output
    }
}
impl<O: SendsControlChange> HandlesTransport for TempoReplay<O> {
    fn handle_transport(&mut self, event: TransportEvent) -> anyhow::Result<()> {
        match event {
            TransportEvent::Clock => self.handle_clock(),
            TransportEvent::Start => {
                self.clock.start(false);
                self.frame_index = 0;
                self.arming.handle_start();
            }
            TransportEvent::Continue => {
                self.clock.start(true);
                self.arming.handle_continue();
            }
            TransportEvent::Stop => {
                self.clock.stop();
                self.arming.handle_stop();
            }
        }
        Ok(())
    }
}
