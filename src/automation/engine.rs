// Copyright (c) 2024 Mike Tsao

use super::{
    arming::Arming,
    lane::{Lane, LaneBuilder, SceneParams},
    meta::MetaInputs,
};
use crate::{
    elements::{ClockFollower, SpiralParamsBuilder, SpiralWalker},
    traits::{HandlesTransport, SendsControlChange},
    types::{ClockPosition, ControlChange, Division, TransportEvent},
    util::{
        derive_lane_seed, LaneSettings, Rng, SessionLogEntry, SessionLogWriter, Settings,
    },
    Error,
};
use derive_builder::Builder;
use log::{debug, info};
use std::{
    collections::{BTreeMap, BTreeSet},
    path::PathBuf,
};

/// How a performance runs, beyond what the configuration file says.
#[derive(Clone, Debug, Default, Builder, PartialEq, Eq)]
#[builder(default)]
pub struct EngineOptions {
    /// Stay on the first scene for the whole performance.
    pub freeze_scene: bool,
    /// Lanes that send one value and then hold it.
    #[builder(setter(each(name = "frozen_lane", into)))]
    pub frozen_lanes: BTreeSet<String>,
    /// Where to append the session log, if anywhere.
    #[builder(setter(into, strip_option))]
    pub session_log_path: Option<PathBuf>,
    /// Clock ticks to wait after Start before sending anything.
    pub arm_ticks: u32,
    /// Treat Start like Continue: keep the musical position and lane state.
    pub soft_start: bool,
}

/// [AutomationEngine] ties a [ClockFollower], a set of [Lane]s, and a
/// [SpiralWalker] together. Feed it transport messages with
/// [HandlesTransport::handle_transport()]; it sends Control Changes to its
/// output as lanes produce values.
#[derive(Debug)]
pub struct AutomationEngine<O: SendsControlChange> {
    clock: ClockFollower<Division>,
    lanes: Vec<Lane>,
    // Indexes into `lanes`: meta-role lanes first, otherwise configured order.
    processing_order: Vec<usize>,
    scenes: Vec<(String, BTreeMap<String, SceneParams>)>,
    spiral: SpiralWalker,
    current_scene: usize,
    last_values: BTreeMap<String, u8>,
    phrase_bars: u64,
    arming: Arming,
    options: EngineOptions,
    session_log: Option<SessionLogWriter>,
    output: O,
}
impl<O: SendsControlChange> AutomationEngine<O> {
    /// Builds an engine from validated settings. Fails if the settings
    /// don't validate.
    pub fn new_with(settings: &Settings, options: EngineOptions, output: O) -> Result<Self, Error> {
        settings.validate()?;
        let ppq = settings.transport.ppq_division;
        let seed = settings.spiral.seed;

        let mut clock = ClockFollower::new_with(ppq, 4);
        let mut lanes = Vec::with_capacity(settings.lanes.len());
        let mut registered: Vec<Division> = Vec::default();
        for lane_settings in &settings.lanes {
            let lane = Self::build_lane(lane_settings, ppq, seed)?;
            if !registered.contains(&lane.division()) {
                clock.register_callback(&lane.division().to_string(), lane.division())?;
                registered.push(lane.division());
            }
            lanes.push(lane);
        }

        let mut processing_order: Vec<usize> = (0..lanes.len()).collect();
        processing_order.sort_by_key(|i| !lanes[*i].role().is_meta());

        let scenes: Vec<_> = settings
            .scene_order()
            .into_iter()
            .map(|name| {
                let lanes = settings.scenes.get(&name).cloned().unwrap_or_default();
                (name, lanes)
            })
            .collect();

        let spiral = SpiralWalker::new_with(
            SpiralParamsBuilder::default()
                .scene_count(scenes.len())
                .k_step(settings.spiral.k_step)
                .memory_k(settings.spiral.memory_k)
                .p_jump(settings.spiral.p_jump)
                .seed(seed)
                .build()?,
        )?;

        let mut r = Self {
            clock,
            lanes,
            processing_order,
            scenes,
            spiral,
            current_scene: 0,
            last_values: Default::default(),
            phrase_bars: settings.transport.phrase_bars.max(1) as u64,
            arming: Arming::new(options.arm_ticks),
            session_log: options.session_log_path.clone().map(SessionLogWriter::new),
            options,
            output,
        };
        r.hard_reset();
        Ok(r)
    }

    fn build_lane(settings: &LaneSettings, ppq: u32, seed: Option<u64>) -> Result<Lane, Error> {
        LaneBuilder::default()
            .name(settings.name.as_str())
            .cc(settings.cc)
            .channel(settings.midi_channel())
            .division(Division::parse(&settings.division, ppq)?)
            .curve(settings.curve)
            .smoothing(settings.smoothing)
            .role(settings.role)
            .shape(settings.shape)
            .deadband(settings.deadband)
            .slew_limit(settings.slew_limit)
            .rng(Rng::new_with_optional_seed(
                seed.map(|seed| derive_lane_seed(&settings.name, seed)),
            ))
            .build()
            .map_err(|e| Error::Config(e.to_string()))
    }

    /// Rewinds everything: clock position, scene walk, lane state, and the
    /// record of last values.
    fn hard_reset(&mut self) {
        self.clock.reset();
        self.spiral.reset();
        self.current_scene = 0;
        self.last_values.clear();
        self.lanes.iter_mut().for_each(|lane| lane.reset());
    }

    fn handle_clock(&mut self) -> anyhow::Result<()> {
        let mut fired: Vec<(Division, ClockPosition)> = Vec::default();
        self.clock
            .handle_clock_tick(&mut |division, position| fired.push((*division, position)));

        if self.arming.is_armed() {
            // Once per tick, not once per fired division, so a bar that
            // several divisions share logs one line and advances the phrase
            // once.
            if let Some((_, position)) = fired.first() {
                if position.tick % self.clock.ticks_per_bar() == 0 {
                    self.handle_bar_boundary(*position)?;
                }
            }
            for (division, _) in fired {
                self.handle_division(division);
            }
        }

        self.arming.handle_clock(self.clock.is_running());
        Ok(())
    }

    fn handle_bar_boundary(&mut self, position: ClockPosition) -> anyhow::Result<()> {
        info!("Bar {} Scene {}", position.bar + 1, self.current_scene);
        self.log_bar(position.bar)?;
        if !self.options.freeze_scene && position.bar != 0 && position.bar % self.phrase_bars == 0
        {
            self.current_scene = self.spiral.on_phrase_boundary();
            debug!(
                "Phrase boundary: scene {} ({})",
                self.current_scene,
                self.current_scene_name()
            );
        }
        Ok(())
    }

    fn log_bar(&mut self, bar: u64) -> anyhow::Result<()> {
        if let Some(session_log) = self.session_log.as_mut() {
            session_log.write_entry(&SessionLogEntry {
                timestamp: SessionLogEntry::now(),
                bar,
                scene_index: self.current_scene,
                frozen_scene: self.options.freeze_scene,
                frozen_lanes: self.options.frozen_lanes.iter().cloned().collect(),
                lanes: self.last_values.clone(),
            })?;
        }
        Ok(())
    }

    fn handle_division(&mut self, division: Division) {
        let Some((_, scene)) = self.scenes.get(self.current_scene % self.scenes.len().max(1))
        else {
            return;
        };

        let mut meta: Option<MetaInputs> = None;
        for &index in &self.processing_order {
            let lane = &self.lanes[index];
            if lane.division() != division {
                continue;
            }
            let Some(params) = scene.get(lane.name()) else {
                continue;
            };
            if self.options.frozen_lanes.contains(lane.name())
                && self.last_values.contains_key(lane.name())
            {
                continue;
            }
            let params = if lane.role().is_meta() {
                *params
            } else {
                meta.get_or_insert_with(|| MetaInputs::from_lanes(&self.lanes, &self.last_values))
                    .modulate(params, lane.role())
            };

            let lane = &mut self.lanes[index];
            if let Some(value) = lane.next_value(&params) {
                self.last_values.insert(lane.name().to_string(), value);
                self.output.send_control_change(ControlChange::new(
                    lane.channel(),
                    lane.cc(),
                    value,
                ));
            }
        }
    }

    /// The index, in scene order, of the active scene.
    pub fn current_scene(&self) -> usize {
        self.current_scene
    }

    /// The name of the active scene.
    pub fn current_scene_name(&self) -> &str {
        self.scenes
            .get(self.current_scene % self.scenes.len().max(1))
            .map_or("", |(name, _)| name.as_str())
    }

    /// Scene names in walk order.
    pub fn scene_names(&self) -> impl Iterator<Item = &str> {
        self.scenes.iter().map(|(name, _)| name.as_str())
    }

    /// Each lane's most recently sent value.
    pub fn last_values(&self) -> &BTreeMap<String, u8> {
        &self.last_values
    }

    #[allow(missing_docs)]
    pub fn lanes(&self) -> &[Lane] {
        &self.lanes
    }

    #[allow(missing_docs)]
    pub fn clock(&self) -> &ClockFollower<Division> {
        &self.clock
    }

    #[allow(missing_docs)]
    pub fn is_armed(&self) -> bool {
        self.arming.is_armed()
    }

    #[allow(missing_docs)]
    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    #[allow(missing_docs)]
    pub fn output(&self) -> &O {
        &self.output
    }

    #[allow(missing_docs)]
    pub fn output_mut(&mut self) -> &mut O {
        &mut self.output
    }
}
impl<O: SendsControlChange> HandlesTransport for AutomationEngine<O> {
    fn handle_transport(&mut self, event: TransportEvent) -> anyhow::Result<()> {
        match event {
            TransportEvent::Clock => self.handle_clock()?,
            TransportEvent::Start => {
                self.clock.start(self.options.soft_start);
                if !self.options.soft_start {
                    self.hard_reset();
                }
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

    fn shutdown(&mut self) -> anyhow::Result<()> {
        if let Some(session_log) = self.session_log.as_mut() {
            session_log.close()?;
        }
        Ok(())
    }
}
