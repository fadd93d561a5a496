// Copyright (c) 2024 Mike Tsao

//! Clock-driven Control Change automation.
//!
//! An [AutomationEngine] follows an external MIDI clock. On every subdivision
//! that a [Lane] subscribes to, the lane produces its next value within the
//! active scene's range, and the engine sends it as a Control Change. At
//! phrase boundaries the engine's
//! [SpiralWalker](crate::elements::SpiralWalker) picks the next scene.
//!
//! Lanes with a [LaneRole::Restraint] or [LaneRole::Contrast] role don't just
//! send values. Their latest values also narrow or widen every other lane's
//! range (see [MetaInputs]).
//!
//! [TempoReplay] plays back a recorded session against the same clock, and
//! [run_until_stopped()] drives either one from a channel of transport
//! messages.

/// The most commonly used imports.
pub mod prelude {
    pub use super::{
        AutomationEngine, EngineOptions, EngineOptionsBuilder, Lane, LaneBuilder, LaneRole,
        SceneParams, TempoReplay,
    };
}

pub use arming::Arming;
pub use engine::{AutomationEngine, EngineOptions, EngineOptionsBuilder};
pub use lane::{Lane, LaneBuilder, LaneRole, LaneState, SceneParams};
pub use meta::MetaInputs;
pub use replay::{ReplayFrame, TempoReplay};
pub use runner::{run_until_stopped, POLL_INTERVAL};

mod arming;
mod engine;
mod lane;
mod meta;
mod replay;
mod runner;
