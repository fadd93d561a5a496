// Copyright (c) 2024 Mike Tsao

//! System utilities.

/// Commonly used imports.
pub mod prelude {
    pub use super::{rng::Rng, settings::Settings};
}

pub use derive::{
    derive_scenes, derive_scenes_from_log, quantile, render_scenes_toml, DerivedRange,
    DerivedScene,
};
pub use rate_limit::RateLimiter;
pub use rng::{derive_lane_seed, Rng};
pub use session_log::{read_session_log, SessionLogEntry, SessionLogWriter};
pub use settings::{
    natural_cmp, LaneSettings, MidiSettings, SceneDefinitions, Settings, SpiralSettings,
    TransportSettings,
};

mod derive;
mod rate_limit;
mod rng;
mod session_log;
mod settings;
