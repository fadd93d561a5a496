// Copyright (c) 2024 Mike Tsao

#![deny(unused_imports, unused_variables)]
#![warn(missing_docs)]
#![allow(rustdoc::private_intra_doc_links)]

//! Spiralwalk generates MIDI Control Change automation for live performance,
//! locked to an external MIDI clock.
//!
//! * An [AutomationEngine] follows the clock's Start, Stop, Continue, and
//! timing pulses, and on each subdivision asks every [Lane](automation::Lane)
//! for its next value. Each lane traces a [Curve](elements::Curve), smooths
//! and shapes it, and scales it into the range that the active scene allows.
//! * Every phrase, a [SpiralWalker](elements::SpiralWalker) moves to another
//! scene: usually a fixed stride forward, sometimes a random jump, never a
//! scene it visited recently.
//! * [Settings] describe lanes, scenes, and transport, and load from TOML or
//! JSON.
//! * A session log records each bar's values, which [TempoReplay] can play
//! back and [derive_scenes()](util::derive_scenes) can turn into new scenes.
//!
//! This crate knows nothing about MIDI ports. Transport messages come in
//! through [HandlesTransport](traits::HandlesTransport), and Control Changes
//! go out through [SendsControlChange](traits::SendsControlChange); the
//! `spiralwalk-services` crate connects both to real hardware.

/// A collection of imports that are useful to users of this crate. `use
/// spiralwalk::prelude::*;` for easier onboarding.
pub mod prelude {
    pub use super::{
        automation::prelude::*, elements::prelude::*, traits::prelude::*, types::prelude::*,
        util::prelude::*, Error,
    };
}

// Fundamental structures that are important enough to re-export at top level.
pub use {
    automation::{AutomationEngine, TempoReplay},
    error::Error,
    util::Settings,
    version::app_version,
};

pub mod automation;
pub mod elements;
pub mod traits;
pub mod types;
pub mod util;

mod error;
mod version;
