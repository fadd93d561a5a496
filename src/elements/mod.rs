// Copyright (c) 2024 Mike Tsao

//! Building blocks for the automation engine: the clock follower, the curves
//! that lanes trace, and the scene walker.

/// The most commonly used imports.
pub mod prelude {
    pub use super::{
        ClockFollower, Curve, CurveParams, Shape, SpiralParams, SpiralParamsBuilder, SpiralWalker,
    };
}

pub use clock::{ClockFollower, DivisionEventsFn};
pub use curves::{Curve, CurveParams, Shape};
pub use spiral::{SpiralParams, SpiralParamsBuilder, SpiralWalker};

mod clock;
mod curves;
mod spiral;
