// Copyright (c) 2024 Mike Tsao

use crate::{
    elements::{Curve, CurveParams, Shape},
    types::{Division, MidiChannel},
    util::Rng,
};
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;
use strum_macros::Display;

/// A lane's part in cross-lane meta-modulation.
#[derive(Clone, Copy, Debug, Default, Display, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LaneRole {
    /// Narrows every other lane's range as its value rises.
    #[serde(alias = "Restraint", alias = "RESTRAINT")]
    Restraint,
    /// Widens every other lane's range as its value rises.
    #[serde(alias = "Contrast", alias = "CONTRAST")]
    Contrast,
    /// No meta role. Unrecognized role names land here.
    #[default]
    #[serde(other)]
    Other,
}
impl LaneRole {
    /// Whether this role drives meta-modulation (and so is exempt from it).
    pub fn is_meta(&self) -> bool {
        matches!(self, LaneRole::Restraint | LaneRole::Contrast)
    }
}

/// What a scene asks of one lane.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SceneParams {
    /// Output when the shaped curve is at 0.
    pub min: u8,
    /// Output when the shaped curve is at 1.
    pub max: u8,
    /// Overrides for the lane's curve.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub curve_params: Option<CurveParams>,
}
impl Default for SceneParams {
    fn default() -> Self {
        Self {
            min: 0,
            max: 127,
            curve_params: None,
        }
    }
}
impl SceneParams {
    #[allow(missing_docs)]
    pub fn new_with(min: u8, max: u8) -> Self {
        Self {
            min,
            max,
            curve_params: None,
        }
    }
}

/// The part of a [Lane] that evolves from step to step.
#[derive(Clone, Debug, PartialEq)]
pub struct LaneState {
    /// The previous smoothed value, if any.
    pub previous_value: Option<f64>,
    /// Radians for [Curve::Sine]; the step counter for [Curve::Ramp].
    pub phase: f64,
    #[allow(missing_docs)]
    pub hold_value: f64,
    #[allow(missing_docs)]
    pub hold_remaining: u32,
    #[allow(missing_docs)]
    pub random_position: f64,
    /// The last value this lane emitted.
    pub last_output: Option<u8>,
}
impl Default for LaneState {
    fn default() -> Self {
        Self {
            previous_value: None,
            phase: 0.0,
            hold_value: 0.0,
            hold_remaining: 0,
            random_position: 0.5,
            last_output: None,
        }
    }
}

/// One automation channel, bound to a CC number on a MIDI channel.
///
/// Each call to [Lane::next_value()] runs the pipeline: curve, smoothing,
/// shaping, scaling to the scene's range, and finally the deadband/slew gate.
#[derive(Debug, Builder)]
#[builder(pattern = "owned")]
pub struct Lane {
    #[builder(setter(into))]
    name: String,
    cc: u8,
    #[builder(default)]
    channel: MidiChannel,
    division: Division,
    #[builder(default)]
    curve: Curve,
    /// 0..=1; 1 means no smoothing.
    #[builder(default = "0.2")]
    smoothing: f64,
    #[builder(default)]
    role: LaneRole,
    #[builder(default)]
    shape: Shape,
    /// The smallest change worth sending. Zero disables the deadband.
    #[builder(default)]
    deadband: u32,
    /// The largest change allowed in one step.
    #[builder(default)]
    slew_limit: Option<u32>,
    #[builder(default)]
    rng: Rng,

    #[builder(setter(skip))]
    state: LaneState,
}
impl Lane {
    /// Computes the lane's next output, or [None] if the change falls inside
    /// the deadband. Generation state advances either way.
    pub fn next_value(&mut self, scene: &SceneParams) -> Option<u8> {
        let curve_params = scene.curve_params.unwrap_or_default();
        let raw = self.curve_value(&curve_params);

        let smoothed = match self.state.previous_value {
            None => raw,
            Some(previous) => {
                let alpha = self.smoothing.clamp(0.0, 1.0);
                alpha * raw + (1.0 - alpha) * previous
            }
        };
        self.state.previous_value = Some(smoothed);

        let shaped = self.shape.apply(smoothed);
        let mut scaled = Self::scale(shaped, scene.min, scene.max);

        if let Some(last) = self.state.last_output {
            let delta = scaled as i32 - last as i32;
            if self.deadband > 0 && delta.unsigned_abs() < self.deadband {
                return None;
            }
            if let Some(limit) = self.slew_limit {
                if delta.unsigned_abs() > limit {
                    let step = if delta > 0 {
                        limit as i32
                    } else {
                        -(limit as i32)
                    };
                    scaled = (last as i32 + step).clamp(0, 127) as u8;
                }
            }
        }

        self.state.last_output = Some(scaled);
        Some(scaled)
    }

    fn curve_value(&mut self, params: &CurveParams) -> f64 {
        let state = &mut self.state;
        match self.curve {
            Curve::Sine => {
                state.phase += TAU / params.cycle_steps() as f64;
                0.5 * (1.0 + state.phase.sin())
            }
            Curve::Ramp => {
                let cycle_steps = params.cycle_steps() as f64;
                let step = (state.phase + 1.0).rem_euclid(cycle_steps);
                state.phase = step;
                step / (cycle_steps - 1.0).max(1.0)
            }
            Curve::RandomWalk => {
                let step_size = params.step_size();
                let delta = self.rng.rand_uniform(-step_size, step_size);
                state.random_position = (state.random_position + delta).clamp(0.0, 1.0);
                state.random_position
            }
            Curve::StepHold => {
                if state.hold_remaining == 0 {
                    state.hold_value = self.rng.rand_float();
                    state.hold_remaining = params.hold_steps();
                }
                state.hold_remaining -= 1;
                state.hold_value
            }
            Curve::Random => self.rng.rand_float(),
        }
    }

    /// Maps 0..=1 onto `min..=max`, rounding half to even, then clamps to the
    /// MIDI data range.
    fn scale(value: f64, min: u8, max: u8) -> u8 {
        let value = value.clamp(0.0, 1.0);
        let scaled = min as f64 + (max as f64 - min as f64) * value;
        scaled.clamp(0.0, 127.0).round_ties_even() as u8
    }

    /// Clears generation state. Identity and configuration are unchanged.
    pub fn reset(&mut self) {
        self.state = LaneState::default();
    }

    /// Replaces the lane's random-number generator, e.g. to reseed it.
    pub fn set_rng(&mut self, rng: Rng) {
        self.rng = rng;
    }

    #[allow(missing_docs)]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[allow(missing_docs)]
    pub fn cc(&self) -> u8 {
        self.cc
    }

    #[allow(missing_docs)]
    pub fn channel(&self) -> MidiChannel {
        self.channel
    }

    #[allow(missing_docs)]
    pub fn division(&self) -> Division {
        self.division
    }

    #[allow(missing_docs)]
    pub fn curve(&self) -> Curve {
        self.curve
    }

    #[allow(missing_docs)]
    pub fn shape(&self) -> Shape {
        self.shape
    }

    #[allow(missing_docs)]
    pub fn role(&self) -> LaneRole {
        self.role
    }

    #[allow(missing_docs)]
    pub fn state(&self) -> &LaneState {
        &self.state
    }

    /// Direct access to the generation state, for priming a lane.
    pub fn state_mut(&mut self) -> &mut LaneState {
        &mut self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use more_asserts::{assert_ge, assert_le};
    use strum::IntoEnumIterator;

    fn lane(curve: Curve) -> LaneBuilder {
        LaneBuilder::default()
            .name("test")
            .cc(20)
            .division(Division::parse("1/16", 24).unwrap())
            .curve(curve)
            .rng(Rng::new_with_seed(42))
    }

    fn params_with(curve_params: CurveParams) -> SceneParams {
        SceneParams {
            curve_params: Some(curve_params),
            ..SceneParams::new_with(0, 127)
        }
    }

    #[test]
    fn ramp_over_four_steps() {
        let mut lane = lane(Curve::Ramp).smoothing(1.0).build().unwrap();
        lane.state_mut().phase = 3.0;
        let params = params_with(CurveParams {
            cycle_steps: Some(4),
            ..Default::default()
        });
        let values: Vec<Option<u8>> = (0..4).map(|_| lane.next_value(&params)).collect();
        assert_eq!(values, vec![Some(0), Some(42), Some(85), Some(127)]);

        // And around again.
        assert_eq!(lane.next_value(&params), Some(0));
    }

    #[test]
    fn single_step_ramp_stays_at_zero() {
        let mut lane = lane(Curve::Ramp).smoothing(1.0).build().unwrap();
        let params = params_with(CurveParams {
            cycle_steps: Some(1),
            ..Default::default()
        });
        assert_eq!(lane.next_value(&params), Some(0));
        assert_eq!(lane.next_value(&params), Some(0));
    }

    #[test]
    fn sine_completes_a_cycle() {
        let mut lane = lane(Curve::Sine).smoothing(1.0).build().unwrap();
        let params = params_with(CurveParams {
            cycle_steps: Some(4),
            ..Default::default()
        });
        let values: Vec<u8> = (0..4).map(|_| lane.next_value(&params).unwrap()).collect();
        // Phases π/2, π, 3π/2, 2π. The midpoints sit right at 63.5.
        assert_eq!(values[0], 127);
        assert!((63..=64).contains(&values[1]), "{values:?}");
        assert_eq!(values[2], 0);
        assert!((63..=64).contains(&values[3]), "{values:?}");
    }

    #[test]
    fn first_value_is_unsmoothed_then_smoothing_lags() {
        let mut lane = lane(Curve::Ramp).smoothing(0.5).build().unwrap();
        lane.state_mut().phase = 3.0;
        let params = params_with(CurveParams {
            cycle_steps: Some(2),
            ..Default::default()
        });
        // Raw values are 0, 1, 0, 1...
        assert_eq!(lane.next_value(&params), Some(0));
        assert_eq!(lane.next_value(&params), Some(64)); // 0.5 * 127 = 63.5, ties to even
        assert_eq!(lane.next_value(&params), Some(32)); // 0.25 * 127 = 31.75
    }

    #[test]
    fn every_curve_stays_in_scene_range() {
        for curve in Curve::iter() {
            let mut lane = lane(curve).build().unwrap();
            let params = SceneParams::new_with(30, 90);
            for _ in 0..200 {
                let value = lane.next_value(&params).unwrap();
                assert_ge!(value, 30, "{curve}");
                assert_le!(value, 90, "{curve}");
            }
        }
    }

    #[test]
    fn inverted_range_scales_downward() {
        let mut lane = lane(Curve::Ramp).smoothing(1.0).build().unwrap();
        lane.state_mut().phase = 3.0;
        let params = SceneParams {
            curve_params: Some(CurveParams {
                cycle_steps: Some(4),
                ..Default::default()
            }),
            ..SceneParams::new_with(127, 0)
        };
        assert_eq!(lane.next_value(&params), Some(127));
        assert_eq!(lane.next_value(&params), Some(85));
    }

    #[test]
    fn step_hold_holds() {
        let mut lane = lane(Curve::StepHold).smoothing(1.0).build().unwrap();
        let params = params_with(CurveParams {
            hold_steps: Some(3),
            ..Default::default()
        });
        let values: Vec<u8> = (0..9).map(|_| lane.next_value(&params).unwrap()).collect();
        for chunk in values.chunks(3) {
            assert!(chunk.iter().all(|v| *v == chunk[0]), "{values:?}");
        }
    }

    #[test]
    fn random_walk_moves_in_small_steps() {
        let mut lane = lane(Curve::RandomWalk).smoothing(1.0).build().unwrap();
        let params = params_with(CurveParams {
            step_size: Some(0.05),
            ..Default::default()
        });
        let mut previous = lane.next_value(&params).unwrap() as i32;
        for _ in 0..200 {
            let value = lane.next_value(&params).unwrap() as i32;
            // 0.05 * 127 = 6.35, plus rounding.
            assert_le!((value - previous).abs(), 7);
            previous = value;
        }
    }

    #[test]
    fn deadband_suppresses_small_changes() {
        let mut lane = lane(Curve::Ramp)
            .smoothing(1.0)
            .deadband(50)
            .build()
            .unwrap();
        lane.state_mut().phase = 3.0;
        let params = params_with(CurveParams {
            cycle_steps: Some(4),
            ..Default::default()
        });
        assert_eq!(lane.next_value(&params), Some(0));
        assert_eq!(lane.next_value(&params), None); // 42 is within 50 of 0
        assert_eq!(lane.next_value(&params), Some(85)); // but the ramp kept going
        assert_eq!(lane.next_value(&params), None); // 127 is within 50 of 85
        assert_eq!(lane.state().last_output, Some(85));
    }

    #[test]
    fn slew_limit_bounds_every_step() {
        for curve in Curve::iter() {
            let mut lane = lane(curve)
                .smoothing(1.0)
                .slew_limit(Some(10))
                .build()
                .unwrap();
            let params = params_with(CurveParams {
                cycle_steps: Some(3),
                step_size: Some(0.5),
                hold_steps: Some(1),
            });
            let mut previous: Option<u8> = None;
            for _ in 0..300 {
                if let Some(value) = lane.next_value(&params) {
                    if let Some(previous) = previous {
                        assert_le!((value as i32 - previous as i32).abs(), 10, "{curve}");
                    }
                    previous = Some(value);
                }
            }
        }
    }

    #[test]
    fn slew_clamps_toward_target() {
        let mut lane = lane(Curve::Ramp)
            .smoothing(1.0)
            .slew_limit(Some(20))
            .build()
            .unwrap();
        lane.state_mut().phase = 3.0;
        let params = params_with(CurveParams {
            cycle_steps: Some(2),
            ..Default::default()
        });
        assert_eq!(lane.next_value(&params), Some(0));
        assert_eq!(lane.next_value(&params), Some(20));
        assert_eq!(lane.next_value(&params), Some(0));
    }

    #[test]
    fn reset_matches_fresh_lane() {
        let mut lane = lane(Curve::StepHold).deadband(2).build().unwrap();
        let params = SceneParams::default();
        (0..17).for_each(|_| {
            lane.next_value(&params);
        });
        assert_ne!(lane.state(), &LaneState::default());
        lane.reset();
        assert_eq!(lane.state(), &LaneState::default());
        assert_eq!(lane.name(), "test");
        assert_eq!(lane.cc(), 20);
    }

    #[test]
    fn roles() {
        assert!(LaneRole::Restraint.is_meta());
        assert!(LaneRole::Contrast.is_meta());
        assert!(!LaneRole::Other.is_meta());
        let role: LaneRole = serde_json::from_str("\"Restraint\"").unwrap();
        assert_eq!(role, LaneRole::Restraint);
        let role: LaneRole = serde_json::from_str("\"bass\"").unwrap();
        assert_eq!(role, LaneRole::Other);
    }
}
