// Copyright (c) 2024 Mike Tsao

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use strum_macros::{Display, EnumIter};

/// The waveform a lane follows before smoothing and shaping.
#[derive(Clone, Copy, Debug, Default, Display, EnumIter, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Curve {
    /// One sine cycle every `cycle_steps` steps.
    #[default]
    Sine,
    /// Rises linearly from 0 to 1 over `cycle_steps` steps, then starts over.
    Ramp,
    /// Wanders by at most `step_size` each step.
    RandomWalk,
    /// Holds a random value for `hold_steps` steps.
    StepHold,
    /// A fresh random value every step. Unrecognized curve names land here.
    #[serde(other)]
    Random,
}

/// Maps a normalized value onto a normalized value.
#[derive(Clone, Copy, Debug, Default, Display, EnumIter, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Shape {
    /// x²
    Exp,
    /// √x
    Log,
    /// Half a cosine cycle.
    SCurve,
    /// Unrecognized shape names land here.
    #[default]
    Linear,
}
impl<'de> Deserialize<'de> for Shape {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Ok(Self::from_tag(&String::deserialize(deserializer)?))
    }
}
impl Shape {
    /// Looks up a shape by name, ignoring case.
    pub fn from_tag(tag: &str) -> Self {
        match tag.to_lowercase().as_str() {
            "exp" | "exponential" => Shape::Exp,
            "log" | "logarithmic" => Shape::Log,
            "s_curve" | "s-curve" | "scurve" => Shape::SCurve,
            _ => Shape::Linear,
        }
    }

    /// Applies the shape to `value`, which is clamped to 0..=1 first.
    pub fn apply(&self, value: f64) -> f64 {
        let value = value.clamp(0.0, 1.0);
        match self {
            Shape::Linear => value,
            Shape::Exp => value * value,
            Shape::Log => value.sqrt(),
            Shape::SCurve => 0.5 * (1.0 - (PI * value).cos()),
        }
    }
}

/// Per-scene overrides of a lane's curve parameters. Any that are missing
/// fall back to the curve's default.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurveParams {
    /// Steps per cycle for [Curve::Sine] and [Curve::Ramp].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cycle_steps: Option<u32>,
    /// Largest per-step move for [Curve::RandomWalk].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_size: Option<f64>,
    /// Steps each value is held for [Curve::StepHold].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hold_steps: Option<u32>,
}
#[allow(missing_docs)]
impl CurveParams {
    pub const DEFAULT_CYCLE_STEPS: u32 = 16;
    pub const DEFAULT_STEP_SIZE: f64 = 0.08;
    pub const DEFAULT_HOLD_STEPS: u32 = 4;

    pub fn cycle_steps(&self) -> u32 {
        self.cycle_steps.unwrap_or(Self::DEFAULT_CYCLE_STEPS).max(1)
    }

    pub fn step_size(&self) -> f64 {
        self.step_size.unwrap_or(Self::DEFAULT_STEP_SIZE)
    }

    pub fn hold_steps(&self) -> u32 {
        self.hold_steps.unwrap_or(Self::DEFAULT_HOLD_STEPS).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;
    use strum::IntoEnumIterator;

    #[test]
    fn shapes_pin_the_endpoints() {
        for shape in Shape::iter() {
            assert!(approx_eq!(f64, shape.apply(0.0), 0.0, epsilon = 1e-12), "{shape}");
            assert!(approx_eq!(f64, shape.apply(1.0), 1.0, epsilon = 1e-12), "{shape}");
            assert!(approx_eq!(f64, shape.apply(-3.0), 0.0, epsilon = 1e-12), "{shape}");
            assert!(approx_eq!(f64, shape.apply(3.0), 1.0, epsilon = 1e-12), "{shape}");
        }
    }

    #[test]
    fn shape_midpoints() {
        assert!(approx_eq!(f64, Shape::Linear.apply(0.25), 0.25));
        assert!(approx_eq!(f64, Shape::Exp.apply(0.5), 0.25));
        assert!(approx_eq!(f64, Shape::Log.apply(0.25), 0.5));
        assert!(approx_eq!(f64, Shape::SCurve.apply(0.5), 0.5, epsilon = 1e-12));
    }

    #[test]
    fn names_deserialize_with_fallbacks() {
        let curve: Curve = serde_json::from_str("\"random_walk\"").unwrap();
        assert_eq!(curve, Curve::RandomWalk);
        let curve: Curve = serde_json::from_str("\"wobble\"").unwrap();
        assert_eq!(curve, Curve::Random);

        let shape: Shape = serde_json::from_str("\"exponential\"").unwrap();
        assert_eq!(shape, Shape::Exp);
        let shape: Shape = serde_json::from_str("\"s_curve\"").unwrap();
        assert_eq!(shape, Shape::SCurve);
        let shape: Shape = serde_json::from_str("\"zigzag\"").unwrap();
        assert_eq!(shape, Shape::Linear);
        let shape: Shape = serde_json::from_str("\"EXP\"").unwrap();
        assert_eq!(shape, Shape::Exp);
        assert_eq!(Shape::from_tag("S_Curve"), Shape::SCurve);
        assert_eq!(Shape::from_tag("Logarithmic"), Shape::Log);
    }

    #[test]
    fn curve_param_defaults() {
        let params = CurveParams::default();
        assert_eq!(params.cycle_steps(), 16);
        assert_eq!(params.hold_steps(), 4);
        assert!(approx_eq!(f64, params.step_size(), 0.08));

        let params = CurveParams {
            cycle_steps: Some(0),
            hold_steps: Some(0),
            ..Default::default()
        };
        assert_eq!(params.cycle_steps(), 1);
        assert_eq!(params.hold_steps(), 1);
    }
}
