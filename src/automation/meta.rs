// Copyright (c) 2024 Mike Tsao

use super::lane::{Lane, LaneRole, SceneParams};
use std::collections::BTreeMap;

/// The live, normalized values of the lanes that drive meta-modulation.
/// A role with no lane, or whose lane hasn't sent anything yet, reads as zero.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MetaInputs {
    /// 0..=1. Higher narrows other lanes' ranges.
    pub restraint: f64,
    /// 0..=1. Higher widens other lanes' ranges.
    pub contrast: f64,
}
impl MetaInputs {
    /// The most a meta input can shrink or grow a half-range.
    pub const DEPTH: f64 = 0.8;

    /// Looks up the first lane with each role and reads its last value.
    pub fn from_lanes<'a>(
        lanes: impl IntoIterator<Item = &'a Lane>,
        last_values: &BTreeMap<String, u8>,
    ) -> Self {
        let mut restraint = None;
        let mut contrast = None;
        for lane in lanes {
            let slot = match lane.role() {
                LaneRole::Restraint => &mut restraint,
                LaneRole::Contrast => &mut contrast,
                LaneRole::Other => continue,
            };
            if slot.is_none() {
                *slot = Some(lane.name());
            }
        }
        let normalized = |name: Option<&str>| {
            name.and_then(|name| last_values.get(name))
                .map_or(0.0, |value| *value as f64 / 127.0)
        };
        Self {
            restraint: normalized(restraint),
            contrast: normalized(contrast),
        }
    }

    /// Adjusts `scene`'s range for a lane with the given role. Meta lanes
    /// themselves pass through unchanged.
    ///
    /// The range keeps its midpoint. Its half-width (at least one) shrinks
    /// by up to [MetaInputs::DEPTH] with restraint, and then grows by up to
    /// the same with contrast.
    pub fn modulate(&self, scene: &SceneParams, role: LaneRole) -> SceneParams {
        if role.is_meta() {
            return *scene;
        }
        let (min, max) = (scene.min as f64, scene.max as f64);
        let midpoint = (min + max) / 2.0;
        let mut half_range = ((max - min) / 2.0).max(1.0);
        half_range *= 1.0 - Self::DEPTH * self.restraint;
        half_range *= 1.0 + Self::DEPTH * self.contrast;

        SceneParams {
            min: (midpoint - half_range).trunc().clamp(0.0, 127.0) as u8,
            max: (midpoint + half_range).trunc().clamp(0.0, 127.0) as u8,
            curve_params: scene.curve_params,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{automation::LaneBuilder, types::Division};
    use float_cmp::approx_eq;

    fn lane(name: &str, role: LaneRole) -> Lane {
        LaneBuilder::default()
            .name(name)
            .cc(1)
            .division(Division::parse("1/16", 24).unwrap())
            .role(role)
            .build()
            .unwrap()
    }

    #[test]
    fn missing_roles_read_as_zero() {
        let lanes = vec![lane("a", LaneRole::Other)];
        let inputs = MetaInputs::from_lanes(&lanes, &BTreeMap::default());
        assert_eq!(inputs, MetaInputs::default());

        let lanes = vec![lane("calm", LaneRole::Restraint)];
        let inputs = MetaInputs::from_lanes(&lanes, &BTreeMap::default());
        assert_eq!(inputs, MetaInputs::default(), "no value sent yet");
    }

    #[test]
    fn first_lane_with_each_role_wins() {
        let lanes = vec![
            lane("calm", LaneRole::Restraint),
            lane("calmer", LaneRole::Restraint),
            lane("wild", LaneRole::Contrast),
        ];
        let last_values = BTreeMap::from([
            ("calm".to_string(), 127),
            ("calmer".to_string(), 0),
            ("wild".to_string(), 0),
        ]);
        let inputs = MetaInputs::from_lanes(&lanes, &last_values);
        assert!(approx_eq!(f64, inputs.restraint, 1.0));
        assert!(approx_eq!(f64, inputs.contrast, 0.0));
    }

    #[test]
    fn restraint_narrows_and_contrast_widens() {
        let scene = SceneParams::new_with(40, 80);

        let neutral = MetaInputs::default().modulate(&scene, LaneRole::Other);
        assert_eq!((neutral.min, neutral.max), (40, 80));

        let restrained = MetaInputs {
            restraint: 1.0,
            contrast: 0.0,
        }
        .modulate(&scene, LaneRole::Other);
        // Half-range 20 becomes 4.
        assert_eq!((restrained.min, restrained.max), (56, 64));

        let contrasted = MetaInputs {
            restraint: 0.0,
            contrast: 1.0,
        }
        .modulate(&scene, LaneRole::Other);
        // Half-range 20 becomes 36.
        assert_eq!((contrasted.min, contrasted.max), (24, 96));

        let both = MetaInputs {
            restraint: 1.0,
            contrast: 1.0,
        }
        .modulate(&scene, LaneRole::Other);
        // 20 * 0.2 * 1.8 = 7.2
        assert_eq!((both.min, both.max), (52, 67));
    }

    #[test]
    fn widening_clamps_to_midi_range() {
        let inputs = MetaInputs {
            restraint: 0.0,
            contrast: 1.0,
        };
        let wide = inputs.modulate(&SceneParams::new_with(0, 127), LaneRole::Other);
        assert_eq!((wide.min, wide.max), (0, 127));
    }

    #[test]
    fn narrow_scene_gets_a_minimum_half_range() {
        let pinned = MetaInputs::default().modulate(&SceneParams::new_with(64, 64), LaneRole::Other);
        assert_eq!((pinned.min, pinned.max), (63, 65));
    }

    #[test]
    fn meta_lanes_are_never_modulated() {
        let inputs = MetaInputs {
            restraint: 1.0,
            contrast: 1.0,
        };
        let scene = SceneParams::new_with(10, 20);
        assert_eq!(inputs.modulate(&scene, LaneRole::Restraint), scene);
        assert_eq!(inputs.modulate(&scene, LaneRole::Contrast), scene);
    }
}
