// Copyright (c) 2024 Mike Tsao

//! Derives scene ranges from a recorded session: split the bars into
//! contiguous segments, one per scene, and take each lane's 10th and 90th
//! percentile within a segment as that scene's range.

use super::session_log::SessionLogEntry;
use serde::Serialize;
use std::collections::BTreeMap;

/// The range a derived scene gives one lane.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct DerivedRange {
    #[allow(missing_docs)]
    pub min: u8,
    #[allow(missing_docs)]
    pub max: u8,
}

/// Lane name to range.
pub type DerivedScene = BTreeMap<String, DerivedRange>;

/// Linearly interpolated quantile of unsorted `values`. Zero if empty.
pub fn quantile(values: &[u8], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let k = (sorted.len() - 1) as f64 * q;
    let floor = k.trunc() as usize;
    let ceiling = (floor + 1).min(sorted.len() - 1);
    if floor == ceiling {
        return sorted[floor] as f64;
    }
    let (low, high) = (sorted[floor] as f64, sorted[ceiling] as f64);
    low + (high - low) * (k - floor as f64)
}

/// Splits `bars` into `scene_count` segments and derives a scene from each.
/// Segments are `bars.len() / scene_count` long (at least one), and the last
/// one takes whatever remains. Segments that start past the end are empty.
pub fn derive_scenes(bars: &[BTreeMap<String, u8>], scene_count: usize) -> Vec<DerivedScene> {
    if bars.is_empty() || scene_count == 0 {
        return Vec::default();
    }
    let segment_size = (bars.len() / scene_count).max(1);
    (0..scene_count)
        .map(|i| {
            let start = (i * segment_size).min(bars.len());
            let end = if i + 1 < scene_count {
                ((i + 1) * segment_size).min(bars.len())
            } else {
                bars.len()
            };

            let mut lane_values: BTreeMap<&str, Vec<u8>> = BTreeMap::default();
            for bar in &bars[start..end.max(start)] {
                for (lane, value) in bar {
                    lane_values.entry(lane).or_default().push(*value);
                }
            }
            lane_values
                .into_iter()
                .map(|(lane, values)| {
                    (
                        lane.to_string(),
                        DerivedRange {
                            min: quantile(&values, 0.1).trunc() as u8,
                            max: quantile(&values, 0.9).trunc() as u8,
                        },
                    )
                })
                .collect()
        })
        .collect()
}

/// Derives scenes from session log entries.
pub fn derive_scenes_from_log(entries: &[SessionLogEntry], scene_count: usize) -> Vec<DerivedScene> {
    let bars: Vec<BTreeMap<String, u8>> = entries.iter().map(|e| e.lanes.clone()).collect();
    derive_scenes(&bars, scene_count)
}

/// Renders derived scenes as a TOML `scenes` table, named `scene1`,
/// `scene2`, and so on, ready to paste into a configuration file.
pub fn render_scenes_toml(scenes: &[DerivedScene]) -> anyhow::Result<String> {
    #[derive(Serialize)]
    struct SceneTable<'a> {
        scenes: BTreeMap<String, &'a DerivedScene>,
    }

    let table = SceneTable {
        scenes: scenes
            .iter()
            .enumerate()
            .map(|(index, scene)| (format!("scene{}", index + 1), scene))
            .collect(),
    };
    Ok(toml::to_string(&table)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;

    fn bar(values: &[(&str, u8)]) -> BTreeMap<String, u8> {
        values.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn quantiles_interpolate() {
        assert!(approx_eq!(f64, quantile(&[], 0.5), 0.0));
        assert!(approx_eq!(f64, quantile(&[42], 0.9), 42.0));
        let values: Vec<u8> = (0..=10).map(|v| v * 10).rev().collect();
        assert!(approx_eq!(f64, quantile(&values, 0.1), 10.0, epsilon = 1e-9));
        assert!(approx_eq!(f64, quantile(&values, 0.9), 90.0, epsilon = 1e-9));
        assert!(approx_eq!(f64, quantile(&[0, 10], 0.25), 2.5));
    }

    #[test]
    fn segments_and_remainder() {
        // Five bars into two scenes: sizes 2 and 3.
        let bars: Vec<_> = [0, 10, 100, 110, 120]
            .iter()
            .map(|v| bar(&[("cutoff", *v)]))
            .collect();
        let scenes = derive_scenes(&bars, 2);
        assert_eq!(scenes.len(), 2);
        // 0 + 10 * 0.1 = 1; 0 + 10 * 0.9 = 9
        assert_eq!(scenes[0]["cutoff"], DerivedRange { min: 1, max: 9 });
        // 100 + 20 * 0.1 = 102; 100 + 20 * 0.9 = 118
        assert_eq!(scenes[1]["cutoff"], DerivedRange { min: 102, max: 118 });
    }

    #[test]
    fn more_scenes_than_bars() {
        let bars = vec![bar(&[("a", 5)]), bar(&[("a", 6)])];
        let scenes = derive_scenes(&bars, 4);
        assert_eq!(scenes.len(), 4);
        assert_eq!(scenes[0]["a"], DerivedRange { min: 5, max: 5 });
        assert_eq!(scenes[1]["a"], DerivedRange { min: 6, max: 6 });
        assert!(scenes[2].is_empty());
        assert!(scenes[3].is_empty());
        assert!(derive_scenes(&[], 4).is_empty());
    }

    #[test]
    fn rendered_toml_loads_as_settings() {
        let bars = vec![
            bar(&[("b", 5), ("filter cutoff", 6)]),
            bar(&[("a.b", 1), ("say \"hi\"", 2)]),
        ];
        let rendered = render_scenes_toml(&derive_scenes(&bars, 2)).unwrap();
        let settings: crate::util::Settings = toml::from_str(&rendered).unwrap();
        assert_eq!(settings.scenes.len(), 2);

        let first = &settings.scenes["scene1"];
        assert_eq!((first["filter cutoff"].min, first["filter cutoff"].max), (6, 6));
        assert_eq!((first["b"].min, first["b"].max), (5, 5));
        let second = &settings.scenes["scene2"];
        assert_eq!((second["a.b"].min, second["a.b"].max), (1, 1));
        assert_eq!((second["say \"hi\""].min, second["say \"hi\""].max), (2, 2));
    }
}
