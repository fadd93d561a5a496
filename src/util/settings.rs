// Copyright (c) 2024 Mike Tsao

//! Structs that hold a performance's configuration: lanes, scenes, transport,
//! scene walk, and MIDI ports. Loaded from TOML or JSON.

use crate::{
    automation::{LaneRole, SceneParams},
    elements::{Curve, Shape},
    types::{Division, MidiChannel, DEFAULT_PPQ},
    Error,
};
use anyhow::Context;
use derivative::Derivative;
use serde::{Deserialize, Serialize};
use std::{
    cmp::Ordering,
    collections::{BTreeMap, HashSet},
    path::Path,
};

/// Scene name to the lanes it constrains, each by lane name.
pub type SceneDefinitions = BTreeMap<String, BTreeMap<String, SceneParams>>;

/// The whole configuration file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Automation lanes, in the order they were configured.
    #[serde(default)]
    pub lanes: Vec<LaneSettings>,
    /// Every scene, by name.
    #[serde(default)]
    pub scenes: SceneDefinitions,
    #[allow(missing_docs)]
    #[serde(default)]
    pub transport: TransportSettings,
    #[allow(missing_docs)]
    #[serde(default)]
    pub spiral: SpiralSettings,
    #[allow(missing_docs)]
    #[serde(default)]
    pub midi: MidiSettings,
}

/// One lane's configuration.
#[derive(Clone, Debug, Derivative, PartialEq, Serialize, Deserialize)]
#[derivative(Default)]
pub struct LaneSettings {
    /// Unique among lanes. Scenes refer to lanes by this name.
    pub name: String,
    /// Controller number, 0..=127.
    pub cc: u8,
    /// Zero-based MIDI channel, 0..=15.
    #[serde(default)]
    pub channel: u8,
    /// How often the lane produces a value, e.g. `"1/16"`.
    #[derivative(Default(value = "LaneSettings::default_division()"))]
    #[serde(default = "LaneSettings::default_division")]
    pub division: String,
    #[allow(missing_docs)]
    #[serde(default)]
    pub curve: Curve,
    /// 0..=1. One follows the curve exactly.
    #[derivative(Default(value = "LaneSettings::DEFAULT_SMOOTHING"))]
    #[serde(default = "LaneSettings::default_smoothing")]
    pub smoothing: f64,
    #[allow(missing_docs)]
    #[serde(default)]
    pub role: LaneRole,
    #[allow(missing_docs)]
    #[serde(default)]
    pub shape: Shape,
    /// Smallest change worth sending. Zero sends every change.
    #[serde(default)]
    pub deadband: u32,
    /// Largest change allowed per step, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slew_limit: Option<u32>,
}
#[allow(missing_docs)]
impl LaneSettings {
    pub const DEFAULT_DIVISION: &'static str = "1/16";
    pub const DEFAULT_SMOOTHING: f64 = 0.2;

    fn default_division() -> String {
        Self::DEFAULT_DIVISION.to_string()
    }

    fn default_smoothing() -> f64 {
        Self::DEFAULT_SMOOTHING
    }

    pub fn midi_channel(&self) -> MidiChannel {
        MidiChannel::new(self.channel)
    }
}

/// How the external clock maps onto musical structure.
#[derive(Clone, Debug, Derivative, PartialEq, Eq, Serialize, Deserialize)]
#[derivative(Default)]
pub struct TransportSettings {
    /// Bars per phrase. Scenes change only on phrase boundaries.
    #[derivative(Default(value = "8"))]
    #[serde(default = "TransportSettings::default_phrase_bars")]
    pub phrase_bars: u32,
    /// Clock pulses per quarter note.
    #[derivative(Default(value = "DEFAULT_PPQ"))]
    #[serde(default = "TransportSettings::default_ppq_division")]
    pub ppq_division: u32,
    /// Explicit scene order. Without one, scenes sort naturally by name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene_order: Option<Vec<String>>,
}
impl TransportSettings {
    fn default_phrase_bars() -> u32 {
        8
    }

    fn default_ppq_division() -> u32 {
        DEFAULT_PPQ
    }
}

/// Parameters for the scene walk.
#[derive(Clone, Debug, Derivative, PartialEq, Serialize, Deserialize)]
#[derivative(Default)]
pub struct SpiralSettings {
    #[allow(missing_docs)]
    #[derivative(Default(value = "5"))]
    #[serde(default = "SpiralSettings::default_k_step")]
    pub k_step: usize,
    #[allow(missing_docs)]
    #[derivative(Default(value = "2"))]
    #[serde(default = "SpiralSettings::default_memory_k")]
    pub memory_k: usize,
    #[allow(missing_docs)]
    #[derivative(Default(value = "0.08"))]
    #[serde(default = "SpiralSettings::default_p_jump")]
    pub p_jump: f64,
    /// Makes a performance reproducible. Lanes derive their own seeds from it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}
impl SpiralSettings {
    fn default_k_step() -> usize {
        5
    }

    fn default_memory_k() -> usize {
        2
    }

    fn default_p_jump() -> f64 {
        0.08
    }
}

/// Which ports to use, and how hard to drive them.
#[derive(Clone, Debug, Derivative, PartialEq, Eq, Serialize, Deserialize)]
#[derivative(Default)]
pub struct MidiSettings {
    /// Clock source. Matched exactly first, then as a substring.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_port_name: Option<String>,
    /// CC destination. Matched the same way.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out_port_name: Option<String>,
    /// Output rate limit. Messages beyond it are dropped.
    #[derivative(Default(value = "200"))]
    #[serde(default = "MidiSettings::default_max_messages_per_sec")]
    pub max_messages_per_sec: usize,
}
impl MidiSettings {
    fn default_max_messages_per_sec() -> usize {
        200
    }
}

impl Settings {
    /// Reads and validates a configuration file. Files ending in `.toml` are
    /// TOML; everything else is JSON.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let is_toml = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
        let settings: Self = if is_toml {
            toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?
        } else {
            serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Checks everything that would otherwise fail later, mid-performance.
    pub fn validate(&self) -> Result<(), Error> {
        let config = |message: String| Err(Error::Config(message));

        if self.lanes.is_empty() {
            return config("at least one lane is required".to_string());
        }
        if self.scenes.is_empty() {
            return Err(Error::EmptySceneList);
        }
        if self.transport.phrase_bars == 0 {
            return config("phrase_bars must be at least 1".to_string());
        }
        if self.transport.ppq_division == 0 {
            return config("ppq_division must be at least 1".to_string());
        }
        if !(0.0..=1.0).contains(&self.spiral.p_jump) {
            return config(format!("p_jump {} is outside 0..=1", self.spiral.p_jump));
        }

        let mut names = HashSet::new();
        for lane in &self.lanes {
            if !names.insert(lane.name.as_str()) {
                return config(format!("lane {:?} is defined twice", lane.name));
            }
            if lane.cc > 127 {
                return config(format!("lane {:?}: cc {} is above 127", lane.name, lane.cc));
            }
            if lane.channel > MidiChannel::MAX_VALUE {
                return config(format!(
                    "lane {:?}: channel {} is above {}",
                    lane.name,
                    lane.channel,
                    MidiChannel::MAX_VALUE
                ));
            }
            Division::parse(&lane.division, self.transport.ppq_division)?;
        }

        for (scene_name, lanes) in &self.scenes {
            for (lane_name, params) in lanes {
                if params.min > 127 || params.max > 127 {
                    return config(format!(
                        "scene {scene_name:?}, lane {lane_name:?}: range {}..={} exceeds 127",
                        params.min, params.max
                    ));
                }
            }
        }

        if let Some(order) = &self.transport.scene_order {
            if order.is_empty() {
                return Err(Error::EmptySceneList);
            }
            if let Some(missing) = order.iter().find(|name| !self.scenes.contains_key(*name)) {
                return config(format!("scene_order names unknown scene {missing:?}"));
            }
        }
        Ok(())
    }

    /// Scene names in walk order: the explicit order if there is one,
    /// otherwise a natural sort (`scene2` before `scene10`).
    pub fn scene_order(&self) -> Vec<String> {
        if let Some(order) = &self.transport.scene_order {
            if !order.is_empty() {
                return order.clone();
            }
        }
        let mut names: Vec<String> = self.scenes.keys().cloned().collect();
        names.sort_by(|a, b| natural_cmp(a, b));
        names
    }

    /// Looks up a lane's configuration by name.
    pub fn lane(&self, name: &str) -> Option<&LaneSettings> {
        self.lanes.iter().find(|lane| lane.name == name)
    }
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum NaturalChunk {
    Text(String),
    // (digit count, digits) with leading zeros removed, so that the derived
    // ordering is numeric.
    Number(usize, String),
}

fn natural_chunks(s: &str) -> Vec<NaturalChunk> {
    let mut chunks = Vec::default();
    let mut text = String::default();
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c.is_ascii_digit() {
            chunks.push(NaturalChunk::Text(std::mem::take(&mut text).to_lowercase()));
            let mut digits = String::from(c);
            while let Some(d) = chars.next_if(char::is_ascii_digit) {
                digits.push(d);
            }
            let digits = digits.trim_start_matches('0');
            chunks.push(NaturalChunk::Number(digits.len(), digits.to_string()));
        } else {
            text.push(c);
        }
    }
    chunks.push(NaturalChunk::Text(text.to_lowercase()));
    chunks
}

/// Compares strings the way people expect numbered names to sort: runs of
/// digits compare by value, and everything else compares case-insensitively.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    natural_chunks(a).cmp(&natural_chunks(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;

    const MINIMAL_TOML: &str = r#"
[[lanes]]
name = "cutoff"
cc = 74

[scenes.scene1.cutoff]
min = 10
max = 100
"#;

    #[test]
    fn defaults_fill_in() {
        let settings: Settings = toml::from_str(MINIMAL_TOML).unwrap();
        assert!(settings.validate().is_ok());

        let lane = &settings.lanes[0];
        assert_eq!(lane.channel, 0);
        assert_eq!(lane.division, "1/16");
        assert_eq!(lane.curve, Curve::Sine);
        assert!(approx_eq!(f64, lane.smoothing, 0.2));
        assert_eq!(lane.role, LaneRole::Other);
        assert_eq!(lane.shape, Shape::Linear);
        assert_eq!(lane.deadband, 0);
        assert_eq!(lane.slew_limit, None);
        assert_eq!(
            lane,
            &LaneSettings {
                name: "cutoff".to_string(),
                cc: 74,
                ..Default::default()
            }
        );

        assert_eq!(settings.transport, TransportSettings::default());
        assert_eq!(settings.transport.phrase_bars, 8);
        assert_eq!(settings.transport.ppq_division, 24);
        assert_eq!(settings.spiral, SpiralSettings::default());
        assert_eq!(settings.spiral.k_step, 5);
        assert_eq!(settings.midi.max_messages_per_sec, 200);

        let scene = &settings.scenes["scene1"]["cutoff"];
        assert_eq!((scene.min, scene.max), (10, 100));
        assert_eq!(scene.curve_params, None);
    }

    #[test]
    fn json_parses_the_same() {
        let json = r#"{
            "lanes": [{"name": "cutoff", "cc": 74, "curve": "ramp", "role": "restraint"}],
            "scenes": {"scene1": {"cutoff": {"min": 10, "max": 100, "curve_params": {"cycle_steps": 8}}}},
            "spiral": {"seed": 7}
        }"#;
        let settings: Settings = serde_json::from_str(json).unwrap();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.lanes[0].curve, Curve::Ramp);
        assert_eq!(settings.lanes[0].role, LaneRole::Restraint);
        assert_eq!(settings.spiral.seed, Some(7));
        assert_eq!(settings.spiral.memory_k, 2);
        let params = settings.scenes["scene1"]["cutoff"].curve_params.unwrap();
        assert_eq!(params.cycle_steps(), 8);
    }

    #[test]
    fn validation_catches_mistakes() {
        let good: Settings = toml::from_str(MINIMAL_TOML).unwrap();

        let mut s = good.clone();
        s.lanes.clear();
        assert!(matches!(s.validate(), Err(Error::Config(_))));

        let mut s = good.clone();
        s.scenes.clear();
        assert_eq!(s.validate(), Err(Error::EmptySceneList));

        let mut s = good.clone();
        s.lanes.push(s.lanes[0].clone());
        assert!(matches!(s.validate(), Err(Error::Config(_))));

        let mut s = good.clone();
        s.lanes[0].cc = 128;
        assert!(matches!(s.validate(), Err(Error::Config(_))));

        let mut s = good.clone();
        s.lanes[0].channel = 16;
        assert!(matches!(s.validate(), Err(Error::Config(_))));

        let mut s = good.clone();
        s.lanes[0].division = "1/7".to_string();
        assert_eq!(s.validate(), Err(Error::InvalidDivision("1/7".to_string())));

        let mut s = good.clone();
        s.spiral.p_jump = 1.5;
        assert!(matches!(s.validate(), Err(Error::Config(_))));

        let mut s = good.clone();
        s.transport.phrase_bars = 0;
        assert!(matches!(s.validate(), Err(Error::Config(_))));

        let mut s = good.clone();
        s.transport.scene_order = Some(vec!["nope".to_string()]);
        assert!(matches!(s.validate(), Err(Error::Config(_))));

        let mut s = good;
        s.scenes
            .get_mut("scene1")
            .unwrap()
            .get_mut("cutoff")
            .unwrap()
            .max = 200;
        assert!(matches!(s.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn scene_order_is_natural_unless_explicit() {
        let mut settings: Settings = toml::from_str(MINIMAL_TOML).unwrap();
        for name in ["scene10", "scene2", "Scene3", "intro"] {
            settings.scenes.insert(name.to_string(), BTreeMap::default());
        }
        assert_eq!(
            settings.scene_order(),
            vec!["intro", "scene1", "scene2", "Scene3", "scene10"]
        );

        settings.transport.scene_order = Some(vec!["scene10".to_string(), "intro".to_string()]);
        assert_eq!(settings.scene_order(), vec!["scene10", "intro"]);
    }

    #[test]
    fn natural_comparison() {
        assert_eq!(natural_cmp("a2", "a10"), Ordering::Less);
        assert_eq!(natural_cmp("a007", "a7"), Ordering::Equal);
        assert_eq!(natural_cmp("B1", "a2"), Ordering::Greater);
        assert_eq!(natural_cmp("10", "9"), Ordering::Greater);
        assert_eq!(natural_cmp("x", "x1"), Ordering::Less);
    }

    #[test]
    fn load_from_disk() {
        let dir = std::env::temp_dir().join(format!(
            "spiralwalk-settings-{}-{}",
            std::process::id(),
            line!()
        ));
        std::fs::create_dir_all(&dir).unwrap();

        let toml_path = dir.join("perf.toml");
        std::fs::write(&toml_path, MINIMAL_TOML).unwrap();
        let settings = Settings::load(&toml_path).unwrap();
        assert_eq!(settings.lanes.len(), 1);

        let json_path = dir.join("perf.json");
        std::fs::write(&json_path, serde_json::to_string(&settings).unwrap()).unwrap();
        assert_eq!(Settings::load(&json_path).unwrap(), settings);

        let bad_path = dir.join("bad.json");
        std::fs::write(&bad_path, r#"{"lanes": [], "scenes": {}}"#).unwrap();
        assert!(Settings::load(&bad_path).is_err());

        assert!(Settings::load(&dir.join("missing.toml")).is_err());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
