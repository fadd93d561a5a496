// Copyright (c) 2024 Mike Tsao

//! The `run` family of commands: live automation, replay, and calibration.
//! Also `derive-scenes`.

use crate::RunArgs;
use anyhow::Context;
use log::info;
use spiralwalk::{
    automation::{run_until_stopped, EngineOptionsBuilder, ReplayFrame},
    prelude::*,
    types::{ControlChange, MidiChannel},
    util::{derive_scenes_from_log, read_session_log, render_scenes_toml, Settings},
};
use spiralwalk_services::{
    MidiCcOutput, MidiClockInput, PortChoice, ProvidesService, DEFAULT_VIRTUAL_INPUT_NAME,
    DEFAULT_VIRTUAL_OUTPUT_NAME,
};
use std::{
    path::Path,
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

fn input_choice(settings: &Settings, args: &RunArgs) -> PortChoice {
    PortChoice::new_with(
        args.virtual_in_name
            .as_deref()
            .or(settings.midi.in_port_name.as_deref()),
        args.use_virtual,
        DEFAULT_VIRTUAL_INPUT_NAME,
    )
}

fn open_output(settings: &Settings, args: &RunArgs) -> anyhow::Result<MidiCcOutput> {
    let choice = PortChoice::new_with(
        args.virtual_out_name
            .as_deref()
            .or(settings.midi.out_port_name.as_deref()),
        args.use_virtual,
        DEFAULT_VIRTUAL_OUTPUT_NAME,
    );
    MidiCcOutput::open(&choice, settings.midi.max_messages_per_sec, args.dry_run)
}

/// Sleeps for `duration` unless a stop is requested first. Returns false if
/// it was.
fn sleep_unless_stopped(duration: Duration, stop: &AtomicBool) -> bool {
    let deadline = std::time::Instant::now() + duration;
    loop {
        if stop.load(Ordering::Relaxed) {
            return false;
        }
        let now = std::time::Instant::now();
        if now >= deadline {
            return true;
        }
        std::thread::sleep((deadline - now).min(Duration::from_millis(10)));
    }
}

/// Follows the clock and performs until Ctrl-C or the clock port goes away.
pub(crate) fn run_engine(
    settings: &Settings,
    args: &RunArgs,
    stop: &AtomicBool,
) -> anyhow::Result<()> {
    let mut options = EngineOptionsBuilder::default();
    options
        .freeze_scene(args.freeze_scene)
        .arm_ticks(args.arm_ticks)
        .soft_start(args.soft_start);
    for lane in &args.freeze_lanes {
        options.frozen_lane(lane.as_str());
    }
    if let Some(path) = args.session_log.as_ref() {
        options.session_log_path(path.clone());
    }
    let options = options.build()?;

    let input = MidiClockInput::open(&input_choice(settings, args))?;
    let output = open_output(settings, args)?;
    let mut engine = AutomationEngine::new_with(settings, options, output)?;
    info!(
        "spiralwalk {} ready: {} lanes, scenes {:?}",
        spiralwalk::app_version(),
        engine.lanes().len(),
        engine.scene_names().collect::<Vec<_>>()
    );
    let result = run_until_stopped(&mut engine, input.receiver(), stop);
    info!(
        "Sent {} CCs, dropped {}",
        engine.output().sent(),
        engine.output().dropped()
    );
    result
}

fn read_frames(path: &Path) -> anyhow::Result<Vec<ReplayFrame>> {
    Ok(read_session_log(path)
        .with_context(|| format!("reading session log {}", path.display()))?
        .into_iter()
        .map(|entry| entry.lanes)
        .collect())
}

/// Plays a session log back bar by bar against the incoming clock.
pub(crate) fn replay_tempo_locked(
    settings: &Settings,
    args: &RunArgs,
    path: &Path,
    stop: &AtomicBool,
) -> anyhow::Result<()> {
    let frames = read_frames(path)?;
    info!("Loaded {} frames from {}", frames.len(), path.display());
    let input = MidiClockInput::open(&input_choice(settings, args))?;
    let output = open_output(settings, args)?;
    let mut replay = TempoReplay::new_with(settings, frames, args.arm_ticks, output)?;
    run_until_stopped(&mut replay, input.receiver(), stop)
}

/// Plays a session log back once, one frame every `replay_interval` seconds.
pub(crate) fn replay_at_interval(
    settings: &Settings,
    args: &RunArgs,
    path: &Path,
    stop: &AtomicBool,
) -> anyhow::Result<()> {
    let frames = read_frames(path)?;
    let mut output = open_output(settings, args)?;
    let interval = Duration::from_secs_f64(args.replay_interval.max(0.0));
    println!(
        "Replaying log from {} every {} sec (Ctrl+C to stop)",
        path.display(),
        args.replay_interval
    );
    for frame in &frames {
        for (lane_name, value) in frame {
            if let Some(lane) = settings.lane(lane_name) {
                output.send_control_change(ControlChange::new(
                    lane.midi_channel(),
                    lane.cc,
                    *value,
                ));
            }
        }
        if !sleep_unless_stopped(interval, stop) {
            println!("Replay stopped.");
            break;
        }
    }
    output.close();
    Ok(())
}

/// The CC and channel to calibrate: the lane with the requested CC, or the
/// first lane if none was requested. An unconfigured CC borrows the first
/// lane's channel.
pub(crate) fn calibration_target(settings: &Settings, cc: Option<u8>) -> (u8, MidiChannel) {
    let first = settings
        .lanes
        .first()
        .map_or((0, MidiChannel::new(0)), |lane| {
            (lane.cc, lane.midi_channel())
        });
    match cc {
        None => first,
        Some(cc) => settings
            .lanes
            .iter()
            .find(|lane| lane.cc == cc)
            .map_or((cc, first.1), |lane| (lane.cc, lane.midi_channel())),
    }
}

/// 0 up to 127 and back down to 0, without repeating the peak.
pub(crate) fn calibration_sweep() -> impl Iterator<Item = u8> {
    (0..=127u8).chain((0..=126u8).rev())
}

/// Sweeps one CC up and down (or holds it steady) so a destination can
/// learn the mapping.
pub(crate) fn calibrate(
    settings: &Settings,
    args: &RunArgs,
    stop: &AtomicBool,
) -> anyhow::Result<()> {
    const SWEEP_STEP: Duration = Duration::from_millis(20);
    const HOLD_STEP: Duration = Duration::from_millis(250);

    let (cc, mut channel) = calibration_target(settings, args.calibrate_cc);
    if let Some(channel_override) = args.calibrate_channel {
        channel = MidiChannel::new(channel_override.min(MidiChannel::MAX_VALUE));
    }
    let mut output = open_output(settings, args)?;
    println!(
        "Calibration mode on CC {cc} channel {} (Ctrl+C to exit)",
        channel.display_number()
    );

    'outer: loop {
        if let Some(hold) = args.hold {
            let value = hold.clamp(0, 127) as u8;
            output.send_control_change(ControlChange::new(channel, cc, value));
            if !sleep_unless_stopped(HOLD_STEP, stop) {
                break;
            }
        } else {
            for value in calibration_sweep() {
                output.send_control_change(ControlChange::new(channel, cc, value));
                if !sleep_unless_stopped(SWEEP_STEP, stop) {
                    break 'outer;
                }
            }
        }
    }
    println!("Calibration stopped.");
    output.close();
    Ok(())
}

/// Proposes scene ranges from a session log, printing them or writing them
/// to `output`.
pub(crate) fn derive_scenes(
    log: &Path,
    scene_count: usize,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let entries = read_session_log(log)
        .with_context(|| format!("reading session log {}", log.display()))?;
    let text = render_scenes_toml(&derive_scenes_from_log(&entries, scene_count))?;
    if let Some(output) = output {
        std::fs::write(output, text)
            .with_context(|| format!("writing {}", output.display()))?;
        println!("Wrote scenes to {}", output.display());
    } else {
        print!("{text}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use spiralwalk::util::LaneSettings;

    fn settings() -> Settings {
        Settings {
            lanes: vec![
                LaneSettings {
                    name: "filter".to_string(),
                    cc: 74,
                    channel: 2,
                    ..Default::default()
                },
                LaneSettings {
                    name: "res".to_string(),
                    cc: 71,
                    channel: 5,
                    ..Default::default()
                },
            ],
            ..Default::default()
        }
    }

    #[test]
    fn calibration_picks_lane() {
        let settings = settings();
        assert_eq!(calibration_target(&settings, None), (74, MidiChannel::new(2)));
        assert_eq!(
            calibration_target(&settings, Some(71)),
            (71, MidiChannel::new(5))
        );
        assert_eq!(
            calibration_target(&settings, Some(1)),
            (1, MidiChannel::new(2))
        );
    }

    #[test]
    fn calibration_sweep_shape() {
        let sweep: Vec<u8> = calibration_sweep().collect();
        assert_eq!(sweep.len(), 255);
        assert_eq!(sweep[0], 0);
        assert_eq!(sweep[127], 127);
        assert_eq!(sweep[128], 126);
        assert_eq!(sweep.last(), Some(&0));
    }

    #[test]
    fn sleep_returns_early_when_stopped() {
        let stop = AtomicBool::new(true);
        assert!(!sleep_unless_stopped(Duration::from_secs(60), &stop));
        let stop = AtomicBool::new(false);
        assert!(sleep_unless_stopped(Duration::from_millis(1), &stop));
    }

    #[test]
    fn port_choice_follows_overrides() {
        let mut settings = settings();
        settings.midi.in_port_name = Some("Clock".to_string());
        let args = RunArgs::default();
        assert_eq!(
            input_choice(&settings, &args),
            PortChoice::Existing("Clock".to_string())
        );

        let args = RunArgs {
            use_virtual: true,
            ..Default::default()
        };
        assert_eq!(
            input_choice(&settings, &args),
            PortChoice::Virtual("Clock".to_string())
        );

        settings.midi.in_port_name = None;
        assert_eq!(
            input_choice(&settings, &args),
            PortChoice::Virtual(DEFAULT_VIRTUAL_INPUT_NAME.to_string())
        );
    }
}
