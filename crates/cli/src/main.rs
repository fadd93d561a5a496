// Copyright (c) 2024 Mike Tsao

//! `spiralwalk` follows an external MIDI clock and sends scene-walking
//! Control Change automation. It also has tools for replaying and mining
//! recorded sessions, and for checking that MIDI is wired up correctly.

use clap::{Parser, Subcommand};
use spiralwalk::{app_version, util::Settings};
use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

mod diagnostics;
mod perform;

/// The program's command-line arguments.
#[derive(Parser, Debug)]
#[clap(author, version = app_version(), about, long_about = None)]
struct Args {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List MIDI input/output ports
    ListPorts,

    /// Run the automation engine
    Run(RunArgs),

    /// Generate scene ranges from a session log
    DeriveScenes {
        /// Path to the session log (one JSON object per line)
        #[clap(long)]
        log: PathBuf,

        /// Number of scenes to propose
        #[clap(long, default_value_t = 8)]
        scenes: usize,

        /// Write the derived TOML snippet to this file instead of printing it
        #[clap(long)]
        output: Option<PathBuf>,
    },

    /// Listen for MIDI clock and transport, printing approximate BPM
    ListenClock {
        /// Path to TOML/JSON config file
        #[clap(long)]
        config: PathBuf,

        /// Seconds to listen before exiting
        #[clap(long, default_value_t = 10.0)]
        timeout: f64,
    },

    /// Send test CC messages to validate mapping
    SendTest {
        /// Path to TOML/JSON config file
        #[clap(long)]
        config: PathBuf,

        /// Test signal
        #[clap(long, value_enum, default_value_t = diagnostics::TestMode::Sweep)]
        mode: diagnostics::TestMode,

        /// Value for hold mode
        #[clap(long, default_value_t = 64)]
        hold: i32,

        /// CC range to test (inclusive)
        #[clap(long, num_args = 2, value_names = ["MIN", "MAX"], default_values_t = [20, 29])]
        cc_range: Vec<u8>,

        /// How long to run the test
        #[clap(long, default_value_t = 10.0)]
        seconds: f64,
    },

    /// Basic health check: listen for clock, then send test CCs
    Doctor {
        /// Path to TOML/JSON config file
        #[clap(long)]
        config: PathBuf,

        /// Seconds to listen for clock
        #[clap(long, default_value_t = 5.0)]
        clock_seconds: f64,

        /// Seconds to send test CCs
        #[clap(long, default_value_t = 10.0)]
        send_seconds: f64,

        /// Test signal
        #[clap(long, value_enum, default_value_t = diagnostics::TestMode::Sweep)]
        mode: diagnostics::TestMode,
    },
}

/// Arguments for `run`, which also covers replay and calibration.
#[derive(clap::Args, Debug, Default)]
pub(crate) struct RunArgs {
    /// Path to TOML/JSON config file
    #[clap(long)]
    pub(crate) config: PathBuf,

    /// Log CC events instead of sending MIDI
    #[clap(long)]
    pub(crate) dry_run: bool,

    /// Clock ticks to wait after Start before sending any CC
    #[clap(long, default_value_t = 0)]
    pub(crate) arm_ticks: u32,

    /// Stay on the first scene
    #[clap(long)]
    pub(crate) freeze_scene: bool,

    /// Lane to freeze (can repeat)
    #[clap(long = "freeze-lane")]
    pub(crate) freeze_lanes: Vec<String>,

    /// Append a JSON-lines session log to this path
    #[clap(long)]
    pub(crate) session_log: Option<PathBuf>,

    /// Replay a session log instead of running live
    #[clap(long)]
    pub(crate) replay: Option<PathBuf>,

    /// Seconds between log frames during replay
    #[clap(long, default_value_t = 0.5)]
    pub(crate) replay_interval: f64,

    /// Replay the log in time with the incoming clock
    #[clap(long)]
    pub(crate) replay_live: bool,

    /// Sweep a CC 0 to 127 and back, repeatedly
    #[clap(long)]
    pub(crate) calibrate: bool,

    /// CC number to calibrate
    #[clap(long)]
    pub(crate) calibrate_cc: Option<u8>,

    /// MIDI channel to calibrate (0-15)
    #[clap(long)]
    pub(crate) calibrate_channel: Option<u8>,

    /// Hold a constant CC value (0-127) for mapping
    #[clap(long)]
    pub(crate) hold: Option<i32>,

    /// Create virtual MIDI ports instead of connecting to existing ones
    #[clap(long = "virtual")]
    pub(crate) use_virtual: bool,

    /// Name for the virtual (or overriding) MIDI input port
    #[clap(long)]
    pub(crate) virtual_in_name: Option<String>,

    /// Name for the virtual (or overriding) MIDI output port
    #[clap(long)]
    pub(crate) virtual_out_name: Option<String>,

    /// Keep lane state and musical position on Start
    #[clap(long)]
    pub(crate) soft_start: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        ctrlc::set_handler(move || stop.store(true, Ordering::SeqCst))?;
    }

    match args.command {
        Command::ListPorts => diagnostics::list_ports(),
        Command::Run(run_args) => {
            let settings = Settings::load(&run_args.config)?;
            if let Some(path) = run_args.replay.as_ref() {
                if run_args.replay_live {
                    perform::replay_tempo_locked(&settings, &run_args, path, &stop)
                } else {
                    perform::replay_at_interval(&settings, &run_args, path, &stop)
                }
            } else if run_args.calibrate || run_args.hold.is_some() {
                perform::calibrate(&settings, &run_args, &stop)
            } else {
                perform::run_engine(&settings, &run_args, &stop)
            }
        }
        Command::DeriveScenes {
            log,
            scenes,
            output,
        } => perform::derive_scenes(&log, scenes, output.as_deref()),
        Command::ListenClock { config, timeout } => {
            let settings = Settings::load(&config)?;
            diagnostics::listen_clock(&settings, timeout, &stop).map(|_| ())
        }
        Command::SendTest {
            config,
            mode,
            hold,
            cc_range,
            seconds,
        } => {
            let settings = Settings::load(&config)?;
            let test = diagnostics::SendTest::new_with(mode, hold, &cc_range, seconds);
            diagnostics::send_test(&settings, &test, &stop)
        }
        Command::Doctor {
            config,
            clock_seconds,
            send_seconds,
            mode,
        } => {
            let settings = Settings::load(&config)?;
            println!("Doctor: listening for clock...");
            diagnostics::listen_clock(&settings, clock_seconds, &stop)?;
            println!("Doctor: sending test CCs...");
            let test = diagnostics::SendTest::new_with(
                mode,
                diagnostics::SendTest::DEFAULT_HOLD,
                &diagnostics::SendTest::DEFAULT_CC_RANGE,
                send_seconds,
            );
            diagnostics::send_test(&settings, &test, &stop)
        }
    }
}
