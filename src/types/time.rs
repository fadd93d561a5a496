// Copyright (c) 2024 Mike Tsao

//! Musical time as an external MIDI clock sees it: a count of clock pulses,
//! grouped into quarters and bars.

use crate::Error;
use core::fmt::{self, Display};
use serde::{Deserialize, Serialize};

/// MIDI clock pulses per quarter note, per the MIDI specification.
pub const DEFAULT_PPQ: u32 = 24;

/// Where the clock stands when a subdivision fires.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ClockPosition {
    /// Completed bars since the last hard start.
    pub bar: u64,
    /// Completed quarters since the last hard start.
    pub quarter: u64,
    /// Clock pulses since the last hard start, including the current one.
    pub tick: u64,
}

/// A musical subdivision of a whole note, written `1/N`, together with the
/// number of clock ticks between events at that subdivision.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct Division {
    denominator: u32,
    ticks: u32,
}
impl Display for Division {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "1/{}", self.denominator)
    }
}
impl Division {
    /// Parses `1/N` against the given clock resolution. N must evenly divide
    /// the number of ticks in a whole note (`ppq * 4`).
    pub fn parse(division: &str, ppq: u32) -> Result<Self, Error> {
        let invalid = || Error::InvalidDivision(division.to_string());
        let denominator = division
            .trim()
            .strip_prefix("1/")
            .ok_or_else(invalid)?
            .trim()
            .parse::<u32>()
            .map_err(|_| invalid())?;
        let whole_note = ppq.checked_mul(4).ok_or_else(invalid)?;
        if denominator == 0 || whole_note % denominator != 0 {
            return Err(invalid());
        }
        let ticks = whole_note / denominator;
        if ticks == 0 {
            return Err(invalid());
        }
        Ok(Self { denominator, ticks })
    }

    #[allow(missing_docs)]
    pub fn denominator(&self) -> u32 {
        self.denominator
    }

    /// Clock ticks between consecutive events at this division.
    pub fn ticks(&self) -> u32 {
        self.ticks
    }
}

/// Converts a musical division such as `"1/16"` to a tick interval.
pub fn parse_division(division: &str, ppq: u32) -> Result<u32, Error> {
    Division::parse(division, ppq).map(|d| d.ticks())
}
