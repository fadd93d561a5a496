// Copyright (c) 2024 Mike Tsao

use log::info;

/// Holds automation output back for a number of clock ticks after the
/// transport starts, so that a drifting or settling clock source doesn't
/// produce a burst of values.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Arming {
    arm_ticks: u32,
    ticks_since_start: u32,
    armed: bool,
}
impl Default for Arming {
    fn default() -> Self {
        Self::new(0)
    }
}
impl Arming {
    /// With `arm_ticks == 0`, output is armed from the start.
    pub fn new(arm_ticks: u32) -> Self {
        Self {
            arm_ticks,
            ticks_since_start: 0,
            armed: arm_ticks == 0,
        }
    }

    /// Counts a clock pulse that the clock has already processed. Only
    /// pulses that arrive while the clock runs count toward arming.
    pub fn handle_clock(&mut self, clock_running: bool) {
        if clock_running && !self.armed {
            self.ticks_since_start += 1;
            if self.ticks_since_start >= self.arm_ticks {
                self.armed = true;
                info!("Armed after {} ticks", self.ticks_since_start);
            }
        }
    }

    /// Transport Start always begins a fresh grace period.
    pub fn handle_start(&mut self) {
        self.armed = self.arm_ticks == 0;
        self.ticks_since_start = 0;
    }

    /// Transport Continue rearms at once if there's no grace period.
    /// Otherwise it begins a fresh one.
    pub fn handle_continue(&mut self) {
        if self.arm_ticks == 0 {
            self.armed = true;
        } else {
            self.armed = false;
            self.ticks_since_start = 0;
        }
    }

    #[allow(missing_docs)]
    pub fn handle_stop(&mut self) {
        self.armed = false;
    }

    #[allow(missing_docs)]
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    #[allow(missing_docs)]
    pub fn arm_ticks(&self) -> u32 {
        self.arm_ticks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_grace_period() {
        let mut arming = Arming::new(0);
        assert!(arming.is_armed());
        arming.handle_stop();
        assert!(!arming.is_armed());
        arming.handle_continue();
        assert!(arming.is_armed());
        arming.handle_stop();
        arming.handle_start();
        assert!(arming.is_armed());
    }

    #[test]
    fn grace_period_counts_running_ticks() {
        let mut arming = Arming::new(3);
        assert!(!arming.is_armed());

        arming.handle_start();
        arming.handle_clock(false);
        arming.handle_clock(true);
        arming.handle_clock(true);
        assert!(!arming.is_armed());
        arming.handle_clock(true);
        assert!(arming.is_armed());

        arming.handle_stop();
        arming.handle_continue();
        assert!(!arming.is_armed(), "continue starts a fresh grace period");
        (0..3).for_each(|_| arming.handle_clock(true));
        assert!(arming.is_armed());
    }
}
