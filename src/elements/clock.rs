// Copyright (c) 2024 Mike Tsao

use crate::{
    types::{ClockPosition, Division, TransportEvent, DEFAULT_PPQ},
    Error,
};
use log::{debug, info};
use std::str::FromStr;

/// Passes subdivision events to the caller. Used in
/// [ClockFollower::handle_clock_tick()].
pub type DivisionEventsFn<'a, K> = dyn FnMut(&K, ClockPosition) + 'a;

/// [ClockFollower] turns an external MIDI clock into musical position, and
/// reports each time a registered subdivision elapses.
///
/// Subscribers register a key of type `K` for a division. Every time the
/// division's tick interval elapses, [ClockFollower::handle_clock_tick()]
/// invokes its events callback once per registered key, in registration order.
#[derive(Debug)]
pub struct ClockFollower<K> {
    ppq: u32,
    bar_quarters: u32,

    // Intervals in first-registration order, each with its subscribers in
    // registration order.
    subscriptions: Vec<(u32, Vec<K>)>,

    running: bool,
    tick_count: u64,
    quarter: u64,
    bar: u64,
}
impl<K> Default for ClockFollower<K> {
    fn default() -> Self {
        Self::new_with(DEFAULT_PPQ, 4)
    }
}
impl<K> ClockFollower<K> {
    /// Creates a stopped clock at position zero. `bar_quarters` is the time
    /// signature's numerator.
    pub fn new_with(ppq: u32, bar_quarters: u32) -> Self {
        Self {
            ppq: ppq.max(1),
            bar_quarters: bar_quarters.max(1),
            subscriptions: Default::default(),
            running: false,
            tick_count: 0,
            quarter: 0,
            bar: 0,
        }
    }

    /// Subscribes `key` to `division`, a string like `"1/16"`.
    pub fn register_callback(&mut self, division: &str, key: K) -> Result<Division, Error> {
        let division = Division::parse(division, self.ppq)?;
        let ticks = division.ticks();
        if let Some((_, keys)) = self.subscriptions.iter_mut().find(|(t, _)| *t == ticks) {
            keys.push(key);
        } else {
            self.subscriptions.push((ticks, vec![key]));
        }
        Ok(division)
    }

    /// Zeroes the musical position. Doesn't change whether the clock is
    /// running.
    pub fn reset(&mut self) {
        self.tick_count = 0;
        self.quarter = 0;
        self.bar = 0;
        debug!("Clock reset");
    }

    /// Starts following the clock. A hard start (`soft == false`) rewinds to
    /// position zero; a soft start resumes where the clock left off.
    pub fn start(&mut self, soft: bool) {
        if !soft {
            self.reset();
        }
        self.running = true;
        info!("Clock started");
    }

    /// Stops following the clock. Ticks are ignored until the next start.
    pub fn stop(&mut self) {
        self.running = false;
        info!("Clock stopped");
    }

    /// Advances one clock pulse. Subscribers see the bar and quarter as they
    /// stood before this pulse's boundary updates.
    pub fn handle_clock_tick(&mut self, events_fn: &mut DivisionEventsFn<K>) {
        if !self.running {
            return;
        }
        self.tick_count += 1;

        let position = self.position();
        for (ticks, keys) in self.subscriptions.iter() {
            if self.tick_count % *ticks as u64 == 0 {
                keys.iter().for_each(|key| events_fn(key, position));
            }
        }

        if self.tick_count % self.ppq as u64 == 0 {
            self.quarter += 1;
            if self.quarter % self.bar_quarters as u64 == 0 {
                self.bar += 1;
                debug!("Bar advanced to {}", self.bar);
            }
        }
    }

    /// Dispatches `"start"`, `"stop"`, or `"clock"`. Anything else, including
    /// `"continue"`, is an error; callers that support Continue call
    /// [ClockFollower::start()] with `soft == true` themselves.
    pub fn handle_message(
        &mut self,
        message_type: &str,
        events_fn: &mut DivisionEventsFn<K>,
    ) -> Result<(), Error> {
        match TransportEvent::from_str(message_type) {
            Ok(TransportEvent::Start) => self.start(false),
            Ok(TransportEvent::Stop) => self.stop(),
            Ok(TransportEvent::Clock) => self.handle_clock_tick(events_fn),
            Ok(TransportEvent::Continue) | Err(_) => {
                return Err(Error::UnknownMessage(message_type.to_string()))
            }
        }
        Ok(())
    }

    #[allow(missing_docs)]
    pub fn ppq(&self) -> u32 {
        self.ppq
    }

    #[allow(missing_docs)]
    pub fn bar_quarters(&self) -> u32 {
        self.bar_quarters
    }

    /// Clock ticks in one bar.
    pub fn ticks_per_bar(&self) -> u64 {
        self.ppq as u64 * self.bar_quarters as u64
    }

    #[allow(missing_docs)]
    pub fn is_running(&self) -> bool {
        self.running
    }

    #[allow(missing_docs)]
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    #[allow(missing_docs)]
    pub fn quarter(&self) -> u64 {
        self.quarter
    }

    #[allow(missing_docs)]
    pub fn bar(&self) -> u64 {
        self.bar
    }

    /// The current musical position.
    pub fn position(&self) -> ClockPosition {
        ClockPosition {
            bar: self.bar,
            quarter: self.quarter,
            tick: self.tick_count,
        }
    }
}
