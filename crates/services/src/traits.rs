// Copyright (c) 2024 Mike Tsao

//! Traits used by services.

use crossbeam_channel::Receiver;

/// Service methods.
///
/// A service is something that runs on its own, usually on a thread owned by
/// a driver, and reports what happens to its client through a crossbeam
/// channel of Events.
pub trait ProvidesService<E: core::fmt::Debug> {
    /// The receiver side of the Event channel. Integrate this into a listener
    /// loop to respond to events. Clone it freely.
    fn receiver(&self) -> &Receiver<E>;
}
