// Copyright (c) 2024 Mike Tsao

//! The traits at the seams between the automation core and MIDI transport.

use crate::types::{ControlChange, TransportEvent};

/// Quick import of all important traits.
pub mod prelude {
    pub use super::{HandlesTransport, SendsControlChange};
}

/// Something that can deliver Control Changes to the outside world.
/// Implementations may drop messages, for example to honor a rate limit.
pub trait SendsControlChange {
    /// Sends (or deliberately drops) one Control Change.
    fn send_control_change(&mut self, control_change: ControlChange);
}
impl SendsControlChange for Vec<ControlChange> {
    fn send_control_change(&mut self, control_change: ControlChange) {
        self.push(control_change);
    }
}
impl<T: SendsControlChange + ?Sized> SendsControlChange for Box<T> {
    fn send_control_change(&mut self, control_change: ControlChange) {
        self.as_mut().send_control_change(control_change)
    }
}

/// Something driven by an external MIDI clock and its transport messages.
pub trait HandlesTransport {
    /// Handles one inbound transport message. Errors are fatal to the run.
    fn handle_transport(&mut self, event: TransportEvent) -> anyhow::Result<()>;

    /// Releases resources at the end of a run, whether or not it ended in an
    /// error.
    fn shutdown(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}
