// Copyright (c) 2024 Mike Tsao

//! Errors that the core can report. Most of them indicate a startup-time
//! configuration defect or a bug in a collaborator, not something to recover
//! from at runtime.

use thiserror::Error;

/// The library's error type.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// A musical division wasn't of the form `1/N`, or N didn't evenly divide
    /// a whole note's worth of clock ticks.
    #[error("unsupported division {0:?}")]
    InvalidDivision(String),

    /// A transport message type that the clock doesn't understand.
    #[error("unknown message type {0:?}")]
    UnknownMessage(String),

    /// The settings failed validation.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A scene walker needs at least one scene to walk.
    #[error("at least one scene is required")]
    EmptySceneList,
}
