// Copyright (c) 2024 Mike Tsao

use crate::{util::Rng, Error};
use bounded_vec_deque::BoundedVecDeque;
use derive_builder::Builder;
use log::debug;

/// Parameters for a [SpiralWalker].
#[derive(Clone, Debug, Builder, PartialEq)]
#[builder(build_fn(validate = "Self::validate", error = "Error"))]
pub struct SpiralParams {
    /// How many scenes there are to walk through.
    pub scene_count: usize,
    /// How far each deterministic step moves.
    #[builder(default = "5")]
    pub k_step: usize,
    /// How many recent scenes to avoid revisiting.
    #[builder(default = "2")]
    pub memory_k: usize,
    /// Probability, 0..=1, of jumping to a random scene instead of stepping.
    #[builder(default = "0.08")]
    pub p_jump: f64,
    /// Seeds the walker's random-number generator; [None] seeds from the OS.
    #[builder(default)]
    pub seed: Option<u64>,
}
impl SpiralParamsBuilder {
    fn validate(&self) -> Result<(), Error> {
        match self.scene_count {
            Some(0) => Err(Error::EmptySceneList),
            _ => Ok(()),
        }
    }
}
impl From<derive_builder::UninitializedFieldError> for Error {
    fn from(value: derive_builder::UninitializedFieldError) -> Self {
        Error::Config(value.to_string())
    }
}

/// [SpiralWalker] picks the next scene at each phrase boundary. It steps
/// forward by a fixed stride, occasionally jumps somewhere random, and avoids
/// the scenes it visited most recently.
#[derive(Debug)]
pub struct SpiralWalker {
    params: SpiralParams,
    rng: Rng,
    current_scene: usize,
    history: BoundedVecDeque<usize>,
}
impl SpiralWalker {
    /// Creates a walker positioned on scene zero with an empty history.
    pub fn new_with(params: SpiralParams) -> Result<Self, Error> {
        if params.scene_count == 0 {
            return Err(Error::EmptySceneList);
        }
        Ok(Self {
            rng: Rng::new_with_optional_seed(params.seed),
            current_scene: 0,
            history: BoundedVecDeque::new(params.memory_k.max(1)),
            params,
        })
    }

    /// The stride, never zero, so the walk always moves.
    fn step(&self) -> usize {
        match self.params.k_step % self.params.scene_count {
            0 => 1,
            step => step,
        }
    }

    /// Picks, remembers, and returns the next scene index.
    pub fn next_scene(&mut self) -> usize {
        let scene_count = self.params.scene_count;
        let step = self.step();
        let mut candidate = (self.current_scene + step) % scene_count;

        if self.rng.rand_float() < self.params.p_jump {
            candidate = self.rng.rand_range(0..scene_count as u64) as usize;
            debug!("Spiral jumped to scene {candidate}");
        }

        // If every scene is in recent history, the last candidate wins even
        // though it repeats.
        let mut attempts = scene_count;
        while attempts > 0 && self.history.contains(&candidate) {
            candidate = (candidate + step) % scene_count;
            attempts -= 1;
        }

        self.history.push_back(candidate);
        self.current_scene = candidate;
        candidate
    }

    /// Called at each phrase boundary. Same as [SpiralWalker::next_scene()].
    pub fn on_phrase_boundary(&mut self) -> usize {
        self.next_scene()
    }

    /// Returns to scene zero and forgets history. The random-number generator
    /// keeps its place in its stream.
    pub fn reset(&mut self) {
        self.current_scene = 0;
        self.history.clear();
    }

    #[allow(missing_docs)]
    pub fn current_scene(&self) -> usize {
        self.current_scene
    }

    /// Recently visited scenes, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &usize> {
        self.history.iter()
    }

    #[allow(missing_docs)]
    pub fn params(&self) -> &SpiralParams {
        &self.params
    }
}
