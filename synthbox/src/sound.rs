//! Procedural sound generators built on top of [`crate::audio`].
//!
//! A [`SoundGenerator`] owns the nodes it creates and releases them on stop or once a burst is over.
//! What it creates is decided by its [`Recipe`], one per [`SoundKind`].

pub mod generator;
pub mod registry;
pub mod schedule;
pub mod emit;
pub mod patterns;
pub mod recipe;
pub mod recipes;

pub use generator::{SoundGenerator, PlaybackState};
pub use recipe::{Recipe, SoundRecipe, SoundKind};
pub use registry::NodeRegistry;
pub use schedule::{ScheduleHandle, Jitter, PoissonHorizon, recurrence_interval};
pub use emit::Emitter;
