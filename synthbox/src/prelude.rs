pub use rand::prelude::*;
pub use rand::rngs::SmallRng;
pub use std::f32::consts::{PI, TAU};

pub use crate::audio::{AudioEngine, OutputBus, NodeId, Schedule, WallClock, SystemClock, ManualClock};
pub use crate::sound::{SoundGenerator, SoundKind, PlaybackState};
pub use crate::config::EngineConfig;

pub use synthbox_cfg::{Table, Value, params};

pub use anyhow;

pub use tracing;
#[doc(hidden)]
pub use tracing::instrument;
