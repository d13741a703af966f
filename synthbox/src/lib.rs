#![doc = include_str!("../README.md")]

pub mod prelude;
pub use crate::prelude::*;

pub mod audio;
pub mod sound;
pub mod config;

pub use synthbox_cfg as cfg;
