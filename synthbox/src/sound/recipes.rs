//! The sound catalog. Each module holds one family's defaults, accepted choices and recipe.

pub mod wind;
pub mod rain;
pub mod thunder;
pub mod fire;
pub mod crickets;
pub mod footsteps;
pub mod ice;
pub mod combat;
pub mod spell;
pub mod tone;
pub mod song;
