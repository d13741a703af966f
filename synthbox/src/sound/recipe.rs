use crate::prelude::*;
use crate::audio::NodeGraph;
use crate::audio::util::unit;
use crate::sound::emit::Emitter;
use crate::sound::recipes::*;

use std::fmt;
use std::str::FromStr;


/// A string parameter and the values it accepts.
pub type Choice = (&'static str, &'static [&'static str]);


/// How one family of sounds maps its parameters onto node graphs.
///
/// Times handed back are on the sample clock unless they're a delay until the next recurrence,
/// which is wall clock.
pub trait SoundRecipe {
	/// Continuous mode has started. Returns the delay until the first recurrence if the sound recurs.
	fn begin(&mut self, em: &mut Emitter<'_, '_>, params: &Table) -> Option<f64>;

	/// The recurrence timer fired. Returns the delay until the next firing, or `None` once there's nothing left to play.
	fn recur(&mut self, _em: &mut Emitter<'_, '_>, _params: &Table) -> Option<f64> {
		None
	}

	/// Emit one finite instance. Returns the time its last node stops.
	fn burst(&mut self, em: &mut Emitter<'_, '_>, params: &Table) -> f64;

	/// Parameters changed while active.
	fn retune(&mut self, _graph: &mut NodeGraph, _now: f64, _params: &Table) {}

	/// Second phase of a two-phase effect. `None` means there's no second phase and a plain stop should happen instead.
	fn release(&mut self, _em: &mut Emitter<'_, '_>, _params: &Table) -> Option<f64> {
		None
	}

	/// Play a single pitched note. `None` for sounds without pitch.
	fn note(&mut self, _em: &mut Emitter<'_, '_>, _params: &Table, _midi_note: f32, _duration: f64) -> Option<f64> {
		None
	}

	/// Continuous mode has ended and any held nodes are gone.
	fn end(&mut self) {}
}



/// Level parameter scaled to 0..1. Levels run 0 to 4.
pub fn level(params: &Table, key: &str) -> f32 {
	unit(params.number(key).unwrap_or(0.0), 4.0)
}

/// Level parameter as given, clamped to 0..4.
pub fn raw_level(params: &Table, key: &str) -> f64 {
	params.number(key).unwrap_or(0.0).clamp(0.0, 4.0)
}

pub fn choice<'t>(params: &'t Table, key: &str, fallback: &'t str) -> &'t str {
	params.string(key).unwrap_or(fallback)
}



macro_rules! define_catalog {
	($($kind:ident => $module:ident :: $recipe:ident),+ $(,)?) => {
		/// Every family of sound the engine can synthesise.
		#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
		pub enum SoundKind {
			$($kind),+
		}

		impl SoundKind {
			pub const ALL: &'static [SoundKind] = &[$(SoundKind::$kind),+];

			pub fn name(self) -> &'static str {
				match self {
					$(SoundKind::$kind => stringify!($module)),+
				}
			}

			/// The complete parameter set a fresh generator of this kind starts from.
			pub fn defaults(self) -> Table {
				match self {
					$(SoundKind::$kind => $module::defaults()),+
				}
			}

			/// The parameter whose zero value disables continuous playback.
			pub fn governing_param(self) -> &'static str {
				match self {
					$(SoundKind::$kind => $module::GOVERNING),+
				}
			}

			pub fn choices(self) -> &'static [Choice] {
				match self {
					$(SoundKind::$kind => $module::CHOICES),+
				}
			}
		}


		/// Per-generator recipe state, one variant per [`SoundKind`].
		pub enum Recipe {
			$($kind($module::$recipe)),+
		}

		impl Recipe {
			pub fn new(kind: SoundKind) -> Recipe {
				match kind {
					$(SoundKind::$kind => Recipe::$kind($module::$recipe::default())),+
				}
			}

			pub fn kind(&self) -> SoundKind {
				match self {
					$(Recipe::$kind(_) => SoundKind::$kind),+
				}
			}
		}

		impl SoundRecipe for Recipe {
			fn begin(&mut self, em: &mut Emitter<'_, '_>, params: &Table) -> Option<f64> {
				match self {
					$(Recipe::$kind(recipe) => recipe.begin(em, params)),+
				}
			}

			fn recur(&mut self, em: &mut Emitter<'_, '_>, params: &Table) -> Option<f64> {
				match self {
					$(Recipe::$kind(recipe) => recipe.recur(em, params)),+
				}
			}

			fn burst(&mut self, em: &mut Emitter<'_, '_>, params: &Table) -> f64 {
				match self {
					$(Recipe::$kind(recipe) => recipe.burst(em, params)),+
				}
			}

			fn retune(&mut self, graph: &mut NodeGraph, now: f64, params: &Table) {
				match self {
					$(Recipe::$kind(recipe) => recipe.retune(graph, now, params)),+
				}
			}

			fn release(&mut self, em: &mut Emitter<'_, '_>, params: &Table) -> Option<f64> {
				match self {
					$(Recipe::$kind(recipe) => recipe.release(em, params)),+
				}
			}

			fn note(&mut self, em: &mut Emitter<'_, '_>, params: &Table, midi_note: f32, duration: f64) -> Option<f64> {
				match self {
					$(Recipe::$kind(recipe) => recipe.note(em, params, midi_note, duration)),+
				}
			}

			fn end(&mut self) {
				match self {
					$(Recipe::$kind(recipe) => recipe.end()),+
				}
			}
		}
	};
}

define_catalog! {
	Wind => wind::Wind,
	Rain => rain::Rain,
	Thunder => thunder::Thunder,
	Fire => fire::Fire,
	Crickets => crickets::Crickets,
	Footsteps => footsteps::Footsteps,
	Ice => ice::Ice,
	Combat => combat::Combat,
	Spell => spell::Spell,
	Tone => tone::Tone,
	Song => song::Song,
}


impl SoundKind {
	pub fn is_tonal(self) -> bool {
		matches!(self, SoundKind::Tone | SoundKind::Song)
	}

	/// Check a partial parameter update without applying it.
	///
	/// Unknown keys, values of the wrong type and unlisted choices are errors. Numbers are never
	/// range checked here; recipes clamp them.
	pub fn validate(self, partial: &Table) -> anyhow::Result<()> {
		partial.check_against(&self.defaults())?;

		for &(key, allowed) in self.choices() {
			if let Some(value) = partial.string(key)
				&& !allowed.contains(&value)
			{
				anyhow::bail!("Parameter '{key}' must be one of {}, got '{value}'", allowed.join(", "));
			}
		}

		if self == SoundKind::Song
			&& let Some(notes) = partial.string("notes")
		{
			song::parse_notes(notes)?;
		}

		Ok(())
	}
}

impl fmt::Display for SoundKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.name().fmt(f)
	}
}

impl FromStr for SoundKind {
	type Err = anyhow::Error;

	fn from_str(s: &str) -> anyhow::Result<SoundKind> {
		SoundKind::ALL.iter()
			.copied()
			.find(|kind| kind.name().eq_ignore_ascii_case(s))
			.ok_or_else(|| anyhow::anyhow!("Unknown sound kind '{s}'"))
	}
}
