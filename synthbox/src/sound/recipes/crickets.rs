use crate::prelude::*;
use crate::audio::Lfo;
use crate::sound::emit::Emitter;
use crate::sound::patterns::{HarmonicTone, ToneShape, Partial, pick};
use crate::sound::recipe::{SoundRecipe, Choice, level, raw_level};
use crate::sound::schedule::{recurrence_interval, Jitter};

use smallvec::SmallVec;


pub const GOVERNING: &str = "density";
pub const CHOICES: &[Choice] = &[];

pub fn defaults() -> Table {
	params!{
		"density" => 0.0,
		"pitch" => 2.0,
		"tempo" => 2.0,
	}
}


pub const MAX_VOICES: usize = 5;


/// One cricket in the chorus.
#[derive(Copy, Clone, Debug, PartialEq)]
struct Voice {
	pitch_ratio: f32,
	pan: f32,
}

impl Voice {
	const SOLO: Voice = Voice { pitch_ratio: 1.0, pan: 0.0 };

	fn random(rng: &mut impl Rng) -> Voice {
		Voice {
			pitch_ratio: pick(rng, (0.92, 1.08)),
			pan: pick(rng, (-0.8, 0.8)),
		}
	}
}

fn voice_count(params: &Table) -> usize {
	1 + (4.0 * level(params, "density")).round() as usize
}


/// A chorus of crickets, each chirping a tremolo gated tone train at its own pitch and position.
/// Chirps are spread out with exponential gaps, so busier choruses clump naturally.
#[derive(Default)]
pub struct Crickets {
	voices: SmallVec<[Voice; MAX_VOICES]>,
}

impl Crickets {
	fn sync_voices(&mut self, params: &Table, rng: &mut impl Rng) {
		let count = voice_count(params).min(MAX_VOICES);

		self.voices.truncate(count);
		while self.voices.len() < count {
			self.voices.push(Voice::random(rng));
		}
	}

	fn chirp(em: &mut Emitter<'_, '_>, params: &Table, voice: Voice, at: f64) -> f64 {
		let density = level(params, "density");
		let pulse_rate = 20.0 + 25.0 * level(params, "tempo");
		let frequency = (3800.0 + 2000.0 * level(params, "pitch")) * voice.pitch_ratio;

		let pulses = em.rng().gen_range(3..=6) as f64;

		let tone = HarmonicTone::new(frequency, ToneShape::Held { attack: 0.004, sustain: pulses / pulse_rate as f64, release: 0.02 })
			.partials([Partial::new(1.0, 1.0), Partial::new(2.0, 0.15)])
			.tremolo(Lfo::sine(pulse_rate, 1.0).with_phase(0.75))
			.peak(0.08 + 0.1 * density)
			.pan(voice.pan);

		let mut end = tone.play(em, at);

		if em.rng().gen_bool(0.4) {
			let gap = pick(em.rng(), (0.04, 0.1));
			end = tone.play(em, end + gap);
		}

		end
	}
}

impl SoundRecipe for Crickets {
	/// The chorus is only assembled here. Chirps start with the first recurrence.
	fn begin(&mut self, em: &mut Emitter<'_, '_>, params: &Table) -> Option<f64> {
		self.voices.clear();
		self.sync_voices(params, em.rng());
		Some(0.0)
	}

	fn recur(&mut self, em: &mut Emitter<'_, '_>, params: &Table) -> Option<f64> {
		self.sync_voices(params, em.rng());

		let activity = raw_level(params, "density") + 0.5 * raw_level(params, "tempo");
		let interval = recurrence_interval(2.0, 0.35, activity, 0.15, Jitter::Exponential, em.rng());

		let voice = self.voices.choose(em.rng()).copied().unwrap_or(Voice::SOLO);
		let at = em.now() + interval;
		Crickets::chirp(em, params, voice, at);

		Some(interval)
	}

	fn burst(&mut self, em: &mut Emitter<'_, '_>, params: &Table) -> f64 {
		let voice = self.voices.first().copied().unwrap_or(Voice::SOLO);
		let now = em.now();
		Crickets::chirp(em, params, voice, now)
	}

	fn end(&mut self) {
		self.voices.clear();
	}
}
