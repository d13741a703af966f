use crate::prelude::*;
use crate::audio::nodes::FilterKind;
use crate::sound::emit::Emitter;
use crate::sound::patterns::{Cascade, HarmonicTone, ToneShape, Partial, pick};
use crate::sound::recipe::{SoundRecipe, Choice, level, raw_level};
use crate::sound::schedule::{recurrence_interval, Jitter};


pub const GOVERNING: &str = "stress";
pub const CHOICES: &[Choice] = &[];

pub fn defaults() -> Table {
	params!{
		"stress" => 0.0,
		"size" => 2.0,
	}
}


/// Creaks and cracks from a sheet of ice under load. Bigger sheets crack lower and ring longer.
#[derive(Default)]
pub struct Ice;

impl Ice {
	fn crack(em: &mut Emitter<'_, '_>, params: &Table, at: f64) -> f64 {
		let stress = level(params, "stress").max(0.25);
		let size = level(params, "size");

		let cascade = Cascade {
			peak: 0.2 + 0.3 * stress,
			branch_probability: 0.5 + 0.3 * stress as f64,
			max_children: 3,
			delay: (0.01, 0.08),
			pan_spread: 0.7,
			..Cascade::new(FilterKind::HighPass, 1500.0 + 2500.0 * (1.0 - size), 1.0, 0.03 + 0.04 * size as f64)
		};

		let mut end = cascade.play(em, at);

		let pings = em.rng().gen_range(1..=3);
		for _ in 0..pings {
			let rng = em.rng();
			let frequency = (1800.0 - 900.0 * size) * pick(rng, (0.8, 1.25));
			let onset = at + pick(rng, (0.0, 0.06));
			let pan = pick(rng, (-0.6, 0.6));

			let ping = HarmonicTone::new(frequency, ToneShape::Struck { decay: 0.3 + 0.8 * size as f64 })
				.partials([Partial::new(1.0, 1.0), Partial::new(2.32, 0.5).decay(0.7), Partial::new(4.25, 0.25).decay(0.4)])
				.peak(0.05 + 0.1 * stress)
				.pan(pan);

			end = end.max(ping.play(em, onset));
		}

		end
	}
}

impl SoundRecipe for Ice {
	fn begin(&mut self, _em: &mut Emitter<'_, '_>, _params: &Table) -> Option<f64> {
		Some(0.0)
	}

	fn recur(&mut self, em: &mut Emitter<'_, '_>, params: &Table) -> Option<f64> {
		let interval = recurrence_interval(6.0, 1.2, raw_level(params, "stress"), 0.4, Jitter::Exponential, em.rng());
		let at = em.now() + interval;
		Ice::crack(em, params, at);
		Some(interval)
	}

	fn burst(&mut self, em: &mut Emitter<'_, '_>, params: &Table) -> f64 {
		let now = em.now();
		Ice::crack(em, params, now)
	}
}
