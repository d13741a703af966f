use crate::prelude::*;
use crate::audio::{NodeGraph, Lfo};
use crate::audio::nodes::FilterKind;
use crate::sound::emit::Emitter;
use crate::sound::patterns::{Drone, DroneHandles, NoiseImpulse, HarmonicTone, ToneShape, pick};
use crate::sound::recipe::{SoundRecipe, Choice, level, raw_level, choice};
use crate::sound::schedule::{recurrence_interval, Jitter};


pub const GOVERNING: &str = "intensity";
pub const CHOICES: &[Choice] = &[
	("surface", &["leaf", "stone", "water", "roof"]),
];

pub fn defaults() -> Table {
	params!{
		"intensity" => 0.0,
		"drops" => 2.0,
		"surface" => "stone",
	}
}


#[derive(Copy, Clone, Debug, PartialEq)]
struct Surface {
	drop_filter: FilterKind,
	drop_frequency: f32,
	drop_q: f32,
	bed_filter: FilterKind,
	bed_frequency: f32,

	/// Chance of a drop also ringing like it landed in water.
	plink: f64,
}

impl Surface {
	fn from_params(params: &Table) -> Surface {
		match choice(params, "surface", "stone") {
			"leaf" => Surface {
				drop_filter: FilterKind::BandPass, drop_frequency: 2800.0, drop_q: 1.5,
				bed_filter: FilterKind::BandPass, bed_frequency: 3000.0,
				plink: 0.0,
			},

			"water" => Surface {
				drop_filter: FilterKind::LowPass, drop_frequency: 1400.0, drop_q: 2.0,
				bed_filter: FilterKind::LowPass, bed_frequency: 1200.0,
				plink: 0.3,
			},

			"roof" => Surface {
				drop_filter: FilterKind::BandPass, drop_frequency: 1600.0, drop_q: 3.0,
				bed_filter: FilterKind::BandPass, bed_frequency: 1500.0,
				plink: 0.0,
			},

			_ => Surface {
				drop_filter: FilterKind::HighPass, drop_frequency: 2200.0, drop_q: 0.8,
				bed_filter: FilterKind::HighPass, bed_frequency: 2500.0,
				plink: 0.0,
			},
		}
	}
}


fn bed_level(params: &Table) -> f32 {
	0.02 + 0.12 * level(params, "intensity")
}


/// A filtered noise bed with clusters of short drop impulses on top, coloured by the surface they land on.
#[derive(Default)]
pub struct Rain {
	bed: Option<DroneHandles>,
}

impl Rain {
	fn droplet(em: &mut Emitter<'_, '_>, surface: &Surface, intensity: f32, at: f64) -> f64 {
		let rng = em.rng();
		let frequency = surface.drop_frequency * pick(rng, (0.7, 1.4));
		let decay = pick(rng, (0.015, 0.06));
		let peak = (0.04 + 0.12 * intensity) * pick(rng, (0.4, 1.0));
		let pan = pick(rng, (-0.8, 0.8));
		let plink = rng.gen_bool(surface.plink);

		let mut end = NoiseImpulse::new(surface.drop_filter, frequency, surface.drop_q, decay)
			.peak(peak)
			.pan(pan)
			.play(em, at);

		if plink {
			let frequency = pick(em.rng(), (900.0, 2200.0));
			let tone = HarmonicTone::new(frequency, ToneShape::Struck { decay: 0.08 })
				.peak(peak * 0.5)
				.pan(pan);

			end = end.max(tone.play(em, at));
		}

		end
	}
}

impl SoundRecipe for Rain {
	fn begin(&mut self, em: &mut Emitter<'_, '_>, params: &Table) -> Option<f64> {
		let surface = Surface::from_params(params);
		let bed = bed_level(params);

		let drone = Drone::noise(bed)
			.filter(surface.bed_filter, surface.bed_frequency, 0.6)
			.modulate_gain(Lfo::sine(0.13, bed * 0.15))
			.attack(2.0);

		let now = em.now();
		self.bed = Some(drone.start(em, now));

		Some(0.0)
	}

	fn recur(&mut self, em: &mut Emitter<'_, '_>, params: &Table) -> Option<f64> {
		let surface = Surface::from_params(params);
		let intensity = level(params, "intensity");
		let cluster = 1 + (3.0 * level(params, "drops")).round() as usize;

		let activity = raw_level(params, "intensity") + 0.5 * raw_level(params, "drops");
		let interval = recurrence_interval(0.5, 0.1, activity, 0.04, Jitter::Exponential, em.rng());

		let start = em.now() + interval;
		for _ in 0..cluster {
			let at = start + pick(em.rng(), (0.0, interval));
			Rain::droplet(em, &surface, intensity, at);
		}

		Some(interval)
	}

	fn burst(&mut self, em: &mut Emitter<'_, '_>, params: &Table) -> f64 {
		let surface = Surface::from_params(params);
		let intensity = level(params, "intensity").max(0.25);
		let count = 6 + (6.0 * level(params, "drops")).round() as usize;

		let now = em.now();
		let mut end = now;

		for _ in 0..count {
			let at = now + pick(em.rng(), (0.0, 0.6));
			end = end.max(Rain::droplet(em, &surface, intensity, at));
		}

		end
	}

	/// The bed filter stays as it was built; drops pick up a new surface straight away.
	fn retune(&mut self, graph: &mut NodeGraph, now: f64, params: &Table) {
		if let Some(bed) = self.bed.filter(|bed| bed.is_alive(graph)) {
			bed.set_level(graph, bed_level(params), now, 1.0);
		}
	}

	fn end(&mut self) {
		self.bed = None;
	}
}
