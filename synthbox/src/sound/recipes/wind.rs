use crate::prelude::*;
use crate::audio::{NodeGraph, Lfo};
use crate::audio::nodes::FilterKind;
use crate::sound::emit::Emitter;
use crate::sound::patterns::{Drone, DroneHandles, NoiseImpulse, pick};
use crate::sound::recipe::{SoundRecipe, Choice, level, raw_level};
use crate::sound::schedule::{recurrence_interval, Jitter};


pub const GOVERNING: &str = "intensity";
pub const CHOICES: &[Choice] = &[];

pub fn defaults() -> Table {
	params!{
		"intensity" => 0.0,
		"gustiness" => 2.0,
		"pitch" => 2.0,
	}
}


fn bed_level(params: &Table) -> f32 {
	0.04 + 0.2 * level(params, "intensity")
}

fn cutoff(params: &Table) -> f32 {
	250.0 + 900.0 * level(params, "pitch")
}


/// A low passed noise bed whose cutoff wanders, with band passed gusts swept upward on top.
#[derive(Default)]
pub struct Wind {
	bed: Option<DroneHandles>,
}

impl Wind {
	fn gust(em: &mut Emitter<'_, '_>, params: &Table, at: f64) -> f64 {
		let intensity = level(params, "intensity");
		let gustiness = level(params, "gustiness");
		let cutoff = cutoff(params);

		let rng = em.rng();
		let attack = pick(rng, (0.3, 1.2));
		let decay = pick(rng, (1.0, 2.5));
		let pan = pick(rng, (-0.7, 0.7));

		NoiseImpulse::new(FilterKind::BandPass, cutoff, 1.2, decay)
			.sweep_to(cutoff * (1.5 + gustiness))
			.attack(attack)
			.peak((0.05 + 0.25 * intensity) * (0.5 + gustiness))
			.pan(pan)
			.play(em, at)
	}
}

impl SoundRecipe for Wind {
	fn begin(&mut self, em: &mut Emitter<'_, '_>, params: &Table) -> Option<f64> {
		let bed = bed_level(params);
		let cutoff = cutoff(params);
		let gustiness = level(params, "gustiness");

		let drone = Drone::noise(bed)
			.filter(FilterKind::LowPass, cutoff, 0.9)
			.modulate_cutoff(Lfo::sine(0.07, cutoff * 0.35))
			.modulate_cutoff(Lfo::sine(0.23, cutoff * 0.15).with_phase(0.25))
			.modulate_gain(Lfo::sine(0.11 + 0.2 * gustiness, bed * 0.4 * gustiness))
			.attack(1.5);

		let now = em.now();
		self.bed = Some(drone.start(em, now));

		Some(0.0)
	}

	fn recur(&mut self, em: &mut Emitter<'_, '_>, params: &Table) -> Option<f64> {
		let activity = raw_level(params, "gustiness") + 0.5 * raw_level(params, "intensity");
		let interval = recurrence_interval(9.0, 1.2, activity, 1.0, Jitter::Uniform(0.4), em.rng());

		let at = em.now() + interval;
		Wind::gust(em, params, at);

		Some(interval)
	}

	fn burst(&mut self, em: &mut Emitter<'_, '_>, params: &Table) -> f64 {
		let now = em.now();
		Wind::gust(em, params, now)
	}

	fn retune(&mut self, graph: &mut NodeGraph, now: f64, params: &Table) {
		if let Some(bed) = self.bed.filter(|bed| bed.is_alive(graph)) {
			bed.set_level(graph, bed_level(params), now, 0.5);
			bed.set_cutoff(graph, cutoff(params), now, 0.5);
		}
	}

	fn end(&mut self) {
		self.bed = None;
	}
}
