use crate::prelude::*;
use crate::audio::{NodeGraph, Lfo};
use crate::audio::nodes::FilterKind;
use crate::sound::emit::Emitter;
use crate::sound::patterns::{Drone, DroneHandles, Cascade, pick};
use crate::sound::recipe::{SoundRecipe, Choice, level};
use crate::sound::schedule::PoissonHorizon;


pub const GOVERNING: &str = "intensity";
pub const CHOICES: &[Choice] = &[];

pub fn defaults() -> Table {
	params!{
		"intensity" => 0.0,
		"crackle" => 2.0,
		"size" => 2.0,
	}
}


/// How often the crackle horizon is topped up.
const TICK: f64 = 0.25;

/// How far past the current time crackles are planned on each tick.
const LOOKAHEAD: f64 = 0.5;


fn bed_level(params: &Table) -> f32 {
	0.03 + 0.15 * level(params, "intensity")
}

fn cutoff(params: &Table) -> f32 {
	400.0 + 600.0 * level(params, "size")
}

/// Mean crackles per second.
fn crackle_rate(params: &Table) -> f64 {
	let crackle = level(params, "crackle") as f64;
	let intensity = level(params, "intensity") as f64;
	1.0 + 4.0 * crackle * (0.5 + intensity)
}


/// A low roaring bed with crackles scattered over it at Poisson distributed times.
#[derive(Default)]
pub struct Fire {
	bed: Option<DroneHandles>,
	horizon: PoissonHorizon,
}

impl Fire {
	fn crackle(em: &mut Emitter<'_, '_>, params: &Table, at: f64) -> f64 {
		let intensity = level(params, "intensity");
		let size = level(params, "size");

		let rng = em.rng();
		let filter = if rng.gen_bool(0.5) { FilterKind::BandPass } else { FilterKind::HighPass };
		let frequency = pick(rng, (2000.0, 5000.0)) * (1.0 - 0.3 * size);
		let decay = pick(rng, (0.01, 0.03));

		let cascade = Cascade {
			peak: 0.08 + 0.2 * intensity,
			branch_probability: 0.4,
			pan_spread: 0.6,
			..Cascade::new(filter, frequency, 1.5, decay)
		};

		cascade.play(em, at)
	}
}

impl SoundRecipe for Fire {
	fn begin(&mut self, em: &mut Emitter<'_, '_>, params: &Table) -> Option<f64> {
		let bed = bed_level(params);

		let drone = Drone::noise(bed)
			.filter(FilterKind::LowPass, cutoff(params), 0.5)
			.modulate_cutoff(Lfo::sine(0.3, 150.0))
			.modulate_cutoff(Lfo::sine(1.7, 60.0))
			.modulate_gain(Lfo::sine(0.5, bed * 0.2))
			.attack(1.0);

		let now = em.now();
		self.bed = Some(drone.start(em, now));

		self.horizon = PoissonHorizon::new(crackle_rate(params));
		self.horizon.reset(now);

		Some(0.0)
	}

	fn recur(&mut self, em: &mut Emitter<'_, '_>, params: &Table) -> Option<f64> {
		let now = em.now();

		// Fell behind, e.g. while the graph was busy. Don't try to catch up.
		if self.horizon.horizon() < now {
			self.horizon.reset(now);
		}

		for at in self.horizon.extend(now + LOOKAHEAD, em.rng()) {
			Fire::crackle(em, params, at.max(now));
		}

		Some(TICK)
	}

	fn burst(&mut self, em: &mut Emitter<'_, '_>, params: &Table) -> f64 {
		let params = &params.clone().with("intensity", params.number("intensity").unwrap_or(0.0).max(1.0));
		let now = em.now();
		let pops = em.rng().gen_range(3..=6);

		let mut end = now;
		for _ in 0..pops {
			let at = now + pick(em.rng(), (0.0, 0.6));
			end = end.max(Fire::crackle(em, params, at));
		}

		end
	}

	fn retune(&mut self, graph: &mut NodeGraph, now: f64, params: &Table) {
		self.horizon.set_rate(crackle_rate(params));

		if let Some(bed) = self.bed.filter(|bed| bed.is_alive(graph)) {
			bed.set_level(graph, bed_level(params), now, 0.5);
			bed.set_cutoff(graph, cutoff(params), now, 0.5);
		}
	}

	fn end(&mut self) {
		self.bed = None;
	}
}
