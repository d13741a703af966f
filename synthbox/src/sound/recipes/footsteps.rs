use crate::prelude::*;
use crate::audio::nodes::FilterKind;
use crate::sound::emit::Emitter;
use crate::sound::patterns::{NoiseImpulse, Cascade, HarmonicTone, ToneShape, Partial, pick};
use crate::sound::recipe::{SoundRecipe, Choice, level, raw_level, choice};
use crate::sound::schedule::{recurrence_interval, Jitter};


pub const GOVERNING: &str = "pace";
pub const CHOICES: &[Choice] = &[
	("material", &["grass", "gravel", "stone", "wood", "snow", "metal"]),
];

pub fn defaults() -> Table {
	params!{
		"pace" => 0.0,
		"weight" => 2.0,
		"material" => "stone",
	}
}


/// How far left or right of centre each foot lands.
const STRIDE_PAN: f32 = 0.15;


/// Inharmonic ratios of a struck free plate.
const PLATE_RATIOS: [f32; 4] = [1.0, 2.76, 5.40, 8.93];


fn ring(frequency: f32, decay: f64, modes: usize, peak: f32, pan: f32) -> HarmonicTone {
	let partials = PLATE_RATIOS.iter()
		.take(modes)
		.enumerate()
		.map(|(index, &ratio)| Partial::new(ratio, 1.0 / (index + 1) as f32).decay(1.0 / (1.0 + 0.5 * index as f32)));

	HarmonicTone::new(frequency, ToneShape::Struck { decay })
		.partials(partials)
		.peak(peak)
		.pan(pan)
}


/// Alternating heel and toe impacts whose colour depends on what's being walked on.
#[derive(Default)]
pub struct Footsteps {
	left_foot: bool,
}

impl Footsteps {
	fn next_pan(&mut self) -> f32 {
		self.left_foot = !self.left_foot;
		if self.left_foot { -STRIDE_PAN } else { STRIDE_PAN }
	}

	fn step(em: &mut Emitter<'_, '_>, params: &Table, at: f64, pan: f32) -> f64 {
		let weight = level(params, "weight");
		let material = choice(params, "material", "stone");

		let heel_peak = 0.15 + 0.35 * weight;
		let toe_at = at + pick(em.rng(), (0.06, 0.12));

		let heel = Footsteps::impact(em, material, weight, at, heel_peak, pan);
		let toe = Footsteps::impact(em, material, weight, toe_at, heel_peak * 0.6, pan);
		heel.max(toe)
	}

	fn impact(em: &mut Emitter<'_, '_>, material: &str, weight: f32, at: f64, peak: f32, pan: f32) -> f64 {
		match material {
			"grass" => NoiseImpulse::new(FilterKind::HighPass, 3000.0 - 1000.0 * weight, 0.7, 0.12)
				.attack(0.02)
				.peak(peak * 0.6)
				.pan(pan)
				.play(em, at),

			"gravel" => Cascade {
				peak,
				branch_probability: 0.7,
				max_children: 3,
				delay: (0.005, 0.03),
				frequency_ratio: (0.7, 1.4),
				pan_spread: 0.2,
				..Cascade::new(FilterKind::BandPass, 2500.0 - 800.0 * weight, 1.2, 0.04)
			}.play(em, at),

			"wood" => {
				let knock = NoiseImpulse::new(FilterKind::BandPass, 900.0, 2.0, 0.05)
					.peak(peak)
					.pan(pan)
					.play(em, at);

				let frequency = 180.0 * pick(em.rng(), (0.9, 1.1)) - 40.0 * weight;
				let body = ring(frequency, 0.12, 3, peak * 0.5, pan).play(em, at);
				knock.max(body)
			}

			"snow" => {
				let press = NoiseImpulse::new(FilterKind::LowPass, 1800.0, 0.7, 0.18)
					.attack(0.03)
					.sweep_to(600.0)
					.peak(peak * 0.8)
					.pan(pan)
					.play(em, at);

				let crunch = Cascade {
					peak: peak * 0.3,
					branch_probability: 0.6,
					pan_spread: 0.1,
					..Cascade::new(FilterKind::HighPass, 3500.0, 0.8, 0.02)
				}.play(em, at + 0.01);

				press.max(crunch)
			}

			"metal" => {
				let clank = NoiseImpulse::new(FilterKind::HighPass, 2000.0, 1.0, 0.04)
					.peak(peak * 0.7)
					.pan(pan)
					.play(em, at);

				let frequency = 520.0 * pick(em.rng(), (0.95, 1.05));
				let tail = ring(frequency, 0.4, PLATE_RATIOS.len(), peak * 0.4, pan).play(em, at);
				clank.max(tail)
			}

			_ => {
				let scuff = NoiseImpulse::new(FilterKind::BandPass, 1800.0, 1.5, 0.05)
					.peak(peak * 0.7)
					.pan(pan)
					.play(em, at);

				let thud = NoiseImpulse::new(FilterKind::LowPass, 150.0 + 100.0 * (1.0 - weight), 1.0, 0.08)
					.peak(peak * 0.8)
					.pan(pan)
					.play(em, at);

				scuff.max(thud)
			}
		}
	}
}

impl SoundRecipe for Footsteps {
	fn begin(&mut self, _em: &mut Emitter<'_, '_>, _params: &Table) -> Option<f64> {
		Some(0.0)
	}

	fn recur(&mut self, em: &mut Emitter<'_, '_>, params: &Table) -> Option<f64> {
		let interval = recurrence_interval(1.2, 0.18, raw_level(params, "pace"), 0.3, Jitter::Uniform(0.08), em.rng());
		let at = em.now() + interval;
		let pan = self.next_pan();

		Footsteps::step(em, params, at, pan);
		Some(interval)
	}

	/// A left and right pair.
	fn burst(&mut self, em: &mut Emitter<'_, '_>, params: &Table) -> f64 {
		let now = em.now();

		let first = self.next_pan();
		let second = self.next_pan();

		let end = Footsteps::step(em, params, now, first);
		end.max(Footsteps::step(em, params, now + 0.45, second))
	}
}



#[cfg(test)]
mod test {
	use super::*;
	use crate::sound::emit::test::{test_engine, emit_with};

	#[test]
	fn feet_alternate() {
		let mut footsteps = Footsteps::default();
		let pans: Vec<_> = (0..4).map(|_| footsteps.next_pan()).collect();
		assert_eq!(pans, vec![-STRIDE_PAN, STRIDE_PAN, -STRIDE_PAN, STRIDE_PAN]);
	}

	#[test]
	fn every_material_steps() {
		let engine = test_engine();

		for &material in CHOICES[0].1 {
			let params = defaults().with("material", material);
			let ((end, latest), registry) = emit_with(&engine, 6, |em| {
				let end = Footsteps::step(em, &params, 0.0, 0.0);
				(end, em.end_time())
			});

			assert_eq!(end, latest, "{material}");
			assert!(end > 0.05 && end < 1.0, "{material}: {end}");
			assert!(registry.len() >= 8, "{material}");
		}
	}

	#[test]
	fn metal_rings_longer_than_grass() {
		let engine = test_engine();

		let step_length = |material: &str| {
			let params = defaults().with("material", material);
			emit_with(&engine, 6, |em| Footsteps::step(em, &params, 0.0, 0.0)).0
		};

		assert!(step_length("metal") > step_length("grass"));
	}
}
