use crate::prelude::*;
use crate::audio::nodes::FilterKind;
use crate::audio::waveform::Waveform;
use crate::sound::emit::Emitter;
use crate::sound::patterns::{NoiseImpulse, Cascade, HarmonicTone, ToneShape, Partial, pick};
use crate::sound::recipe::{SoundRecipe, Choice, level, raw_level, choice};
use crate::sound::schedule::{recurrence_interval, Jitter};


pub const GOVERNING: &str = "rate";
pub const CHOICES: &[Choice] = &[
	("style", &["sword", "punch", "shield", "arrow", "axe"]),
];

pub fn defaults() -> Table {
	params!{
		"rate" => 0.0,
		"force" => 2.0,
		"style" => "sword",
	}
}


/// Air displaced by a swing: band passed noise swept between two frequencies.
fn whoosh(em: &mut Emitter<'_, '_>, at: f64, (from, to): (f32, f32), duration: f64, peak: f32) -> f64 {
	let pan = pick(em.rng(), (-0.4, 0.4));

	NoiseImpulse::new(FilterKind::BandPass, from, 1.5, duration * 0.5)
		.attack(duration * 0.5)
		.sweep_to(to)
		.peak(peak)
		.pan(pan)
		.play(em, at)
}

/// Body of a blunt impact.
fn thud(em: &mut Emitter<'_, '_>, at: f64, frequency: f32, decay: f64, peak: f32) -> f64 {
	let knock = NoiseImpulse::new(FilterKind::LowPass, frequency, 1.2, decay)
		.peak(peak)
		.play(em, at);

	let body = HarmonicTone::new(frequency * 0.5, ToneShape::Struck { decay: decay * 0.8 })
		.peak(peak * 0.6)
		.play(em, at);

	knock.max(body)
}

/// Struck metal: inharmonic partials, slightly detuned so repeated hits don't sound identical.
fn clang(em: &mut Emitter<'_, '_>, at: f64, frequency: f32, decay: f64, peak: f32) -> f64 {
	let frequency = frequency * pick(em.rng(), (0.96, 1.04));

	HarmonicTone::new(frequency, ToneShape::Struck { decay })
		.partials([
			Partial::new(1.0, 1.0),
			Partial::new(2.76, 0.6).decay(0.8),
			Partial::new(5.40, 0.35).decay(0.5),
			Partial::new(8.93, 0.2).decay(0.3),
		])
		.detune_spread(8.0)
		.peak(peak)
		.play(em, at)
}


/// Melee and ranged combat hits. Each style is a swing or release followed by an impact.
#[derive(Default)]
pub struct Combat;

impl Combat {
	fn hit(em: &mut Emitter<'_, '_>, params: &Table, at: f64) -> f64 {
		let force = 0.4 + 0.6 * level(params, "force");

		match choice(params, "style", "sword") {
			"punch" => {
				let swing = whoosh(em, at, (400.0, 1200.0), 0.1, 0.2 * force);
				let impact = at + 0.08;
				let body = thud(em, impact, 200.0, 0.12, 0.6 * force);
				let slap = NoiseImpulse::new(FilterKind::BandPass, 800.0, 1.0, 0.04)
					.peak(0.3 * force)
					.play(em, impact);

				swing.max(body).max(slap)
			}

			"shield" => {
				let body = thud(em, at, 150.0, 0.2, 0.5 * force);
				let ring = clang(em, at, 300.0, 0.8, 0.25 * force);
				let rattle = Cascade {
					peak: 0.2 * force,
					pan_spread: 0.3,
					..Cascade::new(FilterKind::HighPass, 2500.0, 0.8, 0.03)
				}.play(em, at);

				body.max(ring).max(rattle)
			}

			"arrow" => {
				let twang = HarmonicTone::new(220.0, ToneShape::Struck { decay: 0.15 })
					.waveform(Waveform::Triangle)
					.peak(0.15 * force)
					.play(em, at);

				let flight = whoosh(em, at + 0.02, (1500.0, 4000.0), 0.25, 0.15 * force);
				let impact = NoiseImpulse::new(FilterKind::BandPass, 1200.0, 2.0, 0.05)
					.peak(0.4 * force)
					.play(em, at + 0.3);

				twang.max(flight).max(impact)
			}

			"axe" => {
				let swing = whoosh(em, at, (300.0, 1500.0), 0.3, 0.3 * force);
				let impact = at + 0.28;
				let body = thud(em, impact, 120.0, 0.25, 0.7 * force);
				let splinter = Cascade {
					peak: 0.25 * force,
					branch_probability: 0.6,
					max_children: 3,
					pan_spread: 0.4,
					..Cascade::new(FilterKind::BandPass, 1800.0, 1.5, 0.04)
				}.play(em, impact);

				swing.max(body).max(splinter)
			}

			_ => {
				let swing = whoosh(em, at, (600.0, 3000.0), 0.18, 0.2 * force);
				let impact = at + 0.15;
				let ring = clang(em, impact, 900.0, 0.6, 0.3 * force);
				let scrape = NoiseImpulse::new(FilterKind::HighPass, 3000.0, 0.7, 0.05)
					.peak(0.3 * force)
					.play(em, impact);

				swing.max(ring).max(scrape)
			}
		}
	}
}

impl SoundRecipe for Combat {
	fn begin(&mut self, _em: &mut Emitter<'_, '_>, _params: &Table) -> Option<f64> {
		Some(0.0)
	}

	fn recur(&mut self, em: &mut Emitter<'_, '_>, params: &Table) -> Option<f64> {
		let interval = recurrence_interval(3.0, 0.6, raw_level(params, "rate"), 0.35, Jitter::Uniform(0.3), em.rng());
		let at = em.now() + interval;
		Combat::hit(em, params, at);
		Some(interval)
	}

	fn burst(&mut self, em: &mut Emitter<'_, '_>, params: &Table) -> f64 {
		let now = em.now();
		Combat::hit(em, params, now)
	}
}



#[cfg(test)]
mod test {
	use super::*;
	use crate::sound::emit::test::{test_engine, emit_with};

	#[test]
	fn every_style_lands() {
		let engine = test_engine();

		for &style in CHOICES[0].1 {
			let params = defaults().with("style", style);
			let ((end, latest), _) = emit_with(&engine, 21, |em| {
				let end = Combat.burst(em, &params);
				(end, em.end_time())
			});

			assert_eq!(end, latest, "{style}");
			assert!(end > 0.1 && end < 1.5, "{style}: {end}");
		}
	}

	#[test]
	fn force_raises_the_level() {
		let engine = test_engine();
		let soft = defaults().with("force", 0.0).with("style", "punch");
		let hard = defaults().with("force", 4.0).with("style", "punch");

		emit_with(&engine, 2, |em| Combat.burst(em, &soft));
		let soft_peak = engine.render(16000 / 2).iter().fold(0.0f32, |peak, s| peak.max(s.abs()));

		engine.render(16000);

		emit_with(&engine, 2, |em| Combat.burst(em, &hard));
		let hard_peak = engine.render(16000 / 2).iter().fold(0.0f32, |peak, s| peak.max(s.abs()));

		assert!(hard_peak > soft_peak, "{hard_peak} <= {soft_peak}");
	}
}
