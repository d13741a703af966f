use crate::prelude::*;
use crate::audio::{NodeGraph, NodeId, Schedule, ParamKind, Lfo};
use crate::audio::envelope::release_to_floor;
use crate::audio::nodes::FilterKind;
use crate::audio::waveform::Waveform;
use crate::sound::emit::Emitter;
use crate::sound::patterns::{Charge, ChargeHandles, Cascade, NoiseImpulse, HarmonicTone, ToneShape, Partial, pick};
use crate::sound::recipe::{SoundRecipe, Choice, level, raw_level, choice};


pub const GOVERNING: &str = "power";
pub const CHOICES: &[Choice] = &[
	("element", &["fire", "ice", "lightning", "arcane", "nature"]),
];

pub fn defaults() -> Table {
	params!{
		"power" => 0.0,
		"charge" => 2.0,
		"element" => "arcane",
	}
}


const ECHO_TIME: f32 = 0.18;
const ECHO_FEEDBACK: f32 = 0.35;

/// Fade applied to the charge when it's released.
const CHARGE_FADE: f64 = 0.08;


#[derive(Copy, Clone, Debug, PartialEq)]
enum Element {
	Fire,
	Ice,
	Lightning,
	Arcane,
	Nature,
}

impl Element {
	fn from_params(params: &Table) -> Element {
		match choice(params, "element", "arcane") {
			"fire" => Element::Fire,
			"ice" => Element::Ice,
			"lightning" => Element::Lightning,
			"nature" => Element::Nature,
			_ => Element::Arcane,
		}
	}

	fn charge(self, level: f32, charge_time: f64) -> Charge {
		match self {
			Element::Fire => Charge { rise: 3.0, detune: 12.0, ..Charge::new(Waveform::Saw, 110.0, level, charge_time) },
			Element::Ice => Charge { rise: 1.5, ..Charge::new(Waveform::Triangle, 880.0, level, charge_time) },
			Element::Lightning => Charge { rise: 4.0, ..Charge::new(Waveform::Square, 220.0, level * 0.6, charge_time) },
			Element::Arcane => Charge {
				shimmer: Some(Lfo::sine(7.0, level * 0.3)),
				..Charge::new(Waveform::Sine, 330.0, level, charge_time)
			},
			Element::Nature => Charge { rise: 1.5, detune: 5.0, ..Charge::new(Waveform::Triangle, 196.0, level, charge_time) },
		}
	}

	/// The effect of the spell itself, routed into `destination`.
	fn cast(self, em: &mut Emitter<'_, '_>, at: f64, peak: f32, destination: NodeId) -> f64 {
		match self {
			Element::Fire => {
				let whoomp = NoiseImpulse::new(FilterKind::LowPass, 300.0, 0.8, 0.6)
					.attack(0.04)
					.sweep_to(2500.0)
					.peak(peak)
					.play_into(em, at, destination);

				let sparks = Cascade {
					peak: peak * 0.4,
					branch_probability: 0.6,
					max_children: 3,
					pan_spread: 0.6,
					..Cascade::new(FilterKind::HighPass, 3500.0, 1.0, 0.02)
				}.play_into(em, at + 0.05, destination);

				whoomp.max(sparks)
			}

			Element::Ice => {
				let crystal = HarmonicTone::new(1320.0, ToneShape::Struck { decay: 0.9 })
					.partials([Partial::new(1.0, 1.0), Partial::new(2.32, 0.5).decay(0.7), Partial::new(4.25, 0.3).decay(0.4)])
					.peak(peak * 0.6)
					.play_into(em, at, destination);

				let shards = Cascade {
					peak: peak * 0.5,
					branch_probability: 0.7,
					pan_spread: 0.5,
					..Cascade::new(FilterKind::HighPass, 4000.0, 1.2, 0.03)
				}.play_into(em, at, destination);

				crystal.max(shards)
			}

			Element::Lightning => {
				let bolt = Cascade {
					peak,
					branch_probability: 0.8,
					max_children: 3,
					delay: (0.002, 0.02),
					frequency_ratio: (0.6, 1.3),
					pan_spread: 0.7,
					..Cascade::new(FilterKind::HighPass, 2500.0, 0.7, 0.06)
				}.play_into(em, at, destination);

				let boom = NoiseImpulse::new(FilterKind::LowPass, 180.0, 0.9, 0.8)
					.attack(0.02)
					.sweep_to(60.0)
					.peak(peak * 0.7)
					.play_into(em, at + 0.03, destination);

				bolt.max(boom)
			}

			Element::Arcane => {
				let chord = HarmonicTone::new(660.0, ToneShape::Struck { decay: 1.0 })
					.partials([Partial::new(1.0, 1.0), Partial::new(1.5, 0.7), Partial::new(2.0, 0.5), Partial::new(3.0, 0.3)])
					.vibrato(Lfo::sine(6.0, 15.0))
					.detune_spread(6.0)
					.peak(peak * 0.6)
					.play_into(em, at, destination);

				let swell = NoiseImpulse::new(FilterKind::BandPass, 1200.0, 4.0, 0.5)
					.attack(0.1)
					.sweep_to(3000.0)
					.peak(peak * 0.3)
					.play_into(em, at, destination);

				chord.max(swell)
			}

			Element::Nature => {
				let rustle = NoiseImpulse::new(FilterKind::BandPass, 2500.0, 1.0, 0.5)
					.attack(0.1)
					.sweep_to(1200.0)
					.peak(peak * 0.5)
					.play_into(em, at, destination);

				let bloom = HarmonicTone::new(392.0, ToneShape::Held { attack: 0.08, sustain: 0.2, release: 0.5 })
					.waveform(Waveform::Triangle)
					.partials([Partial::new(1.0, 1.0), Partial::new(1.25, 0.6), Partial::new(1.5, 0.5)])
					.tremolo(Lfo::sine(5.0, 0.3))
					.peak(peak * 0.5)
					.play_into(em, at, destination);

				rustle.max(bloom)
			}
		}
	}
}


fn charge_level(params: &Table) -> f32 {
	0.05 + 0.2 * level(params, "power")
}

fn charge_time(params: &Table) -> f64 {
	0.4 + 0.4 * raw_level(params, "charge")
}


/// A two phase effect: a rising charge held while active, then a cast with an echo tail on release.
#[derive(Default)]
pub struct Spell {
	charge: Option<ChargeHandles>,
}

impl Spell {
	/// The cast through an echo. Returns when the last echo has faded.
	fn release_burst(em: &mut Emitter<'_, '_>, params: &Table, at: f64, strength: f32) -> f64 {
		let element = Element::from_params(params);
		let peak = (0.2 + 0.5 * level(params, "power")) * strength.clamp(0.2, 1.0);

		let mix = em.gain(1.0, Schedule::starting_at(at));
		let dry_end = element.cast(em, at, peak, mix);

		em.stop_at(mix, dry_end);
		em.to_bus(mix);

		// Feedback 0.35 falls below the floor in about seven repeats.
		let tail = 7.0 * ECHO_TIME as f64;
		let schedule = Schedule::between(at, dry_end + tail);

		let echo = em.delay(1.0, ECHO_TIME, ECHO_FEEDBACK, schedule);
		let echo_gain = em.gain(0.4, schedule);
		let echo_end = match em.param(echo_gain, ParamKind::Gain) {
			Some(param) => release_to_floor(param, dry_end, tail),
			None => dry_end + tail,
		};

		em.chain(&[mix, echo, echo_gain]);
		em.to_bus(echo_gain);

		dry_end.max(echo_end)
	}
}

impl SoundRecipe for Spell {
	fn begin(&mut self, em: &mut Emitter<'_, '_>, params: &Table) -> Option<f64> {
		let charge = Element::from_params(params).charge(charge_level(params), charge_time(params));
		let now = em.now();
		self.charge = Some(charge.start(em, now));

		None
	}

	/// A full charge and cast back to back.
	fn burst(&mut self, em: &mut Emitter<'_, '_>, params: &Table) -> f64 {
		let charge = Element::from_params(params).charge(charge_level(params), charge_time(params));
		let now = em.now();

		let handles = charge.start(em, now);
		let cast_at = handles.full_at;
		let fade_end = handles.release_fade(em.graph(), cast_at, CHARGE_FADE);
		em.extend_end(fade_end);

		let jitter = pick(em.rng(), (0.0, 0.02));
		Spell::release_burst(em, params, cast_at + jitter, 1.0).max(fade_end)
	}

	/// A new power level is reached no sooner than the charge would have been full anyway.
	fn retune(&mut self, graph: &mut NodeGraph, now: f64, params: &Table) {
		let Some(charge) = self.charge.as_ref() else { return };

		let level = Element::from_params(params).charge(charge_level(params), charge_time(params)).level;
		let ramp = (charge.full_at - now).max(0.2);
		charge.set_level(graph, level, now, ramp);
	}

	/// Casting a half charged spell gives a weaker cast.
	fn release(&mut self, em: &mut Emitter<'_, '_>, params: &Table) -> Option<f64> {
		let charge = self.charge.take()?;
		let now = em.now();

		let strength = charge.progress(now);
		let fade_end = charge.release_fade(em.graph(), now, CHARGE_FADE);
		em.extend_end(fade_end);

		Some(Spell::release_burst(em, params, now, strength).max(fade_end))
	}

	fn end(&mut self) {
		self.charge = None;
	}
}



#[cfg(test)]
mod test {
	use super::*;
	use crate::sound::emit::test::{test_engine, emit_with};

	#[test]
	fn charge_time_follows_charge() {
		assert_eq!(charge_time(&defaults().with("charge", 0.0)), 0.4);
		assert_eq!(charge_time(&defaults().with("charge", 4.0)), 2.0);
	}

	#[test]
	fn release_without_charge_does_nothing() {
		let engine = test_engine();
		let mut spell = Spell::default();

		let (released, registry) = emit_with(&engine, 1, |em| spell.release(em, &defaults()));
		assert_eq!(released, None);
		assert!(registry.is_empty());
	}

	#[test]
	fn every_element_charges_and_casts() {
		let engine = test_engine();

		for &element in CHOICES[0].1 {
			let params = defaults().with("power", 3.0).with("element", element);
			let mut spell = Spell::default();

			let (delay, _) = emit_with(&engine, 4, |em| spell.begin(em, &params));
			assert_eq!(delay, None);
			assert!(spell.charge.is_some());

			engine.render(16000 / 2);

			let (released, _) = emit_with(&engine, 4, |em| spell.release(em, &params));
			let end = released.unwrap();
			let now = engine.current_time();

			assert!(end > now + ECHO_TIME as f64, "{element}");
			assert!(spell.charge.is_none());

			engine.render(16000 * 5);
			assert_eq!(engine.active_node_count(), 0, "{element}");
		}
	}

	#[test]
	fn retune_scales_shimmer_with_level() {
		let engine = test_engine();
		let params = defaults().with("power", 4.0).with("element", "arcane");
		let mut spell = Spell::default();

		emit_with(&engine, 2, |em| spell.begin(em, &params));
		let gain = spell.charge.as_ref().unwrap().gain;

		let weaker = params.clone().with("power", 1.0);
		engine.update_graph(|ctx| spell.retune(ctx.graph, ctx.now, &weaker));
		engine.render(16000 * 3);

		let (level, depth) = engine.update_graph(|ctx| {
			let param = ctx.graph.param(gain, ParamKind::Gain).unwrap();
			let depth = param.modulators()[0].depth * param.modulation_depth_at(ctx.now);
			(param.automation_value_at(ctx.now), depth)
		});

		assert!((level - charge_level(&weaker)).abs() < 1.0e-5);
		assert!((depth - charge_level(&weaker) * 0.3).abs() < 1.0e-5);
	}
}
