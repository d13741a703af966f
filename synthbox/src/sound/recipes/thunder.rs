use crate::prelude::*;
use crate::audio::{NodeId, Schedule, SampleBuffer, ParamKind};
use crate::audio::envelope::release_to_floor;
use crate::audio::nodes::FilterKind;
use crate::audio::waveform::decaying_noise_impulse;
use crate::sound::emit::Emitter;
use crate::sound::patterns::{Cascade, NoiseImpulse, pick};
use crate::sound::recipe::{SoundRecipe, Choice, level, raw_level};
use crate::sound::schedule::{recurrence_interval, Jitter};


pub const GOVERNING: &str = "storm";
pub const CHOICES: &[Choice] = &[];

pub fn defaults() -> Table {
	params!{
		"storm" => 0.0,
		"power" => 2.0,
		"distance" => 2.0,
	}
}


/// Scale `impulse` to unit energy so the reverb's loudness doesn't depend on its length.
fn normalise(impulse: &mut [f32]) {
	let energy = impulse.iter().map(|s| s * s).sum::<f32>().sqrt();
	if energy > 0.0 {
		impulse.iter_mut().for_each(|s| *s /= energy);
	}
}

/// Fade `gain` to the floor starting at `at`. Returns when it gets there.
fn fade_out(em: &mut Emitter<'_, '_>, gain: NodeId, at: f64, fade: f64) -> f64 {
	match em.param(gain, ParamKind::Gain) {
		Some(param) => release_to_floor(param, at, fade),
		None => at + fade,
	}
}


/// A close crack followed by a low rumble, with a slapback echo and a noise reverb tail.
/// Distance delays and softens everything and eventually drops the crack altogether.
#[derive(Default)]
pub struct Thunder;

impl Thunder {
	fn strike(em: &mut Emitter<'_, '_>, params: &Table, at: f64) -> f64 {
		let power = level(params, "power");
		let distance = level(params, "distance");
		let closeness = 1.0 - distance;

		let mix = em.gain(0.6 + 0.6 * power, Schedule::starting_at(at));
		let mut dry_end = at;

		if distance < 0.9 {
			let crack = Cascade {
				peak: 0.3 + 0.5 * closeness,
				branch_probability: 0.5 + 0.3 * closeness as f64,
				max_children: 3,
				pan_spread: 0.5,
				..Cascade::new(FilterKind::HighPass, 1500.0 + 2500.0 * closeness, 0.7, 0.08 + 0.1 * power as f64)
			};

			dry_end = dry_end.max(crack.play_into(em, at, mix));
		}

		let pan = pick(em.rng(), (-0.3, 0.3));
		let rumble = NoiseImpulse::new(FilterKind::LowPass, 90.0 + 250.0 * closeness, 0.8, 2.0 + 2.5 * power as f64 + 2.0 * distance as f64)
			.attack(0.03 + 0.4 * distance as f64)
			.sweep_to(50.0)
			.peak(0.3 + 0.4 * power)
			.pan(pan);

		let rumble_at = at + 0.05 + 0.5 * distance as f64;
		dry_end = dry_end.max(rumble.play_into(em, rumble_at, mix));

		em.stop_at(mix, dry_end);
		em.to_bus(mix);

		// Slapback off distant terrain.
		let echo_time = 0.2 + 0.35 * distance;
		let echo_tail = 8.0 * echo_time as f64;
		let echo_schedule = Schedule::between(at, dry_end + echo_tail);

		let echo = em.delay(1.0, echo_time, 0.4, echo_schedule);
		let echo_gain = em.gain(0.2 + 0.3 * distance, echo_schedule);
		let echo_end = fade_out(em, echo_gain, dry_end, echo_tail);

		em.chain(&[mix, echo, echo_gain]);
		em.to_bus(echo_gain);

		// Reverb.
		let seconds = 0.8 + 1.2 * distance;
		let sample_rate = em.sample_rate();
		let mut impulse = decaying_noise_impulse(em.rng(), sample_rate, seconds, 3.0);
		normalise(&mut impulse);

		let wet_schedule = Schedule::between(at, dry_end + seconds as f64);
		let reverb = em.convolver(SampleBuffer::from(impulse), wet_schedule);
		let wet = em.gain(0.25 + 0.35 * distance, wet_schedule);
		let wet_end = fade_out(em, wet, dry_end, seconds as f64);

		em.chain(&[mix, reverb, wet]);
		em.to_bus(wet);

		dry_end.max(echo_end).max(wet_end)
	}
}

impl SoundRecipe for Thunder {
	fn begin(&mut self, _em: &mut Emitter<'_, '_>, _params: &Table) -> Option<f64> {
		Some(0.0)
	}

	fn recur(&mut self, em: &mut Emitter<'_, '_>, params: &Table) -> Option<f64> {
		let interval = recurrence_interval(25.0, 4.0, raw_level(params, "storm"), 4.0, Jitter::Uniform(0.5), em.rng());
		let at = em.now() + interval;
		Thunder::strike(em, params, at);
		Some(interval)
	}

	fn burst(&mut self, em: &mut Emitter<'_, '_>, params: &Table) -> f64 {
		let now = em.now();
		Thunder::strike(em, params, now)
	}
}
