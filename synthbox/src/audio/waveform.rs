use crate::prelude::*;


pub fn sine_wave(phase: f32) -> f32 {
	(phase * TAU).sin()
}

pub fn triangle_wave(phase: f32) -> f32 {
	let phase = phase.fract();
	if phase <= 0.5 {
		(phase - 0.25) * 4.0
	} else {
		(0.75 - phase) * 4.0
	}
}

pub fn saw_wave(phase: f32) -> f32 {
	phase.fract() * 2.0 - 1.0
}

pub fn square_wave(phase: f32) -> f32 {
	pulse_wave(phase, 0.5)
}

pub fn pulse_wave(phase: f32, width: f32) -> f32 {
	if phase.fract() < width { 1.0 } else { -1.0 }
}


#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Waveform {
	Sine,
	Triangle,
	Saw,
	Square,
	Pulse(f32),
}

impl Waveform {
	#[inline]
	pub fn eval(self, phase: f32) -> f32 {
		match self {
			Waveform::Sine => sine_wave(phase),
			Waveform::Triangle => triangle_wave(phase),
			Waveform::Saw => saw_wave(phase),
			Waveform::Square => square_wave(phase),
			Waveform::Pulse(width) => pulse_wave(phase, width),
		}
	}
}



/// Uniform white noise in [-1, 1].
pub fn noise_buffer(rng: &mut impl Rng, len: usize) -> Vec<f32> {
	(0..len).map(|_| rng.gen_range(-1.0..=1.0)).collect()
}

/// Pick a read position into a shared noise buffer so concurrent noise sources don't play identical samples.
pub fn random_offset(rng: &mut impl Rng, buffer_len: usize) -> usize {
	match buffer_len {
		0 => 0,
		len => rng.gen_range(0..len),
	}
}

/// Exponentially decaying stereo-agnostic noise tail, used as a reverb impulse response.
pub fn decaying_noise_impulse(rng: &mut impl Rng, sample_rate: f32, seconds: f32, decay: f32) -> Vec<f32> {
	let len = (sample_rate * seconds).max(1.0) as usize;

	(0..len)
		.map(|frame| {
			let t = frame as f32 / len as f32;
			rng.gen_range(-1.0..=1.0f32) * (1.0 - t).powf(decay)
		})
		.collect()
}




#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn waveforms_stay_in_range() {
		for waveform in [Waveform::Sine, Waveform::Triangle, Waveform::Saw, Waveform::Square, Waveform::Pulse(0.25)] {
			for step in 0..100 {
				let value = waveform.eval(step as f32 / 100.0);
				assert!((-1.0..=1.0).contains(&value), "{waveform:?} produced {value}");
			}
		}
	}

	#[test]
	fn pulse_width() {
		assert_eq!(pulse_wave(0.1, 0.25), 1.0);
		assert_eq!(pulse_wave(0.3, 0.25), -1.0);
		assert_eq!(square_wave(0.75), -1.0);
	}

	#[test]
	fn noise_is_seeded() {
		let a = noise_buffer(&mut SmallRng::seed_from_u64(7), 64);
		let b = noise_buffer(&mut SmallRng::seed_from_u64(7), 64);
		assert_eq!(a, b);
		assert!(a.iter().all(|s| (-1.0..=1.0).contains(s)));
	}

	#[test]
	fn impulse_decays() {
		let impulse = decaying_noise_impulse(&mut SmallRng::seed_from_u64(1), 1000.0, 1.0, 3.0);
		assert_eq!(impulse.len(), 1000);

		let head: f32 = impulse[..100].iter().map(|s| s.abs()).sum();
		let tail: f32 = impulse[900..].iter().map(|s| s.abs()).sum();
		assert!(head > tail);
	}
}
