use crate::audio::param::AudioParam;


/// Every finite envelope decays exponentially to this level rather than to zero.
pub const ENVELOPE_FLOOR: f32 = 0.001;

/// Rise time for percussive envelopes that should sound instant without clicking.
pub const ATTACK_TIME: f64 = 0.005;

/// Fade length used when nodes are silenced early.
pub const DECLICK_TIME: f64 = 0.03;


pub trait Envelope {
	/// Schedule this envelope onto `param` starting at sample clock time `start`.
	/// Returns the time the envelope reaches [`ENVELOPE_FLOOR`], or `None` if it holds indefinitely.
	fn apply(&self, param: &mut AudioParam, start: f64) -> Option<f64>;
}


/// Linear attack followed by an exponential release.
#[derive(Copy, Clone, Debug)]
pub struct AR {
	pub peak: f32,
	pub attack: f64,
	pub release: f64,
}

impl AR {
	pub fn new(attack: f64, release: f64) -> AR {
		AR { peak: 1.0, attack, release }
	}

	pub fn percussive(release: f64) -> AR {
		AR::new(ATTACK_TIME, release)
	}

	pub fn peak(self, peak: f32) -> AR {
		AR { peak, ..self }
	}

	pub fn duration(&self) -> f64 {
		self.attack + self.release
	}
}

impl Envelope for AR {
	fn apply(&self, param: &mut AudioParam, start: f64) -> Option<f64> {
		let peak_time = start + self.attack.max(0.0);
		let end = peak_time + self.release.max(ATTACK_TIME);

		param.set_value_at_time(0.0, start)
			.linear_ramp_to_value_at_time(self.peak.max(ENVELOPE_FLOOR), peak_time)
			.exponential_ramp_to_value_at_time(ENVELOPE_FLOOR, end);

		Some(end)
	}
}


/// Linear attack, flat sustain, exponential release.
#[derive(Copy, Clone, Debug)]
pub struct ASR {
	pub peak: f32,
	pub attack: f64,
	pub sustain: f64,
	pub release: f64,
}

impl ASR {
	pub fn new(attack: f64, sustain: f64, release: f64) -> ASR {
		ASR { peak: 1.0, attack, sustain, release }
	}

	pub fn peak(self, peak: f32) -> ASR {
		ASR { peak, ..self }
	}

	pub fn duration(&self) -> f64 {
		self.attack + self.sustain + self.release
	}
}

impl Envelope for ASR {
	fn apply(&self, param: &mut AudioParam, start: f64) -> Option<f64> {
		let peak = self.peak.max(ENVELOPE_FLOOR);
		let peak_time = start + self.attack.max(0.0);
		let release_time = peak_time + self.sustain.max(0.0);
		let end = release_time + self.release.max(ATTACK_TIME);

		param.set_value_at_time(0.0, start)
			.linear_ramp_to_value_at_time(peak, peak_time)
			.set_value_at_time(peak, release_time)
			.exponential_ramp_to_value_at_time(ENVELOPE_FLOOR, end);

		Some(end)
	}
}


/// Rise to a level and hold it until told otherwise.
#[derive(Copy, Clone, Debug)]
pub struct Plateau {
	pub level: f32,
	pub attack: f64,
}

impl Plateau {
	pub fn new(level: f32, attack: f64) -> Plateau {
		Plateau { level, attack }
	}
}

impl Envelope for Plateau {
	fn apply(&self, param: &mut AudioParam, start: f64) -> Option<f64> {
		param.set_value_at_time(0.0, start)
			.linear_ramp_to_value_at_time(self.level, start + self.attack.max(ATTACK_TIME));

		None
	}
}


/// Hold the current value at `at` then decay to the floor over `release` seconds.
/// Any modulation fades out over the same span, so the param lands on the floor itself.
/// Returns the time the floor is reached.
pub fn release_to_floor(param: &mut AudioParam, at: f64, release: f64) -> f64 {
	let end = at + release.max(ATTACK_TIME);

	param.cancel_and_hold_at_time(at)
		.exponential_ramp_to_value_at_time(ENVELOPE_FLOOR, end)
		.glide_modulation_depth(0.0, at, end);

	end
}

/// Smoothly move to `level` over `ramp` seconds starting at `at`, keeping everything scheduled before `at`.
pub fn glide_to(param: &mut AudioParam, level: f32, at: f64, ramp: f64) {
	param.cancel_and_hold_at_time(at)
		.linear_ramp_to_value_at_time(level, at + ramp.max(ATTACK_TIME));
}




#[cfg(test)]
mod test {
	use super::*;
	use crate::audio::param::Lfo;

	#[test]
	fn ar_decays_to_floor() {
		let mut param = AudioParam::new(0.0);
		let end = AR::percussive(0.2).peak(0.8).apply(&mut param, 1.0);

		assert_eq!(end, Some(1.0 + ATTACK_TIME + 0.2));
		assert_eq!(param.value_at(1.0), 0.0);
		assert!((param.value_at(1.0 + ATTACK_TIME) - 0.8).abs() < 1.0e-4);

		let final_value = param.final_value();
		assert!(final_value > 0.0 && final_value <= ENVELOPE_FLOOR);
	}

	#[test]
	fn asr_holds_before_release() {
		let mut param = AudioParam::new(0.0);
		let end = ASR::new(0.1, 0.5, 0.3).peak(0.5).apply(&mut param, 0.0);

		assert_eq!(end, Some(0.1 + 0.5 + 0.3));
		assert!((param.value_at(0.3) - 0.5).abs() < 1.0e-4);
		assert!((param.value_at(0.6) - 0.5).abs() < 1.0e-4);
		assert!(param.value_at(0.75) < 0.5);
		assert!(param.final_value() <= ENVELOPE_FLOOR);
	}

	#[test]
	fn plateau_has_no_end() {
		let mut param = AudioParam::new(0.0);
		assert_eq!(Plateau::new(0.4, 1.0).apply(&mut param, 0.0), None);
		assert!((param.value_at(5.0) - 0.4).abs() < 1.0e-4);
	}

	#[test]
	fn release_from_plateau() {
		let mut param = AudioParam::new(0.0);
		Plateau::new(0.4, 1.0).apply(&mut param, 0.0);

		let end = release_to_floor(&mut param, 2.0, 0.5);
		assert_eq!(end, 2.5);
		assert!((param.value_at(2.0) - 0.4).abs() < 1.0e-4);
		assert!(param.value_at(2.25) < 0.4);
		assert!(param.value_at(3.0) <= ENVELOPE_FLOOR);
	}

	#[test]
	fn release_silences_modulation() {
		let mut param = AudioParam::new(0.0);
		Plateau::new(0.24, 0.5).apply(&mut param, 0.0);
		param.add_modulator(Lfo::sine(0.31, 0.096));

		let end = release_to_floor(&mut param, 2.0, DECLICK_TIME);

		assert!((param.value_at(end) - ENVELOPE_FLOOR).abs() < 1.0e-6);
		assert!(param.value_at(end + 1.0).abs() <= ENVELOPE_FLOOR);
		assert!(param.value_at(end - 0.001).abs() < 0.01);
	}

	#[test]
	fn zero_peak_still_reaches_positive_floor() {
		let mut param = AudioParam::new(0.0);
		AR::percussive(0.1).peak(0.0).apply(&mut param, 0.0);
		assert!(param.final_value() > 0.0);
	}
}
