use crate::audio::envelope::ENVELOPE_FLOOR;
use crate::audio::waveform::Waveform;

use smallvec::SmallVec;


#[derive(Copy, Clone, Debug, PartialEq)]
pub enum AutomationEvent {
	SetValue { time: f64, value: f32 },
	LinearRamp { time: f64, value: f32 },
	ExponentialRamp { time: f64, value: f32 },
}

impl AutomationEvent {
	pub fn time(&self) -> f64 {
		match *self {
			AutomationEvent::SetValue { time, .. }
			| AutomationEvent::LinearRamp { time, .. }
			| AutomationEvent::ExponentialRamp { time, .. } => time,
		}
	}

	pub fn value(&self) -> f32 {
		match *self {
			AutomationEvent::SetValue { value, .. }
			| AutomationEvent::LinearRamp { value, .. }
			| AutomationEvent::ExponentialRamp { value, .. } => value,
		}
	}
}



/// Low frequency oscillator summed onto an [`AudioParam`].
/// Phase is derived from absolute sample clock time, so modulation needs no per-node state.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Lfo {
	pub waveform: Waveform,
	pub frequency: f32,
	pub depth: f32,
	pub phase: f32,
}

impl Lfo {
	pub fn new(waveform: Waveform, frequency: f32, depth: f32) -> Lfo {
		Lfo { waveform, frequency, depth, phase: 0.0 }
	}

	pub fn sine(frequency: f32, depth: f32) -> Lfo {
		Lfo::new(Waveform::Sine, frequency, depth)
	}

	pub fn with_phase(self, phase: f32) -> Lfo {
		Lfo { phase, ..self }
	}

	pub fn value_at(&self, time: f64) -> f32 {
		let phase = (time * self.frequency as f64 + self.phase as f64).rem_euclid(1.0);
		self.depth * self.waveform.eval(phase as f32)
	}
}



/// Scale applied to every modulator of a param, gliding linearly from `from` at `start` to `to` at `end`.
#[derive(Copy, Clone, Debug, PartialEq)]
struct DepthGlide {
	from: f32,
	to: f32,
	start: f64,
	end: f64,
}

impl DepthGlide {
	const UNITY: DepthGlide = DepthGlide { from: 1.0, to: 1.0, start: 0.0, end: 0.0 };

	fn value_at(&self, time: f64) -> f32 {
		if time <= self.start {
			self.from
		} else if time >= self.end {
			self.to
		} else {
			let position = ((time - self.start) / (self.end - self.start)) as f32;
			self.from + (self.to - self.from) * position
		}
	}
}



/// A value that changes over sample clock time following an explicit automation timeline,
/// optionally wobbled by up to two [`Lfo`]s.
///
/// Mirrors the usual set-value/linear-ramp/exponential-ramp model: a ramp event describes how the value
/// travels from the previous event to the ramp's own (time, value).
#[derive(Clone, Debug)]
pub struct AudioParam {
	default_value: f32,
	min: f32,
	max: f32,

	events: Vec<AutomationEvent>,
	modulators: SmallVec<[Lfo; 2]>,
	modulation_depth: DepthGlide,
}

impl AudioParam {
	pub fn new(default_value: f32) -> AudioParam {
		AudioParam {
			default_value,
			min: f32::MIN,
			max: f32::MAX,
			events: Vec::new(),
			modulators: SmallVec::new(),
			modulation_depth: DepthGlide::UNITY,
		}
	}

	pub fn with_range(self, min: f32, max: f32) -> AudioParam {
		AudioParam { min, max, ..self }
	}

	pub fn default_value(&self) -> f32 {
		self.default_value
	}

	pub fn events(&self) -> &[AutomationEvent] {
		&self.events
	}

	pub fn modulators(&self) -> &[Lfo] {
		&self.modulators
	}

	/// The value the timeline settles on once every scheduled event has passed.
	pub fn final_value(&self) -> f32 {
		self.events.last()
			.map(AutomationEvent::value)
			.unwrap_or(self.default_value)
	}

	/// Time of the last scheduled event, if any.
	pub fn end_time(&self) -> Option<f64> {
		self.events.last().map(AutomationEvent::time)
	}

	pub fn set_value_at_time(&mut self, value: f32, time: f64) -> &mut Self {
		self.insert_event(AutomationEvent::SetValue { time, value });
		self
	}

	pub fn linear_ramp_to_value_at_time(&mut self, value: f32, time: f64) -> &mut Self {
		self.insert_event(AutomationEvent::LinearRamp { time, value });
		self
	}

	/// Exponential ramps can't reach or cross zero, so non-positive targets are replaced with [`ENVELOPE_FLOOR`].
	pub fn exponential_ramp_to_value_at_time(&mut self, value: f32, time: f64) -> &mut Self {
		let value = if value > 0.0 {
			value
		} else {
			log::warn!("Exponential ramp target {value} is not positive, using {ENVELOPE_FLOOR} instead");
			ENVELOPE_FLOOR
		};

		self.insert_event(AutomationEvent::ExponentialRamp { time, value });
		self
	}

	/// Remove every event scheduled at or after `time`.
	pub fn cancel_scheduled_values(&mut self, time: f64) -> &mut Self {
		self.events.retain(|event| event.time() < time);
		self
	}

	/// Freeze the timeline at whatever value it would have at `time`, discarding anything later.
	pub fn cancel_and_hold_at_time(&mut self, time: f64) -> &mut Self {
		let held_value = self.automation_value_at(time);
		self.cancel_scheduled_values(time);
		self.set_value_at_time(held_value, time)
	}

	pub fn add_modulator(&mut self, lfo: Lfo) -> &mut Self {
		if self.modulators.len() >= 2 {
			log::warn!("AudioParam already has two modulators, replacing the last");
			self.modulators.pop();
		}

		self.modulators.push(lfo);
		self
	}

	pub fn clear_modulators(&mut self) -> &mut Self {
		self.modulators.clear();
		self
	}

	/// Glide the scale applied to every modulator from its value at `at` to `scale` at `end`.
	/// Modulation before `at` is treated as already rendered.
	pub fn glide_modulation_depth(&mut self, scale: f32, at: f64, end: f64) -> &mut Self {
		self.modulation_depth = DepthGlide {
			from: self.modulation_depth.value_at(at),
			to: scale.max(0.0),
			start: at,
			end: end.max(at),
		};

		self
	}

	/// Scale applied to the modulators at `time`. 1 unless a glide has been scheduled.
	pub fn modulation_depth_at(&self, time: f64) -> f32 {
		self.modulation_depth.value_at(time)
	}

	pub fn value_at(&self, time: f64) -> f32 {
		let modulation = match self.modulators.is_empty() {
			true => 0.0,
			false => {
				let sum: f32 = self.modulators.iter()
					.map(|lfo| lfo.value_at(time))
					.sum();

				sum * self.modulation_depth.value_at(time)
			}
		};

		(self.automation_value_at(time) + modulation).clamp(self.min, self.max)
	}

	pub fn automation_value_at(&self, time: f64) -> f32 {
		// Events with time <= `time` are considered to have already happened.
		let next_idx = self.events.partition_point(|event| event.time() <= time);

		let (prev_time, prev_value) = match next_idx.checked_sub(1) {
			Some(prev_idx) => {
				let prev = &self.events[prev_idx];
				(prev.time(), prev.value())
			}

			None => (0.0, self.default_value),
		};

		let Some(&next) = self.events.get(next_idx) else {
			return prev_value
		};

		let ramp_length = next.time() - prev_time;
		let position = match ramp_length > 0.0 {
			true => ((time - prev_time) / ramp_length).clamp(0.0, 1.0) as f32,
			false => 1.0,
		};

		match next {
			AutomationEvent::SetValue { .. } => prev_value,

			AutomationEvent::LinearRamp { value, .. } => prev_value + (value - prev_value) * position,

			AutomationEvent::ExponentialRamp { value, .. } => {
				if prev_value > 0.0 && value > 0.0 {
					prev_value * (value / prev_value).powf(position)
				} else {
					prev_value
				}
			}
		}
	}

	/// Write one value per frame, starting at `start_time`.
	pub fn fill(&self, start_time: f64, sample_dt: f64, out: &mut [f32]) {
		if self.events.is_empty() && self.modulators.is_empty() {
			out.fill(self.default_value.clamp(self.min, self.max));
			return
		}

		for (frame, value) in out.iter_mut().enumerate() {
			*value = self.value_at(start_time + frame as f64 * sample_dt);
		}
	}

	fn insert_event(&mut self, event: AutomationEvent) {
		// Keep insertion order for events sharing a timestamp.
		let idx = self.events.partition_point(|existing| existing.time() <= event.time());
		self.events.insert(idx, event);
	}
}
