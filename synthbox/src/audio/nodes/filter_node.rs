use crate::audio::nodes::{Node, ParamKind, ProcessContext};
use crate::audio::intermediate_buffer::sum_mono;
use crate::audio::param::AudioParam;

use biquad::{Biquad, Coefficients, DirectForm2Transposed, ToHertz};


/// Coefficients are recalculated at most this often while parameters are automated.
const COEFFICIENT_INTERVAL: usize = 16;


#[derive(Copy, Clone, Debug, PartialEq)]
pub enum FilterKind {
	LowPass,
	HighPass,
	BandPass,
	Notch,
	AllPass,
	Peaking { gain_db: f32 },
	LowShelf { gain_db: f32 },
	HighShelf { gain_db: f32 },
}

impl FilterKind {
	fn coefficients(self, sample_rate: f32, frequency: f32, q: f32) -> Result<Coefficients<f32>, biquad::Errors> {
		let (fs, f0) = (sample_rate.hz(), frequency.hz());

		match self {
			FilterKind::LowPass => Coefficients::<f32>::from_params(biquad::Type::LowPass, fs, f0, q),
			FilterKind::HighPass => Coefficients::<f32>::from_params(biquad::Type::HighPass, fs, f0, q),
			FilterKind::BandPass => Coefficients::<f32>::from_params(biquad::Type::BandPass, fs, f0, q),
			FilterKind::Notch => Coefficients::<f32>::from_params(biquad::Type::Notch, fs, f0, q),
			FilterKind::AllPass => Coefficients::<f32>::from_params(biquad::Type::AllPass, fs, f0, q),
			FilterKind::Peaking { gain_db } => Coefficients::<f32>::from_params(biquad::Type::PeakingEQ(gain_db), fs, f0, q),
			FilterKind::LowShelf { gain_db } => Coefficients::<f32>::from_params(biquad::Type::LowShelf(gain_db), fs, f0, q),
			FilterKind::HighShelf { gain_db } => Coefficients::<f32>::from_params(biquad::Type::HighShelf(gain_db), fs, f0, q),
		}
	}
}


/// Mono biquad filter with automatable cutoff and Q.
pub struct FilterNode {
	kind: FilterKind,
	frequency: AudioParam,
	q: AudioParam,

	filter: Option<DirectForm2Transposed<f32>>,
	current: (f32, f32),
}

impl FilterNode {
	pub fn new(kind: FilterKind, frequency: f32, q: f32) -> FilterNode {
		FilterNode {
			kind,
			frequency: AudioParam::new(frequency).with_range(10.0, 22000.0),
			q: AudioParam::new(q).with_range(0.05, 100.0),
			filter: None,
			current: (0.0, 0.0),
		}
	}

	pub fn low_pass(frequency: f32) -> FilterNode {
		FilterNode::new(FilterKind::LowPass, frequency, std::f32::consts::FRAC_1_SQRT_2)
	}

	pub fn high_pass(frequency: f32) -> FilterNode {
		FilterNode::new(FilterKind::HighPass, frequency, std::f32::consts::FRAC_1_SQRT_2)
	}

	pub fn band_pass(frequency: f32, q: f32) -> FilterNode {
		FilterNode::new(FilterKind::BandPass, frequency, q)
	}

	pub fn kind(&self) -> FilterKind {
		self.kind
	}

	fn update_coefficients(&mut self, sample_rate: f32, frequency: f32, q: f32) {
		if self.filter.is_some() && self.current == (frequency, q) {
			return
		}

		// Keep well clear of nyquist, where coefficient calculation fails.
		let clamped_frequency = frequency.clamp(10.0, sample_rate * 0.45);
		let coefficients = match self.kind.coefficients(sample_rate, clamped_frequency, q) {
			Ok(coefficients) => coefficients,
			Err(err) => {
				log::warn!("Failed to calculate {:?} coefficients for {clamped_frequency}Hz Q={q}: {err:?}", self.kind);
				return
			}
		};

		match &mut self.filter {
			Some(filter) => filter.update_coefficients(coefficients),
			None => self.filter = Some(DirectForm2Transposed::<f32>::new(coefficients)),
		}

		self.current = (frequency, q);
	}
}

impl Node for FilterNode {
	fn param(&self, kind: ParamKind) -> Option<&AudioParam> {
		match kind {
			ParamKind::Frequency => Some(&self.frequency),
			ParamKind::Q => Some(&self.q),
			_ => None,
		}
	}

	fn param_mut(&mut self, kind: ParamKind) -> Option<&mut AudioParam> {
		match kind {
			ParamKind::Frequency => Some(&mut self.frequency),
			ParamKind::Q => Some(&mut self.q),
			_ => None,
		}
	}

	fn process(&mut self, ProcessContext{eval_ctx, inputs, output, block_time, ..}: ProcessContext<'_>) {
		for frame in 0..output.frames() {
			if frame % COEFFICIENT_INTERVAL == 0 {
				let time = block_time + frame as f64 * eval_ctx.sample_dt as f64;
				let frequency = self.frequency.value_at(time);
				let q = self.q.value_at(time);
				self.update_coefficients(eval_ctx.sample_rate, frequency, q);
			}

			let input = sum_mono(inputs, frame);
			output[frame] = match &mut self.filter {
				Some(filter) => filter.run(input),
				None => input,
			};
		}
	}
}



#[cfg(test)]
mod test {
	use super::*;
	use crate::audio::nodes::test::{run, buffer};

	fn energy(samples: &[f32]) -> f32 {
		samples.iter().map(|s| s * s).sum()
	}

	#[test]
	fn low_pass_attenuates_high_frequencies() {
		// Alternating samples are nyquist, which a 50Hz low pass at 1kHz should all but remove.
		let input: Vec<f32> = (0..256).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
		let input = buffer(&input, false);

		let mut filter = FilterNode::low_pass(50.0);
		let output = run(&mut filter, &[&input], 256, 0.0);

		assert!(energy(&output[128..]) < 0.01 * energy(&input[128..]));
	}

	#[test]
	fn high_pass_removes_dc() {
		let input = buffer(&[1.0; 512], false);

		let mut filter = FilterNode::high_pass(100.0);
		let output = run(&mut filter, &[&input], 512, 0.0);

		assert!(output[511].abs() < 0.01);
	}

	#[test]
	fn band_pass_impulse_response_is_finite() {
		let mut impulse = vec![0.0; 256];
		impulse[0] = 1.0;
		let input = buffer(&impulse, false);

		let mut filter = FilterNode::band_pass(100.0, 5.0);
		let output = run(&mut filter, &[&input], 256, 0.0);

		assert!(output.iter().all(|s| s.is_finite()));
		assert!(energy(&output) > 0.0);
	}
}
