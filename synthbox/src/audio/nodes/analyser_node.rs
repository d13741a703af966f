use crate::audio::nodes::{Node, ProcessContext};
use crate::audio::system::EvaluationContext;

use rustfft::{FftPlanner, num_complex::Complex};

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};


/// Stereo pass-through that records a rolling window of its (mono summed) signal for inspection.
pub struct AnalyserNode {
	tap: AnalyserTap,
}

impl AnalyserNode {
	pub fn new(tap: AnalyserTap) -> AnalyserNode {
		AnalyserNode { tap }
	}
}

impl Node for AnalyserNode {
	fn has_stereo_output(&self, _: &EvaluationContext) -> bool { true }

	fn process(&mut self, ProcessContext{inputs, output, ..}: ProcessContext<'_>) {
		output.fill(0.0);

		for input in inputs {
			for (frame, out) in output.chunks_exact_mut(2).enumerate() {
				let [l, r] = input.stereo_sample(frame);
				out[0] += l;
				out[1] += r;
			}
		}

		let mut state = self.tap.lock();
		for frame in output.chunks_exact(2) {
			state.push(0.5 * (frame[0] + frame[1]));
		}
	}
}



/// Shared read handle onto an [`AnalyserNode`]'s recorded window.
#[derive(Clone)]
pub struct AnalyserTap {
	state: Arc<Mutex<TapState>>,
}

struct TapState {
	window: VecDeque<f32>,
	size: usize,
}

impl TapState {
	fn push(&mut self, sample: f32) {
		if self.window.len() >= self.size {
			self.window.pop_front();
		}

		self.window.push_back(sample);
	}
}

impl AnalyserTap {
	pub fn new(size: usize) -> AnalyserTap {
		let size = size.max(2);

		AnalyserTap {
			state: Arc::new(Mutex::new(TapState {
				window: std::iter::repeat_n(0.0, size).collect(),
				size,
			})),
		}
	}

	fn lock(&self) -> MutexGuard<'_, TapState> {
		self.state.lock().unwrap_or_else(PoisonError::into_inner)
	}

	pub fn size(&self) -> usize {
		self.lock().size
	}

	/// Most recent samples, oldest first.
	pub fn time_domain_data(&self) -> Vec<f32> {
		self.lock().window.iter().copied().collect()
	}

	/// Magnitude spectrum of the recorded window in decibels, `size/2` bins from DC up to just below nyquist.
	pub fn frequency_data(&self) -> Vec<f32> {
		let samples = self.time_domain_data();
		let size = samples.len();

		// Hann window to keep leakage down.
		let mut spectrum: Vec<Complex<f32>> = samples.iter()
			.enumerate()
			.map(|(index, &sample)| {
				let window = 0.5 - 0.5 * (std::f32::consts::TAU * index as f32 / size as f32).cos();
				Complex::new(sample * window, 0.0)
			})
			.collect();

		FftPlanner::<f32>::new()
			.plan_fft_forward(size)
			.process(&mut spectrum);

		let scale = 2.0 / size as f32;
		spectrum[..size/2].iter()
			.map(|bin| 20.0 * (bin.norm() * scale).max(1.0e-10).log10())
			.collect()
	}

	pub fn peak(&self) -> f32 {
		self.lock().window.iter().fold(0.0f32, |peak, sample| peak.max(sample.abs()))
	}

	pub fn rms(&self) -> f32 {
		let state = self.lock();
		let sum: f32 = state.window.iter().map(|sample| sample * sample).sum();
		(sum / state.window.len().max(1) as f32).sqrt()
	}
}



#[cfg(test)]
mod test {
	use super::*;
	use crate::audio::nodes::test::{run, buffer};

	#[test]
	fn passes_through_and_records() {
		let tap = AnalyserTap::new(4);
		let mut analyser = AnalyserNode::new(tap.clone());

		let input = buffer(&[1.0, 0.0, 0.5, 0.5], true);
		let output = run(&mut analyser, &[&input], 2, 0.0);

		assert_eq!(&output[..], &[1.0, 0.0, 0.5, 0.5]);
		assert_eq!(tap.time_domain_data(), vec![0.0, 0.0, 0.5, 0.5]);
		assert_eq!(tap.peak(), 0.5);
		assert!((tap.rms() - (0.125f32).sqrt()).abs() < 1.0e-6);
	}

	#[test]
	fn spectrum_peaks_at_tone() {
		let tap = AnalyserTap::new(256);
		let mut analyser = AnalyserNode::new(tap.clone());

		// Bin 16 of a 256 point transform.
		let tone: Vec<f32> = (0..256)
			.flat_map(|i| {
				let s = (std::f32::consts::TAU * 16.0 * i as f32 / 256.0).sin();
				[s, s]
			})
			.collect();

		let input = buffer(&tone, true);
		run(&mut analyser, &[&input], 256, 0.0);

		let spectrum = tap.frequency_data();
		assert_eq!(spectrum.len(), 128);

		let loudest = spectrum.iter()
			.enumerate()
			.max_by(|a, b| a.1.total_cmp(b.1))
			.map(|(bin, _)| bin);

		assert_eq!(loudest, Some(16));
	}
}
