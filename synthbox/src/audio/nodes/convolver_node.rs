use crate::audio::nodes::{Node, ProcessContext};
use crate::audio::intermediate_buffer::sum_mono;
use crate::audio::system::SampleBuffer;

use rustfft::{Fft, FftPlanner, num_complex::Complex};

use std::collections::VecDeque;
use std::sync::Arc;


/// Mono convolution reverb.
///
/// Uses uniformly partitioned overlap-save: the impulse response is cut into block sized partitions,
/// each transformed once up front, and every block of input is convolved against all of them via a
/// frequency domain delay line. Latency is zero; cost per block is one FFT pair plus one complex
/// multiply-accumulate per partition.
pub struct ConvolverNode {
	impulse: SampleBuffer,
	state: Option<ConvolverState>,
}

struct ConvolverState {
	block_size: usize,

	forward: Arc<dyn Fft<f32>>,
	inverse: Arc<dyn Fft<f32>>,

	/// Spectrum of each impulse partition.
	partitions: Vec<Vec<Complex<f32>>>,

	/// Spectra of recent input blocks, newest first.
	delay_line: VecDeque<Vec<Complex<f32>>>,

	previous_input: Vec<f32>,
	accumulator: Vec<Complex<f32>>,
}

impl ConvolverNode {
	pub fn new(impulse: SampleBuffer) -> ConvolverNode {
		ConvolverNode {
			impulse,
			state: None,
		}
	}
}

impl ConvolverState {
	fn new(impulse: &[f32], block_size: usize) -> ConvolverState {
		let fft_size = 2 * block_size;

		let mut planner = FftPlanner::<f32>::new();
		let forward = planner.plan_fft_forward(fft_size);
		let inverse = planner.plan_fft_inverse(fft_size);

		let partitions: Vec<_> = impulse.chunks(block_size)
			.map(|partition| {
				let mut spectrum = vec![Complex::default(); fft_size];
				for (bin, &sample) in spectrum.iter_mut().zip(partition) {
					*bin = Complex::new(sample, 0.0);
				}

				forward.process(&mut spectrum);
				spectrum
			})
			.collect();

		let delay_line = std::iter::repeat_with(|| vec![Complex::default(); fft_size])
			.take(partitions.len())
			.collect();

		log::debug!("Convolver: {} partitions of {block_size} frames", partitions.len());

		ConvolverState {
			block_size,
			forward,
			inverse,
			partitions,
			delay_line,
			previous_input: vec![0.0; block_size],
			accumulator: vec![Complex::default(); fft_size],
		}
	}

	fn process_block(&mut self, input: &[f32], output: &mut [f32]) {
		let block_size = self.block_size;

		// Recycle the oldest spectrum as storage for the newest.
		let Some(mut spectrum) = self.delay_line.pop_back() else {
			output.fill(0.0);
			return
		};

		for (bin, &sample) in spectrum.iter_mut().zip(self.previous_input.iter().chain(input)) {
			*bin = Complex::new(sample, 0.0);
		}

		self.forward.process(&mut spectrum);
		self.delay_line.push_front(spectrum);
		self.previous_input.copy_from_slice(input);

		self.accumulator.fill(Complex::default());
		for (input_spectrum, partition) in self.delay_line.iter().zip(&self.partitions) {
			for ((acc, &x), &h) in self.accumulator.iter_mut().zip(input_spectrum).zip(partition) {
				*acc += x * h;
			}
		}

		self.inverse.process(&mut self.accumulator);

		// Only the second half is free of circular wraparound. rustfft doesn't normalise.
		let scale = 1.0 / (2 * block_size) as f32;
		for (out, bin) in output.iter_mut().zip(&self.accumulator[block_size..]) {
			*out = bin.re * scale;
		}
	}
}

impl Node for ConvolverNode {
	fn process(&mut self, ProcessContext{inputs, output, ..}: ProcessContext<'_>) {
		let block_size = output.frames();
		if block_size == 0 {
			return
		}

		if self.state.as_ref().map(|state| state.block_size) != Some(block_size) {
			self.state = Some(ConvolverState::new(&self.impulse, block_size));
		}

		let input: Vec<f32> = (0..block_size).map(|frame| sum_mono(inputs, frame)).collect();

		if let Some(state) = &mut self.state {
			state.process_block(&input, output);
		}
	}
}



#[cfg(test)]
mod test {
	use super::*;
	use crate::audio::nodes::test::{run, buffer};

	fn direct_convolution(input: &[f32], impulse: &[f32]) -> Vec<f32> {
		(0..input.len())
			.map(|n| {
				(0..impulse.len())
					.filter(|&k| k <= n)
					.map(|k| impulse[k] * input[n - k])
					.sum()
			})
			.collect()
	}

	#[test]
	fn unit_impulse_reproduces_impulse_response() {
		let impulse: Vec<f32> = (0..20).map(|i| 1.0 / (i + 1) as f32).collect();
		let mut convolver = ConvolverNode::new(SampleBuffer::from(impulse.clone()));

		let mut first = vec![0.0; 8];
		first[0] = 1.0;
		let silence = vec![0.0; 8];

		let mut response = Vec::new();
		for block in [&first, &silence, &silence] {
			let input = buffer(block, false);
			response.extend_from_slice(&run(&mut convolver, &[&input], 8, 0.0));
		}

		for (sample, expected) in response.iter().zip(impulse.iter()) {
			assert!((sample - expected).abs() < 1.0e-4, "{sample} != {expected}");
		}

		assert!(response[20..].iter().all(|s| s.abs() < 1.0e-4));
	}

	#[test]
	fn matches_direct_convolution_across_blocks() {
		let impulse = vec![0.5, -0.25, 0.125, 0.0, 0.1, 0.0, 0.0, 0.3, -0.2];
		let input: Vec<f32> = (0..32).map(|i| ((i * 7) % 5) as f32 - 2.0).collect();
		let expected = direct_convolution(&input, &impulse);

		let mut convolver = ConvolverNode::new(SampleBuffer::from(impulse));

		let mut output = Vec::new();
		for block in input.chunks(4) {
			let block = buffer(block, false);
			output.extend_from_slice(&run(&mut convolver, &[&block], 4, 0.0));
		}

		for (sample, expected) in output.iter().zip(&expected) {
			assert!((sample - expected).abs() < 1.0e-3, "{sample} != {expected}");
		}
	}
}
