use crate::prelude::*;
use crate::audio::system::EvaluationContext;
use crate::audio::intermediate_buffer::{IntermediateBuffer, sum_mono};
use crate::audio::param::AudioParam;

use std::ops::Range;

pub mod oscillator_node;
pub mod buffer_source_node;
pub mod filter_node;
pub mod delay_node;
pub mod convolver_node;
pub mod analyser_node;

pub use oscillator_node::OscillatorNode;
pub use buffer_source_node::BufferSourceNode;
pub use filter_node::{FilterNode, FilterKind};
pub use delay_node::DelayNode;
pub use convolver_node::ConvolverNode;
pub use analyser_node::{AnalyserNode, AnalyserTap};


#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NodeType {
	Source,
	Effect,
}

/// Names the automatable parameters a node may expose.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ParamKind {
	Gain,
	Frequency,
	Detune,
	Q,
	DelayTime,
	Feedback,
	Pan,
}


pub trait Node: 'static + Send + Sync {
	fn has_stereo_output(&self, _: &EvaluationContext) -> bool { false }
	fn node_type(&self, _: &EvaluationContext) -> NodeType { NodeType::Effect }
	fn finished_playing(&self, _: &EvaluationContext) -> bool { false }

	fn param(&self, _: ParamKind) -> Option<&AudioParam> { None }
	fn param_mut(&mut self, _: ParamKind) -> Option<&mut AudioParam> { None }

	fn process(&mut self, _: ProcessContext<'_>);
}


pub struct ProcessContext<'ctx> {
	pub eval_ctx: &'ctx EvaluationContext,
	pub inputs: &'ctx [&'ctx IntermediateBuffer],
	pub output: &'ctx mut IntermediateBuffer,

	/// Sample clock time of the first frame in the block.
	pub block_time: f64,

	/// Frames of this block that fall inside the node's [start, stop) window.
	/// Output outside this range is discarded.
	pub active_frames: Range<usize>,
}




pub struct MixerNode {
	gain: AudioParam,
	stereo: bool,

	gain_buffer: Vec<f32>,
}


impl MixerNode {
	pub fn new(gain: f32) -> MixerNode {
		MixerNode { gain: AudioParam::new(gain), stereo: false, gain_buffer: Vec::new() }
	}

	pub fn new_stereo(gain: f32) -> MixerNode {
		MixerNode { stereo: true, ..MixerNode::new(gain) }
	}
}

impl Node for MixerNode {
	fn has_stereo_output(&self, _: &EvaluationContext) -> bool { self.stereo }

	fn param(&self, kind: ParamKind) -> Option<&AudioParam> {
		(kind == ParamKind::Gain).then_some(&self.gain)
	}

	fn param_mut(&mut self, kind: ParamKind) -> Option<&mut AudioParam> {
		(kind == ParamKind::Gain).then_some(&mut self.gain)
	}

	fn process(&mut self, ProcessContext{eval_ctx, inputs, output, block_time, ..}: ProcessContext<'_>) {
		assert!(output.stereo() == self.stereo);

		let frames = output.frames();
		self.gain_buffer.resize(frames, 0.0);
		self.gain.fill(block_time, eval_ctx.sample_dt as f64, &mut self.gain_buffer);

		output.fill(0.0);

		if self.stereo {
			for input in inputs {
				for (frame, (out, &gain)) in output.chunks_exact_mut(2).zip(&self.gain_buffer).enumerate() {
					let [in_l, in_r] = input.stereo_sample(frame);
					out[0] += in_l * gain;
					out[1] += in_r * gain;
				}
			}
		} else {
			for input in inputs {
				assert!(!input.stereo(), "Trying to mix stereo signal with mono MixerNode");

				for ((out_sample, &in_sample), &gain) in output.iter_mut().zip(input.iter()).zip(&self.gain_buffer) {
					*out_sample += in_sample * gain;
				}
			}
		}
	}
}




/// Mono amplifier. Stereo inputs are folded down.
pub struct GainNode {
	gain: AudioParam,
	gain_buffer: Vec<f32>,
}

impl GainNode {
	pub fn new(gain: f32) -> GainNode {
		GainNode {
			gain: AudioParam::new(gain),
			gain_buffer: Vec::new(),
		}
	}

	pub fn with_param(gain: AudioParam) -> GainNode {
		GainNode { gain, gain_buffer: Vec::new() }
	}
}

impl Node for GainNode {
	fn param(&self, kind: ParamKind) -> Option<&AudioParam> {
		(kind == ParamKind::Gain).then_some(&self.gain)
	}

	fn param_mut(&mut self, kind: ParamKind) -> Option<&mut AudioParam> {
		(kind == ParamKind::Gain).then_some(&mut self.gain)
	}

	fn process(&mut self, ProcessContext{eval_ctx, inputs, output, block_time, ..}: ProcessContext<'_>) {
		let frames = output.frames();
		self.gain_buffer.resize(frames, 0.0);
		self.gain.fill(block_time, eval_ctx.sample_dt as f64, &mut self.gain_buffer);

		for (frame, (out_sample, &gain)) in output.iter_mut().zip(&self.gain_buffer).enumerate() {
			*out_sample = sum_mono(inputs, frame) * gain;
		}
	}
}




/// Equal power mono to stereo panner.
pub struct PannerNode {
	pan: AudioParam,
	pan_buffer: Vec<f32>,
}

impl PannerNode {
	pub fn new(pan: f32) -> PannerNode {
		PannerNode {
			pan: AudioParam::new(pan.clamp(-1.0, 1.0)).with_range(-1.0, 1.0),
			pan_buffer: Vec::new(),
		}
	}
}

impl Node for PannerNode {
	fn has_stereo_output(&self, _: &EvaluationContext) -> bool { true }

	fn param(&self, kind: ParamKind) -> Option<&AudioParam> {
		(kind == ParamKind::Pan).then_some(&self.pan)
	}

	fn param_mut(&mut self, kind: ParamKind) -> Option<&mut AudioParam> {
		(kind == ParamKind::Pan).then_some(&mut self.pan)
	}

	fn process(&mut self, ProcessContext{eval_ctx, inputs, output, block_time, ..}: ProcessContext<'_>) {
		assert!(output.stereo());

		let frames = output.frames();
		self.pan_buffer.resize(frames, 0.0);
		self.pan.fill(block_time, eval_ctx.sample_dt as f64, &mut self.pan_buffer);

		for (frame, (out, &pan)) in output.chunks_exact_mut(2).zip(&self.pan_buffer).enumerate() {
			let angle = (pan + 1.0) * PI / 4.0;
			let in_sample = sum_mono(inputs, frame);

			out[0] = in_sample * angle.cos();
			out[1] = in_sample * angle.sin();
		}
	}
}




#[cfg(test)]
pub(crate) mod test {
	use super::*;

	pub(crate) fn eval_ctx() -> EvaluationContext {
		EvaluationContext::new(1000.0)
	}

	pub(crate) fn buffer(samples: &[f32], stereo: bool) -> IntermediateBuffer {
		let mut buffer = IntermediateBuffer::new();
		buffer.reformat(samples.len() / if stereo { 2 } else { 1 }, stereo);
		buffer.copy_from_slice(samples);
		buffer
	}

	pub(crate) fn run(node: &mut dyn Node, inputs: &[&IntermediateBuffer], frames: usize, block_time: f64) -> IntermediateBuffer {
		let eval_ctx = eval_ctx();
		let mut output = IntermediateBuffer::new();
		output.reformat(frames, node.has_stereo_output(&eval_ctx));

		node.process(ProcessContext {
			eval_ctx: &eval_ctx,
			inputs,
			output: &mut output,
			block_time,
			active_frames: 0..frames,
		});

		output
	}

	#[test]
	fn stereo_mixer_sums_and_upmixes() {
		let mono = buffer(&[1.0, 0.5], false);
		let stereo = buffer(&[0.25, 0.0, 0.0, 0.25], true);

		let mut mixer = MixerNode::new_stereo(2.0);
		let output = run(&mut mixer, &[&mono, &stereo], 2, 0.0);

		assert_eq!(&output[..], &[2.5, 2.0, 1.0, 1.5]);
	}

	#[test]
	fn gain_follows_automation() {
		let input = buffer(&[1.0; 4], false);

		let mut gain = GainNode::new(0.0);
		gain.param_mut(ParamKind::Gain).unwrap()
			.set_value_at_time(0.5, 0.002);

		let output = run(&mut gain, &[&input], 4, 0.0);
		assert_eq!(&output[..], &[0.0, 0.0, 0.5, 0.5]);
	}

	#[test]
	fn centred_pan_is_equal_power() {
		let input = buffer(&[1.0], false);
		let mut panner = PannerNode::new(0.0);
		let output = run(&mut panner, &[&input], 1, 0.0);

		assert!((output[0] - output[1]).abs() < 1.0e-6);
		assert!((output[0]*output[0] + output[1]*output[1] - 1.0).abs() < 1.0e-5);
	}

	#[test]
	fn hard_pan_left() {
		let input = buffer(&[1.0], false);
		let mut panner = PannerNode::new(-1.0);
		let output = run(&mut panner, &[&input], 1, 0.0);

		assert!((output[0] - 1.0).abs() < 1.0e-6);
		assert!(output[1].abs() < 1.0e-6);
	}
}
