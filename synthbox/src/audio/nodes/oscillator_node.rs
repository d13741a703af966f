use crate::audio::nodes::{Node, NodeType, ParamKind, ProcessContext};
use crate::audio::system::EvaluationContext;
use crate::audio::param::AudioParam;
use crate::audio::waveform::Waveform;
use crate::audio::util::cents_to_ratio;


pub struct OscillatorNode {
	waveform: Waveform,
	frequency: AudioParam,
	detune: AudioParam,

	phase: f32,

	frequency_buffer: Vec<f32>,
	detune_buffer: Vec<f32>,
}

impl OscillatorNode {
	pub fn new(waveform: Waveform, frequency: f32) -> OscillatorNode {
		OscillatorNode {
			waveform,
			frequency: AudioParam::new(frequency).with_range(0.0, 24000.0),
			detune: AudioParam::new(0.0),
			phase: 0.0,
			frequency_buffer: Vec::new(),
			detune_buffer: Vec::new(),
		}
	}

	pub fn sine(frequency: f32) -> OscillatorNode {
		OscillatorNode::new(Waveform::Sine, frequency)
	}
}

impl Node for OscillatorNode {
	fn node_type(&self, _: &EvaluationContext) -> NodeType { NodeType::Source }

	fn param(&self, kind: ParamKind) -> Option<&AudioParam> {
		match kind {
			ParamKind::Frequency => Some(&self.frequency),
			ParamKind::Detune => Some(&self.detune),
			_ => None,
		}
	}

	fn param_mut(&mut self, kind: ParamKind) -> Option<&mut AudioParam> {
		match kind {
			ParamKind::Frequency => Some(&mut self.frequency),
			ParamKind::Detune => Some(&mut self.detune),
			_ => None,
		}
	}

	fn process(&mut self, ProcessContext{eval_ctx, output, block_time, active_frames, ..}: ProcessContext<'_>) {
		let frames = output.frames();
		let sample_dt = eval_ctx.sample_dt as f64;

		self.frequency_buffer.resize(frames, 0.0);
		self.detune_buffer.resize(frames, 0.0);
		self.frequency.fill(block_time, sample_dt, &mut self.frequency_buffer);
		self.detune.fill(block_time, sample_dt, &mut self.detune_buffer);

		// Phase only advances while playing, so every note starts at phase zero.
		for frame in active_frames {
			output[frame] = self.waveform.eval(self.phase);

			let frequency = self.frequency_buffer[frame] * cents_to_ratio(self.detune_buffer[frame]);
			self.phase = (self.phase + frequency * eval_ctx.sample_dt).fract();
		}
	}
}
