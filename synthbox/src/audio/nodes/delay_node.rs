use crate::audio::nodes::{Node, ParamKind, ProcessContext};
use crate::audio::intermediate_buffer::sum_mono;
use crate::audio::param::AudioParam;


/// Feedback can't reach unity or the line would never decay.
const MAX_FEEDBACK: f32 = 0.95;


/// Mono delay line with internal feedback. Outputs only the delayed (wet) signal.
///
/// Feedback is kept inside the node so the node graph stays acyclic.
pub struct DelayNode {
	delay_time: AudioParam,
	feedback: AudioParam,
	max_delay: f32,

	line: Vec<f32>,
	write_position: usize,
}

impl DelayNode {
	pub fn new(max_delay: f32, delay_time: f32, feedback: f32) -> DelayNode {
		DelayNode {
			delay_time: AudioParam::new(delay_time).with_range(0.0, max_delay),
			feedback: AudioParam::new(feedback).with_range(0.0, MAX_FEEDBACK),
			max_delay,

			line: Vec::new(),
			write_position: 0,
		}
	}

	fn ensure_line(&mut self, sample_rate: f32) {
		let len = (self.max_delay * sample_rate).ceil() as usize + 2;
		if self.line.len() != len {
			self.line = vec![0.0; len];
			self.write_position = 0;
		}
	}

	fn read(&self, delay_frames: f32) -> f32 {
		let len = self.line.len();
		let position = self.write_position as f32 - delay_frames;
		let position = position.rem_euclid(len as f32);

		let index = position.floor() as usize % len;
		let next = (index + 1) % len;
		let t = position.fract();

		self.line[index] * (1.0 - t) + self.line[next] * t
	}
}

impl Node for DelayNode {
	fn param(&self, kind: ParamKind) -> Option<&AudioParam> {
		match kind {
			ParamKind::DelayTime => Some(&self.delay_time),
			ParamKind::Feedback => Some(&self.feedback),
			_ => None,
		}
	}

	fn param_mut(&mut self, kind: ParamKind) -> Option<&mut AudioParam> {
		match kind {
			ParamKind::DelayTime => Some(&mut self.delay_time),
			ParamKind::Feedback => Some(&mut self.feedback),
			_ => None,
		}
	}

	fn process(&mut self, ProcessContext{eval_ctx, inputs, output, block_time, ..}: ProcessContext<'_>) {
		self.ensure_line(eval_ctx.sample_rate);

		let max_frames = (self.line.len() - 2) as f32;

		for frame in 0..output.frames() {
			let time = block_time + frame as f64 * eval_ctx.sample_dt as f64;
			let delay_frames = (self.delay_time.value_at(time) * eval_ctx.sample_rate).clamp(1.0, max_frames);
			let feedback = self.feedback.value_at(time);

			let delayed = self.read(delay_frames);
			self.line[self.write_position] = sum_mono(inputs, frame) + delayed * feedback;
			self.write_position = (self.write_position + 1) % self.line.len();

			output[frame] = delayed;
		}
	}
}



#[cfg(test)]
mod test {
	use super::*;
	use crate::audio::nodes::test::{run, buffer};

	#[test]
	fn impulse_echoes_with_feedback() {
		let mut impulse = vec![0.0; 32];
		impulse[0] = 1.0;
		let input = buffer(&impulse, false);

		// 5ms at 1kHz is five frames.
		let mut delay = DelayNode::new(0.1, 0.005, 0.5);
		let output = run(&mut delay, &[&input], 32, 0.0);

		assert!((output[5] - 1.0).abs() < 1.0e-5);
		assert!((output[10] - 0.5).abs() < 1.0e-5);
		assert!((output[15] - 0.25).abs() < 1.0e-5);
		assert_eq!(output[0], 0.0);
		assert_eq!(output[7], 0.0);
	}

	#[test]
	fn feedback_is_capped() {
		let delay = DelayNode::new(1.0, 0.1, 4.0);
		assert_eq!(delay.param(ParamKind::Feedback).unwrap().value_at(0.0), MAX_FEEDBACK);
	}
}
