use crate::audio::nodes::{Node, NodeType, ProcessContext};
use crate::audio::system::{EvaluationContext, SampleBuffer};


/// Plays a shared sample buffer, optionally looping.
pub struct BufferSourceNode {
	buffer: SampleBuffer,
	position: usize,
	looping: bool,
}

impl BufferSourceNode {
	pub fn new(buffer: SampleBuffer) -> BufferSourceNode {
		BufferSourceNode {
			buffer,
			position: 0,
			looping: false,
		}
	}

	pub fn looping(buffer: SampleBuffer, offset: usize) -> BufferSourceNode {
		let position = match buffer.len() {
			0 => 0,
			len => offset % len,
		};

		BufferSourceNode {
			buffer,
			position,
			looping: true,
		}
	}
}

impl Node for BufferSourceNode {
	fn node_type(&self, _: &EvaluationContext) -> NodeType { NodeType::Source }

	fn finished_playing(&self, _: &EvaluationContext) -> bool {
		!self.looping && self.position >= self.buffer.len()
	}

	fn process(&mut self, ProcessContext{output, active_frames, ..}: ProcessContext<'_>) {
		output.fill(0.0);

		let len = self.buffer.len();
		if len == 0 {
			return
		}

		for frame in active_frames {
			if self.position >= len {
				if !self.looping {
					break
				}

				self.position = 0;
			}

			output[frame] = self.buffer[self.position];
			self.position += 1;
		}
	}
}



#[cfg(test)]
mod test {
	use super::*;
	use crate::audio::nodes::test::{run, eval_ctx};

	#[test]
	fn one_shot_finishes() {
		let mut node = BufferSourceNode::new(SampleBuffer::from(vec![1.0, 2.0, 3.0]));
		assert!(!node.finished_playing(&eval_ctx()));

		let output = run(&mut node, &[], 4, 0.0);
		assert_eq!(&output[..], &[1.0, 2.0, 3.0, 0.0]);
		assert!(node.finished_playing(&eval_ctx()));
	}

	#[test]
	fn looping_wraps_from_offset() {
		let mut node = BufferSourceNode::looping(SampleBuffer::from(vec![1.0, 2.0, 3.0]), 4);
		let output = run(&mut node, &[], 5, 0.0);

		assert_eq!(&output[..], &[2.0, 3.0, 1.0, 2.0, 3.0]);
		assert!(!node.finished_playing(&eval_ctx()));
	}
}
