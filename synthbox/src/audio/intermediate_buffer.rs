/// Per-node output storage for one render quantum. Stereo buffers are interleaved.
pub struct IntermediateBuffer {
	samples: Vec<f32>,
	stereo: bool,
}


impl IntermediateBuffer {
	pub(in crate::audio) fn new() -> IntermediateBuffer {
		IntermediateBuffer {
			samples: Vec::new(),
			stereo: false,
		}
	}

	pub(in crate::audio) fn reformat(&mut self, frames: usize, stereo: bool) {
		let target_size = match stereo {
			false => frames,
			true => 2*frames,
		};

		self.samples.resize(target_size, 0.0);
		self.stereo = stereo;
	}

	pub fn stereo(&self) -> bool { self.stereo }

	pub fn channels(&self) -> usize {
		if self.stereo { 2 } else { 1 }
	}

	pub fn frames(&self) -> usize {
		self.samples.len() / self.channels()
	}

	/// Mono view of frame `frame`, averaging channels for stereo buffers.
	#[inline]
	pub fn mono_sample(&self, frame: usize) -> f32 {
		match self.stereo {
			false => self.samples[frame],
			true => 0.5 * (self.samples[2*frame] + self.samples[2*frame + 1]),
		}
	}

	/// Stereo view of frame `frame`, duplicating mono buffers into both channels.
	#[inline]
	pub fn stereo_sample(&self, frame: usize) -> [f32; 2] {
		match self.stereo {
			false => [self.samples[frame]; 2],
			true => [self.samples[2*frame], self.samples[2*frame + 1]],
		}
	}

	/// Zero every frame outside `active`.
	pub(in crate::audio) fn silence_outside(&mut self, active: std::ops::Range<usize>) {
		let channels = self.channels();
		let frames = self.frames();

		self.samples[..active.start.min(frames) * channels].fill(0.0);
		self.samples[active.end.min(frames) * channels..].fill(0.0);
	}
}


impl std::ops::Deref for IntermediateBuffer {
	type Target = [f32];
	fn deref(&self) -> &[f32] { &self.samples }
}


impl std::ops::DerefMut for IntermediateBuffer {
	fn deref_mut(&mut self) -> &mut [f32] { &mut self.samples }
}



/// Sum of all inputs at `frame`, mixed to mono.
#[inline]
pub fn sum_mono(inputs: &[&IntermediateBuffer], frame: usize) -> f32 {
	inputs.iter().map(|input| input.mono_sample(frame)).sum()
}
