use crate::prelude::*;
use crate::audio::node_graph::{NodeGraph, NodeId};
use crate::audio::bus::OutputBus;
use crate::audio::clock::{WallClock, SystemClock};
use crate::audio::waveform::noise_buffer;
use crate::config::EngineConfig;

use synthbox_audio::{Configuration, Provider};

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};


pub struct EvaluationContext {
	pub sample_rate: f32,
	pub sample_dt: f32,
}

impl EvaluationContext {
	pub fn new(sample_rate: f32) -> EvaluationContext {
		EvaluationContext {
			sample_rate,
			sample_dt: 1.0 / sample_rate,
		}
	}
}



/// Immutable, cheaply shared block of mono samples.
#[derive(Clone, Debug)]
pub struct SampleBuffer(Arc<[f32]>);

impl From<Vec<f32>> for SampleBuffer {
	fn from(samples: Vec<f32>) -> SampleBuffer {
		SampleBuffer(samples.into())
	}
}

impl std::ops::Deref for SampleBuffer {
	type Target = [f32];
	fn deref(&self) -> &[f32] { &self.0 }
}


pub struct Resources {
	noise_pool: HashMap<usize, SampleBuffer>,
	rng: SmallRng,
}

impl Resources {
	fn new() -> Resources {
		Resources {
			noise_pool: HashMap::new(),
			rng: SmallRng::seed_from_u64(0x5eed_0f_401ce),
		}
	}

	/// Noise buffer of `len` samples shared by every caller asking for the same length.
	pub fn shared_noise(&mut self, len: usize) -> SampleBuffer {
		let Resources { noise_pool, rng } = self;

		noise_pool.entry(len)
			.or_insert_with(|| {
				log::debug!("Generating shared noise buffer of {len} samples");
				SampleBuffer::from(noise_buffer(rng, len))
			})
			.clone()
	}

	pub fn noise_pool_len(&self) -> usize {
		self.noise_pool.len()
	}
}



/// Everything an emission needs while it builds nodes. Holding one means holding the engine lock,
/// so `now` is the same for every node created through it.
pub struct GraphContext<'a> {
	pub graph: &'a mut NodeGraph,
	pub resources: &'a mut Resources,
	pub config: &'a EngineConfig,

	/// Sample clock time.
	pub now: f64,
	pub sample_rate: f32,
}

impl GraphContext<'_> {
	/// Whether the graph has reached the configured soft node cap.
	pub fn is_busy(&self) -> bool {
		self.graph.node_count() >= self.config.max_nodes
	}

	/// The pooled noise buffer for the current sample rate.
	pub fn noise(&mut self) -> SampleBuffer {
		let len = self.config.noise_buffer_len(self.sample_rate);
		self.resources.shared_noise(len)
	}
}



struct Inner {
	node_graph: NodeGraph,
	resources: Resources,
	config: EngineConfig,
	bus: OutputBus,

	sample_rate: f32,

	/// Sample clock time at the last sample rate change.
	time_offset: f64,
	frames_rendered: u64,

	device_channels: usize,

	/// Rendered stereo samples not yet handed to the device.
	pending: VecDeque<f32>,
}

impl Inner {
	fn current_time(&self) -> f64 {
		self.time_offset + self.frames_rendered as f64 / self.sample_rate as f64
	}

	#[instrument(skip_all, name = "synthbox::AudioEngine::render_block")]
	fn render_block(&mut self, out: &mut Vec<f32>) {
		let block_size = self.config.block_size;
		let eval_ctx = EvaluationContext::new(self.sample_rate);
		let block_time = self.current_time();

		self.node_graph.update_topology(&eval_ctx, block_size);

		let block = self.node_graph.process(&eval_ctx, block_time);
		if block.len() == 2 * block_size {
			out.extend_from_slice(block);
		} else {
			out.extend(std::iter::repeat_n(0.0, 2 * block_size));
		}

		self.frames_rendered += block_size as u64;

		let now = self.current_time();
		self.node_graph.cleanup_finished_nodes(&eval_ctx, now);
	}
}



/// Handle to the shared render state. Cloning is cheap and every clone refers to the same graph.
///
/// Offline consumers call [`AudioEngine::render`]; realtime playback hands a clone to
/// `synthbox_audio::System::set_provider`.
#[derive(Clone)]
pub struct AudioEngine {
	inner: Arc<Mutex<Inner>>,
	clock: Arc<dyn WallClock>,
}

impl AudioEngine {
	pub fn new(config: EngineConfig, clock: impl WallClock) -> AudioEngine {
		let mut node_graph = NodeGraph::new();
		let bus = OutputBus::new(&mut node_graph, &config);
		let sample_rate = config.sample_rate as f32;

		log::info!("Audio engine created: {sample_rate}Hz, {} frame quanta, soft cap of {} nodes",
			config.block_size, config.max_nodes);

		let inner = Inner {
			node_graph,
			resources: Resources::new(),
			config,
			bus,

			sample_rate,
			time_offset: 0.0,
			frames_rendered: 0,

			device_channels: 2,
			pending: VecDeque::new(),
		};

		AudioEngine {
			inner: Arc::new(Mutex::new(inner)),
			clock: Arc::new(clock),
		}
	}

	pub fn with_system_clock(config: EngineConfig) -> AudioEngine {
		AudioEngine::new(config, SystemClock::new())
	}

	fn lock(&self) -> MutexGuard<'_, Inner> {
		self.inner.lock().unwrap_or_else(PoisonError::into_inner)
	}

	/// Sample clock time in seconds: frames rendered so far over the sample rate.
	pub fn current_time(&self) -> f64 {
		self.lock().current_time()
	}

	pub fn wall_time(&self) -> f64 {
		self.clock.now()
	}

	pub fn sample_rate(&self) -> f32 {
		self.lock().sample_rate
	}

	pub fn config(&self) -> EngineConfig {
		self.lock().config.clone()
	}

	pub fn bus(&self) -> OutputBus {
		self.lock().bus.clone()
	}

	pub fn active_node_count(&self) -> usize {
		self.lock().node_graph.node_count()
	}

	pub fn contains_node(&self, node: NodeId) -> bool {
		self.lock().node_graph.contains(node)
	}

	pub fn update_graph<F, R>(&self, f: F) -> R
		where F: FnOnce(&mut GraphContext<'_>) -> R
	{
		let mut inner = self.lock();
		let now = inner.current_time();
		let Inner { node_graph, resources, config, sample_rate, .. } = &mut *inner;

		let mut ctx = GraphContext {
			graph: node_graph,
			resources,
			config,
			now,
			sample_rate: *sample_rate,
		};

		f(&mut ctx)
	}

	/// Render at least `frames` frames of interleaved stereo, rounded up to whole quanta.
	#[instrument(skip_all, name = "synthbox::AudioEngine::render")]
	pub fn render(&self, frames: usize) -> Vec<f32> {
		let mut inner = self.lock();
		let block_size = inner.config.block_size;
		let blocks = frames.div_ceil(block_size);

		let mut output = Vec::with_capacity(2 * blocks * block_size);
		for _ in 0..blocks {
			inner.render_block(&mut output);
		}

		output
	}
}


impl Provider for AudioEngine {
	fn on_configuration_changed(&mut self, configuration: Configuration) {
		let mut inner = self.lock();
		let sample_rate = configuration.sample_rate as f32;

		if sample_rate != inner.sample_rate {
			log::info!("Audio engine sample rate changed {} -> {sample_rate}", inner.sample_rate);

			// Restart frame counting so the sample clock carries on from where it was.
			inner.time_offset = inner.current_time();
			inner.frames_rendered = 0;
			inner.sample_rate = sample_rate;
		}

		inner.device_channels = configuration.channels.max(1);
		inner.pending.clear();
	}

	fn fill_buffer(&mut self, buffer: &mut [f32]) {
		let mut inner = self.lock();
		let channels = inner.device_channels;
		let frames = buffer.len() / channels;

		let mut scratch = Vec::new();
		while inner.pending.len() < 2 * frames {
			scratch.clear();
			inner.render_block(&mut scratch);
			inner.pending.extend(scratch.iter().copied());
		}

		for frame in buffer.chunks_exact_mut(channels) {
			let left = inner.pending.pop_front().unwrap_or(0.0);
			let right = inner.pending.pop_front().unwrap_or(0.0);

			match frame {
				[mono] => *mono = 0.5 * (left + right),
				[l, r, rest @ ..] => {
					*l = left;
					*r = right;
					rest.fill(0.0);
				}
				[] => {}
			}
		}
	}
}
