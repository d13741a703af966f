use crate::prelude::*;
use crate::audio::{GraphContext, NodeGraph, NodeId, Schedule, ParamKind, AudioParam, Envelope, SampleBuffer};
use crate::audio::nodes::{OscillatorNode, BufferSourceNode, GainNode, FilterNode, FilterKind, DelayNode, ConvolverNode, PannerNode, Node};
use crate::audio::waveform::{Waveform, random_offset};
use crate::sound::registry::NodeRegistry;


/// Shortest lifetime a finite node is given.
pub const MIN_NODE_DURATION: f64 = 0.001;


/// Builds the nodes of one emission. Every node created through an `Emitter` is registered with the
/// owning generator, and the latest stop time handed out is tracked so callers know when the emission ends.
pub struct Emitter<'a, 'g> {
	ctx: &'a mut GraphContext<'g>,
	registry: &'a mut NodeRegistry,
	rng: &'a mut SmallRng,
	bus: NodeId,

	end_time: f64,
	nodes_created: usize,
}

impl<'a, 'g> Emitter<'a, 'g> {
	pub fn new(ctx: &'a mut GraphContext<'g>, registry: &'a mut NodeRegistry, rng: &'a mut SmallRng, bus: NodeId) -> Self {
		let end_time = ctx.now;

		Emitter {
			ctx,
			registry,
			rng,
			bus,

			end_time,
			nodes_created: 0,
		}
	}

	/// Sample clock time the emission is being built at.
	pub fn now(&self) -> f64 {
		self.ctx.now
	}

	pub fn sample_rate(&self) -> f32 {
		self.ctx.sample_rate
	}

	pub fn is_busy(&self) -> bool {
		self.ctx.is_busy()
	}

	pub fn rng(&mut self) -> &mut SmallRng {
		&mut *self.rng
	}

	pub fn graph(&mut self) -> &mut NodeGraph {
		&mut *self.ctx.graph
	}

	pub fn bus(&self) -> NodeId {
		self.bus
	}

	/// Latest stop time of any node created so far. Held nodes don't count.
	pub fn end_time(&self) -> f64 {
		self.end_time
	}

	pub fn nodes_created(&self) -> usize {
		self.nodes_created
	}

	pub fn extend_end(&mut self, time: f64) {
		self.end_time = self.end_time.max(time);
	}

	/// Uniform jitter: `value * [1 - spread, 1 + spread]`.
	pub fn jitter(&mut self, value: f32, spread: f32) -> f32 {
		let spread = spread.abs().min(0.99);
		if spread == 0.0 {
			return value
		}

		value * self.rng.gen_range(1.0 - spread ..= 1.0 + spread)
	}

	pub fn add(&mut self, node: impl Node, schedule: Schedule) -> NodeId {
		let schedule = match schedule.stop {
			Some(stop) if stop < schedule.start + MIN_NODE_DURATION => {
				log::warn!("Node scheduled with non-positive duration ({} -> {stop}), extending", schedule.start);
				Schedule::between(schedule.start, schedule.start + MIN_NODE_DURATION)
			}

			_ => schedule,
		};

		if let Some(stop) = schedule.stop {
			self.extend_end(stop);
		}

		let id = self.ctx.graph.add_node(node, schedule);
		self.registry.insert(id);
		self.nodes_created += 1;
		id
	}

	pub fn oscillator(&mut self, waveform: Waveform, frequency: f32, schedule: Schedule) -> NodeId {
		self.add(OscillatorNode::new(waveform, frequency.max(0.0)), schedule)
	}

	/// Looping source over the pooled noise buffer, starting at a random offset.
	pub fn noise(&mut self, schedule: Schedule) -> NodeId {
		let buffer = self.ctx.noise();
		let offset = random_offset(&mut *self.rng, buffer.len());
		self.add(BufferSourceNode::looping(buffer, offset), schedule)
	}

	/// One-shot playback of `buffer`.
	pub fn buffer(&mut self, buffer: SampleBuffer, start: f64) -> NodeId {
		let stop = start + buffer.len() as f64 / self.sample_rate() as f64;
		self.add(BufferSourceNode::new(buffer), Schedule::between(start, stop))
	}

	pub fn gain(&mut self, level: f32, schedule: Schedule) -> NodeId {
		self.add(GainNode::new(level), schedule)
	}

	/// A gain stage driven by `envelope` from `start`. Returns the node and the envelope's end, if it has one.
	pub fn envelope(&mut self, envelope: &impl Envelope, start: f64) -> (NodeId, Option<f64>) {
		let mut param = AudioParam::new(0.0);
		let end = envelope.apply(&mut param, start);

		let schedule = match end {
			Some(end) => Schedule::between(start, end),
			None => Schedule::starting_at(start),
		};

		(self.add(GainNode::with_param(param), schedule), end)
	}

	pub fn filter(&mut self, kind: FilterKind, frequency: f32, q: f32, schedule: Schedule) -> NodeId {
		self.add(FilterNode::new(kind, frequency, q), schedule)
	}

	pub fn delay(&mut self, max_delay: f32, delay_time: f32, feedback: f32, schedule: Schedule) -> NodeId {
		self.add(DelayNode::new(max_delay, delay_time, feedback), schedule)
	}

	pub fn convolver(&mut self, impulse: SampleBuffer, schedule: Schedule) -> NodeId {
		self.add(ConvolverNode::new(impulse), schedule)
	}

	pub fn panner(&mut self, pan: f32, schedule: Schedule) -> NodeId {
		self.add(PannerNode::new(pan), schedule)
	}

	/// Give a held node a stop time, counting it towards the emission's end.
	pub fn stop_at(&mut self, node: NodeId, stop: f64) {
		self.ctx.graph.set_stop_time(node, stop);
		self.extend_end(stop);
	}

	pub fn connect(&mut self, from: NodeId, to: NodeId) {
		self.ctx.graph.add_send(from, to);
	}

	pub fn chain(&mut self, chain: &[NodeId]) {
		self.ctx.graph.add_send_chain(chain);
	}

	pub fn to_bus(&mut self, node: NodeId) {
		self.ctx.graph.add_send(node, self.bus);
	}

	pub fn param(&mut self, node: NodeId, kind: ParamKind) -> Option<&mut AudioParam> {
		self.ctx.graph.param_mut(node, kind)
	}
}



#[cfg(test)]
pub(crate) mod test {
	use super::*;
	use crate::audio::{AudioEngine, ManualClock, AR, ENVELOPE_FLOOR};
	use crate::config::EngineConfig;

	pub(crate) fn test_engine() -> AudioEngine {
		let config = EngineConfig {
			sample_rate: 16000,
			block_size: 64,
			noise_seconds: 0.5,
			analyser_size: 256,
			..EngineConfig::default()
		};

		AudioEngine::new(config, ManualClock::new())
	}

	/// Run `f` against a fresh emitter, returning its result and the registry it filled.
	pub(crate) fn emit_with<R>(engine: &AudioEngine, seed: u64, f: impl FnOnce(&mut Emitter<'_, '_>) -> R) -> (R, NodeRegistry) {
		let bus = engine.bus().input();
		let mut registry = NodeRegistry::new();
		let mut rng = SmallRng::seed_from_u64(seed);

		let result = engine.update_graph(|ctx| {
			let mut em = Emitter::new(ctx, &mut registry, &mut rng, bus);
			f(&mut em)
		});

		(result, registry)
	}

	#[test]
	fn tracks_end_and_registers() {
		let engine = test_engine();

		let (end, registry) = emit_with(&engine, 1, |em| {
			let osc = em.oscillator(Waveform::Sine, 440.0, Schedule::between(0.0, 0.5));
			let (env, env_end) = em.envelope(&AR::percussive(0.3), 0.0);
			em.chain(&[osc, env]);
			em.to_bus(env);

			assert!(env_end.unwrap() < 0.5);
			em.end_time()
		});

		assert_eq!(end, 0.5);
		assert_eq!(registry.len(), 2);
		assert_eq!(engine.active_node_count(), 2);
	}

	#[test]
	fn zero_duration_is_extended() {
		let engine = test_engine();

		let (node, _) = emit_with(&engine, 1, |em| em.gain(1.0, Schedule::between(0.2, 0.1)));
		let schedule = engine.update_graph(|ctx| ctx.graph.schedule(node)).unwrap();

		assert!(schedule.stop.unwrap() > schedule.start);
	}

	#[test]
	fn envelope_gain_decays_to_floor() {
		let engine = test_engine();

		let (node, _) = emit_with(&engine, 1, |em| em.envelope(&AR::new(0.01, 0.2).peak(0.7), 0.0).0);
		let final_value = engine.update_graph(|ctx| ctx.graph.param(node, ParamKind::Gain).map(AudioParam::final_value));

		assert_eq!(final_value, Some(ENVELOPE_FLOOR));
	}

	#[test]
	fn noise_sources_play() {
		let engine = test_engine();

		let (_, registry) = emit_with(&engine, 7, |em| {
			let a = em.noise(Schedule::between(0.0, 0.1));
			let b = em.noise(Schedule::between(0.0, 0.1));
			em.to_bus(a);
			em.to_bus(b);
		});

		assert_eq!(registry.len(), 2);

		let output = engine.render(64);
		assert!(output.iter().any(|&s| s != 0.0));
	}
}
