//! Reusable signal graph shapes shared by the sound recipes.
//!
//! Finite patterns return the absolute sample clock time their last node stops, so the caller's cleanup
//! timer is derived from the same numbers that built the graph.

use crate::prelude::*;
use crate::audio::{NodeGraph, NodeId, Schedule, ParamKind, AudioParam, Lfo, AR, ASR, Plateau, ATTACK_TIME};
use crate::audio::envelope::{release_to_floor, glide_to};
use crate::audio::nodes::{FilterKind, GainNode};
use crate::audio::waveform::Waveform;
use crate::sound::emit::Emitter;

use rand::distributions::uniform::SampleUniform;
use smallvec::SmallVec;


/// Deepest level a [`Cascade`] reaches. The root impulse is level 1.
pub const MAX_CASCADE_DEPTH: u32 = 3;

const MIN_FREQUENCY: f32 = 20.0;
const MAX_FREQUENCY: f32 = 16000.0;


/// Uniform pick from a range given in either order.
pub fn pick<T>(rng: &mut impl Rng, (a, b): (T, T)) -> T
	where T: SampleUniform + PartialOrd + Copy
{
	if a == b {
		return a
	}

	let (low, high) = if a < b { (a, b) } else { (b, a) };
	rng.gen_range(low ..= high)
}


fn route(em: &mut Emitter<'_, '_>, node: NodeId, pan: Option<f32>, schedule: Schedule, destination: NodeId) {
	match pan {
		Some(pan) => {
			let panner = em.panner(pan, schedule);
			em.chain(&[node, panner, destination]);
		}

		None => em.connect(node, destination),
	}
}



#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Partial {
	/// Frequency relative to the fundamental.
	pub ratio: f32,
	pub weight: f32,

	/// Scales the release of this partial's envelope.
	pub decay: f32,
}

impl Partial {
	pub fn new(ratio: f32, weight: f32) -> Partial {
		Partial { ratio, weight, decay: 1.0 }
	}

	pub fn decay(self, decay: f32) -> Partial {
		Partial { decay, ..self }
	}
}


#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ToneShape {
	/// Instant rise then exponential decay.
	Struck { decay: f64 },

	/// Linear attack, hold, exponential release.
	Held { attack: f64, sustain: f64, release: f64 },
}

impl ToneShape {
	fn envelope(&self, em: &mut Emitter<'_, '_>, start: f64, peak: f32, decay_scale: f32) -> (NodeId, f64) {
		let scale = decay_scale.max(0.05) as f64;

		let (node, end) = match *self {
			ToneShape::Struck { decay } => em.envelope(&AR::percussive(decay * scale).peak(peak), start),
			ToneShape::Held { attack, sustain, release } => em.envelope(&ASR::new(attack, sustain, release * scale).peak(peak), start),
		};

		(node, end.unwrap_or(start + ATTACK_TIME))
	}
}


/// A fundamental plus weighted partials, each with its own envelope, summed through an optional
/// tremolo stage.
#[derive(Clone, Debug)]
pub struct HarmonicTone {
	pub frequency: f32,
	pub waveform: Waveform,
	pub partials: SmallVec<[Partial; 8]>,
	pub shape: ToneShape,
	pub peak: f32,

	/// Depth in cents.
	pub vibrato: Option<Lfo>,

	/// Depth is the fraction of the level removed at the trough.
	pub tremolo: Option<Lfo>,

	pub pan: Option<f32>,

	/// Each partial is detuned by a random amount up to this many cents.
	pub detune_spread: f32,
}

impl HarmonicTone {
	pub fn new(frequency: f32, shape: ToneShape) -> HarmonicTone {
		HarmonicTone {
			frequency,
			waveform: Waveform::Sine,
			partials: smallvec::smallvec![Partial::new(1.0, 1.0)],
			shape,
			peak: 0.5,
			vibrato: None,
			tremolo: None,
			pan: None,
			detune_spread: 0.0,
		}
	}

	pub fn waveform(self, waveform: Waveform) -> HarmonicTone {
		HarmonicTone { waveform, ..self }
	}

	pub fn partials(self, partials: impl IntoIterator<Item=Partial>) -> HarmonicTone {
		HarmonicTone { partials: partials.into_iter().collect(), ..self }
	}

	pub fn peak(self, peak: f32) -> HarmonicTone {
		HarmonicTone { peak, ..self }
	}

	pub fn vibrato(self, vibrato: Lfo) -> HarmonicTone {
		HarmonicTone { vibrato: Some(vibrato), ..self }
	}

	pub fn tremolo(self, tremolo: Lfo) -> HarmonicTone {
		HarmonicTone { tremolo: Some(tremolo), ..self }
	}

	pub fn pan(self, pan: f32) -> HarmonicTone {
		HarmonicTone { pan: Some(pan), ..self }
	}

	pub fn detune_spread(self, cents: f32) -> HarmonicTone {
		HarmonicTone { detune_spread: cents.abs(), ..self }
	}

	pub fn play(&self, em: &mut Emitter<'_, '_>, at: f64) -> f64 {
		let destination = em.bus();
		self.play_into(em, at, destination)
	}

	pub fn play_into(&self, em: &mut Emitter<'_, '_>, at: f64, destination: NodeId) -> f64 {
		let nyquist = em.sample_rate() * 0.45;
		let weight_sum = self.partials.iter()
			.map(|partial| partial.weight.abs())
			.sum::<f32>()
			.max(1.0);

		let mut envelopes = SmallVec::<[NodeId; 8]>::new();
		let mut end = at;

		for partial in self.partials.iter() {
			let frequency = self.frequency * partial.ratio;
			if frequency < MIN_FREQUENCY || frequency >= nyquist || partial.weight <= 0.0 {
				continue
			}

			let peak = self.peak * partial.weight / weight_sum;
			let (envelope, envelope_end) = self.shape.envelope(em, at, peak, partial.decay);
			let oscillator = em.oscillator(self.waveform, frequency, Schedule::between(at, envelope_end));

			let detune = if self.detune_spread > 0.0 {
				pick(em.rng(), (-self.detune_spread, self.detune_spread))
			} else {
				0.0
			};

			if let Some(param) = em.param(oscillator, ParamKind::Detune) {
				if detune != 0.0 {
					param.set_value_at_time(detune, at);
				}

				if let Some(vibrato) = self.vibrato {
					param.add_modulator(vibrato);
				}
			}

			em.connect(oscillator, envelope);
			envelopes.push(envelope);
			end = end.max(envelope_end);
		}

		if envelopes.is_empty() {
			log::trace!("Tone at {}Hz has no audible partials", self.frequency);
			return at
		}

		let schedule = Schedule::between(at, end);

		let mix = match self.tremolo {
			Some(tremolo) => {
				let depth = tremolo.depth.clamp(0.0, 1.0);
				let mut gain = AudioParam::new(1.0 - depth / 2.0).with_range(0.0, 1.0);
				gain.add_modulator(Lfo { depth: depth / 2.0, ..tremolo });
				em.add(GainNode::with_param(gain), schedule)
			}

			None => em.gain(1.0, schedule),
		};

		for envelope in envelopes {
			em.connect(envelope, mix);
		}

		route(em, mix, self.pan, schedule, destination);
		end
	}
}



/// Noise through a resonant filter with a fast attack and exponential decay.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct NoiseImpulse {
	pub filter: FilterKind,
	pub frequency: f32,
	pub q: f32,

	/// Filter frequency reached at the end of the decay.
	pub sweep_to: Option<f32>,

	pub peak: f32,
	pub attack: f64,
	pub decay: f64,
	pub pan: Option<f32>,
}

impl NoiseImpulse {
	pub fn new(filter: FilterKind, frequency: f32, q: f32, decay: f64) -> NoiseImpulse {
		NoiseImpulse {
			filter,
			frequency,
			q,
			sweep_to: None,
			peak: 0.5,
			attack: ATTACK_TIME,
			decay,
			pan: None,
		}
	}

	pub fn peak(self, peak: f32) -> NoiseImpulse {
		NoiseImpulse { peak, ..self }
	}

	pub fn attack(self, attack: f64) -> NoiseImpulse {
		NoiseImpulse { attack, ..self }
	}

	pub fn sweep_to(self, frequency: f32) -> NoiseImpulse {
		NoiseImpulse { sweep_to: Some(frequency), ..self }
	}

	pub fn pan(self, pan: f32) -> NoiseImpulse {
		NoiseImpulse { pan: Some(pan), ..self }
	}

	pub fn duration(&self) -> f64 {
		self.attack.max(0.0) + self.decay.max(ATTACK_TIME)
	}

	pub fn play(&self, em: &mut Emitter<'_, '_>, at: f64) -> f64 {
		let destination = em.bus();
		self.play_into(em, at, destination)
	}

	pub fn play_into(&self, em: &mut Emitter<'_, '_>, at: f64, destination: NodeId) -> f64 {
		let (envelope, end) = em.envelope(&AR::new(self.attack, self.decay).peak(self.peak), at);
		let end = end.unwrap_or(at + self.duration());
		let schedule = Schedule::between(at, end);

		let frequency = self.frequency.clamp(MIN_FREQUENCY, MAX_FREQUENCY);
		let noise = em.noise(schedule);
		let filter = em.filter(self.filter, frequency, self.q, schedule);

		if let Some(target) = self.sweep_to
			&& let Some(param) = em.param(filter, ParamKind::Frequency)
		{
			param.set_value_at_time(frequency, at)
				.exponential_ramp_to_value_at_time(target.clamp(MIN_FREQUENCY, MAX_FREQUENCY), end);
		}

		em.chain(&[noise, filter, envelope]);
		route(em, envelope, self.pan, schedule, destination);
		end
	}
}



/// One impulse of a planned [`Cascade`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CascadeStep {
	pub depth: u32,

	/// Onset relative to the root impulse.
	pub offset: f64,

	pub frequency: f32,
	pub peak: f32,
	pub decay: f64,
}

/// A root impulse that probabilistically spawns quieter, shifted children, down to [`MAX_CASCADE_DEPTH`] levels.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Cascade {
	pub filter: FilterKind,
	pub frequency: f32,
	pub q: f32,
	pub peak: f32,
	pub decay: f64,

	/// Chance of each potential child actually sounding.
	pub branch_probability: f64,
	pub max_children: u32,

	/// Child onset after its parent, in seconds.
	pub delay: (f64, f64),

	/// Child frequency relative to its parent.
	pub frequency_ratio: (f32, f32),

	/// Child amplitude relative to its parent.
	pub falloff: f32,

	/// Impulses are panned randomly within +/- this.
	pub pan_spread: f32,
}

impl Cascade {
	pub fn new(filter: FilterKind, frequency: f32, q: f32, decay: f64) -> Cascade {
		Cascade {
			filter,
			frequency,
			q,
			peak: 0.5,
			decay,

			branch_probability: 0.5,
			max_children: 2,
			delay: (0.005, 0.04),
			frequency_ratio: (0.8, 1.5),
			falloff: 0.6,
			pan_spread: 0.0,
		}
	}

	/// Lay out every impulse of one cascade. The root always comes first.
	pub fn plan(&self, rng: &mut impl Rng) -> Vec<CascadeStep> {
		let root = CascadeStep {
			depth: 1,
			offset: 0.0,
			frequency: self.frequency.clamp(MIN_FREQUENCY, MAX_FREQUENCY),
			peak: self.peak,
			decay: self.decay.max(ATTACK_TIME),
		};

		let mut steps = vec![root];
		self.branch(root, rng, &mut steps);
		steps
	}

	fn branch(&self, parent: CascadeStep, rng: &mut impl Rng, steps: &mut Vec<CascadeStep>) {
		if parent.depth >= MAX_CASCADE_DEPTH {
			return
		}

		let probability = self.branch_probability.clamp(0.0, 1.0);

		for _ in 0..self.max_children {
			if !rng.gen_bool(probability) {
				continue
			}

			let delay = pick(rng, self.delay).max(0.0);
			let ratio = pick(rng, self.frequency_ratio);

			let child = CascadeStep {
				depth: parent.depth + 1,
				offset: parent.offset + delay,
				frequency: (parent.frequency * ratio).clamp(MIN_FREQUENCY, MAX_FREQUENCY),
				peak: parent.peak * self.falloff * rng.gen_range(0.7 ..= 1.0),
				decay: (parent.decay * rng.gen_range(0.6 ..= 1.0)).max(ATTACK_TIME),
			};

			steps.push(child);
			self.branch(child, rng, steps);
		}
	}

	pub fn play(&self, em: &mut Emitter<'_, '_>, at: f64) -> f64 {
		let destination = em.bus();
		self.play_into(em, at, destination)
	}

	pub fn play_into(&self, em: &mut Emitter<'_, '_>, at: f64, destination: NodeId) -> f64 {
		let steps = self.plan(em.rng());
		let mut end = at;

		for step in steps {
			let pan = (self.pan_spread > 0.0)
				.then(|| pick(em.rng(), (-self.pan_spread, self.pan_spread)));

			let impulse = NoiseImpulse {
				pan,
				peak: step.peak,
				..NoiseImpulse::new(self.filter, step.frequency, self.q, step.decay)
			};

			end = end.max(impulse.play_into(em, at + step.offset, destination));
		}

		end
	}
}



#[derive(Copy, Clone, Debug, PartialEq)]
pub enum DroneSource {
	Noise,
	Tone { waveform: Waveform, frequency: f32 },
}

/// A held source whose cutoff and level can be wobbled by slow oscillators. Runs until released.
#[derive(Clone, Debug)]
pub struct Drone {
	pub source: DroneSource,
	pub filter: Option<FilterKind>,
	pub cutoff: f32,
	pub q: f32,
	pub cutoff_lfos: SmallVec<[Lfo; 2]>,
	pub gain_lfo: Option<Lfo>,
	pub level: f32,
	pub attack: f64,
}

impl Drone {
	pub fn new(source: DroneSource, level: f32) -> Drone {
		Drone {
			source,
			filter: None,
			cutoff: 1000.0,
			q: 0.707,
			cutoff_lfos: SmallVec::new(),
			gain_lfo: None,
			level,
			attack: 1.0,
		}
	}

	pub fn noise(level: f32) -> Drone {
		Drone::new(DroneSource::Noise, level)
	}

	pub fn filter(self, filter: FilterKind, cutoff: f32, q: f32) -> Drone {
		Drone { filter: Some(filter), cutoff, q, ..self }
	}

	pub fn modulate_cutoff(mut self, lfo: Lfo) -> Drone {
		self.cutoff_lfos.push(lfo);
		self
	}

	pub fn modulate_gain(self, lfo: Lfo) -> Drone {
		Drone { gain_lfo: Some(lfo), ..self }
	}

	pub fn attack(self, attack: f64) -> Drone {
		Drone { attack, ..self }
	}

	pub fn start(&self, em: &mut Emitter<'_, '_>, at: f64) -> DroneHandles {
		let held = Schedule::starting_at(at);

		let source = match self.source {
			DroneSource::Noise => em.noise(held),
			DroneSource::Tone { waveform, frequency } => em.oscillator(waveform, frequency, held),
		};

		let filter = self.filter.map(|kind| {
			let filter = em.filter(kind, self.cutoff.clamp(MIN_FREQUENCY, MAX_FREQUENCY), self.q, held);
			if let Some(param) = em.param(filter, ParamKind::Frequency) {
				for &lfo in self.cutoff_lfos.iter() {
					param.add_modulator(lfo);
				}
			}

			filter
		});

		let (gain, _) = em.envelope(&Plateau::new(self.level.max(0.0), self.attack), at);
		if let Some(lfo) = self.gain_lfo
			&& let Some(param) = em.param(gain, ParamKind::Gain)
		{
			param.add_modulator(lfo);
		}

		match filter {
			Some(filter) => em.chain(&[source, filter, gain]),
			None => em.connect(source, gain),
		}

		em.to_bus(gain);

		DroneHandles { source, filter, gain, level: self.level.max(0.0) }
	}
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DroneHandles {
	pub source: NodeId,
	pub filter: Option<NodeId>,
	pub gain: NodeId,

	/// Level the drone started at. Gain modulation depth is relative to it.
	pub level: f32,
}

impl DroneHandles {
	pub fn is_alive(&self, graph: &NodeGraph) -> bool {
		graph.contains(self.gain)
	}

	/// Glide the drone's level. Any gain modulation is rescaled alongside so it keeps its proportion.
	pub fn set_level(&self, graph: &mut NodeGraph, level: f32, at: f64, ramp: f64) {
		if let Some(param) = graph.param_mut(self.gain, ParamKind::Gain) {
			glide_level(param, self.level, level, at, ramp);
		}
	}

	pub fn set_cutoff(&self, graph: &mut NodeGraph, cutoff: f32, at: f64, ramp: f64) {
		if let Some(filter) = self.filter
			&& let Some(param) = graph.param_mut(filter, ParamKind::Frequency)
		{
			glide_to(param, cutoff.clamp(MIN_FREQUENCY, MAX_FREQUENCY), at, ramp);
		}
	}

	/// Only tone drones have a frequency to move.
	pub fn set_frequency(&self, graph: &mut NodeGraph, frequency: f32, at: f64, ramp: f64) {
		if let Some(param) = graph.param_mut(self.source, ParamKind::Frequency) {
			glide_to(param, frequency.max(0.0), at, ramp);
		}
	}
}



/// Glide a held gain stage to `level`, scaling its modulation by `level / started_level` over the same ramp.
fn glide_level(param: &mut AudioParam, started_level: f32, level: f32, at: f64, ramp: f64) {
	let level = level.max(0.0);
	glide_to(param, level, at, ramp);

	if started_level > 0.0 {
		param.glide_modulation_depth(level / started_level, at, at + ramp.max(ATTACK_TIME));
	}
}



/// A tone that sweeps upward and swells while charging, then holds until released.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Charge {
	pub waveform: Waveform,
	pub frequency: f32,

	/// Frequency multiplier reached when fully charged.
	pub rise: f32,

	pub level: f32,
	pub charge_time: f64,

	/// A second voice this many cents away. Zero for a single voice.
	pub detune: f32,

	pub shimmer: Option<Lfo>,
}

impl Charge {
	pub fn new(waveform: Waveform, frequency: f32, level: f32, charge_time: f64) -> Charge {
		Charge {
			waveform,
			frequency,
			rise: 2.0,
			level,
			charge_time,
			detune: 0.0,
			shimmer: None,
		}
	}

	pub fn start(&self, em: &mut Emitter<'_, '_>, at: f64) -> ChargeHandles {
		let charge_time = self.charge_time.max(ATTACK_TIME);
		let full_at = at + charge_time;
		let held = Schedule::starting_at(at);

		let frequency = self.frequency.max(MIN_FREQUENCY);
		let target = (frequency * self.rise.max(0.01)).clamp(MIN_FREQUENCY, MAX_FREQUENCY);

		let (gain, _) = em.envelope(&Plateau::new(self.level.max(0.0), charge_time), at);
		if let Some(shimmer) = self.shimmer
			&& let Some(param) = em.param(gain, ParamKind::Gain)
		{
			param.add_modulator(shimmer);
		}

		let voices = if self.detune == 0.0 { 1 } else { 2 };
		let mut sources = SmallVec::new();

		for detune in [0.0, self.detune].into_iter().take(voices) {
			let oscillator = em.oscillator(self.waveform, frequency, held);

			if let Some(param) = em.param(oscillator, ParamKind::Frequency) {
				param.set_value_at_time(frequency, at)
					.exponential_ramp_to_value_at_time(target, full_at);
			}

			if detune != 0.0
				&& let Some(param) = em.param(oscillator, ParamKind::Detune)
			{
				param.set_value_at_time(detune, at);
			}

			em.connect(oscillator, gain);
			sources.push(oscillator);
		}

		em.to_bus(gain);

		ChargeHandles {
			sources,
			gain,
			level: self.level.max(0.0),
			started: at,
			full_at,
		}
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChargeHandles {
	pub sources: SmallVec<[NodeId; 2]>,
	pub gain: NodeId,

	/// Level the charge was started towards. Shimmer depth is relative to it.
	pub level: f32,

	pub started: f64,
	pub full_at: f64,
}

impl ChargeHandles {
	/// How charged the effect is at `at`, from 0 to 1.
	pub fn progress(&self, at: f64) -> f32 {
		let span = (self.full_at - self.started).max(ATTACK_TIME);
		((at - self.started) / span).clamp(0.0, 1.0) as f32
	}

	pub fn set_level(&self, graph: &mut NodeGraph, level: f32, at: f64, ramp: f64) {
		if let Some(param) = graph.param_mut(self.gain, ParamKind::Gain) {
			glide_level(param, self.level, level, at, ramp);
		}
	}

	/// Fade the charge out from `at` and stop its nodes once silent. Returns when the fade ends.
	pub fn release_fade(&self, graph: &mut NodeGraph, at: f64, fade: f64) -> f64 {
		let end = match graph.param_mut(self.gain, ParamKind::Gain) {
			Some(param) => release_to_floor(param, at, fade),
			None => at + fade.max(ATTACK_TIME),
		};

		for &node in self.sources.iter().chain([&self.gain]) {
			graph.set_stop_time(node, end);
		}

		end
	}
}



#[cfg(test)]
mod test {
	use super::*;
	use crate::audio::{ENVELOPE_FLOOR, DECLICK_TIME};
	use crate::sound::emit::test::{test_engine, emit_with};

	#[test]
	fn harmonic_tone_ends_with_longest_partial() {
		let engine = test_engine();

		let tone = HarmonicTone::new(200.0, ToneShape::Struck { decay: 0.5 })
			.partials([Partial::new(1.0, 1.0), Partial::new(2.0, 0.5).decay(0.5), Partial::new(3.0, 0.25).decay(2.0)])
			.vibrato(Lfo::sine(5.0, 10.0))
			.tremolo(Lfo::sine(4.0, 0.5));

		let ((end, created), registry) = emit_with(&engine, 3, |em| {
			let end = tone.play(em, 0.1);
			(end, em.nodes_created())
		});

		assert!((end - (0.1 + ATTACK_TIME + 1.0)).abs() < 1.0e-9);

		// Three oscillators, three envelopes and the tremolo stage.
		assert_eq!(created, 7);
		assert_eq!(registry.len(), 7);
	}

	#[test]
	fn harmonic_tone_skips_partials_above_nyquist() {
		let engine = test_engine();

		// 16kHz test engine, so anything from 7.2kHz up is dropped.
		let tone = HarmonicTone::new(2000.0, ToneShape::Held { attack: 0.01, sustain: 0.1, release: 0.1 })
			.partials([Partial::new(1.0, 1.0), Partial::new(3.0, 1.0), Partial::new(5.0, 1.0)]);

		let (_, registry) = emit_with(&engine, 3, |em| tone.play(em, 0.0));

		// Two oscillators, two envelopes and the mix stage.
		assert_eq!(registry.len(), 5);

		let output = engine.render(1600);
		assert!(output.iter().any(|s| s.abs() > 0.05));
	}

	#[test]
	fn noise_impulse_decays_to_floor() {
		let engine = test_engine();
		let impulse = NoiseImpulse::new(FilterKind::BandPass, 2000.0, 4.0, 0.2)
			.sweep_to(500.0)
			.peak(0.8)
			.pan(-0.5);

		let (end, registry) = emit_with(&engine, 5, |em| impulse.play(em, 0.0));
		assert!((end - impulse.duration()).abs() < 1.0e-9);

		// Noise, filter, envelope and panner.
		assert_eq!(registry.len(), 4);

		let final_gains = engine.update_graph(|ctx| {
			registry.iter()
				.filter_map(|node| ctx.graph.param(node, ParamKind::Gain))
				.map(AudioParam::final_value)
				.collect::<Vec<_>>()
		});

		assert_eq!(final_gains, vec![ENVELOPE_FLOOR]);

		engine.render(16000 / 2);
		assert_eq!(engine.active_node_count(), 0);
	}

	#[test]
	fn cascade_depth_is_bounded() {
		let cascade = Cascade {
			branch_probability: 0.9,
			max_children: 3,
			..Cascade::new(FilterKind::HighPass, 3000.0, 1.0, 0.05)
		};

		for seed in 0..1000 {
			let mut rng = SmallRng::seed_from_u64(seed);
			let steps = cascade.plan(&mut rng);

			assert_eq!(steps[0].depth, 1);
			assert_eq!(steps[0].offset, 0.0);

			for step in steps.iter() {
				assert!((1..=MAX_CASCADE_DEPTH).contains(&step.depth), "seed {seed}: {step:?}");
				assert!(step.decay > 0.0);
				assert!(step.offset >= 0.0);
				assert!(step.peak <= cascade.peak);
			}

			// 1 + 3 + 9
			assert!(steps.len() <= 13);
		}
	}

	#[test]
	fn cascade_always_branches_to_full_tree() {
		let cascade = Cascade {
			branch_probability: 1.0,
			max_children: 2,
			..Cascade::new(FilterKind::BandPass, 1000.0, 2.0, 0.1)
		};

		let steps = cascade.plan(&mut SmallRng::seed_from_u64(0));
		assert_eq!(steps.len(), 7);
		assert_eq!(steps.iter().filter(|step| step.depth == MAX_CASCADE_DEPTH).count(), 4);
	}

	#[test]
	fn cascade_play_ends_after_every_impulse() {
		let engine = test_engine();
		let cascade = Cascade { branch_probability: 1.0, ..Cascade::new(FilterKind::BandPass, 1000.0, 2.0, 0.1) };

		let ((end, latest), _) = emit_with(&engine, 9, |em| {
			let end = cascade.play(em, 0.0);
			(end, em.end_time())
		});

		assert_eq!(end, latest);
		assert!(end > 0.1);
	}

	#[test]
	fn drone_holds_and_retunes() {
		let engine = test_engine();
		let drone = Drone::noise(0.5)
			.filter(FilterKind::LowPass, 800.0, 1.0)
			.modulate_cutoff(Lfo::sine(0.1, 200.0))
			.modulate_cutoff(Lfo::sine(0.37, 100.0))
			.modulate_gain(Lfo::sine(0.2, 0.1))
			.attack(0.1);

		let (handles, registry) = emit_with(&engine, 1, |em| drone.start(em, 0.0));
		assert_eq!(registry.len(), 3);

		engine.render(16000);
		assert!(engine.update_graph(|ctx| handles.is_alive(ctx.graph)));
		assert!(engine.bus().tap().peak() > 0.0);

		engine.update_graph(|ctx| {
			handles.set_level(ctx.graph, 0.1, ctx.now, 0.5);
			handles.set_cutoff(ctx.graph, 400.0, ctx.now, 0.5);
		});

		engine.render(16000);
		let (level, modulators, depth) = engine.update_graph(|ctx| {
			let param = ctx.graph.param(handles.gain, ParamKind::Gain).unwrap();
			let depth = param.modulators().iter()
				.map(|lfo| lfo.depth * param.modulation_depth_at(ctx.now))
				.sum::<f32>();

			(param.automation_value_at(ctx.now), param.modulators().len(), depth)
		});

		assert!((level - 0.1).abs() < 1.0e-5);
		assert_eq!(modulators, 1);

		// Level dropped to a fifth, so the swell did too.
		assert!((depth - 0.02).abs() < 1.0e-5);
	}

	#[test]
	fn charge_rises_then_fades() {
		let engine = test_engine();
		let charge = Charge { detune: 7.0, ..Charge::new(Waveform::Saw, 220.0, 0.4, 0.5) };

		let (handles, registry) = emit_with(&engine, 1, |em| charge.start(em, 0.0));
		assert_eq!(handles.sources.len(), 2);
		assert_eq!(registry.len(), 3);

		assert_eq!(handles.progress(0.0), 0.0);
		assert_eq!(handles.progress(0.25), 0.5);
		assert_eq!(handles.progress(2.0), 1.0);

		let frequency = engine.update_graph(|ctx| ctx.graph.param(handles.sources[0], ParamKind::Frequency).unwrap().value_at(0.5));
		assert!((frequency - 440.0).abs() < 0.01);

		let end = engine.update_graph(|ctx| handles.release_fade(ctx.graph, 0.6, DECLICK_TIME));
		assert!((end - (0.6 + DECLICK_TIME)).abs() < 1.0e-9);

		engine.render(16000);
		assert_eq!(engine.active_node_count(), 0);
	}

	#[test]
	fn pick_accepts_either_order() {
		let mut rng = SmallRng::seed_from_u64(0);
		for _ in 0..100 {
			let value = pick(&mut rng, (2.0, 1.0));
			assert!((1.0..=2.0).contains(&value));
		}

		assert_eq!(pick(&mut rng, (3, 3)), 3);
	}
}
