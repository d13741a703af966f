use crate::prelude::*;
use crate::audio::{AudioEngine, OutputBus};
use crate::sound::emit::Emitter;
use crate::sound::recipe::{Recipe, SoundRecipe};
use crate::sound::registry::NodeRegistry;
use crate::sound::schedule::{ScheduleHandle, MIN_INTERVAL};

use anyhow::Context;


#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PlaybackState {
	Idle,
	Active,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Target {
	Continuous,
	Burst,
}


/// One procedurally synthesised sound source.
///
/// Continuous playback (`start`/`stop`) and one-shot bursts (`play_burst`) each track the nodes they
/// create, and each has its own wall clock timer: `recurrence` drives repeating emissions while active,
/// `burst_cleanup` force releases burst nodes once their scheduled end has certainly passed.
/// Neither timer runs on its own; the host calls [`SoundGenerator::update`] regularly.
pub struct SoundGenerator {
	engine: AudioEngine,
	bus: OutputBus,
	config: EngineConfig,

	kind: SoundKind,
	params: Table,
	recipe: Recipe,
	state: PlaybackState,
	rng: SmallRng,

	continuous: NodeRegistry,
	bursts: NodeRegistry,

	recurrence: Option<ScheduleHandle>,
	burst_cleanup: Option<ScheduleHandle>,
}

impl SoundGenerator {
	/// `initial` is merged over the defaults for `kind`. The generator starts idle.
	pub fn new(engine: &AudioEngine, bus: &OutputBus, kind: SoundKind, initial: &Table) -> anyhow::Result<SoundGenerator> {
		kind.validate(initial)
			.with_context(|| format!("Invalid initial parameters for {kind}"))?;

		let params = kind.defaults().merged(initial);

		log::debug!("Created {kind} generator");

		Ok(SoundGenerator {
			engine: engine.clone(),
			bus: bus.clone(),
			config: engine.config(),

			kind,
			params,
			recipe: Recipe::new(kind),
			state: PlaybackState::Idle,
			rng: SmallRng::from_entropy(),

			continuous: NodeRegistry::new(),
			bursts: NodeRegistry::new(),

			recurrence: None,
			burst_cleanup: None,
		})
	}

	pub fn with_seed(mut self, seed: u64) -> SoundGenerator {
		self.rng = SmallRng::seed_from_u64(seed);
		self
	}

	pub fn kind(&self) -> SoundKind {
		self.kind
	}

	pub fn state(&self) -> PlaybackState {
		self.state
	}

	pub fn is_active(&self) -> bool {
		self.state == PlaybackState::Active
	}

	pub fn params(&self) -> &Table {
		&self.params
	}

	pub fn recurrence(&self) -> Option<ScheduleHandle> {
		self.recurrence
	}

	pub fn burst_cleanup(&self) -> Option<ScheduleHandle> {
		self.burst_cleanup
	}

	pub fn has_pending_recurrence(&self) -> bool {
		self.recurrence.is_some()
	}

	pub fn has_pending_cleanup(&self) -> bool {
		self.burst_cleanup.is_some()
	}

	/// Nodes from this generator that have started and are still in the graph.
	/// Nodes scheduled for later are owned but not counted until their start time arrives.
	pub fn active_node_count(&self) -> usize {
		let SoundGenerator { engine, continuous, bursts, .. } = self;
		engine.update_graph(|ctx| {
			continuous.sounding_count(ctx.graph, ctx.now) + bursts.sounding_count(ctx.graph, ctx.now)
		})
	}

	fn governing_level(&self) -> f64 {
		self.params.number(self.kind.governing_param()).unwrap_or(0.0)
	}

	/// Begin continuous playback. Does nothing if already active or if the governing parameter is zero.
	#[instrument(skip_all, name = "synthbox::SoundGenerator::start")]
	pub fn start(&mut self) {
		if self.is_active() {
			return
		}

		if self.governing_level() <= 0.0 {
			log::debug!("Not starting {}: '{}' is zero", self.kind, self.kind.governing_param());
			return
		}

		self.state = PlaybackState::Active;

		let delay = self.emit(Target::Continuous, |recipe, em, params| recipe.begin(em, params));
		self.arm_recurrence(delay);

		log::debug!("Started {}", self.kind);
	}

	/// Cancel both timers, fade out and release every node this generator owns, and go idle.
	/// Safe to call at any time, any number of times.
	#[instrument(skip_all, name = "synthbox::SoundGenerator::stop")]
	pub fn stop(&mut self) {
		let was_active = self.is_active();

		self.recurrence = None;
		self.burst_cleanup = None;

		let SoundGenerator { engine, continuous, bursts, .. } = self;
		let released = engine.update_graph(|ctx| {
			let continuous_fade = continuous.release_all(ctx.graph, ctx.now);
			let burst_fade = bursts.release_all(ctx.graph, ctx.now);
			continuous_fade.is_some() || burst_fade.is_some()
		});

		self.recipe.end();
		self.state = PlaybackState::Idle;

		if was_active || released {
			log::debug!("Stopped {}", self.kind);
		}
	}

	/// Emit one finite instance of the sound, whatever the current state, and arrange for its nodes
	/// to be released once it has certainly finished. Dropped if the graph is at its node cap.
	#[instrument(skip_all, name = "synthbox::SoundGenerator::play_burst")]
	pub fn play_burst(&mut self) {
		let emitted = self.emit(Target::Burst, |recipe, em, params| {
			if em.is_busy() {
				return None
			}

			Some((recipe.burst(em, params), em.now()))
		});

		match emitted {
			Some((end, now)) => {
				log::trace!("{} burst ends in {:.3}s", self.kind, end - now);
				self.arm_cleanup(end, now);
			}

			None => log::debug!("Dropped {} burst, graph is busy", self.kind),
		}
	}

	/// Merge `partial` into the parameter set.
	///
	/// Fails without changing anything if `partial` has unknown keys, mistyped values or invalid choices.
	/// Setting the governing parameter to zero stops an active generator; setting it above zero starts an idle one.
	/// Other changes to an active generator are applied to its held nodes in place.
	#[instrument(skip_all, name = "synthbox::SoundGenerator::update_params")]
	pub fn update_params(&mut self, partial: &Table) -> anyhow::Result<()> {
		self.kind.validate(partial)
			.with_context(|| format!("Invalid parameters for {}", self.kind))?;

		self.params.merge_from(partial);

		let enabled = self.governing_level() > 0.0;
		let governing_changed = partial.contains_key(self.kind.governing_param());

		match self.state {
			PlaybackState::Active if !enabled => self.stop(),

			PlaybackState::Active => {
				let SoundGenerator { engine, recipe, params, .. } = self;
				engine.update_graph(|ctx| recipe.retune(ctx.graph, ctx.now, params));
			}

			PlaybackState::Idle if enabled && governing_changed => self.start(),
			PlaybackState::Idle => {}
		}

		Ok(())
	}

	/// Trigger the second phase of a two-phase sound, such as casting a charged spell.
	/// Sounds without one just stop.
	#[instrument(skip_all, name = "synthbox::SoundGenerator::release")]
	pub fn release(&mut self) {
		let released = match self.state {
			PlaybackState::Active => self.emit(Target::Burst, |recipe, em, params| {
				recipe.release(em, params).map(|end| (end, em.now()))
			}),

			PlaybackState::Idle => None,
		};

		let Some((end, now)) = released else {
			self.stop();
			return
		};

		self.recurrence = None;
		self.recipe.end();
		self.state = PlaybackState::Idle;
		self.arm_cleanup(end, now);

		log::debug!("Released {}", self.kind);
	}

	/// Play one note on a tonal generator. `midi_note` may be fractional.
	pub fn play_note(&mut self, midi_note: f32, duration: f64) -> anyhow::Result<()> {
		if !self.kind.is_tonal() {
			anyhow::bail!("{} generators can't play notes", self.kind);
		}

		let emitted = self.emit(Target::Burst, |recipe, em, params| {
			if em.is_busy() {
				return None
			}

			recipe.note(em, params, midi_note, duration.max(0.0))
				.map(|end| (end, em.now()))
		});

		match emitted {
			Some((end, now)) => self.arm_cleanup(end, now),
			None => log::debug!("Dropped {} note, graph is busy", self.kind),
		}

		Ok(())
	}

	/// Fire whichever timers are due. Call regularly, e.g. once per frame.
	#[instrument(skip_all, name = "synthbox::SoundGenerator::update")]
	pub fn update(&mut self) {
		let wall_now = self.engine.wall_time();

		let SoundGenerator { engine, continuous, bursts, .. } = self;
		engine.update_graph(|ctx| {
			continuous.reap(ctx.graph);
			bursts.reap(ctx.graph);
		});

		if let Some(handle) = self.recurrence
			&& handle.is_due(wall_now)
		{
			self.recurrence = None;
			self.fire_recurrence(wall_now);
		}

		if let Some(handle) = self.burst_cleanup
			&& handle.is_due(wall_now)
		{
			self.burst_cleanup = None;

			let SoundGenerator { engine, bursts, .. } = self;
			if engine.update_graph(|ctx| bursts.release_all(ctx.graph, ctx.now)).is_some() {
				log::debug!("{} burst cleanup released lingering nodes", self.kind);
			}
		}
	}
}

// Private API.
impl SoundGenerator {
	fn emit<R>(&mut self, target: Target, f: impl FnOnce(&mut Recipe, &mut Emitter<'_, '_>, &Table) -> R) -> R {
		let SoundGenerator { engine, bus, params, recipe, rng, continuous, bursts, .. } = self;

		let registry = match target {
			Target::Continuous => continuous,
			Target::Burst => bursts,
		};

		let bus_input = bus.input();

		engine.update_graph(|ctx| {
			let mut em = Emitter::new(ctx, registry, rng, bus_input);
			f(recipe, &mut em, params)
		})
	}

	fn fire_recurrence(&mut self, wall_now: f64) {
		// A timer can outlive the mode that armed it.
		if !self.is_active() {
			return
		}

		let next = self.emit(Target::Continuous, |recipe, em, params| {
			if em.is_busy() {
				return Err(())
			}

			Ok(recipe.recur(em, params))
		});

		match next {
			Ok(Some(delay)) => self.arm_recurrence(Some(delay)),

			Ok(None) => {
				log::debug!("{} has run its course", self.kind);
				self.recipe.end();
				self.state = PlaybackState::Idle;
			}

			Err(()) => {
				log::debug!("Skipping {} emission, graph is busy", self.kind);
				self.recurrence = Some(ScheduleHandle::new(wall_now + self.config.busy_backoff));
			}
		}
	}

	fn arm_recurrence(&mut self, delay: Option<f64>) {
		let wall_now = self.engine.wall_time();
		self.recurrence = delay.map(|delay| ScheduleHandle::new(wall_now + delay.max(MIN_INTERVAL)));
	}

	/// Sample clock `end` is converted to wall clock using the offset at emission time.
	fn arm_cleanup(&mut self, end: f64, sample_now: f64) {
		let remaining = (end - sample_now).max(0.0);
		let due = self.engine.wall_time() + remaining + self.config.burst_cleanup_margin;

		// A later burst can only push cleanup back.
		let due = self.burst_cleanup.map_or(due, |existing| existing.due().max(due));
		self.burst_cleanup = Some(ScheduleHandle::new(due));
	}
}

impl Drop for SoundGenerator {
	fn drop(&mut self) {
		self.stop();
	}
}



#[cfg(test)]
mod test {
	use super::*;
	use crate::audio::{ManualClock, ParamKind, AudioParam, ENVELOPE_FLOOR, DECLICK_TIME};

	const STEP: f64 = 0.01;

	struct Harness {
		engine: AudioEngine,
		clock: ManualClock,
	}

	impl Harness {
		fn new() -> Harness {
			Harness::with_config(EngineConfig::default())
		}

		/// 16kHz with 32 frame quanta, so one 10ms step renders exactly five quanta and the two clocks stay in step.
		fn with_config(config: EngineConfig) -> Harness {
			let config = EngineConfig {
				sample_rate: 16000,
				block_size: 32,
				noise_seconds: 0.5,
				analyser_size: 256,
				..config
			};

			let clock = ManualClock::new();
			let engine = AudioEngine::new(config, clock.clone());
			Harness { engine, clock }
		}

		fn generator(&self, kind: SoundKind, params: Table) -> SoundGenerator {
			SoundGenerator::new(&self.engine, &self.engine.bus(), kind, &params)
				.unwrap()
				.with_seed(1234)
		}

		fn advance(&self, generator: &mut SoundGenerator, seconds: f64) {
			let steps = (seconds / STEP).round() as usize;
			for _ in 0..steps {
				self.clock.advance(STEP);
				self.engine.render(160);
				generator.update();
			}
		}
	}

	#[test]
	fn double_stop_is_harmless() {
		let harness = Harness::new();
		let mut wind = harness.generator(SoundKind::Wind, params!{ "intensity" => 2.0 });

		wind.start();
		harness.advance(&mut wind, 1.0);
		assert!(wind.active_node_count() > 0);

		wind.stop();
		assert_eq!(wind.active_node_count(), 0);
		assert!(!wind.has_pending_recurrence());

		wind.stop();
		assert_eq!(wind.active_node_count(), 0);
		assert_eq!(wind.state(), PlaybackState::Idle);

		// Faded nodes leave the graph shortly after.
		harness.advance(&mut wind, 0.1);
		assert_eq!(harness.engine.active_node_count(), 0);
	}

	#[test]
	fn governing_parameter_starts_and_stops() {
		let harness = Harness::new();
		let mut rain = harness.generator(SoundKind::Rain, params!{});

		rain.start();
		assert_eq!(rain.state(), PlaybackState::Idle);
		assert_eq!(rain.active_node_count(), 0);

		rain.update_params(&params!{ "intensity" => 3.0 }).unwrap();
		assert!(rain.is_active());
		assert!(rain.active_node_count() > 0);
		assert!(rain.has_pending_recurrence());

		harness.advance(&mut rain, 2.0);
		rain.update_params(&params!{ "surface" => "roof" }).unwrap();
		assert!(rain.is_active());

		rain.update_params(&params!{ "intensity" => 0.0 }).unwrap();
		assert_eq!(rain.state(), PlaybackState::Idle);
		assert_eq!(rain.active_node_count(), 0);
		assert!(!rain.has_pending_recurrence());
	}

	#[test]
	fn invalid_update_changes_nothing() {
		let harness = Harness::new();
		let mut rain = harness.generator(SoundKind::Rain, params!{ "drops" => 3.0 });
		let before = rain.params().clone();

		assert!(rain.update_params(&params!{ "drops" => 1.0, "surface" => "lava" }).is_err());
		assert!(rain.update_params(&params!{ "splashiness" => 1.0 }).is_err());
		assert_eq!(rain.params(), &before);

		assert!(SoundGenerator::new(&harness.engine, &harness.engine.bus(), SoundKind::Rain, &params!{ "drops" => "many" }).is_err());
	}

	#[test]
	fn burst_cleans_up_without_stop() {
		let harness = Harness::new();
		let margin = harness.engine.config().burst_cleanup_margin;

		// Sine voice: 10ms attack, 1.39s hold, 100ms release.
		let mut tone = harness.generator(SoundKind::Tone, params!{ "level" => 2.0, "duration" => 1.39, "instrument" => "sine" });

		tone.play_burst();
		assert!(tone.active_node_count() > 0);
		assert_eq!(tone.state(), PlaybackState::Idle);

		let due = tone.burst_cleanup().unwrap().due();
		assert!((due - (1.5 + margin)).abs() < 1.0e-6, "cleanup due at {due}");

		harness.advance(&mut tone, 1.0);
		assert!(tone.active_node_count() > 0);

		harness.advance(&mut tone, 0.5 + margin + STEP);
		assert_eq!(tone.active_node_count(), 0);
		assert!(!tone.has_pending_cleanup());
	}

	#[test]
	fn start_twice_keeps_one_schedule() {
		let harness = Harness::new();
		let mut crickets = harness.generator(SoundKind::Crickets, params!{ "density" => 4.0 });

		crickets.start();
		let handle = crickets.recurrence().unwrap();
		let nodes = crickets.active_node_count();

		crickets.start();
		assert_eq!(crickets.recurrence(), Some(handle));
		assert_eq!(crickets.active_node_count(), nodes);

		// Over time a doubly started generator emits exactly what a singly started one does.
		let single_harness = Harness::new();
		let mut single = single_harness.generator(SoundKind::Crickets, params!{ "density" => 4.0 });
		single.start();

		harness.advance(&mut crickets, 5.0);
		single_harness.advance(&mut single, 5.0);

		let emitted = crickets.continuous.total_inserted();
		assert!(emitted > 0);
		assert_eq!(emitted, single.continuous.total_inserted());
	}

	#[test]
	fn stop_lands_modulated_beds_on_the_floor() {
		let harness = Harness::new();
		let mut wind = harness.generator(SoundKind::Wind, params!{ "intensity" => 4.0, "gustiness" => 4.0 });

		wind.start();
		harness.advance(&mut wind, 2.0);

		let nodes = wind.continuous.iter().collect::<Vec<_>>();
		let before = harness.engine.update_graph(|ctx| {
			nodes.iter()
				.filter_map(|&node| ctx.graph.param(node, ParamKind::Gain))
				.filter(|param| !param.modulators().is_empty())
				.map(|param| param.value_at(ctx.now))
				.collect::<Vec<_>>()
		});

		assert!(!before.is_empty(), "wind bed has no modulated gain");

		wind.stop();

		harness.engine.update_graph(|ctx| {
			let fade_end = ctx.now + DECLICK_TIME;
			let modulated = nodes.iter()
				.filter_map(|&node| ctx.graph.param(node, ParamKind::Gain))
				.filter(|param| !param.modulators().is_empty());

			for (param, held) in modulated.zip(before.iter()) {
				assert!((param.value_at(ctx.now) - held).abs() < 1.0e-5);
				assert!(param.value_at(fade_end).abs() <= ENVELOPE_FLOOR + 1.0e-6, "ends at {}", param.value_at(fade_end));
				assert!(param.value_at(fade_end + 0.5).abs() <= ENVELOPE_FLOOR + 1.0e-6);
			}
		});
	}

	#[test]
	fn every_envelope_ends_on_the_floor() {
		let harness = Harness::new();

		for &kind in SoundKind::ALL {
			let mut generator = harness.generator(kind, params!{ kind.governing_param() => 2.0 });
			generator.play_burst();

			let finals = harness.engine.update_graph(|ctx| {
				generator.bursts.iter()
					.filter_map(|node| ctx.graph.param(node, ParamKind::Gain))
					.filter(|param| !param.events().is_empty())
					.map(AudioParam::final_value)
					.collect::<Vec<_>>()
			});

			assert!(!finals.is_empty(), "{kind} burst has no envelopes");

			for value in finals {
				assert!(value > 0.0 && value <= ENVELOPE_FLOOR, "{kind} envelope ends at {value}");
			}

			generator.stop();
		}
	}

	#[test]
	fn drone_holds_for_ten_seconds_then_stops() {
		let harness = Harness::new();
		let mut wind = harness.generator(SoundKind::Wind, params!{ "intensity" => 4.0 });

		wind.start();
		harness.advance(&mut wind, 10.0);

		assert!(wind.is_active());
		assert!(wind.continuous.len() >= 1);
		assert!(wind.active_node_count() >= 1);
		assert!(harness.engine.bus().tap().peak() > 0.0);

		wind.stop();
		assert_eq!(wind.active_node_count(), 0);
		assert!(wind.continuous.is_empty());
		assert!(!wind.has_pending_recurrence());
	}

	#[test]
	fn busy_graph_skips_recurrences() {
		let harness = Harness::with_config(EngineConfig { max_nodes: 0, ..EngineConfig::default() });
		let mut crickets = harness.generator(SoundKind::Crickets, params!{ "density" => 4.0 });

		crickets.start();
		crickets.play_burst();
		assert!(!crickets.has_pending_cleanup());

		harness.advance(&mut crickets, 5.0);
		assert!(crickets.is_active());
		assert!(crickets.has_pending_recurrence());
		assert_eq!(crickets.active_node_count(), 0);
	}

	#[test]
	fn spell_charges_then_releases() {
		let harness = Harness::new();
		let mut spell = harness.generator(SoundKind::Spell, params!{ "power" => 3.0, "element" => "lightning" });

		spell.start();
		assert!(spell.is_active());
		harness.advance(&mut spell, 0.5);
		assert!(spell.active_node_count() > 0);

		spell.release();
		assert_eq!(spell.state(), PlaybackState::Idle);
		assert!(spell.has_pending_cleanup());
		assert!(!spell.bursts.is_empty());

		harness.advance(&mut spell, 8.0);
		assert_eq!(spell.active_node_count(), 0);
		assert!(!spell.has_pending_cleanup());
	}

	#[test]
	fn release_stops_single_phase_sounds() {
		let harness = Harness::new();
		let mut fire = harness.generator(SoundKind::Fire, params!{ "intensity" => 2.0 });

		fire.start();
		fire.release();
		assert_eq!(fire.state(), PlaybackState::Idle);
		assert_eq!(fire.active_node_count(), 0);
	}

	#[test]
	fn song_runs_its_course() {
		let harness = Harness::new();
		let mut song = harness.generator(SoundKind::Song, params!{
			"volume" => 2.0,
			"tempo" => 240.0,
			"looping" => false,
			"notes" => "C4:1 - E4:1 G4:1",
		});

		song.start();
		assert!(song.is_active());

		// Four beats at 240bpm.
		harness.advance(&mut song, 2.0);
		assert_eq!(song.state(), PlaybackState::Idle);
		assert!(!song.has_pending_recurrence());
		assert_eq!(song.active_node_count(), 0);
	}

	#[test]
	fn notes_only_for_tonal_kinds() {
		let harness = Harness::new();

		let mut tone = harness.generator(SoundKind::Tone, params!{});
		tone.play_note(60.0, 0.2).unwrap();
		assert!(tone.active_node_count() > 0);
		assert!(tone.has_pending_cleanup());

		let mut ice = harness.generator(SoundKind::Ice, params!{});
		assert!(ice.play_note(60.0, 0.2).is_err());
	}

	#[test]
	fn dropping_stops() {
		let harness = Harness::new();

		{
			let mut fire = harness.generator(SoundKind::Fire, params!{ "intensity" => 4.0 });
			fire.start();
			fire.play_burst();
		}

		harness.engine.render(1600);
		assert_eq!(harness.engine.active_node_count(), 0);
	}
}
