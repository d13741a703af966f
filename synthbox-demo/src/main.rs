use synthbox::prelude::*;
use synthbox::cfg::Presets;

use anyhow::Context;
use std::time::{Duration, Instant};


const DEFAULT_SCENE: &str = include_str!("scene.toml");

const RUN_TIME: Duration = Duration::from_secs(30);
const FRAME_TIME: Duration = Duration::from_millis(16);

/// How often one of the idle generators plays a burst.
const BURST_INTERVAL: Duration = Duration::from_secs(3);

const METER_INTERVAL: Duration = Duration::from_secs(1);


struct Voice {
	name: String,
	generator: SoundGenerator,
}


fn init_logging() {
	let config = simplelog::ConfigBuilder::new()
		.add_filter_ignore_str("cpal")
		.build();

	let _ = simplelog::TermLogger::init(
		simplelog::LevelFilter::Debug,
		config,
		simplelog::TerminalMode::Mixed,
		simplelog::ColorChoice::Auto,
	);

	log_panics::init();
}


/// One generator per scene section. The `kind` key names the recipe, the rest are its parameters.
fn build_scene(engine: &AudioEngine, bus: &OutputBus, scene: &Presets) -> anyhow::Result<Vec<Voice>> {
	let mut voices = Vec::with_capacity(scene.len());

	for name in scene.names() {
		let Some(preset) = scene.get(name) else { continue };

		let mut params = preset.clone();
		let Some(Value::String(kind)) = params.remove("kind") else {
			anyhow::bail!("Scene entry '{name}' needs a kind");
		};

		let kind: SoundKind = kind.parse()?;
		let generator = SoundGenerator::new(engine, bus, kind, &params)
			.with_context(|| format!("In scene entry '{name}'"))?;

		log::info!("Scene entry '{name}' is a {kind}");

		voices.push(Voice {
			name: name.to_owned(),
			generator,
		});
	}

	Ok(voices)
}


fn main() -> anyhow::Result<()> {
	init_logging();

	let mut args = std::env::args().skip(1);

	let scene = match args.next() {
		Some(path) => Presets::from_file(path)?,
		None => Presets::from_toml_str(DEFAULT_SCENE)?,
	};

	let config = match args.next() {
		Some(path) => EngineConfig::load(path)?,
		None => EngineConfig::default(),
	};

	let engine = AudioEngine::with_system_clock(config.clone());
	let bus = engine.bus();

	let mut system = synthbox_audio::init(config.sample_rate)?;
	system.set_provider::<AudioEngine>(Some(engine.clone()));

	let mut voices = build_scene(&engine, &bus, &scene)?;
	for voice in voices.iter_mut() {
		voice.generator.start();
	}

	let idle_count = voices.iter().filter(|voice| !voice.generator.is_active()).count();
	log::info!("Playing {} generators for {}s, {idle_count} on bursts only", voices.len(), RUN_TIME.as_secs());

	let start = Instant::now();
	let mut next_burst = start + BURST_INTERVAL;
	let mut next_meter = start + METER_INTERVAL;
	let mut burst_index = 0;

	while start.elapsed() < RUN_TIME {
		system.update();

		for voice in voices.iter_mut() {
			voice.generator.update();
		}

		let now = Instant::now();

		if now >= next_burst {
			next_burst += BURST_INTERVAL;

			let mut idle = voices.iter_mut().filter(|voice| !voice.generator.is_active());
			let count = idle_count.max(1);

			if let Some(voice) = idle.nth(burst_index % count) {
				log::info!("Burst from '{}'", voice.name);
				voice.generator.play_burst();
			}

			burst_index += 1;
		}

		if now >= next_meter {
			next_meter += METER_INTERVAL;

			let tap = bus.tap();
			log::debug!("t={:.1}s nodes={} peak={:.3} rms={:.3}",
				engine.current_time(), engine.active_node_count(), tap.peak(), tap.rms());
		}

		std::thread::sleep(FRAME_TIME);
	}

	for voice in voices.iter_mut() {
		voice.generator.stop();
	}

	// Let the declick fades reach the device.
	std::thread::sleep(Duration::from_millis(200));

	system.set_provider::<AudioEngine>(None);
	log::info!("Done");

	Ok(())
}
