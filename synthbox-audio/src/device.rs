use cpal::traits::*;
use anyhow::Context as AnyhowContext;
use tracing::instrument;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::{Configuration, SharedProvider, lock_provider};


/// State the device callbacks share with [`System`](super::System). Outlives any single stream.
pub(crate) struct SharedStreamState {
	pub provider: SharedProvider,
	pub device_lost: AtomicBool,
}

impl SharedStreamState {
	pub fn new() -> SharedStreamState {
		SharedStreamState {
			provider: SharedProvider::new(None),
			device_lost: AtomicBool::new(false),
		}
	}
}


/// Pick an f32 output config, preferring one whose range covers `desired_sample_rate`.
fn select_stream_config(device: &cpal::Device, desired_sample_rate: u32) -> anyhow::Result<cpal::StreamConfig> {
	let candidates: Vec<_> = device.supported_output_configs()
		.context("Failed to query output configs")?
		.filter(|range| range.sample_format() == cpal::SampleFormat::F32)
		.collect();

	let covers_desired = |range: &&cpal::SupportedStreamConfigRange| {
		(range.min_sample_rate().0 ..= range.max_sample_rate().0).contains(&desired_sample_rate)
	};

	let range = candidates.iter()
		.filter(covers_desired)
		.max_by(|a, b| a.cmp_default_heuristics(b))
		.or_else(|| candidates.iter().max_by(|a, b| a.cmp_default_heuristics(b)))
		.cloned()
		.context("Output device has no f32 configuration")?;

	let sample_rate = desired_sample_rate.clamp(range.min_sample_rate().0, range.max_sample_rate().0);
	if sample_rate != desired_sample_rate {
		log::warn!("Output device can't run at {desired_sample_rate}Hz, using {sample_rate}Hz");
	}

	Ok(range.with_sample_rate(cpal::SampleRate(sample_rate)).into())
}


#[instrument(skip_all, name = "synthbox_audio::build_output_stream")]
pub(crate) fn build_output_stream(host: &cpal::Host, shared: &Arc<SharedStreamState>, desired_sample_rate: u32)
	-> anyhow::Result<(cpal::Stream, Configuration)>
{
	let device = host.default_output_device()
		.context("No output device available")?;

	let device_name = device.name().unwrap_or_else(|_| String::from("<unnamed>"));
	let config = select_stream_config(&device, desired_sample_rate)
		.with_context(|| format!("Configuring '{device_name}'"))?;

	log::info!("Opening '{device_name}': {}Hz, {} channels", config.sample_rate.0, config.channels);

	let on_data = {
		let shared = Arc::clone(shared);

		move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
			let _span = tracing::trace_span!("synthbox_audio::fill_buffer").entered();

			match &mut *lock_provider(&shared) {
				Some(provider) => provider.fill_buffer(data),
				None => data.fill(0.0),
			}
		}
	};

	let on_error = {
		let shared = Arc::clone(shared);

		move |error: cpal::StreamError| {
			log::warn!("Output stream error, treating device as lost: {error}");
			shared.device_lost.store(true, Ordering::Relaxed);
		}
	};

	let stream = device.build_output_stream(&config, on_data, on_error, None)
		.with_context(|| format!("Failed to build output stream on '{device_name}'"))?;

	stream.play()
		.context("Failed to start output stream")?;

	let configuration = Configuration {
		sample_rate: config.sample_rate.0,
		channels: config.channels as usize,
	};

	Ok((stream, configuration))
}


/// Log every output device and what it supports. Only useful at trace level.
#[instrument(skip_all)]
pub fn enumerate_audio_devices(host: &cpal::Host) -> anyhow::Result<()> {
	for (index, device) in host.output_devices()?.enumerate() {
		log::trace!("Output device {index}: {}", device.name()?);
		log::trace!("    default: {:?}", device.default_output_config()?);

		for range in device.supported_output_configs()? {
			log::trace!("    {:?} {}..{}Hz, {} channels",
				range.sample_format(), range.min_sample_rate().0, range.max_sample_rate().0, range.channels());
		}
	}

	Ok(())
}
