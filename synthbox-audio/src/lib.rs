use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

mod device;
use device::SharedStreamState;

pub use device::enumerate_audio_devices;


pub mod prelude {
	pub use super::{Provider, Configuration};
}


pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

const RETRY_INTERVAL: Duration = Duration::from_secs(2);


/// Open the default output device and start an output stream.
/// The stream outputs silence until a [`Provider`] is set.
pub fn init(desired_sample_rate: u32) -> anyhow::Result<System> {
	let host = cpal::default_host();

	if log::log_enabled!(log::Level::Trace) {
		enumerate_audio_devices(&host)?;
	}

	let shared = Arc::new(SharedStreamState::new());
	let (stream, current_configuration) = device::build_output_stream(&host, &shared, desired_sample_rate)?;

	Ok(System {
		host,
		stream: Some(stream),
		current_configuration,
		desired_sample_rate,
		retry_at: None,
		shared,
	})
}


/// Audio sink: owns the device stream and forwards every device callback to the current [`Provider`].
pub struct System {
	host: cpal::Host,
	stream: Option<cpal::Stream>,
	current_configuration: Configuration,
	desired_sample_rate: u32,

	/// Earliest time to try reopening a lost device.
	retry_at: Option<Instant>,

	shared: Arc<SharedStreamState>,
}

impl System {
	/// Reopen the default device if the stream reported an error. Call regularly from the host loop.
	pub fn update(&mut self) {
		if self.shared.device_lost.swap(false, Ordering::Relaxed) {
			log::warn!("Audio device lost, dropping stream");
			self.stream = None;
		}

		if self.stream.is_some() {
			return
		}

		if let Some(retry_at) = self.retry_at
			&& Instant::now() < retry_at
		{
			return
		}

		match device::build_output_stream(&self.host, &self.shared, self.desired_sample_rate) {
			Ok((stream, configuration)) => {
				self.stream = Some(stream);
				self.retry_at = None;

				if configuration != self.current_configuration {
					log::info!("Output configuration changed: {configuration:?}");
				}

				self.current_configuration = configuration;

				if let Some(provider) = &mut *lock_provider(&self.shared) {
					provider.on_configuration_changed(configuration);
				}
			}

			Err(error) => {
				log::warn!("Failed to reopen audio device, retrying in {}s: {error:#}", RETRY_INTERVAL.as_secs());
				self.retry_at = Some(Instant::now() + RETRY_INTERVAL);
			}
		}
	}

	pub fn current_configuration(&self) -> Configuration {
		self.current_configuration
	}

	pub fn set_provider<P>(&mut self, provider: impl Into<Option<P>>)
		where P : Provider
	{
		let mut shared_provider = lock_provider(&self.shared);

		if let Some(mut provider) = provider.into() {
			provider.on_configuration_changed(self.current_configuration);
			*shared_provider = Some(Box::new(provider));
		} else {
			*shared_provider = None;
		}
	}
}


#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Configuration {
	pub sample_rate: u32,
	pub channels: usize,
}


/// Source of interleaved samples for the device callback.
/// `fill_buffer` runs on the audio thread and must not block for long.
pub trait Provider : Send + 'static {
	fn on_configuration_changed(&mut self, _: Configuration);
	fn fill_buffer(&mut self, buffer: &mut [f32]);
}


fn lock_provider(shared: &SharedStreamState) -> MutexGuard<'_, Option<Box<dyn Provider>>> {
	shared.provider.lock().unwrap_or_else(PoisonError::into_inner)
}


pub(crate) type SharedProvider = Mutex<Option<Box<dyn Provider>>>;
