use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;


/// Monotonic wall clock in seconds, used to time recurring emissions.
/// Independent of the sample clock, which only advances as audio is rendered.
pub trait WallClock: Send + Sync + 'static {
	fn now(&self) -> f64;
}


#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
	origin: Instant,
}

impl SystemClock {
	pub fn new() -> SystemClock {
		SystemClock { origin: Instant::now() }
	}
}

impl Default for SystemClock {
	fn default() -> SystemClock {
		SystemClock::new()
	}
}

impl WallClock for SystemClock {
	fn now(&self) -> f64 {
		self.origin.elapsed().as_secs_f64()
	}
}


/// Clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
	seconds_bits: Arc<AtomicU64>,
}

impl ManualClock {
	pub fn new() -> ManualClock {
		ManualClock::default()
	}

	pub fn set(&self, seconds: f64) {
		self.seconds_bits.store(seconds.to_bits(), Ordering::Relaxed);
	}

	pub fn advance(&self, seconds: f64) {
		self.set(self.now() + seconds);
	}
}

impl WallClock for ManualClock {
	fn now(&self) -> f64 {
		f64::from_bits(self.seconds_bits.load(Ordering::Relaxed))
	}
}

impl<C: WallClock> WallClock for Arc<C> {
	fn now(&self) -> f64 {
		(**self).now()
	}
}
