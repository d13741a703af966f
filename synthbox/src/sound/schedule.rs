use crate::prelude::*;

use std::sync::atomic::{AtomicU64, Ordering};


/// Shortest gap between two firings of a recurring timer.
pub const MIN_INTERVAL: f64 = 0.01;


/// A pending wall clock timer. Each handle gets a fresh id, so a handle that has been replaced
/// can be told apart from its replacement.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ScheduleHandle {
	id: u64,
	due: f64,
}

impl ScheduleHandle {
	pub fn new(due: f64) -> ScheduleHandle {
		static NEXT_ID: AtomicU64 = AtomicU64::new(1);

		ScheduleHandle {
			id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
			due,
		}
	}

	pub fn id(&self) -> u64 {
		self.id
	}

	/// Wall clock time this handle fires at.
	pub fn due(&self) -> f64 {
		self.due
	}

	pub fn is_due(&self, wall_now: f64) -> bool {
		wall_now >= self.due
	}
}



#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Jitter {
	None,

	/// Scale by a uniform factor in [1 - spread, 1 + spread].
	Uniform(f64),

	/// Draw from an exponential distribution with the interval as its mean.
	Exponential,
}

/// Randomised time until the next emission: `max(base - k*level, min)`, then jittered.
///
/// For a fixed random draw the result never increases as `level` increases.
pub fn recurrence_interval(base: f64, k: f64, level: f64, min: f64, jitter: Jitter, rng: &mut impl Rng) -> f64 {
	let mean = (base - k * level.max(0.0)).max(min).max(MIN_INTERVAL);

	let interval = match jitter {
		Jitter::None => mean,

		Jitter::Uniform(spread) => {
			let spread = spread.clamp(0.0, 0.95);
			mean * rng.gen_range(1.0 - spread ..= 1.0 + spread)
		}

		Jitter::Exponential => {
			let u: f64 = rng.r#gen();
			mean * (-(1.0 - u).ln()).min(8.0)
		}
	};

	interval.max(MIN_INTERVAL)
}



/// Precomputed emission times with exponentially distributed gaps, extended in chunks ahead of when they're needed.
///
/// Extending from where the last chunk ended rather than from the last event is fine, since the
/// process is memoryless.
#[derive(Clone, Debug, Default)]
pub struct PoissonHorizon {
	rate: f64,
	horizon: f64,
}

impl PoissonHorizon {
	/// `rate` is the mean number of events per second.
	pub fn new(rate: f64) -> PoissonHorizon {
		PoissonHorizon {
			rate,
			horizon: 0.0,
		}
	}

	pub fn rate(&self) -> f64 {
		self.rate
	}

	pub fn set_rate(&mut self, rate: f64) {
		self.rate = rate;
	}

	/// Time up to which events have been generated.
	pub fn horizon(&self) -> f64 {
		self.horizon
	}

	pub fn reset(&mut self, from: f64) {
		self.horizon = from;
	}

	/// Generate the events in (horizon, until]. Times come out in increasing order.
	pub fn extend(&mut self, until: f64, rng: &mut impl Rng) -> Vec<f64> {
		let mut times = Vec::new();

		if until <= self.horizon {
			return times
		}

		if self.rate > 0.0 {
			let mut time = self.horizon;

			loop {
				let u: f64 = rng.r#gen();
				time += -(1.0 - u).ln() / self.rate;

				if time > until {
					break
				}

				times.push(time);
			}
		}

		self.horizon = until;
		times
	}
}
