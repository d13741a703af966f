use anyhow::Context;
use serde::{Deserialize, Serialize};

use std::path::Path;


/// Engine wide settings. Every field has a default, so a config file only needs the values it changes.
///
/// ```toml
/// sample_rate = 44100
/// max_nodes = 512
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
	/// Sample rate used until an output device reports its own.
	pub sample_rate: u32,

	/// Frames per render quantum.
	pub block_size: usize,

	/// Soft cap on live nodes. Recurring emissions are skipped while the graph is this full.
	pub max_nodes: usize,

	pub master_gain: f32,

	/// Length of pooled noise buffers.
	pub noise_seconds: f32,

	/// Window size of the output bus analyser. Should be a power of two.
	pub analyser_size: usize,

	/// Extra wall clock time allowed after a burst's scheduled end before its nodes are force released.
	pub burst_cleanup_margin: f64,

	/// How long a skipped recurring emission waits before trying again.
	pub busy_backoff: f64,
}

impl Default for EngineConfig {
	fn default() -> EngineConfig {
		EngineConfig {
			sample_rate: 48000,
			block_size: 128,
			max_nodes: 1024,
			master_gain: 0.8,
			noise_seconds: 2.0,
			analyser_size: 2048,
			burst_cleanup_margin: 0.25,
			busy_backoff: 0.25,
		}
	}
}

impl EngineConfig {
	pub fn from_toml_str(source: &str) -> anyhow::Result<EngineConfig> {
		let config: EngineConfig = toml::from_str(source)
			.context("Failed to parse engine config")?;

		config.validate()?;
		Ok(config)
	}

	pub fn load(path: impl AsRef<Path>) -> anyhow::Result<EngineConfig> {
		let path = path.as_ref();
		let data = std::fs::read_to_string(path)
			.with_context(|| format!("Failed to read engine config from '{}'", path.display()))?;

		EngineConfig::from_toml_str(&data)
			.with_context(|| format!("In '{}'", path.display()))
	}

	pub fn validate(&self) -> anyhow::Result<()> {
		if self.sample_rate == 0 {
			anyhow::bail!("sample_rate must be positive");
		}

		if self.block_size == 0 {
			anyhow::bail!("block_size must be positive");
		}

		if self.noise_seconds <= 0.0 {
			anyhow::bail!("noise_seconds must be positive, got {}", self.noise_seconds);
		}

		if self.burst_cleanup_margin < 0.0 || self.busy_backoff <= 0.0 {
			anyhow::bail!("burst_cleanup_margin must be non-negative and busy_backoff positive");
		}

		Ok(())
	}

	pub fn noise_buffer_len(&self, sample_rate: f32) -> usize {
		(self.noise_seconds * sample_rate).ceil() as usize
	}
}
