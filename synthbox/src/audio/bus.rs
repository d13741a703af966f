use crate::audio::node_graph::{NodeGraph, NodeId, Schedule};
use crate::audio::nodes::{MixerNode, AnalyserNode, AnalyserTap, ParamKind};
use crate::audio::system::AudioEngine;
use crate::audio::envelope::glide_to;
use crate::config::EngineConfig;


/// The single summing stage every generator renders into.
/// Master mixer -> analyser tap -> device output. Both nodes are pinned and live as long as the engine.
#[derive(Clone)]
pub struct OutputBus {
	input: NodeId,
	tap: AnalyserTap,
}

impl OutputBus {
	pub(in crate::audio) fn new(graph: &mut NodeGraph, config: &EngineConfig) -> OutputBus {
		let tap = AnalyserTap::new(config.analyser_size);

		let master = graph.add_node(MixerNode::new_stereo(config.master_gain), Schedule::always());
		let analyser = graph.add_node(AnalyserNode::new(tap.clone()), Schedule::always());

		graph.pin_node(master);
		graph.pin_node(analyser);

		let output = graph.output_node();
		graph.add_send_chain(&[master, analyser, output]);

		OutputBus {
			input: master,
			tap,
		}
	}

	/// Node that generators connect their outputs to.
	pub fn input(&self) -> NodeId {
		self.input
	}

	/// Read-only analysis of everything passing through the bus.
	pub fn tap(&self) -> &AnalyserTap {
		&self.tap
	}

	/// Ramp the master gain to `gain` over `ramp` seconds.
	pub fn set_gain(&self, engine: &AudioEngine, gain: f32, ramp: f64) {
		engine.update_graph(|ctx| {
			if let Some(param) = ctx.graph.param_mut(self.input, ParamKind::Gain) {
				glide_to(param, gain.max(0.0), ctx.now, ramp);
			}
		});
	}
}
