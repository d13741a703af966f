use crate::audio::{NodeGraph, NodeId, ParamKind, DECLICK_TIME};
use crate::audio::envelope::release_to_floor;


/// Every node a generator has scheduled and not yet seen finish.
///
/// Nodes are owned from the moment they're scheduled, not from when they start sounding, so a stop
/// also cancels anything queued for later. [`NodeRegistry::sounding_count`] counts only nodes whose
/// start time has passed.
///
/// The graph is the source of truth for natural completion: once the graph has cleaned a node up,
/// [`NodeRegistry::reap`] forgets it.
#[derive(Debug, Default)]
pub struct NodeRegistry {
	nodes: Vec<NodeId>,
	inserted: usize,
}

impl NodeRegistry {
	pub fn new() -> NodeRegistry {
		NodeRegistry::default()
	}

	pub fn insert(&mut self, node: NodeId) {
		self.nodes.push(node);
		self.inserted += 1;
	}

	/// Nodes ever inserted, including those since reaped or released.
	pub fn total_inserted(&self) -> usize {
		self.inserted
	}

	/// Forget nodes the graph has already removed. Returns how many were forgotten.
	pub fn reap(&mut self, graph: &NodeGraph) -> usize {
		let before = self.nodes.len();
		self.nodes.retain(|&node| graph.contains(node));
		before - self.nodes.len()
	}

	/// Nodes still in the graph whose start time is at or before `now`.
	pub fn sounding_count(&self, graph: &NodeGraph, now: f64) -> usize {
		self.nodes.iter()
			.filter_map(|&node| graph.schedule(node))
			.filter(|schedule| schedule.start <= now)
			.count()
	}

	/// Fade out and stop every owned node, then forget them all.
	///
	/// Gain stages hold their current value at `now` and decay to the envelope floor over [`DECLICK_TIME`];
	/// every node's stop time is brought forward to the end of that fade. Nodes that already finished are skipped.
	/// Returns the time the fade completes, or `None` if nothing was live.
	pub fn release_all(&mut self, graph: &mut NodeGraph, now: f64) -> Option<f64> {
		let fade_end = now + DECLICK_TIME;
		let mut released = 0;

		for node in self.nodes.drain(..) {
			if !graph.contains(node) {
				continue
			}

			if let Some(gain) = graph.param_mut(node, ParamKind::Gain) {
				release_to_floor(gain, now, DECLICK_TIME);
			}

			graph.set_stop_time(node, fade_end);
			released += 1;
		}

		(released > 0).then_some(fade_end)
	}

	pub fn len(&self) -> usize {
		self.nodes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item=NodeId> + '_ {
		self.nodes.iter().copied()
	}
}



#[cfg(test)]
mod test {
	use super::*;
	use crate::audio::{Schedule, ENVELOPE_FLOOR};
	use crate::audio::nodes::{OscillatorNode, GainNode};

	#[test]
	fn release_all_fades_and_clamps() {
		let mut graph = NodeGraph::new();
		let output = graph.output_node();
		let mut registry = NodeRegistry::new();

		let osc = graph.add_node(OscillatorNode::sine(220.0), Schedule::starting_at(0.0));
		let gain = graph.add_node(GainNode::new(0.5), Schedule::between(0.0, 10.0));
		graph.add_send_chain(&[osc, gain, output]);
		registry.insert(osc);
		registry.insert(gain);

		let fade_end = registry.release_all(&mut graph, 1.0);
		assert_eq!(fade_end, Some(1.0 + DECLICK_TIME));
		assert!(registry.is_empty());

		assert_eq!(graph.schedule(osc).unwrap().stop, Some(1.0 + DECLICK_TIME));
		assert_eq!(graph.schedule(gain).unwrap().stop, Some(1.0 + DECLICK_TIME));

		let gain_param = graph.param(gain, ParamKind::Gain).unwrap();
		assert!((gain_param.value_at(1.0) - 0.5).abs() < 1.0e-5);
		assert!(gain_param.final_value() <= ENVELOPE_FLOOR);
	}

	#[test]
	fn release_all_tolerates_finished_nodes() {
		let mut graph = NodeGraph::new();
		let mut registry = NodeRegistry::new();

		let osc = graph.add_node(OscillatorNode::sine(220.0), Schedule::between(0.0, 1.0));
		registry.insert(osc);
		graph.remove_node(osc);

		assert_eq!(registry.release_all(&mut graph, 2.0), None);
		assert_eq!(registry.release_all(&mut graph, 2.0), None);
		assert!(registry.is_empty());
	}

	#[test]
	fn sounding_count_waits_for_start() {
		let mut graph = NodeGraph::new();
		let mut registry = NodeRegistry::new();

		let now = graph.add_node(OscillatorNode::sine(220.0), Schedule::between(0.0, 1.0));
		let later = graph.add_node(OscillatorNode::sine(330.0), Schedule::between(0.5, 1.0));
		registry.insert(now);
		registry.insert(later);

		assert_eq!(registry.len(), 2);
		assert_eq!(registry.sounding_count(&graph, 0.0), 1);
		assert_eq!(registry.sounding_count(&graph, 0.5), 2);

		graph.remove_node(now);
		assert_eq!(registry.sounding_count(&graph, 0.5), 1);

		registry.release_all(&mut graph, 0.6);
		assert!(registry.is_empty());
		assert_eq!(registry.total_inserted(), 2);
	}

	#[test]
	fn reap_forgets_removed_nodes() {
		let mut graph = NodeGraph::new();
		let mut registry = NodeRegistry::new();

		let a = graph.add_node(OscillatorNode::sine(220.0), Schedule::between(0.0, 1.0));
		let b = graph.add_node(OscillatorNode::sine(330.0), Schedule::between(0.0, 1.0));
		registry.insert(a);
		registry.insert(b);

		graph.remove_node(a);
		assert_eq!(registry.sounding_count(&graph, 0.0), 1);
		assert_eq!(registry.len(), 2);

		assert_eq!(registry.reap(&graph), 1);
		assert_eq!(registry.iter().collect::<Vec<_>>(), vec![b]);
	}
}
