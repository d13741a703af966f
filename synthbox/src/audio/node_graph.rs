use crate::prelude::*;
use crate::audio::nodes::*;
use crate::audio::param::AudioParam;
use crate::audio::system::EvaluationContext;
use crate::audio::execution_graph::ExecutionGraph;

use petgraph::stable_graph::StableGraph;
use petgraph::graph::NodeIndex;


slotmap::new_key_type! {
	pub(in crate::audio) struct NodeKey;
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct NodeId {
	index: NodeIndex,
	key: NodeKey,
}


/// When a node is audible, in sample clock seconds. Output is silenced outside [start, stop).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Schedule {
	pub start: f64,
	pub stop: Option<f64>,
}

impl Schedule {
	pub fn always() -> Schedule {
		Schedule { start: f64::NEG_INFINITY, stop: None }
	}

	pub fn starting_at(start: f64) -> Schedule {
		Schedule { start, stop: None }
	}

	pub fn between(start: f64, stop: f64) -> Schedule {
		Schedule { start, stop: Some(stop) }
	}

	/// Frames of a block starting at `block_time` that fall inside this schedule.
	pub(in crate::audio) fn active_frames(&self, block_time: f64, frames: usize, sample_rate: f32) -> std::ops::Range<usize> {
		let to_frame = |time: f64| ((time - block_time) * sample_rate as f64).ceil().clamp(0.0, frames as f64) as usize;

		let start = to_frame(self.start);
		let end = self.stop.map_or(frames, to_frame);

		start..end.max(start)
	}
}


pub(in crate::audio) struct NodeSlot {
	pub node: Box<dyn Node>,
	pub schedule: Schedule,

	/// Node won't be culled even if it has no incoming connections or nothing reaches it.
	pub pinned: bool,
}


pub(in crate::audio) type NodeConnectivityGraph = StableGraph<NodeKey, (), petgraph::Directed>;
pub(in crate::audio) type NodeSlots = slotmap::SlotMap<NodeKey, NodeSlot>;

pub struct NodeGraph {
	connectivity: NodeConnectivityGraph,
	nodes: NodeSlots,

	output_node_key: NodeKey,
	output_node_index: NodeIndex,

	execution_graph: ExecutionGraph,

	/// If this is true, execution_graph is no longer safe to use and must be rebuilt.
	topology_dirty: bool,
}


// Public API.
impl NodeGraph {
	pub fn new() -> NodeGraph {
		let mut connectivity = StableGraph::new();
		let mut nodes = NodeSlots::with_key();

		let output_node_key = nodes.insert(NodeSlot {
			node: Box::new(MixerNode::new_stereo(1.0)),
			schedule: Schedule::always(),
			pinned: true,
		});

		let output_node_index = connectivity.add_node(output_node_key);

		NodeGraph {
			connectivity,
			nodes,
			output_node_key,
			output_node_index,

			execution_graph: ExecutionGraph::empty(),

			topology_dirty: true,
		}
	}

	pub fn output_node(&self) -> NodeId {
		NodeId {
			index: self.output_node_index,
			key: self.output_node_key,
		}
	}

	pub fn add_node(&mut self, node: impl Node, schedule: Schedule) -> NodeId {
		let node_key = self.nodes.insert(NodeSlot {
			node: Box::new(node),
			schedule,
			pinned: false,
		});

		let node_index = self.connectivity.add_node(node_key);
		self.topology_dirty = true;

		NodeId { index: node_index, key: node_key }
	}

	pub fn add_send(&mut self, node: NodeId, target: NodeId) {
		if !self.contains(node) || !self.contains(target) {
			log::warn!("Trying to connect a node that no longer exists");
			return
		}

		self.connectivity.add_edge(node.index, target.index, ());
		self.topology_dirty = true;
	}

	pub fn add_send_chain(&mut self, chain: &[NodeId]) {
		for pair in chain.windows(2) {
			self.add_send(pair[0], pair[1]);
		}
	}

	pub fn pin_node(&mut self, node: NodeId) {
		if let Some(slot) = self.nodes.get_mut(node.key) {
			slot.pinned = true;
		}
	}

	pub fn contains(&self, node: NodeId) -> bool {
		self.nodes.contains_key(node.key)
	}

	pub fn schedule(&self, node: NodeId) -> Option<Schedule> {
		self.nodes.get(node.key).map(|slot| slot.schedule)
	}

	/// Bring a node's stop time forward. Never extends an existing stop time, and does nothing
	/// if the node has already been cleaned up.
	pub fn set_stop_time(&mut self, node: NodeId, stop: f64) {
		if let Some(slot) = self.nodes.get_mut(node.key) {
			let stop = slot.schedule.stop.map_or(stop, |existing| existing.min(stop));
			slot.schedule.stop = Some(stop);
		}
	}

	pub fn param(&self, node: NodeId, kind: ParamKind) -> Option<&AudioParam> {
		self.nodes.get(node.key)?.node.param(kind)
	}

	pub fn param_mut(&mut self, node: NodeId, kind: ParamKind) -> Option<&mut AudioParam> {
		self.nodes.get_mut(node.key)?.node.param_mut(kind)
	}

	pub fn remove_node(&mut self, node: NodeId) {
		assert!(node.index != self.output_node_index, "Trying to remove output node");

		// Graph indices are recycled, so a stale id must not touch whichever node now holds its index.
		if !self.contains(node) {
			return
		}

		if let Some(key) = self.connectivity.remove_node(node.index) {
			assert!(node.key == key);
			self.nodes.remove(key);
			self.topology_dirty = true;
		}
	}

	/// Number of live nodes, not counting pinned infrastructure like the output and bus nodes.
	pub fn node_count(&self) -> usize {
		self.nodes.values()
			.filter(|slot| !slot.pinned)
			.count()
	}
}

// Private API.
impl NodeGraph {
	/// Remove nodes that can no longer contribute to the output, repeating until nothing else becomes removable.
	/// Returns the number of nodes removed.
	#[instrument(skip_all, name = "synthbox::NodeGraph::cleanup_finished_nodes")]
	pub(in crate::audio) fn cleanup_finished_nodes(&mut self, eval_ctx: &EvaluationContext, now: f64) -> usize {
		use petgraph::algo::{has_path_connecting, DfsSpace};
		use petgraph::visit::IntoNodeReferences;

		let mut total_removed = 0;

		loop {
			let mut finished_nodes = Vec::new();
			let mut dfs = DfsSpace::new(&self.connectivity);

			for (node_index, &node_key) in self.connectivity.node_references() {
				if node_index == self.output_node_index {
					continue;
				}

				let node_slot = &self.nodes[node_key];
				if node_slot.pinned {
					continue;
				}

				if let Some(stop) = node_slot.schedule.stop
					&& stop <= now
				{
					finished_nodes.push(NodeId { index: node_index, key: node_key });
					continue;
				}

				match node_slot.node.node_type(eval_ctx) {
					NodeType::Source => if node_slot.node.finished_playing(eval_ctx) {
						finished_nodes.push(NodeId { index: node_index, key: node_key });
						continue;
					}

					// Effects with a stop time are allowed to ring out after losing their inputs.
					NodeType::Effect => if node_slot.schedule.stop.is_none() {
						let num_incoming = self.connectivity.neighbors_directed(node_index, petgraph::Direction::Incoming).count();
						if num_incoming == 0 {
							finished_nodes.push(NodeId { index: node_index, key: node_key });
							continue;
						}
					}
				}

				if !has_path_connecting(&self.connectivity, node_index, self.output_node_index, Some(&mut dfs)) {
					finished_nodes.push(NodeId { index: node_index, key: node_key });
				}
			}

			if finished_nodes.is_empty() {
				break
			}

			total_removed += finished_nodes.len();

			for node in finished_nodes {
				self.remove_node(node);
			}
		}

		if total_removed > 0 {
			log::trace!("Cleaned up {total_removed} nodes, {} remaining", self.node_count());
		}

		total_removed
	}

	#[instrument(skip_all, name = "synthbox::NodeGraph::update_topology")]
	pub(in crate::audio) fn update_topology(&mut self, eval_ctx: &EvaluationContext, block_size: usize) {
		// Recalculate node evaluation order if the topology of the connectivity graph has changed
		if !self.topology_dirty && self.execution_graph.block_size() == block_size {
			return;
		}

		self.execution_graph.rebuild(&self.connectivity, &self.nodes, eval_ctx, self.output_node_index, block_size);
		self.topology_dirty = false;
	}

	#[instrument(skip_all, name = "synthbox::NodeGraph::process")]
	pub(in crate::audio) fn process(&mut self, eval_ctx: &EvaluationContext, block_time: f64) -> &[f32] {
		assert!(!self.topology_dirty);

		self.execution_graph.process(&mut self.nodes, eval_ctx, block_time)
	}
}
