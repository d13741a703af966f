use crate::prelude::*;
use crate::audio::nodes::ProcessContext;
use crate::audio::intermediate_buffer::IntermediateBuffer;
use crate::audio::node_graph::{NodeConnectivityGraph, NodeKey, NodeSlots};
use crate::audio::system::EvaluationContext;

use petgraph::graph::NodeIndex;
use smallvec::SmallVec;


struct WorkItem {
	node_key: NodeKey,

	/// Indices of earlier work items whose output feeds this one.
	inputs: SmallVec<[usize; 4]>,
}


/// Flattened evaluation order for the node graph.
/// Every work item comes after all of its inputs, so buffers can be split into
/// 'already evaluated' and 'being evaluated' halves as execution proceeds.
pub(in crate::audio) struct ExecutionGraph {
	work_items: Vec<WorkItem>,
	buffers: Vec<IntermediateBuffer>,
	block_size: usize,
}

impl ExecutionGraph {
	pub fn empty() -> ExecutionGraph {
		ExecutionGraph {
			work_items: Vec::new(),
			buffers: Vec::new(),
			block_size: 0,
		}
	}

	pub fn block_size(&self) -> usize {
		self.block_size
	}

	#[instrument(skip_all, name = "synthbox::ExecutionGraph::rebuild")]
	pub fn rebuild(&mut self, graph: &NodeConnectivityGraph, nodes: &NodeSlots, eval_ctx: &EvaluationContext,
		output_node_index: NodeIndex, block_size: usize)
	{
		use petgraph::Direction;
		use petgraph::visit::NodeIndexable;
		use petgraph::algo::{has_path_connecting, toposort, DfsSpace};

		self.work_items.clear();
		self.block_size = block_size;

		let order = match toposort(graph, None) {
			Ok(order) => order,
			Err(cycle) => {
				log::error!("Node graph contains a cycle at {:?}, rendering silence", cycle.node_id());
				self.buffers.clear();
				return
			}
		};

		let mut work_item_for_node: Vec<Option<usize>> = vec![None; graph.node_bound()];
		let mut dfs = DfsSpace::new(graph);

		for node_index in order {
			// Nodes that can't reach the output would be wasted work.
			if node_index != output_node_index
				&& !has_path_connecting(graph, node_index, output_node_index, Some(&mut dfs))
			{
				continue
			}

			let inputs = graph.neighbors_directed(node_index, Direction::Incoming)
				.filter_map(|input_index| work_item_for_node[input_index.index()])
				.collect();

			work_item_for_node[node_index.index()] = Some(self.work_items.len());
			self.work_items.push(WorkItem {
				node_key: graph[node_index],
				inputs,
			});
		}

		self.buffers.resize_with(self.work_items.len(), IntermediateBuffer::new);

		for (buffer, item) in self.buffers.iter_mut().zip(&self.work_items) {
			let stereo = nodes[item.node_key].node.has_stereo_output(eval_ctx);
			buffer.reformat(block_size, stereo);
		}

		log::trace!("Rebuilt execution graph: {} work items", self.work_items.len());
	}

	/// Evaluate every node once, returning the output node's interleaved stereo buffer.
	pub fn process(&mut self, nodes: &mut NodeSlots, eval_ctx: &EvaluationContext, block_time: f64) -> &[f32] {
		for (item_index, item) in self.work_items.iter().enumerate() {
			let (evaluated, remaining) = self.buffers.split_at_mut(item_index);
			let output = &mut remaining[0];

			let inputs: SmallVec<[&IntermediateBuffer; 8]> = item.inputs.iter()
				.map(|&input_index| &evaluated[input_index])
				.collect();

			let slot = &mut nodes[item.node_key];
			let active_frames = slot.schedule.active_frames(block_time, self.block_size, eval_ctx.sample_rate);

			slot.node.process(ProcessContext {
				eval_ctx,
				inputs: &inputs,
				output,
				block_time,
				active_frames: active_frames.clone(),
			});

			output.silence_outside(active_frames);
		}

		// The output node is a sink, so it always sorts last.
		match self.buffers[..self.work_items.len()].last() {
			Some(buffer) => &buffer[..],
			None => &[],
		}
	}
}
