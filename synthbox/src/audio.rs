pub mod system;
pub mod nodes;
pub mod param;
pub mod envelope;
pub mod waveform;
pub mod bus;
pub mod clock;
pub mod util;
pub mod intermediate_buffer;
pub mod node_graph;

mod execution_graph;

pub use system::{AudioEngine, EvaluationContext, GraphContext, Resources, SampleBuffer};
pub use node_graph::{NodeGraph, NodeId, Schedule};
pub use nodes::{Node, NodeType, ParamKind, ProcessContext};
pub use param::{AudioParam, Lfo};
pub use envelope::{Envelope, AR, ASR, Plateau, ENVELOPE_FLOOR, ATTACK_TIME, DECLICK_TIME};
pub use waveform::Waveform;
pub use bus::OutputBus;
pub use clock::{WallClock, SystemClock, ManualClock};
