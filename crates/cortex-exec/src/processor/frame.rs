//! Call frames.

use cortex_core::{LinkKey, NeuronId, Selection};

/// What opened a frame; decides how control transfer instructions unwind.
#[derive(Debug, Clone)]
pub enum FrameKind {
    /// Opened by a top-level run.
    Root,
    /// A synchronous call of a code cluster.
    Call { code: NeuronId },
    /// Rule code executing for one link while a neuron is being solved.
    Link { key: LinkKey },
    /// The selected part of an `If` or `Case`.
    Branch { conditional: NeuronId },
    /// A `Loop`, re-selecting a part after every pass.
    Loop { conditional: NeuronId },
    /// A `ForEach` walking its collection snapshot.
    ForEach {
        conditional: NeuronId,
        variable: NeuronId,
        body: NeuronId,
        items: Selection<NeuronId>,
    },
}

impl FrameKind {
    /// Frames that `Return` unwinds to, and that other control transfers
    /// never cross.
    pub fn is_callable(&self) -> bool {
        matches!(self, FrameKind::Root | FrameKind::Call { .. } | FrameKind::Link { .. })
    }

    pub fn is_branching(&self) -> bool {
        matches!(
            self,
            FrameKind::Branch { .. } | FrameKind::Loop { .. } | FrameKind::ForEach { .. }
        )
    }

    pub fn is_loop(&self) -> bool {
        matches!(self, FrameKind::Loop { .. } | FrameKind::ForEach { .. })
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Frame {
    pub kind: FrameKind,
    /// Height of the instruction stack when the frame was opened; the
    /// frame owns every block above it.
    pub block_base: usize,
    /// Bindings replaced inside this frame, restored in reverse on exit.
    pub saved: Vec<(NeuronId, Option<Vec<NeuronId>>)>,
}

impl Frame {
    pub fn new(kind: FrameKind, block_base: usize) -> Self {
        Frame {
            kind,
            block_base,
            saved: Vec::new(),
        }
    }
}
