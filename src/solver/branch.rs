//! Branch records extracted from a running trace. A branch is either an
//! explicit two-way conditional or an implicit nil-check point at a pointer
//! dereference (successful, or the panic that ended the run).

use crate::ssa::{BlockId, InstrId, Module, ValueId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Branch {
    /// `direction` is true iff the then-successor was taken.
    If { instr: InstrId, direction: bool },
    /// A dereference that either succeeded or panicked on nil.
    Deref {
        instr: InstrId,
        success: bool,
        pointer: ValueId,
    },
}

impl Branch {
    pub(crate) fn instr(&self) -> InstrId {
        match self {
            Self::If { instr, .. } | Self::Deref { instr, .. } => *instr,
        }
    }

    /// The block the negated decision would enter. `None` for dereference
    /// branches, whose alternative is a panic rather than a block.
    pub(crate) fn other_target(&self, module: &Module) -> Option<BlockId> {
        match self {
            Self::If { instr, direction } => {
                let succs = &module.block(module.instr(*instr).block).succs;
                Some(if *direction { succs[1] } else { succs[0] })
            }
            Self::Deref { .. } => None,
        }
    }
}
