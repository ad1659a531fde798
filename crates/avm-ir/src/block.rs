//! Basic blocks and control-flow terminators.

use crate::error::SourceLocation;
use crate::id::BlockId;
use crate::ops::{Assignment, Phi};
use crate::value::{Constant, Value};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// How control leaves a [`BasicBlock`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Terminator {
    Goto(BlockId),
    CondBranch {
        cond: Value,
        zero: BlockId,
        non_zero: BlockId,
    },
    Switch {
        value: Value,
        cases: IndexMap<Constant, BlockId>,
        default: BlockId,
    },
    GotoNth {
        value: Value,
        blocks: Vec<BlockId>,
        default: BlockId,
    },
    SubroutineReturn(Vec<Value>),
    ProgramExit(Value),
    Fail(String),
}

impl Terminator {
    /// The set of blocks this terminator can transfer control to.
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Terminator::Goto(b) => vec![*b],
            Terminator::CondBranch { zero, non_zero, .. } => vec![*zero, *non_zero],
            Terminator::Switch { cases, default, .. } => {
                let mut out: Vec<BlockId> = cases.values().copied().collect();
                out.push(*default);
                out
            }
            Terminator::GotoNth { blocks, default, .. } => {
                let mut out = blocks.clone();
                out.push(*default);
                out
            }
            Terminator::SubroutineReturn(_)
            | Terminator::ProgramExit(_)
            | Terminator::Fail(_) => vec![],
        }
    }
}

/// `(id, ops, phis, terminator, predecessors, successors, source_loc)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicBlock {
    pub id: BlockId,
    pub phis: Vec<Phi>,
    pub ops: Vec<Assignment>,
    pub terminator: Terminator,
    pub predecessors: Vec<BlockId>,
    pub successors: Vec<BlockId>,
    pub source_loc: Option<SourceLocation>,
}

impl BasicBlock {
    pub fn new(id: BlockId, terminator: Terminator) -> Self {
        BasicBlock {
            id,
            phis: Vec::new(),
            ops: Vec::new(),
            successors: terminator.successors(),
            terminator,
            predecessors: Vec::new(),
            source_loc: None,
        }
    }

    /// Recomputes `successors` from the terminator. Callers that mutate
    /// `terminator` directly must call this to keep the cached list in
    /// sync; constructors and the lowering/optimizer passes do this for you.
    pub fn refresh_successors(&mut self) {
        self.successors = self.terminator.successors();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn goto_has_one_successor() {
        let term = Terminator::Goto(BlockId(2));
        assert_eq!(term.successors(), vec![BlockId(2)]);
    }

    #[test]
    fn cond_branch_successors_in_zero_nonzero_order() {
        let term = Terminator::CondBranch {
            cond: Value::u64_const(0),
            zero: BlockId(1),
            non_zero: BlockId(2),
        };
        assert_eq!(term.successors(), vec![BlockId(1), BlockId(2)]);
    }

    #[test]
    fn terminal_terminators_have_no_successors() {
        assert!(Terminator::SubroutineReturn(vec![]).successors().is_empty());
        assert!(Terminator::Fail("boom".into()).successors().is_empty());
    }

    #[test]
    fn new_block_initializes_successors_from_terminator() {
        let block = BasicBlock::new(BlockId(0), Terminator::Goto(BlockId(1)));
        assert_eq!(block.successors, vec![BlockId(1)]);
    }

    #[test]
    fn refresh_successors_after_mutation() {
        let mut block = BasicBlock::new(BlockId(0), Terminator::Goto(BlockId(1)));
        block.terminator = Terminator::Goto(BlockId(5));
        block.refresh_successors();
        assert_eq!(block.successors, vec![BlockId(5)]);
    }

    #[test]
    fn serde_roundtrip_terminator() {
        let term = Terminator::GotoNth {
            value: Value::u64_const(2),
            blocks: vec![BlockId(1), BlockId(2)],
            default: BlockId(3),
        };
        let json = serde_json::to_string(&term).unwrap();
        let back: Terminator = serde_json::from_str(&json).unwrap();
        assert_eq!(term, back);
    }
}
