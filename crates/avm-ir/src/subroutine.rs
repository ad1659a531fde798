//! Subroutines, programs, and contracts.

use crate::block::BasicBlock;
use crate::id::BlockId;
use crate::value::{AType, Register};
use petgraph::stable_graph::StableDiGraph;
use serde::{Deserialize, Serialize};

/// `(name, params, returns, body)`. `body[0]` is the entry block. Every
/// register used is either a parameter, defined in this subroutine, or a
/// constant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subroutine {
    pub name: String,
    pub params: Vec<Register>,
    pub returns: Vec<AType>,
    pub body: Vec<BasicBlock>,
}

impl Subroutine {
    pub fn new(name: impl Into<String>, params: Vec<Register>, returns: Vec<AType>, body: Vec<BasicBlock>) -> Self {
        Subroutine {
            name: name.into(),
            params,
            returns,
            body,
        }
    }

    pub fn entry(&self) -> &BasicBlock {
        &self.body[0]
    }

    pub fn block(&self, id: BlockId) -> Option<&BasicBlock> {
        self.body.iter().find(|b| b.id == id)
    }

    pub fn block_mut(&mut self, id: BlockId) -> Option<&mut BasicBlock> {
        self.body.iter_mut().find(|b| b.id == id)
    }

    /// Builds a borrow-free control-flow graph over this subroutine's
    /// blocks, for use by dominance/reachability/liveness algorithms in the
    /// optimizer and codegen crates. Recomputed on demand rather than kept
    /// permanently in sync with `body`, so there is exactly one owner of
    /// block content and no risk of the two representations drifting apart.
    pub fn cfg(&self) -> StableDiGraph<BlockId, (), u32> {
        let mut g = StableDiGraph::with_capacity(self.body.len(), self.body.len() * 2);
        let mut index_of = std::collections::HashMap::new();
        for block in &self.body {
            let idx = g.add_node(block.id);
            index_of.insert(block.id, idx);
        }
        for block in &self.body {
            let from = index_of[&block.id];
            for succ in &block.successors {
                if let Some(&to) = index_of.get(succ) {
                    g.add_edge(from, to, ());
                }
            }
        }
        g
    }

    /// All blocks reachable from the entry block.
    pub fn reachable_blocks(&self) -> std::collections::HashSet<BlockId> {
        let mut seen = std::collections::HashSet::new();
        let mut stack = vec![self.entry().id];
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            if let Some(b) = self.block(id) {
                for succ in &b.successors {
                    if !seen.contains(succ) {
                        stack.push(*succ);
                    }
                }
            }
        }
        seen
    }
}

/// `(id, main, subroutines)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub id: String,
    pub main: Subroutine,
    pub subroutines: Vec<Subroutine>,
}

impl Program {
    pub fn all_subroutines(&self) -> impl Iterator<Item = &Subroutine> {
        std::iter::once(&self.main).chain(self.subroutines.iter())
    }

    pub fn all_subroutines_mut(&mut self) -> impl Iterator<Item = &mut Subroutine> {
        std::iter::once(&mut self.main).chain(self.subroutines.iter_mut())
    }

    pub fn find(&self, name: &str) -> Option<&Subroutine> {
        self.all_subroutines().find(|s| s.name == name)
    }
}

/// State-schema totals tracked alongside a program, consumed by both the
/// MIR builder's compiled-reference embedding and the ARC4 metadata output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StateTotals {
    pub global_ints: u32,
    pub global_bytes: u32,
    pub local_ints: u32,
    pub local_bytes: u32,
}

/// A container holding approval and clear-state programs plus metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    pub name: String,
    pub approval: Program,
    pub clear_state: Program,
    pub state_totals: StateTotals,
}
