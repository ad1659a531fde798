//! Newtype identifiers used by the IR model.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a [`crate::BasicBlock`] within the [`crate::Subroutine`] that
/// owns it. IDs are unique within a subroutine but not across subroutines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockId(pub u32);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "block{}", self.0)
    }
}

impl From<BlockId> for petgraph::graph::NodeIndex<u32> {
    fn from(id: BlockId) -> Self {
        petgraph::graph::NodeIndex::new(id.0 as usize)
    }
}

impl From<petgraph::graph::NodeIndex<u32>> for BlockId {
    fn from(idx: petgraph::graph::NodeIndex<u32>) -> Self {
        BlockId(idx.index() as u32)
    }
}
