//! Rendered block tree.
//!
//! The tree is a tagged union: normal nodes carry content and children,
//! while `Cycle` and `Missing` are diagnostic leaves emitted when the
//! persisted state cannot be rendered faithfully.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::block::BlockRef;
use super::ids::{BlockId, BlockVer};

/// Content node of a rendered tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockNode {
    /// Block identifier
    pub block_id: BlockId,
    /// Block type tag
    pub block_type: String,
    /// Version rendered
    pub ver: BlockVer,
    /// Parent block
    pub parent_id: BlockId,
    /// Sibling ordering key
    pub sort_key: String,
    /// Indent level
    pub indent: u32,
    /// Collapsed flag
    pub collapsed: bool,
    /// Editor payload
    pub payload: Value,
    /// Extracted plain text
    pub plain_text: String,
    /// Outbound references
    pub refs: Vec<BlockRef>,
    /// Soft-delete flag of the identity (only visible when deleted blocks are rendered)
    pub is_deleted: bool,
    /// Children ordered by sort key
    pub children: Vec<RenderedNode>,
}

/// Node of a rendered tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RenderedNode {
    /// Normal content node
    Block(BlockNode),
    /// Block revisited while building the same tree
    Cycle {
        /// Revisited block
        block_id: BlockId,
        /// Diagnostic placeholder
        text: String,
    },
    /// Block present in the resolved state without a persisted version
    Missing {
        /// Block with no version
        block_id: BlockId,
        /// Version the state map pointed at
        ver: BlockVer,
        /// Diagnostic placeholder
        text: String,
    },
}

impl RenderedNode {
    /// Identifier of the block this node stands for
    pub fn block_id(&self) -> &BlockId {
        match self {
            RenderedNode::Block(node) => &node.block_id,
            RenderedNode::Cycle { block_id, .. } | RenderedNode::Missing { block_id, .. } => block_id,
        }
    }

    /// Children of a content node; sentinels are leaves
    pub fn children(&self) -> &[RenderedNode] {
        match self {
            RenderedNode::Block(node) => &node.children,
            _ => &[],
        }
    }

    /// Content node, if this is one
    pub fn as_block(&self) -> Option<&BlockNode> {
        match self {
            RenderedNode::Block(node) => Some(node),
            _ => None,
        }
    }

    /// True for `Cycle` and `Missing`
    pub fn is_sentinel(&self) -> bool {
        !matches!(self, RenderedNode::Block(_))
    }

    /// Number of nodes in this subtree, sentinels included
    pub fn node_count(&self) -> usize {
        1 + self.children().iter().map(RenderedNode::node_count).sum::<usize>()
    }
}

/// Rendering switches
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions {
    /// Keep soft-deleted blocks (and their subtrees) in the tree
    pub include_deleted: bool,
}
