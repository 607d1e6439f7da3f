//! Rendered tree construction from a resolved set of block versions.
//!
//! Versions are grouped by parent and each sibling group is ordered by sort
//! key (block id breaks ties). Traversal starts at the root and keeps a
//! visited set: reaching a block a second time yields a `Cycle` leaf, and
//! state entries without a persisted version surface as `Missing` leaves
//! under the root.

use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::warn;

use crate::constants::{CYCLE_PLACEHOLDER, MISSING_PLACEHOLDER};
use crate::types::{BlockId, BlockIdentity, BlockNode, BlockVer, BlockVersion, RenderedNode};

/// Inputs of one tree build
pub(crate) struct TreeInput {
    /// Root block of the document
    pub root_id: BlockId,
    /// Versions named by the resolved state that were found
    pub versions: HashMap<BlockId, BlockVersion>,
    /// State entries whose version could not be loaded
    pub missing: BTreeMap<BlockId, BlockVer>,
    /// Identities of the document's blocks
    pub identities: HashMap<BlockId, BlockIdentity>,
    /// Keep deleted blocks and their subtrees
    pub include_deleted: bool,
}

struct TreeBuilder<'a> {
    versions: &'a HashMap<BlockId, BlockVersion>,
    children: HashMap<&'a BlockId, Vec<&'a BlockVersion>>,
    identities: &'a HashMap<BlockId, BlockIdentity>,
    include_deleted: bool,
    visited: HashSet<BlockId>,
}

impl<'a> TreeBuilder<'a> {
    fn new(input: &'a TreeInput) -> Self {
        let mut children: HashMap<&BlockId, Vec<&BlockVersion>> = HashMap::new();
        for version in input.versions.values() {
            if version.is_self_parented() {
                continue;
            }
            children.entry(&version.parent_id).or_default().push(version);
        }
        for group in children.values_mut() {
            group.sort_by(|a, b| {
                a.sort_key
                    .cmp(&b.sort_key)
                    .then_with(|| a.block_id.cmp(&b.block_id))
            });
        }

        Self {
            versions: &input.versions,
            children,
            identities: &input.identities,
            include_deleted: input.include_deleted,
            visited: HashSet::new(),
        }
    }

    fn is_deleted(&self, block_id: &BlockId) -> bool {
        self.identities
            .get(block_id)
            .map(|identity| identity.is_deleted)
            .unwrap_or(false)
    }

    /// Render `block_id` and its subtree; `None` when the block is hidden
    fn build(&mut self, block_id: &BlockId) -> Option<RenderedNode> {
        if !self.visited.insert(block_id.clone()) {
            warn!(block_id = %block_id, "Cycle in parent chain, emitting sentinel");
            return Some(RenderedNode::Cycle {
                block_id: block_id.clone(),
                text: CYCLE_PLACEHOLDER.to_string(),
            });
        }

        let versions = self.versions;
        let version = versions.get(block_id)?;
        let is_deleted = self.is_deleted(block_id);
        if is_deleted && !self.include_deleted {
            self.skip_subtree(block_id);
            return None;
        }

        let child_ids: Vec<BlockId> = self
            .children
            .get(block_id)
            .map(|group| group.iter().map(|v| v.block_id.clone()).collect())
            .unwrap_or_default();
        let children = child_ids.iter().filter_map(|id| self.build(id)).collect();

        Some(RenderedNode::Block(BlockNode {
            block_id: version.block_id.clone(),
            block_type: self
                .identities
                .get(block_id)
                .map(|identity| identity.block_type.clone())
                .unwrap_or_default(),
            ver: version.ver,
            parent_id: version.parent_id.clone(),
            sort_key: version.sort_key.clone(),
            indent: version.indent,
            collapsed: version.collapsed,
            payload: version.payload.clone(),
            plain_text: version.plain_text.clone(),
            refs: version.refs.clone(),
            is_deleted,
            children,
        }))
    }

    /// Mark a hidden block's descendants as seen so they are not reported
    /// as unreachable
    fn skip_subtree(&mut self, block_id: &BlockId) {
        let mut stack = vec![block_id.clone()];
        while let Some(id) = stack.pop() {
            if let Some(group) = self.children.get(&id) {
                for child in group {
                    if self.visited.insert(child.block_id.clone()) {
                        stack.push(child.block_id.clone());
                    }
                }
            }
        }
    }
}

fn missing_node(block_id: &BlockId, ver: BlockVer) -> RenderedNode {
    RenderedNode::Missing {
        block_id: block_id.clone(),
        ver,
        text: MISSING_PLACEHOLDER.to_string(),
    }
}

/// Build the rendered tree rooted at `input.root_id`
pub(crate) fn build_tree(input: &TreeInput) -> RenderedNode {
    if let Some(&ver) = input.missing.get(&input.root_id) {
        warn!(block_id = %input.root_id, ver, "Root block version missing");
        return missing_node(&input.root_id, ver);
    }

    let mut builder = TreeBuilder::new(input);
    let mut root = match builder.build(&input.root_id) {
        Some(node) => node,
        None => missing_node(&input.root_id, 0),
    };

    let unreachable = input
        .versions
        .keys()
        .filter(|id| !builder.visited.contains(*id))
        .count();
    if unreachable > 0 {
        warn!(root = %input.root_id, unreachable, "Blocks not reachable from root");
    }

    if let RenderedNode::Block(node) = &mut root {
        for (block_id, &ver) in &input.missing {
            warn!(block_id = %block_id, ver, "Block version missing from storage");
            node.children.push(missing_node(block_id, ver));
        }
    }

    root
}
