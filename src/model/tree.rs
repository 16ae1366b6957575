//! Tree module: the branch arena and flat registry.
//!
//! A [Tree] owns every [Branch] in a single arena addressed by stable
//! [BranchIndex] ids. Parent, child, reticulation-target and clade-subtree
//! links are all ids into that arena, so the branch graph can carry
//! back-references and cross-links without ownership cycles, and a deep copy
//! of the whole graph is a plain `clone()`.

use crate::error::TreeError;
use crate::model::branch::{Branch, BranchKind};
use std::collections::HashMap;

/// Index of a branch in a tree arena.
pub type BranchIndex = usize;

// =#========================================================================#=
// TREE
// =#========================================================================#=
/// A phylogenetic tree or network over a branch arena.
///
/// # Structure
/// - `arena` stores every branch ever created for this tree; slots are never
///   reused, so ids stay valid across removal and across `clone()`.
/// - `objects` is the flat registry of branches currently part of the tree,
///   in creation order. Topology operations remove a branch from `objects`
///   and from its parent's child list atomically; the arena slot remains as
///   storage (a collapsed clade keeps its detached subtree alive this way).
/// - `root` is the branch every traversal starts from. A freshly parsed tree
///   has a synthetic zero-length root node to which the outermost parsed
///   node is attached.
///
/// # Construction
/// The parser (or the `attach_*` methods, for hand-built trees) is the only
/// way branches come into existence. Traversal fills in heights and leaf
/// sets, calibration fills in absolute times, the layout engine fills in
/// `x`/`y`.
#[derive(Debug, Clone)]
pub struct Tree {
    /// Branch storage; slot position is the branch id
    pub(crate) arena: Vec<Branch>,
    /// Registry of live branches in creation order
    pub(crate) objects: Vec<BranchIndex>,
    /// Id of the root branch
    pub(crate) root: BranchIndex,
    /// Tip translation table, retained after renaming
    pub(crate) tip_map: Option<HashMap<String, String>>,
    /// Distance between the root and the most recent tip, set by traversal
    pub(crate) tree_height: f64,
    /// Date of the most recent tip, set by calibration
    pub(crate) most_recent: Option<f64>,
    /// Total vertical extent of the tip stack, set by the layout engine
    pub(crate) y_span: f64,
}

// ============================================================================
// New, Getters / Accessors (pub)
// ============================================================================
impl Tree {
    /// Creates a tree holding only a synthetic root node of length zero.
    pub fn new() -> Self {
        let root = Branch::new_node(None);
        Tree {
            arena: vec![root],
            objects: vec![0],
            root: 0,
            tip_map: None,
            tree_height: 0.0,
            most_recent: None,
            y_span: 0.0,
        }
    }

    /// Returns the id of the root branch.
    pub fn root(&self) -> BranchIndex {
        self.root
    }

    /// Returns the registry of live branches in creation order.
    pub fn objects(&self) -> &[BranchIndex] {
        &self.objects
    }

    /// Returns a reference to the branch with the given id.
    ///
    /// # Panics
    /// Panics if the id was never allocated by this tree.
    pub fn branch(&self, index: BranchIndex) -> &Branch {
        &self.arena[index]
    }

    /// Returns a mutable reference to the branch with the given id.
    ///
    /// # Panics
    /// Panics if the id was never allocated by this tree.
    pub fn branch_mut(&mut self, index: BranchIndex) -> &mut Branch {
        &mut self.arena[index]
    }

    /// Distance between the root and the most recent tip.
    ///
    /// Valid after a traversal; zero on a freshly parsed tree.
    pub fn tree_height(&self) -> f64 {
        self.tree_height
    }

    /// Date of the most recent tip, if the tree has been calibrated.
    pub fn most_recent(&self) -> Option<f64> {
        self.most_recent
    }

    /// Total vertical extent of the tip stack, set by the layout engine.
    pub fn y_span(&self) -> f64 {
        self.y_span
    }

    /// The tip translation table, if one was applied.
    pub fn tip_map(&self) -> Option<&HashMap<String, String>> {
        self.tip_map.as_ref()
    }

    /// Ids of all live tip-like branches (leaves, clades, reticulations),
    /// in creation order.
    pub fn external_branches(&self) -> Vec<BranchIndex> {
        self.objects
            .iter()
            .copied()
            .filter(|&i| self.arena[i].is_leaflike())
            .collect()
    }

    /// Ids of all live internal nodes, in creation order.
    pub fn internal_branches(&self) -> Vec<BranchIndex> {
        self.objects
            .iter()
            .copied()
            .filter(|&i| self.arena[i].is_node())
            .collect()
    }

    /// Names of all live leaves (sampled taxa only).
    pub fn tip_names(&self) -> Vec<String> {
        self.objects
            .iter()
            .filter_map(|&i| {
                let branch = &self.arena[i];
                if branch.is_leaf() {
                    branch.name().map(str::to_string)
                } else {
                    None
                }
            })
            .collect()
    }

    /// Number of live leaves.
    pub fn num_tips(&self) -> usize {
        self.objects.iter().filter(|&&i| self.arena[i].is_leaf()).count()
    }

    /// Number of live internal nodes.
    pub fn num_nodes(&self) -> usize {
        self.internal_branches().len()
    }

    /// Number of live branches of any kind.
    pub fn num_objects(&self) -> usize {
        self.objects.len()
    }
}

impl Default for Tree {
    fn default() -> Self {
        Tree::new()
    }
}

impl std::ops::Index<BranchIndex> for Tree {
    type Output = Branch;

    fn index(&self, index: BranchIndex) -> &Self::Output {
        &self.arena[index]
    }
}

impl std::ops::IndexMut<BranchIndex> for Tree {
    fn index_mut(&mut self, index: BranchIndex) -> &mut Self::Output {
        &mut self.arena[index]
    }
}

// ============================================================================
// Construction (pub; used by the parser)
// ============================================================================
impl Tree {
    fn register(&mut self, branch: Branch) -> BranchIndex {
        let index = self.arena.len();
        self.arena.push(branch);
        self.objects.push(index);
        index
    }

    fn attach(&mut self, parent: BranchIndex, branch: Branch) -> Result<BranchIndex, TreeError> {
        if !self.arena[parent].is_node() {
            return Err(TreeError::NotANode(parent));
        }
        let index = self.register(branch);
        self.arena[parent]
            .children_mut()
            .expect("checked node above")
            .push(index);
        Ok(index)
    }

    /// Attaches a new node under `parent` and returns its id.
    ///
    /// # Errors
    /// [TreeError::NotANode] if `parent` is tip-like.
    pub fn attach_node(&mut self, parent: BranchIndex) -> Result<BranchIndex, TreeError> {
        self.attach(parent, Branch::new_node(Some(parent)))
    }

    /// Attaches a new leaf under `parent` and returns its id.
    ///
    /// # Errors
    /// [TreeError::NotANode] if `parent` is tip-like.
    pub fn attach_leaf(
        &mut self,
        parent: BranchIndex,
        name: impl Into<String>,
    ) -> Result<BranchIndex, TreeError> {
        self.attach(parent, Branch::new_leaf(name, Some(parent)))
    }

    /// Attaches a new reticulate branch under `parent` and returns its id.
    /// The landing point is wired separately once both ends are known.
    ///
    /// # Errors
    /// [TreeError::NotANode] if `parent` is tip-like.
    pub fn attach_reticulation(
        &mut self,
        parent: BranchIndex,
        name: impl Into<String>,
    ) -> Result<BranchIndex, TreeError> {
        self.attach(parent, Branch::new_reticulation(name, Some(parent)))
    }

    /// Registers a clade placeholder without attaching it anywhere;
    /// collapse splices it into place itself.
    pub(crate) fn register_clade(&mut self, name: &str, parent: Option<BranchIndex>) -> BranchIndex {
        self.register(Branch::new_clade(name, parent))
    }
}

// ============================================================================
// Registry surgery (crate-internal; used by topology operations)
// ============================================================================
impl Tree {
    /// Removes a branch from the registry. The arena slot stays allocated.
    pub(crate) fn unregister(&mut self, index: BranchIndex) {
        self.objects.retain(|&i| i != index);
    }

    /// Re-adds a previously unregistered branch at the end of the registry.
    pub(crate) fn reregister(&mut self, index: BranchIndex) {
        if !self.objects.contains(&index) {
            self.objects.push(index);
        }
    }

    /// Replaces `old` with `new` in `parent`'s child list, keeping the slot.
    pub(crate) fn replace_child(
        &mut self,
        parent: BranchIndex,
        old: BranchIndex,
        new: BranchIndex,
    ) {
        if let Some(children) = self.arena[parent].children_mut() {
            for slot in children.iter_mut() {
                if *slot == old {
                    *slot = new;
                    return;
                }
            }
        }
    }

    /// Removes `child` from `parent`'s child list.
    pub(crate) fn detach_child(&mut self, parent: BranchIndex, child: BranchIndex) {
        if let Some(children) = self.arena[parent].children_mut() {
            children.retain(|&c| c != child);
        }
    }
}

// ============================================================================
// Calibration & tip renaming (pub)
// ============================================================================
impl Tree {
    /// Places every branch in absolute time given the date of the most
    /// recent tip. Heights are in units of time from the root, so
    /// `absolute_time = date - tree_height + height`.
    ///
    /// Requires a prior traversal; branches without a height are skipped.
    pub fn set_absolute_time(&mut self, date: f64) {
        let offset = date - self.tree_height;
        for &i in &self.objects.clone() {
            let branch = &mut self.arena[i];
            branch.absolute_time = branch.height.map(|h| offset + h);
            if let BranchKind::Clade {
                last_height,
                last_absolute_time,
                ..
            } = &mut branch.kind
            {
                *last_absolute_time = last_height.map(|h| offset + h);
            }
        }
        self.most_recent = Some(date);
    }

    /// Gives each leaf its proper label using a translation table, retaining
    /// the table as the tree's `tip_map`.
    ///
    /// Cached node leaf sets still hold the old names afterwards; the next
    /// traversal refreshes them.
    pub fn rename_tips(&mut self, translation: &HashMap<String, String>) {
        for &i in &self.objects {
            if let BranchKind::Leaf { name } = &mut self.arena[i].kind {
                if let Some(full) = translation.get(name) {
                    *name = full.clone();
                }
            }
        }
        self.tip_map = Some(translation.clone());
    }
}

// ============================================================================
// Statistics (pub)
// ============================================================================
/// Summary information about a tree, produced by [Tree::stats].
#[derive(Debug, Clone, PartialEq)]
pub struct TreeStats {
    /// Distance between the root and the most recent tip
    pub tree_height: f64,
    /// Sum of all branch lengths
    pub tree_length: f64,
    /// Every node has at most two children
    pub strictly_bifurcating: bool,
    /// At least one node has exactly one child
    pub multitype: bool,
    /// At least one branch carries an annotation
    pub has_traits: bool,
    /// Live branches of any kind
    pub num_objects: usize,
    /// Live internal nodes
    pub num_nodes: usize,
    /// Live tip-like branches
    pub num_tips: usize,
}

impl Tree {
    /// Traverses the tree and reports summary statistics.
    pub fn stats(&mut self) -> Result<TreeStats, TreeError> {
        self.traverse()?;

        let mut tree_length = 0.0;
        let mut max_children = 0;
        let mut min_children = usize::MAX;
        let mut has_traits = false;
        let mut num_nodes = 0;
        for &i in &self.objects {
            let branch = &self.arena[i];
            tree_length += branch.length;
            has_traits |= !branch.traits.is_empty();
            if branch.is_node() {
                num_nodes += 1;
                max_children = max_children.max(branch.children().len());
                // the synthetic root legitimately holds a single child
                if i != self.root {
                    min_children = min_children.min(branch.children().len());
                }
            }
        }

        Ok(TreeStats {
            tree_height: self.tree_height,
            tree_length,
            strictly_bifurcating: max_children <= 2,
            multitype: num_nodes > 0 && min_children == 1,
            has_traits,
            num_objects: self.objects.len(),
            num_nodes,
            num_tips: self.objects.len() - num_nodes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_tip_tree() -> Tree {
        // ((A:1,B:2):1,C:3) under the synthetic root
        let mut tree = Tree::new();
        let top = tree.attach_node(tree.root()).unwrap();
        let inner = tree.attach_node(top).unwrap();
        tree[inner].length = 1.0;
        let a = tree.attach_leaf(inner, "A").unwrap();
        tree[a].length = 1.0;
        let b = tree.attach_leaf(inner, "B").unwrap();
        tree[b].length = 2.0;
        let c = tree.attach_leaf(top, "C").unwrap();
        tree[c].length = 3.0;
        tree
    }

    #[test]
    fn attach_to_leaf_fails() {
        let mut tree = Tree::new();
        let top = tree.attach_node(tree.root()).unwrap();
        let a = tree.attach_leaf(top, "A").unwrap();
        assert_eq!(tree.attach_leaf(a, "B"), Err(TreeError::NotANode(a)));
    }

    #[test]
    fn registry_tracks_creation_order() {
        let tree = three_tip_tree();
        assert_eq!(tree.objects(), &[0, 1, 2, 3, 4, 5]);
        assert_eq!(tree.num_tips(), 3);
        assert_eq!(tree.num_nodes(), 3);
    }

    #[test]
    fn rename_tips_applies_translation() {
        let mut tree = three_tip_tree();
        let translation: HashMap<String, String> = [("A", "taxon_A"), ("C", "taxon_C")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        tree.rename_tips(&translation);
        let mut names = tree.tip_names();
        names.sort();
        assert_eq!(names, ["B", "taxon_A", "taxon_C"]);
        assert!(tree.tip_map().is_some());
    }

    #[test]
    fn calibration_offsets_heights() {
        let mut tree = three_tip_tree();
        tree.traverse().unwrap();
        tree.set_absolute_time(2020.0);
        // C is the most recent tip at height 3
        let c = tree
            .external_branches()
            .into_iter()
            .find(|&i| tree[i].name() == Some("C"))
            .unwrap();
        assert_eq!(tree[c].absolute_time, Some(2020.0));
        assert_eq!(tree.most_recent(), Some(2020.0));
    }

    #[test]
    fn stats_reports_shape() {
        let mut tree = three_tip_tree();
        let stats = tree.stats().unwrap();
        assert_eq!(stats.tree_height, 3.0);
        assert_eq!(stats.tree_length, 7.0);
        assert!(stats.strictly_bifurcating);
        assert!(!stats.multitype);
        assert!(!stats.has_traits);
    }
}
