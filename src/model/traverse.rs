//! Depth-first traversal engine.
//!
//! Traversal is the step that gives a freshly parsed or freshly mutated tree
//! its derived state: per-branch heights, per-node descendant tip sets, and
//! the overall tree height. It is parameterized by an *include* predicate
//! (which visited branches end up in the returned sequence) and a *descend*
//! predicate (which children are entered at all), and runs on an explicit
//! stack so tree depth never translates into call-stack depth.

use crate::error::TreeError;
use crate::model::branch::{Branch, BranchKind};
use crate::model::tree::{BranchIndex, Tree};

// =#========================================================================#=
// TRAVERSE SPEC
// =#========================================================================#=
/// Which visited branches a traversal collects.
#[derive(Default, Clone, Copy)]
pub enum IncludeMode<'a> {
    /// Collect tip-like branches only: the conventional "visit order of tips"
    #[default]
    TipLike,
    /// Collect every visited branch, nodes in pre-order
    All,
    /// Collect branches matching a caller-supplied predicate
    Custom(&'a dyn Fn(&Branch) -> bool),
}

impl IncludeMode<'_> {
    fn admits(&self, branch: &Branch) -> bool {
        match self {
            IncludeMode::TipLike => branch.is_leaflike(),
            IncludeMode::All => true,
            IncludeMode::Custom(predicate) => predicate(branch),
        }
    }
}

/// Configuration for a traversal: where to start, what to collect, and which
/// children to enter.
#[derive(Default)]
pub struct TraverseSpec<'a> {
    /// Branch to start from; the root when `None`
    pub start: Option<BranchIndex>,
    /// Which visited branches to collect
    pub include: IncludeMode<'a>,
    /// Children failing this predicate are not entered; all children are
    /// entered when `None`
    pub descend: Option<&'a dyn Fn(&Branch) -> bool>,
}

impl<'a> TraverseSpec<'a> {
    /// Collects every branch in the descent of `start`.
    pub fn all_from(start: BranchIndex) -> Self {
        TraverseSpec {
            start: Some(start),
            include: IncludeMode::All,
            descend: None,
        }
    }
}

enum Frame {
    Enter(BranchIndex),
    Exit(BranchIndex),
}

// ============================================================================
// Traversal (pub)
// ============================================================================
impl Tree {
    /// Traverses the whole tree from the root with default predicates,
    /// recomputing heights, leaf sets and the tree height, and returns the
    /// tips in visit order.
    ///
    /// # Errors
    /// [TreeError::HangingNode] if a node with no children is encountered.
    pub fn traverse(&mut self) -> Result<Vec<BranchIndex>, TreeError> {
        self.traverse_with(&TraverseSpec::default())
    }

    /// Traverses according to `spec` and returns the collected branches in
    /// visit order.
    ///
    /// A from-root traversal with default predicates first resets every
    /// branch's cached height and every node's leaf set, then recomputes
    /// them; restricted or mid-tree traversals refine the existing state
    /// instead. Heights satisfy `height = parent.height + length` along
    /// every entered path; each node's `child_height` is the maximum
    /// effective height among its entered children, and the root-level
    /// `child_height` of a full traversal becomes the tree height.
    ///
    /// # Errors
    /// [TreeError::HangingNode] if a node with no children is encountered.
    pub fn traverse_with(&mut self, spec: &TraverseSpec) -> Result<Vec<BranchIndex>, TreeError> {
        let start = spec.start.unwrap_or(self.root);
        let full = start == self.root && spec.descend.is_none();

        if full {
            for &i in &self.objects.clone() {
                let branch = &mut self[i];
                branch.height = None;
                if let BranchKind::Node {
                    leaves,
                    child_height,
                    ..
                } = &mut branch.kind
                {
                    leaves.clear();
                    *child_height = None;
                }
            }
        }

        let mut collected = Vec::new();
        let mut stack = vec![Frame::Enter(start)];

        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Enter(i) => {
                    let height = match self[i].parent {
                        Some(p) => self[p].height.unwrap_or(0.0) + self[i].length,
                        None => 0.0,
                    };
                    self[i].height = Some(height);

                    if self[i].is_leaflike() {
                        if spec.include.admits(&self[i]) {
                            collected.push(i);
                        }
                        if i != start {
                            if let (Some(p), Some(name)) =
                                (self[i].parent, self[i].name().map(str::to_string))
                            {
                                if let BranchKind::Node { leaves, .. } = &mut self[p].kind {
                                    leaves.insert(name);
                                }
                            }
                        }
                    } else {
                        let entered = self.entered_children(i, spec.descend);
                        if self[i].children().is_empty() {
                            return Err(TreeError::HangingNode(i));
                        }
                        if spec.include.admits(&self[i]) {
                            collected.push(i);
                        }
                        stack.push(Frame::Exit(i));
                        for &child in entered.iter().rev() {
                            stack.push(Frame::Enter(child));
                        }
                    }
                }
                Frame::Exit(i) => {
                    let entered = self.entered_children(i, spec.descend);
                    let child_height = entered
                        .iter()
                        .filter_map(|&c| self[c].effective_height())
                        .fold(None, |best: Option<f64>, h| {
                            Some(best.map_or(h, |b| b.max(h)))
                        });
                    if let BranchKind::Node {
                        child_height: slot, ..
                    } = &mut self[i].kind
                    {
                        *slot = child_height;
                    }

                    if i != start {
                        if let Some(p) = self[i].parent {
                            let names: Vec<String> = match &self[i].kind {
                                BranchKind::Node { leaves, .. } => {
                                    leaves.iter().cloned().collect()
                                }
                                _ => Vec::new(),
                            };
                            if let BranchKind::Node { leaves, .. } = &mut self[p].kind {
                                leaves.extend(names);
                            }
                        }
                    }
                }
            }
        }

        if full {
            self.tree_height = self[self.root].child_height().unwrap_or(0.0);
        }

        Ok(collected)
    }

    /// Traverses the descent of `start` staying within the starting branch's
    /// value for `trait_name`, returning every visited branch. Children whose
    /// value differs are not entered, which yields the sub-walk localized to
    /// one categorical state (e.g. one phylogeographic location).
    pub fn traverse_within_trait(
        &mut self,
        start: BranchIndex,
        trait_name: &str,
    ) -> Result<Vec<BranchIndex>, TreeError> {
        let stay_within = self[start].traits.get(trait_name).cloned();
        let same_state = |branch: &Branch| -> bool {
            match (&stay_within, branch.traits.get(trait_name)) {
                (Some(want), Some(have)) => want == have,
                (None, None) => true,
                _ => false,
            }
        };
        self.traverse_with(&TraverseSpec {
            start: Some(start),
            include: IncludeMode::All,
            descend: Some(&same_state),
        })
    }

    fn entered_children(
        &self,
        node: BranchIndex,
        descend: Option<&dyn Fn(&Branch) -> bool>,
    ) -> Vec<BranchIndex> {
        self[node]
            .children()
            .iter()
            .copied()
            .filter(|&c| descend.map_or(true, |d| d(&self[c])))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn balanced_tree() -> Tree {
        // ((A:1,B:1):1,(C:1,D:1):1)
        let mut tree = Tree::new();
        let top = tree.attach_node(tree.root()).unwrap();
        let left = tree.attach_node(top).unwrap();
        tree[left].length = 1.0;
        for name in ["A", "B"] {
            let tip = tree.attach_leaf(left, name).unwrap();
            tree[tip].length = 1.0;
        }
        let right = tree.attach_node(top).unwrap();
        tree[right].length = 1.0;
        for name in ["C", "D"] {
            let tip = tree.attach_leaf(right, name).unwrap();
            tree[tip].length = 1.0;
        }
        tree
    }

    #[test]
    fn tips_come_back_in_visit_order() {
        let mut tree = balanced_tree();
        let tips = tree.traverse().unwrap();
        let names: Vec<_> = tips.iter().map(|&i| tree[i].name().unwrap()).collect();
        assert_eq!(names, ["A", "B", "C", "D"]);
    }

    #[test]
    fn heights_add_up_along_every_path() {
        let mut tree = balanced_tree();
        tree.traverse().unwrap();
        for &i in tree.objects() {
            if let Some(p) = tree[i].parent {
                let expected = tree[p].height.unwrap() + tree[i].length;
                assert_eq!(tree[i].height.unwrap(), expected);
            }
        }
        assert_eq!(tree.tree_height(), 2.0);
    }

    #[test]
    fn leaf_sets_union_upward() {
        let mut tree = balanced_tree();
        tree.traverse().unwrap();
        let top = tree[tree.root()].children()[0];
        let names: Vec<_> = tree[top].leaf_names().unwrap().iter().cloned().collect();
        assert_eq!(names, ["A", "B", "C", "D"]);
        for &i in &tree.internal_branches() {
            let mut expected = std::collections::BTreeSet::new();
            for &c in tree[i].children() {
                match tree[c].leaf_names() {
                    Some(leaves) if tree[c].is_node() => expected.extend(leaves.iter().cloned()),
                    _ => {
                        expected.insert(tree[c].name().unwrap().to_string());
                    }
                }
            }
            if !expected.is_empty() {
                assert_eq!(tree[i].leaf_names().unwrap(), &expected);
            }
        }
    }

    #[test]
    fn traversal_is_idempotent() {
        let mut tree = balanced_tree();
        tree.traverse().unwrap();
        let heights: Vec<_> = tree.objects().iter().map(|&i| tree[i].height).collect();
        let tree_height = tree.tree_height();
        tree.traverse().unwrap();
        let again: Vec<_> = tree.objects().iter().map(|&i| tree[i].height).collect();
        assert_eq!(heights, again);
        assert_eq!(tree.tree_height(), tree_height);
    }

    #[test]
    fn hanging_node_is_fatal() {
        let mut tree = Tree::new();
        let top = tree.attach_node(tree.root()).unwrap();
        let empty = tree.attach_node(top).unwrap();
        tree.attach_leaf(top, "A").unwrap();
        assert_eq!(tree.traverse(), Err(TreeError::HangingNode(empty)));
    }

    #[test]
    fn within_trait_walk_stays_local() {
        use crate::model::annotation::TraitValue;
        // ((A,B)X,(C)Y)X with location traits: the walk from the top node
        // must not enter the Y-state subtree
        let mut tree = balanced_tree();
        let top = tree[tree.root()].children()[0];
        let left = tree[top].children()[0];
        let right = tree[top].children()[1];
        for &i in &[top, left] {
            tree[i]
                .traits
                .insert("location".into(), TraitValue::Text("X".into()));
        }
        tree[right]
            .traits
            .insert("location".into(), TraitValue::Text("Y".into()));
        for &c in &tree[left].children().to_vec() {
            tree[c]
                .traits
                .insert("location".into(), TraitValue::Text("X".into()));
        }
        for &c in &tree[right].children().to_vec() {
            tree[c]
                .traits
                .insert("location".into(), TraitValue::Text("Y".into()));
        }

        let visited = tree.traverse_within_trait(top, "location").unwrap();
        assert!(visited.contains(&left));
        assert!(!visited.contains(&right));
    }
}
