//! Topology-transforming operations.
//!
//! Everything here is built on the traversal engine: child reordering,
//! multitype-node contraction, subtree collapse and restore, support-based
//! node removal, pruning down to a tip subset, common-ancestor and TMRCA
//! queries, and lineage counting.
//!
//! Operations documented as non-destructive ([`Tree::collapse_branches`],
//! [`Tree::reduce_tree`]) take `&self`, clone the whole arena, and return the
//! modified copy; the caller's tree stays valid even when they fail.

use crate::error::TreeError;
use crate::model::branch::{Branch, BranchKind};
use crate::model::tree::{BranchIndex, Tree};
use crate::model::traverse::TraverseSpec;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

// ============================================================================
// Sorting
// ============================================================================
impl Tree {
    /// Reorders every node's children for plotting and recomputes the layout.
    ///
    /// When `descending`, internal children come first, ordered by descendant
    /// tip count (largest first) and then branch length (shortest first);
    /// tip-like children follow, shortest first. `descending = false` flips
    /// every one of those orderings.
    pub fn sort_branches(&mut self, descending: bool) -> Result<(), TreeError> {
        self.sort_branches_with(descending, None, true)
    }

    /// Reorders children with full control.
    ///
    /// # Arguments
    /// * `descending` - Sort direction (see [Tree::sort_branches])
    /// * `comparator` - When given, replaces the default keys entirely; the
    ///   whole child list is sorted by it (reversed when not `descending`)
    /// * `by_height` - When `false`, tip-like children keep their original
    ///   slots and only internal children are reordered among themselves
    pub fn sort_branches_with(
        &mut self,
        descending: bool,
        comparator: Option<&dyn Fn(&Branch, &Branch) -> Ordering>,
        by_height: bool,
    ) -> Result<(), TreeError> {
        self.traverse()?;

        let sign = if descending { 1.0 } else { -1.0 };
        for i in self.internal_branches() {
            let children = self[i].children().to_vec();
            let sorted = if let Some(compare) = comparator {
                let mut all = children;
                all.sort_by(|&a, &b| {
                    let ord = compare(&self[a], &self[b]);
                    if descending { ord } else { ord.reverse() }
                });
                all
            } else {
                let mut internals: Vec<BranchIndex> =
                    children.iter().copied().filter(|&c| self[c].is_node()).collect();
                internals.sort_by(|&a, &b| {
                    let ka = (-(self[a].leaf_count() as f64) * sign, self[a].length * sign);
                    let kb = (-(self[b].leaf_count() as f64) * sign, self[b].length * sign);
                    ka.partial_cmp(&kb).unwrap_or(Ordering::Equal)
                });
                let mut tips: Vec<BranchIndex> = children
                    .iter()
                    .copied()
                    .filter(|&c| self[c].is_leaflike())
                    .collect();
                tips.sort_by(|&a, &b| {
                    (self[a].length * sign)
                        .partial_cmp(&(self[b].length * sign))
                        .unwrap_or(Ordering::Equal)
                });

                if by_height {
                    if descending {
                        internals.extend(tips);
                        internals
                    } else {
                        tips.extend(internals);
                        tips
                    }
                } else {
                    // tips stay put, internals rotate through internal slots
                    let mut next_internal = internals.into_iter();
                    children
                        .iter()
                        .map(|&c| {
                            if self[c].is_node() {
                                next_internal.next().expect("one slot per internal child")
                            } else {
                                c
                            }
                        })
                        .collect()
                }
            };
            *self[i].children_mut().expect("internal branch") = sorted;
        }

        // y positions changed with the ordering
        self.draw_tree()
    }
}

// ============================================================================
// Multitype contraction
// ============================================================================
impl Tree {
    /// Splices out every node with exactly one child, summing lengths, until
    /// none remain; re-roots when the root itself is a singleton chain.
    /// Ends with a branch sort.
    pub fn single_type(&mut self) -> Result<(), TreeError> {
        loop {
            let singleton = self
                .objects
                .iter()
                .copied()
                .find(|&i| self[i].is_node() && self[i].children().len() == 1);
            let Some(node) = singleton else { break };

            let child = self[node].children()[0];
            let extra = self[node].length;
            self[child].length += extra;
            match self[node].parent {
                Some(parent) => {
                    self[child].parent = Some(parent);
                    self.replace_child(parent, node, child);
                }
                None => {
                    self[child].parent = None;
                    self.root = child;
                }
            }
            self.unregister(node);
        }

        self.sort_branches(true)
    }
}

// ============================================================================
// Collapse / uncollapse
// ============================================================================
impl Tree {
    /// Collapses the entire descent of `node` into a single [BranchKind::Clade]
    /// placeholder named `name`, returning the clade's id.
    ///
    /// The clade remembers the detached branches, the descendant tip names,
    /// and the height/absolute time of the highest collapsed tip, so
    /// [Tree::uncollapse_subtree] can restore the original topology exactly.
    ///
    /// # Arguments
    /// * `node` - The node to collapse; must be internal and not the root
    /// * `name` - The pretend tip name for the clade
    /// * `width_fn` - Optional display width for the clade, computed from the
    ///   detached subtree; defaults to 1
    ///
    /// # Errors
    /// [TreeError::NotANode] if `node` is tip-like,
    /// [TreeError::CollapseWholeTree] if `node` is the root.
    pub fn collapse_subtree(
        &mut self,
        node: BranchIndex,
        name: &str,
        width_fn: Option<&dyn Fn(&Tree, &[BranchIndex]) -> f64>,
    ) -> Result<BranchIndex, TreeError> {
        if !self[node].is_node() {
            return Err(TreeError::NotANode(node));
        }
        if node == self.root || self[node].parent.is_none() {
            return Err(TreeError::CollapseWholeTree(node));
        }

        self.traverse()?;
        let subtree = self.traverse_with(&TraverseSpec::all_from(node))?;

        let last_height = subtree
            .iter()
            .filter_map(|&i| self[i].height)
            .fold(None, |best: Option<f64>, h| Some(best.map_or(h, |b| b.max(h))));
        let last_absolute_time = subtree
            .iter()
            .filter_map(|&i| self[i].absolute_time)
            .fold(None, |best: Option<f64>, t| Some(best.map_or(t, |b| b.max(t))));
        let width = width_fn.map(|f| f(self, &subtree));

        let parent = self[node].parent;
        let clade = self.register_clade(name, parent);
        self[clade].length = self[node].length;
        self[clade].height = self[node].height;
        self[clade].absolute_time = self[node].absolute_time;
        self[clade].traits = self[node].traits.clone();
        let snapshot_leaves = self[node].leaf_names().cloned().unwrap_or_default();
        if let BranchKind::Clade {
            subtree: slot_subtree,
            leaves,
            last_height: slot_last_height,
            last_absolute_time: slot_last_time,
            width: slot_width,
            ..
        } = &mut self[clade].kind
        {
            *slot_subtree = subtree.clone();
            *leaves = snapshot_leaves;
            *slot_last_height = last_height;
            *slot_last_time = last_absolute_time;
            if let Some(w) = width {
                *slot_width = w;
            }
        }

        let parent = parent.expect("checked non-root above");
        self.replace_child(parent, node, clade);
        for &i in &subtree {
            self.unregister(i);
        }

        Ok(clade)
    }

    /// Restores every collapsed clade by re-splicing its stored subtree.
    pub fn uncollapse_subtree(&mut self) -> Result<(), TreeError> {
        loop {
            let collapsed = self.objects.iter().copied().find(|&i| {
                matches!(self[i].kind, BranchKind::Clade { .. })
            });
            let Some(clade) = collapsed else { break };

            let subtree = match &self[clade].kind {
                BranchKind::Clade { subtree, .. } => subtree.clone(),
                _ => unreachable!(),
            };
            let node = subtree[0];
            if let Some(parent) = self[clade].parent {
                self.replace_child(parent, clade, node);
            }
            self.unregister(clade);
            for &i in &subtree {
                self.reregister(i);
            }
        }

        self.traverse()?;
        Ok(())
    }
}

// ============================================================================
// Support-based node removal
// ============================================================================
impl Tree {
    /// Returns a copy of this tree with matching internal nodes dissolved:
    /// each one's children are lifted onto its parent with lengths summed,
    /// and the candidate set is recomputed until no node matches.
    ///
    /// With an empty `explicit` list, candidates are non-root internal nodes
    /// matching `predicate` (default: `support` trait at most 0.5). With an
    /// explicit list, exactly those nodes are dissolved.
    ///
    /// # Errors
    /// [TreeError::RootCollapse] if the explicit list names the root,
    /// [TreeError::NotANode] if it names a tip-like branch.
    pub fn collapse_branches(
        &self,
        predicate: Option<&dyn Fn(&Branch) -> bool>,
        explicit: &[BranchIndex],
    ) -> Result<Tree, TreeError> {
        let mut tree = self.clone();
        tree.traverse()?;

        if !explicit.is_empty() {
            for &i in explicit {
                if i == tree.root {
                    return Err(TreeError::RootCollapse);
                }
                if !tree[i].is_node() {
                    return Err(TreeError::NotANode(i));
                }
            }
            for &i in explicit {
                if tree.objects.contains(&i) {
                    tree.dissolve_node(i);
                }
            }
        } else {
            let low_support = |branch: &Branch| {
                branch.trait_number("support").is_some_and(|v| v <= 0.5)
            };
            let matches: &dyn Fn(&Branch) -> bool = match predicate {
                Some(p) => p,
                None => &low_support,
            };
            loop {
                let candidates: Vec<BranchIndex> = tree
                    .objects
                    .iter()
                    .copied()
                    .filter(|&i| i != tree.root && tree[i].is_node() && matches(&tree[i]))
                    .collect();
                if candidates.is_empty() {
                    break;
                }
                for i in candidates {
                    tree.dissolve_node(i);
                }
            }
        }

        tree.sort_branches(true)?;
        Ok(tree)
    }

    /// Lifts `node`'s children onto its parent (summing lengths into each
    /// child) at the slot `node` occupied, then drops `node` from the
    /// registry.
    fn dissolve_node(&mut self, node: BranchIndex) {
        let parent = self[node].parent.expect("never called on the root");
        let extra = self[node].length;
        let lifted = self[node].children().to_vec();
        for &child in &lifted {
            self[child].length += extra;
            self[child].parent = Some(parent);
        }
        if let Some(children) = self[parent].children_mut() {
            if let Some(slot) = children.iter().position(|&c| c == node) {
                children.splice(slot..slot + 1, lifted);
            }
        }
        self.unregister(node);
    }
}

// ============================================================================
// Reduction & pruning
// ============================================================================
impl Tree {
    /// Returns a copy of this tree reduced to the minimal embedding of the
    /// given tip-like branches: the union of root-to-tip paths, with every
    /// other branch pruned and empty nodes removed. Single-child nodes are a
    /// legitimate outcome.
    ///
    /// # Errors
    /// [TreeError::EmptyReduction] if `keep` is empty,
    /// [TreeError::NotTipLike] if `keep` contains an internal node.
    pub fn reduce_tree(&self, keep: &[BranchIndex]) -> Result<Tree, TreeError> {
        if keep.is_empty() {
            return Err(TreeError::EmptyReduction);
        }
        for &i in keep {
            if !self[i].is_leaflike() {
                return Err(TreeError::NotTipLike(i));
            }
        }

        let mut tree = self.clone();
        let mut embedding: HashSet<BranchIndex> = HashSet::new();
        for &tip in keep {
            let mut cursor = Some(tip);
            while let Some(i) = cursor {
                embedding.insert(i);
                cursor = tree[i].parent;
            }
        }

        for i in tree.internal_branches() {
            if let Some(children) = tree[i].children_mut() {
                children.retain(|c| embedding.contains(c));
            }
        }
        tree.objects.retain(|i| embedding.contains(i));
        tree.fix_hanging_nodes();

        tree.traverse()?;
        tree.sort_branches(true)?;
        Ok(tree)
    }

    /// Deletes nodes with no remaining children, repeating until none are
    /// left (removing one node can empty its parent). The root is never
    /// deleted.
    pub fn fix_hanging_nodes(&mut self) {
        loop {
            let hanging = self.objects.iter().copied().find(|&i| {
                i != self.root && self[i].is_node() && self[i].children().is_empty()
            });
            let Some(node) = hanging else { break };
            if let Some(parent) = self[node].parent {
                self.detach_child(parent, node);
            }
            self.unregister(node);
        }
    }
}

// ============================================================================
// Ancestry queries
// ============================================================================
impl Tree {
    /// Returns the most recent common ancestor of the given branches: the
    /// highest member of the intersection of their root-ward paths.
    ///
    /// Heights must be current (run a traversal first).
    ///
    /// # Errors
    /// [TreeError::NotEnoughBranches] if fewer than two branches are given.
    pub fn common_ancestor(&self, branches: &[BranchIndex]) -> Result<BranchIndex, TreeError> {
        if branches.len() < 2 {
            return Err(TreeError::NotEnoughBranches);
        }

        let path = |start: BranchIndex| -> HashSet<BranchIndex> {
            let mut seen = HashSet::new();
            let mut cursor = Some(start);
            while let Some(i) = cursor {
                seen.insert(i);
                cursor = self[i].parent;
            }
            seen
        };

        let mut shared = path(branches[0]);
        for &branch in &branches[1..] {
            let other = path(branch);
            shared.retain(|i| other.contains(i));
        }

        shared
            .into_iter()
            .max_by(|&a, &b| {
                let ha = self[a].height.unwrap_or(f64::NEG_INFINITY);
                let hb = self[b].height.unwrap_or(f64::NEG_INFINITY);
                ha.partial_cmp(&hb).unwrap_or(Ordering::Equal)
            })
            .ok_or(TreeError::NotEnoughBranches)
    }

    /// Computes the symmetric tip-by-tip matrix of most recent common
    /// ancestor times: for every unordered tip pair, the latest
    /// `absolute_time` among nodes whose descendant set contains both.
    ///
    /// An entry not covered by any calibrated node stays 0.0; the diagonal
    /// is 0.0. Calibrate with [Tree::set_absolute_time] first.
    pub fn all_tmrcas(&self) -> HashMap<String, HashMap<String, f64>> {
        let tips = self.tip_names();
        let tip_set: HashSet<&String> = tips.iter().collect();

        let mut latest: HashMap<(String, String), Option<f64>> = HashMap::new();
        for &i in &self.objects {
            if !self[i].is_node() {
                continue;
            }
            let Some(time) = self[i].absolute_time else {
                continue;
            };
            let names: Vec<&String> = self[i]
                .leaf_names()
                .map(|leaves| leaves.iter().filter(|n| tip_set.contains(n)).collect())
                .unwrap_or_default();
            for x in 0..names.len() {
                for y in (x + 1)..names.len() {
                    let key = (names[x].clone(), names[y].clone());
                    let entry = latest.entry(key).or_insert(None);
                    if entry.is_none_or(|current| current <= time) {
                        *entry = Some(time);
                    }
                }
            }
        }

        let mut matrix: HashMap<String, HashMap<String, f64>> = tips
            .iter()
            .map(|a| (a.clone(), tips.iter().map(|b| (b.clone(), 0.0)).collect()))
            .collect();
        for ((a, b), time) in latest {
            let time = time.unwrap_or(0.0);
            if let Some(row) = matrix.get_mut(&a) {
                row.insert(b.clone(), time);
            }
            if let Some(row) = matrix.get_mut(&b) {
                row.insert(a, time);
            }
        }
        matrix
    }

    /// Counts lineages crossing time `t` on the absolute-time axis: branches
    /// whose parent ends before `t` while they themselves persist to `t` or
    /// beyond.
    pub fn count_lineages(&self, t: f64) -> usize {
        self.count_lineages_with(t, &|branch| branch.absolute_time, &|_| true)
    }

    /// Counts lineages crossing time `t` on a caller-chosen time axis,
    /// restricted to branches matching `condition`.
    pub fn count_lineages_with(
        &self,
        t: f64,
        attr: &dyn Fn(&Branch) -> Option<f64>,
        condition: &dyn Fn(&Branch) -> bool,
    ) -> usize {
        self.objects
            .iter()
            .filter(|&&i| {
                let branch = &self[i];
                let Some(parent) = branch.parent else {
                    return false;
                };
                let (Some(parent_value), Some(value)) = (attr(&self[parent]), attr(branch)) else {
                    return false;
                };
                parent_value < t && value >= t && condition(branch)
            })
            .count()
    }
}
