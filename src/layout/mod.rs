//! Coordinate layout for plotting.
//!
//! The layout engine turns a traversed topology into renderable positions:
//! `x` is height, `y` stacks tips by visit order (or an explicit order) with
//! per-tip widths, and internal branches sit at the unweighted mean of their
//! children. Rendering code reads `x`, `y`, `parent`, `children` and `target`
//! afterwards and never mutates core state.

pub mod untangle;

pub use untangle::untangle;

use crate::error::TreeError;
use crate::model::branch::Branch;
use crate::model::tree::{BranchIndex, Tree};

// =#========================================================================#=
// LAYOUT OPTIONS
// =#========================================================================#=
/// Configuration for [Tree::draw_tree_with].
pub struct LayoutOptions<'a> {
    /// Explicit tip order (by name, top to bottom); the traversal's tip
    /// visit order when `None`
    pub order: Option<&'a [String]>,
    /// Per-tip vertical width override; defaults to 1 for leaves and
    /// `width + 1` for clades and reticulations
    pub width_fn: Option<&'a dyn Fn(&Tree, &Branch) -> f64>,
    /// Extra vertical space reserved before and after the tip block of each
    /// listed node
    pub pad_nodes: &'a [(BranchIndex, f64)],
}

impl Default for LayoutOptions<'_> {
    fn default() -> Self {
        LayoutOptions {
            order: None,
            width_fn: None,
            pad_nodes: &[],
        }
    }
}

// ============================================================================
// Rectangular layout (pub)
// ============================================================================
impl Tree {
    /// Assigns plotting coordinates with default options.
    ///
    /// See [Tree::draw_tree_with].
    pub fn draw_tree(&mut self) -> Result<(), TreeError> {
        self.draw_tree_with(&LayoutOptions::default())
    }

    /// Assigns plotting coordinates to every branch.
    ///
    /// Tips are stacked vertically in order, each centered in a slot of its
    /// own width, with the cumulative stack height recorded as the tree's
    /// `y_span`. Internal branches resolve to the unweighted mean of their
    /// children's `y` in repeated passes over nodes whose children are all
    /// resolved. The root receives a synthetic stem
    /// `x = min(child.x - child.length)`.
    ///
    /// # Errors
    /// [TreeError::UnknownTip] if an explicit order names a tip that does
    /// not exist; [TreeError::LayoutStuck] if a full pass resolves nothing,
    /// which indicates a cycle or a disconnected branch.
    pub fn draw_tree_with(&mut self, opts: &LayoutOptions) -> Result<(), TreeError> {
        let visit_order = self.traverse()?;
        let order: Vec<BranchIndex> = match opts.order {
            None => visit_order,
            Some(names) => {
                let externals = self.external_branches();
                names
                    .iter()
                    .map(|name| {
                        externals
                            .iter()
                            .copied()
                            .find(|&i| self[i].name() == Some(name.as_str()))
                            .ok_or_else(|| TreeError::UnknownTip(name.clone()))
                    })
                    .collect::<Result<_, _>>()?
            }
        };

        for &i in &self.objects.clone() {
            self[i].x = None;
            self[i].y = None;
        }

        // padding attaches to the first and last stacked tip of each padded node
        let mut pad_before = vec![0.0; order.len()];
        let mut pad_after = vec![0.0; order.len()];
        for &(node, pad) in opts.pad_nodes {
            let slots: Vec<usize> = order
                .iter()
                .enumerate()
                .filter(|&(_, &tip)| match self[node].leaf_names() {
                    Some(leaves) => self[tip].name().is_some_and(|n| leaves.contains(n)),
                    None => node == tip,
                })
                .map(|(slot, _)| slot)
                .collect();
            if let (Some(&first), Some(&last)) = (slots.first(), slots.last()) {
                pad_before[first] += pad;
                pad_after[last] += pad;
            }
        }

        let mut cursor = 0.0;
        for (slot, &tip) in order.iter().enumerate() {
            cursor += pad_before[slot];
            let width = match opts.width_fn {
                Some(f) => f(self, &self[tip]),
                None => self[tip].tip_width().unwrap_or(1.0),
            };
            self[tip].y = Some(cursor + width / 2.0);
            self[tip].x = self[tip].height;
            cursor += width + pad_after[slot];
        }
        self.y_span = cursor;

        let mut unresolved = self.internal_branches();
        while !unresolved.is_empty() {
            let mut resolved_any = false;
            let mut remaining = Vec::with_capacity(unresolved.len());
            for &i in &unresolved {
                let children = self[i].children();
                let ready =
                    !children.is_empty() && children.iter().all(|&c| self[c].y.is_some());
                if ready {
                    let ys: Vec<f64> = self[i]
                        .children()
                        .iter()
                        .filter_map(|&c| self[c].y)
                        .collect();
                    self[i].y = Some(ys.iter().sum::<f64>() / ys.len() as f64);
                    self[i].x = self[i].height;
                    resolved_any = true;
                } else {
                    remaining.push(i);
                }
            }
            if !resolved_any {
                return Err(TreeError::LayoutStuck);
            }
            unresolved = remaining;
        }

        let root = self.root;
        let stem = self[root]
            .children()
            .iter()
            .filter_map(|&c| self[c].x.map(|x| x - self[c].length))
            .fold(None, |best: Option<f64>, x| Some(best.map_or(x, |b| b.min(x))));
        if let Some(x) = stem {
            self[root].x = Some(x);
        }

        Ok(())
    }

    /// Assigns unrooted (radial) plotting coordinates.
    ///
    /// Every branch receives an angular wedge proportional to its descendant
    /// tip count and sits at a polar offset of its own length from its
    /// parent, in the middle of its wedge; wedge angle is distributed
    /// sequentially across siblings.
    pub fn draw_unrooted(&mut self) -> Result<(), TreeError> {
        self.traverse()?;

        for &i in &self.objects.clone() {
            self[i].x = None;
            self[i].y = None;
        }

        let root = self.root;
        let total = self[root].leaf_count().max(1) as f64;
        self[root].x = Some(0.0);
        self[root].y = Some(0.0);

        let mut stack: Vec<(BranchIndex, f64)> = vec![(root, 0.0)];
        while let Some((node, start)) = stack.pop() {
            let px = self[node].x.unwrap_or(0.0);
            let py = self[node].y.unwrap_or(0.0);
            let mut angle = start;
            for &child in &self[node].children().to_vec() {
                let wedge = std::f64::consts::TAU * self[child].leaf_count() as f64 / total;
                let theta = angle + wedge / 2.0;
                let length = self[child].length;
                self[child].x = Some(px + length * theta.cos());
                self[child].y = Some(py + length * theta.sin());
                if self[child].is_node() {
                    stack.push((child, angle));
                }
                angle += wedge;
            }
        }

        Ok(())
    }
}
