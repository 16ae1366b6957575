//! Tanglegram untangling across a list of trees.
//!
//! Walks adjacent tree pairs (wrapping last to first) and, within the later
//! tree of each pair, greedily reorders every node's children to minimise
//! tip-position disagreement with the earlier tree. This is a bounded local
//! heuristic: results depend on the order of the tree list and no global
//! optimum is guaranteed.

use crate::error::TreeError;
use crate::model::tree::{BranchIndex, Tree};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Child-degree limit beyond which permutation enumeration is rejected.
const MAX_UNTANGLE_DEGREE: usize = 10;

/// Number of refinement rounds when the caller does not choose one.
pub const DEFAULT_ITERATIONS: usize = 3;

/// Pairwise tip-position cost; lower is better.
pub type CostFn = dyn Fn(f64, f64) -> f64;

/// Minimises y-axis disagreement between tips of adjacent trees in a list.
///
/// Trees must share tip names but need not share topology or tip counts.
/// Each tree is laid out first; for `iterations` rounds, every adjacent pair
/// (wrapping last to first) is visited and the later tree's nodes, root to
/// tip by increasing height, each keep the child permutation with the lowest
/// mean pairwise cost against the earlier tree's recorded tip positions.
/// The later tree is re-laid-out and its positions re-recorded before the
/// walk moves on.
///
/// # Arguments
/// * `trees` - The tree list, modified in place
/// * `cost_fn` - Position disagreement measure; squared difference if `None`
/// * `iterations` - Refinement rounds; [DEFAULT_ITERATIONS] is the usual pick
///
/// # Errors
/// [TreeError::TooPolytomic] if any node has 10 or more children.
pub fn untangle(
    trees: &mut [Tree],
    cost_fn: Option<&CostFn>,
    iterations: usize,
) -> Result<(), TreeError> {
    if trees.len() < 2 {
        return Ok(());
    }
    let squared_diff = |a: f64, b: f64| (a - b).abs().powi(2);
    let cost: &CostFn = cost_fn.unwrap_or(&squared_diff);

    let mut y_positions: Vec<HashMap<String, f64>> = Vec::with_capacity(trees.len());
    for tree in trees.iter_mut() {
        tree.draw_tree()?;
        y_positions.push(tip_y_positions(tree));
    }

    for _ in 0..iterations {
        let count = trees.len();
        let pairs = (0..count - 1)
            .map(|i| (i, i + 1))
            .chain(std::iter::once((count - 1, 0)));
        for (earlier, later) in pairs {
            let mut internals = trees[later].internal_branches();
            internals.sort_by(|&a, &b| {
                let ha = trees[later][a].height.unwrap_or(0.0);
                let hb = trees[later][b].height.unwrap_or(0.0);
                ha.partial_cmp(&hb).unwrap_or(Ordering::Equal)
            });

            for node in internals {
                let children = trees[later][node].children().to_vec();
                if children.len() >= MAX_UNTANGLE_DEGREE {
                    return Err(TreeError::TooPolytomic(children.len()));
                }
                if children.len() < 2 {
                    continue;
                }

                let mut clade_y: Vec<f64> = trees[later][node]
                    .leaf_names()
                    .map(|leaves| {
                        leaves
                            .iter()
                            .filter_map(|name| y_positions[later].get(name).copied())
                            .collect()
                    })
                    .unwrap_or_default();
                clade_y.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

                let mut best: Option<(f64, Vec<BranchIndex>)> = None;
                for_each_permutation(&children, &mut |permutation| {
                    // tip names as they would stack under this child order
                    let clade_order: Vec<&str> = permutation
                        .iter()
                        .flat_map(|&child| tip_order_of(&trees[later], child))
                        .collect();
                    let assigned: HashMap<&str, f64> = clade_order
                        .iter()
                        .copied()
                        .zip(clade_y.iter().copied())
                        .collect();

                    let tip_costs: Vec<f64> = clade_order
                        .iter()
                        .filter_map(|tip| {
                            let anchor = y_positions[earlier].get(*tip)?;
                            let proposed = assigned.get(tip)?;
                            Some(cost(*anchor, *proposed))
                        })
                        .collect();
                    let mean = if tip_costs.is_empty() {
                        0.0
                    } else {
                        tip_costs.iter().sum::<f64>() / tip_costs.len() as f64
                    };

                    if best.as_ref().is_none_or(|(lowest, _)| mean < *lowest) {
                        best = Some((mean, permutation.to_vec()));
                    }
                });

                if let Some((_, order)) = best {
                    if let Some(children) = trees[later][node].children_mut() {
                        *children = order;
                    }
                }
            }

            trees[later].draw_tree()?;
            y_positions[later] = tip_y_positions(&trees[later]);
        }
    }

    Ok(())
}

/// Tip names a child contributes to its parent's vertical stack, in order:
/// a node contributes its descendant tip names, a tip-like branch its own.
fn tip_order_of(tree: &Tree, child: BranchIndex) -> Vec<&str> {
    if tree[child].is_node() {
        tree[child]
            .leaf_names()
            .map(|leaves| leaves.iter().map(String::as_str).collect())
            .unwrap_or_default()
    } else {
        tree[child].name().map(|n| vec![n]).unwrap_or_default()
    }
}

fn tip_y_positions(tree: &Tree) -> HashMap<String, f64> {
    tree.external_branches()
        .into_iter()
        .filter_map(|i| {
            let name = tree[i].name()?.to_string();
            Some((name, tree[i].y?))
        })
        .collect()
}

/// Heap's algorithm; visits every ordering of `items` exactly once, starting
/// with the original order.
fn for_each_permutation<T: Clone>(items: &[T], visit: &mut dyn FnMut(&[T])) {
    let mut work = items.to_vec();
    let len = work.len();
    permute(&mut work, len, visit);
}

fn permute<T>(work: &mut [T], k: usize, visit: &mut dyn FnMut(&[T])) {
    if k <= 1 {
        visit(work);
        return;
    }
    for i in 0..k {
        permute(work, k - 1, visit);
        if i < k - 1 {
            if k % 2 == 0 {
                work.swap(i, k - 1);
            } else {
                work.swap(0, k - 1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permutations_cover_all_orders() {
        let mut seen = Vec::new();
        for_each_permutation(&[1, 2, 3], &mut |p| seen.push(p.to_vec()));
        assert_eq!(seen.len(), 6);
        assert_eq!(seen[0], vec![1, 2, 3]); // original order first
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 6);
    }
}
