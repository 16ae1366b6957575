//! Error types for tree traversal, topology operations and layout.

use crate::model::tree::BranchIndex;
use thiserror::Error;

/// Errors raised by traversal, topology operations and the layout engine.
///
/// All of these are fatal for the operation that raised them. Operations that
/// work on a deep copy ([`Tree::collapse_branches`](crate::model::Tree::collapse_branches),
/// [`Tree::reduce_tree`](crate::model::Tree::reduce_tree)) leave the caller's
/// tree untouched when they fail.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TreeError {
    /// A node with no children was encountered mid-traversal.
    #[error("hanging node with no children at branch {0}")]
    HangingNode(BranchIndex),

    /// An operation that requires a node was given some other branch kind.
    #[error("branch {0} is not a node")]
    NotANode(BranchIndex),

    /// An operation that requires a tip-like branch was given a node.
    #[error("branch {0} is not tip-like")]
    NotTipLike(BranchIndex),

    /// Collapsing the given branch would swallow the entire tree.
    #[error("collapsing branch {0} would remove the entire tree")]
    CollapseWholeTree(BranchIndex),

    /// The root was named in an explicit collapse list.
    #[error("the root cannot be collapsed")]
    RootCollapse,

    /// `common_ancestor` needs at least two branches to intersect.
    #[error("common ancestor requires at least two branches")]
    NotEnoughBranches,

    /// `reduce_tree` was given nothing to keep.
    #[error("tree reduction requires at least one tip to keep")]
    EmptyReduction,

    /// A full layout pass resolved no branch, which means the branch graph
    /// has a cycle or a disconnected branch.
    #[error("layout pass resolved no branches (cycle or disconnected branch)")]
    LayoutStuck,

    /// A tip name in an explicit layout order does not exist in the tree.
    #[error("unknown tip name {0:?} in layout order")]
    UnknownTip(String),

    /// Untangling enumerates child permutations, which is infeasible past
    /// this degree.
    #[error("node with {0} children is too polytomic to untangle")]
    TooPolytomic(usize),
}
