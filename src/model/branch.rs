//! Branch module for phylogenetic tree and network representation.

use crate::model::annotation::TraitValue;
use crate::model::tree::BranchIndex;
use std::collections::{BTreeSet, HashMap};

/// Plotting width of a freshly collapsed clade.
const DEFAULT_CLADE_WIDTH: f64 = 1.0;

/// Plotting width of a reticulate branch.
const DEFAULT_RETICULATION_WIDTH: f64 = 0.5;

// =#========================================================================#=
// BRANCH
// =#========================================================================#=
/// A single branch in the tree arena.
///
/// Every branch, regardless of kind, carries the shared fields: a length, a
/// cached height (set by traversal), a calibrated absolute time, a parent
/// link, parsed trait annotations and layout coordinates. Kind-specific
/// payloads live in [BranchKind].
///
/// # Invariants
/// - `height == parent.height + length` for every non-root branch after a
///   traversal
/// - the arena index of a branch never changes, even after the branch is
///   removed from the tree's registry
/// - `contribution` is only ever set on the landing point of a reticulate
///   branch and points back at the [BranchKind::Reticulation] that lands there
#[derive(Debug, Clone)]
pub struct Branch {
    /// Kind tag plus kind-specific payload
    pub kind: BranchKind,
    /// Distance to the parent branch
    pub length: f64,
    /// Distance from the root, computed by traversal
    pub height: Option<f64>,
    /// Branch end point in absolute time, set by calibration
    pub absolute_time: Option<f64>,
    /// Arena index of the parent branch; `None` only for the root
    pub parent: Option<BranchIndex>,
    /// Annotations parsed from the tree string, e.g. `{"posterior": 1.0}`
    pub traits: HashMap<String, TraitValue>,
    /// Back-link from a reticulation landing point to its incoming branch
    pub contribution: Option<BranchIndex>,
    /// Horizontal plotting coordinate, set by the layout engine
    pub x: Option<f64>,
    /// Vertical plotting coordinate, set by the layout engine
    pub y: Option<f64>,
}

/// Kind-specific payload of a [Branch].
///
/// `Clade` and `Reticulation` pose as tips: they terminate traversal and
/// occupy a slot in the vertical tip stack, but neither is a sampled taxon.
#[derive(Debug, Clone)]
pub enum BranchKind {
    /// Internal branch with ordered descendants
    Node {
        /// Arena indices of child branches, in parse/sort order
        children: Vec<BranchIndex>,
        /// Names of descendant tips, recomputed by every full traversal
        leaves: BTreeSet<String>,
        /// Height of the youngest descendant tip, set by traversal
        child_height: Option<f64>,
    },
    /// Terminal branch representing a sampled taxon
    Leaf {
        /// Tip name, renamed in place when a translation table is applied
        name: String,
    },
    /// Placeholder standing in for a collapsed subtree
    Clade {
        /// Display name given at collapse time
        name: String,
        /// Arena indices of the branches this clade replaced, in visit order;
        /// the first entry is the collapsed node itself
        subtree: Vec<BranchIndex>,
        /// Snapshot of the collapsed node's descendant tip names
        leaves: BTreeSet<String>,
        /// Height of the highest tip inside the collapsed subtree
        last_height: Option<f64>,
        /// Absolute time of the highest tip inside the collapsed subtree
        last_absolute_time: Option<f64>,
        /// Vertical display width
        width: f64,
    },
    /// Non-tree edge (recombination, conversion, reassortment)
    Reticulation {
        /// Reticulation label, including the leading `#`
        name: String,
        /// Arena index of the landing point; a cross-link, not ownership
        target: Option<BranchIndex>,
        /// Vertical display width
        width: f64,
    },
}

impl Branch {
    fn with_kind(kind: BranchKind, parent: Option<BranchIndex>) -> Self {
        Branch {
            kind,
            length: 0.0,
            height: None,
            absolute_time: None,
            parent,
            traits: HashMap::new(),
            contribution: None,
            x: None,
            y: None,
        }
    }

    /// Creates a new node branch with no children yet.
    pub(crate) fn new_node(parent: Option<BranchIndex>) -> Self {
        Branch::with_kind(
            BranchKind::Node {
                children: Vec::new(),
                leaves: BTreeSet::new(),
                child_height: None,
            },
            parent,
        )
    }

    /// Creates a new leaf branch.
    pub(crate) fn new_leaf(name: impl Into<String>, parent: Option<BranchIndex>) -> Self {
        Branch::with_kind(BranchKind::Leaf { name: name.into() }, parent)
    }

    /// Creates a new reticulate branch with an unresolved landing point.
    pub(crate) fn new_reticulation(name: impl Into<String>, parent: Option<BranchIndex>) -> Self {
        Branch::with_kind(
            BranchKind::Reticulation {
                name: name.into(),
                target: None,
                width: DEFAULT_RETICULATION_WIDTH,
            },
            parent,
        )
    }

    /// Creates a new clade placeholder; the subtree snapshot is filled in by
    /// [`Tree::collapse_subtree`](crate::model::Tree::collapse_subtree).
    pub(crate) fn new_clade(name: impl Into<String>, parent: Option<BranchIndex>) -> Self {
        Branch::with_kind(
            BranchKind::Clade {
                name: name.into(),
                subtree: Vec::new(),
                leaves: BTreeSet::new(),
                last_height: None,
                last_absolute_time: None,
                width: DEFAULT_CLADE_WIDTH,
            },
            parent,
        )
    }

    /// Returns `true` if this branch is an internal node.
    pub fn is_node(&self) -> bool {
        matches!(self.kind, BranchKind::Node { .. })
    }

    /// Returns `true` if this branch is a sampled tip.
    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, BranchKind::Leaf { .. })
    }

    /// Returns `true` if this branch terminates traversal
    /// (leaf, collapsed clade or reticulation).
    pub fn is_leaflike(&self) -> bool {
        !self.is_node()
    }

    /// Returns the name of a tip-like branch, else `None`.
    pub fn name(&self) -> Option<&str> {
        match &self.kind {
            BranchKind::Leaf { name }
            | BranchKind::Clade { name, .. }
            | BranchKind::Reticulation { name, .. } => Some(name),
            BranchKind::Node { .. } => None,
        }
    }

    /// Returns the children of this branch; empty for tip-like branches.
    pub fn children(&self) -> &[BranchIndex] {
        match &self.kind {
            BranchKind::Node { children, .. } => children,
            _ => &[],
        }
    }

    /// Returns a mutable handle on a node's child list, else `None`.
    pub(crate) fn children_mut(&mut self) -> Option<&mut Vec<BranchIndex>> {
        match &mut self.kind {
            BranchKind::Node { children, .. } => Some(children),
            _ => None,
        }
    }

    /// Returns the descendant tip names of a node, or the stored snapshot of
    /// a clade; `None` for other kinds.
    pub fn leaf_names(&self) -> Option<&BTreeSet<String>> {
        match &self.kind {
            BranchKind::Node { leaves, .. } => Some(leaves),
            BranchKind::Clade { leaves, .. } => Some(leaves),
            _ => None,
        }
    }

    /// Number of descendant tips below a node, 1 for any tip-like branch.
    pub fn leaf_count(&self) -> usize {
        match &self.kind {
            BranchKind::Node { leaves, .. } => leaves.len(),
            _ => 1,
        }
    }

    /// Height of a node's youngest descendant tip, set by traversal.
    pub fn child_height(&self) -> Option<f64> {
        match &self.kind {
            BranchKind::Node { child_height, .. } => *child_height,
            _ => None,
        }
    }

    /// The height this branch contributes when its parent computes its
    /// `child_height`: nodes pass their own `child_height` up, clades report
    /// the height of their highest collapsed tip, tips their own height.
    pub fn effective_height(&self) -> Option<f64> {
        match &self.kind {
            BranchKind::Node { child_height, .. } => *child_height,
            BranchKind::Clade { last_height, .. } => last_height.or(self.height),
            _ => self.height,
        }
    }

    /// Vertical space this branch occupies in the tip stack, `None` for nodes.
    pub fn tip_width(&self) -> Option<f64> {
        match &self.kind {
            BranchKind::Leaf { .. } => Some(1.0),
            BranchKind::Clade { width, .. } | BranchKind::Reticulation { width, .. } => {
                Some(width + 1.0)
            }
            BranchKind::Node { .. } => None,
        }
    }

    /// Returns the landing point of a reticulate branch, if resolved.
    pub fn target(&self) -> Option<BranchIndex> {
        match &self.kind {
            BranchKind::Reticulation { target, .. } => *target,
            _ => None,
        }
    }

    /// Numeric trait lookup shorthand.
    pub fn trait_number(&self, key: &str) -> Option<f64> {
        self.traits.get(key).and_then(TraitValue::as_number)
    }

    /// Text trait lookup shorthand.
    pub fn trait_text(&self, key: &str) -> Option<&str> {
        self.traits.get(key).and_then(TraitValue::as_text)
    }
}
