//! Netwick is a library for parsing phylogenetic trees and networks from
//! extended Newick strings and NEXUS text, calibrating them in time, and
//! querying, reducing and laying them out.
//!
//! Core functionality provided:
//! - Parser: a position-scanning grammar parser for extended Newick,
//!   including BEAST integer tips, `[&...]` branch annotations, multitype
//!   singleton markers and `#label` reticulation (recombination /
//!   reassortment) edges.
//! - Tree model: every branch lives in an arena addressed by stable integer
//!   ids, so parent links, reticulation cross-links and collapsed-clade
//!   snapshots never fight over ownership, and a deep copy is a plain
//!   `clone()`.
//! - Traversal: explicit-stack depth-first walks computing heights,
//!   per-node descendant tip sets and tree height, with include/descend
//!   predicates for restricted walks.
//! - Topology operations: branch sorting, multitype contraction, subtree
//!   collapse/restore, support-based node removal, pruning to a tip subset,
//!   common ancestors, TMRCA matrices and lineage counting.
//! - Layout: stacked rectangular coordinates and unrooted (radial) wedge
//!   coordinates; a greedy tanglegram untangler across tree lists.
//! - NEXUS: tree-statement and `Translate`-table extraction, plus optional
//!   calibration from caller-extracted tip dates.
//!
//! Limitations:
//! - Rendering is out of scope; the layout engine only fills in `x`/`y`.
//! - Round-trip serialization is structural, not byte-identical.
//! - Untangling is a bounded local heuristic, not a global optimum.
//!
//! # Usage patterns
//!
//! Parse a single Newick string and look at derived state:
//! ```
//! let tree = netwick::load_newick_str("((A:1,B:2):1,C:3):0;").unwrap();
//! assert_eq!(tree.num_tips(), 3);
//! assert_eq!(tree.tree_height(), 3.0);
//! ```
//!
//! Load a BEAST-style NEXUS tree and calibrate it:
//! ```no_run
//! let text = std::fs::read_to_string("mcc.trees").unwrap();
//! let tree = netwick::nexus::load_nexus_calibrated(&text, &|name| {
//!     name.rsplit('|').next()?.parse().ok()
//! })
//! .unwrap();
//! println!("most recent tip: {:?}", tree.most_recent());
//! ```

pub mod error;
pub mod layout;
pub mod model;
pub mod newick;
pub mod nexus;
pub mod parser;

pub use crate::error::TreeError;
pub use crate::layout::{LayoutOptions, untangle};
pub use crate::model::{Branch, BranchIndex, BranchKind, TraitValue, TraverseSpec, Tree};
pub use crate::newick::{NewickOptions, to_newick};
pub use crate::parser::{ParseError, ParseErrorKind};

// ============================================================================
// Quick Newick API
// ============================================================================
/// Parses a single extended Newick string without any follow-up processing.
///
/// See [`parser::newick::parse_str`] for full documentation.
pub fn parse_tree_str<S: AsRef<str>>(newick: S) -> Result<Tree, ParseError> {
    parser::newick::parse_str(newick.as_ref())
}

/// Parses a single extended Newick string and runs the initial traversal
/// and branch sort, leaving heights, leaf sets and layout ready to use.
///
/// See [`newick::load_newick`] for full documentation.
pub fn load_newick_str<S: AsRef<str>>(newick: S) -> Result<Tree, ParseError> {
    newick::load_newick(newick.as_ref())
}

// ============================================================================
// Quick NEXUS API
// ============================================================================
/// Parses the first tree of a NEXUS text, applying its `Translate` table.
///
/// See [`nexus::load_nexus`] for full documentation.
pub fn load_nexus_str<S: AsRef<str>>(text: S) -> Result<Tree, ParseError> {
    nexus::load_nexus(text.as_ref())
}
