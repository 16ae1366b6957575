//! Data model: branch arena, trait values, tree registry, traversal and
//! topology operations.
//!
//! - [branch]: the [Branch](branch::Branch) record and its
//!   [BranchKind](branch::BranchKind) tagged union
//! - [annotation]: the [TraitValue](annotation::TraitValue) sum type
//! - [tree]: the [Tree](tree::Tree) arena and registry
//! - [traverse]: the depth-first traversal engine
//! - [topology]: sort, collapse, prune, ancestry and TMRCA operations

pub mod annotation;
pub mod branch;
pub mod topology;
pub mod traverse;
pub mod tree;

pub use annotation::TraitValue;
pub use branch::{Branch, BranchKind};
pub use traverse::{IncludeMode, TraverseSpec};
pub use tree::{BranchIndex, Tree, TreeStats};
