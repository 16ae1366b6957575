//! Newick output and the single-string convenience pipeline.

pub mod writer;

pub use writer::{NewickOptions, to_newick};

use crate::model::tree::Tree;
use crate::parser::ParseError;
use crate::parser::newick::parse_str;

/// Parses a single Newick string and runs the standard follow-up: an
/// initial traversal (heights, leaf sets, tree height) and a branch sort
/// (which also computes the layout).
pub fn load_newick(newick: &str) -> Result<Tree, ParseError> {
    let mut tree = parse_str(newick)?;
    tree.traverse()?;
    tree.sort_branches(true)?;
    Ok(tree)
}
