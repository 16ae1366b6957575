//! Newick serialization.
//!
//! [to_newick] is the parser's approximate inverse: it emits the same token
//! set the parser accepts (tips, node labels, reticulation markers, optional
//! `[&...]` trait blocks, branch lengths), producing a structural round-trip.
//! Byte-identical output is explicitly not a goal.

use crate::model::annotation::TraitValue;
use crate::model::branch::BranchKind;
use crate::model::tree::{BranchIndex, Tree};

// =#========================================================================#=
// NEWICK OPTIONS
// =#========================================================================#=
/// Controls trait emission and tip renaming for [to_newick].
#[derive(Debug, Clone, Copy, Default)]
pub struct NewickOptions {
    /// Emit `[&key=value,...]` blocks for annotated branches
    pub traits: bool,
    /// Map tip names back through the tree's translation table, emitting the
    /// original (typically numeric) ids
    pub rename: bool,
}

/// Serializes a tree to a Newick string terminated with `;`.
///
/// The synthetic parse root (a zero-length node with a single internal
/// child) is skipped, so a parsed tree round-trips to the same nesting
/// structure. Node labels and reticulation landing points are re-emitted
/// from the `label` trait; reticulate branches are written as their
/// `#label` marker.
pub fn to_newick(tree: &Tree, options: &NewickOptions) -> String {
    let start = serialization_root(tree);

    let mut out = String::with_capacity(tree.num_objects() * 16);
    write_branch(tree, start, options, &mut out);
    out.push(';');
    out
}

/// The branch serialization starts from: the root's single internal child
/// when the root is the synthetic parse root, otherwise the root itself.
fn serialization_root(tree: &Tree) -> BranchIndex {
    let root = tree.root();
    let children = tree[root].children();
    if children.len() == 1 && tree[children[0]].is_node() && tree[root].traits.is_empty() {
        children[0]
    } else {
        root
    }
}

enum Frame {
    Enter(BranchIndex),
    Separator,
    Close(BranchIndex),
}

fn write_branch(tree: &Tree, start: BranchIndex, options: &NewickOptions, out: &mut String) {
    let mut stack = vec![Frame::Enter(start)];
    while let Some(frame) = stack.pop() {
        match frame {
            Frame::Enter(i) => match &tree[i].kind {
                BranchKind::Node { children, .. } => {
                    out.push('(');
                    stack.push(Frame::Close(i));
                    for (slot, &child) in children.iter().enumerate().rev() {
                        stack.push(Frame::Enter(child));
                        if slot > 0 {
                            stack.push(Frame::Separator);
                        }
                    }
                }
                BranchKind::Leaf { name } => {
                    write_tip_name(tree, name, options, out);
                    write_suffix(tree, i, options, false, out);
                }
                BranchKind::Clade { name, .. } | BranchKind::Reticulation { name, .. } => {
                    out.push_str(name);
                    write_suffix(tree, i, options, false, out);
                }
            },
            Frame::Separator => out.push(','),
            Frame::Close(i) => {
                out.push(')');
                write_suffix(tree, i, options, true, out);
            }
        }
    }
}

fn write_tip_name(tree: &Tree, name: &str, options: &NewickOptions, out: &mut String) {
    let emitted = if options.rename {
        tree.tip_map()
            .and_then(|map| {
                map.iter()
                    .find(|(_, full)| full.as_str() == name)
                    .map(|(id, _)| id.as_str())
            })
            .unwrap_or(name)
    } else {
        name
    };
    if emitted.chars().all(is_safe_name_char) {
        out.push_str(emitted);
    } else {
        out.push('\'');
        out.push_str(emitted);
        out.push('\'');
    }
}

/// Everything after a tip name or closing parenthesis: the label trait,
/// the optional annotation block, and the branch length.
fn write_suffix(
    tree: &Tree,
    i: BranchIndex,
    options: &NewickOptions,
    is_node: bool,
    out: &mut String,
) {
    if is_node {
        if let Some(label) = tree[i].trait_text("label") {
            out.push_str(label);
        }
    }
    if options.traits {
        write_traits(tree, i, out);
    }
    out.push(':');
    out.push_str(&format_float(tree[i].length));
}

fn write_traits(tree: &Tree, i: BranchIndex, out: &mut String) {
    let mut keys: Vec<&String> = tree[i]
        .traits
        .keys()
        .filter(|k| k.as_str() != "label")
        .collect();
    if keys.is_empty() {
        return;
    }
    keys.sort();

    out.push_str("[&");
    for (slot, key) in keys.iter().enumerate() {
        if slot > 0 {
            out.push(',');
        }
        out.push_str(key);
        out.push('=');
        write_value(&tree[i].traits[key.as_str()], out);
    }
    out.push(']');
}

fn write_value(value: &TraitValue, out: &mut String) {
    match value {
        TraitValue::Number(v) => out.push_str(&format_float(*v)),
        TraitValue::Text(s) => {
            out.push('"');
            out.push_str(s);
            out.push('"');
        }
        TraitValue::List(items) => {
            out.push('{');
            for (slot, item) in items.iter().enumerate() {
                if slot > 0 {
                    out.push(',');
                }
                match item {
                    // list elements are written bare, as the parser expects
                    TraitValue::Text(s) => out.push_str(s),
                    other => write_value(other, out),
                }
            }
            out.push('}');
        }
    }
}

fn format_float(value: f64) -> String {
    // shortest round-trip representation, but keep plain integers readable
    if value == value.trunc() && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

fn is_safe_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '|' | '/' | '?')
}
