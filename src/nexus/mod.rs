//! NEXUS container reading.
//!
//! A NEXUS file embeds one or more Newick-like tree statements plus an
//! optional `Translate` table mapping short tip ids to full names. This
//! module isolates those pieces from the surrounding text, hands each tree
//! string to the core parser, applies the translation, and optionally
//! calibrates the tree from caller-extracted tip dates.
//!
//! Date extraction itself is the caller's business: tips encode collection
//! dates in house formats, so [load_nexus_calibrated] takes a closure from
//! tip name to decimal date rather than guessing.

use crate::model::tree::Tree;
use crate::parser::newick::parse_str;
use crate::parser::parsing_error::{ParseError, ParseErrorKind};
use crate::parser::scanner::Scanner;
use std::collections::HashMap;

// =#========================================================================#=
// NEXUS EXTRACTION
// =#========================================================================#=
/// Tree statements and tip translation extracted from NEXUS text.
#[derive(Debug, Clone, Default)]
pub struct NexusTrees {
    /// `(name, tree string)` pairs in file order; each tree string starts at
    /// `(` and ends at `;`
    pub trees: Vec<(String, String)>,
    /// `Translate` table: short id to full tip name
    pub translation: HashMap<String, String>,
    /// Declared taxon count, when a `Dimensions ntax=` command was present
    pub ntax: Option<usize>,
}

/// Scans line-oriented NEXUS text for tree statements and a `Translate`
/// table.
///
/// Tree statements are lines of the form `tree NAME = [&R] (...);` (the
/// rooting comment is optional, matching is case-insensitive). Translate
/// entries are `id name,` lines between `Translate` and the closing `;`.
///
/// # Errors
/// [ParseErrorKind::MissingTreeStatement] if no tree statement is found.
pub fn extract(text: &str) -> Result<NexusTrees, ParseError> {
    let mut result = NexusTrees::default();
    let mut in_translate = false;

    for line in text.lines() {
        let line = line.trim();
        let lower = line.to_ascii_lowercase();

        if let Some(rest) = lower.strip_prefix("dimensions") {
            if let Some(eq) = rest.find("ntax=") {
                let digits: String = rest[eq + "ntax=".len()..]
                    .chars()
                    .take_while(char::is_ascii_digit)
                    .collect();
                result.ntax = digits.parse().ok();
            }
        }

        if in_translate {
            if let Some((id, name)) = split_translate_entry(line) {
                result.translation.insert(id, name);
            }
            if line.contains(';') {
                in_translate = false;
            }
            continue;
        }
        if lower == "translate" || lower.ends_with(" translate") {
            in_translate = true;
            continue;
        }

        if lower.starts_with("tree ") && line.contains('=') {
            let name = line["tree ".len()..]
                .split_whitespace()
                .next()
                .unwrap_or("")
                .to_string();
            if let (Some(open), Some(close)) = (line.find('('), line.rfind(';')) {
                if open < close {
                    result.trees.push((name, line[open..=close].to_string()));
                }
            }
        }
    }

    if result.trees.is_empty() {
        return Err(ParseError::from_scanner(
            ParseErrorKind::MissingTreeStatement,
            &Scanner::new(text),
        ));
    }
    Ok(result)
}

/// One `id name,` translate line; quotes around the name are stripped.
fn split_translate_entry(line: &str) -> Option<(String, String)> {
    let entry = line.trim_end_matches(';').trim_end_matches(',').trim();
    let (id, name) = entry.split_once(char::is_whitespace)?;
    if id.is_empty() || name.is_empty() {
        return None;
    }
    let name = name.trim().trim_matches('"').trim_matches('\'');
    Some((id.to_string(), name.to_string()))
}

// ============================================================================
// Loading (pub)
// ============================================================================
/// Parses the first tree in NEXUS text, applies the tip translation and runs
/// the initial traversal and branch sort.
pub fn load_nexus(text: &str) -> Result<Tree, ParseError> {
    let extracted = extract(text)?;
    let (_, tree_string) = &extracted.trees[0];

    let mut tree = parse_str(tree_string)?;
    if !extracted.translation.is_empty() {
        tree.rename_tips(&extracted.translation);
    }
    tree.traverse()?;
    tree.sort_branches(true)?;
    Ok(tree)
}

/// Like [load_nexus], then places the tree in absolute time: `tip_date`
/// extracts one decimal date per tip name, and the latest date found
/// calibrates the tree via [Tree::set_absolute_time].
///
/// Tips whose date cannot be extracted are skipped; if no tip yields a
/// date, the tree is returned uncalibrated.
pub fn load_nexus_calibrated(
    text: &str,
    tip_date: &dyn Fn(&str) -> Option<f64>,
) -> Result<Tree, ParseError> {
    let mut tree = load_nexus(text)?;

    let most_recent = tree
        .tip_names()
        .iter()
        .filter_map(|name| tip_date(name))
        .fold(None, |best: Option<f64>, date| {
            Some(best.map_or(date, |b| b.max(date)))
        });
    if let Some(date) = most_recent {
        tree.set_absolute_time(date);
    }
    Ok(tree)
}
