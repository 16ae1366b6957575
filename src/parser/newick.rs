//! The position-scanning grammar parser for extended Newick tree strings.
//!
//! The input is scanned left to right with a single cursor. At every
//! position the rules below are tried in priority order; each rule that
//! matches consumes exactly what it measured and may fire in the same
//! iteration as its predecessors (a leaf, its annotation and its branch
//! length are typically consumed back to back). If one full iteration
//! leaves the cursor where it started, the string is unparseable and
//! parsing fails with the offending character and a context window.
//!
//! Rules, in order:
//! 1. `(` starts a node and descends
//! 2. integer tip ids in BEAST format, recognized as `(|,)<digits>(\[|:)`
//! 3. bare or quoted tip names
//! 4. multitype singleton markers `)<digits>[`, skipped
//! 5. `#<label>` after `(` or `,`: outgoing reticulate branch
//! 6. `#<label>` after `)`: reticulation landing point
//! 7. `[&...]` annotation blocks, parsed into traits
//! 8. legacy bare labels before `:`, `;` or `[`
//! 9. `:<float>` branch lengths (the colon is optional after annotations)
//! 10. `,` and `)` ascend to the parent
//! 11. `;` ends the parse

use crate::model::annotation::TraitValue;
use crate::model::branch::BranchKind;
use crate::model::tree::{BranchIndex, Tree};
use crate::parser::parsing_error::{ParseError, ParseErrorKind};
use crate::parser::scanner::Scanner;
use tracing::warn;

/// Characters a tip name may contain. Spaces are admitted (quoted names
/// carry them); structural characters and line breaks are not.
fn is_name_char(c: char) -> bool {
    !matches!(
        c,
        '(' | ')' | '[' | ']' | ':' | ';' | ',' | '\'' | '"' | '#' | '\t' | '\n' | '\r'
    )
}

/// Characters a legacy node label may contain.
fn is_label_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')
}

/// Characters a branch length float may contain. `+` is deliberately absent,
/// matching the historical token set.
fn is_length_char(c: char) -> bool {
    c.is_ascii_digit() || matches!(c, '.' | '-' | 'e' | 'E')
}

/// Parses a single extended Newick tree string into a [Tree].
///
/// The string must start at `(`, end at `;` and have balanced parentheses.
/// The returned tree still needs a traversal before heights, leaf sets or
/// layout are meaningful; see [`crate::load_newick_str`] for the full
/// pipeline.
///
/// # Errors
/// Any [ParseErrorKind]: a cursor stall on unrecognized syntax, duplicate
/// reticulation labels, children attached to non-node branches, missing
/// terminator or unbalanced parentheses. There is no partial-result
/// recovery.
pub fn parse_str(input: &str) -> Result<Tree, ParseError> {
    let data = input.trim();
    let scanner = Scanner::new(data);

    if !data.ends_with(';') {
        return Err(ParseError::from_scanner(
            ParseErrorKind::MissingTerminator,
            &scanner,
        ));
    }
    if data.matches('(').count() != data.matches(')').count() {
        return Err(ParseError::from_scanner(
            ParseErrorKind::UnbalancedParentheses,
            &scanner,
        ));
    }

    let mut scanner = scanner;
    let mut tree = Tree::new();
    let mut cur = tree.root();
    let mut stored: Option<usize> = None;

    while !scanner.is_at_end() {
        // progress guarantee: some rule must have advanced the cursor
        if stored == Some(scanner.position()) {
            let found = scanner.peek().unwrap_or(';');
            return Err(ParseError::from_scanner(
                ParseErrorKind::Stall(found),
                &scanner,
            ));
        }
        stored = Some(scanner.position());

        // (1) new node
        if scanner.peek() == Some('(') {
            cur = attach_node(&mut tree, cur, &scanner)?;
            scanner.bump(1);
        }

        // (2) BEAST integer tip
        if matches!(scanner.prev(), Some('(' | ',')) {
            let digits = scanner.run_from(0, |c| c.is_ascii_digit());
            if !digits.is_empty() && matches!(scanner.peek_at(digits.len()), Some('[' | ':')) {
                cur = attach_leaf(&mut tree, cur, &digits, &scanner)?;
                scanner.bump(digits.len());
            }
        }

        // (3) bare or quoted tip name
        if matches!(scanner.prev(), Some('(' | ',')) {
            let mut quotes = 0;
            while matches!(scanner.peek_at(quotes), Some('\'' | '"')) {
                quotes += 1;
            }
            let raw = scanner.run_from(quotes, is_name_char);
            let name = raw.trim();
            if !name.is_empty() {
                let mut closing = 0;
                while matches!(
                    scanner.peek_at(quotes + raw.chars().count() + closing),
                    Some('\'' | '"')
                ) {
                    closing += 1;
                }
                cur = attach_leaf(&mut tree, cur, name, &scanner)?;
                scanner.bump(quotes + raw.chars().count() + closing);
            }
        }

        // (4) multitype singleton marker; the digits are skipped, the
        // annotation that follows lands on the enclosing node
        if scanner.prev() == Some(')') {
            let digits = scanner.run_from(0, |c| c.is_ascii_digit());
            if !digits.is_empty() && scanner.peek_at(digits.len()) == Some('[') {
                scanner.bump(digits.len());
            }
        }

        // (5) outgoing reticulate branch
        if matches!(scanner.prev(), Some('(' | ',')) && scanner.peek() == Some('#') {
            let body = scanner.run_from(1, |c| c.is_ascii_alphanumeric());
            if !body.is_empty() {
                let label = format!("#{body}");
                cur = add_outgoing_reticulation(&mut tree, cur, &label, &scanner)?;
                scanner.bump(1 + body.chars().count());
            }
        }

        // (6) reticulation landing point
        if scanner.prev() == Some(')') && scanner.peek() == Some('#') {
            let body = scanner.run_from(1, |c| c.is_ascii_alphanumeric());
            if !body.is_empty() {
                let label = format!("#{body}");
                add_incoming_reticulation(&mut tree, cur, &label, &scanner)?;
                scanner.bump(1 + body.chars().count());
            }
        }

        // (7) annotation block, with an optional leading colon
        {
            let mut colons = 0;
            while scanner.peek_at(colons) == Some(':') {
                colons += 1;
            }
            if scanner.peek_at(colons) == Some('[') && scanner.peek_at(colons + 1) == Some('&') {
                if let Some(close) = scanner.find_from(colons + 2, ']') {
                    let body = scanner.slice(colons + 2, close - (colons + 2));
                    parse_annotation_block(&body, &mut tree[cur].traits);
                    scanner.bump(close + 1);
                }
            }
        }

        // (8) legacy bare label
        {
            let run = scanner.run_from(0, is_label_char);
            if !run.is_empty()
                && matches!(scanner.peek_at(run.chars().count()), Some(':' | ';' | '['))
            {
                tree[cur]
                    .traits
                    .insert("label".to_string(), TraitValue::Text(run.clone()));
                scanner.bump(run.chars().count());
            }
        }

        // (9) branch length
        {
            let mut colons = 0;
            while scanner.peek_at(colons) == Some(':') {
                colons += 1;
            }
            let number = scanner.run_from(colons, is_length_char);
            if !number.is_empty() {
                let value: f64 = number.parse().map_err(|_| {
                    ParseError::from_scanner(
                        ParseErrorKind::InvalidBranchLength(number.clone()),
                        &scanner,
                    )
                })?;
                tree[cur].length = value;
                scanner.bump(colons + number.chars().count());
            }
        }

        // (10) bifurcation or clade end: head back to the parent
        if matches!(scanner.peek(), Some(',' | ')')) {
            scanner.bump(1);
            match tree[cur].parent {
                Some(parent) => cur = parent,
                None => {
                    return Err(ParseError::from_scanner(
                        ParseErrorKind::UnbalancedParentheses,
                        &scanner,
                    ));
                }
            }
        }

        // (11) string end
        if scanner.peek() == Some(';') {
            return Ok(tree);
        }
    }

    Err(ParseError::from_scanner(
        ParseErrorKind::UnexpectedEnd,
        &scanner,
    ))
}

fn attach_node(
    tree: &mut Tree,
    cur: BranchIndex,
    scanner: &Scanner,
) -> Result<BranchIndex, ParseError> {
    tree.attach_node(cur)
        .map_err(|_| ParseError::from_scanner(ParseErrorKind::AttachToNonNode, scanner))
}

fn attach_leaf(
    tree: &mut Tree,
    cur: BranchIndex,
    name: &str,
    scanner: &Scanner,
) -> Result<BranchIndex, ParseError> {
    tree.attach_leaf(cur, name)
        .map_err(|_| ParseError::from_scanner(ParseErrorKind::AttachToNonNode, scanner))
}

/// Creates the outgoing half of a reticulate branch and wires it up if its
/// landing point was already parsed (forward references are tolerated;
/// whichever side completes second finalizes the link).
fn add_outgoing_reticulation(
    tree: &mut Tree,
    cur: BranchIndex,
    label: &str,
    scanner: &Scanner,
) -> Result<BranchIndex, ParseError> {
    for &i in tree.objects() {
        if matches!(tree[i].kind, BranchKind::Reticulation { .. }) && tree[i].name() == Some(label)
        {
            return Err(ParseError::from_scanner(
                ParseErrorKind::DuplicateReticulationLabel(label.to_string()),
                scanner,
            ));
        }
    }

    let reticulation = tree
        .attach_reticulation(cur, label)
        .map_err(|_| ParseError::from_scanner(ParseErrorKind::AttachToNonNode, scanner))?;

    let mut destination = None;
    for &i in tree.objects() {
        if i != reticulation && tree[i].trait_text("label") == Some(label) {
            if destination.is_some() {
                return Err(ParseError::from_scanner(
                    ParseErrorKind::DuplicateReticulationLabel(label.to_string()),
                    scanner,
                ));
            }
            destination = Some(i);
        }
    }
    if let Some(dest) = destination {
        set_reticulation_target(tree, reticulation, dest);
    }

    Ok(reticulation)
}

/// Tags the current branch as a reticulation landing point and wires it up
/// if the outgoing half was already parsed.
fn add_incoming_reticulation(
    tree: &mut Tree,
    cur: BranchIndex,
    label: &str,
    scanner: &Scanner,
) -> Result<(), ParseError> {
    for &i in tree.objects() {
        if i != cur && tree[i].trait_text("label") == Some(label) {
            return Err(ParseError::from_scanner(
                ParseErrorKind::DuplicateReticulationLabel(label.to_string()),
                scanner,
            ));
        }
    }
    tree[cur]
        .traits
        .insert("label".to_string(), TraitValue::Text(label.to_string()));

    let mut origin = None;
    for &i in tree.objects() {
        if matches!(tree[i].kind, BranchKind::Reticulation { .. }) && tree[i].name() == Some(label)
        {
            if origin.is_some() {
                return Err(ParseError::from_scanner(
                    ParseErrorKind::DuplicateReticulationLabel(label.to_string()),
                    scanner,
                ));
            }
            origin = Some(i);
        }
    }
    if let Some(origin) = origin {
        set_reticulation_target(tree, origin, cur);
    }

    Ok(())
}

fn set_reticulation_target(tree: &mut Tree, reticulation: BranchIndex, landing: BranchIndex) {
    if let BranchKind::Reticulation { target, .. } = &mut tree[reticulation].kind {
        *target = Some(landing);
    }
    tree[landing].contribution = Some(reticulation);
}

// ============================================================================
// Annotation block parsing
// ============================================================================
/// Parses the body of a `[&...]` comment into traits. Unparseable entries
/// are skipped with a warning; FigTree `!`-prefixed entries are discarded
/// with a warning and never stored.
fn parse_annotation_block(body: &str, traits: &mut std::collections::HashMap<String, TraitValue>) {
    for entry in split_entries(body) {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        if entry.starts_with('!') {
            warn!(entry, "FigTree comment found, ignoring");
            continue;
        }
        let Some((key, value)) = entry.split_once('=') else {
            warn!(entry, "annotation entry without a value, skipping");
            continue;
        };
        let key = key.trim();
        let value = value.trim();

        if value.starts_with('{') && value.ends_with('}') {
            let inner = &value[1..value.len() - 1];
            if let Some(parsed) = parse_list_value(key, inner) {
                traits.insert(key.to_string(), parsed);
            }
        } else if let Some(parsed) = parse_scalar_value(value) {
            traits.insert(key.to_string(), parsed);
        }
    }
}

/// Splits an annotation body on top-level commas, respecting braces and
/// double quotes.
fn split_entries(body: &str) -> Vec<String> {
    let mut entries = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut in_quotes = false;
    for c in body.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            '{' if !in_quotes => {
                depth += 1;
                current.push(c);
            }
            '}' if !in_quotes => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ',' if depth == 0 && !in_quotes => {
                entries.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        entries.push(current);
    }
    entries
}

/// Parses a `key={...}` value: a history-tuple list when the content nests
/// braces, otherwise a set or range list.
fn parse_list_value(key: &str, inner: &str) -> Option<TraitValue> {
    if inner.contains('{') {
        // complete history logged by robust counting: {codon,timing,from,to}
        // or {timing,from,to} groups
        let mut tuples = Vec::new();
        for group in split_entries(inner) {
            let group = group.trim();
            let fields: Vec<&str> = group
                .trim_start_matches('{')
                .trim_end_matches('}')
                .split(',')
                .map(str::trim)
                .collect();
            let tuple = match fields.as_slice() {
                [codon, timing, from, to] => {
                    match (codon.parse::<f64>(), timing.parse::<f64>()) {
                        (Ok(c), Ok(t)) => Some(vec![
                            TraitValue::Number(c),
                            TraitValue::Number(t),
                            TraitValue::Text((*from).to_string()),
                            TraitValue::Text((*to).to_string()),
                        ]),
                        _ => None,
                    }
                }
                [timing, from, to] => match timing.parse::<f64>() {
                    Ok(t) => Some(vec![
                        TraitValue::Number(t),
                        TraitValue::Text((*from).to_string()),
                        TraitValue::Text((*to).to_string()),
                    ]),
                    Err(_) => None,
                },
                _ => None,
            };
            match tuple {
                Some(tuple) => tuples.push(TraitValue::List(tuple)),
                None => warn!(key, group, "unparseable history entry, skipping"),
            }
        }
        return Some(TraitValue::List(tuples));
    }

    let elements: Vec<&str> = inner.split(',').map(str::trim).collect();
    if key.contains("set") {
        let numeric = key.contains(".prob");
        let mut values = Vec::new();
        for element in elements {
            if numeric {
                match element.parse::<f64>() {
                    Ok(v) => values.push(TraitValue::Number(v)),
                    Err(_) => warn!(key, element, "unparseable set probability, skipping"),
                }
            } else {
                values.push(TraitValue::Text(strip_quotes(element).to_string()));
            }
        }
        Some(TraitValue::List(values))
    } else {
        // ranges, HPD intervals and anything else numeric
        let parsed: Result<Vec<TraitValue>, _> = elements
            .iter()
            .map(|e| e.parse::<f64>().map(TraitValue::Number))
            .collect();
        match parsed {
            Ok(values) => Some(TraitValue::List(values)),
            Err(_) => {
                warn!(key, inner, "some other trait, skipping");
                None
            }
        }
    }
}

/// Parses a scalar annotation value. Quoted values are always text;
/// unquoted values become numbers when they parse as one. A `+` collapses
/// ambiguous joint states to the first alternative, deliberately not
/// averaged.
fn parse_scalar_value(value: &str) -> Option<TraitValue> {
    let (stripped, quoted) = match strip_quotes_checked(value) {
        Some(inner) => (inner, true),
        None => (value, false),
    };
    let first = match stripped.split_once('+') {
        Some((first, _)) => first,
        None => stripped,
    };
    if quoted {
        return Some(TraitValue::Text(first.to_string()));
    }
    match first.parse::<f64>() {
        Ok(v) => Some(TraitValue::Number(v)),
        Err(_) => Some(TraitValue::Text(first.to_string())),
    }
}

fn strip_quotes(value: &str) -> &str {
    strip_quotes_checked(value).unwrap_or(value)
}

fn strip_quotes_checked(value: &str) -> Option<&str> {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|v| v.strip_suffix(quote))
        {
            return Some(inner);
        }
    }
    None
}
