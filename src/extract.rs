//! Link extraction.
//!
//! Scans document text for typed link statements of the form
//! `[[reference]]{relation: value, relation: [a, b]}` and yields raw link
//! records. This layer knows the link grammar and nothing about graph
//! semantics: resolution, inverse generation, and classification happen
//! downstream.
//!
//! Malformed links are recoverable per-link: the offending statement is
//! skipped, a diagnostic is recorded, and extraction continues with the rest
//! of the document.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

static LINK_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\[([^\]]+)\]\]\s*\{([^}]+)\}").expect("static pattern"));

static RELATION_KV: Lazy<Regex> = Lazy::new(|| {
    // key: value, where value is a [[concept]] reference, a bracketed list,
    // a quoted string, or a bare token.
    Regex::new(r#"(\w+):\s*(\[\[[^\]]+\]\]|\[[^\]]*\]|"[^"]*"|'[^']*'|[^,\]]+)"#)
        .expect("static pattern")
});

/// A parsed relation value.
///
/// Quoted strings are scalar properties of the concept; everything else
/// names one or more target concepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelationValue {
    /// A single bare token or `[[concept]]` reference.
    One(String),
    /// A bracketed, comma-separated list (multi-valued, e.g. multi-parent
    /// `is_a`).
    Many(Vec<String>),
    /// A quoted scalar, stored as a node property rather than an edge.
    Text(String),
}

/// One raw link statement: a concept reference plus its typed relations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLink {
    pub reference: String,
    pub relations: Vec<(String, RelationValue)>,
    /// 1-based line of the statement in its source document.
    pub line: usize,
}

impl RawLink {
    /// All declared `is_a` classification paths, in declaration order.
    pub fn is_a_values(&self) -> Vec<String> {
        let mut values = Vec::new();
        for (relation, value) in &self.relations {
            if relation != crate::relations::IS_A {
                continue;
            }
            match value {
                RelationValue::One(v) | RelationValue::Text(v) => values.push(v.clone()),
                RelationValue::Many(vs) => values.extend(vs.iter().cloned()),
            }
        }
        values
    }

    /// Relation name and target pairs, excluding quoted property values.
    pub fn relation_targets(&self) -> Vec<(&str, &str)> {
        let mut pairs = Vec::new();
        for (relation, value) in &self.relations {
            match value {
                RelationValue::One(v) => pairs.push((relation.as_str(), v.as_str())),
                RelationValue::Many(vs) => {
                    pairs.extend(vs.iter().map(|v| (relation.as_str(), v.as_str())))
                }
                RelationValue::Text(_) => {}
            }
        }
        pairs
    }

    /// Quoted scalar values, stored as node properties.
    pub fn properties(&self) -> Vec<(&str, &str)> {
        self.relations
            .iter()
            .filter_map(|(relation, value)| match value {
                RelationValue::Text(v) => Some((relation.as_str(), v.as_str())),
                _ => None,
            })
            .collect()
    }
}

/// Non-fatal information produced while extracting links from a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParseDiagnostic {
    /// A malformed link statement that was skipped.
    SyntaxError { line: usize, message: String },
    Warning(String),
    Info(String),
}

impl ParseDiagnostic {
    pub fn syntax_error(line: usize, message: impl Into<String>) -> Self {
        Self::SyntaxError {
            line,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::Warning(message.into())
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::Info(message.into())
    }

    pub fn is_syntax_error(&self) -> bool {
        matches!(self, Self::SyntaxError { .. })
    }
}

impl fmt::Display for ParseDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SyntaxError { line, message } => {
                write!(f, "Syntax error (line {line}): {message}")
            }
            Self::Warning(msg) => write!(f, "Warning: {msg}"),
            Self::Info(msg) => write!(f, "Info: {msg}"),
        }
    }
}

/// Scan document text and yield raw link records plus per-link diagnostics.
pub fn extract_links(text: &str) -> (Vec<RawLink>, Vec<ParseDiagnostic>) {
    let mut links = Vec::new();
    let mut diagnostics = Vec::new();

    for captures in LINK_BLOCK.captures_iter(text) {
        let whole = captures.get(0).expect("capture 0 always present");
        let line = text[..whole.start()].matches('\n').count() + 1;
        let reference = captures[1].trim().to_string();

        if let Err(message) = validate_segments("reference", &reference) {
            diagnostics.push(ParseDiagnostic::syntax_error(line, message));
            continue;
        }

        let relations = parse_relations(&captures[2]);
        if relations.is_empty() {
            diagnostics.push(ParseDiagnostic::syntax_error(
                line,
                format!("link '[[{reference}]]' has no parseable relations"),
            ));
            continue;
        }
        let relations = validate_is_a_values(relations, line, &mut diagnostics);
        if relations.is_empty() {
            continue;
        }

        links.push(RawLink {
            reference,
            relations,
            line,
        });
    }

    (links, diagnostics)
}

/// Reference and classification segments are lowercase, slash-delimited
/// tokens.
fn validate_segments(kind: &str, value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Err(format!("empty {kind}"));
    }
    for segment in value.split('/') {
        if segment.is_empty() {
            return Err(format!("empty path segment in {kind} '{value}'"));
        }
        if !segment
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
        {
            return Err(format!(
                "{kind} '{value}' is not a lowercase slash-delimited token"
            ));
        }
    }
    Ok(())
}

/// Apply the segment grammar to `is_a` classification path values. Invalid
/// values are dropped with a diagnostic; the rest of the link survives.
fn validate_is_a_values(
    relations: Vec<(String, RelationValue)>,
    line: usize,
    diagnostics: &mut Vec<ParseDiagnostic>,
) -> Vec<(String, RelationValue)> {
    let mut kept = Vec::new();
    for (key, value) in relations {
        if key != crate::relations::IS_A {
            kept.push((key, value));
            continue;
        }
        match value {
            RelationValue::One(v) => match validate_segments("classification path", &v) {
                Ok(()) => kept.push((key, RelationValue::One(v))),
                Err(message) => diagnostics.push(ParseDiagnostic::syntax_error(line, message)),
            },
            RelationValue::Text(v) => match validate_segments("classification path", &v) {
                Ok(()) => kept.push((key, RelationValue::Text(v))),
                Err(message) => diagnostics.push(ParseDiagnostic::syntax_error(line, message)),
            },
            RelationValue::Many(vs) => {
                let mut valid = Vec::new();
                for v in vs {
                    match validate_segments("classification path", &v) {
                        Ok(()) => valid.push(v),
                        Err(message) => {
                            diagnostics.push(ParseDiagnostic::syntax_error(line, message))
                        }
                    }
                }
                if !valid.is_empty() {
                    kept.push((key, RelationValue::Many(valid)));
                }
            }
        }
    }
    kept
}

/// Parse the `key: value` pairs inside a relation block.
pub fn parse_relations(block: &str) -> Vec<(String, RelationValue)> {
    let mut relations = Vec::new();

    for captures in RELATION_KV.captures_iter(block) {
        let key = captures[1].to_string();
        let raw = captures[2].trim();

        let value = if raw.starts_with("[[") && raw.ends_with("]]") {
            RelationValue::One(raw[2..raw.len() - 2].trim().to_string())
        } else if raw.starts_with('[') && raw.ends_with(']') {
            let inner = raw[1..raw.len() - 1].trim();
            if inner.is_empty() {
                RelationValue::Many(Vec::new())
            } else {
                RelationValue::Many(parse_list(inner))
            }
        } else if (raw.starts_with('"') && raw.ends_with('"') && raw.len() >= 2)
            || (raw.starts_with('\'') && raw.ends_with('\'') && raw.len() >= 2)
        {
            RelationValue::Text(raw[1..raw.len() - 1].to_string())
        } else {
            RelationValue::One(raw.to_string())
        };

        relations.push((key, value));
    }

    relations
}

/// Parse list contents, honoring quotes and nested brackets.
fn parse_list(text: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut quote_char: Option<char> = None;
    let mut bracket_depth = 0usize;

    for c in text.chars() {
        match c {
            '"' | '\'' if quote_char.is_none() => {
                quote_char = Some(c);
                current.push(c);
            }
            c if Some(c) == quote_char => {
                quote_char = None;
                current.push(c);
            }
            '[' if quote_char.is_none() => {
                bracket_depth += 1;
                current.push(c);
            }
            ']' if quote_char.is_none() => {
                bracket_depth = bracket_depth.saturating_sub(1);
                current.push(c);
            }
            ',' if quote_char.is_none() && bracket_depth == 0 => {
                if !current.trim().is_empty() {
                    items.push(clean_value(current.trim()));
                }
                current.clear();
            }
            c => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        items.push(clean_value(current.trim()));
    }

    items
}

/// Strip `[[..]]` or quote delimiters from a list item.
fn clean_value(value: &str) -> String {
    let value = value.trim();
    if value.starts_with("[[") && value.ends_with("]]") {
        return value[2..value.len() - 2].trim().to_string();
    }
    if (value.starts_with('"') && value.ends_with('"') && value.len() >= 2)
        || (value.starts_with('\'') && value.ends_with('\'') && value.len() >= 2)
    {
        return value[1..value.len() - 1].to_string();
    }
    value.to_string()
}
