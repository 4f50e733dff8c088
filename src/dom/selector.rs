//! Minimal CSS selector matching over a [`Document`].
//!
//! Supports type, `.class`, `#id`, `[attr]`, `[attr=v]`, `[attr*=v]`, `[attr^=v]`,
//! the descendant and `>` child combinators, and comma-separated lists.

use super::tree::{Document, NodeId};
use crate::error::DomError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum AttrOp {
    Exists,
    Equals(String),
    Contains(String),
    Prefix(String),
}

#[derive(Debug, Clone, Default)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<(String, AttrOp)>,
}

#[derive(Debug, Clone)]
struct Complex {
    compounds: Vec<Compound>,
    /// `combinators[i]` joins `compounds[i]` and `compounds[i + 1]`.
    combinators: Vec<Combinator>,
}

/// A parsed, comma-separated selector list.
#[derive(Debug, Clone)]
pub struct SelectorList {
    source: String,
    alternatives: Vec<Complex>,
}

impl SelectorList {
    pub fn parse(selector: &str) -> Result<Self, DomError> {
        let invalid = |reason: &str| DomError::InvalidSelector {
            selector: selector.to_string(),
            reason: reason.to_string(),
        };

        let mut alternatives = Vec::new();
        for part in selector.split(',') {
            let part = part.trim();
            if part.is_empty() {
                return Err(invalid("empty alternative"));
            }
            alternatives.push(parse_complex(part).map_err(|r| invalid(&r))?);
        }
        Ok(Self {
            source: selector.to_string(),
            alternatives,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether the element matches any alternative.
    pub fn matches(&self, doc: &Document, id: NodeId) -> bool {
        doc.is_element(id)
            && self
                .alternatives
                .iter()
                .any(|c| c.compounds.last().is_some_and(|last| last.matches(doc, id))
                    && c.matches_from(doc, id, c.compounds.len() - 1))
    }

    /// All matching descendants of `scope` in document order (scope excluded).
    pub fn select(&self, doc: &Document, scope: NodeId) -> Vec<NodeId> {
        doc.descendants(scope)
            .into_iter()
            .filter(|id| self.matches(doc, *id))
            .collect()
    }
}

impl Complex {
    /// `compounds[idx]` is known to match `id`; check everything to its left.
    fn matches_from(&self, doc: &Document, id: NodeId, idx: usize) -> bool {
        if idx == 0 {
            return true;
        }
        let left = &self.compounds[idx - 1];
        match self.combinators[idx - 1] {
            Combinator::Child => doc
                .parent(id)
                .is_some_and(|p| left.matches(doc, p) && self.matches_from(doc, p, idx - 1)),
            Combinator::Descendant => doc
                .ancestors(id)
                .any(|a| left.matches(doc, a) && self.matches_from(doc, a, idx - 1)),
        }
    }
}

impl Compound {
    fn matches(&self, doc: &Document, id: NodeId) -> bool {
        if let Some(tag) = &self.tag {
            if !doc.name(id).eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if let Some(want) = &self.id {
            if doc.attr(id, "id") != Some(want.as_str()) {
                return false;
            }
        }
        if !self.classes.iter().all(|c| doc.has_class(id, c)) {
            return false;
        }
        self.attrs.iter().all(|(name, op)| match (doc.attr(id, name), op) {
            (None, _) => false,
            (Some(_), AttrOp::Exists) => true,
            (Some(v), AttrOp::Equals(want)) => v == want,
            (Some(v), AttrOp::Contains(want)) => v.contains(want.as_str()),
            (Some(v), AttrOp::Prefix(want)) => v.starts_with(want.as_str()),
        })
    }
}

fn parse_complex(s: &str) -> Result<Complex, String> {
    let mut compounds = Vec::new();
    let mut combinators = Vec::new();
    let mut current = String::new();
    let mut pending: Option<Combinator> = None;
    let mut in_bracket = false;

    for ch in s.chars() {
        match ch {
            '[' => {
                in_bracket = true;
                current.push(ch);
            }
            ']' => {
                in_bracket = false;
                current.push(ch);
            }
            c if in_bracket => current.push(c),
            c if c.is_whitespace() => {
                if !current.is_empty() {
                    compounds.push(parse_compound(&current)?);
                    current.clear();
                    pending = Some(Combinator::Descendant);
                }
            }
            '>' => {
                if !current.is_empty() {
                    compounds.push(parse_compound(&current)?);
                    current.clear();
                }
                if compounds.is_empty() {
                    return Err("leading `>`".to_string());
                }
                pending = Some(Combinator::Child);
            }
            c => {
                if let Some(comb) = pending.take() {
                    combinators.push(comb);
                }
                current.push(c);
            }
        }
    }
    if in_bracket {
        return Err("unclosed `[`".to_string());
    }
    if !current.is_empty() {
        compounds.push(parse_compound(&current)?);
    } else if pending == Some(Combinator::Child) {
        return Err("trailing `>`".to_string());
    }
    if compounds.is_empty() {
        return Err("empty selector".to_string());
    }
    Ok(Complex {
        compounds,
        combinators,
    })
}

fn parse_compound(s: &str) -> Result<Compound, String> {
    let mut compound = Compound::default();
    let mut rest = s;

    let tag_end = rest.find(['.', '#', '[']).unwrap_or(rest.len());
    let tag = &rest[..tag_end];
    if !tag.is_empty() && tag != "*" {
        compound.tag = Some(tag.to_string());
    }
    rest = &rest[tag_end..];

    while let Some(first) = rest.chars().next() {
        match first {
            '.' | '#' => {
                let body = &rest[1..];
                let end = body.find(['.', '#', '[']).unwrap_or(body.len());
                let name = &body[..end];
                if name.is_empty() {
                    return Err(format!("empty name after `{}`", first));
                }
                if first == '.' {
                    compound.classes.push(name.to_string());
                } else {
                    compound.id = Some(name.to_string());
                }
                rest = &body[end..];
            }
            '[' => {
                let close = rest.find(']').ok_or("unclosed `[`")?;
                compound.attrs.push(parse_attr(&rest[1..close])?);
                rest = &rest[close + 1..];
            }
            other => return Err(format!("unexpected `{}`", other)),
        }
    }
    Ok(compound)
}

fn parse_attr(body: &str) -> Result<(String, AttrOp), String> {
    let unquote = |v: &str| v.trim().trim_matches(|c| c == '"' || c == '\'').to_string();
    let (name, op) = if let Some((name, value)) = body.split_once("*=") {
        (name, AttrOp::Contains(unquote(value)))
    } else if let Some((name, value)) = body.split_once("^=") {
        (name, AttrOp::Prefix(unquote(value)))
    } else if let Some((name, value)) = body.split_once('=') {
        (name, AttrOp::Equals(unquote(value)))
    } else {
        (body, AttrOp::Exists)
    };
    let name = name.trim();
    if name.is_empty() {
        return Err("empty attribute name".to_string());
    }
    Ok((name.to_string(), op))
}
