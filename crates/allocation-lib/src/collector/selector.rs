//! Label selector validation
//!
//! The selector is checked locally before the first listing call so a typo
//! in configuration fails the cycle without touching the API server. The
//! validated text is sent to the API unchanged.

use crate::error::CollectError;
use crate::models::Labels;

const MAX_NAME_LEN: usize = 63;
const MAX_PREFIX_LEN: usize = 253;

/// One term of a label selector
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    Exists(String),
    NotExists(String),
    Equals(String, String),
    NotEquals(String, String),
    In(String, Vec<String>),
    NotIn(String, Vec<String>),
}

impl Requirement {
    pub fn matches(&self, labels: &Labels) -> bool {
        match self {
            Requirement::Exists(key) => labels.contains_key(key),
            Requirement::NotExists(key) => !labels.contains_key(key),
            Requirement::Equals(key, value) => labels.get(key) == Some(value),
            Requirement::NotEquals(key, value) => labels.get(key) != Some(value),
            Requirement::In(key, values) => labels.get(key).map_or(false, |v| values.contains(v)),
            Requirement::NotIn(key, values) => labels.get(key).map_or(true, |v| !values.contains(v)),
        }
    }
}

/// A parsed, validated label selector
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSelector {
    raw: String,
    requirements: Vec<Requirement>,
}

impl LabelSelector {
    /// Selector that matches every node
    pub fn everything() -> Self {
        Self::default()
    }

    pub fn parse(selector: &str) -> Result<Self, CollectError> {
        let fail = |reason: String| CollectError::Selector {
            selector: selector.to_string(),
            reason,
        };

        let trimmed = selector.trim();
        if trimmed.is_empty() {
            return Ok(Self::everything());
        }

        let requirements = split_terms(trimmed)
            .map_err(fail)?
            .into_iter()
            .map(parse_term)
            .collect::<Result<Vec<_>, _>>()
            .map_err(fail)?;

        Ok(Self {
            raw: trimmed.to_string(),
            requirements,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    /// True if every requirement holds for the label set
    pub fn matches(&self, labels: &Labels) -> bool {
        self.requirements.iter().all(|r| r.matches(labels))
    }
}

/// Split on commas that are not inside a `( ... )` value list
fn split_terms(selector: &str) -> Result<Vec<&str>, String> {
    let mut terms = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;

    for (idx, ch) in selector.char_indices() {
        match ch {
            '(' => {
                if depth > 0 {
                    return Err("nested parentheses".to_string());
                }
                depth += 1;
            }
            ')' => {
                if depth == 0 {
                    return Err("unbalanced ')'".to_string());
                }
                depth -= 1;
            }
            ',' if depth == 0 => {
                terms.push(&selector[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }

    if depth != 0 {
        return Err("unbalanced '('".to_string());
    }
    terms.push(&selector[start..]);
    Ok(terms)
}

fn parse_term(term: &str) -> Result<Requirement, String> {
    let term = term.trim();
    if term.is_empty() {
        return Err("empty requirement".to_string());
    }

    if let Some(key) = term.strip_prefix('!') {
        let key = key.trim();
        validate_key(key)?;
        return Ok(Requirement::NotExists(key.to_string()));
    }

    if let Some(open) = term.find('(') {
        return parse_set_term(term, open);
    }

    for (op, negated) in [("!=", true), ("==", false), ("=", false)] {
        if let Some((key, value)) = term.split_once(op) {
            let (key, value) = (key.trim(), value.trim());
            validate_key(key)?;
            validate_value(value)?;
            return Ok(if negated {
                Requirement::NotEquals(key.to_string(), value.to_string())
            } else {
                Requirement::Equals(key.to_string(), value.to_string())
            });
        }
    }

    validate_key(term)?;
    Ok(Requirement::Exists(term.to_string()))
}

fn parse_set_term(term: &str, open: usize) -> Result<Requirement, String> {
    let close = term
        .rfind(')')
        .filter(|close| *close > open)
        .ok_or_else(|| format!("missing ')' in {:?}", term))?;
    if !term[close + 1..].trim().is_empty() {
        return Err(format!("unexpected text after ')' in {:?}", term));
    }

    let head: Vec<&str> = term[..open].split_whitespace().collect();
    let (key, op) = match head.as_slice() {
        [key, op] => (*key, *op),
        _ => return Err(format!("expected '<key> in|notin (...)' in {:?}", term)),
    };
    validate_key(key)?;

    let values = term[open + 1..close]
        .split(',')
        .map(str::trim)
        .map(|value| validate_value(value).map(|_| value.to_string()))
        .collect::<Result<Vec<_>, _>>()?;

    match op {
        "in" => Ok(Requirement::In(key.to_string(), values)),
        "notin" => Ok(Requirement::NotIn(key.to_string(), values)),
        other => Err(format!("unknown set operator {:?}", other)),
    }
}

fn validate_key(key: &str) -> Result<(), String> {
    if key.is_empty() {
        return Err("empty label key".to_string());
    }

    let name = match key.split_once('/') {
        Some((prefix, name)) => {
            validate_prefix(prefix).map_err(|e| format!("label key {:?}: {}", key, e))?;
            name
        }
        None => key,
    };

    if name.is_empty() {
        return Err(format!("label key {:?} has an empty name", key));
    }
    validate_name(name).map_err(|e| format!("label key {:?}: {}", key, e))
}

fn validate_value(value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Ok(());
    }
    validate_name(value).map_err(|e| format!("label value {:?}: {}", value, e))
}

/// Qualified name: alphanumeric at both ends, `-`, `_`, `.` inside
fn validate_name(name: &str) -> Result<(), String> {
    if name.len() > MAX_NAME_LEN {
        return Err(format!("longer than {} characters", MAX_NAME_LEN));
    }
    let bytes = name.as_bytes();
    let edge_ok = |b: u8| b.is_ascii_alphanumeric();
    if !edge_ok(bytes[0]) || !edge_ok(bytes[bytes.len() - 1]) {
        return Err("must start and end with an alphanumeric character".to_string());
    }
    if !bytes
        .iter()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
    {
        return Err("may only contain alphanumerics, '-', '_' or '.'".to_string());
    }
    Ok(())
}

/// DNS subdomain prefix of a label key
fn validate_prefix(prefix: &str) -> Result<(), String> {
    if prefix.is_empty() || prefix.len() > MAX_PREFIX_LEN {
        return Err("prefix must be a DNS subdomain".to_string());
    }
    for part in prefix.split('.') {
        let bytes = part.as_bytes();
        let edge_ok = |b: u8| b.is_ascii_lowercase() || b.is_ascii_digit();
        let valid = !bytes.is_empty()
            && edge_ok(bytes[0])
            && edge_ok(bytes[bytes.len() - 1])
            && bytes
                .iter()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-');
        if !valid {
            return Err("prefix must be a DNS subdomain".to_string());
        }
    }
    Ok(())
}
