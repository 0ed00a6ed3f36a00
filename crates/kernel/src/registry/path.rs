//! Route path normalization and template matching.
//!
//! Paths are `/`-separated segments. A segment written `{name}` captures the
//! corresponding request segment as a named parameter.

use std::collections::HashMap;

/// One segment of a route template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Param(String),
}

/// A parsed full route path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    segments: Vec<Segment>,
}

impl PathTemplate {
    /// Parse a normalized path.
    pub fn parse(path: &str) -> Result<Self, String> {
        let path = normalize(path)?;
        let segments = split(&path)
            .map(|seg| match seg.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                Some(name) => Segment::Param(name.to_string()),
                None => Segment::Literal(seg.to_string()),
            })
            .collect();
        Ok(Self { segments })
    }

    /// True when the template has no parameter segments.
    pub fn is_static(&self) -> bool {
        self.segments
            .iter()
            .all(|s| matches!(s, Segment::Literal(_)))
    }

    /// The template with parameter names erased.
    ///
    /// Two templates with the same shape answer the same requests, so the
    /// shape is what route uniqueness is checked against.
    pub fn shape(&self) -> String {
        if self.segments.is_empty() {
            return "/".to_string();
        }
        self.segments
            .iter()
            .map(|s| match s {
                Segment::Literal(lit) => format!("/{lit}"),
                Segment::Param(_) => "/{}".to_string(),
            })
            .collect()
    }

    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Param(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Number of literal segments; more literals means more specific.
    pub fn literal_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Literal(_)))
            .count()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Match a declared path, extracting parameters.
    ///
    /// Template: "/custom/items/{id}"
    /// Path: "/custom/items/42"
    /// Result: Some({"id": "42"})
    pub fn matches(&self, path: &str) -> Option<HashMap<String, String>> {
        let parts: Vec<&str> = split(path).collect();
        self.match_segments(&parts)
    }

    /// Match already-split, already-decoded request segments.
    pub fn match_segments<S: AsRef<str>>(&self, parts: &[S]) -> Option<HashMap<String, String>> {
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut params = HashMap::new();
        for (segment, actual) in self.segments.iter().zip(parts) {
            let actual = actual.as_ref();
            match segment {
                Segment::Param(name) => {
                    params.insert(name.clone(), actual.to_string());
                }
                Segment::Literal(lit) if lit != actual => return None,
                Segment::Literal(_) => {}
            }
        }
        Some(params)
    }
}

/// Split a raw request path and percent-decode each segment.
///
/// Empty segments are dropped. `None` when a segment does not decode to
/// UTF-8; such a path cannot name any route.
pub fn decode_segments(path: &str) -> Option<Vec<String>> {
    split(path)
        .map(|seg| urlencoding::decode(seg).ok().map(|s| s.into_owned()))
        .collect()
}

fn split(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Normalize a path: leading `/`, no trailing `/`, no empty segments.
///
/// `""` and `"/"` normalize to `"/"`.
pub fn normalize(path: &str) -> Result<String, String> {
    let trimmed = path.trim();
    if trimmed.is_empty() || trimmed == "/" {
        return Ok("/".to_string());
    }

    let body = trimmed.strip_prefix('/').unwrap_or(trimmed);
    let body = body.strip_suffix('/').unwrap_or(body);

    let mut names = Vec::new();
    for segment in body.split('/') {
        if segment.is_empty() {
            return Err("empty path segment".to_string());
        }
        if segment.chars().any(|c| c.is_whitespace() || c == '?' || c == '#') {
            return Err(format!("segment '{segment}' contains a reserved character"));
        }
        if let Some(name) = segment.strip_prefix('{') {
            let Some(name) = name.strip_suffix('}') else {
                return Err(format!("unterminated parameter in '{segment}'"));
            };
            if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(format!("invalid parameter name '{name}'"));
            }
            if names.contains(&name) {
                return Err(format!("duplicate parameter '{name}'"));
            }
            names.push(name);
        } else if segment.contains('{') || segment.contains('}') {
            return Err(format!("parameter must span a whole segment in '{segment}'"));
        }
    }

    Ok(format!("/{body}"))
}

/// Join a mount prefix and a route path into a normalized full path.
pub fn join(prefix: &str, path: &str) -> Result<String, String> {
    let prefix = normalize(prefix)?;
    let path = normalize(path)?;
    let full = match (prefix.as_str(), path.as_str()) {
        ("/", p) => p.to_string(),
        (pre, "/") => pre.to_string(),
        (pre, p) => format!("{pre}{p}"),
    };
    // Re-run normalization so duplicate parameter names across the prefix
    // boundary are caught.
    normalize(&full)
}
