//! URL template parsing and matching.
//!
//! A template is the path-matching half of a `google.api.http` binding, e.g.
//! `/v1/rules/{selector}/body/{body=**}:publish`. Parsing turns the template
//! string into a [`CompiledPattern`]: a sequence of [`Operation`]s plus an
//! optional verb suffix. Matching walks those operations against a concrete
//! request path, producing capture [`Variable`]s by byte offset so that a
//! trailing `**` capture can retain embedded `/` characters.

use std::fmt;

/// One step of a compiled pattern.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operation {
    /// Consume one segment, requiring it to equal the literal exactly.
    Match(String),
    /// Consume exactly one segment, unconditionally.
    AnyOnce,
    /// Consume every remaining segment, including embedded `/`.
    AnyZeroOrMore,
    /// Record the current byte offset as the start of a capture.
    StartCapture,
    /// Close the most recently opened capture, naming its field path.
    EndCapture(FieldPath),
}

/// A dotted field path, e.g. `body.text` → `["body", "text"]`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FieldPath(pub Vec<String>);

impl FieldPath {
    fn parse(s: &str) -> Result<Self, PatternError> {
        if s.is_empty() {
            return Err(PatternError::EmptyFieldPath);
        }
        let segments: Vec<String> = s.split('.').map(str::to_string).collect();
        if segments.iter().any(String::is_empty) {
            return Err(PatternError::EmptyFieldPath);
        }
        Ok(Self(segments))
    }

    /// Segment names in order.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

/// A captured path variable: the field path it targets and its raw text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Variable {
    /// Destination field path.
    pub path: FieldPath,
    /// Captured substring, taken from the original path (never rejoined).
    pub value: String,
}

/// A parsed, matchable URL template.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompiledPattern {
    template: String,
    ops: Vec<Operation>,
    verb: Option<String>,
}

/// Errors raised while parsing a template string.
#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
pub enum PatternError {
    /// A field path (inside `{...}`) had no segments, or an empty segment.
    #[error("field path is empty")]
    EmptyFieldPath,
    /// A `{...}` capture was nested inside another capture.
    #[error("nested capture is not allowed")]
    NestedCapture,
    /// `**` appeared somewhere other than the final matching operation.
    #[error("`**` must be the last matching operation")]
    MisplacedGlob,
    /// A segment was empty where a non-leading empty segment is not allowed.
    #[error("empty path segment")]
    EmptySegment,
    /// The template did not start with `/`.
    #[error("template must start with '/'")]
    MissingLeadingSlash,
    /// A `{` was never closed with a matching `}`.
    #[error("unterminated '{{' in template")]
    UnterminatedBrace,
    /// A literal segment contained a disallowed character.
    #[error("literal segment '{0}' contains a reserved character")]
    InvalidLiteral(String),
}

impl CompiledPattern {
    /// Parse a template string into a [`CompiledPattern`].
    ///
    /// # Errors
    ///
    /// Returns [`PatternError`] when the template violates the grammar (see
    /// module docs): missing leading slash, an empty or nested capture, a
    /// `**` that isn't the final matching operation, or a literal segment
    /// using a reserved character.
    pub fn parse(template: &str) -> Result<Self, PatternError> {
        let (path, verb) = match template.rsplit_once(':') {
            Some((p, v)) => (p, Some(v.to_string())),
            None => (template, None),
        };

        if !path.starts_with('/') {
            return Err(PatternError::MissingLeadingSlash);
        }
        let body = &path[1..];

        let mut ops = Vec::new();
        let mut saw_glob = false;

        let segments = split_segments(body)?;
        for seg in &segments {
            if seg.is_empty() {
                return Err(PatternError::EmptySegment);
            }
            if saw_glob {
                // Only EndCapture-producing segments may follow `**`, and
                // those never appear as literal segments, so any segment
                // after the glob is an error.
                return Err(PatternError::MisplacedGlob);
            }
            if seg.starts_with('{') {
                if !seg.ends_with('}') {
                    return Err(PatternError::UnterminatedBrace);
                }
                let inner = &seg[1..seg.len() - 1];
                if inner.contains('{') || inner.contains('}') {
                    return Err(PatternError::NestedCapture);
                }
                let (field, sub) = match inner.split_once('=') {
                    Some((f, s)) => (f, s),
                    None => (inner, "*"),
                };
                let path = FieldPath::parse(field)?;
                ops.push(Operation::StartCapture);
                if sub == "**" {
                    ops.push(Operation::AnyZeroOrMore);
                    saw_glob = true;
                } else {
                    for sub_seg in split_segments(sub)? {
                        push_literal_or_any(&mut ops, &sub_seg)?;
                    }
                }
                ops.push(Operation::EndCapture(path));
            } else if seg == "**" {
                ops.push(Operation::AnyZeroOrMore);
                saw_glob = true;
            } else {
                push_literal_or_any(&mut ops, seg)?;
            }
        }

        Ok(Self {
            template: template.to_string(),
            ops,
            verb,
        })
    }

    /// The original template string, unmodified.
    #[must_use]
    pub fn template(&self) -> &str {
        &self.template
    }

    /// The compiled operation sequence, in order.
    #[must_use]
    pub fn operations(&self) -> &[Operation] {
        &self.ops
    }

    /// Attempt to match `path` (e.g. `/v1/rules/42:publish`) against this
    /// pattern, returning the captured variables on success.
    #[must_use]
    pub fn matches(&self, path: &str) -> Option<Vec<Variable>> {
        let (candidate_path, candidate_verb) = match path.rsplit_once(':') {
            Some((p, v)) => (p, Some(v)),
            None => (path, None),
        };
        if candidate_verb != self.verb.as_deref() {
            return None;
        }
        if !candidate_path.starts_with('/') {
            return None;
        }
        let body = &candidate_path[1..];

        // An empty body (the path is exactly "/") has zero segments, not
        // one empty segment — otherwise a bare `*`/capture would wrongly
        // consume it.
        let mut segs: Vec<(usize, usize)> = Vec::new();
        if !body.is_empty() {
            let mut start = 0usize;
            for (i, c) in body.char_indices() {
                if c == '/' {
                    segs.push((start, i));
                    start = i + 1;
                }
            }
            segs.push((start, body.len()));
        }

        let mut idx = 0usize;
        let mut captures = Vec::new();
        let mut capture_start: Option<usize> = None;
        let mut fast_forwarded = false;

        for op in &self.ops {
            match op {
                Operation::Match(lit) => {
                    let (s, e) = *segs.get(idx)?;
                    if &body[s..e] != lit.as_str() {
                        return None;
                    }
                    idx += 1;
                }
                Operation::AnyOnce => {
                    let (s, e) = *segs.get(idx)?;
                    if s == e {
                        return None;
                    }
                    idx += 1;
                }
                Operation::AnyZeroOrMore => {
                    idx = segs.len();
                    fast_forwarded = true;
                }
                Operation::StartCapture => {
                    let byte_off = segs.get(idx).map_or(body.len(), |&(s, _)| s);
                    capture_start = Some(byte_off);
                }
                Operation::EndCapture(field) => {
                    let start = capture_start.take().unwrap_or(0);
                    let end = if fast_forwarded {
                        body.len()
                    } else {
                        segs.get(idx.saturating_sub(1))
                            .map_or(start, |&(_, e)| e)
                    };
                    let raw = &body[start..end.max(start)];
                    captures.push(Variable {
                        path: field.clone(),
                        value: raw.to_string(),
                    });
                }
            }
        }

        if idx != segs.len() && !fast_forwarded {
            return None;
        }

        Some(captures)
    }
}

fn push_literal_or_any(ops: &mut Vec<Operation>, seg: &str) -> Result<(), PatternError> {
    if seg == "*" {
        ops.push(Operation::AnyOnce);
        return Ok(());
    }
    if seg.contains(['{', '}', '*', '=']) {
        return Err(PatternError::InvalidLiteral(seg.to_string()));
    }
    ops.push(Operation::Match(seg.to_string()));
    Ok(())
}

/// Split a slash-delimited body into segments, treating `{...}` as atomic
/// (braces are never split on even if they contain `/`).
fn split_segments(body: &str) -> Result<Vec<String>, PatternError> {
    if body.is_empty() {
        return Ok(Vec::new());
    }
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut depth = 0u32;
    for c in body.chars() {
        match c {
            '{' => {
                if depth > 0 {
                    return Err(PatternError::NestedCapture);
                }
                depth += 1;
                current.push(c);
            }
            '}' => {
                if depth == 0 {
                    return Err(PatternError::UnterminatedBrace);
                }
                depth -= 1;
                current.push(c);
            }
            '/' if depth == 0 => {
                segments.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    if depth != 0 {
        return Err(PatternError::UnterminatedBrace);
    }
    segments.push(current);
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(p: &str) -> Vec<String> {
        p.split('.').map(str::to_string).collect()
    }

    #[test]
    fn single_capture_matches() {
        let pat = CompiledPattern::parse("/api/v1/rules/{selector}").unwrap();
        let vars = pat.matches("/api/v1/rules/1234").unwrap();
        assert_eq!(vars.len(), 1);
        assert_eq!(vars[0].path.segments(), &path("selector"));
        assert_eq!(vars[0].value, "1234");
        assert!(pat.matches("/api/v1/rules/").is_none());
    }

    #[test]
    fn catch_all_tail_preserves_slashes() {
        let pat = CompiledPattern::parse("/api/v2/rules/{selector}/body/{body=**}").unwrap();
        let vars = pat
            .matches("/api/v2/rules/1234/body/1/2/4/")
            .expect("should match");
        assert_eq!(vars[0].value, "1234");
        assert_eq!(vars[1].value, "1/2/4/");
    }

    #[test]
    fn rejects_malformed_templates() {
        let bad = [
            "/v1/package/{id/other",
            "/{id=/*/}}/c/d",
            "/{=*}/c/d",
            "api/v1",
            "/api/users/**/{user.id=*}/posts",
            "/{inner.id=/*/{id=*}}/c/d",
        ];
        for tmpl in bad {
            assert!(
                CompiledPattern::parse(tmpl).is_err(),
                "expected {tmpl} to be rejected"
            );
        }
    }

    #[test]
    fn verb_suffix_is_compared_verbatim() {
        let pat = CompiledPattern::parse("/v1/rules/{id}:publish").unwrap();
        assert!(pat.matches("/v1/rules/42:publish").is_some());
        assert!(pat.matches("/v1/rules/42").is_none());
        assert!(pat.matches("/v1/rules/42:archive").is_none());
    }

    #[test]
    fn reparsing_is_stable() {
        let tmpl = "/api/v2/rules/{selector}/body/{body=**}";
        let first = CompiledPattern::parse(tmpl).unwrap();
        let second = CompiledPattern::parse(tmpl).unwrap();
        assert_eq!(first.operations(), second.operations());
    }

    #[test]
    fn glob_is_final_matching_operation() {
        let pat = CompiledPattern::parse("/v1/{a=**}").unwrap();
        let ops = pat.operations();
        let glob_idx = ops
            .iter()
            .position(|o| matches!(o, Operation::AnyZeroOrMore))
            .unwrap();
        for op in &ops[glob_idx + 1..] {
            assert!(matches!(op, Operation::EndCapture(_)));
        }
    }
}
