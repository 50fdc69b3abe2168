//! Placeholder templates
//!
//! A template is tokenized once, when it is created, into literal text and
//! `{name}` placeholders. Rendering walks the tokens left to right and
//! resolves every placeholder exactly once, so a substituted value that
//! happens to contain `{other}` is emitted as-is and never expanded.
//!
//! Any `{...}` span without nested braces is a placeholder candidate; the
//! key is whatever sits between the braces, so `{price-usd}` and
//! `{bb.upper}` work as well as `{symbol}`. Candidates whose key is not in
//! the variables render verbatim, which keeps JSON examples inside prompts
//! intact.

use crate::{PromptError, Result};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

/// A named template with `{name}` placeholders
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    name: String,
    source: String,
    segments: Vec<Segment>,
}

impl PromptTemplate {
    /// Tokenize `source`
    ///
    /// Never fails: anything that is not a `{...}` span is literal text.
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        let source = source.into();
        let segments = tokenize(&source);
        Self {
            name: name.into(),
            source,
            segments,
        }
    }

    /// Template identifier
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Template text as written
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Placeholder candidates in order of appearance, repeats included
    ///
    /// Whether a candidate is substituted is decided at render time.
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Placeholder(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Substitute `vars`, a JSON object keyed by placeholder name
    ///
    /// - null renders as the empty string
    /// - strings render as themselves
    /// - numbers and booleans render in their textual form
    /// - objects and arrays render as compact JSON
    ///
    /// Placeholders without a matching key are left verbatim.
    pub fn render(&self, vars: &Value) -> Result<String> {
        let Value::Object(vars) = vars else {
            return Err(PromptError::InvalidVariables {
                name: self.name.clone(),
                kind: kind_of(vars),
            });
        };

        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(key) => match vars.get(key) {
                    Some(value) => push_value(&mut out, value),
                    None => {
                        out.push('{');
                        out.push_str(key);
                        out.push('}');
                    }
                },
            }
        }
        Ok(out)
    }

    /// Serialize `vars` and render
    pub fn render_with<T: Serialize>(&self, vars: &T) -> Result<String> {
        self.render(&serde_json::to_value(vars)?)
    }
}

fn push_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => {}
        Value::String(text) => out.push_str(text),
        other => out.push_str(&other.to_string()),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn tokenize(source: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut literal_start = 0;
    let mut cursor = 0;

    while let Some(offset) = source[cursor..].find('{') {
        let open = cursor + offset;
        match placeholder_at(source, open) {
            Some(name) => {
                if literal_start < open {
                    segments.push(Segment::Literal(source[literal_start..open].to_string()));
                }
                segments.push(Segment::Placeholder(name.to_string()));
                cursor = open + name.len() + 2;
                literal_start = cursor;
            }
            None => cursor = open + 1,
        }
    }

    if literal_start < source.len() {
        segments.push(Segment::Literal(source[literal_start..].to_string()));
    }
    segments
}

/// Key of the `{...}` span opening at byte `open`, if it closes before
/// another `{`
fn placeholder_at(source: &str, open: usize) -> Option<&str> {
    let rest = &source[open + 1..];
    let key = &rest[..rest.find('}')?];
    (!key.contains('{')).then_some(key)
}
