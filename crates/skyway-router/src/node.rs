//! Radix tree nodes.
//!
//! Each node owns one path segment. A segment is either literal text or a
//! `:name` capture, optionally followed by a literal suffix (`:id.json`).
//! Matching prefers literal children, then captures, and backtracks
//! through captures when a deeper segment fails.

use std::borrow::Cow;

use crate::method_router::MethodRouter;
use crate::params::Params;

/// What a node matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentKind {
    /// Literal segment text.
    Static(String),
    /// A `:name` capture with an optional literal suffix.
    Param {
        /// Capture name.
        name: String,
        /// Text that must follow the captured value within the segment.
        suffix: String,
    },
}

impl SegmentKind {
    /// Classifies one segment of a route template.
    ///
    /// The capture name runs over word characters after the colon, or up
    /// to the closing brace in the `:{name}` form; anything that follows it
    /// in the same segment is a literal suffix.
    #[must_use]
    pub fn parse(segment: &str) -> Self {
        let Some(rest) = segment.strip_prefix(':') else {
            return Self::Static(segment.to_string());
        };
        if let Some((name, suffix)) = rest.strip_prefix('{').and_then(|r| r.split_once('}')) {
            if name.is_empty() {
                return Self::Static(segment.to_string());
            }
            return Self::Param {
                name: name.to_string(),
                suffix: suffix.to_string(),
            };
        }
        let split = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        if split == 0 {
            return Self::Static(segment.to_string());
        }
        let (name, suffix) = rest.split_at(split);
        Self::Param {
            name: name.to_string(),
            suffix: suffix.to_string(),
        }
    }

    /// Extracts the captured text from a request segment, if it fits.
    fn capture<'s>(&self, segment: &'s str) -> Option<&'s str> {
        match self {
            Self::Static(text) => (text == segment).then_some(segment),
            Self::Param { suffix, .. } => segment
                .strip_suffix(suffix.as_str())
                .filter(|value| !value.is_empty()),
        }
    }
}

/// A node of the routing tree.
#[derive(Debug, Clone)]
pub struct Node {
    kind: SegmentKind,
    methods: Option<MethodRouter>,
    /// Literal children sorted by text for binary search.
    statics: Vec<Node>,
    /// Capture children in insertion order.
    params: Vec<Node>,
}

impl Node {
    fn new(kind: SegmentKind) -> Self {
        Self {
            kind,
            methods: None,
            statics: Vec::new(),
            params: Vec::new(),
        }
    }

    /// Creates the root of an empty tree.
    #[must_use]
    pub fn root() -> Self {
        Self::new(SegmentKind::Static(String::new()))
    }

    /// The segment this node matches.
    #[must_use]
    pub fn kind(&self) -> &SegmentKind {
        &self.kind
    }

    /// Inserts a `:name` template, merging with methods already there.
    pub fn insert(&mut self, template: &str, methods: MethodRouter) {
        let mut node = self;
        for segment in split(template) {
            node = node.child_mut(SegmentKind::parse(segment));
        }
        match &mut node.methods {
            Some(existing) => existing.merge(methods),
            None => node.methods = Some(methods),
        }
    }

    fn child_mut(&mut self, kind: SegmentKind) -> &mut Node {
        if let SegmentKind::Static(text) = &kind {
            let index = match self
                .statics
                .binary_search_by(|child| static_text(child).cmp(text.as_str()))
            {
                Ok(index) => index,
                Err(index) => {
                    self.statics.insert(index, Node::new(kind));
                    index
                }
            };
            return &mut self.statics[index];
        }
        let index = match self.params.iter().position(|child| child.kind == kind) {
            Some(index) => index,
            None => {
                self.params.push(Node::new(kind));
                self.params.len() - 1
            }
        };
        &mut self.params[index]
    }

    /// Matches a request path, returning the method table and the decoded
    /// captures.
    #[must_use]
    pub fn match_path(&self, path: &str) -> Option<(&MethodRouter, Params)> {
        let segments: Vec<&str> = split(path).collect();
        let mut params = Params::new();
        let methods = self.match_segments(&segments, &mut params)?;
        Some((methods, params))
    }

    fn match_segments<'a>(&'a self, segments: &[&str], params: &mut Params) -> Option<&'a MethodRouter> {
        let Some((segment, rest)) = segments.split_first() else {
            return self.methods.as_ref();
        };

        if let Ok(index) = self
            .statics
            .binary_search_by(|child| static_text(child).cmp(*segment))
        {
            if let Some(found) = self.statics[index].match_segments(rest, params) {
                return Some(found);
            }
        }

        for child in &self.params {
            let SegmentKind::Param { name, .. } = &child.kind else {
                continue;
            };
            let Some(raw) = child.kind.capture(segment) else {
                continue;
            };
            let mark = params.len();
            params.push(name.clone(), decode(raw));
            if let Some(found) = child.match_segments(rest, params) {
                return Some(found);
            }
            params.truncate(mark);
        }

        None
    }
}

fn static_text(node: &Node) -> &str {
    match &node.kind {
        SegmentKind::Static(text) => text,
        SegmentKind::Param { .. } => "",
    }
}

fn split(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

fn decode(raw: &str) -> String {
    urlencoding::decode(raw)
        .unwrap_or(Cow::Borrowed(raw))
        .into_owned()
}
