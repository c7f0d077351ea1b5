// ── Provider tree model ──
//
// Elements as the provider reports them. The engine reads these types;
// only providers (and tests) construct them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

// ── QualifiedPath ───────────────────────────────────────────────────

/// Position of an element in the provider tree as a sequence of
/// element numbers, e.g. `1.3.2`.
///
/// The empty path addresses the synthetic root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct QualifiedPath(Vec<u32>);

impl QualifiedPath {
    pub fn new(segments: Vec<u32>) -> Self {
        Self(segments)
    }

    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> &[u32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Path of the child numbered `number` below this one.
    pub fn child(&self, number: u32) -> Self {
        let mut segments = self.0.clone();
        segments.push(number);
        Self(segments)
    }

    /// Path of the enclosing element, `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        let (_, head) = self.0.split_last()?;
        Some(Self(head.to_vec()))
    }

    /// Segment-wise prefix test: `1.2` is a prefix of `1.2.7` but not of `1.20`.
    pub fn starts_with(&self, prefix: &Self) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for QualifiedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for segment in &self.0 {
            if !first {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
            first = false;
        }
        Ok(())
    }
}

impl FromStr for QualifiedPath {
    type Err = Error;

    /// Parses `1.2.3` or `1/2/3`. Surrounding whitespace and a single
    /// leading or trailing separator are tolerated.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_matches(|c| c == '.' || c == '/');
        if trimmed.is_empty() {
            return Ok(Self::root());
        }
        trimmed
            .split(['.', '/'])
            .map(|segment| segment.trim().parse::<u32>())
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
            .map_err(|_| Error::InvalidPath {
                input: s.to_owned(),
            })
    }
}

impl From<QualifiedPath> for String {
    fn from(path: QualifiedPath) -> Self {
        path.to_string()
    }
}

impl TryFrom<String> for QualifiedPath {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Vec<u32>> for QualifiedPath {
    fn from(segments: Vec<u32>) -> Self {
        Self(segments)
    }
}

// ── Value ───────────────────────────────────────────────────────────

/// A raw parameter value as carried by the protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Boolean(bool),
    Integer(i64),
    Real(f64),
    String(String),
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view of the value. Strings are not coerced.
    #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Real(r) => Some(*r),
            Self::Boolean(_) | Self::String(_) => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer(_) | Self::Real(_))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Real(r) => write!(f, "{r}"),
            Self::String(s) => f.write_str(s),
        }
    }
}

// ── ParameterKind ───────────────────────────────────────────────────

/// Declared type of a parameter.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ParameterKind {
    Integer,
    Real,
    Boolean,
    String,
    Enum,
}

// ── Element contents ────────────────────────────────────────────────

/// Contents of a container element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeContents {
    pub identifier: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Contents of a parameter element: value, type and display metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterContents {
    pub identifier: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: ParameterKind,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub minimum: Option<Value>,
    #[serde(default)]
    pub maximum: Option<Value>,
    /// Divisor applied to integer values for display.
    #[serde(default)]
    pub factor: Option<i64>,
    /// Display labels indexed by the raw integer value.
    #[serde(default)]
    pub enumeration: Option<Vec<String>>,
}

impl ParameterContents {
    pub fn new(identifier: impl Into<String>, kind: ParameterKind) -> Self {
        Self {
            identifier: identifier.into(),
            description: None,
            kind,
            value: None,
            minimum: None,
            maximum: None,
            factor: None,
            enumeration: None,
        }
    }

    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_minimum(mut self, minimum: Value) -> Self {
        self.minimum = Some(minimum);
        self
    }

    pub fn with_maximum(mut self, maximum: Value) -> Self {
        self.maximum = Some(maximum);
        self
    }

    pub fn with_factor(mut self, factor: i64) -> Self {
        self.factor = Some(factor);
        self
    }

    pub fn with_enumeration<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enumeration = Some(labels.into_iter().map(Into::into).collect());
        self
    }
}

/// Split a newline-delimited enumeration string into display labels.
pub fn enumeration_from_text(text: &str) -> Vec<String> {
    text.split('\n').map(str::to_owned).collect()
}

/// What kind of element a [`TreeNode`] is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "element", rename_all = "lowercase")]
pub enum ElementContents {
    Node(NodeContents),
    Parameter(ParameterContents),
}

// ── TreeNode ────────────────────────────────────────────────────────

/// A single element of the provider tree, addressed by its qualified path.
///
/// Children are not embedded; they are fetched on demand through
/// [`Provider::expand`](crate::Provider::expand).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    pub path: QualifiedPath,
    pub contents: ElementContents,
}

impl TreeNode {
    pub fn node(path: QualifiedPath, identifier: impl Into<String>) -> Self {
        Self {
            path,
            contents: ElementContents::Node(NodeContents {
                identifier: identifier.into(),
                description: None,
            }),
        }
    }

    pub fn parameter(path: QualifiedPath, contents: ParameterContents) -> Self {
        Self {
            path,
            contents: ElementContents::Parameter(contents),
        }
    }

    /// The identifier exactly as reported by the provider.
    pub fn identifier(&self) -> &str {
        match &self.contents {
            ElementContents::Node(n) => &n.identifier,
            ElementContents::Parameter(p) => &p.identifier,
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(self.contents, ElementContents::Node(_))
    }

    pub fn as_parameter(&self) -> Option<&ParameterContents> {
        match &self.contents {
            ElementContents::Parameter(p) => Some(p),
            ElementContents::Node(_) => None,
        }
    }

    pub fn as_parameter_mut(&mut self) -> Option<&mut ParameterContents> {
        match &mut self.contents {
            ElementContents::Parameter(p) => Some(p),
            ElementContents::Node(_) => None,
        }
    }
}
