//! Patch records.
//!
//! A [`DeepPatch`] describes one tracked write: where it happened, relative
//! to the root, and what it did. Patches serialize to the shape consumers
//! replay into their own state:
//!
//! ```json
//! { "path": ["items", 0, "title"], "op": "set", "value": "new", "oldValue": "old" }
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// One step of a patch path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    /// Array slot.
    Index(usize),
    /// Object field (escaped) or synthetic set-entry id (verbatim).
    Key(String),
}

impl PathSegment {
    /// Segment for an object field, escaped for JSON Pointer.
    pub fn field(name: &str) -> Self {
        Self::Key(escape_segment(name))
    }

    /// Segment for a set entry addressed by its synthetic id. Not escaped.
    pub fn entry_id(id: impl Into<String>) -> Self {
        Self::Key(id.into())
    }

    pub fn as_key(&self) -> Option<&str> {
        match self {
            Self::Key(k) => Some(k),
            Self::Index(_) => None,
        }
    }

    pub fn as_index(&self) -> Option<usize> {
        match self {
            Self::Index(i) => Some(*i),
            Self::Key(_) => None,
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(i) => write!(f, "{i}"),
            Self::Key(k) => f.write_str(k),
        }
    }
}

impl From<usize> for PathSegment {
    fn from(i: usize) -> Self {
        Self::Index(i)
    }
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        Self::Key(key.to_string())
    }
}

/// Location of a write, from the root down.
pub type Path = SmallVec<[PathSegment; 4]>;

/// Escape a field name for use as a JSON Pointer segment.
///
/// `|` is reserved as a separator inside synthetic ids, so it is escaped too.
pub fn escape_segment(name: &str) -> String {
    if !name.contains(['~', '/', '|']) {
        return name.to_string();
    }
    name.replace('~', "~0").replace('/', "~1").replace('|', "~2")
}

/// What a patch did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    /// A field, slot or set entry that did not exist was created.
    Add,
    /// An existing field or slot was overwritten.
    Set,
    /// A field, slot or set entry was removed.
    Delete,
    /// Every entry of a set was removed.
    Clear,
}

/// Container type of the value a patch carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchKind {
    Object,
    Array,
    Set,
}

/// One path-addressed change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeepPatch {
    pub path: Path,
    pub op: PatchOp,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<PatchKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_value: Option<serde_json::Value>,
}

impl DeepPatch {
    pub fn new(path: Path, op: PatchOp) -> Self {
        Self {
            path,
            op,
            kind: None,
            value: None,
            old_value: None,
        }
    }

    pub fn with_kind(mut self, kind: Option<PatchKind>) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_value(mut self, value: serde_json::Value) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_old_value(mut self, old_value: serde_json::Value) -> Self {
        self.old_value = Some(old_value);
        self
    }

    /// Render the path as a JSON Pointer, e.g. `/items/0/title`.
    pub fn pointer(&self) -> String {
        self.path.iter().fold(String::new(), |mut out, segment| {
            out.push('/');
            out.push_str(&segment.to_string());
            out
        })
    }

    /// Whether the path ends with the given field names.
    pub fn ends_with(&self, tail: &[&str]) -> bool {
        if tail.len() > self.path.len() {
            return false;
        }
        let start = self.path.len() - tail.len();
        self.path[start..]
            .iter()
            .zip(tail)
            .all(|(segment, expected)| segment.to_string() == *expected)
    }

    /// Whether `prefix` is a proper prefix of this patch's path, or equal to it.
    pub fn is_under(&self, prefix: &[PathSegment]) -> bool {
        self.path.starts_with(prefix)
    }
}

impl fmt::Display for DeepPatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {}", self.op, self.pointer())?;
        if let Some(value) = &self.value {
            write!(f, " = {value}")?;
        }
        Ok(())
    }
}
