use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Identifier of a writer participating in log-based synchronization.
///
/// Identifiers end up inside watermark keys and file names, so they must be
/// non-empty and free of whitespace, path separators and control characters.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OriginatorId(String);

impl OriginatorId {
    /// Validate and wrap an identifier.
    pub fn new(id: impl Into<String>) -> Result<Self, TypeError> {
        let id = id.into();
        if let Some(reason) = label_violation(&id) {
            return Err(TypeError::InvalidOriginatorId { id, reason });
        }
        Ok(Self(id))
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for OriginatorId {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<OriginatorId> for String {
    fn from(id: OriginatorId) -> Self {
        id.0
    }
}

impl fmt::Debug for OriginatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OriginatorId({})", self.0)
    }
}

impl fmt::Display for OriginatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Label of a writer-local execution surface (a context).
///
/// Transactions record the context that produced them so a writer can skip
/// its own entries when it fetches history.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContextName(String);

impl ContextName {
    /// Validate and wrap a context name.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        if let Some(reason) = label_violation(&name) {
            return Err(TypeError::InvalidContextName { name, reason });
        }
        Ok(Self(name))
    }

    /// The context name a writer uses by default: its own identifier.
    pub fn for_originator(id: &OriginatorId) -> Self {
        Self(id.as_str().to_string())
    }

    /// The name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ContextName {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ContextName> for String {
    fn from(name: ContextName) -> Self {
        name.0
    }
}

impl fmt::Debug for ContextName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContextName({})", self.0)
    }
}

impl fmt::Display for ContextName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn label_violation(label: &str) -> Option<String> {
    if label.is_empty() {
        return Some("must not be empty".into());
    }
    if let Some(ch) = label
        .chars()
        .find(|c| c.is_whitespace() || c.is_control() || *c == '/' || *c == '\\')
    {
        return Some(format!("contains forbidden character: {ch:?}"));
    }
    if label == "." || label == ".." {
        return Some("must not be a relative path component".into());
    }
    None
}

/// A writer together with the fixed roster of writers it synchronizes with.
///
/// The roster lists every participant, the current writer included, e.g. an
/// app process and its extension process sharing one store:
///
/// ```
/// use histsync_types::{Originator, OriginatorId};
///
/// let app = OriginatorId::new("app").unwrap();
/// let widget = OriginatorId::new("widget").unwrap();
/// let current = Originator::new(app.clone(), vec![app, widget]);
/// assert_eq!(current.roster().len(), 2);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Originator {
    id: OriginatorId,
    roster: Vec<OriginatorId>,
}

impl Originator {
    /// Describe the current writer and its roster.
    ///
    /// No uniqueness check happens here; the merge processor validates the
    /// roster when it is constructed.
    pub fn new(id: OriginatorId, roster: Vec<OriginatorId>) -> Self {
        Self { id, roster }
    }

    /// Identifier of the current writer.
    pub fn id(&self) -> &OriginatorId {
        &self.id
    }

    /// Every participant, in configuration order.
    pub fn roster(&self) -> &[OriginatorId] {
        &self.roster
    }

    /// Returns `true` if the roster names the current writer.
    pub fn roster_includes_self(&self) -> bool {
        self.roster.contains(&self.id)
    }
}

impl fmt::Display for Originator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}
