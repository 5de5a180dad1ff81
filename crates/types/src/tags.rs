//! Event tags emitted by state mutations.

use serde::{Deserialize, Serialize};

/// Tag key attached to a balance debit.
pub const TAG_SENDER: &str = "sender";
/// Tag key attached to a balance credit.
pub const TAG_RECIPIENT: &str = "recipient";

/// A single key/value event record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Ordered list of tags from sequential operations.
///
/// Tags are concatenated in operation order and never deduplicated or
/// reordered; external indexers rely on that ordering.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Tags(Vec<Tag>);

impl Tags {
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn single(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self(vec![Tag::new(key, value)])
    }

    /// Append all of `other` after the existing tags, preserving order.
    pub fn append_tags(&mut self, other: Tags) {
        self.0.extend(other.0);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tag> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl IntoIterator for Tags {
    type Item = Tag;
    type IntoIter = std::vec::IntoIter<Tag>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
