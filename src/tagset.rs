use std::ops::Deref;

use serde::{Deserialize, Deserializer, Serialize};

/// Ordered list of unique tags attached to one folder.
///
/// Equality of tags is case-sensitive. Order is kept for display only.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TagSet(Vec<String>);

impl TagSet {
    pub fn new() -> TagSet {
        TagSet(Vec::new())
    }

    /// Build a set from tags exactly as a client sent or the table holds them.
    /// Duplicates are dropped (first occurrence wins), content is not trimmed.
    pub fn from_stored<I, S>(tags: I) -> TagSet
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = TagSet::new();
        for tag in tags {
            let tag = tag.into();
            if !set.contains(&tag) {
                set.0.push(tag);
            }
        }
        set
    }

    /// Add a tag typed by the user. The input is trimmed; blank input and
    /// tags already present are ignored. Returns whether the set changed.
    pub fn add(&mut self, input: &str) -> bool {
        let tag = input.trim();
        if tag.is_empty() || self.contains(tag) {
            return false;
        }
        self.0.push(tag.to_string());
        true
    }

    /// Remove the tag at `index`, if there is one.
    pub fn remove(&mut self, index: usize) -> Option<String> {
        if index < self.0.len() {
            Some(self.0.remove(index))
        } else {
            None
        }
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.iter().any(|t| t == tag)
    }

    /// Whether every tag of `required` is in this set.
    pub fn contains_all<'a, I>(&self, required: I) -> bool
    where
        I: IntoIterator<Item = &'a String>,
    {
        required.into_iter().all(|t| self.contains(t))
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

impl Deref for TagSet {
    type Target = [String];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<'de> Deserialize<'de> for TagSet {
    fn deserialize<D>(d: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let tags: Vec<String> = Vec::deserialize(d)?;
        Ok(TagSet::from_stored(tags))
    }
}

impl From<TagSet> for Vec<String> {
    fn from(set: TagSet) -> Self {
        set.0
    }
}
