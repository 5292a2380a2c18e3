use std::borrow::Cow;
use std::fmt;

use crate::tagset::TagSet;

/// Name of the query parameter that carries the filter.
const TAGS_PARAM: &str = "tags";

/// Tags the user picked to narrow the folder list, in the order picked.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilterSelection(Vec<String>);

impl FilterSelection {
    pub fn new() -> FilterSelection {
        FilterSelection(Vec::new())
    }

    /// Select `tag` if it is not selected, deselect it otherwise.
    /// The empty tag cannot be written to a query and is never selected.
    pub fn toggle(&mut self, tag: &str) {
        if tag.is_empty() {
            return;
        }
        if let Some(pos) = self.0.iter().position(|t| t == tag) {
            self.0.remove(pos);
        } else {
            self.0.push(tag.to_string());
        }
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.iter().any(|t| t == tag)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn tags(&self) -> &[String] {
        &self.0
    }

    /// Query string (without `?`) that reproduces this selection.
    /// Empty selection gives empty query.
    pub fn to_query(&self) -> String {
        if self.0.is_empty() {
            return String::new();
        }

        let joined = self
            .0
            .iter()
            .map(|t| urlencoding::encode(t))
            .collect::<Vec<_>>()
            .join(",");

        format!("{TAGS_PARAM}={}", urlencoding::encode(&joined))
    }

    /// Selection stored in `query` (with or without leading `?`).
    /// Other parameters are ignored.
    pub fn from_query(query: &str) -> FilterSelection {
        let query = query.strip_prefix('?').unwrap_or(query);

        let value = query
            .split('&')
            .map(|pair| pair.split_once('=').unwrap_or((pair, "")))
            .find(|(key, _)| decode_component(key) == TAGS_PARAM)
            .map(|(_, value)| decode_component(value));

        let mut selection = FilterSelection::new();
        if let Some(value) = value {
            for tag in value.split(',') {
                let tag = decode(tag);
                if !tag.is_empty() && !selection.contains(&tag) {
                    selection.0.push(tag.into_owned());
                }
            }
        }
        selection
    }

    /// A folder is visible when its name contains `search` (ignoring case)
    /// and it carries every selected tag.
    pub fn matches(&self, name: &str, tags: &TagSet, search: &str) -> bool {
        name.to_lowercase().contains(&search.to_lowercase()) && tags.contains_all(&self.0)
    }
}

/// Decode one form-encoded query component.
fn decode_component(s: &str) -> Cow<'_, str> {
    if s.contains('+') {
        Cow::Owned(decode(&s.replace('+', " ")).into_owned())
    } else {
        decode(s)
    }
}

fn decode(s: &str) -> Cow<'_, str> {
    urlencoding::decode(s).unwrap_or(Cow::Borrowed(s))
}

/// Address of the page. Only the query part changes while browsing,
/// replacing it never navigates away.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageLocation {
    path: String,
    query: String,
}

impl PageLocation {
    /// Parse `/path?query`. A missing path means `/`.
    pub fn parse(location: &str) -> PageLocation {
        let (path, query) = location.split_once('?').unwrap_or((location, ""));
        PageLocation {
            path: if path.is_empty() { "/" } else { path }.to_string(),
            query: query.to_string(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn selection(&self) -> FilterSelection {
        FilterSelection::from_query(&self.query)
    }

    pub fn replace_query(&mut self, selection: &FilterSelection) {
        self.query = selection.to_query();
    }
}

impl Default for PageLocation {
    fn default() -> Self {
        PageLocation::parse("/")
    }
}

impl fmt::Display for PageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.query.is_empty() {
            f.write_str(&self.path)
        } else {
            write!(f, "{}?{}", self.path, self.query)
        }
    }
}
