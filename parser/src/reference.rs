//! Artifact references embedded in free text.
//!
//! A reference is written `<keyword>-<id>` (for example `TULEAP-123`), where the
//! keyword is chosen per deployment. The keyword is matched case-insensitively and
//! must stand on its own: it cannot be glued to a preceding word, and the id cannot
//! be followed by more word characters.

use crate::error::ParseReferenceError;
use regex::{CaptureMatches, Regex};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Identifier of a referenced artifact. Always strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct ReferenceId(u64);

impl ReferenceId {
    pub fn new(id: u64) -> Option<ReferenceId> {
        (id > 0).then_some(ReferenceId(id))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ReferenceId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl FromStr for ReferenceId {
    type Err = ParseReferenceError;

    fn from_str(s: &str) -> Result<ReferenceId, Self::Err> {
        let digits = s.strip_prefix('#').unwrap_or(s);
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseReferenceError::new(s, "not a decimal number"));
        }
        let id = digits
            .parse::<u64>()
            .map_err(|_| ParseReferenceError::new(s, "number too large"))?;
        ReferenceId::new(id).ok_or_else(|| ParseReferenceError::new(s, "must be positive"))
    }
}

impl TryFrom<u64> for ReferenceId {
    type Error = ParseReferenceError;

    fn try_from(id: u64) -> Result<ReferenceId, Self::Error> {
        ReferenceId::new(id).ok_or_else(|| ParseReferenceError::new("0", "must be positive"))
    }
}

impl From<ReferenceId> for u64 {
    fn from(id: ReferenceId) -> u64 {
        id.0
    }
}

/// A deduplicated collection of references.
///
/// Iteration follows insertion order so that messages built from a set list ids the
/// way they appeared in the text, but equality ignores order.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct ReferenceSet {
    ids: Vec<ReferenceId>,
    #[serde(skip)]
    index: HashSet<ReferenceId>,
}

impl ReferenceSet {
    pub fn new() -> ReferenceSet {
        ReferenceSet::default()
    }

    /// Returns `false` if the id was already present.
    pub fn insert(&mut self, id: ReferenceId) -> bool {
        if !self.index.insert(id) {
            return false;
        }
        self.ids.push(id);
        true
    }

    pub fn contains(&self, id: ReferenceId) -> bool {
        self.index.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = ReferenceId> + '_ {
        self.ids.iter().copied()
    }

    /// Ids of `self` followed by the ids of `other` not already in `self`.
    pub fn union(&self, other: &ReferenceSet) -> ReferenceSet {
        let mut union = self.clone();
        union.extend(other.iter());
        union
    }

    /// Ids of `self` that are not in `other`, in `self`'s order.
    pub fn difference(&self, other: &ReferenceSet) -> ReferenceSet {
        self.iter().filter(|id| !other.contains(*id)).collect()
    }
}

impl PartialEq for ReferenceSet {
    fn eq(&self, other: &ReferenceSet) -> bool {
        self.len() == other.len() && self.iter().all(|id| other.contains(id))
    }
}

impl Eq for ReferenceSet {}

impl fmt::Display for ReferenceSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (idx, id) in self.ids.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{id}")?;
        }
        Ok(())
    }
}

impl FromIterator<ReferenceId> for ReferenceSet {
    fn from_iter<I: IntoIterator<Item = ReferenceId>>(iter: I) -> ReferenceSet {
        let mut set = ReferenceSet::new();
        set.extend(iter);
        set
    }
}

impl Extend<ReferenceId> for ReferenceSet {
    fn extend<I: IntoIterator<Item = ReferenceId>>(&mut self, iter: I) {
        for id in iter {
            self.insert(id);
        }
    }
}

impl IntoIterator for ReferenceSet {
    type Item = ReferenceId;
    type IntoIter = std::vec::IntoIter<ReferenceId>;

    fn into_iter(self) -> Self::IntoIter {
        self.ids.into_iter()
    }
}

impl<'a> IntoIterator for &'a ReferenceSet {
    type Item = ReferenceId;
    type IntoIter = std::iter::Copied<std::slice::Iter<'a, ReferenceId>>;

    fn into_iter(self) -> Self::IntoIter {
        self.ids.iter().copied()
    }
}

/// Finds `<keyword>-<id>` tokens.
#[derive(Debug, Clone)]
pub struct ReferenceParser {
    re: Regex,
}

impl ReferenceParser {
    /// The keyword may only contain ASCII letters, digits and underscores.
    pub fn new(keyword: &str) -> Result<ReferenceParser, ParseReferenceError> {
        if keyword.is_empty() {
            return Err(ParseReferenceError::new(keyword, "keyword must not be empty"));
        }
        if !keyword
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_')
        {
            return Err(ParseReferenceError::new(
                keyword,
                "keyword may only contain letters, digits and underscores",
            ));
        }
        let re = Regex::new(&format!(
            r"(?i)(?:^|\W){}-(?P<id>[0-9]+)\b",
            regex::escape(keyword)
        ))
        .unwrap();
        Ok(ReferenceParser { re })
    }

    /// Lazily yields each referenced id once, in order of first appearance.
    pub fn extract<'p, 't>(&'p self, text: &'t str) -> References<'p, 't> {
        References {
            captures: self.re.captures_iter(text),
            seen: HashSet::new(),
        }
    }

    /// References found across several texts, in order.
    pub fn extract_all(&self, texts: &[&str]) -> ReferenceSet {
        texts.iter().flat_map(|text| self.extract(text)).collect()
    }
}

/// Iterator returned by [`ReferenceParser::extract`].
pub struct References<'p, 't> {
    captures: CaptureMatches<'p, 't>,
    seen: HashSet<ReferenceId>,
}

impl Iterator for References<'_, '_> {
    type Item = ReferenceId;

    fn next(&mut self) -> Option<ReferenceId> {
        for caps in self.captures.by_ref() {
            // Zero and out of range ids are not references.
            let Ok(id) = caps["id"].parse::<ReferenceId>() else {
                continue;
            };
            if self.seen.insert(id) {
                return Some(id);
            }
        }
        None
    }
}
