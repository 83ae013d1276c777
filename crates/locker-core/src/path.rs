use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LockerError;

/// A node in the resource hierarchy, e.g. `["proj", "module", "file"]`.
///
/// Never empty, and no segment is empty. Ordering is lexicographic over the
/// segments, so `a/b` sorts before `a/b/c` and `a/c`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct PathKey(Vec<String>);

impl PathKey {
    /// Create a path from its segments.
    pub fn new<I, S>(segments: I) -> Result<Self, LockerError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() {
            return Err(LockerError::InvalidInput("path must not be empty".to_string()));
        }
        if segments.iter().any(|s| s.is_empty()) {
            return Err(LockerError::InvalidInput(format!(
                "path {:?} contains an empty segment",
                segments
            )));
        }
        Ok(Self(segments))
    }

    /// Parse a slash-separated path such as `proj/module`.
    ///
    /// One leading and one trailing slash are ignored.
    pub fn parse(raw: &str) -> Result<Self, LockerError> {
        let trimmed = raw.strip_prefix('/').unwrap_or(raw);
        let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);
        if trimmed.is_empty() {
            return Err(LockerError::InvalidInput("path must not be empty".to_string()));
        }
        Self::new(trimmed.split('/'))
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Proper prefixes, from the root segment down, excluding `self`.
    pub fn ancestors(&self) -> impl Iterator<Item = PathKey> + '_ {
        (1..self.0.len()).map(move |n| PathKey(self.0[..n].to_vec()))
    }

    /// Every prefix from the root segment down, ending with `self`.
    pub fn lineage(&self) -> impl Iterator<Item = PathKey> + '_ {
        (1..=self.0.len()).map(move |n| PathKey(self.0[..n].to_vec()))
    }
}

impl TryFrom<Vec<String>> for PathKey {
    type Error = LockerError;

    fn try_from(segments: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(segments)
    }
}

impl From<PathKey> for Vec<String> {
    fn from(path: PathKey) -> Self {
        path.0
    }
}

impl FromStr for PathKey {
    type Err = LockerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}
