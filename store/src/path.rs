use std::fmt::Display;

use crate::StoreError;

/// Characters the hosted store refuses inside a key.
const FORBIDDEN: [char; 6] = ['.', '#', '$', '[', ']', '/'];

/// A slash-separated location in the store's tree.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct StorePath {
    segments: Vec<String>,
}

impl StorePath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn parse(raw: &str) -> Result<Self, StoreError> {
        let path = Self {
            segments: raw
                .split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        };
        path.validate()?;
        Ok(path)
    }

    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn parent(&self) -> Option<Self> {
        let (_, rest) = self.segments.split_last()?;
        Some(Self {
            segments: rest.to_vec(),
        })
    }

    pub fn is_prefix_of(&self, other: &StorePath) -> bool {
        other.segments.starts_with(&self.segments)
    }

    /// A change at one path is visible to a listener at the other.
    pub fn overlaps(&self, other: &StorePath) -> bool {
        self.is_prefix_of(other) || other.is_prefix_of(self)
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        match self
            .segments
            .iter()
            .find(|s| s.is_empty() || s.contains(FORBIDDEN))
        {
            Some(bad) => Err(StoreError::InvalidPath(format!(
                "segment {bad:?} of {self} is empty or contains one of {FORBIDDEN:?}"
            ))),
            None => Ok(()),
        }
    }
}

impl Display for StorePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "/{}", self.segments.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ignores_redundant_slashes() {
        let path = StorePath::parse("/games//c1/session/").unwrap();
        assert_eq!(path.segments(), ["games", "c1", "session"]);
        assert_eq!(path.to_string(), "/games/c1/session");
    }

    #[test]
    fn test_overlap_is_ancestor_or_descendant() {
        let session = StorePath::parse("games/c1/session").unwrap();
        let answer = session.child("answers").child("quiz_0");
        let other = StorePath::parse("games/c2/session").unwrap();
        assert!(session.overlaps(&answer));
        assert!(answer.overlaps(&session));
        assert!(!session.overlaps(&other));
        assert!(StorePath::root().overlaps(&other));
    }

    #[test]
    fn test_forbidden_characters_are_rejected() {
        assert!(StorePath::parse("games/a.b").is_err());
        assert!(StorePath::root().child("ok").child("x#y").validate().is_err());
    }
}
