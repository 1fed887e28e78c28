//! Route matching logic.
//!
//! # Responsibilities
//! - Match the request path against a registered pattern
//! - Rank overlapping patterns by specificity
//!
//! # Design Decisions
//! - A pattern ending in `/` matches its whole subtree
//! - Any other pattern matches only the exact path
//! - Path matching is case-sensitive
//! - No regex to guarantee O(n) matching

/// Trait for matching request paths against conditions.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Returns true if the path matches this condition.
    fn matches(&self, path: &str) -> bool;

    /// Longer patterns win when several match.
    fn specificity(&self) -> usize;
}

/// A mounted path: exact or subtree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathPattern {
    Exact(String),
    Subtree(String),
}

impl PathPattern {
    /// Classify a mount path. An empty path mounts the root subtree.
    pub fn parse(pattern: &str) -> Self {
        if pattern.is_empty() {
            Self::Subtree("/".to_string())
        } else if pattern.ends_with('/') {
            Self::Subtree(pattern.to_string())
        } else {
            Self::Exact(pattern.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Exact(p) | Self::Subtree(p) => p,
        }
    }
}

impl std::fmt::Display for PathPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Matcher for PathPattern {
    fn matches(&self, path: &str) -> bool {
        match self {
            Self::Exact(p) => path == p,
            Self::Subtree(p) => path.starts_with(p.as_str()),
        }
    }

    fn specificity(&self) -> usize {
        self.as_str().len()
    }
}
