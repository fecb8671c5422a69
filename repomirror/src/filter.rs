//! Allow/ignore glob filtering of repository paths.
//!
//! Patterns use shell-glob semantics (`*`, `?`, `[...]`) against the full
//! repo-relative path. `*` also crosses `/`, so `*.json` matches
//! `configs/a.json`.

use glob::Pattern;

use crate::error::{SyncError, SyncResult};

/// Compiled allow and ignore pattern sets.
///
/// An empty set imposes no restriction.
#[derive(Debug, Clone, Default)]
pub struct PatternFilter {
    allow: Vec<Pattern>,
    ignore: Vec<Pattern>,
}

impl PatternFilter {
    /// Compile the given pattern lists.
    pub fn new<S: AsRef<str>>(allow: &[S], ignore: &[S]) -> SyncResult<Self> {
        Ok(Self {
            allow: compile(allow)?,
            ignore: compile(ignore)?,
        })
    }

    /// Decide whether a path is part of the sync.
    pub fn include(&self, path: &str) -> bool {
        include(path, &self.allow, &self.ignore)
    }

    /// Whether neither list restricts anything.
    pub fn is_unrestricted(&self) -> bool {
        self.allow.is_empty() && self.ignore.is_empty()
    }
}

/// Allow stage first, then ignore stage.
pub fn include(path: &str, allow: &[Pattern], ignore: &[Pattern]) -> bool {
    if !allow.is_empty() && !allow.iter().any(|p| p.matches(path)) {
        return false;
    }
    !ignore.iter().any(|p| p.matches(path))
}

fn compile<S: AsRef<str>>(patterns: &[S]) -> SyncResult<Vec<Pattern>> {
    patterns
        .iter()
        .map(|p| {
            let p = p.as_ref();
            Pattern::new(p).map_err(|e| SyncError::InvalidPattern {
                pattern: p.to_string(),
                reason: e.msg.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(allow: &[&str], ignore: &[&str]) -> PatternFilter {
        PatternFilter::new(allow, ignore).unwrap()
    }

    #[test]
    fn test_allow_then_ignore() {
        let f = filter(&["*.safetensors"], &["*old*"]);

        assert!(f.include("model.safetensors"));
        assert!(!f.include("model-old.safetensors"));
        assert!(!f.include("model.bin"));
    }

    #[test]
    fn test_empty_sets_include_everything() {
        let f = filter(&[], &[]);
        assert!(f.is_unrestricted());
        assert!(f.include("anything/at/all.txt"));
    }

    #[test]
    fn test_ignore_only() {
        let f = filter(&[], &["*.md"]);
        assert!(!f.include("README.md"));
        assert!(f.include("config.json"));
    }

    #[test]
    fn test_star_crosses_directories() {
        let f = filter(&["*.json"], &[]);
        assert!(f.include("config.json"));
        assert!(f.include("nested/dir/tokenizer.json"));
    }

    #[test]
    fn test_question_mark_and_classes() {
        let f = filter(&["shard-0000?.bin", "[ab].txt"], &[]);
        assert!(f.include("shard-00001.bin"));
        assert!(!f.include("shard-000010.bin"));
        assert!(f.include("a.txt"));
        assert!(!f.include("c.txt"));
    }

    #[test]
    fn test_matching_is_case_sensitive() {
        let f = filter(&["*.BIN"], &[]);
        assert!(!f.include("model.bin"));
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let err = PatternFilter::new(&["[unclosed"], &[]).unwrap_err();
        assert!(matches!(err, SyncError::InvalidPattern { .. }));
    }
}
