//! Exclusion rules for project files

use crate::index::INDEX_DIR_NAME;
use ignore::{
    gitignore::{Gitignore, GitignoreBuilder},
    Match,
};
use regex::Regex;
use std::path::{Component, Path, PathBuf};

/// Name of the ignore file read from the project root
pub const IGNORE_FILE_NAME: &str = ".gitignore";

/// A compiled exclude glob: `*` matches any run of characters, `?` a single
/// character, and the whole input must match. Matching is case-sensitive.
#[derive(Debug, Clone)]
pub struct ExcludePattern {
    regex: Regex,
}

impl ExcludePattern {
    pub fn new(pattern: &str) -> Option<Self> {
        let mut source = String::with_capacity(pattern.len() + 8);
        source.push('^');
        for c in pattern.chars() {
            match c {
                '*' => source.push_str(".*"),
                '?' => source.push('.'),
                other => source.push_str(&regex::escape(&other.to_string())),
            }
        }
        source.push('$');

        match Regex::new(&source) {
            Ok(regex) => Some(Self { regex }),
            Err(e) => {
                tracing::warn!("Ignoring invalid exclude pattern '{}': {}", pattern, e);
                None
            }
        }
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

/// Decides whether a path is excluded from indexing.
///
/// Combines the root ignore file (gitignore syntax) with configured exclude globs.
/// Build one per collection pass so ignore-file edits are picked up.
#[derive(Debug)]
pub struct IgnoreFilter {
    root: PathBuf,
    gitignore: Option<Gitignore>,
    patterns: Vec<ExcludePattern>,
}

impl IgnoreFilter {
    /// Load rules for `root`; a missing ignore file means no ignore-file rules
    pub fn new<S: AsRef<str>>(root: &Path, exclude_patterns: &[S]) -> Self {
        let patterns = exclude_patterns
            .iter()
            .filter(|p| !p.as_ref().trim().is_empty())
            .filter_map(|p| ExcludePattern::new(p.as_ref().trim()))
            .collect();

        Self {
            root: root.to_path_buf(),
            gitignore: Self::build_gitignore(root),
            patterns,
        }
    }

    fn build_gitignore(root: &Path) -> Option<Gitignore> {
        let ignore_path = root.join(IGNORE_FILE_NAME);
        if !ignore_path.is_file() {
            return None;
        }

        let mut builder = GitignoreBuilder::new(root);
        if let Some(e) = builder.add(&ignore_path) {
            tracing::warn!(
                "Failed to parse ignore file at {}: {}",
                ignore_path.display(),
                e
            );
        }

        match builder.build() {
            Ok(gitignore) => Some(gitignore),
            Err(e) => {
                tracing::warn!("Failed to build ignore matcher: {}", e);
                None
            }
        }
    }

    /// Check an absolute path, querying the file system for whether it is a directory.
    /// Paths outside the project root are always excluded.
    pub fn is_excluded(&self, path: &Path) -> bool {
        self.is_excluded_entry(path, path.is_dir())
    }

    /// Check an absolute path whose kind is already known
    pub fn is_excluded_entry(&self, path: &Path, is_dir: bool) -> bool {
        let relative = match path.strip_prefix(&self.root) {
            Ok(relative) => relative,
            Err(_) => return true,
        };

        // The project root itself is never excluded
        if relative.as_os_str().is_empty() {
            return false;
        }

        let segments: Vec<String> = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();

        if segments.first().map(String::as_str) == Some(INDEX_DIR_NAME) {
            return true;
        }

        if self.matches_patterns(&segments) {
            return true;
        }

        if let Some(gitignore) = &self.gitignore {
            if let Match::Ignore(_) = gitignore.matched_path_or_any_parents(relative, is_dir) {
                return true;
            }
        }

        false
    }

    fn matches_patterns(&self, segments: &[String]) -> bool {
        if self.patterns.is_empty() {
            return false;
        }

        let joined = segments.join("/");
        self.patterns.iter().any(|pattern| {
            pattern.is_match(&joined) || segments.iter().any(|segment| pattern.is_match(segment))
        })
    }
}
