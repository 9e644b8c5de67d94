//! Exclusion glob matching for the watcher and batch scanner.
//!
//! The pattern language is fixed at five shapes; first matching pattern
//! wins:
//! - `prefix/**` — the directory and everything under it
//! - `*middle*`  — substring match
//! - `*suffix`   — suffix match
//! - `prefix*`   — prefix match
//! - anything else — exact match

/// Does `path` match any of the exclusion patterns?
pub fn is_excluded(path: &str, patterns: &[String]) -> bool {
    patterns.iter().any(|pattern| matches(path, pattern))
}

fn matches(path: &str, pattern: &str) -> bool {
    if let Some(dir) = pattern.strip_suffix("/**") {
        path.starts_with(dir)
    } else if pattern.len() >= 2 && pattern.starts_with('*') && pattern.ends_with('*') {
        path.contains(&pattern[1..pattern.len() - 1])
    } else if let Some(suffix) = pattern.strip_prefix('*') {
        path.ends_with(suffix)
    } else if let Some(prefix) = pattern.strip_suffix('*') {
        path.starts_with(prefix)
    } else {
        path == pattern
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn subtree_pattern() {
        let p = patterns(&["node_modules/**"]);
        assert!(is_excluded("node_modules/pkg/readme.md", &p));
        assert!(!is_excluded("docs/readme.md", &p));
    }

    #[test]
    fn substring_pattern() {
        let p = patterns(&["*draft*"]);
        assert!(is_excluded("docs/draft-post.md", &p));
        assert!(is_excluded("my-drafts/a.md", &p));
        assert!(!is_excluded("docs/final.md", &p));
    }

    #[test]
    fn suffix_pattern() {
        let p = patterns(&["*.tmp"]);
        assert!(is_excluded("docs/scratch.tmp", &p));
        assert!(!is_excluded("docs/scratch.md", &p));
    }

    #[test]
    fn prefix_pattern() {
        let p = patterns(&["private*"]);
        assert!(is_excluded("private-notes.md", &p));
        assert!(!is_excluded("docs/private-notes.md", &p));
    }

    #[test]
    fn exact_match() {
        let p = patterns(&["docs/skip-me.md"]);
        assert!(is_excluded("docs/skip-me.md", &p));
        assert!(!is_excluded("docs/skip-me.markdown", &p));
    }

    #[test]
    fn first_match_wins_across_shapes() {
        let p = patterns(&["*.tmp", "vendor/**"]);
        assert!(is_excluded("vendor/lib/readme.md", &p));
        assert!(is_excluded("a.tmp", &p));
        assert!(!is_excluded("src/lib.md", &p));
    }
}
