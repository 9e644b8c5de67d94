//! Markdown frontmatter parsing and serialization.
//!
//! A document is an optional YAML frontmatter block delimited by `---` at
//! the very start of the file, followed by the body:
//! ```markdown
//! ---
//! title: My Note
//! tags: [a, b, c]
//! ---
//!
//! # Content here
//! ```

use std::collections::HashMap;

/// Frontmatter as a map of string keys to YAML values. Values the sync
/// layer does not understand round-trip unchanged.
pub type Frontmatter = HashMap<String, serde_yaml::Value>;

/// Parsed markdown document.
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    /// Frontmatter key-value pairs (None if no frontmatter)
    pub frontmatter: Option<Frontmatter>,
    /// Markdown body (everything after the frontmatter)
    pub body: String,
}

/// Parse a markdown file into frontmatter and body.
///
/// Missing, unterminated, or invalid frontmatter is not an error: the
/// whole content becomes the body.
pub fn parse(content: &str) -> ParsedDocument {
    if !content.starts_with("---") {
        return ParsedDocument {
            frontmatter: None,
            body: content.to_string(),
        };
    }

    let rest = &content[3..];
    match rest.find("\n---") {
        Some(pos) => {
            let yaml_content = rest[..pos].trim();
            let body_start = pos + 4; // skip "\n---"
            let body = rest[body_start..].trim_start_matches('\n').to_string();

            let frontmatter = match serde_yaml::from_str::<Frontmatter>(yaml_content) {
                Ok(fm) if !fm.is_empty() => Some(fm),
                Ok(_) => None,  // empty frontmatter
                Err(_) => None, // invalid YAML, treat as no frontmatter
            };

            ParsedDocument { frontmatter, body }
        }
        None => ParsedDocument {
            frontmatter: None,
            body: content.to_string(),
        },
    }
}

/// Serialize frontmatter and body back to markdown.
pub fn serialize(frontmatter: Option<&Frontmatter>, body: &str) -> String {
    match frontmatter {
        Some(fm) if !fm.is_empty() => {
            let yaml = serde_yaml::to_string(fm).unwrap_or_default();
            format!("---\n{}---\n\n{}", yaml, body)
        }
        _ => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_with_frontmatter() {
        let content = "---\ntitle: Test Note\ntags:\n  - rust\n  - notion\n---\n\n# Hello World\n\nThis is the body.";
        let parsed = parse(content);
        let fm = parsed.frontmatter.unwrap();
        assert_eq!(
            fm.get("title").unwrap(),
            &serde_yaml::Value::String("Test Note".to_string())
        );
        assert!(parsed.body.starts_with("# Hello World"));
    }

    #[test]
    fn parse_without_frontmatter() {
        let content = "# Just a heading\n\nSome content.";
        let parsed = parse(content);
        assert!(parsed.frontmatter.is_none());
        assert_eq!(parsed.body, content);
    }

    #[test]
    fn unterminated_frontmatter_is_body() {
        let content = "---\ntitle: Broken";
        let parsed = parse(content);
        assert!(parsed.frontmatter.is_none());
        assert_eq!(parsed.body, content);
    }

    #[test]
    fn roundtrip_preserves_values() {
        let mut fm = Frontmatter::new();
        fm.insert(
            "title".to_string(),
            serde_yaml::Value::String("My Note".to_string()),
        );
        fm.insert(
            "tags".to_string(),
            serde_yaml::Value::Sequence(vec![
                serde_yaml::Value::String("test".to_string()),
                serde_yaml::Value::String("integration".to_string()),
            ]),
        );
        let body = "# Content\n\nParagraph.";

        let parsed = parse(&serialize(Some(&fm), body));
        let reparsed = parsed.frontmatter.unwrap();
        assert_eq!(reparsed.get("title"), fm.get("title"));
        assert_eq!(reparsed.get("tags"), fm.get("tags"));
        assert_eq!(parsed.body, body);
    }

    #[test]
    fn empty_frontmatter_serializes_to_bare_body() {
        let fm = Frontmatter::new();
        assert_eq!(serialize(Some(&fm), "body"), "body");
        assert_eq!(serialize(None, "body"), "body");
    }
}
