//! Line-oriented conversion between markdown bodies and content blocks.
//!
//! The grammar is deliberately simple: one pass, single lookahead, one
//! block per non-blank line (code fences collapse into one block per
//! fenced region). Adjacent non-blank lines are NOT merged into one
//! paragraph — callers depend on the simplified round-trip semantics, so
//! keep it that way.

use crate::blocks::Block;
use once_cell::sync::Lazy;
use regex::Regex;

static HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(#+)\s+(.+)$").unwrap());
static NUMBERED: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+\.\s+(.+)$").unwrap());

/// Convert a markdown body into an ordered block sequence.
///
/// Total and pure: malformed input degrades to Paragraph blocks, never to
/// an error. Blank lines are skipped.
pub fn markdown_to_blocks(body: &str) -> Vec<Block> {
    let lines: Vec<&str> = body.split('\n').collect();
    let mut blocks = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i].trim();

        if line.is_empty() {
            i += 1;
            continue;
        }

        if let Some(caps) = HEADING.captures(line) {
            blocks.push(Block::heading(caps[1].len(), &caps[2]));
            i += 1;
            continue;
        }

        if let Some(rest) = line.strip_prefix("```") {
            let language = rest.trim().to_string();
            let mut code_lines = Vec::new();
            i += 1;
            // Consume verbatim until the closing fence. An unclosed fence
            // swallows the rest of the input.
            while i < lines.len() && lines[i].trim() != "```" {
                code_lines.push(lines[i]);
                i += 1;
            }
            i += 1; // closing fence, if any
            blocks.push(Block::Code {
                text: code_lines.join("\n"),
                language,
            });
            continue;
        }

        if let Some(rest) = line.strip_prefix("- ").or_else(|| line.strip_prefix("* ")) {
            blocks.push(Block::Bulleted { text: rest.trim().to_string() });
            i += 1;
            continue;
        }

        if let Some(caps) = NUMBERED.captures(line) {
            blocks.push(Block::Numbered { text: caps[1].to_string() });
            i += 1;
            continue;
        }

        if let Some(rest) = line.strip_prefix("> ") {
            blocks.push(Block::Quote { text: rest.trim().to_string() });
            i += 1;
            continue;
        }

        blocks.push(Block::Paragraph { text: line.to_string() });
        i += 1;
    }

    blocks
}

/// Render a block sequence back to markdown.
///
/// Each block is followed by exactly one blank line. Numbered items are
/// emitted as a literal `1. ` — the source ordinals are not preserved.
pub fn blocks_to_markdown(blocks: &[Block]) -> String {
    let mut lines: Vec<String> = Vec::new();

    for block in blocks {
        match block {
            Block::Heading { level, text } => {
                lines.push(format!("{} {}", "#".repeat(*level as usize), text));
            }
            Block::Paragraph { text } => lines.push(text.clone()),
            Block::Code { text, language } => {
                lines.push(format!("```{}", language));
                lines.push(text.clone());
                lines.push("```".to_string());
            }
            Block::Quote { text } => lines.push(format!("> {}", text)),
            Block::Bulleted { text } => lines.push(format!("- {}", text)),
            Block::Numbered { text } => lines.push(format!("1. {}", text)),
        }
        lines.push(String::new());
    }

    lines.join("\n")
}

/// Extract a title from a markdown body: the first level-1 heading.
pub fn extract_title(body: &str) -> Option<String> {
    body.lines()
        .find_map(|line| line.strip_prefix("# "))
        .map(|title| title.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_each_line_shape() {
        let body = "## Section\n\n- bullet\n* star bullet\n3. ordered\n> quoted\nplain text";
        let blocks = markdown_to_blocks(body);
        assert_eq!(
            blocks,
            vec![
                Block::Heading { level: 2, text: "Section".into() },
                Block::Bulleted { text: "bullet".into() },
                Block::Bulleted { text: "star bullet".into() },
                Block::Numbered { text: "ordered".into() },
                Block::Quote { text: "quoted".into() },
                Block::Paragraph { text: "plain text".into() },
            ]
        );
    }

    #[test]
    fn one_block_per_non_blank_line() {
        let body = "first line\nsecond line\n\nthird line";
        let blocks = markdown_to_blocks(body);
        assert_eq!(blocks.len(), 3);
        assert!(blocks.iter().all(|b| matches!(b, Block::Paragraph { .. })));
    }

    #[test]
    fn heading_level_clamps_to_three() {
        let blocks = markdown_to_blocks("##### Deep heading");
        assert_eq!(
            blocks,
            vec![Block::Heading { level: 3, text: "Deep heading".into() }]
        );
    }

    #[test]
    fn code_fence_collapses_to_one_block() {
        let body = "```python\ndef hello_world():\n    print(\"hi\")\n```\nafter";
        let blocks = markdown_to_blocks(body);
        assert_eq!(blocks.len(), 2);
        match &blocks[0] {
            Block::Code { text, language } => {
                assert_eq!(language, "python");
                assert!(text.contains("def hello_world():"));
                assert!(!text.contains("```"));
            }
            other => panic!("expected code block, got {:?}", other),
        }
    }

    #[test]
    fn unclosed_fence_consumes_rest_of_input() {
        let body = "```\nline one\nline two";
        let blocks = markdown_to_blocks(body);
        assert_eq!(
            blocks,
            vec![Block::Code { text: "line one\nline two".into(), language: String::new() }]
        );
    }

    #[test]
    fn code_content_is_kept_verbatim() {
        let body = "```rust\n    indented();\n```";
        match &markdown_to_blocks(body)[0] {
            Block::Code { text, .. } => assert_eq!(text, "    indented();"),
            other => panic!("expected code block, got {:?}", other),
        }
    }

    #[test]
    fn numbered_items_reemit_as_one() {
        let blocks = vec![
            Block::Numbered { text: "alpha".into() },
            Block::Numbered { text: "beta".into() },
        ];
        assert_eq!(blocks_to_markdown(&blocks), "1. alpha\n\n1. beta\n");
    }

    #[test]
    fn roundtrip_is_structurally_idempotent() {
        let body = "# Title\n\nSome paragraph.\n\n- item one\n- item two\n\n```sh\necho hi\n```\n\n> a quote\n\n2. numbered";
        let first = markdown_to_blocks(body);
        let second = markdown_to_blocks(&blocks_to_markdown(&first));
        assert_eq!(first, second);

        // And once more, for good measure.
        let third = markdown_to_blocks(&blocks_to_markdown(&second));
        assert_eq!(second, third);
    }

    #[test]
    fn extracts_first_h1_as_title() {
        assert_eq!(
            extract_title("intro\n# Real Title\n# Second"),
            Some("Real Title".to_string())
        );
        assert_eq!(extract_title("## only h2"), None);
    }
}
