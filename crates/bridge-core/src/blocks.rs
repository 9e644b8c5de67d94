//! Typed page content blocks and their Notion wire representation.
//!
//! A page body is an ordered `Vec<Block>`. The wire shape is the Notion
//! block object: `{type, <tag>: {rich_text: [{type: "text", text: {content}}], ...}}`.

use serde_json::{json, Value};

/// One typed unit of remote page content.
///
/// Heading levels are clamped to 1..=3 at construction; Notion has no
/// deeper headings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Heading { level: u8, text: String },
    Paragraph { text: String },
    Code { text: String, language: String },
    Quote { text: String },
    Bulleted { text: String },
    Numbered { text: String },
}

impl Block {
    /// Create a heading block, clamping the level into [1, 3].
    pub fn heading(level: usize, text: impl Into<String>) -> Self {
        Block::Heading {
            level: level.clamp(1, 3) as u8,
            text: text.into(),
        }
    }

    /// Serialize to the Notion block object shape.
    pub fn to_json(&self) -> Value {
        match self {
            Block::Heading { level, text } => {
                let tag = format!("heading_{}", level);
                json!({ "type": tag.clone(), tag: { "rich_text": rich_text(text) } })
            }
            Block::Paragraph { text } => {
                json!({ "type": "paragraph", "paragraph": { "rich_text": rich_text(text) } })
            }
            Block::Code { text, language } => json!({
                "type": "code",
                "code": { "rich_text": rich_text(text), "language": language }
            }),
            Block::Quote { text } => {
                json!({ "type": "quote", "quote": { "rich_text": rich_text(text) } })
            }
            Block::Bulleted { text } => json!({
                "type": "bulleted_list_item",
                "bulleted_list_item": { "rich_text": rich_text(text) }
            }),
            Block::Numbered { text } => json!({
                "type": "numbered_list_item",
                "numbered_list_item": { "rich_text": rich_text(text) }
            }),
        }
    }

    /// Decode a Notion block object. Returns `None` for unsupported block
    /// types (tables, images, child pages, ...) — they are dropped, not an
    /// error.
    pub fn from_json(value: &Value) -> Option<Block> {
        let tag = value.get("type")?.as_str()?;
        let body = value.get(tag)?;
        let text = plain_text(body.get("rich_text"));

        match tag {
            "heading_1" => Some(Block::Heading { level: 1, text }),
            "heading_2" => Some(Block::Heading { level: 2, text }),
            "heading_3" => Some(Block::Heading { level: 3, text }),
            "paragraph" => Some(Block::Paragraph { text }),
            "code" => {
                let language = body
                    .get("language")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                Some(Block::Code { text, language })
            }
            "quote" => Some(Block::Quote { text }),
            "bulleted_list_item" => Some(Block::Bulleted { text }),
            "numbered_list_item" => Some(Block::Numbered { text }),
            _ => None,
        }
    }
}

/// Build a single-run rich_text array for plain content.
fn rich_text(content: &str) -> Value {
    json!([{ "type": "text", "text": { "content": content } }])
}

/// Concatenate the plain text content of a rich_text array.
pub fn plain_text(rich_text: Option<&Value>) -> String {
    rich_text
        .and_then(Value::as_array)
        .map(|runs| {
            runs.iter()
                .filter_map(|run| run.get("text")?.get("content")?.as_str())
                .collect::<Vec<_>>()
                .concat()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heading_level_is_clamped() {
        assert_eq!(Block::heading(5, "t"), Block::Heading { level: 3, text: "t".into() });
        assert_eq!(Block::heading(0, "t"), Block::Heading { level: 1, text: "t".into() });
    }

    #[test]
    fn wire_roundtrip_preserves_block() {
        let blocks = vec![
            Block::heading(2, "Title"),
            Block::Code { text: "fn main() {}".into(), language: "rust".into() },
            Block::Numbered { text: "first".into() },
        ];
        for block in blocks {
            let decoded = Block::from_json(&block.to_json()).unwrap();
            assert_eq!(decoded, block);
        }
    }

    #[test]
    fn unsupported_types_are_dropped() {
        let table = json!({ "type": "table", "table": { "table_width": 2 } });
        assert_eq!(Block::from_json(&table), None);

        let child = json!({ "type": "child_page", "child_page": { "title": "Sub" } });
        assert_eq!(Block::from_json(&child), None);
    }

    #[test]
    fn multi_run_rich_text_is_concatenated() {
        let value = json!({
            "type": "paragraph",
            "paragraph": { "rich_text": [
                { "type": "text", "text": { "content": "Hello " } },
                { "type": "text", "text": { "content": "world" } },
            ]}
        });
        assert_eq!(
            Block::from_json(&value),
            Some(Block::Paragraph { text: "Hello world".into() })
        );
    }
}
