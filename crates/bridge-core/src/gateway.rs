//! RemoteGateway trait abstraction over the Notion API.
//!
//! The sync engine talks to the remote side only through this trait, so
//! tests can substitute an in-memory implementation and the HTTP client
//! stays swappable.

use crate::blocks::{plain_text, Block};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("remote object not found: {0}")]
    NotFound(String),

    #[error("http transport error: {0}")]
    Http(String),

    #[error("api error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("could not create page under parent {parent_id}: tried both parent kinds (page: {page_error}; database: {database_error})")]
    AmbiguousParent {
        parent_id: String,
        page_error: String,
        database_error: String,
    },

    #[error("unexpected response shape: {0}")]
    InvalidResponse(String),
}

pub type Result<T> = std::result::Result<T, GatewayError>;

/// Which object kinds a search should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchKind {
    Pages,
    Databases,
}

/// A remote page: opaque id, title, flat property map, and the
/// remote-owned last-modified timestamp.
#[derive(Debug, Clone)]
pub struct RemotePage {
    pub id: String,
    pub title: String,
    pub properties: Map<String, Value>,
    pub last_edited: DateTime<Utc>,
}

impl RemotePage {
    /// Decode a Notion page object. The title lives at
    /// `properties.title.title[0].text.content`; a page without one is
    /// "Untitled".
    pub fn from_json(value: &Value) -> Result<RemotePage> {
        let id = value
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| GatewayError::InvalidResponse("page object without id".into()))?
            .to_string();

        let properties = value
            .get("properties")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        let title = properties
            .get("title")
            .map(|prop| plain_text(prop.get("title")))
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "Untitled".to_string());

        let last_edited = value
            .get("last_edited_time")
            .and_then(Value::as_str)
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| DateTime::<Utc>::UNIX_EPOCH);

        Ok(RemotePage { id, title, properties, last_edited })
    }
}

/// Remote page/block operations the orchestrator needs.
///
/// Implementations must throttle internally when the remote quota runs
/// out; under normal operation a rate limit never surfaces as an error.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    /// Fetch one page by id.
    async fn get_page(&self, page_id: &str) -> Result<RemotePage>;

    /// List all child blocks of a page, paginating transparently and
    /// returning the flattened ordered sequence of raw block objects.
    async fn list_child_blocks(&self, page_id: &str) -> Result<Vec<Value>>;

    /// Create a page under the given parent (page or database — the
    /// implementation disambiguates) and return the new page id.
    async fn create_page(
        &self,
        parent_id: &str,
        title: &str,
        extra_properties: Map<String, Value>,
    ) -> Result<String>;

    /// Replace a page's entire content: delete all existing children,
    /// then append `blocks`. A full overwrite, not a diff.
    async fn replace_blocks(&self, page_id: &str, blocks: &[Block]) -> Result<()>;

    /// Search the workspace for pages or databases.
    async fn search(&self, query: &str, kind: SearchKind) -> Result<Vec<RemotePage>>;

    /// Fetch the child pages of a parent page (child_page blocks, resolved
    /// to full pages; inaccessible children are skipped).
    async fn get_child_pages(&self, parent_page_id: &str) -> Result<Vec<RemotePage>>;
}
