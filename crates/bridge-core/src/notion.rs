//! Notion HTTP implementation of [`RemoteGateway`].
//!
//! Thin wrapper over the v1 REST API. Throttles against the shared
//! [`RateBudget`] before every call, records the limit headers after, and
//! performs a single Retry-After backoff on 429 — no retry loops.

use crate::blocks::Block;
use crate::gateway::{GatewayError, RemoteGateway, RemotePage, Result, SearchKind};
use crate::ratelimit::SharedRateBudget;
use async_trait::async_trait;
use chrono::DateTime;
use reqwest::{header::HeaderMap, RequestBuilder, Response, StatusCode};
use serde_json::{json, Map, Value};
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

const BASE_URL: &str = "https://api.notion.com/v1";
const NOTION_VERSION: &str = "2022-06-28";
/// The API rejects child appends beyond this many blocks per request.
const APPEND_CHUNK: usize = 100;

/// Notion REST API client.
#[derive(Clone)]
pub struct NotionApi {
    http: reqwest::Client,
    token: String,
    base_url: String,
    budget: SharedRateBudget,
}

impl NotionApi {
    pub fn new(token: impl Into<String>, budget: SharedRateBudget) -> Self {
        NotionApi {
            http: reqwest::Client::new(),
            token: token.into(),
            base_url: BASE_URL.to_string(),
            budget,
        }
    }

    /// Point the client at a different endpoint (test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(&self.token)
            .header("Notion-Version", NOTION_VERSION)
    }

    /// Wait out the budget, issue the request, record fresh limit headers,
    /// and decode the response. A 429 gets one Retry-After sleep and one
    /// resend.
    async fn execute(&self, req: RequestBuilder) -> Result<Value> {
        {
            let budget = self.budget.lock().await;
            if let Some(delay) = budget.required_delay(SystemTime::now()) {
                debug!("rate budget exhausted, waiting {:?}", delay);
                drop(budget);
                tokio::time::sleep(delay).await;
            }
        }

        let retry = req.try_clone();
        let response = req
            .send()
            .await
            .map_err(|e| GatewayError::Http(e.to_string()))?;
        self.record_limits(response.headers()).await;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            if let Some(retry_req) = retry {
                let wait = retry_after(response.headers()).unwrap_or(Duration::from_secs(1));
                warn!("rate limited by remote, backing off {:?}", wait);
                tokio::time::sleep(wait).await;
                let response = retry_req
                    .send()
                    .await
                    .map_err(|e| GatewayError::Http(e.to_string()))?;
                self.record_limits(response.headers()).await;
                return decode(response).await;
            }
        }

        decode(response).await
    }

    async fn record_limits(&self, headers: &HeaderMap) {
        let remaining = header_str(headers, "x-ratelimit-remaining").and_then(|v| v.parse().ok());
        let reset_at = header_str(headers, "x-ratelimit-reset-at").and_then(parse_reset_time);
        if remaining.is_some() || reset_at.is_some() {
            self.budget.lock().await.record(remaining, reset_at);
        }
    }

    /// Try to create the page with one parent-kind assumption, and on
    /// failure retry once with the alternate kind. A one-shot
    /// disambiguation for ambiguous parent ids, not a retry policy.
    async fn create_with_probe(
        &self,
        parent_id: &str,
        title: &str,
        extra_properties: Map<String, Value>,
    ) -> Result<String> {
        let as_database = self.probe_database(parent_id).await;

        let first = self
            .try_create(parent_id, title, &extra_properties, as_database.as_ref())
            .await;
        let first_err = match first {
            Ok(id) => return Ok(id),
            Err(e) => e,
        };

        debug!(
            "create under {} failed as {}, retrying with alternate parent kind",
            parent_id,
            if as_database.is_some() { "database" } else { "page" }
        );
        let alternate = match as_database {
            Some(_) => None,
            // The probe said "page", so retry blind as a database.
            None => Some(Value::Object(Map::new())),
        };
        let second = self
            .try_create(parent_id, title, &extra_properties, alternate.as_ref())
            .await;

        match second {
            Ok(id) => Ok(id),
            Err(second_err) => {
                let (page_error, database_error) = if as_database.is_some() {
                    (second_err.to_string(), first_err.to_string())
                } else {
                    (first_err.to_string(), second_err.to_string())
                };
                Err(GatewayError::AmbiguousParent {
                    parent_id: parent_id.to_string(),
                    page_error,
                    database_error,
                })
            }
        }
    }

    /// Retrieve the parent as a database; `Some(schema)` when it is one.
    async fn probe_database(&self, parent_id: &str) -> Option<Value> {
        self.execute(self.request(reqwest::Method::GET, &format!("/databases/{}", parent_id)))
            .await
            .ok()
    }

    /// One create attempt. `database` carries the database schema when the
    /// parent is treated as a collection, `None` when treated as a page.
    async fn try_create(
        &self,
        parent_id: &str,
        title: &str,
        extra_properties: &Map<String, Value>,
        database: Option<&Value>,
    ) -> Result<String> {
        let title_value = json!({
            "title": [{ "type": "text", "text": { "content": title } }]
        });

        let (parent, properties) = match database {
            Some(schema) => {
                let mut properties = extra_properties.clone();
                properties.insert(title_property_name(schema), title_value);
                (
                    json!({ "type": "database_id", "database_id": parent_id }),
                    properties,
                )
            }
            None => {
                // Plain pages only accept the title property.
                let mut properties = Map::new();
                properties.insert("title".to_string(), title_value);
                (json!({ "type": "page_id", "page_id": parent_id }), properties)
            }
        };

        let body = json!({ "parent": parent, "properties": properties });
        let created = self
            .execute(self.request(reqwest::Method::POST, "/pages").json(&body))
            .await?;

        created
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| GatewayError::InvalidResponse("created page without id".into()))
    }
}

#[async_trait]
impl RemoteGateway for NotionApi {
    async fn get_page(&self, page_id: &str) -> Result<RemotePage> {
        let page_id = normalize_page_id(page_id);
        let value = self
            .execute(self.request(reqwest::Method::GET, &format!("/pages/{}", page_id)))
            .await?;
        RemotePage::from_json(&value)
    }

    async fn list_child_blocks(&self, page_id: &str) -> Result<Vec<Value>> {
        let page_id = normalize_page_id(page_id);
        let mut blocks = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut path = format!("/blocks/{}/children?page_size=100", page_id);
            if let Some(cursor) = &cursor {
                path.push_str(&format!("&start_cursor={}", cursor));
            }
            let response = self.execute(self.request(reqwest::Method::GET, &path)).await?;

            if let Some(results) = response.get("results").and_then(Value::as_array) {
                blocks.extend(results.iter().cloned());
            }

            if !response.get("has_more").and_then(Value::as_bool).unwrap_or(false) {
                break;
            }
            cursor = response
                .get("next_cursor")
                .and_then(Value::as_str)
                .map(str::to_string);
            if cursor.is_none() {
                break;
            }
        }

        Ok(blocks)
    }

    async fn create_page(
        &self,
        parent_id: &str,
        title: &str,
        extra_properties: Map<String, Value>,
    ) -> Result<String> {
        let parent_id = normalize_page_id(parent_id);
        self.create_with_probe(&parent_id, title, extra_properties).await
    }

    async fn replace_blocks(&self, page_id: &str, blocks: &[Block]) -> Result<()> {
        let page_id = normalize_page_id(page_id);

        // Full overwrite: drop every existing child, then append.
        let existing = self.list_child_blocks(&page_id).await?;
        for block in &existing {
            if let Some(block_id) = block.get("id").and_then(Value::as_str) {
                self.execute(self.request(reqwest::Method::DELETE, &format!("/blocks/{}", block_id)))
                    .await?;
            }
        }

        let children: Vec<Value> = blocks.iter().map(Block::to_json).collect();
        for chunk in children.chunks(APPEND_CHUNK) {
            let body = json!({ "children": chunk });
            self.execute(
                self.request(
                    reqwest::Method::PATCH,
                    &format!("/blocks/{}/children", page_id),
                )
                .json(&body),
            )
            .await?;
        }

        Ok(())
    }

    async fn search(&self, query: &str, kind: SearchKind) -> Result<Vec<RemotePage>> {
        let object = match kind {
            SearchKind::Pages => "page",
            SearchKind::Databases => "database",
        };
        let mut body = json!({ "filter": { "value": object, "property": "object" } });
        if !query.is_empty() {
            body["query"] = Value::String(query.to_string());
        }

        let response = self
            .execute(self.request(reqwest::Method::POST, "/search").json(&body))
            .await?;

        let pages = response
            .get("results")
            .and_then(Value::as_array)
            .map(|results| {
                results
                    .iter()
                    .filter_map(|page| RemotePage::from_json(page).ok())
                    .collect()
            })
            .unwrap_or_default();

        Ok(pages)
    }

    async fn get_child_pages(&self, parent_page_id: &str) -> Result<Vec<RemotePage>> {
        let blocks = self.list_child_blocks(parent_page_id).await?;

        let mut pages = Vec::new();
        for block in blocks {
            if block.get("type").and_then(Value::as_str) != Some("child_page") {
                continue;
            }
            let Some(child_id) = block.get("id").and_then(Value::as_str) else {
                continue;
            };
            match self.get_page(child_id).await {
                Ok(page) => pages.push(page),
                Err(e) => warn!("skipping inaccessible child page {}: {}", child_id, e),
            }
        }

        Ok(pages)
    }
}

/// Notion accepts ids with or without dashes in most places, but page
/// creation is picky: reformat a bare 32-hex id as 8-4-4-4-12.
pub fn normalize_page_id(id: &str) -> String {
    if id.len() == 32 && id.chars().all(|c| c.is_ascii_hexdigit()) {
        format!(
            "{}-{}-{}-{}-{}",
            &id[0..8],
            &id[8..12],
            &id[12..16],
            &id[16..20],
            &id[20..]
        )
    } else {
        id.to_string()
    }
}

/// Pick the database's title property name from its schema; falls back to
/// "title" when the schema is missing one.
fn title_property_name(schema: &Value) -> String {
    schema
        .get("properties")
        .and_then(Value::as_object)
        .and_then(|props| {
            props.iter().find_map(|(name, details)| {
                (details.get("type").and_then(Value::as_str) == Some("title"))
                    .then(|| name.clone())
            })
        })
        .unwrap_or_else(|| "title".to_string())
}

async fn decode(response: Response) -> Result<Value> {
    let status = response.status();
    if status.is_success() {
        return response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()));
    }

    let message = response
        .json::<Value>()
        .await
        .ok()
        .and_then(|body| {
            body.get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| status.to_string());

    if status == StatusCode::NOT_FOUND {
        Err(GatewayError::NotFound(message))
    } else {
        Err(GatewayError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    header_str(headers, "retry-after")
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn parse_reset_time(raw: &str) -> Option<SystemTime> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(SystemTime::from)
}
