//! SyncEngine: per-document orchestration between markdown files and
//! Notion pages.
//!
//! Entry points never propagate failures: every push/pull resolves to a
//! [`SyncOutcome`] carrying a success flag and a human-readable message.
//! Within one document the steps are strictly sequential
//! (read → convert → network → write); across documents the engine takes
//! `&self` and is safe to drive concurrently.

use crate::blocks::Block;
use crate::converter::{blocks_to_markdown, extract_title, markdown_to_blocks};
use crate::exclude::is_excluded;
use crate::gateway::{GatewayError, RemoteGateway};
use crate::markdown::Frontmatter;
use crate::store::{LinkStore, StoreError};
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value as JsonValue};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Frontmatter keys owned by the sync layer.
const KEY_TITLE: &str = "title";
const KEY_PAGE_ID: &str = "notion_page_id";
const KEY_LAST_SYNCED: &str = "last_synced";

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid last_synced timestamp: {0}")]
    Timestamp(#[from] chrono::ParseError),
}

type Result<T> = std::result::Result<T, SyncError>;

/// Outcome of one sync entry point.
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub success: bool,
    pub message: String,
}

impl SyncOutcome {
    fn ok(message: String) -> Self {
        SyncOutcome { success: true, message }
    }

    fn failed(message: String) -> Self {
        SyncOutcome { success: false, message }
    }
}

/// Per-run counters for a batch sync.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Direction of a sync operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Markdown to Notion
    Push,
    /// Notion to markdown
    Pull,
}

pub struct SyncEngine<G> {
    gateway: G,
    store: LinkStore,
    /// Parent page (or database) new pages are created under.
    parent_page_id: String,
    /// Directory pulled files land in when no path is given.
    documents_dir: PathBuf,
    /// Exclusion globs applied to batch scans (relative to the scan root).
    excluded_patterns: Vec<String>,
}

impl<G: RemoteGateway> SyncEngine<G> {
    pub fn new(gateway: G, parent_page_id: impl Into<String>, documents_dir: impl Into<PathBuf>) -> Self {
        SyncEngine {
            gateway,
            store: LinkStore,
            parent_page_id: parent_page_id.into(),
            documents_dir: documents_dir.into(),
            excluded_patterns: Vec::new(),
        }
    }

    /// Apply the configured exclusion globs to batch scans. The watcher
    /// filters with the same patterns, so `sync-all` and `watch` agree on
    /// which files are in scope.
    pub fn with_excluded_patterns(mut self, patterns: Vec<String>) -> Self {
        self.excluded_patterns = patterns;
        self
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Push one markdown file to Notion, creating or updating its page.
    pub async fn push_file(&self, path: &Path) -> SyncOutcome {
        match self.push_inner(path).await {
            Ok(message) => SyncOutcome::ok(message),
            Err(e) => SyncOutcome::failed(format!(
                "error syncing {} to Notion: {}",
                path.display(),
                e
            )),
        }
    }

    async fn push_inner(&self, path: &Path) -> Result<String> {
        let (frontmatter, body) = self.store.read(path).await?;

        let title = frontmatter
            .get(KEY_TITLE)
            .and_then(yaml_scalar)
            .or_else(|| extract_title(&body))
            .unwrap_or_else(|| file_stem(path));

        // A stored id that no longer resolves falls through to the create
        // path; a dangling link is not an error.
        let linked_id = match frontmatter.get(KEY_PAGE_ID).and_then(yaml_scalar) {
            Some(id) => match self.gateway.get_page(&id).await {
                Ok(page) => Some(page.id),
                Err(e) => {
                    debug!("stored page id {} did not resolve ({}), creating anew", id, e);
                    None
                }
            },
            None => None,
        };

        let blocks = markdown_to_blocks(&body);

        let message = match linked_id {
            Some(page_id) => {
                self.gateway.replace_blocks(&page_id, &blocks).await?;
                format!("updated Notion page: {}", title)
            }
            None => {
                let extra = rich_text_properties(&frontmatter);
                let page_id = self
                    .gateway
                    .create_page(&self.parent_page_id, &title, extra)
                    .await?;
                self.gateway.replace_blocks(&page_id, &blocks).await?;

                let mut link = Frontmatter::new();
                link.insert(KEY_PAGE_ID.into(), serde_yaml::Value::String(page_id));
                self.store.write(path, link).await?;

                format!("created Notion page: {}", title)
            }
        };

        let mut stamp = Frontmatter::new();
        stamp.insert(
            KEY_LAST_SYNCED.into(),
            serde_yaml::Value::String(Utc::now().to_rfc3339()),
        );
        self.store.write(path, stamp).await?;

        info!("{}", message);
        Ok(message)
    }

    /// Pull one Notion page into a markdown file. When `path` is omitted
    /// a filename is derived from the page title inside `documents_dir`.
    pub async fn pull_page(&self, page_id: &str, path: Option<&Path>) -> SyncOutcome {
        match self.pull_inner(page_id, path).await {
            Ok(message) => SyncOutcome::ok(message),
            Err(e) => SyncOutcome::failed(format!(
                "error syncing Notion page {} to file: {}",
                page_id, e
            )),
        }
    }

    async fn pull_inner(&self, page_id: &str, path: Option<&Path>) -> Result<String> {
        let page = self.gateway.get_page(page_id).await?;
        let raw_blocks = self.gateway.list_child_blocks(&page.id).await?;

        // Unsupported remote block types drop out here by design.
        let blocks: Vec<Block> = raw_blocks.iter().filter_map(Block::from_json).collect();
        let body = blocks_to_markdown(&blocks);

        let mut frontmatter = Frontmatter::new();
        frontmatter.insert(KEY_TITLE.into(), serde_yaml::Value::String(page.title.clone()));
        frontmatter.insert(KEY_PAGE_ID.into(), serde_yaml::Value::String(page.id.clone()));
        frontmatter.insert(
            KEY_LAST_SYNCED.into(),
            serde_yaml::Value::String(Utc::now().to_rfc3339()),
        );
        // Flat text properties come along; anything richer stays remote.
        for (key, prop) in &page.properties {
            if key == KEY_TITLE {
                continue;
            }
            if let Some(text) = rich_text_scalar(prop) {
                frontmatter.insert(key.clone(), serde_yaml::Value::String(text));
            }
        }

        let (target, existed) = match path {
            Some(path) => (path.to_path_buf(), path.exists()),
            None => (self.derive_path(&page.title, &page.id), false),
        };

        self.store.create(&target, &frontmatter, &body).await?;

        let message = if existed {
            format!("updated markdown file: {}", target.display())
        } else {
            format!("created markdown file: {}", target.display())
        };
        info!("{}", message);
        Ok(message)
    }

    /// Derive a fresh path under `documents_dir` from a page title:
    /// keep alphanumerics, spaces, hyphens, underscores; spaces become
    /// hyphens; lowercase. Collisions get -1, -2, ... suffixes.
    fn derive_path(&self, title: &str, page_id: &str) -> PathBuf {
        let mut name = sanitize_title(title);
        if name.is_empty() {
            let short: String = page_id.chars().take(8).collect();
            name = format!("untitled-{}", short);
        }

        let mut candidate = self.documents_dir.join(format!("{}.md", name));
        let mut counter = 1;
        while candidate.exists() {
            candidate = self.documents_dir.join(format!("{}-{}.md", name, counter));
            counter += 1;
        }
        candidate
    }

    /// Advisory conflict check: true only when BOTH the remote page and
    /// the local file changed since `last_synced`. A document that was
    /// never synced has no conflict; if anything cannot be determined the
    /// check conservatively reports a conflict.
    pub async fn detect_conflict(&self, path: &Path, page_id: &str) -> bool {
        match self.conflict_inner(path, page_id).await {
            Ok(conflict) => conflict,
            Err(e) => {
                warn!("conflict check for {} failed ({}), assuming conflict", path.display(), e);
                true
            }
        }
    }

    async fn conflict_inner(&self, path: &Path, page_id: &str) -> Result<bool> {
        let (frontmatter, _) = self.store.read(path).await?;

        let Some(last_synced) = frontmatter.get(KEY_LAST_SYNCED).and_then(yaml_scalar) else {
            return Ok(false); // never synced
        };
        let last_synced = DateTime::parse_from_rfc3339(&last_synced)?.with_timezone(&Utc);

        let page = self.gateway.get_page(page_id).await?;

        let metadata = tokio::fs::metadata(path).await?;
        let local_modified: DateTime<Utc> = metadata.modified()?.into();

        let remote_changed = page.last_edited > last_synced;
        let local_changed = local_modified > last_synced;
        Ok(remote_changed && local_changed)
    }

    /// Sync every markdown file under `dir` in the given direction.
    ///
    /// Per-item failures are isolated into the counters; the batch is
    /// cancellable between documents via `cancel` and always reports the
    /// counts accumulated so far.
    pub async fn sync_all(&self, dir: &Path, direction: Direction, cancel: &AtomicBool) -> BatchReport {
        let mut report = BatchReport::default();

        let files = match collect_markdown_files(dir, &self.excluded_patterns) {
            Ok(files) => files,
            Err(e) => {
                warn!("could not scan {}: {}", dir.display(), e);
                return report;
            }
        };

        for path in files {
            if cancel.load(Ordering::Relaxed) {
                info!("batch sync cancelled after {} file(s)", processed(&report));
                break;
            }

            match direction {
                Direction::Push => {
                    let outcome = self.push_file(&path).await;
                    if outcome.success {
                        report.succeeded += 1;
                    } else {
                        report.failed += 1;
                        warn!("{}", outcome.message);
                    }
                }
                Direction::Pull => match self.linked_page_id(&path).await {
                    Ok(Some(page_id)) => {
                        let outcome = self.pull_page(&page_id, Some(&path)).await;
                        if outcome.success {
                            report.succeeded += 1;
                        } else {
                            report.failed += 1;
                            warn!("{}", outcome.message);
                        }
                    }
                    Ok(None) => {
                        debug!("skipping {}: no stored notion_page_id", path.display());
                        report.skipped += 1;
                    }
                    Err(SyncError::Store(StoreError::NotFound(_))) => {
                        report.skipped += 1;
                    }
                    Err(e) => {
                        warn!("could not read {}: {}", path.display(), e);
                        report.failed += 1;
                    }
                },
            }
        }

        report
    }

    /// The page id stored in a file's header, if any.
    pub async fn linked_page_id(&self, path: &Path) -> Result<Option<String>> {
        let (frontmatter, _) = self.store.read(path).await?;
        Ok(frontmatter.get(KEY_PAGE_ID).and_then(yaml_scalar))
    }
}

fn processed(report: &BatchReport) -> usize {
    report.succeeded + report.failed + report.skipped
}

/// Keep alphanumerics, spaces, hyphens and underscores; spaces to
/// hyphens; lowercase.
pub fn sanitize_title(title: &str) -> String {
    title
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect::<String>()
        .replace(' ', "-")
        .to_lowercase()
}

/// Recursively collect `.md` / `.markdown` files, sorted for stable
/// batch order. Exclusion globs match against the path relative to
/// `dir`, same as the watcher.
pub fn collect_markdown_files(dir: &Path, excluded_patterns: &[String]) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut stack = vec![dir.to_path_buf()];

    while let Some(current) = stack.pop() {
        for entry in std::fs::read_dir(&current)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if is_markdown(&path) {
                let relative = path.strip_prefix(dir).unwrap_or(&path);
                if !is_excluded(&relative.to_string_lossy(), excluded_patterns) {
                    files.push(path);
                }
            }
        }
    }

    files.sort();
    Ok(files)
}

/// Extensions the scanner and watcher recognize.
pub fn is_markdown(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()).map(str::to_lowercase).as_deref(),
        Some("md") | Some("markdown")
    )
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("untitled")
        .to_string()
}

fn yaml_scalar(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Frontmatter scalars (minus the sync-owned keys) as Notion rich_text
/// properties, for database-parent page creation.
fn rich_text_properties(frontmatter: &Frontmatter) -> Map<String, JsonValue> {
    let mut properties = Map::new();
    for (key, value) in frontmatter {
        if matches!(key.as_str(), KEY_TITLE | KEY_PAGE_ID | KEY_LAST_SYNCED) {
            continue;
        }
        if let Some(text) = yaml_scalar(value) {
            properties.insert(
                key.clone(),
                json!({ "rich_text": [{ "type": "text", "text": { "content": text } }] }),
            );
        }
    }
    properties
}

/// First text run of a flat rich_text property, if that is what this is.
fn rich_text_scalar(prop: &JsonValue) -> Option<String> {
    if prop.get("type").and_then(JsonValue::as_str) != Some("rich_text") {
        return None;
    }
    prop.get("rich_text")?
        .as_array()?
        .first()?
        .get("text")?
        .get("content")?
        .as_str()
        .map(str::to_string)
}
