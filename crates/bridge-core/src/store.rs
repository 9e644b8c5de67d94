//! LinkStore: durable sync metadata embedded in document frontmatter.
//!
//! The link between a local document and its remote page (`notion_page_id`
//! plus `last_synced`) lives in the document's own header, so reads and
//! writes here are plain frontmatter file operations with merge semantics.

use crate::markdown::{self, Frontmatter};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Reads and writes frontmatter-linked markdown documents.
#[derive(Debug, Clone, Default)]
pub struct LinkStore;

impl LinkStore {
    /// Read a document, splitting frontmatter from body.
    ///
    /// A document with no frontmatter yields an empty map.
    pub async fn read(&self, path: &Path) -> Result<(Frontmatter, String)> {
        let content = tokio::fs::read_to_string(path).await.map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                StoreError::NotFound(path.to_path_buf())
            } else {
                StoreError::Io { path: path.to_path_buf(), source }
            }
        })?;

        let parsed = markdown::parse(&content);
        Ok((parsed.frontmatter.unwrap_or_default(), parsed.body))
    }

    /// Merge `updates` into the document's frontmatter and rewrite it.
    ///
    /// New keys are added, existing keys overwritten; every other key in
    /// the header survives unchanged.
    pub async fn write(&self, path: &Path, updates: Frontmatter) -> Result<()> {
        let (mut frontmatter, body) = self.read(path).await?;
        frontmatter.extend(updates);

        let content = markdown::serialize(Some(&frontmatter), &body);
        tokio::fs::write(path, content)
            .await
            .map_err(|source| StoreError::Io { path: path.to_path_buf(), source })
    }

    /// Write a brand-new document (or overwrite an existing one), creating
    /// parent directories as needed.
    pub async fn create(&self, path: &Path, frontmatter: &Frontmatter, body: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|source| StoreError::Io { path: parent.to_path_buf(), source })?;
            }
        }

        let content = markdown::serialize(Some(frontmatter), body);
        tokio::fs::write(path, content)
            .await
            .map_err(|source| StoreError::Io { path: path.to_path_buf(), source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_yaml::Value;

    fn yaml(s: &str) -> Value {
        Value::String(s.to_string())
    }

    #[tokio::test]
    async fn read_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = LinkStore;
        let err = store.read(&dir.path().join("absent.md")).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn write_merges_and_preserves_unknown_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.md");
        std::fs::write(
            &path,
            "---\ntitle: Test Document\nnotion_page_id: abc123\ntags: [test, integration]\n---\n\nBody text.",
        )
        .unwrap();

        let store = LinkStore;
        let mut updates = Frontmatter::new();
        updates.insert("last_synced".into(), yaml("2024-01-01T00:00:00Z"));
        updates.insert("status".into(), yaml("done"));
        store.write(&path, updates).await.unwrap();

        let (fm, body) = store.read(&path).await.unwrap();
        assert_eq!(fm.get("title"), Some(&yaml("Test Document")));
        assert_eq!(fm.get("notion_page_id"), Some(&yaml("abc123")));
        assert_eq!(
            fm.get("tags"),
            Some(&Value::Sequence(vec![yaml("test"), yaml("integration")]))
        );
        assert_eq!(fm.get("last_synced"), Some(&yaml("2024-01-01T00:00:00Z")));
        assert_eq!(fm.get("status"), Some(&yaml("done")));
        assert_eq!(body, "Body text.");
    }

    #[tokio::test]
    async fn write_overwrites_existing_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.md");
        std::fs::write(&path, "---\nlast_synced: old\n---\n\nBody.").unwrap();

        let store = LinkStore;
        let mut updates = Frontmatter::new();
        updates.insert("last_synced".into(), yaml("new"));
        store.write(&path, updates).await.unwrap();

        let (fm, _) = store.read(&path).await.unwrap();
        assert_eq!(fm.get("last_synced"), Some(&yaml("new")));
    }

    #[tokio::test]
    async fn create_makes_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/doc.md");

        let mut fm = Frontmatter::new();
        fm.insert("title".into(), yaml("Nested"));
        let store = LinkStore;
        store.create(&path, &fm, "# Nested\n").await.unwrap();

        let (read_fm, body) = store.read(&path).await.unwrap();
        assert_eq!(read_fm.get("title"), Some(&yaml("Nested")));
        assert_eq!(body, "# Nested\n");
    }
}
