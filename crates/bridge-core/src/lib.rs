//! bridge-core: keeps local markdown documents and Notion pages
//! mirror-consistent.
//!
//! This crate provides the core functionality for:
//! - Converting markdown bodies to Notion content blocks and back
//! - Reading/writing the sync link stored in document frontmatter
//! - The Notion REST gateway with a shared rate budget
//! - The per-document sync orchestration (push, pull, conflict check,
//!   batch runs)

pub mod blocks;
pub mod config;
pub mod converter;
pub mod engine;
pub mod exclude;
pub mod gateway;
pub mod markdown;
pub mod notion;
pub mod ratelimit;
pub mod store;

pub use blocks::Block;
pub use config::{Config, ConfigError};
pub use engine::{BatchReport, Direction, SyncEngine, SyncError, SyncOutcome};
pub use gateway::{GatewayError, RemoteGateway, RemotePage, SearchKind};
pub use markdown::Frontmatter;
pub use notion::NotionApi;
pub use ratelimit::{RateBudget, SharedRateBudget};
pub use store::{LinkStore, StoreError};
