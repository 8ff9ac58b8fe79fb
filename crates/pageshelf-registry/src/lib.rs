//! # Pageshelf Registry
//!
//! Versioned, multi-tenant page storage for pageshelf:
//! - Immutable versions written under `{tenant}/{slug}/{version}/`
//! - An active pointer per tenant/slug, overwritten by publish and rollback
//! - Lazy expiry: an expired pointer reads as Gone, nothing is swept
//! - Path resolution with asset-path inference for slug-less requests
//! - A fail-open, fixed-window rate limiter for mutations
//!
//! ## Core Concepts
//!
//! - **Blob storage** holds version files and is never rewritten
//! - **Key-value storage** holds pointers (`pages:{tenant}:{slug}`) and counters
//! - **Versions** are publish times in milliseconds, strictly increasing per process
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pageshelf::FileRecord;
//! use pageshelf_registry::*;
//!
//! # async fn example() -> std::result::Result<(), Box<dyn std::error::Error>> {
//! let registry = Registry::new(
//!     Arc::new(MemoryStorage::new()),
//!     Arc::new(MemoryKvStorage::new()),
//! );
//!
//! let receipt = registry
//!     .publish(PublishRequest {
//!         tenant: "alice".into(),
//!         slug: Some("docs".into()),
//!         files: vec![FileRecord::text("index.html", "<h1>Docs</h1>")],
//!         ..Default::default()
//!     })
//!     .await?;
//!
//! let page = registry.resolve("alice", "docs", None).await?;
//! assert_eq!(page.version, receipt.version);
//! # Ok(())
//! # }
//! ```

pub mod address;
pub mod error;
pub mod pointer;
pub mod publish;
pub mod ratelimit;
pub mod registry;
pub mod resolve;
pub mod storage;
pub mod versions;

pub use error::{RegistryError, Result};
pub use pointer::ActivePointer;
pub use publish::{PublishReceipt, PublishRequest, SingleHtmlRequest};
pub use ratelimit::{RateLimitConfig, RateLimitStatus};
pub use registry::{Registry, RegistryBuilder};
pub use resolve::{PathTarget, ResolvedContent};
pub use storage::{BlobStorage, KvStorage, MemoryKvStorage, MemoryStorage, StorageError};
pub use versions::VersionEntry;

#[cfg(feature = "s3")]
pub use storage::s3_storage::S3Storage;

#[cfg(feature = "redis")]
pub use storage::redis_storage::RedisKvStorage;
