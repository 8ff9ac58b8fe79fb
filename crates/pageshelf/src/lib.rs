//! # Pageshelf
//!
//! Core building blocks for a multi-tenant page publisher:
//!
//! - [`auth`]: HMAC request signing and verification for mutating requests
//! - [`file`]: the [`FileRecord`] carried by publish payloads
//! - [`naming`]: tenant/slug normalization and page identifiers
//! - [`rewrite`]: root-relative asset rewriting for entry documents
//! - [`content_type`]: extension based content-type inference
//! - [`clock`]: injectable wall clock
//!
//! Storage, publishing and content resolution live in `pageshelf-registry`.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use pageshelf::auth::{self, Authenticator, SecretSet, SignedRequest, Verification};
//! use pageshelf::clock::ManualClock;
//!
//! let clock = Arc::new(ManualClock::new(1_700_000_000_000));
//! let auth = Authenticator::new(SecretSet::from_csv("s3cret"), 300_000, clock);
//!
//! let body = br#"{"tenant":"alice","html":"<h1>Hi</h1>"}"#;
//! let signature = auth::sign("s3cret", "POST", "/api/publish/html", "1700000000000", body);
//!
//! let outcome = auth.verify(&SignedRequest {
//!     method: "POST",
//!     path_and_query: "/api/publish/html",
//!     timestamp: Some("1700000000000"),
//!     signature: Some(&signature),
//!     body,
//! });
//! assert_eq!(outcome, Ok(Verification::Verified));
//! ```

pub mod auth;
pub mod clock;
pub mod content_type;
pub mod error;
pub mod file;
pub mod naming;
pub mod rewrite;

pub use auth::{Authenticator, SecretSet, SignedRequest, Verification};
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use error::{AuthError, ValidationError};
pub use file::{Encoding, FileRecord, INDEX_HTML};
pub use naming::{DEFAULT_SLUG, PageId};
