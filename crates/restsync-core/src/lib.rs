//! Reconciliation core for restsync
//!
//! Keeps declaratively described REST resources in a local repository in
//! step with a remote HTTP-managed server:
//!
//! - **Alias resolution**: logical paths such as `/teams/team-a` become
//!   remote paths such as `/teams/t-1`, one segment at a time
//! - **Reconciliation**: create-or-update with alias fallback, strict
//!   create/update/delete, secret resolution before every send
//! - **Collection cache**: one fetch per collection per top-level call
//! - **Drift detection**: ordered patches that ignore secret representation
//!
//! # Architecture
//!
//! ```text
//!                  CLI / transport
//!                        |
//!                  restsync-core
//!                        |
//!      +-----------+-----+-------+--------------+
//!      |           |             |              |
//! restsync-fs restsync-resource restsync-secrets restsync-metadata
//! ```
//!
//! The HTTP client is not part of this crate; it plugs in through
//! [`ManagedServer`].
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use restsync_core::{FsRepository, Reconciler, Result};
//! use restsync_metadata::MetadataTree;
//!
//! fn example(server: Arc<dyn restsync_core::ManagedServer>) -> Result<()> {
//!     let tree = MetadataTree::load("metadata.toml".as_ref())?;
//!     let engine = Reconciler::new(Arc::new(FsRepository::new("resources")), Arc::new(tree))
//!         .with_server(server);
//!     let body = engine.get_local_resource("/teams/team-a")?;
//!     engine.save_remote_resource("/teams/team-a", &body)?;
//!     Ok(())
//! }
//! ```

pub mod alias;
pub mod cache;
mod collection;
pub mod config;
pub mod diff;
pub mod engine;
pub mod error;
pub mod logging;
pub mod repository;
pub mod server;
pub mod transform;

pub use alias::ResolvedPath;
pub use cache::{CacheKey, CacheScope, CollectionCache};
pub use config::{ContextConfig, RepositoryConfig};
pub use diff::{DiffReport, compare_resources};
pub use engine::{DeleteOutcome, Reconciler};
pub use error::{Error, Result};
pub use repository::{FsRepository, RepositoryCapabilities, ResourceRepository, SyncOutcome};
pub use server::{ManagedServer, RequestSpec, ServerError, ServerResult};
pub use transform::{AttributePayloadEngine, PayloadEngine};
