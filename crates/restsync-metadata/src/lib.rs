//! Resource metadata for restsync
//!
//! Metadata describes how a logical path maps onto HTTP operations, how
//! identifiers and aliases are read from bodies, and which attributes are
//! secret. It is attached to path templates and inherited downwards:
//!
//! - [`ResourceMetadata`]: partial metadata for one template, with merge rules
//! - [`ResourceRecord`]: the merged, defaults-filled result for one path
//! - [`RecordResolver`]: the lookup seam used by the engine
//! - [`MetadataTree`]: an in-memory resolver, loadable from TOML/JSON/YAML

pub mod error;
pub mod metadata;
pub mod record;
pub mod tree;

pub use error::{Error, Result};
pub use metadata::{OperationMetadata, PayloadTransform, ResourceInfo, ResourceMetadata};
pub use record::{OperationSpec, ResourceRecord, Verb, WILDCARD, render_template};
pub use tree::{MetadataTree, RecordResolver};
