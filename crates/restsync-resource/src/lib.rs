//! Resource addressing and comparison for restsync
//!
//! - [`LogicalPath`]: user-facing hierarchical address of a resource or collection
//! - [`Resource`]: an opaque JSON body with helpers for inspection
//! - [`attribute`]: dot/bracket attribute paths into a body (`config.servers[0].host`)
//! - [`diff`]: ordered JSON-Pointer patches between two bodies

pub mod attribute;
pub mod diff;
pub mod error;
pub mod logical;
pub mod resource;

pub use attribute::{PathSegment, format_path, get_at_path, parse_attribute_path, set_at_path};
pub use diff::{PatchOperation, apply_patch, diff, similarity};
pub use error::{Error, Result};
pub use logical::LogicalPath;
pub use resource::Resource;
