//! The request-independent core: authorization checks, relation resolution and
//! the write paths that fill a [`Transaction`](crate::store::Transaction).

pub mod authorize;
pub mod content;
pub mod recycle;
pub mod registry;
pub mod relation;
pub mod team;

pub use authorize::{AuthGrant, MergeSummary, check_authorize, enqueue_merge, require_authorize};
pub use recycle::{RecyclePage, RecycledFile, list_recycled};
pub use registry::AuthTarget;
pub use relation::{RelationBundle, ResolvedNode, ensure_complete, resolve_live};
