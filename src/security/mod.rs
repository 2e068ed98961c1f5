//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → role header looked up in the permission table
//!     → Permissions attached to request extensions
//!     → query sanitizer merges the permission filter
//! ```

pub mod permissions;

pub use permissions::{PermissionStore, PermissionTable, Permissions};
