//! Request middleware, outermost first:
//! metrics → permissions → query sanitation → handler.

pub mod metrics;
pub mod permissions;
pub mod sanitize_query;

pub use metrics::track_requests;
pub use permissions::resolve_permissions;
pub use sanitize_query::sanitize_query;
