//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, layers)
//!     → request.rs (request ID)
//!     → middleware/permissions.rs (role → permission filter)
//!     → middleware/sanitize_query.rs (query string → Query extension)
//!     → handler reads Query
//! ```

pub mod middleware;
pub mod request;
pub mod server;

pub use request::{RequestIdExt, UuidRequestId, X_REQUEST_ID};
pub use server::HttpServer;
