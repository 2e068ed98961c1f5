//! Query-string sanitation service library.

pub mod config;
pub mod http;
pub mod observability;
pub mod query;
pub mod security;

pub use config::schema::ServiceConfig;
pub use http::HttpServer;
pub use query::{sanitize, Query, RawInput};
