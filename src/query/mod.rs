//! Query normalization subsystem.
//!
//! # Data Flow
//! ```text
//! URL query string
//!     → raw.rs (decode into RawInput: single / list / object per key)
//!     → sanitize.rs (per-field normalization, permission merge)
//!     → types.rs Query (attached to the request for downstream services)
//! ```

pub mod raw;
pub mod sanitize;
pub mod types;

pub use raw::{RawInput, RawValue};
pub use sanitize::{sanitize, sanitize_with_report, DegradeReason, Degradation, Normalized, Sanitized};
pub use types::{Meta, Numeric, Query, Sort, SortOrder};
