//! Role-based permission filters.
//!
//! # Responsibilities
//! - Map a caller's role to the row-level filter it must always carry
//! - Hold the role table behind an atomically swappable pointer
//!
//! # Design Decisions
//! - Readers never block: one `ArcSwap` load per request
//! - A reload replaces the whole table; no partial updates

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::http::HeaderName;
use serde_json::{Map, Value};

use crate::config::{PermissionConfig, ValidationError};

/// Authorization context attached to a request.
///
/// `permissions` is merged into the query filter; its keys win.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Permissions {
    pub role: Option<String>,
    pub permissions: Option<Map<String, Value>>,
}

/// Resolved view of [`PermissionConfig`].
#[derive(Debug, Clone)]
pub struct PermissionTable {
    enabled: bool,
    role_header: HeaderName,
    roles: HashMap<String, Map<String, Value>>,
}

impl PermissionTable {
    pub fn from_config(config: &PermissionConfig) -> Result<Self, ValidationError> {
        let role_header = HeaderName::from_bytes(config.role_header.as_bytes())
            .map_err(|_| ValidationError::InvalidRoleHeader(config.role_header.clone()))?;
        Ok(Self {
            enabled: config.enabled,
            role_header,
            roles: config.roles.clone(),
        })
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn role_header(&self) -> &HeaderName {
        &self.role_header
    }

    pub fn role_count(&self) -> usize {
        self.roles.len()
    }

    /// Permission context for `role`, if the role is known.
    pub fn resolve(&self, role: &str) -> Option<Permissions> {
        self.roles.get(role).map(|filter| Permissions {
            role: Some(role.to_string()),
            permissions: Some(filter.clone()),
        })
    }
}

/// Shared, hot-swappable permission table.
#[derive(Debug)]
pub struct PermissionStore {
    table: ArcSwap<PermissionTable>,
}

impl PermissionStore {
    pub fn new(table: PermissionTable) -> Self {
        Self {
            table: ArcSwap::from_pointee(table),
        }
    }

    pub fn load(&self) -> Arc<PermissionTable> {
        self.table.load_full()
    }

    pub fn replace(&self, table: PermissionTable) {
        self.table.store(Arc::new(table));
    }
}
