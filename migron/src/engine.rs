use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dyn_clone::DynClone;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;

#[cfg(feature = "memory")]
mod memory;
#[cfg(feature = "pg")]
mod pg;

#[cfg(feature = "memory")]
pub use memory::*;
#[cfg(feature = "pg")]
pub use pg::*;

/// Persisted record of one applied step. Written once, never mutated;
/// consulted on every later run to decide skip-vs-apply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppliedStep {
    pub service: String,
    pub version: u32,
    pub checksum: String,
    pub applied_at: DateTime<Utc>,
}

impl AppliedStep {
    pub fn new(service: impl Into<String>, version: u32, checksum: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            version,
            checksum: checksum.into(),
            applied_at: Utc::now(),
        }
    }
}

/// Storage backend for one provisioning run.
///
/// The `ensure_*` methods are structurally idempotent (existence checks, IF
/// NOT EXISTS) so bootstrap survives a crash between a payload and its
/// history record. `apply` runs the payload and writes the record in one
/// unit of work where the backend supports it.
#[async_trait]
pub trait Engine: DynClone + Send + Sync {
    /// Creates the database if absent, against the administrative namespace.
    /// Returns whether it was created by this call.
    async fn ensure_database(&self, name: &str) -> Result<bool>;

    /// Creates the schema namespace if absent. Returns whether it was
    /// created by this call.
    async fn ensure_schema(&self, name: &str) -> Result<bool>;

    async fn ensure_extension(&self, name: &str) -> Result<()>;

    /// Creates the applied-steps history table if absent.
    async fn ensure_history(&self) -> Result<()>;

    async fn record(&self, service: &str, version: u32) -> Result<Option<AppliedStep>>;

    /// Executes the payload and persists the record in the same unit of
    /// work. On failure nothing is recorded.
    async fn apply(&self, payload: &str, record: AppliedStep) -> Result<()>;

    /// Installs the tenant setter/getter and the touch-updated-at trigger
    /// helper, create-or-replace, safe to rerun.
    async fn install_tenant_context(&self) -> Result<()>;

    /// Reads the current tenant without setting one. Unset or malformed
    /// reads as `None`, never an error.
    async fn current_tenant(&self) -> Result<Option<Uuid>>;

    /// Sets `tenant` and reads it back within the same session, returning
    /// what the getter saw. Set-then-read must share one connection, which
    /// is why this is a single engine call.
    async fn tenant_roundtrip(&self, tenant: Uuid) -> Result<Option<Uuid>>;
}

dyn_clone::clone_trait_object!(Engine);
