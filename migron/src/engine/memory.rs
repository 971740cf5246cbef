use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use uuid::Uuid;

use crate::engine::{AppliedStep, Engine};
use crate::error::Result;

#[derive(Debug, Default)]
struct State {
    databases: BTreeSet<String>,
    schemas: BTreeSet<String>,
    extensions: BTreeSet<String>,
    history_ready: bool,
    history: HashMap<(String, u32), AppliedStep>,
    statements: Vec<String>,
    tenant_context_installed: bool,
    tenant: Option<Uuid>,
    poison: Option<String>,
}

/// In-process engine for tests and dry runs. Mirrors the Postgres engine's
/// observable behavior: existence-checked bootstrap, history consulted
/// before apply, session-scoped tenant variable.
#[derive(Debug, Clone, Default)]
pub struct Memory(Arc<RwLock<State>>);

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Any payload containing `fragment` fails to apply. Lets tests exercise
    /// the halt-on-failure path without a real database.
    pub fn poison(&self, fragment: impl Into<String>) {
        self.0.write().poison = Some(fragment.into());
    }

    pub fn clear_poison(&self) {
        self.0.write().poison = None;
    }

    /// Payloads executed so far, in order.
    pub fn statements(&self) -> Vec<String> {
        self.0.read().statements.clone()
    }

    pub fn applied_versions(&self, service: &str) -> Vec<u32> {
        let state = self.0.read();
        let mut versions: Vec<u32> = state
            .history
            .keys()
            .filter(|(name, _)| name == service)
            .map(|(_, version)| *version)
            .collect();
        versions.sort_unstable();
        versions
    }

    pub fn tenant_context_installed(&self) -> bool {
        self.0.read().tenant_context_installed
    }
}

#[async_trait]
impl Engine for Memory {
    async fn ensure_database(&self, name: &str) -> Result<bool> {
        Ok(self.0.write().databases.insert(name.to_owned()))
    }

    async fn ensure_schema(&self, name: &str) -> Result<bool> {
        Ok(self.0.write().schemas.insert(name.to_owned()))
    }

    async fn ensure_extension(&self, name: &str) -> Result<()> {
        self.0.write().extensions.insert(name.to_owned());
        Ok(())
    }

    async fn ensure_history(&self) -> Result<()> {
        self.0.write().history_ready = true;
        Ok(())
    }

    async fn record(&self, service: &str, version: u32) -> Result<Option<AppliedStep>> {
        Ok(self
            .0
            .read()
            .history
            .get(&(service.to_owned(), version))
            .cloned())
    }

    async fn apply(&self, payload: &str, record: AppliedStep) -> Result<()> {
        let mut state = self.0.write();

        if let Some(poison) = &state.poison {
            if payload.contains(poison.as_str()) {
                return Err(anyhow::anyhow!("statement rejected: {payload}").into());
            }
        }

        state.statements.push(payload.to_owned());
        state
            .history
            .insert((record.service.clone(), record.version), record);

        Ok(())
    }

    async fn install_tenant_context(&self) -> Result<()> {
        self.0.write().tenant_context_installed = true;
        Ok(())
    }

    async fn current_tenant(&self) -> Result<Option<Uuid>> {
        Ok(self.0.read().tenant)
    }

    async fn tenant_roundtrip(&self, tenant: Uuid) -> Result<Option<Uuid>> {
        let mut state = self.0.write();
        state.tenant = Some(tenant);
        Ok(state.tenant)
    }
}
