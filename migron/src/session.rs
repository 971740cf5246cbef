use serde::Serialize;

use crate::apply::{Applier, StepOutcome};
use crate::catalog::Catalog;
use crate::engine::Engine;
use crate::error::Result;
use crate::plan::{Edge, Plan};
use crate::tenant::TenantContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    NotStarted,
    BootstrapRunning,
    PlanExecuting,
    Completed,
    Failed,
}

/// Machine-readable result of one provisioning run, suitable as a
/// deployment-pipeline gate.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub databases: Vec<String>,
    pub schemas: Vec<String>,
    pub applied: u32,
    pub skipped: u32,
    pub tenant_context_verified: bool,
}

/// Orchestrates one provisioning run: bootstrap outside the plan, tenant
/// context install + verify, then the ordered plan through the applier.
///
/// The plan is computed at construction, so catalog and planning errors
/// surface before any connection is touched. Re-running a session against
/// an already provisioned target applies nothing and reports every step as
/// skipped.
pub struct Session {
    catalog: Catalog,
    plan: Plan,
    auxiliary_databases: Vec<String>,
    extensions: Vec<String>,
    state: SessionState,
}

impl Session {
    pub fn new(catalog: Catalog, edges: Vec<Edge>) -> Result<Self> {
        let plan = Plan::build(&catalog, &edges)?;

        Ok(Self {
            catalog,
            plan,
            auxiliary_databases: Vec::new(),
            extensions: Vec::new(),
            state: SessionState::NotStarted,
        })
    }

    /// Adds a database created during bootstrap against the administrative
    /// namespace, e.g. the identity-provider database a separate subsystem
    /// expects to find.
    pub fn auxiliary_database(mut self, name: impl Into<String>) -> Self {
        self.auxiliary_databases.push(name.into());
        self
    }

    pub fn extension(mut self, name: impl Into<String>) -> Self {
        self.extensions.push(name.into());
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    pub async fn run<E: Engine + 'static>(&mut self, engine: E) -> Result<Summary> {
        let engine: Box<dyn Engine> = Box::new(engine);

        match self.drive(engine).await {
            Ok(summary) => {
                self.state = SessionState::Completed;

                tracing::info!(
                    applied = summary.applied,
                    skipped = summary.skipped,
                    "provisioning completed"
                );

                Ok(summary)
            }
            Err(err) => {
                self.state = SessionState::Failed;

                Err(err)
            }
        }
    }

    async fn drive(&mut self, engine: Box<dyn Engine>) -> Result<Summary> {
        self.state = SessionState::BootstrapRunning;

        let mut databases = Vec::new();

        for name in &self.auxiliary_databases {
            let created = engine.ensure_database(name).await?;

            tracing::info!(database = %name, created, "database ensured");
            databases.push(name.clone());
        }

        let mut schemas = Vec::new();

        for service in self.catalog.services() {
            let created = engine.ensure_schema(&service.schema).await?;

            tracing::info!(schema = %service.schema, created, "schema ensured");
            schemas.push(service.schema.clone());
        }

        for name in &self.extensions {
            engine.ensure_extension(name).await?;
        }

        engine.ensure_history().await?;

        let tenant = TenantContext::from_boxed(dyn_clone::clone_box(&*engine));
        tenant.install().await?;
        tenant.verify().await?;

        tracing::info!("tenant context installed and verified");

        self.state = SessionState::PlanExecuting;

        let applier = Applier::from_boxed(engine);
        let mut applied = 0;
        let mut skipped = 0;

        // First failure halts the run; later steps are never attempted.
        for step in self.plan.steps() {
            match applier.apply(step).await? {
                StepOutcome::Applied => applied += 1,
                StepOutcome::Skipped => skipped += 1,
            }
        }

        Ok(Summary {
            databases,
            schemas,
            applied,
            skipped,
            tenant_context_verified: true,
        })
    }
}
