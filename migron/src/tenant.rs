use uuid::Uuid;

use crate::engine::Engine;
use crate::error::{ProvisionError, Result};

/// Installs and checks the SQL-level tenant isolation context that
/// row-level-security policies read.
///
/// Three capabilities are installed with create-or-replace semantics: a
/// setter storing a tenant id in the session configuration under
/// `app.current_tenant`, a getter returning it as a uuid (NULL when unset
/// or malformed, never an error), and the `touch_updated_at` trigger helper
/// shared by policy-protected tables.
pub struct TenantContext {
    engine: Box<dyn Engine>,
}

impl TenantContext {
    pub fn new<E: Engine + 'static>(engine: E) -> Self {
        Self {
            engine: Box::new(engine),
        }
    }

    pub(crate) fn from_boxed(engine: Box<dyn Engine>) -> Self {
        Self { engine }
    }

    /// Safe to rerun; called once per provisioning run before any step that
    /// assumes tenant isolation.
    pub async fn install(&self) -> Result<()> {
        self.engine.install_tenant_context().await
    }

    /// Round-trips a sentinel tenant id through the setter and getter on
    /// one session and fails unless the sentinel comes back.
    pub async fn verify(&self) -> Result<Uuid> {
        let sentinel = Uuid::new_v4();

        match self.engine.tenant_roundtrip(sentinel).await? {
            Some(got) if got == sentinel => Ok(sentinel),
            got => Err(ProvisionError::TenantVerification {
                expected: sentinel,
                got,
            }),
        }
    }

    /// Reads the current tenant without setting one. Unset reads as `None`.
    pub async fn current(&self) -> Result<Option<Uuid>> {
        self.engine.current_tenant().await
    }
}
